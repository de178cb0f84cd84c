//! Inline result-tag codec
//!
//! The reasoner carries structured decisions inside free text using
//! `[[TAG:field:...]]` markers. Decoding locates each marker, extracts its
//! fields and hands back the text with only the markers removed.

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use uuid::Uuid;

pub const ELIGIBILITY_RESULT: &str = "ELIGIBILITY_RESULT";
pub const LOAN_OFFER: &str = "LOAN_OFFER";
pub const LOAN_DATA: &str = "LOAN_DATA";

lazy_static! {
    static ref ELIGIBILITY_PATTERN: Regex =
        Regex::new(r"(?s)\[\[\s*ELIGIBILITY_RESULT\s*:(.*?)\]\]").unwrap();
    static ref OFFER_PATTERN: Regex = Regex::new(r"(?s)\[\[\s*LOAN_OFFER\s*:(.*?)\]\]").unwrap();
    static ref DATA_OPEN: Regex = Regex::new(r"\[\[\s*LOAN_DATA\s*:").unwrap();
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum EligibilityStatus {
    Eligible,
    Ineligible,
}

impl EligibilityStatus {
    pub fn label(&self) -> &'static str {
        match self {
            EligibilityStatus::Eligible => "eligible",
            EligibilityStatus::Ineligible => "ineligible",
        }
    }

    fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "eligible" => Some(EligibilityStatus::Eligible),
            "ineligible" | "not_eligible" | "not-eligible" => Some(EligibilityStatus::Ineligible),
            _ => None,
        }
    }
}

/// `[[ELIGIBILITY_RESULT:<status>:<value>]]`. `value` is a product id when
/// eligible and a free-text reason otherwise; it may itself contain `:`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EligibilityTag {
    pub status: EligibilityStatus,
    pub value: String,
}

impl EligibilityTag {
    pub fn eligible(product_id: impl Into<String>) -> Self {
        Self {
            status: EligibilityStatus::Eligible,
            value: product_id.into(),
        }
    }

    pub fn ineligible(reason: impl Into<String>) -> Self {
        Self {
            status: EligibilityStatus::Ineligible,
            value: reason.into(),
        }
    }

    /// Product the borrower qualified for, when the value is a well-formed id.
    pub fn product_id(&self) -> Option<Uuid> {
        match self.status {
            EligibilityStatus::Eligible => Uuid::parse_str(&self.value).ok(),
            EligibilityStatus::Ineligible => None,
        }
    }

    pub fn reason(&self) -> Option<&str> {
        match self.status {
            EligibilityStatus::Ineligible => Some(self.value.as_str()),
            EligibilityStatus::Eligible => None,
        }
    }
}

/// `[[LOAN_DATA:<json>]]`. `payload` is `None` when the JSON does not parse.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LoanDataTag {
    pub raw: String,
    pub payload: Option<Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum ResultTag {
    Eligibility(EligibilityTag),
    LoanOffer { product_id: String },
    LoanData(LoanDataTag),
}

impl fmt::Display for ResultTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", ResultTagCodec::encode(self))
    }
}

/// Outcome of looking for one tag kind.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "outcome", content = "value", rename_all = "lowercase")]
pub enum TagOutcome<T> {
    Absent,
    Present(T),
    /// Marker found but its fields could not be understood. Holds the raw body.
    Malformed(String),
}

impl<T> TagOutcome<T> {
    pub fn present(&self) -> Option<&T> {
        match self {
            TagOutcome::Present(value) => Some(value),
            _ => None,
        }
    }

    pub fn is_absent(&self) -> bool {
        matches!(self, TagOutcome::Absent)
    }

    pub fn is_malformed(&self) -> bool {
        matches!(self, TagOutcome::Malformed(_))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DecodedMessage {
    pub display: String,
    pub eligibility: TagOutcome<EligibilityTag>,
    pub offer: TagOutcome<String>,
    pub data: TagOutcome<LoanDataTag>,
}

impl DecodedMessage {
    pub fn has_tags(&self) -> bool {
        !(self.eligibility.is_absent() && self.offer.is_absent() && self.data.is_absent())
    }
}

pub struct ResultTagCodec;

impl ResultTagCodec {
    /// Decode every recognised tag kind from `text`.
    pub fn decode(text: &str) -> DecodedMessage {
        DecodedMessage {
            display: Self::strip(text),
            eligibility: Self::decode_eligibility(text),
            offer: Self::decode_offer(text),
            data: Self::decode_data(text),
        }
    }

    pub fn decode_eligibility(text: &str) -> TagOutcome<EligibilityTag> {
        let Some(body) = first_body(&ELIGIBILITY_PATTERN, text) else {
            return TagOutcome::Absent;
        };

        let mut fields = body.splitn(2, ':');
        let status = fields.next().and_then(EligibilityStatus::parse);
        let value = fields.next().map(str::trim).unwrap_or_default();

        match status {
            Some(status) if !value.is_empty() => TagOutcome::Present(EligibilityTag {
                status,
                value: value.to_string(),
            }),
            _ => TagOutcome::Malformed(body.to_string()),
        }
    }

    pub fn decode_offer(text: &str) -> TagOutcome<String> {
        match first_body(&OFFER_PATTERN, text) {
            None => TagOutcome::Absent,
            Some(body) => {
                let product_id = body.trim();
                if product_id.is_empty() {
                    TagOutcome::Malformed(body.to_string())
                } else {
                    TagOutcome::Present(product_id.to_string())
                }
            }
        }
    }

    pub fn decode_data(text: &str) -> TagOutcome<LoanDataTag> {
        match data_markers(text).first().map(|marker| marker.body) {
            None => TagOutcome::Absent,
            Some(body) => {
                let raw = body.trim();
                if raw.is_empty() {
                    return TagOutcome::Malformed(body.to_string());
                }
                TagOutcome::Present(LoanDataTag {
                    raw: raw.to_string(),
                    payload: serde_json::from_str(raw).ok(),
                })
            }
        }
    }

    /// Remove all recognised markers, leaving every other character in place.
    pub fn strip(text: &str) -> String {
        let without_eligibility = ELIGIBILITY_PATTERN.replace_all(text, "");
        let without_offer = OFFER_PATTERN.replace_all(&without_eligibility, "");
        strip_data_markers(&without_offer)
    }

    /// Canonical marker for a tag.
    pub fn encode(tag: &ResultTag) -> String {
        match tag {
            ResultTag::Eligibility(tag) => {
                format!("[[{}:{}:{}]]", ELIGIBILITY_RESULT, tag.status.label(), tag.value)
            }
            ResultTag::LoanOffer { product_id } => format!("[[{}:{}]]", LOAN_OFFER, product_id),
            ResultTag::LoanData(data) => {
                let body = match &data.payload {
                    Some(payload) => payload.to_string(),
                    None => data.raw.clone(),
                };
                format!("[[{}:{}]]", LOAN_DATA, body)
            }
        }
    }
}

fn first_body<'a>(pattern: &Regex, text: &'a str) -> Option<&'a str> {
    pattern
        .captures(text)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

/// A `LOAN_DATA` marker: byte span in the text plus its body.
struct DataMarker<'a> {
    start: usize,
    end: usize,
    body: &'a str,
}

/// `LOAN_DATA` bodies are JSON and may contain `]]` themselves, so a body
/// opening with `{` or `[` runs to its balanced close. Anything else ends at
/// the first `]]`.
fn data_markers(text: &str) -> Vec<DataMarker<'_>> {
    let mut markers = Vec::new();
    let mut from = 0;

    while let Some(open) = DATA_OPEN.find_at(text, from) {
        let body_start = open.end();
        let rest = &text[body_start..];

        let balanced = json_extent(rest).and_then(|len| {
            let after = &rest[len..];
            let trimmed = after.trim_start();
            trimmed
                .starts_with("]]")
                .then(|| len + (after.len() - trimmed.len()))
        });
        let Some(body_len) = balanced.or_else(|| rest.find("]]")) else {
            break;
        };

        let end = body_start + body_len + 2;
        markers.push(DataMarker {
            start: open.start(),
            end,
            body: &text[body_start..body_start + body_len],
        });
        from = end;
    }

    markers
}

/// Length of the JSON object or array at the start of `text`, leading
/// whitespace included.
fn json_extent(text: &str) -> Option<usize> {
    let offset = text.len() - text.trim_start().len();
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, c) in text[offset..].char_indices() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }

        match c {
            '"' if depth > 0 => in_string = true,
            '{' | '[' => depth += 1,
            '}' | ']' => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(offset + i + 1);
                }
            }
            _ if depth == 0 => return None,
            _ => {}
        }
    }

    None
}

fn strip_data_markers(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut cursor = 0;
    for marker in data_markers(text) {
        out.push_str(&text[cursor..marker.start]);
        cursor = marker.end;
    }
    out.push_str(&text[cursor..]);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_loan_data_with_nested_arrays() {
        let text = r#"Schedule: [[LOAN_DATA:{"emi":[[1,2]],"note":"ends ]] here"}]] thanks"#;
        let decoded = ResultTagCodec::decode(text);

        let data = decoded.data.present().unwrap();
        assert_eq!(data.raw, r#"{"emi":[[1,2]],"note":"ends ]] here"}"#);
        let payload = data.payload.as_ref().unwrap();
        assert_eq!(payload["emi"][0][1], 2);
        assert_eq!(decoded.display, "Schedule:  thanks");
    }

    #[test]
    fn test_no_tag_is_absent() {
        let decoded = ResultTagCodec::decode("Please share your age and income.");
        assert!(decoded.eligibility.is_absent());
        assert!(decoded.offer.is_absent());
        assert!(decoded.data.is_absent());
        assert!(!decoded.has_tags());
        assert_eq!(decoded.display, "Please share your age and income.");
    }

    #[test]
    fn test_eligible_marker_with_whitespace() {
        let id = Uuid::new_v4();
        let text = format!("Great news! [[ELIGIBILITY_RESULT : eligible : {} ]] Shall we apply?", id);
        let decoded = ResultTagCodec::decode(&text);

        let tag = decoded.eligibility.present().unwrap();
        assert_eq!(tag.status, EligibilityStatus::Eligible);
        assert_eq!(tag.product_id(), Some(id));
        assert_eq!(decoded.display, "Great news!  Shall we apply?");
    }

    #[test]
    fn test_ineligible_reason_keeps_separators() {
        let decoded = ResultTagCodec::decode(
            "Sorry. [[ELIGIBILITY_RESULT:ineligible:Income too low: minimum is ₹25000]]",
        );
        let tag = decoded.eligibility.present().unwrap();
        assert_eq!(tag.status, EligibilityStatus::Ineligible);
        assert_eq!(tag.reason(), Some("Income too low: minimum is ₹25000"));
        assert_eq!(decoded.display, "Sorry. ");
    }

    #[test]
    fn test_unknown_status_is_malformed_not_absent() {
        let decoded = ResultTagCodec::decode("[[ELIGIBILITY_RESULT:maybe:later]] hmm");
        assert!(decoded.eligibility.is_malformed());
        assert_eq!(decoded.display, " hmm");
    }

    #[test]
    fn test_offer_reencodes_identically() {
        let text = "[[LOAN_OFFER:abc123]]";
        let decoded = ResultTagCodec::decode(text);
        let product_id = decoded.offer.present().unwrap().clone();
        assert_eq!(product_id, "abc123");
        assert_eq!(ResultTagCodec::encode(&ResultTag::LoanOffer { product_id }), text);
    }

    #[test]
    fn test_loan_data_bad_json_still_strips() {
        let decoded = ResultTagCodec::decode("Offer below [[LOAN_DATA:{not json}]]");
        let data = decoded.data.present().unwrap();
        assert!(data.payload.is_none());
        assert_eq!(data.raw, "{not json}");
        assert_eq!(decoded.display, "Offer below ");
    }

    #[test]
    fn test_loan_data_json_payload() {
        let decoded =
            ResultTagCodec::decode(r#"[[LOAN_DATA:{"amount": 200000, "tenure": 24}]] done"#);
        let payload = decoded.data.present().unwrap().payload.clone().unwrap();
        assert_eq!(payload["amount"], 200000);
        assert_eq!(decoded.display, " done");
    }

    #[test]
    fn test_eligibility_encode_form() {
        let tag = ResultTag::Eligibility(EligibilityTag::ineligible("Credit score below 650"));
        assert_eq!(
            tag.to_string(),
            "[[ELIGIBILITY_RESULT:ineligible:Credit score below 650]]"
        );
    }
}
