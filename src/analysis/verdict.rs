//! Verdict parsing for document-analysis responses
//!
//! Strict JSON first; on failure, a keyword scan of the raw text.

use crate::models::DocumentVerdict;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

/// Risk score assumed when the response carried none we could read.
pub const DEFAULT_RISK_SCORE: u8 = 5;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AnalysisOutcome {
    pub verdict: DocumentVerdict,
    pub details: String,
    pub risk_score: u8,
    /// False when the keyword fallback produced this outcome.
    pub structured: bool,
}

#[derive(Debug, Deserialize)]
struct VerdictPayload {
    verdict: Option<Value>,
    calculations: Option<Value>,
    logic_verification: Option<Value>,
    details: Option<Value>,
    risk_score: Option<Value>,
}

fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn risk_score(value: Option<&Value>) -> Option<u8> {
    let score = match value? {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    if !score.is_finite() {
        return None;
    }
    Some(score.round().clamp(1.0, 10.0) as u8)
}

/// Remove surrounding code-fence markers.
pub fn strip_code_fence(raw: &str) -> &str {
    raw.trim()
        .trim_start_matches("```json")
        .trim_start_matches("```JSON")
        .trim_start_matches("```")
        .trim_end_matches("```")
        .trim()
}

/// Keyword scan used when the response is not the expected JSON.
pub fn keyword_verdict(raw: &str) -> DocumentVerdict {
    let lowered = raw.to_lowercase();
    if lowered.contains("suspicious") {
        DocumentVerdict::Suspicious
    } else if lowered.contains("genuine") {
        DocumentVerdict::Genuine
    } else {
        DocumentVerdict::Inconclusive
    }
}

pub fn parse_response(raw: &str) -> AnalysisOutcome {
    let cleaned = strip_code_fence(raw);

    match serde_json::from_str::<VerdictPayload>(cleaned) {
        Ok(payload) => {
            let verdict = payload
                .verdict
                .as_ref()
                .map(value_text)
                .and_then(|label| DocumentVerdict::from_label(&label))
                .unwrap_or(DocumentVerdict::Inconclusive);

            let summary = payload.details.as_ref().map(value_text).unwrap_or_default();

            let details = match payload.calculations.as_ref() {
                Some(calculations) => format!(
                    "CALCULATIONS: {}\n\nLOGIC CHECK: {}\n\nSUMMARY: {}",
                    value_text(calculations),
                    payload
                        .logic_verification
                        .as_ref()
                        .map(value_text)
                        .unwrap_or_default(),
                    summary
                ),
                None => summary,
            };

            AnalysisOutcome {
                verdict,
                details,
                risk_score: risk_score(payload.risk_score.as_ref()).unwrap_or(DEFAULT_RISK_SCORE),
                structured: true,
            }
        }
        Err(e) => {
            warn!("Analysis response is not valid JSON, falling back to keyword scan: {}", e);
            AnalysisOutcome {
                verdict: keyword_verdict(raw),
                details: raw.trim().to_string(),
                risk_score: DEFAULT_RISK_SCORE,
                structured: false,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_structured_response_in_fence() {
        let raw = r#"```json
{
  "calculations": "M = 500000 / 50000 = 10x",
  "logic_verification": "10x is within the 1x-12x low risk band",
  "verdict": "genuine",
  "risk_score": 2,
  "details": "Financially sound request."
}
```"#;
        let outcome = parse_response(raw);
        assert!(outcome.structured);
        assert_eq!(outcome.verdict, DocumentVerdict::Genuine);
        assert_eq!(outcome.risk_score, 2);
        assert!(outcome.details.starts_with("CALCULATIONS: M = 500000 / 50000 = 10x"));
        assert!(outcome.details.contains("\n\nLOGIC CHECK: 10x is within"));
        assert!(outcome.details.ends_with("SUMMARY: Financially sound request."));
    }

    #[test]
    fn test_structured_without_calculations_uses_details() {
        let outcome = parse_response(r#"{"verdict":"suspicious","details":"125x multiplier","risk_score":"9"}"#);
        assert_eq!(outcome.verdict, DocumentVerdict::Suspicious);
        assert_eq!(outcome.details, "125x multiplier");
        assert_eq!(outcome.risk_score, 9);
    }

    #[test]
    fn test_unknown_verdict_is_inconclusive() {
        let outcome = parse_response(r#"{"verdict":"probably fine","details":"?"}"#);
        assert!(outcome.structured);
        assert_eq!(outcome.verdict, DocumentVerdict::Inconclusive);
        assert_eq!(outcome.risk_score, DEFAULT_RISK_SCORE);
    }

    #[test]
    fn test_fallback_prefers_suspicious() {
        let outcome = parse_response("Looks genuine at first, but the payslip is suspicious.");
        assert!(!outcome.structured);
        assert_eq!(outcome.verdict, DocumentVerdict::Suspicious);
    }

    #[test]
    fn test_fallback_genuine() {
        let outcome = parse_response("The ratio is 10x. Verdict: GENUINE.");
        assert_eq!(outcome.verdict, DocumentVerdict::Genuine);
        assert_eq!(outcome.details, "The ratio is 10x. Verdict: GENUINE.");
    }

    #[test]
    fn test_fallback_inconclusive() {
        let outcome = parse_response("I cannot tell from the provided data.");
        assert_eq!(outcome.verdict, DocumentVerdict::Inconclusive);
        assert!(!outcome.structured);
    }
}
