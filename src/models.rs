//! Core data models for the loan advisor

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

//
// ================= Language =================
//

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    #[default]
    En,
    Hi,
    Ta,
}

impl Language {
    pub fn code(&self) -> &'static str {
        match self {
            Language::En => "en",
            Language::Hi => "hi",
            Language::Ta => "ta",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        match code.trim().to_lowercase().as_str() {
            "en" | "english" => Some(Language::En),
            "hi" | "hindi" => Some(Language::Hi),
            "ta" | "tamil" => Some(Language::Ta),
            _ => None,
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Product copy in all supported languages. Empty entries fall back to English.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct LocalizedText {
    pub en: String,
    #[serde(default)]
    pub hi: String,
    #[serde(default)]
    pub ta: String,
}

impl LocalizedText {
    pub fn new(en: impl Into<String>, hi: impl Into<String>, ta: impl Into<String>) -> Self {
        Self {
            en: en.into(),
            hi: hi.into(),
            ta: ta.into(),
        }
    }

    pub fn english(en: impl Into<String>) -> Self {
        Self {
            en: en.into(),
            ..Self::default()
        }
    }

    pub fn get(&self, lang: Language) -> &str {
        let value = match lang {
            Language::En => &self.en,
            Language::Hi => &self.hi,
            Language::Ta => &self.ta,
        };
        if value.trim().is_empty() {
            &self.en
        } else {
            value
        }
    }
}

//
// ================= Loan Product =================
//

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Range<T> {
    pub min: T,
    pub max: T,
}

impl<T: PartialOrd + Copy> Range<T> {
    pub fn new(min: T, max: T) -> Self {
        Self { min, max }
    }

    pub fn contains(&self, value: T) -> bool {
        value >= self.min && value <= self.max
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum EmploymentType {
    Salaried,
    SelfEmployed,
    Unemployed,
    Student,
    Retired,
}

fn default_max_existing_loans() -> u32 {
    2
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EligibilityCriteria {
    pub min_age: u32,
    pub max_age: u32,
    pub min_income: f64,
    pub min_credit_score: u32,
    /// Empty means any employment other than unemployed.
    #[serde(default)]
    pub accepted_employment: Vec<EmploymentType>,
    #[serde(default = "default_max_existing_loans")]
    pub max_existing_loans: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LoanProduct {
    pub id: Uuid,
    pub loan_type: String,
    pub name: LocalizedText,
    pub description: LocalizedText,
    pub amount: Range<f64>,
    pub interest_rate: Range<f64>,
    pub tenure_months: Range<u32>,
    pub criteria: EligibilityCriteria,
    #[serde(default)]
    pub required_documents: Vec<LocalizedText>,
    pub is_active: bool,
}

//
// ================= Borrower =================
//

/// Financial attributes used for scoring. Unknown attributes stay `None`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct BorrowerProfile {
    pub age: Option<u32>,
    pub monthly_income: Option<f64>,
    pub credit_score: Option<u32>,
    pub employment: Option<EmploymentType>,
    pub existing_loans: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Borrower {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub profile: BorrowerProfile,
}

//
// ================= Application =================
//

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum ApplicationStatus {
    Draft,
    Submitted,
    UnderReview,
    Approved,
    Rejected,
    Disbursed,
}

impl ApplicationStatus {
    pub fn label(&self) -> &'static str {
        match self {
            ApplicationStatus::Draft => "draft",
            ApplicationStatus::Submitted => "submitted",
            ApplicationStatus::UnderReview => "under-review",
            ApplicationStatus::Approved => "approved",
            ApplicationStatus::Rejected => "rejected",
            ApplicationStatus::Disbursed => "disbursed",
        }
    }

    pub fn from_label(value: &str) -> Option<Self> {
        match value {
            "draft" => Some(ApplicationStatus::Draft),
            "submitted" => Some(ApplicationStatus::Submitted),
            "under-review" => Some(ApplicationStatus::UnderReview),
            "approved" => Some(ApplicationStatus::Approved),
            "rejected" => Some(ApplicationStatus::Rejected),
            "disbursed" => Some(ApplicationStatus::Disbursed),
            _ => None,
        }
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, ApplicationStatus::Submitted | ApplicationStatus::UnderReview)
    }

    /// Review is over. Only disbursement may still follow an approval.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ApplicationStatus::Approved | ApplicationStatus::Rejected | ApplicationStatus::Disbursed
        )
    }
}

impl fmt::Display for ApplicationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DocumentDescriptor {
    pub document_type: String,
    pub file_name: String,
    pub uploaded_at: DateTime<Utc>,
}

impl DocumentDescriptor {
    pub fn new(document_type: impl Into<String>, file_name: impl Into<String>) -> Self {
        Self {
            document_type: document_type.into(),
            file_name: file_name.into(),
            uploaded_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct EligibilityDetails {
    pub age_eligible: bool,
    pub income_eligible: bool,
    pub credit_score_eligible: bool,
    pub employment_eligible: bool,
    pub existing_loans_eligible: bool,
}

impl EligibilityDetails {
    pub fn passed_count(&self) -> u8 {
        [
            self.age_eligible,
            self.income_eligible,
            self.credit_score_eligible,
            self.employment_eligible,
            self.existing_loans_eligible,
        ]
        .iter()
        .filter(|passed| **passed)
        .count() as u8
    }
}

/// Score and breakdown always travel together.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct Eligibility {
    pub score: u8,
    pub details: EligibilityDetails,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DocumentVerdict {
    Genuine,
    Suspicious,
    Inconclusive,
}

impl DocumentVerdict {
    pub fn label(&self) -> &'static str {
        match self {
            DocumentVerdict::Genuine => "genuine",
            DocumentVerdict::Suspicious => "suspicious",
            DocumentVerdict::Inconclusive => "inconclusive",
        }
    }

    pub fn from_label(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "genuine" => Some(DocumentVerdict::Genuine),
            "suspicious" => Some(DocumentVerdict::Suspicious),
            "inconclusive" => Some(DocumentVerdict::Inconclusive),
            _ => None,
        }
    }
}

impl fmt::Display for DocumentVerdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// AI document check. Only constructible as pending or completed, and
/// deserialization rejects anything in between.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", try_from = "StoredAnalysis")]
pub struct DocumentAnalysis {
    is_analyzed: bool,
    analysis_result: Option<DocumentVerdict>,
    analysis_details: Option<String>,
    analyzed_at: Option<DateTime<Utc>>,
}

impl DocumentAnalysis {
    pub fn pending() -> Self {
        Self {
            is_analyzed: false,
            analysis_result: None,
            analysis_details: None,
            analyzed_at: None,
        }
    }

    pub fn completed(verdict: DocumentVerdict, details: String, analyzed_at: DateTime<Utc>) -> Self {
        Self {
            is_analyzed: true,
            analysis_result: Some(verdict),
            analysis_details: Some(details),
            analyzed_at: Some(analyzed_at),
        }
    }

    pub fn is_analyzed(&self) -> bool {
        self.is_analyzed
    }

    pub fn verdict(&self) -> Option<DocumentVerdict> {
        self.analysis_result
    }

    pub fn details(&self) -> Option<&str> {
        self.analysis_details.as_deref()
    }

    pub fn analyzed_at(&self) -> Option<DateTime<Utc>> {
        self.analyzed_at
    }
}

/// Wire shape of `DocumentAnalysis`, checked before it becomes one.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredAnalysis {
    #[serde(default)]
    is_analyzed: bool,
    #[serde(default)]
    analysis_result: Option<DocumentVerdict>,
    #[serde(default)]
    analysis_details: Option<String>,
    #[serde(default)]
    analyzed_at: Option<DateTime<Utc>>,
}

impl TryFrom<StoredAnalysis> for DocumentAnalysis {
    type Error = String;

    fn try_from(stored: StoredAnalysis) -> std::result::Result<Self, Self::Error> {
        match (stored.is_analyzed, stored.analysis_result, stored.analyzed_at) {
            (true, Some(verdict), Some(at)) => Ok(Self::completed(
                verdict,
                stored.analysis_details.unwrap_or_default(),
                at,
            )),
            (false, None, None) if stored.analysis_details.is_none() => Ok(Self::pending()),
            (is_analyzed, verdict, at) => Err(format!(
                "inconsistent document analysis: isAnalyzed={}, verdict set={}, analyzedAt set={}",
                is_analyzed,
                verdict.is_some(),
                at.is_some()
            )),
        }
    }
}

impl Default for DocumentAnalysis {
    fn default() -> Self {
        Self::pending()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Remark {
    pub message: String,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
}

/// Append-only remark trail. Entries can be read but never edited or removed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(transparent)]
pub struct RemarkLog(Vec<Remark>);

impl RemarkLog {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn push(&mut self, message: impl Into<String>, created_by: impl Into<String>) {
        self.0.push(Remark {
            message: message.into(),
            created_by: created_by.into(),
            created_at: Utc::now(),
        });
    }

    pub fn iter(&self) -> impl Iterator<Item = &Remark> {
        self.0.iter()
    }

    pub fn last(&self) -> Option<&Remark> {
        self.0.last()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationRecord {
    pub id: Uuid,
    pub borrower_id: Uuid,
    pub product_id: Uuid,
    pub agent_id: Option<Uuid>,
    #[serde(default)]
    pub is_agent_submission: bool,
    pub requested_amount: f64,
    pub requested_tenure: u32,
    pub purpose: Option<String>,
    /// Borrower attributes captured at submission; scoring never re-reads the live profile.
    pub snapshot: BorrowerProfile,
    #[serde(default)]
    pub has_collateral: bool,
    pub collateral_details: Option<String>,
    pub status: ApplicationStatus,
    #[serde(default)]
    pub documents: Vec<DocumentDescriptor>,
    pub eligibility: Option<Eligibility>,
    #[serde(default)]
    pub document_analysis: DocumentAnalysis,
    #[serde(default)]
    pub remarks: RemarkLog,
    pub reviewed_by: Option<Uuid>,
    pub reviewed_at: Option<DateTime<Utc>>,
    pub rejection_reason: Option<String>,
    pub approved_amount: Option<f64>,
    pub approved_tenure: Option<u32>,
    pub interest_rate: Option<f64>,
    pub disbursement_date: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Bumped by the store on every committed write.
    #[serde(default)]
    pub revision: u64,
}

impl ApplicationRecord {
    /// New draft application for a borrower and product.
    pub fn draft(
        borrower_id: Uuid,
        product_id: Uuid,
        requested_amount: f64,
        requested_tenure: u32,
        snapshot: BorrowerProfile,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            borrower_id,
            product_id,
            agent_id: None,
            is_agent_submission: false,
            requested_amount,
            requested_tenure,
            purpose: None,
            snapshot,
            has_collateral: false,
            collateral_details: None,
            status: ApplicationStatus::Draft,
            documents: Vec::new(),
            eligibility: None,
            document_analysis: DocumentAnalysis::pending(),
            remarks: RemarkLog::new(),
            reviewed_by: None,
            reviewed_at: None,
            rejection_reason: None,
            approved_amount: None,
            approved_tenure: None,
            interest_rate: None,
            disbursement_date: None,
            created_at: now,
            updated_at: now,
            revision: 0,
        }
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}
