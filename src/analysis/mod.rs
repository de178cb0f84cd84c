//! Document analysis coordinator
//!
//! Builds a loan-to-income underwriting prompt, asks the reasoner for a JSON
//! verdict and writes the outcome onto the application.

use crate::error::AdvisorError;
use crate::models::{ApplicationRecord, DocumentAnalysis, DocumentVerdict};
use crate::reasoner::{Reasoner, ReasonerRequest};
use crate::store::{ApplicationStore, CatalogStore};
use crate::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

pub mod verdict;
pub use verdict::{parse_response, AnalysisOutcome};

const SYSTEM_INSTRUCTION: &str = "You are a financial logic AI. Output ONLY JSON. No thinking blocks, no markdown. Mathematical consistency is your #1 priority.";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "kebab-case")]
pub enum RiskBand {
    Low,
    Moderate,
    HighNormal,
    Extreme,
}

impl RiskBand {
    /// Band for a loan-to-monthly-income multiplier.
    pub fn classify(ratio: f64) -> Self {
        if ratio <= 12.0 {
            RiskBand::Low
        } else if ratio <= 48.0 {
            RiskBand::Moderate
        } else if ratio <= 60.0 {
            RiskBand::HighNormal
        } else {
            RiskBand::Extreme
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            RiskBand::Low => "Low Risk",
            RiskBand::Moderate => "Moderate Risk",
            RiskBand::HighNormal => "High Normal",
            RiskBand::Extreme => "Extreme/Suspicious",
        }
    }
}

impl fmt::Display for RiskBand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// Principal divided by monthly income; `None` when income is missing or not positive.
pub fn loan_to_income_ratio(principal: f64, monthly_income: Option<f64>) -> Option<f64> {
    match monthly_income {
        Some(income) if income > 0.0 && income.is_finite() => Some(principal / income),
        _ => None,
    }
}

/// Band for the record's snapshot. An undefined ratio counts as extreme.
pub fn risk_band_for(record: &ApplicationRecord) -> (Option<f64>, RiskBand) {
    let ratio = loan_to_income_ratio(record.requested_amount, record.snapshot.monthly_income);
    let band = ratio.map(RiskBand::classify).unwrap_or(RiskBand::Extreme);
    (ratio, band)
}

pub fn build_prompt(
    record: &ApplicationRecord,
    borrower_name: Option<&str>,
    product_name: Option<&str>,
) -> String {
    let doc_summary = record
        .documents
        .iter()
        .map(|d| {
            format!(
                "- Type: {}, File: {}, Uploaded: {}",
                d.document_type,
                d.file_name,
                d.uploaded_at.to_rfc3339()
            )
        })
        .collect::<Vec<_>>()
        .join("\n");

    let (ratio, band) = risk_band_for(record);
    let ratio_line = match ratio {
        Some(ratio) => format!("M = L / I = {:.2}x (pre-computed band: {})", ratio, band),
        None => format!("M = L / I is undefined: no positive monthly income (band: {})", band),
    };

    format!(
        r#"You are a Senior Loan Underwriter. Perform a rigorous, LOGICALLY CONSISTENT financial analysis.

APPLICANT DATA:
- Name: {name}
- Monthly Income (I): ₹{income}
- Credit Score: {credit}
- Requested Loan (L): ₹{amount}
- Loan Product: {product}
- Loan Purpose: {purpose}
- Documents:
{docs}

FINANCIAL RATIO:
- {ratio_line}

BANKING INDUSTRY STANDARDS (Multipliers):
- Low Risk: L/I is 1x to 12x (Repayable in 1 year)
- Moderate Risk: L/I is 13x to 48x
- High Normal: L/I is 49x to 60x (Typical bank limit)
- Extreme/Suspicious: L/I > 60x (e.g., ₹500000 loan on ₹4000 income is 125x)

LOGIC CHECK RULES:
1. CONSISTENCY: A higher income applicant MUST have a lower or equal risk score compared to a lower income applicant for the same loan amount.
2. VERDICT LOGIC: If income is ₹50000 and loan is ₹500000, that is only 10x multiplier. This is mathematically VERY SAFE and must be 'genuine'.
3. MULTIPLIER MATH: Calculate M = L / I. If M <= 60, the financial ratio is standard.

OUTPUT (JSON ONLY):
{{
  "calculations": "Explain L/I multiplier math...",
  "logic_verification": "Compare against banking standards...",
  "verdict": "genuine" | "suspicious" | "inconclusive",
  "risk_score": 1-10,
  "details": "Professional explanation for the human agent"
}}"#,
        name = borrower_name.unwrap_or("N/A"),
        income = record.snapshot.monthly_income.unwrap_or(0.0),
        credit = record.snapshot.credit_score.unwrap_or(0),
        amount = record.requested_amount,
        product = product_name.unwrap_or("N/A"),
        purpose = record.purpose.as_deref().unwrap_or("N/A"),
        docs = doc_summary,
        ratio_line = ratio_line,
    )
}

/// Result handed back to the reviewing agent.
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisReport {
    pub application_id: Uuid,
    pub verdict: DocumentVerdict,
    pub details: String,
    pub risk_score: u8,
    pub risk_band: RiskBand,
    pub structured: bool,
    pub analyzed_at: DateTime<Utc>,
}

pub struct DocumentAnalysisCoordinator {
    reasoner: Arc<dyn Reasoner>,
    applications: Arc<dyn ApplicationStore>,
    catalog: Arc<dyn CatalogStore>,
}

impl DocumentAnalysisCoordinator {
    pub fn new(
        reasoner: Arc<dyn Reasoner>,
        applications: Arc<dyn ApplicationStore>,
        catalog: Arc<dyn CatalogStore>,
    ) -> Self {
        Self {
            reasoner,
            applications,
            catalog,
        }
    }

    /// Run the AI document check and overwrite the record's analysis.
    pub async fn analyze(&self, application_id: Uuid) -> Result<AnalysisReport> {
        let record = self
            .applications
            .get(application_id)
            .await?
            .ok_or_else(|| AdvisorError::NotFound(format!("Application {}", application_id)))?;

        if record.documents.is_empty() {
            return Err(AdvisorError::Precondition(
                "No documents uploaded for this application".to_string(),
            ));
        }

        let borrower = self.catalog.borrower(record.borrower_id).await?;
        let product = self.catalog.product(record.product_id).await?;

        let prompt = build_prompt(
            &record,
            borrower.as_ref().map(|b| b.name.as_str()),
            product.as_ref().map(|p| p.name.en.as_str()),
        );
        let request = ReasonerRequest::new(SYSTEM_INSTRUCTION, prompt).with_temperature(0.0);

        info!(
            application_id = %application_id,
            documents = record.documents.len(),
            "Requesting document analysis"
        );

        let raw = self.reasoner.complete(&request).await.map_err(|e| {
            warn!(application_id = %application_id, "Document analysis upstream failure: {}", e);
            match e {
                AdvisorError::UpstreamUnavailable(_) => e,
                other => AdvisorError::UpstreamUnavailable(other.to_string()),
            }
        })?;

        let outcome = parse_response(&raw);
        let analyzed_at = Utc::now();
        let analysis =
            DocumentAnalysis::completed(outcome.verdict, outcome.details.clone(), analyzed_at);

        self.applications
            .put_analysis(application_id, analysis)
            .await?
            .ok_or_else(|| AdvisorError::NotFound(format!("Application {}", application_id)))?;

        let (_, risk_band) = risk_band_for(&record);

        info!(
            application_id = %application_id,
            verdict = %outcome.verdict,
            structured = outcome.structured,
            "Document analysis stored"
        );

        Ok(AnalysisReport {
            application_id,
            verdict: outcome.verdict,
            details: outcome.details,
            risk_score: outcome.risk_score,
            risk_band,
            structured: outcome.structured,
            analyzed_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{BorrowerProfile, DocumentDescriptor};
    use crate::reasoner::ScriptedReasoner;
    use crate::store::InMemoryStore;

    fn record(amount: f64, income: Option<f64>) -> ApplicationRecord {
        let mut record = ApplicationRecord::draft(
            Uuid::new_v4(),
            Uuid::new_v4(),
            amount,
            24,
            BorrowerProfile {
                monthly_income: income,
                credit_score: Some(700),
                ..BorrowerProfile::default()
            },
        );
        record.documents.push(DocumentDescriptor::new("Identity Proof", "aadhaar.pdf"));
        record
    }

    #[test]
    fn test_band_boundaries() {
        assert_eq!(RiskBand::classify(1.0), RiskBand::Low);
        assert_eq!(RiskBand::classify(12.0), RiskBand::Low);
        assert_eq!(RiskBand::classify(12.5), RiskBand::Moderate);
        assert_eq!(RiskBand::classify(48.0), RiskBand::Moderate);
        assert_eq!(RiskBand::classify(49.0), RiskBand::HighNormal);
        assert_eq!(RiskBand::classify(60.0), RiskBand::HighNormal);
        assert_eq!(RiskBand::classify(60.01), RiskBand::Extreme);
    }

    #[test]
    fn test_ten_times_income_is_low_risk() {
        let record = record(500_000.0, Some(50_000.0));
        let (ratio, band) = risk_band_for(&record);
        assert_eq!(ratio, Some(10.0));
        assert_eq!(band, RiskBand::Low);

        let prompt = build_prompt(&record, Some("Arun"), Some("Personal Loan"));
        assert!(prompt.contains("10.00x (pre-computed band: Low Risk)"));
        assert!(prompt.contains("aadhaar.pdf"));
        assert!(prompt.contains("\"verdict\": \"genuine\" | \"suspicious\" | \"inconclusive\""));
    }

    #[test]
    fn test_one_twenty_five_times_income_is_extreme() {
        let (ratio, band) = risk_band_for(&record(500_000.0, Some(4_000.0)));
        assert_eq!(ratio, Some(125.0));
        assert_eq!(band, RiskBand::Extreme);
    }

    #[test]
    fn test_missing_income_is_extreme() {
        let record = record(500_000.0, None);
        assert_eq!(risk_band_for(&record), (None, RiskBand::Extreme));
        assert!(build_prompt(&record, None, None).contains("undefined"));
    }

    fn coordinator(
        reasoner: Arc<ScriptedReasoner>,
        store: Arc<InMemoryStore>,
    ) -> DocumentAnalysisCoordinator {
        DocumentAnalysisCoordinator::new(reasoner, store.clone(), store)
    }

    #[tokio::test]
    async fn test_analyze_stores_fallback_verdict() {
        let store = Arc::new(InMemoryStore::new());
        let saved = store.insert(record(500_000.0, Some(50_000.0))).await.unwrap();
        let reasoner = Arc::new(ScriptedReasoner::replying(
            "The multiplier is 10x which looks genuine.",
        ));

        let report = coordinator(reasoner.clone(), store.clone())
            .analyze(saved.id)
            .await
            .unwrap();
        assert_eq!(report.verdict, DocumentVerdict::Genuine);
        assert!(!report.structured);

        let stored = store.get(saved.id).await.unwrap().unwrap();
        assert!(stored.document_analysis.is_analyzed());
        assert_eq!(stored.document_analysis.verdict(), Some(DocumentVerdict::Genuine));
        assert!(stored.document_analysis.analyzed_at().is_some());

        let requests = reasoner.requests().await;
        assert_eq!(requests[0].temperature, 0.0);
    }

    #[tokio::test]
    async fn test_analyze_without_documents_is_precondition() {
        let store = Arc::new(InMemoryStore::new());
        let mut empty = record(500_000.0, Some(50_000.0));
        empty.documents.clear();
        let saved = store.insert(empty).await.unwrap();
        let reasoner = Arc::new(ScriptedReasoner::replying("genuine"));

        let err = coordinator(reasoner.clone(), store.clone())
            .analyze(saved.id)
            .await
            .unwrap_err();
        assert!(err.is_precondition());
        assert!(reasoner.requests().await.is_empty());

        let stored = store.get(saved.id).await.unwrap().unwrap();
        assert_eq!(stored, saved);
    }

    #[tokio::test]
    async fn test_upstream_failure_is_surfaced() {
        let store = Arc::new(InMemoryStore::new());
        let saved = store.insert(record(500_000.0, Some(50_000.0))).await.unwrap();
        let reasoner = Arc::new(ScriptedReasoner::failing("503 from provider"));

        let err = coordinator(reasoner, store.clone()).analyze(saved.id).await.unwrap_err();
        assert!(err.is_upstream());

        let stored = store.get(saved.id).await.unwrap().unwrap();
        assert!(!stored.document_analysis.is_analyzed());
    }

    #[tokio::test]
    async fn test_rerun_overwrites_previous_verdict() {
        let store = Arc::new(InMemoryStore::new());
        let saved = store.insert(record(500_000.0, Some(4_000.0))).await.unwrap();
        let reasoner = Arc::new(ScriptedReasoner::new(vec![
            Ok("genuine".to_string()),
            Ok(r#"{"verdict":"suspicious","details":"125x"}"#.to_string()),
        ]));
        let coordinator = coordinator(reasoner, store.clone());

        coordinator.analyze(saved.id).await.unwrap();
        let second = coordinator.analyze(saved.id).await.unwrap();
        assert_eq!(second.verdict, DocumentVerdict::Suspicious);

        let stored = store.get(saved.id).await.unwrap().unwrap();
        assert_eq!(stored.document_analysis.verdict(), Some(DocumentVerdict::Suspicious));
        assert_eq!(stored.document_analysis.details(), Some("125x"));
    }
}
