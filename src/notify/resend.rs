//! Approval e-mails through the Resend HTTP API

use super::{NotificationEvent, Notifier};
use crate::config::NotifierConfig;
use crate::error::AdvisorError;
use crate::models::{ApplicationRecord, Borrower, LoanProduct};
use crate::Result;
use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;
use tracing::{error, info};

const RESEND_URL: &str = "https://api.resend.com/emails";

pub struct ResendNotifier {
    client: Client,
    api_key: String,
    admin_email: String,
    from: String,
}

impl ResendNotifier {
    pub fn new(api_key: String, admin_email: String, from: String) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(15))
            .build()?;

        Ok(Self {
            client,
            api_key,
            admin_email,
            from,
        })
    }

    /// `None` unless both the API key and the admin address are configured.
    pub fn from_config(config: &NotifierConfig) -> Result<Option<Self>> {
        match (&config.resend_api_key, &config.admin_email) {
            (Some(key), Some(admin)) => {
                Self::new(key.clone(), admin.clone(), config.from.clone()).map(Some)
            }
            _ => Ok(None),
        }
    }
}

#[derive(Debug, Serialize)]
struct EmailRequest<'a> {
    from: &'a str,
    to: &'a str,
    subject: String,
    html: String,
}

fn or_na(value: Option<impl ToString>) -> String {
    value
        .map(|v| v.to_string())
        .unwrap_or_else(|| "N/A".to_string())
}

/// HTML body for an approval notice.
pub(crate) fn approval_html(
    application: &ApplicationRecord,
    borrower: &Borrower,
    product: &LoanProduct,
) -> String {
    format!(
        r#"<h1>Loan Application Approved</h1>
<p>A loan application has been approved after review.</p>
<hr />
<h3>Borrower Details:</h3>
<ul>
  <li><strong>Name:</strong> {name}</li>
  <li><strong>Email:</strong> {email}</li>
  <li><strong>Phone:</strong> {phone}</li>
</ul>
<h3>Loan Details:</h3>
<ul>
  <li><strong>Loan Product:</strong> {product}</li>
  <li><strong>Requested Amount:</strong> ₹{requested}</li>
  <li><strong>Approved Amount:</strong> ₹{approved}</li>
  <li><strong>Requested Tenure:</strong> {tenure} months</li>
  <li><strong>Purpose:</strong> {purpose}</li>
</ul>
<h3>Financial Profile:</h3>
<ul>
  <li><strong>Monthly Income:</strong> ₹{income}</li>
  <li><strong>Credit Score:</strong> {credit}</li>
  <li><strong>Age:</strong> {age}</li>
</ul>
<p>The application status has been updated to <strong>'{status}'</strong>.</p>"#,
        name = borrower.name,
        email = borrower.email,
        phone = borrower.phone.as_deref().unwrap_or("N/A"),
        product = product.name.en,
        requested = application.requested_amount,
        approved = or_na(application.approved_amount),
        tenure = application.requested_tenure,
        purpose = application.purpose.as_deref().unwrap_or("N/A"),
        income = or_na(application.snapshot.monthly_income),
        credit = or_na(application.snapshot.credit_score),
        age = or_na(application.snapshot.age),
        status = application.status,
    )
}

#[async_trait]
impl Notifier for ResendNotifier {
    async fn notify(
        &self,
        event: NotificationEvent,
        application: &ApplicationRecord,
        borrower: &Borrower,
        product: &LoanProduct,
    ) -> Result<()> {
        let (subject, html) = match event {
            NotificationEvent::Approved => (
                format!("Loan Application Approved: {}", product.name.en),
                approval_html(application, borrower, product),
            ),
        };

        let request = EmailRequest {
            from: &self.from,
            to: &self.admin_email,
            subject,
            html,
        };

        let response = self
            .client
            .post(RESEND_URL)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| AdvisorError::UpstreamUnavailable(format!("Resend request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            error!("Resend returned {}: {}", status, body);
            return Err(AdvisorError::UpstreamUnavailable(format!(
                "Resend returned {}",
                status
            )));
        }

        info!(application_id = %application.id, "Approval email sent");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        ApplicationStatus, BorrowerProfile, EligibilityCriteria, LocalizedText, Range,
    };
    use uuid::Uuid;

    #[test]
    fn test_approval_html_mentions_key_fields() {
        let borrower = Borrower {
            id: Uuid::new_v4(),
            name: "Priya".to_string(),
            email: "priya@example.com".to_string(),
            phone: None,
            profile: BorrowerProfile::default(),
        };
        let product = LoanProduct {
            id: Uuid::new_v4(),
            loan_type: "vehicle".to_string(),
            name: LocalizedText::english("Vehicle Loan"),
            description: LocalizedText::english("Two and four wheelers"),
            amount: Range::new(50_000.0, 1_500_000.0),
            interest_rate: Range::new(8.5, 12.0),
            tenure_months: Range::new(12, 84),
            criteria: EligibilityCriteria {
                min_age: 21,
                max_age: 65,
                min_income: 20_000.0,
                min_credit_score: 650,
                accepted_employment: vec![],
                max_existing_loans: 2,
            },
            required_documents: vec![],
            is_active: true,
        };
        let mut application = crate::models::ApplicationRecord::draft(
            borrower.id,
            product.id,
            300_000.0,
            36,
            BorrowerProfile::default(),
        );
        application.status = ApplicationStatus::Approved;
        application.approved_amount = Some(280_000.0);

        let html = approval_html(&application, &borrower, &product);
        assert!(html.contains("Priya"));
        assert!(html.contains("Vehicle Loan"));
        assert!(html.contains("₹280000"));
        assert!(html.contains("'approved'"));
        assert!(html.contains("<strong>Phone:</strong> N/A"));
    }
}
