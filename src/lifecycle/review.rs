//! Review inputs and reviewer identity

use crate::error::AdvisorError;
use crate::models::{ApplicationRecord, ApplicationStatus};
use crate::Result;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Author label used when a reviewer has no display name.
pub const DEFAULT_REVIEWER_LABEL: &str = "Agent";

pub const DEFAULT_REJECTION_REASON: &str = "Application rejected by agent";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Agent,
}

/// Staff member acting on applications.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Actor {
    pub id: Uuid,
    pub name: Option<String>,
    pub role: Role,
}

impl Actor {
    pub fn agent(id: Uuid, name: impl Into<String>) -> Self {
        Self {
            id,
            name: Some(name.into()),
            role: Role::Agent,
        }
    }

    pub fn admin(id: Uuid, name: impl Into<String>) -> Self {
        Self {
            id,
            name: Some(name.into()),
            role: Role::Admin,
        }
    }

    pub fn label(&self) -> &str {
        match self.name.as_deref() {
            Some(name) if !name.trim().is_empty() => name,
            _ => DEFAULT_REVIEWER_LABEL,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ReviewAction {
    Approve,
    Reject,
}

impl FromStr for ReviewAction {
    type Err = AdvisorError;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim().to_lowercase().as_str() {
            "approve" => Ok(ReviewAction::Approve),
            "reject" => Ok(ReviewAction::Reject),
            other => Err(AdvisorError::Validation(format!(
                "Invalid action {:?}. Must be 'approve' or 'reject'",
                other
            ))),
        }
    }
}

impl fmt::Display for ReviewAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReviewAction::Approve => write!(f, "approve"),
            ReviewAction::Reject => write!(f, "reject"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ReviewDecision {
    pub action: ReviewAction,
    pub remarks: Option<String>,
    /// Defaults to the requested amount on approval.
    pub approved_amount: Option<f64>,
    pub approved_tenure: Option<u32>,
    pub interest_rate: Option<f64>,
}

impl ReviewDecision {
    pub fn approve() -> Self {
        Self::new(ReviewAction::Approve)
    }

    pub fn reject() -> Self {
        Self::new(ReviewAction::Reject)
    }

    fn new(action: ReviewAction) -> Self {
        Self {
            action,
            remarks: None,
            approved_amount: None,
            approved_tenure: None,
            interest_rate: None,
        }
    }

    pub fn with_remarks(mut self, remarks: impl Into<String>) -> Self {
        self.remarks = Some(remarks.into());
        self
    }

    pub fn with_terms(mut self, amount: f64, interest_rate: Option<f64>) -> Self {
        self.approved_amount = Some(amount);
        self.interest_rate = interest_rate;
        self
    }

    /// Remark text, if any was supplied.
    pub fn remark_text(&self) -> Option<&str> {
        self.remarks
            .as_deref()
            .map(str::trim)
            .filter(|text| !text.is_empty())
    }

    /// Reject nonsensical terms before anything is loaded.
    pub fn validate(&self) -> Result<()> {
        if let Some(amount) = self.approved_amount {
            if !amount.is_finite() || amount <= 0.0 {
                return Err(AdvisorError::Validation(format!(
                    "Approved amount must be positive, got {}",
                    amount
                )));
            }
        }
        if let Some(rate) = self.interest_rate {
            if !rate.is_finite() || rate < 0.0 {
                return Err(AdvisorError::Validation(format!(
                    "Interest rate must not be negative, got {}",
                    rate
                )));
            }
        }
        if self.approved_tenure == Some(0) {
            return Err(AdvisorError::Validation(
                "Approved tenure must be at least one month".to_string(),
            ));
        }
        Ok(())
    }
}

/// Whether the reviewer takes ownership of the lead.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReviewerPolicy {
    /// When true, approve and reject reassign the lead to the reviewer,
    /// even for leads another agent submitted.
    pub claims_lead: bool,
}

impl Default for ReviewerPolicy {
    fn default() -> Self {
        Self { claims_lead: true }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct DashboardStats {
    pub total_leads: usize,
    pub approved_leads: usize,
    pub pending_leads: usize,
}

impl DashboardStats {
    pub fn from_leads(leads: &[ApplicationRecord]) -> Self {
        Self {
            total_leads: leads.len(),
            approved_leads: leads
                .iter()
                .filter(|l| l.status == ApplicationStatus::Approved)
                .count(),
            pending_leads: leads.iter().filter(|l| l.status.is_pending()).count(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Dashboard {
    pub leads: Vec<ApplicationRecord>,
    pub stats: DashboardStats,
}
