//! Application status transition table

use crate::error::AdvisorError;
use crate::models::ApplicationStatus;
use crate::Result;
use serde::{Deserialize, Serialize};
use std::fmt;

use ApplicationStatus::*;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum Transition {
    Submit,
    BeginReview,
    Approve,
    Reject,
    Disburse,
}

impl Transition {
    pub fn name(&self) -> &'static str {
        match self {
            Transition::Submit => "submit",
            Transition::BeginReview => "begin-review",
            Transition::Approve => "approve",
            Transition::Reject => "reject",
            Transition::Disburse => "disburse",
        }
    }

    pub fn allowed_from(&self) -> &'static [ApplicationStatus] {
        match self {
            Transition::Submit => &[Draft],
            Transition::BeginReview => &[Submitted],
            Transition::Approve | Transition::Reject => &[Submitted, UnderReview],
            Transition::Disburse => &[Approved],
        }
    }

    pub fn target(&self) -> ApplicationStatus {
        match self {
            Transition::Submit => Submitted,
            Transition::BeginReview => UnderReview,
            Transition::Approve => Approved,
            Transition::Reject => Rejected,
            Transition::Disburse => Disbursed,
        }
    }
}

impl fmt::Display for Transition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Fails with a precondition error when `transition` cannot leave `status`.
pub fn check(status: ApplicationStatus, transition: Transition) -> Result<()> {
    if transition.allowed_from().contains(&status) {
        return Ok(());
    }

    let message = match transition {
        Transition::Approve | Transition::Reject if status.is_terminal() => {
            format!("Application already {}", status)
        }
        _ => format!("Cannot {} an application that is {}", transition, status),
    };

    Err(AdvisorError::Precondition(message))
}

/// Side-channel updates (remarks, documents, re-scoring) need a live application.
pub fn check_open(status: ApplicationStatus, action: &str) -> Result<()> {
    if status.is_terminal() {
        return Err(AdvisorError::Precondition(format!(
            "Cannot {} an application that is {}",
            action, status
        )));
    }
    Ok(())
}
