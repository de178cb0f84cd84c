//! Outbound notifications
//!
//! Best-effort only. Callers dispatch after the transition is committed and
//! never let a notifier failure reach the API caller.

use crate::models::{ApplicationRecord, Borrower, LoanProduct};
use crate::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::info;

pub mod resend;
pub use resend::ResendNotifier;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum NotificationEvent {
    Approved,
}

impl fmt::Display for NotificationEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NotificationEvent::Approved => write!(f, "approved"),
        }
    }
}

/// Trait for notification delivery
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(
        &self,
        event: NotificationEvent,
        application: &ApplicationRecord,
        borrower: &Borrower,
        product: &LoanProduct,
    ) -> Result<()>;
}

/// Notifier that only writes a log line.
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(
        &self,
        event: NotificationEvent,
        application: &ApplicationRecord,
        borrower: &Borrower,
        product: &LoanProduct,
    ) -> Result<()> {
        info!(
            event = %event,
            application_id = %application.id,
            borrower = %borrower.name,
            product = %product.name.en,
            "Notification recorded"
        );
        Ok(())
    }
}
