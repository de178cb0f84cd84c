//! Persistence layer
//!
//! Responsible for storing and loading application records and the catalog.
//! Writes that depend on what was read go through `update_if`, an atomic
//! compare-and-swap on the record revision.

use crate::models::{
    ApplicationRecord, ApplicationStatus, Borrower, DocumentAnalysis, LoanProduct,
};
use crate::Result;
use async_trait::async_trait;
use uuid::Uuid;

pub mod memory;
pub mod postgres;
pub mod seed;

pub use memory::InMemoryStore;
pub use postgres::PostgresApplicationStore;

/// Which agent assignments a listing includes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AgentScope {
    #[default]
    Any,
    /// Leads owned by the agent.
    Assigned(Uuid),
    /// Leads owned by the agent plus leads nobody owns yet.
    AssignedOrUnassigned(Uuid),
}

#[derive(Debug, Clone, Default)]
pub struct ApplicationFilter {
    pub borrower_id: Option<Uuid>,
    pub agent: AgentScope,
    /// Empty matches every status.
    pub statuses: Vec<ApplicationStatus>,
}

impl ApplicationFilter {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn for_borrower(borrower_id: Uuid) -> Self {
        Self {
            borrower_id: Some(borrower_id),
            ..Self::default()
        }
    }

    pub fn with_statuses(mut self, statuses: Vec<ApplicationStatus>) -> Self {
        self.statuses = statuses;
        self
    }

    pub fn matches(&self, record: &ApplicationRecord) -> bool {
        if let Some(borrower_id) = self.borrower_id {
            if record.borrower_id != borrower_id {
                return false;
            }
        }

        let agent_ok = match self.agent {
            AgentScope::Any => true,
            AgentScope::Assigned(agent) => record.agent_id == Some(agent),
            AgentScope::AssignedOrUnassigned(agent) => {
                record.agent_id.is_none() || record.agent_id == Some(agent)
            }
        };

        agent_ok && (self.statuses.is_empty() || self.statuses.contains(&record.status))
    }
}

/// Trait for application persistence
#[async_trait]
pub trait ApplicationStore: Send + Sync {
    /// Persist a new record. Fails if the id already exists.
    async fn insert(&self, record: ApplicationRecord) -> Result<ApplicationRecord>;

    async fn get(&self, id: Uuid) -> Result<Option<ApplicationRecord>>;

    /// Matching records ordered by `created_at` ascending.
    async fn list(&self, filter: &ApplicationFilter) -> Result<Vec<ApplicationRecord>>;

    /// Replace the stored record only if its revision still equals
    /// `expected_revision`. Returns the committed record, or `None` when
    /// another writer got there first.
    async fn update_if(
        &self,
        record: &ApplicationRecord,
        expected_revision: u64,
    ) -> Result<Option<ApplicationRecord>>;

    /// Overwrite the document analysis wholesale. Last writer wins.
    async fn put_analysis(
        &self,
        id: Uuid,
        analysis: DocumentAnalysis,
    ) -> Result<Option<ApplicationRecord>>;
}

/// Trait for read access to products and borrowers
#[async_trait]
pub trait CatalogStore: Send + Sync {
    async fn active_products(&self) -> Result<Vec<LoanProduct>>;

    async fn product(&self, id: Uuid) -> Result<Option<LoanProduct>>;

    async fn borrower(&self, id: Uuid) -> Result<Option<Borrower>>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::BorrowerProfile;

    fn record(agent_id: Option<Uuid>, status: ApplicationStatus) -> ApplicationRecord {
        let mut record = ApplicationRecord::draft(
            Uuid::new_v4(),
            Uuid::new_v4(),
            10_000.0,
            6,
            BorrowerProfile::default(),
        );
        record.agent_id = agent_id;
        record.status = status;
        record
    }

    #[test]
    fn test_agent_scope() {
        let agent = Uuid::new_v4();
        let mine = record(Some(agent), ApplicationStatus::Submitted);
        let theirs = record(Some(Uuid::new_v4()), ApplicationStatus::Submitted);
        let unassigned = record(None, ApplicationStatus::Submitted);

        let filter = ApplicationFilter {
            agent: AgentScope::AssignedOrUnassigned(agent),
            ..ApplicationFilter::default()
        };
        assert!(filter.matches(&mine));
        assert!(!filter.matches(&theirs));
        assert!(filter.matches(&unassigned));

        let strict = ApplicationFilter {
            agent: AgentScope::Assigned(agent),
            ..ApplicationFilter::default()
        };
        assert!(!strict.matches(&unassigned));
    }

    #[test]
    fn test_status_filter() {
        let filter = ApplicationFilter::all()
            .with_statuses(vec![ApplicationStatus::Submitted, ApplicationStatus::UnderReview]);
        assert!(filter.matches(&record(None, ApplicationStatus::UnderReview)));
        assert!(!filter.matches(&record(None, ApplicationStatus::Approved)));
    }
}
