//! In-memory store for development and tests

use super::{ApplicationFilter, ApplicationStore, CatalogStore};
use crate::error::AdvisorError;
use crate::models::{ApplicationRecord, Borrower, DocumentAnalysis, LoanProduct};
use crate::Result;
use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

/// In-memory application and catalog store
pub struct InMemoryStore {
    applications: Arc<RwLock<HashMap<Uuid, ApplicationRecord>>>,
    products: Arc<RwLock<HashMap<Uuid, LoanProduct>>>,
    borrowers: Arc<RwLock<HashMap<Uuid, Borrower>>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            applications: Arc::new(RwLock::new(HashMap::new())),
            products: Arc::new(RwLock::new(HashMap::new())),
            borrowers: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub async fn add_product(&self, product: LoanProduct) {
        self.products.write().await.insert(product.id, product);
    }

    pub async fn add_borrower(&self, borrower: Borrower) {
        self.borrowers.write().await.insert(borrower.id, borrower);
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ApplicationStore for InMemoryStore {
    async fn insert(&self, record: ApplicationRecord) -> Result<ApplicationRecord> {
        let mut applications = self.applications.write().await;
        if applications.contains_key(&record.id) {
            return Err(AdvisorError::Conflict(format!(
                "Application {} already exists",
                record.id
            )));
        }
        applications.insert(record.id, record.clone());
        Ok(record)
    }

    async fn get(&self, id: Uuid) -> Result<Option<ApplicationRecord>> {
        let applications = self.applications.read().await;
        Ok(applications.get(&id).cloned())
    }

    async fn list(&self, filter: &ApplicationFilter) -> Result<Vec<ApplicationRecord>> {
        let applications = self.applications.read().await;

        let mut items: Vec<ApplicationRecord> = applications
            .values()
            .filter(|record| filter.matches(record))
            .cloned()
            .collect();

        items.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));

        Ok(items)
    }

    async fn update_if(
        &self,
        record: &ApplicationRecord,
        expected_revision: u64,
    ) -> Result<Option<ApplicationRecord>> {
        // Compare and swap under a single write lock.
        let mut applications = self.applications.write().await;

        let current = applications
            .get(&record.id)
            .ok_or_else(|| AdvisorError::NotFound(format!("Application {}", record.id)))?;

        if current.revision != expected_revision {
            return Ok(None);
        }

        let mut committed = record.clone();
        committed.revision = expected_revision + 1;
        applications.insert(committed.id, committed.clone());

        Ok(Some(committed))
    }

    async fn put_analysis(
        &self,
        id: Uuid,
        analysis: DocumentAnalysis,
    ) -> Result<Option<ApplicationRecord>> {
        let mut applications = self.applications.write().await;

        let Some(record) = applications.get_mut(&id) else {
            return Ok(None);
        };

        record.document_analysis = analysis;
        record.updated_at = Utc::now();
        record.revision += 1;

        Ok(Some(record.clone()))
    }
}

#[async_trait]
impl CatalogStore for InMemoryStore {
    async fn active_products(&self) -> Result<Vec<LoanProduct>> {
        let products = self.products.read().await;

        let mut active: Vec<LoanProduct> =
            products.values().filter(|p| p.is_active).cloned().collect();
        active.sort_by(|a, b| a.name.en.cmp(&b.name.en));

        Ok(active)
    }

    async fn product(&self, id: Uuid) -> Result<Option<LoanProduct>> {
        let products = self.products.read().await;
        Ok(products.get(&id).cloned())
    }

    async fn borrower(&self, id: Uuid) -> Result<Option<Borrower>> {
        let borrowers = self.borrowers.read().await;
        Ok(borrowers.get(&id).cloned())
    }
}
