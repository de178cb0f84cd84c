//! Postgres-backed application store
//!
//! Each record is kept as a JSON document next to the columns the store
//! filters and guards on. Conditional updates compare the `revision` column
//! inside the `UPDATE` statement itself.

use super::{ApplicationFilter, ApplicationStore};
use crate::error::AdvisorError;
use crate::models::{ApplicationRecord, DocumentAnalysis};
use crate::Result;
use async_trait::async_trait;
use chrono::Utc;
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Row};
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::info;
use uuid::Uuid;

pub struct PostgresApplicationStore {
    pool: PgPool,
    schema_ready: Arc<OnceCell<()>>,
}

impl PostgresApplicationStore {
    /// Lazily connecting store; the schema is created on first use.
    pub fn connect_lazy(url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect_lazy(url)
            .map_err(|e| AdvisorError::Database(format!("Failed to create pool: {}", e)))?;

        info!("Application store backend: postgres");

        Ok(Self {
            pool,
            schema_ready: Arc::new(OnceCell::new()),
        })
    }

    async fn ensure_schema(&self) -> Result<()> {
        self.schema_ready
            .get_or_try_init(|| async {
                sqlx::query(
                    r#"
                    CREATE TABLE IF NOT EXISTS loan_applications (
                      id UUID PRIMARY KEY,
                      borrower_id UUID NOT NULL,
                      agent_id UUID,
                      status TEXT NOT NULL,
                      revision BIGINT NOT NULL,
                      created_at TIMESTAMPTZ NOT NULL,
                      document TEXT NOT NULL
                    );
                    "#,
                )
                .execute(&self.pool)
                .await?;

                sqlx::query(
                    r#"
                    CREATE INDEX IF NOT EXISTS idx_loan_applications_borrower_time
                    ON loan_applications (borrower_id, created_at);
                    "#,
                )
                .execute(&self.pool)
                .await?;

                Ok::<(), sqlx::Error>(())
            })
            .await
            .map_err(|e| {
                AdvisorError::Database(format!(
                    "Failed to initialize loan application schema: {}",
                    e
                ))
            })?;

        Ok(())
    }

    fn decode(document: &str) -> Result<ApplicationRecord> {
        Ok(serde_json::from_str(document)?)
    }

    fn encode(record: &ApplicationRecord) -> Result<String> {
        Ok(serde_json::to_string(record)?)
    }

    /// The record as it will be stored if the revision guard holds.
    fn next_revision(record: &ApplicationRecord, expected_revision: u64) -> ApplicationRecord {
        let mut committed = record.clone();
        committed.revision = expected_revision + 1;
        committed
    }
}

#[async_trait]
impl ApplicationStore for PostgresApplicationStore {
    async fn insert(&self, record: ApplicationRecord) -> Result<ApplicationRecord> {
        self.ensure_schema().await?;

        let document = Self::encode(&record)?;

        let result = sqlx::query(
            r#"
            INSERT INTO loan_applications
              (id, borrower_id, agent_id, status, revision, created_at, document)
            VALUES
              ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (id) DO NOTHING
            "#,
        )
        .bind(record.id)
        .bind(record.borrower_id)
        .bind(record.agent_id)
        .bind(record.status.label())
        .bind(record.revision as i64)
        .bind(record.created_at)
        .bind(&document)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AdvisorError::Conflict(format!(
                "Application {} already exists",
                record.id
            )));
        }

        Ok(record)
    }

    async fn get(&self, id: Uuid) -> Result<Option<ApplicationRecord>> {
        self.ensure_schema().await?;

        let row = sqlx::query("SELECT document FROM loan_applications WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => {
                let document: String = row.try_get("document")?;
                Self::decode(&document).map(Some)
            }
            None => Ok(None),
        }
    }

    async fn list(&self, filter: &ApplicationFilter) -> Result<Vec<ApplicationRecord>> {
        self.ensure_schema().await?;

        let rows = sqlx::query(
            r#"
            SELECT document
            FROM loan_applications
            WHERE ($1::uuid IS NULL OR borrower_id = $1)
            ORDER BY created_at ASC, id ASC
            "#,
        )
        .bind(filter.borrower_id)
        .fetch_all(&self.pool)
        .await?;

        let mut records = Vec::with_capacity(rows.len());
        for row in rows {
            let document: String = row.try_get("document")?;
            let record = Self::decode(&document)?;
            if filter.matches(&record) {
                records.push(record);
            }
        }

        Ok(records)
    }

    async fn update_if(
        &self,
        record: &ApplicationRecord,
        expected_revision: u64,
    ) -> Result<Option<ApplicationRecord>> {
        self.ensure_schema().await?;

        let committed = Self::next_revision(record, expected_revision);
        let document = Self::encode(&committed)?;

        let result = sqlx::query(
            r#"
            UPDATE loan_applications
            SET status = $2, agent_id = $3, revision = $4, document = $5
            WHERE id = $1 AND revision = $6
            "#,
        )
        .bind(committed.id)
        .bind(committed.status.label())
        .bind(committed.agent_id)
        .bind(committed.revision as i64)
        .bind(&document)
        .bind(expected_revision as i64)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 1 {
            return Ok(Some(committed));
        }

        // Distinguish a lost race from a missing row.
        match self.get(record.id).await? {
            Some(_) => Ok(None),
            None => Err(AdvisorError::NotFound(format!("Application {}", record.id))),
        }
    }

    async fn put_analysis(
        &self,
        id: Uuid,
        analysis: DocumentAnalysis,
    ) -> Result<Option<ApplicationRecord>> {
        self.ensure_schema().await?;

        let mut tx = self.pool.begin().await?;

        let row = sqlx::query("SELECT document FROM loan_applications WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let document: String = row.try_get("document")?;
        let mut record = Self::decode(&document)?;
        record.document_analysis = analysis;
        record.updated_at = Utc::now();
        record.revision += 1;

        sqlx::query("UPDATE loan_applications SET revision = $2, document = $3 WHERE id = $1")
            .bind(id)
            .bind(record.revision as i64)
            .bind(Self::encode(&record)?)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        Ok(Some(record))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{BorrowerProfile, DocumentDescriptor, DocumentVerdict};

    fn record() -> ApplicationRecord {
        let mut record = ApplicationRecord::draft(
            Uuid::new_v4(),
            Uuid::new_v4(),
            250_000.0,
            24,
            BorrowerProfile::default(),
        );
        record.revision = 3;
        record.remarks.push("Called borrower", "Kavya");
        record
            .documents
            .push(DocumentDescriptor::new("Income Proof", "payslip.pdf"));
        record.document_analysis = DocumentAnalysis::completed(
            DocumentVerdict::Genuine,
            "Income matches".to_string(),
            Utc::now(),
        );
        record
    }

    #[test]
    fn test_document_round_trip() {
        let record = record();
        let document = PostgresApplicationStore::encode(&record).unwrap();
        let decoded = PostgresApplicationStore::decode(&document).unwrap();
        assert_eq!(decoded, record);
    }

    #[test]
    fn test_decode_rejects_broken_documents() {
        let err = PostgresApplicationStore::decode("{\"id\": 1}").unwrap_err();
        assert!(matches!(err, AdvisorError::Serialization(_)));

        let mut document: serde_json::Value =
            serde_json::from_str(&PostgresApplicationStore::encode(&record()).unwrap()).unwrap();
        document["documentAnalysis"]["analysisResult"] = serde_json::Value::Null;
        assert!(PostgresApplicationStore::decode(&document.to_string()).is_err());
    }

    #[test]
    fn test_next_revision_follows_expected() {
        let record = record();
        let committed = PostgresApplicationStore::next_revision(&record, record.revision);
        assert_eq!(committed.revision, 4);
        assert_eq!(committed.remarks, record.remarks);
    }

    #[tokio::test]
    async fn test_bad_url_is_database_error() {
        let err = PostgresApplicationStore::connect_lazy("not a url").err().unwrap();
        assert!(matches!(err, AdvisorError::Database(_)));
    }
}
