//! Decision audit trail
//!
//! Every committed lifecycle transition is recorded with a fingerprint of
//! the resulting application record.

use crate::models::{ApplicationRecord, ApplicationStatus};
use crate::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::io::Write;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AuditEntry {
    pub entry_id: Uuid,
    pub application_id: Uuid,
    pub action: String,
    /// `None` for the entry that created the record.
    pub from: Option<ApplicationStatus>,
    pub to: ApplicationStatus,
    pub actor: Option<Uuid>,
    pub fingerprint: String,
    pub recorded_at: DateTime<Utc>,
}

impl AuditEntry {
    pub fn new(
        action: impl Into<String>,
        from: Option<ApplicationStatus>,
        record: &ApplicationRecord,
        actor: Option<Uuid>,
    ) -> Self {
        Self {
            entry_id: Uuid::new_v4(),
            application_id: record.id,
            action: action.into(),
            from,
            to: record.status,
            actor,
            fingerprint: fingerprint(record),
            recorded_at: Utc::now(),
        }
    }
}

/// Audit trail storage
pub struct AuditLog {
    entries: Arc<RwLock<HashMap<Uuid, Vec<AuditEntry>>>>,
}

impl AuditLog {
    pub fn new() -> Self {
        Self {
            entries: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub async fn record(&self, entry: AuditEntry) -> Result<Uuid> {
        let entry_id = entry.entry_id;
        let mut entries = self.entries.write().await;
        entries.entry(entry.application_id).or_default().push(entry);
        Ok(entry_id)
    }

    /// Entries for one application in the order they were recorded
    pub async fn history(&self, application_id: Uuid) -> Result<Vec<AuditEntry>> {
        let entries = self.entries.read().await;
        Ok(entries.get(&application_id).cloned().unwrap_or_default())
    }

    pub async fn latest(&self, application_id: Uuid) -> Result<Option<AuditEntry>> {
        let entries = self.entries.read().await;
        Ok(entries
            .get(&application_id)
            .and_then(|items| items.last())
            .cloned())
    }
}

impl Default for AuditLog {
    fn default() -> Self {
        Self::new()
    }
}

/// Hex SHA-256 of the record's JSON form.
/// Streams the serialization straight into the hasher.
pub fn fingerprint(record: &ApplicationRecord) -> String {
    let mut hasher = Sha256::new();

    if serde_json::to_writer(&mut HashWriter(&mut hasher), record).is_err() {
        return String::new();
    }

    hex::encode(hasher.finalize())
}

/// True when `record` is exactly the state `entry` was recorded against.
pub fn verify(entry: &AuditEntry, record: &ApplicationRecord) -> bool {
    entry.application_id == record.id
        && entry.to == record.status
        && !entry.fingerprint.is_empty()
        && entry.fingerprint == fingerprint(record)
}

/// Adapter to allow writing into Sha256 via std::io::Write
struct HashWriter<'a, H: Digest>(&'a mut H);

impl<'a, H: Digest> Write for HashWriter<'a, H> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.update(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::BorrowerProfile;

    fn record() -> ApplicationRecord {
        ApplicationRecord::draft(
            Uuid::new_v4(),
            Uuid::new_v4(),
            250_000.0,
            24,
            BorrowerProfile::default(),
        )
    }

    #[test]
    fn test_fingerprint_is_stable_and_sensitive() {
        let mut record = record();
        let first = fingerprint(&record);
        assert_eq!(first.len(), 64);
        assert_eq!(first, fingerprint(&record));

        record.remarks.push("Checked salary slips", "Agent");
        assert_ne!(first, fingerprint(&record));
    }

    #[test]
    fn test_verify_detects_tampering() {
        let mut record = record();
        let entry = AuditEntry::new("create", None, &record, None);
        assert!(verify(&entry, &record));

        record.approved_amount = Some(1.0);
        assert!(!verify(&entry, &record));
    }

    #[tokio::test]
    async fn test_history_keeps_order() {
        let log = AuditLog::new();
        let mut record = record();
        log.record(AuditEntry::new("create", None, &record, None))
            .await
            .unwrap();

        record.status = ApplicationStatus::Submitted;
        log.record(AuditEntry::new(
            "submit",
            Some(ApplicationStatus::Draft),
            &record,
            None,
        ))
        .await
        .unwrap();

        let history = log.history(record.id).await.unwrap();
        let actions: Vec<_> = history.iter().map(|e| e.action.as_str()).collect();
        assert_eq!(actions, vec!["create", "submit"]);
        assert_eq!(
            log.latest(record.id).await.unwrap().unwrap().to,
            ApplicationStatus::Submitted
        );
        assert!(log.history(Uuid::new_v4()).await.unwrap().is_empty());
    }
}
