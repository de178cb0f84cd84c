//! Error types for the loan advisor pipeline

use thiserror::Error;

/// Result type alias for pipeline operations
pub type Result<T> = std::result::Result<T, AdvisorError>;

#[derive(Error, Debug)]
pub enum AdvisorError {

    // =============================
    // Caller-facing Errors
    // =============================

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Precondition failed: {0}")]
    Precondition(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Concurrent modification: {0}")]
    Conflict(String),

    #[error("Upstream unavailable: {0}")]
    UpstreamUnavailable(String),

    // =============================
    // Infrastructure Errors
    // =============================

    #[error("Database error: {0}")]
    Database(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    // =============================
    // External Library Conversions
    // =============================

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Invalid identifier: {0}")]
    InvalidId(#[from] uuid::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl AdvisorError {
    pub fn is_validation(&self) -> bool {
        matches!(self, AdvisorError::Validation(_) | AdvisorError::InvalidId(_))
    }

    pub fn is_precondition(&self) -> bool {
        matches!(self, AdvisorError::Precondition(_))
    }

    pub fn is_upstream(&self) -> bool {
        matches!(self, AdvisorError::UpstreamUnavailable(_) | AdvisorError::Http(_))
    }
}

impl From<sqlx::Error> for AdvisorError {
    fn from(value: sqlx::Error) -> Self {
        AdvisorError::Database(value.to_string())
    }
}

/// Parse a caller-supplied identifier, rejecting malformed values as validation errors.
pub fn parse_id(value: &str, label: &str) -> Result<uuid::Uuid> {
    uuid::Uuid::parse_str(value.trim())
        .map_err(|_| AdvisorError::Validation(format!("Invalid {} format: {:?}", label, value)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_id_rejects_garbage() {
        let err = parse_id("not-an-id", "Borrower ID").unwrap_err();
        assert!(err.is_validation());
        assert!(err.to_string().contains("Borrower ID"));
    }

    #[test]
    fn test_parse_id_accepts_padded_uuid() {
        let id = uuid::Uuid::new_v4();
        assert_eq!(parse_id(&format!(" {} ", id), "Loan ID").unwrap(), id);
    }
}
