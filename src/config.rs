//! Environment-driven configuration

use crate::error::AdvisorError;
use crate::models::Language;
use crate::Result;
use std::env;

pub const DEFAULT_GROQ_MODEL: &str = "llama-3.3-70b-versatile";
pub const DEFAULT_GROQ_BASE_URL: &str = "https://api.groq.com/openai/v1";
pub const DEFAULT_NOTIFY_FROM: &str = "Loan Advisor <onboarding@resend.dev>";

/// Top-level configuration.
#[derive(Debug, Clone)]
pub struct AdvisorConfig {
    pub reasoner: ReasonerConfig,
    pub notifier: NotifierConfig,
    pub database_url: Option<String>,
    pub reviewer_claims_lead: bool,
    pub default_language: Language,
    pub log_level: String,
}

#[derive(Debug, Clone)]
pub struct ReasonerConfig {
    /// `None` leaves the reasoner unconfigured.
    pub api_key: Option<String>,
    pub model: String,
    pub base_url: String,
}

#[derive(Debug, Clone)]
pub struct NotifierConfig {
    pub resend_api_key: Option<String>,
    pub admin_email: Option<String>,
    pub from: String,
}

impl AdvisorConfig {
    /// Load `.env` (if present) then read the process environment.
    pub fn from_env() -> Result<Self> {
        dotenv::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let reasoner = ReasonerConfig {
            api_key: non_empty("GROQ_API_KEY"),
            model: non_empty("GROQ_MODEL").unwrap_or_else(|| DEFAULT_GROQ_MODEL.to_string()),
            base_url: non_empty("GROQ_BASE_URL")
                .unwrap_or_else(|| DEFAULT_GROQ_BASE_URL.to_string()),
        };

        let notifier = NotifierConfig {
            resend_api_key: non_empty("RESEND_API_KEY"),
            admin_email: non_empty("ADMIN_EMAIL"),
            from: non_empty("NOTIFY_FROM").unwrap_or_else(|| DEFAULT_NOTIFY_FROM.to_string()),
        };

        let database_url = non_empty("DATABASE_URL").or_else(|| non_empty("POSTGRES_URL"));

        let reviewer_claims_lead = match non_empty("REVIEWER_CLAIMS_LEAD") {
            None => true,
            Some(value) => parse_bool(&value).ok_or_else(|| {
                AdvisorError::Configuration(format!(
                    "REVIEWER_CLAIMS_LEAD must be true or false, got {:?}",
                    value
                ))
            })?,
        };

        let default_language = match non_empty("DEFAULT_LANGUAGE") {
            None => Language::En,
            Some(code) => Language::from_code(&code).ok_or_else(|| {
                AdvisorError::Configuration(format!("Unsupported DEFAULT_LANGUAGE {:?}", code))
            })?,
        };

        let log_level = non_empty("APP_LOG_LEVEL").unwrap_or_else(|| "info".to_string());

        Ok(Self {
            reasoner,
            notifier,
            database_url,
            reviewer_claims_lead,
            default_language,
            log_level,
        })
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(pairs: &[(&str, &str)]) -> Result<AdvisorConfig> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AdvisorConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = load(&[]).unwrap();
        assert!(config.reasoner.api_key.is_none());
        assert_eq!(config.reasoner.model, DEFAULT_GROQ_MODEL);
        assert!(config.database_url.is_none());
        assert!(config.reviewer_claims_lead);
        assert_eq!(config.default_language, Language::En);
    }

    #[test]
    fn test_blank_key_is_unconfigured() {
        let config = load(&[("GROQ_API_KEY", "  "), ("POSTGRES_URL", "postgres://db")]).unwrap();
        assert!(config.reasoner.api_key.is_none());
        assert_eq!(config.database_url.as_deref(), Some("postgres://db"));
    }

    #[test]
    fn test_invalid_policy_flag() {
        let err = load(&[("REVIEWER_CLAIMS_LEAD", "sometimes")]).unwrap_err();
        assert!(matches!(err, AdvisorError::Configuration(_)));
    }

    #[test]
    fn test_language_and_policy() {
        let config = load(&[("DEFAULT_LANGUAGE", "ta"), ("REVIEWER_CLAIMS_LEAD", "off")]).unwrap();
        assert_eq!(config.default_language, Language::Ta);
        assert!(!config.reviewer_claims_lead);
    }
}
