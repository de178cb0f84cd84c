//! Reasoner capability
//!
//! The language model sits behind a narrow `complete` interface so parsing,
//! fallback and lifecycle logic can run against scripted responses.

use crate::error::AdvisorError;
use crate::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use tokio::sync::Mutex;

pub mod groq;
pub use groq::GroqReasoner;

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Assistant,
}

impl ChatRole {
    /// Anything that is not the assistant is treated as the user.
    pub fn from_label(value: &str) -> Self {
        if value.eq_ignore_ascii_case("assistant") {
            ChatRole::Assistant
        } else {
            ChatRole::User
        }
    }
}

impl<'de> Deserialize<'de> for ChatRole {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let label = String::deserialize(deserializer)?;
        Ok(Self::from_label(&label))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChatTurn {
    pub role: ChatRole,
    pub content: String,
}

impl ChatTurn {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Assistant,
            content: content.into(),
        }
    }
}

/// One completion request: system instruction, prior turns, current turn.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ReasonerRequest {
    pub system: String,
    pub history: Vec<ChatTurn>,
    pub user: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl ReasonerRequest {
    pub fn new(system: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            system: system.into(),
            history: Vec::new(),
            user: user.into(),
            temperature: 0.5,
            max_tokens: 1024,
        }
    }

    pub fn with_history(mut self, history: Vec<ChatTurn>) -> Self {
        self.history = history;
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }
}

/// Trait for text completion (LLM controlled, untrusted output)
#[async_trait]
pub trait Reasoner: Send + Sync {
    async fn complete(&self, request: &ReasonerRequest) -> Result<String>;
}

/// Stand-in used when no API key is configured. Every call fails upstream.
pub struct UnconfiguredReasoner;

#[async_trait]
impl Reasoner for UnconfiguredReasoner {
    async fn complete(&self, _request: &ReasonerRequest) -> Result<String> {
        Err(AdvisorError::UpstreamUnavailable(
            "Reasoner is not configured (missing GROQ_API_KEY)".to_string(),
        ))
    }
}

/// Replays canned responses in order. `Err` entries simulate upstream failures.
pub struct ScriptedReasoner {
    responses: Mutex<VecDeque<std::result::Result<String, String>>>,
    requests: Mutex<Vec<ReasonerRequest>>,
}

impl ScriptedReasoner {
    pub fn new(responses: Vec<std::result::Result<String, String>>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn replying(text: impl Into<String>) -> Self {
        Self::new(vec![Ok(text.into())])
    }

    pub fn failing(message: impl Into<String>) -> Self {
        Self::new(vec![Err(message.into())])
    }

    pub async fn requests(&self) -> Vec<ReasonerRequest> {
        self.requests.lock().await.clone()
    }
}

#[async_trait]
impl Reasoner for ScriptedReasoner {
    async fn complete(&self, request: &ReasonerRequest) -> Result<String> {
        self.requests.lock().await.push(request.clone());

        match self.responses.lock().await.pop_front() {
            Some(Ok(text)) => Ok(text),
            Some(Err(message)) => Err(AdvisorError::UpstreamUnavailable(message)),
            None => Err(AdvisorError::UpstreamUnavailable(
                "Scripted reasoner exhausted".to_string(),
            )),
        }
    }
}
