//! Conversation engine
//!
//! Stateless per call: the caller passes the running context and history and
//! gets back the reply plus the updated context. The reasoner handles the
//! turn when it can; otherwise a keyword fallback answers and never fails.

use crate::error::AdvisorError;
use crate::models::Language;
use crate::reasoner::{ChatTurn, Reasoner, ReasonerRequest};
use crate::store::CatalogStore;
use crate::tags::{DecodedMessage, ResultTagCodec};
use crate::Result;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::{debug, info, warn};

pub mod fallback;
pub mod prompt;

pub use fallback::{GREETING_INTENT, LOAN_INFO_INTENT, UNAVAILABLE_REPLY};

/// Intent recorded after the reasoner handled a turn.
pub const AI_HANDLED_INTENT: &str = "ai_handled";

const TRANSLATE_TEMPERATURE: f32 = 0.3;

/// Script of the text, if it is one we reply in. Tamil is checked first.
pub fn detect_script(text: &str) -> Option<Language> {
    if text.chars().any(|c| ('\u{0B80}'..='\u{0BFF}').contains(&c)) {
        return Some(Language::Ta);
    }
    if text.chars().any(|c| ('\u{0900}'..='\u{097F}').contains(&c)) {
        return Some(Language::Hi);
    }
    None
}

/// Opaque per-session state owned by the caller.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct ConversationContext {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_intent: Option<String>,
    /// Fields this engine does not interpret, passed through untouched.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ConversationContext {
    pub fn with_intent(&self, intent: &str) -> Self {
        Self {
            current_intent: Some(intent.to_string()),
            extra: self.extra.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub text: String,
    /// Language the caller's interface is set to.
    pub language: Language,
    #[serde(default)]
    pub history: Vec<ChatTurn>,
    #[serde(default)]
    pub context: ConversationContext,
}

impl ConversationTurn {
    pub fn new(text: impl Into<String>, language: Language) -> Self {
        Self {
            text: text.into(),
            language,
            history: Vec::new(),
            context: ConversationContext::default(),
        }
    }

    pub fn with_history(mut self, history: Vec<ChatTurn>) -> Self {
        self.history = history;
        self
    }

    pub fn with_context(mut self, context: ConversationContext) -> Self {
        self.context = context;
        self
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ReplySource {
    Reasoner,
    Fallback,
}

#[derive(Debug, Clone, Serialize)]
pub struct ConversationReply {
    /// Reply exactly as produced, markers included.
    pub reply: String,
    pub context: ConversationContext,
    pub language: Language,
    pub source: ReplySource,
    pub decoded: DecodedMessage,
}

pub struct ConversationEngine {
    reasoner: Arc<dyn Reasoner>,
    catalog: Arc<dyn CatalogStore>,
}

impl ConversationEngine {
    pub fn new(reasoner: Arc<dyn Reasoner>, catalog: Arc<dyn CatalogStore>) -> Self {
        Self { reasoner, catalog }
    }

    /// Handle one user turn. Never fails.
    pub async fn respond(&self, turn: ConversationTurn) -> ConversationReply {
        let language = detect_script(&turn.text).unwrap_or(turn.language);

        match self.ask_reasoner(&turn, language).await {
            Ok(reply) => {
                info!(language = %language, "Conversation turn handled by reasoner");
                ConversationReply {
                    decoded: ResultTagCodec::decode(&reply),
                    reply,
                    context: turn.context.with_intent(AI_HANDLED_INTENT),
                    language,
                    source: ReplySource::Reasoner,
                }
            }
            Err(e) => {
                warn!("Reasoner unavailable, using keyword fallback: {}", e);
                Self::fallback(&turn, language)
            }
        }
    }

    async fn ask_reasoner(&self, turn: &ConversationTurn, language: Language) -> Result<String> {
        let products = self.catalog.active_products().await?;
        let system = prompt::system_prompt(
            language,
            &products,
            turn.context.current_intent.as_deref(),
        );

        debug!(products = products.len(), history = turn.history.len(), "Prompting reasoner");

        let request =
            ReasonerRequest::new(system, turn.text.clone()).with_history(turn.history.clone());
        self.reasoner.complete(&request).await
    }

    fn fallback(turn: &ConversationTurn, language: Language) -> ConversationReply {
        let (reply, context) = match fallback::canned_reply(&turn.text, language) {
            Some(canned) => (canned.text, turn.context.with_intent(canned.intent)),
            None => (UNAVAILABLE_REPLY.to_string(), turn.context.clone()),
        };

        ConversationReply {
            decoded: ResultTagCodec::decode(&reply),
            reply,
            context,
            language,
            source: ReplySource::Fallback,
        }
    }

    /// Translate `text` into `target`. There is no fallback translation.
    pub async fn translate(&self, text: &str, target: Language) -> Result<String> {
        let request = ReasonerRequest::new(prompt::translation_prompt(target), text)
            .with_temperature(TRANSLATE_TEMPERATURE);

        let translated = self.reasoner.complete(&request).await?;
        let translated = translated.trim();
        if translated.is_empty() {
            return Err(AdvisorError::UpstreamUnavailable(
                "Reasoner returned an empty translation".to_string(),
            ));
        }
        Ok(translated.to_string())
    }
}
