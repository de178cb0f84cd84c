//! Groq chat-completions client
//!
//! OpenAI-compatible `/chat/completions` endpoint.
//! Uses a long-lived reqwest::Client for connection pooling.

use super::{ChatRole, Reasoner, ReasonerRequest};
use crate::config::ReasonerConfig;
use crate::error::AdvisorError;
use crate::Result;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{error, info};

/// Reusable Groq client (connection-pooled)
pub struct GroqReasoner {
    client: Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl GroqReasoner {
    pub fn new(api_key: String, model: String, base_url: String) -> Result<Self> {
        if api_key.trim().is_empty() {
            return Err(AdvisorError::Configuration(
                "GROQ_API_KEY is empty".to_string(),
            ));
        }

        let client = Client::builder()
            .pool_idle_timeout(Duration::from_secs(90))
            .pool_max_idle_per_host(8)
            .build()?;

        Ok(Self {
            client,
            api_key,
            model,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Build a client from config, or `None` when no key is present.
    pub fn from_config(config: &ReasonerConfig) -> Result<Option<Self>> {
        match &config.api_key {
            Some(key) => Self::new(key.clone(), config.model.clone(), config.base_url.clone()).map(Some),
            None => Ok(None),
        }
    }

    fn build_request(&self, request: &ReasonerRequest) -> ChatCompletionRequest {
        let mut messages = Vec::with_capacity(request.history.len() + 2);
        messages.push(Message {
            role: "system".to_string(),
            content: request.system.clone(),
        });
        for turn in &request.history {
            messages.push(Message {
                role: match turn.role {
                    ChatRole::Assistant => "assistant",
                    ChatRole::User => "user",
                }
                .to_string(),
                content: turn.content.clone(),
            });
        }
        messages.push(Message {
            role: "user".to_string(),
            content: request.user.clone(),
        });

        ChatCompletionRequest {
            model: self.model.clone(),
            messages,
            temperature: request.temperature,
            max_tokens: request.max_tokens,
            top_p: 1.0,
            stream: false,
        }
    }
}

#[async_trait]
impl Reasoner for GroqReasoner {
    async fn complete(&self, request: &ReasonerRequest) -> Result<String> {
        let url = format!("{}/chat/completions", self.base_url);
        let body = self.build_request(request);

        info!(model = %self.model, turns = body.messages.len(), "Calling Groq API");

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                error!("Groq API request failed: {}", e);
                AdvisorError::UpstreamUnavailable(format!("Groq API error: {}", e))
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            error!("Groq API error response ({}): {}", status, error_text);
            return Err(AdvisorError::UpstreamUnavailable(format!(
                "Groq API returned {}: {}",
                status, error_text
            )));
        }

        let completion: ChatCompletionResponse = response.json().await.map_err(|e| {
            error!("Failed to parse Groq response: {}", e);
            AdvisorError::UpstreamUnavailable(format!("Groq parse error: {}", e))
        })?;

        let answer = completion
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| {
                AdvisorError::UpstreamUnavailable("Empty response from Groq".to_string())
            })?;

        info!(chars = answer.len(), "Groq response received");

        Ok(answer)
    }
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<Message>,
    temperature: f32,
    max_tokens: u32,
    top_p: f32,
    stream: bool,
}

#[derive(Debug, Serialize, Deserialize)]
struct Message {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reasoner::ChatTurn;

    fn client() -> GroqReasoner {
        GroqReasoner::new(
            "test-key".to_string(),
            "llama-3.3-70b-versatile".to_string(),
            "https://api.groq.com/openai/v1/".to_string(),
        )
        .unwrap()
    }

    #[test]
    fn test_request_serialization() {
        let request = ReasonerRequest::new("You are a loan advisor", "What loans do you offer?")
            .with_history(vec![ChatTurn::user("hi"), ChatTurn::assistant("Hello!")]);

        let body = client().build_request(&request);
        let json = serde_json::to_value(&body).unwrap();

        let messages = json["messages"].as_array().unwrap();
        assert_eq!(messages.len(), 4);
        assert_eq!(messages[0]["role"], "system");
        assert_eq!(messages[2]["role"], "assistant");
        assert_eq!(messages[3]["content"], "What loans do you offer?");
        assert_eq!(json["stream"], false);
    }

    #[test]
    fn test_empty_key_rejected() {
        let result = GroqReasoner::new(String::new(), "m".to_string(), "http://x".to_string());
        assert!(matches!(result, Err(AdvisorError::Configuration(_))));
    }

    #[test]
    fn test_response_deserialization() {
        let raw = r#"{"choices":[{"index":0,"message":{"role":"assistant","content":"Namaste!"}}]}"#;
        let parsed: ChatCompletionResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(parsed.choices[0].message.content.as_deref(), Some("Namaste!"));
    }
}
