//! Completion-service client (OpenAI-compatible chat completions).

use crate::config::CompletionConfig;
use crate::error::CompletionError;
use crate::{Role, Turn};
use anyhow::Context as _;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Seam between the orchestrator and the completion endpoint, so tests can
/// substitute a scripted model.
#[async_trait]
pub trait CompletionService: Send + Sync {
    /// Whether a model call can be attempted at all. When false, callers
    /// short-circuit to a static reply without touching history.
    fn is_configured(&self) -> bool {
        true
    }

    async fn complete(&self, turns: &[Turn]) -> Result<String, CompletionError>;
}

/// Wire-format message for the chat-completions request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl From<&Turn> for ChatMessage {
    /// User turns with a known speaker get an attribution label so the
    /// model can tell multi-party input apart. The label exists only at
    /// this wire boundary; stored turns keep speaker and content separate.
    fn from(turn: &Turn) -> Self {
        let content = match (turn.role, &turn.speaker) {
            (Role::User, Some(speaker)) => format!("{speaker}: {}", turn.content),
            _ => turn.content.clone(),
        };

        Self {
            role: turn.role.as_str().to_string(),
            content,
        }
    }
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

/// reqwest-backed client for an OpenAI-compatible endpoint.
pub struct CompletionClient {
    config: CompletionConfig,
    http: reqwest::Client,
}

impl CompletionClient {
    pub fn new(config: CompletionConfig) -> crate::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(120))
            .build()
            .with_context(|| "failed to build HTTP client")?;

        Ok(Self { config, http })
    }
}

#[async_trait]
impl CompletionService for CompletionClient {
    fn is_configured(&self) -> bool {
        self.config.api_key.is_some()
    }

    async fn complete(&self, turns: &[Turn]) -> Result<String, CompletionError> {
        let Some(api_key) = &self.config.api_key else {
            return Err(CompletionError::NotConfigured);
        };

        let request = ChatCompletionRequest {
            model: &self.config.model,
            messages: turns.iter().map(ChatMessage::from).collect(),
            max_tokens: self.config.max_tokens,
            temperature: self.config.temperature,
        };

        let response = self
            .http
            .post(format!("{}/chat/completions", self.config.base_url))
            .bearer_auth(api_key)
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(CompletionError::Status { status, body });
        }

        let completion: ChatCompletionResponse = response.json().await?;

        completion
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .filter(|content| !content.trim().is_empty())
            .ok_or(CompletionError::EmptyResponse)
    }
}
