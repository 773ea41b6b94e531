//! Anthropic Claude provider implementation

use super::{ChatMessage, ChatRole, CompletionService, LlmError};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

const DEFAULT_MAX_TOKENS: u32 = 1024;

/// Anthropic model variants
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnthropicModel {
    Claude4Sonnet,
    Claude35Sonnet,
    Claude35Haiku,
}

impl AnthropicModel {
    pub fn api_name(self) -> &'static str {
        match self {
            AnthropicModel::Claude4Sonnet => "claude-sonnet-4-20250514",
            AnthropicModel::Claude35Sonnet => "claude-3-5-sonnet-20241022",
            AnthropicModel::Claude35Haiku => "claude-3-5-haiku-20241022",
        }
    }

    pub fn model_id(self) -> &'static str {
        match self {
            AnthropicModel::Claude4Sonnet => "claude-4-sonnet",
            AnthropicModel::Claude35Sonnet => "claude-3.5-sonnet",
            AnthropicModel::Claude35Haiku => "claude-3.5-haiku",
        }
    }

    /// Look a model up by its short id
    pub fn from_model_id(id: &str) -> Option<Self> {
        [
            AnthropicModel::Claude4Sonnet,
            AnthropicModel::Claude35Sonnet,
            AnthropicModel::Claude35Haiku,
        ]
        .into_iter()
        .find(|m| m.model_id() == id)
    }
}

/// Anthropic Messages API client
pub struct AnthropicService {
    client: Client,
    api_key: String,
    model: AnthropicModel,
    base_url: String,
}

impl AnthropicService {
    pub fn new(
        api_key: String,
        model: AnthropicModel,
        gateway: Option<&str>,
    ) -> Result<Self, LlmError> {
        let base_url = match gateway {
            Some(gw) => format!("{}/_/gateway/anthropic/v1/messages", gw.trim_end_matches('/')),
            None => "https://api.anthropic.com/v1/messages".to_string(),
        };

        let client = Client::builder()
            .timeout(Duration::from_secs(120))
            .build()
            .map_err(|e| LlmError::NotConfigured(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            api_key,
            model,
            base_url,
        })
    }

    fn build_request(
        &self,
        messages: &[ChatMessage],
        system_prompt: Option<&str>,
        temperature: f32,
        max_tokens: Option<u32>,
    ) -> AnthropicRequest {
        let mut translated: Vec<AnthropicMessage> = messages
            .iter()
            .map(|m| AnthropicMessage {
                role: match m.role {
                    ChatRole::User => "user",
                    ChatRole::Assistant => "assistant",
                },
                content: m.content.clone(),
            })
            .collect();

        // The API rejects an empty conversation
        if translated.is_empty() {
            translated.push(AnthropicMessage {
                role: "user",
                content: "Hello".to_string(),
            });
        }

        AnthropicRequest {
            model: self.model.api_name(),
            max_tokens: max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
            temperature,
            system: system_prompt.map(str::to_string),
            messages: translated,
        }
    }

    fn classify_error(status: reqwest::StatusCode, body: &str) -> LlmError {
        match status.as_u16() {
            401 | 403 => LlmError::Rejected(format!("Authentication failed: {body}")),
            429 => LlmError::RateLimited {
                message: body.to_string(),
                retry_after: serde_json::from_str::<serde_json::Value>(body)
                    .ok()
                    .and_then(|parsed| parsed.get("error")?.get("retry_after")?.as_f64())
                    .map(Duration::from_secs_f64),
            },
            500..=599 => LlmError::Unavailable(format!("Server error: {body}")),
            _ => LlmError::Rejected(format!("HTTP {status}: {body}")),
        }
    }

    async fn send(&self, request: &AnthropicRequest) -> Result<String, LlmError> {
        let response = self
            .client
            .post(&self.base_url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", "2023-06-01")
            .header("content-type", "application/json")
            .json(request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    LlmError::Unavailable(format!("Request timeout: {e}"))
                } else if e.is_connect() {
                    LlmError::Unavailable(format!("Connection failed: {e}"))
                } else {
                    LlmError::Rejected(format!("Request failed: {e}"))
                }
            })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| LlmError::Unavailable(format!("Failed to read response: {e}")))?;

        if !status.is_success() {
            return Err(Self::classify_error(status, &body));
        }

        let parsed: AnthropicResponse = serde_json::from_str(&body).map_err(|e| {
            LlmError::Malformed(format!("{e} - body: {body}"))
        })?;

        Ok(parsed.text())
    }
}

#[async_trait]
impl CompletionService for AnthropicService {
    async fn complete(
        &self,
        prompt: &str,
        system_prompt: Option<&str>,
        temperature: f32,
        max_tokens: Option<u32>,
    ) -> Result<String, LlmError> {
        let request = self.build_request(
            &[ChatMessage::user(prompt)],
            system_prompt,
            temperature,
            max_tokens,
        );
        self.send(&request).await
    }

    async fn complete_with_history(
        &self,
        messages: &[ChatMessage],
        system_prompt: Option<&str>,
        temperature: f32,
    ) -> Result<String, LlmError> {
        let request = self.build_request(messages, system_prompt, temperature, None);
        self.send(&request).await
    }

    fn model_id(&self) -> &str {
        self.model.model_id()
    }
}

// Anthropic API types

#[derive(Debug, Serialize)]
struct AnthropicRequest {
    model: &'static str,
    max_tokens: u32,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    messages: Vec<AnthropicMessage>,
}

#[derive(Debug, Serialize)]
struct AnthropicMessage {
    role: &'static str,
    content: String,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum AnthropicContentBlock {
    Text {
        text: String,
    },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
struct AnthropicResponse {
    content: Vec<AnthropicContentBlock>,
}

impl AnthropicResponse {
    fn text(&self) -> String {
        self.content
            .iter()
            .filter_map(|block| match block {
                AnthropicContentBlock::Text { text } => Some(text.as_str()),
                AnthropicContentBlock::Other => None,
            })
            .collect::<Vec<_>>()
            .join("")
    }
}
