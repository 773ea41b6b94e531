//! LLM completion abstraction
//!
//! Agents and the relay's own classifier and extractor only need plain
//! text completion, with or without prior conversation.

mod anthropic;
mod error;
mod types;

pub use anthropic::{AnthropicModel, AnthropicService};
pub use error::LlmError;
pub use types::{ChatMessage, ChatRole};

use async_trait::async_trait;
use std::sync::Arc;

/// Text completion capability
#[async_trait]
pub trait CompletionService: Send + Sync {
    /// Complete a single prompt
    async fn complete(
        &self,
        prompt: &str,
        system_prompt: Option<&str>,
        temperature: f32,
        max_tokens: Option<u32>,
    ) -> Result<String, LlmError>;

    /// Complete given prior messages. Empty or short histories are allowed.
    async fn complete_with_history(
        &self,
        messages: &[ChatMessage],
        system_prompt: Option<&str>,
        temperature: f32,
    ) -> Result<String, LlmError>;

    fn model_id(&self) -> &str;
}

#[async_trait]
impl<T: CompletionService + ?Sized> CompletionService for Arc<T> {
    async fn complete(
        &self,
        prompt: &str,
        system_prompt: Option<&str>,
        temperature: f32,
        max_tokens: Option<u32>,
    ) -> Result<String, LlmError> {
        (**self)
            .complete(prompt, system_prompt, temperature, max_tokens)
            .await
    }

    async fn complete_with_history(
        &self,
        messages: &[ChatMessage],
        system_prompt: Option<&str>,
        temperature: f32,
    ) -> Result<String, LlmError> {
        (**self)
            .complete_with_history(messages, system_prompt, temperature)
            .await
    }

    fn model_id(&self) -> &str {
        (**self).model_id()
    }
}

/// Configuration for the completion backend
#[derive(Debug, Clone, Default)]
pub struct LlmConfig {
    pub anthropic_api_key: Option<String>,
    /// Gateway URL; when set the gateway handles authentication
    pub gateway: Option<String>,
    pub model: Option<String>,
}

impl LlmConfig {
    pub fn from_env() -> Self {
        Self {
            anthropic_api_key: std::env::var("ANTHROPIC_API_KEY").ok(),
            gateway: std::env::var("LLM_GATEWAY").ok(),
            model: std::env::var("TUTOR_MODEL").ok(),
        }
    }

    /// Build the configured service, wrapped with logging
    pub fn build(&self) -> Result<Arc<dyn CompletionService>, LlmError> {
        let api_key = match (&self.gateway, &self.anthropic_api_key) {
            (Some(_), _) => "implicit".to_string(),
            (None, Some(key)) if !key.is_empty() => key.clone(),
            (None, _) => {
                return Err(LlmError::NotConfigured(
                    "Set ANTHROPIC_API_KEY or LLM_GATEWAY".to_string(),
                ))
            }
        };
        let model = match self.model.as_deref() {
            Some(id) => AnthropicModel::from_model_id(id)
                .ok_or_else(|| LlmError::NotConfigured(format!("Unknown model: {id}")))?,
            None => AnthropicModel::Claude4Sonnet,
        };
        let service = AnthropicService::new(api_key, model, self.gateway.as_deref())?;
        Ok(Arc::new(LoggingCompletion::new(Arc::new(service))))
    }
}

/// Logging wrapper for completion services
pub struct LoggingCompletion {
    inner: Arc<dyn CompletionService>,
    model_id: String,
}

impl LoggingCompletion {
    pub fn new(inner: Arc<dyn CompletionService>) -> Self {
        let model_id = inner.model_id().to_string();
        Self { inner, model_id }
    }

    fn log(&self, call: &'static str, started: std::time::Instant, result: &Result<String, LlmError>) {
        let duration = started.elapsed();
        match result {
            Ok(text) => {
                tracing::info!(
                    model = %self.model_id,
                    call,
                    duration_ms = %duration.as_millis(),
                    response_chars = text.len(),
                    "Completion finished"
                );
            }
            Err(e) => {
                tracing::error!(
                    model = %self.model_id,
                    call,
                    duration_ms = %duration.as_millis(),
                    kind = e.kind(),
                    error = %e,
                    transient = e.is_transient(),
                    "Completion failed"
                );
            }
        }
    }
}

#[async_trait]
impl CompletionService for LoggingCompletion {
    async fn complete(
        &self,
        prompt: &str,
        system_prompt: Option<&str>,
        temperature: f32,
        max_tokens: Option<u32>,
    ) -> Result<String, LlmError> {
        let started = std::time::Instant::now();
        let result = self
            .inner
            .complete(prompt, system_prompt, temperature, max_tokens)
            .await;
        self.log("complete", started, &result);
        result
    }

    async fn complete_with_history(
        &self,
        messages: &[ChatMessage],
        system_prompt: Option<&str>,
        temperature: f32,
    ) -> Result<String, LlmError> {
        let started = std::time::Instant::now();
        let result = self
            .inner
            .complete_with_history(messages, system_prompt, temperature)
            .await;
        self.log("complete_with_history", started, &result);
        result
    }

    fn model_id(&self) -> &str {
        &self.model_id
    }
}
