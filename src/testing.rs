//! Mock implementations for testing
//!
//! Queued completions, scripted agents, and misbehaving stores, so the
//! relay can be exercised without a model or a real backend.

use crate::agent::{Agent, AgentContext, AgentError, AgentIdentity, AgentResponse};
use crate::llm::{ChatMessage, CompletionService, LlmError};
use crate::state_machine::ConversationState;
use crate::store::{StateStore, StoreError, StoreResult};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;
use uuid::Uuid;

// ============================================================================
// Mock completion service
// ============================================================================

/// One call made to [`MockCompletion`]
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub messages: Vec<ChatMessage>,
    pub system_prompt: Option<String>,
    pub temperature: f32,
    pub max_tokens: Option<u32>,
}

/// Completion service that returns queued replies
pub struct MockCompletion {
    responses: Mutex<VecDeque<Result<String, LlmError>>>,
    requests: Mutex<Vec<CompletionRequest>>,
}

impl MockCompletion {
    pub fn new() -> Self {
        Self {
            responses: Mutex::new(VecDeque::new()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn queue_text(&self, text: impl Into<String>) {
        self.responses.lock().unwrap().push_back(Ok(text.into()));
    }

    pub fn queue_error(&self, error: LlmError) {
        self.responses.lock().unwrap().push_back(Err(error));
    }

    pub fn recorded_requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().unwrap().clone()
    }

    fn next(&self, request: CompletionRequest) -> Result<String, LlmError> {
        self.requests.lock().unwrap().push(request);
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(LlmError::Unavailable("No mock response queued".to_string())))
    }
}

#[async_trait]
impl CompletionService for MockCompletion {
    async fn complete(
        &self,
        prompt: &str,
        system_prompt: Option<&str>,
        temperature: f32,
        max_tokens: Option<u32>,
    ) -> Result<String, LlmError> {
        self.next(CompletionRequest {
            messages: vec![ChatMessage::user(prompt)],
            system_prompt: system_prompt.map(str::to_string),
            temperature,
            max_tokens,
        })
    }

    async fn complete_with_history(
        &self,
        messages: &[ChatMessage],
        system_prompt: Option<&str>,
        temperature: f32,
    ) -> Result<String, LlmError> {
        self.next(CompletionRequest {
            messages: messages.to_vec(),
            system_prompt: system_prompt.map(str::to_string),
            temperature,
            max_tokens: None,
        })
    }

    fn model_id(&self) -> &str {
        "mock-model"
    }
}

// ============================================================================
// Scripted agent
// ============================================================================

/// Agent that replays queued responses and records what it was told.
///
/// With nothing queued it echoes the message.
pub struct ScriptedAgent {
    identity: AgentIdentity,
    responses: Mutex<VecDeque<Result<AgentResponse, AgentError>>>,
    contexts: Mutex<Vec<(AgentContext, String)>>,
}

impl ScriptedAgent {
    pub fn new(identity: AgentIdentity) -> Self {
        Self {
            identity,
            responses: Mutex::new(VecDeque::new()),
            contexts: Mutex::new(Vec::new()),
        }
    }

    pub fn queue(&self, response: AgentResponse) {
        self.responses.lock().unwrap().push_back(Ok(response));
    }

    pub fn queue_error(&self, error: AgentError) {
        self.responses.lock().unwrap().push_back(Err(error));
    }

    /// Contexts and messages received, in call order
    pub fn calls(&self) -> Vec<(AgentContext, String)> {
        self.contexts.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.contexts.lock().unwrap().len()
    }
}

#[async_trait]
impl Agent for ScriptedAgent {
    fn identity(&self) -> AgentIdentity {
        self.identity
    }

    async fn respond(&self, ctx: &AgentContext, message: &str) -> Result<AgentResponse, AgentError> {
        self.contexts
            .lock()
            .unwrap()
            .push((ctx.clone(), message.to_string()));
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| {
                Ok(AgentResponse::new(
                    self.identity,
                    format!("{} heard: {message}", self.identity),
                ))
            })
    }
}

// ============================================================================
// Misbehaving stores
// ============================================================================

/// Store whose every operation fails
pub struct FailingStore;

fn down() -> StoreError {
    StoreError::Unavailable("connection refused".to_string())
}

#[async_trait]
impl StateStore for FailingStore {
    async fn get(&self, _user_id: Uuid) -> StoreResult<Option<ConversationState>> {
        Err(down())
    }

    async fn set(&self, _state: &ConversationState, _ttl: Duration) -> StoreResult<()> {
        Err(down())
    }

    async fn delete(&self, _user_id: Uuid) -> StoreResult<bool> {
        Err(down())
    }

    async fn exists(&self, _user_id: Uuid) -> StoreResult<bool> {
        Err(down())
    }

    async fn extend_ttl(&self, _user_id: Uuid, _ttl: Duration) -> StoreResult<bool> {
        Err(down())
    }

    async fn list_user_ids(&self) -> StoreResult<Vec<Uuid>> {
        Err(down())
    }

    async fn try_lock(&self, _user_id: Uuid, _token: Uuid, _ttl: Duration) -> StoreResult<bool> {
        Err(down())
    }

    fn unlock(&self, _user_id: Uuid, _token: Uuid) -> StoreResult<bool> {
        Err(down())
    }
}

/// Wraps a store and delays every write, widening race windows
pub struct SlowStore<S> {
    inner: S,
    delay: Duration,
}

impl<S: StateStore> SlowStore<S> {
    pub fn new(inner: S, delay: Duration) -> Self {
        Self { inner, delay }
    }
}

#[async_trait]
impl<S: StateStore> StateStore for SlowStore<S> {
    async fn get(&self, user_id: Uuid) -> StoreResult<Option<ConversationState>> {
        self.inner.get(user_id).await
    }

    async fn set(&self, state: &ConversationState, ttl: Duration) -> StoreResult<()> {
        tokio::time::sleep(self.delay).await;
        self.inner.set(state, ttl).await
    }

    async fn delete(&self, user_id: Uuid) -> StoreResult<bool> {
        self.inner.delete(user_id).await
    }

    async fn exists(&self, user_id: Uuid) -> StoreResult<bool> {
        self.inner.exists(user_id).await
    }

    async fn extend_ttl(&self, user_id: Uuid, ttl: Duration) -> StoreResult<bool> {
        self.inner.extend_ttl(user_id, ttl).await
    }

    async fn list_user_ids(&self) -> StoreResult<Vec<Uuid>> {
        self.inner.list_user_ids().await
    }

    async fn try_lock(&self, user_id: Uuid, token: Uuid, ttl: Duration) -> StoreResult<bool> {
        self.inner.try_lock(user_id, token, ttl).await
    }

    fn unlock(&self, user_id: Uuid, token: Uuid) -> StoreResult<bool> {
        self.inner.unlock(user_id, token)
    }
}
