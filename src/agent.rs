//! Agent capability
//!
//! An agent turns an [`AgentContext`] and a user message into an
//! [`AgentResponse`]. What it says is its own business; the orchestrator
//! only decides which agent speaks and what it is told.

mod context;
mod identity;
mod persona;
pub mod prompt;
mod response;

pub use context::AgentContext;
pub use identity::{AgentIdentity, UnknownAgentTag};
pub use persona::{default_persona, PersonaAgent};
pub use response::{AgentAction, AgentResponse};

use crate::learning::LearningError;
use crate::llm::LlmError;
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AgentError {
    #[error("completion failed: {0}")]
    Completion(#[from] LlmError),
    #[error(transparent)]
    Learning(#[from] LearningError),
    #[error("{0}")]
    Failed(String),
}

/// A specialist that can answer a user message
#[async_trait]
pub trait Agent: Send + Sync {
    fn identity(&self) -> AgentIdentity;

    async fn respond(&self, ctx: &AgentContext, message: &str) -> Result<AgentResponse, AgentError>;
}

#[async_trait]
impl<T: Agent + ?Sized> Agent for Arc<T> {
    fn identity(&self) -> AgentIdentity {
        (**self).identity()
    }

    async fn respond(&self, ctx: &AgentContext, message: &str) -> Result<AgentResponse, AgentError> {
        (**self).respond(ctx, message).await
    }
}
