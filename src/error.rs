//! Errors surfaced by the orchestrator

use crate::agent::{AgentError, AgentIdentity};
use crate::store::StoreError;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("no agent registered for {0}")]
    UnknownAgent(AgentIdentity),

    #[error("no active conversation for user {0}")]
    NoActiveConversation(Uuid),

    /// The locked update was not applied
    #[error("could not lock conversation state for user {0}")]
    LockNotAcquired(Uuid),

    /// Only from the explicit locked path; ordinary turns degrade instead
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("agent failed: {0}")]
    Agent(#[from] AgentError),
}

pub type OrchestratorResult<T> = Result<T, OrchestratorError>;
