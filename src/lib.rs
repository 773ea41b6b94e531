//! Tutor Relay - routing core for a multi-agent learning assistant
//!
//! Decides which specialist agent answers each message, keeps per-user
//! conversation state with expiry and locking, and carries handoff notes
//! and cumulative discoveries between agents.

pub mod agent;
pub mod config;
pub mod db;
pub mod error;
pub mod learning;
pub mod llm;
pub mod orchestrator;
pub mod profile;
pub mod router;
pub mod state_machine;
pub mod store;

#[cfg(test)]
pub mod testing;

pub use agent::{Agent, AgentContext, AgentError, AgentIdentity, AgentResponse};
pub use error::{OrchestratorError, OrchestratorResult};
pub use orchestrator::Orchestrator;
pub use state_machine::{ConversationState, DialogueTurn, MenuOption};
