//! What an agent is told when it is invoked

use super::AgentIdentity;
use crate::learning::{AgentDiscoveries, HandoffContext, SharedLearningContext};
use crate::state_machine::{DialogueMode, DialogueTurn, TransitionNote};
use uuid::Uuid;

/// Everything an agent receives alongside the user's message.
///
/// Built fresh for every invocation. The handoff, selected action, and
/// transition note are one-shot: they appear here once and are gone from
/// the conversation state afterwards.
#[derive(Debug, Clone)]
pub struct AgentContext {
    pub user_id: Uuid,
    pub session_id: Option<Uuid>,
    /// The agent being invoked
    pub agent: AgentIdentity,
    /// Recent turns, oldest first
    pub history: Vec<DialogueTurn>,
    pub learning: SharedLearningContext,
    pub discoveries: AgentDiscoveries,
    pub handoff: Option<HandoffContext>,
    pub selected_action: Option<String>,
    pub mode: Option<DialogueMode>,
    pub transition: Option<TransitionNote>,
}

impl AgentContext {
    pub fn new(user_id: Uuid, agent: AgentIdentity) -> Self {
        Self {
            user_id,
            session_id: None,
            agent,
            history: Vec::new(),
            learning: SharedLearningContext::default(),
            discoveries: AgentDiscoveries::default(),
            handoff: None,
            selected_action: None,
            mode: None,
            transition: None,
        }
    }

    /// Whether this is the first exchange of the conversation
    pub fn is_first_turn(&self) -> bool {
        self.history.is_empty()
    }
}
