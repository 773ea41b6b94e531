//! Assembling what an agent is told

use crate::agent::{AgentContext, AgentIdentity};
use crate::learning::{AgentDiscoveries, SharedLearningContext};
use crate::state_machine::ConversationState;

/// Build the context for one invocation of `agent`.
///
/// Takes the one-shot hints (handoff, selected action, transition note)
/// out of `state`, so they reach exactly one agent.
pub(super) fn take_agent_context(
    state: &mut ConversationState,
    agent: AgentIdentity,
    learning: SharedLearningContext,
    discoveries: AgentDiscoveries,
    history_window: usize,
) -> AgentContext {
    AgentContext {
        user_id: state.user_id,
        session_id: state.session_id,
        agent,
        history: state.recent_turns(history_window).to_vec(),
        learning,
        discoveries,
        handoff: state.routing.pending_handoff.take(),
        selected_action: state.routing.selected_action.take(),
        mode: state.routing.mode.clone(),
        transition: state.routing.transition.take(),
    }
}
