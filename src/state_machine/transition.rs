//! Folding an agent reply into conversation state
//!
//! Pure: no I/O. The orchestrator persists or deletes the state according
//! to the returned outcome.

use super::ConversationState;
use crate::agent::AgentResponse;

/// What to do with the state once a reply has been applied
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnOutcome {
    Persist,
    /// The conversation ended; the state must be deleted
    End,
}

/// Record the routing hints a reply leaves for the next turn.
///
/// A new menu replaces the live one, a suggested agent becomes both the
/// pending suggestion and the current agent, and a handoff note is held
/// for the next invocation.
pub fn apply_response(state: &mut ConversationState, response: &AgentResponse) -> TurnOutcome {
    if response.end_conversation {
        return TurnOutcome::End;
    }

    if !response.menu.is_empty() {
        state.routing.set_menu(response.menu.iter().cloned());
    }

    let suggested = response.suggested_next_agent.or_else(|| {
        response
            .handoff
            .as_ref()
            .and_then(|h| h.suggested_next_agent)
    });
    if let Some(next) = suggested {
        state.routing.pending_agent = Some(next);
        state.current_agent = next;
    }

    if let Some(handoff) = &response.handoff {
        state.routing.pending_handoff = Some(handoff.clone());
    }

    if response.ends_mode() {
        state.routing.mode = None;
    }

    TurnOutcome::Persist
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::AgentIdentity;
    use crate::learning::HandoffContext;
    use crate::state_machine::{DialogueMode, MenuOption};
    use serde_json::json;
    use uuid::Uuid;

    fn state() -> ConversationState {
        ConversationState::new(Uuid::new_v4(), None)
    }

    #[test]
    fn test_end_conversation_short_circuits() {
        let mut s = state();
        let resp = AgentResponse::new(AgentIdentity::Coach, "bye")
            .with_menu(vec![MenuOption::new("1", "again", AgentIdentity::Coach)])
            .ending();
        assert_eq!(apply_response(&mut s, &resp), TurnOutcome::End);
        assert!(s.routing.menu.is_empty());
    }

    #[test]
    fn test_menu_and_suggestion_are_stored() {
        let mut s = state();
        let resp = AgentResponse::new(AgentIdentity::Coach, "What next?")
            .with_menu(vec![
                MenuOption::new("1", "Plan", AgentIdentity::Curriculum).with_action("generate_path"),
                MenuOption::new("2", "Quiz", AgentIdentity::Assessment).with_action("quiz"),
            ])
            .suggesting(AgentIdentity::Scout);

        assert_eq!(apply_response(&mut s, &resp), TurnOutcome::Persist);
        assert_eq!(s.routing.menu.len(), 2);
        assert_eq!(s.routing.pending_agent, Some(AgentIdentity::Scout));
        assert_eq!(s.current_agent, AgentIdentity::Scout);
    }

    #[test]
    fn test_handoff_is_held_and_its_suggestion_used() {
        let mut s = state();
        let handoff = HandoffContext::new(AgentIdentity::Assessment, "scored 40%")
            .with_gaps(["joins"])
            .suggesting(AgentIdentity::DrillSergeant);
        let resp = AgentResponse::new(AgentIdentity::Assessment, "Let's drill joins")
            .with_handoff(handoff.clone());

        apply_response(&mut s, &resp);
        assert_eq!(s.routing.pending_handoff, Some(handoff));
        assert_eq!(s.routing.pending_agent, Some(AgentIdentity::DrillSergeant));
    }

    #[test]
    fn test_end_mode_clears_mode() {
        let mut s = state();
        s.routing.mode = Some(DialogueMode::Explanation {
            topic: "recursion".to_string(),
        });
        let resp = AgentResponse::new(AgentIdentity::SocraticDialogue, "Great explanation")
            .with_data(json!({ "end_mode": true }));
        apply_response(&mut s, &resp);
        assert!(s.routing.mode.is_none());
    }
}
