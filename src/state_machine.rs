//! Conversation state machine
//!
//! The states are agent identities: whichever agent owns the conversation.
//! Router decisions move between them, and the only terminal condition is
//! deletion of the state.

pub mod state;
mod transition;

pub use state::{
    ConversationState, DialogueMode, DialogueTurn, MenuOption, RoutingContext, TransitionNote,
    TurnRole,
};
pub use transition::{apply_response, TurnOutcome};
