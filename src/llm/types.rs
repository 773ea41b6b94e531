//! Common types for completion requests

use crate::state_machine::{DialogueTurn, TurnRole};
use serde::{Deserialize, Serialize};

/// Message role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChatRole {
    User,
    Assistant,
}

/// One message of a history-aware completion
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Assistant,
            content: content.into(),
        }
    }

    /// Convert a dialogue turn; system turns have no chat equivalent
    pub fn from_turn(turn: &DialogueTurn) -> Option<Self> {
        match turn.role {
            TurnRole::User => Some(Self::user(turn.text.clone())),
            TurnRole::Assistant => Some(Self::assistant(turn.text.clone())),
            TurnRole::System => None,
        }
    }
}
