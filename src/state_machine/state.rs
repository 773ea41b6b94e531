//! Conversation state types

use crate::agent::AgentIdentity;
use crate::learning::HandoffContext;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ============================================================================
// Dialogue history
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnRole {
    User,
    Assistant,
    System,
}

/// One entry of conversation history; never modified once appended
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DialogueTurn {
    pub role: TurnRole,
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent: Option<AgentIdentity>,
    pub timestamp: DateTime<Utc>,
}

impl DialogueTurn {
    pub fn user(text: impl Into<String>) -> Self {
        Self::new(TurnRole::User, text, None)
    }

    pub fn assistant(text: impl Into<String>, agent: AgentIdentity) -> Self {
        Self::new(TurnRole::Assistant, text, Some(agent))
    }

    pub fn system(text: impl Into<String>) -> Self {
        Self::new(TurnRole::System, text, None)
    }

    fn new(role: TurnRole, text: impl Into<String>, agent: Option<AgentIdentity>) -> Self {
        Self {
            role,
            text: text.into(),
            agent,
            timestamp: Utc::now(),
        }
    }
}

// ============================================================================
// Ephemeral routing context
// ============================================================================

/// A numbered choice offered by one reply and consumed by the next message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MenuOption {
    pub number: String,
    pub label: String,
    pub target: AgentIdentity,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,
}

impl MenuOption {
    pub fn new(number: impl Into<String>, label: impl Into<String>, target: AgentIdentity) -> Self {
        Self {
            number: number.into(),
            label: label.into(),
            target,
            action: None,
        }
    }

    #[must_use]
    pub fn with_action(mut self, action: impl Into<String>) -> Self {
        self.action = Some(action.into());
        self
    }
}

/// A flag that pins routing to one agent until cleared
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DialogueMode {
    /// Explain-it-back dialogue on one topic
    Explanation { topic: String },
    Quiz {
        topics: Vec<String>,
        question_count: u32,
    },
}

impl DialogueMode {
    /// The agent that owns turns while this mode is active
    pub fn owner(&self) -> AgentIdentity {
        match self {
            DialogueMode::Explanation { .. } => AgentIdentity::SocraticDialogue,
            DialogueMode::Quiz { .. } => AgentIdentity::Assessment,
        }
    }
}

/// Left by an explicit transition for the receiving agent
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionNote {
    pub from: AgentIdentity,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Hints that steer the next turn's routing and agent context
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RoutingContext {
    /// Numbers are unique
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub menu: Vec<MenuOption>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pending_agent: Option<AgentIdentity>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<DialogueMode>,
    /// Action picked from a menu, for the target agent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selected_action: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pending_handoff: Option<HandoffContext>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transition: Option<TransitionNote>,
}

impl RoutingContext {
    /// Replace the live menu. Later options reusing a number are dropped.
    pub fn set_menu(&mut self, options: impl IntoIterator<Item = MenuOption>) {
        self.menu.clear();
        for option in options {
            if self.menu.iter().any(|o| o.number == option.number) {
                tracing::warn!(number = %option.number, "Dropping duplicate menu number");
                continue;
            }
            self.menu.push(option);
        }
    }

    pub fn menu_option(&self, number: &str) -> Option<&MenuOption> {
        self.menu.iter().find(|o| o.number == number)
    }

    /// Discard the single-use menu and pending suggestion
    pub fn clear_stale_hints(&mut self) {
        if !self.menu.is_empty() || self.pending_agent.is_some() {
            tracing::debug!(
                menu_len = self.menu.len(),
                pending = ?self.pending_agent,
                "Clearing stale menu and suggestion"
            );
        }
        self.menu.clear();
        self.pending_agent = None;
    }
}

// ============================================================================
// Conversation state
// ============================================================================

/// Which agent owns a user's conversation, plus its history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationState {
    pub user_id: Uuid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<Uuid>,
    pub current_agent: AgentIdentity,
    #[serde(default)]
    pub history: Vec<DialogueTurn>,
    #[serde(default)]
    pub routing: RoutingContext,
    pub started_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
}

impl ConversationState {
    /// Fresh state owned by the coach
    pub fn new(user_id: Uuid, session_id: Option<Uuid>) -> Self {
        let now = Utc::now();
        Self {
            user_id,
            session_id,
            current_agent: AgentIdentity::Coach,
            history: Vec::new(),
            routing: RoutingContext::default(),
            started_at: now,
            last_activity: now,
        }
    }

    pub fn push_turn(&mut self, turn: DialogueTurn) {
        self.last_activity = turn.timestamp;
        self.history.push(turn);
    }

    /// Append a user message and the agent's reply, in that order
    pub fn record_exchange(&mut self, user_text: &str, reply_text: &str, agent: AgentIdentity) {
        self.push_turn(DialogueTurn::user(user_text));
        self.push_turn(DialogueTurn::assistant(reply_text, agent));
    }

    /// The last `n` turns, oldest first
    pub fn recent_turns(&self, n: usize) -> &[DialogueTurn] {
        let start = self.history.len().saturating_sub(n);
        &self.history[start..]
    }
}
