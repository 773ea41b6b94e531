//! Agent reply types

use super::AgentIdentity;
use crate::learning::{AgentDiscoveries, HandoffContext};
use crate::state_machine::MenuOption;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A side effect an agent reports having performed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentAction {
    pub agent: AgentIdentity,
    pub action: String,
    #[serde(default)]
    pub details: Value,
    pub timestamp: DateTime<Utc>,
}

impl AgentAction {
    pub fn new(agent: AgentIdentity, action: impl Into<String>, details: Value) -> Self {
        Self {
            agent,
            action: action.into(),
            details,
            timestamp: Utc::now(),
        }
    }
}

/// What an agent returns for one message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentResponse {
    pub agent: AgentIdentity,
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(default)]
    pub end_conversation: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub menu: Vec<MenuOption>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggested_next_agent: Option<AgentIdentity>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub handoff: Option<HandoffContext>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub discoveries: Option<AgentDiscoveries>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub actions: Vec<AgentAction>,
}

impl AgentResponse {
    pub fn new(agent: AgentIdentity, text: impl Into<String>) -> Self {
        Self {
            agent,
            text: text.into(),
            data: None,
            end_conversation: false,
            menu: Vec::new(),
            suggested_next_agent: None,
            handoff: None,
            discoveries: None,
            actions: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }

    #[must_use]
    pub fn with_menu(mut self, menu: Vec<MenuOption>) -> Self {
        self.menu = menu;
        self
    }

    #[must_use]
    pub fn suggesting(mut self, agent: AgentIdentity) -> Self {
        self.suggested_next_agent = Some(agent);
        self
    }

    #[must_use]
    pub fn with_handoff(mut self, handoff: HandoffContext) -> Self {
        self.handoff = Some(handoff);
        self
    }

    #[must_use]
    pub fn with_discoveries(mut self, discoveries: AgentDiscoveries) -> Self {
        self.discoveries = Some(discoveries);
        self
    }

    #[must_use]
    pub fn with_action(mut self, action: impl Into<String>, details: Value) -> Self {
        self.actions.push(AgentAction::new(self.agent, action, details));
        self
    }

    #[must_use]
    pub fn ending(mut self) -> Self {
        self.end_conversation = true;
        self
    }

    /// Whether the agent asked for its dialogue mode to end (`data.end_mode`)
    pub fn ends_mode(&self) -> bool {
        self.data
            .as_ref()
            .and_then(|d| d.get("end_mode"))
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_ends_mode_reads_data_flag() {
        let plain = AgentResponse::new(AgentIdentity::Assessment, "Q2?");
        assert!(!plain.ends_mode());
        let done = AgentResponse::new(AgentIdentity::Assessment, "Done!")
            .with_data(json!({ "end_mode": true, "score": 0.8 }));
        assert!(done.ends_mode());
    }

    #[test]
    fn test_actions_carry_responding_agent() {
        let resp = AgentResponse::new(AgentIdentity::Curriculum, "Path ready")
            .with_action("generate_path", json!({ "stages": 4 }));
        assert_eq!(resp.actions[0].agent, AgentIdentity::Curriculum);
        assert_eq!(resp.actions[0].action, "generate_path");
    }
}
