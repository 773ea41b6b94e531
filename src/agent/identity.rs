//! Agent identities

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// The closed set of specialist agents
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentIdentity {
    Coach,
    Curriculum,
    Assessment,
    #[serde(rename = "socratic")]
    SocraticDialogue,
    Scout,
    DrillSergeant,
}

impl AgentIdentity {
    pub const ALL: [AgentIdentity; 6] = [
        AgentIdentity::Coach,
        AgentIdentity::Curriculum,
        AgentIdentity::Assessment,
        AgentIdentity::SocraticDialogue,
        AgentIdentity::Scout,
        AgentIdentity::DrillSergeant,
    ];

    /// Stable string tag used in persisted state
    pub fn as_str(self) -> &'static str {
        match self {
            AgentIdentity::Coach => "coach",
            AgentIdentity::Curriculum => "curriculum",
            AgentIdentity::Assessment => "assessment",
            AgentIdentity::SocraticDialogue => "socratic",
            AgentIdentity::Scout => "scout",
            AgentIdentity::DrillSergeant => "drill_sergeant",
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            AgentIdentity::Coach => "Coach",
            AgentIdentity::Curriculum => "Curriculum Planner",
            AgentIdentity::Assessment => "Assessment",
            AgentIdentity::SocraticDialogue => "Socratic Tutor",
            AgentIdentity::Scout => "Scout",
            AgentIdentity::DrillSergeant => "Drill Sergeant",
        }
    }

    /// Upper-case label the intent classifier is asked to answer with
    pub fn classifier_label(self) -> &'static str {
        match self {
            AgentIdentity::Coach => "COACH",
            AgentIdentity::Curriculum => "CURRICULUM",
            AgentIdentity::Assessment => "ASSESSMENT",
            AgentIdentity::SocraticDialogue => "SOCRATIC",
            AgentIdentity::Scout => "SCOUT",
            AgentIdentity::DrillSergeant => "DRILL_SERGEANT",
        }
    }

    /// What the agent is for, as shown to the intent classifier
    pub fn purpose(self) -> &'static str {
        match self {
            AgentIdentity::Coach => {
                "For motivation, session management, encouragement, general questions"
            }
            AgentIdentity::Curriculum => {
                "For learning path planning, topic recommendations, scheduling"
            }
            AgentIdentity::Assessment => "For quizzes, testing knowledge, evaluating understanding",
            AgentIdentity::SocraticDialogue => {
                "For Feynman technique, explanations, understanding concepts"
            }
            AgentIdentity::Scout => {
                "For content discovery, reading recommendations, summarization"
            }
            AgentIdentity::DrillSergeant => {
                "For targeted practice, exercises, hands-on projects"
            }
        }
    }
}

impl fmt::Display for AgentIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown agent: {0}")]
pub struct UnknownAgentTag(pub String);

impl FromStr for AgentIdentity {
    type Err = UnknownAgentTag;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "coach" => Ok(AgentIdentity::Coach),
            "curriculum" => Ok(AgentIdentity::Curriculum),
            "assessment" => Ok(AgentIdentity::Assessment),
            "socratic" | "socratic_dialogue" => Ok(AgentIdentity::SocraticDialogue),
            "scout" => Ok(AgentIdentity::Scout),
            "drill_sergeant" | "drill" => Ok(AgentIdentity::DrillSergeant),
            _ => Err(UnknownAgentTag(s.to_string())),
        }
    }
}
