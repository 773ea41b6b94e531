//! Cumulative per-user discoveries shared by all agents

use crate::agent::AgentIdentity;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Misconception {
    pub topic: String,
    pub misconception: String,
    pub discovered_by: AgentIdentity,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LearningObservation {
    pub observation: String,
    /// Always within `[0, 1]`
    pub confidence: f64,
    pub discovered_by: AgentIdentity,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApproachResult {
    pub approach: String,
    pub worked: bool,
    pub topic: String,
    pub discovered_by: AgentIdentity,
    pub timestamp: DateTime<Utc>,
}

/// Append-only record of what agents have learned about a user.
///
/// Unlike a handoff, nothing here is ever replaced: [`extend`](Self::extend)
/// only adds entries.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AgentDiscoveries {
    #[serde(default)]
    pub misconceptions: Vec<Misconception>,
    #[serde(default)]
    pub learning_observations: Vec<LearningObservation>,
    #[serde(default)]
    pub approach_results: Vec<ApproachResult>,
    #[serde(default)]
    pub strengths: Vec<String>,
    #[serde(default)]
    pub needs_support: Vec<String>,
}

impl AgentDiscoveries {
    pub fn misconception(
        agent: AgentIdentity,
        topic: impl Into<String>,
        misconception: impl Into<String>,
    ) -> Self {
        Self {
            misconceptions: vec![Misconception {
                topic: topic.into(),
                misconception: misconception.into(),
                discovered_by: agent,
                timestamp: Utc::now(),
            }],
            ..Self::default()
        }
    }

    pub fn observation(agent: AgentIdentity, observation: impl Into<String>, confidence: f64) -> Self {
        Self {
            learning_observations: vec![LearningObservation {
                observation: observation.into(),
                confidence: crate::learning::clamp_unit(confidence),
                discovered_by: agent,
                timestamp: Utc::now(),
            }],
            ..Self::default()
        }
    }

    pub fn approach_result(
        agent: AgentIdentity,
        approach: impl Into<String>,
        worked: bool,
        topic: impl Into<String>,
    ) -> Self {
        Self {
            approach_results: vec![ApproachResult {
                approach: approach.into(),
                worked,
                topic: topic.into(),
                discovered_by: agent,
                timestamp: Utc::now(),
            }],
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_strength(mut self, strength: impl Into<String>) -> Self {
        self.strengths.push(strength.into());
        self
    }

    #[must_use]
    pub fn with_support_need(mut self, need: impl Into<String>) -> Self {
        self.needs_support.push(need.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.misconceptions.is_empty()
            && self.learning_observations.is_empty()
            && self.approach_results.is_empty()
            && self.strengths.is_empty()
            && self.needs_support.is_empty()
    }

    /// Append every entry of `delta`
    pub fn extend(&mut self, delta: AgentDiscoveries) {
        self.misconceptions.extend(delta.misconceptions);
        self.learning_observations.extend(delta.learning_observations);
        self.approach_results.extend(delta.approach_results);
        self.strengths.extend(delta.strengths);
        self.needs_support.extend(delta.needs_support);
    }

    /// Approaches that worked, most recent last
    pub fn effective_approaches(&self) -> impl Iterator<Item = &ApproachResult> {
        self.approach_results.iter().filter(|r| r.worked)
    }
}
