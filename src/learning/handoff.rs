//! One-shot handoff notes passed from one agent to the next

use crate::agent::AgentIdentity;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Structured findings an agent leaves for whichever agent answers next.
///
/// Every field except the origin and summary is optional in practice: an
/// agent fills only what it knows. The orchestrator hands the most recent
/// note to the next invocation and then drops it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HandoffContext {
    pub from_agent: AgentIdentity,
    pub summary: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub gaps_identified: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub suggested_next_steps: Vec<String>,
    #[serde(
        default,
        skip_serializing_if = "BTreeMap::is_empty",
        deserialize_with = "clamped_levels"
    )]
    pub proficiency_observations: BTreeMap<String, f64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub key_points: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub topics_covered: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub learning_observations: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggested_next_agent: Option<AgentIdentity>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub outcomes: BTreeMap<String, Value>,
}

/// Stored notes pass through the same `[0, 1]` clamp as the builder
fn clamped_levels<'de, D>(deserializer: D) -> Result<BTreeMap<String, f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let levels = BTreeMap::<String, f64>::deserialize(deserializer)?;
    Ok(levels
        .into_iter()
        .map(|(topic, level)| (topic, crate::learning::clamp_unit(level)))
        .collect())
}

impl HandoffContext {
    pub fn new(from_agent: AgentIdentity, summary: impl Into<String>) -> Self {
        Self {
            from_agent,
            summary: summary.into(),
            timestamp: Utc::now(),
            gaps_identified: Vec::new(),
            suggested_next_steps: Vec::new(),
            proficiency_observations: BTreeMap::new(),
            key_points: Vec::new(),
            topics_covered: Vec::new(),
            learning_observations: Vec::new(),
            suggested_next_agent: None,
            outcomes: BTreeMap::new(),
        }
    }

    pub fn with_gaps<I, S>(mut self, gaps: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.gaps_identified.extend(gaps.into_iter().map(Into::into));
        self
    }

    pub fn with_next_steps<I, S>(mut self, steps: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.suggested_next_steps.extend(steps.into_iter().map(Into::into));
        self
    }

    /// Record an observed proficiency, clamped to `[0, 1]`
    pub fn with_proficiency(mut self, topic: impl Into<String>, level: f64) -> Self {
        self.proficiency_observations
            .insert(topic.into(), crate::learning::clamp_unit(level));
        self
    }

    pub fn with_key_points<I, S>(mut self, points: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.key_points.extend(points.into_iter().map(Into::into));
        self
    }

    pub fn with_topics<I, S>(mut self, topics: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.topics_covered.extend(topics.into_iter().map(Into::into));
        self
    }

    pub fn with_observation(mut self, observation: impl Into<String>) -> Self {
        self.learning_observations.push(observation.into());
        self
    }

    pub fn suggesting(mut self, agent: AgentIdentity) -> Self {
        self.suggested_next_agent = Some(agent);
        self
    }

    pub fn with_outcome(mut self, key: impl Into<String>, value: Value) -> Self {
        self.outcomes.insert(key.into(), value);
        self
    }
}
