//! Fallback intent classification via the completion service

use crate::agent::prompt::truncate_chars;
use crate::agent::AgentIdentity;
use crate::llm::{CompletionService, LlmError};
use crate::state_machine::{DialogueTurn, TurnRole};
use std::fmt::Write as _;
use std::sync::Arc;
use thiserror::Error;

const CLASSIFIER_TEMPERATURE: f32 = 0.1;
const CLASSIFIER_MAX_TOKENS: u32 = 20;
const CLASSIFIER_HISTORY_TURNS: usize = 5;
const CLASSIFIER_TURN_CHARS: usize = 100;
const CLASSIFIER_SYSTEM_PROMPT: &str =
    "You are a routing classifier. Respond with exactly one agent name.";

#[derive(Debug, Error)]
pub enum ClassificationError {
    #[error("classifier returned no recognizable agent: {0:?}")]
    Ambiguous(String),
    #[error("classifier completion failed: {0}")]
    Completion(#[from] LlmError),
}

/// Map a classifier reply to an agent by name
pub fn parse_classification(reply: &str) -> Result<AgentIdentity, ClassificationError> {
    let upper = reply.trim().to_uppercase();
    let agent = if upper.contains("SOCRATIC") {
        AgentIdentity::SocraticDialogue
    } else if upper.contains("ASSESSMENT") {
        AgentIdentity::Assessment
    } else if upper.contains("CURRICULUM") {
        AgentIdentity::Curriculum
    } else if upper.contains("SCOUT") {
        AgentIdentity::Scout
    } else if upper.contains("DRILL") || upper.contains("SERGEANT") {
        AgentIdentity::DrillSergeant
    } else if upper.contains("COACH") {
        AgentIdentity::Coach
    } else {
        return Err(ClassificationError::Ambiguous(reply.to_string()));
    };
    Ok(agent)
}

/// Picks an agent for messages no deterministic rule matched
#[derive(Clone)]
pub struct IntentClassifier {
    completion: Arc<dyn CompletionService>,
}

impl IntentClassifier {
    pub fn new(completion: Arc<dyn CompletionService>) -> Self {
        Self { completion }
    }

    pub fn build_prompt(message: &str, history: &[DialogueTurn]) -> String {
        let start = history.len().saturating_sub(CLASSIFIER_HISTORY_TURNS);
        let recent: Vec<String> = history[start..]
            .iter()
            .map(|turn| {
                let role = match turn.role {
                    TurnRole::User => "user",
                    TurnRole::Assistant => "assistant",
                    TurnRole::System => "system",
                };
                format!("{role}: {}", truncate_chars(&turn.text, CLASSIFIER_TURN_CHARS))
            })
            .collect();
        let context = if recent.is_empty() {
            "No previous context.".to_string()
        } else {
            recent.join("\n")
        };

        let mut prompt = format!(
            "Classify this user message to determine which learning agent should handle it.\n\n\
             User message: \"{message}\"\n\n\
             Recent conversation context:\n{context}\n\n\
             Available agents:\n"
        );
        for agent in AgentIdentity::ALL {
            let _ = writeln!(prompt, "- {}: {}", agent.classifier_label(), agent.purpose());
        }
        prompt.push_str("\nWhich agent should handle this? Respond with just the agent name.");
        prompt
    }

    /// Ask the completion service, without the Coach fallback
    pub async fn try_classify(
        &self,
        message: &str,
        history: &[DialogueTurn],
    ) -> Result<AgentIdentity, ClassificationError> {
        let prompt = Self::build_prompt(message, history);
        let reply = self
            .completion
            .complete(
                &prompt,
                Some(CLASSIFIER_SYSTEM_PROMPT),
                CLASSIFIER_TEMPERATURE,
                Some(CLASSIFIER_MAX_TOKENS),
            )
            .await?;
        parse_classification(&reply)
    }

    /// Classify, defaulting to the coach on any failure
    pub async fn classify(&self, message: &str, history: &[DialogueTurn]) -> AgentIdentity {
        match self.try_classify(message, history).await {
            Ok(agent) => agent,
            Err(e) => {
                tracing::warn!(error = %e, "Classification failed, defaulting to coach");
                AgentIdentity::Coach
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockCompletion;

    #[test]
    fn test_parse_classification() {
        assert_eq!(parse_classification(" socratic ").unwrap(), AgentIdentity::SocraticDialogue);
        assert_eq!(parse_classification("DRILL_SERGEANT").unwrap(), AgentIdentity::DrillSergeant);
        assert_eq!(parse_classification("Sergeant").unwrap(), AgentIdentity::DrillSergeant);
        assert_eq!(parse_classification("COACH.").unwrap(), AgentIdentity::Coach);
        assert!(matches!(
            parse_classification("I'm not sure"),
            Err(ClassificationError::Ambiguous(_))
        ));
    }

    #[test]
    fn test_prompt_lists_agents_and_truncates_history() {
        let history: Vec<DialogueTurn> = (0..8)
            .map(|i| DialogueTurn::user(format!("{i}{}", "z".repeat(150))))
            .collect();
        let prompt = IntentClassifier::build_prompt("hmm", &history);
        assert!(prompt.contains("User message: \"hmm\""));
        assert!(prompt.contains("- DRILL_SERGEANT: For targeted practice"));
        assert!(!prompt.contains("user: 2z"));
        assert!(prompt.contains("user: 3z"));
        assert!(!prompt.contains(&"z".repeat(100)));

        let empty = IntentClassifier::build_prompt("hmm", &[]);
        assert!(empty.contains("No previous context."));
    }

    #[tokio::test]
    async fn test_classify_uses_low_temperature_and_short_reply() {
        let mock = std::sync::Arc::new(MockCompletion::new());
        mock.queue_text("SCOUT");
        let classifier = IntentClassifier::new(mock.clone());
        assert_eq!(classifier.classify("hmm", &[]).await, AgentIdentity::Scout);

        let recorded = mock.recorded_requests();
        let request = &recorded[0];
        assert!((request.temperature - 0.1).abs() < f32::EPSILON);
        assert_eq!(request.max_tokens, Some(20));
        assert_eq!(request.system_prompt.as_deref(), Some(CLASSIFIER_SYSTEM_PROMPT));
    }

    #[tokio::test]
    async fn test_classify_defaults_to_coach() {
        let mock = std::sync::Arc::new(MockCompletion::new());
        mock.queue_text("no idea");
        let classifier = IntentClassifier::new(mock.clone());
        assert_eq!(classifier.classify("hmm", &[]).await, AgentIdentity::Coach);
        // Nothing queued: the completion error also falls back
        assert_eq!(classifier.classify("hmm", &[]).await, AgentIdentity::Coach);
    }
}
