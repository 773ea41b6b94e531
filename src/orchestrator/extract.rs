//! Inferring learning-context updates from what the user says
//!
//! Best-effort: every failure is logged and yields no updates.

use crate::learning::{ContextPatch, LearningContextService, SharedLearningContext};
use crate::llm::{CompletionService, LlmError};
use regex::Regex;
use serde::Deserialize;
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use thiserror::Error;
use uuid::Uuid;

pub const DEFAULT_MIN_CONFIDENCE: f64 = 0.7;
const MIN_MESSAGE_CHARS: usize = 5;
const CACHE_CAPACITY: usize = 100;
const CACHE_EVICT: usize = 50;
const EXTRACTION_TEMPERATURE: f32 = 0.1;
const EXTRACTION_MAX_TOKENS: u32 = 500;

const EXTRACTION_SYSTEM_PROMPT: &str = "\
You analyze a learner's message for facts about how they want to learn.

Look for anything the learner states or strongly implies about:
- primary_goal: what they want to learn or become
- current_focus: a shift to a specific area within their path
- preference_<name>: how they like to learn (hands-on, visual, reading)
- constraint_<name>: time or resource limits
- background: what they already know

Reply with a JSON array only. Each element has field, value, confidence (0.0 to 1.0) and reason.
Reply [] when nothing applies.

Rules:
- Questions are not goals. \"What is ML?\" does not mean they want to learn ML.
- Explicit statements score 0.9 or more; implications 0.6 to 0.8.
- Only report current_focus for a clear change of topic.";

#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("extraction completion failed: {0}")]
    Completion(#[from] LlmError),
    #[error("extraction reply is not JSON: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid fence pattern: {0}")]
    Pattern(#[from] regex::Error),
}

/// Where an extracted value lands in the learning context
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContextField {
    PrimaryGoal,
    CurrentFocus,
    Preference(String),
    Constraint(String),
}

impl ContextField {
    /// Map a field name as the model reports it
    pub fn from_reported(field: &str) -> Option<Self> {
        let lowered = field.trim().to_lowercase();
        if lowered.contains("primary_goal") || lowered == "goal" {
            Some(ContextField::PrimaryGoal)
        } else if lowered.contains("focus") {
            Some(ContextField::CurrentFocus)
        } else if lowered.contains("preference") {
            Some(ContextField::Preference(suffix_key(&lowered, "preference")))
        } else if lowered.contains("constraint") {
            Some(ContextField::Constraint(suffix_key(&lowered, "constraint")))
        } else if lowered.contains("background") || lowered.contains("experience") {
            Some(ContextField::Constraint("background".to_string()))
        } else {
            None
        }
    }

    /// Name reported back for an applied update
    pub fn name(&self) -> String {
        match self {
            ContextField::PrimaryGoal => "primary_goal".to_string(),
            ContextField::CurrentFocus => "current_focus".to_string(),
            ContextField::Preference(key) => format!("preference_{key}"),
            ContextField::Constraint(key) => format!("constraint_{key}"),
        }
    }

    fn patch(&self, value: &str) -> ContextPatch {
        match self {
            ContextField::PrimaryGoal => ContextPatch::primary_goal(value),
            ContextField::CurrentFocus => ContextPatch::current_focus(value),
            ContextField::Preference(key) => ContextPatch::preference(key.clone(), value),
            ContextField::Constraint(key) => ContextPatch::constraint(key.clone(), value),
        }
    }
}

/// `preference_learning_style` -> `learning_style`; a bare prefix -> `general`
fn suffix_key(field: &str, prefix: &str) -> String {
    let key = field.replacen(prefix, "", 1);
    let key = key.trim_matches('_');
    if key.is_empty() {
        "general".to_string()
    } else {
        key.to_string()
    }
}

/// One inferred change to the learning context
#[derive(Debug, Clone, PartialEq)]
pub struct ContextUpdate {
    pub field: ContextField,
    pub value: String,
    pub confidence: f64,
    pub reason: String,
}

#[derive(Debug, Deserialize)]
struct ReportedUpdate {
    #[serde(default)]
    field: String,
    #[serde(default)]
    value: Value,
    #[serde(default = "default_confidence")]
    confidence: f64,
    #[serde(default)]
    reason: String,
}

fn default_confidence() -> f64 {
    0.5
}

/// Insertion-ordered cache of extraction results
#[derive(Default)]
struct ExtractionCache {
    entries: HashMap<String, Vec<ContextUpdate>>,
    order: VecDeque<String>,
}

impl ExtractionCache {
    fn get(&self, key: &str) -> Option<Vec<ContextUpdate>> {
        self.entries.get(key).cloned()
    }

    fn insert(&mut self, key: String, updates: Vec<ContextUpdate>) {
        if self.entries.insert(key.clone(), updates).is_none() {
            self.order.push_back(key);
        }
        if self.entries.len() > CACHE_CAPACITY {
            for old in self.order.drain(..CACHE_EVICT) {
                self.entries.remove(&old);
            }
        }
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}

pub struct ContextExtractor {
    completion: Arc<dyn CompletionService>,
    learning: Arc<dyn LearningContextService>,
    min_confidence: f64,
    fence: Regex,
    cache: Mutex<ExtractionCache>,
}

impl ContextExtractor {
    pub fn new(
        completion: Arc<dyn CompletionService>,
        learning: Arc<dyn LearningContextService>,
    ) -> Result<Self, ExtractionError> {
        Ok(Self {
            completion,
            learning,
            min_confidence: DEFAULT_MIN_CONFIDENCE,
            fence: Regex::new(r"(?s)^```[a-zA-Z]*\s*(.*?)\s*```$")?,
            cache: Mutex::new(ExtractionCache::default()),
        })
    }

    #[must_use]
    pub fn with_min_confidence(mut self, min_confidence: f64) -> Self {
        self.min_confidence = min_confidence;
        self
    }

    fn cache_key(user_id: Uuid, message: &str) -> String {
        format!("{user_id}:{:x}", Sha256::digest(message.as_bytes()))
    }

    /// Updates implied by the message. Never fails; failures yield none.
    pub async fn extract(
        &self,
        user_id: Uuid,
        message: &str,
        context: &SharedLearningContext,
    ) -> Vec<ContextUpdate> {
        if message.trim().chars().count() < MIN_MESSAGE_CHARS {
            return Vec::new();
        }

        let key = Self::cache_key(user_id, message);
        if let Ok(cache) = self.cache.lock() {
            if let Some(hit) = cache.get(&key) {
                return hit;
            }
        }

        match self.try_extract(message, context).await {
            Ok(updates) => {
                if let Ok(mut cache) = self.cache.lock() {
                    cache.insert(key, updates.clone());
                }
                updates
            }
            Err(e) => {
                tracing::warn!(user_id = %user_id, error = %e, "Context extraction failed");
                Vec::new()
            }
        }
    }

    async fn try_extract(
        &self,
        message: &str,
        context: &SharedLearningContext,
    ) -> Result<Vec<ContextUpdate>, ExtractionError> {
        let recent: Vec<&str> = context.recent_topics.iter().take(3).map(String::as_str).collect();
        let prompt = format!(
            "Current context:\n\
             - Primary goal: {}\n\
             - Current focus: {}\n\
             - Recent topics: {}\n\n\
             User message:\n\"{message}\"\n\n\
             Extract any learning context updates from this message. Return JSON array only.",
            context.primary_goal.as_deref().unwrap_or("Not set"),
            context.current_focus.as_deref().unwrap_or("Not set"),
            if recent.is_empty() { "None".to_string() } else { recent.join(", ") },
        );

        let reply = self
            .completion
            .complete(
                &prompt,
                Some(EXTRACTION_SYSTEM_PROMPT),
                EXTRACTION_TEMPERATURE,
                Some(EXTRACTION_MAX_TOKENS),
            )
            .await?;
        self.parse_reply(&reply)
    }

    /// Decode the model's JSON array. Anything other than an array is empty.
    pub fn parse_reply(&self, reply: &str) -> Result<Vec<ContextUpdate>, ExtractionError> {
        let trimmed = reply.trim();
        let body = self
            .fence
            .captures(trimmed)
            .and_then(|c| c.get(1))
            .map_or(trimmed, |m| m.as_str());

        let Value::Array(items) = serde_json::from_str::<Value>(body)? else {
            return Ok(Vec::new());
        };

        let updates = items
            .into_iter()
            .filter_map(|item| serde_json::from_value::<ReportedUpdate>(item).ok())
            .filter_map(|reported| {
                let field = ContextField::from_reported(&reported.field)?;
                let value = match reported.value {
                    Value::Null => return None,
                    Value::String(s) => s,
                    other => other.to_string(),
                };
                if value.trim().is_empty() {
                    return None;
                }
                Some(ContextUpdate {
                    field,
                    value,
                    confidence: reported.confidence,
                    reason: reported.reason,
                })
            })
            .collect();
        Ok(updates)
    }

    /// Apply updates at or above `min_confidence`. Returns applied field names.
    pub async fn apply_updates(
        &self,
        user_id: Uuid,
        updates: &[ContextUpdate],
        min_confidence: f64,
    ) -> Vec<String> {
        let mut applied = Vec::new();
        for update in updates {
            if update.confidence < min_confidence {
                tracing::debug!(
                    user_id = %user_id,
                    field = %update.field.name(),
                    confidence = update.confidence,
                    "Skipping low-confidence update"
                );
                continue;
            }
            match self
                .learning
                .update_context(user_id, update.field.patch(&update.value))
                .await
            {
                Ok(_) => {
                    tracing::info!(
                        user_id = %user_id,
                        field = %update.field.name(),
                        confidence = update.confidence,
                        "Applied context update"
                    );
                    applied.push(update.field.name());
                }
                Err(e) => {
                    tracing::error!(user_id = %user_id, field = %update.field.name(), error = %e, "Failed to apply context update");
                }
            }
        }
        applied
    }

    /// Extract from the message and apply with the configured threshold
    pub async fn extract_and_apply(&self, user_id: Uuid, message: &str) -> Vec<String> {
        let context = match self.learning.get_context(user_id).await {
            Ok(context) => context,
            Err(e) => {
                tracing::warn!(user_id = %user_id, error = %e, "Skipping extraction, context unavailable");
                return Vec::new();
            }
        };
        let updates = self.extract(user_id, message, &context).await;
        if updates.is_empty() {
            return Vec::new();
        }
        self.apply_updates(user_id, &updates, self.min_confidence).await
    }

    #[cfg(test)]
    fn cached_entries(&self) -> usize {
        self.cache.lock().map(|c| c.len()).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use crate::learning::DatabaseLearningService;
    use crate::testing::MockCompletion;

    fn setup() -> (Arc<MockCompletion>, Arc<dyn LearningContextService>, ContextExtractor) {
        let mock = Arc::new(MockCompletion::new());
        let learning: Arc<dyn LearningContextService> = Arc::new(DatabaseLearningService::new(
            Database::open_in_memory().unwrap(),
        ));
        let extractor = ContextExtractor::new(mock.clone(), learning.clone()).unwrap();
        (mock, learning, extractor)
    }

    #[test]
    fn test_field_mapping() {
        assert_eq!(ContextField::from_reported("goal"), Some(ContextField::PrimaryGoal));
        assert_eq!(ContextField::from_reported("PRIMARY_GOAL"), Some(ContextField::PrimaryGoal));
        assert_eq!(ContextField::from_reported("new_focus"), Some(ContextField::CurrentFocus));
        assert_eq!(
            ContextField::from_reported("preference_learning_style"),
            Some(ContextField::Preference("learning_style".to_string()))
        );
        assert_eq!(
            ContextField::from_reported("preference"),
            Some(ContextField::Preference("general".to_string()))
        );
        assert_eq!(
            ContextField::from_reported("constraint_time"),
            Some(ContextField::Constraint("time".to_string()))
        );
        assert_eq!(
            ContextField::from_reported("experience"),
            Some(ContextField::Constraint("background".to_string()))
        );
        assert_eq!(ContextField::from_reported("mood"), None);
    }

    #[test]
    fn test_parse_reply_strips_fences() {
        let (_, _, extractor) = setup();
        let reply = "```json\n[{\"field\": \"goal\", \"value\": \"Rust\", \"confidence\": 0.95, \"reason\": \"stated\"},\
                     {\"field\": \"mood\", \"value\": \"happy\", \"confidence\": 0.9}]\n```";
        let updates = extractor.parse_reply(reply).unwrap();
        assert_eq!(updates.len(), 1);
        assert_eq!(updates[0].field, ContextField::PrimaryGoal);
        assert_eq!(updates[0].value, "Rust");

        assert!(extractor.parse_reply("{\"field\": \"goal\"}").unwrap().is_empty());
        assert!(extractor.parse_reply("not json").is_err());
    }

    #[tokio::test]
    async fn test_short_messages_skip_the_model() {
        let (mock, _, extractor) = setup();
        let updates = extractor
            .extract(Uuid::new_v4(), " hi  ", &SharedLearningContext::default())
            .await;
        assert!(updates.is_empty());
        assert!(mock.recorded_requests().is_empty());
    }

    #[tokio::test]
    async fn test_results_are_cached_per_user_and_message() {
        let (mock, _, extractor) = setup();
        mock.queue_text("[{\"field\": \"goal\", \"value\": \"sql\", \"confidence\": 0.9}]");
        let user = Uuid::new_v4();
        let ctx = SharedLearningContext::default();

        let first = extractor.extract(user, "I want to learn sql", &ctx).await;
        let second = extractor.extract(user, "I want to learn sql", &ctx).await;
        assert_eq!(first, second);
        assert_eq!(mock.recorded_requests().len(), 1);

        let recorded = mock.recorded_requests();
        let request = &recorded[0];
        assert_eq!(request.max_tokens, Some(500));
        assert!(request.messages[0].content.contains("Primary goal: Not set"));
    }

    #[tokio::test]
    async fn test_cache_evicts_oldest_half_when_full() {
        let (mock, _, extractor) = setup();
        let user = Uuid::new_v4();
        let ctx = SharedLearningContext::default();
        for i in 0..=CACHE_CAPACITY {
            mock.queue_text("[]");
            extractor.extract(user, &format!("message number {i}"), &ctx).await;
        }
        assert_eq!(extractor.cached_entries(), CACHE_CAPACITY + 1 - CACHE_EVICT);

        // The first message was evicted and costs another call
        mock.queue_text("[]");
        let before = mock.recorded_requests().len();
        extractor.extract(user, "message number 0", &ctx).await;
        assert_eq!(mock.recorded_requests().len(), before + 1);
    }

    #[tokio::test]
    async fn test_failures_yield_no_updates() {
        let (mock, _, extractor) = setup();
        mock.queue_text("I think they want to learn SQL");
        let user = Uuid::new_v4();
        let ctx = SharedLearningContext::default();
        assert!(extractor.extract(user, "I want to learn sql", &ctx).await.is_empty());
        // Nothing queued: completion error
        assert!(extractor.extract(user, "something else entirely", &ctx).await.is_empty());
    }

    #[tokio::test]
    async fn test_apply_respects_confidence_threshold() {
        let (mock, learning, extractor) = setup();
        mock.queue_text(
            "[{\"field\": \"primary_goal\", \"value\": \"ML\", \"confidence\": 0.9},\
              {\"field\": \"constraint_time\", \"value\": \"30 min/day\", \"confidence\": 0.7},\
              {\"field\": \"preference_style\", \"value\": \"visual\", \"confidence\": 0.6}]",
        );
        let user = Uuid::new_v4();
        let applied = extractor
            .extract_and_apply(user, "I want to learn ML in 30 minutes a day")
            .await;
        assert_eq!(applied, vec!["primary_goal", "constraint_time"]);

        let ctx = learning.get_context(user).await.unwrap();
        assert_eq!(ctx.primary_goal.as_deref(), Some("ML"));
        assert_eq!(ctx.constraints["time"], "30 min/day");
        assert!(ctx.preferences.is_empty());
    }
}
