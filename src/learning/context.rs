//! Durable per-user learning context

use super::clamp_unit;
use crate::profile::UserProfile;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, VecDeque};

/// Most recent topics kept per user
pub const RECENT_TOPICS_CAPACITY: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageStatus {
    #[default]
    NotStarted,
    InProgress,
    Completed,
}

/// One stage of a learning path
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PathStage {
    pub topic: String,
    #[serde(default)]
    pub status: StageStatus,
    /// Always within `[0, 1]`
    #[serde(default)]
    pub progress: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub milestone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_goal: Option<String>,
}

impl PathStage {
    pub fn new(topic: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            status: StageStatus::NotStarted,
            progress: 0.0,
            milestone: None,
            parent_goal: None,
        }
    }

    /// Set progress (clamped) and derive status unless one is given
    pub fn set_progress(&mut self, progress: f64, status: Option<StageStatus>) {
        self.progress = clamp_unit(progress);
        self.status = status.unwrap_or(if self.progress >= 1.0 {
            StageStatus::Completed
        } else if self.progress > 0.0 {
            StageStatus::InProgress
        } else {
            self.status
        });
    }
}

/// Goals, preferences, and progress shared by every agent.
///
/// Created lazily on first read and updated incrementally; never deleted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SharedLearningContext {
    #[serde(default)]
    pub primary_goal: Option<String>,
    #[serde(default)]
    pub current_focus: Option<String>,
    #[serde(default)]
    pub learning_path: Vec<PathStage>,
    #[serde(default)]
    pub preferences: BTreeMap<String, String>,
    /// Most recent first, de-duplicated, at most [`RECENT_TOPICS_CAPACITY`]
    #[serde(default)]
    pub recent_topics: VecDeque<String>,
    #[serde(default)]
    pub identified_gaps: Vec<String>,
    #[serde(default)]
    pub constraints: BTreeMap<String, String>,
    #[serde(default)]
    pub proficiency_levels: BTreeMap<String, f64>,
    #[serde(default)]
    pub onboarding_complete: bool,
    pub updated_at: DateTime<Utc>,
}

impl Default for SharedLearningContext {
    fn default() -> Self {
        Self {
            primary_goal: None,
            current_focus: None,
            learning_path: Vec::new(),
            preferences: BTreeMap::new(),
            recent_topics: VecDeque::new(),
            identified_gaps: Vec::new(),
            constraints: BTreeMap::new(),
            proficiency_levels: BTreeMap::new(),
            onboarding_complete: false,
            updated_at: Utc::now(),
        }
    }
}

impl SharedLearningContext {
    pub fn is_empty(&self) -> bool {
        self.primary_goal.is_none()
            && self.current_focus.is_none()
            && self.learning_path.is_empty()
            && self.preferences.is_empty()
            && self.constraints.is_empty()
    }

    pub fn set_primary_goal(&mut self, goal: impl Into<String>) {
        self.primary_goal = Some(goal.into());
        self.touch();
    }

    /// Set the focus and push it onto the recent topics
    pub fn set_current_focus(&mut self, focus: impl Into<String>) {
        let focus = focus.into();
        self.push_recent_topic(focus.clone());
        self.current_focus = Some(focus);
        self.touch();
    }

    pub fn push_recent_topic(&mut self, topic: impl Into<String>) {
        let topic = topic.into();
        if topic.trim().is_empty() {
            return;
        }
        self.recent_topics.retain(|t| *t != topic);
        self.recent_topics.push_front(topic);
        self.recent_topics.truncate(RECENT_TOPICS_CAPACITY);
    }

    pub fn set_preference(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.preferences.insert(key.into(), value.into());
        self.touch();
    }

    pub fn set_constraint(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.constraints.insert(key.into(), value.into());
        self.touch();
    }

    pub fn add_gap(&mut self, gap: impl Into<String>) {
        let gap = gap.into();
        if !self.identified_gaps.contains(&gap) {
            self.identified_gaps.push(gap);
        }
        self.touch();
    }

    /// Record a proficiency level, clamped to `[0, 1]`
    pub fn set_proficiency(&mut self, topic: impl Into<String>, level: f64) {
        self.proficiency_levels.insert(topic.into(), clamp_unit(level));
        self.touch();
    }

    /// Insert a stage, replacing any stage with the same topic
    pub fn upsert_stage(&mut self, stage: PathStage) {
        match self.learning_path.iter_mut().find(|s| s.topic == stage.topic) {
            Some(existing) => *existing = stage,
            None => self.learning_path.push(stage),
        }
        self.touch();
    }

    /// Update progress for a stage, returning false if no stage has that topic
    pub fn update_stage_progress(
        &mut self,
        topic: &str,
        progress: f64,
        status: Option<StageStatus>,
    ) -> bool {
        let Some(stage) = self.learning_path.iter_mut().find(|s| s.topic == topic) else {
            return false;
        };
        stage.set_progress(progress, status);
        self.touch();
        true
    }

    /// Copy profile facts into an empty context. Returns whether anything changed.
    pub fn seed_from_profile(&mut self, profile: &UserProfile) -> bool {
        if self.primary_goal.is_some() {
            return false;
        }
        let mut changed = false;
        if let Some(goal) = profile.goals.first() {
            self.primary_goal = Some(goal.clone());
            changed = true;
        }
        if let Some(minutes) = profile.time_budget_minutes {
            self.constraints
                .insert("time_per_day_minutes".to_string(), minutes.to_string());
            changed = true;
        }
        if let Some(background) = &profile.background {
            self.constraints
                .insert("background".to_string(), background.clone());
            changed = true;
        }
        if let Some(style) = &profile.learning_style {
            self.preferences
                .insert("learning_style".to_string(), style.clone());
            changed = true;
        }
        if changed {
            self.touch();
        }
        changed
    }

    pub fn apply(&mut self, patch: ContextPatch) {
        if let Some(goal) = patch.primary_goal {
            self.set_primary_goal(goal);
        }
        if let Some(focus) = patch.current_focus {
            self.set_current_focus(focus);
        }
        if let Some((key, value)) = patch.preference {
            self.set_preference(key, value);
        }
        if let Some((key, value)) = patch.constraint {
            self.set_constraint(key, value);
        }
        if let Some(gap) = patch.gap {
            self.add_gap(gap);
        }
        if let Some((topic, level)) = patch.proficiency {
            self.set_proficiency(topic, level);
        }
        if let Some(stage) = patch.stage {
            self.upsert_stage(stage);
        }
        if let Some((topic, progress)) = patch.stage_progress {
            self.update_stage_progress(&topic, progress, None);
        }
        if patch.onboarding_complete {
            self.onboarding_complete = true;
            self.touch();
        }
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

/// Partial update to a [`SharedLearningContext`]; only `Some` fields apply
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ContextPatch {
    pub primary_goal: Option<String>,
    pub current_focus: Option<String>,
    pub preference: Option<(String, String)>,
    pub constraint: Option<(String, String)>,
    pub gap: Option<String>,
    pub proficiency: Option<(String, f64)>,
    pub stage: Option<PathStage>,
    pub stage_progress: Option<(String, f64)>,
    pub onboarding_complete: bool,
}

impl ContextPatch {
    pub fn primary_goal(goal: impl Into<String>) -> Self {
        Self {
            primary_goal: Some(goal.into()),
            ..Self::default()
        }
    }

    pub fn current_focus(focus: impl Into<String>) -> Self {
        Self {
            current_focus: Some(focus.into()),
            ..Self::default()
        }
    }

    pub fn preference(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            preference: Some((key.into(), value.into())),
            ..Self::default()
        }
    }

    pub fn constraint(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            constraint: Some((key.into(), value.into())),
            ..Self::default()
        }
    }

    pub fn gap(gap: impl Into<String>) -> Self {
        Self {
            gap: Some(gap.into()),
            ..Self::default()
        }
    }

    pub fn proficiency(topic: impl Into<String>, level: f64) -> Self {
        Self {
            proficiency: Some((topic.into(), level)),
            ..Self::default()
        }
    }

    pub fn stage(stage: PathStage) -> Self {
        Self {
            stage: Some(stage),
            ..Self::default()
        }
    }

    pub fn stage_progress(topic: impl Into<String>, progress: f64) -> Self {
        Self {
            stage_progress: Some((topic.into(), progress)),
            ..Self::default()
        }
    }

    pub fn onboarding_complete() -> Self {
        Self {
            onboarding_complete: true,
            ..Self::default()
        }
    }
}
