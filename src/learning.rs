//! Shared learning records
//!
//! The durable learning context every agent reads and updates, the one-shot
//! handoff note, cumulative discoveries, and per-agent onboarding flows.

mod context;
mod discoveries;
mod handoff;
mod onboarding;
mod service;

pub use context::{ContextPatch, PathStage, SharedLearningContext, StageStatus, RECENT_TOPICS_CAPACITY};
pub use discoveries::{AgentDiscoveries, ApproachResult, LearningObservation, Misconception};
pub use handoff::HandoffContext;
pub use onboarding::{question_set, ContextTarget, OnboardingQuestion, OnboardingState};
pub use service::{DatabaseLearningService, LearningContextService, LearningError, LearningResult};

/// Clamp a proficiency or confidence value into `[0, 1]`.
///
/// NaN clamps to 0.
pub fn clamp_unit(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}
