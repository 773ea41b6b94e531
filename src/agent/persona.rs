//! LLM-backed agent defined by a persona prompt

use super::prompt::{PromptBuilder, DEFAULT_HISTORY_WINDOW};
use super::{Agent, AgentContext, AgentError, AgentIdentity, AgentResponse};
use crate::learning::{ContextPatch, LearningContextService, OnboardingState};
use crate::llm::CompletionService;
use async_trait::async_trait;
use serde_json::json;
use std::sync::Arc;

/// Base system prompt for each agent
pub fn default_persona(agent: AgentIdentity) -> &'static str {
    match agent {
        AgentIdentity::Coach => {
            "You are a supportive learning coach. Be warm but not over-the-top. \
             Help the learner stay motivated, manage their sessions, and decide what to do next. \
             Keep responses brief and helpful."
        }
        AgentIdentity::Curriculum => {
            "You are a curriculum planner. Build realistic learning paths with clear stages \
             and milestones that fit the learner's time and background."
        }
        AgentIdentity::Assessment => {
            "You are a fair and helpful quiz master. Ask one question at a time, \
             evaluate answers honestly, and be encouraging."
        }
        AgentIdentity::SocraticDialogue => {
            "You are a Socratic tutor using the Feynman technique. Ask the learner to explain \
             the concept in simple terms, probe gaps with questions, and never lecture."
        }
        AgentIdentity::Scout => {
            "You are a content scout. Recommend focused reading and summarize material \
             relevant to the learner's current goal."
        }
        AgentIdentity::DrillSergeant => {
            "You are a drill sergeant for deliberate practice. Give short, targeted exercises \
             on weak areas and evaluate answers fairly but strictly."
        }
    }
}

/// An agent that answers by prompting the completion service with its
/// persona and the rendered context.
///
/// Agents with an onboarding question set ask those questions first, one
/// per turn, while the learner has no primary goal on record.
pub struct PersonaAgent {
    identity: AgentIdentity,
    persona: String,
    completion: Arc<dyn CompletionService>,
    learning: Arc<dyn LearningContextService>,
    temperature: f32,
    history_window: usize,
}

impl PersonaAgent {
    pub fn new(
        identity: AgentIdentity,
        completion: Arc<dyn CompletionService>,
        learning: Arc<dyn LearningContextService>,
    ) -> Self {
        Self {
            identity,
            persona: default_persona(identity).to_string(),
            completion,
            learning,
            temperature: 0.7,
            history_window: DEFAULT_HISTORY_WINDOW,
        }
    }

    #[must_use]
    pub fn with_persona(mut self, persona: impl Into<String>) -> Self {
        self.persona = persona.into();
        self
    }

    #[must_use]
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    #[must_use]
    pub fn with_history_window(mut self, window: usize) -> Self {
        self.history_window = window;
        self
    }

    /// One agent per identity, sharing the same backends
    pub fn full_roster(
        completion: &Arc<dyn CompletionService>,
        learning: &Arc<dyn LearningContextService>,
    ) -> Vec<Arc<dyn Agent>> {
        AgentIdentity::ALL
            .into_iter()
            .map(|identity| {
                Arc::new(Self::new(identity, Arc::clone(completion), Arc::clone(learning)))
                    as Arc<dyn Agent>
            })
            .collect()
    }

    /// Advance the onboarding flow by one step.
    ///
    /// Returns `None` once onboarding has just finished, so the caller
    /// carries on with a normal reply.
    async fn onboarding_step(
        &self,
        ctx: &AgentContext,
        message: &str,
        existing: Option<OnboardingState>,
    ) -> Result<Option<AgentResponse>, AgentError> {
        let mut state = match existing {
            Some(state) => state,
            None => {
                let mut state = OnboardingState::new(self.identity);
                let Some(question) = state.ask_next() else {
                    return Ok(None);
                };
                self.learning.save_onboarding(ctx.user_id, &state).await?;
                tracing::info!(user_id = %ctx.user_id, agent = %self.identity, "Starting onboarding");
                return Ok(Some(
                    AgentResponse::new(self.identity, question)
                        .with_data(json!({ "onboarding": true })),
                ));
            }
        };

        if let Some(question) = state.record_answer(message) {
            self.learning
                .update_context(ctx.user_id, question.target.patch(message.trim()))
                .await?;
        }

        if let Some(next) = state.ask_next() {
            self.learning.save_onboarding(ctx.user_id, &state).await?;
            return Ok(Some(
                AgentResponse::new(self.identity, next).with_data(json!({ "onboarding": true })),
            ));
        }

        self.learning
            .update_context(ctx.user_id, ContextPatch::onboarding_complete())
            .await?;
        self.learning
            .clear_onboarding(ctx.user_id, self.identity)
            .await?;
        tracing::info!(
            user_id = %ctx.user_id,
            agent = %self.identity,
            answers = state.answers.len(),
            "Onboarding complete"
        );
        Ok(None)
    }
}

#[async_trait]
impl Agent for PersonaAgent {
    fn identity(&self) -> AgentIdentity {
        self.identity
    }

    async fn respond(&self, ctx: &AgentContext, message: &str) -> Result<AgentResponse, AgentError> {
        let mut ctx = ctx.clone();
        // An unfinished flow resumes even once its first answer set a goal
        let existing = self.learning.get_onboarding(ctx.user_id, self.identity).await?;
        let starts_fresh = ctx.learning.primary_goal.is_none()
            && !OnboardingState::new(self.identity).is_complete();
        if existing.is_some() || starts_fresh {
            if let Some(reply) = self.onboarding_step(&ctx, message, existing).await? {
                return Ok(reply);
            }
            // Answers were written through; pick them up for the reply
            ctx.learning = self.learning.get_context(ctx.user_id).await?;
        }

        let builder = PromptBuilder::new(&ctx).with_window(self.history_window);
        let system = builder.system_prompt(&self.persona);
        let messages = builder.build_messages(message);
        let text = self
            .completion
            .complete_with_history(&messages, Some(&system), self.temperature)
            .await?;

        let mut response = AgentResponse::new(self.identity, text.trim());
        if let Some(action) = &ctx.selected_action {
            response = response.with_action(action.clone(), json!({}));
        }
        Ok(response)
    }
}
