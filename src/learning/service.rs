//! Learning context service
//!
//! The seam agents and the orchestrator use to read and update the
//! per-user learning records.

use super::context::{ContextPatch, SharedLearningContext};
use super::discoveries::AgentDiscoveries;
use super::onboarding::OnboardingState;
use crate::agent::AgentIdentity;
use crate::db::{Database, DbError, DocumentTable};
use crate::profile::UserProfile;
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum LearningError {
    #[error("learning store error: {0}")]
    Store(#[from] DbError),
}

pub type LearningResult<T> = Result<T, LearningError>;

/// Storage and update operations for the shared learning records
#[async_trait]
pub trait LearningContextService: Send + Sync {
    /// Get the user's context, creating an empty one if absent
    async fn get_context(&self, user_id: Uuid) -> LearningResult<SharedLearningContext>;

    async fn save_context(
        &self,
        user_id: Uuid,
        context: &SharedLearningContext,
    ) -> LearningResult<()>;

    async fn get_discoveries(&self, user_id: Uuid) -> LearningResult<AgentDiscoveries>;

    async fn save_discoveries(
        &self,
        user_id: Uuid,
        discoveries: &AgentDiscoveries,
    ) -> LearningResult<()>;

    async fn get_onboarding(
        &self,
        user_id: Uuid,
        agent: AgentIdentity,
    ) -> LearningResult<Option<OnboardingState>>;

    async fn save_onboarding(&self, user_id: Uuid, state: &OnboardingState) -> LearningResult<()>;

    async fn clear_onboarding(&self, user_id: Uuid, agent: AgentIdentity) -> LearningResult<()>;

    /// Apply a partial update and return the resulting context
    async fn update_context(
        &self,
        user_id: Uuid,
        patch: ContextPatch,
    ) -> LearningResult<SharedLearningContext> {
        let mut context = self.get_context(user_id).await?;
        context.apply(patch);
        self.save_context(user_id, &context).await?;
        Ok(context)
    }

    /// Seed an empty context from a profile. Returns whether anything changed.
    async fn seed_from_profile(
        &self,
        user_id: Uuid,
        profile: &UserProfile,
    ) -> LearningResult<bool> {
        let mut context = self.get_context(user_id).await?;
        if !context.seed_from_profile(profile) {
            return Ok(false);
        }
        self.save_context(user_id, &context).await?;
        Ok(true)
    }

    /// Append to the user's cumulative discoveries
    async fn append_discoveries(
        &self,
        user_id: Uuid,
        delta: AgentDiscoveries,
    ) -> LearningResult<AgentDiscoveries> {
        let mut discoveries = self.get_discoveries(user_id).await?;
        discoveries.extend(delta);
        self.save_discoveries(user_id, &discoveries).await?;
        Ok(discoveries)
    }
}

#[async_trait]
impl<T: LearningContextService + ?Sized> LearningContextService for Arc<T> {
    async fn get_context(&self, user_id: Uuid) -> LearningResult<SharedLearningContext> {
        (**self).get_context(user_id).await
    }

    async fn save_context(
        &self,
        user_id: Uuid,
        context: &SharedLearningContext,
    ) -> LearningResult<()> {
        (**self).save_context(user_id, context).await
    }

    async fn get_discoveries(&self, user_id: Uuid) -> LearningResult<AgentDiscoveries> {
        (**self).get_discoveries(user_id).await
    }

    async fn save_discoveries(
        &self,
        user_id: Uuid,
        discoveries: &AgentDiscoveries,
    ) -> LearningResult<()> {
        (**self).save_discoveries(user_id, discoveries).await
    }

    async fn get_onboarding(
        &self,
        user_id: Uuid,
        agent: AgentIdentity,
    ) -> LearningResult<Option<OnboardingState>> {
        (**self).get_onboarding(user_id, agent).await
    }

    async fn save_onboarding(&self, user_id: Uuid, state: &OnboardingState) -> LearningResult<()> {
        (**self).save_onboarding(user_id, state).await
    }

    async fn clear_onboarding(&self, user_id: Uuid, agent: AgentIdentity) -> LearningResult<()> {
        (**self).clear_onboarding(user_id, agent).await
    }
}

// ============================================================================
// SQLite implementation
// ============================================================================

/// Learning records stored as JSON documents in the relay database
#[derive(Clone)]
pub struct DatabaseLearningService {
    db: Database,
}

impl DatabaseLearningService {
    pub fn new(db: Database) -> Self {
        Self { db }
    }
}

#[async_trait]
impl LearningContextService for DatabaseLearningService {
    async fn get_context(&self, user_id: Uuid) -> LearningResult<SharedLearningContext> {
        if let Some(context) = self
            .db
            .get_document(DocumentTable::LearningContexts, user_id)?
        {
            return Ok(context);
        }
        let context = SharedLearningContext::default();
        self.db
            .put_document(DocumentTable::LearningContexts, user_id, &context)?;
        tracing::debug!(user_id = %user_id, "Created learning context");
        Ok(context)
    }

    async fn save_context(
        &self,
        user_id: Uuid,
        context: &SharedLearningContext,
    ) -> LearningResult<()> {
        self.db
            .put_document(DocumentTable::LearningContexts, user_id, context)?;
        Ok(())
    }

    async fn get_discoveries(&self, user_id: Uuid) -> LearningResult<AgentDiscoveries> {
        Ok(self
            .db
            .get_document(DocumentTable::AgentDiscoveries, user_id)?
            .unwrap_or_default())
    }

    async fn save_discoveries(
        &self,
        user_id: Uuid,
        discoveries: &AgentDiscoveries,
    ) -> LearningResult<()> {
        self.db
            .put_document(DocumentTable::AgentDiscoveries, user_id, discoveries)?;
        Ok(())
    }

    async fn get_onboarding(
        &self,
        user_id: Uuid,
        agent: AgentIdentity,
    ) -> LearningResult<Option<OnboardingState>> {
        Ok(self.db.get_onboarding(user_id, agent)?)
    }

    async fn save_onboarding(&self, user_id: Uuid, state: &OnboardingState) -> LearningResult<()> {
        self.db.put_onboarding(user_id, state)?;
        Ok(())
    }

    async fn clear_onboarding(&self, user_id: Uuid, agent: AgentIdentity) -> LearningResult<()> {
        self.db.delete_onboarding(user_id, agent)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service() -> DatabaseLearningService {
        DatabaseLearningService::new(Database::open_in_memory().unwrap())
    }

    #[tokio::test]
    async fn test_get_context_creates_empty() {
        let svc = service();
        let user = Uuid::new_v4();
        let ctx = svc.get_context(user).await.unwrap();
        assert!(ctx.is_empty());
    }

    #[tokio::test]
    async fn test_update_context_applies_patch() {
        let svc = service();
        let user = Uuid::new_v4();
        svc.update_context(user, ContextPatch::primary_goal("learn rust"))
            .await
            .unwrap();
        let ctx = svc
            .update_context(user, ContextPatch::proficiency("traits", 1.7))
            .await
            .unwrap();
        assert_eq!(ctx.primary_goal.as_deref(), Some("learn rust"));
        assert!((ctx.proficiency_levels["traits"] - 1.0).abs() < f64::EPSILON);

        let reloaded = svc.get_context(user).await.unwrap();
        assert_eq!(reloaded, ctx);
    }

    #[tokio::test]
    async fn test_seed_from_profile_respects_existing_goal() {
        let svc = service();
        let user = Uuid::new_v4();
        let profile = UserProfile {
            goals: vec!["data science".to_string()],
            ..UserProfile::default()
        };
        assert!(svc.seed_from_profile(user, &profile).await.unwrap());
        assert!(!svc.seed_from_profile(user, &profile).await.unwrap());
        assert_eq!(
            svc.get_context(user).await.unwrap().primary_goal.as_deref(),
            Some("data science")
        );
    }

    #[tokio::test]
    async fn test_discoveries_accumulate() {
        let svc = service();
        let user = Uuid::new_v4();
        svc.append_discoveries(user, AgentDiscoveries::default().with_strength("sql"))
            .await
            .unwrap();
        let all = svc
            .append_discoveries(
                user,
                AgentDiscoveries::default().with_support_need("window functions"),
            )
            .await
            .unwrap();
        assert_eq!(all.strengths, vec!["sql".to_string()]);
        assert_eq!(all.needs_support, vec!["window functions".to_string()]);
        assert_eq!(svc.get_discoveries(user).await.unwrap(), all);
    }

    #[tokio::test]
    async fn test_onboarding_clear() {
        let svc = service();
        let user = Uuid::new_v4();
        let state = OnboardingState::new(AgentIdentity::DrillSergeant);
        svc.save_onboarding(user, &state).await.unwrap();
        assert_eq!(
            svc.get_onboarding(user, AgentIdentity::DrillSergeant)
                .await
                .unwrap(),
            Some(state)
        );
        svc.clear_onboarding(user, AgentIdentity::DrillSergeant)
            .await
            .unwrap();
        assert!(svc
            .get_onboarding(user, AgentIdentity::DrillSergeant)
            .await
            .unwrap()
            .is_none());
    }
}
