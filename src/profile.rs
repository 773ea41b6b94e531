//! User profile collaborator
//!
//! Profiles are owned elsewhere. The relay only reads one when it first
//! needs to seed an empty learning context.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    #[serde(default)]
    pub goals: Vec<String>,
    #[serde(default)]
    pub time_budget_minutes: Option<u32>,
    #[serde(default)]
    pub background: Option<String>,
    #[serde(default)]
    pub learning_style: Option<String>,
}

#[derive(Debug, Error)]
pub enum ProfileError {
    #[error("profile source unavailable: {0}")]
    Unavailable(String),
}

/// Read-only source of user profiles
#[async_trait]
pub trait ProfileSource: Send + Sync {
    async fn profile(&self, user_id: Uuid) -> Result<Option<UserProfile>, ProfileError>;
}

#[async_trait]
impl<T: ProfileSource + ?Sized> ProfileSource for Arc<T> {
    async fn profile(&self, user_id: Uuid) -> Result<Option<UserProfile>, ProfileError> {
        (**self).profile(user_id).await
    }
}

/// A source with no profiles
pub struct NoProfiles;

#[async_trait]
impl ProfileSource for NoProfiles {
    async fn profile(&self, _user_id: Uuid) -> Result<Option<UserProfile>, ProfileError> {
        Ok(None)
    }
}

/// Fixed profiles, loaded up front
#[derive(Debug, Default)]
pub struct StaticProfiles {
    profiles: HashMap<Uuid, UserProfile>,
}

impl StaticProfiles {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with(mut self, user_id: Uuid, profile: UserProfile) -> Self {
        self.profiles.insert(user_id, profile);
        self
    }

    /// Load a JSON object mapping user ids to profiles
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ProfileError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .map_err(|e| ProfileError::Unavailable(format!("{}: {e}", path.display())))?;
        let profiles: HashMap<Uuid, UserProfile> = serde_json::from_str(&raw)
            .map_err(|e| ProfileError::Unavailable(format!("{}: {e}", path.display())))?;
        Ok(Self { profiles })
    }

    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }
}

#[async_trait]
impl ProfileSource for StaticProfiles {
    async fn profile(&self, user_id: Uuid) -> Result<Option<UserProfile>, ProfileError> {
        Ok(self.profiles.get(&user_id).cloned())
    }
}
