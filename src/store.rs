//! Durable conversation state storage
//!
//! Expiring per-user storage with an advisory lock for callers that need
//! an atomic read-modify-write. Ordinary turns skip the lock.

mod memory;
mod sqlite;

pub use memory::MemoryStateStore;
pub use sqlite::DatabaseStateStore;

use crate::state_machine::ConversationState;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;

/// Conversation state lifetime
pub const DEFAULT_STATE_TTL: Duration = Duration::from_secs(3600);
/// Lock lifetime; a crashed holder's lock frees itself after this
pub const DEFAULT_LOCK_TTL: Duration = Duration::from_secs(30);
pub const DEFAULT_LOCK_RETRY_DELAY: Duration = Duration::from_millis(100);
pub const DEFAULT_LOCK_MAX_RETRIES: u32 = 50;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("state store unavailable: {0}")]
    Unavailable(String),
}

impl From<crate::db::DbError> for StoreError {
    fn from(e: crate::db::DbError) -> Self {
        StoreError::Unavailable(e.to_string())
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Storage backend for conversation states
#[async_trait]
pub trait StateStore: Send + Sync {
    async fn get(&self, user_id: Uuid) -> StoreResult<Option<ConversationState>>;

    async fn set(&self, state: &ConversationState, ttl: Duration) -> StoreResult<()>;

    /// Remove the state; returns whether one existed
    async fn delete(&self, user_id: Uuid) -> StoreResult<bool>;

    async fn exists(&self, user_id: Uuid) -> StoreResult<bool>;

    /// Reset expiry to `ttl` from now; false if no live state
    async fn extend_ttl(&self, user_id: Uuid, ttl: Duration) -> StoreResult<bool>;

    async fn list_user_ids(&self) -> StoreResult<Vec<Uuid>>;

    /// Set-if-absent on the user's lock with the given expiry
    async fn try_lock(&self, user_id: Uuid, token: Uuid, ttl: Duration) -> StoreResult<bool>;

    /// Release the lock if `token` still holds it.
    ///
    /// Synchronous so a guard can release from `Drop`.
    fn unlock(&self, user_id: Uuid, token: Uuid) -> StoreResult<bool>;
}

#[async_trait]
impl<T: StateStore + ?Sized> StateStore for Arc<T> {
    async fn get(&self, user_id: Uuid) -> StoreResult<Option<ConversationState>> {
        (**self).get(user_id).await
    }

    async fn set(&self, state: &ConversationState, ttl: Duration) -> StoreResult<()> {
        (**self).set(state, ttl).await
    }

    async fn delete(&self, user_id: Uuid) -> StoreResult<bool> {
        (**self).delete(user_id).await
    }

    async fn exists(&self, user_id: Uuid) -> StoreResult<bool> {
        (**self).exists(user_id).await
    }

    async fn extend_ttl(&self, user_id: Uuid, ttl: Duration) -> StoreResult<bool> {
        (**self).extend_ttl(user_id, ttl).await
    }

    async fn list_user_ids(&self) -> StoreResult<Vec<Uuid>> {
        (**self).list_user_ids().await
    }

    async fn try_lock(&self, user_id: Uuid, token: Uuid, ttl: Duration) -> StoreResult<bool> {
        (**self).try_lock(user_id, token, ttl).await
    }

    fn unlock(&self, user_id: Uuid, token: Uuid) -> StoreResult<bool> {
        (**self).unlock(user_id, token)
    }
}

// ============================================================================
// Locking
// ============================================================================

/// Retry and expiry settings for the advisory lock
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockPolicy {
    pub ttl: Duration,
    pub retry_delay: Duration,
    /// Total acquisition attempts
    pub max_retries: u32,
}

impl Default for LockPolicy {
    fn default() -> Self {
        Self {
            ttl: DEFAULT_LOCK_TTL,
            retry_delay: DEFAULT_LOCK_RETRY_DELAY,
            max_retries: DEFAULT_LOCK_MAX_RETRIES,
        }
    }
}

/// A held lock. Released exactly once: explicitly or on drop.
pub struct LockGuard {
    backend: Arc<dyn StateStore>,
    user_id: Uuid,
    token: Uuid,
    released: bool,
}

impl LockGuard {
    pub fn token(&self) -> Uuid {
        self.token
    }

    /// Release now. Returns false if the lock had already expired and
    /// been taken by someone else.
    pub fn release(mut self) -> bool {
        self.release_inner()
    }

    fn release_inner(&mut self) -> bool {
        if self.released {
            return false;
        }
        self.released = true;
        match self.backend.unlock(self.user_id, self.token) {
            Ok(released) => {
                if !released {
                    tracing::warn!(user_id = %self.user_id, "Lock expired before release");
                }
                released
            }
            Err(e) => {
                tracing::warn!(user_id = %self.user_id, error = %e, "Failed to release lock");
                false
            }
        }
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        self.release_inner();
    }
}

/// Result of a locked read-modify-write
#[derive(Debug)]
pub struct LockedUpdate<R> {
    /// `None` when the lock was not obtained or there was no state
    pub result: Option<R>,
    /// The state as written
    pub state: Option<ConversationState>,
    pub lock_acquired: bool,
}

// ============================================================================
// Conversation store
// ============================================================================

/// A backend plus the relay's expiry and locking policy
#[derive(Clone)]
pub struct ConversationStore {
    backend: Arc<dyn StateStore>,
    state_ttl: Duration,
    lock_policy: LockPolicy,
}

impl ConversationStore {
    pub fn new(backend: Arc<dyn StateStore>) -> Self {
        Self {
            backend,
            state_ttl: DEFAULT_STATE_TTL,
            lock_policy: LockPolicy::default(),
        }
    }

    #[must_use]
    pub fn with_state_ttl(mut self, ttl: Duration) -> Self {
        self.state_ttl = ttl;
        self
    }

    #[must_use]
    pub fn with_lock_policy(mut self, policy: LockPolicy) -> Self {
        self.lock_policy = policy;
        self
    }

    pub fn state_ttl(&self) -> Duration {
        self.state_ttl
    }

    pub async fn get(&self, user_id: Uuid) -> StoreResult<Option<ConversationState>> {
        self.backend.get(user_id).await
    }

    /// Save with the configured state TTL
    pub async fn set(&self, state: &ConversationState) -> StoreResult<()> {
        self.backend.set(state, self.state_ttl).await
    }

    pub async fn set_with_ttl(&self, state: &ConversationState, ttl: Duration) -> StoreResult<()> {
        self.backend.set(state, ttl).await
    }

    pub async fn delete(&self, user_id: Uuid) -> StoreResult<bool> {
        self.backend.delete(user_id).await
    }

    pub async fn exists(&self, user_id: Uuid) -> StoreResult<bool> {
        self.backend.exists(user_id).await
    }

    /// Push expiry out by the configured state TTL
    pub async fn extend_ttl(&self, user_id: Uuid) -> StoreResult<bool> {
        self.backend.extend_ttl(user_id, self.state_ttl).await
    }

    pub async fn list_user_ids(&self) -> StoreResult<Vec<Uuid>> {
        self.backend.list_user_ids().await
    }

    /// Try to take the user's lock, retrying with a fixed delay.
    ///
    /// Returns `None` once the retry budget is spent.
    pub async fn acquire_lock(&self, user_id: Uuid) -> StoreResult<Option<LockGuard>> {
        let token = Uuid::new_v4();
        let attempts = self.lock_policy.max_retries.max(1);
        for attempt in 1..=attempts {
            if self
                .backend
                .try_lock(user_id, token, self.lock_policy.ttl)
                .await?
            {
                tracing::debug!(user_id = %user_id, attempt, "Lock acquired");
                return Ok(Some(LockGuard {
                    backend: Arc::clone(&self.backend),
                    user_id,
                    token,
                    released: false,
                }));
            }
            if attempt < attempts {
                tokio::time::sleep(self.lock_policy.retry_delay).await;
            }
        }
        tracing::warn!(user_id = %user_id, attempts, "Lock not acquired");
        Ok(None)
    }

    /// Lock, read, transform, write, unlock.
    ///
    /// An absent state is left absent and `transform` is not called.
    pub async fn get_and_update<R, F>(
        &self,
        user_id: Uuid,
        transform: F,
    ) -> StoreResult<LockedUpdate<R>>
    where
        F: FnOnce(&mut ConversationState) -> R + Send,
        R: Send,
    {
        let Some(guard) = self.acquire_lock(user_id).await? else {
            return Ok(LockedUpdate {
                result: None,
                state: None,
                lock_acquired: false,
            });
        };

        let Some(mut state) = self.backend.get(user_id).await? else {
            guard.release();
            return Ok(LockedUpdate {
                result: None,
                state: None,
                lock_acquired: true,
            });
        };

        let result = transform(&mut state);
        self.backend.set(&state, self.state_ttl).await?;
        guard.release();

        Ok(LockedUpdate {
            result: Some(result),
            state: Some(state),
            lock_acquired: true,
        })
    }
}
