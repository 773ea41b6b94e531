//! SQLite-backed state store

use super::{StateStore, StoreResult};
use crate::db::{now_millis, Database};
use crate::state_machine::ConversationState;
use async_trait::async_trait;
use std::time::Duration;
use uuid::Uuid;

/// State store over the relay database.
///
/// Survives restarts and can be shared by several processes opening the
/// same file.
#[derive(Clone)]
pub struct DatabaseStateStore {
    db: Database,
}

impl DatabaseStateStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }
}

fn expiry_after(ttl: Duration) -> i64 {
    let ttl_ms = i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX);
    now_millis().saturating_add(ttl_ms)
}

fn lock_key(user_id: Uuid) -> String {
    format!("conversation:{user_id}")
}

#[async_trait]
impl StateStore for DatabaseStateStore {
    async fn get(&self, user_id: Uuid) -> StoreResult<Option<ConversationState>> {
        Ok(self.db.get_conversation_state(user_id, now_millis())?)
    }

    async fn set(&self, state: &ConversationState, ttl: Duration) -> StoreResult<()> {
        self.db.put_conversation_state(state, expiry_after(ttl))?;
        Ok(())
    }

    async fn delete(&self, user_id: Uuid) -> StoreResult<bool> {
        Ok(self.db.delete_conversation_state(user_id)?)
    }

    async fn exists(&self, user_id: Uuid) -> StoreResult<bool> {
        Ok(self.db.conversation_state_exists(user_id, now_millis())?)
    }

    async fn extend_ttl(&self, user_id: Uuid, ttl: Duration) -> StoreResult<bool> {
        Ok(self
            .db
            .extend_conversation_state(user_id, expiry_after(ttl), now_millis())?)
    }

    async fn list_user_ids(&self) -> StoreResult<Vec<Uuid>> {
        Ok(self.db.live_state_users(now_millis())?)
    }

    async fn try_lock(&self, user_id: Uuid, token: Uuid, ttl: Duration) -> StoreResult<bool> {
        Ok(self
            .db
            .try_acquire_lock(&lock_key(user_id), token, expiry_after(ttl), now_millis())?)
    }

    fn unlock(&self, user_id: Uuid, token: Uuid) -> StoreResult<bool> {
        Ok(self.db.release_lock(&lock_key(user_id), token)?)
    }
}
