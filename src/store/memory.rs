//! In-process state store

use super::{StateStore, StoreError, StoreResult};
use crate::state_machine::ConversationState;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};
use uuid::Uuid;

#[derive(Default)]
struct Entries {
    states: HashMap<Uuid, (ConversationState, Instant)>,
    locks: HashMap<Uuid, (Uuid, Instant)>,
}

impl Entries {
    /// Drop expired states and locks left behind by crashed holders
    fn sweep(&mut self, now: Instant) {
        self.states.retain(|_, (_, expires)| *expires > now);
        self.locks.retain(|_, (_, expires)| *expires > now);
    }
}

/// Expiring states and locks held in a process-local map
#[derive(Default)]
pub struct MemoryStateStore {
    entries: Mutex<Entries>,
}

impl MemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> StoreResult<MutexGuard<'_, Entries>> {
        self.entries
            .lock()
            .map_err(|_| StoreError::Unavailable("memory store poisoned".to_string()))
    }
}

#[async_trait]
impl StateStore for MemoryStateStore {
    async fn get(&self, user_id: Uuid) -> StoreResult<Option<ConversationState>> {
        let now = Instant::now();
        let mut entries = self.entries()?;
        match entries.states.get(&user_id) {
            Some((state, expires)) if *expires > now => Ok(Some(state.clone())),
            Some(_) => {
                entries.states.remove(&user_id);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn set(&self, state: &ConversationState, ttl: Duration) -> StoreResult<()> {
        let now = Instant::now();
        let mut entries = self.entries()?;
        entries.sweep(now);
        entries
            .states
            .insert(state.user_id, (state.clone(), now + ttl));
        Ok(())
    }

    async fn delete(&self, user_id: Uuid) -> StoreResult<bool> {
        Ok(self.entries()?.states.remove(&user_id).is_some())
    }

    async fn exists(&self, user_id: Uuid) -> StoreResult<bool> {
        let now = Instant::now();
        Ok(self
            .entries()?
            .states
            .get(&user_id)
            .is_some_and(|(_, expires)| *expires > now))
    }

    async fn extend_ttl(&self, user_id: Uuid, ttl: Duration) -> StoreResult<bool> {
        let now = Instant::now();
        let mut entries = self.entries()?;
        match entries.states.get_mut(&user_id) {
            Some((_, expires)) if *expires > now => {
                *expires = now + ttl;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn list_user_ids(&self) -> StoreResult<Vec<Uuid>> {
        let now = Instant::now();
        let mut ids: Vec<Uuid> = self
            .entries()?
            .states
            .iter()
            .filter(|(_, (_, expires))| *expires > now)
            .map(|(id, _)| *id)
            .collect();
        ids.sort();
        Ok(ids)
    }

    async fn try_lock(&self, user_id: Uuid, token: Uuid, ttl: Duration) -> StoreResult<bool> {
        let now = Instant::now();
        let mut entries = self.entries()?;
        entries.sweep(now);
        if entries.locks.contains_key(&user_id) {
            return Ok(false);
        }
        entries.locks.insert(user_id, (token, now + ttl));
        Ok(true)
    }

    fn unlock(&self, user_id: Uuid, token: Uuid) -> StoreResult<bool> {
        let mut entries = self.entries()?;
        match entries.locks.get(&user_id) {
            Some((holder, _)) if *holder == token => {
                entries.locks.remove(&user_id);
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}
