//! Database module for Tutor Relay
//!
//! Provides persistence for conversation states, advisory locks, and the
//! per-user learning records.

mod schema;

pub use schema::{DocumentTable, SCHEMA};

use crate::agent::AgentIdentity;
use crate::learning::OnboardingState;
use crate::state_machine::ConversationState;
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum DbError {
    #[error("Database error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("Database connection poisoned")]
    Poisoned,
    #[error("Corrupt row: {0}")]
    Corrupt(String),
}

pub type DbResult<T> = Result<T, DbError>;

/// Current wall-clock time in epoch milliseconds
pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

/// Thread-safe database handle
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    /// Open or create database at the given path
    pub fn open<P: AsRef<Path>>(path: P) -> DbResult<Self> {
        let conn = Connection::open(path)?;
        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        db.run_migrations()?;
        Ok(db)
    }

    /// Open an in-memory database (for testing)
    pub fn open_in_memory() -> DbResult<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        db.run_migrations()?;
        Ok(db)
    }

    fn run_migrations(&self) -> DbResult<()> {
        let conn = self.conn()?;
        conn.execute_batch(SCHEMA)?;
        Ok(())
    }

    fn conn(&self) -> DbResult<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| DbError::Poisoned)
    }

    // ==================== Conversation State Operations ====================

    /// Insert or replace a user's conversation state
    pub fn put_conversation_state(
        &self,
        state: &ConversationState,
        expires_at_ms: i64,
    ) -> DbResult<()> {
        let document = serde_json::to_string(state)?;
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO conversation_states (user_id, document, expires_at, updated_at)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(user_id) DO UPDATE SET
                document = excluded.document,
                expires_at = excluded.expires_at,
                updated_at = excluded.updated_at",
            params![
                state.user_id.to_string(),
                document,
                expires_at_ms,
                Utc::now().to_rfc3339()
            ],
        )?;
        conn.execute(
            "DELETE FROM conversation_states WHERE expires_at <= ?1",
            params![now_millis()],
        )?;
        Ok(())
    }

    /// Get a live conversation state; expired rows read as absent
    pub fn get_conversation_state(
        &self,
        user_id: Uuid,
        now_ms: i64,
    ) -> DbResult<Option<ConversationState>> {
        let conn = self.conn()?;
        let document: Option<String> = conn
            .query_row(
                "SELECT document FROM conversation_states WHERE user_id = ?1 AND expires_at > ?2",
                params![user_id.to_string(), now_ms],
                |row| row.get(0),
            )
            .optional()?;
        document
            .map(|d| serde_json::from_str(&d).map_err(DbError::from))
            .transpose()
    }

    /// Delete a conversation state, returning whether a row was removed
    pub fn delete_conversation_state(&self, user_id: Uuid) -> DbResult<bool> {
        let conn = self.conn()?;
        let removed = conn.execute(
            "DELETE FROM conversation_states WHERE user_id = ?1",
            params![user_id.to_string()],
        )?;
        Ok(removed > 0)
    }

    pub fn conversation_state_exists(&self, user_id: Uuid, now_ms: i64) -> DbResult<bool> {
        let conn = self.conn()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM conversation_states WHERE user_id = ?1 AND expires_at > ?2",
            params![user_id.to_string(), now_ms],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    /// Push out the expiry of a live state. Returns false if there is none.
    pub fn extend_conversation_state(
        &self,
        user_id: Uuid,
        expires_at_ms: i64,
        now_ms: i64,
    ) -> DbResult<bool> {
        let conn = self.conn()?;
        let updated = conn.execute(
            "UPDATE conversation_states SET expires_at = ?1
             WHERE user_id = ?2 AND expires_at > ?3",
            params![expires_at_ms, user_id.to_string(), now_ms],
        )?;
        Ok(updated > 0)
    }

    /// Users with a live conversation state
    pub fn live_state_users(&self, now_ms: i64) -> DbResult<Vec<Uuid>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT user_id FROM conversation_states WHERE expires_at > ?1 ORDER BY user_id",
        )?;
        let ids = stmt
            .query_map(params![now_ms], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        ids.iter()
            .map(|id| Uuid::parse_str(id).map_err(|e| DbError::Corrupt(format!("{id}: {e}"))))
            .collect()
    }

    // ==================== Lock Operations ====================

    /// Take the named lock if it is free or expired.
    ///
    /// Returns true only when this call inserted the lock row.
    pub fn try_acquire_lock(
        &self,
        key: &str,
        token: Uuid,
        expires_at_ms: i64,
        now_ms: i64,
    ) -> DbResult<bool> {
        let conn = self.conn()?;
        conn.execute(
            "DELETE FROM state_locks WHERE lock_key = ?1 AND expires_at <= ?2",
            params![key, now_ms],
        )?;
        let inserted = conn.execute(
            "INSERT OR IGNORE INTO state_locks (lock_key, token, expires_at) VALUES (?1, ?2, ?3)",
            params![key, token.to_string(), expires_at_ms],
        )?;
        Ok(inserted == 1)
    }

    /// Release the lock only if `token` still owns it
    pub fn release_lock(&self, key: &str, token: Uuid) -> DbResult<bool> {
        let conn = self.conn()?;
        let removed = conn.execute(
            "DELETE FROM state_locks WHERE lock_key = ?1 AND token = ?2",
            params![key, token.to_string()],
        )?;
        Ok(removed > 0)
    }

    // ==================== Learning Record Operations ====================

    pub fn get_document<T: DeserializeOwned>(
        &self,
        table: DocumentTable,
        user_id: Uuid,
    ) -> DbResult<Option<T>> {
        let conn = self.conn()?;
        let sql = format!("SELECT document FROM {} WHERE user_id = ?1", table.name());
        let document: Option<String> = conn
            .query_row(&sql, params![user_id.to_string()], |row| row.get(0))
            .optional()?;
        document
            .map(|d| serde_json::from_str(&d).map_err(DbError::from))
            .transpose()
    }

    pub fn put_document<T: Serialize>(
        &self,
        table: DocumentTable,
        user_id: Uuid,
        value: &T,
    ) -> DbResult<()> {
        let document = serde_json::to_string(value)?;
        let conn = self.conn()?;
        let sql = format!(
            "INSERT INTO {} (user_id, document, updated_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(user_id) DO UPDATE SET
                document = excluded.document,
                updated_at = excluded.updated_at",
            table.name()
        );
        conn.execute(
            &sql,
            params![user_id.to_string(), document, Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }

    pub fn get_onboarding(
        &self,
        user_id: Uuid,
        agent: AgentIdentity,
    ) -> DbResult<Option<OnboardingState>> {
        let conn = self.conn()?;
        let document: Option<String> = conn
            .query_row(
                "SELECT document FROM onboarding_states WHERE user_id = ?1 AND agent = ?2",
                params![user_id.to_string(), agent.as_str()],
                |row| row.get(0),
            )
            .optional()?;
        document
            .map(|d| serde_json::from_str(&d).map_err(DbError::from))
            .transpose()
    }

    pub fn put_onboarding(&self, user_id: Uuid, state: &OnboardingState) -> DbResult<()> {
        let document = serde_json::to_string(state)?;
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO onboarding_states (user_id, agent, document, updated_at)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(user_id, agent) DO UPDATE SET
                document = excluded.document,
                updated_at = excluded.updated_at",
            params![
                user_id.to_string(),
                state.agent.as_str(),
                document,
                Utc::now().to_rfc3339()
            ],
        )?;
        Ok(())
    }

    pub fn delete_onboarding(&self, user_id: Uuid, agent: AgentIdentity) -> DbResult<bool> {
        let conn = self.conn()?;
        let removed = conn.execute(
            "DELETE FROM onboarding_states WHERE user_id = ?1 AND agent = ?2",
            params![user_id.to_string(), agent.as_str()],
        )?;
        Ok(removed > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::learning::{AgentDiscoveries, SharedLearningContext};

    #[test]
    fn test_state_put_get_delete() {
        let db = Database::open_in_memory().unwrap();
        let user = Uuid::new_v4();
        let state = ConversationState::new(user, None);
        let now = now_millis();

        db.put_conversation_state(&state, now + 60_000).unwrap();
        let fetched = db.get_conversation_state(user, now).unwrap().unwrap();
        assert_eq!(fetched.user_id, user);
        assert!(db.conversation_state_exists(user, now).unwrap());

        assert!(db.delete_conversation_state(user).unwrap());
        assert!(!db.delete_conversation_state(user).unwrap());
        assert!(db.get_conversation_state(user, now).unwrap().is_none());
    }

    #[test]
    fn test_expired_state_reads_as_absent() {
        let db = Database::open_in_memory().unwrap();
        let user = Uuid::new_v4();
        let now = now_millis();
        db.put_conversation_state(&ConversationState::new(user, None), now + 1_000)
            .unwrap();

        let later = now + 2_000;
        assert!(db.get_conversation_state(user, later).unwrap().is_none());
        assert!(!db.conversation_state_exists(user, later).unwrap());
        assert!(!db.extend_conversation_state(user, later + 5_000, later).unwrap());
        assert!(db.live_state_users(later).unwrap().is_empty());
    }

    #[test]
    fn test_extend_moves_expiry() {
        let db = Database::open_in_memory().unwrap();
        let user = Uuid::new_v4();
        let now = now_millis();
        db.put_conversation_state(&ConversationState::new(user, None), now + 1_000)
            .unwrap();
        assert!(db.extend_conversation_state(user, now + 10_000, now).unwrap());
        assert!(db.conversation_state_exists(user, now + 5_000).unwrap());
        assert_eq!(db.live_state_users(now).unwrap(), vec![user]);
    }

    #[test]
    fn test_lock_is_exclusive_until_released_or_expired() {
        let db = Database::open_in_memory().unwrap();
        let now = now_millis();
        let first = Uuid::new_v4();
        let second = Uuid::new_v4();

        assert!(db.try_acquire_lock("user-a", first, now + 30_000, now).unwrap());
        assert!(!db.try_acquire_lock("user-a", second, now + 30_000, now).unwrap());
        assert!(db.try_acquire_lock("user-b", second, now + 30_000, now).unwrap());

        // A non-owner cannot release
        assert!(!db.release_lock("user-a", second).unwrap());
        assert!(db.release_lock("user-a", first).unwrap());
        assert!(db.try_acquire_lock("user-a", second, now + 30_000, now).unwrap());

        // Expired locks are taken over
        let later = now + 60_000;
        assert!(db.try_acquire_lock("user-a", first, later + 30_000, later).unwrap());
        assert!(!db.release_lock("user-a", second).unwrap());
    }

    #[test]
    fn test_documents_round_trip() {
        let db = Database::open_in_memory().unwrap();
        let user = Uuid::new_v4();
        assert!(db
            .get_document::<SharedLearningContext>(DocumentTable::LearningContexts, user)
            .unwrap()
            .is_none());

        let mut ctx = SharedLearningContext::default();
        ctx.set_primary_goal("learn sql");
        db.put_document(DocumentTable::LearningContexts, user, &ctx).unwrap();
        let back: SharedLearningContext = db
            .get_document(DocumentTable::LearningContexts, user)
            .unwrap()
            .unwrap();
        assert_eq!(back.primary_goal.as_deref(), Some("learn sql"));

        let discoveries = AgentDiscoveries::default().with_strength("joins");
        db.put_document(DocumentTable::AgentDiscoveries, user, &discoveries)
            .unwrap();
        let back: AgentDiscoveries = db
            .get_document(DocumentTable::AgentDiscoveries, user)
            .unwrap()
            .unwrap();
        assert_eq!(back, discoveries);
    }

    #[test]
    fn test_onboarding_rows_are_per_agent() {
        let db = Database::open_in_memory().unwrap();
        let user = Uuid::new_v4();
        let coach = OnboardingState::new(AgentIdentity::Coach);
        db.put_onboarding(user, &coach).unwrap();

        assert!(db.get_onboarding(user, AgentIdentity::Coach).unwrap().is_some());
        assert!(db
            .get_onboarding(user, AgentIdentity::Assessment)
            .unwrap()
            .is_none());
        assert!(db.delete_onboarding(user, AgentIdentity::Coach).unwrap());
        assert!(db.get_onboarding(user, AgentIdentity::Coach).unwrap().is_none());
    }

    #[test]
    fn test_file_database_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("relay.db");
        let user = Uuid::new_v4();
        let now = now_millis();
        {
            let db = Database::open(&path).unwrap();
            db.put_conversation_state(&ConversationState::new(user, None), now + 60_000)
                .unwrap();
        }
        let db = Database::open(&path).unwrap();
        assert!(db.get_conversation_state(user, now).unwrap().is_some());
    }
}
