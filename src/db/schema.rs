//! Database schema

/// SQL schema for initialization
///
/// Every record is a JSON document keyed by user. Expiry columns hold epoch
/// milliseconds so comparisons stay integer-only.
pub const SCHEMA: &str = r"
CREATE TABLE IF NOT EXISTS conversation_states (
    user_id TEXT PRIMARY KEY,
    document TEXT NOT NULL,
    expires_at INTEGER NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_conversation_states_expiry ON conversation_states(expires_at);

CREATE TABLE IF NOT EXISTS state_locks (
    lock_key TEXT PRIMARY KEY,
    token TEXT NOT NULL,
    expires_at INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS learning_contexts (
    user_id TEXT PRIMARY KEY,
    document TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS agent_discoveries (
    user_id TEXT PRIMARY KEY,
    document TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS onboarding_states (
    user_id TEXT NOT NULL,
    agent TEXT NOT NULL,
    document TEXT NOT NULL,
    updated_at TEXT NOT NULL,

    PRIMARY KEY (user_id, agent)
);
";

/// Per-user JSON document tables that share the same shape
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentTable {
    LearningContexts,
    AgentDiscoveries,
}

impl DocumentTable {
    pub(super) fn name(self) -> &'static str {
        match self {
            DocumentTable::LearningContexts => "learning_contexts",
            DocumentTable::AgentDiscoveries => "agent_discoveries",
        }
    }
}
