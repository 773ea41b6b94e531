//! Relay configuration from the environment

use crate::agent::prompt::DEFAULT_HISTORY_WINDOW;
use crate::orchestrator::DEFAULT_MIN_CONFIDENCE;
use crate::store::{LockPolicy, DEFAULT_STATE_TTL};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq)]
pub struct RelayConfig {
    pub db_path: PathBuf,
    /// Write conversation state to the database, not only the process cache
    pub persistence_enabled: bool,
    pub state_ttl: Duration,
    pub lock_policy: LockPolicy,
    pub history_window: usize,
    pub extraction_min_confidence: f64,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            persistence_enabled: false,
            state_ttl: DEFAULT_STATE_TTL,
            lock_policy: LockPolicy::default(),
            history_window: DEFAULT_HISTORY_WINDOW,
            extraction_min_confidence: DEFAULT_MIN_CONFIDENCE,
        }
    }
}

fn default_db_path() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
    PathBuf::from(home).join(".tutor-relay").join("relay.db")
}

impl RelayConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup; unset or malformed values keep defaults
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let parsed = |key: &str| lookup(key).and_then(|raw| parse_or_warn::<u64>(key, &raw));

        Self {
            db_path: lookup("TUTOR_DB_PATH").map_or(defaults.db_path, PathBuf::from),
            persistence_enabled: lookup("TUTOR_PERSISTENCE").is_some_and(|v| is_truthy(&v)),
            state_ttl: parsed("TUTOR_STATE_TTL_SECS").map_or(defaults.state_ttl, Duration::from_secs),
            lock_policy: LockPolicy {
                ttl: parsed("TUTOR_LOCK_TTL_SECS").map_or(defaults.lock_policy.ttl, Duration::from_secs),
                retry_delay: parsed("TUTOR_LOCK_RETRY_MS")
                    .map_or(defaults.lock_policy.retry_delay, Duration::from_millis),
                max_retries: lookup("TUTOR_LOCK_MAX_RETRIES")
                    .and_then(|raw| parse_or_warn::<u32>("TUTOR_LOCK_MAX_RETRIES", &raw))
                    .unwrap_or(defaults.lock_policy.max_retries),
            },
            history_window: lookup("TUTOR_HISTORY_WINDOW")
                .and_then(|raw| parse_or_warn::<usize>("TUTOR_HISTORY_WINDOW", &raw))
                .unwrap_or(defaults.history_window),
            extraction_min_confidence: lookup("TUTOR_EXTRACTION_MIN_CONFIDENCE")
                .and_then(|raw| parse_or_warn::<f64>("TUTOR_EXTRACTION_MIN_CONFIDENCE", &raw))
                .unwrap_or(defaults.extraction_min_confidence),
        }
    }
}

fn is_truthy(value: &str) -> bool {
    matches!(
        value.trim().to_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

fn parse_or_warn<T: FromStr>(key: &str, raw: &str) -> Option<T> {
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            tracing::warn!(key, value = raw, "Ignoring malformed setting");
            None
        }
    }
}
