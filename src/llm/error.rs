//! Completion failures, grouped by what a caller can do about them

use std::time::Duration;
use thiserror::Error;

/// Why a completion produced no text.
///
/// Callers in the relay never retry inline: the classifier falls back to
/// the coach and extraction skips the message. The grouping only decides
/// how loudly a failure is logged.
#[derive(Debug, Error)]
pub enum LlmError {
    /// No credentials or an unknown model id
    #[error("completion backend not configured: {0}")]
    NotConfigured(String),

    /// Timeout, connection failure, or a 5xx from the provider
    #[error("completion service unavailable: {0}")]
    Unavailable(String),

    #[error("rate limited: {message}")]
    RateLimited {
        message: String,
        retry_after: Option<Duration>,
    },

    /// The provider refused the request (bad credentials, bad payload)
    #[error("completion request rejected: {0}")]
    Rejected(String),

    #[error("unreadable completion reply: {0}")]
    Malformed(String),
}

impl LlmError {
    /// Whether the same request could succeed later
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Unavailable(_) | Self::RateLimited { .. })
    }

    /// Short label for structured logs
    pub fn kind(&self) -> &'static str {
        match self {
            Self::NotConfigured(_) => "not_configured",
            Self::Unavailable(_) => "unavailable",
            Self::RateLimited { .. } => "rate_limited",
            Self::Rejected(_) => "rejected",
            Self::Malformed(_) => "malformed",
        }
    }
}
