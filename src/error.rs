//! Error taxonomy
//!
//! API error bodies are modeled as tagged variants per error reason rather
//! than inspected as untyped JSON at call sites. Unknown reasons land in the
//! catch-all [`ApiError::Remote`] variant.

use thiserror::Error;

/// Errors surfaced by the YouTube API collaborator.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Daily quota exhausted. Halts further writes for the session.
    #[error("daily quota exceeded")]
    QuotaExceeded,

    /// Per-minute rate limit hit. Retried with backoff.
    #[error("rate limit exceeded")]
    RateLimited,

    /// Credentials rejected. Fatal to the session.
    #[error("authentication failed: {0}")]
    AuthFailure(String),

    /// Permanent per-item rejection (video not found, permission denied).
    #[error("rejected by API ({code}): {message}")]
    RemoteRejected { code: String, message: String },

    /// Transport-level failure (connect, timeout, DNS).
    #[error("network unreachable: {0}")]
    NetworkUnreachable(String),

    /// Any other API error code.
    #[error("API error ({code}): {message}")]
    Remote { code: String, message: String },
}

impl ApiError {
    /// Transient errors worth retrying with backoff.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::RateLimited | Self::NetworkUnreachable(_))
    }
}

/// Per-item failure recorded in a `MutationOutcome`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MutationError {
    #[error("rate limited, retries exhausted")]
    RateLimited,

    #[error("daily quota exceeded")]
    QuotaExceeded,

    #[error("authentication failed: {0}")]
    AuthFailure(String),

    #[error("rejected by API: {0}")]
    RemoteRejected(String),

    #[error("backup write failed: {0}")]
    BackupWriteFailed(String),

    #[error("no backup recorded for this video")]
    NoBackup,

    #[error("network failure, retries exhausted: {0}")]
    Network(String),
}

/// User-input errors raised by the match engine.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    #[error("pattern must not be empty")]
    InvalidPattern,
}
