//! Failure taxonomy for provider requests and collection runs.

use chrono::{DateTime, Utc};
use serde::Serialize;
use strum::{Display, IntoStaticStr};

/// The category of a [`FetchError`], used for reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Display, IntoStaticStr)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ErrorKind {
    NotFound,
    RateLimitExceeded,
    Transient,
    Fatal,
    Cancelled,
}

/// Why a request or a run did not produce a result.
///
/// Messages never carry provider response bodies.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FetchError {
    /// The requested user or resource does not exist.
    #[error("{resource} was not found")]
    NotFound { resource: String },

    /// The provider's quota is exhausted and waiting for it would exceed the wait ceiling.
    #[error("GitHub rate limit exceeded, requests resume at {reset_at}")]
    RateLimitExceeded { reset_at: DateTime<Utc> },

    /// A retryable failure that persisted through every attempt.
    #[error("{message}")]
    Transient { message: String, status: Option<u16> },

    /// A failure that retrying cannot fix.
    #[error("{message}")]
    Fatal { message: String, status: Option<u16> },

    /// The run was cancelled by its caller.
    #[error("collection was cancelled")]
    Cancelled,
}

impl FetchError {
    pub fn fatal(message: impl Into<String>) -> Self {
        Self::Fatal {
            message: message.into(),
            status: None,
        }
    }

    pub fn transient(message: impl Into<String>) -> Self {
        Self::Transient {
            message: message.into(),
            status: None,
        }
    }

    /// Classify a transport-level failure from `reqwest`.
    pub(crate) fn from_request(e: &reqwest::Error, path: &str) -> Self {
        if e.is_builder() || e.is_redirect() {
            Self::fatal(format!("invalid request for '{path}': {e}"))
        } else if e.is_timeout() {
            Self::transient(format!("request for '{path}' timed out"))
        } else {
            Self::transient(format!("request for '{path}' failed: {e}"))
        }
    }

    /// A response body that could not be understood.
    pub(crate) fn from_decode(e: &reqwest::Error, path: &str) -> Self {
        Self::fatal(format!("unexpected response shape from '{path}': {e}"))
    }

    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::RateLimitExceeded { .. } => ErrorKind::RateLimitExceeded,
            Self::Transient { .. } => ErrorKind::Transient,
            Self::Fatal { .. } => ErrorKind::Fatal,
            Self::Cancelled => ErrorKind::Cancelled,
        }
    }

    /// The HTTP status that caused this error, if there was one.
    #[must_use]
    pub const fn status(&self) -> Option<u16> {
        match self {
            Self::Transient { status, .. } | Self::Fatal { status, .. } => *status,
            Self::NotFound { .. } => Some(404),
            Self::RateLimitExceeded { .. } | Self::Cancelled => None,
        }
    }
}
