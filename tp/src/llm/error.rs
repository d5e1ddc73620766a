//! Failures of a reasoning call

use std::time::Duration;
use thiserror::Error;

/// Longest wait honoured from a `retry-after` header
pub const MAX_RETRY_WAIT: Duration = Duration::from_secs(30);

/// Why a completion did not produce text
///
/// Nothing here is fatal to a pipeline: the reasoner hands the error back and
/// the caller decides which degraded value stands in for the reply.
#[derive(Debug, Error)]
pub enum LlmError {
    #[error("Rate limited, retry after {retry_after:?}")]
    RateLimited { retry_after: Duration },

    #[error("API error {status}: {message}")]
    ApiError { status: u16, message: String },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Timeout after {0:?}")]
    Timeout(Duration),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("API key not found in ${0}")]
    MissingApiKey(String),
}

/// Statuses worth another attempt: request timeout, rate limit, server side
pub fn retryable_status(status: u16) -> bool {
    matches!(status, 408 | 429 | 500..=599)
}

impl LlmError {
    /// A later attempt of the same request may succeed
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::RateLimited { .. } | Self::Network(_) | Self::Timeout(_) => true,
            Self::ApiError { status, .. } => retryable_status(*status),
            Self::InvalidResponse(_) | Self::Json(_) | Self::MissingApiKey(_) => false,
        }
    }

    /// Server-requested wait before the next attempt, capped at [`MAX_RETRY_WAIT`]
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::RateLimited { retry_after } => Some((*retry_after).min(MAX_RETRY_WAIT)),
            _ => None,
        }
    }
}
