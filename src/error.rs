//! Error taxonomy for matching and recommendation.
//!
//! Only [`RecommendError::Transient`] is retried. Everything else ends the
//! request immediately.

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum RecommendError {
    /// Malformed or out-of-range request field.
    #[error("{0}")]
    InvalidArgument(String),

    /// Backend failure that may succeed on another attempt
    /// (process crash, timeout, network error, malformed output).
    #[error("{0}")]
    Transient(String),

    /// Anything else. Logged and reported without retry.
    #[error("internal error: {0}")]
    Fatal(String),

    #[error("matching failed after {attempts} attempts: {last}")]
    RetriesExhausted { attempts: u32, last: String },
}

impl RecommendError {
    pub fn is_transient(&self) -> bool {
        matches!(self, RecommendError::Transient(_))
    }

    pub fn kind(&self) -> FailureKind {
        match self {
            RecommendError::InvalidArgument(_) => FailureKind::InvalidArgument,
            RecommendError::Transient(_) | RecommendError::RetriesExhausted { .. } => {
                FailureKind::Transient
            }
            RecommendError::Fatal(_) => FailureKind::Fatal,
        }
    }
}

/// Coarse failure category carried on a failed result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    InvalidArgument,
    Transient,
    Fatal,
}
