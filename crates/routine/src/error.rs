//! Error types for store access and job operations.

use thiserror::Error;

/// Failures raised by a [`CommandClient`](crate::CommandClient).
#[derive(Debug, Clone, Error)]
pub enum ClientError {
    #[error("connection error: {0}")]
    Connect(String),

    /// The store rejected or failed the statement. Holds the store's text verbatim.
    #[error("{0}")]
    Statement(String),

    #[error("timeout after {0}ms")]
    Timeout(u64),

    #[error("decode error: {0}")]
    Decode(String),
}

/// Failures surfaced by routine-load operations.
#[derive(Debug, Error)]
pub enum RoutineError {
    /// The request was rejected before touching the store.
    #[error("{0}")]
    Validation(String),

    #[error("routine load not found: {0}")]
    NotFound(String),

    #[error(transparent)]
    Remote(#[from] ClientError),

    #[error("internal error: {0}")]
    Internal(String),
}

impl RoutineError {
    /// Whether the caller, not the store, is at fault (maps to HTTP 400).
    pub fn is_client_error(&self) -> bool {
        matches!(self, RoutineError::Validation(_))
    }
}
