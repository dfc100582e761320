//! Server error types.
//!
//! These errors never escape the dispatcher: every variant is folded into
//! a well-formed response before a request returns. They exist so the
//! internal layers can propagate with `?` and the dispatcher can decide
//! policy in one place.

use thiserror::Error;

/// Errors raised inside the dispatch pipeline.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Virtual-filesystem failure
    #[error(transparent)]
    Fs(#[from] loft_fs::FsError),

    /// Module transform failure
    #[error(transparent)]
    Transform(#[from] loft_transform::TransformError),

    /// A user handler threw while executing
    #[error("Handler error: {0}")]
    Handler(String),

    /// A handler finished without ending its response within the timeout
    #[error("Handler timed out after {0} ms")]
    HandlerTimeout(u64),

    /// The handler runtime itself failed (evaluation machinery, not user code)
    #[error("Handler runtime error: {0}")]
    Runtime(String),

    /// JSON encoding/decoding failure
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias for server operations.
pub type ServerResult<T, E = ServerError> = std::result::Result<T, E>;
