//! Session error types.
//!
//! Annotation failures are recoverable by design: a bad import entry is
//! skipped and counted, never fatal to the session. The errors here cover
//! the cases where the session itself cannot be read or written.

use thiserror::Error;

/// Errors from session storage and annotation import.
#[derive(Debug, Error)]
pub enum AnnotationError {
    #[error("Session not found: {0}")]
    SessionNotFound(String),

    #[error("Invalid session id: {0}")]
    InvalidSessionId(String),

    #[error("Session {session_id} has no keyframes to annotate")]
    NoKeyframes { session_id: String },

    #[error("Malformed region export: {0}")]
    MalformedExport(String),

    #[error("Shorthand parse error: {0}")]
    Shorthand(#[from] vmask_models::ShorthandError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Session document parse error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type SessionResult<T> = Result<T, AnnotationError>;
