//! Pipeline error types.

use thiserror::Error;

use vmask_media::VideoProcessingError;
use vmask_session::AnnotationError;

/// Errors raised by tool dispatch and orchestration.
///
/// Tool failures are never retried: every stage validates its own
/// arguments and fails with a typed error instead of assuming upstream
/// validation.
#[derive(Debug, Error)]
pub enum ToolExecutionError {
    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    #[error("Invalid arguments for {tool}: {message}")]
    InvalidArguments { tool: String, message: String },

    #[error("Pipeline run cancelled")]
    Cancelled,

    #[error(transparent)]
    Video(#[from] VideoProcessingError),

    #[error(transparent)]
    Annotation(#[from] AnnotationError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ToolExecutionError {
    pub fn invalid_arguments(tool: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidArguments {
            tool: tool.into(),
            message: message.into(),
        }
    }

    /// Corrective action for the operator, when one is known.
    pub fn suggestion(&self) -> Option<&'static str> {
        match self {
            Self::Video(e) => e.suggestion(),
            Self::UnknownTool(_) => Some("Run with --list-tools to see the available tools"),
            _ => None,
        }
    }
}

pub type PipelineResult<T> = Result<T, ToolExecutionError>;
