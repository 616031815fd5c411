//! Unified error handling for relaybot.
//!
//! This module provides the error hierarchy for the dispatch core: handler
//! failures, worker job outcomes and output failures, each with a static
//! code used as a metrics label.

use thiserror::Error;

// ============================================================================
// Handler Errors (callback execution)
// ============================================================================

/// Errors a callback can return.
#[derive(Debug, Error)]
pub enum HandlerError {
    /// The handler declines the job right now; the worker requeues it.
    #[error("job not accepted")]
    NotAccepted,

    /// User-facing usage message. The command router relays it to the caller.
    #[error("usage: {0}")]
    Usage(String),

    #[error("not enough parameters")]
    MissingParams,

    #[error("internal error: {0}")]
    Internal(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl HandlerError {
    /// Get a static error code string for metrics labeling.
    #[inline]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::NotAccepted => "not_accepted",
            Self::Usage(_) => "usage",
            Self::MissingParams => "missing_params",
            Self::Internal(_) => "internal_error",
            Self::Other(_) => "other",
        }
    }
}

/// Result type for callbacks.
pub type HandlerResult = Result<(), HandlerError>;

// ============================================================================
// Output Errors (socket write path)
// ============================================================================

/// Failures on the outbound write path.
#[derive(Debug, Error)]
pub enum OutputError {
    #[error("write failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("line contains a line break")]
    EmbeddedNewline,
}

impl OutputError {
    #[inline]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Io(_) => "io",
            Self::EmbeddedNewline => "embedded_newline",
        }
    }
}

// ============================================================================
// Job Errors (worker loop)
// ============================================================================

/// Outcome of a failed job, as seen by a worker.
///
/// `NotAccepted` is a retry signal, everything else is logged and dropped.
#[derive(Debug, Error)]
pub enum JobError {
    #[error("job not accepted")]
    NotAccepted,

    #[error("{message}")]
    Failed { code: &'static str, message: String },
}

impl JobError {
    #[inline]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::NotAccepted => "not_accepted",
            Self::Failed { code, .. } => code,
        }
    }
}

impl From<HandlerError> for JobError {
    fn from(err: HandlerError) -> Self {
        match err {
            HandlerError::NotAccepted => Self::NotAccepted,
            other => Self::Failed {
                code: other.error_code(),
                message: other.to_string(),
            },
        }
    }
}

impl From<OutputError> for JobError {
    fn from(err: OutputError) -> Self {
        Self::Failed {
            code: err.error_code(),
            message: err.to_string(),
        }
    }
}
