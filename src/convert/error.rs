//! Error types for the conversion core.

use std::time::Duration;

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, ConvertError>;

/// Errors a conversion job can terminate with.
///
/// Every variant resolves into the job's [`Outcome`](super::Outcome); none
/// of them ever crosses the queue boundary as a panic.
#[derive(Debug, thiserror::Error)]
pub enum ConvertError {
    /// The input document could not be retrieved.
    #[error("download failed: {message}")]
    Download { message: String },

    /// The converter executable is missing or could not be spawned.
    #[error("failed to spawn converter: {message}")]
    Spawn { message: String },

    /// The converter ran and exited non-zero.
    #[error("converter exited abnormally (code {code:?}, signal {signal:?}): {stderr}")]
    ProcessExit {
        code: Option<i32>,
        signal: Option<i32>,
        stderr: String,
    },

    /// The deadline elapsed and the converter was killed.
    #[error("conversion timed out after {elapsed:?}")]
    Timeout { elapsed: Duration, stderr: String },

    /// The converter exited cleanly but produced no recognizable artifact.
    #[error("converter produced no output file in {dir}")]
    OutputMissing { dir: String },

    /// A defect in the queue or supervisor itself. Never expected.
    #[error("internal error: {message}")]
    Internal { message: String },
}

impl ConvertError {
    /// Create a download error.
    pub fn download(message: impl Into<String>) -> Self {
        Self::Download {
            message: message.into(),
        }
    }

    /// Create a spawn error.
    pub fn spawn(message: impl Into<String>) -> Self {
        Self::Spawn {
            message: message.into(),
        }
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Stable tag identifying the error class in logs and payloads.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Download { .. } => "download",
            Self::Spawn { .. } => "spawn",
            Self::ProcessExit { .. } => "process_exit",
            Self::Timeout { .. } => "timeout",
            Self::OutputMissing { .. } => "output_missing",
            Self::Internal { .. } => "internal",
        }
    }
}
