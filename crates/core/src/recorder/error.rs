//! Error types for the recorder module.

use std::path::PathBuf;
use thiserror::Error;

use super::types::RecorderState;

/// Errors that can occur while recording.
#[derive(Debug, Error)]
pub enum RecorderError {
    /// Command issued in the wrong state.
    #[error("invalid recorder state: expected {expected}, got {actual}")]
    InvalidState {
        expected: RecorderState,
        actual: RecorderState,
    },

    /// No live device stream to record from.
    #[error("invalid recorder state: no live stream available")]
    NoStream,

    /// FFmpeg binary not found.
    #[error("FFmpeg not found at path: {path}")]
    FfmpegNotFound { path: PathBuf },

    /// The recording backend failed.
    #[error("recording backend failed: {reason}")]
    Backend { reason: String },

    /// The backend never finalized after a stop request.
    #[error("recording backend did not finalize within {secs}s")]
    StopTimeout { secs: u64 },

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl RecorderError {
    pub fn backend(reason: impl Into<String>) -> Self {
        Self::Backend {
            reason: reason.into(),
        }
    }

    /// Whether the command was rejected because of recorder state.
    pub fn is_invalid_state(&self) -> bool {
        matches!(self, Self::InvalidState { .. } | Self::NoStream)
    }
}
