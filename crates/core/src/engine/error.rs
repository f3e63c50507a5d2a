//! Error types for the transcode engine.

use std::path::PathBuf;
use thiserror::Error;

use super::types::{EngineState, ExecutionMode};

/// Errors raised while resolving engine resources.
#[derive(Debug, Error)]
pub enum ResourceError {
    /// The locator could not be fetched.
    #[error("Failed to fetch {locator}: {reason}")]
    FetchFailed { locator: String, reason: String },

    /// The server answered with a non-success status.
    #[error("Unexpected status {status} fetching {locator}")]
    Status { locator: String, status: u16 },

    /// Local resource file not found.
    #[error("Resource not found: {path}")]
    NotFound { path: PathBuf },

    /// Fetch timed out.
    #[error("Fetching {locator} timed out after {timeout_secs} seconds")]
    Timeout { locator: String, timeout_secs: u64 },

    /// I/O error reading a local resource.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ResourceError {
    pub fn fetch_failed(locator: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::FetchFailed {
            locator: locator.into(),
            reason: reason.into(),
        }
    }
}

/// Errors raised by a job runner.
#[derive(Debug, Error)]
pub enum RunnerError {
    /// FFmpeg binary not found.
    #[error("FFmpeg not found at path: {path}")]
    FfmpegNotFound { path: PathBuf },

    /// Operation attempted before `load`.
    #[error("Runner is not loaded")]
    NotLoaded,

    /// The runner failed to initialize.
    #[error("Runner load failed: {reason}")]
    LoadFailed { reason: String },

    /// File name outside the runner's file space.
    #[error("Invalid file name: {name}")]
    InvalidFileName { name: String },

    /// File does not exist in the runner's file space.
    #[error("File not found: {name}")]
    FileNotFound { name: String },

    /// Job exited unsuccessfully.
    #[error("Job exited with code {code}")]
    ExitCode { code: i32, stderr: Option<String> },

    /// Job timed out.
    #[error("Job timed out after {timeout_secs} seconds")]
    Timeout { timeout_secs: u64 },

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl RunnerError {
    pub fn load_failed(reason: impl Into<String>) -> Self {
        Self::LoadFailed {
            reason: reason.into(),
        }
    }
}

/// Errors surfaced by the [`TranscodeEngine`](super::TranscodeEngine).
#[derive(Debug, Error)]
pub enum EngineError {
    /// Loading the runner for a mode failed.
    #[error("Engine load failed ({mode}): {reason}")]
    LoadFailed { mode: ExecutionMode, reason: String },

    /// A job was requested while the engine was not ready.
    #[error("Engine not ready (state: {state})")]
    NotReady { state: EngineState },

    /// The job itself failed.
    #[error("Conversion failed: {reason}")]
    JobFailed { reason: String },
}

impl EngineError {
    pub fn load_failed(mode: ExecutionMode, reason: impl std::fmt::Display) -> Self {
        Self::LoadFailed {
            mode,
            reason: reason.to_string(),
        }
    }

    pub fn job_failed(reason: impl std::fmt::Display) -> Self {
        Self::JobFailed {
            reason: reason.to_string(),
        }
    }

    /// Whether reloading the engine may fix this error.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::LoadFailed { .. } | Self::NotReady { .. })
    }
}
