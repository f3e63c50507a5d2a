//! Error types for the capture module.

use std::path::PathBuf;
use thiserror::Error;

/// Failure to acquire a device stream.
#[derive(Debug, Error)]
pub enum DeviceError {
    /// The OS refused access to the device.
    #[error("Permission denied for capture device: {device}")]
    PermissionDenied { device: String },

    /// No device matches the requested input.
    #[error("No capture device found: {device}")]
    NotFound { device: String },

    /// The device exists but could not be opened.
    #[error("Capture device unavailable: {reason}")]
    Unavailable { reason: String },

    /// The capture tool itself is missing.
    #[error("FFmpeg not found at path: {path}")]
    BackendMissing { path: PathBuf },

    /// Probing the device took too long.
    #[error("Device probe timed out after {timeout_secs} seconds")]
    Timeout { timeout_secs: u64 },

    /// I/O error while talking to the capture tool.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl DeviceError {
    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self::Unavailable {
            reason: reason.into(),
        }
    }

    /// Classifies a failed probe from the tool's diagnostic output.
    pub fn from_probe_output(device: &str, stderr: &str) -> Self {
        let lower = stderr.to_lowercase();
        if lower.contains("permission denied") || lower.contains("not authorized") {
            Self::PermissionDenied {
                device: device.to_string(),
            }
        } else if lower.contains("no such file or directory")
            || lower.contains("could not find")
            || lower.contains("no such device")
            || lower.contains("not found")
        {
            Self::NotFound {
                device: device.to_string(),
            }
        } else {
            let reason = stderr
                .lines()
                .rev()
                .find(|l| !l.trim().is_empty())
                .unwrap_or("device probe failed")
                .trim()
                .to_string();
            Self::Unavailable { reason }
        }
    }
}
