//! Trait definitions for the capture module.

use async_trait::async_trait;

use super::error::DeviceError;
use super::types::{CaptureConstraints, DeviceStream};

/// A source of live device streams.
#[async_trait]
pub trait CaptureBackend: Send + Sync {
    /// Returns the name of this backend implementation.
    fn name(&self) -> &str;

    /// Opens the device and returns a live stream.
    ///
    /// The returned stream may have different dimensions than requested.
    async fn open(&self, constraints: &CaptureConstraints) -> Result<DeviceStream, DeviceError>;
}
