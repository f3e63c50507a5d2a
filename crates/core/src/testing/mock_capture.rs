//! Mock capture backend for testing.

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::capture::{CaptureBackend, CaptureConstraints, DeviceError, DeviceStream};

use super::fixtures;

/// Mock implementation of the CaptureBackend trait.
///
/// Opens synthetic streams without touching any device. Supports:
/// - Failing the next open with a chosen [`DeviceError`]
/// - Reporting dimensions that differ from the requested ones
/// - Recording requested constraints for assertions
#[derive(Debug, Default)]
pub struct MockCaptureBackend {
    /// Constraints of every successful open.
    opened: Arc<RwLock<Vec<CaptureConstraints>>>,
    /// If set, the next open will fail with this error.
    next_error: Arc<RwLock<Option<DeviceError>>>,
    /// Dimensions reported instead of the requested ones.
    actual_dimensions: Arc<RwLock<Option<(u32, u32)>>>,
}

impl MockCaptureBackend {
    /// Create a new mock capture backend.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next open fail.
    pub async fn set_next_error(&self, error: DeviceError) {
        *self.next_error.write().await = Some(error);
    }

    /// Report these dimensions regardless of the request.
    pub async fn set_actual_dimensions(&self, width: u32, height: u32) {
        *self.actual_dimensions.write().await = Some((width, height));
    }

    /// Number of successful opens.
    pub async fn open_count(&self) -> usize {
        self.opened.read().await.len()
    }

    /// Constraints passed to each successful open.
    pub async fn recorded_constraints(&self) -> Vec<CaptureConstraints> {
        self.opened.read().await.clone()
    }
}

#[async_trait]
impl CaptureBackend for MockCaptureBackend {
    fn name(&self) -> &str {
        "mock"
    }

    async fn open(&self, constraints: &CaptureConstraints) -> Result<DeviceStream, DeviceError> {
        if let Some(error) = self.next_error.write().await.take() {
            return Err(error);
        }

        let (width, height) = self
            .actual_dimensions
            .read()
            .await
            .unwrap_or((constraints.ideal_width, constraints.ideal_height));

        self.opened.write().await.push(constraints.clone());

        Ok(DeviceStream::new(
            fixtures::input_source(constraints.audio),
            width,
            height,
        ))
    }
}
