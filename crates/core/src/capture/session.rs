//! Capture session lifecycle.

use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, info};

use super::error::DeviceError;
use super::traits::CaptureBackend;
use super::types::{CaptureConstraints, DeviceStream};

/// Owns the live device stream between `acquire` and `release`.
pub struct CaptureSession {
    backend: Arc<dyn CaptureBackend>,
    stream: Mutex<Option<DeviceStream>>,
}

impl CaptureSession {
    pub fn new(backend: Arc<dyn CaptureBackend>) -> Self {
        Self {
            backend,
            stream: Mutex::new(None),
        }
    }

    /// Acquires a live stream from the device.
    ///
    /// A stream held from an earlier acquisition is released first, so at most
    /// one device stream is open per session.
    pub async fn acquire(
        &self,
        constraints: &CaptureConstraints,
    ) -> Result<DeviceStream, DeviceError> {
        let mut slot = self.stream.lock().await;

        if let Some(previous) = slot.take() {
            debug!(stream_id = %previous.id(), "Releasing previous stream before re-acquiring");
            previous.stop_all();
        }

        info!(
            backend = self.backend.name(),
            width = constraints.ideal_width,
            height = constraints.ideal_height,
            audio = constraints.audio,
            "Acquiring capture device"
        );

        let stream = self.backend.open(constraints).await?;
        *slot = Some(stream.clone());
        Ok(stream)
    }

    /// Stops all tracks and forgets the stream. Idempotent.
    pub async fn release(&self) {
        if let Some(stream) = self.stream.lock().await.take() {
            stream.stop_all();
            info!(stream_id = %stream.id(), "Capture device released");
        }
    }

    /// The currently held stream, if one is live.
    pub async fn stream(&self) -> Option<DeviceStream> {
        self.stream
            .lock()
            .await
            .as_ref()
            .filter(|s| s.is_live())
            .cloned()
    }

    pub async fn is_active(&self) -> bool {
        self.stream().await.is_some()
    }
}
