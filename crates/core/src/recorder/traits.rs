//! Trait definitions for the recorder module.

use async_trait::async_trait;
use tokio::sync::{mpsc, oneshot};

use crate::capture::DeviceStream;

use super::error::RecorderError;
use super::types::{RecorderEvent, RecordingOptions};

/// A running capture started by a [`RecordingBackend`].
///
/// Events arrive in capture order. After a stop request the backend delivers
/// any remaining chunks, then exactly one [`RecorderEvent::Finalized`], then
/// closes the channel.
#[derive(Debug)]
pub struct ActiveCapture {
    events: mpsc::Receiver<RecorderEvent>,
    stop: Option<oneshot::Sender<()>>,
}

impl ActiveCapture {
    pub fn new(events: mpsc::Receiver<RecorderEvent>, stop: oneshot::Sender<()>) -> Self {
        Self {
            events,
            stop: Some(stop),
        }
    }

    pub(crate) fn into_parts(self) -> (mpsc::Receiver<RecorderEvent>, Option<oneshot::Sender<()>>) {
        (self.events, self.stop)
    }
}

/// The mechanism that encodes a live stream into chunks.
#[async_trait]
pub trait RecordingBackend: Send + Sync {
    /// Returns the name of this backend implementation.
    fn name(&self) -> &str;

    /// Starts encoding `stream`. The stream is only read, never mutated.
    async fn start(
        &self,
        stream: &DeviceStream,
        options: &RecordingOptions,
    ) -> Result<ActiveCapture, RecorderError>;
}
