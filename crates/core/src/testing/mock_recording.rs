//! Mock recording backend for testing.

use async_trait::async_trait;
use bytes::Bytes;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, RwLock};

use crate::capture::DeviceStream;
use crate::recorder::{
    ActiveCapture, RecorderError, RecorderEvent, RecordingBackend, RecordingOptions,
};

/// Mock implementation of the RecordingBackend trait.
///
/// Chunks are pushed by the test with [`emit_chunk`](Self::emit_chunk)
/// instead of being produced on a timer.
///
/// # Example
///
/// ```rust,ignore
/// use reelpress_core::testing::MockRecordingBackend;
///
/// let backend = Arc::new(MockRecordingBackend::new());
/// let recorder = Recorder::new(backend.clone(), &config, &telemetry);
///
/// recorder.start(Some(stream)).await?;
/// backend.emit_chunk(Bytes::from_static(b"data")).await;
/// let artifact = recorder.stop().await?.unwrap();
/// ```
#[derive(Debug)]
pub struct MockRecordingBackend {
    /// Sender of the active session.
    current: Arc<RwLock<Option<mpsc::Sender<RecorderEvent>>>>,
    /// Chunks delivered after the stop request, before finalizing.
    trailing: Arc<RwLock<Vec<Bytes>>>,
    /// Whether to send `Finalized` or just close the channel on stop.
    finalize: Arc<RwLock<bool>>,
    /// Keep the channel open after stop and never finalize.
    stall: Arc<RwLock<bool>>,
    /// If set, the next start will fail with this error.
    next_error: Arc<RwLock<Option<RecorderError>>>,
    /// Options of every successful start.
    started: Arc<RwLock<Vec<RecordingOptions>>>,
}

impl Default for MockRecordingBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MockRecordingBackend {
    /// Create a new mock recording backend.
    pub fn new() -> Self {
        Self {
            current: Arc::new(RwLock::new(None)),
            trailing: Arc::new(RwLock::new(Vec::new())),
            finalize: Arc::new(RwLock::new(true)),
            stall: Arc::new(RwLock::new(false)),
            next_error: Arc::new(RwLock::new(None)),
            started: Arc::new(RwLock::new(Vec::new())),
        }
    }

    /// Deliver a chunk to the active session. Returns false if none is active.
    pub async fn emit_chunk(&self, data: Bytes) -> bool {
        self.emit(RecorderEvent::Chunk(data)).await
    }

    /// Report a backend failure to the active session.
    pub async fn emit_failure(&self, reason: impl Into<String>) -> bool {
        self.emit(RecorderEvent::Failed(reason.into())).await
    }

    async fn emit(&self, event: RecorderEvent) -> bool {
        let sender = self.current.read().await.clone();
        match sender {
            Some(tx) => tx.send(event).await.is_ok(),
            None => false,
        }
    }

    /// Deliver this chunk after the stop request of every later session.
    pub async fn set_trailing_chunk(&self, data: Bytes) {
        self.trailing.write().await.push(data);
    }

    /// Close the channel on stop without a `Finalized` event.
    pub async fn set_finalize(&self, finalize: bool) {
        *self.finalize.write().await = finalize;
    }

    /// Never finalize nor close the channel after a stop request.
    pub async fn set_stall_on_stop(&self, stall: bool) {
        *self.stall.write().await = stall;
    }

    /// Make the next start fail.
    pub async fn set_next_error(&self, error: RecorderError) {
        *self.next_error.write().await = Some(error);
    }

    /// Number of successful starts.
    pub async fn start_count(&self) -> usize {
        self.started.read().await.len()
    }

    /// Options passed to each successful start.
    pub async fn recorded_options(&self) -> Vec<RecordingOptions> {
        self.started.read().await.clone()
    }

    /// Whether a session is currently active.
    pub async fn is_active(&self) -> bool {
        self.current.read().await.is_some()
    }
}

#[async_trait]
impl RecordingBackend for MockRecordingBackend {
    fn name(&self) -> &str {
        "mock"
    }

    async fn start(
        &self,
        _stream: &DeviceStream,
        options: &RecordingOptions,
    ) -> Result<ActiveCapture, RecorderError> {
        if let Some(error) = self.next_error.write().await.take() {
            return Err(error);
        }

        let (tx, rx) = mpsc::channel(256);
        let (stop_tx, stop_rx) = oneshot::channel::<()>();

        *self.current.write().await = Some(tx.clone());
        self.started.write().await.push(options.clone());

        let trailing = self.trailing.read().await.clone();
        let finalize = *self.finalize.read().await;
        let stall = *self.stall.read().await;
        let current = Arc::clone(&self.current);

        tokio::spawn(async move {
            let _ = stop_rx.await;

            {
                let mut slot = current.write().await;
                if slot.as_ref().is_some_and(|s| s.same_channel(&tx)) {
                    *slot = None;
                }
            }

            for data in trailing {
                let _ = tx.send(RecorderEvent::Chunk(data)).await;
            }
            if stall {
                std::future::pending::<()>().await;
            }
            if finalize {
                let _ = tx.send(RecorderEvent::Finalized).await;
            }
        });

        Ok(ActiveCapture::new(rx, stop_tx))
    }
}
