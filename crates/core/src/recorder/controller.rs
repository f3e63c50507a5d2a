//! The recorder state machine.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot, Mutex};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, timeout, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::capture::DeviceStream;
use crate::metrics;
use crate::telemetry::{Observable, TelemetryConfig};

use super::config::RecorderConfig;
use super::error::RecorderError;
use super::traits::RecordingBackend;
use super::types::{Chunk, RecorderEvent, RecorderState, RecordingArtifact, RecordingOptions};

/// Observable values published by a [`Recorder`].
#[derive(Debug, Clone)]
pub struct RecorderTelemetry {
    pub state: Observable<RecorderState>,
    /// Whole seconds since the current (or last) recording started.
    pub duration: Observable<u64>,
    pub last_artifact: Observable<Option<RecordingArtifact>>,
}

impl RecorderTelemetry {
    pub fn new(config: &TelemetryConfig) -> Self {
        let capacity = config.channel_capacity;
        Self {
            state: Observable::with_capacity(RecorderState::Idle, capacity),
            duration: Observable::with_capacity(0, capacity),
            last_artifact: Observable::with_capacity(None, capacity),
        }
    }
}

struct ActiveRecording {
    session_id: Uuid,
    stop_tx: Option<oneshot::Sender<()>>,
    ticker: JoinHandle<()>,
    collector: JoinHandle<Collected>,
}

struct Collected {
    chunks: Vec<Chunk>,
    finalized: bool,
    failure: Option<String>,
}

/// Failure attached to an artifact whose backend closed without finalizing.
pub const NOT_FINALIZED_REASON: &str = "recording backend closed without finalizing";

/// Turns a live stream into a [`RecordingArtifact`].
///
/// `Idle -> Recording` on `start`, `Recording -> Stopping -> Idle` on `stop`.
/// Chunks of one session never leak into another: every session gets a fresh
/// collector task that owns its buffer.
pub struct Recorder {
    backend: Arc<dyn RecordingBackend>,
    options: RecordingOptions,
    tick_interval: Duration,
    stop_wait: Duration,
    telemetry: RecorderTelemetry,
    active: Mutex<Option<ActiveRecording>>,
}

impl Recorder {
    pub fn new(
        backend: Arc<dyn RecordingBackend>,
        config: &RecorderConfig,
        telemetry: &TelemetryConfig,
    ) -> Self {
        Self {
            backend,
            options: config.options(),
            tick_interval: config.tick_interval(),
            stop_wait: config.stop_wait(),
            telemetry: RecorderTelemetry::new(telemetry),
            active: Mutex::new(None),
        }
    }

    pub fn state(&self) -> RecorderState {
        self.telemetry.state.get()
    }

    /// Seconds counted for the current (or last) recording.
    pub fn duration_secs(&self) -> u64 {
        self.telemetry.duration.get()
    }

    pub fn telemetry(&self) -> &RecorderTelemetry {
        &self.telemetry
    }

    /// Starts recording `stream`.
    ///
    /// Fails with an invalid-state error if a recording is already active or
    /// no live stream was supplied.
    pub async fn start(&self, stream: Option<DeviceStream>) -> Result<Uuid, RecorderError> {
        let current = self.state();
        if current != RecorderState::Idle {
            return Err(RecorderError::InvalidState {
                expected: RecorderState::Idle,
                actual: current,
            });
        }

        let mut active = self.active.lock().await;
        if active.is_some() {
            return Err(RecorderError::InvalidState {
                expected: RecorderState::Idle,
                actual: self.state(),
            });
        }

        let stream = stream
            .filter(|s| s.is_live())
            .ok_or(RecorderError::NoStream)?;

        let capture = self.backend.start(&stream, &self.options).await?;
        let (events, stop_tx) = capture.into_parts();
        let session_id = Uuid::new_v4();

        let collector = tokio::spawn(collect_chunks(session_id, events));
        self.telemetry.duration.set(0);
        let ticker = spawn_ticker(self.telemetry.duration.clone(), self.tick_interval);

        *active = Some(ActiveRecording {
            session_id,
            stop_tx,
            ticker,
            collector,
        });
        self.telemetry.state.set(RecorderState::Recording);

        info!(
            %session_id,
            backend = self.backend.name(),
            stream_id = %stream.id(),
            bits_per_second = self.options.bits_per_second,
            "Recording started"
        );

        Ok(session_id)
    }

    /// Stops the active recording and assembles its artifact.
    ///
    /// Returns `Ok(None)` without touching any telemetry when idle. The
    /// artifact includes every chunk the backend delivered before finalizing.
    /// When the backend reported an error or closed without finalizing, the
    /// artifact is marked with a failure. A backend that neither finalizes nor
    /// closes within the stop wait is abandoned with a `StopTimeout` error.
    pub async fn stop(&self) -> Result<Option<RecordingArtifact>, RecorderError> {
        let mut active = self.active.lock().await;
        let Some(mut recording) = active.take() else {
            debug!("Stop requested while idle, ignoring");
            return Ok(None);
        };

        recording.ticker.abort();
        let _ = (&mut recording.ticker).await;
        let duration_secs = self.telemetry.duration.get();

        self.telemetry.state.set(RecorderState::Stopping);

        if let Some(stop_tx) = recording.stop_tx.take() {
            let _ = stop_tx.send(());
        }

        let collected = match timeout(self.stop_wait, &mut recording.collector).await {
            Ok(Ok(collected)) => collected,
            Ok(Err(e)) => {
                self.abandon();
                return Err(RecorderError::backend(format!(
                    "chunk collector failed: {}",
                    e
                )));
            }
            Err(_) => {
                recording.collector.abort();
                warn!(
                    session_id = %recording.session_id,
                    wait_secs = self.stop_wait.as_secs(),
                    "Backend did not finalize, abandoning recording"
                );
                self.abandon();
                return Err(RecorderError::StopTimeout {
                    secs: self.stop_wait.as_secs(),
                });
            }
        };

        let failure = match (collected.failure, collected.finalized) {
            (Some(reason), _) => Some(reason),
            (None, false) => Some(NOT_FINALIZED_REASON.to_string()),
            (None, true) => None,
        };

        let mut artifact =
            RecordingArtifact::assemble(recording.session_id, &collected.chunks, duration_secs);
        if let Some(reason) = failure {
            warn!(
                session_id = %recording.session_id,
                reason = %reason,
                "Recording is incomplete, keeping collected chunks"
            );
            artifact = artifact.with_failure(reason);
        }

        metrics::RECORDINGS_TOTAL
            .with_label_values(&[if artifact.is_complete() {
                "success"
            } else {
                "failed"
            }])
            .inc();
        metrics::RECORDING_BYTES.observe(artifact.size_bytes as f64);

        info!(
            session_id = %artifact.session_id,
            size_bytes = artifact.size_bytes,
            chunks = artifact.chunk_count,
            duration_secs,
            complete = artifact.is_complete(),
            "Recording finalized"
        );

        self.telemetry.last_artifact.set(Some(artifact.clone()));
        self.telemetry.state.set(RecorderState::Idle);

        Ok(Some(artifact))
    }

    fn abandon(&self) {
        self.telemetry.state.set(RecorderState::Idle);
        metrics::RECORDINGS_TOTAL
            .with_label_values(&["failed"])
            .inc();
    }
}

impl Drop for Recorder {
    fn drop(&mut self) {
        if let Some(recording) = self.active.get_mut().take() {
            recording.ticker.abort();
            recording.collector.abort();
        }
    }
}

/// Appends non-empty chunks in arrival order until the backend finalizes.
async fn collect_chunks(
    session_id: Uuid,
    mut events: mpsc::Receiver<RecorderEvent>,
) -> Collected {
    let mut chunks = Vec::new();
    let mut failure = None;

    while let Some(event) = events.recv().await {
        match event {
            RecorderEvent::Chunk(data) => {
                if data.is_empty() {
                    continue;
                }
                let sequence = chunks.len() as u64;
                chunks.push(Chunk::new(sequence, data));
            }
            RecorderEvent::Failed(reason) => {
                warn!(%session_id, reason = %reason, "Recording backend error");
                failure = Some(reason);
            }
            RecorderEvent::Finalized => {
                return Collected {
                    chunks,
                    finalized: true,
                    failure,
                };
            }
        }
    }

    Collected {
        chunks,
        finalized: false,
        failure,
    }
}

fn spawn_ticker(duration: Observable<u64>, period: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = interval_at(Instant::now() + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            interval.tick().await;
            duration.modify(|secs| *secs += 1);
        }
    })
}
