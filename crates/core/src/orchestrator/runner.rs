//! Recording orchestrator implementation.
//!
//! Wires capture, recording and transcoding together:
//! - Capture: one device stream, acquired on `initialize`
//! - Recording: one session at a time, driven by commands
//! - Engine: loads and conversions queue on one worker, in call order

use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::capture::{CaptureConstraints, CaptureSession, DeviceStream, FfmpegCaptureBackend};
use crate::config::Config;
use crate::engine::{
    ConvertedArtifact, EngineError, FfmpegRunnerFactory, HttpResourceResolver, TranscodeEngine,
};
use crate::recorder::{FfmpegRecordingBackend, Recorder, RecorderState, RecordingArtifact};
use crate::telemetry::{Observable, TelemetryConfig};

use super::config::OrchestratorConfig;
use super::types::{OrchestratorError, OrchestratorStatus, SessionTelemetry};

type ConversionHandle = JoinHandle<Result<ConvertedArtifact, OrchestratorError>>;
type LoadHandle = JoinHandle<Result<(), OrchestratorError>>;
type Reply<T> = oneshot::Sender<Result<T, EngineError>>;

/// Work for the engine worker.
enum EngineCommand {
    Load { multi_thread: bool, reply: Reply<()> },
    Reload { reply: Reply<()> },
    Run { artifact: RecordingArtifact, reply: Reply<ConvertedArtifact> },
}

/// Execute engine commands one at a time, in the order they were queued.
async fn engine_worker(
    engine: Arc<TranscodeEngine>,
    mut commands: mpsc::UnboundedReceiver<EngineCommand>,
) {
    while let Some(command) = commands.recv().await {
        // A dropped receiver only means nobody waits for the result
        match command {
            EngineCommand::Load {
                multi_thread,
                reply,
            } => {
                let _ = reply.send(engine.load(multi_thread).await);
            }
            EngineCommand::Reload { reply } => {
                let _ = reply.send(engine.reload().await);
            }
            EngineCommand::Run { artifact, reply } => {
                let _ = reply.send(engine.run(&artifact).await);
            }
        }
    }
    debug!("Engine queue closed");
}

async fn await_reply<T>(
    reply: oneshot::Receiver<Result<T, EngineError>>,
) -> Result<T, OrchestratorError> {
    reply
        .await
        .map_err(|_| OrchestratorError::TaskFailed("engine queue closed".to_string()))?
        .map_err(OrchestratorError::from)
}

/// The recording orchestrator.
///
/// Every failure is reported on the status observable before it is returned,
/// so a presentation layer only has to watch telemetry.
pub struct Orchestrator {
    config: OrchestratorConfig,
    constraints: CaptureConstraints,
    capture: CaptureSession,
    recorder: Recorder,
    engine: Arc<TranscodeEngine>,
    telemetry: SessionTelemetry,

    // Background work
    queue: mpsc::UnboundedSender<EngineCommand>,
    loads: Mutex<Vec<LoadHandle>>,
    conversions: Mutex<Vec<ConversionHandle>>,
}

impl Orchestrator {
    /// Create a new orchestrator.
    ///
    /// Spawns the engine worker, so it must be called within a Tokio runtime.
    pub fn new(
        config: OrchestratorConfig,
        constraints: CaptureConstraints,
        capture: CaptureSession,
        recorder: Recorder,
        engine: TranscodeEngine,
        telemetry: &TelemetryConfig,
    ) -> Self {
        let recorder_telemetry = recorder.telemetry().clone();
        let conversion = engine.telemetry().clone();

        let telemetry = SessionTelemetry {
            status: conversion.status,
            conversion_time: conversion.conversion_time,
            converted: conversion.converted,
            duration: recorder_telemetry.duration,
            file_size_before: Observable::with_capacity(String::new(), telemetry.channel_capacity),
            original: recorder_telemetry.last_artifact,
            recorder_state: recorder_telemetry.state,
            engine_state: engine.state_observable(),
            execution_mode: engine.mode_observable(),
        };

        let engine = Arc::new(engine);
        let (queue, commands) = mpsc::unbounded_channel();
        tokio::spawn(engine_worker(Arc::clone(&engine), commands));

        Self {
            config,
            constraints,
            capture,
            recorder,
            engine,
            telemetry,
            queue,
            loads: Mutex::new(Vec::new()),
            conversions: Mutex::new(Vec::new()),
        }
    }

    /// Create an orchestrator backed by ffmpeg for capture, recording and
    /// transcoding.
    pub fn from_config(config: &Config) -> Result<Self, OrchestratorError> {
        let capture = CaptureSession::new(Arc::new(FfmpegCaptureBackend::new(
            config.capture.clone(),
        )));

        let recorder = Recorder::new(
            Arc::new(FfmpegRecordingBackend::new(config.recorder.clone())),
            &config.recorder,
            &config.telemetry,
        );

        let resolver =
            HttpResourceResolver::new(Duration::from_secs(config.engine.fetch_timeout_secs))?;
        let engine = TranscodeEngine::new(
            Arc::new(FfmpegRunnerFactory::new(config.engine.clone())),
            Arc::new(resolver),
            config.engine.clone(),
            &config.telemetry,
        );

        Ok(Self::new(
            config.orchestrator.clone(),
            config.capture.constraints(),
            capture,
            recorder,
            engine,
            &config.telemetry,
        ))
    }

    pub fn telemetry(&self) -> &SessionTelemetry {
        &self.telemetry
    }

    pub fn engine(&self) -> &TranscodeEngine {
        &self.engine
    }

    pub fn recorder(&self) -> &Recorder {
        &self.recorder
    }

    pub fn capture(&self) -> &CaptureSession {
        &self.capture
    }

    fn report(&self, err: impl Into<OrchestratorError>) -> OrchestratorError {
        let err = err.into();
        self.telemetry.status.set(err.to_string());
        err
    }

    /// Queue a command behind every command queued before it.
    fn submit<T>(
        &self,
        command: impl FnOnce(Reply<T>) -> EngineCommand,
    ) -> oneshot::Receiver<Result<T, EngineError>> {
        let (reply, rx) = oneshot::channel();
        if self.queue.send(command(reply)).is_err() {
            error!("Engine worker is gone");
        }
        rx
    }

    /// Acquire the device and start loading the engine in the background.
    ///
    /// A device failure is reported and returned; the engine load continues
    /// regardless.
    pub async fn initialize(&self) -> Result<DeviceStream, OrchestratorError> {
        if self.config.load_engine_on_start {
            let multi_thread = self.engine.mode().is_multi_thread();
            let reply = self.submit(|reply| EngineCommand::Load {
                multi_thread,
                reply,
            });

            let mut loads = self.loads.lock().await;
            loads.retain(|h| !h.is_finished());
            loads.push(tokio::spawn(await_reply(reply)));
        }

        match self.capture.acquire(&self.constraints).await {
            Ok(stream) => {
                info!(
                    stream_id = %stream.id(),
                    width = stream.width(),
                    height = stream.height(),
                    audio = stream.has_audio(),
                    "Device acquired"
                );
                Ok(stream)
            }
            Err(e) => {
                error!(error = %e, "Device acquisition failed");
                Err(self.report(e))
            }
        }
    }

    /// Start recording the acquired stream.
    pub async fn start_recording(&self) -> Result<Uuid, OrchestratorError> {
        let stream = self.capture.stream().await;
        self.recorder.start(stream).await.map_err(|e| {
            warn!(error = %e, "Cannot start recording");
            self.report(e)
        })
    }

    /// Stop recording and forward the artifact for conversion.
    ///
    /// Returns once the artifact exists; conversion continues in the
    /// background. Returns `Ok(None)` when nothing was recording. An
    /// incomplete recording is reported on the status and kept, but not
    /// converted automatically.
    pub async fn stop_recording(&self) -> Result<Option<RecordingArtifact>, OrchestratorError> {
        let artifact = match self.recorder.stop().await {
            Ok(Some(artifact)) => artifact,
            Ok(None) => return Ok(None),
            Err(e) => return Err(self.report(e)),
        };

        self.telemetry.file_size_before.set(format!(
            "File size before conversion: {:.2} MB",
            artifact.size_mb()
        ));

        if let Some(reason) = &artifact.failure {
            warn!(
                session_id = %artifact.session_id,
                reason = %reason,
                "Skipping conversion of incomplete recording"
            );
            self.telemetry
                .status
                .set(format!("Recording incomplete: {}", reason));
        } else if self.config.auto_convert {
            self.convert(artifact.clone()).await;
        }

        Ok(Some(artifact))
    }

    /// Queue an artifact for conversion; the result is collected in the
    /// background.
    pub async fn convert(&self, artifact: RecordingArtifact) {
        debug!(session_id = %artifact.session_id, "Forwarding recording for conversion");
        let reply = self.submit(|reply| EngineCommand::Run { artifact, reply });

        let mut conversions = self.conversions.lock().await;
        conversions.retain(|h| !h.is_finished());
        conversions.push(tokio::spawn(await_reply(reply)));
    }

    /// Reload the engine in the given mode.
    ///
    /// Runs after every load and conversion queued before it, then discards
    /// the old runner.
    pub async fn set_execution_mode(&self, multi_thread: bool) -> Result<(), OrchestratorError> {
        info!(multi_thread, "Switching execution mode");
        let reply = self.submit(|reply| EngineCommand::Load {
            multi_thread,
            reply,
        });
        await_reply(reply).await
    }

    /// Retry loading the engine in the current mode.
    pub async fn reload_engine(&self) -> Result<(), OrchestratorError> {
        let reply = self.submit(|reply| EngineCommand::Reload { reply });
        await_reply(reply).await
    }

    /// Wait for every forwarded conversion; returns the result of the latest.
    pub async fn wait_for_conversion(
        &self,
    ) -> Option<Result<ConvertedArtifact, OrchestratorError>> {
        let handles = std::mem::take(&mut *self.conversions.lock().await);
        join_all(handles)
            .await
            .into_iter()
            .last()
            .map(|joined| match joined {
                Ok(result) => result,
                Err(e) => Err(OrchestratorError::TaskFailed(e.to_string())),
            })
    }

    /// Wait for background engine loads.
    pub async fn wait_for_engine(&self) {
        let handles = std::mem::take(&mut *self.loads.lock().await);
        for joined in join_all(handles).await {
            match joined {
                Ok(Ok(())) => {}
                Ok(Err(e)) => debug!(error = %e, "Background engine load failed"),
                Err(e) => warn!(error = %e, "Engine load task failed"),
            }
        }
    }

    /// Get current orchestrator status.
    pub async fn status(&self) -> OrchestratorStatus {
        let pending_conversions = self
            .conversions
            .lock()
            .await
            .iter()
            .filter(|h| !h.is_finished())
            .count();

        OrchestratorStatus {
            device_active: self.capture.is_active().await,
            recorder_state: self.recorder.state(),
            duration_secs: self.recorder.duration_secs(),
            engine_state: self.engine.state(),
            execution_mode: self.engine.mode(),
            pending_conversions,
            last_recording_bytes: self.telemetry.original.get().map(|a| a.size_bytes),
            last_converted_bytes: self.telemetry.converted.get().map(|a| a.size_bytes),
        }
    }

    /// Stop any recording, wait for background work and release the device.
    pub async fn shutdown(&self) {
        info!("Shutting down orchestrator");

        if self.recorder.state() != RecorderState::Idle {
            match self.recorder.stop().await {
                Ok(Some(artifact)) => info!(
                    size_bytes = artifact.size_bytes,
                    "Discarded recording in progress at shutdown"
                ),
                Ok(None) => {}
                Err(e) => warn!(error = %e, "Failed to stop recording at shutdown"),
            }
        }

        self.wait_for_engine().await;
        if let Some(Err(e)) = self.wait_for_conversion().await {
            warn!(error = %e, "Last conversion failed");
        }

        self.capture.release().await;
        info!("Orchestrator stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{EngineConfig, EngineState};
    use crate::recorder::RecorderConfig;
    use crate::testing::{
        MockCaptureBackend, MockRecordingBackend, MockResourceResolver, MockRunnerFactory,
    };
    use bytes::Bytes;

    struct Harness {
        orchestrator: Orchestrator,
        capture: Arc<MockCaptureBackend>,
        recording: Arc<MockRecordingBackend>,
        runners: Arc<MockRunnerFactory>,
    }

    fn harness(config: OrchestratorConfig) -> Harness {
        let capture = Arc::new(MockCaptureBackend::new());
        let recording = Arc::new(MockRecordingBackend::new());
        let runners = Arc::new(MockRunnerFactory::new());
        let telemetry = TelemetryConfig::default();

        let orchestrator = Orchestrator::new(
            config,
            CaptureConstraints::default(),
            CaptureSession::new(capture.clone()),
            Recorder::new(recording.clone(), &RecorderConfig::default(), &telemetry),
            TranscodeEngine::new(
                runners.clone(),
                Arc::new(MockResourceResolver::new()),
                EngineConfig::default(),
                &telemetry,
            ),
            &telemetry,
        );

        Harness {
            orchestrator,
            capture,
            recording,
            runners,
        }
    }

    #[tokio::test]
    async fn test_initialize_acquires_and_loads() {
        let h = harness(OrchestratorConfig::default());

        let stream = h.orchestrator.initialize().await.unwrap();
        h.orchestrator.wait_for_engine().await;

        assert!(stream.is_live());
        assert_eq!(h.capture.open_count().await, 1);
        assert_eq!(h.orchestrator.engine().state(), EngineState::Ready);
        assert_eq!(h.runners.created_modes().len(), 1);
    }

    #[tokio::test]
    async fn test_initialize_device_error_is_reported() {
        let h = harness(OrchestratorConfig::default());
        h.capture
            .set_next_error(crate::capture::DeviceError::PermissionDenied {
                device: "camera".to_string(),
            })
            .await;

        let result = h.orchestrator.initialize().await;
        h.orchestrator.wait_for_engine().await;

        assert!(matches!(result, Err(OrchestratorError::Device(_))));
        assert!(h
            .orchestrator
            .telemetry()
            .status
            .get()
            .contains("Permission denied"));
        // Engine still loads
        assert_eq!(h.orchestrator.engine().state(), EngineState::Ready);
    }

    #[tokio::test]
    async fn test_start_without_device_is_reported() {
        let h = harness(OrchestratorConfig::default());

        let result = h.orchestrator.start_recording().await;

        assert!(matches!(result, Err(OrchestratorError::Recorder(_))));
        assert!(h
            .orchestrator
            .telemetry()
            .status
            .get()
            .starts_with("recorder error:"));
    }

    #[tokio::test]
    async fn test_stop_publishes_size_and_converts() {
        let h = harness(OrchestratorConfig::default());
        h.orchestrator.initialize().await.unwrap();
        h.orchestrator.wait_for_engine().await;

        h.orchestrator.start_recording().await.unwrap();
        h.recording
            .emit_chunk(Bytes::from(vec![7u8; 1024 * 1024]))
            .await;
        h.recording
            .emit_chunk(Bytes::from(vec![7u8; 256 * 1024]))
            .await;

        let artifact = h.orchestrator.stop_recording().await.unwrap().unwrap();
        assert_eq!(artifact.size_bytes, 1280 * 1024);
        assert_eq!(
            h.orchestrator.telemetry().file_size_before.get(),
            "File size before conversion: 1.25 MB"
        );
        assert!(h.orchestrator.telemetry().original.get().is_some());

        let converted = h.orchestrator.wait_for_conversion().await.unwrap().unwrap();
        assert_eq!(converted.media_type, "video/mp4");
        assert_eq!(h.orchestrator.telemetry().status.get(), "Conversion completed.");
    }

    #[tokio::test]
    async fn test_backend_failure_reported_and_not_converted() {
        let h = harness(OrchestratorConfig::default());
        h.orchestrator.initialize().await.unwrap();
        h.orchestrator.wait_for_engine().await;

        h.orchestrator.start_recording().await.unwrap();
        h.recording.emit_chunk(Bytes::from_static(b"partial")).await;
        h.recording.emit_failure("encoder crashed").await;

        let artifact = h.orchestrator.stop_recording().await.unwrap().unwrap();

        assert!(!artifact.is_complete());
        assert_eq!(
            h.orchestrator.telemetry().status.get(),
            "Recording incomplete: encoder crashed"
        );
        assert!(h.orchestrator.wait_for_conversion().await.is_none());
        assert!(h.runners.exec_calls().is_empty());
        assert!(h.orchestrator.telemetry().original.get().is_some());
    }

    #[tokio::test]
    async fn test_initialize_then_mode_switch_keeps_call_order() {
        let h = harness(OrchestratorConfig::default());

        h.orchestrator.initialize().await.unwrap();
        h.orchestrator.set_execution_mode(true).await.unwrap();
        h.orchestrator.wait_for_engine().await;

        assert_eq!(
            h.runners.created_modes(),
            vec![
                crate::engine::ExecutionMode::SingleThread,
                crate::engine::ExecutionMode::MultiThread
            ]
        );
        assert_eq!(
            h.orchestrator.engine().mode(),
            crate::engine::ExecutionMode::MultiThread
        );
        assert_eq!(h.runners.alive_runners(), 1);
    }

    #[tokio::test]
    async fn test_stop_while_idle_does_nothing() {
        let h = harness(OrchestratorConfig::default());

        assert!(h.orchestrator.stop_recording().await.unwrap().is_none());
        assert!(h.orchestrator.telemetry().file_size_before.get().is_empty());
        assert!(h.orchestrator.wait_for_conversion().await.is_none());
    }

    #[tokio::test]
    async fn test_auto_convert_disabled() {
        let h = harness(OrchestratorConfig {
            auto_convert: false,
            ..Default::default()
        });
        h.orchestrator.initialize().await.unwrap();
        h.orchestrator.start_recording().await.unwrap();
        h.recording.emit_chunk(Bytes::from_static(b"data")).await;
        h.orchestrator.stop_recording().await.unwrap();

        assert!(h.orchestrator.wait_for_conversion().await.is_none());
        assert!(h.runners.exec_calls().is_empty());
    }

    #[tokio::test]
    async fn test_status_snapshot() {
        let h = harness(OrchestratorConfig::default());
        h.orchestrator.initialize().await.unwrap();
        h.orchestrator.wait_for_engine().await;
        h.orchestrator.start_recording().await.unwrap();

        let status = h.orchestrator.status().await;
        assert!(status.device_active);
        assert_eq!(status.recorder_state, RecorderState::Recording);
        assert_eq!(status.engine_state, EngineState::Ready);
        assert_eq!(status.pending_conversions, 0);
    }

    #[tokio::test]
    async fn test_shutdown_releases_device() {
        let h = harness(OrchestratorConfig::default());
        let stream = h.orchestrator.initialize().await.unwrap();
        h.orchestrator.start_recording().await.unwrap();

        h.orchestrator.shutdown().await;

        assert!(!stream.is_live());
        assert_eq!(h.orchestrator.recorder().state(), RecorderState::Idle);
        assert!(!h.orchestrator.capture().is_active().await);
    }
}
