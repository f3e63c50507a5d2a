//! Orchestrator lifecycle integration tests.
//!
//! These tests verify the complete session lifecycle through the orchestrator:
//! initialize -> record -> stop -> convert, plus mode switches and failures.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;

use reelpress_core::{
    capture::{CaptureSession, DeviceError},
    engine::{EngineConfig, EngineState, ExecutionMode, RunnerError, TranscodeEngine},
    recorder::{RecorderConfig, RecorderError, RecorderState, NOT_FINALIZED_REASON},
    testing::{
        MockCaptureBackend, MockRecordingBackend, MockResourceResolver, MockRunnerFactory, RunnerOp,
    },
    CaptureConstraints, Orchestrator, OrchestratorConfig, OrchestratorError, Recorder,
    TelemetryConfig,
};

/// Test helper to create all dependencies for orchestrator testing.
struct TestHarness {
    orchestrator: Orchestrator,
    capture: Arc<MockCaptureBackend>,
    recording: Arc<MockRecordingBackend>,
    runners: Arc<MockRunnerFactory>,
    resolver: Arc<MockResourceResolver>,
}

impl TestHarness {
    fn new() -> Self {
        Self::with_config(OrchestratorConfig::default())
    }

    fn with_config(config: OrchestratorConfig) -> Self {
        let capture = Arc::new(MockCaptureBackend::new());
        let recording = Arc::new(MockRecordingBackend::new());
        let runners = Arc::new(MockRunnerFactory::new());
        let resolver = Arc::new(MockResourceResolver::new());
        let telemetry = TelemetryConfig::default();

        let orchestrator = Orchestrator::new(
            config,
            CaptureConstraints::default(),
            CaptureSession::new(capture.clone()),
            Recorder::new(recording.clone(), &RecorderConfig::default(), &telemetry),
            TranscodeEngine::new(
                runners.clone(),
                resolver.clone(),
                EngineConfig::default(),
                &telemetry,
            ),
            &telemetry,
        );

        Self {
            orchestrator,
            capture,
            recording,
            runners,
            resolver,
        }
    }

    /// Initialize and wait until the engine load settles.
    async fn ready(&self) {
        self.orchestrator
            .initialize()
            .await
            .expect("initialize failed");
        self.orchestrator.wait_for_engine().await;
    }

    /// Record one session made of the given chunks.
    async fn record(&self, chunks: &[&[u8]]) -> u64 {
        self.orchestrator
            .start_recording()
            .await
            .expect("start failed");
        for chunk in chunks {
            assert!(
                self.recording
                    .emit_chunk(Bytes::copy_from_slice(chunk))
                    .await
            );
        }
        self.orchestrator
            .stop_recording()
            .await
            .expect("stop failed")
            .expect("no artifact")
            .size_bytes
    }
}

#[tokio::test]
async fn test_full_session_lifecycle() {
    let h = TestHarness::new();
    h.ready().await;
    assert_eq!(h.orchestrator.engine().state(), EngineState::Ready);

    let size = h.record(&[&[1u8; 10 * 1024], &[], &[2u8; 15 * 1024]]).await;
    assert_eq!(size, 25 * 1024);

    let telemetry = h.orchestrator.telemetry();
    assert_eq!(
        telemetry.file_size_before.get(),
        "File size before conversion: 0.02 MB"
    );
    let original = telemetry.original.get().expect("original artifact");
    assert_eq!(original.media_type, "video/webm");
    assert_eq!(original.data().len(), 25 * 1024);

    let converted = h
        .orchestrator
        .wait_for_conversion()
        .await
        .expect("conversion forwarded")
        .expect("conversion failed");
    assert_eq!(converted.media_type, "video/mp4");
    assert_eq!(telemetry.status.get(), "Conversion completed.");
    assert!(telemetry.conversion_time.get().ends_with(" s"));
    assert!(telemetry.converted.get().is_some());

    // The engine received exactly the recorded bytes
    assert_eq!(h.runners.exec_calls().len(), 1);
    assert!(h.runners.operations().contains(&RunnerOp::Write {
        runner: 0,
        name: "input.webm".to_string(),
        size: 25 * 1024,
    }));
}

#[tokio::test]
async fn test_trailing_data_is_included() {
    let h = TestHarness::new();
    h.ready().await;
    h.recording
        .set_trailing_chunk(Bytes::from_static(b"tail"))
        .await;

    let size = h.record(&[b"head"]).await;

    assert_eq!(size, 8);
}

#[tokio::test]
async fn test_consecutive_sessions_are_independent() {
    let h = TestHarness::new();
    h.ready().await;

    let first = h.record(&[b"aaaa", b"bbbb"]).await;
    h.orchestrator.wait_for_conversion().await;
    let second = h.record(&[b"cc"]).await;
    h.orchestrator.wait_for_conversion().await;

    assert_eq!(first, 8);
    assert_eq!(second, 2);
    assert_eq!(h.recording.start_count().await, 2);
    assert_eq!(h.runners.exec_calls().len(), 2);
    assert_eq!(
        h.orchestrator.telemetry().original.get().map(|a| a.size_bytes),
        Some(2)
    );
}

#[tokio::test]
async fn test_recorder_states_observed_in_order() {
    let h = TestHarness::new();
    h.ready().await;
    let mut states = h.orchestrator.telemetry().recorder_state.subscribe();

    h.record(&[b"data"]).await;

    assert_eq!(states.recv().await.unwrap(), RecorderState::Recording);
    assert_eq!(states.recv().await.unwrap(), RecorderState::Stopping);
    assert_eq!(states.recv().await.unwrap(), RecorderState::Idle);
}

#[tokio::test]
async fn test_conversion_before_engine_ready() {
    let h = TestHarness::new();
    let locator = EngineConfig::default()
        .load_config(ExecutionMode::SingleThread)
        .core_script
        .locator;
    h.resolver.fail_locator(&locator).await;
    h.ready().await;
    assert_eq!(h.orchestrator.engine().state(), EngineState::Unloaded);

    h.record(&[b"data"]).await;
    let result = h.orchestrator.wait_for_conversion().await;

    assert!(matches!(result, Some(Err(OrchestratorError::Engine(_)))));
    assert_eq!(
        h.orchestrator.telemetry().status.get(),
        "FFmpeg failed to load."
    );
    assert!(h.orchestrator.telemetry().converted.get().is_none());
    assert!(h.runners.exec_calls().is_empty());

    // Recover by reloading
    h.resolver.clear_failures().await;
    h.orchestrator.reload_engine().await.unwrap();
    h.record(&[b"data"]).await;
    assert!(matches!(
        h.orchestrator.wait_for_conversion().await,
        Some(Ok(_))
    ));
}

#[tokio::test]
async fn test_switch_mode_between_sessions() {
    let h = TestHarness::new();
    h.ready().await;

    h.orchestrator.set_execution_mode(true).await.unwrap();
    let status = h.orchestrator.status().await;
    assert_eq!(status.execution_mode, ExecutionMode::MultiThread);
    assert_eq!(status.engine_state, EngineState::Ready);
    assert_eq!(
        h.orchestrator.telemetry().execution_mode.get(),
        ExecutionMode::MultiThread
    );

    h.record(&[b"data"]).await;
    assert!(matches!(
        h.orchestrator.wait_for_conversion().await,
        Some(Ok(_))
    ));
    assert_eq!(
        h.runners.created_modes(),
        vec![ExecutionMode::SingleThread, ExecutionMode::MultiThread]
    );
    assert_eq!(h.runners.alive_runners(), 1);
}

#[tokio::test]
async fn test_mode_switch_during_conversion() {
    let h = TestHarness::new();
    h.ready().await;
    h.runners.set_exec_delay(Duration::from_millis(50));

    h.record(&[b"data"]).await;
    h.orchestrator.set_execution_mode(true).await.unwrap();

    // The forwarded job ran to completion on the single-thread runner first
    assert!(matches!(
        h.orchestrator.wait_for_conversion().await,
        Some(Ok(_))
    ));
    let ops = h.runners.operations();
    assert!(ops.contains(&RunnerOp::ExecStart { runner: 0 }));
    assert!(ops.contains(&RunnerOp::ExecEnd { runner: 0 }));
    assert!(!ops.contains(&RunnerOp::ExecStart { runner: 1 }));
    assert_eq!(
        h.runners.created_modes(),
        vec![ExecutionMode::SingleThread, ExecutionMode::MultiThread]
    );
    assert_eq!(h.orchestrator.engine().mode(), ExecutionMode::MultiThread);
    assert_eq!(h.runners.alive_runners(), 1);
}

#[tokio::test]
async fn test_mode_switch_right_after_initialize() {
    let h = TestHarness::new();

    h.orchestrator.initialize().await.unwrap();
    h.orchestrator.set_execution_mode(true).await.unwrap();
    h.orchestrator.wait_for_engine().await;

    assert_eq!(
        h.runners.created_modes(),
        vec![ExecutionMode::SingleThread, ExecutionMode::MultiThread]
    );
    assert_eq!(h.orchestrator.engine().mode(), ExecutionMode::MultiThread);
    assert_eq!(h.orchestrator.engine().state(), EngineState::Ready);

    h.record(&[b"data"]).await;
    h.orchestrator.wait_for_conversion().await;
    assert!(h
        .runners
        .operations()
        .contains(&RunnerOp::ExecStart { runner: 1 }));
}

#[tokio::test]
async fn test_incomplete_recording_is_reported_not_converted() {
    let h = TestHarness::new();
    h.ready().await;

    h.orchestrator.start_recording().await.unwrap();
    h.recording.emit_chunk(Bytes::from_static(b"head")).await;
    h.recording.emit_failure("encoder crashed").await;
    let artifact = h
        .orchestrator
        .stop_recording()
        .await
        .unwrap()
        .expect("partial artifact");

    let telemetry = h.orchestrator.telemetry();
    assert_eq!(artifact.failure.as_deref(), Some("encoder crashed"));
    assert_eq!(telemetry.status.get(), "Recording incomplete: encoder crashed");
    assert!(h.orchestrator.wait_for_conversion().await.is_none());
    assert!(h.runners.exec_calls().is_empty());
    assert!(telemetry.converted.get().is_none());

    // The partial data can still be converted on request
    h.orchestrator.convert(artifact).await;
    assert!(matches!(
        h.orchestrator.wait_for_conversion().await,
        Some(Ok(_))
    ));
}

#[tokio::test]
async fn test_unfinalized_recording_is_not_converted() {
    let h = TestHarness::new();
    h.ready().await;
    h.recording.set_finalize(false).await;

    h.orchestrator.start_recording().await.unwrap();
    h.recording.emit_chunk(Bytes::from_static(b"data")).await;
    h.orchestrator.stop_recording().await.unwrap();

    assert_eq!(
        h.orchestrator.telemetry().status.get(),
        format!("Recording incomplete: {}", NOT_FINALIZED_REASON)
    );
    assert!(h.orchestrator.wait_for_conversion().await.is_none());
}

#[tokio::test(start_paused = true)]
async fn test_stalled_stop_is_reported() {
    let h = TestHarness::new();
    h.ready().await;
    h.recording.set_stall_on_stop(true).await;

    h.orchestrator.start_recording().await.unwrap();
    h.recording.emit_chunk(Bytes::from_static(b"data")).await;
    let result = h.orchestrator.stop_recording().await;

    assert!(matches!(
        result,
        Err(OrchestratorError::Recorder(RecorderError::StopTimeout { .. }))
    ));
    assert!(h
        .orchestrator
        .telemetry()
        .status
        .get()
        .contains("did not finalize"));
    assert_eq!(h.orchestrator.recorder().state(), RecorderState::Idle);
    assert!(h.orchestrator.wait_for_conversion().await.is_none());
}

#[tokio::test]
async fn test_failed_conversion_reported_on_status() {
    let h = TestHarness::new();
    h.ready().await;
    h.runners.set_next_exec_error(RunnerError::ExitCode {
        code: 1,
        stderr: Some("Invalid data found when processing input".to_string()),
    });

    h.record(&[b"garbage"]).await;
    let result = h.orchestrator.wait_for_conversion().await;

    assert!(matches!(result, Some(Err(_))));
    assert!(h
        .orchestrator
        .telemetry()
        .status
        .get()
        .starts_with("Conversion failed:"));
    // Recording telemetry is unaffected by the engine failure
    assert_eq!(
        h.orchestrator.telemetry().original.get().map(|a| a.size_bytes),
        Some(7)
    );
}

#[tokio::test]
async fn test_device_denied_still_loads_engine() {
    let h = TestHarness::new();
    h.capture
        .set_next_error(DeviceError::PermissionDenied {
            device: "/dev/video0".to_string(),
        })
        .await;

    let result = h.orchestrator.initialize().await;
    h.orchestrator.wait_for_engine().await;

    assert!(matches!(result, Err(OrchestratorError::Device(_))));
    assert_eq!(h.orchestrator.engine().state(), EngineState::Ready);
    assert!(h
        .orchestrator
        .telemetry()
        .status
        .get()
        .contains("Permission denied"));

    let start = h.orchestrator.start_recording().await;
    assert!(matches!(start, Err(OrchestratorError::Recorder(_))));
    assert_eq!(h.recording.start_count().await, 0);
}

#[tokio::test]
async fn test_manual_conversion_when_auto_convert_disabled() {
    let h = TestHarness::with_config(OrchestratorConfig {
        auto_convert: false,
        ..Default::default()
    });
    h.ready().await;

    h.record(&[b"data"]).await;
    assert!(h.orchestrator.wait_for_conversion().await.is_none());

    let original = h
        .orchestrator
        .telemetry()
        .original
        .get()
        .expect("original artifact");
    h.orchestrator.convert(original).await;
    assert!(matches!(
        h.orchestrator.wait_for_conversion().await,
        Some(Ok(_))
    ));
}

#[tokio::test]
async fn test_shutdown_stops_recording_and_releases_device() {
    let h = TestHarness::new();
    h.ready().await;
    h.orchestrator.start_recording().await.unwrap();
    h.recording.emit_chunk(Bytes::from_static(b"data")).await;

    h.orchestrator.shutdown().await;

    let status = h.orchestrator.status().await;
    assert!(!status.device_active);
    assert_eq!(status.recorder_state, RecorderState::Idle);
    assert!(!h.recording.is_active().await);
    assert_eq!(h.capture.open_count().await, 1);
}
