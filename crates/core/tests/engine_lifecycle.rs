//! Transcode engine lifecycle integration tests.
//!
//! These tests verify the engine with a mock runner factory and resolver:
//! - Load state transitions and load failures
//! - Job execution with the fixed profile
//! - Telemetry ordering (status, time, converted artifact)
//! - Mode switching and runner replacement
//! - Serialization of concurrent jobs

use std::sync::Arc;
use std::time::{Duration, Instant};

use bytes::Bytes;

use reelpress_core::{
    engine::{
        EngineConfig, EngineError, EngineState, ExecutionMode, RunnerError, TranscodeEngine,
        COMPLETED_MESSAGE, NOT_READY_MESSAGE, READY_MESSAGE,
    },
    testing::{fixtures, MockResourceResolver, MockRunnerFactory, RunnerOp},
    TelemetryConfig,
};

/// Test helper wiring an engine to mocks.
struct TestHarness {
    engine: Arc<TranscodeEngine>,
    runners: Arc<MockRunnerFactory>,
    resolver: Arc<MockResourceResolver>,
}

impl TestHarness {
    fn new() -> Self {
        let runners = Arc::new(MockRunnerFactory::new());
        let resolver = Arc::new(MockResourceResolver::new());
        let engine = Arc::new(TranscodeEngine::new(
            runners.clone(),
            resolver.clone(),
            EngineConfig::default(),
            &TelemetryConfig::default(),
        ));

        Self {
            engine,
            runners,
            resolver,
        }
    }

    async fn loaded() -> Self {
        let harness = Self::new();
        harness.engine.load(false).await.expect("load failed");
        harness
    }
}

fn job_ops(runner: usize) -> Vec<RunnerOp> {
    vec![
        RunnerOp::Write {
            runner,
            name: "input.webm".to_string(),
            size: 4,
        },
        RunnerOp::ExecStart { runner },
        RunnerOp::ExecEnd { runner },
        RunnerOp::Read {
            runner,
            name: "output.mp4".to_string(),
        },
        RunnerOp::Delete {
            runner,
            name: "input.webm".to_string(),
        },
        RunnerOp::Delete {
            runner,
            name: "output.mp4".to_string(),
        },
    ]
}

// =============================================================================
// Loading
// =============================================================================

#[tokio::test]
async fn test_engine_starts_unloaded() {
    let h = TestHarness::new();
    assert_eq!(h.engine.state(), EngineState::Unloaded);
    assert_eq!(h.engine.mode(), ExecutionMode::SingleThread);
}

#[tokio::test]
async fn test_load_transitions_to_ready() {
    let h = TestHarness::new();
    let mut states = h.engine.state_observable().subscribe();

    h.engine.load(false).await.unwrap();

    assert_eq!(states.recv().await.unwrap(), EngineState::Loading);
    assert_eq!(states.recv().await.unwrap(), EngineState::Ready);
    assert_eq!(h.engine.state(), EngineState::Ready);
    assert_eq!(h.runners.created_modes(), vec![ExecutionMode::SingleThread]);
}

#[tokio::test]
async fn test_single_thread_load_resolves_expected_resources() {
    let h = TestHarness::loaded().await;

    let configs = h.runners.loaded_configs();
    assert_eq!(configs.len(), 1);
    let config = &configs[0];
    assert_eq!(config.mode, ExecutionMode::SingleThread);
    assert!(config.core_script.locator.contains("@ffmpeg/core@0.12.6"));
    assert!(config.core_script.is_inline());
    assert!(config.binary.is_inline());
    assert_eq!(config.class_worker.locator, "assets/ffmpeg/worker.js");
    assert!(!config.class_worker.is_inline());
    assert!(config.worker_script.is_none());
    assert_eq!(h.resolver.request_count().await, 3);
}

#[tokio::test]
async fn test_resource_failure_keeps_engine_unloaded() {
    let h = TestHarness::new();
    let locator = EngineConfig::default()
        .load_config(ExecutionMode::SingleThread)
        .binary
        .locator;
    h.resolver.fail_locator(&locator).await;

    let result = h.engine.load(false).await;

    assert!(matches!(result, Err(EngineError::LoadFailed { .. })));
    assert_eq!(h.engine.state(), EngineState::Unloaded);
    assert!(h
        .engine
        .telemetry()
        .status
        .get()
        .starts_with("Engine load failed"));
    assert!(h.runners.created_modes().is_empty());
}

#[tokio::test]
async fn test_runner_load_failure_then_reload() {
    let h = TestHarness::new();
    h.runners
        .set_next_load_error(RunnerError::load_failed("no wasm support"));

    let result = h.engine.load(false).await;
    assert!(result.is_err());
    assert_eq!(h.engine.state(), EngineState::Unloaded);
    assert_eq!(h.runners.alive_runners(), 0);

    h.engine.reload().await.unwrap();
    assert_eq!(h.engine.state(), EngineState::Ready);
}

// =============================================================================
// Running jobs
// =============================================================================

#[tokio::test]
async fn test_run_without_load_reports_not_ready() {
    let h = TestHarness::new();
    let recording = fixtures::recording_from_chunks(&[b"data"]);

    let result = h.engine.run(&recording).await;

    assert!(matches!(
        result,
        Err(EngineError::NotReady {
            state: EngineState::Unloaded
        })
    ));
    assert_eq!(h.engine.telemetry().status.get(), NOT_READY_MESSAGE);
    assert!(h.engine.telemetry().converted.get().is_none());
    assert!(h.engine.telemetry().conversion_time.get().is_empty());
    assert!(h.runners.operations().is_empty());
}

#[tokio::test]
async fn test_run_executes_fixed_profile() {
    let h = TestHarness::loaded().await;
    let recording = fixtures::recording_from_chunks(&[b"we", b"bm"]);

    let converted = h.engine.run(&recording).await.unwrap();

    assert_eq!(
        h.runners.exec_calls(),
        vec![vec![
            "-i",
            "input.webm",
            "-t",
            "60",
            "-c:v",
            "libx264",
            "-preset",
            "ultrafast",
            "-r",
            "20",
            "-s",
            "480x360",
            "-crf",
            "28",
            "output.mp4",
        ]]
    );
    assert_eq!(converted.media_type, "video/mp4");
    assert!(!converted.is_empty());
    assert_eq!(converted.data().as_ref(), b"mock mp4 output");
    assert!(h.engine.telemetry().converted.get().is_some());
}

#[tokio::test]
async fn test_conversion_time_format() {
    let h = TestHarness::loaded().await;
    h.runners.set_exec_delay(Duration::from_millis(50));
    let recording = fixtures::recording_from_chunks(&[b"data"]);

    let started = Instant::now();
    h.engine.run(&recording).await.unwrap();
    let wall = started.elapsed().as_secs_f64();

    let time = h.engine.telemetry().conversion_time.get();
    assert!(time.starts_with(' '));
    assert!(time.ends_with(" s"));
    let secs: f64 = time.trim().trim_end_matches(" s").parse().unwrap();
    assert!(secs >= 0.05);
    assert!(secs <= wall + 0.01);
}

#[tokio::test]
async fn test_status_sequence_includes_runner_logs() {
    let h = TestHarness::loaded().await;
    h.runners
        .set_exec_logs(vec!["frame=    1".to_string(), "frame=   20".to_string()]);
    let mut status = h.engine.telemetry().status.subscribe();

    h.engine
        .run(&fixtures::recording_from_chunks(&[b"data"]))
        .await
        .unwrap();

    assert_eq!(status.recv().await.unwrap(), READY_MESSAGE);
    assert_eq!(status.recv().await.unwrap(), "frame=    1");
    assert_eq!(status.recv().await.unwrap(), "frame=   20");
    assert_eq!(status.recv().await.unwrap(), COMPLETED_MESSAGE);
}

#[tokio::test]
async fn test_converted_cleared_at_job_start() {
    let h = TestHarness::loaded().await;
    let recording = fixtures::recording_from_chunks(&[b"data"]);
    h.engine.run(&recording).await.unwrap();
    assert!(h.engine.telemetry().converted.get().is_some());

    let mut converted = h.engine.telemetry().converted.subscribe();
    h.runners.set_next_exec_error(RunnerError::ExitCode {
        code: 1,
        stderr: None,
    });
    let result = h.engine.run(&recording).await;

    assert!(matches!(result, Err(EngineError::JobFailed { .. })));
    assert!(converted.recv().await.unwrap().is_none());
    assert!(converted.try_recv().is_err());
    assert!(h.engine.telemetry().converted.get().is_none());
    assert!(h
        .engine
        .telemetry()
        .status
        .get()
        .starts_with("Conversion failed:"));
}

#[tokio::test]
async fn test_non_zero_exit_code_fails_job() {
    let h = TestHarness::loaded().await;
    h.runners.set_exit_code(2);

    let result = h
        .engine
        .run(&fixtures::recording_from_chunks(&[b"data"]))
        .await;

    assert!(matches!(result, Err(EngineError::JobFailed { .. })));
    assert!(h.engine.telemetry().converted.get().is_none());
}

#[tokio::test]
async fn test_job_files_removed_after_run() {
    let h = TestHarness::loaded().await;

    h.engine
        .run(&fixtures::recording_from_chunks(&[b"data"]))
        .await
        .unwrap();

    assert_eq!(h.runners.operations(), job_ops(0));
}

#[tokio::test]
async fn test_concurrent_runs_are_serialized() {
    let h = TestHarness::loaded().await;
    h.runners.set_exec_delay(Duration::from_millis(30));
    let recording = fixtures::recording_from_chunks(&[b"data"]);

    let first = {
        let engine = Arc::clone(&h.engine);
        let recording = recording.clone();
        tokio::spawn(async move { engine.run(&recording).await })
    };
    let second = {
        let engine = Arc::clone(&h.engine);
        let recording = recording.clone();
        tokio::spawn(async move { engine.run(&recording).await })
    };

    first.await.unwrap().unwrap();
    second.await.unwrap().unwrap();

    let mut expected = job_ops(0);
    expected.extend(job_ops(0));
    assert_eq!(h.runners.operations(), expected);
    assert_eq!(h.runners.exec_calls().len(), 2);
}

// =============================================================================
// Mode switching
// =============================================================================

#[tokio::test]
async fn test_mode_switch_replaces_runner() {
    let h = TestHarness::loaded().await;

    h.engine.load(true).await.unwrap();

    assert_eq!(h.engine.mode(), ExecutionMode::MultiThread);
    assert_eq!(
        h.runners.created_modes(),
        vec![ExecutionMode::SingleThread, ExecutionMode::MultiThread]
    );
    assert_eq!(h.runners.alive_runners(), 1);

    let configs = h.runners.loaded_configs();
    let multi = &configs[1];
    assert!(multi.core_script.locator.contains("@ffmpeg/core-mt@0.12.6"));
    assert!(multi
        .worker_script
        .as_ref()
        .is_some_and(|w| w.locator.ends_with("ffmpeg-core.worker.js")));

    h.engine
        .run(&fixtures::recording_from_chunks(&[b"data"]))
        .await
        .unwrap();
    assert_eq!(h.runners.operations(), job_ops(1));
}

#[tokio::test]
async fn test_mode_switch_waits_for_running_job() {
    let h = TestHarness::loaded().await;
    h.runners.set_exec_delay(Duration::from_millis(50));
    let recording = fixtures::recording_from_chunks(&[b"data"]);

    let job = {
        let engine = Arc::clone(&h.engine);
        tokio::spawn(async move { engine.run(&recording).await })
    };
    tokio::time::sleep(Duration::from_millis(10)).await;

    h.engine.load(true).await.unwrap();

    // The job finished on the old runner before it was discarded
    assert!(job.await.unwrap().is_ok());
    assert_eq!(h.engine.mode(), ExecutionMode::MultiThread);
    assert_eq!(h.runners.operations(), job_ops(0));
    assert_eq!(h.runners.alive_runners(), 1);
}

#[tokio::test]
async fn test_failed_mode_switch_leaves_engine_unloaded() {
    let h = TestHarness::loaded().await;
    h.runners
        .set_next_load_error(RunnerError::load_failed("SharedArrayBuffer unavailable"));

    assert!(h.engine.load(true).await.is_err());
    assert_eq!(h.engine.state(), EngineState::Unloaded);
    assert_eq!(h.runners.alive_runners(), 0);

    let result = h
        .engine
        .run(&fixtures::recording_from_chunks(&[b"data"]))
        .await;
    assert!(matches!(result, Err(EngineError::NotReady { .. })));
}

#[tokio::test]
async fn test_empty_recording_still_runs() {
    let h = TestHarness::loaded().await;
    h.runners.set_output(Bytes::from_static(b"mp4"));

    let converted = h
        .engine
        .run(&fixtures::recording_of_size(0))
        .await
        .unwrap();
    assert_eq!(converted.size_bytes, 3);
}
