//! Types for the recording orchestrator.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::engine::{ConvertedArtifact, EngineState, ExecutionMode};
use crate::recorder::{RecorderState, RecordingArtifact};
use crate::telemetry::Observable;

/// Errors that can occur during orchestration.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    /// Device acquisition error.
    #[error("device error: {0}")]
    Device(#[from] crate::capture::DeviceError),

    /// Recorder error.
    #[error("recorder error: {0}")]
    Recorder(#[from] crate::recorder::RecorderError),

    /// Engine error.
    #[error("engine error: {0}")]
    Engine(#[from] crate::engine::EngineError),

    /// Resource resolver could not be built.
    #[error("resource error: {0}")]
    Resource(#[from] crate::engine::ResourceError),

    /// A background task panicked or was cancelled.
    #[error("background task failed: {0}")]
    TaskFailed(String),
}

/// Current status of the orchestrator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestratorStatus {
    /// Whether a live device stream is held.
    pub device_active: bool,
    pub recorder_state: RecorderState,
    /// Seconds counted for the current (or last) recording.
    pub duration_secs: u64,
    pub engine_state: EngineState,
    pub execution_mode: ExecutionMode,
    /// Conversions forwarded and not yet awaited.
    pub pending_conversions: usize,
    /// Size of the last finalized recording.
    pub last_recording_bytes: Option<u64>,
    /// Size of the last converted artifact.
    pub last_converted_bytes: Option<u64>,
}

/// Every observable value of a session, for the presentation layer.
#[derive(Debug, Clone)]
pub struct SessionTelemetry {
    /// Latest status message.
    pub status: Observable<String>,
    /// Elapsed time of the last conversion, e.g. `" 3.41 s"`.
    pub conversion_time: Observable<String>,
    pub converted: Observable<Option<ConvertedArtifact>>,
    /// Recording duration in seconds.
    pub duration: Observable<u64>,
    /// e.g. `"File size before conversion: 1.25 MB"`.
    pub file_size_before: Observable<String>,
    pub original: Observable<Option<RecordingArtifact>>,
    pub recorder_state: Observable<RecorderState>,
    pub engine_state: Observable<EngineState>,
    pub execution_mode: Observable<ExecutionMode>,
}
