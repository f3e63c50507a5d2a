pub mod capture;
pub mod config;
pub mod engine;
pub mod metrics;
pub mod orchestrator;
pub mod recorder;
pub mod telemetry;
pub mod testing;

pub use capture::{CaptureConstraints, CaptureSession, DeviceError, DeviceStream};
pub use config::{
    load_config, load_config_from_str, load_default_config, validate_config, Config, ConfigError,
};
pub use engine::{
    ConvertedArtifact, EngineError, EngineState, ExecutionMode, TranscodeEngine, TranscodeProfile,
};
pub use orchestrator::{
    Orchestrator, OrchestratorConfig, OrchestratorError, OrchestratorStatus, SessionTelemetry,
};
pub use recorder::{Recorder, RecorderError, RecorderState, RecordingArtifact};
pub use telemetry::{ConversionTelemetry, Observable, TelemetryConfig};
