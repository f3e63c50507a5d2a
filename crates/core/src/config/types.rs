use serde::{Deserialize, Serialize};

use crate::capture::CaptureConfig;
use crate::engine::EngineConfig;
use crate::orchestrator::OrchestratorConfig;
use crate::recorder::RecorderConfig;
use crate::telemetry::TelemetryConfig;

/// Root configuration. Every section is optional.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub capture: CaptureConfig,
    #[serde(default)]
    pub recorder: RecorderConfig,
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub orchestrator: OrchestratorConfig,
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}
