//! Orchestrator configuration.

use serde::{Deserialize, Serialize};

/// Configuration for the recording orchestrator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    /// Start loading the engine in the default mode during `initialize`.
    #[serde(default = "default_true")]
    pub load_engine_on_start: bool,

    /// Forward every finalized recording to the engine.
    /// When disabled, conversions must be requested with `convert`.
    #[serde(default = "default_true")]
    pub auto_convert: bool,
}

fn default_true() -> bool {
    true
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            load_engine_on_start: true,
            auto_convert: true,
        }
    }
}
