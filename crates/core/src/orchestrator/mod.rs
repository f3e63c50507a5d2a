//! Recording orchestrator tying capture, recording and transcoding together.
//!
//! The orchestrator owns one of each component and exposes the commands a
//! presentation layer needs:
//! - **Capture**: acquired once on `initialize`, released on `shutdown`
//! - **Recording**: `start_recording` / `stop_recording`
//! - **Conversion**: automatic on stop, on background tasks serialized by the engine

mod config;
mod runner;
mod types;

pub use config::OrchestratorConfig;
pub use runner::Orchestrator;
pub use types::{OrchestratorError, OrchestratorStatus, SessionTelemetry};
