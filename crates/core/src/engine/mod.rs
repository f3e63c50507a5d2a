//! Transcode engine for converting recordings to MP4.
//!
//! The [`TranscodeEngine`] loads a [`JobRunner`] for an [`ExecutionMode`],
//! then runs the fixed [`TranscodeProfile::V1`] job on recordings.
//!
//! # Example
//!
//! ```ignore
//! use reelpress_core::engine::{EngineConfig, FfmpegRunnerFactory, HttpResourceResolver, TranscodeEngine};
//!
//! let config = EngineConfig::default();
//! let engine = TranscodeEngine::new(
//!     Arc::new(FfmpegRunnerFactory::new(config.clone())),
//!     Arc::new(HttpResourceResolver::new(Duration::from_secs(30))?),
//!     config,
//!     &TelemetryConfig::default(),
//! );
//!
//! engine.load(false).await?;
//! let converted = engine.run(&recording).await?;
//! ```

mod config;
mod error;
mod ffmpeg;
mod resources;
mod traits;
mod transcode;
mod types;

pub use config::{EngineConfig, RuntimeLocation};
pub use error::{EngineError, ResourceError, RunnerError};
pub use ffmpeg::{FfmpegRunner, FfmpegRunnerFactory};
pub use resources::HttpResourceResolver;
pub use traits::{JobRunner, LogListener, ResourceResolver, RunnerFactory, RunnerLog};
pub use transcode::{
    format_elapsed, TranscodeEngine, COMPLETED_MESSAGE, NOT_READY_MESSAGE, READY_MESSAGE,
};
pub use types::{
    ConvertedArtifact, EngineLoadConfig, EngineState, ExecutionMode, ResolvedLoadConfig,
    ResolvedResource, ResourceRequest, TranscodeProfile, CONVERTED_MEDIA_TYPE,
};
