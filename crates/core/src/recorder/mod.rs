//! Recorder module for turning a live stream into a WebM artifact.
//!
//! The [`Recorder`] drives a [`RecordingBackend`] that emits encoded chunks
//! at a fixed slice interval. Chunks are buffered per session and
//! concatenated into a [`RecordingArtifact`] when the recording stops.

mod config;
mod controller;
mod error;
mod ffmpeg;
mod traits;
mod types;

pub use config::RecorderConfig;
pub use controller::{Recorder, RecorderTelemetry, NOT_FINALIZED_REASON};
pub use error::RecorderError;
pub use ffmpeg::FfmpegRecordingBackend;
pub use traits::{ActiveCapture, RecordingBackend};
pub use types::{
    Chunk, RecorderEvent, RecorderState, RecordingArtifact, RecordingOptions,
    RECORDING_MEDIA_TYPE,
};
