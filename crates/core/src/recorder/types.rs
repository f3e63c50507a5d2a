//! Types for the recorder module.

use std::fmt;
use std::time::Duration;

use bytes::{Bytes, BytesMut};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Media type of an assembled recording.
pub const RECORDING_MEDIA_TYPE: &str = "video/webm";

/// Recorder lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecorderState {
    /// No recording in progress
    #[default]
    Idle,
    /// Capturing chunks
    Recording,
    /// Stop requested, waiting for the backend to finalize
    Stopping,
}

impl fmt::Display for RecorderState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Idle => "idle",
            Self::Recording => "recording",
            Self::Stopping => "stopping",
        };
        f.write_str(s)
    }
}

/// Parameters handed to a recording backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordingOptions {
    /// How often the backend emits a chunk.
    pub slice_interval: Duration,
    /// Target total bitrate.
    pub bits_per_second: u64,
    /// Container media type the backend must produce.
    pub media_type: String,
}

impl Default for RecordingOptions {
    fn default() -> Self {
        Self {
            slice_interval: Duration::from_millis(100),
            bits_per_second: 1_000_000,
            media_type: RECORDING_MEDIA_TYPE.to_string(),
        }
    }
}

/// Event emitted by a recording backend, delivered in capture order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecorderEvent {
    /// A slice of encoded data. May be empty.
    Chunk(Bytes),
    /// The backend hit an error; a `Finalized` event still follows.
    Failed(String),
    /// All data has been delivered. Always the last event.
    Finalized,
}

/// One encoded fragment of an in-progress recording.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    /// Position in the recording, starting at 0.
    pub sequence: u64,
    pub data: Bytes,
}

impl Chunk {
    pub fn new(sequence: u64, data: Bytes) -> Self {
        Self { sequence, data }
    }

    pub fn size(&self) -> usize {
        self.data.len()
    }
}

/// A finalized, immutable recording.
#[derive(Debug, Clone, Serialize)]
pub struct RecordingArtifact {
    pub session_id: Uuid,
    pub media_type: String,
    pub size_bytes: u64,
    pub chunk_count: usize,
    /// Recorded duration as counted by the 1-second tick.
    pub duration_secs: u64,
    pub created_at: DateTime<Utc>,
    /// Why the backend did not deliver the whole recording, if it didn't.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<String>,
    #[serde(skip)]
    data: Bytes,
}

impl RecordingArtifact {
    /// Concatenates chunks in order into one artifact.
    pub fn assemble(session_id: Uuid, chunks: &[Chunk], duration_secs: u64) -> Self {
        let total: usize = chunks.iter().map(Chunk::size).sum();
        let mut buf = BytesMut::with_capacity(total);
        for chunk in chunks {
            buf.extend_from_slice(&chunk.data);
        }

        Self {
            session_id,
            media_type: RECORDING_MEDIA_TYPE.to_string(),
            size_bytes: total as u64,
            chunk_count: chunks.len(),
            duration_secs,
            created_at: Utc::now(),
            failure: None,
            data: buf.freeze(),
        }
    }

    /// Wraps an existing blob, e.g. a file loaded for conversion.
    pub fn from_bytes(data: Bytes) -> Self {
        Self {
            session_id: Uuid::new_v4(),
            media_type: RECORDING_MEDIA_TYPE.to_string(),
            size_bytes: data.len() as u64,
            chunk_count: 1,
            duration_secs: 0,
            created_at: Utc::now(),
            failure: None,
            data,
        }
    }

    /// Marks the artifact as holding only part of the recording.
    pub fn with_failure(mut self, reason: impl Into<String>) -> Self {
        self.failure = Some(reason.into());
        self
    }

    /// Whether the backend delivered the recording cleanly.
    pub fn is_complete(&self) -> bool {
        self.failure.is_none()
    }

    pub fn data(&self) -> &Bytes {
        &self.data
    }

    /// Size in mebibytes.
    pub fn size_mb(&self) -> f64 {
        self.size_bytes as f64 / 1024.0 / 1024.0
    }
}
