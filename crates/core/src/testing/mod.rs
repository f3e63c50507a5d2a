//! Testing utilities and mock implementations.
//!
//! This module provides mock implementations of every backend trait,
//! allowing the recorder, engine and orchestrator to be tested without
//! devices, ffmpeg or network access.
//!
//! # Example
//!
//! ```rust,ignore
//! use reelpress_core::testing::{MockCaptureBackend, MockRecordingBackend, MockRunnerFactory};
//!
//! let capture = Arc::new(MockCaptureBackend::new());
//! let recording = Arc::new(MockRecordingBackend::new());
//! let runners = Arc::new(MockRunnerFactory::new());
//!
//! // Configure mock behavior
//! runners.set_exec_delay(Duration::from_millis(20));
//! recording.set_trailing_chunk(Bytes::from_static(b"tail")).await;
//!
//! // Wire into an Orchestrator...
//! ```

mod mock_capture;
mod mock_recording;
mod mock_resolver;
mod mock_runner;

pub use mock_capture::MockCaptureBackend;
pub use mock_recording::MockRecordingBackend;
pub use mock_resolver::MockResourceResolver;
pub use mock_runner::{MockJobRunner, MockRunnerFactory, RunnerOp};

/// Test fixtures and helper functions.
pub mod fixtures {
    use bytes::Bytes;
    use uuid::Uuid;

    use crate::capture::{DeviceStream, InputSource, InputSpec};
    use crate::recorder::{Chunk, RecordingArtifact};

    /// Synthetic input source, with or without audio.
    pub fn input_source(audio: bool) -> InputSource {
        InputSource {
            video: InputSpec::new("lavfi", "testsrc=size=640x480:rate=30"),
            audio: audio.then(|| InputSpec::new("lavfi", "sine=frequency=440")),
        }
    }

    /// A live 640x480 stream with audio.
    pub fn device_stream() -> DeviceStream {
        DeviceStream::new(input_source(true), 640, 480)
    }

    /// A live 640x480 stream without audio.
    pub fn device_stream_without_audio() -> DeviceStream {
        DeviceStream::new(input_source(false), 640, 480)
    }

    /// A recording assembled from the given chunks, in order.
    pub fn recording_from_chunks(chunks: &[&[u8]]) -> RecordingArtifact {
        let chunks: Vec<Chunk> = chunks
            .iter()
            .enumerate()
            .map(|(i, data)| Chunk::new(i as u64, Bytes::copy_from_slice(data)))
            .collect();
        RecordingArtifact::assemble(Uuid::new_v4(), &chunks, 1)
    }

    /// A recording of `size` zero bytes.
    pub fn recording_of_size(size: usize) -> RecordingArtifact {
        RecordingArtifact::from_bytes(Bytes::from(vec![0u8; size]))
    }
}
