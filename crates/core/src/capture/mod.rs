//! Capture module for acquiring live device streams.
//!
//! A [`CaptureSession`] owns the device stream from acquisition until
//! release. The recorder only borrows a clone of the stream handle.
//!
//! # Example
//!
//! ```ignore
//! use reelpress_core::capture::{CaptureSession, FfmpegCaptureBackend, CaptureConstraints};
//!
//! let session = CaptureSession::new(Arc::new(FfmpegCaptureBackend::with_defaults()));
//! let stream = session.acquire(&CaptureConstraints::default()).await?;
//! println!("Negotiated {}x{}", stream.width(), stream.height());
//! session.release().await;
//! ```

mod config;
mod error;
mod ffmpeg;
mod session;
mod traits;
mod types;

pub use config::CaptureConfig;
pub use error::DeviceError;
pub use ffmpeg::FfmpegCaptureBackend;
pub use session::CaptureSession;
pub use traits::CaptureBackend;
pub use types::{CaptureConstraints, DeviceStream, InputSource, InputSpec, MediaTrack, TrackKind};
