//! Types for device capture.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Requested capture parameters.
///
/// Dimensions are hints; the device may negotiate different ones.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptureConstraints {
    /// Ideal frame width in pixels.
    pub ideal_width: u32,
    /// Ideal frame height in pixels.
    pub ideal_height: u32,
    /// Whether an audio track is requested.
    pub audio: bool,
}

impl Default for CaptureConstraints {
    fn default() -> Self {
        Self {
            ideal_width: 640,
            ideal_height: 480,
            audio: true,
        }
    }
}

/// Kind of a media track.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackKind {
    Video,
    Audio,
}

impl TrackKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Video => "video",
            Self::Audio => "audio",
        }
    }
}

/// One input as understood by the capture tool (`-f <format> -i <target>`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputSpec {
    /// Demuxer / device family, e.g. `v4l2`, `alsa`, `avfoundation`, `lavfi`.
    pub format: String,
    /// Device or source string, e.g. `/dev/video0` or `testsrc=size=640x480`.
    pub target: String,
}

impl InputSpec {
    pub fn new(format: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            format: format.into(),
            target: target.into(),
        }
    }

    /// Whether the input is a synthetic filter source rather than hardware.
    pub fn is_synthetic(&self) -> bool {
        self.format == "lavfi"
    }
}

/// Where a recording backend reads the live device from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputSource {
    pub video: InputSpec,
    pub audio: Option<InputSpec>,
}

/// A live track of a [`DeviceStream`].
///
/// Clones share the same liveness flag: stopping any clone ends the track
/// for every holder.
#[derive(Debug, Clone)]
pub struct MediaTrack {
    id: Uuid,
    kind: TrackKind,
    label: String,
    live: Arc<AtomicBool>,
}

impl MediaTrack {
    pub fn new(kind: TrackKind, label: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            label: label.into(),
            live: Arc::new(AtomicBool::new(true)),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn kind(&self) -> TrackKind {
        self.kind
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn is_live(&self) -> bool {
        self.live.load(Ordering::Acquire)
    }

    /// Ends the track. Idempotent.
    pub fn stop(&self) {
        self.live.store(false, Ordering::Release);
    }
}

/// A live handle to the audio and video tracks of a local device.
///
/// Owned by the capture session; the recorder only holds a clone for reading.
#[derive(Debug, Clone)]
pub struct DeviceStream {
    id: Uuid,
    width: u32,
    height: u32,
    source: InputSource,
    tracks: Vec<MediaTrack>,
    acquired_at: DateTime<Utc>,
}

impl DeviceStream {
    /// Creates a stream with a video track and, if the source has one, an
    /// audio track.
    pub fn new(source: InputSource, width: u32, height: u32) -> Self {
        let mut tracks = vec![MediaTrack::new(TrackKind::Video, &source.video.target)];
        if let Some(audio) = &source.audio {
            tracks.push(MediaTrack::new(TrackKind::Audio, &audio.target));
        }

        Self {
            id: Uuid::new_v4(),
            width,
            height,
            source,
            tracks,
            acquired_at: Utc::now(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Actual negotiated width.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Actual negotiated height.
    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn source(&self) -> &InputSource {
        &self.source
    }

    pub fn tracks(&self) -> &[MediaTrack] {
        &self.tracks
    }

    pub fn acquired_at(&self) -> DateTime<Utc> {
        self.acquired_at
    }

    pub fn has_audio(&self) -> bool {
        self.tracks.iter().any(|t| t.kind() == TrackKind::Audio)
    }

    /// A stream is live while at least one of its tracks is.
    pub fn is_live(&self) -> bool {
        self.tracks.iter().any(MediaTrack::is_live)
    }

    /// Stops every track. Idempotent.
    pub fn stop_all(&self) {
        for track in &self.tracks {
            track.stop();
        }
    }
}
