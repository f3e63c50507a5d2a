//! Configuration for the capture module.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use super::types::{CaptureConstraints, InputSpec};

/// Configuration for device capture.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptureConfig {
    /// Ideal frame width requested from the device.
    #[serde(default = "default_width")]
    pub ideal_width: u32,

    /// Ideal frame height requested from the device.
    #[serde(default = "default_height")]
    pub ideal_height: u32,

    /// Whether to capture audio.
    #[serde(default = "default_audio")]
    pub audio: bool,

    /// Path to ffmpeg binary used to probe and read devices.
    #[serde(default = "default_ffmpeg_path")]
    pub ffmpeg_path: PathBuf,

    /// Video input.
    #[serde(default = "default_video_input")]
    pub video_input: InputSpec,

    /// Audio input, used when `audio` is enabled.
    #[serde(default = "default_audio_input")]
    pub audio_input: Option<InputSpec>,

    /// Timeout for the device probe in seconds.
    #[serde(default = "default_probe_timeout")]
    pub probe_timeout_secs: u64,
}

fn default_width() -> u32 {
    640
}

fn default_height() -> u32 {
    480
}

fn default_audio() -> bool {
    true
}

fn default_ffmpeg_path() -> PathBuf {
    PathBuf::from("ffmpeg")
}

#[cfg(target_os = "linux")]
fn default_video_input() -> InputSpec {
    InputSpec::new("v4l2", "/dev/video0")
}

#[cfg(target_os = "linux")]
fn default_audio_input() -> Option<InputSpec> {
    Some(InputSpec::new("alsa", "default"))
}

#[cfg(target_os = "macos")]
fn default_video_input() -> InputSpec {
    InputSpec::new("avfoundation", "0")
}

#[cfg(target_os = "macos")]
fn default_audio_input() -> Option<InputSpec> {
    Some(InputSpec::new("avfoundation", ":0"))
}

#[cfg(target_os = "windows")]
fn default_video_input() -> InputSpec {
    InputSpec::new("dshow", "video=Integrated Camera")
}

#[cfg(target_os = "windows")]
fn default_audio_input() -> Option<InputSpec> {
    Some(InputSpec::new("dshow", "audio=Microphone"))
}

#[cfg(not(any(target_os = "linux", target_os = "macos", target_os = "windows")))]
fn default_video_input() -> InputSpec {
    InputSpec::new("lavfi", "testsrc=size=640x480:rate=30")
}

#[cfg(not(any(target_os = "linux", target_os = "macos", target_os = "windows")))]
fn default_audio_input() -> Option<InputSpec> {
    Some(InputSpec::new("lavfi", "sine=frequency=440"))
}

fn default_probe_timeout() -> u64 {
    10
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            ideal_width: default_width(),
            ideal_height: default_height(),
            audio: default_audio(),
            ffmpeg_path: default_ffmpeg_path(),
            video_input: default_video_input(),
            audio_input: default_audio_input(),
            probe_timeout_secs: default_probe_timeout(),
        }
    }
}

impl CaptureConfig {
    /// Constraints to request from the device.
    pub fn constraints(&self) -> CaptureConstraints {
        CaptureConstraints {
            ideal_width: self.ideal_width,
            ideal_height: self.ideal_height,
            audio: self.audio,
        }
    }

    /// Uses synthetic test sources instead of hardware.
    pub fn synthetic() -> Self {
        Self {
            video_input: InputSpec::new("lavfi", "testsrc=size=640x480:rate=30"),
            audio_input: Some(InputSpec::new("lavfi", "sine=frequency=440")),
            ..Default::default()
        }
    }
}
