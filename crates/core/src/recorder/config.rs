//! Configuration for the recorder module.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use super::types::{RecordingOptions, RECORDING_MEDIA_TYPE};

/// Extra time the recorder waits past the backend's own stop timeout.
const STOP_GRACE_SECS: u64 = 2;

/// Configuration for recording.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecorderConfig {
    /// Chunk emission interval in milliseconds.
    #[serde(default = "default_slice_interval")]
    pub slice_interval_ms: u64,

    /// Target total bitrate in bits per second.
    #[serde(default = "default_bits_per_second")]
    pub bits_per_second: u64,

    /// Share of the bitrate given to audio when the stream has audio.
    #[serde(default = "default_audio_bits_per_second")]
    pub audio_bits_per_second: u64,

    /// Duration counter granularity in milliseconds.
    #[serde(default = "default_tick_interval")]
    pub tick_interval_ms: u64,

    /// Path to ffmpeg binary used to encode the live stream.
    #[serde(default = "default_ffmpeg_path")]
    pub ffmpeg_path: PathBuf,

    /// How long to wait for the encoder to finalize after stop, in seconds.
    #[serde(default = "default_stop_timeout")]
    pub stop_timeout_secs: u64,
}

fn default_slice_interval() -> u64 {
    100
}

fn default_bits_per_second() -> u64 {
    1_000_000
}

fn default_audio_bits_per_second() -> u64 {
    64_000
}

fn default_tick_interval() -> u64 {
    1000
}

fn default_ffmpeg_path() -> PathBuf {
    PathBuf::from("ffmpeg")
}

fn default_stop_timeout() -> u64 {
    10
}

impl Default for RecorderConfig {
    fn default() -> Self {
        Self {
            slice_interval_ms: default_slice_interval(),
            bits_per_second: default_bits_per_second(),
            audio_bits_per_second: default_audio_bits_per_second(),
            tick_interval_ms: default_tick_interval(),
            ffmpeg_path: default_ffmpeg_path(),
            stop_timeout_secs: default_stop_timeout(),
        }
    }
}

impl RecorderConfig {
    /// Options passed to the recording backend.
    pub fn options(&self) -> RecordingOptions {
        RecordingOptions {
            slice_interval: Duration::from_millis(self.slice_interval_ms),
            bits_per_second: self.bits_per_second,
            media_type: RECORDING_MEDIA_TYPE.to_string(),
        }
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    /// How long `Recorder::stop` waits for the backend to finalize.
    pub fn stop_wait(&self) -> Duration {
        Duration::from_secs(self.stop_timeout_secs + STOP_GRACE_SECS)
    }

    pub fn with_stop_timeout(mut self, stop_timeout_secs: u64) -> Self {
        self.stop_timeout_secs = stop_timeout_secs;
        self
    }

    /// Sets the duration tick interval.
    pub fn with_tick_interval(mut self, tick_interval_ms: u64) -> Self {
        self.tick_interval_ms = tick_interval_ms;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = RecorderConfig::default();
        assert_eq!(config.slice_interval_ms, 100);
        assert_eq!(config.bits_per_second, 1_000_000);
        assert_eq!(config.tick_interval_ms, 1000);
        assert_eq!(config.stop_timeout_secs, 10);
        assert_eq!(config.stop_wait(), Duration::from_secs(12));
    }

    #[test]
    fn test_options_from_config() {
        let config = RecorderConfig {
            slice_interval_ms: 250,
            bits_per_second: 2_500_000,
            ..Default::default()
        };
        let options = config.options();
        assert_eq!(options.slice_interval, Duration::from_millis(250));
        assert_eq!(options.bits_per_second, 2_500_000);
        assert_eq!(options.media_type, "video/webm");
    }

    #[test]
    fn test_deserialize_minimal() {
        let config: RecorderConfig = toml::from_str("slice_interval_ms = 50").unwrap();
        assert_eq!(config.slice_interval_ms, 50);
        assert_eq!(config.bits_per_second, 1_000_000);
    }
}
