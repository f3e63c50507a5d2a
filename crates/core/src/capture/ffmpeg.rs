//! FFmpeg-based device capture.

use async_trait::async_trait;
use regex_lite::Regex;
use std::process::Stdio;
use tokio::process::Command;
use tokio::time::{timeout, Duration};
use tracing::{debug, info, warn};

use super::config::CaptureConfig;
use super::error::DeviceError;
use super::traits::CaptureBackend;
use super::types::{CaptureConstraints, DeviceStream, InputSource, InputSpec};

/// Opens local devices by probing them with a short ffmpeg run.
///
/// The probe reads a single frame (or a fraction of a second of audio) and
/// reports the dimensions the device actually negotiated.
pub struct FfmpegCaptureBackend {
    config: CaptureConfig,
}

impl FfmpegCaptureBackend {
    pub fn new(config: CaptureConfig) -> Self {
        Self { config }
    }

    pub fn with_defaults() -> Self {
        Self::new(CaptureConfig::default())
    }

    /// Builds probe arguments for the video input.
    fn video_probe_args(&self, constraints: &CaptureConstraints) -> Vec<String> {
        let input = &self.config.video_input;
        let mut args = vec![
            "-hide_banner".to_string(),
            "-nostdin".to_string(),
            "-f".to_string(),
            input.format.clone(),
        ];

        // Synthetic sources carry their size inside the filter description
        if !input.is_synthetic() {
            args.extend([
                "-video_size".to_string(),
                format!("{}x{}", constraints.ideal_width, constraints.ideal_height),
            ]);
        }

        args.extend([
            "-i".to_string(),
            input.target.clone(),
            "-frames:v".to_string(),
            "1".to_string(),
            "-f".to_string(),
            "null".to_string(),
            "-".to_string(),
        ]);
        args
    }

    /// Builds probe arguments for an audio input.
    fn audio_probe_args(input: &InputSpec) -> Vec<String> {
        vec![
            "-hide_banner".to_string(),
            "-nostdin".to_string(),
            "-f".to_string(),
            input.format.clone(),
            "-i".to_string(),
            input.target.clone(),
            "-t".to_string(),
            "0.1".to_string(),
            "-f".to_string(),
            "null".to_string(),
            "-".to_string(),
        ]
    }

    /// Extracts `WxH` from the first video stream line of ffmpeg output.
    fn parse_dimensions(output: &str) -> Option<(u32, u32)> {
        let re = Regex::new(r"Video:.*?(\d{2,5})x(\d{2,5})").ok()?;
        let caps = re.captures(output)?;
        let width = caps.get(1)?.as_str().parse().ok()?;
        let height = caps.get(2)?.as_str().parse().ok()?;
        Some((width, height))
    }

    /// Runs a probe and returns its diagnostic output.
    async fn probe(&self, args: &[String], device: &str) -> Result<String, DeviceError> {
        debug!(device, ?args, "Probing capture device");

        let run = Command::new(&self.config.ffmpeg_path)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output();

        let output = timeout(Duration::from_secs(self.config.probe_timeout_secs), run)
            .await
            .map_err(|_| DeviceError::Timeout {
                timeout_secs: self.config.probe_timeout_secs,
            })?
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    DeviceError::BackendMissing {
                        path: self.config.ffmpeg_path.clone(),
                    }
                } else {
                    DeviceError::Io(e)
                }
            })?;

        let stderr = String::from_utf8_lossy(&output.stderr).to_string();
        if !output.status.success() {
            return Err(DeviceError::from_probe_output(device, &stderr));
        }
        Ok(stderr)
    }
}

#[async_trait]
impl CaptureBackend for FfmpegCaptureBackend {
    fn name(&self) -> &str {
        "ffmpeg"
    }

    async fn open(&self, constraints: &CaptureConstraints) -> Result<DeviceStream, DeviceError> {
        let video = self.config.video_input.clone();
        let output = self
            .probe(&self.video_probe_args(constraints), &video.target)
            .await?;

        let (width, height) = Self::parse_dimensions(&output).unwrap_or_else(|| {
            warn!(
                device = %video.target,
                "Could not read negotiated dimensions, assuming requested size"
            );
            (constraints.ideal_width, constraints.ideal_height)
        });

        let audio = if constraints.audio {
            let input = self
                .config
                .audio_input
                .clone()
                .ok_or_else(|| DeviceError::NotFound {
                    device: "audio input (none configured)".to_string(),
                })?;
            self.probe(&Self::audio_probe_args(&input), &input.target)
                .await?;
            Some(input)
        } else {
            None
        };

        if (width, height) != (constraints.ideal_width, constraints.ideal_height) {
            info!(
                requested = %format!("{}x{}", constraints.ideal_width, constraints.ideal_height),
                actual = %format!("{}x{}", width, height),
                "Device negotiated different dimensions"
            );
        }

        let stream = DeviceStream::new(InputSource { video, audio }, width, height);
        info!(
            stream_id = %stream.id(),
            width,
            height,
            audio = stream.has_audio(),
            "Capture device opened"
        );
        Ok(stream)
    }
}
