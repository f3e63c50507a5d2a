//! FFmpeg-based live encoder producing WebM chunks.

use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use async_trait::async_trait;
use bytes::BytesMut;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStderr, ChildStdin, ChildStdout, Command};
use tokio::sync::{mpsc, oneshot};
use tokio::time::{interval_at, timeout, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::capture::{DeviceStream, InputSpec};

use super::config::RecorderConfig;
use super::error::RecorderError;
use super::traits::{ActiveCapture, RecordingBackend};
use super::types::{RecorderEvent, RecordingOptions};

const EVENT_CHANNEL_CAPACITY: usize = 256;
const READ_BUFFER_SIZE: usize = 64 * 1024;
const STDERR_TAIL_LINES: usize = 8;

/// Encodes the device inputs to VP8/Opus WebM on stdout and slices the
/// output into chunks at the configured interval.
pub struct FfmpegRecordingBackend {
    config: RecorderConfig,
}

impl FfmpegRecordingBackend {
    pub fn new(config: RecorderConfig) -> Self {
        Self { config }
    }

    pub fn with_defaults() -> Self {
        Self::new(RecorderConfig::default())
    }

    fn input_args(args: &mut Vec<String>, input: &InputSpec, video_size: Option<(u32, u32)>) {
        if input.is_synthetic() {
            // lavfi sources run faster than real time otherwise
            args.push("-re".to_string());
        }
        args.push("-f".to_string());
        args.push(input.format.clone());
        if let Some((width, height)) = video_size.filter(|_| !input.is_synthetic()) {
            args.push("-video_size".to_string());
            args.push(format!("{}x{}", width, height));
        }
        args.push("-i".to_string());
        args.push(input.target.clone());
    }

    /// Builds the encoder command line for a stream.
    pub fn build_args(&self, stream: &DeviceStream, options: &RecordingOptions) -> Vec<String> {
        let source = stream.source();
        let audio = source.audio.as_ref().filter(|_| stream.has_audio());

        let mut args = vec![
            "-hide_banner".to_string(),
            "-loglevel".to_string(),
            "error".to_string(),
        ];

        Self::input_args(
            &mut args,
            &source.video,
            Some((stream.width(), stream.height())),
        );
        if let Some(audio) = audio {
            Self::input_args(&mut args, audio, None);
        }

        args.extend(["-map".to_string(), "0:v:0".to_string()]);
        if audio.is_some() {
            args.extend(["-map".to_string(), "1:a:0".to_string()]);
        }

        let audio_bps = if audio.is_some() {
            self.config.audio_bits_per_second
        } else {
            0
        };
        let video_bps = options.bits_per_second.saturating_sub(audio_bps).max(1);

        args.extend([
            "-c:v".to_string(),
            "libvpx".to_string(),
            "-b:v".to_string(),
            video_bps.to_string(),
            "-deadline".to_string(),
            "realtime".to_string(),
            "-cpu-used".to_string(),
            "8".to_string(),
        ]);
        if audio.is_some() {
            args.extend([
                "-c:a".to_string(),
                "libopus".to_string(),
                "-b:a".to_string(),
                audio_bps.to_string(),
            ]);
        }

        args.extend([
            "-f".to_string(),
            "webm".to_string(),
            "pipe:1".to_string(),
        ]);
        args
    }
}

#[async_trait]
impl RecordingBackend for FfmpegRecordingBackend {
    fn name(&self) -> &str {
        "ffmpeg"
    }

    async fn start(
        &self,
        stream: &DeviceStream,
        options: &RecordingOptions,
    ) -> Result<ActiveCapture, RecorderError> {
        let args = self.build_args(stream, options);
        debug!(args = ?args, "Starting ffmpeg encoder");

        let mut child = Command::new(&self.config.ffmpeg_path)
            .args(&args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    RecorderError::FfmpegNotFound {
                        path: self.config.ffmpeg_path.clone(),
                    }
                } else {
                    RecorderError::Io(e)
                }
            })?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| RecorderError::backend("encoder stdout not captured"))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| RecorderError::backend("encoder stderr not captured"))?;
        let stdin = child.stdin.take();

        let (event_tx, event_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let (stop_tx, stop_rx) = oneshot::channel();

        info!(
            stream_id = %stream.id(),
            slice_ms = options.slice_interval.as_millis() as u64,
            "FFmpeg encoder started"
        );

        tokio::spawn(pump(
            Pipes {
                child,
                stdin,
                stdout,
                stderr,
            },
            event_tx,
            stop_rx,
            options.slice_interval,
            Duration::from_secs(self.config.stop_timeout_secs),
        ));

        Ok(ActiveCapture::new(event_rx, stop_tx))
    }
}

struct Pipes {
    child: Child,
    stdin: Option<ChildStdin>,
    stdout: ChildStdout,
    stderr: ChildStderr,
}

async fn pump(
    pipes: Pipes,
    events: mpsc::Sender<RecorderEvent>,
    mut stop_rx: oneshot::Receiver<()>,
    slice: Duration,
    stop_timeout: Duration,
) {
    let Pipes {
        mut child,
        mut stdin,
        mut stdout,
        stderr,
    } = pipes;

    let stderr_task = tokio::spawn(stderr_tail(stderr));

    let mut pending = BytesMut::new();
    let mut buf = vec![0u8; READ_BUFFER_SIZE];
    let mut ticker = interval_at(Instant::now() + slice, slice);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut stopping = false;

    loop {
        tokio::select! {
            read = stdout.read(&mut buf) => match read {
                Ok(0) => break,
                Ok(n) => pending.extend_from_slice(&buf[..n]),
                Err(e) => {
                    let _ = events.send(RecorderEvent::Failed(e.to_string())).await;
                    break;
                }
            },
            _ = ticker.tick() => {
                // Empty slices are still emitted; the recorder drops them.
                if events.send(RecorderEvent::Chunk(pending.split().freeze())).await.is_err() {
                    debug!("Recorder went away, stopping encoder");
                    stopping = true;
                    request_quit(&mut stdin).await;
                }
            },
            _ = &mut stop_rx, if !stopping => {
                stopping = true;
                request_quit(&mut stdin).await;
            }
        }
    }

    if !pending.is_empty() {
        let _ = events
            .send(RecorderEvent::Chunk(pending.split().freeze()))
            .await;
    }

    let status = match timeout(stop_timeout, child.wait()).await {
        Ok(result) => result.map_err(|e| e.to_string()),
        Err(_) => {
            warn!("Encoder did not exit in time, killing");
            let _ = child.kill().await;
            Err(format!(
                "encoder did not exit within {}s",
                stop_timeout.as_secs()
            ))
        }
    };
    let tail = stderr_task.await.unwrap_or_default();

    if let Some(reason) = exit_failure(status, stopping, &tail) {
        let _ = events.send(RecorderEvent::Failed(reason)).await;
    }
    let _ = events.send(RecorderEvent::Finalized).await;
}

/// Asks ffmpeg to finish the container cleanly.
async fn request_quit(stdin: &mut Option<ChildStdin>) {
    if let Some(mut pipe) = stdin.take() {
        if let Err(e) = pipe.write_all(b"q\n").await {
            debug!(error = %e, "Failed to write quit to encoder");
        }
        let _ = pipe.flush().await;
    }
}

fn exit_failure(
    status: Result<ExitStatus, String>,
    stopping: bool,
    stderr_tail: &str,
) -> Option<String> {
    match status {
        Ok(status) if status.success() => None,
        // Exit after a quit request may be non-zero on some builds.
        Ok(_) if stopping => None,
        Ok(status) => Some(format!(
            "encoder exited with {}: {}",
            status,
            stderr_tail.trim()
        )),
        Err(reason) => Some(reason),
    }
}

async fn stderr_tail(stderr: ChildStderr) -> String {
    let mut lines = BufReader::new(stderr).lines();
    let mut tail: Vec<String> = Vec::with_capacity(STDERR_TAIL_LINES);
    while let Ok(Some(line)) = lines.next_line().await {
        debug!(target: "reelpress::encoder", "{}", line);
        if tail.len() == STDERR_TAIL_LINES {
            tail.remove(0);
        }
        tail.push(line);
    }
    tail.join("\n")
}
