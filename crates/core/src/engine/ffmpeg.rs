//! FFmpeg-based job runner.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use bytes::Bytes;
use tempfile::TempDir;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tokio::time::{timeout, Duration};
use tracing::{debug, info};

use super::config::EngineConfig;
use super::error::RunnerError;
use super::traits::{JobRunner, LogListener, RunnerFactory, RunnerLog};
use super::types::{ExecutionMode, ResolvedLoadConfig};

const VERSION_TIMEOUT_SECS: u64 = 10;
const STDERR_TAIL_LINES: usize = 20;

/// Runs jobs with the ffmpeg binary inside a private scratch directory.
///
/// The scratch directory is the runner's file space and is removed when the
/// runner is dropped. Resolved runtime resources are accepted but unused,
/// since the binary is self-contained.
pub struct FfmpegRunner {
    ffmpeg_path: PathBuf,
    log_level: String,
    timeout: Duration,
    scratch: TempDir,
    /// Thread count passed to ffmpeg; `None` until loaded.
    threads: Option<u32>,
    listener: Option<LogListener>,
}

impl FfmpegRunner {
    pub fn new(config: &EngineConfig) -> Result<Self, RunnerError> {
        let scratch = tempfile::Builder::new().prefix("reelpress-").tempdir()?;
        Ok(Self {
            ffmpeg_path: config.ffmpeg_path.clone(),
            log_level: config.log_level.clone(),
            timeout: Duration::from_secs(config.timeout_secs),
            scratch,
            threads: None,
            listener: None,
        })
    }

    pub fn scratch_dir(&self) -> &Path {
        self.scratch.path()
    }

    fn path_for(&self, name: &str) -> Result<PathBuf, RunnerError> {
        if name.is_empty() || name.contains('/') || name.contains('\\') || name == ".." || name == "." {
            return Err(RunnerError::InvalidFileName {
                name: name.to_string(),
            });
        }
        Ok(self.scratch.path().join(name))
    }

    fn ensure_loaded(&self) -> Result<u32, RunnerError> {
        self.threads.ok_or(RunnerError::NotLoaded)
    }

    fn not_found(&self, e: std::io::Error) -> RunnerError {
        if e.kind() == std::io::ErrorKind::NotFound {
            RunnerError::FfmpegNotFound {
                path: self.ffmpeg_path.clone(),
            }
        } else {
            RunnerError::Io(e)
        }
    }

    /// Wraps job arguments with global flags and the thread policy.
    fn build_args(&self, args: &[String], threads: u32) -> Vec<String> {
        let mut full = vec![
            "-y".to_string(),
            "-hide_banner".to_string(),
            "-nostdin".to_string(),
            "-loglevel".to_string(),
            self.log_level.clone(),
        ];

        // -threads is an output option, so it goes right before the output file
        match args.split_last() {
            Some((output, rest)) => {
                full.extend(rest.iter().cloned());
                full.extend(["-threads".to_string(), threads.to_string()]);
                full.push(output.clone());
            }
            None => full.extend(["-threads".to_string(), threads.to_string()]),
        }

        full
    }
}

fn threads_for(mode: ExecutionMode) -> u32 {
    match mode {
        ExecutionMode::SingleThread => 1,
        // 0 lets ffmpeg pick
        ExecutionMode::MultiThread => 0,
    }
}

#[async_trait]
impl JobRunner for FfmpegRunner {
    fn name(&self) -> &str {
        "ffmpeg"
    }

    async fn load(&mut self, config: &ResolvedLoadConfig) -> Result<(), RunnerError> {
        let output = timeout(
            Duration::from_secs(VERSION_TIMEOUT_SECS),
            Command::new(&self.ffmpeg_path)
                .args(["-hide_banner", "-version"])
                .stdin(Stdio::null())
                .kill_on_drop(true)
                .output(),
        )
        .await
        .map_err(|_| RunnerError::Timeout {
            timeout_secs: VERSION_TIMEOUT_SECS,
        })?
        .map_err(|e| self.not_found(e))?;

        if !output.status.success() {
            return Err(RunnerError::load_failed(format!(
                "ffmpeg -version exited with {}",
                output.status
            )));
        }

        let version = String::from_utf8_lossy(&output.stdout);
        let threads = threads_for(config.mode);
        info!(
            version = version.lines().next().unwrap_or_default(),
            mode = %config.mode,
            threads,
            scratch = %self.scratch.path().display(),
            "FFmpeg runner loaded"
        );

        self.threads = Some(threads);
        Ok(())
    }

    fn loaded(&self) -> bool {
        self.threads.is_some()
    }

    fn set_log_listener(&mut self, listener: LogListener) {
        self.listener = Some(listener);
    }

    async fn write_file(&mut self, name: &str, data: Bytes) -> Result<(), RunnerError> {
        self.ensure_loaded()?;
        let path = self.path_for(name)?;
        tokio::fs::write(&path, &data).await?;
        debug!(name, size = data.len(), "Wrote runner file");
        Ok(())
    }

    async fn exec(&mut self, args: &[String]) -> Result<i32, RunnerError> {
        let threads = self.ensure_loaded()?;
        let full = self.build_args(args, threads);
        debug!(args = ?full, "Running ffmpeg job");

        let mut child = Command::new(&self.ffmpeg_path)
            .args(&full)
            .current_dir(self.scratch.path())
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| self.not_found(e))?;

        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| RunnerError::Io(std::io::Error::other("stderr not captured")))?;

        let listener = self.listener.clone();
        let stderr_task = tokio::spawn(async move {
            let mut lines = BufReader::new(stderr).lines();
            let mut tail: Vec<String> = Vec::with_capacity(STDERR_TAIL_LINES);
            while let Ok(Some(line)) = lines.next_line().await {
                if let Some(listener) = &listener {
                    listener(RunnerLog::new(line.clone()));
                }
                if tail.len() == STDERR_TAIL_LINES {
                    tail.remove(0);
                }
                tail.push(line);
            }
            tail.join("\n")
        });

        let status = match timeout(self.timeout, child.wait()).await {
            Ok(result) => result?,
            Err(_) => {
                let _ = child.kill().await;
                return Err(RunnerError::Timeout {
                    timeout_secs: self.timeout.as_secs(),
                });
            }
        };

        // All log lines are delivered before exec returns
        let tail = stderr_task.await.unwrap_or_default();

        let code = status.code().unwrap_or(-1);
        if !status.success() {
            return Err(RunnerError::ExitCode {
                code,
                stderr: Some(tail),
            });
        }

        Ok(code)
    }

    async fn read_file(&mut self, name: &str) -> Result<Bytes, RunnerError> {
        self.ensure_loaded()?;
        let path = self.path_for(name)?;
        match tokio::fs::read(&path).await {
            Ok(data) => Ok(Bytes::from(data)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(RunnerError::FileNotFound {
                name: name.to_string(),
            }),
            Err(e) => Err(RunnerError::Io(e)),
        }
    }

    async fn delete_file(&mut self, name: &str) -> Result<(), RunnerError> {
        self.ensure_loaded()?;
        let path = self.path_for(name)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(RunnerError::FileNotFound {
                name: name.to_string(),
            }),
            Err(e) => Err(RunnerError::Io(e)),
        }
    }
}

/// Creates [`FfmpegRunner`]s, each with its own scratch directory.
pub struct FfmpegRunnerFactory {
    config: EngineConfig,
}

impl FfmpegRunnerFactory {
    pub fn new(config: EngineConfig) -> Self {
        Self { config }
    }
}

impl RunnerFactory for FfmpegRunnerFactory {
    fn create(&self, mode: ExecutionMode) -> Result<Box<dyn JobRunner>, RunnerError> {
        debug!(%mode, "Creating ffmpeg runner");
        Ok(Box::new(FfmpegRunner::new(&self.config)?))
    }
}
