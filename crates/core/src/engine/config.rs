//! Configuration for the transcode engine.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use super::types::{EngineLoadConfig, ExecutionMode, ResourceRequest};

const SINGLE_THREAD_BASE: &str = "https://unpkg.com/@ffmpeg/core@0.12.6/dist/esm";
const MULTI_THREAD_BASE: &str = "https://unpkg.com/@ffmpeg/core-mt@0.12.6/dist/esm";
const SCRIPT_MEDIA_TYPE: &str = "text/javascript";
const BINARY_MEDIA_TYPE: &str = "application/wasm";

/// Where the engine runtime for one execution mode lives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuntimeLocation {
    /// Base URL or directory of the runtime distribution.
    pub base_url: String,

    #[serde(default = "default_core_script")]
    pub core_script: String,

    #[serde(default = "default_binary")]
    pub binary: String,

    /// Secondary worker script, required in multi-thread mode.
    #[serde(default)]
    pub worker_script: Option<String>,

    /// Local worker script, handed to the runner without fetching.
    #[serde(default = "default_class_worker")]
    pub class_worker: String,
}

fn default_core_script() -> String {
    "ffmpeg-core.js".to_string()
}

fn default_binary() -> String {
    "ffmpeg-core.wasm".to_string()
}

fn default_class_worker() -> String {
    "assets/ffmpeg/worker.js".to_string()
}

impl RuntimeLocation {
    pub fn single_thread_default() -> Self {
        Self {
            base_url: SINGLE_THREAD_BASE.to_string(),
            core_script: default_core_script(),
            binary: default_binary(),
            worker_script: None,
            class_worker: default_class_worker(),
        }
    }

    pub fn multi_thread_default() -> Self {
        Self {
            base_url: MULTI_THREAD_BASE.to_string(),
            worker_script: Some("ffmpeg-core.worker.js".to_string()),
            ..Self::single_thread_default()
        }
    }

    fn join(&self, file: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), file)
    }

    /// Builds the load configuration for `mode` from this location.
    pub fn load_config(&self, mode: ExecutionMode) -> EngineLoadConfig {
        EngineLoadConfig {
            mode,
            core_script: ResourceRequest::inline(self.join(&self.core_script), SCRIPT_MEDIA_TYPE),
            binary: ResourceRequest::inline(self.join(&self.binary), BINARY_MEDIA_TYPE),
            class_worker: ResourceRequest::passthrough(&self.class_worker, SCRIPT_MEDIA_TYPE),
            worker_script: self
                .worker_script
                .as_ref()
                .filter(|_| mode.is_multi_thread())
                .map(|file| ResourceRequest::inline(self.join(file), SCRIPT_MEDIA_TYPE)),
        }
    }
}

/// Configuration for the transcode engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Mode loaded at startup.
    #[serde(default)]
    pub default_mode: ExecutionMode,

    /// Path to ffmpeg binary.
    #[serde(default = "default_ffmpeg_path")]
    pub ffmpeg_path: PathBuf,

    /// Maximum duration of a single job in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    /// FFmpeg log level (quiet, panic, fatal, error, warning, info, verbose, debug).
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Timeout for fetching one runtime resource, in seconds.
    #[serde(default = "default_fetch_timeout")]
    pub fetch_timeout_secs: u64,

    #[serde(default = "RuntimeLocation::single_thread_default")]
    pub single_thread: RuntimeLocation,

    #[serde(default = "RuntimeLocation::multi_thread_default")]
    pub multi_thread: RuntimeLocation,
}

fn default_ffmpeg_path() -> PathBuf {
    PathBuf::from("ffmpeg")
}

fn default_timeout() -> u64 {
    600
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_fetch_timeout() -> u64 {
    30
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            default_mode: ExecutionMode::default(),
            ffmpeg_path: default_ffmpeg_path(),
            timeout_secs: default_timeout(),
            log_level: default_log_level(),
            fetch_timeout_secs: default_fetch_timeout(),
            single_thread: RuntimeLocation::single_thread_default(),
            multi_thread: RuntimeLocation::multi_thread_default(),
        }
    }
}

impl EngineConfig {
    /// Load configuration for `mode`.
    pub fn load_config(&self, mode: ExecutionMode) -> EngineLoadConfig {
        match mode {
            ExecutionMode::SingleThread => self.single_thread.load_config(mode),
            ExecutionMode::MultiThread => self.multi_thread.load_config(mode),
        }
    }

    /// Sets the ffmpeg path.
    pub fn with_ffmpeg_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.ffmpeg_path = path.into();
        self
    }

    /// Sets the job timeout.
    pub fn with_timeout(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }
}
