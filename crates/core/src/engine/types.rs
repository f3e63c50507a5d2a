//! Types for the transcode engine.

use std::fmt;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Media type of a converted artifact.
pub const CONVERTED_MEDIA_TYPE: &str = "video/mp4";

/// Worker configuration of the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionMode {
    #[default]
    SingleThread,
    MultiThread,
}

impl ExecutionMode {
    pub fn from_multi_thread(multi_thread: bool) -> Self {
        if multi_thread {
            Self::MultiThread
        } else {
            Self::SingleThread
        }
    }

    pub fn is_multi_thread(&self) -> bool {
        matches!(self, Self::MultiThread)
    }

    /// Short label for metrics and the CLI.
    pub fn label(&self) -> &'static str {
        match self {
            Self::SingleThread => "single",
            Self::MultiThread => "multi",
        }
    }
}

impl fmt::Display for ExecutionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SingleThread => f.write_str("single-thread"),
            Self::MultiThread => f.write_str("multi-thread"),
        }
    }
}

/// Engine lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineState {
    #[default]
    Unloaded,
    Loading,
    Ready,
}

impl fmt::Display for EngineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unloaded => f.write_str("unloaded"),
            Self::Loading => f.write_str("loading"),
            Self::Ready => f.write_str("ready"),
        }
    }
}

/// Fixed output parameters of a transcode job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TranscodeProfile {
    pub version: u32,
    pub duration_cap_secs: u32,
    pub video_codec: &'static str,
    pub preset: &'static str,
    pub frame_rate: u32,
    pub resolution: &'static str,
    pub crf: u32,
    pub input_name: &'static str,
    pub output_name: &'static str,
    pub output_media_type: &'static str,
}

impl TranscodeProfile {
    /// 60 s cap, H.264 ultrafast, 20 fps, 480x360, CRF 28.
    pub const V1: TranscodeProfile = TranscodeProfile {
        version: 1,
        duration_cap_secs: 60,
        video_codec: "libx264",
        preset: "ultrafast",
        frame_rate: 20,
        resolution: "480x360",
        crf: 28,
        input_name: "input.webm",
        output_name: "output.mp4",
        output_media_type: CONVERTED_MEDIA_TYPE,
    };

    /// Renders the job arguments, output file last.
    pub fn to_args(&self) -> Vec<String> {
        vec![
            "-i".to_string(),
            self.input_name.to_string(),
            "-t".to_string(),
            self.duration_cap_secs.to_string(),
            "-c:v".to_string(),
            self.video_codec.to_string(),
            "-preset".to_string(),
            self.preset.to_string(),
            "-r".to_string(),
            self.frame_rate.to_string(),
            "-s".to_string(),
            self.resolution.to_string(),
            "-crf".to_string(),
            self.crf.to_string(),
            self.output_name.to_string(),
        ]
    }
}

impl Default for TranscodeProfile {
    fn default() -> Self {
        Self::V1
    }
}

/// A resource the runner needs before it can load.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResourceRequest {
    pub locator: String,
    pub media_type: String,
    /// Fetch the bytes up front; otherwise the locator is handed over as is.
    pub inline: bool,
}

impl ResourceRequest {
    pub fn inline(locator: impl Into<String>, media_type: impl Into<String>) -> Self {
        Self {
            locator: locator.into(),
            media_type: media_type.into(),
            inline: true,
        }
    }

    pub fn passthrough(locator: impl Into<String>, media_type: impl Into<String>) -> Self {
        Self {
            locator: locator.into(),
            media_type: media_type.into(),
            inline: false,
        }
    }
}

/// Resource locators for one execution mode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineLoadConfig {
    pub mode: ExecutionMode,
    pub core_script: ResourceRequest,
    pub binary: ResourceRequest,
    pub class_worker: ResourceRequest,
    /// Only present in multi-thread mode.
    pub worker_script: Option<ResourceRequest>,
}

impl EngineLoadConfig {
    pub fn multi_thread(&self) -> bool {
        self.mode.is_multi_thread()
    }

    /// All requests, in resolution order.
    pub fn requests(&self) -> Vec<&ResourceRequest> {
        let mut requests = vec![&self.core_script, &self.binary, &self.class_worker];
        requests.extend(self.worker_script.as_ref());
        requests
    }
}

/// A resource after resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedResource {
    pub locator: String,
    pub media_type: String,
    /// Fetched content for inline requests.
    pub bytes: Option<Bytes>,
}

impl ResolvedResource {
    pub fn is_inline(&self) -> bool {
        self.bytes.is_some()
    }
}

/// Load configuration with every resource resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedLoadConfig {
    pub mode: ExecutionMode,
    pub core_script: ResolvedResource,
    pub binary: ResolvedResource,
    pub class_worker: ResolvedResource,
    pub worker_script: Option<ResolvedResource>,
}

/// Output of a successful transcode.
#[derive(Debug, Clone, Serialize)]
pub struct ConvertedArtifact {
    pub media_type: String,
    pub size_bytes: u64,
    pub created_at: DateTime<Utc>,
    #[serde(skip)]
    data: Bytes,
}

impl ConvertedArtifact {
    pub fn new(data: Bytes) -> Self {
        Self {
            media_type: CONVERTED_MEDIA_TYPE.to_string(),
            size_bytes: data.len() as u64,
            created_at: Utc::now(),
            data,
        }
    }

    pub fn data(&self) -> &Bytes {
        &self.data
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_profile_v1_args() {
        assert_eq!(
            TranscodeProfile::V1.to_args(),
            vec![
                "-i",
                "input.webm",
                "-t",
                "60",
                "-c:v",
                "libx264",
                "-preset",
                "ultrafast",
                "-r",
                "20",
                "-s",
                "480x360",
                "-crf",
                "28",
                "output.mp4",
            ]
        );
    }

    #[test]
    fn test_execution_mode_serde() {
        let json = serde_json::to_string(&ExecutionMode::MultiThread).unwrap();
        assert_eq!(json, "\"multi_thread\"");
        let mode: ExecutionMode = serde_json::from_str("\"single_thread\"").unwrap();
        assert_eq!(mode, ExecutionMode::SingleThread);
    }

    #[test]
    fn test_execution_mode_from_bool() {
        assert_eq!(
            ExecutionMode::from_multi_thread(true),
            ExecutionMode::MultiThread
        );
        assert!(!ExecutionMode::from_multi_thread(false).is_multi_thread());
        assert_eq!(ExecutionMode::MultiThread.label(), "multi");
    }

    #[test]
    fn test_load_config_requests_order() {
        let config = EngineLoadConfig {
            mode: ExecutionMode::MultiThread,
            core_script: ResourceRequest::inline("a/core.js", "text/javascript"),
            binary: ResourceRequest::inline("a/core.wasm", "application/wasm"),
            class_worker: ResourceRequest::passthrough("worker.js", "text/javascript"),
            worker_script: Some(ResourceRequest::inline("a/core.worker.js", "text/javascript")),
        };

        let locators: Vec<_> = config.requests().iter().map(|r| r.locator.as_str()).collect();
        assert_eq!(
            locators,
            vec!["a/core.js", "a/core.wasm", "worker.js", "a/core.worker.js"]
        );
        assert!(config.multi_thread());
    }

    #[test]
    fn test_converted_artifact() {
        let artifact = ConvertedArtifact::new(Bytes::from_static(b"mp4"));
        assert_eq!(artifact.media_type, "video/mp4");
        assert_eq!(artifact.size_bytes, 3);
        assert!(!artifact.is_empty());
    }
}
