//! Reactive outputs shared between components and the presentation layer.
//!
//! Every telemetry field is an [`Observable`]: consumers read the latest
//! value at any time or subscribe to receive each update in publish order.

mod observable;

pub use observable::{Observable, DEFAULT_CHANNEL_CAPACITY};

use serde::{Deserialize, Serialize};

use crate::engine::ConvertedArtifact;

/// Telemetry configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryConfig {
    /// Updates buffered per subscriber before it is reported as lagging.
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
}

fn default_channel_capacity() -> usize {
    DEFAULT_CHANNEL_CAPACITY
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            channel_capacity: default_channel_capacity(),
        }
    }
}

/// Values published by the transcode engine.
#[derive(Debug, Clone)]
pub struct ConversionTelemetry {
    /// Latest status message (engine log lines, readiness, completion, errors).
    pub status: Observable<String>,
    /// Elapsed conversion time, e.g. `" 3.41 s"`.
    pub conversion_time: Observable<String>,
    /// Latest converted artifact, cleared when a new job starts.
    pub converted: Observable<Option<ConvertedArtifact>>,
}

impl ConversionTelemetry {
    pub fn new(config: &TelemetryConfig) -> Self {
        let capacity = config.channel_capacity;
        Self {
            status: Observable::with_capacity(String::new(), capacity),
            conversion_time: Observable::with_capacity(String::new(), capacity),
            converted: Observable::with_capacity(None, capacity),
        }
    }
}

impl Default for ConversionTelemetry {
    fn default() -> Self {
        Self::new(&TelemetryConfig::default())
    }
}
