//! Prometheus metrics for core components.
//!
//! This module provides metrics for:
//! - Recorder (recordings, artifact sizes)
//! - Engine (loads by mode, conversions, conversion time)

use once_cell::sync::Lazy;
use prometheus::{Histogram, HistogramOpts, IntCounterVec, Opts};

// =============================================================================
// Recorder Metrics
// =============================================================================

/// Recordings finalized by result.
pub static RECORDINGS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("reelpress_recordings_total", "Total recordings finalized"),
        &["result"], // "success", "failed"
    )
    .unwrap()
});

/// Size of finalized recordings in bytes.
pub static RECORDING_BYTES: Lazy<Histogram> = Lazy::new(|| {
    Histogram::with_opts(
        HistogramOpts::new(
            "reelpress_recording_bytes",
            "Size of finalized recording artifacts",
        )
        .buckets(prometheus::exponential_buckets(64.0 * 1024.0, 4.0, 8).unwrap()),
    )
    .unwrap()
});

// =============================================================================
// Engine Metrics
// =============================================================================

/// Engine loads by execution mode and result.
pub static ENGINE_LOADS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("reelpress_engine_loads_total", "Total engine load attempts"),
        &["mode", "result"], // mode: "single", "multi"; result: "success", "failed"
    )
    .unwrap()
});

/// Conversions by result.
pub static CONVERSIONS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("reelpress_conversions_total", "Total conversion requests"),
        &["result"], // "success", "failed", "not_ready"
    )
    .unwrap()
});

/// Wall-clock duration of the transcode job.
pub static CONVERSION_DURATION: Lazy<Histogram> = Lazy::new(|| {
    Histogram::with_opts(
        HistogramOpts::new(
            "reelpress_conversion_duration_seconds",
            "Duration of transcode jobs",
        )
        .buckets(vec![0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0, 120.0, 300.0]),
    )
    .unwrap()
});

/// Get all core metrics for registration.
pub fn all_metrics() -> Vec<Box<dyn prometheus::core::Collector>> {
    vec![
        // Recorder
        Box::new(RECORDINGS_TOTAL.clone()),
        Box::new(RECORDING_BYTES.clone()),
        // Engine
        Box::new(ENGINE_LOADS.clone()),
        Box::new(CONVERSIONS_TOTAL.clone()),
        Box::new(CONVERSION_DURATION.clone()),
    ]
}
