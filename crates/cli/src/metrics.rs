//! Prometheus registry for the terminal front-end.
//!
//! Collects the recorder, engine and conversion metrics exported by
//! `reelpress_core::metrics` and renders them in text format on demand.

use anyhow::{Context, Result};
use once_cell::sync::Lazy;
use prometheus::{Encoder, Registry, TextEncoder};

/// Global metrics registry.
pub static REGISTRY: Lazy<Registry> = Lazy::new(|| {
    let registry = Registry::new();
    for metric in reelpress_core::metrics::all_metrics() {
        if let Err(e) = registry.register(metric) {
            tracing::warn!(error = %e, "Failed to register metric");
        }
    }
    registry
});

/// Encode all metrics as Prometheus text format.
pub fn encode_metrics() -> Result<String> {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder
        .encode(&metric_families, &mut buffer)
        .context("Failed to encode metrics")?;
    String::from_utf8(buffer).context("Metrics output is not UTF-8")
}

#[cfg(test)]
mod tests {
    use super::*;
    use reelpress_core::metrics::{CONVERSIONS_TOTAL, ENGINE_LOADS};

    #[test]
    fn test_encode_contains_core_metrics() {
        ENGINE_LOADS.with_label_values(&["single", "success"]).inc();
        CONVERSIONS_TOTAL.with_label_values(&["success"]).inc();

        let output = encode_metrics().unwrap();

        assert!(output.contains("reelpress_engine_loads_total"));
        assert!(output.contains("reelpress_conversions_total"));
    }
}
