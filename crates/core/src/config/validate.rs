use super::{types::Config, ConfigError};

/// Validate configuration
/// Currently validates:
/// - Capture dimensions and probe timeout are non-zero
/// - Recorder intervals and bitrates are non-zero
/// - Engine timeouts are non-zero and each mode has a base location
/// - Multi-thread mode names its worker script
/// - Telemetry channel capacity is non-zero
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    let invalid = |msg: &str| Err(ConfigError::ValidationError(msg.to_string()));

    // Capture validation
    if config.capture.ideal_width == 0 || config.capture.ideal_height == 0 {
        return invalid("capture.ideal_width and capture.ideal_height cannot be 0");
    }
    if config.capture.probe_timeout_secs == 0 {
        return invalid("capture.probe_timeout_secs cannot be 0");
    }

    // Recorder validation
    if config.recorder.slice_interval_ms == 0 {
        return invalid("recorder.slice_interval_ms cannot be 0");
    }
    if config.recorder.tick_interval_ms == 0 {
        return invalid("recorder.tick_interval_ms cannot be 0");
    }
    if config.recorder.bits_per_second == 0 {
        return invalid("recorder.bits_per_second cannot be 0");
    }
    if config.recorder.audio_bits_per_second >= config.recorder.bits_per_second {
        return invalid("recorder.audio_bits_per_second must be below recorder.bits_per_second");
    }

    // Engine validation
    if config.engine.timeout_secs == 0 {
        return invalid("engine.timeout_secs cannot be 0");
    }
    if config.engine.fetch_timeout_secs == 0 {
        return invalid("engine.fetch_timeout_secs cannot be 0");
    }
    if config.engine.single_thread.base_url.trim().is_empty() {
        return invalid("engine.single_thread.base_url cannot be empty");
    }
    if config.engine.multi_thread.base_url.trim().is_empty() {
        return invalid("engine.multi_thread.base_url cannot be empty");
    }
    if config.engine.multi_thread.worker_script.is_none() {
        return invalid("engine.multi_thread.worker_script is required");
    }

    // Telemetry validation
    if config.telemetry.channel_capacity == 0 {
        return invalid("telemetry.channel_capacity cannot be 0");
    }

    Ok(())
}
