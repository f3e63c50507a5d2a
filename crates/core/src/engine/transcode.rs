//! The transcode engine: load lifecycle and job execution.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use crate::metrics;
use crate::recorder::RecordingArtifact;
use crate::telemetry::{ConversionTelemetry, Observable, TelemetryConfig};

use super::config::EngineConfig;
use super::error::{EngineError, ResourceError};
use super::traits::{JobRunner, ResourceResolver, RunnerFactory, RunnerLog};
use super::types::{
    ConvertedArtifact, EngineLoadConfig, EngineState, ExecutionMode, ResolvedLoadConfig,
    TranscodeProfile,
};

/// Published when a job starts on a ready engine.
pub const READY_MESSAGE: &str = "FFmpeg is loaded and ready to use.";
/// Published when a job is requested before the engine is ready.
pub const NOT_READY_MESSAGE: &str = "FFmpeg failed to load.";
/// Published when the job finishes executing.
pub const COMPLETED_MESSAGE: &str = "Conversion completed.";

/// Formats an elapsed job time, e.g. `" 3.41 s"`.
pub fn format_elapsed(elapsed: Duration) -> String {
    format!(" {:.2} s", elapsed.as_secs_f64())
}

/// Runs the fixed transcode profile on a runner instance.
///
/// One runner lives in a slot guarded by an async mutex. Both `load` and
/// `run` hold the slot for their whole duration, so jobs queue behind each
/// other and a reload waits for the job in flight.
pub struct TranscodeEngine {
    factory: Arc<dyn RunnerFactory>,
    resolver: Arc<dyn ResourceResolver>,
    config: EngineConfig,
    profile: TranscodeProfile,
    telemetry: ConversionTelemetry,
    state: Observable<EngineState>,
    mode: Observable<ExecutionMode>,
    slot: Mutex<Option<Box<dyn JobRunner>>>,
}

impl TranscodeEngine {
    pub fn new(
        factory: Arc<dyn RunnerFactory>,
        resolver: Arc<dyn ResourceResolver>,
        config: EngineConfig,
        telemetry: &TelemetryConfig,
    ) -> Self {
        let capacity = telemetry.channel_capacity;
        Self {
            factory,
            resolver,
            mode: Observable::with_capacity(config.default_mode, capacity),
            config,
            profile: TranscodeProfile::V1,
            telemetry: ConversionTelemetry::new(telemetry),
            state: Observable::with_capacity(EngineState::Unloaded, capacity),
            slot: Mutex::new(None),
        }
    }

    /// The only readiness check.
    pub fn state(&self) -> EngineState {
        self.state.get()
    }

    /// Mode of the current (or last attempted) load.
    pub fn mode(&self) -> ExecutionMode {
        self.mode.get()
    }

    pub fn profile(&self) -> &TranscodeProfile {
        &self.profile
    }

    pub fn telemetry(&self) -> &ConversionTelemetry {
        &self.telemetry
    }

    pub fn state_observable(&self) -> Observable<EngineState> {
        self.state.clone()
    }

    pub fn mode_observable(&self) -> Observable<ExecutionMode> {
        self.mode.clone()
    }

    /// Loads a fresh runner for the requested mode.
    ///
    /// Any previous runner and its file space are discarded first. On failure
    /// the engine stays `Unloaded` and a status message is published.
    pub async fn load(&self, multi_thread: bool) -> Result<(), EngineError> {
        let mode = ExecutionMode::from_multi_thread(multi_thread);
        let mut slot = self.slot.lock().await;

        if let Some(previous) = slot.take() {
            debug!(runner = previous.name(), "Discarding previous runner");
        }

        self.mode.set(mode);
        self.state.set(EngineState::Loading);
        info!(%mode, "Loading engine");

        match self.load_runner(mode).await {
            Ok(runner) => {
                info!(%mode, runner = runner.name(), "Engine ready");
                *slot = Some(runner);
                self.state.set(EngineState::Ready);
                metrics::ENGINE_LOADS
                    .with_label_values(&[mode.label(), "success"])
                    .inc();
                Ok(())
            }
            Err(e) => {
                error!(%mode, error = %e, "Engine load failed");
                self.state.set(EngineState::Unloaded);
                self.telemetry.status.set(e.to_string());
                metrics::ENGINE_LOADS
                    .with_label_values(&[mode.label(), "failed"])
                    .inc();
                Err(e)
            }
        }
    }

    /// Loads again in the current mode.
    pub async fn reload(&self) -> Result<(), EngineError> {
        self.load(self.mode().is_multi_thread()).await
    }

    async fn load_runner(&self, mode: ExecutionMode) -> Result<Box<dyn JobRunner>, EngineError> {
        let load_config = self.config.load_config(mode);
        let resolved = self
            .resolve(&load_config)
            .await
            .map_err(|e| EngineError::load_failed(mode, e))?;

        let mut runner = self
            .factory
            .create(mode)
            .map_err(|e| EngineError::load_failed(mode, e))?;

        let status = self.telemetry.status.clone();
        runner.set_log_listener(Arc::new(move |log: RunnerLog| status.set(log.message)));

        runner
            .load(&resolved)
            .await
            .map_err(|e| EngineError::load_failed(mode, e))?;

        if !runner.loaded() {
            return Err(EngineError::load_failed(
                mode,
                "runner did not report loaded",
            ));
        }

        Ok(runner)
    }

    async fn resolve(&self, config: &EngineLoadConfig) -> Result<ResolvedLoadConfig, ResourceError> {
        let (core_script, binary, class_worker) = futures::try_join!(
            self.resolver.resolve(&config.core_script),
            self.resolver.resolve(&config.binary),
            self.resolver.resolve(&config.class_worker),
        )?;

        let worker_script = match &config.worker_script {
            Some(request) => Some(self.resolver.resolve(request).await?),
            None => None,
        };

        Ok(ResolvedLoadConfig {
            mode: config.mode,
            core_script,
            binary,
            class_worker,
            worker_script,
        })
    }

    /// Converts a recording with the fixed profile.
    ///
    /// When the engine is not ready this only publishes the not-ready message
    /// and returns [`EngineError::NotReady`].
    pub async fn run(&self, artifact: &RecordingArtifact) -> Result<ConvertedArtifact, EngineError> {
        let mut slot = self.slot.lock().await;
        let state = self.state();

        let runner = match slot.as_mut() {
            Some(runner) if state == EngineState::Ready && runner.loaded() => runner,
            _ => {
                warn!(%state, "Conversion requested before engine is ready");
                self.telemetry.status.set(NOT_READY_MESSAGE.to_string());
                metrics::CONVERSIONS_TOTAL
                    .with_label_values(&["not_ready"])
                    .inc();
                return Err(EngineError::NotReady { state });
            }
        };

        self.telemetry.status.set(READY_MESSAGE.to_string());
        self.telemetry.converted.set(None);

        info!(
            session_id = %artifact.session_id,
            size_bytes = artifact.size_bytes,
            mode = %self.mode(),
            "Starting conversion"
        );

        let result = self.execute(runner.as_mut(), artifact).await;
        self.cleanup(runner.as_mut()).await;

        match result {
            Ok(converted) => {
                info!(size_bytes = converted.size_bytes, "Conversion succeeded");
                self.telemetry.converted.set(Some(converted.clone()));
                metrics::CONVERSIONS_TOTAL
                    .with_label_values(&["success"])
                    .inc();
                Ok(converted)
            }
            Err(e) => {
                error!(error = %e, "Conversion failed");
                self.telemetry.status.set(e.to_string());
                metrics::CONVERSIONS_TOTAL
                    .with_label_values(&["failed"])
                    .inc();
                Err(e)
            }
        }
    }

    async fn execute(
        &self,
        runner: &mut dyn JobRunner,
        artifact: &RecordingArtifact,
    ) -> Result<ConvertedArtifact, EngineError> {
        let profile = &self.profile;

        runner
            .write_file(profile.input_name, artifact.data().clone())
            .await
            .map_err(EngineError::job_failed)?;

        let started = Instant::now();
        let code = runner
            .exec(&profile.to_args())
            .await
            .map_err(EngineError::job_failed)?;
        if code != 0 {
            return Err(EngineError::job_failed(format!(
                "job exited with code {}",
                code
            )));
        }

        let elapsed = started.elapsed();
        self.telemetry.status.set(COMPLETED_MESSAGE.to_string());
        self.telemetry.conversion_time.set(format_elapsed(elapsed));
        metrics::CONVERSION_DURATION.observe(elapsed.as_secs_f64());

        let data = runner
            .read_file(profile.output_name)
            .await
            .map_err(EngineError::job_failed)?;
        if data.is_empty() {
            return Err(EngineError::job_failed("output file is empty"));
        }

        Ok(ConvertedArtifact::new(data))
    }

    /// Removes job files so a later job never sees stale input.
    async fn cleanup(&self, runner: &mut dyn JobRunner) {
        for name in [self.profile.input_name, self.profile.output_name] {
            if let Err(e) = runner.delete_file(name).await {
                debug!(name, error = %e, "Job file not removed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_elapsed() {
        assert_eq!(format_elapsed(Duration::from_millis(3414)), " 3.41 s");
        assert_eq!(format_elapsed(Duration::ZERO), " 0.00 s");
    }

    #[test]
    fn test_messages() {
        assert_eq!(READY_MESSAGE, "FFmpeg is loaded and ready to use.");
        assert_eq!(NOT_READY_MESSAGE, "FFmpeg failed to load.");
        assert_eq!(COMPLETED_MESSAGE, "Conversion completed.");
    }
}
