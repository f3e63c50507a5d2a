//! Trait definitions for the transcode engine.

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;

use super::error::{ResourceError, RunnerError};
use super::types::{ExecutionMode, ResolvedLoadConfig, ResolvedResource, ResourceRequest};

/// A log line emitted by a runner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunnerLog {
    pub message: String,
}

impl RunnerLog {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Receives runner log lines synchronously, in emission order.
pub type LogListener = Arc<dyn Fn(RunnerLog) + Send + Sync>;

/// A media-processing engine with a private file space.
///
/// File names are flat (no directories). Operations other than `load` and
/// `set_log_listener` fail with [`RunnerError::NotLoaded`] before a
/// successful `load`.
#[async_trait]
pub trait JobRunner: Send + Sync {
    /// Returns the name of this runner implementation.
    fn name(&self) -> &str;

    /// Initializes the runner with resolved resources.
    async fn load(&mut self, config: &ResolvedLoadConfig) -> Result<(), RunnerError>;

    /// Whether `load` has completed successfully.
    fn loaded(&self) -> bool;

    /// Registers the log listener, replacing any previous one.
    fn set_log_listener(&mut self, listener: LogListener);

    async fn write_file(&mut self, name: &str, data: Bytes) -> Result<(), RunnerError>;

    /// Runs a job; returns the exit code on success.
    async fn exec(&mut self, args: &[String]) -> Result<i32, RunnerError>;

    async fn read_file(&mut self, name: &str) -> Result<Bytes, RunnerError>;

    async fn delete_file(&mut self, name: &str) -> Result<(), RunnerError>;
}

/// Builds fresh runner instances.
pub trait RunnerFactory: Send + Sync {
    fn create(&self, mode: ExecutionMode) -> Result<Box<dyn JobRunner>, RunnerError>;
}

/// Turns resource locators into loadable resources.
#[async_trait]
pub trait ResourceResolver: Send + Sync {
    async fn resolve(&self, request: &ResourceRequest) -> Result<ResolvedResource, ResourceError>;
}
