//! Mock job runner and runner factory for testing.

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use crate::engine::{
    ExecutionMode, JobRunner, LogListener, ResolvedLoadConfig, RunnerError, RunnerFactory,
    RunnerLog,
};

/// One operation observed by a mock runner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunnerOp {
    Write { runner: usize, name: String, size: usize },
    ExecStart { runner: usize },
    ExecEnd { runner: usize },
    Read { runner: usize, name: String },
    Delete { runner: usize, name: String },
}

#[derive(Debug)]
struct Behavior {
    load_error: Option<RunnerError>,
    exec_error: Option<RunnerError>,
    exit_code: i32,
    exec_delay: Duration,
    output: Bytes,
    logs: Vec<String>,
}

impl Default for Behavior {
    fn default() -> Self {
        Self {
            load_error: None,
            exec_error: None,
            exit_code: 0,
            exec_delay: Duration::ZERO,
            output: Bytes::from_static(b"mock mp4 output"),
            logs: Vec::new(),
        }
    }
}

#[derive(Debug, Default)]
struct Shared {
    behavior: Behavior,
    created: Vec<ExecutionMode>,
    loaded: Vec<ResolvedLoadConfig>,
    execs: Vec<Vec<String>>,
    ops: Vec<RunnerOp>,
    alive: usize,
}

/// Mock implementation of the RunnerFactory trait.
///
/// All runners it creates share one recorder of operations, so tests can
/// assert on what every instance did and in which order. Supports:
/// - Failing the next load or exec
/// - Non-zero exit codes
/// - Slow jobs (to exercise queuing)
/// - Log lines emitted during exec
///
/// # Example
///
/// ```rust,ignore
/// use reelpress_core::testing::MockRunnerFactory;
///
/// let factory = Arc::new(MockRunnerFactory::new());
/// factory.set_exec_delay(Duration::from_millis(50));
///
/// let engine = TranscodeEngine::new(factory.clone(), resolver, config, &telemetry);
/// engine.load(false).await?;
/// engine.run(&artifact).await?;
///
/// assert_eq!(factory.exec_calls().len(), 1);
/// ```
#[derive(Debug, Clone, Default)]
pub struct MockRunnerFactory {
    shared: Arc<Mutex<Shared>>,
}

impl MockRunnerFactory {
    /// Create a new mock runner factory.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next runner load fail.
    pub fn set_next_load_error(&self, error: RunnerError) {
        self.shared.lock().behavior.load_error = Some(error);
    }

    /// Make the next exec fail.
    pub fn set_next_exec_error(&self, error: RunnerError) {
        self.shared.lock().behavior.exec_error = Some(error);
    }

    /// Exit code returned by exec.
    pub fn set_exit_code(&self, code: i32) {
        self.shared.lock().behavior.exit_code = code;
    }

    /// Simulated job duration.
    pub fn set_exec_delay(&self, delay: Duration) {
        self.shared.lock().behavior.exec_delay = delay;
    }

    /// Bytes written to the output file by exec.
    pub fn set_output(&self, output: Bytes) {
        self.shared.lock().behavior.output = output;
    }

    /// Log lines emitted through the listener during exec.
    pub fn set_exec_logs(&self, logs: Vec<String>) {
        self.shared.lock().behavior.logs = logs;
    }

    /// Modes of every created runner, in creation order.
    pub fn created_modes(&self) -> Vec<ExecutionMode> {
        self.shared.lock().created.clone()
    }

    /// Configurations passed to successful loads.
    pub fn loaded_configs(&self) -> Vec<ResolvedLoadConfig> {
        self.shared.lock().loaded.clone()
    }

    /// Arguments of every exec call.
    pub fn exec_calls(&self) -> Vec<Vec<String>> {
        self.shared.lock().execs.clone()
    }

    /// Every file operation and exec boundary, in order.
    pub fn operations(&self) -> Vec<RunnerOp> {
        self.shared.lock().ops.clone()
    }

    /// Runners created and not yet dropped.
    pub fn alive_runners(&self) -> usize {
        self.shared.lock().alive
    }
}

impl RunnerFactory for MockRunnerFactory {
    fn create(&self, mode: ExecutionMode) -> Result<Box<dyn JobRunner>, RunnerError> {
        let mut shared = self.shared.lock();
        shared.created.push(mode);
        shared.alive += 1;
        let id = shared.created.len() - 1;

        Ok(Box::new(MockJobRunner {
            id,
            shared: Arc::clone(&self.shared),
            files: HashMap::new(),
            listener: None,
            loaded: false,
        }))
    }
}

/// Mock implementation of the JobRunner trait with an in-memory file space.
///
/// Exec writes the configured output to the last argument when the file
/// after `-i` exists, and fails with exit code 1 otherwise.
pub struct MockJobRunner {
    id: usize,
    shared: Arc<Mutex<Shared>>,
    files: HashMap<String, Bytes>,
    listener: Option<LogListener>,
    loaded: bool,
}

impl MockJobRunner {
    fn ensure_loaded(&self) -> Result<(), RunnerError> {
        if self.loaded {
            Ok(())
        } else {
            Err(RunnerError::NotLoaded)
        }
    }

    fn record(&self, op: RunnerOp) {
        self.shared.lock().ops.push(op);
    }
}

impl Drop for MockJobRunner {
    fn drop(&mut self) {
        self.shared.lock().alive -= 1;
    }
}

#[async_trait]
impl JobRunner for MockJobRunner {
    fn name(&self) -> &str {
        "mock"
    }

    async fn load(&mut self, config: &ResolvedLoadConfig) -> Result<(), RunnerError> {
        let mut shared = self.shared.lock();
        if let Some(error) = shared.behavior.load_error.take() {
            return Err(error);
        }
        shared.loaded.push(config.clone());
        self.loaded = true;
        Ok(())
    }

    fn loaded(&self) -> bool {
        self.loaded
    }

    fn set_log_listener(&mut self, listener: LogListener) {
        self.listener = Some(listener);
    }

    async fn write_file(&mut self, name: &str, data: Bytes) -> Result<(), RunnerError> {
        self.ensure_loaded()?;
        self.record(RunnerOp::Write {
            runner: self.id,
            name: name.to_string(),
            size: data.len(),
        });
        self.files.insert(name.to_string(), data);
        Ok(())
    }

    async fn exec(&mut self, args: &[String]) -> Result<i32, RunnerError> {
        self.ensure_loaded()?;

        let (delay, logs, error, exit_code, output) = {
            let mut shared = self.shared.lock();
            shared.execs.push(args.to_vec());
            shared.ops.push(RunnerOp::ExecStart { runner: self.id });
            let behavior = &mut shared.behavior;
            (
                behavior.exec_delay,
                behavior.logs.clone(),
                behavior.exec_error.take(),
                behavior.exit_code,
                behavior.output.clone(),
            )
        };

        if let Some(listener) = &self.listener {
            for line in logs {
                listener(RunnerLog::new(line));
            }
        }

        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        self.record(RunnerOp::ExecEnd { runner: self.id });

        if let Some(error) = error {
            return Err(error);
        }

        let input = args
            .iter()
            .position(|a| a == "-i")
            .and_then(|i| args.get(i + 1));
        let has_input = input.is_some_and(|name| self.files.contains_key(name));
        if !has_input {
            return Err(RunnerError::ExitCode {
                code: 1,
                stderr: Some("input file missing".to_string()),
            });
        }

        if exit_code == 0 {
            if let Some(out) = args.last() {
                self.files.insert(out.clone(), output);
            }
        }

        Ok(exit_code)
    }

    async fn read_file(&mut self, name: &str) -> Result<Bytes, RunnerError> {
        self.ensure_loaded()?;
        self.record(RunnerOp::Read {
            runner: self.id,
            name: name.to_string(),
        });
        self.files
            .get(name)
            .cloned()
            .ok_or_else(|| RunnerError::FileNotFound {
                name: name.to_string(),
            })
    }

    async fn delete_file(&mut self, name: &str) -> Result<(), RunnerError> {
        self.ensure_loaded()?;
        self.record(RunnerOp::Delete {
            runner: self.id,
            name: name.to_string(),
        });
        self.files
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| RunnerError::FileNotFound {
                name: name.to_string(),
            })
    }
}
