mod commands;
mod display;
mod metrics;

use std::path::Path;

use anyhow::{Context, Result};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use reelpress_core::{
    config::config_path, load_default_config, validate_config, ExecutionMode, Orchestrator,
    OrchestratorError,
};

use commands::{Command, HELP};

/// Application version
const VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("Fatal error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    // Initialize logging; stdout is reserved for telemetry
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,reelpress_core=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    info!(version = VERSION, "Starting reelpress");

    // Load configuration
    let path = config_path();
    info!("Loading configuration from {:?}", path);
    let config = load_default_config()
        .with_context(|| format!("Failed to load config from {:?}", path))?;

    // Validate configuration
    validate_config(&config).context("Configuration validation failed")?;

    info!("Configuration loaded successfully");
    info!("Default execution mode: {}", config.engine.default_mode);
    if let Ok(json) = serde_json::to_string(&config) {
        tracing::debug!(config = %json, "Effective configuration");
    }

    // Force registration so `metrics` lists every family
    once_cell::sync::Lazy::force(&metrics::REGISTRY);

    let orchestrator =
        Orchestrator::from_config(&config).context("Failed to create orchestrator")?;

    let printers = display::spawn_printers(orchestrator.telemetry());

    // Device failures are already reported on the status line
    match orchestrator.initialize().await {
        Ok(stream) => info!(
            "Previewing {}x{} stream (audio: {})",
            stream.width(),
            stream.height(),
            stream.has_audio()
        ),
        Err(e) => warn!("Continuing without a device: {}", e),
    }

    println!("{}", HELP);

    tokio::select! {
        result = command_loop(&orchestrator) => result?,
        _ = shutdown_signal() => info!("Received shutdown signal"),
    }

    orchestrator.shutdown().await;
    for printer in printers {
        printer.abort();
    }

    info!("reelpress stopped");
    Ok(())
}

/// Read commands from stdin until `quit` or end of input.
async fn command_loop(orchestrator: &Orchestrator) -> Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    while let Some(line) = lines.next_line().await.context("Failed to read stdin")? {
        if line.trim().is_empty() {
            continue;
        }

        let command = match line.parse::<Command>() {
            Ok(command) => command,
            Err(e) => {
                println!("error: {}", e);
                continue;
            }
        };

        if command == Command::Quit {
            break;
        }

        // Failures are reported on the status line by the orchestrator
        if let Err(e) = dispatch(orchestrator, command).await {
            warn!("Command failed: {:#}", e);
            if needs_reload(&e) {
                println!("the engine is not loaded, use 'reload' to retry");
            }
        }
    }

    Ok(())
}

async fn dispatch(orchestrator: &Orchestrator, command: Command) -> Result<()> {
    match command {
        Command::Start => {
            let session_id = orchestrator.start_recording().await?;
            info!(%session_id, "Recording started");
        }
        Command::Stop => {
            if orchestrator.stop_recording().await?.is_none() {
                println!("not recording");
            }
        }
        Command::Mode(mode) => {
            orchestrator
                .set_execution_mode(mode == ExecutionMode::MultiThread)
                .await?;
        }
        Command::Reload => orchestrator.reload_engine().await?,
        Command::Status => {
            let status = orchestrator.status().await;
            println!("{}", serde_json::to_string_pretty(&status)?);
        }
        Command::Save(path) => save_converted(orchestrator, &path).await?,
        Command::Metrics => print!("{}", metrics::encode_metrics()?),
        Command::Help => println!("{}", HELP),
        Command::Quit => {}
    }
    Ok(())
}

/// Whether reloading the engine may fix the failed command.
fn needs_reload(err: &anyhow::Error) -> bool {
    matches!(
        err.downcast_ref::<OrchestratorError>(),
        Some(OrchestratorError::Engine(e)) if e.is_retryable()
    )
}

/// Write the last converted artifact to `path`.
async fn save_converted(orchestrator: &Orchestrator, path: &Path) -> Result<()> {
    let Some(converted) = orchestrator.telemetry().converted.get() else {
        println!("nothing converted yet");
        return Ok(());
    };

    tokio::fs::write(path, converted.data())
        .await
        .with_context(|| format!("Failed to write {:?}", path))?;
    println!("saved {} bytes to {}", converted.size_bytes, path.display());
    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
