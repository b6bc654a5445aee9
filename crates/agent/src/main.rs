// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! phpborg-agent: backup orchestration agent daemon.
//!
//! Loads the YAML configuration, builds the control-plane transport,
//! starts the certificate rotator, and runs the task loop until SIGINT or
//! SIGTERM. Startup failures exit non-zero with the reason on stderr.

mod service;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use pba_adapters::ApiClient;
use pba_core::{config, Config};
use pba_engine::{CertRotator, Runtime};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

const VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Parser)]
#[command(name = "phpborg-agent", about = "phpBorg backup agent")]
struct Cli {
    /// Path to the configuration file
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Print version and exit
    #[arg(long)]
    version: bool,

    /// Register the agent as a system service
    #[arg(long)]
    install: bool,

    /// Remove the system service registration
    #[arg(long)]
    uninstall: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if cli.version {
        println!("phpborg-agent version {}", VERSION);
        return Ok(());
    }
    if cli.install {
        service::install().await.context("failed to install service")?;
        println!("Service installed successfully");
        return Ok(());
    }
    if cli.uninstall {
        service::uninstall()
            .await
            .context("failed to uninstall service")?;
        println!("Service uninstalled successfully");
        return Ok(());
    }

    let config_path = cli.config.unwrap_or_else(config::default_config_path);
    let mut config = Config::load(&config_path).with_context(|| {
        format!("failed to load configuration from {}", config_path.display())
    })?;
    config.agent.version = VERSION.to_string();

    init_logging(&config)?;

    tracing::info!(
        version = VERSION,
        name = %config.agent.name,
        uuid = %config.agent.uuid,
        server = %config.server.url,
        "phpborg agent starting"
    );

    let config = Arc::new(config);
    let client =
        Arc::new(ApiClient::new(&config).context("failed to create control-plane client")?);

    let shutdown = CancellationToken::new();
    spawn_signal_handler(shutdown.clone());

    let rotator = CertRotator::new(client.clone(), config.clone());
    let rotator_task = {
        let shutdown = shutdown.clone();
        tokio::spawn(async move { rotator.run(shutdown).await })
    };

    let runtime = Runtime::new(client, config);
    runtime.run(shutdown).await;

    let _ = rotator_task.await;
    tracing::info!("agent stopped");
    Ok(())
}

/// Level from the config (overridable via RUST_LOG), destination stdout
/// or the configured log file. An unopenable log file is fatal.
fn init_logging(config: &Config) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::try_new(&config.logging.level).unwrap_or_else(|_| EnvFilter::new("info"))
    });

    if config.logging.file.is_empty() {
        tracing_subscriber::fmt().with_env_filter(filter).init();
        return Ok(());
    }

    let log_path = Path::new(&config.logging.file);
    if let Some(parent) = log_path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create log directory {}", parent.display()))?;
    }
    let file = std::fs::OpenOptions::new()
        .append(true)
        .create(true)
        .open(log_path)
        .with_context(|| format!("failed to open log file {}", log_path.display()))?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_ansi(false)
        .with_writer(Arc::new(file))
        .init();
    Ok(())
}

fn spawn_signal_handler(shutdown: CancellationToken) {
    tokio::spawn(async move {
        wait_for_signal().await;
        tracing::info!("shutdown signal received");
        shutdown.cancel();
    });
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    match signal(SignalKind::terminate()) {
        Ok(mut terminate) => {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {}
                _ = terminate.recv() => {}
            }
        }
        Err(error) => {
            tracing::error!(%error, "failed to install SIGTERM handler");
            let _ = tokio::signal::ctrl_c().await;
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    let _ = tokio::signal::ctrl_c().await;
}
