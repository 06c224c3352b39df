use anyhow::Context;
use clap::Parser;
use portrelay::config::{DEFAULT_CONFIG_PATH, ProxyConfig};
use portrelay::server::ProxyRuntime;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Sets up a multi-port -> multi-target TCP proxy
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Cli {
    /// Config file for proxy apps/ports/targets
    #[arg(short, long, env = "PORTRELAY_CONFIG", default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .with_level(true)
        .init();

    let cli = Cli::parse();

    let cfg = ProxyConfig::load(&cli.config)
        .with_context(|| format!("Failed to read config {}", cli.config.display()))?;

    tracing::info!("Starting a proxy with the following config:");
    for app in &cfg.apps {
        tracing::info!(name = %app.name, ports = ?app.ports, targets = ?app.targets, "App");
    }

    let runtime = ProxyRuntime::start(&cfg)
        .await
        .context("Failed to start listeners")?;

    runtime.run_until(shutdown_signal()).await;

    Ok(())
}

/// Resolves on Ctrl-C, or SIGTERM on Unix
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
