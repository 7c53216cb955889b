//! clockworkd - The clockwork background service
//!
//! This is the main entry point for the clockworkd service.
//! It wires together all the components:
//! - Configuration loading (file, `.env`, environment)
//! - Export history store
//! - Connection manager and the startup connection
//! - IPC server

use anyhow::{Context, Result};
use clap::Parser;
use clockwork_config::{load_config, resolve_environment_connection, AppConfig};
use clockwork_ipc::IpcServer;
use clockwork_util::default_config_path;
use clockworkd::Service;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::signal::unix::{signal, SignalKind};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// clockworkd - Attendance reporting service
#[derive(Parser, Debug)]
#[command(name = "clockworkd")]
#[command(about = "Attendance reporting service over a Unix socket", long_about = None)]
struct Args {
    /// Configuration file path (default: ~/.config/clockwork/config.toml)
    #[arg(short, long, default_value_os_t = default_config_path())]
    config: PathBuf,

    /// Socket path override (or set CLOCKWORK_SOCKET env var)
    #[arg(short, long, env = "CLOCKWORK_SOCKET")]
    socket: Option<PathBuf>,

    /// Data directory override (or set CLOCKWORK_DATA_DIR env var)
    #[arg(short, long, env = "CLOCKWORK_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Log level
    #[arg(short, long, default_value = "info")]
    log_level: String,
}

fn load_app_config(path: &Path) -> Result<AppConfig> {
    if !path.exists() {
        info!(config_path = %path.display(), "No config file, using defaults");
        return Ok(AppConfig::default());
    }

    let config = load_config(path).with_context(|| format!("Failed to load config from {:?}", path))?;
    info!(config_path = %path.display(), "Configuration loaded");
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    // A missing .env file is not an error
    let _ = dotenv::dotenv();

    let args = Args::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();

    info!(version = env!("CARGO_PKG_VERSION"), "clockworkd starting");

    let config = load_app_config(&args.config)?;

    let socket_path = args
        .socket
        .clone()
        .unwrap_or_else(|| config.service.socket_path.clone());

    let data_dir = args
        .data_dir
        .clone()
        .unwrap_or_else(|| config.service.data_dir.clone());

    std::fs::create_dir_all(&data_dir)
        .with_context(|| format!("Failed to create data directory {:?}", data_dir))?;

    let service = Arc::new(Service::open(&config, &data_dir)?);

    // Config file first, then the environment
    let startup = config.connection.clone().or_else(resolve_environment_connection);
    service.connect_at_startup(startup).await;

    let mut ipc = IpcServer::new(&socket_path);
    ipc.start()
        .await
        .with_context(|| format!("Failed to listen on {:?}", socket_path))?;

    let mut sigterm = signal(SignalKind::terminate()).context("Failed to create SIGTERM handler")?;
    let mut sigint = signal(SignalKind::interrupt()).context("Failed to create SIGINT handler")?;
    let mut sighup = signal(SignalKind::hangup()).context("Failed to create SIGHUP handler")?;

    let shutdown = async move {
        tokio::select! {
            _ = sigterm.recv() => info!("Received SIGTERM, shutting down gracefully"),
            _ = sigint.recv() => info!("Received SIGINT, shutting down gracefully"),
            _ = sighup.recv() => info!("Received SIGHUP, shutting down gracefully"),
        }
    };

    service.run(Arc::new(ipc), shutdown).await
}
