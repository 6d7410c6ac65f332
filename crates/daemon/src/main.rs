//! deskctl daemon - Main Entry Point
//! JSON-RPC server in front of the shell job manager

mod config;

use anyhow::Result;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

// Import workspace crates
use deskctl_api_rpc::{RpcServer, RpcServerConfig};
use deskctl_core::application::ShellService;
use deskctl_infra_system::{SudoRebootControl, SysinfoResourceProbe, TokioProcessLauncher};

use crate::config::DaemonConfig;

const VERSION: &str = env!("CARGO_PKG_VERSION");
const LOG_FILE_PREFIX: &str = "deskctl-daemon.log";

/// Install the global subscriber
///
/// The returned guard flushes the file writer and must live until exit.
fn init_logging(config: &DaemonConfig) -> Result<Option<WorkerGuard>> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("deskctl=info"))?;

    let mut guard = None;
    let file_layer = config.log_dir.as_ref().map(|dir| {
        let appender = tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX);
        let (writer, worker_guard) = tracing_appender::non_blocking(appender);
        guard = Some(worker_guard);
        fmt::layer().json().with_ansi(false).with_writer(writer)
    });

    match config.log_format.as_str() {
        "json" => {
            // Production: JSON structured logging
            tracing_subscriber::registry()
                .with(env_filter)
                .with(file_layer)
                .with(fmt::layer().json())
                .init();
        }
        _ => {
            // Development: Pretty formatting with colors
            tracing_subscriber::registry()
                .with(env_filter)
                .with(file_layer)
                .with(fmt::layer().pretty())
                .init();
        }
    }

    Ok(guard)
}

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Load configuration
    let config = DaemonConfig::load()?;

    // 2. Initialize logging
    let _log_guard = init_logging(&config)?;

    info!("deskctl daemon v{} starting...", VERSION);

    let shell_config = config.shell_config();
    info!(
        shell = %config.shell,
        working_dir = %shell_config.working_dir.display(),
        default_timeout_secs = config.default_timeout_secs,
        allow_restart = config.allow_restart,
        "Configuration loaded"
    );

    // 3. Setup dependencies (DI wiring)
    let launcher = Arc::new(TokioProcessLauncher::new(config.shell.clone()));
    let probe = Arc::new(SysinfoResourceProbe::new());
    let system_control = Arc::new(SudoRebootControl);

    let service = ShellService::new(launcher, probe, system_control, shell_config);

    // 4. Start JSON-RPC server
    info!("Starting JSON-RPC server...");
    let rpc_config = RpcServerConfig {
        host: config.rpc_host.clone(),
        port: config.rpc_port,
    };
    let rpc_server = RpcServer::new(rpc_config, service.clone());
    let (addr, rpc_handle) = rpc_server
        .start()
        .await
        .map_err(|e| anyhow::anyhow!("RPC server start failed: {}", e))?;

    info!(addr = %addr, "System ready. Waiting for commands...");
    info!("Press Ctrl+C to shutdown");

    // 5. Wait for shutdown signal
    tokio::signal::ctrl_c().await?;

    info!("Shutdown signal received. Exiting gracefully...");

    // 6. Graceful shutdown
    if let Err(e) = rpc_handle.stop() {
        warn!(error = %e, "RPC server already stopped");
    }
    rpc_handle.stopped().await;

    if config.terminate_on_exit {
        let terminated = service.shutdown().await;
        info!(terminated, "Background jobs terminated");
    } else {
        info!(
            remaining = service.tracked_jobs().await,
            "Leaving background jobs running"
        );
    }

    info!("Shutdown complete.");

    Ok(())
}
