// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! devtool daemon (devtoold)
//!
//! Background process that supervises dev-server processes, fronts them
//! with instrumented proxies, and serves the control socket.

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

use devtool_daemon::lifecycle::{self, Config, LifecycleError};
use tokio::signal::unix::{signal, SignalKind};
use tracing::{error, info};

#[tokio::main]
async fn main() {
    std::process::exit(run().await);
}

async fn run() -> i32 {
    // Handle info flags before touching any daemon state.
    if let Some(arg) = std::env::args().nth(1) {
        match arg.as_str() {
            "--version" | "-V" | "-v" => {
                println!("devtoold {}", env!("CARGO_PKG_VERSION"));
                return 0;
            }
            "--help" | "-h" | "help" => {
                println!("devtoold {}", env!("CARGO_PKG_VERSION"));
                println!("devtool daemon - supervises dev processes and instrumented proxies");
                println!();
                println!("USAGE:");
                println!("    devtoold");
                println!();
                println!("The daemon is typically started by the devtool CLI and should not");
                println!("be invoked directly. It listens on a Unix socket for commands.");
                println!();
                println!("OPTIONS:");
                println!("    -h, --help       Print help information");
                println!("    -v, --version    Print version information");
                return 0;
            }
            other => {
                eprintln!("error: unexpected argument '{other}'");
                eprintln!("Usage: devtoold [--help | --version]");
                return 1;
            }
        }
    }

    let config = match Config::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load configuration: {e}");
            return 1;
        }
    };

    // Rotate the debug log if it has grown too large, then set up
    // tracing before anything interesting happens.
    rotate_log_if_needed(&config.log_path);
    let log_guard = match setup_logging(&config) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Failed to set up logging: {e}");
            return 1;
        }
    };

    info!("Starting daemon");

    let result = match lifecycle::startup(&config).await {
        Ok(result) => result,
        Err(LifecycleError::SocketInUse(pid)) => {
            eprintln!("devtoold is already running (pid {pid})");
            drop(log_guard);
            return 2;
        }
        Err(e) => {
            error!("Failed to start daemon: {}", e);
            eprintln!("Failed to start daemon: {e}");
            drop(log_guard);
            return 1;
        }
    };

    let daemon = result.daemon;
    let listener = result.listener;
    tokio::spawn(listener.run(daemon.token.clone()));

    // Set up signal handlers.
    let mut sigterm = match signal(SignalKind::terminate()) {
        Ok(s) => s,
        Err(e) => {
            error!("signal handler setup failed: {}", e);
            return 1;
        }
    };
    let mut sigint = match signal(SignalKind::interrupt()) {
        Ok(s) => s,
        Err(e) => {
            error!("signal handler setup failed: {}", e);
            return 1;
        }
    };

    info!("Daemon ready, listening on {}", daemon.config.socket_path.display());

    // Signal ready for whoever started us (CLI waiting for startup).
    println!("READY");

    tokio::select! {
        _ = daemon.ctx.shutdown.notified() => {
            info!("Shutdown requested via command");
        }
        _ = sigterm.recv() => {
            info!("Received SIGTERM, shutting down...");
        }
        _ = sigint.recv() => {
            info!("Received SIGINT, shutting down...");
        }
    }

    daemon.shutdown().await;
    info!("Daemon stopped");
    0
}

/// Maximum log file size before rotation (10 MB).
const MAX_LOG_SIZE: u64 = 10 * 1024 * 1024;

/// Number of rotated log files to keep (daemon.log.1, .2, .3).
const MAX_ROTATED_LOGS: u32 = 3;

/// Rotate the daemon log file if it exceeds [`MAX_LOG_SIZE`].
///
/// Shifts `daemon.log` → `daemon.log.1` → `daemon.log.2` → `daemon.log.3`,
/// deleting the oldest. Best-effort: rotation failures are silently
/// ignored so the daemon still starts.
fn rotate_log_if_needed(log_path: &std::path::Path) {
    let size = match std::fs::metadata(log_path) {
        Ok(m) => m.len(),
        Err(_) => return,
    };

    if size < MAX_LOG_SIZE {
        return;
    }

    let log_str = log_path.display().to_string();

    for i in (1..MAX_ROTATED_LOGS).rev() {
        let from = format!("{log_str}.{i}");
        let to = format!("{log_str}.{}", i + 1);
        let _ = std::fs::rename(&from, &to);
    }

    let _ = std::fs::rename(log_path, format!("{log_str}.1"));
}

fn setup_logging(
    config: &Config,
) -> std::io::Result<tracing_appender::non_blocking::WorkerGuard> {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    if let Some(parent) = config.log_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let dir = config
        .log_path
        .parent()
        .ok_or_else(|| std::io::Error::other("log path has no parent"))?;
    let file = config
        .log_path
        .file_name()
        .ok_or_else(|| std::io::Error::other("log path has no file name"))?;

    let file_appender = tracing_appender::rolling::never(dir, file);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    // AGNT_DEBUG raises the default level; RUST_LOG still wins.
    let default = if devtool_daemon::env::debug_enabled() { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(non_blocking))
        .init();

    Ok(guard)
}
