// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `cadenced`: runs the task scheduler and the job runner until SIGINT or
//! SIGTERM. SIGHUP re-reads `tasks.json` and `jobs.json`.

use std::process::ExitCode;

use cadence_daemon::{logging, startup, Config, Daemon, LifecycleError};
use cadence_engine::EngineConfig;
use tokio::signal::unix::{signal, SignalKind};
use tracing::{error, info};

#[tokio::main]
async fn main() -> ExitCode {
    let config = match Config::load() {
        Ok(config) => config,
        Err(e) => return fail(&e),
    };
    // Dropping the guard flushes the log writer, so it lives for all of main.
    let _log_guard = match logging::init(&config.log_path) {
        Ok(guard) => guard,
        Err(e) => return fail(&e),
    };

    match run(config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "daemon failed");
            fail(&e)
        }
    }
}

async fn run(config: Config) -> Result<(), LifecycleError> {
    let daemon = startup(&config, EngineConfig::from_env())?;
    let loops = daemon.start();
    let waited = wait_for_shutdown(&daemon).await;
    daemon.shutdown(loops).await;
    waited
}

/// Serve SIGHUP reloads until a termination signal arrives.
async fn wait_for_shutdown(daemon: &Daemon) -> Result<(), LifecycleError> {
    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sighup = signal(SignalKind::hangup())?;
    loop {
        tokio::select! {
            result = tokio::signal::ctrl_c() => {
                result?;
                info!("received SIGINT");
                return Ok(());
            }
            _ = sigterm.recv() => {
                info!("received SIGTERM");
                return Ok(());
            }
            _ = sighup.recv() => {
                info!("received SIGHUP, reloading");
                daemon.reload().await;
            }
        }
    }
}

fn fail(e: &LifecycleError) -> ExitCode {
    eprintln!("cadenced: {e}");
    ExitCode::from(e.exit_code().clamp(1, 255) as u8)
}
