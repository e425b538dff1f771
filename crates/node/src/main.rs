// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Hyperbus node daemon (hbd)
//!
//! `hbd <config.toml>`: joins the bus described by the config, emits every
//! JSON line read from stdin and prints every event as a JSON line.

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

use std::path::{Path, PathBuf};

use hb_node::{DaemonConfig, NodeOptions};
use tokio::io::BufReader;
use tokio::signal::unix::{signal, SignalKind};
use tracing::{error, info};
use tracing_appender::non_blocking::WorkerGuard;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = std::env::args().collect();
    let Some(config_path) = args.get(1).map(PathBuf::from) else {
        eprintln!("usage: hbd <config.toml>");
        return Err("missing config path".into());
    };

    let mut config = match DaemonConfig::load(&config_path) {
        Ok(config) => config,
        Err(e) => {
            // Logging is not set up yet
            eprintln!("hbd: {}", e);
            return Err(e.into());
        }
    };
    if config.options == NodeOptions::default() {
        config.options = NodeOptions::from_env();
    }

    let _log_guard = setup_logging(config.log_file.as_deref())?;
    info!(config = %config_path.display(), "starting hbd");

    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;
    let shutdown = async move {
        tokio::select! {
            _ = sigterm.recv() => info!("received SIGTERM, shutting down"),
            _ = sigint.recv() => info!("received SIGINT, shutting down"),
        }
    };

    let input = BufReader::new(tokio::io::stdin());
    if let Err(e) = hb_node::daemon::run(config, input, tokio::io::stdout(), shutdown).await {
        error!(error = %e, "hbd failed");
        return Err(e.into());
    }
    Ok(())
}

/// Log to `log_file` when given, otherwise to stderr
fn setup_logging(log_file: Option<&Path>) -> Result<WorkerGuard, std::io::Error> {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let (writer, guard) = match log_file {
        Some(path) => {
            let dir = match path.parent() {
                Some(parent) if !parent.as_os_str().is_empty() => parent,
                _ => Path::new("."),
            };
            std::fs::create_dir_all(dir)?;
            let name = path.file_name().ok_or_else(|| {
                std::io::Error::new(std::io::ErrorKind::InvalidInput, "log_file has no file name")
            })?;
            tracing_appender::non_blocking(tracing_appender::rolling::never(dir, name))
        }
        None => tracing_appender::non_blocking(std::io::stderr()),
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(writer).with_ansi(false))
        .init();

    Ok(guard)
}
