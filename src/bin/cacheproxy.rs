// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use anyhow::{Context, Result};
use clap::Parser;
use shardcache::{
    cfg::{
        cli::{Cli, resolve_config_path},
        config::Config,
        logger::init_logger,
    },
    proxy::Proxy,
};
use tokio::signal::unix::{SignalKind, signal};
use tokio_util::sync::CancellationToken;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut cfg = match &cli.config {
        Some(path) => resolve_config_path(path).and_then(Config::load_from_file)?,
        None => Config::default(),
    };
    if let Some(port) = cli.port {
        cfg.proxy.port = port;
    }

    let _logger_guard = init_logger(&cfg.logger).context("failed to initialize logger")?;

    let proxy = Proxy::new(cfg).await;

    let cancel = CancellationToken::new();
    let signal_cancel = cancel.clone();
    tokio::spawn(async move {
        wait_for_shutdown_signal().await;
        info!("shutdown signal received");
        signal_cancel.cancel();
    });

    proxy.run(cancel).await
}

/// Trips on the first of SIGINT, SIGTERM, or SIGHUP (spec §4.7 step 6,
/// applied identically to the proxy).
async fn wait_for_shutdown_signal() {
    let Ok(mut sigterm) = signal(SignalKind::terminate()) else { return };
    let Ok(mut sigint) = signal(SignalKind::interrupt()) else { return };
    let Ok(mut sighup) = signal(SignalKind::hangup()) else { return };

    tokio::select! {
        _ = sigterm.recv() => {},
        _ = sigint.recv() => {},
        _ = sighup.recv() => {},
    }
}
