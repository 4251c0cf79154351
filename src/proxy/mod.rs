// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Sharding proxy (spec §4.5): consistent-hash ring, per-client key
//! stickiness, and the accept loop that fronts a set of cache node
//! backends.

pub mod handler;
pub mod hashring;
pub mod registry;

use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::cfg::config::{Config, ProxyConfig};
use registry::ProxyState;

/// Owns the shared [`ProxyState`] and the accept loop. Mirrors
/// [`crate::node::Node`]'s bootstrap shape: dial known backends, bind the
/// listener, accept until cancelled.
pub struct Proxy {
    state: Arc<ProxyState>,
    cfg: ProxyConfig,
    connection_timeout_ms: u64,
}

impl Proxy {
    /// Dials every backend in `cfg.backends`, logging (not aborting) on
    /// each failed dial — spec §4.5's "a failed dial marks the backend
    /// absent but does not abort startup."
    pub async fn new(cfg: Config) -> Self {
        let state = Arc::new(ProxyState::new(cfg.proxy.replicas));
        for backend in &cfg.proxy.backends {
            if let Err(err) = state.connect_backend(backend).await {
                warn!(%backend, error = %err, "failed to dial backend at startup");
            } else {
                info!(%backend, "dialed backend");
            }
        }
        Self { state, cfg: cfg.proxy, connection_timeout_ms: cfg.runtime.connection_timeout_ms }
    }

    /// Binds the listener (fatal on failure, spec §7) and accepts
    /// connections until `cancel` fires.
    pub async fn run(self, cancel: CancellationToken) -> Result<()> {
        let addr = format!("0.0.0.0:{}", self.cfg.port);
        let listener = TcpListener::bind(&addr)
            .await
            .with_context(|| format!("failed to bind proxy listener on {addr}"))?;
        info!(%addr, "proxy listening");

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    info!("proxy shutting down");
                    return Ok(());
                }
                accepted = listener.accept() => {
                    match accepted {
                        Ok((stream, peer)) => {
                            let state = Arc::clone(&self.state);
                            let child_cancel = cancel.clone();
                            let timeout_ms = self.connection_timeout_ms;
                            tokio::spawn(async move {
                                handler::handle_client(stream, peer, state, timeout_ms, child_cancel).await;
                            });
                        }
                        Err(err) => warn!(error = %err, "proxy accept failed"),
                    }
                }
            }
        }
    }
}
