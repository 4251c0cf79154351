// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Cache node bootstrap and accept loop (spec §4.7): open/replay the AOF,
//! bind the listener, accept one task per connection, run the flush task,
//! and shut down cleanly on cancellation, using a `CancellationToken`
//! shared by every spawned task (spec §5's shutdown contract).

use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::{
    io::{AsyncWriteExt, BufReader},
    net::TcpListener,
    sync::Mutex,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::{
    aof::{self, AofLog},
    cfg::config::Config,
    clock::Clock,
    engine::CacheEngine,
    error::CacheError,
    session::ClientSession,
    wire::Parser,
};

/// Owns the shared [`CacheEngine`] and the accept loop.
pub struct Node {
    engine: Arc<CacheEngine>,
    port: u16,
    flush_interval_ms: u64,
}

impl Node {
    /// Opens (creating if absent) and replays the AOF before accepting any
    /// connection (spec §4.4's replay path); fatal on open failure (spec
    /// §7).
    pub async fn bootstrap(cfg: Config, clock: Arc<dyn Clock>) -> Result<Self> {
        let aof_path = cfg.node.aof_path.clone();
        let aof = AofLog::open(&aof_path)
            .await
            .with_context(|| format!("failed to open aof file at {aof_path}"))?;

        let engine = Arc::new(CacheEngine::new(cfg.node.cache_budget_bytes as usize, aof, clock));

        let replayed = aof::replay(&aof_path)
            .await
            .with_context(|| format!("failed to replay aof file at {aof_path}"))?;
        let replayed_count = replayed.len();
        engine.replay(replayed).await;
        info!(count = replayed_count, "replayed aof at startup");

        Ok(Self { engine, port: cfg.node.port, flush_interval_ms: cfg.node.flush_interval_ms })
    }

    /// Binds the listener (fatal on failure, spec §7), spawns the AOF
    /// flush task, and accepts connections until `cancel` fires. Each
    /// connection gets its own task and [`ClientSession`]; in-flight
    /// commands finish before the handler observes cancellation (spec
    /// §5's shutdown contract).
    pub async fn run(self, cancel: CancellationToken) -> Result<()> {
        let addr = format!("0.0.0.0:{}", self.port);
        let listener =
            TcpListener::bind(&addr).await.with_context(|| format!("failed to bind node listener on {addr}"))?;
        info!(%addr, "cache node listening");

        let engine_for_flush = Arc::clone(&self.engine);
        let flush_interval_ms = self.flush_interval_ms;
        let flush_cancel = cancel.clone();
        let flush_task = tokio::spawn(async move {
            engine_for_flush.aof().flush_task(flush_interval_ms, flush_cancel).await;
        });

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    info!("cache node shutting down");
                    break;
                }
                accepted = listener.accept() => {
                    match accepted {
                        Ok((stream, peer)) => {
                            let engine = Arc::clone(&self.engine);
                            let child_cancel = cancel.clone();
                            tokio::spawn(async move {
                                handle_connection(stream, engine, child_cancel).await;
                                debug!(%peer, "connection closed");
                            });
                        }
                        Err(err) => warn!(error = %err, "node accept failed"),
                    }
                }
            }
        }

        flush_task.await.context("aof flush task panicked")?;
        Ok(())
    }
}

/// Drives one accepted client connection: parse one wire command at a
/// time, dispatch it through the shared engine, write the reply, repeat
/// until EOF or cancellation (checked between commands, never mid-command
/// — spec §5).
async fn handle_connection(stream: tokio::net::TcpStream, engine: Arc<CacheEngine>, cancel: CancellationToken) {
    let (read_half, write_half) = stream.into_split();
    let mut reader = BufReader::new(read_half);
    let writer = Mutex::new(write_half);
    let mut parser = Parser::new();
    let mut session = ClientSession::new(engine.session_ids.next());

    loop {
        let parsed = tokio::select! {
            _ = cancel.cancelled() => break,
            parsed = parser.parse_one(&mut reader) => parsed,
        };

        let reply = match parsed {
            Ok(None) => break,
            Ok(Some(cmd)) if cmd.is_error() => CacheError::Failed.to_string(),
            Ok(Some(cmd)) => match engine.dispatch(&mut session, &cmd.cmd, cmd.args, true).await {
                Ok(reply) => reply,
                Err(err) => err.to_string(),
            },
            Err(err) => {
                debug!(error = %err, "connection read failed");
                break;
            },
        };

        let mut line = reply;
        line.push('\n');
        let mut w = writer.lock().await;
        if w.write_all(line.as_bytes()).await.is_err() {
            break;
        }
    }

    session.on_disconnect(engine.watches());
}
