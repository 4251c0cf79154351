// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::sync::{
    Arc,
    atomic::{AtomicU16, AtomicU64, Ordering},
};

use anyhow::{Context, Result};
use shardcache::{
    cfg::config::{Config, NodeConfig, ProxyConfig, RuntimeConfig},
    cfg::logger::LoggerConfig,
    clock::SystemClock,
    node::Node,
    proxy::Proxy,
};
use tokio::{
    io::{AsyncBufReadExt, AsyncWriteExt, BufReader},
    net::TcpStream,
    time::{Duration, sleep},
};
use tokio_util::sync::CancellationToken;

/// Every test picks a disjoint port range so the harness never reuses a port
/// still draining in `TIME_WAIT` from a previous test in the same process.
static NEXT_PORT: AtomicU16 = AtomicU16::new(19_100);
static NEXT_TMP: AtomicU64 = AtomicU64::new(0);

pub fn next_port() -> u16 {
    NEXT_PORT.fetch_add(1, Ordering::Relaxed)
}

/// A scratch AOF path unique to this test process run, so parallel `cargo
/// test` invocations (or repeat runs) never collide on the same file.
pub fn temp_aof_path(tag: &str) -> String {
    let n = NEXT_TMP.fetch_add(1, Ordering::Relaxed);
    std::env::temp_dir()
        .join(format!("shardcache-it-{tag}-{n}.aof"))
        .to_string_lossy()
        .into_owned()
}

fn node_config(port: u16, aof_path: String, cache_budget_bytes: u64) -> Config {
    Config {
        node: NodeConfig { port, cache_budget_bytes, flush_interval_ms: 50, aof_path },
        proxy: ProxyConfig::default(),
        runtime: RuntimeConfig::default(),
        logger: LoggerConfig::default(),
    }
}

fn proxy_config(port: u16, backends: Vec<String>) -> Config {
    Config {
        node: NodeConfig::default(),
        proxy: ProxyConfig { port, backends, replicas: 3 },
        runtime: RuntimeConfig { connection_timeout_ms: 500 },
        logger: LoggerConfig::default(),
    }
}

/// A running cache node plus the handle needed to shut it down cleanly at
/// the end of a test.
pub struct RunningNode {
    pub port: u16,
    cancel: CancellationToken,
    handle: tokio::task::JoinHandle<()>,
}

impl RunningNode {
    pub async fn stop(self) {
        self.cancel.cancel();
        let _ = self.handle.await;
    }
}

/// Boots a cache node on a fresh port/AOF file and waits until its listener
/// accepts connections before returning.
pub async fn spawn_node(tag: &str, cache_budget_bytes: u64) -> Result<RunningNode> {
    let port = next_port();
    let cfg = node_config(port, temp_aof_path(tag), cache_budget_bytes);
    let node = Node::bootstrap(cfg, Arc::new(SystemClock)).await?;
    let cancel = CancellationToken::new();
    let run_cancel = cancel.clone();
    let handle = tokio::spawn(async move {
        let _ = node.run(run_cancel).await;
    });
    wait_for_port(port).await?;
    Ok(RunningNode { port, cancel, handle })
}

/// A running sharding proxy plus its shutdown handle.
pub struct RunningProxy {
    pub port: u16,
    cancel: CancellationToken,
    handle: tokio::task::JoinHandle<()>,
}

impl RunningProxy {
    pub async fn stop(self) {
        self.cancel.cancel();
        let _ = self.handle.await;
    }
}

/// Boots a proxy in front of `backends` (already-dialable `host:port`
/// strings) and waits until its listener accepts connections.
pub async fn spawn_proxy(backends: Vec<String>) -> Result<RunningProxy> {
    let port = next_port();
    let cfg = proxy_config(port, backends);
    let proxy = Proxy::new(cfg).await;
    let cancel = CancellationToken::new();
    let run_cancel = cancel.clone();
    let handle = tokio::spawn(async move {
        let _ = proxy.run(run_cancel).await;
    });
    wait_for_port(port).await?;
    Ok(RunningProxy { port, cancel, handle })
}

async fn wait_for_port(port: u16) -> Result<()> {
    for _ in 0..100 {
        if TcpStream::connect(("127.0.0.1", port)).await.is_ok() {
            return Ok(());
        }
        sleep(Duration::from_millis(20)).await;
    }
    anyhow::bail!("nothing listening on 127.0.0.1:{port} after waiting")
}

/// A minimal line-oriented client for the wire protocol, used to drive
/// scenarios the same way a real client would: write `CMD ARG\n`, read one
/// reply line back.
pub struct WireClient {
    reader: BufReader<tokio::net::tcp::OwnedReadHalf>,
    writer: tokio::net::tcp::OwnedWriteHalf,
}

impl WireClient {
    pub async fn connect(port: u16) -> Result<Self> {
        let stream = TcpStream::connect(("127.0.0.1", port)).await.context("connect")?;
        let (read_half, writer) = stream.into_split();
        Ok(Self { reader: BufReader::new(read_half), writer })
    }

    pub async fn send(&mut self, line: &str) -> Result<String> {
        self.writer.write_all(line.as_bytes()).await.context("write request")?;
        self.writer.write_all(b"\n").await.context("write newline")?;
        let mut reply = String::new();
        self.reader.read_line(&mut reply).await.context("read reply")?;
        Ok(reply.trim_end_matches('\n').to_string())
    }
}
