// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Per-client command loop (spec §4.5). A keyless transaction command
//! (`MULTI`/`DISCARD`) that carries a genuinely empty ARG is still
//! dispatched once, using the sticky key for routing, rather than silently
//! never reaching a backend — every one of these commands is owed a reply
//! (see DESIGN.md's open-question log for the reasoning).

use std::{net::SocketAddr, sync::Arc, time::Duration};

use tokio::{
    io::{AsyncReadExt, AsyncWriteExt, BufReader},
    net::TcpStream,
    sync::Mutex,
    time::timeout,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::registry::ProxyState;
use crate::{
    error::CacheError,
    wire::{ParsedCommand, Parser},
};

/// Commands the proxy routes using the connection's sticky key instead of
/// parsing a key out of their own argument (spec §4.5 step 1).
fn is_keyless(cmd: &str) -> bool {
    matches!(cmd, "MULTI" | "EXEC" | "DISCARD")
}

/// One forwarding unit: either a real parsed arg, or the synthetic empty
/// arg substituted for a truly argless `MULTI`/`DISCARD` so it still gets
/// dispatched (see module docs).
fn dispatch_units(parsed: &ParsedCommand) -> Vec<String> {
    if parsed.args.is_empty() { vec![String::new()] } else { parsed.args.clone() }
}

/// The routing key for one `(cmd, arg)` pair: the sticky key for keyless
/// transaction commands, otherwise the prefix of `arg` up to the first
/// `:` (or the whole arg if there is none).
fn routing_key(cmd: &str, arg: &str, sticky: Option<String>) -> Option<String> {
    if is_keyless(cmd) {
        sticky
    } else {
        Some(arg.split_once(':').map(|(k, _)| k).unwrap_or(arg).to_string())
    }
}

async fn write_line(writer: &Mutex<tokio::net::tcp::OwnedWriteHalf>, body: &str) {
    let mut line = String::with_capacity(body.len() + 1);
    line.push_str(body);
    line.push('\n');
    let mut w = writer.lock().await;
    if let Err(err) = w.write_all(line.as_bytes()).await {
        debug!(error = %err, "failed to write reply to proxy client");
    }
}

/// Writes `CMD ARG\n` (or `CMD\n` when `arg` is empty, matching the wire
/// grammar's "ARG may be empty") to the backend and copies its reply back
/// to the client byte-by-byte until a `\n` or EOF. On EOF the backend is
/// evicted from the ring/registry and a `ServerUnreachable` reply is sent
/// instead (spec §4.5 step 4 / §7).
async fn forward_one(
    state: &ProxyState,
    node: &str,
    cmd: &str,
    arg: &str,
    timeout_ms: u64,
    client_writer: &Mutex<tokio::net::tcp::OwnedWriteHalf>,
) {
    let Some(backend) = state.get_backend(node) else {
        write_line(client_writer, &CacheError::ServerUnreachable.to_string()).await;
        return;
    };

    let mut request = String::with_capacity(cmd.len() + 1 + arg.len() + 1);
    request.push_str(cmd);
    if !arg.is_empty() {
        request.push(' ');
        request.push_str(arg);
    }
    request.push('\n');

    let budget = Duration::from_millis(timeout_ms);
    {
        let mut w = backend.writer.lock().await;
        if timeout(budget, w.write_all(request.as_bytes())).await.is_err() {
            drop(w);
            state.remove_backend(node).await;
            write_line(client_writer, &CacheError::ServerUnreachable.to_string()).await;
            return;
        }
    }

    let mut byte = [0u8; 1];
    loop {
        let read = {
            let mut r = backend.reader.lock().await;
            timeout(budget, r.read(&mut byte)).await
        };
        let n = match read {
            Ok(Ok(n)) => n,
            Ok(Err(_)) | Err(_) => {
                state.remove_backend(node).await;
                write_line(client_writer, &CacheError::ServerUnreachable.to_string()).await;
                return;
            },
        };
        if n == 0 {
            state.remove_backend(node).await;
            write_line(client_writer, &CacheError::ServerUnreachable.to_string()).await;
            return;
        }

        let mut w = client_writer.lock().await;
        if w.write_all(&byte).await.is_err() {
            return;
        }
        if byte[0] == b'\n' {
            return;
        }
    }
}

async fn handle_one_command(
    peer: SocketAddr,
    state: &ProxyState,
    parsed: ParsedCommand,
    timeout_ms: u64,
    client_writer: &Mutex<tokio::net::tcp::OwnedWriteHalf>,
) {
    for arg in dispatch_units(&parsed) {
        let sticky = state.sticky_key(&peer);
        let Some(key) = routing_key(&parsed.cmd, &arg, sticky) else {
            write_line(client_writer, &CacheError::EmptyKeyNoServer.to_string()).await;
            continue;
        };
        state.set_sticky(peer, key.clone());

        let Some(node) = state.route(&key).await else {
            write_line(client_writer, &CacheError::EmptyKeyNoServer.to_string()).await;
            continue;
        };

        forward_one(state, &node, &parsed.cmd, &arg, timeout_ms, client_writer).await;
    }
}

/// Drives one accepted client connection until it closes or `cancel`
/// fires between commands.
pub async fn handle_client(
    stream: TcpStream,
    peer: SocketAddr,
    state: Arc<ProxyState>,
    timeout_ms: u64,
    cancel: CancellationToken,
) {
    let (read_half, write_half) = stream.into_split();
    let mut reader = BufReader::new(read_half);
    let writer = Mutex::new(write_half);
    let mut parser = Parser::new();

    loop {
        let parsed = tokio::select! {
            _ = cancel.cancelled() => break,
            parsed = parser.parse_one(&mut reader) => parsed,
        };

        match parsed {
            Ok(None) => break,
            Ok(Some(cmd)) if cmd.is_error() => {
                write_line(&writer, &CacheError::WrongFormat.to_string()).await;
            },
            Ok(Some(cmd)) => {
                handle_one_command(peer, &state, cmd, timeout_ms, &writer).await;
            },
            Err(err) => {
                warn!(%peer, error = %err, "proxy client connection read failed");
                break;
            },
        }
    }

    state.forget_client(&peer);
}
