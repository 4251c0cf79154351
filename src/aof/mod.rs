// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Append-only command journal (spec §3/§4.4). Writes are buffered in
//! memory and flushed to disk by a periodic background task rather than on
//! every command. Replay at startup reuses the wire FSM that parses live
//! traffic, so the journal format and the network format never drift
//! apart.

use std::{path::Path, sync::Mutex as StdMutex};

use tokio::{
    fs::{File, OpenOptions},
    io::{AsyncReadExt, AsyncWriteExt, BufReader},
    sync::Mutex as AsyncMutex,
};
use tracing::{info, warn};

use crate::wire::{ParsedCommand, Parser};

/// In-memory buffer plus the open file handle used to flush it.
///
/// `append` is synchronous and only ever touches `buffer` (a plain
/// [`std::sync::Mutex`]): callers in [`crate::engine`] call it while still
/// holding the store lock, so it must never await (spec §5's store-then-AOF
/// lock order).
pub struct AofLog {
    buffer: StdMutex<Vec<u8>>,
    file: AsyncMutex<File>,
}

impl AofLog {
    /// Opens `path` for appending, creating it if absent.
    pub async fn open(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .await?;
        Ok(Self {
            buffer: StdMutex::new(Vec::new()),
            file: AsyncMutex::new(file),
        })
    }

    /// Appends one command's wire-format encoding to the in-memory buffer.
    /// Does not touch disk; see [`Self::flush`].
    pub fn append(&self, cmd: &str, args: &[String]) {
        let mut line = String::with_capacity(cmd.len() + 1 + args.iter().map(String::len).sum::<usize>() + args.len());
        line.push_str(cmd);
        if !args.is_empty() {
            line.push(' ');
            line.push_str(&args.join(" "));
        }
        line.push('\n');

        let mut buffer = self.buffer.lock().expect("aof buffer poisoned");
        buffer.extend_from_slice(line.as_bytes());
    }

    /// Drains the buffer and writes+syncs it to disk. A no-op if nothing
    /// was appended since the last flush.
    pub async fn flush(&self) -> std::io::Result<()> {
        let pending = {
            let mut buffer = self.buffer.lock().expect("aof buffer poisoned");
            if buffer.is_empty() {
                return Ok(());
            }
            std::mem::take(&mut *buffer)
        };

        let mut file = self.file.lock().await;
        file.write_all(&pending).await?;
        file.flush().await?;
        file.sync_data().await
    }

    /// Runs `flush` every `interval_ms`, until `cancel` fires. Intended to
    /// be spawned as its own task by [`crate::node::Node::run`].
    pub async fn flush_task(
        &self,
        interval_ms: u64,
        cancel: tokio_util::sync::CancellationToken,
    ) {
        let mut ticker = tokio::time::interval(std::time::Duration::from_millis(interval_ms));
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Err(err) = self.flush().await {
                        warn!(error = %err, "aof flush failed");
                    }
                }
                _ = cancel.cancelled() => {
                    if let Err(err) = self.flush().await {
                        warn!(error = %err, "final aof flush failed");
                    }
                    return;
                }
            }
        }
    }
}

/// Parses every command recorded at `path` using the same FSM that parses
/// live connections. Returns them in file order for the caller (the
/// command engine) to apply directly, bypassing AOF re-append.
///
/// A record that fails to parse is logged and skipped rather than aborting
/// the whole replay: a partially-written final record from an unclean
/// shutdown should not prevent recovery of everything before it.
pub async fn replay(path: impl AsRef<Path>) -> std::io::Result<Vec<ParsedCommand>> {
    let path = path.as_ref();
    let file = match File::open(path).await {
        Ok(file) => file,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            info!(path = %path.display(), "no aof file to replay");
            return Ok(Vec::new());
        },
        Err(err) => return Err(err),
    };

    let mut reader = BufReader::new(file);
    let mut parser = Parser::new();
    let mut commands = Vec::new();

    loop {
        match parser.parse_one(&mut reader).await? {
            Some(cmd) if cmd.is_error() => {
                warn!("skipping malformed aof record");
            },
            Some(cmd) => commands.push(cmd),
            None => break,
        }
    }

    info!(path = %path.display(), count = commands.len(), "replayed aof");
    Ok(commands)
}
