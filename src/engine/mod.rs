// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Command-execution engine: the store, the AOF log, and the watch
//! registry behind one dispatch entry point used identically by live
//! connections and AOF replay (spec §4.2–§4.4/§4.6).

use std::sync::{
    Arc,
    atomic::{AtomicU64, Ordering},
};

use bytes::Bytes;
use tokio::sync::Mutex;

use crate::{
    aof::AofLog,
    cache::LRUStore,
    clock::Clock,
    error::CacheError,
    session::ClientSession,
    watch::{SessionId, WatchRegistry},
};

/// Mutating commands are recorded to the AOF and trigger a watch
/// notification; `GET`/`SELECT` never are (spec §4.4's recorded-command
/// list).
fn is_mutating(cmd: &str) -> bool {
    matches!(cmd, "SET" | "DEL" | "EXPR")
}

fn parse_key(args: &[String]) -> Result<String, CacheError> {
    args.first().cloned().ok_or(CacheError::WrongCommand)
}

/// Splits `k:v` into `(k, v)`. Both sides must be non-empty.
fn parse_kv(args: &[String]) -> Result<(String, String), CacheError> {
    let arg = args.first().ok_or(CacheError::WrongCommand)?;
    let (k, v) = arg.split_once(':').ok_or(CacheError::WrongCommand)?;
    if k.is_empty() || v.is_empty() {
        return Err(CacheError::WrongCommand);
    }
    Ok((k.to_string(), v.to_string()))
}

/// Splits `k:ms` into `(k, ms)`, parsing `ms` as base-10 `i64`.
fn parse_k_ms(args: &[String]) -> Result<(String, i64), CacheError> {
    let arg = args.first().ok_or(CacheError::WrongCommand)?;
    let (k, ms) = arg.split_once(':').ok_or(CacheError::WrongCommand)?;
    if k.is_empty() {
        return Err(CacheError::WrongCommand);
    }
    let ms: i64 = ms.parse().map_err(|_| CacheError::WrongCommand)?;
    Ok((k.to_string(), ms))
}

/// Assigns each accepted connection a process-unique [`SessionId`].
#[derive(Default)]
pub struct SessionIdAllocator(AtomicU64);

impl SessionIdAllocator {
    pub fn next(&self) -> SessionId {
        self.0.fetch_add(1, Ordering::Relaxed)
    }
}

/// Ties the LRU+TTL store, the AOF log, and the watch registry together
/// behind one coarse store mutex (spec §4.2's stated rationale: throughput
/// here is bounded by network and disk, not lock contention).
pub struct CacheEngine {
    store: Mutex<LRUStore>,
    aof: AofLog,
    watches: WatchRegistry,
    clock: Arc<dyn Clock>,
    pub session_ids: SessionIdAllocator,
}

impl CacheEngine {
    pub fn new(max_bytes: usize, aof: AofLog, clock: Arc<dyn Clock>) -> Self {
        Self {
            store: Mutex::new(LRUStore::new(max_bytes)),
            aof,
            watches: WatchRegistry::new(),
            clock,
            session_ids: SessionIdAllocator::default(),
        }
    }

    pub fn aof(&self) -> &AofLog {
        &self.aof
    }

    /// Exposes the watch registry so a connection handler can unregister
    /// its session's watches on disconnect.
    pub fn watches(&self) -> &WatchRegistry {
        &self.watches
    }

    /// Applies every command recorded in the AOF through the normal
    /// dispatch path with AOF re-append disabled (spec §4.4's replay
    /// path). Uses one throwaway session, since the commands that
    /// reference session state (MULTI/EXEC/...) were themselves recorded
    /// in file order and replay deterministically against it.
    pub async fn replay(&self, commands: Vec<crate::wire::ParsedCommand>) {
        let mut session = ClientSession::new(self.session_ids.next());
        for command in commands {
            if let Err(err) = self
                .dispatch(&mut session, &command.cmd, command.args, false)
                .await
            {
                tracing::warn!(cmd = %command.cmd, error = %err, "aof replay stopped on command error");
                break;
            }
        }
    }

    /// Executes one parsed command for `session`. `record_aof` is `false`
    /// only during replay. Returns the reply line's body (without the
    /// trailing `\n`, which the connection handler adds).
    pub async fn dispatch(
        &self,
        session: &mut ClientSession,
        cmd: &str,
        args: Vec<String>,
        record_aof: bool,
    ) -> Result<String, CacheError> {
        let cmd = cmd.to_ascii_uppercase();

        match cmd.as_str() {
            "MULTI" => {
                session.begin_multi()?;
                if record_aof {
                    self.aof.append("MULTI", &args);
                }
                Ok("DONE".to_string())
            },
            "DISCARD" => {
                session.discard(&self.watches);
                if record_aof {
                    self.aof.append("DISCARD", &args);
                }
                Ok("DONE".to_string())
            },
            "WATCH" => {
                let key = parse_key(&args)?;
                session.watch_cmd(&key, &self.watches)?;
                if record_aof {
                    self.aof.append("WATCH", &args);
                }
                Ok("DONE".to_string())
            },
            "UNWATCH" => {
                let key = parse_key(&args)?;
                session.unwatch_cmd(&key, &self.watches)?;
                if record_aof {
                    self.aof.append("UNWATCH", &args);
                }
                Ok("DONE".to_string())
            },
            "EXEC" => {
                if record_aof {
                    self.aof.append("EXEC", &args);
                }
                let queued = session.exec(&self.watches)?;
                let mut reply = "DONE".to_string();
                for queued_cmd in queued {
                    // Already recorded to the AOF and notified to watchers
                    // at queue time (spec §4.3's "immediately notify").
                    reply = self
                        .execute_immediate(session, &queued_cmd.cmd, &queued_cmd.args, false)
                        .await?;
                }
                Ok(reply)
            },
            "GET" | "SET" | "DEL" | "EXPR" | "SELECT" => {
                if session.in_multi() {
                    session.queue(cmd.clone(), args.clone());
                    if is_mutating(&cmd) {
                        self.notify_and_record_queued(&cmd, &args, record_aof)?;
                    }
                    Ok("QUEUED".to_string())
                } else {
                    self.execute_immediate(session, &cmd, &args, record_aof).await
                }
            },
            _ => Err(CacheError::WrongCommand),
        }
    }

    /// Queue-time side effect for a mutating command queued inside MULTI:
    /// record it to the AOF and notify the watch registry immediately,
    /// without touching the store yet (the store mutation happens later,
    /// at EXEC).
    fn notify_and_record_queued(
        &self,
        cmd: &str,
        args: &[String],
        record_aof: bool,
    ) -> Result<String, CacheError> {
        let key = match cmd {
            "SET" => parse_kv(args)?.0,
            "EXPR" => parse_k_ms(args)?.0,
            "DEL" => parse_key(args)?,
            _ => unreachable!("is_mutating only admits SET/DEL/EXPR"),
        };
        if record_aof {
            self.aof.append(cmd, args);
        }
        self.watches.notify_modified(&key);
        Ok(key)
    }

    /// Executes GET/SET/DEL/EXPR/SELECT against the store right now
    /// (either because the session wasn't in a transaction, or because
    /// EXEC is draining its queue).
    async fn execute_immediate(
        &self,
        session: &mut ClientSession,
        cmd: &str,
        args: &[String],
        record_aof: bool,
    ) -> Result<String, CacheError> {
        match cmd {
            "GET" => {
                let key = parse_key(args)?;
                let now = self.clock.now_ms();
                let mut store = self.store.lock().await;
                let outcome = store.get(&key, now);
                if let Some(evicted_key) = &outcome.evicted {
                    if record_aof {
                        self.aof.append("DEL", std::slice::from_ref(evicted_key));
                    }
                }
                drop(store);
                outcome
                    .value
                    .map(|v| String::from_utf8_lossy(&v).into_owned())
                    .ok_or(CacheError::Nil)
            },
            "SET" => {
                let (key, value) = parse_kv(args)?;
                let now = self.clock.now_ms();
                let mut store = self.store.lock().await;
                let evicted = store.add(&key, Bytes::from(value.into_bytes()), now);
                if record_aof {
                    for evicted_key in &evicted {
                        self.aof.append("DEL", std::slice::from_ref(evicted_key));
                    }
                    self.aof.append("SET", args);
                }
                drop(store);
                self.watches.notify_modified(&key);
                Ok("DONE".to_string())
            },
            "DEL" => {
                let key = parse_key(args)?;
                let mut store = self.store.lock().await;
                store.del(&key);
                if record_aof {
                    self.aof.append("DEL", args);
                }
                drop(store);
                self.watches.notify_modified(&key);
                Ok("DONE".to_string())
            },
            "EXPR" => {
                let (key, ms) = parse_k_ms(args)?;
                let mut store = self.store.lock().await;
                store.set_expire(&key, ms);
                if record_aof {
                    self.aof.append("EXPR", args);
                }
                drop(store);
                self.watches.notify_modified(&key);
                Ok("DONE".to_string())
            },
            "SELECT" => {
                let name = args.first().cloned().unwrap_or_default();
                session.select(name);
                Ok("DONE".to_string())
            },
            other => unreachable!("execute_immediate called with non-dispatchable command {other}"),
        }
    }
}
