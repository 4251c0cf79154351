// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Per-connection session state and the MULTI/EXEC/DISCARD/WATCH/UNWATCH
//! transaction manager (spec §3/§4.3). Every error this FSM can produce is
//! `CacheError::Nil`, exactly as the transition table in spec §4.3
//! specifies — `WrongCommand` only ever comes from arity/parse failures in
//! [`crate::engine`].

use std::{
    collections::{HashSet, VecDeque},
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
};

use crate::{
    error::CacheError,
    watch::{SessionId, WatchRegistry},
};

/// One queued command awaiting EXEC.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueuedCommand {
    pub cmd: String,
    pub args: Vec<String>,
}

/// State carried for the lifetime of one client connection. `SELECT` is
/// accepted and remembered but never changes dispatch behavior (spec §1
/// Non-goals: multi-db beyond SELECT-as-no-op).
pub struct ClientSession {
    pub id: SessionId,
    pub group_name: String,
    in_multi: bool,
    cas_dirty: Arc<AtomicBool>,
    queued: VecDeque<QueuedCommand>,
    watched_keys: HashSet<String>,
}

impl ClientSession {
    pub fn new(id: SessionId) -> Self {
        Self {
            id,
            group_name: String::new(),
            in_multi: false,
            cas_dirty: Arc::new(AtomicBool::new(false)),
            queued: VecDeque::new(),
            watched_keys: HashSet::new(),
        }
    }

    pub fn in_multi(&self) -> bool {
        self.in_multi
    }

    /// `SELECT name`: always succeeds, in or out of a transaction.
    pub fn select(&mut self, name: String) {
        self.group_name = name;
    }

    /// `MULTI`. NORMAL -> IN_MULTI; IN_MULTI -> `Nil` (nested MULTI
    /// forbidden).
    pub fn begin_multi(&mut self) -> Result<(), CacheError> {
        if self.in_multi {
            return Err(CacheError::Nil);
        }
        self.in_multi = true;
        self.queued.clear();
        Ok(())
    }

    /// Queues one command while inside MULTI. Caller has already verified
    /// `in_multi()` and that `cmd` is queueable (MULTI/EXEC/DISCARD are
    /// never queued, per spec §4.3).
    pub fn queue(&mut self, cmd: String, args: Vec<String>) {
        self.queued.push_back(QueuedCommand { cmd, args });
    }

    /// `EXEC`. NORMAL -> `Nil`. IN_MULTI: `Nil` if a watched key was
    /// touched since WATCH (CAS abort), otherwise the queued commands in
    /// insertion order. Either way, transaction state and watches are
    /// cleared on return.
    pub fn exec(&mut self, registry: &WatchRegistry) -> Result<Vec<QueuedCommand>, CacheError> {
        if !self.in_multi {
            return Err(CacheError::Nil);
        }
        let aborted = self.cas_dirty.swap(false, Ordering::SeqCst);
        let queued: Vec<_> = std::mem::take(&mut self.queued).into_iter().collect();
        self.end_transaction(registry);
        if aborted {
            return Err(CacheError::Nil);
        }
        Ok(queued)
    }

    /// `DISCARD`. Always replies `DONE`; clears the queue and watches only
    /// if a transaction was actually open.
    pub fn discard(&mut self, registry: &WatchRegistry) {
        if self.in_multi {
            self.end_transaction(registry);
        }
    }

    fn end_transaction(&mut self, registry: &WatchRegistry) {
        self.in_multi = false;
        self.queued.clear();
        self.clear_watches(registry);
    }

    /// `WATCH key`. NORMAL only; `Nil` inside a transaction.
    pub fn watch_cmd(&mut self, key: &str, registry: &WatchRegistry) -> Result<(), CacheError> {
        if self.in_multi {
            return Err(CacheError::Nil);
        }
        registry.add_watch_key(key, self.id, self.cas_dirty.clone());
        self.watched_keys.insert(key.to_string());
        Ok(())
    }

    /// `UNWATCH key`. NORMAL only; `Nil` inside a transaction.
    pub fn unwatch_cmd(&mut self, key: &str, registry: &WatchRegistry) -> Result<(), CacheError> {
        if self.in_multi {
            return Err(CacheError::Nil);
        }
        registry.del_watch_key(key, self.id);
        self.watched_keys.remove(key);
        Ok(())
    }

    /// Clears every key this session watches, unconditionally. Used by
    /// EXEC/DISCARD completion and connection teardown.
    fn clear_watches(&mut self, registry: &WatchRegistry) {
        registry.forget_session(self.id, self.watched_keys.iter().map(String::as_str));
        self.watched_keys.clear();
        self.cas_dirty.store(false, Ordering::SeqCst);
    }

    /// Called when the connection closes, so the registry doesn't keep a
    /// dangling handle to a session that no longer exists.
    pub fn on_disconnect(&mut self, registry: &WatchRegistry) {
        self.clear_watches(registry);
    }
}
