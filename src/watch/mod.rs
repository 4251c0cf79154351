// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Process-wide watch registry (spec §3/§4.6). DESIGN NOTES §9 resolves the
//! Go source's session-pointer cycle and address-keyed bug: the registry
//! never owns or borrows a `ClientSession`. It holds, per watched key, a
//! `SessionId` plus a cheap `Arc<AtomicBool>` handle to that session's own
//! `cas_dirty` flag — enough to flip the flag from another task without a
//! shared-mutable reference to the session itself, and light enough that a
//! session can deregister deterministically on close (spec §3's
//! "ClientSession remembers which keys it watched").

use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

use dashmap::DashMap;

/// Stable per-connection identifier, assigned once at accept time.
pub type SessionId = u64;

/// `key -> (session_id -> cas_dirty flag)`. The inner map is a `DashMap`
/// too: distinct keys never contend, and within one key, add/remove/notify
/// only ever touch that key's shard (spec §5 "fine-grained... held only
/// during add/remove/notify of one key's set").
#[derive(Default)]
pub struct WatchRegistry {
    table: DashMap<String, DashMap<SessionId, Arc<AtomicBool>>>,
}

impl WatchRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `session_id` as watching `key`. Idempotent: watching the
    /// same key twice from the same session is a no-op beyond refreshing
    /// the flag handle.
    pub fn add_watch_key(&self, key: &str, session_id: SessionId, cas_dirty: Arc<AtomicBool>) {
        self.table
            .entry(key.to_string())
            .or_default()
            .insert(session_id, cas_dirty);
    }

    /// Removes `session_id` from `key`'s watch set, if present.
    pub fn del_watch_key(&self, key: &str, session_id: SessionId) {
        if let Some(set) = self.table.get(key) {
            set.remove(&session_id);
        }
    }

    /// Flips `cas_dirty` on every session currently watching `key`. Called
    /// on every SET/DEL/EXPR, whether issued directly or queued inside a
    /// transaction (spec §4.3's "notify the watch registry... immediately").
    pub fn notify_modified(&self, key: &str) {
        if let Some(set) = self.table.get(key) {
            for entry in set.iter() {
                entry.value().store(true, Ordering::SeqCst);
            }
        }
    }

    /// Removes `session_id` from every key in `watched_keys`. Called when a
    /// connection closes, or after EXEC/DISCARD clears a session's watch
    /// list.
    pub fn forget_session<'a>(
        &self,
        session_id: SessionId,
        watched_keys: impl IntoIterator<Item = &'a str>,
    ) {
        for key in watched_keys {
            self.del_watch_key(key, session_id);
        }
    }
}
