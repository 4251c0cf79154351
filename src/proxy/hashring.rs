// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Consistent-hash ring (spec §3/§4.5): each real node contributes
//! `replicas` virtual positions at `crc32(decimal(i) + node_name)`, and
//! lookup is a binary search for the smallest ring position `>=` the key's
//! hash, wrapping to index 0. CRC-32/ISO-HDLC (see DESIGN.md for why this
//! variant).

use crc::{CRC_32_ISO_HDLC, Crc};

const CRC32_IEEE: Crc<u32> = Crc::<u32>::new(&CRC_32_ISO_HDLC);

fn checksum(bytes: &[u8]) -> u32 {
    CRC32_IEEE.checksum(bytes)
}

/// Sparse set of virtual-node positions on a circular `u32` keyspace, plus
/// the lookup table back to the owning real node name.
pub struct HashRing {
    replicas: u32,
    /// Kept sorted by `.0` at all times; `(position, node_name)`.
    ring: Vec<(u32, String)>,
}

impl HashRing {
    pub fn new(replicas: u32) -> Self {
        Self { replicas, ring: Vec::new() }
    }

    /// Adds `replicas` virtual positions for `node`. A no-op for an empty
    /// name.
    pub fn add_node(&mut self, node: &str) {
        if node.is_empty() {
            return;
        }
        for i in 0..self.replicas {
            let position = checksum(format!("{i}{node}").as_bytes());
            match self.ring.binary_search_by_key(&position, |(p, _)| *p) {
                Ok(idx) => self.ring[idx].1 = node.to_string(),
                Err(idx) => self.ring.insert(idx, (position, node.to_string())),
            }
        }
    }

    /// Removes every virtual position belonging to `node`.
    pub fn remove_node(&mut self, node: &str) {
        if node.is_empty() {
            return;
        }
        self.ring.retain(|(_, name)| name != node);
    }

    /// Finds the node owning `key`'s position: smallest ring position `>=
    /// crc32(key)`, wrapping to index 0 (spec §3). Returns `None` for an
    /// empty ring or an empty key — the distinguished "no node" result.
    pub fn find_node(&self, key: &str) -> Option<String> {
        if key.is_empty() || self.ring.is_empty() {
            return None;
        }
        let hash = checksum(key.as_bytes());
        let idx = match self.ring.binary_search_by_key(&hash, |(p, _)| *p) {
            Ok(idx) => idx,
            Err(idx) => idx % self.ring.len(),
        };
        Some(self.ring[idx].1.clone())
    }

    pub fn is_empty(&self) -> bool {
        self.ring.is_empty()
    }
}
