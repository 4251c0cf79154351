// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use bytes::Bytes;
use lru::LruCache;

use super::entry::{CacheEntry, entry_size};

/// Outcome of a `get`: the value (if any hit), and a key evicted as a side
/// effect of lazy TTL expiry — the caller (the engine) appends a `DEL`
/// record to the AOF for it while still holding the store lock.
pub struct GetOutcome {
    pub value: Option<Bytes>,
    pub evicted: Option<String>,
}

/// Strict LRU-with-TTL store over a fixed byte budget (spec §3/§4.2).
/// Ordering and O(1) move-to-front come from the `lru` crate's linked hash
/// map; capacity is tracked separately in bytes, not entry count, so the
/// crate's own count-based capacity is set unbounded and never consulted.
pub struct LRUStore {
    cache: LruCache<String, CacheEntry>,
    used_bytes: usize,
    max_bytes: usize,
}

impl LRUStore {
    pub fn new(max_bytes: usize) -> Self {
        Self {
            // Unbounded by count; the byte budget below is the only limit
            // this store enforces.
            cache: LruCache::unbounded(),
            used_bytes: 0,
            max_bytes,
        }
    }

    pub fn used_bytes(&self) -> usize {
        self.used_bytes
    }

    pub fn max_bytes(&self) -> usize {
        self.max_bytes
    }

    pub fn len(&self) -> usize {
        self.cache.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }

    /// Returns a copy of the value, evicting the entry first if it has
    /// expired (spec §4.2). The recency order is only updated on a true
    /// hit, matching "Otherwise move to front."
    pub fn get(&mut self, key: &str, now_ms: i64) -> GetOutcome {
        let expired = match self.cache.peek(key) {
            None => return GetOutcome { value: None, evicted: None },
            Some(entry) => entry.is_expired_at(now_ms),
        };

        if expired {
            let removed = self.cache.pop(key);
            if let Some(entry) = removed {
                self.used_bytes -= entry_size(key, &entry.value);
            }
            return GetOutcome {
                value: None,
                evicted: Some(key.to_string()),
            };
        }

        self.cache.promote(key);
        let value = self.cache.peek(key).map(|e| e.value.clone());
        GetOutcome { value, evicted: None }
    }

    /// Inserts or replaces `key`, evicting LRU-tail entries under capacity
    /// pressure first. Always resets `born_ms`/clears `expire_ms` per spec
    /// §4.2 ("born_ms <- clock_ms(), expire_ms <- 0"), for both the insert
    /// and the replace path. Returns the keys evicted for capacity, in
    /// eviction order, so the caller can append their `DEL` records.
    ///
    /// A single value larger than `max_bytes` is still accepted after
    /// evicting everything else, the same way a real LRU admits an
    /// oversized entry rather than refusing the write; callers are expected
    /// to size `max_bytes` so that no individual entry exceeds it.
    pub fn add(&mut self, key: &str, value: Bytes, now_ms: i64) -> Vec<String> {
        let new_size = entry_size(key, &value);
        let mut evicted = Vec::new();

        while self.used_bytes + new_size > self.max_bytes {
            let Some((evicted_key, evicted_entry)) = self.cache.pop_lru() else {
                break;
            };
            self.used_bytes -= entry_size(&evicted_key, &evicted_entry.value);
            evicted.push(evicted_key);
        }

        match self.cache.peek(key) {
            Some(old) => {
                let old_size = entry_size(key, &old.value);
                self.used_bytes = self.used_bytes + new_size - old_size;
            },
            None => self.used_bytes += new_size,
        }

        self.cache.put(key.to_string(), CacheEntry::new(value, now_ms));
        evicted
    }

    /// Removes `key` unconditionally. Returns whether it was present.
    pub fn del(&mut self, key: &str) -> bool {
        match self.cache.pop(key) {
            Some(entry) => {
                self.used_bytes -= entry_size(key, &entry.value);
                true
            },
            None => false,
        }
    }

    /// Overwrites the TTL for `key` without touching its recency position.
    /// Returns whether the key was present.
    pub fn set_expire(&mut self, key: &str, expire_ms: i64) -> bool {
        match self.cache.peek_mut(key) {
            Some(entry) => {
                entry.expire_ms = expire_ms;
                true
            },
            None => false,
        }
    }
}
