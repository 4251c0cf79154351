// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! LFU is reserved as an alternate eviction policy (spec §1 Non-goals) but
//! is not required for conformance. Kept as a stub selection point so
//! `PolicyType` has a reserved-but-unimplemented variant rather than
//! silently pretending only LRU ever existed.

use crate::error::CacheError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolicyType {
    Lru,
    Lfu,
}

/// Placeholder for a future LFU store. Any attempt to actually select it at
/// runtime is a command-level error, not a panic.
pub struct LfuStore;

impl LfuStore {
    pub fn unavailable() -> CacheError {
        CacheError::WrongCommand
    }
}
