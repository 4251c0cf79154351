// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! LRU+TTL cache store (spec §3/§4.2). Backed by the `lru` crate's ordered
//! hash map rather than a hand-rolled intrusive list — see DESIGN.md.

pub mod entry;
pub mod lfu;
pub mod store;

pub use entry::CacheEntry;
pub use store::{GetOutcome, LRUStore};
