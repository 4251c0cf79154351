// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Core of a small distributed in-memory key/value cache: a per-node
//! command-execution engine (parser, LRU+TTL store, transactions, AOF) and a
//! consistent-hashing sharding proxy that fronts a set of cache nodes.

pub mod aof;
pub mod cache;
pub mod cfg;
pub mod clock;
pub mod engine;
pub mod error;
pub mod node;
pub mod proxy;
pub mod session;
pub mod watch;
pub mod wire;
