// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! One of the three collaborator interfaces the core depends on (the other
//! two are `cfg::config::Config` and the `tracing` log sink). Kept as a
//! trait rather than calling `SystemTime`/`Instant` directly so tests can
//! supply a deterministic clock for TTL scenarios (spec invariants 4 and 5).

use std::time::{SystemTime, UNIX_EPOCH};

/// A monotonic-enough millisecond clock. Implementations only need to be
/// non-decreasing for the lifetime of one process; the store never compares
/// timestamps across a restart.
pub trait Clock: Send + Sync + 'static {
    fn now_ms(&self) -> i64;
}

/// The real wall clock, used by both binaries.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> i64 {
        let dur = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default();
        dur.as_millis() as i64
    }
}
