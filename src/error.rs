// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! The single wire-visible error type. Every variant's `Display` is exactly
//! the one-line string a client receives; internal plumbing (config/IO
//! failures during startup) keeps using `anyhow` as the rest of the crate
//! does and never flows through here.

use thiserror::Error;

/// Error kinds a client can observe on the wire, per the reply grammar: a
/// single line, no trailing data.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CacheError {
    /// Arity or syntax failure while parsing a recognized command.
    #[error("wrong command")]
    WrongCommand,

    /// EXEC aborted by CAS, MULTI nested inside MULTI, or GET miss.
    #[error("NIL")]
    Nil,

    /// The proxy could not route: empty ring, or no sticky key remembered.
    #[error("EMPTY KEY: Cannot find server")]
    EmptyKeyNoServer,

    /// A backend connection closed mid-forward; the backend has already
    /// been evicted from the ring by the time this is returned.
    #[error("Server cannot reach")]
    ServerUnreachable,

    /// The proxy failed to parse a request from the client.
    #[error("Wrong format")]
    WrongFormat,

    /// The backend failed to parse a request forwarded by the proxy.
    #[error("FAILED")]
    Failed,
}
