// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Line-oriented wire protocol: a streaming byte-at-a-time parser shared by
//! the live socket path and the AOF replay path (DESIGN NOTES §9 — "the FSM
//! consumes a lazy byte sequence", fed by either a socket reader or a file
//! reader through one `ByteSource` trait).

pub mod fsm;

pub use fsm::{ByteSource, ParsedCommand, Parser};
