// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::io;

use tokio::io::{AsyncRead, AsyncReadExt};

const MAX_CMD_LEN: usize = 8;
const MAX_ARG_LEN: usize = 256;

/// A lazy byte sequence. One method, fed by either a socket reader or a file
/// reader — the parser below never knows which.
pub trait ByteSource {
    /// Returns `Ok(None)` on a clean end of stream (no bytes at all were
    /// available), `Ok(Some(b))` for the next byte, or an I/O error.
    async fn next_byte(&mut self) -> io::Result<Option<u8>>;
}

/// Any buffered async reader is a valid byte source — a TCP socket during
/// live traffic, or the AOF file during replay. One impl, two call sites.
impl<R: AsyncRead + Unpin> ByteSource for R {
    async fn next_byte(&mut self) -> io::Result<Option<u8>> {
        let mut buf = [0u8; 1];
        let n = self.read(&mut buf).await?;
        if n == 0 { Ok(None) } else { Ok(Some(buf[0])) }
    }
}


/// One parsed request: a command token and its space-separated argument
/// list, split once the raw ARG text is fully read; `:`-separated
/// key/value payloads inside a single arg are left intact for the command
/// layer to split further.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedCommand {
    pub cmd: String,
    pub args: Vec<String>,
}

impl ParsedCommand {
    pub const ERROR_CMD: &'static str = "ERROR";

    fn error() -> Self {
        Self {
            cmd: Self::ERROR_CMD.to_string(),
            args: Vec::new(),
        }
    }

    pub fn is_error(&self) -> bool {
        self.cmd == Self::ERROR_CMD
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ParserState {
    Cmd,
    Arg,
    End,
    Err,
}

/// Streaming state machine for the `CMD<SP>ARG\n` wire grammar (spec §4.1).
/// One instance is reused across an entire connection or replay pass;
/// `parse_one` resets its own scratch buffers after each record.
pub struct Parser {
    state: ParserState,
    cmd_buf: Vec<u8>,
    arg_buf: Vec<u8>,
}

impl Default for Parser {
    fn default() -> Self {
        Self::new()
    }
}

impl Parser {
    pub fn new() -> Self {
        Self {
            state: ParserState::Cmd,
            cmd_buf: Vec::with_capacity(MAX_CMD_LEN),
            arg_buf: Vec::with_capacity(MAX_ARG_LEN),
        }
    }

    /// Drives the FSM off `src` until one full record has been parsed.
    /// Returns `Ok(None)` if the source hit clean EOF before any bytes of a
    /// new record arrived (the caller should stop reading); otherwise
    /// returns the parsed command, which is `ParsedCommand::ERROR_CMD` if an
    /// overlong command/arg token forced an error transition.
    pub async fn parse_one(
        &mut self,
        src: &mut impl ByteSource,
    ) -> io::Result<Option<ParsedCommand>> {
        self.cmd_buf.clear();
        self.arg_buf.clear();
        self.state = ParserState::Cmd;

        let mut saw_any_byte = false;

        loop {
            let Some(byte) = src.next_byte().await? else {
                return if saw_any_byte {
                    Ok(Some(ParsedCommand::error()))
                } else {
                    Ok(None)
                };
            };
            saw_any_byte = true;

            match self.state {
                ParserState::Cmd => {
                    if byte == b' ' {
                        self.state = ParserState::Arg;
                    } else if byte == b'\n' {
                        self.state = ParserState::End;
                    } else if self.cmd_buf.len() >= MAX_CMD_LEN {
                        self.state = ParserState::Err;
                    } else {
                        self.cmd_buf.push(byte);
                    }
                },
                ParserState::Arg => {
                    if byte == b'\n' {
                        self.state = ParserState::End;
                    } else if self.arg_buf.len() >= MAX_ARG_LEN {
                        self.state = ParserState::Err;
                    } else {
                        self.arg_buf.push(byte);
                    }
                },
                ParserState::End | ParserState::Err => unreachable!(
                    "End/Err are terminal and handled below without consuming another byte"
                ),
            }

            match self.state {
                ParserState::End => {
                    let cmd = String::from_utf8_lossy(&self.cmd_buf).to_uppercase();
                    let args: Vec<String> = if self.arg_buf.is_empty() {
                        Vec::new()
                    } else {
                        String::from_utf8_lossy(&self.arg_buf)
                            .split(' ')
                            .map(str::to_string)
                            .collect()
                    };
                    return Ok(Some(ParsedCommand { cmd, args }));
                },
                ParserState::Err => {
                    // Discard until the next newline, per spec: the ERR
                    // state's only transition is back to CMD on '\n'.
                    loop {
                        match src.next_byte().await? {
                            Some(b'\n') | None => break,
                            Some(_) => {},
                        }
                    }
                    return Ok(Some(ParsedCommand::error()));
                },
                _ => {},
            }
        }
    }
}
