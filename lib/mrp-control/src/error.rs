// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::fmt;

/// Framing failures on the control-plane RPC. All `ProtocolParse`-class:
/// a malformed datagram is rejected, never a panic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// Fewer bytes than the fixed header requires.
    DatagramTooShort { have: usize, need: usize },
    /// The header's `lin`/`lout` claimed a body size the datagram doesn't have.
    BodyLengthMismatch { claimed: i32, have: usize },
    /// `cmd` did not match any known request.
    UnknownCommand(i32),
    /// A request body's length didn't match the fixed record size its
    /// `cmd` requires.
    WrongRecordSize { cmd: i32, expected: usize, got: usize },
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::DatagramTooShort { have, need } => {
                write!(f, "control datagram too short: have {have} bytes, need at least {need}")
            }
            Error::BodyLengthMismatch { claimed, have } => write!(
                f,
                "control datagram body length mismatch: header claims {claimed}, have {have}"
            ),
            Error::UnknownCommand(cmd) => write!(f, "unknown control command {cmd}"),
            Error::WrongRecordSize { cmd, expected, got } => write!(
                f,
                "command {cmd} body has size {got}, expected {expected}"
            ),
        }
    }
}

impl std::error::Error for Error {}

pub type Result<T> = std::result::Result<T, Error>;
