// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::fmt;

/// Codec failures. Every variant here is a `ProtocolParse`-class condition
/// in the taxonomy used by the daemon above this crate: malformed input,
/// never a programmer error, never a panic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// Fewer bytes than the minimum Ethernet+MRP header requires.
    FrameTooShort { have: usize, need: usize },
    /// Payload version field was not `0x0001`.
    BadVersion(u16),
    /// A TLV's `length` field claims more bytes than remain in the buffer.
    TruncatedTlv { tlv_type: u8, length: u8, remaining: usize },
    /// A TLV of a known type carried a `length` that doesn't match its
    /// fixed body size.
    BadTlvLength { tlv_type: u8, expected: u8, got: u8 },
    /// A nested `Option`/`SubOption`/`SubTLV` had a length that matches
    /// neither `TestMgrNack` nor `TestPropagate`.
    BadSubTlvLength { sub_type: u8, got: u8 },
    /// An EtherType other than `0x88E3`.
    WrongEtherType(u16),
    /// The destination MAC did not match any of the four well-known MRP
    /// addresses.
    UnknownDestination([u8; 6]),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::FrameTooShort { have, need } => {
                write!(f, "frame too short: have {have} bytes, need at least {need}")
            }
            Error::BadVersion(v) => write!(f, "unsupported MRP version 0x{v:04x}"),
            Error::TruncatedTlv { tlv_type, length, remaining } => write!(
                f,
                "TLV type {tlv_type} claims length {length} but only {remaining} bytes remain"
            ),
            Error::BadTlvLength { tlv_type, expected, got } => write!(
                f,
                "TLV type {tlv_type} has length {got}, expected {expected}"
            ),
            Error::BadSubTlvLength { sub_type, got } => {
                write!(f, "sub-TLV type {sub_type} has unrecognized length {got}")
            }
            Error::WrongEtherType(et) => write!(f, "unexpected EtherType 0x{et:04x}"),
            Error::UnknownDestination(mac) => write!(
                f,
                "destination {:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x} is not a known MRP address",
                mac[0], mac[1], mac[2], mac[3], mac[4], mac[5]
            ),
        }
    }
}

impl std::error::Error for Error {}

pub type Result<T> = std::result::Result<T, Error>;
