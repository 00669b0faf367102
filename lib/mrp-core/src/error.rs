// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::fmt;

/// Error taxonomy for the instance registry and state machines. Mirrors
/// the daemon-wide categories: `ConfigInvalid`, `ResourceExhausted`, and
/// `ProtocolParse` surface to a caller; `TransportFailed`/`Inconsistent`
/// are logged and swallowed by the event router, never propagated up as
/// a hard failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// `add` request referred to a `(bridge, ring_nr)` pair already present.
    DuplicateInstance { bridge_ifindex: u32, ring_nr: u32 },
    /// `add` request was missing a required port, or named an unknown role.
    ConfigInvalid(&'static str),
    /// The registry is already holding `MAX_MRP_INSTANCES`.
    RegistryFull,
    /// `del`/lookup referred to an instance that isn't registered.
    NoSuchInstance { bridge_ifindex: u32, ring_nr: u32 },
    /// A malformed frame reached the codec. Carries the codec's own error.
    ProtocolParse(mrp_proto::Error),
    /// A bridge driver or transport call failed during `add`, where the
    /// caller needs a hard failure rather than the log-and-retry handling
    /// state-machine handlers give the same class of error.
    TransportFailed(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::DuplicateInstance { bridge_ifindex, ring_nr } => write!(
                f,
                "instance already exists for bridge {bridge_ifindex} ring {ring_nr}"
            ),
            Error::ConfigInvalid(msg) => write!(f, "invalid MRP configuration: {msg}"),
            Error::RegistryFull => write!(f, "maximum number of MRP instances already registered"),
            Error::NoSuchInstance { bridge_ifindex, ring_nr } => write!(
                f,
                "no MRP instance for bridge {bridge_ifindex} ring {ring_nr}"
            ),
            Error::ProtocolParse(e) => write!(f, "protocol parse error: {e}"),
            Error::TransportFailed(msg) => write!(f, "driver call failed: {msg}"),
        }
    }
}

impl std::error::Error for Error {}

impl From<mrp_proto::Error> for Error {
    fn from(e: mrp_proto::Error) -> Self {
        Error::ProtocolParse(e)
    }
}

impl From<crate::driver::DriverError> for Error {
    fn from(e: crate::driver::DriverError) -> Self {
        Error::TransportFailed(e.0)
    }
}

pub type Result<T> = std::result::Result<T, Error>;
