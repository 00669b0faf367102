// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Capability interfaces the core depends on but does not implement.
//! Production backends (a netlink bridge driver, an `AF_PACKET` transport)
//! live in the `mrp-bridge`/`mrp-packet` crates; tests use in-memory fakes
//! behind the same traits.

use std::fmt;

use mrp_proto::Frame;

use crate::instance::{InRole, RingRole};
use crate::port::ForwardState;

/// A bridge-driver or packet-transport call failed. This is always a
/// `TransportFailed`-class condition: the caller logs it and lets the
/// relevant periodic timer retry, it never rolls back state.
#[derive(Debug)]
pub struct DriverError(pub String);

impl fmt::Display for DriverError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for DriverError {}

impl From<std::io::Error> for DriverError {
    fn from(e: std::io::Error) -> Self {
        DriverError(e.to_string())
    }
}

pub type DriverResult<T = ()> = std::result::Result<T, DriverError>;

/// Sets STP-visible port state and installs ring/interconnect roles on the
/// bridge. Two production backends exist: one driving the kernel's
/// MRP-aware bridge over rtnetlink, one streaming textual commands to a
/// platform utility. Selected once at startup; never switched at runtime.
pub trait BridgeDriver: Send {
    fn set_port_state(&self, ifindex: u32, state: ForwardState) -> DriverResult;
    fn set_ring_role(&self, bridge_ifindex: u32, ring_nr: u32, role: RingRole) -> DriverResult;
    fn set_in_role(&self, bridge_ifindex: u32, ring_nr: u32, role: InRole) -> DriverResult;
    /// Flushes the FDB of every port named. The caller (the instance's
    /// state machine) is responsible for assembling the primary/secondary/
    /// interconnect set.
    fn flush_fdb(&self, ifindexes: &[u32]) -> DriverResult;
}

/// Sends Ethernet frames on a given interface. `mrp-core` never fragments
/// and never reads directly from this trait: received frames arrive
/// through the event router from whatever owns the socket.
pub trait PacketTransport: Send {
    fn send(&self, ifindex: u32, frame: &Frame) -> DriverResult;
}

/// Optional signal bus. Its absence is not an error: the no-op impl below
/// is wired in whenever no subscriber is configured.
pub trait EventBus: Send {
    fn port_state_changed(&self, ifname: &str, new_state: ForwardState);
}

pub struct NullEventBus;

impl EventBus for NullEventBus {
    fn port_state_changed(&self, _ifname: &str, _new_state: ForwardState) {}
}
