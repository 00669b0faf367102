// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use mrp_proto::MacAddr;

/// Which of an instance's (up to three) ports this is.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum PortRole {
    Primary,
    Secondary,
    Interconnect,
}

/// STP-visible forwarding state the bridge driver is told to apply.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ForwardState {
    Disabled,
    Blocked,
    Forwarding,
    NotConnected,
}

/// Link operstate as reported by the link event source. `Unknown` is
/// treated as `Up` at the point of ingestion (see the link event handler),
/// matching the reference driver's `if_get_link` fallback.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum OperState {
    NotPresent,
    Down,
    LowerLayerDown,
    Testing,
    Dormant,
    Unknown,
    Up,
}

impl OperState {
    /// Collapses the kernel's six-way operstate into the two states the
    /// MRP state machines react to. `Unknown` is treated as up per the
    /// reference implementation's behavior for interfaces that never
    /// report a definite state (common for software bridges).
    pub fn is_up(self) -> bool {
        matches!(self, OperState::Up | OperState::Unknown)
    }
}

/// One of an instance's ring/interconnect ports.
#[derive(Clone, Debug)]
pub struct Port {
    pub ifindex: u32,
    pub ifname: String,
    pub mac: MacAddr,
    pub role: PortRole,
    pub state: ForwardState,
    pub operstate: OperState,
}

impl Port {
    pub fn new(ifindex: u32, ifname: impl Into<String>, mac: MacAddr, role: PortRole) -> Self {
        Self {
            ifindex,
            ifname: ifname.into(),
            mac,
            role,
            state: ForwardState::Blocked,
            operstate: OperState::Down,
        }
    }

    pub fn is_up(&self) -> bool {
        self.operstate.is_up()
    }
}
