// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Test-only fakes for [`crate::driver`], local to this crate because
//! the real backends (`drv-mrp-bridge`, `drv-mrp-packet`) depend on
//! `mrp-core` and can't be pulled back in as a dev-dependency. Mirrors
//! the shape of those crates' own fakes so state-machine tests read the
//! same way integration tests on the real backends would.

#![cfg(test)]

use std::sync::Mutex;

use mrp_proto::{Frame, MacAddr};

use crate::driver::{BridgeDriver, DriverResult, PacketTransport};
use crate::instance::{CfmAssoc, InMode, InRole, Instance, InstanceKey, RingRole};
use crate::port::{ForwardState, Port, PortRole};
use crate::timers::RecoveryClass;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Call {
    SetPortState { ifindex: u32, state: ForwardState },
    SetRingRole { bridge_ifindex: u32, ring_nr: u32, role: RingRole },
    SetInRole { bridge_ifindex: u32, ring_nr: u32, role: InRole },
    FlushFdb { ifindexes: Vec<u32> },
}

#[derive(Default)]
pub struct RecordingBridgeDriver {
    calls: Mutex<Vec<Call>>,
}

impl RecordingBridgeDriver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().expect("recording bridge driver mutex poisoned").clone()
    }

    pub fn take(&self) -> Vec<Call> {
        std::mem::take(&mut *self.calls.lock().expect("recording bridge driver mutex poisoned"))
    }
}

impl BridgeDriver for RecordingBridgeDriver {
    fn set_port_state(&self, ifindex: u32, state: ForwardState) -> DriverResult {
        self.calls.lock().unwrap().push(Call::SetPortState { ifindex, state });
        Ok(())
    }

    fn set_ring_role(&self, bridge_ifindex: u32, ring_nr: u32, role: RingRole) -> DriverResult {
        self.calls.lock().unwrap().push(Call::SetRingRole { bridge_ifindex, ring_nr, role });
        Ok(())
    }

    fn set_in_role(&self, bridge_ifindex: u32, ring_nr: u32, role: InRole) -> DriverResult {
        self.calls.lock().unwrap().push(Call::SetInRole { bridge_ifindex, ring_nr, role });
        Ok(())
    }

    fn flush_fdb(&self, ifindexes: &[u32]) -> DriverResult {
        self.calls.lock().unwrap().push(Call::FlushFdb { ifindexes: ifindexes.to_vec() });
        Ok(())
    }
}

#[derive(Default)]
pub struct RecordingTransport {
    sent: Mutex<Vec<(u32, Frame)>>,
}

impl RecordingTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> Vec<(u32, Frame)> {
        self.sent.lock().expect("recording transport mutex poisoned").clone()
    }

    pub fn take(&self) -> Vec<(u32, Frame)> {
        std::mem::take(&mut *self.sent.lock().expect("recording transport mutex poisoned"))
    }
}

impl PacketTransport for RecordingTransport {
    fn send(&self, ifindex: u32, frame: &Frame) -> DriverResult {
        self.sent.lock().unwrap().push((ifindex, frame.clone()));
        Ok(())
    }
}

pub fn mac(n: u8) -> MacAddr {
    MacAddr::new([0x02, 0x00, 0x00, 0x00, 0x00, n])
}

/// A ready-to-drive MRM instance: both ring ports present, domain all-0xff,
/// 500ms recovery class, matching §8's scenario preamble.
pub fn mrm_instance(prio: u16) -> Instance {
    Instance::new(
        InstanceKey { bridge_ifindex: 1, ring_nr: 0 },
        mac(1),
        [0xff; 16],
        Port::new(10, "eth0", mac(2), PortRole::Primary),
        Port::new(11, "eth1", mac(3), PortRole::Secondary),
        None,
        RingRole::Mrm,
        prio,
        false,
        InRole::Disabled,
        InMode::Rc,
        false,
        RecoveryClass::Ms500,
        None::<CfmAssoc>,
    )
}

pub fn mra_instance(prio: u16) -> Instance {
    Instance::new(
        InstanceKey { bridge_ifindex: 1, ring_nr: 0 },
        mac(1),
        [0xff; 16],
        Port::new(10, "eth0", mac(2), PortRole::Primary),
        Port::new(11, "eth1", mac(3), PortRole::Secondary),
        None,
        RingRole::Mra,
        prio,
        false,
        InRole::Disabled,
        InMode::Rc,
        true,
        RecoveryClass::Ms500,
        None::<CfmAssoc>,
    )
}

pub fn mrc_instance() -> Instance {
    Instance::new(
        InstanceKey { bridge_ifindex: 1, ring_nr: 0 },
        mac(1),
        [0xff; 16],
        Port::new(10, "eth0", mac(2), PortRole::Primary),
        Port::new(11, "eth1", mac(3), PortRole::Secondary),
        None,
        RingRole::Mrc,
        Instance::DEFAULT_PRIO,
        false,
        InRole::Disabled,
        InMode::Rc,
        false,
        RecoveryClass::Ms500,
        None::<CfmAssoc>,
    )
}

/// An MIM/MIC instance with an interconnect port in addition to the ring
/// pair, for §4.6 tests.
pub fn interconnect_instance(ring_role: RingRole, in_role: InRole) -> Instance {
    Instance::new(
        InstanceKey { bridge_ifindex: 1, ring_nr: 0 },
        mac(1),
        [0xff; 16],
        Port::new(10, "eth0", mac(2), PortRole::Primary),
        Port::new(11, "eth1", mac(3), PortRole::Secondary),
        Some(Port::new(12, "eth2", mac(4), PortRole::Interconnect)),
        ring_role,
        Instance::DEFAULT_PRIO,
        false,
        in_role,
        InMode::Rc,
        false,
        RecoveryClass::Ms500,
        None::<CfmAssoc>,
    )
}
