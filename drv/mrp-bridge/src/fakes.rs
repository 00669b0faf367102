// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! A host-side stand-in for [`BridgeDriver`] (§9): records every call
//! instead of touching netlink or a subprocess.

use std::sync::Mutex;

use mrp_core::driver::{BridgeDriver, DriverResult};
use mrp_core::instance::{InRole, RingRole};
use mrp_core::port::ForwardState;

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
}

impl BridgeDriver for RecordingBridgeDriver {
    fn set_port_state(&self, ifindex: u32, state: ForwardState) -> DriverResult {
        self.calls.lock().expect("recording bridge driver mutex poisoned").push(Call::SetPortState {
            ifindex,
            state,
        });
        Ok(())
    }

    fn set_ring_role(&self, bridge_ifindex: u32, ring_nr: u32, role: RingRole) -> DriverResult {
        self.calls.lock().expect("recording bridge driver mutex poisoned").push(Call::SetRingRole {
            bridge_ifindex,
            ring_nr,
            role,
        });
        Ok(())
    }

    fn set_in_role(&self, bridge_ifindex: u32, ring_nr: u32, role: InRole) -> DriverResult {
        self.calls.lock().expect("recording bridge driver mutex poisoned").push(Call::SetInRole {
            bridge_ifindex,
            ring_nr,
            role,
        });
        Ok(())
    }

    fn flush_fdb(&self, ifindexes: &[u32]) -> DriverResult {
        self.calls
            .lock()
            .expect("recording bridge driver mutex poisoned")
            .push(Call::FlushFdb { ifindexes: ifindexes.to_vec() });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_calls_in_order() {
        let d = RecordingBridgeDriver::new();
        d.set_port_state(3, ForwardState::Blocked).unwrap();
        d.flush_fdb(&[3, 4]).unwrap();
        let calls = d.calls();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0], Call::SetPortState { ifindex: 3, state: ForwardState::Blocked });
        assert_eq!(calls[1], Call::FlushFdb { ifindexes: vec![3, 4] });
    }
}
