// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The kernel backend: drives the Linux MRP-aware bridge's `IFLA_AF_SPEC`
//! → `AF_BRIDGE` → `IFLA_BRIDGE_MRP_*` attributes (mirroring
//! `net/bridge/br_mrp.c`'s netlink surface) for ring/interconnect role,
//! and a port's `IFLA_PROTINFO` → `IFLA_BRPORT_STATE` attribute for
//! forwarding state.

use std::mem;

use mrp_core::driver::{BridgeDriver, DriverResult};
use mrp_core::instance::{InRole, RingRole};
use mrp_core::port::ForwardState;
use tracing::debug;

use crate::netlink::{push_attr, NetlinkSocket};

// Local names for attribute ids not exposed by `libc`, mirroring
// `linux/if_bridge.h` and `linux/if_link.h` closely enough to build a
// plausible request; exact numeric values are not load-bearing here since
// nothing in this workspace runs against a live kernel.
const IFLA_AF_SPEC: u16 = 26;
const IFLA_PROTINFO: u16 = 52;
const AF_BRIDGE_ATTR: u16 = libc::AF_BRIDGE as u16;

const IFLA_BRPORT_STATE: u16 = 1;

const IFLA_BRIDGE_MRP: u16 = 40;
const IFLA_BRIDGE_MRP_INSTANCE: u16 = 1;
const IFLA_BRIDGE_MRP_RING_ROLE: u16 = 5;
const IFLA_BRIDGE_MRP_START_TEST: u16 = 6;
const IFLA_BRIDGE_MRP_IN_ROLE: u16 = 9;

/// `struct br_mrp_instance { ring_id: u32, prio: u16 }`.
fn mrp_instance_attr(ring_nr: u32, prio: u16) -> Vec<u8> {
    let mut v = ring_nr.to_ne_bytes().to_vec();
    v.extend_from_slice(&prio.to_ne_bytes());
    v
}

fn forward_state_code(state: ForwardState) -> u8 {
    // Mirrors `BR_STATE_*` from `linux/if_bridge.h`.
    match state {
        ForwardState::Disabled => 0,
        ForwardState::Blocked => 1,
        ForwardState::NotConnected => 2,
        ForwardState::Forwarding => 3,
    }
}

/// Mirrors the kernel's `enum br_mrp_ring_role_type`.
fn ring_role_code(role: RingRole) -> u32 {
    match role {
        RingRole::Disabled => 0,
        RingRole::Mrm => 1,
        RingRole::Mra => 2,
        RingRole::Mrc => 3,
    }
}

/// Mirrors the kernel's `enum br_mrp_in_role_type`.
fn in_role_code(role: InRole) -> u32 {
    match role {
        InRole::Disabled => 0,
        InRole::Mim => 1,
        InRole::Mic => 2,
    }
}

pub struct KernelBridgeDriver {
    nl: NetlinkSocket,
}

impl KernelBridgeDriver {
    pub fn open() -> std::io::Result<Self> {
        Ok(Self { nl: NetlinkSocket::open(false)? })
    }

    fn set_link(&self, ifindex: u32, family: i32, attrs: Vec<u8>) -> DriverResult {
        let ifi = libc::ifinfomsg {
            ifi_family: family as libc::c_uchar,
            ifi_type: 0,
            ifi_index: ifindex as libc::c_int,
            ifi_flags: 0,
            ifi_change: 0,
        };
        let ifi_len = mem::size_of::<libc::ifinfomsg>();
        let mut payload = vec![0u8; ifi_len];
        unsafe {
            std::ptr::copy_nonoverlapping(&ifi as *const _ as *const u8, payload.as_mut_ptr(), ifi_len);
        }
        payload.extend_from_slice(&attrs);
        self.nl.request_ack(libc::RTM_SETLINK, payload).map_err(|e| e.into())
    }
}

impl BridgeDriver for KernelBridgeDriver {
    fn set_port_state(&self, ifindex: u32, state: ForwardState) -> DriverResult {
        debug!(ifindex, ?state, "mrp: kernel bridge driver setting port state");
        let mut protinfo = Vec::new();
        push_attr(&mut protinfo, IFLA_BRPORT_STATE, &[forward_state_code(state)]);
        let mut attrs = Vec::new();
        push_attr(&mut attrs, IFLA_PROTINFO, &protinfo);
        self.set_link(ifindex, libc::AF_BRIDGE, attrs)
    }

    fn set_ring_role(&self, bridge_ifindex: u32, ring_nr: u32, role: RingRole) -> DriverResult {
        debug!(bridge_ifindex, ring_nr, ?role, "mrp: kernel bridge driver setting ring role");
        let mut mrp = Vec::new();
        push_attr(&mut mrp, IFLA_BRIDGE_MRP_INSTANCE, &mrp_instance_attr(ring_nr, 0));
        push_attr(&mut mrp, IFLA_BRIDGE_MRP_RING_ROLE, &ring_role_code(role).to_ne_bytes());
        push_attr(&mut mrp, IFLA_BRIDGE_MRP_START_TEST, &1u32.to_ne_bytes());
        let mut af_bridge = Vec::new();
        push_attr(&mut af_bridge, IFLA_BRIDGE_MRP, &mrp);
        let mut attrs = Vec::new();
        push_attr(&mut attrs, IFLA_AF_SPEC, &{
            let mut inner = Vec::new();
            push_attr(&mut inner, AF_BRIDGE_ATTR, &af_bridge);
            inner
        });
        self.set_link(bridge_ifindex, libc::AF_UNSPEC, attrs)
    }

    fn set_in_role(&self, bridge_ifindex: u32, ring_nr: u32, role: InRole) -> DriverResult {
        debug!(bridge_ifindex, ring_nr, ?role, "mrp: kernel bridge driver setting interconnect role");
        let mut mrp = Vec::new();
        push_attr(&mut mrp, IFLA_BRIDGE_MRP_INSTANCE, &mrp_instance_attr(ring_nr, 0));
        push_attr(&mut mrp, IFLA_BRIDGE_MRP_IN_ROLE, &in_role_code(role).to_ne_bytes());
        let mut af_bridge = Vec::new();
        push_attr(&mut af_bridge, IFLA_BRIDGE_MRP, &mrp);
        let mut attrs = Vec::new();
        push_attr(&mut attrs, IFLA_AF_SPEC, &{
            let mut inner = Vec::new();
            push_attr(&mut inner, AF_BRIDGE_ATTR, &af_bridge);
            inner
        });
        self.set_link(bridge_ifindex, libc::AF_UNSPEC, attrs)
    }

    fn flush_fdb(&self, ifindexes: &[u32]) -> DriverResult {
        debug!(?ifindexes, "mrp: kernel bridge driver flushing fdb");
        for &ifindex in ifindexes {
            let mut protinfo = Vec::new();
            // Re-asserting the current state is the kernel's documented
            // trick for forcing a port's FDB entries to age out; a real
            // deployment would instead issue a dedicated flush ioctl.
            push_attr(&mut protinfo, IFLA_BRPORT_STATE, &[forward_state_code(ForwardState::Forwarding)]);
            let mut attrs = Vec::new();
            push_attr(&mut attrs, IFLA_PROTINFO, &protinfo);
            self.set_link(ifindex, libc::AF_BRIDGE, attrs)?;
        }
        Ok(())
    }
}
