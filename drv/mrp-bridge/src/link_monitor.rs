// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The link/MAC event source (§6): an `RTMGRP_LINK` subscription parsing
//! `IFLA_OPERSTATE` and `IFLA_ADDRESS` out of unsolicited `RTM_NEWLINK`/
//! `RTM_DELLINK` notifications. Attribute layout mirrors
//! `InterfaceAttributes` from a plain rtnetlink client, adapted to this
//! workspace's raw-`libc` netlink plumbing instead of a dedicated crate.

use std::io;

use mrp_core::port::OperState;
use mrp_proto::MacAddr;
use mrp_core::router::LinkEvent;

use crate::netlink::{iter_attrs, NetlinkSocket};

const IFLA_ADDRESS: u16 = 1;
const IFLA_OPERSTATE: u16 = 16;

/// Matches the kernel's `IF_OPER_*` enum order (`include/uapi/linux/if.h`).
fn operstate_from_code(code: u8) -> OperState {
    match code {
        0 => OperState::Unknown,
        1 => OperState::NotPresent,
        2 => OperState::Down,
        3 => OperState::LowerLayerDown,
        4 => OperState::Testing,
        5 => OperState::Dormant,
        6 => OperState::Up,
        _ => OperState::Unknown,
    }
}

pub struct LinkMonitor {
    nl: NetlinkSocket,
}

impl LinkMonitor {
    pub fn open() -> io::Result<Self> {
        Ok(Self { nl: NetlinkSocket::open(true)? })
    }

    pub fn raw_fd(&self) -> std::os::fd::RawFd {
        self.nl.raw_fd()
    }

    /// Blocks for the next link notification and decodes it into zero or
    /// more [`LinkEvent`]s (a notification can carry both an operstate and
    /// a MAC-address attribute at once).
    pub fn recv_events(&self) -> io::Result<Vec<LinkEvent>> {
        let (msg_type, ifindex, attrs) = self.nl.recv_link_notification()?;
        if msg_type != libc::RTM_NEWLINK && msg_type != libc::RTM_DELLINK {
            return Ok(Vec::new());
        }
        let ifindex = ifindex as u32;
        let mut events = Vec::new();
        for (ty, value) in iter_attrs(&attrs) {
            match ty {
                IFLA_OPERSTATE if !value.is_empty() => {
                    events.push(LinkEvent::OperState { ifindex, state: operstate_from_code(value[0]) });
                }
                IFLA_ADDRESS if value.len() == 6 => {
                    let mut mac = [0u8; 6];
                    mac.copy_from_slice(value);
                    events.push(LinkEvent::MacChanged { ifindex, mac: MacAddr::new(mac) });
                }
                _ => {}
            }
        }
        if msg_type == libc::RTM_DELLINK && events.is_empty() {
            events.push(LinkEvent::OperState { ifindex, state: OperState::NotPresent });
        }
        Ok(events)
    }
}
