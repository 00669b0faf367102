// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Wire records for the control-plane RPC (§6). This is a local-machine
//! protocol over an abstract `AF_UNIX SOCK_DGRAM` endpoint, not a network
//! wire format: every multi-byte field is plain host-byte-order, so these
//! structs carry native integer types rather than the big-endian
//! wrappers [`mrp_proto`] uses for the on-wire MRP frame.

use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned};

/// Bounds both the registry and the `GET_MRP` result array. Duplicated
/// from `mrp_core::registry::MAX_MRP_INSTANCES` rather than imported:
/// this crate is a peer of `mrp-core`, not a dependent, so the wire
/// contract doesn't pull in state-machine types it has no other use for
/// (see DESIGN.md).
pub const MAX_MRP_INSTANCES: usize = 20;

/// Request command codes, matching the reference daemon's `enum
/// br_mrp_cmd`.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[repr(i32)]
pub enum Cmd {
    AddMrp = 101,
    DelMrp = 102,
    GetMrp = 103,
}

impl Cmd {
    pub fn from_i32(v: i32) -> Option<Self> {
        match v {
            101 => Some(Self::AddMrp),
            102 => Some(Self::DelMrp),
            103 => Some(Self::GetMrp),
            _ => None,
        }
    }
}

/// The fixed 16-byte header prefixing every request and reply datagram.
#[derive(Copy, Clone, Debug, FromBytes, IntoBytes, Unaligned, Immutable, KnownLayout)]
#[repr(C)]
pub struct Header {
    pub cmd: i32,
    pub lin: i32,
    pub lout: i32,
    pub res: i32,
}

impl Header {
    pub const LEN: usize = core::mem::size_of::<Header>();

    pub fn request(cmd: Cmd, body_len: usize, expected_reply_len: usize) -> Self {
        Header { cmd: cmd as i32, lin: body_len as i32, lout: expected_reply_len as i32, res: 0 }
    }

    pub fn reply(cmd: Cmd, res: i32, body_len: usize) -> Self {
        Header { cmd: cmd as i32, lin: 0, lout: body_len as i32, res }
    }
}

/// `ADD_MRP` (101) request record.
#[derive(Copy, Clone, Debug, FromBytes, IntoBytes, Unaligned, Immutable, KnownLayout)]
#[repr(C)]
pub struct AddMrpRequest {
    pub br: u32,
    pub ring_nr: u32,
    pub pport: u32,
    pub sport: u32,
    pub ring_role: i32,
    pub prio: u16,
    pub ring_recv: i32,
    pub react_on_link_change: i32,
    pub in_role: i32,
    pub in_id: u32,
    pub iport: u32,
    pub in_mode: i32,
    pub in_recv: i32,
    pub cfm_instance: u32,
    pub cfm_level: u8,
    pub cfm_mepid: u32,
    pub cfm_peer_mepid: u32,
    pub cfm_maid: [u8; 48],
    pub cfm_dmac: [u8; 6],
}

/// `DEL_MRP` (102) request record.
#[derive(Copy, Clone, Debug, FromBytes, IntoBytes, Unaligned, Immutable, KnownLayout)]
#[repr(C)]
pub struct DelMrpRequest {
    pub br: u32,
    pub ring_nr: u32,
}

/// One row of a `GET_MRP` (103) reply, mirroring `struct mrp_status` from
/// the reference implementation: the operator-facing display fields for
/// one registered instance.
#[derive(Copy, Clone, Debug, Default, FromBytes, IntoBytes, Unaligned, Immutable, KnownLayout)]
#[repr(C)]
pub struct MrpStatus {
    pub br: u32,
    pub ring_nr: u32,
    pub pport: u32,
    pub sport: u32,
    pub mra_support: i32,
    pub ring_role: i32,
    pub ring_state: i32,
    pub prio: u16,
    pub ring_recv: i32,
    pub react_on_link_change: i32,
    pub in_role: i32,
    pub in_state: i32,
    pub iport: u32,
    pub in_id: u32,
    pub in_mode: i32,
    pub in_recv: i32,
}

/// `GET_MRP` (103) reply body: `count` valid entries of `status`, the
/// rest zero-filled (data-model invariant mirrors the reference's fixed
/// `MAX_MRP_INSTANCES`-sized array rather than a variable-length vector,
/// since the whole reply must fit in one datagram).
#[derive(Copy, Clone, Debug, FromBytes, IntoBytes, Unaligned, Immutable, KnownLayout)]
#[repr(C)]
pub struct GetMrpReply {
    pub count: u32,
    pub status: [MrpStatus; MAX_MRP_INSTANCES],
}

impl GetMrpReply {
    pub fn from_entries(entries: &[MrpStatus]) -> Self {
        let mut status = [MrpStatus::default(); MAX_MRP_INSTANCES];
        let n = entries.len().min(MAX_MRP_INSTANCES);
        status[..n].copy_from_slice(&entries[..n]);
        GetMrpReply { count: n as u32, status }
    }

    pub fn entries(&self) -> &[MrpStatus] {
        &self.status[..(self.count as usize).min(MAX_MRP_INSTANCES)]
    }
}
