// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Translates the control-plane wire records (`mrp-control`) into
//! `mrp-core` calls and back. This is where the two crates' independent
//! numbering schemes meet: the wire's plain `i32` role codes are decoded
//! here against the kernel's own `br_mrp_ring_role_type`/
//! `br_mrp_in_role_type` enums, the same codes the kernel bridge driver
//! backend speaks on the wire to netlink (see `drv-mrp-bridge`).

use mrp_control::{
    decode_record, decode_request, encode_empty_reply, encode_reply, AddMrpRequest, Cmd,
    DelMrpRequest, GetMrpReply, Header, MrpStatus,
};
use mrp_core::instance::{CfmAssoc, InMode, InRole, Instance, InstanceKey, RingRole};
use mrp_core::port::ForwardState;
use mrp_core::router::{AddRequest, EventRouter};
use mrp_core::timers::RecoveryClass;
use mrp_proto::MacAddr;
use tracing::warn;

use crate::iface;

fn ring_role_from_wire(code: i32) -> Option<RingRole> {
    match code {
        0 => Some(RingRole::Disabled),
        1 => Some(RingRole::Mrm),
        2 => Some(RingRole::Mra),
        3 => Some(RingRole::Mrc),
        _ => None,
    }
}

fn ring_role_to_wire(role: RingRole) -> i32 {
    match role {
        RingRole::Disabled => 0,
        RingRole::Mrm => 1,
        RingRole::Mra => 2,
        RingRole::Mrc => 3,
    }
}

fn in_role_from_wire(code: i32) -> Option<InRole> {
    match code {
        0 => Some(InRole::Disabled),
        1 => Some(InRole::Mim),
        2 => Some(InRole::Mic),
        _ => None,
    }
}

fn in_role_to_wire(role: InRole) -> i32 {
    match role {
        InRole::Disabled => 0,
        InRole::Mim => 1,
        InRole::Mic => 2,
    }
}

fn in_mode_from_wire(code: i32) -> InMode {
    if code == 1 {
        InMode::Lc
    } else {
        InMode::Rc
    }
}

fn forward_state_to_wire(state: ForwardState) -> i32 {
    match state {
        ForwardState::Disabled => 0,
        ForwardState::Blocked => 1,
        ForwardState::NotConnected => 2,
        ForwardState::Forwarding => 3,
    }
}

/// Resolves the wire's ifindex-only `ADD_MRP` request into the full
/// `AddRequest` the core needs, looking up interface names and MAC
/// addresses along the way (§6's note that the wire record is
/// ifindex-only; the core wants names for logging and some bridge-driver
/// backends).
pub fn add_request_from_wire(req: &AddMrpRequest) -> anyhow::Result<AddRequest> {
    let ring_role = ring_role_from_wire(req.ring_role)
        .ok_or_else(|| anyhow::anyhow!("unknown ring_role code {}", req.ring_role))?;
    let in_role = in_role_from_wire(req.in_role)
        .ok_or_else(|| anyhow::anyhow!("unknown in_role code {}", req.in_role))?;

    let p_ifname = iface::ifname_of(req.pport)?;
    let s_ifname = iface::ifname_of(req.sport)?;
    let p_mac = iface::mac_of(&p_ifname)?;
    let s_mac = iface::mac_of(&s_ifname)?;
    let bridge_ifname = iface::ifname_of(req.br)?;
    let bridge_mac = iface::mac_of(&bridge_ifname)?;

    let (iport, i_ifname, i_mac) = if req.iport != 0 {
        let ifname = iface::ifname_of(req.iport)?;
        let mac = iface::mac_of(&ifname)?;
        (Some(req.iport), Some(ifname), Some(mac))
    } else {
        (None, None, None)
    };

    let in_mode = in_mode_from_wire(req.in_mode);
    let cfm = if in_mode == InMode::Lc {
        Some(CfmAssoc {
            cfm_instance: req.cfm_instance,
            cfm_level: req.cfm_level,
            cfm_mepid: req.cfm_mepid,
            cfm_peer_mepid: req.cfm_peer_mepid,
            cfm_maid: req.cfm_maid,
            cfm_dmac: MacAddr::new(req.cfm_dmac),
            peer_defect: false,
        })
    } else {
        None
    };

    Ok(AddRequest {
        bridge_ifindex: req.br,
        ring_nr: req.ring_nr,
        pport: req.pport,
        sport: req.sport,
        p_ifname,
        s_ifname,
        p_mac,
        s_mac,
        bridge_mac,
        // Not carried on the control wire (see DESIGN.md); rings that
        // need to distinguish domains beyond the default one currently
        // have no way to set this via `mrpctl`.
        domain: [0; 16],
        ring_role,
        prio: req.prio,
        react_on_link_change: req.react_on_link_change != 0,
        mra_support: ring_role == RingRole::Mra,
        in_role,
        in_mode,
        iport,
        i_ifname,
        i_mac,
        cfm,
        // Also absent from the wire record; §4.2's least-stringent class
        // is the safe default until `mrpctl` grows a flag for it.
        recovery_class: RecoveryClass::Ms500,
    })
}

pub fn del_request_from_wire(req: &DelMrpRequest) -> InstanceKey {
    InstanceKey { bridge_ifindex: req.br, ring_nr: req.ring_nr }
}

pub fn status_from_instance(inst: &Instance) -> MrpStatus {
    MrpStatus {
        br: inst.key.bridge_ifindex,
        ring_nr: inst.key.ring_nr,
        pport: inst.p.ifindex,
        sport: inst.s.ifindex,
        mra_support: inst.mra_support as i32,
        ring_role: ring_role_to_wire(inst.ring_role),
        ring_state: forward_state_to_wire(inst.s.state),
        prio: inst.prio,
        ring_recv: 0,
        react_on_link_change: inst.react_on_link_change as i32,
        in_role: in_role_to_wire(inst.in_role),
        in_state: inst.i.as_ref().map(|i| forward_state_to_wire(i.state)).unwrap_or(0),
        iport: inst.i.as_ref().map(|i| i.ifindex).unwrap_or(0),
        in_id: 0,
        in_mode: if inst.in_mode == InMode::Lc { 1 } else { 0 },
        in_recv: 0,
    }
}

/// Replies with `res = -1` (matching the reference daemon's convention
/// for "some lower error occurred") and logs the actual cause, since the
/// wire header has no room for a textual message.
pub fn log_and_fail(cmd: Cmd, err: &dyn std::fmt::Display) -> i32 {
    warn!(?cmd, error = %err, "mrp: control request failed");
    -1
}

pub fn header_cmd(header: &Header) -> Option<Cmd> {
    Cmd::from_i32(header.cmd)
}

/// Decodes one control-plane datagram, applies it to `router`, and encodes
/// the reply -- the whole of the daemon's control-plane behavior, kept free
/// of `Server`'s other fields so it can run against a bare [`EventRouter`]
/// in tests.
pub fn dispatch(router: &mut EventRouter, datagram: &[u8]) -> Option<Vec<u8>> {
    let (header, body) = match decode_request(datagram) {
        Ok(v) => v,
        Err(e) => {
            warn!(error = %e, "mrp: malformed control datagram");
            return None;
        }
    };
    let Some(cmd) = header_cmd(&header) else {
        warn!(cmd = header.cmd, "mrp: unknown control command");
        return None;
    };

    match cmd {
        Cmd::AddMrp => {
            let res = decode_record(cmd, body)
                .map_err(anyhow::Error::from)
                .and_then(|req| add_request_from_wire(&req))
                .and_then(|req| router.add_instance(req).map_err(anyhow::Error::from));
            let res_code = match res {
                Ok(()) => 0,
                Err(e) => log_and_fail(cmd, &e),
            };
            Some(encode_empty_reply(cmd, res_code))
        }
        Cmd::DelMrp => {
            let res: anyhow::Result<()> = decode_record(cmd, body)
                .map_err(anyhow::Error::from)
                .and_then(|req| {
                    let key = del_request_from_wire(&req);
                    router.del_instance(key).map_err(anyhow::Error::from)
                });
            let res_code = match res {
                Ok(()) => 0,
                Err(e) => log_and_fail(cmd, &e),
            };
            Some(encode_empty_reply(cmd, res_code))
        }
        Cmd::GetMrp => {
            let statuses: Vec<_> = router
                .registry
                .iter()
                .map(|(_, h)| {
                    let inst = h.lock().expect("instance mutex poisoned");
                    status_from_instance(&inst)
                })
                .collect();
            let reply = GetMrpReply::from_entries(&statuses);
            Some(encode_reply(cmd, 0, &reply))
        }
    }
}
