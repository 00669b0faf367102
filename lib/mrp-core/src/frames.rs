// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Builders for outgoing MRP PDUs, shared by every state machine. Each
//! function sends on one port and allocates the instance's next sequence
//! id, matching the reference implementation's per-port-per-send counter.

use mrp_proto::{Frame, MrpDestination, PortRole as WirePortRole, SubTlv, Tlv};

use crate::driver::{DriverResult, PacketTransport};
use crate::instance::Instance;
use crate::port::PortRole;

fn wire_role(role: PortRole) -> u16 {
    (match role {
        PortRole::Primary => WirePortRole::Primary,
        PortRole::Secondary => WirePortRole::Secondary,
        PortRole::Interconnect => WirePortRole::Interconnect,
    }) as u16
}

fn now_ms() -> u32 {
    // Monotonic milliseconds for the wire `timestamp` field; the exact
    // epoch is unspecified by the protocol, only that it's monotonic
    // within one node's uptime.
    static START: std::sync::OnceLock<std::time::Instant> = std::sync::OnceLock::new();
    let start = *START.get_or_init(std::time::Instant::now);
    start.elapsed().as_millis() as u32
}

fn send_one(
    inst: &mut Instance,
    transport: &dyn PacketTransport,
    ifindex: u32,
    src_mac: mrp_proto::MacAddr,
    dst: MrpDestination,
    tlv: Tlv,
) -> DriverResult {
    let seq_id = inst.next_seq_id();
    let frame = Frame::new(dst, src_mac, seq_id, inst.domain, vec![tlv]);
    transport.send(ifindex, &frame)
}

/// Sends `RingTest` on both ring ports, using the MRM/MRA steady-state
/// `state` field (closed iff currently in `CHK_RC`).
pub fn send_ring_test(inst: &mut Instance, transport: &dyn PacketTransport) -> DriverResult {
    use crate::instance::MrmState;
    let closed = inst.mrm_state == MrmState::ChkRc;
    let mac = inst.mac;
    for (ifindex, role) in [(inst.p.ifindex, PortRole::Primary), (inst.s.ifindex, PortRole::Secondary)] {
        let tlv = Tlv::RingTest {
            prio: inst.prio,
            sa: mac,
            port_role: wire_role(role),
            state: if closed { 1 } else { 0 },
            transitions: inst.ring_transitions as u16,
            timestamp: now_ms(),
        };
        send_one(inst, transport, ifindex, mac, MrpDestination::Test, tlv)?;
    }
    Ok(())
}

/// Sends `RingTopoChange` on both ring ports with the given interval (ms;
/// 0 means "flush now").
pub fn send_ring_topo(inst: &mut Instance, transport: &dyn PacketTransport, interval_ms: u16) -> DriverResult {
    let mac = inst.mac;
    let prio = inst.prio;
    for ifindex in [inst.p.ifindex, inst.s.ifindex] {
        let tlv = Tlv::RingTopoChange { prio, sa: mac, interval: interval_ms };
        send_one(inst, transport, ifindex, mac, MrpDestination::Control, tlv)?;
    }
    Ok(())
}

/// Sends `RingLinkUp`/`RingLinkDown` on the primary port only, matching
/// `mrp_ring_link_req`'s single-port emission.
pub fn send_ring_link(
    inst: &mut Instance,
    transport: &dyn PacketTransport,
    up: bool,
    interval_ms: u16,
) -> DriverResult {
    let mac = inst.mac;
    let blocked = inst.blocked as u16;
    let ifindex = inst.p.ifindex;
    let tlv = if up {
        Tlv::RingLinkUp { sa: mac, port_role: wire_role(PortRole::Primary), interval: interval_ms, blocked }
    } else {
        Tlv::RingLinkDown { sa: mac, port_role: wire_role(PortRole::Primary), interval: interval_ms, blocked }
    };
    send_one(inst, transport, ifindex, mac, MrpDestination::Control, tlv)
}

/// Sends a `TestMgrNack` Option on both ring ports, addressed (at the MRP
/// layer, via `other_sa`) to the node being rejected.
pub fn send_test_mgr_nack(
    inst: &mut Instance,
    transport: &dyn PacketTransport,
    rejected_sa: mrp_proto::MacAddr,
) -> DriverResult {
    let mac = inst.mac;
    let prio = inst.prio;
    for ifindex in [inst.p.ifindex, inst.s.ifindex] {
        let tlv = Tlv::Option(SubTlv::TestMgrNack {
            prio,
            sa: mac,
            other_prio: 0,
            other_sa: rejected_sa,
        });
        send_one(inst, transport, ifindex, mac, MrpDestination::Test, tlv)?;
    }
    Ok(())
}

/// Sends a `TestPropagate` Option on both ring ports, announcing the
/// result of an election this node lost.
pub fn send_test_propagate(inst: &mut Instance, transport: &dyn PacketTransport) -> DriverResult {
    let mac = inst.mac;
    let prio = inst.prio;
    let (other_prio, other_sa) = match inst.ring_best {
        Some(best) => (best.prio, best.mac),
        None => (0, mrp_proto::MacAddr::ZERO),
    };
    for ifindex in [inst.p.ifindex, inst.s.ifindex] {
        let tlv = Tlv::Option(SubTlv::TestPropagate { prio, sa: mac, other_prio, other_sa });
        send_one(inst, transport, ifindex, mac, MrpDestination::Test, tlv)?;
    }
    Ok(())
}

/// Sends `InTest` on all three ports (both ring ports plus the
/// interconnect), matching `mrp_in_test_send`.
pub fn send_in_test(inst: &mut Instance, transport: &dyn PacketTransport) -> DriverResult {
    use crate::instance::MimState;
    let mac = inst.mac;
    let closed = inst.mim_state == MimState::ChkIc;
    let in_id = inst.key.ring_nr as u16;
    let transitions = inst.in_transitions as u16;
    let ports: Vec<(u32, PortRole)> = [(inst.p.ifindex, PortRole::Primary), (inst.s.ifindex, PortRole::Secondary)]
        .into_iter()
        .chain(inst.i.as_ref().map(|i| (i.ifindex, PortRole::Interconnect)))
        .collect();
    for (ifindex, role) in ports {
        let tlv = Tlv::InTest {
            sa: mac,
            id: in_id,
            port_role: wire_role(role),
            state: if closed { 1 } else { 0 },
            transitions,
            timestamp: now_ms(),
        };
        send_one(inst, transport, ifindex, mac, MrpDestination::InTest, tlv)?;
    }
    Ok(())
}

/// Sends `InTopoChange` on all three ports.
pub fn send_in_topo(inst: &mut Instance, transport: &dyn PacketTransport, interval_ms: u16) -> DriverResult {
    let mac = inst.mac;
    let in_id = inst.key.ring_nr as u16;
    let ports: Vec<u32> = [inst.p.ifindex, inst.s.ifindex].into_iter().chain(inst.i.as_ref().map(|i| i.ifindex)).collect();
    for ifindex in ports {
        let tlv = Tlv::InTopoChange { sa: mac, id: in_id, interval: interval_ms };
        send_one(inst, transport, ifindex, mac, MrpDestination::InControl, tlv)?;
    }
    Ok(())
}

/// Sends `InLinkUp`/`InLinkDown` on all three ports.
pub fn send_in_link(inst: &mut Instance, transport: &dyn PacketTransport, up: bool, interval_ms: u16) -> DriverResult {
    let mac = inst.mac;
    let in_id = inst.key.ring_nr as u16;
    let ports: Vec<(u32, PortRole)> = [(inst.p.ifindex, PortRole::Primary), (inst.s.ifindex, PortRole::Secondary)]
        .into_iter()
        .chain(inst.i.as_ref().map(|i| (i.ifindex, PortRole::Interconnect)))
        .collect();
    for (ifindex, role) in ports {
        let tlv = if up {
            Tlv::InLinkUp { sa: mac, port_role: wire_role(role), id: in_id, interval: interval_ms }
        } else {
            Tlv::InLinkDown { sa: mac, port_role: wire_role(role), id: in_id, interval: interval_ms }
        };
        send_one(inst, transport, ifindex, mac, MrpDestination::InControl, tlv)?;
    }
    Ok(())
}

/// Sends `InLinkStatusPoll` on the two ring ports only, matching
/// `mrp_in_link_status_req`'s port set.
pub fn send_in_link_status(inst: &mut Instance, transport: &dyn PacketTransport) -> DriverResult {
    let mac = inst.mac;
    let in_id = inst.key.ring_nr as u16;
    for (ifindex, role) in [(inst.p.ifindex, PortRole::Primary), (inst.s.ifindex, PortRole::Secondary)] {
        let tlv = Tlv::InLinkStatusPoll { sa: mac, port_role: wire_role(role), id: in_id };
        send_one(inst, transport, ifindex, mac, MrpDestination::InControl, tlv)?;
    }
    Ok(())
}
