// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The event router (§4.7): takes received frames, link/MAC events, CFM
//! defects, timer expiries, and control-plane calls, locates the owning
//! instance, and dispatches to the right state-machine handler.
//!
//! Frames pass through three filters in order: drop (§4.7.1), forward
//! (§4.7.2), process (§4.7.3). TLVs in one frame that must go to
//! different next hops (a ring TLV going to "the other ring port" versus
//! an interconnect TLV relayed two directions) are grouped by target and
//! re-sent as their own frame, carrying the original source and sequence
//! id -- this is a relay, not a new transmission.
//!
//! Every log line emitted while an instance is locked runs inside a
//! `tracing::Span` carrying that instance's `(bridge_ifindex, ring_nr)`.
//! Drop decisions (an unparseable frame, a frame for an ifindex with no
//! instance, a frame the drop filter rejects) are additionally throttled
//! through a [`DropLogLimiter`] so a flapping link or a hostile peer
//! can't flood the log.

use std::time::Instant;

use mrp_proto::{Frame, MacAddr, SubTlv, Tlv, TlvType};
use tracing::{trace, warn};

use crate::driver::{BridgeDriver, DriverResult, EventBus, PacketTransport};
use crate::error::{Error, Result};
use crate::instance::{CfmAssoc, InMode, InRole, Instance, InstanceKey, RingRole};
use crate::port::{ForwardState, OperState, Port, PortRole};
use crate::ratelimit::{DropLogLimiter, DEFAULT_BURST, DEFAULT_INTERVAL};
use crate::registry::Registry;
use crate::timers::{RecoveryClass, TimerId};
use crate::{mic, mim, mrc, mrm};

/// Link/MAC events the router consumes from the external event source
/// (§6). Distinct from a received MRP frame.
#[derive(Clone, Debug)]
pub enum LinkEvent {
    OperState { ifindex: u32, state: OperState },
    MacChanged { ifindex: u32, mac: MacAddr },
}

/// Everything needed to construct an instance via the control plane's
/// `ADD_MRP`. Mirrors the wire record in §6, minus the response framing
/// that lives in the `mrp-control` crate.
#[allow(clippy::too_many_arguments)]
pub struct AddRequest {
    pub bridge_ifindex: u32,
    pub ring_nr: u32,
    pub pport: u32,
    pub sport: u32,
    pub p_ifname: String,
    pub s_ifname: String,
    pub p_mac: MacAddr,
    pub s_mac: MacAddr,
    pub bridge_mac: MacAddr,
    pub domain: [u8; 16],
    pub ring_role: RingRole,
    pub prio: u16,
    pub react_on_link_change: bool,
    pub mra_support: bool,
    pub in_role: InRole,
    pub in_mode: InMode,
    pub iport: Option<u32>,
    pub i_ifname: Option<String>,
    pub i_mac: Option<MacAddr>,
    pub cfm: Option<CfmAssoc>,
    pub recovery_class: RecoveryClass,
}

pub struct EventRouter {
    pub registry: Registry,
    driver: Box<dyn BridgeDriver>,
    transport: Box<dyn PacketTransport>,
    event_bus: Box<dyn EventBus>,
    pub time_factor: u32,
    drop_log_limiter: DropLogLimiter,
}

impl EventRouter {
    pub fn new(
        driver: Box<dyn BridgeDriver>,
        transport: Box<dyn PacketTransport>,
        event_bus: Box<dyn EventBus>,
        time_factor: u32,
    ) -> Self {
        Self {
            registry: Registry::new(),
            driver,
            transport,
            event_bus,
            time_factor,
            drop_log_limiter: DropLogLimiter::new(DEFAULT_INTERVAL, DEFAULT_BURST, Instant::now()),
        }
    }

    // --- control plane ---

    /// `ADD_MRP`: validates the request (`ConfigInvalid` on failure),
    /// builds the instance, registers it, and installs its role with the
    /// bridge driver. A driver failure after registration is reported as
    /// `TransportFailed`; the instance stays registered with whatever
    /// role the driver did accept; a retried `ADD_MRP` would first need a
    /// `DEL_MRP` since `(bridge, ring_nr)` is now taken.
    pub fn add_instance(&mut self, req: AddRequest) -> Result<()> {
        if req.pport == 0 || req.sport == 0 {
            return Err(Error::ConfigInvalid("pport and sport are both required"));
        }
        if req.ring_role == RingRole::Disabled {
            return Err(Error::ConfigInvalid("ring_role must not be Disabled"));
        }

        let p = Port::new(req.pport, req.p_ifname, req.p_mac, PortRole::Primary);
        let s = Port::new(req.sport, req.s_ifname, req.s_mac, PortRole::Secondary);
        let i = match (req.iport, req.i_ifname, req.i_mac) {
            (Some(ifindex), Some(name), Some(mac)) => {
                Some(Port::new(ifindex, name, mac, PortRole::Interconnect))
            }
            _ => None,
        };

        let key = InstanceKey { bridge_ifindex: req.bridge_ifindex, ring_nr: req.ring_nr };
        let mut instance = Instance::new(
            key,
            req.bridge_mac,
            req.domain,
            p,
            s,
            i,
            req.ring_role,
            req.prio,
            req.react_on_link_change,
            req.in_role,
            req.in_mode,
            req.mra_support,
            req.recovery_class,
            req.cfm,
        );
        // An interconnect port starts blocked regardless of ring/in role,
        // same as the ring ports start blocked in `Port::new`; the MIM/MIC
        // state machines open it only once they've proven a closed path.
        if req.in_role != InRole::Disabled {
            instance.apply_i_state(&*self.driver, ForwardState::Blocked)?;
        }

        self.registry.add(instance)?;
        self.driver.set_ring_role(key.bridge_ifindex, key.ring_nr, req.ring_role)?;
        if req.in_role != InRole::Disabled {
            self.driver.set_in_role(key.bridge_ifindex, key.ring_nr, req.in_role)?;
        }
        Ok(())
    }

    /// `DEL_MRP`: stops every timer belonging to the instance before
    /// dropping it (no timer may fire after teardown).
    pub fn del_instance(&mut self, key: InstanceKey) -> Result<()> {
        let handle = self
            .registry
            .del(key)
            .ok_or(Error::NoSuchInstance { bridge_ifindex: key.bridge_ifindex, ring_nr: key.ring_nr })?;
        let mut inst = handle.lock().expect("instance mutex poisoned");
        for t in [
            TimerId::ClearFdb,
            TimerId::RingTopo,
            TimerId::RingTest,
            TimerId::RingLinkUp,
            TimerId::RingLinkDown,
            TimerId::InTest,
            TimerId::InTopo,
            TimerId::InLinkUp,
            TimerId::InLinkDown,
            TimerId::InLinkStatus,
            TimerId::CfmCcm,
        ] {
            inst.timers.clear(t);
        }
        Ok(())
    }

    /// Tears down every instance attached to a bridge that just lost its
    /// master (§5's cancellation model). Unlike a single `DEL_MRP` this
    /// never fails: an instance whose bridge is gone has nothing left to
    /// roll back to.
    pub fn unmaster_bridge(&mut self, bridge_ifindex: u32) {
        let keys: Vec<InstanceKey> =
            self.registry.iter().map(|(k, _)| k).filter(|k| k.bridge_ifindex == bridge_ifindex).collect();
        for key in keys {
            let _ = self.del_instance(key);
        }
    }

    // --- timers ---

    /// Polls every instance's timer wheel and dispatches whatever fired.
    /// Called by the daemon's event loop before each blocking wait, sized
    /// by the minimum `next_deadline()` across instances.
    pub fn poll_timers(&self, now: Instant) {
        for (_key, handle) in self.registry.iter() {
            let mut inst = handle.lock().expect("instance mutex poisoned");
            let _span = self.instance_span(&inst).entered();
            inst.timers.poll_now(now);
            let fired: Vec<TimerId> = inst.timers.iter_fired().collect();
            for which in fired {
                if let Err(e) = self.dispatch_timer(&mut inst, which, now) {
                    warn!(error = %e, timer = ?which, "mrp: driver call failed on timer expiry");
                }
            }
        }
    }

    /// A span tagging every log line emitted while `inst` is locked with
    /// the instance it belongs to, so a busy daemon's log can be filtered
    /// down to one ring.
    fn instance_span(&self, inst: &Instance) -> tracing::Span {
        tracing::info_span!("mrp_instance", bridge_ifindex = inst.key.bridge_ifindex, ring_nr = inst.key.ring_nr)
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.registry
            .iter()
            .filter_map(|(_, h)| h.lock().expect("instance mutex poisoned").timers.next_deadline())
            .min()
    }

    fn dispatch_timer(&self, inst: &mut Instance, which: TimerId, now: Instant) -> DriverResult {
        let tf = self.time_factor;
        match which {
            TimerId::RingTest => {
                if inst.acts_as_mrm() {
                    mrm::on_ring_test_expiry(inst, &*self.driver, &*self.transport, now, tf)?;
                } else if inst.ring_role == RingRole::Mra && inst.mra_acting_as_mrc {
                    mrm::on_ring_mon_expiry(inst, &*self.driver, &*self.transport, now, tf)?;
                }
            }
            TimerId::RingTopo => {
                if inst.acts_as_mrm() {
                    mrm::on_ring_topo_expiry(inst, &*self.driver, &*self.transport, now, tf)?;
                }
            }
            TimerId::RingLinkUp => mrc::on_ring_link_expiry(inst, &*self.transport, true, now, tf)?,
            TimerId::RingLinkDown => mrc::on_ring_link_expiry(inst, &*self.transport, false, now, tf)?,
            // mrc's and mic's clear_fdb handlers flush an identical port
            // set; whichever side armed the timer, either is correct.
            TimerId::ClearFdb => mrc::on_clear_fdb_expiry(inst, &*self.driver)?,
            TimerId::InTest => {
                if inst.in_role == InRole::Mim {
                    mim::on_in_test_expiry(inst, &*self.driver, &*self.transport, now, tf)?;
                }
            }
            TimerId::InTopo | TimerId::InLinkUp | TimerId::InLinkDown => {
                trace!(?which, "mrp: interconnect repeat timer not independently re-armed");
            }
            TimerId::InLinkStatus => match inst.in_role {
                InRole::Mim => mim::on_in_link_status_expiry(inst, &*self.driver, &*self.transport, now, tf)?,
                InRole::Mic => mic::on_in_link_status_expiry(inst, &*self.driver, &*self.transport, now, tf)?,
                InRole::Disabled => {}
            },
            TimerId::CfmCcm => {
                trace!("mrp: cfm_ccm timer fired; CFM continuity is externally supplied, no local action");
            }
        }
        Ok(())
    }

    // --- link / MAC events ---

    pub fn on_link_event(&self, ev: LinkEvent) {
        match ev {
            LinkEvent::OperState { ifindex, state } => self.on_operstate_change(ifindex, state),
            LinkEvent::MacChanged { ifindex, mac } => self.on_mac_changed(ifindex, mac),
        }
    }

    fn on_operstate_change(&self, ifindex: u32, state: OperState) {
        let Some(handle) = self.registry.find_by_ifindex(ifindex) else {
            if self.drop_log_limiter.allow(Instant::now()) {
                warn!(ifindex, "mrp: operstate change for unknown ifindex, dropped");
            }
            return;
        };
        let mut inst = handle.lock().expect("instance mutex poisoned");
        let _span = self.instance_span(&inst).entered();
        let up = state.is_up();
        let now = Instant::now();
        let tf = self.time_factor;

        if inst.is_interconnect_port(ifindex) {
            if inst.in_mode == InMode::Rc {
                match inst.in_role {
                    InRole::Mim => {
                        let _ = mim::on_interconnect_change(&mut inst, up, &*self.driver, &*self.transport, now, tf);
                    }
                    InRole::Mic => {
                        let _ = mic::on_interconnect_change(&mut inst, up, &*self.driver, &*self.transport, now, tf);
                    }
                    InRole::Disabled => {}
                }
            }
            if let Some(i) = &mut inst.i {
                i.operstate = state;
                let (name, fwd) = (i.ifname.clone(), i.state);
                self.event_bus.port_state_changed(&name, fwd);
            }
            return;
        }

        if let Err(e) = if inst.acts_as_mrm() {
            mrm::on_local_link_change(&mut inst, ifindex, up, &*self.driver, &*self.transport, now, tf)
        } else {
            mrc::on_local_link_change(&mut inst, ifindex, up, &*self.driver, &*self.transport, now, tf)
        } {
            warn!(error = %e, ifindex, "mrp: driver call failed on local link change");
        }

        if inst.p.ifindex == ifindex {
            inst.p.operstate = state;
        } else if inst.s.ifindex == ifindex {
            inst.s.operstate = state;
        }
        let (p_name, p_state) = (inst.p.ifname.clone(), inst.p.state);
        let (s_name, s_state) = (inst.s.ifname.clone(), inst.s.state);
        self.event_bus.port_state_changed(&p_name, p_state);
        self.event_bus.port_state_changed(&s_name, s_state);
    }

    fn on_mac_changed(&self, ifindex: u32, mac: MacAddr) {
        let Some(handle) = self.registry.find_by_ifindex(ifindex) else {
            return;
        };
        let mut inst = handle.lock().expect("instance mutex poisoned");
        let _span = self.instance_span(&inst).entered();
        if inst.p.ifindex == ifindex {
            inst.p.mac = mac;
        } else if inst.s.ifindex == ifindex {
            inst.s.mac = mac;
        } else if let Some(i) = &mut inst.i {
            if i.ifindex == ifindex {
                i.mac = mac;
            }
        }
    }

    /// CFM peer-defect update, only meaningful when `in_mode == Lc`.
    pub fn on_cfm_defect(&self, bridge_ifindex: u32, peer_mepid: u32, defect: bool) {
        for (key, handle) in self.registry.iter() {
            if key.bridge_ifindex != bridge_ifindex {
                continue;
            }
            let mut inst = handle.lock().expect("instance mutex poisoned");
            let matches = inst.cfm.as_ref().is_some_and(|c| c.cfm_peer_mepid == peer_mepid);
            if !matches || inst.in_mode != InMode::Lc {
                continue;
            }
            let _span = self.instance_span(&inst).entered();
            if let Some(c) = &mut inst.cfm {
                c.peer_defect = defect;
            }
            let now = Instant::now();
            let tf = self.time_factor;
            let up = !defect;
            match inst.in_role {
                InRole::Mim => {
                    let _ = mim::on_interconnect_change(&mut inst, up, &*self.driver, &*self.transport, now, tf);
                }
                InRole::Mic => {
                    let _ = mic::on_interconnect_change(&mut inst, up, &*self.driver, &*self.transport, now, tf);
                }
                InRole::Disabled => {}
            }
        }
    }

    // --- frames ---

    pub fn on_frame(&self, ifindex: u32, bytes: &[u8]) {
        let frame = match Frame::decode(bytes) {
            Ok(f) => f,
            Err(e) => {
                if self.drop_log_limiter.allow(Instant::now()) {
                    warn!(ifindex, error = %e, "mrp: dropping unparseable frame");
                }
                return;
            }
        };

        let Some(handle) = self.registry.find_by_ifindex(ifindex) else {
            if self.drop_log_limiter.allow(Instant::now()) {
                warn!(ifindex, "mrp: frame for unknown ifindex, dropped");
            }
            return;
        };
        let mut inst = handle.lock().expect("instance mutex poisoned");
        let _span = self.instance_span(&inst).entered();

        let mut to_forward: Vec<(u32, Tlv)> = Vec::new();
        for tlv in &frame.tlvs {
            let ty = tlv.tlv_type();
            if self.drop_filter(&inst, ifindex, ty) {
                if self.drop_log_limiter.allow(Instant::now()) {
                    warn!(?ty, ifindex, "mrp: dropped by drop filter");
                }
                continue;
            }
            for target in self.forward_targets(&inst, ifindex, ty, frame.src) {
                to_forward.push((target, tlv.clone()));
            }
            if self.should_process(&inst, ty) {
                self.process_tlv(&mut inst, &frame, tlv);
            }
        }

        self.send_forwarded(&frame, to_forward);
    }

    /// Groups forwarded TLVs by target port and relays each group as one
    /// frame, preserving the original source address and sequence id --
    /// a relay is not a new transmission.
    fn send_forwarded(&self, frame: &Frame, to_forward: Vec<(u32, Tlv)>) {
        let mut targets: Vec<u32> = Vec::new();
        for (target, _) in &to_forward {
            if !targets.contains(target) {
                targets.push(*target);
            }
        }
        for target in targets {
            let tlvs: Vec<Tlv> =
                to_forward.iter().filter(|(t, _)| *t == target).map(|(_, tlv)| tlv.clone()).collect();
            let out = Frame { dst: frame.dst, src: frame.src, seq_id: frame.seq_id, domain: frame.domain, tlvs };
            if let Err(e) = self.transport.send(target, &out) {
                warn!(error = %e, target, "mrp: forward failed");
            }
        }
    }

    fn drop_filter(&self, inst: &Instance, recv_ifindex: u32, ty: TlvType) -> bool {
        let port = if inst.p.ifindex == recv_ifindex {
            &inst.p
        } else if inst.s.ifindex == recv_ifindex {
            &inst.s
        } else if let Some(i) = inst.i.as_ref().filter(|i| i.ifindex == recv_ifindex) {
            i
        } else {
            return true;
        };

        if port.state == ForwardState::Disabled {
            return true;
        }

        let is_interconnect = matches!(port.role, PortRole::Interconnect);
        if is_interconnect {
            port.state == ForwardState::Blocked
                && !matches!(ty, TlvType::InTest | TlvType::InTopo | TlvType::InLinkUp | TlvType::InLinkDown)
        } else {
            port.state == ForwardState::Blocked
                && !matches!(
                    ty,
                    TlvType::RingTopo
                        | TlvType::RingTest
                        | TlvType::RingLinkUp
                        | TlvType::RingLinkDown
                        | TlvType::InTopo
                        | TlvType::InLinkUp
                        | TlvType::InLinkDown
                        | TlvType::Option
                )
        }
    }

    /// Mirrors `mrp_check_and_forward` (state_machine.c) port for port: the
    /// candidate targets start as "the two ports other than the one the
    /// frame arrived on", then ring/interconnect role and frame type prune
    /// that set down. `frame_src` is needed only to recognize a MIM's own
    /// `InTest` coming back, which is never forwarded anywhere.
    fn forward_targets(&self, inst: &Instance, recv_ifindex: u32, ty: TlvType, frame_src: MacAddr) -> Vec<u32> {
        let is_ring = matches!(
            ty,
            TlvType::RingTest | TlvType::RingTopo | TlvType::RingLinkUp | TlvType::RingLinkDown
        ) || ty == TlvType::Option;
        let is_in = matches!(
            ty,
            TlvType::InTest | TlvType::InTopo | TlvType::InLinkUp | TlvType::InLinkDown | TlvType::InLinkStatus
        );

        let recv_is_p = inst.p.ifindex == recv_ifindex;
        let recv_is_s = inst.s.ifindex == recv_ifindex;
        let recv_is_i = inst.is_interconnect_port(recv_ifindex);

        let mut fwd_p = !recv_is_p;
        let mut fwd_s = !recv_is_s;
        let mut fwd_i = inst.i.is_some() && !recv_is_i;

        if is_ring {
            // Ring frames received on the interconnect port are never
            // forwarded anywhere, and never relayed onto the interconnect
            // port either way.
            if recv_is_i {
                return Vec::new();
            }
            fwd_i = false;

            if inst.acts_as_mrm() {
                return Vec::new();
            }
            if inst.acts_as_mrc() && ty == TlvType::Option && !inst.mra_support {
                return Vec::new();
            }
        }

        if is_in {
            if inst.acts_as_mrm() {
                // An MRM stops relaying interconnect frames between its own
                // ring ports once the ring is no longer fully forwarding,
                // to avoid looping a frame back around a closed ring.
                if (inst.p.state != ForwardState::Forwarding || inst.s.state != ForwardState::Forwarding)
                    && (recv_is_p || recv_is_s)
                {
                    fwd_p = false;
                    fwd_s = false;
                }
            } else if inst.acts_as_mrc() && inst.in_role != InRole::Disabled && (recv_is_p || recv_is_s) {
                fwd_p = false;
                fwd_s = false;
            }

            match inst.in_role {
                InRole::Mim => {
                    if ty == TlvType::InTest {
                        if frame_src == inst.mac {
                            return Vec::new();
                        }
                        if recv_is_i {
                            return Vec::new();
                        }
                        fwd_i = false;
                    } else {
                        if recv_is_p || recv_is_s {
                            fwd_i = false;
                        }
                        if recv_is_i {
                            return Vec::new();
                        }
                    }
                }
                InRole::Mic => match ty {
                    TlvType::InTest => {}
                    TlvType::InLinkUp | TlvType::InLinkDown => {
                        if !(recv_is_p || recv_is_s) {
                            return Vec::new();
                        }
                    }
                    TlvType::InLinkStatus => {
                        if recv_is_p || recv_is_s {
                            fwd_p = false;
                            fwd_s = false;
                        }
                    }
                    TlvType::InTopo => {
                        fwd_i = false;
                    }
                    _ => {}
                },
                InRole::Disabled => {
                    // No interconnect role: a plain MRM/MRC still relays
                    // in-frames around the ring so they reach the far
                    // interconnect node, with no role-specific pruning.
                }
            }
        }

        let mut targets = Vec::new();
        if fwd_p {
            targets.push(inst.p.ifindex);
        }
        if fwd_s {
            targets.push(inst.s.ifindex);
        }
        if fwd_i {
            if let Some(i) = &inst.i {
                targets.push(i.ifindex);
            }
        }
        targets
    }

    fn should_process(&self, inst: &Instance, ty: TlvType) -> bool {
        let mra_demoted_to_mrc = inst.ring_role == RingRole::Mra && inst.mra_acting_as_mrc;
        let mra_acting_as_mrm = inst.ring_role == RingRole::Mra && !inst.mra_acting_as_mrc;
        match ty {
            TlvType::RingTest => inst.acts_as_mrm() || mra_demoted_to_mrc,
            TlvType::RingLinkUp | TlvType::RingLinkDown => inst.acts_as_mrm(),
            TlvType::RingTopo => inst.acts_as_mrc() || mra_acting_as_mrm,
            TlvType::Option => inst.ring_role == RingRole::Mra,
            TlvType::InTest | TlvType::InLinkUp | TlvType::InLinkDown => inst.in_role == InRole::Mim,
            TlvType::InTopo => {
                matches!(inst.in_role, InRole::Mim | InRole::Mic) || inst.acts_as_mrm()
            }
            TlvType::End | TlvType::Common => false,
        }
    }

    fn process_tlv(&self, inst: &mut Instance, frame: &Frame, tlv: &Tlv) {
        let now = Instant::now();
        let tf = self.time_factor;
        let result: DriverResult = match tlv {
            Tlv::RingTest { prio, .. } => {
                if frame.src == inst.mac {
                    mrm::on_own_ring_test_returned(inst, &*self.driver, &*self.transport, now, tf)
                } else {
                    mrm::on_foreign_ring_test(inst, frame.src, *prio, &*self.transport)
                }
            }
            Tlv::RingLinkUp { .. } => {
                mrm::on_neighbour_ring_link(inst, true, &*self.driver, &*self.transport, now, tf)
            }
            Tlv::RingLinkDown { .. } => {
                mrm::on_neighbour_ring_link(inst, false, &*self.driver, &*self.transport, now, tf)
            }
            Tlv::RingTopoChange { interval, .. } => {
                if inst.acts_as_mrc() {
                    mrc::on_ring_topo_received(inst, *interval, &*self.driver, now, tf)
                } else {
                    trace!("mrp: ring topo change observed by acting manager, no local action");
                    Ok(())
                }
            }
            Tlv::Option(SubTlv::TestMgrNack { sa, other_sa, prio, .. }) => {
                mrm::on_test_mgr_nack(inst, *sa, *other_sa, *prio, &*self.driver, &*self.transport)
            }
            Tlv::Option(SubTlv::TestPropagate { sa, other_prio, prio, other_sa }) => {
                mrm::on_test_propagate(inst, *sa, *other_prio, *prio, *other_sa);
                Ok(())
            }
            Tlv::InTest { .. } => {
                if frame.src == inst.mac {
                    mim::on_own_in_test_returned(inst, &*self.driver)
                } else {
                    Ok(())
                }
            }
            Tlv::InLinkUp { .. } => {
                let _ = mim::on_interconnect_change(inst, true, &*self.driver, &*self.transport, now, tf);
                Ok(())
            }
            Tlv::InLinkDown { .. } => {
                let _ = mim::on_interconnect_change(inst, false, &*self.driver, &*self.transport, now, tf);
                Ok(())
            }
            Tlv::InTopoChange { interval, .. } => {
                if inst.in_role == InRole::Mic {
                    mic::on_in_topo_received(inst, *interval, now, tf)
                } else {
                    trace!("mrp: in topo change observed outside mic role, no local action");
                    Ok(())
                }
            }
            Tlv::InLinkStatusPoll { .. } => {
                if inst.in_role == InRole::Mim {
                    mim::on_in_link_status_poll(inst);
                } else if inst.in_role == InRole::Mic {
                    mic::on_in_link_up_or_poll_ack(inst);
                }
                Ok(())
            }
        };
        if let Err(e) = result {
            warn!(error = %e, "mrp: driver call failed while processing frame");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::NullEventBus;
    use crate::instance::MrcState;
    use crate::testutil::{mac, mrc_instance, mrm_instance, RecordingBridgeDriver, RecordingTransport};

    fn test_router() -> EventRouter {
        EventRouter::new(
            Box::new(RecordingBridgeDriver::new()),
            Box::new(RecordingTransport::new()),
            Box::new(NullEventBus),
            1,
        )
    }

    fn add_req() -> AddRequest {
        AddRequest {
            bridge_ifindex: 1,
            ring_nr: 0,
            pport: 10,
            sport: 11,
            p_ifname: "eth0".into(),
            s_ifname: "eth1".into(),
            p_mac: mac(2),
            s_mac: mac(3),
            bridge_mac: mac(1),
            domain: [0xff; 16],
            ring_role: RingRole::Mrm,
            prio: Instance::DEFAULT_PRIO,
            react_on_link_change: false,
            mra_support: false,
            in_role: InRole::Disabled,
            in_mode: InMode::Rc,
            iport: None,
            i_ifname: None,
            i_mac: None,
            cfm: None,
            recovery_class: RecoveryClass::Ms500,
        }
    }

    #[test]
    fn add_instance_rejects_missing_port() {
        let mut router = test_router();
        let mut req = add_req();
        req.sport = 0;
        assert!(matches!(router.add_instance(req), Err(Error::ConfigInvalid(_))));
    }

    #[test]
    fn add_instance_rejects_disabled_role() {
        let mut router = test_router();
        let mut req = add_req();
        req.ring_role = RingRole::Disabled;
        assert!(matches!(router.add_instance(req), Err(Error::ConfigInvalid(_))));
    }

    #[test]
    fn add_instance_blocks_interconnect_port_at_install() {
        let mut router = test_router();
        let mut req = add_req();
        req.in_role = InRole::Mim;
        req.iport = Some(12);
        req.i_ifname = Some("eth2".into());
        req.i_mac = Some(mac(4));
        router.add_instance(req).unwrap();

        let handle = router.registry.find_by_ifindex(12).expect("interconnect port registered");
        let inst = handle.lock().unwrap();
        assert_eq!(inst.i.as_ref().unwrap().state, ForwardState::Blocked);
    }

    #[test]
    fn add_then_del_round_trips() {
        let mut router = test_router();
        let key = InstanceKey { bridge_ifindex: 1, ring_nr: 0 };
        router.add_instance(add_req()).unwrap();
        assert!(router.registry.find_by_ifindex(10).is_some());
        router.del_instance(key).unwrap();
        assert!(router.registry.find_by_ifindex(10).is_none());
    }

    #[test]
    fn drop_filter_blocks_non_exempt_tlv_on_blocked_secondary() {
        let router = test_router();
        let mut inst = mrm_instance(Instance::DEFAULT_PRIO);
        inst.s.state = ForwardState::Blocked;
        assert!(router.drop_filter(&inst, inst.s.ifindex, TlvType::InTest));
    }

    #[test]
    fn drop_filter_lets_ring_management_tlvs_through_blocked_port() {
        let router = test_router();
        let mut inst = mrm_instance(Instance::DEFAULT_PRIO);
        inst.s.state = ForwardState::Blocked;
        assert!(!router.drop_filter(&inst, inst.s.ifindex, TlvType::RingTest));
        assert!(!router.drop_filter(&inst, inst.s.ifindex, TlvType::RingTopo));
    }

    #[test]
    fn drop_filter_rejects_unknown_ifindex() {
        let router = test_router();
        let inst = mrm_instance(Instance::DEFAULT_PRIO);
        assert!(router.drop_filter(&inst, 999, TlvType::RingTest));
    }

    #[test]
    fn forward_targets_relays_ring_tlv_to_other_port_for_client() {
        let router = test_router();
        let inst = mrc_instance();
        let targets = router.forward_targets(&inst, inst.p.ifindex, TlvType::RingTopo, mac(99));
        assert_eq!(targets, vec![inst.s.ifindex]);
    }

    #[test]
    fn forward_targets_empty_for_manager() {
        let router = test_router();
        let inst = mrm_instance(Instance::DEFAULT_PRIO);
        assert!(router.forward_targets(&inst, inst.p.ifindex, TlvType::RingTopo, mac(99)).is_empty());
    }

    #[test]
    fn forward_targets_relays_in_test_around_ring_with_no_interconnect_role() {
        let router = test_router();
        let inst = mrc_instance();
        let targets = router.forward_targets(&inst, inst.p.ifindex, TlvType::InTest, mac(99));
        assert_eq!(targets, vec![inst.s.ifindex]);
    }

    #[test]
    fn should_process_routes_ring_test_to_manager_only() {
        let router = test_router();
        let mrm = mrm_instance(Instance::DEFAULT_PRIO);
        let mut mrc = mrc_instance();
        assert!(router.should_process(&mrm, TlvType::RingTest));
        assert!(!router.should_process(&mrc, TlvType::RingTest));

        mrc.mrc_state = MrcState::Pt;
        assert!(router.should_process(&mrc, TlvType::RingTopo));
    }
}
