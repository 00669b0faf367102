// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use mrp_proto::MacAddr;

use crate::driver::{BridgeDriver, DriverResult};
use crate::port::{ForwardState, Port};
use crate::timers::{InstanceTimers, RecoveryClass};

/// Identifies an instance: the bridge it's attached to and which ring
/// number on that bridge (a bridge may run more than one MRP ring on
/// disjoint port sets, though this implementation's ports never overlap
/// across instances).
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct InstanceKey {
    pub bridge_ifindex: u32,
    pub ring_nr: u32,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum RingRole {
    Disabled,
    Mrc,
    Mrm,
    Mra,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum InRole {
    Disabled,
    Mim,
    Mic,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum InMode {
    /// Ring-check: interconnect liveness comes from the kernel operstate.
    Rc,
    /// Link-check: interconnect liveness comes from a CFM peer-status signal.
    Lc,
}

/// MRM/MRA ring-manager sub-state (§4.3).
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum MrmState {
    AcStat1,
    PrmUp,
    ChkRo,
    ChkRc,
}

/// MRC/MRA-demoted-to-client ring sub-state (§4.4).
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum MrcState {
    AcStat1,
    DeIdle,
    Pt,
    De,
    PtIdle,
}

/// MIM interconnect-manager sub-state (§4.6).
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum MimState {
    AcStat1,
    ChkIo,
    ChkIc,
}

/// MIC interconnect-client sub-state (§4.6).
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum MicState {
    AcStat1,
    Pt,
    IpIdle,
}

/// CFM association used when `in_mode == Lc`: the interconnect's liveness
/// is reported by a CFM MEP rather than the kernel's own link state.
#[derive(Clone, Debug)]
pub struct CfmAssoc {
    pub cfm_instance: u32,
    pub cfm_level: u8,
    pub cfm_mepid: u32,
    pub cfm_peer_mepid: u32,
    pub cfm_maid: [u8; 48],
    pub cfm_dmac: MacAddr,
    /// Last defect state reported for `cfm_peer_mepid`.
    pub peer_defect: bool,
}

/// The best `(priority, mac)` an MRA/MRC node is currently tracking,
/// either as an MRA's opponent during election or as an MRA-enabled MRC's
/// tracked manager.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct RingBest {
    pub prio: u16,
    pub mac: MacAddr,
}

/// A single MRP instance: `(bridge_ifindex, ring_nr)`, its ports, roles,
/// state-machine variables, and timers. Protected by one mutex per
/// instance at the registry level (see `registry::Registry`).
pub struct Instance {
    pub key: InstanceKey,
    pub mac: MacAddr,
    pub domain: [u8; 16],

    pub p: Port,
    pub s: Port,
    pub i: Option<Port>,

    pub ring_role: RingRole,
    pub in_role: InRole,
    pub in_mode: InMode,
    pub mra_support: bool,
    pub prio: u16,
    pub react_on_link_change: bool,

    pub mrm_state: MrmState,
    pub mrc_state: MrcState,
    pub mim_state: MimState,
    pub mic_state: MicState,

    pub seq_id: u16,
    pub ring_transitions: u32,
    pub in_transitions: u32,

    pub recovery_class: RecoveryClass,

    pub ring_test_curr: u32,
    pub ring_test_curr_max: u32,
    pub ring_mon_curr: u32,
    /// Remaining repeats of an in-flight `ring_topo` request, and the
    /// interval (ms) it's repeating at, so the `RingTopo` timer's expiry
    /// handler can resend without the caller threading state through.
    pub ring_topo_curr: u32,
    pub ring_topo_interval_ms: u16,
    pub ring_link_curr_max: u32,
    pub in_test_curr: u32,
    pub in_test_curr_max: u32,
    pub in_topo_curr: u32,
    pub in_topo_interval_ms: u16,
    pub in_link_curr_max: u32,
    pub in_link_status_curr: u32,

    pub ring_best: Option<RingBest>,

    /// Only meaningful when `ring_role == Mra`: whether the election has
    /// currently stepped this node down to behave as an MRC (`true`) or
    /// it is still acting as the manager (`false`, the initial state).
    pub mra_acting_as_mrc: bool,

    pub add_test: bool,
    pub no_tc: bool,
    /// Static configuration flag set once at construction and never
    /// mutated afterwards; echoed into the `blocked` field of outgoing
    /// `RingLinkUp`/`RingLinkDown` TLVs and read by the neighbour
    /// link-change matrix. Not a record of current port state.
    pub blocked: bool,
    pub ring_topo_running: bool,

    pub cfm: Option<CfmAssoc>,

    pub timers: InstanceTimers,
}

impl Instance {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        key: InstanceKey,
        mac: MacAddr,
        domain: [u8; 16],
        p: Port,
        s: Port,
        i: Option<Port>,
        ring_role: RingRole,
        prio: u16,
        react_on_link_change: bool,
        in_role: InRole,
        in_mode: InMode,
        mra_support: bool,
        recovery_class: RecoveryClass,
        cfm: Option<CfmAssoc>,
    ) -> Self {
        Self {
            key,
            mac,
            domain,
            p,
            s,
            i,
            ring_role,
            in_role,
            in_mode,
            mra_support,
            prio,
            react_on_link_change,
            mrm_state: MrmState::AcStat1,
            mrc_state: MrcState::AcStat1,
            mim_state: MimState::AcStat1,
            mic_state: MicState::AcStat1,
            seq_id: 0,
            ring_transitions: 0,
            in_transitions: 0,
            recovery_class,
            ring_test_curr: 0,
            ring_test_curr_max: 0,
            ring_mon_curr: 0,
            ring_topo_curr: 0,
            ring_topo_interval_ms: 0,
            ring_link_curr_max: 0,
            in_test_curr: 0,
            in_test_curr_max: 0,
            in_topo_curr: 0,
            in_topo_interval_ms: 0,
            in_link_curr_max: 0,
            in_link_status_curr: 0,
            ring_best: None,
            mra_acting_as_mrc: false,
            add_test: false,
            no_tc: false,
            blocked: true,
            ring_topo_running: false,
            cfm,
            timers: InstanceTimers::new(),
        }
    }

    /// Default priority for a plain MRM/MRC (`0x8000`).
    pub const DEFAULT_PRIO: u16 = 0x8000;
    /// Default priority for an MRA (`0xA000`), per the standard's guidance
    /// that election-capable managers start at a lower-preference default
    /// than a fixed MRM.
    pub const DEFAULT_MRA_PRIO: u16 = 0xa000;

    /// Allocates the next sequence id for an outbound PDU. Increments by
    /// one regardless of TLV type (data-model invariant 6).
    pub fn next_seq_id(&mut self) -> u16 {
        let id = self.seq_id;
        self.seq_id = self.seq_id.wrapping_add(1);
        id
    }

    /// Swaps the roles of the primary and secondary ring ports so that
    /// `p` is always the currently-preferred/up side (data-model
    /// invariant 3). Forwarding state is left to the caller, since each
    /// transition sets it differently.
    pub fn swap_ring_ports(&mut self) {
        std::mem::swap(&mut self.p, &mut self.s);
    }

    /// True if `ifindex` names one of this instance's ring ports (primary
    /// or secondary) -- not the interconnect port.
    pub fn is_ring_port(&self, ifindex: u32) -> bool {
        self.p.ifindex == ifindex || self.s.ifindex == ifindex
    }

    pub fn is_interconnect_port(&self, ifindex: u32) -> bool {
        self.i.as_ref().is_some_and(|i| i.ifindex == ifindex)
    }

    /// Whether this instance is currently behaving as a ring manager:
    /// a plain MRM, or an MRA that hasn't stepped down.
    pub fn acts_as_mrm(&self) -> bool {
        matches!(self.ring_role, RingRole::Mrm)
            || (self.ring_role == RingRole::Mra && !self.mra_acting_as_mrc)
    }

    /// Whether this instance is currently behaving as a ring client: a
    /// plain MRC, or an MRA that has stepped down during election.
    pub fn acts_as_mrc(&self) -> bool {
        matches!(self.ring_role, RingRole::Mrc)
            || (self.ring_role == RingRole::Mra && self.mra_acting_as_mrc)
    }

    /// Tells the bridge driver to apply a forwarding state to the primary
    /// port and mirrors it into `self.p.state` so `GET_MRP` status and the
    /// event bus observe the state the driver was actually told, rather
    /// than the constructor default.
    pub fn apply_p_state(&mut self, driver: &dyn BridgeDriver, state: ForwardState) -> DriverResult {
        driver.set_port_state(self.p.ifindex, state)?;
        self.p.state = state;
        Ok(())
    }

    /// Same as [`Self::apply_p_state`] for the secondary port.
    pub fn apply_s_state(&mut self, driver: &dyn BridgeDriver, state: ForwardState) -> DriverResult {
        driver.set_port_state(self.s.ifindex, state)?;
        self.s.state = state;
        Ok(())
    }

    /// Same as [`Self::apply_p_state`] for the interconnect port. A no-op
    /// when this instance has no interconnect port configured.
    pub fn apply_i_state(&mut self, driver: &dyn BridgeDriver, state: ForwardState) -> DriverResult {
        let Some(i) = &mut self.i else { return Ok(()) };
        driver.set_port_state(i.ifindex, state)?;
        i.state = state;
        Ok(())
    }
}
