// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! MRM ring-manager state machine, plus the MRA election extension (§4.5).
//!
//! Every handler here assumes the caller (the event router) already holds
//! the instance's lock and has determined this instance is currently
//! acting as a manager (`Instance::acts_as_mrm`); the MRC-side mirror
//! lives in [`crate::mrc`].

use std::time::{Duration, Instant};

use mrp_proto::MacAddr;
use mrp_timer::Repeat;
use tracing::{trace, warn};

use crate::driver::{BridgeDriver, DriverResult, PacketTransport};
use crate::frames;
use crate::instance::{Instance, MrcState, MrmState, RingBest, RingRole};
use crate::port::ForwardState;
use crate::timers::{scaled, TimerId};

fn ring_ports(inst: &Instance) -> [u32; 2] {
    [inst.p.ifindex, inst.s.ifindex]
}

fn all_flush_ports(inst: &Instance) -> Vec<u32> {
    [inst.p.ifindex, inst.s.ifindex].into_iter().chain(inst.i.as_ref().map(|i| i.ifindex)).collect()
}

/// Sends `RingTest` on both ports and (re-)arms `RingTest` to fire once
/// after `interval`, matching `mrp_ring_test_req`'s send-then-start.
fn request_ring_test(
    inst: &mut Instance,
    transport: &dyn PacketTransport,
    interval: Duration,
    now: Instant,
    time_factor: u32,
) -> DriverResult {
    frames::send_ring_test(inst, transport)?;
    inst.timers.set_after(TimerId::RingTest, now, scaled(interval, time_factor), None);
    Ok(())
}

/// A topology-change request. `interval_ms == 0` means "flush now"; a
/// nonzero interval sends once and arms `RingTopo` to repeat
/// `ring_topo_conf_max` times.
fn request_ring_topo(
    inst: &mut Instance,
    driver: &dyn BridgeDriver,
    transport: &dyn PacketTransport,
    interval_ms: u16,
    now: Instant,
    time_factor: u32,
) -> DriverResult {
    frames::send_ring_topo(inst, transport, interval_ms)?;
    if interval_ms == 0 {
        inst.timers.clear(TimerId::RingTopo);
        driver.flush_fdb(&all_flush_ports(inst))?;
    } else {
        let cfg = inst.recovery_class.ring_timer_config();
        inst.ring_topo_curr = cfg.topo_conf_max.saturating_sub(1);
        inst.ring_topo_interval_ms = interval_ms;
        inst.timers.set_after(TimerId::RingTopo, now, scaled(cfg.topo_interval, time_factor), None);
    }
    Ok(())
}

/// `RingTopo` timer expiry: resend while repeats remain, then flush once.
pub fn on_ring_topo_expiry(
    inst: &mut Instance,
    driver: &dyn BridgeDriver,
    transport: &dyn PacketTransport,
    now: Instant,
    time_factor: u32,
) -> DriverResult {
    if inst.ring_topo_curr > 0 {
        inst.ring_topo_curr -= 1;
        let cfg = inst.recovery_class.ring_timer_config();
        frames::send_ring_topo(inst, transport, inst.ring_topo_interval_ms)?;
        inst.timers.set_after(TimerId::RingTopo, now, scaled(cfg.topo_interval, time_factor), None);
    } else {
        driver.flush_fdb(&all_flush_ports(inst))?;
        frames::send_ring_topo(inst, transport, 0)?;
        inst.timers.clear(TimerId::RingTopo);
    }
    Ok(())
}

/// A local ring port's link changed (§4.3, the full matrix reproduced
/// verbatim from the reference).
pub fn on_local_link_change(
    inst: &mut Instance,
    ifindex: u32,
    up: bool,
    driver: &dyn BridgeDriver,
    transport: &dyn PacketTransport,
    now: Instant,
    time_factor: u32,
) -> DriverResult {
    let is_primary = inst.p.ifindex == ifindex;
    let cfg = inst.recovery_class.ring_timer_config();

    match (inst.mrm_state, up, is_primary) {
        (MrmState::AcStat1, true, true) => {
            inst.apply_p_state(driver, ForwardState::Forwarding)?;
            request_ring_test(inst, transport, cfg.test_interval, now, time_factor)?;
            inst.mrm_state = MrmState::PrmUp;
        }
        (MrmState::AcStat1, true, false) => {
            inst.swap_ring_ports();
            inst.apply_p_state(driver, ForwardState::Forwarding)?;
            request_ring_test(inst, transport, cfg.test_interval, now, time_factor)?;
            inst.mrm_state = MrmState::PrmUp;
        }
        (MrmState::PrmUp, false, true) => {
            inst.timers.clear(TimerId::RingTest);
            inst.apply_p_state(driver, ForwardState::Blocked)?;
            inst.mrm_state = MrmState::AcStat1;
        }
        (MrmState::PrmUp, true, false) => {
            inst.ring_test_curr_max = cfg.test_conf_max.saturating_sub(1);
            inst.ring_test_curr = 0;
            inst.no_tc = true;
            request_ring_test(inst, transport, cfg.test_interval, now, time_factor)?;
            inst.mrm_state = MrmState::ChkRc;
        }
        (MrmState::ChkRo, false, true) => {
            inst.swap_ring_ports();
            inst.apply_s_state(driver, ForwardState::Blocked)?;
            request_ring_test(inst, transport, cfg.test_interval, now, time_factor)?;
            request_ring_topo(inst, driver, transport, cfg.topo_interval.as_millis() as u16, now, time_factor)?;
            inst.mrm_state = MrmState::PrmUp;
        }
        (MrmState::ChkRo, false, false) => {
            inst.apply_s_state(driver, ForwardState::Blocked)?;
            inst.mrm_state = MrmState::PrmUp;
        }
        (MrmState::ChkRc, false, true) => {
            inst.swap_ring_ports();
            inst.apply_s_state(driver, ForwardState::Blocked)?;
            inst.apply_p_state(driver, ForwardState::Forwarding)?;
            request_ring_test(inst, transport, cfg.test_interval, now, time_factor)?;
            request_ring_topo(inst, driver, transport, cfg.topo_interval.as_millis() as u16, now, time_factor)?;
            inst.ring_transitions += 1;
            inst.mrm_state = MrmState::PrmUp;
        }
        (MrmState::ChkRc, false, false) => {
            inst.ring_transitions += 1;
            inst.mrm_state = MrmState::PrmUp;
        }
        _ => {
            // Every other (state, up, port) combination is a documented
            // no-op, kept explicit rather than folded into a wildcard.
            trace!(mrm_state = ?inst.mrm_state, up, is_primary, "mrm: link change no-op");
        }
    }
    Ok(())
}

/// This node's own `RingTest` returned (§4.3).
pub fn on_own_ring_test_returned(
    inst: &mut Instance,
    driver: &dyn BridgeDriver,
    transport: &dyn PacketTransport,
    now: Instant,
    time_factor: u32,
) -> DriverResult {
    let cfg = inst.recovery_class.ring_timer_config();
    match inst.mrm_state {
        MrmState::AcStat1 => {}
        MrmState::PrmUp => {
            inst.ring_test_curr_max = cfg.test_conf_max.saturating_sub(1);
            inst.ring_test_curr = 0;
            inst.no_tc = false;
            request_ring_test(inst, transport, cfg.test_interval, now, time_factor)?;
            inst.mrm_state = MrmState::ChkRc;
        }
        MrmState::ChkRo => {
            inst.apply_s_state(driver, ForwardState::Blocked)?;
            inst.ring_test_curr_max = cfg.test_conf_max.saturating_sub(1);
            inst.ring_test_curr = 0;
            inst.no_tc = false;
            request_ring_test(inst, transport, cfg.test_interval, now, time_factor)?;
            let topo_ms = if inst.react_on_link_change { 0 } else { cfg.topo_interval.as_millis() as u16 };
            request_ring_topo(inst, driver, transport, topo_ms, now, time_factor)?;
            inst.mrm_state = MrmState::ChkRc;
        }
        MrmState::ChkRc => {
            inst.ring_test_curr_max = cfg.test_conf_max.saturating_sub(1);
            inst.ring_test_curr = 0;
            inst.no_tc = false;
        }
    }
    Ok(())
}

/// `RingTest` timer expiry (the periodic probe came due without the
/// node's own test having returned since the last expiry).
pub fn on_ring_test_expiry(
    inst: &mut Instance,
    driver: &dyn BridgeDriver,
    transport: &dyn PacketTransport,
    now: Instant,
    time_factor: u32,
) -> DriverResult {
    let cfg = inst.recovery_class.ring_timer_config();
    match inst.mrm_state {
        MrmState::AcStat1 => {}
        MrmState::PrmUp | MrmState::ChkRo => {
            inst.add_test = false;
            request_ring_test(inst, transport, cfg.test_interval, now, time_factor)?;
        }
        MrmState::ChkRc => {
            if inst.ring_test_curr >= inst.ring_test_curr_max {
                inst.apply_s_state(driver, ForwardState::Forwarding)?;
                inst.ring_test_curr_max = cfg.test_conf_max.saturating_sub(1);
                inst.ring_test_curr = 0;
                inst.add_test = false;
                if !inst.no_tc {
                    request_ring_topo(inst, driver, transport, cfg.topo_interval.as_millis() as u16, now, time_factor)?;
                }
                request_ring_test(inst, transport, cfg.test_interval, now, time_factor)?;
                inst.ring_transitions += 1;
                inst.mrm_state = MrmState::ChkRo;
            } else {
                inst.ring_test_curr += 1;
                inst.add_test = false;
                request_ring_test(inst, transport, cfg.test_interval, now, time_factor)?;
            }
        }
    }
    Ok(())
}

/// A neighbour's `RingLinkUp`/`RingLinkDown` TLV arrived on a ring port
/// (§4.3's `MRP_LinkChange` matrix, reproduced from `mrp_recv_ring_link`).
pub fn on_neighbour_ring_link(
    inst: &mut Instance,
    up: bool,
    driver: &dyn BridgeDriver,
    transport: &dyn PacketTransport,
    now: Instant,
    time_factor: u32,
) -> DriverResult {
    let cfg = inst.recovery_class.ring_timer_config();
    match inst.mrm_state {
        MrmState::AcStat1 => {}
        MrmState::PrmUp => {
            if inst.blocked {
                if !inst.add_test {
                    inst.add_test = true;
                    request_ring_test(inst, transport, cfg.test_interval, now, time_factor)?;
                }
            } else if up {
                if !inst.add_test {
                    inst.add_test = true;
                    request_ring_test(inst, transport, cfg.test_short_interval, now, time_factor)?;
                }
                request_ring_topo(inst, driver, transport, 0, now, time_factor)?;
            }
            // down && !blocked: no-op.
        }
        MrmState::ChkRo => {
            if !inst.add_test && up && inst.blocked {
                inst.add_test = true;
                request_ring_test(inst, transport, cfg.test_short_interval, now, time_factor)?;
            } else if inst.add_test && up && inst.blocked {
                // no-op
            } else if inst.add_test && !up {
                // no-op
            } else if !inst.add_test && !up {
                inst.add_test = true;
                request_ring_test(inst, transport, cfg.test_short_interval, now, time_factor)?;
            } else if up && !inst.blocked {
                inst.apply_s_state(driver, ForwardState::Blocked)?;
                inst.ring_test_curr_max = cfg.test_conf_max.saturating_sub(1);
                inst.ring_test_curr = 0;
                if !inst.add_test {
                    request_ring_test(inst, transport, cfg.test_short_interval, now, time_factor)?;
                    inst.add_test = true;
                } else {
                    request_ring_test(inst, transport, cfg.test_interval, now, time_factor)?;
                }
                request_ring_topo(inst, driver, transport, 0, now, time_factor)?;
                inst.mrm_state = MrmState::ChkRc;
            }
        }
        MrmState::ChkRc => {
            if inst.add_test && !inst.react_on_link_change && inst.blocked {
                // no-op
            } else if !inst.add_test && !inst.react_on_link_change && inst.blocked {
                inst.add_test = true;
                request_ring_test(inst, transport, cfg.test_short_interval, now, time_factor)?;
            } else if !up && inst.react_on_link_change {
                inst.apply_s_state(driver, ForwardState::Forwarding)?;
                inst.ring_transitions += 1;
                request_ring_topo(inst, driver, transport, 0, now, time_factor)?;
                inst.mrm_state = MrmState::ChkRo;
            } else if up && inst.react_on_link_change {
                inst.ring_test_curr_max = cfg.test_conf_max.saturating_sub(1);
                request_ring_topo(inst, driver, transport, 0, now, time_factor)?;
            }
        }
    }
    Ok(())
}

// --- MRA election extension (§4.5) ---

/// Numerically-lower-priority-wins comparison against this node's own
/// `(prio, mac)`; ties broken by numerically-lower MAC.
fn better_than_own(inst: &Instance, prio: u16, sa: MacAddr) -> bool {
    prio < inst.prio || (prio == inst.prio && sa < inst.mac)
}

/// Same comparison against the currently tracked best.
fn better_than_tracked(best: Option<RingBest>, prio: u16, sa: MacAddr) -> bool {
    match best {
        None => true,
        Some(b) => prio < b.prio || (prio == b.prio && sa < b.mac),
    }
}

/// Demotes an acting MRM/MRA to MRC, mapping the current `mrm_state` to
/// the matching `mrc_state` per §4.5.
fn step_down_to_mrc(inst: &mut Instance, driver: &dyn BridgeDriver) -> DriverResult {
    let mrc_state = match inst.mrm_state {
        MrmState::PrmUp => MrcState::DeIdle,
        MrmState::ChkRo => MrcState::PtIdle,
        MrmState::ChkRc => MrcState::PtIdle,
        MrmState::AcStat1 => MrcState::AcStat1,
    };
    inst.mrc_state = mrc_state;
    inst.mra_acting_as_mrc = true;
    driver.set_ring_role(inst.key.bridge_ifindex, inst.key.ring_nr, RingRole::Mrc)
}

/// A foreign `RingTest` (one whose `sa` isn't our own mac) arrived; this
/// requires `mra_support`. `ring_role == Mrm` runs the manager side of
/// the election (reply or stay silent); `ring_role == Mra` acting as MRC
/// tracks the best-seen opponent.
pub fn on_foreign_ring_test(
    inst: &mut Instance,
    sa: MacAddr,
    prio: u16,
    transport: &dyn PacketTransport,
) -> DriverResult {
    if inst.acts_as_mrm() {
        if !better_than_own(inst, prio, sa) {
            frames::send_test_mgr_nack(inst, transport, sa)?;
        }
        return Ok(());
    }

    if inst.acts_as_mrc() {
        if sa == inst.ring_best.map(|b| b.mac).unwrap_or(MacAddr::ZERO) {
            return Ok(());
        }
        if better_than_own(inst, prio, sa) {
            inst.ring_mon_curr = 0;
        }
        inst.ring_best = Some(RingBest { prio, mac: sa });
    }
    Ok(())
}

/// A `TestMgrNack` addressed to us arrived. Only meaningful for an MRA
/// still acting as manager (a plain MRC/MRM ignores it, and an MRA
/// already demoted has nothing left to do); steps it down to MRC and
/// propagates the result.
pub fn on_test_mgr_nack(
    inst: &mut Instance,
    sa: MacAddr,
    other_sa: MacAddr,
    prio: u16,
    driver: &dyn BridgeDriver,
    transport: &dyn PacketTransport,
) -> DriverResult {
    if inst.ring_role != RingRole::Mra || inst.mra_acting_as_mrc {
        return Ok(());
    }
    if sa == inst.mac || other_sa != inst.mac {
        return Ok(());
    }

    if better_than_tracked(inst.ring_best, prio, sa) {
        inst.ring_best = Some(RingBest { prio, mac: sa });
    }
    if inst.mrm_state == MrmState::ChkRc {
        inst.apply_s_state(driver, ForwardState::Forwarding)?;
    }
    inst.timers.clear(TimerId::RingTopo);
    inst.mrc_state = MrcState::AcStat1;
    inst.no_tc = false;
    inst.add_test = false;
    frames::send_test_propagate(inst, transport)?;
    step_down_to_mrc(inst, driver)?;
    Ok(())
}

/// A `TestPropagate` Option arrived. Only meaningful for an MRC (a
/// settled MRA-acting-as-manager ignores it); requires the frame to be
/// about us (`sa == our mac`) and `other_prio == own_prio`.
pub fn on_test_propagate(
    inst: &mut Instance,
    sa: MacAddr,
    other_prio: u16,
    prio: u16,
    other_sa: MacAddr,
) {
    if inst.ring_role == RingRole::Mrm || inst.acts_as_mrm() {
        return;
    }
    if sa != inst.mac || other_prio != prio {
        return;
    }
    inst.ring_best = Some(RingBest { prio: other_prio, mac: other_sa });
    inst.ring_mon_curr = 0;
}

/// Ring-monitoring timer expiry: the counter is distinct from
/// `ring_test_curr` and only meaningful while this MRA is demoted to
/// MRC. At or past its configured max, the previously-better manager is
/// presumed gone and this node re-promotes itself.
pub fn on_ring_mon_expiry(
    inst: &mut Instance,
    driver: &dyn BridgeDriver,
    transport: &dyn PacketTransport,
    now: Instant,
    time_factor: u32,
) -> DriverResult {
    if inst.ring_role != RingRole::Mra || !inst.mra_acting_as_mrc {
        return Ok(());
    }
    let cfg = inst.recovery_class.ring_timer_config();
    if inst.ring_mon_curr < cfg.test_conf_max {
        inst.ring_mon_curr += 1;
        inst.timers.set_after(TimerId::RingTest, now, scaled(cfg.test_short_interval, time_factor), None);
        return Ok(());
    }

    inst.timers.set_after(TimerId::RingTest, now, scaled(cfg.test_short_interval, time_factor), None);
    inst.mra_acting_as_mrc = false;
    inst.mrm_state = match inst.mrc_state {
        MrcState::DeIdle | MrcState::De => MrmState::PrmUp,
        MrcState::Pt => MrmState::ChkRc,
        MrcState::PtIdle => MrmState::ChkRo,
        MrcState::AcStat1 => MrmState::AcStat1,
    };
    driver.set_ring_role(inst.key.bridge_ifindex, inst.key.ring_nr, RingRole::Mra)?;
    warn!(bridge = inst.key.bridge_ifindex, ring_nr = inst.key.ring_nr, "mra: re-promoting to manager");
    let _ = transport;
    let _ = ring_ports(inst);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::port::ForwardState;
    use crate::testutil::{mac, mra_instance, mrm_instance, Call, RecordingBridgeDriver, RecordingTransport};

    /// Scenario 1: ring closes on boot. Both ring ports come up, the node's
    /// own `RingTest` returns, and the instance settles in `CHK_RC` with
    /// the secondary Blocked and no FDB flush.
    #[test]
    fn ring_closes_on_boot() {
        let mut inst = mrm_instance(Instance::DEFAULT_PRIO);
        let driver = RecordingBridgeDriver::new();
        let transport = RecordingTransport::new();
        let now = Instant::now();

        on_local_link_change(&mut inst, inst.p.ifindex, true, &driver, &transport, now, 1).unwrap();
        assert_eq!(inst.mrm_state, MrmState::PrmUp);

        on_local_link_change(&mut inst, inst.s.ifindex, true, &driver, &transport, now, 1).unwrap();
        assert_eq!(inst.mrm_state, MrmState::ChkRc);

        on_own_ring_test_returned(&mut inst, &driver, &transport, now, 1).unwrap();
        assert_eq!(inst.mrm_state, MrmState::ChkRc);
        assert_eq!(inst.s.state, ForwardState::Blocked);

        assert!(!driver.calls().iter().any(|c| matches!(c, Call::FlushFdb { .. })));
        assert!(!transport.sent().is_empty());
    }

    /// Scenario 2: link fault in steady `CHK_RC`. Secondary goes down;
    /// expected transition to `PRM_UP` with `ring_transitions` incremented
    /// and no topo frame sent (the no-topo branch of the matrix).
    #[test]
    fn link_fault_in_chk_rc_falls_back_to_prm_up() {
        let mut inst = mrm_instance(Instance::DEFAULT_PRIO);
        let driver = RecordingBridgeDriver::new();
        let transport = RecordingTransport::new();
        let now = Instant::now();
        inst.mrm_state = MrmState::ChkRc;
        let before = inst.ring_transitions;

        on_local_link_change(&mut inst, inst.s.ifindex, false, &driver, &transport, now, 1).unwrap();

        assert_eq!(inst.mrm_state, MrmState::PrmUp);
        assert_eq!(inst.ring_transitions, before + 1);
        assert!(!transport.sent().iter().any(|(_, f)| f.tlvs.iter().any(|t| t.tlv_type() == mrp_proto::TlvType::RingTopo)));
    }

    /// Scenario 3: ring-break detection. `RingTest` stops returning for
    /// `ring_test_conf_max` consecutive intervals; expect the secondary to
    /// go Forwarding, a topo-change request emitted, FDB flushed, and the
    /// state machine moving to `CHK_RO`.
    #[test]
    fn ring_break_detected_after_max_missed_tests() {
        let mut inst = mrm_instance(Instance::DEFAULT_PRIO);
        let driver = RecordingBridgeDriver::new();
        let transport = RecordingTransport::new();
        let now = Instant::now();
        inst.mrm_state = MrmState::ChkRc;
        let cfg = inst.recovery_class.ring_timer_config();
        inst.ring_test_curr_max = cfg.test_conf_max - 1;

        for _ in 0..cfg.test_conf_max {
            on_ring_test_expiry(&mut inst, &driver, &transport, now, 1).unwrap();
        }

        assert_eq!(inst.mrm_state, MrmState::ChkRo);
        assert!(driver
            .calls()
            .iter()
            .any(|c| *c == Call::SetPortState { ifindex: inst.s.ifindex, state: ForwardState::Forwarding }));
        assert!(driver.calls().iter().any(|c| matches!(c, Call::FlushFdb { .. })));
    }

    /// Scenario 4: MRA election. The better (lower-priority) node sees the
    /// worse node's `RingTest` and sends a `TestMgrNack`; the worse node
    /// never needs to self-assess (the standard's "if the other is worse,
    /// reply with TestMgrNack" is observed from the winner's side here),
    /// and only steps down once that nack, addressed to it, arrives.
    #[test]
    fn mra_election_winner_nacks_loser() {
        let mut winner = mra_instance(0x9000);
        let transport = RecordingTransport::new();
        winner.mrm_state = MrmState::ChkRc;

        // winner observes the worse node's (0xA000) foreign RingTest.
        on_foreign_ring_test(&mut winner, mac(9), 0xA000, &transport).unwrap();

        let sent = transport.sent();
        assert!(sent.iter().any(|(_, f)| f.tlvs.iter().any(|t| matches!(
            t,
            mrp_proto::Tlv::Option(mrp_proto::SubTlv::TestMgrNack { other_sa, .. }) if *other_sa == mac(9)
        ))));
    }

    /// The worse node steps down only once the winner's nack, addressed to
    /// it, is actually delivered -- the standard's "step down" is realized
    /// here as the receiving side of `TestMgrNack`, not a self-assessment
    /// on the original foreign `RingTest`.
    #[test]
    fn mra_election_demotes_higher_prio_node() {
        let mut loser = mra_instance(0xA000);
        let driver = RecordingBridgeDriver::new();
        let transport = RecordingTransport::new();
        loser.mrm_state = MrmState::ChkRc;

        // The winner's nack names `other_sa = loser.mac`: "you, step down".
        on_test_mgr_nack(&mut loser, mac(9), loser.mac, 0x9000, &driver, &transport).unwrap();

        assert!(loser.mra_acting_as_mrc);
        assert_eq!(loser.mrc_state, MrcState::PtIdle);
        assert!(driver
            .calls()
            .iter()
            .any(|c| *c == Call::SetRingRole { bridge_ifindex: loser.key.bridge_ifindex, ring_nr: loser.key.ring_nr, role: RingRole::Mrc }));
        assert!(transport.sent().iter().any(|(_, f)| f
            .tlvs
            .iter()
            .any(|t| matches!(t, mrp_proto::Tlv::Option(mrp_proto::SubTlv::TestPropagate { .. })))));
    }

    #[test]
    fn better_than_own_prefers_lower_priority_then_lower_mac() {
        let inst = mrm_instance(0x8000);
        assert!(better_than_own(&inst, 0x7000, mac(9)));
        assert!(!better_than_own(&inst, 0x9000, mac(9)));
        assert!(better_than_own(&inst, 0x8000, mac(0)));
    }
}
