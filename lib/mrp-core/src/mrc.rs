// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! MRC ring-client state machine (§4.4). Mirrors [`crate::mrm`]'s shape:
//! handlers assume the caller already holds the instance's lock and has
//! determined this instance is currently acting as a client
//! (`Instance::acts_as_mrc`).

use std::time::{Duration, Instant};

use tracing::trace;

use crate::driver::{BridgeDriver, DriverResult, PacketTransport};
use crate::frames;
use crate::instance::{Instance, MrcState};
use crate::port::ForwardState;
use crate::timers::{scaled, TimerId};

/// Sends one `RingLinkUp`/`RingLinkDown` with the current
/// `ring_link_curr_max × link_interval` and arms the matching timer to
/// repeat, decrementing the counter each time so neighbours can see the
/// signal winding down.
fn request_ring_link(
    inst: &mut Instance,
    transport: &dyn PacketTransport,
    up: bool,
    now: Instant,
    time_factor: u32,
) -> DriverResult {
    let cfg = inst.recovery_class.ring_timer_config();
    inst.ring_link_curr_max = cfg.link_conf_max;
    send_and_rearm_ring_link(inst, transport, up, cfg.link_interval, now, time_factor)
}

fn send_and_rearm_ring_link(
    inst: &mut Instance,
    transport: &dyn PacketTransport,
    up: bool,
    link_interval: Duration,
    now: Instant,
    time_factor: u32,
) -> DriverResult {
    let interval_ms = (inst.ring_link_curr_max as u64 * link_interval.as_millis() as u64) as u16;
    frames::send_ring_link(inst, transport, up, interval_ms)?;
    let which = if up { TimerId::RingLinkUp } else { TimerId::RingLinkDown };
    inst.timers.set_after(which, now, scaled(link_interval, time_factor), None);
    Ok(())
}

/// `ring_link_up`/`ring_link_down` timer expiry: resend at a decreasing
/// interval until the repeat counter is exhausted, then stop.
pub fn on_ring_link_expiry(
    inst: &mut Instance,
    transport: &dyn PacketTransport,
    up: bool,
    now: Instant,
    time_factor: u32,
) -> DriverResult {
    let cfg = inst.recovery_class.ring_timer_config();
    if inst.ring_link_curr_max > 1 {
        inst.ring_link_curr_max -= 1;
        send_and_rearm_ring_link(inst, transport, up, cfg.link_interval, now, time_factor)
    } else {
        inst.ring_link_curr_max = 0;
        let which = if up { TimerId::RingLinkUp } else { TimerId::RingLinkDown };
        inst.timers.clear(which);
        Ok(())
    }
}

/// A local ring port's link changed (§4.4's full matrix).
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

    match (inst.mrc_state, up, is_primary) {
        (MrcState::AcStat1, true, true) => {
            inst.apply_p_state(driver, ForwardState::Forwarding)?;
            inst.mrc_state = MrcState::DeIdle;
        }
        (MrcState::AcStat1, true, false) => {
            inst.swap_ring_ports();
            inst.apply_p_state(driver, ForwardState::Forwarding)?;
            inst.mrc_state = MrcState::DeIdle;
        }
        (MrcState::DeIdle, true, false) => {
            inst.timers.clear(TimerId::RingLinkDown);
            request_ring_link(inst, transport, true, now, time_factor)?;
            inst.mrc_state = MrcState::Pt;
        }
        (MrcState::DeIdle, false, true) => {
            inst.apply_p_state(driver, ForwardState::Blocked)?;
            inst.mrc_state = MrcState::AcStat1;
        }
        (MrcState::Pt, false, false) => {
            inst.timers.clear(TimerId::RingLinkUp);
            inst.apply_s_state(driver, ForwardState::Blocked)?;
            request_ring_link(inst, transport, false, now, time_factor)?;
            inst.mrc_state = MrcState::De;
        }
        (MrcState::Pt, false, true) => {
            inst.timers.clear(TimerId::RingLinkUp);
            inst.swap_ring_ports();
            inst.apply_p_state(driver, ForwardState::Forwarding)?;
            inst.apply_s_state(driver, ForwardState::Blocked)?;
            request_ring_link(inst, transport, false, now, time_factor)?;
            inst.mrc_state = MrcState::De;
        }
        (MrcState::De, true, false) => {
            inst.timers.clear(TimerId::RingLinkDown);
            request_ring_link(inst, transport, true, now, time_factor)?;
            inst.mrc_state = MrcState::Pt;
        }
        (MrcState::De, false, true) => {
            inst.apply_p_state(driver, ForwardState::Blocked)?;
            inst.timers.clear(TimerId::RingLinkDown);
            inst.mrc_state = MrcState::AcStat1;
        }
        _ => {
            trace!(mrc_state = ?inst.mrc_state, up, is_primary, "mrc: link change no-op");
        }
    }
    Ok(())
}

/// A `RingTopoChange` arrived from the manager. Only meaningful while in
/// `Pt` or `De`; schedules an FDB flush for the announced interval and
/// stops whatever ring-link repetition is in flight.
pub fn on_ring_topo_received(
    inst: &mut Instance,
    interval_ms: u16,
    driver: &dyn BridgeDriver,
    now: Instant,
    time_factor: u32,
) -> DriverResult {
    match inst.mrc_state {
        MrcState::Pt => {
            inst.timers.clear(TimerId::RingLinkUp);
            inst.apply_s_state(driver, ForwardState::Forwarding)?;
            schedule_clear_fdb(inst, driver, interval_ms, now, time_factor)?;
            inst.mrc_state = MrcState::PtIdle;
        }
        MrcState::De => {
            inst.timers.clear(TimerId::RingLinkDown);
            schedule_clear_fdb(inst, driver, interval_ms, now, time_factor)?;
            inst.mrc_state = MrcState::DeIdle;
        }
        _ => {
            trace!(mrc_state = ?inst.mrc_state, "mrc: ring topo change ignored outside pt/de");
        }
    }
    Ok(())
}

fn all_flush_ports(inst: &Instance) -> Vec<u32> {
    [inst.p.ifindex, inst.s.ifindex].into_iter().chain(inst.i.as_ref().map(|i| i.ifindex)).collect()
}

/// Schedules `clear_fdb` for `interval_ms` (converted to µs at the point
/// of receipt, not by the timer engine itself). On expiry the flush runs
/// immediately -- `clear_fdb`'s handler, not this function, performs it.
fn schedule_clear_fdb(
    inst: &mut Instance,
    _driver: &dyn BridgeDriver,
    interval_ms: u16,
    now: Instant,
    time_factor: u32,
) -> DriverResult {
    let delay = Duration::from_micros(interval_ms as u64 * 1000);
    inst.timers.set_after(TimerId::ClearFdb, now, scaled(delay, time_factor), None);
    Ok(())
}

/// `clear_fdb` timer expiry: perform the flush scheduled by
/// [`schedule_clear_fdb`] (or by the MRM's `t=0` topo request).
pub fn on_clear_fdb_expiry(inst: &Instance, driver: &dyn BridgeDriver) -> DriverResult {
    driver.flush_fdb(&all_flush_ports(inst))
}

/// Returns to `Pt` from `PtIdle` on the next ring-link-bearing event from
/// the manager (mirrors how an MRC leaves `PT_IDLE`). Not itself a link
/// event -- called when the router sees a `RingLinkUp`/`RingLinkDown`
/// addressed to us while idle, which the MRP standard treats as evidence
/// the manager is still polling.
pub fn on_idle_timeout_recovery(inst: &mut Instance) {
    inst.mrc_state = match inst.mrc_state {
        MrcState::PtIdle => MrcState::Pt,
        MrcState::DeIdle => MrcState::DeIdle,
        other => other,
    };
}

#[cfg(test)]
mod tests {
    use std::time::Instant;

    use super::*;
    use crate::testutil::{mrc_instance, RecordingBridgeDriver, RecordingTransport};

    /// Both ring links come up while idle: primary first brings the node
    /// to `DE_IDLE` forwarding, then the secondary coming up starts the
    /// ring-link-up repeat and moves to `PT`.
    #[test]
    fn both_links_up_reaches_pt() {
        let mut inst = mrc_instance();
        let driver = RecordingBridgeDriver::new();
        let transport = RecordingTransport::new();
        let now = Instant::now();

        on_local_link_change(&mut inst, inst.p.ifindex, true, &driver, &transport, now, 1).unwrap();
        assert_eq!(inst.mrc_state, MrcState::DeIdle);
        assert_eq!(inst.p.state, ForwardState::Forwarding);

        on_local_link_change(&mut inst, inst.s.ifindex, true, &driver, &transport, now, 1).unwrap();
        assert_eq!(inst.mrc_state, MrcState::Pt);
        assert!(inst.timers.is_armed(TimerId::RingLinkUp));
    }

    /// In `PT`, a `RingTopoChange` with a non-zero interval stops the
    /// in-flight ring-link-up repeat, opens the secondary for forwarding,
    /// schedules the FDB flush at the announced interval, and idles.
    #[test]
    fn ring_topo_in_pt_opens_secondary_and_schedules_flush() {
        let mut inst = mrc_instance();
        let driver = RecordingBridgeDriver::new();
        let transport = RecordingTransport::new();
        let now = Instant::now();

        on_local_link_change(&mut inst, inst.p.ifindex, true, &driver, &transport, now, 1).unwrap();
        on_local_link_change(&mut inst, inst.s.ifindex, true, &driver, &transport, now, 1).unwrap();
        assert_eq!(inst.mrc_state, MrcState::Pt);

        on_ring_topo_received(&mut inst, 20, &driver, now, 1).unwrap();

        assert_eq!(inst.mrc_state, MrcState::PtIdle);
        assert_eq!(inst.s.state, ForwardState::Forwarding);
        assert!(!inst.timers.is_armed(TimerId::RingLinkUp));
        let (deadline, _) = inst.timers.get(TimerId::ClearFdb).expect("clear_fdb armed");
        assert_eq!(deadline, now + Duration::from_millis(20));
    }

    /// `clear_fdb` expiry flushes exactly the instance's own ports (no
    /// interconnect port configured here).
    #[test]
    fn clear_fdb_expiry_flushes_ring_ports() {
        let inst = mrc_instance();
        let driver = RecordingBridgeDriver::new();

        on_clear_fdb_expiry(&inst, &driver).unwrap();

        assert!(driver.calls().iter().any(|c| matches!(
            c,
            crate::testutil::Call::FlushFdb { ifindexes } if ifindexes.contains(&inst.p.ifindex) && ifindexes.contains(&inst.s.ifindex)
        )));
    }

    #[test]
    fn idle_timeout_recovery_only_resumes_pt_idle() {
        let mut inst = mrc_instance();
        inst.mrc_state = MrcState::PtIdle;
        on_idle_timeout_recovery(&mut inst);
        assert_eq!(inst.mrc_state, MrcState::Pt);

        inst.mrc_state = MrcState::DeIdle;
        on_idle_timeout_recovery(&mut inst);
        assert_eq!(inst.mrc_state, MrcState::DeIdle);
    }
}
