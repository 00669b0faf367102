// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! MIC interconnect-client state machine (§4.6). Handlers assume the
//! caller holds the instance's lock and that `inst.in_role == InRole::Mic`.

use std::time::{Duration, Instant};

use tracing::trace;

use crate::driver::{BridgeDriver, DriverResult, PacketTransport};
use crate::frames;
use crate::instance::{InMode, Instance, MicState};
use crate::port::ForwardState;
use crate::timers::{scaled, TimerId};

/// The interconnect's liveness signal changed: kernel operstate in RC
/// mode, CFM peer-defect in LC mode. Every real transition tells the MIM
/// about it with an `InLinkUp`/`InLinkDown`, since the MIC is this node's
/// only witness to its own interconnect link.
pub fn on_interconnect_change(
    inst: &mut Instance,
    up: bool,
    driver: &dyn BridgeDriver,
    transport: &dyn PacketTransport,
    now: Instant,
    time_factor: u32,
) -> DriverResult {
    let cfg = inst.recovery_class.in_timer_config();
    let interval_ms = cfg.link_interval.as_millis() as u16;
    match (inst.mic_state, up) {
        (MicState::AcStat1, true) => {
            inst.mic_state = MicState::Pt;
            frames::send_in_link(inst, transport, up, interval_ms)?;
        }
        (MicState::Pt, false) | (MicState::IpIdle, false) => {
            inst.apply_i_state(driver, ForwardState::Blocked)?;
            inst.mic_state = MicState::AcStat1;
            frames::send_in_link(inst, transport, up, interval_ms)?;
        }
        _ => trace!(mic_state = ?inst.mic_state, up, "mic: interconnect change no-op"),
    }
    let _ = (now, time_factor);
    Ok(())
}

fn all_flush_ports(inst: &Instance) -> Vec<u32> {
    [inst.p.ifindex, inst.s.ifindex].into_iter().chain(inst.i.as_ref().map(|i| i.ifindex)).collect()
}

/// An `InTopoChange` arrived from the MIM while passing through. Schedules
/// an FDB flush for the announced interval and idles until the MIM's
/// liveness signal is seen again.
pub fn on_in_topo_received(
    inst: &mut Instance,
    interval_ms: u16,
    now: Instant,
    time_factor: u32,
) -> DriverResult {
    if inst.mic_state != MicState::Pt {
        trace!(mic_state = ?inst.mic_state, "mic: in topo change ignored outside pt");
        return Ok(());
    }
    let delay = Duration::from_micros(interval_ms as u64 * 1000);
    inst.timers.set_after(TimerId::ClearFdb, now, scaled(delay, time_factor), None);
    inst.mic_state = MicState::IpIdle;
    Ok(())
}

pub fn on_clear_fdb_expiry(inst: &Instance, driver: &dyn BridgeDriver) -> DriverResult {
    driver.flush_fdb(&all_flush_ports(inst))
}

/// `IP_IDLE -> PT` recovery: in RC mode an `InLinkUp` on the interconnect
/// port is the signal; in LC mode it's the next `InLinkStatusPoll` this
/// node itself emits having been acknowledged by continued CFM health
/// (modeled here as simply observing the interconnect still up).
pub fn on_in_link_up_or_poll_ack(inst: &mut Instance) {
    if inst.mic_state == MicState::IpIdle {
        inst.mic_state = MicState::Pt;
    }
}

/// In LC mode, periodically polls the MIM for interconnect liveness since
/// this node cannot observe the MIM's own operstate. Independent of the
/// `Pt`/`IpIdle` transitions above -- it keeps running whenever the
/// interconnect is configured for link-check.
pub fn on_in_link_status_expiry(
    inst: &mut Instance,
    transport: &dyn PacketTransport,
    now: Instant,
    time_factor: u32,
) -> DriverResult {
    if inst.in_mode != InMode::Lc {
        return Ok(());
    }
    frames::send_in_link_status(inst, transport)?;
    let cfg = inst.recovery_class.in_timer_config();
    inst.timers.set_after(TimerId::InLinkStatus, now, scaled(cfg.link_interval, time_factor), None);
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::time::Instant;

    use super::*;
    use crate::instance::{InRole, RingRole};
    use crate::testutil::{interconnect_instance, RecordingBridgeDriver, RecordingTransport};

    #[test]
    fn topo_change_in_pt_schedules_flush_and_idles() {
        let mut inst = interconnect_instance(RingRole::Mrc, InRole::Mic);
        let driver = RecordingBridgeDriver::new();
        let now = Instant::now();
        inst.mic_state = MicState::Pt;

        on_in_topo_received(&mut inst, 20, now, 1).unwrap();
        assert_eq!(inst.mic_state, MicState::IpIdle);
        let (deadline, _) = inst.timers.get(TimerId::ClearFdb).expect("clear_fdb armed");
        assert_eq!(deadline, now + Duration::from_millis(20));

        on_clear_fdb_expiry(&inst, &driver).unwrap();
        assert!(driver.calls().iter().any(|c| matches!(
            c,
            crate::testutil::Call::FlushFdb { ifindexes }
                if ifindexes.contains(&inst.p.ifindex)
                    && ifindexes.contains(&inst.s.ifindex)
                    && ifindexes.contains(&inst.i.as_ref().unwrap().ifindex)
        )));
    }

    #[test]
    fn topo_change_ignored_outside_pt() {
        let mut inst = interconnect_instance(RingRole::Mrc, InRole::Mic);
        let now = Instant::now();
        inst.mic_state = MicState::AcStat1;

        on_in_topo_received(&mut inst, 20, now, 1).unwrap();
        assert_eq!(inst.mic_state, MicState::AcStat1);
        assert!(!inst.timers.is_armed(TimerId::ClearFdb));
    }

    #[test]
    fn link_up_recovers_from_ip_idle() {
        let mut inst = interconnect_instance(RingRole::Mrc, InRole::Mic);
        inst.mic_state = MicState::IpIdle;
        on_in_link_up_or_poll_ack(&mut inst);
        assert_eq!(inst.mic_state, MicState::Pt);
    }

    #[test]
    fn link_status_poll_only_sent_in_lc_mode() {
        use crate::instance::InMode;

        let mut inst = interconnect_instance(RingRole::Mrc, InRole::Mic);
        let driver = RecordingBridgeDriver::new();
        let transport = RecordingTransport::new();
        let now = Instant::now();

        inst.in_mode = InMode::Rc;
        on_in_link_status_expiry(&mut inst, &driver, &transport, now, 1).unwrap();
        assert!(transport.sent().is_empty());

        inst.in_mode = InMode::Lc;
        on_in_link_status_expiry(&mut inst, &driver, &transport, now, 1).unwrap();
        assert!(!transport.sent().is_empty());
    }

    #[test]
    fn interconnect_up_sends_in_link_up_and_reaches_pt() {
        let mut inst = interconnect_instance(RingRole::Mrc, InRole::Mic);
        let driver = RecordingBridgeDriver::new();
        let transport = RecordingTransport::new();
        let now = Instant::now();

        on_interconnect_change(&mut inst, true, &driver, &transport, now, 1).unwrap();

        assert_eq!(inst.mic_state, MicState::Pt);
        assert!(transport.sent().iter().any(|(_, f)| f
            .tlvs
            .iter()
            .any(|t| matches!(t, mrp_proto::Tlv::InLinkUp { .. }))));
    }

    #[test]
    fn interconnect_down_from_pt_blocks_i_port_and_sends_in_link_down() {
        let mut inst = interconnect_instance(RingRole::Mrc, InRole::Mic);
        let driver = RecordingBridgeDriver::new();
        let transport = RecordingTransport::new();
        let now = Instant::now();
        inst.mic_state = MicState::Pt;

        on_interconnect_change(&mut inst, false, &driver, &transport, now, 1).unwrap();

        assert_eq!(inst.mic_state, MicState::AcStat1);
        assert_eq!(inst.i.as_ref().unwrap().state, ForwardState::Blocked);
        assert!(driver.calls().iter().any(|c| matches!(
            c,
            crate::testutil::Call::SetPortState { ifindex, state }
                if *ifindex == inst.i.as_ref().unwrap().ifindex && *state == ForwardState::Blocked
        )));
        assert!(transport.sent().iter().any(|(_, f)| f
            .tlvs
            .iter()
            .any(|t| matches!(t, mrp_proto::Tlv::InLinkDown { .. }))));
    }
}
