// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! MIM interconnect-manager state machine (§4.6). Mirrors [`crate::mrm`]
//! restricted to the single interconnect port. Handlers assume the caller
//! holds the instance's lock and that `inst.in_role == InRole::Mim`.

use std::time::Instant;

use tracing::trace;

use crate::driver::{BridgeDriver, DriverResult, PacketTransport};
use crate::frames;
use crate::instance::{Instance, MimState};
use crate::port::ForwardState;
use crate::timers::{scaled, TimerId};

fn request_in_test(
    inst: &mut Instance,
    transport: &dyn PacketTransport,
    now: Instant,
    time_factor: u32,
) -> DriverResult {
    frames::send_in_test(inst, transport)?;
    let cfg = inst.recovery_class.in_timer_config();
    inst.timers.set_after(TimerId::InTest, now, scaled(cfg.test_interval, time_factor), None);
    Ok(())
}

/// The interconnect's liveness signal changed: kernel operstate in RC
/// mode, CFM peer-defect in LC mode. `up = true` means newly live.
///
/// Re-asserts the interconnect port blocked on every real transition --
/// it is never put into forwarding here or anywhere else in this state
/// machine, only data traffic is kept off it, and a blocked port already
/// passes MRP control TLVs.
pub fn on_interconnect_change(
    inst: &mut Instance,
    up: bool,
    driver: &dyn BridgeDriver,
    transport: &dyn PacketTransport,
    now: Instant,
    time_factor: u32,
) -> DriverResult {
    match (inst.mim_state, up) {
        (MimState::AcStat1, true) => {
            inst.in_test_curr = 0;
            inst.apply_i_state(driver, ForwardState::Blocked)?;
            request_in_test(inst, transport, now, time_factor)?;
            inst.mim_state = MimState::ChkIo;
        }
        (MimState::ChkIo, false) | (MimState::ChkIc, false) => {
            inst.timers.clear(TimerId::InTest);
            inst.apply_i_state(driver, ForwardState::Blocked)?;
            inst.mim_state = MimState::AcStat1;
        }
        _ => {
            trace!(mim_state = ?inst.mim_state, up, "mim: interconnect change no-op");
        }
    }
    Ok(())
}

/// This node's own `InTest` returned on the interconnect: the secondary
/// ring has proven a closed path through the interconnect. The
/// interconnect port stays blocked regardless -- only ordinary data
/// traffic is kept off it, and `mrp_should_drop`'s exemption list already
/// lets MRP control TLVs past a blocked port.
pub fn on_own_in_test_returned(inst: &mut Instance, driver: &dyn BridgeDriver) -> DriverResult {
    if inst.mim_state == MimState::ChkIo {
        inst.in_test_curr = 0;
        inst.apply_i_state(driver, ForwardState::Blocked)?;
        inst.mim_state = MimState::ChkIc;
    }
    Ok(())
}

/// `in_test` timer expiry: no own frame returned since the last expiry.
pub fn on_in_test_expiry(
    inst: &mut Instance,
    driver: &dyn BridgeDriver,
    transport: &dyn PacketTransport,
    now: Instant,
    time_factor: u32,
) -> DriverResult {
    let cfg = inst.recovery_class.in_timer_config();
    match inst.mim_state {
        MimState::AcStat1 => {}
        MimState::ChkIo => {
            request_in_test(inst, transport, now, time_factor)?;
        }
        MimState::ChkIc => {
            if inst.in_test_curr >= cfg.test_conf_max {
                inst.in_test_curr = 0;
                inst.in_transitions += 1;
                frames::send_in_topo(inst, transport, cfg.topo_interval.as_millis() as u16)?;
                request_in_test(inst, transport, now, time_factor)?;
                inst.mim_state = MimState::ChkIo;
            } else {
                inst.in_test_curr += 1;
                request_in_test(inst, transport, now, time_factor)?;
            }
        }
    }
    let _ = driver;
    Ok(())
}

/// In LC mode, `InLinkStatusPoll` arriving from the MIC substitutes for a
/// kernel-observed link-up: it's evidence of interconnect liveness this
/// node cannot otherwise see. Resets the status-loss counter.
pub fn on_in_link_status_poll(inst: &mut Instance) {
    inst.in_link_status_curr = 0;
}

/// `in_link_status` timer expiry (LC mode only): counts consecutive polls
/// missed from the MIC. At the configured max, the interconnect is
/// presumed down.
pub fn on_in_link_status_expiry(
    inst: &mut Instance,
    driver: &dyn BridgeDriver,
    transport: &dyn PacketTransport,
    now: Instant,
    time_factor: u32,
) -> DriverResult {
    let cfg = inst.recovery_class.in_timer_config();
    inst.in_link_status_curr += 1;
    if inst.in_link_status_curr >= cfg.test_conf_max {
        on_interconnect_change(inst, false, driver, transport, now, time_factor)?;
    } else {
        inst.timers.set_after(TimerId::InLinkStatus, now, scaled(cfg.link_interval, time_factor), None);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::time::Instant;

    use super::*;
    use crate::instance::{InRole, RingRole};
    use crate::testutil::{interconnect_instance, RecordingBridgeDriver, RecordingTransport};

    #[test]
    fn interconnect_up_then_own_test_returned_reaches_chk_ic() {
        let mut inst = interconnect_instance(RingRole::Mrm, InRole::Mim);
        let driver = RecordingBridgeDriver::new();
        let transport = RecordingTransport::new();
        let now = Instant::now();

        on_interconnect_change(&mut inst, true, &driver, &transport, now, 1).unwrap();
        assert_eq!(inst.mim_state, MimState::ChkIo);
        assert!(inst.timers.is_armed(TimerId::InTest));
        assert_eq!(inst.i.as_ref().unwrap().state, ForwardState::Blocked);

        on_own_in_test_returned(&mut inst, &driver).unwrap();
        assert_eq!(inst.mim_state, MimState::ChkIc);
        assert!(driver.calls().iter().any(|c| matches!(
            c,
            crate::testutil::Call::SetPortState { ifindex, state }
                if *ifindex == inst.i.as_ref().unwrap().ifindex && *state == ForwardState::Blocked
        )));
    }

    #[test]
    fn in_test_expiry_in_chk_ic_announces_topology_change_after_max_missed() {
        let mut inst = interconnect_instance(RingRole::Mrm, InRole::Mim);
        let driver = RecordingBridgeDriver::new();
        let transport = RecordingTransport::new();
        let now = Instant::now();
        let cfg = inst.recovery_class.in_timer_config();

        inst.mim_state = MimState::ChkIc;
        inst.in_test_curr = cfg.test_conf_max;

        on_in_test_expiry(&mut inst, &driver, &transport, now, 1).unwrap();

        assert_eq!(inst.mim_state, MimState::ChkIo);
        assert_eq!(inst.in_transitions, 1);
        assert!(transport.sent().iter().any(|(_, f)| f
            .tlvs
            .iter()
            .any(|t| matches!(t, mrp_proto::Tlv::InTopoChange { .. }))));
    }

    #[test]
    fn interconnect_down_resets_to_ac_stat1() {
        let mut inst = interconnect_instance(RingRole::Mrm, InRole::Mim);
        let driver = RecordingBridgeDriver::new();
        let transport = RecordingTransport::new();
        let now = Instant::now();
        inst.mim_state = MimState::ChkIc;
        inst.timers.set_after(TimerId::InTest, now, std::time::Duration::from_millis(50), None);

        on_interconnect_change(&mut inst, false, &driver, &transport, now, 1).unwrap();

        assert_eq!(inst.mim_state, MimState::AcStat1);
        assert!(!inst.timers.is_armed(TimerId::InTest));
    }
}
