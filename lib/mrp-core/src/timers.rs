// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::time::Duration;

use enum_map::Enum;
use mrp_timer::Wheel;

/// The eleven named timers an instance owns, multiplexed over one
/// `mrp_timer::Wheel`.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Enum)]
pub enum TimerId {
    ClearFdb,
    RingTopo,
    RingTest,
    RingLinkUp,
    RingLinkDown,
    InTest,
    InTopo,
    InLinkUp,
    InLinkDown,
    InLinkStatus,
    CfmCcm,
}

pub type InstanceTimers = Wheel<TimerId>;

/// Recovery-class selector driving the timer defaults in §4.2.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum RecoveryClass {
    Ms500,
    Ms200,
    Ms30,
    Ms10,
}

/// Ring-side timer defaults for a recovery class.
#[derive(Copy, Clone, Debug)]
pub struct RingTimerConfig {
    pub topo_interval: Duration,
    /// Number of times a topology-change request with `interval > 0`
    /// repeats before stopping (observed as 3 repeats at 20ms in the
    /// reference 500ms-class scenario).
    pub topo_conf_max: u32,
    pub test_interval: Duration,
    pub test_short_interval: Duration,
    pub test_conf_max: u32,
    pub link_interval: Duration,
    pub link_conf_max: u32,
}

impl RecoveryClass {
    pub fn ring_timer_config(self) -> RingTimerConfig {
        match self {
            RecoveryClass::Ms500 => RingTimerConfig {
                topo_interval: Duration::from_millis(20),
                topo_conf_max: 3,
                test_interval: Duration::from_millis(50),
                test_short_interval: Duration::from_millis(30),
                test_conf_max: 5,
                link_interval: Duration::from_millis(100),
                link_conf_max: 4,
            },
            RecoveryClass::Ms200 => RingTimerConfig {
                topo_interval: Duration::from_millis(10),
                topo_conf_max: 3,
                test_interval: Duration::from_millis(20),
                test_short_interval: Duration::from_millis(10),
                test_conf_max: 3,
                link_interval: Duration::from_millis(20),
                link_conf_max: 4,
            },
            RecoveryClass::Ms30 => RingTimerConfig {
                topo_interval: Duration::from_micros(500),
                topo_conf_max: 3,
                test_interval: Duration::from_micros(3_500),
                test_short_interval: Duration::from_millis(1),
                test_conf_max: 3,
                link_interval: Duration::from_millis(1),
                link_conf_max: 4,
            },
            RecoveryClass::Ms10 => RingTimerConfig {
                topo_interval: Duration::from_micros(500),
                topo_conf_max: 3,
                test_interval: Duration::from_millis(1),
                test_short_interval: Duration::from_micros(500),
                test_conf_max: 3,
                link_interval: Duration::from_millis(1),
                link_conf_max: 4,
            },
        }
    }

    /// Interconnect-side timer defaults. The spec only tabulates 500/200ms
    /// classes for the interconnect; the 30/10ms ring classes fall back to
    /// the 200ms interconnect figures (documented in DESIGN.md — the
    /// reference implementation does not define faster interconnect
    /// recovery classes).
    pub fn in_timer_config(self) -> InTimerConfig {
        match self {
            RecoveryClass::Ms500 => InTimerConfig {
                topo_interval: Duration::from_millis(20),
                test_interval: Duration::from_millis(50),
                test_conf_max: 8,
                link_interval: Duration::from_millis(20),
            },
            RecoveryClass::Ms200 | RecoveryClass::Ms30 | RecoveryClass::Ms10 => InTimerConfig {
                topo_interval: Duration::from_millis(10),
                test_interval: Duration::from_millis(20),
                test_conf_max: 8,
                link_interval: Duration::from_millis(20),
            },
        }
    }
}

#[derive(Copy, Clone, Debug)]
pub struct InTimerConfig {
    pub topo_interval: Duration,
    pub test_interval: Duration,
    pub test_conf_max: u32,
    pub link_interval: Duration,
}

/// Multiplies a base interval by the global debugging time factor. A
/// factor of 1 is a no-op; the CLI's `-T`/`--time-factor` sets this.
pub fn scaled(base: Duration, time_factor: u32) -> Duration {
    base * time_factor.max(1)
}
