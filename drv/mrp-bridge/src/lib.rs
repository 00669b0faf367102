// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The bridge-driver backends, link/MAC event source, optional event
//! bus, and CFM peer-status input (§6): everything `mrp-core` treats as
//! an external collaborator rather than owning itself.

mod cfm;
mod event_bus;
mod fakes;
mod kernel;
mod link_monitor;
mod netlink;
mod textual;

pub use cfm::{CfmSource, ChannelCfmSource, NullCfmSource};
pub use event_bus::TextEventBus;
pub use fakes::{Call, RecordingBridgeDriver};
pub use kernel::KernelBridgeDriver;
pub use link_monitor::LinkMonitor;
pub use textual::TextualBridgeDriver;
