// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The MRP protocol core: per-instance state machines, the timer-driven
//! frame emission they depend on, the instance registry, and the event
//! router that feeds frames/links/timers into the right handler.
//!
//! This crate knows nothing about sockets, netlink, or process
//! configuration; those live in the `mrp-bridge`/`mrp-packet` driver
//! crates and the `mrpd` binary. It depends on [`mrp_proto`] for the wire
//! codec and [`mrp_timer`] for the timer multiplexer.

pub mod driver;
pub mod error;
pub mod frames;
pub mod instance;
pub mod mic;
pub mod mim;
pub mod mrc;
pub mod mrm;
pub mod port;
pub mod ratelimit;
pub mod registry;
pub mod router;
#[cfg(test)]
mod testutil;
pub mod timers;

pub use error::{Error, Result};
pub use instance::{
    CfmAssoc, InMode, InRole, Instance, InstanceKey, MicState, MimState, MrcState, MrmState,
    RingBest, RingRole,
};
pub use port::{ForwardState, OperState, Port, PortRole};
pub use registry::{InstanceHandle, Registry, MAX_MRP_INSTANCES};
pub use router::{AddRequest, EventRouter, LinkEvent};
pub use timers::{RecoveryClass, TimerId};
