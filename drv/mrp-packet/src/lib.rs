// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The production `PacketTransport` backend (§6): a raw `AF_PACKET`
//! socket, plus a host-side recording fake for tests that don't want a
//! NIC.

mod fakes;
mod socket;

pub use fakes::RecordingTransport;
pub use socket::{PacketSocketTransport, ETH_P_MRP};
