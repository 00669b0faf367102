// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Wire codec for Media Redundancy Protocol (IEC 62439-2) PDUs.
//!
//! This crate only knows about bytes: encoding and decoding Ethernet
//! frames carrying MRP TLVs. It has no notion of ports, instances, or
//! state machines — those live in `mrp-core`.

mod error;
mod frame;
mod macaddr;
mod tlv;
mod wire;

pub use error::{Error, Result};
pub use frame::{Frame, MrpDestination};
pub use macaddr::MacAddr;
pub use tlv::{PortRole, RingState, SubTlv, Tlv, TlvType};
pub use wire::{ETHERNET_HEADER_LEN, ETHERTYPE_MRP, MIN_FRAME_LEN, MRP_VERSION};
