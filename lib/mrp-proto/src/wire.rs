// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! On-the-wire layouts. Every struct here is `repr(C)`, `Unaligned`, and
//! `FromBytes`/`IntoBytes` so it can be cast directly over a byte slice
//! without manual field-by-field shifting, following the same pattern the
//! platform's network structs use for their register/packet layouts.

use zerocopy::byteorder::{BigEndian, U16, U32};
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned};

use crate::macaddr::MacAddr;

pub const ETHERTYPE_MRP: u16 = 0x88e3;
pub const MRP_VERSION: u16 = 0x0001;

/// The four well-known destination MACs, all `01:15:4E:00:00:0n`.
pub const DST_TEST: MacAddr = MacAddr::new([0x01, 0x15, 0x4e, 0x00, 0x00, 0x01]);
pub const DST_CONTROL: MacAddr = MacAddr::new([0x01, 0x15, 0x4e, 0x00, 0x00, 0x02]);
pub const DST_IN_TEST: MacAddr = MacAddr::new([0x01, 0x15, 0x4e, 0x00, 0x00, 0x03]);
pub const DST_IN_CONTROL: MacAddr = MacAddr::new([0x01, 0x15, 0x4e, 0x00, 0x00, 0x04]);

#[derive(Copy, Clone, FromBytes, IntoBytes, Unaligned, Immutable, KnownLayout)]
#[repr(C)]
pub struct EthernetHeader {
    pub dst: MacAddr,
    pub src: MacAddr,
    pub ethertype: U16<BigEndian>,
}

pub const ETHERNET_HEADER_LEN: usize = core::mem::size_of::<EthernetHeader>();
pub const MIN_FRAME_LEN: usize = 60;

#[derive(Copy, Clone, FromBytes, IntoBytes, Unaligned, Immutable, KnownLayout)]
#[repr(C)]
pub struct TlvHeader {
    pub tlv_type: u8,
    pub length: u8,
}

#[derive(Copy, Clone, FromBytes, IntoBytes, Unaligned, Immutable, KnownLayout)]
#[repr(C)]
pub struct CommonBody {
    pub seq_id: U16<BigEndian>,
    pub domain: [u8; 16],
}

#[derive(Copy, Clone, FromBytes, IntoBytes, Unaligned, Immutable, KnownLayout)]
#[repr(C)]
pub struct RingTestBody {
    pub prio: U16<BigEndian>,
    pub sa: MacAddr,
    pub port_role: U16<BigEndian>,
    pub state: U16<BigEndian>,
    pub transitions: U16<BigEndian>,
    pub timestamp: U32<BigEndian>,
}

#[derive(Copy, Clone, FromBytes, IntoBytes, Unaligned, Immutable, KnownLayout)]
#[repr(C)]
pub struct RingTopoBody {
    pub prio: U16<BigEndian>,
    pub sa: MacAddr,
    pub interval: U16<BigEndian>,
}

#[derive(Copy, Clone, FromBytes, IntoBytes, Unaligned, Immutable, KnownLayout)]
#[repr(C)]
pub struct RingLinkBody {
    pub sa: MacAddr,
    pub port_role: U16<BigEndian>,
    pub interval: U16<BigEndian>,
    pub blocked: U16<BigEndian>,
}

#[derive(Copy, Clone, FromBytes, IntoBytes, Unaligned, Immutable, KnownLayout)]
#[repr(C)]
pub struct InTestBody {
    pub sa: MacAddr,
    pub id: U16<BigEndian>,
    pub port_role: U16<BigEndian>,
    pub state: U16<BigEndian>,
    pub transitions: U16<BigEndian>,
    pub timestamp: U32<BigEndian>,
}

#[derive(Copy, Clone, FromBytes, IntoBytes, Unaligned, Immutable, KnownLayout)]
#[repr(C)]
pub struct InTopoBody {
    pub sa: MacAddr,
    pub id: U16<BigEndian>,
    pub interval: U16<BigEndian>,
}

#[derive(Copy, Clone, FromBytes, IntoBytes, Unaligned, Immutable, KnownLayout)]
#[repr(C)]
pub struct InLinkBody {
    pub sa: MacAddr,
    pub port_role: U16<BigEndian>,
    pub id: U16<BigEndian>,
    pub interval: U16<BigEndian>,
}

#[derive(Copy, Clone, FromBytes, IntoBytes, Unaligned, Immutable, KnownLayout)]
#[repr(C)]
pub struct InLinkStatusPollBody {
    pub sa: MacAddr,
    pub port_role: U16<BigEndian>,
    pub id: U16<BigEndian>,
}

/// Vendor-specific-option wrapper: `Option` TLV body starts with an OUI and
/// a sub-option selector before the nested sub-TLV header.
pub const MRP_OUI: [u8; 3] = [0x00, 0x80, 0x63];
pub const MRP_SUB_OPTION: u8 = 0x01;

#[derive(Copy, Clone, FromBytes, IntoBytes, Unaligned, Immutable, KnownLayout)]
#[repr(C)]
pub struct OuiHeader {
    pub oui: [u8; 3],
    pub sub_option: u8,
}

#[derive(Copy, Clone, FromBytes, IntoBytes, Unaligned, Immutable, KnownLayout)]
#[repr(C)]
pub struct SubTlvHeader {
    pub sub_type: u8,
    pub length: u8,
}

#[derive(Copy, Clone, FromBytes, IntoBytes, Unaligned, Immutable, KnownLayout)]
#[repr(C)]
pub struct TestMgrNackBody {
    pub prio: U16<BigEndian>,
    pub sa: MacAddr,
    pub other_prio: U16<BigEndian>,
    pub other_sa: MacAddr,
    pub _pad: U16<BigEndian>,
}

#[derive(Copy, Clone, FromBytes, IntoBytes, Unaligned, Immutable, KnownLayout)]
#[repr(C)]
pub struct TestPropagateBody {
    pub prio: U16<BigEndian>,
    pub sa: MacAddr,
    pub other_prio: U16<BigEndian>,
    pub other_sa: MacAddr,
}
