// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use zerocopy::FromBytes;

use crate::error::Error;
use crate::macaddr::MacAddr;
use crate::wire;

/// Numeric TLV type codes, matching the ordering of the reference
/// implementation's `br_mrp_tlv_header_type`.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum TlvType {
    End = 0x00,
    Common = 0x01,
    RingTest = 0x02,
    RingTopo = 0x03,
    RingLinkDown = 0x04,
    RingLinkUp = 0x05,
    InTest = 0x06,
    InTopo = 0x07,
    InLinkDown = 0x08,
    InLinkUp = 0x09,
    InLinkStatus = 0x0a,
    Option = 0x7f,
}

impl TlvType {
    fn from_u8(v: u8) -> Option<Self> {
        Some(match v {
            0x00 => Self::End,
            0x01 => Self::Common,
            0x02 => Self::RingTest,
            0x03 => Self::RingTopo,
            0x04 => Self::RingLinkDown,
            0x05 => Self::RingLinkUp,
            0x06 => Self::InTest,
            0x07 => Self::InTopo,
            0x08 => Self::InLinkDown,
            0x09 => Self::InLinkUp,
            0x0a => Self::InLinkStatus,
            0x7f => Self::Option,
            _ => return None,
        })
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum SubTlvType {
    TestMgrNack = 0x01,
    TestPropagate = 0x02,
}

impl SubTlvType {
    fn from_u8(v: u8) -> Option<Self> {
        match v {
            0x01 => Some(Self::TestMgrNack),
            0x02 => Some(Self::TestPropagate),
            _ => None,
        }
    }
}

/// `port_role` wire field, shared by every TLV body that carries it.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[repr(u16)]
pub enum PortRole {
    Primary = 0,
    Secondary = 1,
    Interconnect = 2,
}

impl PortRole {
    pub fn from_u16(v: u16) -> Option<Self> {
        match v {
            0 => Some(Self::Primary),
            1 => Some(Self::Secondary),
            2 => Some(Self::Interconnect),
            _ => None,
        }
    }
}

/// Ring/interconnect `state` wire field: whether the sender currently
/// considers its ring (or interconnect) open or closed.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[repr(u16)]
pub enum RingState {
    Open = 0,
    Closed = 1,
}

impl RingState {
    pub fn from_u16(v: u16) -> Option<Self> {
        match v {
            0 => Some(Self::Open),
            1 => Some(Self::Closed),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SubTlv {
    TestMgrNack {
        prio: u16,
        sa: MacAddr,
        other_prio: u16,
        other_sa: MacAddr,
    },
    TestPropagate {
        prio: u16,
        sa: MacAddr,
        other_prio: u16,
        other_sa: MacAddr,
    },
}

/// A decoded MRP TLV. The mandatory `Common` TLV and the `End` terminator
/// are handled by [`crate::frame::Frame`] directly and are not represented
/// here.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Tlv {
    RingTest {
        prio: u16,
        sa: MacAddr,
        port_role: u16,
        state: u16,
        transitions: u16,
        timestamp: u32,
    },
    RingTopoChange {
        prio: u16,
        sa: MacAddr,
        interval: u16,
    },
    RingLinkUp {
        sa: MacAddr,
        port_role: u16,
        interval: u16,
        blocked: u16,
    },
    RingLinkDown {
        sa: MacAddr,
        port_role: u16,
        interval: u16,
        blocked: u16,
    },
    InTest {
        sa: MacAddr,
        id: u16,
        port_role: u16,
        state: u16,
        transitions: u16,
        timestamp: u32,
    },
    InTopoChange {
        sa: MacAddr,
        id: u16,
        interval: u16,
    },
    InLinkUp {
        sa: MacAddr,
        port_role: u16,
        id: u16,
        interval: u16,
    },
    InLinkDown {
        sa: MacAddr,
        port_role: u16,
        id: u16,
        interval: u16,
    },
    InLinkStatusPoll {
        sa: MacAddr,
        port_role: u16,
        id: u16,
    },
    Option(SubTlv),
}

impl Tlv {
    pub fn tlv_type(&self) -> TlvType {
        match self {
            Tlv::RingTest { .. } => TlvType::RingTest,
            Tlv::RingTopoChange { .. } => TlvType::RingTopo,
            Tlv::RingLinkUp { .. } => TlvType::RingLinkUp,
            Tlv::RingLinkDown { .. } => TlvType::RingLinkDown,
            Tlv::InTest { .. } => TlvType::InTest,
            Tlv::InTopoChange { .. } => TlvType::InTopo,
            Tlv::InLinkUp { .. } => TlvType::InLinkUp,
            Tlv::InLinkDown { .. } => TlvType::InLinkDown,
            Tlv::InLinkStatusPoll { .. } => TlvType::InLinkStatus,
            Tlv::Option(_) => TlvType::Option,
        }
    }

    /// Appends this TLV's wire encoding (type, length, body) to `out`.
    pub fn encode(&self, out: &mut Vec<u8>) {
        match self {
            Tlv::RingTest { prio, sa, port_role, state, transitions, timestamp } => {
                push_tlv(out, TlvType::RingTest, &wire::RingTestBody {
                    prio: (*prio).into(),
                    sa: *sa,
                    port_role: (*port_role).into(),
                    state: (*state).into(),
                    transitions: (*transitions).into(),
                    timestamp: (*timestamp).into(),
                });
            }
            Tlv::RingTopoChange { prio, sa, interval } => {
                push_tlv(out, TlvType::RingTopo, &wire::RingTopoBody {
                    prio: (*prio).into(),
                    sa: *sa,
                    interval: (*interval).into(),
                });
            }
            Tlv::RingLinkUp { sa, port_role, interval, blocked } => {
                push_tlv(out, TlvType::RingLinkUp, &wire::RingLinkBody {
                    sa: *sa,
                    port_role: (*port_role).into(),
                    interval: (*interval).into(),
                    blocked: (*blocked).into(),
                });
            }
            Tlv::RingLinkDown { sa, port_role, interval, blocked } => {
                push_tlv(out, TlvType::RingLinkDown, &wire::RingLinkBody {
                    sa: *sa,
                    port_role: (*port_role).into(),
                    interval: (*interval).into(),
                    blocked: (*blocked).into(),
                });
            }
            Tlv::InTest { sa, id, port_role, state, transitions, timestamp } => {
                push_tlv(out, TlvType::InTest, &wire::InTestBody {
                    sa: *sa,
                    id: (*id).into(),
                    port_role: (*port_role).into(),
                    state: (*state).into(),
                    transitions: (*transitions).into(),
                    timestamp: (*timestamp).into(),
                });
            }
            Tlv::InTopoChange { sa, id, interval } => {
                push_tlv(out, TlvType::InTopo, &wire::InTopoBody {
                    sa: *sa,
                    id: (*id).into(),
                    interval: (*interval).into(),
                });
            }
            Tlv::InLinkUp { sa, port_role, id, interval } => {
                push_tlv(out, TlvType::InLinkUp, &wire::InLinkBody {
                    sa: *sa,
                    port_role: (*port_role).into(),
                    id: (*id).into(),
                    interval: (*interval).into(),
                });
            }
            Tlv::InLinkDown { sa, port_role, id, interval } => {
                push_tlv(out, TlvType::InLinkDown, &wire::InLinkBody {
                    sa: *sa,
                    port_role: (*port_role).into(),
                    id: (*id).into(),
                    interval: (*interval).into(),
                });
            }
            Tlv::InLinkStatusPoll { sa, port_role, id } => {
                push_tlv(out, TlvType::InLinkStatus, &wire::InLinkStatusPollBody {
                    sa: *sa,
                    port_role: (*port_role).into(),
                    id: (*id).into(),
                });
            }
            Tlv::Option(sub) => encode_option(out, sub),
        }
    }

    /// Decodes one TLV body given its type and raw value bytes (not
    /// including the 2-byte type/length header). `UnknownDestination`-class
    /// unknown TLV types are handled by the caller before reaching here;
    /// this only returns an error for a *known* type whose length is wrong,
    /// or a malformed nested sub-option.
    fn decode(ty: TlvType, value: &[u8]) -> Result<Option<Tlv>, Error> {
        fn need<T: FromBytes + Copy>(tlv_type: u8, value: &[u8]) -> Result<T, Error> {
            T::read_from_bytes(value).map_err(|_| Error::BadTlvLength {
                tlv_type,
                expected: core::mem::size_of::<T>() as u8,
                got: value.len() as u8,
            })
        }

        Ok(Some(match ty {
            TlvType::End | TlvType::Common => return Ok(None),
            TlvType::RingTest => {
                let b: wire::RingTestBody = need(ty as u8, value)?;
                Tlv::RingTest {
                    prio: b.prio.get(),
                    sa: b.sa,
                    port_role: b.port_role.get(),
                    state: b.state.get(),
                    transitions: b.transitions.get(),
                    timestamp: b.timestamp.get(),
                }
            }
            TlvType::RingTopo => {
                let b: wire::RingTopoBody = need(ty as u8, value)?;
                Tlv::RingTopoChange { prio: b.prio.get(), sa: b.sa, interval: b.interval.get() }
            }
            TlvType::RingLinkUp | TlvType::RingLinkDown => {
                let b: wire::RingLinkBody = need(ty as u8, value)?;
                let fields = (b.sa, b.port_role.get(), b.interval.get(), b.blocked.get());
                if ty == TlvType::RingLinkUp {
                    Tlv::RingLinkUp { sa: fields.0, port_role: fields.1, interval: fields.2, blocked: fields.3 }
                } else {
                    Tlv::RingLinkDown { sa: fields.0, port_role: fields.1, interval: fields.2, blocked: fields.3 }
                }
            }
            TlvType::InTest => {
                let b: wire::InTestBody = need(ty as u8, value)?;
                Tlv::InTest {
                    sa: b.sa,
                    id: b.id.get(),
                    port_role: b.port_role.get(),
                    state: b.state.get(),
                    transitions: b.transitions.get(),
                    timestamp: b.timestamp.get(),
                }
            }
            TlvType::InTopo => {
                let b: wire::InTopoBody = need(ty as u8, value)?;
                Tlv::InTopoChange { sa: b.sa, id: b.id.get(), interval: b.interval.get() }
            }
            TlvType::InLinkUp | TlvType::InLinkDown => {
                let b: wire::InLinkBody = need(ty as u8, value)?;
                let fields = (b.sa, b.port_role.get(), b.id.get(), b.interval.get());
                if ty == TlvType::InLinkUp {
                    Tlv::InLinkUp { sa: fields.0, port_role: fields.1, id: fields.2, interval: fields.3 }
                } else {
                    Tlv::InLinkDown { sa: fields.0, port_role: fields.1, id: fields.2, interval: fields.3 }
                }
            }
            TlvType::InLinkStatus => {
                let b: wire::InLinkStatusPollBody = need(ty as u8, value)?;
                Tlv::InLinkStatusPoll { sa: b.sa, port_role: b.port_role.get(), id: b.id.get() }
            }
            TlvType::Option => Tlv::Option(decode_option(value)?),
        }))
    }
}

fn push_tlv<T: zerocopy::IntoBytes + zerocopy::Immutable>(
    out: &mut Vec<u8>,
    ty: TlvType,
    body: &T,
) {
    let bytes = body.as_bytes();
    out.push(ty as u8);
    out.push(bytes.len() as u8);
    out.extend_from_slice(bytes);
}

fn encode_option(out: &mut Vec<u8>, sub: &SubTlv) {
    let (sub_type, body_bytes): (SubTlvType, Vec<u8>) = match sub {
        SubTlv::TestMgrNack { prio, sa, other_prio, other_sa } => (
            SubTlvType::TestMgrNack,
            wire::TestMgrNackBody {
                prio: (*prio).into(),
                sa: *sa,
                other_prio: (*other_prio).into(),
                other_sa: *other_sa,
                _pad: 0u16.into(),
            }
            .as_bytes()
            .to_vec(),
        ),
        SubTlv::TestPropagate { prio, sa, other_prio, other_sa } => (
            SubTlvType::TestPropagate,
            wire::TestPropagateBody {
                prio: (*prio).into(),
                sa: *sa,
                other_prio: (*other_prio).into(),
                other_sa: *other_sa,
            }
            .as_bytes()
            .to_vec(),
        ),
    };

    let total_len = core::mem::size_of::<wire::OuiHeader>()
        + core::mem::size_of::<wire::SubTlvHeader>()
        + body_bytes.len();
    out.push(TlvType::Option as u8);
    out.push(total_len as u8);
    out.extend_from_slice(
        wire::OuiHeader { oui: wire::MRP_OUI, sub_option: wire::MRP_SUB_OPTION }.as_bytes(),
    );
    out.extend_from_slice(
        wire::SubTlvHeader { sub_type: sub_type as u8, length: body_bytes.len() as u8 }.as_bytes(),
    );
    out.extend_from_slice(&body_bytes);
}

fn decode_option(value: &[u8]) -> Result<SubTlv, Error> {
    let oui_len = core::mem::size_of::<wire::OuiHeader>();
    let sub_hdr_len = core::mem::size_of::<wire::SubTlvHeader>();
    if value.len() < oui_len + sub_hdr_len {
        return Err(Error::BadTlvLength {
            tlv_type: TlvType::Option as u8,
            expected: (oui_len + sub_hdr_len) as u8,
            got: value.len() as u8,
        });
    }
    let sub_hdr = wire::SubTlvHeader::read_from_bytes(&value[oui_len..oui_len + sub_hdr_len])
        .expect("slice length checked above");
    let body = &value[oui_len + sub_hdr_len..];
    if body.len() != sub_hdr.length as usize {
        return Err(Error::BadSubTlvLength { sub_type: sub_hdr.sub_type, got: body.len() as u8 });
    }

    let sub_type = SubTlvType::from_u8(sub_hdr.sub_type)
        .ok_or(Error::BadSubTlvLength { sub_type: sub_hdr.sub_type, got: body.len() as u8 })?;

    Ok(match sub_type {
        SubTlvType::TestMgrNack => {
            let b = wire::TestMgrNackBody::read_from_bytes(body)
                .map_err(|_| Error::BadSubTlvLength { sub_type: sub_hdr.sub_type, got: body.len() as u8 })?;
            SubTlv::TestMgrNack {
                prio: b.prio.get(),
                sa: b.sa,
                other_prio: b.other_prio.get(),
                other_sa: b.other_sa,
            }
        }
        SubTlvType::TestPropagate => {
            let b = wire::TestPropagateBody::read_from_bytes(body)
                .map_err(|_| Error::BadSubTlvLength { sub_type: sub_hdr.sub_type, got: body.len() as u8 })?;
            SubTlv::TestPropagate {
                prio: b.prio.get(),
                sa: b.sa,
                other_prio: b.other_prio.get(),
                other_sa: b.other_sa,
            }
        }
    })
}

/// Parses TLVs from `buf` starting at an arbitrary offset, stopping at the
/// `End` TLV or end of buffer. Returns the decoded TLVs, the mandatory
/// `Common` fields if one was seen, and a count of unknown-type TLVs that
/// were skipped (not fatal, per the codec's error taxonomy).
pub(crate) struct ParsedTlvs {
    pub tlvs: Vec<Tlv>,
    pub common: Option<(u16, [u8; 16])>,
    pub unknown_skipped: u32,
}

pub(crate) fn parse_tlvs(buf: &[u8]) -> Result<ParsedTlvs, Error> {
    let mut out = ParsedTlvs { tlvs: Vec::new(), common: None, unknown_skipped: 0 };
    let mut pos = 0usize;

    loop {
        if pos + 2 > buf.len() {
            return Err(Error::TruncatedTlv { tlv_type: 0, length: 0, remaining: buf.len() - pos });
        }
        let tlv_type_raw = buf[pos];
        let length = buf[pos + 1];
        pos += 2;

        if pos + length as usize > buf.len() {
            return Err(Error::TruncatedTlv {
                tlv_type: tlv_type_raw,
                length,
                remaining: buf.len() - pos,
            });
        }
        let value = &buf[pos..pos + length as usize];
        pos += length as usize;

        let Some(ty) = TlvType::from_u8(tlv_type_raw) else {
            out.unknown_skipped += 1;
            continue;
        };

        if ty == TlvType::End {
            break;
        }
        if ty == TlvType::Common {
            let b = wire::CommonBody::read_from_bytes(value).map_err(|_| Error::BadTlvLength {
                tlv_type: tlv_type_raw,
                expected: core::mem::size_of::<wire::CommonBody>() as u8,
                got: length,
            })?;
            out.common = Some((b.seq_id.get(), b.domain));
            continue;
        }

        if let Some(tlv) = Tlv::decode(ty, value)? {
            out.tlvs.push(tlv);
        }
    }

    Ok(out)
}
