// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use zerocopy::byteorder::{BigEndian, U16};
use zerocopy::{FromBytes, Immutable, IntoBytes};

use crate::error::Error;
use crate::macaddr::MacAddr;
use crate::tlv::{parse_tlvs, Tlv, TlvType};
use crate::wire::{
    self, CommonBody, EthernetHeader, ETHERNET_HEADER_LEN, ETHERTYPE_MRP, MIN_FRAME_LEN,
    MRP_VERSION,
};

/// The four well-known MRP destination addresses, and the TLV family each
/// one carries.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum MrpDestination {
    Test,
    Control,
    InTest,
    InControl,
}

impl MrpDestination {
    pub fn mac(self) -> MacAddr {
        match self {
            MrpDestination::Test => wire::DST_TEST,
            MrpDestination::Control => wire::DST_CONTROL,
            MrpDestination::InTest => wire::DST_IN_TEST,
            MrpDestination::InControl => wire::DST_IN_CONTROL,
        }
    }

    pub fn from_mac(mac: MacAddr) -> Option<Self> {
        match mac {
            m if m == wire::DST_TEST => Some(Self::Test),
            m if m == wire::DST_CONTROL => Some(Self::Control),
            m if m == wire::DST_IN_TEST => Some(Self::InTest),
            m if m == wire::DST_IN_CONTROL => Some(Self::InControl),
            _ => None,
        }
    }
}

/// A fully decoded MRP frame: Ethernet addressing plus the TLV payload.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Frame {
    pub dst: MacAddr,
    pub src: MacAddr,
    pub seq_id: u16,
    pub domain: [u8; 16],
    pub tlvs: Vec<Tlv>,
}

impl Frame {
    pub fn new(dst: MrpDestination, src: MacAddr, seq_id: u16, domain: [u8; 16], tlvs: Vec<Tlv>) -> Self {
        Self { dst: dst.mac(), src, seq_id, domain, tlvs }
    }

    /// Encodes this frame as a full Ethernet frame (header + payload),
    /// padded to the minimum 60-octet frame size.
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(MIN_FRAME_LEN);
        out.extend_from_slice(
            EthernetHeader { dst: self.dst, src: self.src, ethertype: U16::new(ETHERTYPE_MRP) }
                .as_bytes(),
        );
        out.extend_from_slice(U16::<BigEndian>::new(MRP_VERSION).as_bytes());

        for tlv in &self.tlvs {
            tlv.encode(&mut out);
        }

        // Mandatory Common TLV, immediately before End.
        out.push(TlvType::Common as u8);
        out.push(core::mem::size_of::<CommonBody>() as u8);
        out.extend_from_slice(
            CommonBody { seq_id: U16::new(self.seq_id), domain: self.domain }.as_bytes(),
        );

        out.push(TlvType::End as u8);
        out.push(0);

        if out.len() < MIN_FRAME_LEN {
            out.resize(MIN_FRAME_LEN, 0);
        }
        out
    }

    /// Decodes a full Ethernet frame (header included) into a [`Frame`].
    pub fn decode(buf: &[u8]) -> Result<Self, Error> {
        if buf.len() < ETHERNET_HEADER_LEN + 2 {
            return Err(Error::FrameTooShort { have: buf.len(), need: ETHERNET_HEADER_LEN + 2 });
        }
        let eth = EthernetHeader::read_from_bytes(&buf[..ETHERNET_HEADER_LEN])
            .expect("length checked above");
        if eth.ethertype.get() != ETHERTYPE_MRP {
            return Err(Error::WrongEtherType(eth.ethertype.get()));
        }

        let version = u16::from_be_bytes([buf[ETHERNET_HEADER_LEN], buf[ETHERNET_HEADER_LEN + 1]]);
        if version != MRP_VERSION {
            return Err(Error::BadVersion(version));
        }

        let parsed = parse_tlvs(&buf[ETHERNET_HEADER_LEN + 2..])?;
        let (seq_id, domain) = parsed.common.unwrap_or((0, [0; 16]));

        Ok(Frame { dst: eth.dst, src: eth.src, seq_id, domain, tlvs: parsed.tlvs })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mac(last: u8) -> MacAddr {
        MacAddr::new([0x02, 0x00, 0x00, 0x00, 0x00, last])
    }

    #[test]
    fn round_trips_ring_test() {
        let f = Frame::new(
            MrpDestination::Test,
            mac(1),
            42,
            [0xff; 16],
            vec![Tlv::RingTest {
                prio: 0x8000,
                sa: mac(1),
                port_role: 0,
                state: 1,
                transitions: 3,
                timestamp: 123456,
            }],
        );
        let bytes = f.encode();
        assert!(bytes.len() >= MIN_FRAME_LEN);
        let back = Frame::decode(&bytes).unwrap();
        assert_eq!(back.dst, wire::DST_TEST);
        assert_eq!(back.src, mac(1));
        assert_eq!(back.seq_id, 42);
        assert_eq!(back.domain, [0xff; 16]);
        assert_eq!(back.tlvs, f.tlvs);
    }

    #[test]
    fn round_trips_option_test_mgr_nack() {
        let f = Frame::new(
            MrpDestination::Control,
            mac(2),
            7,
            [0; 16],
            vec![Tlv::Option(crate::tlv::SubTlv::TestMgrNack {
                prio: 0x9000,
                sa: mac(2),
                other_prio: 0,
                other_sa: MacAddr::ZERO,
            })],
        );
        let bytes = f.encode();
        let back = Frame::decode(&bytes).unwrap();
        assert_eq!(back.tlvs, f.tlvs);
    }

    #[test]
    fn round_trips_option_test_propagate() {
        let f = Frame::new(
            MrpDestination::Control,
            mac(2),
            7,
            [0; 16],
            vec![Tlv::Option(crate::tlv::SubTlv::TestPropagate {
                prio: 0x9000,
                sa: mac(2),
                other_prio: 0xa000,
                other_sa: mac(3),
            })],
        );
        let bytes = f.encode();
        let back = Frame::decode(&bytes).unwrap();
        assert_eq!(back.tlvs, f.tlvs);
    }

    #[test]
    fn round_trips_ring_link_and_topo() {
        let f = Frame::new(
            MrpDestination::Control,
            mac(1),
            1,
            [1; 16],
            vec![
                Tlv::RingTopoChange { prio: 0x8000, sa: mac(1), interval: 20 },
                Tlv::RingLinkUp { sa: mac(1), port_role: 1, interval: 100, blocked: 0 },
                Tlv::RingLinkDown { sa: mac(1), port_role: 0, interval: 100, blocked: 1 },
            ],
        );
        let bytes = f.encode();
        let back = Frame::decode(&bytes).unwrap();
        assert_eq!(back.tlvs, f.tlvs);
    }

    #[test]
    fn round_trips_interconnect_tlvs() {
        let f = Frame::new(
            MrpDestination::InControl,
            mac(5),
            9,
            [2; 16],
            vec![
                Tlv::InTest { sa: mac(5), id: 1, port_role: 2, state: 1, transitions: 0, timestamp: 1000 },
                Tlv::InTopoChange { sa: mac(5), id: 1, interval: 10 },
                Tlv::InLinkUp { sa: mac(5), port_role: 2, id: 1, interval: 20 },
                Tlv::InLinkDown { sa: mac(5), port_role: 2, id: 1, interval: 20 },
                Tlv::InLinkStatusPoll { sa: mac(5), port_role: 2, id: 1 },
            ],
        );
        let bytes = f.encode();
        let back = Frame::decode(&bytes).unwrap();
        assert_eq!(back.tlvs, f.tlvs);
    }

    #[test]
    fn rejects_wrong_ethertype() {
        let mut bytes = Frame::new(MrpDestination::Test, mac(1), 1, [0; 16], vec![]).encode();
        bytes[12] = 0x08;
        bytes[13] = 0x00;
        assert_eq!(Frame::decode(&bytes), Err(Error::WrongEtherType(0x0800)));
    }

    #[test]
    fn rejects_truncated_tlv() {
        let mut bytes = Frame::new(
            MrpDestination::Test,
            mac(1),
            1,
            [0; 16],
            vec![Tlv::RingTopoChange { prio: 1, sa: mac(1), interval: 1 }],
        )
        .encode();
        // Claim a TLV far longer than what follows, right after the header+version.
        bytes[ETHERNET_HEADER_LEN] = TlvType::RingTopo as u8;
        bytes[ETHERNET_HEADER_LEN + 1] = 0xfe;
        assert!(matches!(Frame::decode(&bytes), Err(Error::TruncatedTlv { .. })));
    }

    #[test]
    fn too_short_frame_is_an_error_not_a_panic() {
        let bytes = [0u8; 4];
        assert!(Frame::decode(&bytes).is_err());
    }

    #[test]
    fn unknown_tlv_type_is_skipped_not_fatal() {
        let mut f = Frame::new(
            MrpDestination::Test,
            mac(1),
            1,
            [0; 16],
            vec![Tlv::RingTopoChange { prio: 1, sa: mac(1), interval: 1 }],
        )
        .encode();
        // Splice an unknown-type, zero-length TLV in front of the existing ones.
        let insert_at = ETHERNET_HEADER_LEN + 2;
        f.splice(insert_at..insert_at, [0x55u8, 0x00]);
        let decoded = Frame::decode(&f).unwrap();
        assert_eq!(decoded.tlvs.len(), 1);
    }
}
