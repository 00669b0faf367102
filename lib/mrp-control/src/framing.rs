// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned};

use crate::error::{Error, Result};
use crate::records::{Cmd, Header};

/// Assembles a request datagram: header + body, one `SOCK_DGRAM` send
/// worth of bytes. `expected_reply_len` is recorded in the header's
/// `lout` so a textual/other backend could preallocate, though this
/// implementation's server always replies with however many bytes the
/// command actually produces.
pub fn encode_request<B: IntoBytes + Immutable>(cmd: Cmd, body: &B, expected_reply_len: usize) -> Vec<u8> {
    let body_bytes = body.as_bytes();
    let header = Header::request(cmd, body_bytes.len(), expected_reply_len);
    let mut out = Vec::with_capacity(Header::LEN + body_bytes.len());
    out.extend_from_slice(header.as_bytes());
    out.extend_from_slice(body_bytes);
    out
}

/// A request with no body (`GET_MRP`).
pub fn encode_empty_request(cmd: Cmd, expected_reply_len: usize) -> Vec<u8> {
    let header = Header::request(cmd, 0, expected_reply_len);
    header.as_bytes().to_vec()
}

/// Parses a received request datagram's header and returns it along with
/// the raw body slice, which the caller then decodes per `cmd`.
pub fn decode_request(buf: &[u8]) -> Result<(Header, &[u8])> {
    if buf.len() < Header::LEN {
        return Err(Error::DatagramTooShort { have: buf.len(), need: Header::LEN });
    }
    let header = Header::read_from_bytes(&buf[..Header::LEN]).expect("length checked above");
    let body = &buf[Header::LEN..];
    if header.lin as usize != body.len() {
        return Err(Error::BodyLengthMismatch { claimed: header.lin, have: body.len() });
    }
    Ok((header, body))
}

/// Decodes a fixed-size record from a request body, checking that its
/// length exactly matches, and tagging a mismatch with the command that
/// produced it.
pub fn decode_record<T: FromBytes + Copy + Immutable + KnownLayout + Unaligned>(
    cmd: Cmd,
    body: &[u8],
) -> Result<T> {
    T::read_from_bytes(body).map_err(|_| Error::WrongRecordSize {
        cmd: cmd as i32,
        expected: core::mem::size_of::<T>(),
        got: body.len(),
    })
}

/// Assembles a reply datagram: header (with `res` set) + body.
pub fn encode_reply<B: IntoBytes + Immutable>(cmd: Cmd, res: i32, body: &B) -> Vec<u8> {
    let body_bytes = body.as_bytes();
    let header = Header::reply(cmd, res, body_bytes.len());
    let mut out = Vec::with_capacity(Header::LEN + body_bytes.len());
    out.extend_from_slice(header.as_bytes());
    out.extend_from_slice(body_bytes);
    out
}

/// A reply with no body (`ADD_MRP`/`DEL_MRP` on success).
pub fn encode_empty_reply(cmd: Cmd, res: i32) -> Vec<u8> {
    Header::reply(cmd, res, 0).as_bytes().to_vec()
}

/// Parses a received reply datagram's header and body, for the client side.
pub fn decode_reply(buf: &[u8]) -> Result<(Header, &[u8])> {
    if buf.len() < Header::LEN {
        return Err(Error::DatagramTooShort { have: buf.len(), need: Header::LEN });
    }
    let header = Header::read_from_bytes(&buf[..Header::LEN]).expect("length checked above");
    let body = &buf[Header::LEN..];
    if header.lout as usize != body.len() {
        return Err(Error::BodyLengthMismatch { claimed: header.lout, have: body.len() });
    }
    Ok((header, body))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::{AddMrpRequest, DelMrpRequest, MrpStatus};

    #[test]
    fn del_mrp_request_round_trips() {
        let req = DelMrpRequest { br: 3, ring_nr: 0 };
        let bytes = encode_request(Cmd::DelMrp, &req, 0);
        let (header, body) = decode_request(&bytes).unwrap();
        assert_eq!(header.cmd, Cmd::DelMrp as i32);
        let back: DelMrpRequest = decode_record(Cmd::DelMrp, body).unwrap();
        assert_eq!(back.br, 3);
        assert_eq!(back.ring_nr, 0);
    }

    #[test]
    fn add_mrp_request_round_trips() {
        let req = AddMrpRequest {
            br: 1,
            ring_nr: 0,
            pport: 2,
            sport: 3,
            ring_role: 2,
            prio: 0x8000,
            ring_recv: 0,
            react_on_link_change: 0,
            in_role: 0,
            in_id: 0,
            iport: 0,
            in_mode: 0,
            in_recv: 0,
            cfm_instance: 0,
            cfm_level: 0,
            cfm_mepid: 0,
            cfm_peer_mepid: 0,
            cfm_maid: [0; 48],
            cfm_dmac: [0; 6],
        };
        let bytes = encode_request(Cmd::AddMrp, &req, 0);
        let (_, body) = decode_request(&bytes).unwrap();
        let back: AddMrpRequest = decode_record(Cmd::AddMrp, body).unwrap();
        assert_eq!(back.pport, 2);
        assert_eq!(back.sport, 3);
        assert_eq!(back.prio, 0x8000);
    }

    #[test]
    fn get_mrp_reply_round_trips_with_fewer_than_max_entries() {
        let entries = vec![
            MrpStatus { br: 1, ring_nr: 0, ..Default::default() },
            MrpStatus { br: 1, ring_nr: 1, ..Default::default() },
        ];
        let reply = super::super::records::GetMrpReply::from_entries(&entries);
        let bytes = encode_reply(Cmd::GetMrp, 0, &reply);
        let (header, body) = decode_reply(&bytes).unwrap();
        assert_eq!(header.res, 0);
        let back: super::super::records::GetMrpReply = decode_record(Cmd::GetMrp, body).unwrap();
        assert_eq!(back.count, 2);
        assert_eq!(back.entries().len(), 2);
        assert_eq!(back.entries()[1].ring_nr, 1);
    }

    #[test]
    fn truncated_header_is_an_error() {
        assert!(decode_request(&[1, 2, 3]).is_err());
    }

    #[test]
    fn body_length_mismatch_is_detected() {
        let req = DelMrpRequest { br: 1, ring_nr: 1 };
        let mut bytes = encode_request(Cmd::DelMrp, &req, 0);
        bytes.pop();
        assert!(decode_request(&bytes).is_err());
    }
}
