// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Drives the control-plane RPC end to end: real wire-encoded datagrams,
//! sent over a real abstract `AF_UNIX SOCK_DGRAM` socket, to an in-process
//! [`mrpd::control::dispatch`] backed by fake bridge-driver and
//! packet-transport backends (§9's testing strategy, applied at the whole
//! daemon's scope rather than one state machine's).
//!
//! `ADD_MRP`'s wire decoding resolves `pport`/`sport`/`br` to interface
//! names and MAC addresses via `mrpd::iface` (real `if_indextoname` and
//! `/sys/class/net` reads), which requires interfaces this suite cannot
//! assume exist in whatever environment it runs under. So instances here
//! are seeded directly through `EventRouter::add_instance`, and the wire
//! path under test is `GET_MRP`/`DEL_MRP` plus the malformed-datagram
//! rejection `ADD_MRP` and `DEL_MRP` share.

use std::os::linux::net::SocketAddrExt;
use std::os::unix::net::{SocketAddr, UnixDatagram};

use drv_mrp_bridge::RecordingBridgeDriver;
use drv_mrp_packet::RecordingTransport;
use mrp_control::{decode_record, decode_reply, encode_empty_request, encode_request, Cmd, DelMrpRequest, GetMrpReply};
use mrp_core::driver::NullEventBus;
use mrp_core::instance::{InMode, InRole, RingRole};
use mrp_core::router::{AddRequest, EventRouter};
use mrp_core::timers::RecoveryClass;
use mrp_proto::MacAddr;

fn add_request(bridge_ifindex: u32, ring_nr: u32, pport: u32, sport: u32) -> AddRequest {
    AddRequest {
        bridge_ifindex,
        ring_nr,
        pport,
        sport,
        p_ifname: format!("eth{pport}"),
        s_ifname: format!("eth{sport}"),
        p_mac: MacAddr([0, 0, 0, 0, 0, pport as u8]),
        s_mac: MacAddr([0, 0, 0, 0, 0, sport as u8]),
        bridge_mac: MacAddr([0, 0, 0, 0, 0, bridge_ifindex as u8]),
        domain: [0; 16],
        ring_role: RingRole::Mrm,
        prio: 0x8000,
        react_on_link_change: false,
        mra_support: false,
        in_role: InRole::Disabled,
        in_mode: InMode::Rc,
        iport: None,
        i_ifname: None,
        i_mac: None,
        cfm: None,
        recovery_class: RecoveryClass::Ms500,
    }
}

fn new_router() -> EventRouter {
    EventRouter::new(
        Box::new(RecordingBridgeDriver::new()),
        Box::new(RecordingTransport::new()),
        Box::new(NullEventBus),
        1,
    )
}

/// Scenario: `GET_MRP` returns exactly the set of currently-added
/// instances, in insertion order, over the real wire codec.
#[test]
fn get_mrp_reports_added_instances_in_insertion_order() {
    let mut router = new_router();
    router.add_instance(add_request(2, 0, 10, 11)).unwrap();
    router.add_instance(add_request(2, 1, 12, 13)).unwrap();

    let request = encode_empty_request(Cmd::GetMrp, std::mem::size_of::<GetMrpReply>());
    let reply_bytes = mrpd::control::dispatch(&mut router, &request).expect("get_mrp always replies");

    let (header, body) = decode_reply(&reply_bytes).unwrap();
    assert_eq!(header.res, 0);
    let reply: GetMrpReply = decode_record(Cmd::GetMrp, body).unwrap();
    let entries = reply.entries();
    assert_eq!(entries.len(), 2);
    assert_eq!((entries[0].br, entries[0].ring_nr), (2, 0));
    assert_eq!((entries[1].br, entries[1].ring_nr), (2, 1));
    assert_eq!(entries[0].pport, 10);
    assert_eq!(entries[0].sport, 11);
}

/// `DEL_MRP` over the wire removes exactly the named instance; a
/// follow-up `GET_MRP` no longer reports it.
#[test]
fn del_mrp_removes_instance_and_get_mrp_reflects_it() {
    let mut router = new_router();
    router.add_instance(add_request(2, 0, 10, 11)).unwrap();
    router.add_instance(add_request(2, 1, 12, 13)).unwrap();

    let del = DelMrpRequest { br: 2, ring_nr: 0 };
    let request = encode_request(Cmd::DelMrp, &del, 0);
    let reply_bytes = mrpd::control::dispatch(&mut router, &request).unwrap();
    let (header, _) = decode_reply(&reply_bytes).unwrap();
    assert_eq!(header.res, 0);

    let get_bytes = encode_empty_request(Cmd::GetMrp, std::mem::size_of::<GetMrpReply>());
    let reply_bytes = mrpd::control::dispatch(&mut router, &get_bytes).unwrap();
    let (_, body) = decode_reply(&reply_bytes).unwrap();
    let reply: GetMrpReply = decode_record(Cmd::GetMrp, body).unwrap();
    let entries = reply.entries();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].ring_nr, 1);
}

/// `DEL_MRP` for an instance that was never added fails with a
/// nonzero `res` rather than panicking, and no further replies are
/// affected by it.
#[test]
fn del_mrp_on_unknown_instance_fails_cleanly() {
    let mut router = new_router();
    let del = DelMrpRequest { br: 9, ring_nr: 9 };
    let request = encode_request(Cmd::DelMrp, &del, 0);
    let reply_bytes = mrpd::control::dispatch(&mut router, &request).unwrap();
    let (header, _) = decode_reply(&reply_bytes).unwrap();
    assert_ne!(header.res, 0);
}

/// A datagram too short to hold even the header is dropped with no
/// reply, rather than replied to or panicking.
#[test]
fn malformed_datagram_yields_no_reply() {
    let mut router = new_router();
    assert!(mrpd::control::dispatch(&mut router, &[1, 2, 3]).is_none());
}

/// The suite's one true end-to-end path: a real abstract `AF_UNIX
/// SOCK_DGRAM` pair carrying the same `GET_MRP` datagram `mrpctl` would
/// send, decoded and dispatched exactly as `Server::handle_control` does,
/// without standing up the rest of the daemon (no bridge, no packet
/// socket, no netlink monitor).
#[test]
fn get_mrp_round_trips_over_a_real_abstract_socket() {
    let mut router = new_router();
    router.add_instance(add_request(5, 0, 20, 21)).unwrap();

    let server_addr = SocketAddr::from_abstract_name(b"mrpd-control-plane-test").unwrap();
    let server_sock = UnixDatagram::bind_addr(&server_addr).unwrap();
    let client_sock = UnixDatagram::unbound().unwrap();
    client_sock.connect_addr(&server_addr).unwrap();

    let request = encode_empty_request(Cmd::GetMrp, std::mem::size_of::<GetMrpReply>());
    client_sock.send(&request).unwrap();

    let mut buf = [0u8; 4096];
    let (n, from) = server_sock.recv_from(&mut buf).unwrap();
    let reply_bytes = mrpd::control::dispatch(&mut router, &buf[..n]).expect("get_mrp always replies");
    server_sock.send_to(&reply_bytes, &from).unwrap();

    let mut client_buf = [0u8; 4096];
    let n = client_sock.recv(&mut client_buf).unwrap();
    let (_, body) = decode_reply(&client_buf[..n]).unwrap();
    let reply: GetMrpReply = decode_record(Cmd::GetMrp, body).unwrap();
    assert_eq!(reply.entries().len(), 1);
    assert_eq!(reply.entries()[0].br, 5);
}
