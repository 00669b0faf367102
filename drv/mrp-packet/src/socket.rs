// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The production `PacketTransport`: a single `AF_PACKET`/`SOCK_RAW`
//! socket bound to `ETH_P_ALL`, addressing each send by interface index
//! rather than keeping one socket per port (§6's second option). Frames
//! already carry a full Ethernet header by the time they reach `send`, so
//! this is little more than a `sendto`/`recvfrom` pair over a
//! `sockaddr_ll`.

use std::io;
use std::mem;
use std::os::fd::{AsRawFd, FromRawFd, OwnedFd, RawFd};

use mrp_core::driver::{DriverError, DriverResult, PacketTransport};
use mrp_proto::Frame;
use tracing::trace;

/// `ETH_P_MRP`, network byte order when used as a socket protocol.
pub const ETH_P_MRP: u16 = 0x88E3;

fn sockaddr_ll(ifindex: u32, protocol: u16) -> libc::sockaddr_ll {
    let mut addr: libc::sockaddr_ll = unsafe { mem::zeroed() };
    addr.sll_family = libc::AF_PACKET as u16;
    addr.sll_protocol = protocol.to_be();
    addr.sll_ifindex = ifindex as i32;
    addr
}

/// One raw socket shared by every MRP instance in this process, filtered
/// by `sll_ifindex` on send and read back out on receive.
pub struct PacketSocketTransport {
    fd: OwnedFd,
}

impl PacketSocketTransport {
    /// Opens the socket and binds it to `ETH_P_MRP` on every interface
    /// (`sll_ifindex = 0`): actual per-send targeting happens through the
    /// destination `sockaddr_ll` instead of a bind-time restriction.
    pub fn open() -> io::Result<Self> {
        let proto = (ETH_P_MRP as i32).to_be();
        let raw = unsafe { libc::socket(libc::AF_PACKET, libc::SOCK_RAW, proto) };
        if raw < 0 {
            return Err(io::Error::last_os_error());
        }
        let fd = unsafe { OwnedFd::from_raw_fd(raw) };

        let addr = sockaddr_ll(0, ETH_P_MRP);
        let rc = unsafe {
            libc::bind(
                fd.as_raw_fd(),
                &addr as *const libc::sockaddr_ll as *const libc::sockaddr,
                mem::size_of::<libc::sockaddr_ll>() as libc::socklen_t,
            )
        };
        if rc < 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(Self { fd })
    }

    pub fn raw_fd(&self) -> RawFd {
        self.fd.as_raw_fd()
    }

    /// Blocks until a frame arrives, returning the receiving interface's
    /// index alongside the raw bytes (Ethernet header included).
    pub fn recv_frame(&self) -> io::Result<(u32, Vec<u8>)> {
        let mut buf = vec![0u8; 1536];
        let mut addr: libc::sockaddr_ll = unsafe { mem::zeroed() };
        let mut addr_len = mem::size_of::<libc::sockaddr_ll>() as libc::socklen_t;
        let n = unsafe {
            libc::recvfrom(
                self.fd.as_raw_fd(),
                buf.as_mut_ptr() as *mut libc::c_void,
                buf.len(),
                0,
                &mut addr as *mut libc::sockaddr_ll as *mut libc::sockaddr,
                &mut addr_len,
            )
        };
        if n < 0 {
            return Err(io::Error::last_os_error());
        }
        buf.truncate(n as usize);
        Ok((addr.sll_ifindex as u32, buf))
    }
}

impl PacketTransport for PacketSocketTransport {
    fn send(&self, ifindex: u32, frame: &Frame) -> DriverResult {
        let bytes = frame.encode();
        let addr = sockaddr_ll(ifindex, ETH_P_MRP);
        let n = unsafe {
            libc::sendto(
                self.fd.as_raw_fd(),
                bytes.as_ptr() as *const libc::c_void,
                bytes.len(),
                0,
                &addr as *const libc::sockaddr_ll as *const libc::sockaddr,
                mem::size_of::<libc::sockaddr_ll>() as libc::socklen_t,
            )
        };
        if n < 0 {
            return Err(DriverError::from(io::Error::last_os_error()));
        }
        trace!(ifindex, bytes = n, "mrp: frame sent");
        Ok(())
    }
}

// `mrpd` hands the same socket to the event router (as a `PacketTransport`
// trait object, for sending) and to its own receive loop (for the raw
// `fd` and `recv_frame`); this impl lets an `Arc<PacketSocketTransport>`
// stand in wherever `Box<dyn PacketTransport>` is expected.
impl PacketTransport for std::sync::Arc<PacketSocketTransport> {
    fn send(&self, ifindex: u32, frame: &Frame) -> DriverResult {
        (**self).send(ifindex, frame)
    }
}
