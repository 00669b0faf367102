// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Just enough `NETLINK_ROUTE` framing for the kernel bridge driver and
//! the link monitor: one request/ack round trip, one notification read,
//! and an `rtattr` builder/walker. Not a general-purpose netlink library.

use std::io;
use std::mem;
use std::os::fd::{AsRawFd, FromRawFd, OwnedFd, RawFd};
use std::sync::atomic::{AtomicU32, Ordering};

const NLMSG_ALIGN: usize = 4;

fn align(n: usize) -> usize {
    (n + NLMSG_ALIGN - 1) & !(NLMSG_ALIGN - 1)
}

pub struct NetlinkSocket {
    fd: OwnedFd,
    seq: AtomicU32,
}

impl NetlinkSocket {
    /// Opens the socket, joining `RTMGRP_LINK` when `join_link_group` is
    /// set (the link monitor wants unsolicited notifications; the bridge
    /// driver only ever sends requests).
    pub fn open(join_link_group: bool) -> io::Result<Self> {
        let raw = unsafe { libc::socket(libc::AF_NETLINK, libc::SOCK_RAW, libc::NETLINK_ROUTE) };
        if raw < 0 {
            return Err(io::Error::last_os_error());
        }
        let fd = unsafe { OwnedFd::from_raw_fd(raw) };

        let mut addr: libc::sockaddr_nl = unsafe { mem::zeroed() };
        addr.nl_family = libc::AF_NETLINK as u16;
        addr.nl_groups = if join_link_group { libc::RTMGRP_LINK as u32 } else { 0 };
        let rc = unsafe {
            libc::bind(
                fd.as_raw_fd(),
                &addr as *const libc::sockaddr_nl as *const libc::sockaddr,
                mem::size_of::<libc::sockaddr_nl>() as libc::socklen_t,
            )
        };
        if rc < 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(Self { fd, seq: AtomicU32::new(1) })
    }

    pub fn raw_fd(&self) -> RawFd {
        self.fd.as_raw_fd()
    }

    fn next_seq(&self) -> u32 {
        self.seq.fetch_add(1, Ordering::Relaxed)
    }

    /// Sends `nlmsg_type` + `payload` (already including any fixed-size
    /// message header, e.g. `ifinfomsg`, ahead of the attribute bytes) to
    /// the kernel and waits for its `NLMSG_ERROR` acknowledgement.
    pub fn request_ack(&self, nlmsg_type: u16, mut payload: Vec<u8>) -> io::Result<()> {
        let hdr_len = mem::size_of::<libc::nlmsghdr>();
        let total = hdr_len + payload.len();
        let hdr = libc::nlmsghdr {
            nlmsg_len: total as u32,
            nlmsg_type,
            nlmsg_flags: (libc::NLM_F_REQUEST | libc::NLM_F_ACK) as u16,
            nlmsg_seq: self.next_seq(),
            nlmsg_pid: 0,
        };
        let mut buf = vec![0u8; hdr_len];
        unsafe {
            std::ptr::copy_nonoverlapping(&hdr as *const _ as *const u8, buf.as_mut_ptr(), hdr_len);
        }
        buf.append(&mut payload);

        let dest: libc::sockaddr_nl = unsafe { mem::zeroed() };
        let n = unsafe {
            libc::sendto(
                self.fd.as_raw_fd(),
                buf.as_ptr() as *const libc::c_void,
                buf.len(),
                0,
                &dest as *const libc::sockaddr_nl as *const libc::sockaddr,
                mem::size_of::<libc::sockaddr_nl>() as libc::socklen_t,
            )
        };
        if n < 0 {
            return Err(io::Error::last_os_error());
        }

        let mut reply = vec![0u8; 4096];
        let r = unsafe {
            libc::recv(self.fd.as_raw_fd(), reply.as_mut_ptr() as *mut libc::c_void, reply.len(), 0)
        };
        if r < 0 {
            return Err(io::Error::last_os_error());
        }
        reply.truncate(r as usize);
        parse_ack(&reply)
    }

    /// Blocks for the next notification, returning its message type, the
    /// `ifinfomsg.ifi_index` it names, and the attribute bytes following
    /// that fixed header.
    pub fn recv_link_notification(&self) -> io::Result<(u16, i32, Vec<u8>)> {
        let mut buf = vec![0u8; 4096];
        let n = unsafe {
            libc::recv(self.fd.as_raw_fd(), buf.as_mut_ptr() as *mut libc::c_void, buf.len(), 0)
        };
        if n < 0 {
            return Err(io::Error::last_os_error());
        }
        buf.truncate(n as usize);
        let hdr_len = mem::size_of::<libc::nlmsghdr>();
        let ifi_len = mem::size_of::<libc::ifinfomsg>();
        if buf.len() < hdr_len + ifi_len {
            return Err(io::Error::new(io::ErrorKind::InvalidData, "short netlink link message"));
        }
        let hdr: libc::nlmsghdr = unsafe { std::ptr::read_unaligned(buf.as_ptr() as *const _) };
        let ifi: libc::ifinfomsg = unsafe { std::ptr::read_unaligned(buf[hdr_len..].as_ptr() as *const _) };
        let body_end = (hdr.nlmsg_len as usize).min(buf.len());
        Ok((hdr.nlmsg_type, ifi.ifi_index, buf[hdr_len + ifi_len..body_end].to_vec()))
    }
}

fn parse_ack(buf: &[u8]) -> io::Result<()> {
    let hdr_len = mem::size_of::<libc::nlmsghdr>();
    if buf.len() < hdr_len {
        return Err(io::Error::new(io::ErrorKind::InvalidData, "short netlink ack"));
    }
    let hdr: libc::nlmsghdr = unsafe { std::ptr::read_unaligned(buf.as_ptr() as *const _) };
    if hdr.nlmsg_type != libc::NLMSG_ERROR as u16 {
        return Ok(());
    }
    let err_off = hdr_len;
    if buf.len() < err_off + 4 {
        return Err(io::Error::new(io::ErrorKind::InvalidData, "truncated netlink error"));
    }
    let errno = i32::from_ne_bytes(buf[err_off..err_off + 4].try_into().expect("checked above"));
    if errno == 0 {
        Ok(())
    } else {
        Err(io::Error::from_raw_os_error(-errno))
    }
}

/// Appends one `rtattr` (type, value) pair, padded to 4-byte alignment.
/// Nested attributes are built the same way: encode the inner attributes
/// into a `Vec<u8>` first, then pass that as `value`.
pub fn push_attr(buf: &mut Vec<u8>, ty: u16, value: &[u8]) {
    let attr_hdr = mem::size_of::<libc::rtattr>();
    let len = attr_hdr + value.len();
    let attr = libc::rtattr { rta_len: len as u16, rta_type: ty };
    buf.extend_from_slice(unsafe {
        std::slice::from_raw_parts(&attr as *const _ as *const u8, attr_hdr)
    });
    buf.extend_from_slice(value);
    let padded = align(len);
    buf.resize(buf.len() + (padded - len), 0);
}

/// Walks a buffer of back-to-back `rtattr`s, yielding `(type, value)`.
pub fn iter_attrs(buf: &[u8]) -> impl Iterator<Item = (u16, &[u8])> {
    let attr_hdr = mem::size_of::<libc::rtattr>();
    let mut rest = buf;
    std::iter::from_fn(move || {
        if rest.len() < attr_hdr {
            return None;
        }
        let attr: libc::rtattr = unsafe { std::ptr::read_unaligned(rest.as_ptr() as *const _) };
        let len = attr.rta_len as usize;
        if len < attr_hdr || len > rest.len() {
            return None;
        }
        let value = &rest[attr_hdr..len];
        let consumed = align(len).min(rest.len());
        rest = &rest[consumed..];
        Some((attr.rta_type, value))
    })
}
