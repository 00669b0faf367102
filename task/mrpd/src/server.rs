// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The cooperative single-threaded event loop (§5): one `poll(2)` call
//! over the control socket, the packet-transport socket, and the
//! netlink link monitor, sized by the soonest timer deadline across every
//! registered instance, with the CFM peer-status fake checked on every
//! wakeup since it carries no pollable descriptor of its own.

use std::os::fd::{AsRawFd, RawFd};
use std::os::unix::net::UnixDatagram;
use std::sync::Arc;
use std::time::{Duration, Instant};

use drv_mrp_bridge::{CfmSource, LinkMonitor};
use drv_mrp_packet::PacketSocketTransport;
use mrp_core::router::EventRouter;
use tracing::{info, warn};

use crate::control;

/// An upper bound on how long one `poll(2)` call waits when no timer is
/// due sooner, so the CFM fake (which has no descriptor) still gets
/// checked at a reasonable cadence.
const MAX_POLL_WAIT: Duration = Duration::from_millis(50);

pub struct Server {
    pub router: EventRouter,
    pub control: UnixDatagram,
    pub transport: Arc<PacketSocketTransport>,
    pub link_monitor: LinkMonitor,
    pub cfm: Box<dyn CfmSource>,
}

impl Server {
    pub fn run(mut self) -> anyhow::Result<()> {
        info!("mrpd: entering event loop");
        loop {
            let now = Instant::now();
            self.router.poll_timers(now);

            while let Some((bridge_ifindex, peer_mepid, defect)) = self.cfm.try_recv() {
                self.router.on_cfm_defect(bridge_ifindex, peer_mepid, defect);
            }

            let wait = self
                .router
                .next_deadline()
                .map(|d| d.saturating_duration_since(Instant::now()))
                .unwrap_or(MAX_POLL_WAIT)
                .min(MAX_POLL_WAIT);

            let control_fd = self.control.as_raw_fd();
            let transport_fd = self.transport.raw_fd();
            let link_fd = self.link_monitor.raw_fd();
            let mut fds = [
                pollfd(control_fd),
                pollfd(transport_fd),
                pollfd(link_fd),
            ];

            let n = unsafe {
                libc::poll(fds.as_mut_ptr(), fds.len() as libc::nfds_t, wait.as_millis() as libc::c_int)
            };
            if n < 0 {
                let err = std::io::Error::last_os_error();
                if err.kind() == std::io::ErrorKind::Interrupted {
                    continue;
                }
                return Err(err.into());
            }

            if fds[0].revents & libc::POLLIN != 0 {
                self.handle_control();
            }
            if fds[1].revents & libc::POLLIN != 0 {
                self.handle_frame();
            }
            if fds[2].revents & libc::POLLIN != 0 {
                self.handle_link_event();
            }
        }
    }

    fn handle_control(&mut self) {
        let mut buf = [0u8; 4096];
        let (n, from) = match self.control.recv_from(&mut buf) {
            Ok(v) => v,
            Err(e) => {
                warn!(error = %e, "mrpd: control socket recv failed");
                return;
            }
        };
        let reply = control::dispatch(&mut self.router, &buf[..n]);
        if let Some(reply) = reply {
            if let Err(e) = self.control.send_to(&reply, &from) {
                warn!(error = %e, "mrpd: control socket reply send failed");
            }
        }
    }

    fn handle_frame(&mut self) {
        match self.transport.recv_frame() {
            Ok((ifindex, bytes)) => self.router.on_frame(ifindex, &bytes),
            Err(e) => warn!(error = %e, "mrpd: packet transport recv failed"),
        }
    }

    fn handle_link_event(&mut self) {
        match self.link_monitor.recv_events() {
            Ok(events) => {
                for ev in events {
                    self.router.on_link_event(ev);
                }
            }
            Err(e) => warn!(error = %e, "mrpd: link monitor recv failed"),
        }
    }
}

fn pollfd(fd: RawFd) -> libc::pollfd {
    libc::pollfd { fd, events: libc::POLLIN, revents: 0 }
}
