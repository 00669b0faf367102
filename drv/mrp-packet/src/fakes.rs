// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! A host-side stand-in for [`PacketTransport`] (§9): records every send
//! instead of touching a real socket, so state-machine tests can assert
//! on what would have gone out without a kernel or a NIC.

use std::sync::Mutex;

use mrp_core::driver::{DriverResult, PacketTransport};
use mrp_proto::Frame;

#[derive(Default)]
pub struct RecordingTransport {
    sent: Mutex<Vec<(u32, Frame)>>,
}

impl RecordingTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> Vec<(u32, Frame)> {
        self.sent.lock().expect("recording transport mutex poisoned").clone()
    }

    pub fn take(&self) -> Vec<(u32, Frame)> {
        std::mem::take(&mut *self.sent.lock().expect("recording transport mutex poisoned"))
    }
}

impl PacketTransport for RecordingTransport {
    fn send(&self, ifindex: u32, frame: &Frame) -> DriverResult {
        self.sent.lock().expect("recording transport mutex poisoned").push((ifindex, frame.clone()));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mrp_proto::MacAddr;

    #[test]
    fn records_every_send_in_order() {
        let t = RecordingTransport::new();
        let f = Frame {
            dst: MacAddr::BROADCAST,
            src: MacAddr::ZERO,
            seq_id: 1,
            domain: [0; 16],
            tlvs: vec![],
        };
        t.send(3, &f).unwrap();
        t.send(4, &f).unwrap();
        let sent = t.take();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0].0, 3);
        assert_eq!(sent[1].0, 4);
        assert!(t.sent().is_empty());
    }
}
