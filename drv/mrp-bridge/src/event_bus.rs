// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The optional event bus (§6): formats `"<ifname>:StateChanged:<new-
//! state>:"` and writes it to any sink, so a subscriber (a log shipper, a
//! named pipe) can be wired in without `mrp-core` knowing it exists.

use std::io::Write;
use std::sync::Mutex;

use mrp_core::driver::EventBus;
use mrp_core::port::ForwardState;

fn state_word(state: ForwardState) -> &'static str {
    match state {
        ForwardState::Disabled => "Disabled",
        ForwardState::Blocked => "Blocking",
        ForwardState::Forwarding => "Forwarding",
        ForwardState::NotConnected => "Unconnected",
    }
}

/// Writes one formatted line per port-state change to `sink`. Write
/// failures are logged, not propagated: a stuck subscriber must never
/// block the event router.
pub struct TextEventBus<W: Write + Send> {
    sink: Mutex<W>,
}

impl<W: Write + Send> TextEventBus<W> {
    pub fn new(sink: W) -> Self {
        Self { sink: Mutex::new(sink) }
    }
}

impl<W: Write + Send> EventBus for TextEventBus<W> {
    fn port_state_changed(&self, ifname: &str, new_state: ForwardState) {
        let line = format!("{ifname}:StateChanged:{}:\n", state_word(new_state));
        let mut sink = self.sink.lock().expect("event bus sink mutex poisoned");
        if let Err(e) = sink.write_all(line.as_bytes()) {
            tracing::warn!(error = %e, "mrp: event bus write failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_port_event_signal() {
        let bus = TextEventBus::new(Vec::new());
        bus.port_state_changed("eth0", ForwardState::Forwarding);
        bus.port_state_changed("eth1", ForwardState::Blocked);
        let out = bus.sink.into_inner().unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "eth0:StateChanged:Forwarding:\neth1:StateChanged:Blocking:\n"
        );
    }
}
