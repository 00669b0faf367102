// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The CFM peer-status input (§6): `mrp-core` only needs the
//! `(bridge_ifindex, peer_mepid, defect)` signal shape, not a full
//! 802.1ag stack. This crate supplies a no-op default and a
//! channel-backed fake for tests; a real CFM transport is left as a
//! trait a caller can satisfy.

use std::sync::mpsc::{Receiver, TryRecvError};

/// Yields `(bridge_ifindex, peer_mepid, defect)` triples as they arrive.
pub trait CfmSource: Send {
    fn try_recv(&self) -> Option<(u32, u32, bool)>;
}

/// The default when no interconnect uses LC mode: never fires.
pub struct NullCfmSource;

impl CfmSource for NullCfmSource {
    fn try_recv(&self) -> Option<(u32, u32, bool)> {
        None
    }
}

/// Test/host fake: replays whatever a test pushes onto the paired sender.
pub struct ChannelCfmSource {
    rx: Receiver<(u32, u32, bool)>,
}

impl ChannelCfmSource {
    pub fn new(rx: Receiver<(u32, u32, bool)>) -> Self {
        Self { rx }
    }
}

impl CfmSource for ChannelCfmSource {
    fn try_recv(&self) -> Option<(u32, u32, bool)> {
        match self.rx.try_recv() {
            Ok(v) => Some(v),
            Err(TryRecvError::Empty | TryRecvError::Disconnected) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc::channel;

    #[test]
    fn null_source_never_fires() {
        assert!(NullCfmSource.try_recv().is_none());
    }

    #[test]
    fn channel_source_replays_pushed_defects() {
        let (tx, rx) = channel();
        let source = ChannelCfmSource::new(rx);
        assert!(source.try_recv().is_none());
        tx.send((1, 100, true)).unwrap();
        assert_eq!(source.try_recv(), Some((1, 100, true)));
        assert!(source.try_recv().is_none());
    }
}
