// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Library half of the `mrpd` binary, split out so `tests/` can drive the
//! control-plane dispatch directly against fake `mrp-core` backends instead
//! of needing a live bridge, packet socket and netlink monitor.

pub mod control;
pub mod iface;
pub mod server;
