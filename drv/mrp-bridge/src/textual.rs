// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The alternate backend: streams `bridge mrp ...`-style invocations to a
//! configured platform utility instead of talking netlink directly.
//! Exists for targets where the kernel's MRP-aware bridge isn't present
//! but an equivalent vendor tool is.

use std::path::PathBuf;
use std::process::Command;

use mrp_core::driver::{BridgeDriver, DriverError, DriverResult};
use mrp_core::instance::{InRole, RingRole};
use mrp_core::port::ForwardState;
use tracing::debug;

fn forward_state_word(state: ForwardState) -> &'static str {
    match state {
        ForwardState::Disabled => "disabled",
        ForwardState::Blocked => "blocking",
        ForwardState::NotConnected => "not-connected",
        ForwardState::Forwarding => "forwarding",
    }
}

fn ring_role_word(role: RingRole) -> &'static str {
    match role {
        RingRole::Disabled => "disabled",
        RingRole::Mrc => "client",
        RingRole::Mrm => "manager",
        RingRole::Mra => "manager-auto",
    }
}

fn in_role_word(role: InRole) -> &'static str {
    match role {
        InRole::Disabled => "disabled",
        InRole::Mim => "mim",
        InRole::Mic => "mic",
    }
}

/// Runs `command mrp <subcommand> <args...>` and treats a non-zero exit
/// status as a `TransportFailed` condition.
pub struct TextualBridgeDriver {
    command: PathBuf,
}

impl TextualBridgeDriver {
    pub fn new(command: PathBuf) -> Self {
        Self { command }
    }

    fn run(&self, args: &[&str]) -> DriverResult {
        debug!(command = %self.command.display(), ?args, "mrp: textual bridge driver invoking");
        let output = Command::new(&self.command)
            .arg("mrp")
            .args(args)
            .output()
            .map_err(DriverError::from)?;
        if output.status.success() {
            Ok(())
        } else {
            Err(DriverError(format!(
                "{} mrp {:?} exited with {}: {}",
                self.command.display(),
                args,
                output.status,
                String::from_utf8_lossy(&output.stderr).trim(),
            )))
        }
    }
}

impl BridgeDriver for TextualBridgeDriver {
    fn set_port_state(&self, ifindex: u32, state: ForwardState) -> DriverResult {
        self.run(&["port-state", &ifindex.to_string(), forward_state_word(state)])
    }

    fn set_ring_role(&self, bridge_ifindex: u32, ring_nr: u32, role: RingRole) -> DriverResult {
        self.run(&[
            "ring-role",
            &bridge_ifindex.to_string(),
            &ring_nr.to_string(),
            ring_role_word(role),
        ])
    }

    fn set_in_role(&self, bridge_ifindex: u32, ring_nr: u32, role: InRole) -> DriverResult {
        self.run(&[
            "in-role",
            &bridge_ifindex.to_string(),
            &ring_nr.to_string(),
            in_role_word(role),
        ])
    }

    fn flush_fdb(&self, ifindexes: &[u32]) -> DriverResult {
        let ifindex_strs: Vec<String> = ifindexes.iter().map(u32::to_string).collect();
        let mut args = vec!["flush-fdb"];
        args.extend(ifindex_strs.iter().map(String::as_str));
        self.run(&args)
    }
}
