// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! `mrpd`: the MRP ring-redundancy daemon. Starts with an empty
//! registry; instances are always added at runtime by `mrpctl addmrp`
//! (or an init script calling it), never read from a config file (§8).

use std::os::linux::net::SocketAddrExt;
use std::os::unix::net::{SocketAddr, UnixDatagram};
use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, ValueEnum};
use drv_mrp_bridge::{KernelBridgeDriver, LinkMonitor, NullCfmSource, TextualBridgeDriver};
use drv_mrp_packet::PacketSocketTransport;
use mrp_core::driver::{BridgeDriver, NullEventBus};
use mrp_core::router::EventRouter;
use tracing_subscriber::EnvFilter;

use mrpd::server::Server;

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum BridgeDriverKind {
    Kernel,
    Textual,
}

/// The MRP (IEC 62439-2) ring-redundancy daemon.
#[derive(Parser, Debug)]
#[command(name = "mrpd", version)]
struct Cli {
    /// Abstract `AF_UNIX` name the control socket binds to.
    #[arg(long, default_value = "mrpd")]
    control_socket: String,

    /// Multiplies every timer interval; `mrpctl -T` must match to keep a
    /// test harness's clock consistent with the daemon's.
    #[arg(long, default_value_t = 1)]
    time_factor: u32,

    /// Repeatable; each occurrence raises the `tracing` filter by one
    /// level (warn -> info -> debug -> trace).
    #[arg(short, long = "debug", action = clap::ArgAction::Count)]
    debug: u8,

    /// Which `BridgeDriver` backend to install.
    #[arg(long, value_enum, default_value_t = BridgeDriverKind::Kernel)]
    bridge_driver: BridgeDriverKind,

    /// Required when `--bridge-driver textual`: the platform utility to
    /// invoke as `<command> mrp <subcommand> <args...>`.
    #[arg(long)]
    bridge_driver_command: Option<PathBuf>,
}

fn init_tracing(debug: u8) {
    let level = match debug {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn build_bridge_driver(cli: &Cli) -> anyhow::Result<Box<dyn BridgeDriver>> {
    match cli.bridge_driver {
        BridgeDriverKind::Kernel => Ok(Box::new(KernelBridgeDriver::open()?)),
        BridgeDriverKind::Textual => {
            let command = cli
                .bridge_driver_command
                .clone()
                .ok_or_else(|| anyhow::anyhow!("--bridge-driver textual requires --bridge-driver-command"))?;
            Ok(Box::new(TextualBridgeDriver::new(command)))
        }
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.debug);

    if cli.time_factor == 0 || cli.time_factor > 1_000_000 {
        anyhow::bail!("--time-factor must be between 1 and 1,000,000, got {}", cli.time_factor);
    }

    let driver = build_bridge_driver(&cli)?;
    let transport = Arc::new(PacketSocketTransport::open()?);
    let link_monitor = LinkMonitor::open()?;

    let addr = SocketAddr::from_abstract_name(cli.control_socket.as_bytes())?;
    let control = UnixDatagram::bind_addr(&addr)?;

    let router =
        EventRouter::new(driver, Box::new(Arc::clone(&transport)), Box::new(NullEventBus), cli.time_factor);

    let server = Server { router, control, transport, link_monitor, cfm: Box::new(NullCfmSource) };
    server.run()
}
