// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! `mrpctl`: the control-plane client. A short-lived process that binds
//! its own abstract reply address, sends one request to `mrpd`'s control
//! socket, and prints the response -- the only way instances get added,
//! removed, or listed (§8: there is no config-file path).

use std::os::linux::net::SocketAddrExt;
use std::os::unix::net::{SocketAddr, UnixDatagram};
use std::time::Duration;

use clap::{Parser, Subcommand};
use mrp_control::{
    decode_reply, encode_empty_request, encode_request, AddMrpRequest, Cmd, DelMrpRequest,
};

/// Client for `mrpd`'s control plane.
#[derive(Parser, Debug)]
#[command(name = "mrpctl", version)]
struct Cli {
    /// Abstract `AF_UNIX` name `mrpd` is listening on.
    #[arg(long, default_value = "mrpd")]
    control_socket: String,

    /// Must match the daemon's `--time-factor` for a test harness to keep
    /// its clock consistent.
    #[arg(short = 'T', long, default_value_t = 1)]
    time_factor: u32,

    /// Repeatable; raises the `tracing` filter by one level.
    #[arg(short, long = "debug", action = clap::ArgAction::Count)]
    debug: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Registers a new MRP instance.
    Addmrp {
        #[arg(long)]
        br: u32,
        #[arg(long)]
        ring_nr: u32,
        #[arg(long)]
        pport: u32,
        #[arg(long)]
        sport: u32,
        /// 0=disabled, 1=mrm, 2=mra, 3=mrc.
        #[arg(long)]
        ring_role: i32,
        #[arg(long, default_value_t = 0x8000)]
        prio: u16,
        #[arg(long, default_value_t = false)]
        react_on_link_change: bool,
        /// 0=disabled, 1=mim, 2=mic.
        #[arg(long, default_value_t = 0)]
        in_role: i32,
        #[arg(long, default_value_t = 0)]
        in_id: u32,
        #[arg(long, default_value_t = 0)]
        iport: u32,
        /// 0=ring-check, 1=link-check.
        #[arg(long, default_value_t = 0)]
        in_mode: i32,
        #[arg(long, default_value_t = 0)]
        cfm_instance: u32,
        #[arg(long, default_value_t = 0)]
        cfm_level: u8,
        #[arg(long, default_value_t = 0)]
        cfm_mepid: u32,
        #[arg(long, default_value_t = 0)]
        cfm_peer_mepid: u32,
    },
    /// Tears down an MRP instance.
    Delmrp {
        #[arg(long)]
        br: u32,
        #[arg(long)]
        ring_nr: u32,
    },
    /// Lists every registered instance.
    Getmrp,
}

fn init_tracing(debug: u8) {
    let level = match debug {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

/// Sends one request, waits `time_factor`-scaled for the reply, and
/// returns the raw reply datagram.
fn roundtrip(control_socket: &str, time_factor: u32, request: Vec<u8>) -> anyhow::Result<Vec<u8>> {
    let reply_name = format!("mrpctl-{}", std::process::id());
    let reply_addr = SocketAddr::from_abstract_name(reply_name.as_bytes())?;
    let sock = UnixDatagram::bind_addr(&reply_addr)?;
    sock.set_read_timeout(Some(Duration::from_secs(2) * time_factor.max(1)))?;

    let server_addr = SocketAddr::from_abstract_name(control_socket.as_bytes())?;
    sock.send_to_addr(&request, &server_addr)?;

    let mut buf = [0u8; 4096];
    let n = sock.recv(&mut buf)?;
    Ok(buf[..n].to_vec())
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.debug);

    match cli.command {
        Command::Addmrp {
            br,
            ring_nr,
            pport,
            sport,
            ring_role,
            prio,
            react_on_link_change,
            in_role,
            in_id,
            iport,
            in_mode,
            cfm_instance,
            cfm_level,
            cfm_mepid,
            cfm_peer_mepid,
        } => {
            let req = AddMrpRequest {
                br,
                ring_nr,
                pport,
                sport,
                ring_role,
                prio,
                ring_recv: 0,
                react_on_link_change: react_on_link_change as i32,
                in_role,
                in_id,
                iport,
                in_mode,
                in_recv: 0,
                cfm_instance,
                cfm_level,
                cfm_mepid,
                cfm_peer_mepid,
                cfm_maid: [0; 48],
                cfm_dmac: [0; 6],
            };
            let datagram = encode_request(Cmd::AddMrp, &req, 0);
            let reply = roundtrip(&cli.control_socket, cli.time_factor, datagram)?;
            let (header, _) = decode_reply(&reply)?;
            if header.res != 0 {
                anyhow::bail!("addmrp failed: mrpd returned {}", header.res);
            }
            println!("instance added: bridge {br} ring {ring_nr}");
        }
        Command::Delmrp { br, ring_nr } => {
            let req = DelMrpRequest { br, ring_nr };
            let datagram = encode_request(Cmd::DelMrp, &req, 0);
            let reply = roundtrip(&cli.control_socket, cli.time_factor, datagram)?;
            let (header, _) = decode_reply(&reply)?;
            if header.res != 0 {
                anyhow::bail!("delmrp failed: mrpd returned {}", header.res);
            }
            println!("instance removed: bridge {br} ring {ring_nr}");
        }
        Command::Getmrp => {
            let datagram = encode_empty_request(Cmd::GetMrp, 0);
            let reply = roundtrip(&cli.control_socket, cli.time_factor, datagram)?;
            let (header, body) = decode_reply(&reply)?;
            if header.res != 0 {
                anyhow::bail!("getmrp failed: mrpd returned {}", header.res);
            }
            let status: mrp_control::GetMrpReply = mrp_control::decode_record(Cmd::GetMrp, body)?;
            println!("{:<4} {:<4} {:<6} {:<6} {:<9} {:<9}", "br", "ring", "pport", "sport", "ringrole", "inrole");
            for s in status.entries() {
                println!(
                    "{:<4} {:<4} {:<6} {:<6} {:<9} {:<9}",
                    s.br, s.ring_nr, s.pport, s.sport, s.ring_role, s.in_role
                );
            }
        }
    }
    Ok(())
}
