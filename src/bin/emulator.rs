// Emulink: link-state emulator node
// Copyright (C) 2026  Emulink Contributors
//
// This program is free software; you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation; either version 2 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along
// with this program; if not, write to the Free Software Foundation, Inc.,
// 51 Franklin Street, Fifth Floor, Boston, MA 02110-1301 USA.

//! Binary entry point: parses the CLI, loads the static topology and
//! forwarding-rule files, and hands off to the node event loop. Any
//! failure up to and including the first `Node::run` error is fatal —
//! this process is a daemon with no supervisor of its own.

use clap::Parser;
use emulink::cli::EmulatorArgs;
use emulink::loader::{load_forwarding_rules, load_topology};
use emulink::node_id::NodeId;
use emulink::routing::RoutingConfig;
use emulink::Node;
use log::error;
use std::net::Ipv4Addr;
use std::process::ExitCode;

fn local_ipv4() -> Ipv4Addr {
    std::net::UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0))
        .and_then(|sock| {
            sock.connect((Ipv4Addr::new(8, 8, 8, 8), 80))?;
            sock.local_addr()
        })
        .ok()
        .and_then(|addr| match addr {
            std::net::SocketAddr::V4(v4) => Some(*v4.ip()),
            _ => None,
        })
        .unwrap_or(Ipv4Addr::LOCALHOST)
}

fn main() -> ExitCode {
    pretty_env_logger::init();
    let args = EmulatorArgs::parse();
    let self_id = NodeId::new(local_ipv4(), args.port);

    let topology = match load_topology(&args.topology, self_id) {
        Ok(t) => t,
        Err(e) => {
            error!("fatal: {e}");
            return ExitCode::FAILURE;
        }
    };
    let rules = match load_forwarding_rules(&args.forwarding_rules, self_id) {
        Ok(r) => r,
        Err(e) => {
            error!("fatal: {e}");
            return ExitCode::FAILURE;
        }
    };

    let routing_config = RoutingConfig {
        hello_ms: args.hello_ms,
        lsa_ms: args.lsa_ms,
        dead_ms: args.dead_ms,
        initial_ttl: args.ttl,
        reap_lsa_cache_after: args.reap_lsa_cache_after,
    };

    let mut node = match Node::new(self_id, topology, rules, routing_config, args.queue_size) {
        Ok(n) => n,
        Err(e) => {
            error!("fatal: {e}");
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = node.run() {
        error!("fatal: {e}");
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}
