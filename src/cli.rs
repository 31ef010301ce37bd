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

//! Command-line surface for the `emulator` and `trace` binaries.

use crate::routing::{DEFAULT_DEAD_MS, DEFAULT_HELLO_MS, DEFAULT_LSA_MS, DEFAULT_TTL};
use clap::Parser;
use std::path::PathBuf;

/// Runs one emulator node: a link-state routing participant and priority
/// packet forwarder sharing a single UDP socket.
#[derive(Debug, Parser)]
#[command(name = "emulator", version, about)]
pub struct EmulatorArgs {
    /// UDP port this node listens on and is addressed by.
    #[arg(short = 'p', long)]
    pub port: u16,

    /// Capacity of each of the three priority queues and the end-packet queue.
    #[arg(short = 'q', long)]
    pub queue_size: usize,

    /// Path to the forwarding-rule file.
    #[arg(short = 'f', long = "forwarding-rules")]
    pub forwarding_rules: PathBuf,

    /// Path to the initial topology file.
    #[arg(short = 't', long = "topology")]
    pub topology: PathBuf,

    /// Hello emission interval, in milliseconds.
    #[arg(long = "hello-ms", default_value_t = DEFAULT_HELLO_MS)]
    pub hello_ms: u64,

    /// LSA origination interval, in milliseconds.
    #[arg(long = "lsa-ms", default_value_t = DEFAULT_LSA_MS)]
    pub lsa_ms: u64,

    /// Neighbor-death timeout, in milliseconds.
    #[arg(long = "dead-ms", default_value_t = DEFAULT_DEAD_MS)]
    pub dead_ms: u64,

    /// Initial TTL stamped on self-originated LSAs.
    #[arg(long = "ttl", default_value_t = DEFAULT_TTL)]
    pub ttl: u32,

    /// If set, reap LSA-cache entries for an originator not heard from in
    /// this many of our own LSA-origination rounds. Off by default.
    #[arg(long = "reap-lsa-cache-after")]
    pub reap_lsa_cache_after: Option<u64>,
}

/// Sends TTL-limited trace probes toward a destination and prints the
/// responding hop at each TTL, exactly like a classic traceroute client
/// speaking this crate's trace wire format.
#[derive(Debug, Parser)]
#[command(name = "trace", version, about)]
pub struct TraceArgs {
    /// Local UDP port to send probes from and receive replies on.
    #[arg(short = 'p', long)]
    pub port: u16,

    /// First-hop emulator node to send probes through, as `host:port`.
    #[arg(short = 'e', long = "entry")]
    pub entry: String,

    /// Destination node, as `ip,port` in the wire id format.
    #[arg(short = 'd', long = "destination")]
    pub destination: String,

    /// Maximum TTL to probe before giving up.
    #[arg(long = "max-ttl", default_value_t = 30)]
    pub max_ttl: u32,

    /// Per-probe reply timeout, in milliseconds.
    #[arg(long = "timeout-ms", default_value_t = 1000)]
    pub timeout_ms: u64,
}
