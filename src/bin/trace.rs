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

//! Traceroute client: walks the hop chain toward a destination by sending
//! TTL-limited trace probes through an entry emulator node and printing the
//! IPv4 address and port that answers at each hop.

use clap::Parser;
use emulink::cli::TraceArgs;
use emulink::codec::{decode_trace, encode_trace, Trace};
use emulink::node_id::NodeId;
use std::net::{Ipv4Addr, SocketAddrV4, ToSocketAddrs, UdpSocket};
use std::time::Duration;

fn resolve_entry(entry: &str) -> std::io::Result<SocketAddrV4> {
    entry
        .to_socket_addrs()?
        .find_map(|a| match a {
            std::net::SocketAddr::V4(v4) => Some(v4),
            _ => None,
        })
        .ok_or_else(|| std::io::Error::new(std::io::ErrorKind::NotFound, "no IPv4 address for entry"))
}

fn main() {
    pretty_env_logger::init();
    let args = TraceArgs::parse();

    let entry = match resolve_entry(&args.entry) {
        Ok(addr) => addr,
        Err(e) => {
            eprintln!("cannot resolve entry {}: {e}", args.entry);
            std::process::exit(1);
        }
    };
    let destination: NodeId = match args.destination.parse() {
        Ok(id) => id,
        Err(e) => {
            eprintln!("invalid destination {}: {e}", args.destination);
            std::process::exit(1);
        }
    };

    let socket = match UdpSocket::bind((Ipv4Addr::UNSPECIFIED, args.port)) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("cannot bind local port {}: {e}", args.port);
            std::process::exit(1);
        }
    };
    let local_ip = local_ipv4(&socket);
    socket
        .set_read_timeout(Some(Duration::from_millis(args.timeout_ms)))
        .expect("valid timeout");

    println!("Hop#        IP,       Port");
    let mut ttl = 0u32;
    loop {
        let probe = Trace {
            ttl,
            src_ip: local_ip,
            src_port: args.port,
            dst_ip: destination.ip(),
            dst_port: destination.port(),
        };
        if let Err(e) = socket.send_to(&encode_trace(&probe), entry) {
            eprintln!("send failed: {e}");
            break;
        }

        let mut buf = [0u8; 64];
        let reply = match socket.recv_from(&mut buf) {
            Ok((n, _)) => match decode_trace(&buf[..n]) {
                Ok(t) => t,
                Err(e) => {
                    eprintln!("malformed reply: {e}");
                    break;
                }
            },
            Err(e) => {
                eprintln!("no reply for TTL {ttl}: {e}");
                break;
            }
        };

        println!(" {}    {}, {}", ttl + 1, reply.src_ip, reply.src_port);

        ttl += 1;
        let reached = reply.src_ip == reply.dst_ip && reply.src_port == reply.dst_port;
        if ttl > args.max_ttl || reached {
            break;
        }
    }
}

fn local_ipv4(socket: &UdpSocket) -> Ipv4Addr {
    match socket.local_addr() {
        Ok(std::net::SocketAddr::V4(v4)) => *v4.ip(),
        _ => Ipv4Addr::UNSPECIFIED,
    }
}
