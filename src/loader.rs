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

//! # Static loaders
//!
//! Parses the two static input files once at startup. Both are read in
//! full before the node loop starts and held immutably afterwards — a
//! malformed line anywhere is an [`Error::IoFatal`], matching "abort
//! startup with nonzero exit" rather than trying to run on a half-parsed
//! config.

use crate::error::{Error, Result};
use crate::forwarder::ForwardingRule;
use crate::node_id::NodeId;
use crate::topology::Topology;
use std::net::{Ipv4Addr, SocketAddr, ToSocketAddrs};
use std::path::Path;

fn resolve_ipv4(host: &str) -> Option<Ipv4Addr> {
    if let Ok(ip) = host.parse::<Ipv4Addr>() {
        return Some(ip);
    }
    (host, 0u16)
        .to_socket_addrs()
        .ok()?
        .find_map(|addr| match addr { SocketAddr::V4(v4) => Some(*v4.ip()), _ => None })
}

fn parse_id_token(token: &str) -> Option<NodeId> {
    let (host, port_str) = token.split_once(',')?;
    let port: u16 = port_str.parse().ok()?;
    let ip = resolve_ipv4(host)?;
    Some(NodeId::new(ip, port))
}

fn malformed(kind: &str, lineno: usize, line: &str) -> Error {
    Error::IoFatal(format!("malformed {kind} line {}: {line:?}", lineno + 1))
}

/// Parses the topology file format directly from text: each line is
/// `self_id neighbor_id…`, every id a `hostname,port` token. Hostnames that
/// don't parse directly as an IPv4 address are resolved via DNS.
/// `self_id` is added to the resulting topology even if it never appears as
/// a line owner, so a leaf node with no listed neighbors still has an
/// entry.
pub fn parse_topology(text: &str, self_id: NodeId) -> Result<Topology> {
    let mut topology = Topology::new();
    for (lineno, raw_line) in text.lines().enumerate() {
        let line = raw_line.trim();
        if line.is_empty() {
            continue;
        }
        let mut tokens = line.split_whitespace();
        let owner_tok = tokens.next().ok_or_else(|| malformed("topology", lineno, line))?;
        let owner =
            parse_id_token(owner_tok).ok_or_else(|| malformed("topology", lineno, line))?;
        topology.ensure_node(owner);
        for neighbor_tok in tokens {
            let neighbor = parse_id_token(neighbor_tok)
                .ok_or_else(|| malformed("topology", lineno, line))?;
            topology.link(owner, neighbor);
        }
    }
    topology.ensure_node(self_id);
    Ok(topology)
}

/// Reads and parses the topology file at `path` for `self_id`.
pub fn load_topology<P: AsRef<Path>>(path: P, self_id: NodeId) -> Result<Topology> {
    let text = std::fs::read_to_string(path.as_ref()).map_err(|cause| {
        Error::IoFatal(format!("reading topology file {}: {cause}", path.as_ref().display()))
    })?;
    parse_topology(&text, self_id)
}

/// Parses the forwarding-rule file format directly from text: each line is
/// `self_host self_port dest_host dest_port next_host next_port delay_ms
/// loss_percent`. Only rows whose `(self_host, self_port)` resolves to
/// `self_id` are retained.
pub fn parse_forwarding_rules(text: &str, self_id: NodeId) -> Result<Vec<ForwardingRule>> {
    let mut rules = Vec::new();
    for (lineno, raw_line) in text.lines().enumerate() {
        let line = raw_line.trim();
        if line.is_empty() {
            continue;
        }
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.len() != 8 {
            return Err(malformed("forwarding-rule", lineno, line));
        }
        let err = || malformed("forwarding-rule", lineno, line);
        let owner_ip = resolve_ipv4(fields[0]).ok_or_else(err)?;
        let owner_port: u16 = fields[1].parse().map_err(|_| err())?;
        if NodeId::new(owner_ip, owner_port) != self_id {
            continue;
        }
        let dest_ip = resolve_ipv4(fields[2]).ok_or_else(err)?;
        let dest_port: u16 = fields[3].parse().map_err(|_| err())?;
        let next_ip = resolve_ipv4(fields[4]).ok_or_else(err)?;
        let next_port: u16 = fields[5].parse().map_err(|_| err())?;
        let delay_ms: u64 = fields[6].parse().map_err(|_| err())?;
        let loss_percent: u8 = fields[7].parse().map_err(|_| err())?;
        rules.push(ForwardingRule {
            destination: NodeId::new(dest_ip, dest_port),
            next_hop: NodeId::new(next_ip, next_port),
            delay_ms,
            loss_percent,
        });
    }
    Ok(rules)
}

/// Reads and parses the forwarding-rule file at `path` for `self_id`.
pub fn load_forwarding_rules<P: AsRef<Path>>(
    path: P,
    self_id: NodeId,
) -> Result<Vec<ForwardingRule>> {
    let text = std::fs::read_to_string(path.as_ref()).map_err(|cause| {
        Error::IoFatal(format!(
            "reading forwarding-rule file {}: {cause}",
            path.as_ref().display()
        ))
    })?;
    parse_forwarding_rules(&text, self_id)
}

#[cfg(test)]
mod test {
    use super::*;

    fn id(last: u8, port: u16) -> NodeId {
        NodeId::new(Ipv4Addr::new(10, 0, 0, last), port)
    }

    #[test]
    fn topology_parses_owner_and_neighbors() {
        let text = "10.0.0.1,5000 10.0.0.2,5000 10.0.0.3,5000\n10.0.0.2,5000 10.0.0.1,5000\n";
        let t = parse_topology(text, id(1, 5000)).unwrap();
        assert!(t.is_linked(id(1, 5000), id(2, 5000)));
        assert!(t.is_linked(id(1, 5000), id(3, 5000)));
    }

    #[test]
    fn topology_ensures_self_present_even_if_unlisted() {
        let t = parse_topology("", id(9, 5000)).unwrap();
        assert!(t.contains(id(9, 5000)));
    }

    #[test]
    fn topology_rejects_malformed_line() {
        let text = "not-an-id\n";
        assert!(matches!(parse_topology(text, id(1, 5000)), Err(Error::IoFatal(_))));
    }

    #[test]
    fn topology_skips_blank_lines() {
        let text = "\n10.0.0.1,5000 10.0.0.2,5000\n\n";
        let t = parse_topology(text, id(1, 5000)).unwrap();
        assert!(t.is_linked(id(1, 5000), id(2, 5000)));
    }

    #[test]
    fn forwarding_rules_keep_only_rows_for_self() {
        let text = "\
10.0.0.1 5000 10.0.0.3 5000 10.0.0.2 5000 10 0
10.0.0.2 5000 10.0.0.3 5000 10.0.0.2 5000 10 0
";
        let rules = parse_forwarding_rules(text, id(1, 5000)).unwrap();
        assert_eq!(rules.len(), 1);
        assert_eq!(rules[0].destination, id(3, 5000));
        assert_eq!(rules[0].next_hop, id(2, 5000));
        assert_eq!(rules[0].delay_ms, 10);
        assert_eq!(rules[0].loss_percent, 0);
    }

    #[test]
    fn forwarding_rules_rejects_wrong_field_count() {
        let text = "10.0.0.1 5000 10.0.0.3 5000\n";
        assert!(matches!(parse_forwarding_rules(text, id(1, 5000)), Err(Error::IoFatal(_))));
    }
}
