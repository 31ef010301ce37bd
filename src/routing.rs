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

//! # Routing plane
//!
//! Owns neighbor liveness, the LSA sequence cache, topology edits, and
//! forwarding-table rebuilds. It never touches a socket: every method that
//! needs to send something returns the `(destination, frame)` pairs for the
//! caller (the node event loop) to actually write.

use crate::codec::{Hello, Lsa, LsaNeighbor};
use crate::error::Error;
use crate::forwarding::{self, ForwardingTable};
use crate::node_id::NodeId;
use crate::topology::Topology;
use log::{debug, info, warn};
use std::collections::{BTreeMap, BTreeSet};

/// Default hello emission interval, milliseconds.
pub const DEFAULT_HELLO_MS: u64 = 50;
/// Default LSA origination interval, milliseconds.
pub const DEFAULT_LSA_MS: u64 = 200;
/// Default neighbor-death timeout, milliseconds.
pub const DEFAULT_DEAD_MS: u64 = 2000;
/// Default initial LSA TTL.
pub const DEFAULT_TTL: u32 = 20;

/// A frame the routing plane wants sent, paired with its destination by the
/// caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outgoing {
    /// A hello probe.
    Hello(Hello),
    /// A link-state advertisement.
    Lsa(Lsa),
}

/// Tunable protocol parameters, overridable from the CLI for testability.
#[derive(Debug, Clone, Copy)]
pub struct RoutingConfig {
    /// `T_hello`.
    pub hello_ms: u64,
    /// `T_lsa`.
    pub lsa_ms: u64,
    /// `T_dead`.
    pub dead_ms: u64,
    /// Initial TTL stamped on self-originated LSAs.
    pub initial_ttl: u32,
    /// If set, LSA cache entries for an originator not heard from in this
    /// many of *our own* origination rounds are reaped. `None` (the
    /// default) never reaps, matching the baseline design.
    pub reap_lsa_cache_after: Option<u64>,
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            hello_ms: DEFAULT_HELLO_MS,
            lsa_ms: DEFAULT_LSA_MS,
            dead_ms: DEFAULT_DEAD_MS,
            initial_ttl: DEFAULT_TTL,
            reap_lsa_cache_after: None,
        }
    }
}

/// The per-node routing protocol state machine.
#[derive(Debug)]
pub struct RoutingPlane {
    self_id: NodeId,
    config: RoutingConfig,
    topology: Topology,
    table: ForwardingTable,
    liveness: BTreeMap<NodeId, u64>,
    lsa_seq_cache: BTreeMap<NodeId, u32>,
    lsa_last_seen_round: BTreeMap<NodeId, u64>,
    local_seq: u32,
    round: u64,
}

impl RoutingPlane {
    /// Builds a routing plane from a statically-loaded initial topology. The
    /// topology is pruned to the component reachable from `self_id` and the
    /// table is built immediately. Current neighbors are seeded into the
    /// liveness map at `now_ms`, matching the reference implementation's
    /// startup behavior of not immediately declaring freshly-loaded
    /// neighbors dead before their first hello has had a chance to arrive.
    pub fn new(
        self_id: NodeId,
        mut topology: Topology,
        now_ms: u64,
        config: RoutingConfig,
    ) -> Self {
        topology.ensure_node(self_id);
        topology.prune_from(self_id);
        let table = forwarding::build(&topology, self_id);
        let liveness =
            topology.neighbors(self_id).into_iter().map(|n| (n, now_ms)).collect();
        Self {
            self_id,
            config,
            topology,
            table,
            liveness,
            lsa_seq_cache: BTreeMap::new(),
            lsa_last_seen_round: BTreeMap::new(),
            local_seq: 0,
            round: 0,
        }
    }

    /// The current forwarding table.
    pub fn table(&self) -> &ForwardingTable {
        &self.table
    }

    /// The current topology snapshot.
    pub fn topology(&self) -> &Topology {
        &self.topology
    }

    /// Protocol configuration in effect.
    pub fn config(&self) -> &RoutingConfig {
        &self.config
    }

    fn rebuild_table(&mut self) {
        self.table = forwarding::build(&self.topology, self.self_id);
        debug!("topology for {}:\n{}", self.self_id, self.topology);
        debug!("rebuilt forwarding table for {}:\n{}", self.self_id, self.table);
    }

    /// Builds a fresh self-originated LSA (bumping the local sequence
    /// counter) and returns it paired with every current neighbor as a
    /// destination.
    pub fn originate_lsa(&mut self) -> Vec<(NodeId, Outgoing)> {
        self.local_seq += 1;
        self.round += 1;
        if let Some(after) = self.config.reap_lsa_cache_after {
            self.reap_lsa_cache(after);
        }
        let neighbors = self.topology.neighbors(self.self_id);
        let lsa = Lsa {
            origin_ip: self.self_id.ip(),
            origin_port: self.self_id.port(),
            seq: self.local_seq,
            ttl: self.config.initial_ttl,
            neighbors: neighbors
                .iter()
                .map(|n| LsaNeighbor { ip: n.ip(), port: n.port(), cost: 1 })
                .collect(),
        };
        flood(&neighbors, Outgoing::Lsa(lsa))
    }

    fn reap_lsa_cache(&mut self, after_rounds: u64) {
        let cutoff = self.round.saturating_sub(after_rounds);
        let stale: Vec<NodeId> = self
            .lsa_last_seen_round
            .iter()
            .filter(|(_, &seen)| seen < cutoff)
            .map(|(id, _)| *id)
            .collect();
        for id in stale {
            self.lsa_seq_cache.remove(&id);
            self.lsa_last_seen_round.remove(&id);
            debug!("reaped LSA cache entry for stale originator {id}");
        }
    }

    /// Emits a hello to every current neighbor.
    pub fn emit_hellos(&self) -> Vec<(NodeId, Outgoing)> {
        let hello = Hello { ip: self.self_id.ip(), port: self.self_id.port() };
        self.topology
            .neighbors(self.self_id)
            .into_iter()
            .map(|n| (n, Outgoing::Hello(hello)))
            .collect()
    }

    /// Handles an inbound hello. Links a previously-unknown neighbor and, if
    /// that changed the topology, rebuilds the table and floods a fresh LSA
    /// immediately.
    pub fn receive_hello(&mut self, now_ms: u64, hello: Hello) -> Vec<(NodeId, Outgoing)> {
        let src = NodeId::new(hello.ip, hello.port);
        self.liveness.insert(src, now_ms);
        if self.topology.neighbors(self.self_id).contains(&src) {
            return Vec::new();
        }
        info!("discovered new neighbor {src} via hello");
        self.topology.link(self.self_id, src);
        self.topology.prune_from(self.self_id);
        self.rebuild_table();
        self.originate_lsa()
    }

    /// Handles an inbound LSA received from `sender`. Drops stale/duplicate
    /// advertisements silently, otherwise updates the cache, applies any
    /// topology change, and floods onward (TTL permitting) to every current
    /// neighbor except `sender`.
    pub fn receive_lsa(&mut self, lsa: Lsa, sender: NodeId) -> Vec<(NodeId, Outgoing)> {
        let originator = NodeId::new(lsa.origin_ip, lsa.origin_port);
        if let Some(&cached) = self.lsa_seq_cache.get(&originator) {
            if lsa.seq <= cached {
                debug!("{}", Error::StaleLsa(originator.to_string()));
                return Vec::new();
            }
        }
        self.lsa_seq_cache.insert(originator, lsa.seq);
        self.lsa_last_seen_round.insert(originator, self.round);

        let advertised: BTreeSet<NodeId> =
            lsa.neighbors.iter().map(|n| NodeId::new(n.ip, n.port)).collect();
        if self.topology.neighbors(originator) != advertised {
            self.topology.replace_neighbors(originator, &advertised);
            self.topology.prune_from(self.self_id);
            self.rebuild_table();
        }

        if lsa.ttl <= 1 {
            return Vec::new();
        }
        let forwarded = Lsa { ttl: lsa.ttl - 1, ..lsa };
        let destinations: Vec<NodeId> = self
            .topology
            .neighbors(self.self_id)
            .into_iter()
            .filter(|n| *n != sender)
            .collect();
        flood(&destinations.into_iter().collect(), Outgoing::Lsa(forwarded))
    }

    /// Removes any neighbor whose last hello is older than `T_dead`. Each
    /// death triggers its own topology edit, table rebuild, and LSA
    /// reorigination, matching the reference implementation's per-neighbor
    /// handling.
    pub fn expire_dead_neighbors(&mut self, now_ms: u64) -> Vec<(NodeId, Outgoing)> {
        let dead: Vec<NodeId> = self
            .liveness
            .iter()
            .filter(|(_, &last)| now_ms.saturating_sub(last) >= self.config.dead_ms)
            .map(|(id, _)| *id)
            .collect();
        let mut outgoing = Vec::new();
        for id in dead {
            warn!("neighbor {id} declared dead ({}ms without a hello)", self.config.dead_ms);
            self.topology.unlink(self.self_id, id);
            self.liveness.remove(&id);
            self.topology.prune_from(self.self_id);
            self.rebuild_table();
            outgoing.extend(self.originate_lsa());
        }
        outgoing
    }
}

fn flood(destinations: &BTreeSet<NodeId>, payload: Outgoing) -> Vec<(NodeId, Outgoing)> {
    destinations.iter().map(|&d| (d, payload.clone())).collect()
}

#[cfg(test)]
mod test {
    use super::*;
    use std::net::Ipv4Addr;

    fn id(last: u8, port: u16) -> NodeId {
        NodeId::new(Ipv4Addr::new(10, 0, 0, last), port)
    }

    fn plane(self_id: NodeId, topo: Topology) -> RoutingPlane {
        RoutingPlane::new(self_id, topo, 0, RoutingConfig::default())
    }

    #[test]
    fn hello_from_unknown_neighbor_links_and_floods_lsa() {
        let a = id(1, 5000);
        let b = id(2, 5000);
        let mut rp = plane(a, Topology::new());
        let out = rp.receive_hello(10, Hello { ip: b.ip(), port: b.port() });
        assert!(rp.topology().is_linked(a, b));
        assert_eq!(rp.table().next_hop(b), Some(b));
        assert!(out.iter().any(|(dst, frame)| *dst == b && matches!(frame, Outgoing::Lsa(_))));
    }

    #[test]
    fn hello_from_known_neighbor_only_updates_liveness() {
        let a = id(1, 5000);
        let b = id(2, 5000);
        let mut topo = Topology::new();
        topo.link(a, b);
        let mut rp = plane(a, topo);
        let out = rp.receive_hello(10, Hello { ip: b.ip(), port: b.port() });
        assert!(out.is_empty());
    }

    #[test]
    fn stale_lsa_is_dropped_silently() {
        let a = id(1, 5000);
        let origin = id(3, 5000);
        let mut rp = plane(a, Topology::new());
        let lsa = Lsa { origin_ip: origin.ip(), origin_port: origin.port(), seq: 5, ttl: 20, neighbors: vec![] };
        let first = rp.receive_lsa(lsa.clone(), a);
        assert!(!first.is_empty() || lsa.ttl <= 1);
        let replay = rp.receive_lsa(lsa, a);
        assert!(replay.is_empty());
    }

    #[test]
    fn lsa_monotonicity_rejects_equal_or_lower_seq() {
        let a = id(1, 5000);
        let origin = id(3, 5000);
        let mut rp = plane(a, Topology::new());
        let mk = |seq| Lsa { origin_ip: origin.ip(), origin_port: origin.port(), seq, ttl: 20, neighbors: vec![] };
        rp.receive_lsa(mk(5), a);
        assert!(rp.receive_lsa(mk(5), a).is_empty());
        assert!(rp.receive_lsa(mk(4), a).is_empty());
        // a strictly larger sequence is accepted (reflected by the cache ignoring a later replay of 5)
        rp.receive_lsa(mk(6), a);
        assert!(rp.receive_lsa(mk(6), a).is_empty());
    }

    #[test]
    fn ttl_of_one_is_not_forwarded_further() {
        let a = id(1, 5000);
        let b = id(2, 5000);
        let origin = id(3, 5000);
        let mut topo = Topology::new();
        topo.link(a, b);
        let mut rp = plane(a, topo);
        let lsa = Lsa { origin_ip: origin.ip(), origin_port: origin.port(), seq: 1, ttl: 1, neighbors: vec![] };
        let out = rp.receive_lsa(lsa, b);
        assert!(out.is_empty());
    }

    #[test]
    fn dead_neighbor_is_unlinked_and_reoriginates_lsa() {
        let a = id(1, 5000);
        let b = id(2, 5000);
        let mut topo = Topology::new();
        topo.link(a, b);
        let mut rp = RoutingPlane::new(a, topo, 0, RoutingConfig { dead_ms: 100, ..Default::default() });
        let out = rp.expire_dead_neighbors(1000);
        assert!(!rp.topology().is_linked(a, b));
        assert_eq!(rp.table().len(), 1);
        assert!(out.iter().any(|(_, f)| matches!(f, Outgoing::Lsa(_))));
    }

    #[test]
    fn three_node_line_converges_to_cost_two() {
        let (a, b, c) = (id(1, 5000), id(2, 5000), id(3, 5000));
        let mut topo_a = Topology::new();
        topo_a.link(a, b);
        let mut topo_c = Topology::new();
        topo_c.link(c, b);
        let mut rp_a = plane(a, topo_a);
        let mut rp_c = plane(c, topo_c);

        // B learns both via hello; A and C exchange LSAs through B in this
        // simplified point-to-point simulation of the flood.
        let a_lsa = rp_a.originate_lsa();
        let c_lsa = rp_c.originate_lsa();
        for (_, frame) in a_lsa {
            if let Outgoing::Lsa(lsa) = frame {
                rp_c.receive_lsa(lsa, b);
            }
        }
        for (_, frame) in c_lsa {
            if let Outgoing::Lsa(lsa) = frame {
                rp_a.receive_lsa(lsa, b);
            }
        }
        assert_eq!(rp_a.table().get(c).unwrap().cost, 2);
        assert_eq!(rp_a.table().get(c).unwrap().next_hop, Some(b));
        assert_eq!(rp_c.table().get(a).unwrap().cost, 2);
        assert_eq!(rp_c.table().get(a).unwrap().next_hop, Some(b));
    }
}
