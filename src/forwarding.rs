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

//! # Forwarding table
//!
//! A pure function of `(topology, root)`: [`build`] runs the BFS described in
//! the design (Dijkstra with unit weights collapses to BFS), maintaining a
//! confirmed map and a FIFO of tentative entries, breaking cost ties by
//! first-insertion order. Because [`crate::topology::Topology::neighbors`]
//! always returns a sorted set, two nodes that hold the same topology always
//! compute the same table.

use crate::node_id::NodeId;
use crate::topology::Topology;
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::fmt;

/// One row of a [`ForwardingTable`]: the cost to reach a destination and the
/// first hop on a shortest path to it. `next_hop` is `None` only for the
/// table's own self-entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ForwardingEntry {
    /// Hop count to the destination.
    pub cost: u32,
    /// First hop on a shortest path, or `None` for the self-entry.
    pub next_hop: Option<NodeId>,
}

/// Immutable snapshot mapping every node reachable from `self_id` to a
/// `(cost, next_hop)` pair, plus the `self_id -> (0, None)` sentinel.
#[derive(Debug, Clone)]
pub struct ForwardingTable {
    self_id: NodeId,
    entries: BTreeMap<NodeId, ForwardingEntry>,
}

impl ForwardingTable {
    /// The node this table was built for.
    pub fn self_id(&self) -> NodeId {
        self.self_id
    }

    /// Looks up the entry for `dst`, if this table knows a route to it.
    pub fn get(&self, dst: NodeId) -> Option<&ForwardingEntry> {
        self.entries.get(&dst)
    }

    /// The next hop to reach `dst`, if any.
    pub fn next_hop(&self, dst: NodeId) -> Option<NodeId> {
        self.get(dst).and_then(|e| e.next_hop)
    }

    /// Iterates all `(destination, entry)` pairs in id order.
    pub fn iter(&self) -> impl Iterator<Item = (&NodeId, &ForwardingEntry)> {
        self.entries.iter()
    }

    /// Number of known destinations, including self.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the table holds no entries at all (never true once built,
    /// since the self-entry is always present).
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl fmt::Display for ForwardingTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (dst, entry) in &self.entries {
            match entry.next_hop {
                Some(nh) => writeln!(f, "{dst} cost={} via {nh}", entry.cost)?,
                None => writeln!(f, "{dst} cost=0 (self)")?,
            }
        }
        Ok(())
    }
}

/// Builds a forwarding table for `root` from `topology` by BFS over unit-cost
/// edges. `O(V + E)`.
pub fn build(topology: &Topology, root: NodeId) -> ForwardingTable {
    let mut confirmed: BTreeMap<NodeId, ForwardingEntry> = BTreeMap::new();
    confirmed.insert(root, ForwardingEntry { cost: 0, next_hop: None });

    let mut tentative: VecDeque<(NodeId, u32, NodeId)> = VecDeque::new();
    let mut pending: BTreeSet<NodeId> = BTreeSet::new();
    for neighbor in topology.neighbors(root) {
        tentative.push_back((neighbor, 1, neighbor));
        pending.insert(neighbor);
    }

    while let Some((node, cost, first_hop)) = tentative.pop_front() {
        pending.remove(&node);
        for candidate in topology.neighbors(node) {
            if !confirmed.contains_key(&candidate) && !pending.contains(&candidate) {
                tentative.push_back((candidate, cost + 1, first_hop));
                pending.insert(candidate);
            }
        }
        confirmed.insert(node, ForwardingEntry { cost, next_hop: Some(first_hop) });
    }

    ForwardingTable { self_id: root, entries: confirmed }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::net::Ipv4Addr;

    fn id(last: u8) -> NodeId {
        NodeId::new(Ipv4Addr::new(10, 0, 0, last), 5000)
    }

    #[test]
    fn self_entry_is_zero_cost_sentinel() {
        let mut t = Topology::new();
        let a = id(1);
        t.ensure_node(a);
        let table = build(&t, a);
        let entry = table.get(a).unwrap();
        assert_eq!(entry.cost, 0);
        assert_eq!(entry.next_hop, None);
    }

    #[test]
    fn three_node_line_gives_cost_two_via_middle() {
        // A - B - C, rooted at A
        let (a, b, c) = (id(1), id(2), id(3));
        let mut t = Topology::new();
        t.link(a, b);
        t.link(b, c);
        let table = build(&t, a);
        assert_eq!(table.get(b).unwrap().cost, 1);
        assert_eq!(table.get(b).unwrap().next_hop, Some(b));
        assert_eq!(table.get(c).unwrap().cost, 2);
        assert_eq!(table.get(c).unwrap().next_hop, Some(b));
    }

    #[test]
    fn every_non_self_next_hop_is_a_direct_neighbor() {
        let (a, b, c, d) = (id(1), id(2), id(3), id(4));
        let mut t = Topology::new();
        t.link(a, b);
        t.link(a, c);
        t.link(c, d);
        let table = build(&t, a);
        let neighbors = t.neighbors(a);
        for (dst, entry) in table.iter() {
            if *dst == a {
                continue;
            }
            assert!(neighbors.contains(&entry.next_hop.unwrap()));
        }
    }

    #[test]
    fn build_is_idempotent() {
        let (a, b, c) = (id(1), id(2), id(3));
        let mut t = Topology::new();
        t.link(a, b);
        t.link(b, c);
        let t1 = build(&t, a);
        let t2 = build(&t, a);
        assert_eq!(t1.len(), t2.len());
        for (dst, e1) in t1.iter() {
            let e2 = t2.get(*dst).unwrap();
            assert_eq!(e1.cost, e2.cost);
            assert_eq!(e1.next_hop, e2.next_hop);
        }
    }

    #[test]
    fn unreachable_nodes_have_no_entry() {
        let (a, b, c) = (id(1), id(2), id(3));
        let mut t = Topology::new();
        t.link(a, b);
        t.ensure_node(c);
        let table = build(&t, a);
        assert!(table.get(c).is_none());
    }
}
