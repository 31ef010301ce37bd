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

//! # Topology store
//!
//! An undirected adjacency map over node ids, kept as a
//! [`petgraph::graphmap::UnGraphMap`] so that symmetry (`v ∈ adj[u] ⇔ u ∈
//! adj[v]`) holds by construction rather than by convention: an undirected
//! graph has no notion of a one-sided edge to begin with, which sidesteps
//! the stale-back-edge bookkeeping the reference implementation otherwise
//! needs.
//!
//! Every structural edit is expected to be followed by [`Topology::prune_from`]
//! to restore the "reachable from self" invariant; [`crate::routing::RoutingPlane`]
//! is the only caller and does this consistently.

use crate::node_id::NodeId;
use petgraph::graphmap::UnGraphMap;
use petgraph::visit::Dfs;
use std::collections::BTreeSet;
use std::fmt;

/// Undirected topology snapshot.
#[derive(Debug, Clone, Default)]
pub struct Topology {
    graph: UnGraphMap<NodeId, ()>,
}

impl Topology {
    /// An empty topology.
    pub fn new() -> Self {
        Self { graph: UnGraphMap::new() }
    }

    /// Ensures `id` is present, even with no neighbors.
    pub fn ensure_node(&mut self, id: NodeId) {
        self.graph.add_node(id);
    }

    /// Adds an undirected edge between `u` and `v`, idempotently. A self-loop
    /// request is ignored.
    pub fn link(&mut self, u: NodeId, v: NodeId) {
        if u == v {
            return;
        }
        self.graph.add_edge(u, v, ());
    }

    /// Removes the edge between `u` and `v` if present. Leaves both nodes in
    /// the graph even if they end up with no remaining neighbors.
    pub fn unlink(&mut self, u: NodeId, v: NodeId) {
        self.graph.remove_edge(u, v);
    }

    /// Sets `u`'s neighbor set to exactly `neighbors`, adding the reciprocal
    /// edges and removing `u`'s stale ones immediately.
    ///
    /// The reference design leaves a stale `adj[u]` back-edge in place until
    /// the subsequent `prune_from` sweep clears it, relying on reachability
    /// from other advertisements to keep a still-connected peer around in
    /// the meantime. This implementation instead drops `u`'s stale edges
    /// right here. On an undirected graph the two are equivalent in the
    /// steady state (both converge to the same adjacency once `prune_from`
    /// runs), but they differ for the one rebuild in between: this version
    /// can transiently lose a peer that was only reachable through the
    /// stale edge, where the reference keeps it until that peer's own LSA
    /// catches up. Chosen deliberately to keep the symmetry invariant
    /// (`v ∈ adj[u] ⇔ u ∈ adj[v]`) true at every intermediate step rather
    /// than only after pruning.
    pub fn replace_neighbors(&mut self, u: NodeId, neighbors: &BTreeSet<NodeId>) {
        self.ensure_node(u);
        let stale: Vec<NodeId> =
            self.neighbors(u).into_iter().filter(|n| !neighbors.contains(n)).collect();
        for n in stale {
            self.graph.remove_edge(u, n);
        }
        for &n in neighbors {
            self.link(u, n);
        }
    }

    /// Neighbors of `id` in deterministic (sorted) order. Empty if `id` is
    /// unknown or has no edges.
    pub fn neighbors(&self, id: NodeId) -> BTreeSet<NodeId> {
        if !self.graph.contains_node(id) {
            return BTreeSet::new();
        }
        self.graph.neighbors(id).collect()
    }

    /// Whether `id` is known to the topology at all (with or without edges).
    pub fn contains(&self, id: NodeId) -> bool {
        self.graph.contains_node(id)
    }

    /// Whether `u` and `v` are directly linked.
    pub fn is_linked(&self, u: NodeId, v: NodeId) -> bool {
        self.graph.contains_edge(u, v)
    }

    /// Restricts the topology to the connected component containing `root`;
    /// every other node and its edges are discarded.
    pub fn prune_from(&mut self, root: NodeId) {
        if !self.graph.contains_node(root) {
            self.graph = UnGraphMap::new();
            self.graph.add_node(root);
            return;
        }
        let mut dfs = Dfs::new(&self.graph, root);
        let mut reachable = BTreeSet::new();
        while let Some(n) = dfs.next(&self.graph) {
            reachable.insert(n);
        }
        let unreachable: Vec<NodeId> =
            self.graph.nodes().filter(|n| !reachable.contains(n)).collect();
        for n in unreachable {
            self.graph.remove_node(n);
        }
    }

    /// All known node ids in deterministic (sorted) order.
    pub fn nodes(&self) -> BTreeSet<NodeId> {
        self.graph.nodes().collect()
    }
}

impl fmt::Display for Topology {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for id in self.nodes() {
            write!(f, "{id} ->")?;
            for n in self.neighbors(id) {
                write!(f, " {n}")?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}
