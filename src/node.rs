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

//! # Node event loop
//!
//! Owns the single non-blocking UDP socket and everything that reads or
//! writes it. Every received datagram is dispatched by its first byte to
//! either the routing plane ([`crate::routing`]), the trace responder below,
//! or the priority forwarder ([`crate::forwarder`]); every loop iteration
//! also drives the hello/LSA timers, the neighbor-death sweep, and the
//! forwarder's delay slot.

use crate::codec::{self, Trace};
use crate::error::{Error, Result};
use crate::forwarder::{Forwarder, ForwardingRule};
use crate::forwarding::ForwardingTable;
use crate::node_id::NodeId;
use crate::routing::{Outgoing, RoutingConfig, RoutingPlane};
use crate::topology::Topology;
use log::{debug, warn};
use std::net::{SocketAddr, UdpSocket};
use std::time::{Duration, Instant};

/// What to do with an inbound trace probe, decided without touching the
/// socket so the decision can be unit tested directly.
#[derive(Debug, Clone, PartialEq, Eq)]
enum TraceAction {
    /// Forward the (TTL-decremented) probe on to `NodeId`.
    Forward(NodeId, Trace),
    /// TTL has expired here: reply to the original sender with ourselves as
    /// source.
    Bounce(NodeId, Trace),
    /// No forwarding-table entry for the probe's destination.
    NoRoute(NodeId),
}

fn plan_trace(self_id: NodeId, table: &ForwardingTable, trace: Trace) -> TraceAction {
    if trace.ttl > 0 {
        let destination = NodeId::new(trace.dst_ip, trace.dst_port);
        match table.next_hop(destination) {
            Some(next_hop) => {
                TraceAction::Forward(next_hop, Trace { ttl: trace.ttl - 1, ..trace })
            }
            None => TraceAction::NoRoute(destination),
        }
    } else {
        let back_to = NodeId::new(trace.src_ip, trace.src_port);
        let bounced = Trace { src_ip: self_id.ip(), src_port: self_id.port(), ..trace };
        TraceAction::Bounce(back_to, bounced)
    }
}

fn node_id_of(addr: SocketAddr) -> Option<NodeId> {
    match addr {
        SocketAddr::V4(v4) => Some(NodeId::from(v4)),
        SocketAddr::V6(_) => None,
    }
}

/// The emulator node: one UDP socket, one routing plane, one forwarder.
pub struct Node {
    self_id: NodeId,
    socket: UdpSocket,
    routing: RoutingPlane,
    forwarder: Forwarder,
    started_at: Instant,
    last_hello_ms: u64,
    last_lsa_ms: u64,
}

impl Node {
    /// Binds the UDP socket and wires the routing plane and forwarder
    /// together. Bind failure is fatal, matching `spec.md`'s "abort
    /// startup with nonzero exit" policy.
    pub fn new(
        self_id: NodeId,
        topology: Topology,
        rules: Vec<ForwardingRule>,
        routing_config: RoutingConfig,
        queue_capacity: usize,
    ) -> Result<Self> {
        let socket = UdpSocket::bind(self_id.socket_addr())?;
        socket.set_nonblocking(true)?;
        let routing = RoutingPlane::new(self_id, topology, 0, routing_config);
        let forwarder = Forwarder::new(rules, queue_capacity);
        Ok(Self {
            self_id,
            socket,
            routing,
            forwarder,
            started_at: Instant::now(),
            last_hello_ms: 0,
            last_lsa_ms: 0,
        })
    }

    fn now_ms(&self) -> u64 {
        self.started_at.elapsed().as_millis() as u64
    }

    /// Runs the event loop forever. Only returns on a fatal socket error
    /// after the node has already started (bind failures surface from
    /// [`Node::new`] instead).
    pub fn run(&mut self) -> Result<()> {
        let mut rng = rand::thread_rng();
        let mut buf = [0u8; 2048];
        loop {
            let now = self.now_ms();
            match self.socket.recv_from(&mut buf) {
                Ok((n, from)) => self.handle_datagram(now, &buf[..n], from),
                Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => {}
                Err(e) => return Err(Error::from(e)),
            }
            self.drive_timers(now);
            self.pump_forwarder(now, &mut rng);
            std::thread::sleep(Duration::from_millis(1));
        }
    }

    fn handle_datagram(&mut self, now_ms: u64, bytes: &[u8], from: SocketAddr) {
        match codec::peek_packet_tag(bytes) {
            Some(b'H') => match codec::decode_hello(bytes) {
                Ok(hello) => {
                    let out = self.routing.receive_hello(now_ms, hello);
                    self.send_all(out);
                }
                Err(e) => warn!("bad hello frame from {from}: {e}"),
            },
            Some(b'L') => match codec::decode_lsa(bytes) {
                Ok(lsa) => {
                    let Some(sender) = node_id_of(from) else {
                        warn!("ignoring LSA from non-IPv4 peer {from}");
                        return;
                    };
                    let out = self.routing.receive_lsa(lsa, sender);
                    self.send_all(out);
                }
                Err(e) => warn!("bad LSA frame from {from}: {e}"),
            },
            Some(b'T') => match codec::decode_trace(bytes) {
                Ok(trace) => self.handle_trace(trace),
                Err(e) => warn!("bad trace frame from {from}: {e}"),
            },
            Some(b'1') | Some(b'2') | Some(b'3') => {
                let Some(source) = node_id_of(from) else {
                    warn!("ignoring forwarded packet from non-IPv4 peer {from}");
                    return;
                };
                if let Err(e) = self.forwarder.admit(now_ms, bytes, source) {
                    debug!("dropped packet from {from}: {e}");
                }
            }
            Some(other) => warn!("unknown packet tag {other:#04x} from {from}"),
            None => {}
        }
    }

    fn handle_trace(&mut self, trace: Trace) {
        match plan_trace(self.self_id, self.routing.table(), trace) {
            TraceAction::Forward(next_hop, forwarded) => {
                self.send_frame(next_hop, &codec::encode_trace(&forwarded));
            }
            TraceAction::Bounce(back_to, bounced) => {
                self.send_frame(back_to, &codec::encode_trace(&bounced));
            }
            TraceAction::NoRoute(destination) => {
                warn!("{}", Error::NoRoute(destination.to_string()));
            }
        }
    }

    fn drive_timers(&mut self, now_ms: u64) {
        let (hello_ms, lsa_ms) = {
            let cfg = self.routing.config();
            (cfg.hello_ms, cfg.lsa_ms)
        };
        if now_ms.saturating_sub(self.last_hello_ms) >= hello_ms {
            let out = self.routing.emit_hellos();
            self.send_all(out);
            self.last_hello_ms = now_ms;
        }
        if now_ms.saturating_sub(self.last_lsa_ms) >= lsa_ms {
            let out = self.routing.originate_lsa();
            self.send_all(out);
            self.last_lsa_ms = now_ms;
        }
        let out = self.routing.expire_dead_neighbors(now_ms);
        self.send_all(out);
    }

    fn pump_forwarder(&mut self, now_ms: u64, rng: &mut impl rand::Rng) {
        if let Some((next_hop, frame)) = self.forwarder.tick(now_ms, rng) {
            self.send_frame(next_hop, &frame);
        }
    }

    fn send_all(&self, outgoing: Vec<(NodeId, Outgoing)>) {
        for (dst, frame) in outgoing {
            match frame {
                Outgoing::Hello(h) => self.send_frame(dst, &codec::encode_hello(&h)),
                Outgoing::Lsa(l) => self.send_frame(dst, &codec::encode_lsa(&l)),
            }
        }
    }

    fn send_frame(&self, dst: NodeId, bytes: &[u8]) {
        if let Err(e) = self.socket.send_to(bytes, dst.socket_addr()) {
            debug!("send to {dst} failed: {e}");
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::net::Ipv4Addr;

    fn id(last: u8, port: u16) -> NodeId {
        NodeId::new(Ipv4Addr::new(10, 0, 0, last), port)
    }

    fn trace(ttl: u32, src: NodeId, dst: NodeId) -> Trace {
        Trace { ttl, src_ip: src.ip(), src_port: src.port(), dst_ip: dst.ip(), dst_port: dst.port() }
    }

    #[test]
    fn trace_with_ttl_is_forwarded_and_decremented() {
        let (a, b, c) = (id(1, 5000), id(2, 5000), id(3, 5000));
        let mut topo = Topology::new();
        topo.link(a, b);
        topo.link(b, c);
        let table = crate::forwarding::build(&topo, a);
        let probe = trace(5, c, c);
        match plan_trace(a, &table, probe) {
            TraceAction::Forward(next_hop, forwarded) => {
                assert_eq!(next_hop, b);
                assert_eq!(forwarded.ttl, 4);
            }
            other => panic!("expected Forward, got {other:?}"),
        }
    }

    #[test]
    fn trace_with_expired_ttl_bounces_to_original_sender() {
        let (a, client) = (id(1, 5000), id(9, 7000));
        let topo = Topology::new();
        let table = crate::forwarding::build(&topo, a);
        let probe = trace(0, client, a);
        match plan_trace(a, &table, probe) {
            TraceAction::Bounce(back_to, bounced) => {
                assert_eq!(back_to, client);
                assert_eq!(bounced.src_ip, a.ip());
                assert_eq!(bounced.src_port, a.port());
            }
            other => panic!("expected Bounce, got {other:?}"),
        }
    }

    #[test]
    fn trace_to_unreachable_destination_has_no_route() {
        let a = id(1, 5000);
        let topo = Topology::new();
        let table = crate::forwarding::build(&topo, a);
        let probe = trace(5, id(9, 7000), id(2, 5000));
        match plan_trace(a, &table, probe) {
            TraceAction::NoRoute(dest) => assert_eq!(dest, id(2, 5000)),
            other => panic!("expected NoRoute, got {other:?}"),
        }
    }

    #[test]
    fn node_id_of_rejects_ipv6() {
        use std::net::{Ipv6Addr, SocketAddrV6};
        let v6 = SocketAddr::V6(SocketAddrV6::new(Ipv6Addr::LOCALHOST, 5000, 0, 0));
        assert!(node_id_of(v6).is_none());
    }
}
