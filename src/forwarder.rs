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

//! # Priority forwarder
//!
//! Three bounded strict-priority FIFOs (`Q1` > `Q2` > `Q3`) plus a separate
//! end-of-stream queue that is never subject to loss, and a single delay
//! slot: at most one packet is ever "in flight" through its configured
//! per-destination delay at a time, exactly like the reference design.
//!
//! [`Forwarder::tick`] takes the current time in milliseconds rather than
//! reading the clock itself, so tests can drive delay expiry deterministically
//! without sleeping; the node event loop is the only real caller and passes
//! a wall-clock reading.

use crate::codec::{self, InnerType, Priority};
use crate::error::{Error, Result};
use crate::node_id::NodeId;
use log::{debug, warn};
use rand::Rng;
use std::collections::{BTreeMap, VecDeque};

/// One static forwarding rule: where to send packets addressed to
/// `destination`, and the per-hop delay/loss to apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ForwardingRule {
    /// Final destination this rule matches.
    pub destination: NodeId,
    /// Next hop to actually send the packet to.
    pub next_hop: NodeId,
    /// Milliseconds to hold the packet in the delay slot before release.
    pub delay_ms: u64,
    /// Probability, as a whole-number percentage, that a non-end packet is
    /// dropped after its delay elapses.
    pub loss_percent: u8,
}

struct QueueEntry {
    frame: Vec<u8>,
    enqueued_at_ms: u64,
    next_hop: NodeId,
    delay_ms: u64,
    loss_percent: u8,
    is_end: bool,
    destination: NodeId,
}

/// The packet forwarder: admission into priority queues, and release through
/// a single delay slot.
#[derive(Debug)]
pub struct Forwarder {
    rules: BTreeMap<NodeId, ForwardingRule>,
    capacity: usize,
    q1: VecDeque<QueueEntry>,
    q2: VecDeque<QueueEntry>,
    q3: VecDeque<QueueEntry>,
    qend: VecDeque<QueueEntry>,
    delaying: Option<QueueEntry>,
}

impl std::fmt::Debug for QueueEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueueEntry")
            .field("destination", &self.destination)
            .field("next_hop", &self.next_hop)
            .field("is_end", &self.is_end)
            .finish()
    }
}

impl Forwarder {
    /// Builds a forwarder over a static rule set, keyed by destination. Each
    /// of the three priority queues plus the end-packet queue is bounded to
    /// `capacity` entries.
    pub fn new(rules: Vec<ForwardingRule>, capacity: usize) -> Self {
        Self {
            rules: rules.into_iter().map(|r| (r.destination, r)).collect(),
            capacity,
            q1: VecDeque::new(),
            q2: VecDeque::new(),
            q3: VecDeque::new(),
            qend: VecDeque::new(),
            delaying: None,
        }
    }

    /// Number of static rules loaded.
    pub fn rule_count(&self) -> usize {
        self.rules.len()
    }

    /// Whether a packet currently occupies the single delay slot.
    pub fn is_delaying(&self) -> bool {
        self.delaying.is_some()
    }

    /// Current depth of queue `tag` (`1`/`2`/`3`/`4`, `4` being the end
    /// queue), for observability and tests.
    pub fn queue_len(&self, tag: u8) -> usize {
        match tag {
            1 => self.q1.len(),
            2 => self.q2.len(),
            3 => self.q3.len(),
            _ => self.qend.len(),
        }
    }

    /// Admits a raw outer+inner frame received from `source` (unused beyond
    /// admission-time logging) at `now_ms`. Looks up the static rule by
    /// destination, classifies the packet into the end queue or one of the
    /// three priority queues, and enqueues it if that queue has room.
    ///
    /// Fails with [`Error::NoRule`] if no static rule matches the
    /// destination, or [`Error::QueueFull`] if the target queue is at
    /// capacity; both are recoverable and only logged by the caller.
    pub fn admit(&mut self, now_ms: u64, frame: &[u8], source: NodeId) -> Result<()> {
        let outer = codec::decode_outer(frame)?;
        let destination = NodeId::new(outer.dst_ip, outer.dst_port);
        let rule = self
            .rules
            .get(&destination)
            .copied()
            .ok_or_else(|| Error::NoRule(destination.to_string()))?;
        let inner = codec::decode_inner(&frame[codec::OUTER_HEADER_LEN..])?;
        let is_end = inner.ty == InnerType::End;

        let (queue, tag) = if is_end {
            (&mut self.qend, 4u8)
        } else {
            match outer.priority {
                Priority::P1 => (&mut self.q1, 1u8),
                Priority::P2 => (&mut self.q2, 2u8),
                Priority::P3 => (&mut self.q3, 3u8),
            }
        };
        if queue.len() >= self.capacity {
            warn!("queue {tag} full, dropping packet from {source} to {destination}");
            return Err(Error::QueueFull(tag));
        }
        queue.push_back(QueueEntry {
            frame: frame.to_vec(),
            enqueued_at_ms: now_ms,
            next_hop: rule.next_hop,
            delay_ms: rule.delay_ms,
            loss_percent: rule.loss_percent,
            is_end,
            destination,
        });
        debug!("admitted packet from {source} to {destination} into queue {tag}");
        Ok(())
    }

    /// Advances the delay slot by one step. If the slot is empty, pulls the
    /// next entry from the highest-priority non-empty queue (`Q1` > `Q2` >
    /// `Q3` > end) with no further effect this tick. If the slot is
    /// occupied and its delay has elapsed, releases it: end packets are
    /// always forwarded, everything else is subject to the loss draw.
    /// Returns the `(next_hop, frame)` to actually send, if anything was
    /// released and not lost.
    pub fn tick<R: Rng + ?Sized>(&mut self, now_ms: u64, rng: &mut R) -> Option<(NodeId, Vec<u8>)> {
        if self.delaying.is_none() {
            self.delaying = self
                .q1
                .pop_front()
                .or_else(|| self.q2.pop_front())
                .or_else(|| self.q3.pop_front())
                .or_else(|| self.qend.pop_front());
            return None;
        }

        let elapsed_enough = {
            let entry = self.delaying.as_ref().unwrap();
            now_ms.saturating_sub(entry.enqueued_at_ms) >= entry.delay_ms
        };
        if !elapsed_enough {
            return None;
        }

        let entry = self.delaying.take().unwrap();
        if entry.is_end {
            return Some((entry.next_hop, entry.frame));
        }
        let roll: f64 = rng.gen::<f64>() * 100.0;
        if roll >= entry.loss_percent as f64 {
            Some((entry.next_hop, entry.frame))
        } else {
            debug!("{}", Error::LossDraw(entry.destination.to_string()));
            None
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::codec::{encode_inner, encode_outer, InnerHeader, OuterHeader};
    use rand::rngs::mock::StepRng;
    use std::net::Ipv4Addr;

    fn id(last: u8, port: u16) -> NodeId {
        NodeId::new(Ipv4Addr::new(10, 0, 0, last), port)
    }

    fn frame(priority: Priority, dst: NodeId, ty: InnerType) -> Vec<u8> {
        let outer = encode_outer(&OuterHeader {
            priority,
            src_ip: id(1, 5000).ip(),
            src_port: 5000,
            dst_ip: dst.ip(),
            dst_port: dst.port(),
            inner_len: codec::INNER_HEADER_LEN as u32,
        });
        let inner = encode_inner(&InnerHeader { ty, seq: 1, aux: 0 });
        [outer.as_slice(), inner.as_slice()].concat()
    }

    /// A `StepRng` seeded to roll roughly 50: comfortably above a `0`
    /// loss percentage and below a `100` one, so forwarding is the
    /// deterministic outcome regardless of which non-extreme rule a test
    /// exercises.
    fn never_loses() -> StepRng {
        StepRng::new(u64::MAX / 2, 1)
    }

    /// A `StepRng` that always rolls `0`, guaranteeing the loss branch for
    /// any nonzero loss percentage.
    fn always_loses() -> StepRng {
        StepRng::new(0, 1)
    }

    #[test]
    fn admits_by_priority_into_matching_queue() {
        let dst = id(2, 6000);
        let rules = vec![ForwardingRule { destination: dst, next_hop: dst, delay_ms: 0, loss_percent: 0 }];
        let mut fwd = Forwarder::new(rules, 4);
        fwd.admit(0, &frame(Priority::P2, dst, InnerType::Data), id(1, 5000)).unwrap();
        assert_eq!(fwd.queue_len(2), 1);
        assert_eq!(fwd.queue_len(1), 0);
    }

    #[test]
    fn end_packets_bypass_priority_queues() {
        let dst = id(2, 6000);
        let rules = vec![ForwardingRule { destination: dst, next_hop: dst, delay_ms: 0, loss_percent: 0 }];
        let mut fwd = Forwarder::new(rules, 4);
        fwd.admit(0, &frame(Priority::P1, dst, InnerType::End), id(1, 5000)).unwrap();
        assert_eq!(fwd.queue_len(4), 1);
        assert_eq!(fwd.queue_len(1), 0);
    }

    #[test]
    fn admission_fails_without_a_matching_rule() {
        let dst = id(2, 6000);
        let mut fwd = Forwarder::new(vec![], 4);
        let err = fwd.admit(0, &frame(Priority::P1, dst, InnerType::Data), id(1, 5000));
        assert!(matches!(err, Err(Error::NoRule(_))));
    }

    #[test]
    fn full_queue_rejects_further_admission() {
        let dst = id(2, 6000);
        let rules = vec![ForwardingRule { destination: dst, next_hop: dst, delay_ms: 1000, loss_percent: 0 }];
        let mut fwd = Forwarder::new(rules, 1);
        fwd.admit(0, &frame(Priority::P3, dst, InnerType::Data), id(1, 5000)).unwrap();
        let err = fwd.admit(0, &frame(Priority::P3, dst, InnerType::Data), id(1, 5000));
        assert!(matches!(err, Err(Error::QueueFull(3))));
    }

    #[test]
    fn strict_priority_order_across_ticks() {
        let dst = id(2, 6000);
        let rules = vec![ForwardingRule { destination: dst, next_hop: dst, delay_ms: 0, loss_percent: 0 }];
        let mut fwd = Forwarder::new(rules, 4);
        fwd.admit(0, &frame(Priority::P3, dst, InnerType::Data), id(1, 5000)).unwrap();
        fwd.admit(0, &frame(Priority::P1, dst, InnerType::Data), id(1, 5000)).unwrap();
        let mut rng = never_loses();

        // first tick just loads the delay slot
        assert!(fwd.tick(0, &mut rng).is_none());
        assert!(fwd.is_delaying());
        // delay is zero, so the next tick releases it: must be the P1 packet
        let (_, released) = fwd.tick(0, &mut rng).unwrap();
        assert_eq!(released[0], b'1');
    }

    #[test]
    fn delay_holds_the_packet_until_elapsed() {
        let dst = id(2, 6000);
        let rules = vec![ForwardingRule { destination: dst, next_hop: dst, delay_ms: 50, loss_percent: 0 }];
        let mut fwd = Forwarder::new(rules, 4);
        fwd.admit(0, &frame(Priority::P1, dst, InnerType::Data), id(1, 5000)).unwrap();
        let mut rng = never_loses();
        assert!(fwd.tick(0, &mut rng).is_none());
        assert!(fwd.tick(20, &mut rng).is_none());
        assert!(fwd.tick(50, &mut rng).is_some());
    }

    #[test]
    fn guaranteed_loss_drops_data_but_not_end() {
        let dst = id(2, 6000);
        let rules = vec![ForwardingRule { destination: dst, next_hop: dst, delay_ms: 0, loss_percent: 100 }];
        let mut fwd = Forwarder::new(rules, 4);
        fwd.admit(0, &frame(Priority::P1, dst, InnerType::Data), id(1, 5000)).unwrap();
        let mut rng = always_loses();
        fwd.tick(0, &mut rng);
        assert!(fwd.tick(0, &mut rng).is_none());

        let mut fwd = Forwarder::new(
            vec![ForwardingRule { destination: dst, next_hop: dst, delay_ms: 0, loss_percent: 100 }],
            4,
        );
        fwd.admit(0, &frame(Priority::P1, dst, InnerType::End), id(1, 5000)).unwrap();
        fwd.tick(0, &mut rng);
        assert!(fwd.tick(0, &mut rng).is_some());
    }
}
