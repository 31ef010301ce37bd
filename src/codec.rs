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

//! # Wire codec
//!
//! Packs and unpacks the outer header, the inner control header, and the
//! typed routing/trace payloads that ride on top of it. Every `encode_*`
//! function produces a complete frame; every `decode_*` function fails with
//! [`Error::BadFormat`] rather than ever returning a partial value.
//!
//! All multi-byte integers are network byte order (big-endian).
//!
//! ## The `htonl`-on-both-ends quirk
//!
//! The original sender/receiver pair applies `htonl` to the sequence number
//! on both the sending and the receiving side. On a big-endian wire
//! convention this amounts to one extra byte-swap in each direction, which
//! cancels out end-to-end but must still be reproduced here bit-for-bit:
//! [`encode_inner`]/[`decode_inner`] swap the `seq` field's bytes in addition
//! to the big-endian framing, so that the bytes this crate puts on the wire
//! match what the historical endpoints expect.

use crate::error::Error;
use std::net::Ipv4Addr;

/// Priority level carried in the outer header, or the sentinel for an
/// end-of-stream packet queued separately from the three priority levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Priority {
    /// Highest priority queue.
    P1,
    /// Middle priority queue.
    P2,
    /// Lowest priority queue.
    P3,
}

impl Priority {
    fn to_ascii(self) -> u8 {
        match self {
            Priority::P1 => b'1',
            Priority::P2 => b'2',
            Priority::P3 => b'3',
        }
    }

    fn from_ascii(b: u8) -> Result<Self, Error> {
        match b {
            b'1' => Ok(Priority::P1),
            b'2' => Ok(Priority::P2),
            b'3' => Ok(Priority::P3),
            other => Err(Error::BadFormat(format!("unknown priority digit {other:#04x}"))),
        }
    }
}

/// The fixed 17-byte outer header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OuterHeader {
    /// Declared priority of the inner packet.
    pub priority: Priority,
    /// Source IPv4 address.
    pub src_ip: Ipv4Addr,
    /// Source UDP port.
    pub src_port: u16,
    /// Destination IPv4 address.
    pub dst_ip: Ipv4Addr,
    /// Destination UDP port.
    pub dst_port: u16,
    /// Declared length of the inner frame (informational; not used to frame
    /// the payload, since the UDP datagram boundary already does that).
    pub inner_len: u32,
}

/// Byte length of the encoded outer header.
pub const OUTER_HEADER_LEN: usize = 17;

/// Encodes the outer header. Never fails: every field already fits its slot.
pub fn encode_outer(h: &OuterHeader) -> [u8; OUTER_HEADER_LEN] {
    let mut buf = [0u8; OUTER_HEADER_LEN];
    buf[0] = h.priority.to_ascii();
    buf[1..5].copy_from_slice(&h.src_ip.octets());
    buf[5..7].copy_from_slice(&h.src_port.to_be_bytes());
    buf[7..11].copy_from_slice(&h.dst_ip.octets());
    buf[11..13].copy_from_slice(&h.dst_port.to_be_bytes());
    buf[13..17].copy_from_slice(&h.inner_len.to_be_bytes());
    buf
}

/// Decodes the outer header from the front of `bytes`. Fails if fewer than
/// [`OUTER_HEADER_LEN`] bytes are available.
pub fn decode_outer(bytes: &[u8]) -> Result<OuterHeader, Error> {
    if bytes.len() < OUTER_HEADER_LEN {
        return Err(Error::BadFormat(format!(
            "outer header needs {OUTER_HEADER_LEN} bytes, got {}",
            bytes.len()
        )));
    }
    Ok(OuterHeader {
        priority: Priority::from_ascii(bytes[0])?,
        src_ip: Ipv4Addr::new(bytes[1], bytes[2], bytes[3], bytes[4]),
        src_port: u16::from_be_bytes([bytes[5], bytes[6]]),
        dst_ip: Ipv4Addr::new(bytes[7], bytes[8], bytes[9], bytes[10]),
        dst_port: u16::from_be_bytes([bytes[11], bytes[12]]),
        inner_len: u32::from_be_bytes([bytes[13], bytes[14], bytes[15], bytes[16]]),
    })
}

/// Closed set of inner control packet types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InnerType {
    /// Windowed request, `aux` carries the requested window size.
    Request,
    /// Data segment, `aux` carries the payload length.
    Data,
    /// End of stream marker.
    End,
    /// Acknowledgement.
    Ack,
}

impl InnerType {
    fn to_ascii(self) -> u8 {
        match self {
            InnerType::Request => b'R',
            InnerType::Data => b'D',
            InnerType::End => b'E',
            InnerType::Ack => b'A',
        }
    }

    fn from_ascii(b: u8) -> Result<Self, Error> {
        match b {
            b'R' => Ok(InnerType::Request),
            b'D' => Ok(InnerType::Data),
            b'E' => Ok(InnerType::End),
            b'A' => Ok(InnerType::Ack),
            other => Err(Error::BadFormat(format!("unknown inner type {other:#04x}"))),
        }
    }
}

/// The fixed 9-byte inner control header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InnerHeader {
    /// Packet type.
    pub ty: InnerType,
    /// Sequence number, already byte-swapped per the `htonl`-on-both-ends
    /// convention (see module docs).
    pub seq: u32,
    /// Window size (`Request`), payload length (`Data`), or zero (`End`/`Ack`).
    pub aux: u32,
}

/// Byte length of the encoded inner header.
pub const INNER_HEADER_LEN: usize = 9;

/// Encodes the inner header, applying the `htonl`-on-both-ends byte swap to
/// `seq`.
pub fn encode_inner(h: &InnerHeader) -> [u8; INNER_HEADER_LEN] {
    let mut buf = [0u8; INNER_HEADER_LEN];
    buf[0] = h.ty.to_ascii();
    buf[1..5].copy_from_slice(&h.seq.swap_bytes().to_be_bytes());
    buf[5..9].copy_from_slice(&h.aux.to_be_bytes());
    buf
}

/// Decodes the inner header, undoing the `htonl`-on-both-ends byte swap on
/// `seq` so the returned value is the logical sequence number.
pub fn decode_inner(bytes: &[u8]) -> Result<InnerHeader, Error> {
    if bytes.len() < INNER_HEADER_LEN {
        return Err(Error::BadFormat(format!(
            "inner header needs {INNER_HEADER_LEN} bytes, got {}",
            bytes.len()
        )));
    }
    let raw_seq = u32::from_be_bytes([bytes[1], bytes[2], bytes[3], bytes[4]]);
    Ok(InnerHeader {
        ty: InnerType::from_ascii(bytes[0])?,
        seq: raw_seq.swap_bytes(),
        aux: u32::from_be_bytes([bytes[5], bytes[6], bytes[7], bytes[8]]),
    })
}

/// A hello probe: `'H' | ip:4 | port:2`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Hello {
    /// Sender's IPv4 address.
    pub ip: Ipv4Addr,
    /// Sender's UDP port.
    pub port: u16,
}

/// Byte length of an encoded hello frame.
pub const HELLO_LEN: usize = 7;

/// Encodes a hello frame.
pub fn encode_hello(h: &Hello) -> [u8; HELLO_LEN] {
    let mut buf = [0u8; HELLO_LEN];
    buf[0] = b'H';
    buf[1..5].copy_from_slice(&h.ip.octets());
    buf[5..7].copy_from_slice(&h.port.to_be_bytes());
    buf
}

/// Decodes a hello frame. Fails unless the buffer is exactly [`HELLO_LEN`]
/// bytes starting with the `'H'` tag.
pub fn decode_hello(bytes: &[u8]) -> Result<Hello, Error> {
    if bytes.len() != HELLO_LEN {
        return Err(Error::BadFormat(format!(
            "hello frame needs exactly {HELLO_LEN} bytes, got {}",
            bytes.len()
        )));
    }
    if bytes[0] != b'H' {
        return Err(Error::BadFormat("hello frame missing 'H' tag".into()));
    }
    Ok(Hello {
        ip: Ipv4Addr::new(bytes[1], bytes[2], bytes[3], bytes[4]),
        port: u16::from_be_bytes([bytes[5], bytes[6]]),
    })
}

/// One neighbor entry inside an [`Lsa`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LsaNeighbor {
    /// Neighbor's IPv4 address.
    pub ip: Ipv4Addr,
    /// Neighbor's UDP port.
    pub port: u16,
    /// Link cost, always `1` in this design (unit-cost links only).
    pub cost: u32,
}

/// A link-state advertisement: `'L' | origin_ip:4 | origin_port:2 | seq:4 |
/// ttl:4 | [neighbor_ip:4 | neighbor_port:2 | cost:4]*n`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lsa {
    /// Originating router's IPv4 address.
    pub origin_ip: Ipv4Addr,
    /// Originating router's UDP port.
    pub origin_port: u16,
    /// Monotonically increasing per-originator sequence number.
    pub seq: u32,
    /// Remaining hop budget.
    pub ttl: u32,
    /// The originator's current neighbor set at time of origination.
    pub neighbors: Vec<LsaNeighbor>,
}

const LSA_FIXED_LEN: usize = 15;
const LSA_NEIGHBOR_LEN: usize = 10;

/// Encodes an LSA frame.
pub fn encode_lsa(l: &Lsa) -> Vec<u8> {
    let mut buf = Vec::with_capacity(LSA_FIXED_LEN + l.neighbors.len() * LSA_NEIGHBOR_LEN);
    buf.push(b'L');
    buf.extend_from_slice(&l.origin_ip.octets());
    buf.extend_from_slice(&l.origin_port.to_be_bytes());
    buf.extend_from_slice(&l.seq.to_be_bytes());
    buf.extend_from_slice(&l.ttl.to_be_bytes());
    for n in &l.neighbors {
        buf.extend_from_slice(&n.ip.octets());
        buf.extend_from_slice(&n.port.to_be_bytes());
        buf.extend_from_slice(&n.cost.to_be_bytes());
    }
    buf
}

/// Decodes an LSA frame. Fails if the buffer is shorter than the fixed
/// header, begins with the wrong tag, or its trailing bytes are not an exact
/// multiple of the per-neighbor record size.
pub fn decode_lsa(bytes: &[u8]) -> Result<Lsa, Error> {
    if bytes.len() < LSA_FIXED_LEN {
        return Err(Error::BadFormat(format!(
            "LSA frame needs at least {LSA_FIXED_LEN} bytes, got {}",
            bytes.len()
        )));
    }
    if bytes[0] != b'L' {
        return Err(Error::BadFormat("LSA frame missing 'L' tag".into()));
    }
    let tail_len = bytes.len() - LSA_FIXED_LEN;
    if tail_len % LSA_NEIGHBOR_LEN != 0 {
        return Err(Error::BadFormat(format!(
            "LSA neighbor list length {tail_len} is not a multiple of {LSA_NEIGHBOR_LEN}"
        )));
    }
    let origin_ip = Ipv4Addr::new(bytes[1], bytes[2], bytes[3], bytes[4]);
    let origin_port = u16::from_be_bytes([bytes[5], bytes[6]]);
    let seq = u32::from_be_bytes([bytes[7], bytes[8], bytes[9], bytes[10]]);
    let ttl = u32::from_be_bytes([bytes[11], bytes[12], bytes[13], bytes[14]]);
    let mut neighbors = Vec::with_capacity(tail_len / LSA_NEIGHBOR_LEN);
    for chunk in bytes[LSA_FIXED_LEN..].chunks_exact(LSA_NEIGHBOR_LEN) {
        neighbors.push(LsaNeighbor {
            ip: Ipv4Addr::new(chunk[0], chunk[1], chunk[2], chunk[3]),
            port: u16::from_be_bytes([chunk[4], chunk[5]]),
            cost: u32::from_be_bytes([chunk[6], chunk[7], chunk[8], chunk[9]]),
        });
    }
    Ok(Lsa { origin_ip, origin_port, seq, ttl, neighbors })
}

/// A traceroute probe/response frame: `'T' | ttl:4 | src_ip:4 | src_port:2 |
/// dst_ip:4 | dst_port:2`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Trace {
    /// Remaining hop budget.
    pub ttl: u32,
    /// Source IPv4 address.
    pub src_ip: Ipv4Addr,
    /// Source UDP port.
    pub src_port: u16,
    /// Destination IPv4 address.
    pub dst_ip: Ipv4Addr,
    /// Destination UDP port.
    pub dst_port: u16,
}

/// Byte length of an encoded trace frame.
pub const TRACE_LEN: usize = 17;

/// Encodes a trace frame.
pub fn encode_trace(t: &Trace) -> [u8; TRACE_LEN] {
    let mut buf = [0u8; TRACE_LEN];
    buf[0] = b'T';
    buf[1..5].copy_from_slice(&t.ttl.to_be_bytes());
    buf[5..9].copy_from_slice(&t.src_ip.octets());
    buf[9..11].copy_from_slice(&t.src_port.to_be_bytes());
    buf[11..15].copy_from_slice(&t.dst_ip.octets());
    buf[15..17].copy_from_slice(&t.dst_port.to_be_bytes());
    buf
}

/// Decodes a trace frame. Fails unless the buffer is exactly [`TRACE_LEN`]
/// bytes starting with the `'T'` tag.
pub fn decode_trace(bytes: &[u8]) -> Result<Trace, Error> {
    if bytes.len() != TRACE_LEN {
        return Err(Error::BadFormat(format!(
            "trace frame needs exactly {TRACE_LEN} bytes, got {}",
            bytes.len()
        )));
    }
    if bytes[0] != b'T' {
        return Err(Error::BadFormat("trace frame missing 'T' tag".into()));
    }
    Ok(Trace {
        ttl: u32::from_be_bytes([bytes[1], bytes[2], bytes[3], bytes[4]]),
        src_ip: Ipv4Addr::new(bytes[5], bytes[6], bytes[7], bytes[8]),
        src_port: u16::from_be_bytes([bytes[9], bytes[10]]),
        dst_ip: Ipv4Addr::new(bytes[11], bytes[12], bytes[13], bytes[14]),
        dst_port: u16::from_be_bytes([bytes[15], bytes[16]]),
    })
}

/// The outer type byte used to route a raw datagram to either the routing
/// plane, the trace handler, or the priority forwarder, read without fully
/// decoding the frame.
pub fn peek_packet_tag(bytes: &[u8]) -> Option<u8> {
    bytes.first().copied()
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn outer_header_round_trips() {
        let h = OuterHeader {
            priority: Priority::P2,
            src_ip: Ipv4Addr::new(10, 0, 0, 1),
            src_port: 5000,
            dst_ip: Ipv4Addr::new(10, 0, 0, 2),
            dst_port: 6000,
            inner_len: 123,
        };
        let bytes = encode_outer(&h);
        assert_eq!(bytes.len(), OUTER_HEADER_LEN);
        assert_eq!(decode_outer(&bytes).unwrap(), h);
    }

    #[test]
    fn outer_header_rejects_short_buffer() {
        let bytes = [0u8; OUTER_HEADER_LEN - 1];
        assert!(matches!(decode_outer(&bytes), Err(Error::BadFormat(_))));
    }

    #[test]
    fn inner_header_round_trips_and_swaps_seq_twice() {
        let h = InnerHeader { ty: InnerType::Data, seq: 7, aux: 512 };
        let bytes = encode_inner(&h);
        // the wire bytes carry the byte-swapped sequence number, not 7 in BE form
        let wire_seq = u32::from_be_bytes([bytes[1], bytes[2], bytes[3], bytes[4]]);
        assert_eq!(wire_seq, 7u32.swap_bytes());
        assert_eq!(decode_inner(&bytes).unwrap(), h);
    }

    #[test]
    fn inner_header_rejects_unknown_type() {
        let mut bytes = encode_inner(&InnerHeader { ty: InnerType::Ack, seq: 1, aux: 0 });
        bytes[0] = b'Z';
        assert!(matches!(decode_inner(&bytes), Err(Error::BadFormat(_))));
    }

    #[test]
    fn hello_round_trips() {
        let h = Hello { ip: Ipv4Addr::new(192, 168, 1, 1), port: 9000 };
        assert_eq!(decode_hello(&encode_hello(&h)).unwrap(), h);
    }

    #[test]
    fn lsa_round_trips_with_neighbors() {
        let l = Lsa {
            origin_ip: Ipv4Addr::new(10, 0, 0, 1),
            origin_port: 5000,
            seq: 3,
            ttl: 20,
            neighbors: vec![
                LsaNeighbor { ip: Ipv4Addr::new(10, 0, 0, 2), port: 5001, cost: 1 },
                LsaNeighbor { ip: Ipv4Addr::new(10, 0, 0, 3), port: 5002, cost: 1 },
            ],
        };
        let bytes = encode_lsa(&l);
        assert_eq!(bytes.len(), LSA_FIXED_LEN + 2 * LSA_NEIGHBOR_LEN);
        assert_eq!(decode_lsa(&bytes).unwrap(), l);
    }

    #[test]
    fn lsa_round_trips_with_no_neighbors() {
        let l = Lsa {
            origin_ip: Ipv4Addr::new(10, 0, 0, 1),
            origin_port: 5000,
            seq: 1,
            ttl: 20,
            neighbors: vec![],
        };
        assert_eq!(decode_lsa(&encode_lsa(&l)).unwrap(), l);
    }

    #[test]
    fn lsa_rejects_misaligned_neighbor_tail() {
        let mut bytes = encode_lsa(&Lsa {
            origin_ip: Ipv4Addr::UNSPECIFIED,
            origin_port: 0,
            seq: 0,
            ttl: 20,
            neighbors: vec![LsaNeighbor { ip: Ipv4Addr::UNSPECIFIED, port: 0, cost: 1 }],
        });
        bytes.pop();
        assert!(matches!(decode_lsa(&bytes), Err(Error::BadFormat(_))));
    }

    #[test]
    fn trace_round_trips() {
        let t = Trace {
            ttl: 2,
            src_ip: Ipv4Addr::new(10, 0, 0, 1),
            src_port: 5000,
            dst_ip: Ipv4Addr::new(10, 0, 0, 3),
            dst_port: 5002,
        };
        assert_eq!(decode_trace(&encode_trace(&t)).unwrap(), t);
    }
}
