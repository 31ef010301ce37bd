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

//! Canonical node identity: an `(ipv4, udp_port)` pair rendered as `"A.B.C.D,port"`.

use std::fmt;
use std::net::{Ipv4Addr, SocketAddrV4};

/// Identifies one emulator endpoint. Equality and ordering are by `(ip, port)`,
/// which agrees with equality on the canonical string form required by the wire
/// protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId {
    ip: Ipv4Addr,
    port: u16,
}

impl NodeId {
    /// Builds a node id from an IPv4 address and a UDP port.
    pub fn new(ip: Ipv4Addr, port: u16) -> Self {
        Self { ip, port }
    }

    /// The node's IPv4 address.
    pub fn ip(&self) -> Ipv4Addr {
        self.ip
    }

    /// The node's UDP port.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// The socket address this id resolves to for sending/binding.
    pub fn socket_addr(&self) -> SocketAddrV4 {
        SocketAddrV4::new(self.ip, self.port)
    }
}

impl From<SocketAddrV4> for NodeId {
    fn from(addr: SocketAddrV4) -> Self {
        Self::new(*addr.ip(), addr.port())
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}", self.ip, self.port)
    }
}

/// Error returned when a `"host,port"` token does not parse into a [`NodeId`].
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
#[error("invalid node id token: {0:?}")]
pub struct ParseNodeIdError(pub String);

impl std::str::FromStr for NodeId {
    type Err = ParseNodeIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (ip_part, port_part) =
            s.split_once(',').ok_or_else(|| ParseNodeIdError(s.to_string()))?;
        let ip: Ipv4Addr = ip_part.parse().map_err(|_| ParseNodeIdError(s.to_string()))?;
        let port: u16 = port_part.parse().map_err(|_| ParseNodeIdError(s.to_string()))?;
        Ok(Self::new(ip, port))
    }
}
