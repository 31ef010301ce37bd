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

//! One emulator node: a link-state routing participant and a three-level
//! priority packet forwarder sharing a single UDP socket and event loop.
//!
//! [`node::Node`] is the entry point other crates (or the `emulator`
//! binary) drive; [`routing::RoutingPlane`] and [`forwarder::Forwarder`] are
//! independently testable without a socket.

pub mod cli;
pub mod codec;
pub mod error;
pub mod forwarder;
pub mod forwarding;
pub mod loader;
pub mod node;
pub mod node_id;
pub mod routing;
pub mod topology;

pub use error::{Error, Result};
pub use node::Node;
pub use node_id::NodeId;
