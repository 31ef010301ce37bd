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

//! Crate-wide error type.
//!
//! Most of these never reach a caller: the event loop in [`crate::node`] logs
//! and drops on every recoverable kind. Only [`Error::IoFatal`] is allowed to
//! propagate out of `main` and abort startup.

use crate::node_id::ParseNodeIdError;
use thiserror::Error;

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, Error>;

/// All recoverable and fatal failure kinds, per the error table in the
/// emulator's design.
#[derive(Debug, Error)]
pub enum Error {
    /// A decoded frame's byte length did not match its declared type's layout.
    #[error("bad frame format: {0}")]
    BadFormat(String),
    /// No forwarding-table entry exists for a `T`/`D` destination.
    #[error("no route to {0}")]
    NoRoute(String),
    /// No forwarding-rule row matches a packet's destination.
    #[error("no forwarding rule for {0}")]
    NoRule(String),
    /// A priority queue was at capacity on admission.
    #[error("queue {0} full")]
    QueueFull(u8),
    /// The probabilistic loss draw dropped a packet bound for the given
    /// destination.
    #[error("loss event for packet to {0}")]
    LossDraw(String),
    /// An LSA's sequence number was not newer than the cached high-water mark.
    #[error("stale LSA from {0}")]
    StaleLsa(String),
    /// Startup failed in a way that cannot be recovered from: socket bind
    /// failure, missing or malformed topology/forwarding-rule file.
    #[error("fatal startup error: {0}")]
    IoFatal(String),
}

impl From<std::io::Error> for Error {
    fn from(cause: std::io::Error) -> Self {
        Self::IoFatal(cause.to_string())
    }
}

impl From<ParseNodeIdError> for Error {
    fn from(cause: ParseNodeIdError) -> Self {
        Self::IoFatal(cause.to_string())
    }
}
