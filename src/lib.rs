// GNSS Timing Core
// Copyright (C) 2026
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with this program.  If not, see <http://www.gnu.org/licenses/>.

//! GNSS message ingestion and concentrator/UTC/GPS time-base
//! reconciliation for a LoRaWAN packet-forwarder gateway.
//!
//! Four components, each its own module:
//!
//! - [`serial`] opens and configures the receiver's byte stream (component A).
//! - [`protocol`] classifies buffers as NMEA or UBX frames (component B).
//! - [`fix`] holds the latest parsed fix (component C).
//! - [`timebase`] reconciles the concentrator counter against UTC/GPS (component D).
//!
//! The crate spawns no threads of its own: the serial read is the
//! caller's sole blocking point, and every other operation here is a
//! non-blocking, non-retrying function over caller-owned state.

pub mod error;
pub mod fix;
pub mod protocol;
pub mod serial;
pub mod timebase;
pub mod timespec;

pub use error::Error;
pub use fix::{FixMode, FixReading, FixStore};
pub use protocol::{parse_nmea, parse_ubx, FrameKind, SentenceKind};
pub use serial::{disable, enable, SerialSession};
pub use timebase::TimeRef;
pub use timespec::TimeSpec;
