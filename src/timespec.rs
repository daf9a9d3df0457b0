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

//! A plain seconds+nanoseconds instant, used for both UTC (epoch
//! 1970-01-01) and native GPS time (epoch 1980-01-06). The two
//! scales never mix inside one `TimeSpec`; only the caller knows which
//! epoch a given value is relative to.

/// Seconds and nanoseconds since some epoch. `nanos` is always in
/// `[0, 1_000_000_000)`; negative offsets are represented by a
/// negative `secs` with a small positive `nanos`, matching `libc`'s
/// `timespec` normalization convention.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TimeSpec {
    pub secs: i64,
    pub nanos: u32,
}

impl TimeSpec {
    pub const fn new(secs: i64, nanos: u32) -> Self {
        TimeSpec { secs, nanos }
    }

    /// Builds a normalized `TimeSpec` from a possibly-negative or
    /// overflowing nanosecond count measured from `secs`.
    pub(crate) fn from_secs_and_nanos(secs: i64, nanos: i64) -> Self {
        let carry = nanos.div_euclid(1_000_000_000);
        let nanos = nanos.rem_euclid(1_000_000_000) as u32;
        TimeSpec {
            secs: secs + carry,
            nanos,
        }
    }

    /// `self - other`, expressed in fractional seconds as `f64`. Loses
    /// precision far from the origin but is exact to well under a
    /// microsecond for the deltas this crate deals with (tens of
    /// minutes at most).
    pub(crate) fn diff_secs(self, other: TimeSpec) -> f64 {
        (self.secs - other.secs) as f64 + (self.nanos as f64 - other.nanos as f64) / 1.0e9
    }
}
