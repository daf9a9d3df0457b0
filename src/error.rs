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

use std::fmt;
use std::io;

/// The one error sentinel every operation in this crate returns.
/// Fine-grained diagnostics go to the `log` side channel; callers
/// match on the variant to decide recovery.
#[derive(Debug)]
pub enum Error {
    /// A syscall against the serial device failed.
    Io(io::Error),
    /// A UBX frame is shorter than its declared length; `needed` is
    /// the total frame size the caller should accumulate before
    /// retrying.
    Incomplete { needed: usize },
    /// A structural defect: bad checksum, wrong field count, illegal
    /// hemisphere character, oversize buffer, and so on.
    Invalid(&'static str),
    /// A `get` was asked for a field whose validity flag is false.
    Unavailable(&'static str),
    /// The time reference has never completed a sync, or its
    /// `xtal_err` has drifted outside the sanity window; conversions
    /// are refused until the next non-aberrant (or re-anchoring) sync.
    EstimatorUninit,
    /// A sync was aberrant and the aberration history does not yet
    /// justify a forced re-anchor.
    SyncRejected,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Io(e) => write!(f, "serial I/O error: {e}"),
            Error::Incomplete { needed } => write!(f, "buffer incomplete, need {needed} bytes"),
            Error::Invalid(msg) => write!(f, "invalid input: {msg}"),
            Error::Unavailable(msg) => write!(f, "unavailable: {msg}"),
            Error::EstimatorUninit => write!(f, "time reference uninitialized or out of range"),
            Error::SyncRejected => write!(f, "aberrant sync rejected"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Error {
        Error::Io(err)
    }
}
