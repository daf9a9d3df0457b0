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

//! Component C: the process-wide fix snapshot. Unlike the source this
//! was distilled from, there is no file-scope mutable state here:
//! `FixStore` is an ordinary owned value the caller threads through
//! `parse_ubx`/`parse_nmea` and then reads back with `get`.

use chrono::{NaiveDate, NaiveTime, TimeZone, Utc};
use log::warn;

use crate::error::Error;
use crate::timespec::TimeSpec;

/// Fix quality / mode, taken verbatim from the NMEA posMode field (or
/// its UBX equivalent when a future message type supplies one).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FixMode {
    NoFix,
    Autonomous,
    Differential,
}

impl FixMode {
    fn from_char(c: char) -> FixMode {
        match c {
            'A' => FixMode::Autonomous,
            'D' => FixMode::Differential,
            _ => FixMode::NoFix,
        }
    }
}

/// Broken-down fix date/time, as scanned from an RMC sentence or left
/// untouched (UBX NAV-TIMEGPS carries no broken-down date).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FixDate {
    pub year: u16,
    pub month: u8,
    pub day: u8,
    pub hour: u8,
    pub minute: u8,
    /// 0–60 inclusive; 60 admits a leap second.
    pub second: u8,
    /// Fractional seconds in `[0, 1)`.
    pub frac_sec: f64,
}

impl Default for FixDate {
    fn default() -> Self {
        FixDate {
            year: 1980,
            month: 1,
            day: 1,
            hour: 0,
            minute: 0,
            second: 0,
            frac_sec: 0.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Position {
    pub lat: f64,
    pub lon: f64,
    pub alt: i32,
}

/// The latest parsed GNSS state. Fields may hold stale numeric content
/// after a failed parse; only `time_valid`/`pos_valid` say whether
/// they mean anything.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FixSnapshot {
    pub date: FixDate,
    pub gps_week: i16,
    pub gps_itow_ms: u32,
    pub gps_ftow_ns: i32,
    pub lat: f64,
    pub lon: f64,
    pub alt: i32,
    pub mode: FixMode,
    pub num_sat: u8,
    pub time_valid: bool,
    pub pos_valid: bool,
}

impl Default for FixSnapshot {
    fn default() -> Self {
        FixSnapshot {
            date: FixDate::default(),
            gps_week: 0,
            gps_itow_ms: 0,
            gps_ftow_ns: 0,
            lat: 0.0,
            lon: 0.0,
            alt: 0,
            mode: FixMode::NoFix,
            num_sat: 0,
            time_valid: false,
            pos_valid: false,
        }
    }
}

/// What `FixStore::get` hands back, one field per `want_*` flag.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct FixReading {
    pub utc: Option<TimeSpec>,
    pub gps: Option<TimeSpec>,
    pub pos: Option<Position>,
    /// Localization uncertainty; always `Some(0.0)` when requested,
    /// since the core reserves the field but does not estimate it.
    pub err: Option<f64>,
}

/// Owns one [`FixSnapshot`]. Mutated only by `protocol::parse_ubx` and
/// `protocol::parse_nmea`; read by `get`.
#[derive(Debug, Clone, Copy, Default)]
pub struct FixStore {
    snapshot: FixSnapshot,
}

impl FixStore {
    pub fn new() -> Self {
        FixStore::default()
    }

    pub fn snapshot(&self) -> &FixSnapshot {
        &self.snapshot
    }

    pub(crate) fn snapshot_mut(&mut self) -> &mut FixSnapshot {
        &mut self.snapshot
    }

    /// Returns any requested subset of the current fix. Missing
    /// validity for a requested field is a single `Unavailable` error
    /// (no partial results on failure).
    pub fn get(
        &self,
        want_utc: bool,
        want_gps: bool,
        want_pos: bool,
        want_err: bool,
    ) -> Result<FixReading, Error> {
        let snap = &self.snapshot;

        let utc = if want_utc {
            if !snap.time_valid {
                return Err(Error::Unavailable("utc time not valid"));
            }
            Some(utc_from_date(&snap.date)?)
        } else {
            None
        };

        // Note: time_valid is a single flag shared by the date fields
        // (set by RMC) and the week/iTOW fields (set by NAV-TIMEGPS).
        // If the most recent valid fix came from RMC alone, the GPS
        // week/iTOW here may be stale from an earlier NAV-TIMEGPS fix
        // (or zero). This mirrors the snapshot's single validity flag
        // in the spec and is not papered over here.
        let gps = if want_gps {
            if !snap.time_valid {
                return Err(Error::Unavailable("gps time not valid"));
            }
            Some(gps_time_from_snapshot(snap))
        } else {
            None
        };

        let pos = if want_pos {
            if !snap.pos_valid {
                return Err(Error::Unavailable("position not valid"));
            }
            Some(Position {
                lat: snap.lat,
                lon: snap.lon,
                alt: snap.alt,
            })
        } else {
            None
        };

        let err = if want_err {
            warn!("localization uncertainty estimation is not implemented, reporting zero");
            Some(0.0)
        } else {
            None
        };

        Ok(FixReading { utc, gps, pos, err })
    }
}

/// Normalizes a 2-digit NMEA year into a 4-digit one; 4-digit years
/// (as UBX would supply, were it to carry a broken-down date) pass
/// through untouched.
pub(crate) fn normalize_year(yy_or_yyyy: u16) -> u16 {
    if yy_or_yyyy < 100 {
        2000 + yy_or_yyyy
    } else {
        yy_or_yyyy
    }
}

pub(crate) fn mode_from_char(c: char) -> FixMode {
    FixMode::from_char(c)
}

fn utc_from_date(d: &FixDate) -> Result<TimeSpec, Error> {
    let date = NaiveDate::from_ymd_opt(d.year as i32, d.month as u32, d.day as u32)
        .ok_or(Error::Invalid("fix date out of range"))?;

    // Represent :60 as :59 plus a carried second rather than lean on
    // chrono's own leap-second encoding, which we'd rather not depend
    // on the exact behavior of without being able to run it.
    let (sec_field, extra_leap_sec) = if d.second == 60 {
        (59, 1)
    } else {
        (d.second as u32, 0)
    };
    let time = NaiveTime::from_hms_opt(d.hour as u32, d.minute as u32, sec_field)
        .ok_or(Error::Invalid("fix time out of range"))?;

    let dt = Utc.from_utc_datetime(&date.and_time(time));
    let frac_nanos = (d.frac_sec * 1.0e9).round() as i64;

    Ok(TimeSpec::from_secs_and_nanos(
        dt.timestamp() + extra_leap_sec,
        frac_nanos,
    ))
}

/// GPS seconds-since-epoch = iTOW/1000 + week × 604800; nanoseconds
/// are the millisecond remainder of iTOW converted to nanoseconds,
/// matching the literal formula this component is specified against.
/// `gps_ftow_ns` is carried in the snapshot for consumers that want
/// sub-millisecond precision but is not folded in here.
fn gps_time_from_snapshot(snap: &FixSnapshot) -> TimeSpec {
    let secs = snap.gps_week as i64 * 604_800 + snap.gps_itow_ms as i64 / 1000;
    let nanos = (snap.gps_itow_ms % 1000) as i64 * 1_000_000;
    TimeSpec::new(secs, nanos as u32)
}
