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

//! NMEA 0183 sentence classification: `$` start, comma-separated
//! fields, `*hh` checksum, optional CRLF. Only RMC and GGA are
//! recognized; everything else is `Ignored`.

use crate::fix::{mode_from_char, normalize_year, FixDate, FixStore};

use super::split_fields;

const RMC_FIELDS_SHORT: usize = 13;
const RMC_FIELDS_LONG: usize = 14; // NMEA 4.10+ adds navStatus
const GGA_FIELDS: usize = 15;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SentenceKind {
    Rmc,
    Gga,
    Ignored,
    Invalid,
    Unknown,
}

/// Classifies `buf` as an NMEA sentence, verifying its checksum and
/// folding a valid RMC/GGA fix into `fix`. `buf` is expected to be one
/// complete sentence (the caller has already found the frame
/// boundaries); its length is implicit in the slice.
pub fn parse_nmea(buf: &[u8], fix: &mut FixStore) -> SentenceKind {
    if buf.len() > 255 {
        return SentenceKind::Unknown;
    }
    if buf.len() < 8 {
        return SentenceKind::Invalid;
    }

    let s = match std::str::from_utf8(buf) {
        Ok(s) => s.trim_end_matches(['\r', '\n']),
        Err(_) => return SentenceKind::Invalid,
    };

    if !s.starts_with('$') {
        return SentenceKind::Invalid;
    }

    if !checksum_ok(s) {
        return SentenceKind::Invalid;
    }

    let body = &s[1..s.find('*').unwrap_or(s.len())];
    let sentence_id = &body[..body.find(',').unwrap_or(body.len())];

    // talker-agnostic: $G?RMC / $G?GGA, '?' any single character
    if !(sentence_id.len() == 5 && sentence_id.as_bytes()[0] == b'G') {
        return SentenceKind::Ignored;
    }
    let suffix = &sentence_id[2..];

    match suffix {
        "RMC" => parse_rmc(body, fix),
        "GGA" => parse_gga(body, fix),
        _ => SentenceKind::Ignored,
    }
}

fn checksum_ok(s: &str) -> bool {
    let Some(star) = s.find('*') else {
        return false;
    };
    let hex = &s[star + 1..];
    if hex.len() < 2 {
        return false;
    }
    let hi = hex.as_bytes()[0];
    let lo = hex.as_bytes()[1];
    if !(hi.is_ascii_hexdigit() && lo.is_ascii_hexdigit()) {
        return false;
    }
    // spec requires uppercase A-F
    if (hi.is_ascii_alphabetic() && !hi.is_ascii_uppercase())
        || (lo.is_ascii_alphabetic() && !lo.is_ascii_uppercase())
    {
        return false;
    }
    let expected = (hex_val(hi) << 4) | hex_val(lo);

    let body = &s[1..star];
    let actual = body.bytes().fold(0u8, |acc, b| acc ^ b);
    actual == expected
}

fn hex_val(c: u8) -> u8 {
    match c {
        b'0'..=b'9' => c - b'0',
        b'A'..=b'F' => c - b'A' + 10,
        _ => 0,
    }
}

fn parse_rmc(body: &str, fix: &mut FixStore) -> SentenceKind {
    let fields: Vec<&str> = split_fields(body).collect();
    if fields.len() != RMC_FIELDS_SHORT && fields.len() != RMC_FIELDS_LONG {
        return SentenceKind::Ignored;
    }

    let mode_char = fields[12].chars().next().unwrap_or('N');
    let mode = match mode_char {
        'A' | 'D' => mode_char,
        _ => 'N',
    };

    let time = scan_hhmmss(fields[1]);
    let date = scan_ddmmyy(fields[9]);

    let snap = fix.snapshot_mut();
    snap.mode = mode_from_char(mode);

    if let (Some((hour, minute, second, frac_sec)), Some((day, month, year))) = (time, date) {
        if mode == 'A' || mode == 'D' {
            snap.date = FixDate {
                year: normalize_year(year),
                month,
                day,
                hour,
                minute,
                second,
                frac_sec,
            };
            snap.time_valid = true;
        } else {
            snap.time_valid = false;
        }
    } else {
        snap.time_valid = false;
    }

    SentenceKind::Rmc
}

fn parse_gga(body: &str, fix: &mut FixStore) -> SentenceKind {
    let fields: Vec<&str> = split_fields(body).collect();
    if fields.len() != GGA_FIELDS {
        return SentenceKind::Ignored;
    }

    let num_sat: Option<u8> = fields[7].parse().ok();
    let lat = scan_lat(fields[2], fields[3]);
    let lon = scan_lon(fields[4], fields[5]);
    // altitude arrives as meters with a fractional part; truncate
    // toward zero to the integer meter value the snapshot stores.
    let alt: Option<i32> = fields[9].parse::<f64>().ok().map(|v| v as i32);

    let snap = fix.snapshot_mut();

    match (num_sat, lat, lon, alt) {
        (Some(num_sat), Some(lat), Some(lon), Some(alt)) => {
            snap.num_sat = num_sat;
            snap.lat = lat;
            snap.lon = lon;
            snap.alt = alt;
            snap.pos_valid = true;
        }
        _ => {
            snap.pos_valid = false;
        }
    }

    SentenceKind::Gga
}

/// `HHMMSS[.ss]` -> (hour, minute, second, fractional seconds).
fn scan_hhmmss(s: &str) -> Option<(u8, u8, u8, f64)> {
    if s.len() < 6 {
        return None;
    }
    let hour: u8 = s[0..2].parse().ok()?;
    let minute: u8 = s[2..4].parse().ok()?;
    let second: u8 = s[4..6].parse().ok()?;
    if hour > 23 || minute > 59 || second > 60 {
        return None;
    }
    let frac_sec: f64 = if s.len() > 6 { s[6..].parse().ok()? } else { 0.0 };
    Some((hour, minute, second, frac_sec))
}

/// `DDMMYY` -> (day, month, 2-digit year).
fn scan_ddmmyy(s: &str) -> Option<(u8, u8, u16)> {
    if s.len() != 6 {
        return None;
    }
    let day: u8 = s[0..2].parse().ok()?;
    let month: u8 = s[2..4].parse().ok()?;
    let year: u16 = s[4..6].parse().ok()?;
    if day == 0 || day > 31 || month == 0 || month > 12 {
        return None;
    }
    Some((day, month, year))
}

/// Latitude: 2-digit degrees + decimal minutes, signed by hemisphere.
fn scan_lat(coord: &str, hemi: &str) -> Option<f64> {
    scan_coord(coord, 2, hemi, "NS")
}

/// Longitude: 3-digit degrees + decimal minutes, signed by hemisphere.
fn scan_lon(coord: &str, hemi: &str) -> Option<f64> {
    scan_coord(coord, 3, hemi, "EW")
}

fn scan_coord(coord: &str, deg_digits: usize, hemi: &str, legal: &str) -> Option<f64> {
    if coord.len() < deg_digits {
        return None;
    }
    let degrees: f64 = coord[..deg_digits].parse().ok()?;
    let minutes: f64 = coord[deg_digits..].parse().ok()?;
    let hemi_char = hemi.chars().next()?;
    if !legal.contains(hemi_char) {
        return None;
    }
    let decimal = degrees + minutes / 60.0;
    Some(if legal.as_bytes()[1] as char == hemi_char {
        -decimal
    } else {
        decimal
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_gga_scenario_1() {
        let mut fix = FixStore::new();
        let line = b"$GPGGA,092725.00,4717.11399,N,00833.91590,E,1,08,1.01,499.6,M,48.0,M,,*5B";
        let kind = parse_nmea(line, &mut fix);
        assert_eq!(kind, SentenceKind::Gga);
        let snap = fix.snapshot();
        assert!(snap.pos_valid);
        assert!((snap.lat - 47.28523317).abs() < 1e-6);
        assert!((snap.lon - 8.56526500).abs() < 1e-6);
        assert_eq!(snap.alt, 499);
        assert_eq!(snap.num_sat, 8);
    }

    #[test]
    fn valid_rmc_scenario_2() {
        let mut fix = FixStore::new();
        let base = b"$GPRMC,083559.34,A,4717.11437,N,00833.91522,E,0.004,77.52,091202,,,A*";
        let cksum = base[1..base.len() - 1]
            .iter()
            .fold(0u8, |acc, &b| acc ^ b);
        let line = format!("{}{:02X}", std::str::from_utf8(base).unwrap(), cksum);
        let kind = parse_nmea(line.as_bytes(), &mut fix);
        assert_eq!(kind, SentenceKind::Rmc);
        let snap = fix.snapshot();
        assert!(snap.time_valid);
        assert_eq!(snap.date.year, 2002);
        assert_eq!(snap.date.month, 12);
        assert_eq!(snap.date.day, 9);
        assert_eq!(snap.date.hour, 8);
        assert_eq!(snap.date.minute, 35);
        assert_eq!(snap.date.second, 59);
        assert!((snap.date.frac_sec - 0.34).abs() < 1e-9);
    }

    #[test]
    fn no_fix_rmc_scenario_3() {
        let mut fix = FixStore::new();
        let base = b"$GPRMC,,V,,,,,,,,,,N*";
        let cksum = base[1..base.len() - 1]
            .iter()
            .fold(0u8, |acc, &b| acc ^ b);
        let line = format!("{}{:02X}", std::str::from_utf8(base).unwrap(), cksum);
        let kind = parse_nmea(line.as_bytes(), &mut fix);
        assert_eq!(kind, SentenceKind::Rmc);
        assert!(!fix.snapshot().time_valid);
    }

    #[test]
    fn single_bit_flip_breaks_checksum() {
        let mut fix = FixStore::new();
        let mut line =
            b"$GPGGA,092725.00,4717.11399,N,00833.91590,E,1,08,1.01,499.6,M,48.0,M,,*5B".to_vec();
        // flip a bit inside the framed region (not the checksum itself)
        line[10] ^= 0x01;
        assert_eq!(parse_nmea(&line, &mut fix), SentenceKind::Invalid);
    }

    #[test]
    fn idempotent_on_repeated_parse() {
        let mut fix = FixStore::new();
        let base = b"$GPRMC,083559.34,A,4717.11437,N,00833.91522,E,0.004,77.52,091202,,,A*";
        let cksum = base[1..base.len() - 1]
            .iter()
            .fold(0u8, |acc, &b| acc ^ b);
        let line = format!("{}{:02X}", std::str::from_utf8(base).unwrap(), cksum);
        parse_nmea(line.as_bytes(), &mut fix);
        let after_first = *fix.snapshot();
        parse_nmea(line.as_bytes(), &mut fix);
        assert_eq!(*fix.snapshot(), after_first);
    }

    #[test]
    fn wrong_field_count_is_ignored() {
        let mut fix = FixStore::new();
        let base = b"$GPRMC,083559.34,A,4717.11437,N*";
        let cksum = base[1..base.len() - 1]
            .iter()
            .fold(0u8, |acc, &b| acc ^ b);
        let line = format!("{}{:02X}", std::str::from_utf8(base).unwrap(), cksum);
        assert_eq!(parse_nmea(line.as_bytes(), &mut fix), SentenceKind::Ignored);
    }

    #[test]
    fn unrecognized_sentence_is_ignored() {
        let mut fix = FixStore::new();
        let base = b"$GPGSA,A,3,04,05,,,,,,,,,,,2.5,1.3,2.1*";
        let cksum = base[1..base.len() - 1]
            .iter()
            .fold(0u8, |acc, &b| acc ^ b);
        let line = format!("{}{:02X}", std::str::from_utf8(base).unwrap(), cksum);
        assert_eq!(parse_nmea(line.as_bytes(), &mut fix), SentenceKind::Ignored);
    }
}
