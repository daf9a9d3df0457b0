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

//! U-blox binary (UBX) frame classification: `B5 62 | class | id |
//! len_lo | len_hi | payload... | ck_a | ck_b`, Fletcher-8 checksummed
//! over `class..last_payload_byte`.

use nom::number::complete::le_u16;

use crate::fix::FixStore;

const SYNC: [u8; 2] = [0xB5, 0x62];
const HEADER_LEN: usize = 6; // sync(2) + class(1) + id(1) + len(2)
const CHECKSUM_LEN: usize = 2;

const CLASS_NAV: u8 = 0x01;
const ID_NAV_TIMEGPS: u8 = 0x20;
const CLASS_ACK: u8 = 0x05;
const ID_ACK_NAK: u8 = 0x00;
const ID_ACK_ACK: u8 = 0x01;

/// The fixed 16-byte UBX CFG-MSG command that enables NAV-TIMEGPS on
/// the serial output. Emitted once by the serial session manager at
/// startup (see `crate::serial`).
pub const CFG_MSG_ENABLE_NAV_TIMEGPS: [u8; 16] = [
    0xB5, 0x62, 0x06, 0x01, 0x08, 0x00, 0x01, 0x20, 0x00, 0x01, 0x01, 0x00, 0x00, 0x00, 0x32, 0x94,
];

/// Classification returned by [`parse_ubx`]. `Ignored` carries the
/// decoded `(class, id)` when one was available (i.e. the frame
/// passed the sync/checksum gate but wasn't NAV-TIMEGPS); it is `None`
/// for the pre-checksum rejections (too short, bad sync).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameKind {
    UbxNavTimeGps,
    Ignored(Option<(u8, u8)>),
    Invalid,
    Incomplete,
}

/// Classifies `buf` as a UBX frame, verifying its checksum and, for
/// NAV-TIMEGPS, folding a valid fix into `fix`.
/// Returns `(kind, consumed)`: for `Incomplete`, `consumed` is the
/// total frame size the caller should accumulate before calling
/// again; otherwise it is the number of bytes belonging to this frame
/// (0 for the two pre-sync rejections, which carry no frame at all).
pub fn parse_ubx(buf: &[u8], fix: &mut FixStore) -> (FrameKind, usize) {
    if buf.len() < 8 {
        return (FrameKind::Ignored(None), 0);
    }

    if buf[0] != SYNC[0] || buf[1] != SYNC[1] {
        return (FrameKind::Ignored(None), 0);
    }

    let (_, payload_len) = match le_u16::<_, nom::error::Error<&[u8]>>(&buf[4..6]) {
        Ok(r) => r,
        Err(_) => return (FrameKind::Ignored(None), 0),
    };
    let payload_len = payload_len as usize;
    let msg_size = HEADER_LEN + payload_len + CHECKSUM_LEN;

    if buf.len() < msg_size {
        return (FrameKind::Incomplete, msg_size);
    }

    let (ck_a, ck_b) = fletcher_checksum(&buf[2..HEADER_LEN + payload_len]);
    if ck_a != buf[msg_size - 2] || ck_b != buf[msg_size - 1] {
        return (FrameKind::Invalid, msg_size);
    }

    let class = buf[2];
    let id = buf[3];
    let payload = &buf[HEADER_LEN..HEADER_LEN + payload_len];

    match (class, id) {
        (CLASS_NAV, ID_NAV_TIMEGPS) => {
            decode_nav_timegps(payload, fix);
            (FrameKind::UbxNavTimeGps, msg_size)
        }
        (CLASS_ACK, ID_ACK_NAK) | (CLASS_ACK, ID_ACK_ACK) => {
            (FrameKind::Ignored(Some((class, id))), msg_size)
        }
        _ => (FrameKind::Ignored(Some((class, id))), msg_size),
    }
}

fn decode_nav_timegps(payload: &[u8], fix: &mut FixStore) {
    if payload.len() < 16 {
        // malformed but checksum-correct frame claiming to be
        // NAV-TIMEGPS; leave the fix untouched
        return;
    }

    let valid_bits = payload[11];
    let tow_valid = valid_bits & 0x01 != 0;
    let week_valid = valid_bits & 0x02 != 0;

    if !(tow_valid && week_valid) {
        return;
    }

    let itow = u32::from_le_bytes([payload[0], payload[1], payload[2], payload[3]]);
    let ftow = i32::from_le_bytes([payload[4], payload[5], payload[6], payload[7]]);
    let week = i16::from_le_bytes([payload[8], payload[9]]);

    let snap = fix.snapshot_mut();
    snap.gps_itow_ms = itow;
    snap.gps_ftow_ns = ftow;
    snap.gps_week = week;
    snap.time_valid = true;
}

/// 8-bit Fletcher checksum as used by UBX (ublox interface description
/// p. 133): `ck_a += b; ck_b += ck_a` over every byte in `buf`.
fn fletcher_checksum(buf: &[u8]) -> (u8, u8) {
    let mut ck_a: u8 = 0;
    let mut ck_b: u8 = 0;
    for &b in buf {
        ck_a = ck_a.wrapping_add(b);
        ck_b = ck_b.wrapping_add(ck_a);
    }
    (ck_a, ck_b)
}
