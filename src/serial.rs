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

//! Component A: the serial session manager. Opens, configures, and
//! restores a byte-oriented device, and fires the one-shot UBX
//! configuration command that enables NAV-TIMEGPS. Everything past
//! `enable`/`disable` treats the device as an opaque byte source: no
//! framing, no buffering, no decoding happens here.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::os::unix::fs::OpenOptionsExt;

use log::warn;
use nix::fcntl::OFlag;
use nix::sys::termios::{
    self, BaudRate, ControlFlags, InputFlags, LocalFlags, OutputFlags, SetArg,
    SpecialCharacterIndices,
};

use crate::error::Error;
use crate::protocol::ubx::CFG_MSG_ENABLE_NAV_TIMEGPS;

/// U-blox 7 generation family-string prefix `enable` expects. A
/// mismatch (or absence) only warns; the receiver is opened
/// regardless.
pub const EXPECTED_FAMILY_PREFIX: &str = "UBX7";

/// The line rate this core actually configures, independent of
/// whatever the caller passes as `baud`.
const FIXED_BAUD: u32 = 115_200;

/// Minimum bytes a blocking read will wait for (VMIN); there is no
/// VTIME cap, so reads block indefinitely for at least one byte.
const VMIN_BYTES: u8 = 1;

/// An open, configured serial byte source. Dropping it does not
/// restore the saved line discipline; callers that want that must go
/// through [`disable`], which also closes the descriptor.
pub struct SerialSession {
    file: File,
    saved: termios::Termios,
}

impl SerialSession {
    /// Raw handle for blocking reads; the core does no framing of its
    /// own, so callers read directly from this.
    pub fn file(&self) -> &File {
        &self.file
    }

    pub fn file_mut(&mut self) -> &mut File {
        &mut self.file
    }
}

/// Opens `path`, switches it to raw 8N1 at a fixed 115200 baud, and
/// writes the NAV-TIMEGPS enable command once. `baud` is accepted but
/// ignored beyond a mismatch warning; `family` is checked only for a
/// warning, never an error; `None` is treated the same as a mismatch.
pub fn enable(path: &str, family: Option<&str>, baud: u32) -> Result<SerialSession, Error> {
    if baud != FIXED_BAUD {
        warn!("requested baud {baud} ignored; serial line is fixed at {FIXED_BAUD}");
    }
    match family {
        Some(f) if f.starts_with(EXPECTED_FAMILY_PREFIX) => {}
        other => warn!("unrecognized GNSS receiver family {other:?}, proceeding with UBX7 defaults"),
    }

    let file = OpenOptions::new()
        .read(true)
        .write(true)
        .custom_flags(OFlag::O_NOCTTY.bits())
        .open(path)?;

    let saved = configure_raw(&file)?;

    let mut session = SerialSession { file, saved };
    write_startup_command(&mut session);

    Ok(session)
}

/// Restores the saved line discipline and closes the descriptor. The
/// descriptor is released even if restoring the discipline fails,
/// since `file` is dropped unconditionally at the end of this
/// function's scope.
pub fn disable(mut session: SerialSession) -> Result<(), Error> {
    let result = termios::tcsetattr(&session.file, SetArg::TCSANOW, &session.saved);
    session.file.flush().ok();
    result.map_err(|e| Error::Io(std::io::Error::from(e)))
}

fn configure_raw(file: &File) -> Result<termios::Termios, Error> {
    let saved = termios::tcgetattr(file).map_err(|e| Error::Io(std::io::Error::from(e)))?;
    let mut t = saved.clone();

    t.control_flags |= ControlFlags::CLOCAL | ControlFlags::CREAD | ControlFlags::CS8;
    t.control_flags &= !(ControlFlags::CSIZE | ControlFlags::PARENB | ControlFlags::CSTOPB);
    t.input_flags |= InputFlags::IGNPAR;
    t.input_flags &= !(InputFlags::ICRNL
        | InputFlags::INLCR
        | InputFlags::IXON
        | InputFlags::IXOFF
        | InputFlags::IXANY
        | InputFlags::ISTRIP
        | InputFlags::INPCK);
    t.output_flags &= !OutputFlags::OPOST;
    t.local_flags &=
        !(LocalFlags::ICANON | LocalFlags::ECHO | LocalFlags::ECHOE | LocalFlags::ISIG);

    t.control_chars[SpecialCharacterIndices::VMIN as usize] = VMIN_BYTES;
    t.control_chars[SpecialCharacterIndices::VTIME as usize] = 0;

    termios::cfsetispeed(&mut t, BaudRate::B115200)
        .map_err(|e| Error::Io(std::io::Error::from(e)))?;
    termios::cfsetospeed(&mut t, BaudRate::B115200)
        .map_err(|e| Error::Io(std::io::Error::from(e)))?;

    termios::tcsetattr(file, SetArg::TCSANOW, &t).map_err(|e| Error::Io(std::io::Error::from(e)))?;

    Ok(saved)
}

/// Sends the fixed NAV-TIMEGPS enable command. Logged and swallowed on
/// any failure, including a short write: the receiver usually accepts
/// its power-on defaults, and a failed discipline shows up later as an
/// absence of NAV-TIMEGPS frames rather than here.
fn write_startup_command(session: &mut SerialSession) {
    match session.file.write(&CFG_MSG_ENABLE_NAV_TIMEGPS) {
        Ok(n) if n == CFG_MSG_ENABLE_NAV_TIMEGPS.len() => {}
        Ok(n) => warn!(
            "short write enabling NAV-TIMEGPS: wrote {n} of {} bytes",
            CFG_MSG_ENABLE_NAV_TIMEGPS.len()
        ),
        Err(e) => warn!("failed to write NAV-TIMEGPS enable command: {e}"),
    }
}
