//! ASCII passthrough to a sensor attached to the device UART.
//!
//! Text written with [`write_command`] is forwarded verbatim; [`READ_COMMAND`]
//! returns whatever the attached sensor has sent since the previous read.
//! The external CO2 sensor answers a `Z` request with a line containing
//! ` z DDDDD DDDDD `, which may arrive spread over several reads.

use heapless::Vec;
use log::warn;

use crate::constants::*;
use crate::error::Error;
use crate::frame::Command;

// Switches the CO2 sensor to polled mode.
pub const CO2_SETUP: &[u8] = b"K 1\r\n";

// Requests one CO2 measurement.
pub const CO2_MEASURE: &[u8] = b"Z\r\n";

pub const READ_COMMAND: Command<'static> = Command::new(OP_UART_READ, &[]);

// " z " + 5 digits + " " + 5 digits + " "
const MEASUREMENT_LEN: usize = 15;
const ACCUMULATOR_LEN: usize = 128;

/// Wraps ASCII bytes in a UART write command.
pub fn write_command(data: &[u8]) -> Result<Command<'_>, Error> {
    if data.len() > MAX_UART_WRITE_LEN {
        log::error!(
            "UART write of {} bytes exceeds {} byte limit",
            data.len(),
            MAX_UART_WRITE_LEN
        );
        return Err(Error::InvalidArg);
    }
    Ok(Command::new(OP_UART_WRITE, data))
}

/// The UART bytes inside a read response: a 3-byte prefix and a 1-byte
/// suffix surround them.
pub fn received_bytes(payload: &[u8]) -> &[u8] {
    if payload.len() <= 4 {
        &[]
    } else {
        &payload[3..payload.len() - 1]
    }
}

/// Normalized text received from the UART during one measurement.
///
/// NUL bytes are dropped and every whitespace run becomes a single space,
/// including runs split across pushes. The first measurement is latched as
/// soon as its closing space arrives. When full, only the tail that could
/// still begin a measurement is kept.
#[derive(Debug, Default)]
pub struct TextAccumulator {
    text: Vec<u8, ACCUMULATOR_LEN>,
    found: Option<(u32, u32)>,
}

impl TextAccumulator {
    pub const fn new() -> Self {
        Self {
            text: Vec::new(),
            found: None,
        }
    }

    pub fn push(&mut self, bytes: &[u8]) {
        for &b in bytes {
            if b == 0 {
                continue;
            }
            let b = if is_space(b) { b' ' } else { b };
            if b == b' ' && self.text.last() == Some(&b' ') {
                continue;
            }
            if self.text.is_full() {
                self.keep_tail();
            }
            match self.text.push(b) {
                Ok(()) => self.latch(),
                Err(b) => warn!("UART text accumulator full, dropping {:#04x}", b),
            }
        }
    }

    /// The first complete measurement pair, if one has arrived.
    pub fn measurement(&self) -> Option<(u32, u32)> {
        self.found
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.text
    }

    pub fn clear(&mut self) {
        self.text.clear();
        self.found = None;
    }

    // Checks the window ending at the byte just pushed.
    fn latch(&mut self) {
        if self.found.is_some() {
            return;
        }
        if let Some(start) = self.text.len().checked_sub(MEASUREMENT_LEN) {
            self.found = find_measurement(&self.text[start..]);
        }
    }

    fn keep_tail(&mut self) {
        let len = self.text.len();
        let keep = MEASUREMENT_LEN - 1;
        self.text.copy_within(len - keep..len, 0);
        self.text.truncate(keep);
    }
}

/// Finds the leftmost ` z DDDDD DDDDD ` in `text`.
pub fn find_measurement(text: &[u8]) -> Option<(u32, u32)> {
    text.windows(MEASUREMENT_LEN).find_map(|window| {
        if &window[..3] != b" z " || window[8] != b' ' || window[14] != b' ' {
            return None;
        }
        Some((digits(&window[3..8])?, digits(&window[9..14])?))
    })
}

/// Mean of the two fields of a measurement.
pub fn average((first, second): (u32, u32)) -> f64 {
    (first as f64 + second as f64) / 2.0
}

// Whitespace as the sensor line protocol sees it, vertical tab included.
fn is_space(b: u8) -> bool {
    matches!(b, b' ' | b'\t' | b'\n' | 0x0b | 0x0c | b'\r')
}

fn digits(field: &[u8]) -> Option<u32> {
    field.iter().try_fold(0u32, |acc, &c| {
        c.is_ascii_digit().then(|| acc * 10 + u32::from(c - b'0'))
    })
}
