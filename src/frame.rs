//! Command encoding and response frame recognition.
//!
//! ```text
//! command:  0x50 | length | opcode | payload... | 0x00
//! response: 0x51 | length | payload[length]
//! ```
//!
//! A command's length byte is whatever the firmware expects for that opcode.
//! For nearly every command it counts the opcode, payload and terminator; the
//! exceptions are built with [`Command::unterminated`] or
//! [`Command::with_length`].
//!
//! A response's length byte delimits the frame: exactly `length` payload bytes
//! follow the header.

use heapless::Vec;
use log::{trace, warn};

use crate::constants::*;
use crate::error::Error;

/// A response payload, header stripped.
pub type Payload = Vec<u8, MAX_PAYLOAD_LEN>;

/// A command frame ready to be written to the transport.
pub type EncodedCommand = Vec<u8, MAX_COMMAND_LEN>;

// Largest incomplete frame plus one transport read.
pub(crate) const READ_CHUNK_LEN: usize = 64;
const RX_BUFFER_LEN: usize = RESPONSE_HEADER_LEN + MAX_PAYLOAD_LEN + READ_CHUNK_LEN;

/// One command understood by the device firmware.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Command<'a> {
    /// Operation selector.
    pub opcode: u8,
    /// Bytes following the opcode.
    pub payload: &'a [u8],
    /// Value of the length byte.
    pub length: u8,
    /// Whether the frame is closed by [`TERMINATOR`].
    pub terminated: bool,
}

impl<'a> Command<'a> {
    /// A terminated command whose length byte counts opcode, payload and terminator.
    pub const fn new(opcode: u8, payload: &'a [u8]) -> Self {
        Self {
            opcode,
            payload,
            length: (payload.len() as u8).wrapping_add(2),
            terminated: true,
        }
    }

    /// A command sent without the trailing terminator.
    pub const fn unterminated(opcode: u8, payload: &'a [u8]) -> Self {
        Self {
            opcode,
            payload,
            length: (payload.len() as u8).wrapping_add(1),
            terminated: false,
        }
    }

    /// Overrides the length byte.
    pub const fn with_length(mut self, length: u8) -> Self {
        self.length = length;
        self
    }

    /// Serializes the command into its wire frame.
    pub fn encode(&self) -> Result<EncodedCommand, Error> {
        if self.terminated {
            encode(self.opcode, self.payload, self.length)
        } else {
            encode_unterminated(self.opcode, self.payload, self.length)
        }
    }
}

/// Builds `[0x50, declared_length, opcode, payload..., 0x00]`.
///
/// This is a structural formatter: neither the opcode nor the payload is
/// checked against what the firmware accepts.
pub fn encode(opcode: u8, payload: &[u8], declared_length: u8) -> Result<EncodedCommand, Error> {
    let mut frame = encode_unterminated(opcode, payload, declared_length)?;
    frame.push(TERMINATOR).map_err(|_| Error::InvalidArg)?;
    Ok(frame)
}

fn encode_unterminated(
    opcode: u8,
    payload: &[u8],
    declared_length: u8,
) -> Result<EncodedCommand, Error> {
    let mut frame = EncodedCommand::new();
    frame
        .extend_from_slice(&[COMMAND_HEAD, declared_length, opcode])
        .map_err(|_| Error::InvalidArg)?;
    frame
        .extend_from_slice(payload)
        .map_err(|_| Error::InvalidArg)?;
    Ok(frame)
}

/// Returns the payload of a single response frame.
///
/// Anything not starting with [`RESPONSE_HEAD`] is not a response frame. The
/// declared length is not checked here; [`FrameDecoder`] uses it to slice the
/// frame before calling this.
pub fn try_recognize(buffer: &[u8]) -> Option<&[u8]> {
    match buffer {
        [RESPONSE_HEAD, _length, payload @ ..] => Some(payload),
        _ => None,
    }
}

/// Progress of the frame currently being reassembled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecoderState {
    /// Fewer than two bytes buffered, or no response head yet.
    AwaitingHeader,
    /// Header seen, payload incomplete.
    AwaitingPayload { declared: usize, received: usize },
    /// A complete frame is buffered.
    FrameReady,
}

/// Reassembles response frames from arbitrarily split transport reads.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    buffer: Vec<u8, RX_BUFFER_LEN>,
}

impl FrameDecoder {
    pub const fn new() -> Self {
        Self { buffer: Vec::new() }
    }

    /// Appends received bytes.
    pub fn push(&mut self, data: &[u8]) -> Result<(), Error> {
        trace!("Read from port: {data:02x?}");
        self.buffer.extend_from_slice(data).map_err(|_| {
            warn!(
                "Receive buffer overflow with {} bytes pending",
                self.buffer.len()
            );
            Error::Desynchronized
        })
    }

    pub fn state(&self) -> DecoderState {
        match self.buffer.as_slice() {
            [RESPONSE_HEAD, length, rest @ ..] => {
                let declared = *length as usize;
                if rest.len() < declared {
                    DecoderState::AwaitingPayload {
                        declared,
                        received: rest.len(),
                    }
                } else {
                    DecoderState::FrameReady
                }
            }
            _ => DecoderState::AwaitingHeader,
        }
    }

    /// Extracts the next complete frame, if one is buffered.
    ///
    /// Bytes in front of a response head are discarded and reported as
    /// [`Error::Desynchronized`]; the decoder is then positioned on the next
    /// head, if any.
    pub fn decode(&mut self) -> Result<Option<Payload>, Error> {
        if let Some(&first) = self.buffer.first() {
            if first != RESPONSE_HEAD {
                let skip = self
                    .buffer
                    .iter()
                    .position(|&b| b == RESPONSE_HEAD)
                    .unwrap_or(self.buffer.len());
                warn!(
                    "Discarding {} bytes not starting a response frame: {:02x?}",
                    skip,
                    &self.buffer[..skip]
                );
                self.consume(skip);
                return Err(Error::Desynchronized);
            }
        }

        if self.state() != DecoderState::FrameReady {
            return Ok(None);
        }

        let frame_len = RESPONSE_HEADER_LEN + self.buffer[1] as usize;
        let payload = try_recognize(&self.buffer[..frame_len])
            .and_then(|payload| Payload::from_slice(payload).ok())
            .ok_or(Error::Desynchronized)?;
        self.consume(frame_len);
        Ok(Some(payload))
    }

    /// Number of buffered bytes not yet returned as a frame.
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    pub fn clear(&mut self) {
        self.buffer.clear();
    }

    fn consume(&mut self, count: usize) {
        let len = self.buffer.len();
        self.buffer.copy_within(count..len, 0);
        self.buffer.truncate(len - count);
    }
}
