//! Request/response correlation over the framed protocol.
//!
//! Response frames carry no correlation id: a response belongs to whichever
//! request is outstanding. [`Multiplexer::send`] takes `&mut self`, so at most
//! one request can be in flight and responses are delivered in the order the
//! requests were sent.

use embedded_io_async::{ErrorKind, Read, Write};
use log::{debug, error, warn};

use crate::error::Error;
use crate::frame::{Command, FrameDecoder, Payload, READ_CHUNK_LEN};

/// Where the link stands between two requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    /// Ready to send.
    Idle,
    /// A command was written and its response has not been delivered.
    AwaitingResponse,
    /// Inbound data no longer lines up with requests. Call
    /// [`Multiplexer::resync`] before sending again.
    Desynchronized,
    /// The transport failed. The session cannot continue.
    Failed(ErrorKind),
}

/// Owns the transport and pairs every command with the next response frame.
pub struct Multiplexer<S> {
    serial: S,
    decoder: FrameDecoder,
    state: LinkState,
    read_attempts: usize,
}

impl<S> Multiplexer<S>
where
    S: Read + Write,
{
    /// Creates a multiplexer that gives up on a response after
    /// `read_attempts` transport reads.
    pub fn new(serial: S, read_attempts: usize) -> Self {
        Self {
            serial,
            decoder: FrameDecoder::new(),
            state: LinkState::Idle,
            read_attempts,
        }
    }

    pub fn state(&self) -> LinkState {
        self.state
    }

    /// Sends a command and waits for the response frame that follows it.
    ///
    /// # Returns
    ///
    /// * `Ok(Payload)` with the response bytes after the frame header.
    /// * `Err(Error::Desynchronized)` if stale data was waiting, the previous
    ///   request was abandoned, or the reply did not start with a response head.
    /// * `Err(Error::TransportFailed)` if the transport failed, now or earlier.
    /// * `Err(Error::Timeout)` or `Err(Error::UnexpectedEof)` if no frame arrived.
    pub async fn send(&mut self, command: &Command<'_>) -> Result<Payload, Error> {
        match self.state {
            LinkState::Idle => {}
            LinkState::AwaitingResponse => {
                warn!("Previous request was abandoned before its response arrived");
                self.state = LinkState::Desynchronized;
                return Err(Error::Desynchronized);
            }
            LinkState::Desynchronized => return Err(Error::Desynchronized),
            LinkState::Failed(kind) => return Err(Error::TransportFailed(kind)),
        }

        if self.decoder.buffered() > 0 {
            warn!(
                "{} unsolicited bytes pending before opcode {:#04x}",
                self.decoder.buffered(),
                command.opcode
            );
            self.state = LinkState::Desynchronized;
            return Err(Error::Desynchronized);
        }

        let frame = command.encode()?;
        debug!("Executing command: {:02X?}", frame.as_slice());
        self.state = LinkState::AwaitingResponse;
        self.write(&frame).await?;

        match self.receive().await {
            Ok(payload) => {
                self.state = LinkState::Idle;
                debug!("Response: {:02X?}", payload.as_slice());
                Ok(payload)
            }
            Err(e) => {
                error!(
                    "No response to opcode {:#04x}: {:?}",
                    command.opcode, e
                );
                if !matches!(self.state, LinkState::Failed(_)) {
                    self.state = LinkState::Desynchronized;
                }
                Err(e)
            }
        }
    }

    /// Drops buffered bytes and returns to [`LinkState::Idle`].
    ///
    /// A failed transport stays failed.
    pub fn resync(&mut self) {
        if matches!(self.state, LinkState::Failed(_)) {
            return;
        }
        debug!(
            "Resynchronizing, dropping {} buffered bytes",
            self.decoder.buffered()
        );
        self.decoder.clear();
        self.state = LinkState::Idle;
    }

    /// Flushes the transport and hands it back.
    pub async fn close(mut self) -> Result<S, Error> {
        self.serial.flush().await.map_err(Error::transport)?;
        Ok(self.serial)
    }

    async fn write(&mut self, frame: &[u8]) -> Result<(), Error> {
        let result = match self.serial.write_all(frame).await {
            Ok(()) => self.serial.flush().await,
            Err(e) => Err(e),
        };
        result.map_err(|e| self.fail(e))
    }

    // Reads until the decoder yields one frame.
    async fn receive(&mut self) -> Result<Payload, Error> {
        let mut attempts = 0;

        loop {
            if let Some(payload) = self.decoder.decode()? {
                return Ok(payload);
            }

            attempts += 1;
            if attempts > self.read_attempts {
                error!(
                    "No complete frame after {} reads ({:?})",
                    self.read_attempts,
                    self.decoder.state()
                );
                return Err(Error::Timeout);
            }

            let mut chunk = [0u8; READ_CHUNK_LEN];
            let n = match self.serial.read(&mut chunk).await {
                Ok(n) => n,
                Err(e) => return Err(self.fail(e)),
            };
            if n == 0 {
                return Err(Error::UnexpectedEof);
            }
            self.decoder.push(&chunk[..n])?;
        }
    }

    fn fail<E: embedded_io_async::Error>(&mut self, err: E) -> Error {
        let kind = err.kind();
        error!("Transport failed: {:?}", kind);
        self.state = LinkState::Failed(kind);
        Error::TransportFailed(kind)
    }
}
