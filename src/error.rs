use core::fmt::{Display, Formatter};

use embedded_io_async::ErrorKind;

/// Error type for every driver operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// Reading, writing or flushing the serial transport failed.
    ///
    /// This is fatal for the session: the multiplexer stays failed and every
    /// later request reports the same error.
    TransportFailed(ErrorKind),
    /// The transport reached end-of-file while a response was outstanding.
    UnexpectedEof,
    /// Inbound data cannot be matched to the outstanding request.
    ///
    /// Responses carry no correlation id, so once this is reported no later
    /// response can be trusted until [`crate::Multiplexer::resync`] is called.
    Desynchronized,
    /// A bounded wait ran out of attempts.
    Timeout,
    /// A response payload was too short for the requested reading.
    ShortPayload { expected: usize, actual: usize },
    /// The precision gas sensor reported a gain stage outside its table.
    InvalidGainStage(u8),
    /// The precision gas calibration has not been read for this session.
    NotCalibrated,
    /// An argument cannot be encoded into a command frame.
    InvalidArg,
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter) -> core::fmt::Result {
        match self {
            Self::TransportFailed(kind) => write!(f, "transport failed: {kind:?}"),
            Self::UnexpectedEof => write!(f, "unexpected end-of-file"),
            Self::Desynchronized => write!(f, "response stream desynchronized"),
            Self::Timeout => write!(f, "timed out"),
            Self::ShortPayload { expected, actual } => {
                write!(f, "payload too short: expected {expected} bytes, got {actual}")
            }
            Self::InvalidGainStage(stage) => write!(f, "invalid gain stage {stage}"),
            Self::NotCalibrated => write!(f, "precision gas calibration not read"),
            Self::InvalidArg => write!(f, "invalid argument"),
        }
    }
}

impl core::error::Error for Error {}

impl Error {
    pub(crate) fn transport<E: embedded_io_async::Error>(err: E) -> Self {
        Self::TransportFailed(err.kind())
    }
}
