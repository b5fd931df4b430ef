//! Scripted serial port for driver tests.

use std::collections::VecDeque;
use std::vec::Vec;

use embedded_hal_async::delay::DelayNs;
use embedded_io_async::{ErrorKind, ErrorType, Read, Write};
use log::LevelFilter;

pub fn init_logger() {
    let _ = env_logger::builder()
        .filter_level(LevelFilter::max())
        .is_test(true)
        .try_init();
}

/// Builds a response frame around `payload`.
pub fn response(payload: &[u8]) -> Vec<u8> {
    let mut frame = std::vec![0x51, payload.len() as u8];
    frame.extend_from_slice(payload);
    frame
}

/// Replays queued deliveries, one per `read`, and records everything written.
#[derive(Debug, Default)]
pub struct MockSerial {
    deliveries: VecDeque<Vec<u8>>,
    pub written: Vec<u8>,
    pub fail_writes: Option<ErrorKind>,
    pub reads: usize,
}

impl MockSerial {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues raw bytes returned by a single `read`.
    pub fn deliver(&mut self, bytes: &[u8]) -> &mut Self {
        self.deliveries.push_back(bytes.to_vec());
        self
    }

    /// Queues a well-formed response frame.
    pub fn respond(&mut self, payload: &[u8]) -> &mut Self {
        self.deliver(&response(payload))
    }

    /// Queues `count` empty acknowledgement frames.
    pub fn acknowledge(&mut self, count: usize) -> &mut Self {
        for _ in 0..count {
            self.respond(&[0x00]);
        }
        self
    }

    pub fn pending(&self) -> usize {
        self.deliveries.len()
    }
}

impl ErrorType for MockSerial {
    type Error = ErrorKind;
}

impl Read for MockSerial {
    async fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
        self.reads += 1;
        let Some(mut delivery) = self.deliveries.pop_front() else {
            return Ok(0);
        };

        let n = delivery.len().min(buf.len());
        buf[..n].copy_from_slice(&delivery[..n]);
        if n < delivery.len() {
            let rest = delivery.split_off(n);
            self.deliveries.push_front(rest);
        }
        Ok(n)
    }
}

impl Write for MockSerial {
    async fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> {
        if let Some(kind) = self.fail_writes {
            return Err(kind);
        }
        self.written.extend_from_slice(buf);
        Ok(buf.len())
    }

    async fn flush(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }
}

/// Delay that returns immediately, counting how often it was asked to wait.
#[derive(Debug, Default)]
pub struct NoDelay {
    pub calls: usize,
}

impl DelayNs for NoDelay {
    async fn delay_ns(&mut self, _ns: u32) {
        self.calls += 1;
    }
}
