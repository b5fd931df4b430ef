/// Configuration settings for a Sensordrone session.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Config {
    /// Transport reads allowed while waiting for a single response frame.
    pub frame_read_attempts: usize,
    /// UART polls allowed while waiting for an external CO2 measurement.
    ///
    /// `None` polls until a measurement arrives, however long that takes.
    pub uart_poll_attempts: Option<u32>,
    /// Delay between UART polls, in milliseconds.
    pub uart_poll_interval_ms: u32,
}

impl Config {
    /// Creates a new `Config` instance.
    ///
    /// # Arguments
    ///
    /// * `frame_read_attempts` - Transport reads allowed per response frame.
    /// * `uart_poll_attempts` - UART polls allowed per CO2 measurement, `None` for no limit.
    /// * `uart_poll_interval_ms` - Delay between UART polls.
    pub fn new(
        frame_read_attempts: usize,
        uart_poll_attempts: Option<u32>,
        uart_poll_interval_ms: u32,
    ) -> Config {
        Config {
            frame_read_attempts,
            uart_poll_attempts,
            uart_poll_interval_ms,
        }
    }

    /// Sets the number of transport reads allowed per response frame.
    pub fn frame_read_attempts(mut self, attempts: usize) -> Self {
        self.frame_read_attempts = attempts;
        self
    }

    /// Sets the UART polling budget for external CO2 reads.
    ///
    /// # Arguments
    ///
    /// * `attempts` - Maximum polls, or `None` to poll without limit.
    ///
    /// # Returns
    ///
    /// The updated `Config` instance.
    pub fn uart_poll_attempts(mut self, attempts: Option<u32>) -> Self {
        self.uart_poll_attempts = attempts;
        self
    }

    /// Sets the delay between UART polls. `0` polls back to back.
    pub fn uart_poll_interval_ms(mut self, interval_ms: u32) -> Self {
        self.uart_poll_interval_ms = interval_ms;
        self
    }
}

/// Provides default configuration values for a Sensordrone session.
impl Default for Config {
    /// Returns the default configuration.
    ///
    /// 32 reads per frame, 50 UART polls spaced 100 ms apart.
    fn default() -> Config {
        Config {
            frame_read_attempts: 32,
            uart_poll_attempts: Some(50),
            uart_poll_interval_ms: 100,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_overrides_defaults() {
        let config = Config::default()
            .frame_read_attempts(4)
            .uart_poll_attempts(None)
            .uart_poll_interval_ms(0);

        assert_eq!(config, Config::new(4, None, 0));
    }
}
