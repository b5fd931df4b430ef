#![cfg_attr(not(test), no_std)]

use embedded_hal_async::delay::DelayNs;
use embedded_io_async::{Read, Write};
use log::debug;

mod constants;
pub use constants::*;

mod error;
pub use error::*;

mod config;
pub use config::*;

mod frame;
pub use frame::*;

mod mux;
pub use mux::*;

pub mod commands;
pub mod decode;
pub mod uart;

pub use decode::{HardwareInfo, PrecisionGasCalibration, RgbcReading, Temperature};

#[cfg(test)]
mod mock;

/// Color of one of the two status LEDs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Rgb {
    pub red: u8,
    pub green: u8,
    pub blue: u8,
}

impl Rgb {
    pub const OFF: Rgb = Rgb::new(0, 0, 0);

    pub const fn new(red: u8, green: u8, blue: u8) -> Self {
        Self { red, green, blue }
    }
}

/// Represents a Sensordrone environmental sensor module.
///
/// This struct owns the serial link to the device and provides one
/// enable/disable/read group per on-board sensor. Every method waits for the
/// device to answer before returning, so commands never overlap.
///
/// Sensors controlled through I2C registers (pressure, RGBC, IR temperature,
/// capacitance) and the two gas heaters must be enabled before they are read;
/// the device answers reads of a disabled sensor with meaningless values.
///
/// # Type Parameters
///
/// * `Serial`: The serial interface connected to the device. It must implement
///   `embedded_io_async::Read` and `embedded_io_async::Write`.
/// * `Delay`: Used to pace UART polling, any `embedded_hal_async::delay::DelayNs`.
pub struct Sensordrone<Serial, Delay> {
    mux: Multiplexer<Serial>,
    delay: Delay,
    config: Config,
    hardware: Option<HardwareInfo>,
    calibration: Option<PrecisionGasCalibration>,
    co2_ready: bool,
}

impl<S, D> Sensordrone<S, D>
where
    S: Read + Write,
    D: DelayNs,
{
    /// Creates a new `Sensordrone` session.
    ///
    /// # Arguments
    ///
    /// * `serial`: An open serial link to the device.
    /// * `delay`: Delay provider for UART polling.
    /// * `config`: Session configuration.
    ///
    /// # Returns
    ///
    /// A new `Sensordrone` instance. Call [`Sensordrone::connect`] before reading sensors.
    pub fn new(serial: S, delay: D, config: Config) -> Self {
        Self {
            mux: Multiplexer::new(serial, config.frame_read_attempts),
            delay,
            config,
            hardware: None,
            calibration: None,
            co2_ready: false,
        }
    }

    /// Performs the connection handshake.
    ///
    /// This involves:
    /// - Reading the hardware and firmware identification.
    /// - Reading the precision gas calibration, which every later precision
    ///   gas reading depends on.
    pub async fn connect(&mut self) -> Result<HardwareInfo, Error> {
        let info = self.read_hardware_info().await.map_err(|e| {
            log::error!("Failed to identify device during connect: {:?}", e);
            e
        })?;

        self.read_precision_gas_calibration().await.map_err(|e| {
            log::error!("Failed to read precision gas calibration during connect: {:?}", e);
            e
        })?;

        debug!("Sensordrone connect sequence complete: {:?}", info);
        Ok(info)
    }

    /// Flushes the serial link and returns it.
    pub async fn disconnect(self) -> Result<S, Error> {
        debug!("Disconnecting");
        self.mux.close().await
    }

    /// Identification read by the last [`Sensordrone::connect`].
    pub fn hardware_info(&self) -> Option<HardwareInfo> {
        self.hardware
    }

    /// Calibration read by the last [`Sensordrone::connect`].
    pub fn calibration(&self) -> Option<PrecisionGasCalibration> {
        self.calibration
    }

    pub fn link_state(&self) -> LinkState {
        self.mux.state()
    }

    /// Clears a desynchronized link so commands can be sent again.
    pub fn resync(&mut self) {
        self.mux.resync();
    }

    pub async fn read_hardware_info(&mut self) -> Result<HardwareInfo, Error> {
        debug!("Reading hardware and firmware version");
        let info = self
            .query(&commands::HARDWARE_INFO, decode::hardware_info)
            .await?;
        self.hardware = Some(info);
        Ok(info)
    }

    /// Reads the battery voltage in volts.
    pub async fn read_battery_voltage(&mut self) -> Result<f64, Error> {
        self.query(&commands::BATTERY_VOLTAGE, decode::battery_voltage)
            .await
    }

    /// Sets both status LEDs.
    pub async fn set_leds(&mut self, left: Rgb, right: Rgb) -> Result<(), Error> {
        debug!("Setting LEDs: left {:?}, right {:?}", left, right);
        let colors = [
            left.red,
            left.green,
            left.blue,
            right.red,
            right.green,
            right.blue,
        ];
        self.mux
            .send(&Command::new(OP_SET_LEDS, &colors))
            .await
            .map(|_| ())
    }

    pub async fn read_ambient_temperature(&mut self) -> Result<Temperature, Error> {
        self.query(&commands::AMBIENT_TEMPERATURE, decode::ambient_temperature)
            .await
    }

    /// Reads relative humidity in percent.
    pub async fn read_humidity(&mut self) -> Result<f64, Error> {
        self.query(&commands::HUMIDITY, decode::humidity).await
    }

    pub async fn enable_rgbc(&mut self) -> Result<(), Error> {
        self.run(commands::RGBC_ENABLE).await
    }

    pub async fn disable_rgbc(&mut self) -> Result<(), Error> {
        self.run(commands::RGBC_DISABLE).await
    }

    pub async fn rgbc_status(&mut self) -> Result<u16, Error> {
        self.query(&commands::RGBC_STATUS, decode::rgbc_status).await
    }

    /// Reads the light sensor. Requires [`Sensordrone::enable_rgbc`].
    pub async fn read_rgbc(&mut self) -> Result<RgbcReading, Error> {
        self.query(&commands::RGBC_READ, decode::rgbc).await
    }

    pub async fn enable_pressure(&mut self) -> Result<(), Error> {
        self.run(commands::PRESSURE_ENABLE).await
    }

    pub async fn disable_pressure(&mut self) -> Result<(), Error> {
        self.run(commands::PRESSURE_DISABLE).await
    }

    /// Reads barometric pressure in pascals. Requires [`Sensordrone::enable_pressure`].
    pub async fn read_pressure(&mut self) -> Result<f64, Error> {
        self.query(&commands::PRESSURE_READ, decode::pressure).await
    }

    /// Altitude is derived from the pressure sensor; same as [`Sensordrone::enable_pressure`].
    pub async fn enable_altitude(&mut self) -> Result<(), Error> {
        self.enable_pressure().await
    }

    pub async fn disable_altitude(&mut self) -> Result<(), Error> {
        self.disable_pressure().await
    }

    /// Reads altitude in meters.
    pub async fn read_altitude(&mut self) -> Result<f64, Error> {
        let pascals = self.read_pressure().await?;
        Ok(decode::altitude(pascals))
    }

    pub async fn enable_ir_temperature(&mut self) -> Result<(), Error> {
        self.run(commands::IR_TEMPERATURE_ENABLE).await
    }

    pub async fn disable_ir_temperature(&mut self) -> Result<(), Error> {
        self.run(commands::IR_TEMPERATURE_DISABLE).await
    }

    /// Reads the object temperature seen by the thermopile.
    ///
    /// Reads the sensor voltage, then the die temperature.
    pub async fn read_ir_temperature(&mut self) -> Result<Temperature, Error> {
        let object = self.mux.send(&commands::IR_OBJECT_READ).await?;
        let die = self.mux.send(&commands::IR_DIE_READ).await?;
        decode::ir_temperature(&object, &die)
    }

    /// Reads and caches the precision gas sensor calibration.
    pub async fn read_precision_gas_calibration(
        &mut self,
    ) -> Result<PrecisionGasCalibration, Error> {
        let calibration = self
            .query(
                &commands::PRECISION_GAS_CALIBRATION,
                decode::precision_gas_calibration,
            )
            .await?;
        debug!("Precision gas calibration: {:?}", calibration);
        self.calibration = Some(calibration);
        Ok(calibration)
    }

    /// Reads carbon monoxide concentration in ppm.
    ///
    /// # Returns
    ///
    /// * `Ok(f64)` with the concentration, `0.0` at or below the baseline.
    /// * `Err(Error::NotCalibrated)` if the calibration has not been read; no
    ///   command is sent in that case.
    pub async fn read_precision_gas(&mut self) -> Result<f64, Error> {
        let calibration = self.calibration.ok_or_else(|| {
            log::error!("Precision gas read before calibration");
            Error::NotCalibrated
        })?;
        let payload = self.mux.send(&commands::PRECISION_GAS_READ).await?;
        decode::precision_gas(&payload, &calibration)
    }

    pub async fn enable_oxidizing_gas(&mut self) -> Result<(), Error> {
        self.run(commands::OXIDIZING_GAS_ENABLE).await
    }

    pub async fn disable_oxidizing_gas(&mut self) -> Result<(), Error> {
        self.run(commands::OXIDIZING_GAS_DISABLE).await
    }

    /// Reads the oxidizing gas sensor resistance in ohms.
    pub async fn read_oxidizing_gas(&mut self) -> Result<f64, Error> {
        self.query(&commands::OXIDIZING_GAS_READ, decode::oxidizing_gas)
            .await
    }

    pub async fn enable_reducing_gas(&mut self) -> Result<(), Error> {
        self.run(commands::REDUCING_GAS_ENABLE).await
    }

    pub async fn disable_reducing_gas(&mut self) -> Result<(), Error> {
        self.run(commands::REDUCING_GAS_DISABLE).await
    }

    /// Reads the reducing gas sensor resistance in ohms.
    pub async fn read_reducing_gas(&mut self) -> Result<f64, Error> {
        self.query(&commands::REDUCING_GAS_READ, decode::reducing_gas)
            .await
    }

    /// Reads the external ADC input in volts.
    pub async fn read_adc(&mut self) -> Result<f64, Error> {
        self.query(&commands::ADC_READ, decode::adc_voltage).await
    }

    pub async fn enable_capacitance(&mut self) -> Result<(), Error> {
        self.run(commands::CAPACITANCE_ENABLE).await
    }

    pub async fn disable_capacitance(&mut self) -> Result<(), Error> {
        self.run(commands::CAPACITANCE_DISABLE).await
    }

    /// Reads capacitance in femtofarads.
    pub async fn read_capacitance(&mut self) -> Result<f64, Error> {
        self.query(&commands::CAPACITANCE_READ, decode::capacitance)
            .await
    }

    /// Sends ASCII bytes out of the device UART.
    ///
    /// # Returns
    ///
    /// * `Err(Error::InvalidArg)` if `data` is longer than [`MAX_UART_WRITE_LEN`].
    pub async fn write_uart(&mut self, data: &[u8]) -> Result<(), Error> {
        debug!("UART write: {:02X?}", data);
        let command = uart::write_command(data)?;
        self.mux.send(&command).await.map(|_| ())
    }

    /// Returns the bytes received on the device UART since the last read.
    pub async fn read_uart(&mut self) -> Result<Payload, Error> {
        let mut payload = self.mux.send(&uart::READ_COMMAND).await?;
        let len = uart::received_bytes(&payload).len();
        if len > 0 {
            payload.copy_within(3..3 + len, 0);
        }
        payload.truncate(len);
        Ok(payload)
    }

    /// Puts the external CO2 sensor in polled mode.
    pub async fn setup_external_co2(&mut self) -> Result<(), Error> {
        self.write_uart(uart::CO2_SETUP).await?;
        self.co2_ready = true;
        Ok(())
    }

    /// Reads the external CO2 sensor in ppm.
    ///
    /// The sensor is set up on first use. After requesting a measurement the
    /// UART is polled every `uart_poll_interval_ms` until a measurement line
    /// arrives; the reading is the mean of its two fields.
    ///
    /// # Returns
    ///
    /// * `Ok(f64)` with the CO2 concentration.
    /// * `Err(Error::Timeout)` if `uart_poll_attempts` polls passed without a measurement.
    pub async fn read_external_co2(&mut self) -> Result<f64, Error> {
        if !self.co2_ready {
            self.setup_external_co2().await.map_err(|e| {
                log::error!("Failed to set up external CO2 sensor: {:?}", e);
                e
            })?;
        }
        self.write_uart(uart::CO2_MEASURE).await?;

        let mut text = uart::TextAccumulator::new();
        let mut polls: u32 = 0;
        loop {
            if let Some(limit) = self.config.uart_poll_attempts {
                if polls >= limit {
                    log::error!(
                        "No CO2 measurement after {} polls, received {:02X?}",
                        polls,
                        text.as_bytes()
                    );
                    return Err(Error::Timeout);
                }
            }
            polls = polls.saturating_add(1);

            let received = self.read_uart().await?;
            text.push(&received);

            if let Some(measurement) = text.measurement() {
                let ppm = uart::average(measurement);
                debug!(
                    "CO2 measurement {:?} after {} polls: {} ppm",
                    measurement, polls, ppm
                );
                return Ok(ppm);
            }

            if self.config.uart_poll_interval_ms > 0 {
                self.delay
                    .delay_ms(self.config.uart_poll_interval_ms)
                    .await;
            }
        }
    }

    // Sends each command of a configuration sequence in order.
    async fn run(&mut self, sequence: &[Command<'_>]) -> Result<(), Error> {
        for (step, command) in sequence.iter().enumerate() {
            self.mux.send(command).await.map_err(|e| {
                log::error!(
                    "Configuration step {} of {} failed: {:?}",
                    step + 1,
                    sequence.len(),
                    e
                );
                e
            })?;
        }
        Ok(())
    }

    async fn query<T>(
        &mut self,
        command: &Command<'_>,
        decode: fn(&[u8]) -> Result<T, Error>,
    ) -> Result<T, Error> {
        let payload = self.mux.send(command).await?;
        decode(&payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{init_logger, MockSerial, NoDelay};

    fn drone(serial: MockSerial) -> Sensordrone<MockSerial, NoDelay> {
        Sensordrone::new(serial, NoDelay::default(), Config::default())
    }

    fn uart_reply(text: &[u8]) -> std::vec::Vec<u8> {
        let mut payload = std::vec![0x25, 0x00, text.len() as u8];
        payload.extend_from_slice(text);
        payload.push(0x00);
        payload
    }

    fn frames(sequence: &[Command]) -> std::vec::Vec<u8> {
        sequence
            .iter()
            .flat_map(|command| command.encode().unwrap())
            .collect()
    }

    #[tokio::test]
    async fn battery_voltage_end_to_end() {
        init_logger();

        let mut serial = MockSerial::new();
        serial.respond(&[0x22, 0x00, 0x08]);
        let mut drone = drone(serial);

        let volts = drone.read_battery_voltage().await.unwrap();
        assert!((volts - 3.0002).abs() < 1e-3);

        let serial = drone.disconnect().await.unwrap();
        assert_eq!(serial.written, [0x50, 0x02, 0x22, 0x00]);
    }

    #[tokio::test]
    async fn connect_calibrates_precision_gas() {
        init_logger();

        let mut serial = MockSerial::new();
        serial
            .respond(&[0x33, 0x01, 0x02, 0x05])
            .respond(&[0x40, 0xd0, 0x07, 0xe8, 0x03])
            .respond(&[0x20, 0x4c, 0x04, 0x07]);
        let mut drone = drone(serial);

        let info = drone.connect().await.unwrap();
        assert_eq!(info.hardware_version, 1);
        assert_eq!(drone.hardware_info(), Some(info));
        assert_eq!(
            drone.calibration(),
            Some(PrecisionGasCalibration {
                sensitivity: 2.0,
                baseline: 1000
            })
        );

        let ppm = drone.read_precision_gas().await.unwrap();
        let expected = (100.0 * 3.0e9 / 4096.0) / (2.0 * 2747.0);
        assert!((ppm - expected).abs() < 1e-9);

        let serial = drone.disconnect().await.unwrap();
        assert_eq!(
            serial.written,
            [0x50, 0x02, 0x33, 0x00, 0x50, 0x02, 0x40, 0x00, 0x50, 0x02, 0x20, 0x00]
        );
    }

    #[tokio::test]
    async fn precision_gas_requires_calibration() {
        init_logger();

        let mut serial = MockSerial::new();
        serial.respond(&[0x20, 0x4c, 0x04, 0x07]);
        let mut drone = drone(serial);

        assert_eq!(drone.read_precision_gas().await, Err(Error::NotCalibrated));
        let serial = drone.disconnect().await.unwrap();
        assert!(serial.written.is_empty());
        assert_eq!(serial.pending(), 1);
    }

    #[tokio::test]
    async fn enable_sequences_write_every_step() {
        init_logger();

        let mut serial = MockSerial::new();
        serial.acknowledge(4 + 2 + 4 + 3);
        let mut drone = drone(serial);

        drone.enable_rgbc().await.unwrap();
        drone.disable_rgbc().await.unwrap();
        drone.enable_altitude().await.unwrap();
        drone.enable_capacitance().await.unwrap();

        let serial = drone.disconnect().await.unwrap();
        let mut expected = frames(commands::RGBC_ENABLE);
        expected.extend(frames(commands::RGBC_DISABLE));
        expected.extend(frames(commands::PRESSURE_ENABLE));
        expected.extend(frames(commands::CAPACITANCE_ENABLE));
        assert_eq!(serial.written, expected);
        assert_eq!(serial.written[..5], [0x50, 0x03, 0x35, 0x01, 0x00]);
    }

    #[tokio::test]
    async fn failed_step_stops_sequence() {
        init_logger();

        let mut serial = MockSerial::new();
        serial.acknowledge(1).deliver(&[0xee]);
        let mut drone = drone(serial);

        assert_eq!(drone.enable_pressure().await, Err(Error::Desynchronized));
        assert_eq!(drone.link_state(), LinkState::Desynchronized);

        let serial = drone.disconnect().await.unwrap();
        assert_eq!(serial.written, frames(&commands::PRESSURE_ENABLE[..2]));
    }

    #[tokio::test]
    async fn pressure_and_altitude() {
        init_logger();

        let mut serial = MockSerial::new();
        // 25331 * 4 + 2 / 4 = 101324.5 Pa
        serial
            .respond(&[0x10, 0x62, 0xf3, 0x02])
            .respond(&[0x10, 0x62, 0xf3, 0x02]);
        let mut drone = drone(serial);

        assert_eq!(drone.read_pressure().await.unwrap(), 101_324.5);
        let meters = drone.read_altitude().await.unwrap();
        assert!(meters > 0.0 && meters < 1.0);

        let serial = drone.disconnect().await.unwrap();
        assert_eq!(serial.written[..7], [0x50, 0x05, 0x10, 0x00, 0x60, 0x01, 0x05]);
        assert_eq!(serial.written.len(), 14);
    }

    #[tokio::test]
    async fn ir_temperature_reads_object_then_die() {
        init_logger();

        let mut serial = MockSerial::new();
        serial
            .respond(&[0x10, 0xff, 0x44])
            .respond(&[0x10, 0x0c, 0x80]);
        let mut drone = drone(serial);

        let reading = drone.read_ir_temperature().await.unwrap();
        assert!((reading.celsius - 25.0).abs() < 0.05);

        let serial = drone.disconnect().await.unwrap();
        assert_eq!(
            serial.written,
            frames(&[commands::IR_OBJECT_READ, commands::IR_DIE_READ])
        );
    }

    #[tokio::test]
    async fn set_leds_frames_both_colors() {
        init_logger();

        let mut serial = MockSerial::new();
        serial.acknowledge(1);
        let mut drone = drone(serial);

        drone
            .set_leds(Rgb::new(255, 0, 0), Rgb::new(0, 0, 255))
            .await
            .unwrap();

        let serial = drone.disconnect().await.unwrap();
        assert_eq!(
            serial.written,
            [0x50, 0x08, 0x15, 0xff, 0x00, 0x00, 0x00, 0x00, 0xff, 0x00]
        );
    }

    #[tokio::test]
    async fn read_uart_strips_framing() {
        init_logger();

        let mut serial = MockSerial::new();
        serial.respond(&uart_reply(b"hello")).respond(&[0x25, 0x00, 0x00, 0x00]);
        let mut drone = drone(serial);

        assert_eq!(drone.read_uart().await.unwrap(), *b"hello");
        assert!(drone.read_uart().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn external_co2_accumulates_until_measurement() {
        init_logger();

        let mut serial = MockSerial::new();
        serial
            .acknowledge(2)
            .respond(&uart_reply(b""))
            .respond(&uart_reply(b"Z 00450 z 0"))
            .respond(&uart_reply(b"1234 05678\r\n"))
            .acknowledge(1)
            .respond(&uart_reply(b" z 00400 00500 "));
        let mut drone = drone(serial);

        assert_eq!(drone.read_external_co2().await.unwrap(), 3456.0);
        assert_eq!(drone.delay.calls, 2);
        assert_eq!(drone.read_external_co2().await.unwrap(), 450.0);

        let serial = drone.disconnect().await.unwrap();
        let setup = uart::write_command(uart::CO2_SETUP).unwrap().encode().unwrap();
        let measure = uart::write_command(uart::CO2_MEASURE).unwrap().encode().unwrap();
        let read = uart::READ_COMMAND.encode().unwrap();

        let mut expected = std::vec::Vec::new();
        expected.extend_from_slice(&setup);
        expected.extend_from_slice(&measure);
        for _ in 0..3 {
            expected.extend_from_slice(&read);
        }
        // Setup is only sent once per session.
        expected.extend_from_slice(&measure);
        expected.extend_from_slice(&read);
        assert_eq!(serial.written, expected);
    }

    #[tokio::test]
    async fn external_co2_found_at_start_of_long_reply() {
        init_logger();

        let mut text = b" z 00400 00500 ".to_vec();
        text.extend_from_slice(&[b'.'; 200]);
        let mut serial = MockSerial::new();
        serial.acknowledge(2).respond(&uart_reply(&text));
        let config = Config::default().uart_poll_attempts(Some(1));
        let mut drone = Sensordrone::new(serial, NoDelay::default(), config);

        assert_eq!(drone.read_external_co2().await, Ok(450.0));
    }

    #[tokio::test]
    async fn external_co2_gives_up_after_poll_budget() {
        init_logger();

        let mut serial = MockSerial::new();
        serial.acknowledge(2);
        for _ in 0..5 {
            serial.respond(&uart_reply(b"Z 00450 \r\n"));
        }
        let config = Config::default().uart_poll_attempts(Some(4));
        let mut drone = Sensordrone::new(serial, NoDelay::default(), config);

        assert_eq!(drone.read_external_co2().await, Err(Error::Timeout));
        assert_eq!(drone.link_state(), LinkState::Idle);

        let serial = drone.disconnect().await.unwrap();
        assert_eq!(serial.pending(), 1);
    }

    #[tokio::test]
    async fn unbounded_co2_polling_waits_for_measurement() {
        init_logger();

        let mut serial = MockSerial::new();
        serial.acknowledge(2);
        for _ in 0..200 {
            serial.respond(&uart_reply(b"\0\0"));
        }
        serial.respond(&uart_reply(b" z 00100 00200 "));
        let config = Config::default()
            .uart_poll_attempts(None)
            .uart_poll_interval_ms(0);
        let mut drone = Sensordrone::new(serial, NoDelay::default(), config);

        assert_eq!(drone.read_external_co2().await.unwrap(), 150.0);
        assert_eq!(drone.delay.calls, 0);
    }

    #[tokio::test]
    async fn transport_failure_surfaces_from_reads() {
        init_logger();

        let mut serial = MockSerial::new();
        serial.fail_writes = Some(embedded_io_async::ErrorKind::Other);
        let mut drone = drone(serial);

        let failed = Error::TransportFailed(embedded_io_async::ErrorKind::Other);
        assert_eq!(drone.read_humidity().await, Err(failed));
        assert_eq!(drone.connect().await, Err(failed));
    }
}
