//! Conversion of response payloads into calibrated readings.
//!
//! Every function here is pure. Offsets are relative to the payload, i.e.
//! after the two response header bytes; byte 0 of most payloads is a status
//! byte and the sensor data starts at offset 1.

use libm::{pow, sqrt};
use log::debug;

use crate::error::Error;

/// A temperature in the three scales callers tend to want.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Temperature {
    pub celsius: f64,
    pub kelvin: f64,
    pub fahrenheit: f64,
}

impl Temperature {
    pub fn from_celsius(celsius: f64) -> Self {
        Self {
            celsius,
            kelvin: celsius + 273.15,
            fahrenheit: celsius * (9.0 / 5.0) + 32.0,
        }
    }

    pub fn from_kelvin(kelvin: f64) -> Self {
        let celsius = kelvin - 273.15;
        Self {
            celsius,
            kelvin,
            fahrenheit: celsius * (9.0 / 5.0) + 32.0,
        }
    }
}

/// A single sample of the RGBC light sensor.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RgbcReading {
    /// Calibrated red channel.
    pub red: f64,
    /// Calibrated green channel.
    pub green: f64,
    /// Calibrated blue channel.
    pub blue: f64,
    /// Calibrated clear channel.
    pub clear: f64,
    /// Illuminance (CIE Y), never negative.
    pub lux: f64,
    /// Correlated color temperature in kelvin.
    pub color_temperature: f64,
}

/// Per-device constants of the precision gas (CO) sensor.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PrecisionGasCalibration {
    /// Sensitivity in nA/ppm.
    pub sensitivity: f64,
    /// ADC reading in clean air.
    pub baseline: u16,
}

/// Hardware and firmware identification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HardwareInfo {
    pub hardware_version: u8,
    pub firmware_version: u8,
    pub firmware_revision: u8,
}

// Feedback resistor for each gain stage of the precision gas amplifier (ohms).
const PRECISION_GAS_GAIN: [f64; 8] = [
    2_200_000.0,
    301_961.0,
    113_793.0,
    34_452.0,
    13_911.0,
    6_978.0,
    3_494.0,
    2_747.0,
];

// Load resistors of the oxidizing and reducing gas dividers (ohms).
const OXIDIZING_LOAD: f64 = 18_000.0;
const REDUCING_LOAD: f64 = 270_000.0;

// RGBC channel correction factors.
const RED_CAL: f64 = 0.2639626007;
const GREEN_CAL: f64 = 0.2935368922;
const BLUE_CAL: f64 = 0.379682891;
const CLEAR_CAL: f64 = 0.2053011829;

// Thermopile coefficients.
const IR_A1: f64 = 1.75e-3;
const IR_A2: f64 = -1.678e-5;
const IR_B0: f64 = -2.94e-5;
const IR_B1: f64 = -5.7e-7;
const IR_B2: f64 = 4.63e-9;
const IR_C2: f64 = 13.4;
const IR_S0: f64 = 2.51e-14;
const IR_T_REF: f64 = 298.15;

fn byte(payload: &[u8], offset: usize) -> Result<u8, Error> {
    payload.get(offset).copied().ok_or(Error::ShortPayload {
        expected: offset + 1,
        actual: payload.len(),
    })
}

fn pair(payload: &[u8], offset: usize) -> Result<[u8; 2], Error> {
    match payload.get(offset..offset + 2) {
        Some(&[a, b]) => Ok([a, b]),
        _ => Err(Error::ShortPayload {
            expected: offset + 2,
            actual: payload.len(),
        }),
    }
}

fn u16_le(payload: &[u8], offset: usize) -> Result<u16, Error> {
    pair(payload, offset).map(u16::from_le_bytes)
}

fn u16_be(payload: &[u8], offset: usize) -> Result<u16, Error> {
    pair(payload, offset).map(u16::from_be_bytes)
}

fn i16_be(payload: &[u8], offset: usize) -> Result<i16, Error> {
    pair(payload, offset).map(i16::from_be_bytes)
}

// 12-bit ADC referenced to 3.3 V.
fn adc_to_volts(adc: u16) -> f64 {
    (adc as f64 / 4095.0) * 3.3
}

pub fn hardware_info(payload: &[u8]) -> Result<HardwareInfo, Error> {
    Ok(HardwareInfo {
        hardware_version: byte(payload, 1)?,
        firmware_version: byte(payload, 2)?,
        firmware_revision: byte(payload, 3)?,
    })
}

/// Battery voltage in volts (the battery is read through a 6 V scaled divider).
pub fn battery_voltage(payload: &[u8]) -> Result<f64, Error> {
    let adc = u16_le(payload, 1)?;
    Ok((adc as f64 / 4095.0) * 6.0)
}

/// Ambient temperature from the humidity/temperature sensor.
///
/// The two low bits of the raw reading are status bits and are masked off.
pub fn ambient_temperature(payload: &[u8]) -> Result<Temperature, Error> {
    let adc = u16_be(payload, 1)? & 0xfffc;
    let celsius = -46.85 + 175.72 * (adc as f64 / 65536.0);
    debug!("Ambient temperature: adc {:#06x}, {} C", adc, celsius);
    Ok(Temperature::from_celsius(celsius))
}

/// Relative humidity in percent.
pub fn humidity(payload: &[u8]) -> Result<f64, Error> {
    let adc = u16_be(payload, 1)? & 0xfffc;
    Ok(-6.0 + 125.0 * (adc as f64 / 65536.0))
}

/// McCamy's approximation of correlated color temperature from chromaticity.
pub fn correlated_color_temperature(x: f64, y: f64) -> f64 {
    let n = (x - 0.3320) / (0.1858 - y);
    449.0 * pow(n, 3.0) + 3525.0 * pow(n, 2.0) + 6823.3 * n + 5520.33
}

/// Light sensor sample: channels are little-endian G, R, B, C from offset 1.
pub fn rgbc(payload: &[u8]) -> Result<RgbcReading, Error> {
    let mut green = u16_le(payload, 1)? as f64;
    let mut red = u16_le(payload, 3)? as f64;
    let mut blue = u16_le(payload, 5)? as f64;
    let mut clear = u16_le(payload, 7)? as f64;

    red += red * RED_CAL;
    green += green * GREEN_CAL;
    blue += blue * BLUE_CAL;
    clear += clear * CLEAR_CAL;

    let x_tri = -0.14282 * red + 1.54924 * green + -0.95641 * blue;
    let y_tri = -0.32466 * red + 1.57837 * green + -0.73191 * blue;
    let z_tri = -0.68202 * red + 0.77073 * green + 0.56332 * blue;

    let sum = x_tri + y_tri + z_tri;
    let color_temperature = correlated_color_temperature(x_tri / sum, y_tri / sum);

    Ok(RgbcReading {
        red,
        green,
        blue,
        clear,
        lux: y_tri.max(0.0),
        color_temperature,
    })
}

/// Status word of the light sensor.
pub fn rgbc_status(payload: &[u8]) -> Result<u16, Error> {
    u16_le(payload, 0)
}

/// Barometric pressure in pascals.
///
/// Offset 1 holds the big-endian integer part in units of 4 Pa; offset 3
/// carries two more integer bits (mask `0x0c`) and two fractional bits
/// (mask `0x03`, quarter pascals).
pub fn pressure(payload: &[u8]) -> Result<f64, Error> {
    let int_value = u16_be(payload, 1)? as f64;
    let status = byte(payload, 3)?;
    let int_bits = (status & 0x0c) as f64;
    let dec_bits = (status & 0x03) as f64;
    Ok(int_value * 4.0 + int_bits + dec_bits / 4.0)
}

/// Altitude in meters for a pressure in pascals, against a 101326 Pa sea level.
pub fn altitude(pascals: f64) -> f64 {
    (1.0 - pow(pascals / 101_326.0, 0.1902632)) * 44_330.77
}

/// Object temperature from the thermopile.
///
/// # Arguments
///
/// * `object` - Response to the sensor voltage register read.
/// * `die` - Response to the die temperature register read.
///
/// Both registers are signed big-endian values at offset 1.
pub fn ir_temperature(object: &[u8], die: &[u8]) -> Result<Temperature, Error> {
    let v_obj = i16_be(object, 1)? as f64;
    let t_die = i16_be(die, 1)? as f64;

    let die_kelvin = t_die / (32.0 * 4.0) + 273.15;
    let object_volts = v_obj * 156.25e-9;

    let dt = die_kelvin - IR_T_REF;
    let v_os = IR_B0 + IR_B1 * dt + IR_B2 * pow(dt, 2.0);
    let sensitivity = IR_S0 * (1.0 + IR_A1 * dt + IR_A2 * pow(dt, 2.0));
    let f_vobj = (object_volts - v_os) + IR_C2 * pow(object_volts - v_os, 2.0);
    let kelvin = sqrt(sqrt(pow(die_kelvin, 4.0) + f_vobj / sensitivity));

    debug!(
        "IR temperature: die {} K, object {} V, result {} K",
        die_kelvin, object_volts, kelvin
    );
    Ok(Temperature::from_kelvin(kelvin))
}

pub fn precision_gas_calibration(payload: &[u8]) -> Result<PrecisionGasCalibration, Error> {
    Ok(PrecisionGasCalibration {
        sensitivity: u16_le(payload, 1)? as f64 / 1000.0,
        baseline: u16_le(payload, 3)?,
    })
}

/// Carbon monoxide concentration in ppm, never negative.
///
/// The payload carries the little-endian ADC at offset 1 and the amplifier
/// gain stage at offset 3. A calibration with zero sensitivity is treated as
/// missing.
pub fn precision_gas(
    payload: &[u8],
    calibration: &PrecisionGasCalibration,
) -> Result<f64, Error> {
    if calibration.sensitivity == 0.0 {
        log::error!("Precision gas calibration has zero sensitivity");
        return Err(Error::NotCalibrated);
    }
    let adc = u16_le(payload, 1)?;
    let stage = byte(payload, 3)?;
    let gain = *PRECISION_GAS_GAIN
        .get(stage as usize)
        .ok_or(Error::InvalidGainStage(stage))?;

    let delta = adc as f64 - calibration.baseline as f64;
    let response = if delta < 0.0 {
        0.0
    } else {
        delta * 3.0e9 / 4096.0
    };
    Ok(response / (calibration.sensitivity * gain))
}

// Sensor resistance of a gas sensor on the low side of a 3.3 V divider.
fn divider_resistance(adc: u16, load: f64) -> f64 {
    load * 3.3 / adc_to_volts(adc) - load
}

/// Oxidizing gas sensor resistance in ohms.
pub fn oxidizing_gas(payload: &[u8]) -> Result<f64, Error> {
    Ok(divider_resistance(u16_le(payload, 1)?, OXIDIZING_LOAD))
}

/// Reducing gas sensor resistance in ohms.
pub fn reducing_gas(payload: &[u8]) -> Result<f64, Error> {
    Ok(divider_resistance(u16_le(payload, 1)?, REDUCING_LOAD))
}

/// Voltage on the external ADC pin.
pub fn adc_voltage(payload: &[u8]) -> Result<f64, Error> {
    u16_le(payload, 1).map(adc_to_volts)
}

/// Capacitance in femtofarads.
pub fn capacitance(payload: &[u8]) -> Result<f64, Error> {
    let adc = u16_be(payload, 2)?;
    Ok((adc as f64 / 65520.0) * 4000.0)
}
