//! Command frames transcribed from the device register map.
//!
//! I2C commands carry `bus, address, register, value` (writes) or
//! `bus, address, register, count` (reads).

use crate::constants::*;
use crate::frame::Command;

pub const HARDWARE_INFO: Command<'static> = Command::new(OP_HARDWARE_INFO, &[]);
pub const BATTERY_VOLTAGE: Command<'static> = Command::new(OP_BATTERY_READ, &[]);

pub const AMBIENT_TEMPERATURE: Command<'static> =
    Command::new(OP_I2C_READ, &[0x00, 0x40, 0xe3, 0x02]);
pub const HUMIDITY: Command<'static> = Command::new(OP_I2C_READ, &[0x00, 0x40, 0xe5, 0x02]);

pub const RGBC_ENABLE: &[Command<'static>] = &[
    Command::new(OP_RGBC_POWER, &[0x01]),
    Command::new(OP_I2C_WRITE, &[0x00, 0x39, 0x01, 0x80, 0x01]),
    Command::new(OP_I2C_WRITE, &[0x00, 0x39, 0x01, 0x81, 0x01]),
    Command::new(OP_I2C_WRITE, &[0x00, 0x39, 0x01, 0x80, 0x03]),
];
pub const RGBC_DISABLE: &[Command<'static>] = &[
    Command::new(OP_RGBC_POWER, &[0x00]),
    Command::new(OP_I2C_WRITE, &[0x00, 0x39, 0x01, 0x80, 0x00]),
];
pub const RGBC_STATUS: Command<'static> = Command::new(OP_RGBC_STATUS, &[0x01]);
pub const RGBC_READ: Command<'static> = Command::new(OP_I2C_READ, &[0x00, 0x39, 0x90, 0x08]);

pub const PRESSURE_ENABLE: &[Command<'static>] = &[
    Command::new(OP_I2C_WRITE, &[0x00, 0x60, 0x01, 0x26, 0x3f]),
    Command::new(OP_I2C_WRITE, &[0x00, 0x60, 0x01, 0x26, 0x38]),
    Command::new(OP_I2C_WRITE, &[0x00, 0x60, 0x01, 0x13, 0x07]),
    Command::new(OP_I2C_WRITE, &[0x00, 0x60, 0x01, 0x26, 0x39]),
];
pub const PRESSURE_DISABLE: &[Command<'static>] =
    &[Command::new(OP_I2C_WRITE, &[0x00, 0x60, 0x01, 0x26, 0x3f])];
// The firmware expects this one without a terminator.
pub const PRESSURE_READ: Command<'static> =
    Command::unterminated(OP_I2C_READ, &[0x00, 0x60, 0x01, 0x05]);

pub const IR_TEMPERATURE_ENABLE: &[Command<'static>] =
    &[Command::new(OP_I2C_WRITE, &[0x00, 0x41, 0x01, 0x02, 0x75])];
pub const IR_TEMPERATURE_DISABLE: &[Command<'static>] =
    &[Command::new(OP_I2C_WRITE, &[0x00, 0x41, 0x01, 0x02, 0x00])];
pub const IR_OBJECT_READ: Command<'static> = Command::new(OP_I2C_READ, &[0x00, 0x41, 0x00, 0x02]);
pub const IR_DIE_READ: Command<'static> = Command::new(OP_I2C_READ, &[0x00, 0x41, 0x01, 0x02]);

pub const PRECISION_GAS_CALIBRATION: Command<'static> =
    Command::new(OP_PRECISION_GAS_CALIBRATION, &[]);
pub const PRECISION_GAS_READ: Command<'static> = Command::new(OP_PRECISION_GAS_READ, &[]);

pub const OXIDIZING_GAS_ENABLE: &[Command<'static>] =
    &[Command::new(OP_OXIDIZING_GAS_POWER, &[0x84])];
pub const OXIDIZING_GAS_DISABLE: &[Command<'static>] =
    &[Command::new(OP_OXIDIZING_GAS_POWER, &[0x00])];
pub const OXIDIZING_GAS_READ: Command<'static> = Command::new(OP_OXIDIZING_GAS_READ, &[]);

pub const REDUCING_GAS_ENABLE: &[Command<'static>] =
    &[Command::new(OP_REDUCING_GAS_POWER, &[0xba])];
pub const REDUCING_GAS_DISABLE: &[Command<'static>] =
    &[Command::new(OP_REDUCING_GAS_POWER, &[0x00])];
pub const REDUCING_GAS_READ: Command<'static> = Command::new(OP_REDUCING_GAS_READ, &[]);

pub const ADC_READ: Command<'static> = Command::new(OP_ADC_READ, &[]);

pub const CAPACITANCE_ENABLE: &[Command<'static>] = &[
    Command::new(OP_I2C_WRITE, &[0x01, 0x48, 0x01, 0x0f, 0x11]),
    Command::new(OP_I2C_WRITE, &[0x01, 0x48, 0x01, 0x05, 0x30, 0x00]),
    Command::new(OP_I2C_WRITE, &[0x01, 0x48, 0x01, 0x0b, 0xc0]),
];
pub const CAPACITANCE_DISABLE: &[Command<'static>] =
    &[Command::new(OP_I2C_WRITE, &[0x01, 0x48, 0x01, 0x0f, 0x00])];
pub const CAPACITANCE_READ: Command<'static> =
    Command::new(OP_I2C_READ, &[0x01, 0x48, 0x00, 0x03]);
