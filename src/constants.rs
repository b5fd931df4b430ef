// COMMAND_HEAD is the byte that marks the beginning of a command frame sent to the device.
pub const COMMAND_HEAD: u8 = 0x50;

// RESPONSE_HEAD is the byte that marks the beginning of a response frame received from the device.
pub const RESPONSE_HEAD: u8 = 0x51;

// TERMINATOR closes most command frames.
pub const TERMINATOR: u8 = 0x00;

// Response header: head byte followed by the declared payload length.
pub const RESPONSE_HEADER_LEN: usize = 2;

// The length byte caps a response payload at 255 bytes.
pub const MAX_PAYLOAD_LEN: usize = u8::MAX as usize;

// Head, length, opcode, up to 253 payload bytes, terminator.
pub const MAX_COMMAND_LEN: usize = 3 + MAX_UART_WRITE_LEN + 1;

// Longest ASCII string a single UART write can carry (length byte = 2 + n).
pub const MAX_UART_WRITE_LEN: usize = u8::MAX as usize - 2;

// Opcodes understood by the firmware.
pub const OP_I2C_READ: u8 = 0x10;
pub const OP_I2C_WRITE: u8 = 0x11;
pub const OP_SET_LEDS: u8 = 0x15;
pub const OP_OXIDIZING_GAS_POWER: u8 = 0x18;
pub const OP_REDUCING_GAS_POWER: u8 = 0x19;
pub const OP_OXIDIZING_GAS_READ: u8 = 0x1c;
pub const OP_REDUCING_GAS_READ: u8 = 0x1d;
pub const OP_PRECISION_GAS_READ: u8 = 0x20;
pub const OP_ADC_READ: u8 = 0x21;
pub const OP_BATTERY_READ: u8 = 0x22;
pub const OP_UART_WRITE: u8 = 0x24;
pub const OP_UART_READ: u8 = 0x25;
pub const OP_HARDWARE_INFO: u8 = 0x33;
pub const OP_RGBC_POWER: u8 = 0x35;
pub const OP_PRECISION_GAS_CALIBRATION: u8 = 0x40;
pub const OP_RGBC_STATUS: u8 = 0x60;
