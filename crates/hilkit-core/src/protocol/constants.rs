//! Protocol constants for the Yepkit device family.
//!
//! Values match the Yepkit YKUSH/YKUR command references.

// ============================================================================
// Device Identification
// ============================================================================

/// Microchip Technology vendor id used by every Yepkit device
pub const YEPKIT_VENDOR_ID: u16 = 0x04D8;

/// YKUR relay board
pub const YKUR_PRODUCT_ID: u16 = 0xF1CB;

/// All YKUR PIDs for device discovery
pub const YKUR_PIDS: &[u16] = &[YKUR_PRODUCT_ID];

/// YKUSH beta
pub const YKUSH_BETA_PID: u16 = 0x0042;
/// YKUSH
pub const YKUSH_PID: u16 = 0xF2F7;
/// YKUSH3
pub const YKUSH3_PID: u16 = 0xF11B;
/// YKUSHXS (single downstream port)
pub const YKUSHXS_PID: u16 = 0xF0CD;

/// All YKUSH PIDs in normal operation mode
pub const YKUSH_PIDS: &[u16] = &[YKUSH_BETA_PID, YKUSH_PID, YKUSH3_PID, YKUSHXS_PID];

// ============================================================================
// USB Communication
// ============================================================================

/// Read timeout for a single exchange.
pub const USB_TIMEOUT_MS: u64 = 1000;

/// HID report size.
pub const USB_PACKET_SIZE: usize = 64;

/// Bytes of the response the protocols actually use.
pub const USB_PACKET_PAYLOAD_SIZE: usize = 20;

/// Fill byte of the sentinel payload returned for absent or short responses.
pub const SENTINEL_BYTE: u8 = 0xFF;

// ============================================================================
// YKUR (relay board) protocol
// ============================================================================

pub const YKUR_SET_ON: u8 = 0x01;
pub const YKUR_SET_OFF: u8 = 0x02;
pub const YKUR_GET_STATE: u8 = 0x03;

/// Status byte of an accepted command
pub const YKUR_PROTO_OK: u8 = 0xFF;
/// Status byte of a rejected command
pub const YKUR_PROTO_ERROR: u8 = 0xAA;
/// State byte reported when the relay state is unknown
pub const YKUR_PORT_STATE_ERROR: u8 = 0xAA;

/// External relays on the board (the on-board relay is port 0).
pub const YKUR_EXTERNAL_RELAYS: u8 = 4;

pub const YKUR_TARGET_ON_BOARD: u8 = 0x11;
pub const YKUR_TARGET_EXTERNAL_RELAYS: u8 = 0x0A;
pub const YKUR_TARGET_ALL: u8 = 0xAA;

// ============================================================================
// YKUSH (power hub) protocol
// ============================================================================

/// Status byte of an accepted command
pub const YKUSH_PROTO_OK_STATUS: u8 = 1;

/// Port state bytes above this value mean the port is powered.
pub const YKUSH_PORT_ON_THRESHOLD: u8 = 0x10;

pub const YKUSH_PORT_ON: u8 = 0x10;
pub const YKUSH_PORT_OFF: u8 = 0x00;
pub const YKUSH_PORT_STATE: u8 = 0x20;
pub const YKUSH_ALL_ON: u8 = 0x1A;
pub const YKUSH_ALL_OFF: u8 = 0x0A;
pub const YKUSH_ALL_STATE: u8 = 0x2A;
pub const YKUSH_FIRMWARE_VERSION: u8 = 0xF0;

pub const YKUSH_PORT_COUNT: u8 = 3;
pub const YKUSHXS_PORT_COUNT: u8 = 1;
