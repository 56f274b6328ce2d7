//! HID transport layer abstraction.
//!
//! Defines the `HidTransport` trait for report-based device communication,
//! allowing different implementations (nusb, mock, etc.).

use std::time::Duration;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum TransportError {
    #[error("No device at path {0}")]
    PathNotFound(String),

    #[error("Failed to enumerate devices: {0}")]
    EnumerationFailed(String),

    #[error("Failed to open device: {0}")]
    OpenFailed(String),

    #[error("Failed to claim interface {interface}: {message}")]
    ClaimInterfaceFailed { interface: u8, message: String },

    #[error("Endpoint not found: type={ep_type}, direction={direction}")]
    EndpointNotFound { ep_type: String, direction: String },

    #[error("Write failed: {0}")]
    WriteFailed(String),

    #[error("Read failed: {0}")]
    ReadFailed(String),

    #[error("Device disconnected")]
    Disconnected,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Enumeration entry for an attached HID device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HidDeviceInfo {
    pub vendor_id: u16,
    pub product_id: u16,
    pub serial_number: Option<String>,
    /// Backend specific location, stable while the device stays plugged in.
    pub path: String,
}

/// An open device handle. Dropping it closes the device.
pub trait HidConnection {
    /// Write one output report.
    fn write(&self, data: &[u8]) -> Result<usize, TransportError>;

    /// Read one input report, `None` if nothing arrived within `timeout`.
    fn read(&self, max_len: usize, timeout: Duration) -> Result<Option<Vec<u8>>, TransportError>;
}

/// Abstract HID transport bound to one resolved device.
///
/// The device is not held open: every exchange calls [`HidTransport::open`]
/// and drops the connection when done.
pub trait HidTransport: Send + Sync {
    /// Open the device for a single exchange.
    fn open(&self) -> Result<Box<dyn HidConnection + '_>, TransportError>;

    /// Get the current VID.
    fn vendor_id(&self) -> u16;

    /// Get the current PID.
    fn product_id(&self) -> u16;

    /// Backend path of the device.
    fn path(&self) -> &str;

    /// Serial number string reported by the device.
    fn serial_number(&self) -> Result<Option<String>, TransportError>;
}

/// Source of devices: enumeration and binding a transport to a path.
pub trait DeviceBackend {
    type Transport: HidTransport;

    /// List every attached HID device.
    fn enumerate(&self) -> Result<Vec<HidDeviceInfo>, TransportError>;

    /// Bind a transport to the device at `path`.
    fn connect(&self, path: &str) -> Result<Self::Transport, TransportError>;
}
