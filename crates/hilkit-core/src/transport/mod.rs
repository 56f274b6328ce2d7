//! Transport layer module.

pub mod mock;
pub mod nusb;
pub mod traits;

pub use mock::{MockBackend, MockTransport};
pub use nusb::{NusbBackend, NusbTransport};
pub use traits::{DeviceBackend, HidConnection, HidDeviceInfo, HidTransport, TransportError};
