//! nusb-based HID transport implementation.
//!
//! Yepkit devices expose one HID interface with an interrupt IN and an
//! interrupt OUT endpoint; reports are exchanged on those directly.

use std::io::{ErrorKind, Read, Write};
use std::time::Duration;

use nusb::transfer::{Direction, In, Interrupt, Out};
use nusb::{Interface, MaybeFuture, list_devices};
use tracing::{debug, info, instrument};

use super::traits::{DeviceBackend, HidConnection, HidDeviceInfo, HidTransport, TransportError};

const HID_INTERFACE: u8 = 0;
const REPORT_BUFFER: usize = 64;

/// Enumerates devices through nusb.
#[derive(Debug, Default, Clone, Copy)]
pub struct NusbBackend;

fn device_path(device_info: &nusb::DeviceInfo) -> String {
    format!("{}-{}", device_info.bus_id(), device_info.device_address())
}

fn find_device_info(path: &str) -> Result<nusb::DeviceInfo, TransportError> {
    list_devices()
        .wait()
        .map_err(|e| TransportError::EnumerationFailed(e.to_string()))?
        .find(|d| device_path(d) == path)
        .ok_or_else(|| TransportError::PathNotFound(path.to_string()))
}

impl DeviceBackend for NusbBackend {
    type Transport = NusbTransport;

    #[instrument(level = "debug", skip(self))]
    fn enumerate(&self) -> Result<Vec<HidDeviceInfo>, TransportError> {
        let devices = list_devices()
            .wait()
            .map_err(|e| TransportError::EnumerationFailed(e.to_string()))?
            .map(|d| HidDeviceInfo {
                vendor_id: d.vendor_id(),
                product_id: d.product_id(),
                serial_number: d.serial_number().map(str::to_string),
                path: device_path(&d),
            })
            .collect::<Vec<_>>();
        debug!(count = devices.len(), "Enumerated USB devices");
        Ok(devices)
    }

    #[instrument(level = "info", skip(self))]
    fn connect(&self, path: &str) -> Result<NusbTransport, TransportError> {
        let device_info = find_device_info(path)?;
        info!(
            vendor_id = %format!("{:04X}", device_info.vendor_id()),
            product_id = %format!("{:04X}", device_info.product_id()),
            path = %path,
            "Found device"
        );
        Ok(NusbTransport {
            path: path.to_string(),
            vid: device_info.vendor_id(),
            pid: device_info.product_id(),
            serial: device_info.serial_number().map(str::to_string),
        })
    }
}

/// nusb-based HID transport, bound to one device path.
pub struct NusbTransport {
    path: String,
    vid: u16,
    pid: u16,
    serial: Option<String>,
}

/// Claimed HID interface; released when dropped.
struct NusbConnection {
    interface: Interface,
    in_endpoint: u8,
    out_endpoint: u8,
}

impl HidTransport for NusbTransport {
    #[instrument(level = "trace", skip(self), fields(path = %self.path))]
    fn open(&self) -> Result<Box<dyn HidConnection + '_>, TransportError> {
        let device = find_device_info(&self.path)?
            .open()
            .wait()
            .map_err(|e| TransportError::OpenFailed(e.to_string()))?;

        let interface = device
            .detach_and_claim_interface(HID_INTERFACE)
            .wait()
            .map_err(|e| TransportError::ClaimInterfaceFailed {
                interface: HID_INTERFACE,
                message: e.to_string(),
            })?;

        // Find INTERRUPT endpoints
        let mut in_endpoint: u8 = 0;
        let mut out_endpoint: u8 = 0;

        for config in device.configurations() {
            for iface in config.interfaces() {
                if iface.interface_number() == HID_INTERFACE {
                    for alt in iface.alt_settings() {
                        for ep in alt.endpoints() {
                            if ep.transfer_type() == nusb::descriptors::TransferType::Interrupt {
                                if ep.direction() == Direction::In {
                                    in_endpoint = ep.address();
                                } else {
                                    out_endpoint = ep.address();
                                }
                            }
                        }
                    }
                }
            }
        }

        if in_endpoint == 0 {
            return Err(TransportError::EndpointNotFound {
                ep_type: "Interrupt".into(),
                direction: "In".into(),
            });
        }
        if out_endpoint == 0 {
            return Err(TransportError::EndpointNotFound {
                ep_type: "Interrupt".into(),
                direction: "Out".into(),
            });
        }

        Ok(Box::new(NusbConnection {
            interface,
            in_endpoint,
            out_endpoint,
        }))
    }

    fn vendor_id(&self) -> u16 {
        self.vid
    }

    fn product_id(&self) -> u16 {
        self.pid
    }

    fn path(&self) -> &str {
        &self.path
    }

    fn serial_number(&self) -> Result<Option<String>, TransportError> {
        Ok(self.serial.clone())
    }
}

impl HidConnection for NusbConnection {
    #[instrument(skip(self, data), fields(len = data.len()))]
    fn write(&self, data: &[u8]) -> Result<usize, TransportError> {
        let ep = self
            .interface
            .endpoint::<Interrupt, Out>(self.out_endpoint)
            .map_err(|e| TransportError::WriteFailed(e.to_string()))?;

        let mut writer = ep.writer(REPORT_BUFFER);
        writer
            .write_all(data)
            .map_err(|e| TransportError::WriteFailed(e.to_string()))?;
        writer
            .flush()
            .map_err(|e| TransportError::WriteFailed(e.to_string()))?;

        debug!(bytes_written = data.len(), "Write complete");
        Ok(data.len())
    }

    #[instrument(skip(self), fields(max_len))]
    fn read(&self, max_len: usize, timeout: Duration) -> Result<Option<Vec<u8>>, TransportError> {
        let ep = self
            .interface
            .endpoint::<Interrupt, In>(self.in_endpoint)
            .map_err(|e| TransportError::ReadFailed(e.to_string()))?;

        let mut reader = ep.reader(REPORT_BUFFER).with_read_timeout(timeout);
        let mut buf = vec![0u8; max_len];

        let n = match reader.read(&mut buf) {
            Ok(n) => n,
            Err(e) if e.kind() == ErrorKind::TimedOut => {
                debug!(timeout_ms = timeout.as_millis() as u64, "Read timed out");
                return Ok(None);
            }
            Err(e) => return Err(TransportError::ReadFailed(e.to_string())),
        };

        buf.truncate(n);
        debug!(bytes_read = n, "Read complete");
        Ok(Some(buf))
    }
}
