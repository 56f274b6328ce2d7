//! Device discovery for the Yepkit family.
//!
//! Resolution is two explicit steps: enumerate-then-select (skipped when the
//! caller already knows the path), then validate the path by opening and
//! closing it once.

use tracing::{debug, info, instrument};

use crate::protocol::constants::YEPKIT_VENDOR_ID;
use crate::transport::{DeviceBackend, HidDeviceInfo, HidTransport};
use crate::yepkit::YepkitError;

/// Pick a device among `devices` by vendor id, candidate PIDs and optional serial.
///
/// Without a serial the first match wins.
pub fn select_device<'a>(
    devices: &'a [HidDeviceInfo],
    candidate_pids: &[u16],
    serial: Option<&str>,
) -> Result<&'a HidDeviceInfo, YepkitError> {
    let candidates: Vec<&HidDeviceInfo> = devices
        .iter()
        .filter(|d| d.vendor_id == YEPKIT_VENDOR_ID && candidate_pids.contains(&d.product_id))
        .collect();

    if candidates.is_empty() {
        return Err(YepkitError::DeviceNotFound(
            "Could not connect to a device, no device was found.".into(),
        ));
    }

    let Some(serial) = serial else {
        return Ok(candidates[0]);
    };

    candidates
        .iter()
        .find(|d| d.serial_number.as_deref() == Some(serial))
        .copied()
        .ok_or_else(|| {
            let found: Vec<&str> = candidates
                .iter()
                .filter_map(|d| d.serial_number.as_deref())
                .collect();
            YepkitError::DeviceNotFound(format!(
                "The serial numbers available are : {found:?}\n\
                 No device was found with the serial number {serial}"
            ))
        })
}

/// Resolve a device and bind a transport to it.
///
/// With an explicit `path` the enumeration step is skipped.
#[instrument(level = "info", skip(backend), fields(pids = ?candidate_pids))]
pub fn find_device<B: DeviceBackend>(
    backend: &B,
    candidate_pids: &[u16],
    serial: Option<&str>,
    path: Option<&str>,
) -> Result<B::Transport, YepkitError> {
    let path = match path {
        Some(path) => path.to_string(),
        None => {
            let devices = backend.enumerate()?;
            let selected = select_device(&devices, candidate_pids, serial)?;
            debug!(
                product_id = %format!("{:04X}", selected.product_id),
                serial = ?selected.serial_number,
                "Selected device"
            );
            selected.path.clone()
        }
    };

    let transport = backend.connect(&path)?;
    // Reachability check only, the handle is not kept.
    drop(transport.open()?);

    info!(
        product_id = %format!("{:04X}", transport.product_id()),
        path = %transport.path(),
        "Device resolved"
    );
    Ok(transport)
}
