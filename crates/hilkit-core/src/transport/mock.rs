//! Mock HID transport for testing.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use super::traits::{DeviceBackend, HidConnection, HidDeviceInfo, HidTransport, TransportError};
use crate::protocol::constants::{USB_PACKET_SIZE, YEPKIT_VENDOR_ID, YKUR_PRODUCT_ID};

#[derive(Debug, Default)]
struct MockState {
    /// Queued reports to return on read.
    responses: VecDeque<Vec<u8>>,
    /// Captured writes.
    write_log: Vec<Vec<u8>>,
    opens: usize,
    closes: usize,
    /// Whether device is "connected".
    connected: bool,
    fail_writes: bool,
}

/// Mock transport for unit testing protocol logic.
///
/// Clones share the same queue and logs, so a test can keep one handle
/// while a driver owns another.
#[derive(Clone, Debug)]
pub struct MockTransport {
    state: Arc<Mutex<MockState>>,
    /// Simulated VID/PID.
    vid: u16,
    pid: u16,
    path: String,
    serial: Option<String>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(MockState {
                connected: true,
                ..Default::default()
            })),
            vid: YEPKIT_VENDOR_ID,
            pid: YKUR_PRODUCT_ID,
            path: "mock-1-1".into(),
            serial: None,
        }
    }

    /// Queue a full report: `bytes` followed by zero padding, as a device sends it.
    pub fn queue_response(&self, bytes: &[u8]) {
        let mut report = bytes.to_vec();
        if report.len() < USB_PACKET_SIZE {
            report.resize(USB_PACKET_SIZE, 0);
        }
        self.queue_raw(&report);
    }

    /// Queue a report exactly as given (useful for short reads).
    pub fn queue_raw(&self, bytes: &[u8]) {
        self.state.lock().unwrap().responses.push_back(bytes.to_vec());
    }

    /// Get all captured writes.
    pub fn get_writes(&self) -> Vec<Vec<u8>> {
        self.state.lock().unwrap().write_log.clone()
    }

    /// First byte of every captured write, i.e. the command opcodes.
    pub fn get_commands(&self) -> Vec<u8> {
        self.state
            .lock()
            .unwrap()
            .write_log
            .iter()
            .filter_map(|w| w.first().copied())
            .collect()
    }

    /// Clear captured writes.
    pub fn clear_writes(&self) {
        self.state.lock().unwrap().write_log.clear();
    }

    pub fn open_count(&self) -> usize {
        self.state.lock().unwrap().opens
    }

    pub fn close_count(&self) -> usize {
        self.state.lock().unwrap().closes
    }

    /// Number of reports still queued.
    pub fn pending_responses(&self) -> usize {
        self.state.lock().unwrap().responses.len()
    }

    /// Simulate device disconnect.
    pub fn disconnect(&self) {
        self.state.lock().unwrap().connected = false;
    }

    /// Simulate device reconnect.
    pub fn reconnect(&self) {
        self.state.lock().unwrap().connected = true;
    }

    /// Make every write fail after the device was opened.
    pub fn fail_writes(&self, fail: bool) {
        self.state.lock().unwrap().fail_writes = fail;
    }

    /// Set VID/PID.
    pub fn set_ids(&mut self, vid: u16, pid: u16) {
        self.vid = vid;
        self.pid = pid;
    }

    pub fn set_path(&mut self, path: impl Into<String>) {
        self.path = path.into();
    }

    pub fn set_serial(&mut self, serial: Option<&str>) {
        self.serial = serial.map(str::to_string);
    }
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

struct MockConnection<'a> {
    state: &'a Mutex<MockState>,
}

impl HidConnection for MockConnection<'_> {
    fn write(&self, data: &[u8]) -> Result<usize, TransportError> {
        let mut state = self.state.lock().unwrap();
        if state.fail_writes {
            return Err(TransportError::WriteFailed("simulated failure".into()));
        }
        state.write_log.push(data.to_vec());
        Ok(data.len())
    }

    fn read(&self, max_len: usize, _timeout: Duration) -> Result<Option<Vec<u8>>, TransportError> {
        let mut state = self.state.lock().unwrap();
        Ok(state.responses.pop_front().map(|mut report| {
            report.truncate(max_len);
            report
        }))
    }
}

impl Drop for MockConnection<'_> {
    fn drop(&mut self) {
        self.state.lock().unwrap().closes += 1;
    }
}

impl HidTransport for MockTransport {
    fn open(&self) -> Result<Box<dyn HidConnection + '_>, TransportError> {
        let mut state = self.state.lock().unwrap();
        if !state.connected {
            return Err(TransportError::Disconnected);
        }
        state.opens += 1;
        Ok(Box::new(MockConnection { state: &self.state }))
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

/// Mock enumeration backend handing out clones of one [`MockTransport`].
pub struct MockBackend {
    pub devices: Vec<HidDeviceInfo>,
    pub transport: MockTransport,
}

impl MockBackend {
    pub fn new(devices: Vec<HidDeviceInfo>) -> Self {
        Self {
            devices,
            transport: MockTransport::new(),
        }
    }
}

impl DeviceBackend for MockBackend {
    type Transport = MockTransport;

    fn enumerate(&self) -> Result<Vec<HidDeviceInfo>, TransportError> {
        Ok(self.devices.clone())
    }

    fn connect(&self, path: &str) -> Result<MockTransport, TransportError> {
        let info = self
            .devices
            .iter()
            .find(|d| d.path == path)
            .ok_or_else(|| TransportError::PathNotFound(path.to_string()))?;
        let mut transport = self.transport.clone();
        transport.set_ids(info.vendor_id, info.product_id);
        transport.set_path(&info.path);
        transport.set_serial(info.serial_number.as_deref());
        Ok(transport)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_response_queue() {
        let mock = MockTransport::new();
        mock.queue_response(&[0x01, 0x02]);
        mock.queue_raw(&[0x03]);

        let conn = mock.open().unwrap();
        let first = conn.read(64, Duration::ZERO).unwrap().unwrap();
        assert_eq!(first.len(), USB_PACKET_SIZE);
        assert_eq!(&first[..2], &[0x01, 0x02]);
        assert_eq!(conn.read(64, Duration::ZERO).unwrap(), Some(vec![0x03]));

        // Queue is empty now
        assert_eq!(conn.read(64, Duration::ZERO).unwrap(), None);
    }

    #[test]
    fn test_mock_write_capture() {
        let mock = MockTransport::new();
        {
            let conn = mock.open().unwrap();
            conn.write(b"Hello").unwrap();
            conn.write(b"World").unwrap();
        }

        let writes = mock.get_writes();
        assert_eq!(writes.len(), 2);
        assert_eq!(writes[0], b"Hello");
        assert_eq!(writes[1], b"World");
        assert_eq!(mock.close_count(), 1);

        mock.clear_writes();
        assert!(mock.get_writes().is_empty());
        assert!(mock.get_commands().is_empty());
    }

    #[test]
    fn test_mock_disconnect() {
        let mock = MockTransport::new();
        mock.disconnect();
        assert!(mock.open().is_err());
        assert_eq!(mock.open_count(), 0);

        mock.reconnect();
        assert!(mock.open().is_ok());
    }

    #[test]
    fn test_backend_connect_sets_identity() {
        let backend = MockBackend::new(vec![HidDeviceInfo {
            vendor_id: YEPKIT_VENDOR_ID,
            product_id: 0xF0CD,
            serial_number: Some("YKX001".into()),
            path: "1-4".into(),
        }]);

        let transport = backend.connect("1-4").unwrap();
        assert_eq!(transport.product_id(), 0xF0CD);
        assert_eq!(transport.serial_number().unwrap().as_deref(), Some("YKX001"));
        assert!(backend.connect("9-9").is_err());
    }
}
