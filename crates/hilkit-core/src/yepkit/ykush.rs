//! YKUSH power hub driver.
//!
//! Ports are numbered from 1. Switch commands are not acknowledged in a
//! usable way, so every switch is confirmed by reading the port state back.

use std::fmt;

use tracing::{debug, info, instrument, warn};

use super::{Auxiliary, PortState, YepkitError};
use crate::discovery::find_device;
use crate::protocol::constants::*;
use crate::protocol::{Framing, exchange};
use crate::transport::{DeviceBackend, HidTransport};

/// Firmware version as `(major, minor)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FirmwareVersion {
    pub major: u8,
    pub minor: u8,
}

impl fmt::Display for FirmwareVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

/// Port count for a YKUSH product id.
pub fn port_count_for(product_id: u16) -> u8 {
    if product_id == YKUSHXS_PID {
        YKUSHXS_PORT_COUNT
    } else {
        YKUSH_PORT_COUNT
    }
}

fn decode_state(byte: u8) -> PortState {
    PortState::from(byte > YKUSH_PORT_ON_THRESHOLD)
}

/// YKUSH, YKUSH3 or YKUSHXS hub.
pub struct YkushHub<T: HidTransport> {
    transport: T,
    number_of_port: u8,
}

impl<T: HidTransport> YkushHub<T> {
    /// Wrap an already resolved transport. The port count follows its product id.
    pub fn new(transport: T) -> Self {
        let number_of_port = port_count_for(transport.product_id());
        Self {
            transport,
            number_of_port,
        }
    }

    /// Find a YKUSH hub, optionally by serial number, and connect to it.
    pub fn open<B>(backend: &B, serial: Option<&str>) -> Result<Self, YepkitError>
    where
        B: DeviceBackend<Transport = T>,
    {
        let transport = find_device(backend, YKUSH_PIDS, serial, None)?;
        Ok(Self::new(transport))
    }

    pub fn number_of_port(&self) -> u8 {
        self.number_of_port
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    fn send_receive(&self, command: &[u8]) -> Result<Vec<u8>, YepkitError> {
        Ok(exchange(&self.transport, &Framing::HUB, command)?)
    }

    /// Check that `port_number` is one of the downstream ports.
    pub fn check_port_number(&self, port_number: u8) -> Result<(), YepkitError> {
        if !(1..=self.number_of_port).contains(&port_number) {
            return Err(YepkitError::PortNumber(format!(
                "The port number {port_number} is not valid for the device, it has only {} ports",
                self.number_of_port
            )));
        }
        Ok(())
    }

    /// Printable name of a state.
    pub fn get_str_state(state: PortState) -> String {
        state.to_string()
    }

    /// Firmware version, inferred from the serial number on early devices
    /// that do not answer the query.
    #[instrument(level = "debug", skip(self))]
    pub fn get_firmware_version(&self) -> Result<FirmwareVersion, YepkitError> {
        let response = self.send_receive(&[YKUSH_FIRMWARE_VERSION])?;
        if response[0] == YKUSH_PROTO_OK_STATUS {
            return Ok(FirmwareVersion {
                major: response[1],
                minor: response[2],
            });
        }

        let serial = self.transport.serial_number()?.unwrap_or_default();
        let minor = if serial.contains("YK2") {
            2
        } else if serial.contains("YKD2") {
            255
        } else {
            0
        };
        debug!(serial = %serial, minor, "Firmware query unanswered, inferred from serial");
        Ok(FirmwareVersion { major: 1, minor })
    }

    /// State of every port, port 1 first.
    #[instrument(level = "debug", skip(self))]
    pub fn get_all_ports_state(&self) -> Result<Vec<PortState>, YepkitError> {
        let firmware = self.get_firmware_version()?;
        let count = usize::from(self.number_of_port);

        if firmware.major >= 1 {
            let response = self.send_receive(&[YKUSH_ALL_STATE])?;
            if response[0] != YKUSH_PROTO_OK_STATUS {
                return Err(YepkitError::StatePortNotRetrieved(
                    "The states of the ports couldn't be retrieved".into(),
                ));
            }
            return Ok(response[1..=count].iter().copied().map(decode_state).collect());
        }

        // Bulk query is broken on firmware 0.x, ask port by port.
        let mut states = Vec::with_capacity(count);
        for port_number in 1..=self.number_of_port {
            let response = self.send_receive(&[YKUSH_PORT_STATE | port_number])?;
            if response[0] != YKUSH_PROTO_OK_STATUS {
                return Err(YepkitError::StatePortNotRetrieved(format!(
                    "The state of the port {port_number} couldn't be retrieved"
                )));
            }
            states.push(decode_state(response[1]));
        }
        Ok(states)
    }

    pub fn get_port_state(&self, port_number: u8) -> Result<PortState, YepkitError> {
        self.check_port_number(port_number)?;
        let states = self.get_all_ports_state()?;
        Ok(states[usize::from(port_number - 1)])
    }

    /// Switch one port and confirm the new state by reading it back.
    #[instrument(level = "debug", skip(self))]
    pub fn set_port_state(&self, port_number: u8, state: PortState) -> Result<(), YepkitError> {
        self.check_port_number(port_number)?;
        let opcode = match state {
            PortState::On => YKUSH_PORT_ON,
            PortState::Off => YKUSH_PORT_OFF,
        };
        self.send_receive(&[opcode | port_number])?;

        let actual = match self.get_port_state(port_number) {
            Ok(actual) => actual,
            Err(e @ YepkitError::StatePortNotRetrieved(_)) => {
                return Err(YepkitError::set_state_caused_by(
                    format!(
                        "The state of the action to power {state} couldn't be confirmed \
                         because the state of the port can't be retrieved"
                    ),
                    e,
                ));
            }
            Err(e) => return Err(e),
        };

        if actual != state {
            warn!(port_number, %state, %actual, "Port did not switch");
            return Err(YepkitError::set_state(format!(
                "There was an error trying to power {} the port, the port {port_number} is {actual}",
                state.to_string().to_lowercase()
            )));
        }
        Ok(())
    }

    pub fn set_port_on(&self, port_number: u8) -> Result<(), YepkitError> {
        self.set_port_state(port_number, PortState::On)
    }

    pub fn set_port_off(&self, port_number: u8) -> Result<(), YepkitError> {
        self.set_port_state(port_number, PortState::Off)
    }

    /// Switch every port and confirm that all of them ended up in `state`.
    #[instrument(level = "debug", skip(self))]
    pub fn set_all_ports(&self, state: PortState) -> Result<(), YepkitError> {
        let opcode = match state {
            PortState::On => YKUSH_ALL_ON,
            PortState::Off => YKUSH_ALL_OFF,
        };
        self.send_receive(&[opcode])?;

        let states = match self.get_all_ports_state() {
            Ok(states) => states,
            Err(e @ YepkitError::StatePortNotRetrieved(_)) => {
                return Err(YepkitError::set_state_caused_by(
                    format!(
                        "The state of the action to power {state} couldn't be confirmed \
                         because the state of the ports can't be retrieved"
                    ),
                    e,
                ));
            }
            Err(e) => return Err(e),
        };

        let all_match = states.first() == Some(&state) && states.iter().all(|s| *s == states[0]);
        if !all_match {
            return Err(YepkitError::set_state(format!(
                "There was an error during the power {}, the ports have the following states : {states:?}",
                state.to_string().to_lowercase()
            )));
        }
        Ok(())
    }

    pub fn set_all_ports_on(&self) -> Result<(), YepkitError> {
        self.set_all_ports(PortState::On)
    }

    pub fn set_all_ports_off(&self) -> Result<(), YepkitError> {
        self.set_all_ports(PortState::Off)
    }

    pub fn is_port_on(&self, port_number: u8) -> Result<bool, YepkitError> {
        Ok(self.get_port_state(port_number)?.is_on())
    }

    pub fn is_port_off(&self, port_number: u8) -> Result<bool, YepkitError> {
        Ok(!self.get_port_state(port_number)?.is_on())
    }
}

impl<T: HidTransport> Auxiliary for YkushHub<T> {
    /// Power on every port at the start of a run.
    fn create_instance(&mut self) -> Result<(), YepkitError> {
        info!(path = %self.transport.path(), "Create auxiliary instance");
        self.set_all_ports_on()
    }

    /// Power on every port again so the hub is left as it was found.
    fn delete_instance(&mut self) -> Result<(), YepkitError> {
        self.set_all_ports_on()?;
        info!(path = %self.transport.path(), "Auxiliary instance deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::MockTransport;

    const OK: u8 = YKUSH_PROTO_OK_STATUS;

    fn hub(pid: u16) -> (YkushHub<MockTransport>, MockTransport) {
        let mut mock = MockTransport::new();
        mock.set_ids(YEPKIT_VENDOR_ID, pid);
        (YkushHub::new(mock.clone()), mock)
    }

    fn queue_firmware(mock: &MockTransport, major: u8, minor: u8) {
        mock.queue_response(&[OK, major, minor]);
    }

    #[test]
    fn test_port_count_by_product() {
        assert_eq!(hub(YKUSH_PID).0.number_of_port(), 3);
        assert_eq!(hub(YKUSH3_PID).0.number_of_port(), 3);
        assert_eq!(hub(YKUSHXS_PID).0.number_of_port(), 1);
    }

    #[test]
    fn test_str_state() {
        assert_eq!(YkushHub::<MockTransport>::get_str_state(PortState::On), "ON");
        assert_eq!(YkushHub::<MockTransport>::get_str_state(PortState::Off), "OFF");
    }

    #[test]
    fn test_check_port_number() {
        let (hub, _) = hub(YKUSH_PID);
        assert!(hub.check_port_number(0).is_err());
        assert!(hub.check_port_number(1).is_ok());
        assert!(hub.check_port_number(3).is_ok());
        assert!(matches!(
            hub.check_port_number(4),
            Err(YepkitError::PortNumber(_))
        ));
    }

    #[test]
    fn test_firmware_version_answered() {
        let (hub, mock) = hub(YKUSH_PID);
        queue_firmware(&mock, 1, 4);
        assert_eq!(
            hub.get_firmware_version().unwrap(),
            FirmwareVersion { major: 1, minor: 4 }
        );
        assert_eq!(mock.get_commands(), vec![YKUSH_FIRMWARE_VERSION]);
    }

    #[test]
    fn test_firmware_version_from_serial() {
        for (serial, minor) in [("YK21234", 2), ("YKD2001", 255), ("ABC", 0)] {
            let mut mock = MockTransport::new();
            mock.set_ids(YEPKIT_VENDOR_ID, YKUSH_PID);
            mock.set_serial(Some(serial));
            let hub = YkushHub::new(mock.clone());

            // no answer queued: sentinel status
            let version = hub.get_firmware_version().unwrap();
            assert_eq!(version, FirmwareVersion { major: 1, minor });
        }
    }

    #[test]
    fn test_bulk_state_query() {
        let (hub, mock) = hub(YKUSH_PID);
        queue_firmware(&mock, 1, 0);
        mock.queue_response(&[OK, 0x11, 0x01, 0x15]);

        let states = hub.get_all_ports_state().unwrap();

        assert_eq!(states, vec![PortState::On, PortState::Off, PortState::On]);
        assert_eq!(mock.get_commands(), vec![YKUSH_FIRMWARE_VERSION, YKUSH_ALL_STATE]);
    }

    #[test]
    fn test_threshold_is_exclusive() {
        let (hub, mock) = hub(YKUSHXS_PID);
        queue_firmware(&mock, 1, 0);
        mock.queue_response(&[OK, 0x10]);
        assert_eq!(hub.get_all_ports_state().unwrap(), vec![PortState::Off]);
    }

    #[test]
    fn test_old_firmware_queries_each_port() {
        let (hub, mock) = hub(YKUSH_PID);
        queue_firmware(&mock, 0, 9);
        mock.queue_response(&[OK, 0x11]);
        mock.queue_response(&[OK, 0x01]);
        mock.queue_response(&[OK, 0x11]);

        let states = hub.get_all_ports_state().unwrap();

        assert_eq!(states, vec![PortState::On, PortState::Off, PortState::On]);
        assert_eq!(
            mock.get_commands(),
            vec![YKUSH_FIRMWARE_VERSION, 0x21, 0x22, 0x23]
        );
        assert!(!mock.get_commands().contains(&YKUSH_ALL_STATE));
    }

    #[test]
    fn test_old_firmware_port_failure() {
        let (hub, mock) = hub(YKUSH_PID);
        queue_firmware(&mock, 0, 9);
        mock.queue_response(&[OK, 0x11]);
        mock.queue_response(&[0x00, 0x11]);

        let err = hub.get_all_ports_state().unwrap_err();
        assert!(matches!(err, YepkitError::StatePortNotRetrieved(_)));
        assert!(err.to_string().contains("port 2"));
    }

    #[test]
    fn test_bulk_state_failure() {
        let (hub, mock) = hub(YKUSH_PID);
        queue_firmware(&mock, 1, 0);
        assert!(matches!(
            hub.get_all_ports_state(),
            Err(YepkitError::StatePortNotRetrieved(_))
        ));
    }

    #[test]
    fn test_get_port_state_picks_port() {
        let (hub, mock) = hub(YKUSH_PID);
        queue_firmware(&mock, 1, 0);
        mock.queue_response(&[OK, 0x01, 0x11, 0x01]);
        assert_eq!(hub.get_port_state(2).unwrap(), PortState::On);
    }

    #[test]
    fn test_set_port_state_confirmed() {
        let (hub, mock) = hub(YKUSH_PID);
        mock.queue_response(&[OK]);
        queue_firmware(&mock, 1, 0);
        mock.queue_response(&[OK, 0x01, 0x01, 0x11]);

        hub.set_port_on(3).unwrap();

        assert_eq!(mock.get_commands()[0], YKUSH_PORT_ON | 3);
    }

    #[test]
    fn test_set_port_state_readback_mismatch() {
        let (hub, mock) = hub(YKUSH_PID);
        // command accepted, but the port stays on
        mock.queue_response(&[OK]);
        queue_firmware(&mock, 1, 0);
        mock.queue_response(&[OK, 0x11, 0x11, 0x11]);

        let err = hub.set_port_off(1).unwrap_err();

        assert!(matches!(err, YepkitError::SetState { source: None, .. }));
        assert_eq!(mock.get_commands()[0], YKUSH_PORT_OFF | 1);
    }

    #[test]
    fn test_set_port_state_readback_unavailable() {
        let (hub, mock) = hub(YKUSH_PID);
        mock.queue_response(&[OK]);
        queue_firmware(&mock, 1, 0);
        mock.queue_response(&[0x00]);

        let err = hub.set_port_on(1).unwrap_err();
        assert!(matches!(err, YepkitError::SetState { source: Some(_), .. }));
    }

    #[test]
    fn test_set_port_state_checks_bounds_first() {
        let (hub, mock) = hub(YKUSHXS_PID);
        assert!(matches!(
            hub.set_port_on(2),
            Err(YepkitError::PortNumber(_))
        ));
        assert!(mock.get_writes().is_empty());
    }

    #[test]
    fn test_set_all_ports_confirmed() {
        let (hub, mock) = hub(YKUSH_PID);
        mock.queue_response(&[OK]);
        queue_firmware(&mock, 1, 0);
        mock.queue_response(&[OK, 0x00, 0x00, 0x00]);

        hub.set_all_ports_off().unwrap();
        assert_eq!(mock.get_commands()[0], YKUSH_ALL_OFF);
    }

    #[test]
    fn test_set_all_ports_partial_switch() {
        let (hub, mock) = hub(YKUSH_PID);
        mock.queue_response(&[OK]);
        queue_firmware(&mock, 1, 0);
        mock.queue_response(&[OK, 0x11, 0x00, 0x11]);

        assert!(matches!(
            hub.set_all_ports_on(),
            Err(YepkitError::SetState { .. })
        ));
    }

    #[test]
    fn test_create_and_delete_power_everything_on() {
        let (mut hub, mock) = hub(YKUSHXS_PID);
        for _ in 0..2 {
            mock.queue_response(&[OK]);
            queue_firmware(&mock, 1, 0);
            mock.queue_response(&[OK, 0x11]);
        }

        hub.create_instance().unwrap();
        hub.delete_instance().unwrap();

        let all_on = mock
            .get_commands()
            .iter()
            .filter(|&&c| c == YKUSH_ALL_ON)
            .count();
        assert_eq!(all_on, 2);
        assert_eq!(mock.pending_responses(), 0);
    }
}
