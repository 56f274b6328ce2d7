//! YKUR relay board driver.
//!
//! Request `[action, target]`, response `[status, echo, state, ...]`.
//! Port 0 is the on-board relay, ports 1-4 the external relays.

use std::fmt;

use tracing::{debug, info, instrument};

use super::{Auxiliary, PortState, YepkitError};
use crate::discovery::find_device;
use crate::protocol::constants::*;
use crate::protocol::{Framing, exchange};
use crate::transport::{DeviceBackend, HidTransport};

/// What a switch command addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayTarget {
    /// A single relay, 0 being the on-board one.
    Port(u8),
    /// Every external relay.
    ExternalRelays,
    /// External relays and the on-board relay.
    All,
}

impl fmt::Display for RelayTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RelayTarget::Port(n) => write!(f, "port {n}"),
            RelayTarget::ExternalRelays => write!(f, "external relays"),
            RelayTarget::All => write!(f, "all relays"),
        }
    }
}

/// YKUR relay board.
pub struct YkurBoard<T: HidTransport> {
    transport: T,
    number_of_port: u8,
}

impl<T: HidTransport> YkurBoard<T> {
    /// Wrap an already resolved transport.
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            number_of_port: YKUR_EXTERNAL_RELAYS,
        }
    }

    /// Find a YKUR board, optionally by serial number, and connect to it.
    pub fn open<B>(backend: &B, serial: Option<&str>) -> Result<Self, YepkitError>
    where
        B: DeviceBackend<Transport = T>,
    {
        let transport = find_device(backend, YKUR_PIDS, serial, None)?;
        Ok(Self::new(transport))
    }

    /// Number of external relays.
    pub fn number_of_port(&self) -> u8 {
        self.number_of_port
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    fn send_receive(&self, command: &[u8]) -> Result<Vec<u8>, YepkitError> {
        Ok(exchange(&self.transport, &Framing::BOARD, command)?)
    }

    /// Check that `port_number` addresses a relay of the board.
    pub fn check_port_number(&self, port_number: u8) -> Result<(), YepkitError> {
        if port_number > self.number_of_port {
            return Err(YepkitError::PortNumber(format!(
                "The port number {port_number} is not valid for the device, it has only {} \
                 ports and the on board relay that has 0 for port number",
                self.number_of_port
            )));
        }
        Ok(())
    }

    fn target_code(&self, target: RelayTarget) -> Result<u8, YepkitError> {
        match target {
            RelayTarget::Port(0) => Ok(YKUR_TARGET_ON_BOARD),
            RelayTarget::Port(n) => {
                self.check_port_number(n)?;
                Ok(n)
            }
            RelayTarget::ExternalRelays => Ok(YKUR_TARGET_EXTERNAL_RELAYS),
            RelayTarget::All => Ok(YKUR_TARGET_ALL),
        }
    }

    /// State of an external relay or of the on-board relay.
    #[instrument(level = "debug", skip(self))]
    pub fn get_relay_state(&self, port_number: u8) -> Result<PortState, YepkitError> {
        self.check_port_number(port_number)?;
        let target = self.target_code(RelayTarget::Port(port_number))?;
        let response = self.send_receive(&[YKUR_GET_STATE, target])?;
        let (status, state) = (response[0], response[2]);

        if status == YKUR_GET_STATE && state != YKUR_PORT_STATE_ERROR {
            Ok(PortState::from(state != 0))
        } else {
            debug!(status, state, "Relay state not retrieved");
            Err(YepkitError::StatePortNotRetrieved(
                "The state of the relay couldn't be retrieved".into(),
            ))
        }
    }

    /// Alias of [`YkurBoard::get_relay_state`].
    pub fn get_port_state(&self, port_number: u8) -> Result<PortState, YepkitError> {
        self.get_relay_state(port_number)
    }

    /// States ordered as `[on-board relay, relay 1, relay 2, ...]`.
    pub fn get_all_ports_state(&self) -> Result<Vec<PortState>, YepkitError> {
        (0..=self.number_of_port)
            .map(|port| self.get_relay_state(port))
            .collect()
    }

    /// Switch a relay or a group of relays.
    #[instrument(level = "debug", skip(self))]
    pub fn set_state(&self, target: RelayTarget, state: PortState) -> Result<(), YepkitError> {
        let action = match state {
            PortState::On => YKUR_SET_ON,
            PortState::Off => YKUR_SET_OFF,
        };
        let code = self.target_code(target)?;
        let response = self.send_receive(&[action, code])?;

        if response[2] != YKUR_PROTO_OK {
            let message = match target {
                RelayTarget::Port(n) => {
                    format!("An error occured during the switch of the port {n}")
                }
                group => format!("An error occured during the switch for {group}"),
            };
            return Err(YepkitError::set_state(message));
        }
        debug!(%target, %state, "Relay switched");
        Ok(())
    }

    pub fn set_relay_on(&self, port_number: u8) -> Result<(), YepkitError> {
        self.set_state(RelayTarget::Port(port_number), PortState::On)
    }

    pub fn set_relay_off(&self, port_number: u8) -> Result<(), YepkitError> {
        self.set_state(RelayTarget::Port(port_number), PortState::Off)
    }

    /// Power on all the external relays and the on-board relay.
    pub fn set_all_relays_on(&self) -> Result<(), YepkitError> {
        self.set_state(RelayTarget::All, PortState::On)
    }

    /// Power off all the external relays and the on-board relay.
    pub fn set_all_relays_off(&self) -> Result<(), YepkitError> {
        self.set_state(RelayTarget::All, PortState::Off)
    }

    pub fn set_all_external_relays_on(&self) -> Result<(), YepkitError> {
        self.set_state(RelayTarget::ExternalRelays, PortState::On)
    }

    pub fn set_all_external_relays_off(&self) -> Result<(), YepkitError> {
        self.set_state(RelayTarget::ExternalRelays, PortState::Off)
    }

    pub fn is_relay_on(&self, port_number: u8) -> Result<bool, YepkitError> {
        Ok(self.get_relay_state(port_number)?.is_on())
    }

    pub fn is_relay_off(&self, port_number: u8) -> Result<bool, YepkitError> {
        Ok(!self.get_relay_state(port_number)?.is_on())
    }
}

impl<T: HidTransport> Auxiliary for YkurBoard<T> {
    fn create_instance(&mut self) -> Result<(), YepkitError> {
        info!(path = %self.transport.path(), "Create auxiliary instance");
        Ok(())
    }

    fn delete_instance(&mut self) -> Result<(), YepkitError> {
        info!(path = %self.transport.path(), "Auxiliary instance deleted");
        Ok(())
    }
}
