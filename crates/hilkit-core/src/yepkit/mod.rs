//! Yepkit auxiliaries: YKUR relay board and YKUSH power hubs.
//!
//! Both drivers share the framing and discovery layers but speak different
//! command sets:
//! - `ykur`: per-relay addressing plus "external relays" / "all" targets
//! - `ykush`: sequential ports, every switch confirmed by reading the state back

mod error;
pub mod ykur;
pub mod ykush;

use std::fmt;

pub use error::YepkitError;
pub use ykur::{RelayTarget, YkurBoard};
pub use ykush::{FirmwareVersion, YkushHub};

/// Power state of a port or relay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PortState {
    Off = 0,
    On = 1,
}

impl PortState {
    pub fn is_on(self) -> bool {
        self == PortState::On
    }
}

impl From<bool> for PortState {
    fn from(on: bool) -> Self {
        if on { PortState::On } else { PortState::Off }
    }
}

impl fmt::Display for PortState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PortState::Off => write!(f, "OFF"),
            PortState::On => write!(f, "ON"),
        }
    }
}

/// Lifecycle hooks a test run calls on every auxiliary it owns.
pub trait Auxiliary {
    /// Bring the device into its initial state.
    fn create_instance(&mut self) -> Result<(), YepkitError>;

    /// Leave the device in a known state before it is released.
    fn delete_instance(&mut self) -> Result<(), YepkitError>;
}
