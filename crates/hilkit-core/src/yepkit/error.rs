use thiserror::Error;

use crate::transport::TransportError;

/// Errors raised by the Yepkit auxiliaries.
///
/// One enum so callers can match broadly (`Err(_)`) or on a single kind.
#[derive(Error, Debug)]
pub enum YepkitError {
    /// No device matched the discovery criteria.
    #[error("{0}")]
    DeviceNotFound(String),

    /// Port index outside the device's range.
    #[error("{0}")]
    PortNumber(String),

    /// The device did not report a usable port state.
    #[error("{0}")]
    StatePortNotRetrieved(String),

    /// A switch command was rejected or its effect could not be confirmed.
    #[error("{message}")]
    SetState {
        message: String,
        #[source]
        source: Option<Box<YepkitError>>,
    },

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),
}

impl YepkitError {
    pub(crate) fn set_state(message: impl Into<String>) -> Self {
        Self::SetState {
            message: message.into(),
            source: None,
        }
    }

    pub(crate) fn set_state_caused_by(message: impl Into<String>, cause: YepkitError) -> Self {
        Self::SetState {
            message: message.into(),
            source: Some(Box::new(cause)),
        }
    }
}
