use std::time::Duration;

use thiserror::Error;
use uuid::Uuid;

/// Errors raised while talking to a SensorTag or decoding its data.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// The device did not accept a connection within the configured timeout.
    #[error("could not connect to {address} within {timeout:?}")]
    ConnectionTimeout { address: String, timeout: Duration },

    /// A characteristic UUID could not be resolved to a handle.
    #[error("characteristic {0} not found")]
    CharacteristicNotFound(Uuid),

    /// A read, write or protocol operation failed on the BLE link.
    #[error("transport failure: {0}")]
    TransportFailure(String),

    /// Characteristic bytes did not have the length the sensor produces.
    #[error("malformed {sensor} payload: expected {expected} bytes, got {actual}")]
    MalformedPayload {
        sensor: &'static str,
        expected: usize,
        actual: usize,
    },

    /// The session has no live connection.
    #[error("SensorTag {0} not connected")]
    NotConnected(String),

    /// The configuration could not be parsed or is out of bounds.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl Error {
    /// Whether polling again on the next cycle may succeed.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, Error::InvalidConfig(_))
    }
}

impl From<btleplug::Error> for Error {
    fn from(e: btleplug::Error) -> Self {
        Error::TransportFailure(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
