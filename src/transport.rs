use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use uuid::Uuid;

use crate::Result;

/// Transport-level identifier of a characteristic, resolved once per
/// connection by [`Transport::discover_handle`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Handle(pub u16);

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:04x}", self.0)
    }
}

/// The BLE link to a single device.
///
/// Implementations are expected to report protocol and I/O problems as
/// [`Error::TransportFailure`](crate::Error::TransportFailure). Handles
/// returned by `discover_handle` are only valid until the next `disconnect`.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Connect to the device with the given address. Returns `false` if the
    /// device could not be reached within `timeout`; implementations stop
    /// waiting on their own once it has elapsed.
    async fn connect(&mut self, address: &str, timeout: Duration) -> Result<bool>;

    async fn disconnect(&mut self) -> Result<()>;

    async fn is_connected(&self) -> bool;

    /// Resolve a characteristic UUID to a handle, `None` if the device does
    /// not expose it.
    async fn discover_handle(&mut self, uuid: Uuid) -> Result<Option<Handle>>;

    async fn read_characteristic(&mut self, handle: Handle) -> Result<Vec<u8>>;

    async fn write_characteristic(&mut self, handle: Handle, data: &[u8]) -> Result<()>;
}
