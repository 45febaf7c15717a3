use std::collections::BTreeSet;
use std::time::Duration;

use crate::convert::{self, DecodeOptions, SensorValue};
use crate::registry::{SensorDescriptor, SensorFamily};
use crate::transport::{Handle, Transport};
use crate::{Error, Result};

/// Number of reads issued for one temperature sample. Only the last one is
/// kept, the sensor needs time to settle before its value is stable.
pub const TEMPERATURE_READ_ITERATIONS: usize = 2;

/// Delay between consecutive temperature reads.
pub const SETTLE_DELAY: Duration = Duration::from_millis(500);

/// Slack on top of the connection timeout before `open` abandons a transport
/// that overran its own deadline.
pub const CONNECT_GRACE: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Disconnected,
    Connecting,
    Connected,
    Discovering,
    Ready,
    Polling,
    /// A transport operation failed. Only `close` followed by `open` leaves
    /// this state.
    Failed,
}

/// The connection to one SensorTag and everything resolved over it.
///
/// The session is the only owner of the transport and of the discovered
/// handles. Handles are cleared on `close` and only used while the session
/// is `Ready`.
pub struct DeviceSession<T> {
    address: String,
    timeout: Duration,
    state: SessionState,
    descriptors: Vec<SensorDescriptor>,
    enabled: BTreeSet<SensorFamily>,
    decode: DecodeOptions,
    transport: T,
}

impl<T: Transport> DeviceSession<T> {
    pub fn new(transport: T, address: impl Into<String>, timeout: Duration) -> Self {
        Self {
            address: address.into(),
            timeout,
            state: SessionState::Disconnected,
            descriptors: SensorFamily::ALL
                .iter()
                .map(|family| family.descriptor())
                .collect(),
            enabled: BTreeSet::new(),
            decode: DecodeOptions::default(),
            transport,
        }
    }

    pub fn with_decode_options(mut self, decode: DecodeOptions) -> Self {
        self.decode = decode;
        self
    }

    #[inline]
    pub fn address(&self) -> &str {
        &self.address
    }

    #[inline]
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    #[inline]
    pub fn state(&self) -> SessionState {
        self.state
    }

    #[inline]
    pub fn decode_options(&self) -> DecodeOptions {
        self.decode
    }

    /// Families whose enable write has been issued since the last connect.
    pub fn enabled(&self) -> impl Iterator<Item = SensorFamily> + '_ {
        self.enabled.iter().copied()
    }

    pub fn is_enabled(&self, family: SensorFamily) -> bool {
        self.enabled.contains(&family)
    }

    /// Snapshot of the characteristic descriptors and their resolved handles.
    pub fn descriptors(&self) -> Vec<SensorDescriptor> {
        self.descriptors.clone()
    }

    /// Used from the next `open` on.
    pub fn set_timeout(&mut self, timeout: Duration) {
        self.timeout = timeout;
    }

    /// Takes effect on the next read, or on the next movement enable for the
    /// accelerometer range.
    pub fn set_decode_options(&mut self, decode: DecodeOptions) {
        self.decode = decode;
    }

    /// Point the session at another device. Takes effect on the next `open`.
    pub fn retarget(&mut self, address: impl Into<String>, timeout: Duration) {
        self.address = address.into();
        self.timeout = timeout;
    }

    /// Whether the session is ready for reads and the link is still up.
    pub async fn is_ready(&self) -> bool {
        self.state == SessionState::Ready && self.transport.is_connected().await
    }

    /// Connect to the device within the configured timeout.
    pub async fn open(&mut self) -> Result<()> {
        match self.state {
            SessionState::Disconnected => {}
            SessionState::Failed => return Err(self.not_connected()),
            _ => return Ok(()),
        }

        log::info!("Connecting to SensorTag {}", self.address);
        self.state = SessionState::Connecting;

        let connect = self.transport.connect(&self.address, self.timeout);
        let error = match tokio::time::timeout(self.timeout + CONNECT_GRACE, connect).await {
            Ok(Ok(true)) => {
                log::info!("SensorTag {} connected", self.address);
                self.state = SessionState::Connected;
                return Ok(());
            }
            Ok(Ok(false)) | Err(_) => Error::ConnectionTimeout {
                address: self.address.clone(),
                timeout: self.timeout,
            },
            Ok(Err(e)) => e,
        };

        // The link may have come up after the transport gave up on it.
        if let Err(e) = self.transport.disconnect().await {
            log::debug!("Could not release SensorTag {}: {}", self.address, e);
        }
        self.state = SessionState::Disconnected;
        Err(error)
    }

    /// Resolve the handles of every sensor family. Does nothing if they are
    /// already resolved for this connection.
    pub async fn discover_handles(&mut self) -> Result<()> {
        match self.state {
            SessionState::Connected => {}
            SessionState::Ready => return Ok(()),
            _ => return Err(self.not_connected()),
        }

        // The GATT table differs between firmware revisions, so handles are
        // looked up instead of hard-coded.
        self.state = SessionState::Discovering;
        let result = self.resolve_handles().await;
        self.track(result)?;
        debug_assert!(self.descriptors.iter().all(SensorDescriptor::is_resolved));

        log::info!("SensorTag {} polling initialized", self.address);
        self.state = SessionState::Ready;
        Ok(())
    }

    async fn resolve_handles(&mut self) -> Result<()> {
        let transport = &mut self.transport;

        for descriptor in self.descriptors.iter_mut() {
            descriptor.data_handle = Some(resolve(transport, descriptor.data_uuid).await?);

            if let Some(uuid) = descriptor.configuration_uuid {
                descriptor.configuration_handle = Some(resolve(transport, uuid).await?);
            }
            if let Some(uuid) = descriptor.period_uuid {
                descriptor.period_handle = Some(resolve(transport, uuid).await?);
            }

            log::debug!(
                "Resolved {} handles: data {:?}, configuration {:?}, period {:?}",
                descriptor.family,
                descriptor.data_handle,
                descriptor.configuration_handle,
                descriptor.period_handle
            );
        }

        Ok(())
    }

    /// Start sampling on the device. Battery has no configuration
    /// characteristic and is always readable.
    pub async fn enable(&mut self, family: SensorFamily) -> Result<()> {
        self.ensure_ready()?;

        let value = family.enable_value(self.decode.accel_range);
        let result = self.write_configuration(family, &value).await;
        self.track(result)?;

        log::debug!("Enabled {} on {}", family, self.address);
        self.enabled.insert(family);
        Ok(())
    }

    /// Stop sampling on the device.
    pub async fn disable(&mut self, family: SensorFamily) -> Result<()> {
        self.ensure_ready()?;

        let result = self
            .write_configuration(family, &family.disable_value())
            .await;
        self.track(result)?;

        log::debug!("Disabled {} on {}", family, self.address);
        self.enabled.remove(&family);
        Ok(())
    }

    async fn write_configuration(&mut self, family: SensorFamily, value: &[u8]) -> Result<()> {
        let descriptor = &self.descriptors[family as usize];

        let handle = match (descriptor.configuration_uuid, descriptor.configuration_handle) {
            (None, _) => return Ok(()),
            (Some(_), Some(handle)) => handle,
            (Some(uuid), None) => return Err(Error::CharacteristicNotFound(uuid)),
        };

        self.transport.write_characteristic(handle, value).await
    }

    /// Read the current bytes of a family's data characteristic.
    ///
    /// Temperature is read [`TEMPERATURE_READ_ITERATIONS`] times,
    /// [`SETTLE_DELAY`] apart, and only the last read is returned.
    pub async fn read_raw(&mut self, family: SensorFamily) -> Result<Vec<u8>> {
        self.ensure_ready()?;

        let descriptor = &self.descriptors[family as usize];
        let handle = descriptor
            .data_handle
            .ok_or(Error::CharacteristicNotFound(descriptor.data_uuid))?;

        let reads = match family {
            SensorFamily::Temperature => TEMPERATURE_READ_ITERATIONS,
            _ => 1,
        };

        self.state = SessionState::Polling;
        let result = self.read_repeatedly(handle, reads).await;
        let raw = self.track(result)?;
        self.state = SessionState::Ready;

        log::trace!("Read {} from {}: {:02x?}", family, self.address, raw);
        Ok(raw)
    }

    async fn read_repeatedly(&mut self, handle: Handle, reads: usize) -> Result<Vec<u8>> {
        let mut raw = self.transport.read_characteristic(handle).await?;

        for _ in 1..reads {
            tokio::time::sleep(SETTLE_DELAY).await;
            raw = self.transport.read_characteristic(handle).await?;
        }

        Ok(raw)
    }

    /// Read a family and convert it to physical units.
    pub async fn read(&mut self, family: SensorFamily) -> Result<SensorValue> {
        let raw = self.read_raw(family).await?;
        convert::decode(family, &raw, self.decode)
    }

    /// Disable every enabled sensor and disconnect.
    ///
    /// Disabling is best effort: a failed write is logged and the remaining
    /// sensors are still disabled. Only the disconnect itself can fail.
    pub async fn close(&mut self) -> Result<()> {
        if self.state == SessionState::Disconnected {
            return Ok(());
        }

        if self.transport.is_connected().await {
            let mut failures = 0;

            for family in std::mem::take(&mut self.enabled) {
                let value = family.disable_value();
                if let Err(e) = self.write_configuration(family, &value).await {
                    failures += 1;
                    if failures == 1 {
                        log::warn!("Could not disable {} on {}: {}", family, self.address, e);
                    } else {
                        log::debug!("Could not disable {} on {}: {}", family, self.address, e);
                    }
                }
            }
        }

        self.enabled.clear();
        for descriptor in self.descriptors.iter_mut() {
            descriptor.clear_handles();
        }
        self.state = SessionState::Disconnected;

        let result = self.transport.disconnect().await;
        log::info!("SensorTag {} stopped.", self.address);
        result
    }

    /// Connect, discover handles and enable `families`.
    pub async fn bring_up(
        &mut self,
        families: impl IntoIterator<Item = SensorFamily>,
    ) -> Result<()> {
        self.open().await?;
        self.discover_handles().await?;

        for family in families {
            self.enable(family).await?;
        }

        Ok(())
    }

    /// Tear the session down and bring it up again with `families` enabled.
    pub async fn restart(
        &mut self,
        families: impl IntoIterator<Item = SensorFamily>,
    ) -> Result<()> {
        log::info!("Restarting SensorTag {}", self.address);

        if let Err(e) = self.close().await {
            log::warn!("Could not disconnect SensorTag {}: {}", self.address, e);
        }

        self.bring_up(families).await
    }

    fn ensure_ready(&self) -> Result<()> {
        if self.state == SessionState::Ready {
            Ok(())
        } else {
            Err(self.not_connected())
        }
    }

    fn not_connected(&self) -> Error {
        Error::NotConnected(self.address.clone())
    }

    /// Move to `Failed` if a transport operation failed.
    fn track<R>(&mut self, result: Result<R>) -> Result<R> {
        if let Err(e) = &result {
            log::warn!("SensorTag {} failed: {}", self.address, e);
            self.state = SessionState::Failed;
        }
        result
    }
}

async fn resolve<T: Transport>(transport: &mut T, uuid: uuid::Uuid) -> Result<Handle> {
    transport
        .discover_handle(uuid)
        .await?
        .ok_or(Error::CharacteristicNotFound(uuid))
}
