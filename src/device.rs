use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use btleplug::api::{BDAddr, Characteristic, Peripheral as _, WriteType};
use btleplug::platform::Peripheral;
use tokio::time::Instant;
use uuid::Uuid;

use crate::scanner::{ScanConfig, Scanner};
use crate::transport::{Handle, Transport};
use crate::{Error, Result};

/// [`Transport`] backed by the platform BLE stack through `btleplug`.
///
/// Handles are indices into the list of characteristics resolved since the
/// last connect.
#[derive(Default)]
pub struct BtleTransport {
    config: ScanConfig,
    scanner: Option<Scanner>,
    peripheral: Option<Peripheral>,
    characteristics: Vec<Characteristic>,
}

impl BtleTransport {
    pub fn new(config: ScanConfig) -> Self {
        Self {
            config,
            ..Default::default()
        }
    }

    fn peripheral(&self) -> Result<&Peripheral> {
        self.peripheral
            .as_ref()
            .ok_or_else(|| Error::TransportFailure("no peripheral connected".into()))
    }

    async fn release(&mut self) {
        if let Err(e) = self.disconnect().await {
            log::debug!("Could not release peripheral: {}", e);
        }
    }

    fn characteristic(&self, handle: Handle) -> Result<(&Peripheral, &Characteristic)> {
        let characteristic = self
            .characteristics
            .get(usize::from(handle.0))
            .ok_or_else(|| Error::TransportFailure(format!("unknown handle {}", handle)))?;

        Ok((self.peripheral()?, characteristic))
    }
}

#[async_trait]
impl Transport for BtleTransport {
    async fn connect(&mut self, address: &str, timeout: Duration) -> Result<bool> {
        let address = BDAddr::from_str(address)
            .map_err(|e| Error::InvalidConfig(format!("bad address {}: {:?}", address, e)))?;
        let deadline = Instant::now() + timeout;

        let scanner = match self.scanner.take() {
            Some(scanner) => scanner,
            None => Scanner::new(&self.config).await?,
        };
        let scanner = &*self.scanner.insert(scanner);

        let peripheral = match scanner.find(address, deadline).await? {
            Some(peripheral) => peripheral,
            None => return Ok(false),
        };

        log::debug!("Connecting to device {}", address);

        // Kept before connecting so that `disconnect` can release a link
        // that came up after we stopped waiting for it.
        self.characteristics.clear();
        self.peripheral = Some(peripheral.clone());

        match tokio::time::timeout_at(deadline, peripheral.connect()).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                self.release().await;
                return Err(e.into());
            }
            Err(_) => {
                log::warn!("Could not connect to {} within {:?}", address, timeout);
                self.release().await;
                return Ok(false);
            }
        }

        if let Err(e) = peripheral.discover_services().await {
            self.release().await;
            return Err(e.into());
        }

        Ok(true)
    }

    async fn disconnect(&mut self) -> Result<()> {
        self.characteristics.clear();

        if let Some(peripheral) = self.peripheral.take() {
            peripheral.disconnect().await?;
        }

        Ok(())
    }

    async fn is_connected(&self) -> bool {
        match &self.peripheral {
            Some(peripheral) => peripheral.is_connected().await.unwrap_or(false),
            None => false,
        }
    }

    async fn discover_handle(&mut self, uuid: Uuid) -> Result<Option<Handle>> {
        if let Some(index) = self.characteristics.iter().position(|c| c.uuid == uuid) {
            return Ok(Some(Handle(index as u16)));
        }

        let characteristic = self
            .peripheral()?
            .characteristics()
            .into_iter()
            .find(|characteristic| characteristic.uuid == uuid);

        Ok(characteristic.map(|characteristic| {
            self.characteristics.push(characteristic);
            Handle((self.characteristics.len() - 1) as u16)
        }))
    }

    async fn read_characteristic(&mut self, handle: Handle) -> Result<Vec<u8>> {
        let (peripheral, characteristic) = self.characteristic(handle)?;
        Ok(peripheral.read(characteristic).await?)
    }

    async fn write_characteristic(&mut self, handle: Handle, data: &[u8]) -> Result<()> {
        let (peripheral, characteristic) = self.characteristic(handle)?;
        Ok(peripheral
            .write(characteristic, data, WriteType::WithoutResponse)
            .await?)
    }
}
