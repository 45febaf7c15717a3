use btleplug::api::{BDAddr, Central, CentralEvent, Manager as _, Peripheral as _};
use btleplug::platform::{Adapter, Manager, Peripheral};
use futures::StreamExt;
use tokio::time::Instant;

use crate::{Error, Result};

#[derive(Debug, Default, Clone)]
pub struct ScanConfig {
    /// Index of the Bluetooth adapter to use. The first found adapter is used by default.
    adapter_index: usize,
}

impl ScanConfig {
    /// Index of bluetooth adapter to use
    pub fn adapter_index(mut self, index: usize) -> Self {
        self.adapter_index = index;
        self
    }
}

/// Finds peripherals by address on one adapter.
pub(crate) struct Scanner {
    _manager: Manager,
    adapter: Adapter,
}

impl Scanner {
    pub(crate) async fn new(config: &ScanConfig) -> Result<Self> {
        let manager = Manager::new().await?;
        let mut adapters = manager.adapters().await?;

        if config.adapter_index >= adapters.len() {
            return Err(Error::TransportFailure(format!(
                "no bluetooth adapter at index {}",
                config.adapter_index
            )));
        }

        let adapter = adapters.swap_remove(config.adapter_index);

        log::trace!("Using adapter: {:?}", adapter);

        Ok(Self {
            _manager: manager,
            adapter,
        })
    }

    /// Look up the peripheral with `address`, scanning until `deadline` if
    /// the adapter does not know it yet. The scan is stopped on every exit,
    /// including when the returned future is dropped.
    pub(crate) async fn find(&self, address: BDAddr, deadline: Instant) -> Result<Option<Peripheral>> {
        if let Some(peripheral) = self.known(address).await? {
            return Ok(Some(peripheral));
        }

        let mut events = self.adapter.events().await?;

        log::info!("Scanning for {}", address);
        self.adapter.start_scan(Default::default()).await?;
        let scan = ScanGuard {
            adapter: Some(self.adapter.clone()),
        };

        let found = tokio::time::timeout_at(deadline, async {
            while let Some(event) = events.next().await {
                let peripheral_id = match event {
                    CentralEvent::DeviceDiscovered(id) | CentralEvent::DeviceUpdated(id) => id,
                    _ => continue,
                };

                if let Ok(peripheral) = self.adapter.peripheral(&peripheral_id).await {
                    log::trace!("Device discovered: {:?}", peripheral);

                    if peripheral.address() == address {
                        return Some(peripheral);
                    }
                }
            }
            None
        })
        .await
        .unwrap_or(None);

        scan.stop().await;

        match &found {
            Some(_) => log::info!("Found device {}", address),
            None => log::info!("Scanner stop condition reached without finding {}", address),
        }

        Ok(found)
    }

    async fn known(&self, address: BDAddr) -> Result<Option<Peripheral>> {
        Ok(self
            .adapter
            .peripherals()
            .await?
            .into_iter()
            .find(|peripheral| peripheral.address() == address))
    }
}

/// Stops a running scan. Dropping it without `stop` hands the stop to the
/// runtime, so a cancelled lookup does not leave the adapter scanning.
struct ScanGuard {
    adapter: Option<Adapter>,
}

impl ScanGuard {
    async fn stop(mut self) {
        if let Some(adapter) = self.adapter.take() {
            stop_scan(adapter).await;
        }
    }
}

impl Drop for ScanGuard {
    fn drop(&mut self) {
        if let Some(adapter) = self.adapter.take() {
            match tokio::runtime::Handle::try_current() {
                Ok(runtime) => {
                    runtime.spawn(stop_scan(adapter));
                }
                Err(_) => log::warn!("Scan left running, no runtime to stop it"),
            }
        }
    }
}

async fn stop_scan(adapter: Adapter) {
    if let Err(e) = adapter.stop_scan().await {
        log::debug!("Could not stop the scan: {}", e);
    }
}
