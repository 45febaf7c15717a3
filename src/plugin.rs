use tokio::sync::Mutex;

use crate::config::PluginConfig;
use crate::poll;
use crate::reading::ReadingBatch;
use crate::reconfigure::{self, Reconfiguration};
use crate::session::DeviceSession;
use crate::transport::Transport;
use crate::Result;

struct Inner<T> {
    session: DeviceSession<T>,
    /// Last configuration accepted by `init` or `reconfigure`. Restarts use
    /// it to decide which sensors to enable.
    config: PluginConfig,
}

/// The entry points a host calls to drive one SensorTag.
///
/// Calls are serialised: a `reconfigure` waits for an in-flight `poll` and
/// vice versa, so at most one transport operation runs at a time.
pub struct SensorTag<T> {
    inner: Mutex<Inner<T>>,
}

impl<T: Transport> SensorTag<T> {
    /// Validate `config` and connect. A device that cannot be reached is not
    /// an error here: the first `poll` reports it and restarts the session.
    pub async fn init(transport: T, config: PluginConfig) -> Result<Self> {
        config.validate()?;

        let mut session = DeviceSession::new(
            transport,
            config.bluetooth_address.as_str(),
            config.connect_timeout(),
        )
        .with_decode_options(config.sensors.decode_options());

        if let Err(e) = session.bring_up(config.sensors.enabled_families()).await {
            log::warn!(
                "SensorTag {} not initialized: {}",
                config.bluetooth_address,
                e
            );
        }

        Ok(Self {
            inner: Mutex::new(Inner { session, config }),
        })
    }

    /// Read all enabled sensors. Failed polls restart the session before
    /// returning the error; see [`Error::is_retryable`](crate::Error::is_retryable).
    pub async fn poll(&self) -> Result<ReadingBatch> {
        let mut inner = self.inner.lock().await;
        let Inner { session, config } = &mut *inner;

        poll::poll(session, config).await
    }

    /// Switch to `new_config`. It becomes the last known good configuration
    /// even if applying it to the device fails; the error is returned and
    /// the next poll restarts the session with the new configuration.
    pub async fn reconfigure(&self, new_config: PluginConfig) -> Result<Reconfiguration> {
        new_config.validate()?;

        let mut inner = self.inner.lock().await;
        let Inner { session, config } = &mut *inner;

        let outcome = reconfigure::reconfigure(session, config, &new_config).await;
        *config = new_config;

        if let Err(e) = &outcome {
            log::warn!(
                "SensorTag {} could not apply new configuration: {}",
                session.address(),
                e
            );
        }
        outcome
    }

    /// Disable the sensors and disconnect, giving up after the configured
    /// shutdown threshold.
    pub async fn shutdown(self) -> Result<()> {
        let Inner { mut session, config } = self.inner.into_inner();

        match tokio::time::timeout(config.shutdown_timeout(), session.close()).await {
            Ok(result) => {
                log::info!("SensorTag {} plugin shut down.", config.bluetooth_address);
                result
            }
            Err(_) => {
                log::warn!(
                    "SensorTag {} shutdown exceeded {:?}",
                    config.bluetooth_address,
                    config.shutdown_timeout()
                );
                Ok(())
            }
        }
    }
}
