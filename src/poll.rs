use chrono::Local;

use crate::config::PluginConfig;
use crate::reading::{Reading, ReadingBatch};
use crate::registry::SensorFamily;
use crate::session::DeviceSession;
use crate::transport::Transport;
use crate::{Error, Result};

/// Read every enabled sensor once.
///
/// On failure the session is restarted with `config`, the last known good
/// configuration, and the original error is returned. Nothing read before
/// the failure is returned; the next call starts a fresh cycle.
pub async fn poll<T: Transport>(
    session: &mut DeviceSession<T>,
    config: &PluginConfig,
) -> Result<ReadingBatch> {
    match collect(session, config).await {
        Ok(batch) => Ok(batch),
        Err(e) => {
            log::warn!(
                "Restarting SensorTag {} after failure: {}",
                session.address(),
                e
            );

            match session.restart(config.sensors.enabled_families()).await {
                Ok(()) => log::info!("SensorTag {} restarted", session.address()),
                Err(restart) => log::error!(
                    "Could not restart SensorTag {}: {}",
                    session.address(),
                    restart
                ),
            }

            Err(e)
        }
    }
}

/// One poll cycle without recovery.
pub async fn collect<T: Transport>(
    session: &mut DeviceSession<T>,
    config: &PluginConfig,
) -> Result<ReadingBatch> {
    if !session.is_ready().await {
        return Err(Error::NotConnected(session.address().to_string()));
    }

    let timestamp = Local::now();
    let mut batch = ReadingBatch::new();

    for family in SensorFamily::ALL {
        if !config.sensors.is_enabled(family) {
            continue;
        }

        let value = session.read(family).await?;

        for (channel, readings) in value.channel_fields() {
            batch.push(Reading::new(config.asset_name(channel), timestamp, readings));
        }
    }

    log::debug!(
        "Polled {} readings from {}",
        batch.len(),
        session.address()
    );

    Ok(batch)
}
