use std::fmt;

use crate::config::{enable_key, keys, name_key, PluginConfig};
use crate::registry::{Channel, SensorFamily};
use crate::session::{DeviceSession, SessionState};
use crate::transport::Transport;
use crate::Result;

/// A configuration entry that differs between two configurations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConfigKey {
    BluetoothAddress,
    AssetNamePrefix,
    ConnectionTimeout,
    ShutdownThreshold,
    Enabled(SensorFamily),
    Name(Channel),
    AccelerometerRange,
    TemperatureFormula,
}

impl ConfigKey {
    /// The key as the host's configuration category names it.
    pub fn name(self) -> &'static str {
        match self {
            ConfigKey::BluetoothAddress => keys::BLUETOOTH_ADDRESS,
            ConfigKey::AssetNamePrefix => keys::ASSET_NAME_PREFIX,
            ConfigKey::ConnectionTimeout => keys::CONNECTION_TIMEOUT,
            ConfigKey::ShutdownThreshold => keys::SHUTDOWN_THRESHOLD,
            ConfigKey::Enabled(family) => enable_key(family),
            ConfigKey::Name(channel) => name_key(channel),
            ConfigKey::AccelerometerRange => keys::ACCELEROMETER_RANGE,
            ConfigKey::TemperatureFormula => keys::TEMPERATURE_FORMULA,
        }
    }
}

impl fmt::Display for ConfigKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// What a reconfiguration did to the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reconfiguration {
    Unchanged,
    /// Applied to the live session without reconnecting.
    Updated(Vec<ConfigKey>),
    /// The session was torn down and brought up against the new address.
    Rebuilt(Vec<ConfigKey>),
}

/// Every key whose value differs between `old` and `new`.
pub fn changed_keys(old: &PluginConfig, new: &PluginConfig) -> Vec<ConfigKey> {
    let mut changed = Vec::new();

    if old.bluetooth_address != new.bluetooth_address {
        changed.push(ConfigKey::BluetoothAddress);
    }
    if old.asset_name_prefix != new.asset_name_prefix {
        changed.push(ConfigKey::AssetNamePrefix);
    }
    if old.connection_timeout != new.connection_timeout {
        changed.push(ConfigKey::ConnectionTimeout);
    }
    if old.shutdown_threshold != new.shutdown_threshold {
        changed.push(ConfigKey::ShutdownThreshold);
    }

    changed.extend(
        SensorFamily::ALL
            .iter()
            .copied()
            .filter(|family| old.sensors.is_enabled(*family) != new.sensors.is_enabled(*family))
            .map(ConfigKey::Enabled),
    );
    changed.extend(
        Channel::ALL
            .iter()
            .copied()
            .filter(|channel| old.sensors.names.get(*channel) != new.sensors.names.get(*channel))
            .map(ConfigKey::Name),
    );

    if old.sensors.accel_range != new.sensors.accel_range {
        changed.push(ConfigKey::AccelerometerRange);
    }
    if old.sensors.temperature_formula != new.sensors.temperature_formula {
        changed.push(ConfigKey::TemperatureFormula);
    }

    changed
}

/// Move a session from `old` to `new`.
///
/// An address change is the only thing that rebuilds the session: it is
/// closed, pointed at the new device and brought up with the new sensor
/// set. Everything else is applied in place. Toggled sensors are enabled or
/// disabled on the device right away, and a new accelerometer range is
/// written if movement stays enabled. Names and the prefix only affect
/// readings of later polls.
///
/// If the session is not ready, in-place changes reach the device with the
/// next restart.
pub async fn reconfigure<T: Transport>(
    session: &mut DeviceSession<T>,
    old: &PluginConfig,
    new: &PluginConfig,
) -> Result<Reconfiguration> {
    let changed = changed_keys(old, new);

    if changed.is_empty() {
        return Ok(Reconfiguration::Unchanged);
    }

    log::info!(
        "Reconfiguring SensorTag {}: [{}]",
        session.address(),
        changed
            .iter()
            .map(|key| key.name())
            .collect::<Vec<_>>()
            .join(", ")
    );

    session.set_decode_options(new.sensors.decode_options());

    if changed.contains(&ConfigKey::BluetoothAddress) {
        if let Err(e) = session.close().await {
            log::warn!("Could not disconnect SensorTag {}: {}", session.address(), e);
        }

        session.retarget(new.bluetooth_address.as_str(), new.connect_timeout());
        session.bring_up(new.sensors.enabled_families()).await?;

        log::info!(
            "Restarted SensorTag plugin for {} due to change in configuration",
            session.address()
        );
        return Ok(Reconfiguration::Rebuilt(changed));
    }

    if changed.contains(&ConfigKey::ConnectionTimeout) {
        session.set_timeout(new.connect_timeout());
    }

    if session.state() != SessionState::Ready {
        log::debug!(
            "SensorTag {} is not ready, sensor changes apply on restart",
            session.address()
        );
        return Ok(Reconfiguration::Updated(changed));
    }

    for key in changed.iter() {
        if let ConfigKey::Enabled(family) = *key {
            if new.sensors.is_enabled(family) {
                session.enable(family).await?;
            } else {
                session.disable(family).await?;
            }
        }
    }

    let movement_kept = old.sensors.movement && new.sensors.movement;
    if movement_kept && changed.contains(&ConfigKey::AccelerometerRange) {
        session.enable(SensorFamily::Movement).await?;
    }

    Ok(Reconfiguration::Updated(changed))
}
