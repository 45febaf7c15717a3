//! Typed plugin configuration.
//!
//! The host hands over its configuration category as a JSON document whose
//! values are all strings (`"true"`, `"3"`, ...). It is parsed once here into
//! [`PluginConfig`]; nothing past this module looks at strings.

use std::collections::HashMap;
use std::str::FromStr;
use std::time::Duration;

use btleplug::api::BDAddr;
use serde::Deserialize;
use serde_json::Value;

use crate::convert::{AccelRange, DecodeOptions, TemperatureFormula};
use crate::registry::{Channel, SensorFamily};
use crate::{Error, Result};

/// Replaced by the device address in the asset name prefix.
pub const ADDRESS_PLACEHOLDER: &str = "%M";

pub const MIN_CONNECTION_TIMEOUT: u64 = 2;
pub const MAX_CONNECTION_TIMEOUT: u64 = 5;

/// Category keys as the host names them.
pub mod keys {
    pub const BLUETOOTH_ADDRESS: &str = "bluetoothAddress";
    pub const ASSET_NAME_PREFIX: &str = "assetNamePrefix";
    pub const SHUTDOWN_THRESHOLD: &str = "shutdownThreshold";
    pub const CONNECTION_TIMEOUT: &str = "connectionTimeout";
    pub const TEMPERATURE_SENSOR: &str = "temperatureSensor";
    pub const LUMINANCE_SENSOR: &str = "luminanceSensor";
    pub const HUMIDITY_SENSOR: &str = "humiditySensor";
    pub const PRESSURE_SENSOR: &str = "pressureSensor";
    pub const MOVEMENT_SENSOR: &str = "movementSensor";
    pub const BATTERY_DATA: &str = "batteryData";
    pub const TEMPERATURE_SENSOR_NAME: &str = "temperatureSensorName";
    pub const LUMINANCE_SENSOR_NAME: &str = "luminanceSensorName";
    pub const HUMIDITY_SENSOR_NAME: &str = "humiditySensorName";
    pub const PRESSURE_SENSOR_NAME: &str = "pressureSensorName";
    pub const GYROSCOPE_SENSOR_NAME: &str = "gyroscopeSensorName";
    pub const ACCELEROMETER_SENSOR_NAME: &str = "accelerometerSensorName";
    pub const MAGNETOMETER_SENSOR_NAME: &str = "magnetometerSensorName";
    pub const BATTERY_SENSOR_NAME: &str = "batterySensorName";
    pub const ACCELEROMETER_RANGE: &str = "accelerometerRange";
    pub const TEMPERATURE_FORMULA: &str = "temperatureFormula";
}

/// Category key of a family's enable flag.
pub fn enable_key(family: SensorFamily) -> &'static str {
    match family {
        SensorFamily::Temperature => keys::TEMPERATURE_SENSOR,
        SensorFamily::Luminance => keys::LUMINANCE_SENSOR,
        SensorFamily::Humidity => keys::HUMIDITY_SENSOR,
        SensorFamily::Pressure => keys::PRESSURE_SENSOR,
        SensorFamily::Movement => keys::MOVEMENT_SENSOR,
        SensorFamily::Battery => keys::BATTERY_DATA,
    }
}

/// Category key of a channel's display name.
pub fn name_key(channel: Channel) -> &'static str {
    match channel {
        Channel::Temperature => keys::TEMPERATURE_SENSOR_NAME,
        Channel::Luminance => keys::LUMINANCE_SENSOR_NAME,
        Channel::Humidity => keys::HUMIDITY_SENSOR_NAME,
        Channel::Pressure => keys::PRESSURE_SENSOR_NAME,
        Channel::Gyroscope => keys::GYROSCOPE_SENSOR_NAME,
        Channel::Accelerometer => keys::ACCELEROMETER_SENSOR_NAME,
        Channel::Magnetometer => keys::MAGNETOMETER_SENSOR_NAME,
        Channel::Battery => keys::BATTERY_SENSOR_NAME,
    }
}

/// Display names of the reporting channels.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SensorNames {
    names: [String; 8],
}

impl Default for SensorNames {
    fn default() -> Self {
        Self {
            names: Channel::ALL.map(|channel| channel.name().to_string()),
        }
    }
}

impl SensorNames {
    pub fn get(&self, channel: Channel) -> &str {
        &self.names[channel as usize]
    }

    pub fn set(&mut self, channel: Channel, name: impl Into<String>) {
        self.names[channel as usize] = name.into();
    }
}

/// Which sensors are polled and how they are reported.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SensorConfig {
    pub temperature: bool,
    pub luminance: bool,
    pub humidity: bool,
    pub pressure: bool,
    /// Gyroscope, accelerometer and magnetometer together.
    pub movement: bool,
    pub battery: bool,
    pub names: SensorNames,
    pub accel_range: AccelRange,
    pub temperature_formula: TemperatureFormula,
}

impl Default for SensorConfig {
    fn default() -> Self {
        Self {
            temperature: true,
            luminance: false,
            humidity: false,
            pressure: false,
            movement: false,
            battery: false,
            names: SensorNames::default(),
            accel_range: AccelRange::default(),
            temperature_formula: TemperatureFormula::default(),
        }
    }
}

impl SensorConfig {
    pub fn is_enabled(&self, family: SensorFamily) -> bool {
        match family {
            SensorFamily::Temperature => self.temperature,
            SensorFamily::Luminance => self.luminance,
            SensorFamily::Humidity => self.humidity,
            SensorFamily::Pressure => self.pressure,
            SensorFamily::Movement => self.movement,
            SensorFamily::Battery => self.battery,
        }
    }

    pub fn set_enabled(&mut self, family: SensorFamily, enabled: bool) {
        let flag = match family {
            SensorFamily::Temperature => &mut self.temperature,
            SensorFamily::Luminance => &mut self.luminance,
            SensorFamily::Humidity => &mut self.humidity,
            SensorFamily::Pressure => &mut self.pressure,
            SensorFamily::Movement => &mut self.movement,
            SensorFamily::Battery => &mut self.battery,
        };
        *flag = enabled;
    }

    /// Enabled families in reporting order.
    pub fn enabled_families(&self) -> Vec<SensorFamily> {
        SensorFamily::ALL
            .iter()
            .copied()
            .filter(|family| self.is_enabled(*family))
            .collect()
    }

    pub fn decode_options(&self) -> DecodeOptions {
        DecodeOptions {
            temperature_formula: self.temperature_formula,
            accel_range: self.accel_range,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PluginConfig {
    pub bluetooth_address: String,
    /// May contain [`ADDRESS_PLACEHOLDER`].
    pub asset_name_prefix: String,
    /// Seconds, within 2..=5.
    pub connection_timeout: u64,
    /// Seconds allowed for shutdown to finish.
    pub shutdown_threshold: u64,
    pub sensors: SensorConfig,
}

impl Default for PluginConfig {
    fn default() -> Self {
        Self {
            bluetooth_address: "B0:91:22:EA:79:04".to_string(),
            asset_name_prefix: "CC2650/%M/".to_string(),
            connection_timeout: 3,
            shutdown_threshold: 10,
            sensors: SensorConfig::default(),
        }
    }
}

impl PluginConfig {
    /// Parse the host's configuration category. Missing keys take their
    /// defaults; the result is validated.
    pub fn from_category(category: &Value) -> Result<Self> {
        let category = Category::parse(category)?;
        let defaults = PluginConfig::default();

        let mut sensors = SensorConfig::default();
        for family in SensorFamily::ALL {
            let enabled = category.flag(enable_key(family), defaults.sensors.is_enabled(family))?;
            sensors.set_enabled(family, enabled);
        }
        for channel in Channel::ALL {
            if let Some(name) = category.text(name_key(channel)) {
                sensors.names.set(channel, name);
            }
        }
        if let Some(range) = category.text(keys::ACCELEROMETER_RANGE) {
            sensors.accel_range = range
                .trim()
                .parse::<u8>()
                .ok()
                .and_then(AccelRange::from_g)
                .ok_or_else(|| {
                    Error::InvalidConfig(format!("accelerometer range {:?} is not 2, 4, 8 or 16", range))
                })?;
        }
        if let Some(formula) = category.text(keys::TEMPERATURE_FORMULA) {
            sensors.temperature_formula = formula.trim().parse()?;
        }

        let config = PluginConfig {
            bluetooth_address: category
                .text(keys::BLUETOOTH_ADDRESS)
                .unwrap_or(defaults.bluetooth_address),
            asset_name_prefix: category
                .text(keys::ASSET_NAME_PREFIX)
                .unwrap_or(defaults.asset_name_prefix),
            connection_timeout: category
                .integer(keys::CONNECTION_TIMEOUT, defaults.connection_timeout)?,
            shutdown_threshold: category
                .integer(keys::SHUTDOWN_THRESHOLD, defaults.shutdown_threshold)?,
            sensors,
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if !(MIN_CONNECTION_TIMEOUT..=MAX_CONNECTION_TIMEOUT).contains(&self.connection_timeout) {
            return Err(Error::InvalidConfig(format!(
                "connection timeout {}s outside {}..={}",
                self.connection_timeout, MIN_CONNECTION_TIMEOUT, MAX_CONNECTION_TIMEOUT
            )));
        }

        if BDAddr::from_str(&self.bluetooth_address).is_err() {
            return Err(Error::InvalidConfig(format!(
                "{:?} is not a bluetooth address",
                self.bluetooth_address
            )));
        }

        Ok(())
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connection_timeout)
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_threshold)
    }

    /// The asset name prefix with the device address filled in.
    pub fn asset_prefix(&self) -> String {
        self.asset_name_prefix
            .replace(ADDRESS_PLACEHOLDER, &self.bluetooth_address)
    }

    /// Full asset name of a channel.
    pub fn asset_name(&self, channel: Channel) -> String {
        format!("{}{}", self.asset_prefix(), self.sensors.names.get(channel))
    }
}

#[derive(Deserialize)]
struct CategoryItem {
    value: Option<Value>,
    default: Option<Value>,
}

/// The host's `{key: {"value": .., "default": ..}}` document.
struct Category(HashMap<String, CategoryItem>);

impl Category {
    fn parse(category: &Value) -> Result<Self> {
        serde_json::from_value(category.clone())
            .map(Category)
            .map_err(|e| Error::InvalidConfig(e.to_string()))
    }

    /// The item's value, falling back to its default.
    fn text(&self, key: &str) -> Option<String> {
        let item = self.0.get(key)?;

        match item.value.as_ref().or(item.default.as_ref())? {
            Value::String(s) => Some(s.clone()),
            Value::Null => None,
            other => Some(other.to_string()),
        }
    }

    fn flag(&self, key: &str, default: bool) -> Result<bool> {
        match self.text(key) {
            None => Ok(default),
            Some(text) => match text.trim().to_ascii_lowercase().as_str() {
                "true" => Ok(true),
                "false" => Ok(false),
                _ => Err(Error::InvalidConfig(format!(
                    "{} must be \"true\" or \"false\", got {:?}",
                    key, text
                ))),
            },
        }
    }

    fn integer(&self, key: &str, default: u64) -> Result<u64> {
        match self.text(key) {
            None => Ok(default),
            Some(text) => text.trim().parse().map_err(|_| {
                Error::InvalidConfig(format!("{} must be an integer, got {:?}", key, text))
            }),
        }
    }
}
