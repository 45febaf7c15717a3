//! Polling driver for the TI CC2650 SensorTag.
//!
//! The crate connects to a SensorTag over BLE, resolves the characteristic
//! handles of its sensors, switches the configured sensors on and turns
//! their raw register bytes into timestamped readings in physical units.
//! A failed poll tears the connection down and brings it up again, so the
//! next poll can succeed.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use sensortag::{BtleTransport, Error, PluginConfig, ScanConfig, SensorTag};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Error> {
//!     pretty_env_logger::init();
//!
//!     let mut config = PluginConfig::default();
//!     config.bluetooth_address = "B0:91:22:EA:79:04".to_string();
//!     config.sensors.humidity = true;
//!
//!     let transport = BtleTransport::new(ScanConfig::default());
//!     let tag = SensorTag::init(transport, config).await?;
//!
//!     for reading in tag.poll().await? {
//!         println!("{} {:?}", reading.asset, reading.readings);
//!     }
//!
//!     tag.shutdown().await
//! }
//!```

#![warn(clippy::all, future_incompatible, nonstandard_style, rust_2018_idioms)]

pub use btleplug::api::BDAddr;

pub use config::{PluginConfig, SensorConfig, SensorNames};
pub use convert::{AccelRange, DecodeOptions, SensorValue, TemperatureFormula};
pub use device::BtleTransport;
pub use error::{Error, Result};
pub use plugin::SensorTag;
pub use reading::{Reading, ReadingBatch};
pub use reconfigure::{ConfigKey, Reconfiguration};
pub use registry::{Channel, SensorDescriptor, SensorFamily};
pub use scanner::ScanConfig;
pub use session::{DeviceSession, SessionState};
pub use transport::{Handle, Transport};

mod device;
mod error;
mod plugin;
mod reading;
mod scanner;

pub mod common;
pub mod config;
pub mod convert;
pub mod poll;
pub mod reconfigure;
pub mod registry;
pub mod session;
pub mod transport;
