//! This example polls every sensor of a SensorTag a few times and prints the
//! readings as JSON. The device address should be given as a command line
//! argument.

use std::time::Duration;

use sensortag::{BtleTransport, Error, PluginConfig, ScanConfig, SensorFamily, SensorTag};

#[tokio::main]
async fn main() -> Result<(), Error> {
    pretty_env_logger::init();

    let mut config = PluginConfig::default();
    if let Some(address) = std::env::args().nth(1) {
        config.bluetooth_address = address;
    }
    for family in SensorFamily::ALL {
        config.sensors.set_enabled(family, true);
    }

    let tag = SensorTag::init(BtleTransport::new(ScanConfig::default()), config).await?;

    for _ in 0..5 {
        match tag.poll().await {
            Ok(batch) => {
                for reading in batch {
                    println!("{}", serde_json::to_string(&reading).unwrap());
                }
            }
            Err(e) if e.is_retryable() => println!("Poll failed, retrying: {}", e),
            Err(e) => return Err(e),
        }

        tokio::time::sleep(Duration::from_secs(1)).await;
    }

    tag.shutdown().await
}
