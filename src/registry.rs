//! Static descriptors of the SensorTag sensor families, and the
//! per-session copies whose handles get filled in by discovery.

use std::fmt;

use uuid::Uuid;

use crate::common::characteristics::*;
use crate::convert::AccelRange;
use crate::transport::Handle;

/// A physical sensor on the device, enabled and read as one unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SensorFamily {
    Temperature,
    Luminance,
    Humidity,
    Pressure,
    Movement,
    Battery,
}

impl SensorFamily {
    /// All families in reporting order.
    pub const ALL: [SensorFamily; 6] = [
        SensorFamily::Temperature,
        SensorFamily::Luminance,
        SensorFamily::Humidity,
        SensorFamily::Pressure,
        SensorFamily::Movement,
        SensorFamily::Battery,
    ];

    pub fn name(self) -> &'static str {
        match self {
            SensorFamily::Temperature => "temperature",
            SensorFamily::Luminance => "luminance",
            SensorFamily::Humidity => "humidity",
            SensorFamily::Pressure => "pressure",
            SensorFamily::Movement => "movement",
            SensorFamily::Battery => "battery",
        }
    }

    /// The reading streams one read of this family produces.
    pub fn channels(self) -> &'static [Channel] {
        match self {
            SensorFamily::Temperature => &[Channel::Temperature],
            SensorFamily::Luminance => &[Channel::Luminance],
            SensorFamily::Humidity => &[Channel::Humidity],
            SensorFamily::Pressure => &[Channel::Pressure],
            SensorFamily::Movement => &[
                Channel::Gyroscope,
                Channel::Accelerometer,
                Channel::Magnetometer,
            ],
            SensorFamily::Battery => &[Channel::Battery],
        }
    }

    /// Bytes written to the configuration characteristic to start sampling.
    ///
    /// Movement sets the gyro xyz, accel xyz and magnetometer bits in the
    /// first byte and carries the accelerometer range in the second.
    pub fn enable_value(self, range: AccelRange) -> Vec<u8> {
        match self {
            SensorFamily::Movement => vec![0x7F, range.bits()],
            _ => vec![0x01],
        }
    }

    /// Bytes written to the configuration characteristic to stop sampling.
    pub fn disable_value(self) -> Vec<u8> {
        match self {
            SensorFamily::Movement => vec![0x00, 0x00],
            _ => vec![0x00],
        }
    }

    /// The descriptor template for this family, with no handles resolved.
    pub fn descriptor(self) -> SensorDescriptor {
        let (data, configuration, period) = match self {
            SensorFamily::Temperature => (
                TEMPERATURE_DATA,
                Some(TEMPERATURE_CONFIGURATION),
                Some(TEMPERATURE_PERIOD),
            ),
            SensorFamily::Luminance => (
                LUMINANCE_DATA,
                Some(LUMINANCE_CONFIGURATION),
                Some(LUMINANCE_PERIOD),
            ),
            SensorFamily::Humidity => (
                HUMIDITY_DATA,
                Some(HUMIDITY_CONFIGURATION),
                Some(HUMIDITY_PERIOD),
            ),
            SensorFamily::Pressure => (
                PRESSURE_DATA,
                Some(PRESSURE_CONFIGURATION),
                Some(PRESSURE_PERIOD),
            ),
            SensorFamily::Movement => (
                MOVEMENT_DATA,
                Some(MOVEMENT_CONFIGURATION),
                Some(MOVEMENT_PERIOD),
            ),
            SensorFamily::Battery => (BATTERY_LEVEL, None, None),
        };

        SensorDescriptor {
            family: self,
            data_uuid: data,
            configuration_uuid: configuration,
            period_uuid: period,
            data_handle: None,
            configuration_handle: None,
            period_handle: None,
        }
    }
}

impl fmt::Display for SensorFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A named stream of readings reported to the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Channel {
    Temperature,
    Luminance,
    Humidity,
    Pressure,
    Gyroscope,
    Accelerometer,
    Magnetometer,
    Battery,
}

impl Channel {
    pub const ALL: [Channel; 8] = [
        Channel::Temperature,
        Channel::Luminance,
        Channel::Humidity,
        Channel::Pressure,
        Channel::Gyroscope,
        Channel::Accelerometer,
        Channel::Magnetometer,
        Channel::Battery,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Channel::Temperature => "temperature",
            Channel::Luminance => "luminance",
            Channel::Humidity => "humidity",
            Channel::Pressure => "pressure",
            Channel::Gyroscope => "gyroscope",
            Channel::Accelerometer => "accelerometer",
            Channel::Magnetometer => "magnetometer",
            Channel::Battery => "battery",
        }
    }

    pub fn family(self) -> SensorFamily {
        match self {
            Channel::Temperature => SensorFamily::Temperature,
            Channel::Luminance => SensorFamily::Luminance,
            Channel::Humidity => SensorFamily::Humidity,
            Channel::Pressure => SensorFamily::Pressure,
            Channel::Gyroscope | Channel::Accelerometer | Channel::Magnetometer => {
                SensorFamily::Movement
            }
            Channel::Battery => SensorFamily::Battery,
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// UUIDs of one sensor family's characteristics and, once discovered, their
/// handles.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SensorDescriptor {
    pub family: SensorFamily,
    pub data_uuid: Uuid,
    pub configuration_uuid: Option<Uuid>,
    pub period_uuid: Option<Uuid>,
    pub data_handle: Option<Handle>,
    pub configuration_handle: Option<Handle>,
    pub period_handle: Option<Handle>,
}

impl SensorDescriptor {
    /// Every UUID this descriptor needs resolved.
    pub fn uuids(&self) -> impl Iterator<Item = Uuid> {
        std::iter::once(self.data_uuid)
            .chain(self.configuration_uuid)
            .chain(self.period_uuid)
    }

    pub fn is_resolved(&self) -> bool {
        self.data_handle.is_some()
            && self.configuration_uuid.is_some() == self.configuration_handle.is_some()
            && self.period_uuid.is_some() == self.period_handle.is_some()
    }

    pub(crate) fn clear_handles(&mut self) {
        self.data_handle = None;
        self.configuration_handle = None;
        self.period_handle = None;
    }
}
