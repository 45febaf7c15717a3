//! Conversion of raw characteristic bytes into physical units.
//!
//! Every converter checks the payload length first and fails with
//! [`Error::MalformedPayload`] rather than decoding a truncated register.

use std::collections::BTreeMap;
use std::str::FromStr;

use crate::registry::{Channel, SensorFamily};
use crate::{Error, Result};

pub const TEMPERATURE_LEN: usize = 4;
pub const LUMINANCE_LEN: usize = 2;
pub const HUMIDITY_LEN: usize = 4;
pub const PRESSURE_LEN: usize = 6;
pub const MOVEMENT_LEN: usize = 18;
pub const BATTERY_LEN: usize = 1;

/// Degrees Celsius per LSB of the 14-bit IR temperature registers.
const TEMPERATURE_SCALE: f64 = 0.03125;

/// Volts per LSB of the raw thermopile voltage register.
const THERMOPILE_VOLTAGE_SCALE: f64 = 156.25e-9;

const KELVIN_OFFSET: f64 = 273.15;

/// Thermopile calibration constants from the TMP006 user guide.
mod thermopile {
    pub const S0: f64 = 6.4e-14;
    pub const A1: f64 = 1.75e-3;
    pub const A2: f64 = -1.678e-5;
    pub const T_REF: f64 = 298.15;
    pub const B0: f64 = -2.94e-5;
    pub const B1: f64 = -5.7e-7;
    pub const B2: f64 = 4.63e-9;
    pub const C2: f64 = 13.4;
}

const LUX_SCALE: f64 = 0.01;

/// Gyroscope full scale in degrees per second over the 16-bit range.
const GYRO_RANGE: f64 = 500.0;

/// How the object temperature register is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TemperatureFormula {
    /// The sensor reports a compensated object temperature (CC2650 / TMP007).
    #[default]
    Linearized,
    /// The sensor reports the raw thermopile voltage (TMP006 layout), the
    /// object temperature is derived from it and the die temperature.
    Thermopile,
}

impl FromStr for TemperatureFormula {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "linearized" => Ok(TemperatureFormula::Linearized),
            "thermopile" => Ok(TemperatureFormula::Thermopile),
            other => Err(Error::InvalidConfig(format!(
                "unknown temperature formula {:?}",
                other
            ))),
        }
    }
}

/// Accelerometer full-scale range, selected by the movement configuration
/// write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AccelRange {
    G2,
    G4,
    #[default]
    G8,
    G16,
}

impl AccelRange {
    /// Range selector as written to the second configuration byte.
    pub fn bits(self) -> u8 {
        match self {
            AccelRange::G2 => 0,
            AccelRange::G4 => 1,
            AccelRange::G8 => 2,
            AccelRange::G16 => 3,
        }
    }

    /// Full scale in G.
    pub fn g(self) -> f64 {
        match self {
            AccelRange::G2 => 2.0,
            AccelRange::G4 => 4.0,
            AccelRange::G8 => 8.0,
            AccelRange::G16 => 16.0,
        }
    }

    pub fn from_g(g: u8) -> Option<Self> {
        match g {
            2 => Some(AccelRange::G2),
            4 => Some(AccelRange::G4),
            8 => Some(AccelRange::G8),
            16 => Some(AccelRange::G16),
            _ => None,
        }
    }
}

/// Settings that change how raw bytes are turned into units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DecodeOptions {
    pub temperature_formula: TemperatureFormula,
    pub accel_range: AccelRange,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Axes {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Movement {
    pub gyroscope: Axes,
    pub accelerometer: Axes,
    pub magnetometer: Axes,
}

/// A decoded sample of one sensor family.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SensorValue {
    Temperature { object: f64, ambient: f64 },
    Luminance { lux: f64 },
    Humidity { humidity: f64, temperature: f64 },
    Pressure { pressure: f64 },
    Movement(Movement),
    Battery { percentage: f64 },
}

impl SensorValue {
    /// Field maps per reporting channel, in channel order.
    pub fn channel_fields(&self) -> Vec<(Channel, BTreeMap<&'static str, f64>)> {
        fn axes(axes: &Axes) -> BTreeMap<&'static str, f64> {
            BTreeMap::from([("x", axes.x), ("y", axes.y), ("z", axes.z)])
        }

        match self {
            SensorValue::Temperature { object, ambient } => vec![(
                Channel::Temperature,
                BTreeMap::from([("object", *object), ("ambient", *ambient)]),
            )],
            SensorValue::Luminance { lux } => {
                vec![(Channel::Luminance, BTreeMap::from([("lux", *lux)]))]
            }
            SensorValue::Humidity {
                humidity,
                temperature,
            } => vec![(
                Channel::Humidity,
                BTreeMap::from([("humidity", *humidity), ("temperature", *temperature)]),
            )],
            SensorValue::Pressure { pressure } => {
                vec![(Channel::Pressure, BTreeMap::from([("pressure", *pressure)]))]
            }
            SensorValue::Movement(movement) => vec![
                (Channel::Gyroscope, axes(&movement.gyroscope)),
                (Channel::Accelerometer, axes(&movement.accelerometer)),
                (Channel::Magnetometer, axes(&movement.magnetometer)),
            ],
            SensorValue::Battery { percentage } => vec![(
                Channel::Battery,
                BTreeMap::from([("percentage", *percentage)]),
            )],
        }
    }
}

/// Decode the data characteristic bytes of `family`.
pub fn decode(family: SensorFamily, raw: &[u8], options: DecodeOptions) -> Result<SensorValue> {
    Ok(match family {
        SensorFamily::Temperature => {
            let (object, ambient) = temperature(raw, options.temperature_formula)?;
            SensorValue::Temperature { object, ambient }
        }
        SensorFamily::Luminance => SensorValue::Luminance {
            lux: luminance(raw)?,
        },
        SensorFamily::Humidity => {
            let (humidity, temperature) = humidity(raw)?;
            SensorValue::Humidity {
                humidity,
                temperature,
            }
        }
        SensorFamily::Pressure => SensorValue::Pressure {
            pressure: pressure(raw)?,
        },
        SensorFamily::Movement => SensorValue::Movement(movement(raw, options.accel_range)?),
        SensorFamily::Battery => SensorValue::Battery {
            percentage: battery(raw)?,
        },
    })
}

fn check_len(sensor: &'static str, raw: &[u8], expected: usize) -> Result<()> {
    if raw.len() == expected {
        Ok(())
    } else {
        Err(Error::MalformedPayload {
            sensor,
            expected,
            actual: raw.len(),
        })
    }
}

fn i16_at(raw: &[u8], offset: usize) -> i16 {
    i16::from_le_bytes([raw[offset], raw[offset + 1]])
}

fn u16_at(raw: &[u8], offset: usize) -> u16 {
    u16::from_le_bytes([raw[offset], raw[offset + 1]])
}

fn u24_at(raw: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes([raw[offset], raw[offset + 1], raw[offset + 2], 0])
}

/// Object and ambient temperature in °C.
pub fn temperature(raw: &[u8], formula: TemperatureFormula) -> Result<(f64, f64)> {
    check_len("temperature", raw, TEMPERATURE_LEN)?;

    let raw_object = i16_at(raw, 0);
    let ambient = f64::from(i16_at(raw, 2) >> 2) * TEMPERATURE_SCALE;

    let object = match formula {
        TemperatureFormula::Linearized => f64::from(raw_object >> 2) * TEMPERATURE_SCALE,
        TemperatureFormula::Thermopile => thermopile_object(raw_object, ambient),
    };

    Ok((object, ambient))
}

/// Object temperature from the thermopile voltage, corrected for the die
/// temperature.
fn thermopile_object(raw_voltage: i16, die_celsius: f64) -> f64 {
    use thermopile::*;

    let v_obj = f64::from(raw_voltage) * THERMOPILE_VOLTAGE_SCALE;
    let t_die = die_celsius + KELVIN_OFFSET;
    let dt = t_die - T_REF;

    let sensitivity = S0 * (1.0 + A1 * dt + A2 * dt * dt);
    let v_offset = B0 + B1 * dt + B2 * dt * dt;
    let seebeck = (v_obj - v_offset) + C2 * (v_obj - v_offset).powi(2);

    (t_die.powi(4) + seebeck / sensitivity).powf(0.25) - KELVIN_OFFSET
}

/// Illuminance in lux.
pub fn luminance(raw: &[u8]) -> Result<f64> {
    check_len("luminance", raw, LUMINANCE_LEN)?;

    let value = u32::from(u16_at(raw, 0));
    let mantissa = value & 0x0FFF;
    let exponent = value >> 12;

    Ok(f64::from(mantissa << exponent) * LUX_SCALE)
}

/// Relative humidity in % and temperature in °C.
pub fn humidity(raw: &[u8]) -> Result<(f64, f64)> {
    check_len("humidity", raw, HUMIDITY_LEN)?;

    let raw_temperature = f64::from(u16_at(raw, 0));
    let raw_humidity = f64::from(u16_at(raw, 2) & !0x0003);

    let temperature = raw_temperature / 65536.0 * 165.0 - 40.0;
    let humidity = raw_humidity / 65536.0 * 100.0;

    Ok((humidity, temperature))
}

/// Barometric pressure in hPa.
pub fn pressure(raw: &[u8]) -> Result<f64> {
    check_len("pressure", raw, PRESSURE_LEN)?;

    Ok(f64::from(u24_at(raw, 3)) / 100.0)
}

/// Gyroscope (°/s), accelerometer (G) and magnetometer (µT) axes.
pub fn movement(raw: &[u8], range: AccelRange) -> Result<Movement> {
    check_len("movement", raw, MOVEMENT_LEN)?;

    let word = |index: usize| f64::from(i16_at(raw, index * 2));
    let axes = |first: usize, scale: f64| Axes {
        x: word(first) * scale,
        y: word(first + 1) * scale,
        z: word(first + 2) * scale,
    };

    Ok(Movement {
        gyroscope: axes(0, GYRO_RANGE / 65536.0),
        accelerometer: axes(3, range.g() / 32768.0),
        magnetometer: axes(6, 1.0),
    })
}

/// Battery level in percent.
pub fn battery(raw: &[u8]) -> Result<f64> {
    check_len("battery", raw, BATTERY_LEN)?;

    Ok(f64::from(raw[0]))
}
