use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::RecordError;
use crate::sync::identity::LocalId;
use crate::utils::celsius_to_fahrenheit;

/// One entry of the `d` array returned by `GetTagList2`, kept undecoded so a
/// single malformed entry cannot fail the whole snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct RawTag(pub serde_json::Value);

impl RawTag {
    /// Best-effort serial for log lines, available before validation.
    pub fn serial_hint(&self) -> &str {
        self.0
            .get("uuid")
            .and_then(serde_json::Value::as_str)
            .unwrap_or("<no uuid>")
    }

    /// The display name, if the entry carries one as a string.
    pub fn name_hint(&self) -> Option<&str> {
        self.0.get("name").and_then(serde_json::Value::as_str)
    }
}

#[derive(Debug, Deserialize)]
struct WireTag {
    uuid: Option<String>,
    name: Option<String>,
    #[serde(rename = "slaveId")]
    slave_id: Option<i64>,
    #[serde(rename = "tagType")]
    tag_type: Option<i64>,
    temperature: Option<f64>,
    cap: Option<f64>,
    #[serde(rename = "batteryRemaining")]
    battery_remaining: Option<f64>,
    alive: Option<bool>,
    #[serde(rename = "OutOfRange")]
    out_of_range: Option<bool>,
    version1: Option<i64>,
}

/// A validated snapshot of one physical tag for the current poll.
#[derive(Debug, Clone, PartialEq)]
pub struct TagRecord {
    /// Persistent identifier assigned by the tag manager (`uuid`).
    pub serial: String,
    pub name: String,
    /// Addressing token for commands such as beep.
    pub slave_id: i64,
    pub tag_type: Option<i64>,
    /// Celsius.
    pub temperature: f64,
    pub humidity: Option<f64>,
    /// Set iff the `cap` field was present, even when its value is zero.
    pub has_humidity: bool,
    /// Fraction in 0.0..=1.0.
    pub battery_remaining: f64,
    pub alive: bool,
    pub out_of_range: bool,
    pub firmware: Option<i64>,
}

impl TagRecord {
    /// Occupancy as the tag manager reports presence: an inactive or
    /// out-of-range tag is away.
    pub fn is_present(&self) -> bool {
        self.alive && !self.out_of_range
    }
}

fn finite(field: &'static str, value: f64) -> Result<f64, RecordError> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(RecordError::NotFinite { field, value })
    }
}

impl TryFrom<&RawTag> for TagRecord {
    type Error = RecordError;

    fn try_from(raw: &RawTag) -> Result<Self, Self::Error> {
        let wire: WireTag = serde_json::from_value(raw.0.clone())
            .map_err(|e| RecordError::Malformed(e.to_string()))?;

        let serial = wire
            .uuid
            .filter(|s| !s.is_empty())
            .ok_or(RecordError::MissingField("uuid"))?;
        let name = wire.name.ok_or(RecordError::MissingField("name"))?;
        let slave_id = wire.slave_id.ok_or(RecordError::MissingField("slaveId"))?;
        let temperature = finite(
            "temperature",
            wire.temperature
                .ok_or(RecordError::MissingField("temperature"))?,
        )?;
        let battery_remaining = finite(
            "batteryRemaining",
            wire.battery_remaining
                .ok_or(RecordError::MissingField("batteryRemaining"))?,
        )?;
        let humidity = wire.cap.map(|v| finite("cap", v)).transpose()?;

        Ok(TagRecord {
            serial,
            name,
            slave_id,
            tag_type: wire.tag_type,
            temperature,
            has_humidity: humidity.is_some(),
            humidity,
            battery_remaining,
            alive: wire.alive.unwrap_or(false),
            out_of_range: wire.out_of_range.unwrap_or(true),
            firmware: wire.version1,
        })
    }
}

/// Unit the temperature characteristic is exposed in.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TemperatureUnit {
    #[default]
    Celsius,
    Fahrenheit,
}

impl TemperatureUnit {
    pub fn convert(self, celsius: f64) -> f64 {
        match self {
            TemperatureUnit::Celsius => celsius,
            TemperatureUnit::Fahrenheit => celsius_to_fahrenheit(celsius),
        }
    }
}

impl FromStr for TemperatureUnit {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "c" | "celsius" => Ok(TemperatureUnit::Celsius),
            "f" | "fahrenheit" => Ok(TemperatureUnit::Fahrenheit),
            other => Err(format!("expected celsius or fahrenheit, got {other:?}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BatteryStatus {
    Normal,
    Low,
}

/// A single characteristic write pushed to the host registry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Characteristic {
    Name(String),
    CurrentTemperature(f64),
    CurrentRelativeHumidity(u8),
    StatusLowBattery(BatteryStatus),
    OccupancyDetected(bool),
    FirmwareRevision(String),
}

impl fmt::Display for Characteristic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Characteristic::Name(name) => write!(f, "name={name}"),
            Characteristic::CurrentTemperature(t) => write!(f, "temperature={t:.2}"),
            Characteristic::CurrentRelativeHumidity(h) => write!(f, "humidity={h}%"),
            Characteristic::StatusLowBattery(b) => write!(f, "battery={b:?}"),
            Characteristic::OccupancyDetected(o) => write!(f, "occupancy={o}"),
            Characteristic::FirmwareRevision(v) => write!(f, "firmware={v}"),
        }
    }
}

/// Static identity metadata shown by the host for an accessory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceInfo {
    pub name: String,
    pub manufacturer: String,
    pub model: String,
    pub serial: String,
    pub firmware: Option<String>,
}

/// Last values written to a device's characteristics.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CharacteristicState {
    pub temperature: Option<f64>,
    pub humidity: Option<u8>,
    pub battery: Option<BatteryStatus>,
    pub occupancy: Option<bool>,
}

/// An accessory exposed to the host, keyed by its `LocalId`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegisteredDevice {
    pub id: LocalId,
    pub info: DeviceInfo,
    pub has_humidity: bool,
    #[serde(skip)]
    pub state: CharacteristicState,
}

impl RegisteredDevice {
    pub fn new(id: LocalId, info: DeviceInfo, has_humidity: bool) -> Self {
        RegisteredDevice {
            id,
            info,
            has_humidity,
            state: CharacteristicState::default(),
        }
    }
}
