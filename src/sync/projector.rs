/// Projects tag readings onto a registered accessory's characteristics
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use crate::error::RegistryError;
use crate::models::{BatteryStatus, Characteristic, TagRecord, TemperatureUnit};
use crate::registry::AccessoryRegistry;
use crate::sync::identity::LocalId;

/// Battery fractions strictly below this report `Low`.
pub const LOW_BATTERY_THRESHOLD: f64 = 0.40;

pub fn battery_status(remaining: f64) -> BatteryStatus {
    if remaining < LOW_BATTERY_THRESHOLD {
        BatteryStatus::Low
    } else {
        BatteryStatus::Normal
    }
}

/// Round a humidity reading to a whole percentage.
pub fn humidity_percent(value: f64) -> u8 {
    // Clamped first, so the cast cannot truncate.
    value.round().clamp(0.0, 100.0) as u8
}

/// Slave ids last seen for each accessory, shared with the identify handler.
#[derive(Debug, Clone, Default)]
pub struct SlaveDirectory {
    inner: Arc<Mutex<HashMap<LocalId, i64>>>,
}

impl SlaveDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, id: LocalId, slave_id: i64) {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id, slave_id);
    }

    pub fn get(&self, id: &LocalId) -> Option<i64> {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(id)
            .copied()
    }

    pub fn remove(&self, id: &LocalId) -> Option<i64> {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(id)
    }
}

/// Update path: writes one record's readings onto an existing device.
#[derive(Debug, Clone)]
pub struct Projector {
    unit: TemperatureUnit,
    slaves: SlaveDirectory,
}

impl Projector {
    pub fn new(unit: TemperatureUnit, slaves: SlaveDirectory) -> Self {
        Projector { unit, slaves }
    }

    pub fn slaves(&self) -> &SlaveDirectory {
        &self.slaves
    }

    /// The characteristic writes for `record`. Humidity is included only for
    /// devices that were registered with a humidity service.
    pub fn characteristics(&self, record: &TagRecord, has_humidity: bool) -> Vec<Characteristic> {
        let mut values = vec![Characteristic::CurrentTemperature(
            self.unit.convert(record.temperature),
        )];
        if has_humidity {
            if let Some(humidity) = record.humidity {
                values.push(Characteristic::CurrentRelativeHumidity(humidity_percent(
                    humidity,
                )));
            }
        }
        values.push(Characteristic::StatusLowBattery(battery_status(
            record.battery_remaining,
        )));
        values.push(Characteristic::OccupancyDetected(record.is_present()));
        if let Some(firmware) = record.firmware {
            values.push(Characteristic::FirmwareRevision(firmware.to_string()));
        }
        values
    }

    pub fn apply<R>(
        &self,
        registry: &mut R,
        id: &LocalId,
        record: &TagRecord,
    ) -> Result<(), RegistryError>
    where
        R: AccessoryRegistry + ?Sized,
    {
        let device = registry
            .device(id)
            .ok_or(RegistryError::UnknownDevice(*id))?;
        let has_humidity = device.has_humidity;
        let renamed = device.info.name != record.name;

        // Cached first, so identify works even if a write below fails.
        self.slaves.record(*id, record.slave_id);

        if renamed {
            registry.update_characteristic(id, Characteristic::Name(record.name.clone()))?;
        }
        for value in self.characteristics(record, has_humidity) {
            registry.update_characteristic(id, value)?;
        }
        Ok(())
    }
}
