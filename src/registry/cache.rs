use log::{debug, error, info};
use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use super::AccessoryRegistry;
use crate::error::RegistryError;
use crate::models::{Characteristic, RegisteredDevice};
use crate::sync::identity::LocalId;

/// In-process accessory registry that mirrors device descriptors to a JSON
/// cache file, so a restart rehydrates the same accessories instead of
/// registering them again.
#[derive(Debug, Default)]
pub struct CachedRegistry {
    devices: HashMap<LocalId, RegisteredDevice>,
    cache_file: Option<PathBuf>,
}

impl CachedRegistry {
    /// A registry with no backing file.
    #[cfg(test)]
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Load the cache file if it exists; a missing file is an empty registry.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, RegistryError> {
        let path = path.into();
        let devices = match fs::read_to_string(&path) {
            Ok(contents) => {
                let cached: Vec<RegisteredDevice> = serde_json::from_str(&contents)?;
                cached.into_iter().map(|d| (d.id, d)).collect()
            }
            Err(e) if e.kind() == ErrorKind::NotFound => HashMap::new(),
            Err(e) => return Err(e.into()),
        };

        info!(
            "Rehydrated {} cached accessories from {}",
            devices.len(),
            path.display()
        );

        Ok(CachedRegistry {
            devices,
            cache_file: Some(path),
        })
    }

    pub fn devices(&self) -> impl Iterator<Item = &RegisteredDevice> {
        self.devices.values()
    }

    /// Mirror the registry to the cache file. The in-memory map stays
    /// authoritative: a failed write is logged and retried on the next change.
    fn persist(&self) {
        let Some(path) = &self.cache_file else {
            return;
        };

        match self.write_cache(path) {
            Ok(count) => debug!("Wrote {} accessories to {}", count, path.display()),
            Err(e) => error!("Failed to write accessory cache {}: {}", path.display(), e),
        }
    }

    fn write_cache(&self, path: &Path) -> Result<usize, RegistryError> {
        let mut cached: Vec<&RegisteredDevice> = self.devices.values().collect();
        cached.sort_by(|a, b| a.info.serial.cmp(&b.info.serial));
        let json = serde_json::to_string_pretty(&cached)?;

        write_atomically(path, &json)?;
        Ok(cached.len())
    }
}

fn write_atomically(path: &Path, contents: &str) -> std::io::Result<()> {
    let tmp = path.with_extension("tmp");
    fs::write(&tmp, contents)?;
    fs::rename(&tmp, path)
}

impl AccessoryRegistry for CachedRegistry {
    fn device(&self, id: &LocalId) -> Option<&RegisteredDevice> {
        self.devices.get(id)
    }

    fn register(&mut self, device: RegisteredDevice) -> Result<(), RegistryError> {
        if self.devices.contains_key(&device.id) {
            return Err(RegistryError::AlreadyRegistered(device.id));
        }
        info!(
            "Registered accessory {} ({}, {}, serial {})",
            device.id, device.info.name, device.info.model, device.info.serial
        );
        self.devices.insert(device.id, device);
        self.persist();
        Ok(())
    }

    fn update_characteristic(
        &mut self,
        id: &LocalId,
        value: Characteristic,
    ) -> Result<(), RegistryError> {
        let device = self
            .devices
            .get_mut(id)
            .ok_or(RegistryError::UnknownDevice(*id))?;
        debug!("{} <- {}", device.info.name, value);

        let mut descriptor_changed = false;
        match value {
            Characteristic::Name(name) => {
                if device.info.name != name {
                    info!("Renaming accessory {} from {} to {}", id, device.info.name, name);
                    device.info.name = name;
                    descriptor_changed = true;
                }
            }
            Characteristic::FirmwareRevision(revision) => {
                if device.info.firmware.as_deref() != Some(revision.as_str()) {
                    device.info.firmware = Some(revision);
                    descriptor_changed = true;
                }
            }
            Characteristic::CurrentTemperature(t) => device.state.temperature = Some(t),
            Characteristic::CurrentRelativeHumidity(h) => {
                if !device.has_humidity {
                    return Err(RegistryError::UnsupportedCharacteristic(*id));
                }
                device.state.humidity = Some(h);
            }
            Characteristic::StatusLowBattery(b) => device.state.battery = Some(b),
            Characteristic::OccupancyDetected(o) => device.state.occupancy = Some(o),
        }

        if descriptor_changed {
            self.persist();
        }
        Ok(())
    }

    fn unregister(&mut self, ids: &[LocalId]) -> Result<usize, RegistryError> {
        let removed = ids
            .iter()
            .filter_map(|id| self.devices.remove(id))
            .inspect(|d| info!("Unregistered accessory {} ({})", d.id, d.info.name))
            .count();
        if removed > 0 {
            self.persist();
        }
        Ok(removed)
    }

    fn len(&self) -> usize {
        self.devices.len()
    }
}
