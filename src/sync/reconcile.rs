use log::{debug, error};

use crate::error::{BridgeError, RegistryError};
use crate::models::{DeviceInfo, RawTag, RegisteredDevice, TagRecord};
use crate::registry::AccessoryRegistry;
use crate::sync::identity::{IdentityMapper, LocalId};
use crate::sync::projector::Projector;
use crate::utils::model_name;

pub const MANUFACTURER: &str = "SmartHome";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    Added,
    Updated,
    Ignored,
}

/// Per-snapshot tally, logged once per poll cycle.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ReconcileReport {
    pub added: usize,
    pub updated: usize,
    pub ignored: usize,
    pub failed: usize,
}

/// Diffs fetched snapshots against the accessory registry.
///
/// Owns the registry and the identity table so a single value carries all
/// state that must survive between polls.
#[derive(Debug)]
pub struct Reconciler<R> {
    registry: R,
    identities: IdentityMapper,
    ignore_names: Vec<String>,
    projector: Projector,
}

impl<R: AccessoryRegistry> Reconciler<R> {
    pub fn new(registry: R, ignore_names: Vec<String>, projector: Projector) -> Self {
        Reconciler {
            registry,
            identities: IdentityMapper::new(),
            ignore_names,
            projector,
        }
    }

    pub fn registry(&self) -> &R {
        &self.registry
    }

    pub fn is_ignored(&self, name: &str) -> bool {
        self.ignore_names.iter().any(|rule| name.contains(rule.as_str()))
    }

    /// Apply one snapshot, record by record, in order. A failing record is
    /// logged and counted; it never stops the records after it.
    pub fn reconcile(&mut self, snapshot: &[RawTag]) -> ReconcileReport {
        let mut report = ReconcileReport::default();

        for raw in snapshot {
            match self.reconcile_one(raw) {
                Ok(Outcome::Added) => report.added += 1,
                Ok(Outcome::Updated) => report.updated += 1,
                Ok(Outcome::Ignored) => report.ignored += 1,
                Err(e) => {
                    error!("Failed to reconcile tag {}: {}", raw.serial_hint(), e);
                    report.failed += 1;
                }
            }
        }

        report
    }

    fn reconcile_one(&mut self, raw: &RawTag) -> Result<Outcome, BridgeError> {
        // Ignored names are skipped before validation, so a malformed entry
        // the operator filtered out never shows up as a failure.
        if let Some(name) = raw.name_hint().filter(|name| self.is_ignored(name)) {
            debug!("Ignoring tag {} ({})", name, raw.serial_hint());
            return Ok(Outcome::Ignored);
        }

        let record = TagRecord::try_from(raw).map_err(|source| BridgeError::Record {
            serial: raw.serial_hint().to_string(),
            source,
        })?;
        let id = self.identities.resolve(&record.serial);

        // Checked per record, so a serial repeated within one snapshot
        // registers once and then takes the update path.
        if self.registry.contains(&id) {
            self.projector.apply(&mut self.registry, &id, &record)?;
            Ok(Outcome::Updated)
        } else {
            self.add(id, &record)?;
            Ok(Outcome::Added)
        }
    }

    fn add(&mut self, id: LocalId, record: &TagRecord) -> Result<(), BridgeError> {
        let info = DeviceInfo {
            name: record.name.clone(),
            manufacturer: MANUFACTURER.to_string(),
            model: model_name(record.tag_type).to_string(),
            serial: record.serial.clone(),
            firmware: record.firmware.map(|f| f.to_string()),
        };
        self.registry
            .register(RegisteredDevice::new(id, info, record.has_humidity))?;

        // Populate initial values from the same record.
        self.projector.apply(&mut self.registry, &id, record)?;
        Ok(())
    }

    /// Operator removal: unregister the accessories for these serials.
    pub fn forget(&mut self, serials: &[String]) -> Result<usize, RegistryError> {
        let ids: Vec<LocalId> = serials
            .iter()
            .map(|serial| {
                let id = self.identities.resolve(serial);
                self.identities.forget(serial);
                self.projector.slaves().remove(&id);
                id
            })
            .collect();
        self.registry.unregister(&ids)
    }
}
