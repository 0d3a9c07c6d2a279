use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use uuid::Uuid;

/// Namespace for name-based (v5) local identifiers. Changing it would give
/// every cached accessory a new identity on the next start.
const LOCAL_ID_NAMESPACE: Uuid = Uuid::from_u128(0x6b1f_3c52_9a0e_4d7b_8e21_5f0c_a4d3_9e17);

/// Host-side identifier of an accessory, derived from the tag's serial.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LocalId(Uuid);

impl LocalId {
    /// Deterministic across processes: the same serial always yields the same id.
    pub fn derive(serial: &str) -> Self {
        LocalId(Uuid::new_v5(&LOCAL_ID_NAMESPACE, serial.as_bytes()))
    }
}

impl fmt::Display for LocalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Memoizes serial -> `LocalId` for the lifetime of the process.
#[derive(Debug, Default)]
pub struct IdentityMapper {
    table: HashMap<String, LocalId>,
}

impl IdentityMapper {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn resolve(&mut self, serial: &str) -> LocalId {
        if let Some(id) = self.table.get(serial) {
            return *id;
        }
        let id = LocalId::derive(serial);
        self.table.insert(serial.to_string(), id);
        id
    }

    pub fn forget(&mut self, serial: &str) -> Option<LocalId> {
        self.table.remove(serial)
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.table.len()
    }
}
