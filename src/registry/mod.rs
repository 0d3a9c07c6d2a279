/// Host platform accessory registry
pub mod cache;

use crate::error::RegistryError;
use crate::models::{Characteristic, RegisteredDevice};
use crate::sync::identity::LocalId;

pub use cache::CachedRegistry;

/// The host-side registry the reconciler drives. At most one device exists
/// per `LocalId`; devices are only removed through `unregister`.
pub trait AccessoryRegistry: Send {
    fn device(&self, id: &LocalId) -> Option<&RegisteredDevice>;

    fn contains(&self, id: &LocalId) -> bool {
        self.device(id).is_some()
    }

    /// Register a new accessory. Fails if the id is already present.
    fn register(&mut self, device: RegisteredDevice) -> Result<(), RegistryError>;

    fn update_characteristic(
        &mut self,
        id: &LocalId,
        value: Characteristic,
    ) -> Result<(), RegistryError>;

    /// Remove accessories, returning how many were actually registered.
    fn unregister(&mut self, ids: &[LocalId]) -> Result<usize, RegistryError>;

    fn len(&self) -> usize;
}
