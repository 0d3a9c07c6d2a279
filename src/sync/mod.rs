pub mod identity;
pub mod projector;
pub mod reconcile;
pub mod scheduler;

#[cfg(test)]
pub mod test_support;

pub use identity::LocalId;
pub use projector::{Projector, SlaveDirectory};
pub use reconcile::Reconciler;
pub use scheduler::{PollSettings, Poller};
