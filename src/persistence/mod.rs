//! Resilient entity store.
//!
//! Mutations go through the [`ErrorHandlingManager`](crate::manager::ErrorHandlingManager)
//! and a transaction log. When the backend fails its startup integrity check
//! or a recovery strategy bypasses it, the store switches to an in-memory
//! fallback with per-entry expiry.

mod backend;
mod backup;
mod entity;
mod fallback;
mod sled_backend;
mod store;
mod transaction;

pub use backend::PersistenceBackend;
pub use backup::{BackupFile, BackupInfo, BackupManager};
pub use entity::{entity_key, Entity, EntityKind, StoredEntity};
pub use fallback::{ExpiringCache, FallbackEntry};
pub use sled_backend::SledBackend;
pub use store::{MaintenanceReport, ResilientStore, StoreAck, StoreConfig};
pub use transaction::{MutationKind, TransactionLog, TransactionRecord, TransactionStatus};
