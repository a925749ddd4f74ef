pub mod models;
pub mod store;
pub mod sync;

pub use models::{CatalogEntry, SyncOutcome};
pub use store::CatalogStore;
pub use sync::CatalogSyncCoordinator;
