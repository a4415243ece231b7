pub mod blob;
pub mod cache;
pub mod dedup;
pub mod error;
pub mod hash;
pub mod reconcile;
pub mod stats;

pub use blob::{BlobStore, BlobStoreRef, FsBlobStore};
pub use cache::{LocalFileCache, ReconcileReport};
pub use dedup::FileDedupStore;
pub use error::FileError;
pub use hash::content_hash;
pub use reconcile::run_reconcile_loop;
pub use stats::{FileStats, FileStatsSnapshot};
