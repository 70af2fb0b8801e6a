//! Media catalog storage.
//!
//! The catalog is a reference-counted table of media filenames with content
//! hashes, plus an append-only log of deletion tombstones. It is accessed
//! exclusively through [`CatalogStore`]:
//! - [`SqliteCatalog`] persists it in the deck database
//! - [`MemoryCatalog`] keeps it in process (tests, scratch collections)

mod memory;
mod sqlite;
mod traits;

pub use memory::MemoryCatalog;
pub use sqlite::SqliteCatalog;
pub use traits::{CatalogEntry, CatalogStore, DeletionRecord, HashUpdate, UpsertOutcome};

use chrono::Utc;

/// Current time as fractional seconds since the Unix epoch.
pub fn timestamp_now() -> f64 {
    Utc::now().timestamp_micros() as f64 / 1_000_000.0
}

/// Generate a positive random 63-bit catalog id.
pub(crate) fn generate_id() -> i64 {
    (rand::random::<u64>() >> 1) as i64
}
