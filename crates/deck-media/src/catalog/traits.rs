//! Catalog store trait and row types.

use crate::error::Result;
use crate::media::{checksum_file_or_empty, media_path};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::debug;

/// One known media filename and its bookkeeping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogEntry {
    /// Randomly generated identifier; never derived from the filename.
    pub id: i64,
    /// Name of the file inside the media directory. Unique.
    pub filename: String,
    /// Number of references found by the last scan. Zero means unused.
    pub reference_count: i64,
    /// Seconds since the epoch of the last count or hash change.
    pub last_modified: f64,
    /// Hex content digest, or empty when the file is absent or unhashed.
    pub content_hash: String,
    /// Legacy free-text field. Always written empty.
    pub description: String,
}

impl CatalogEntry {
    /// Build a fresh entry with a newly generated id.
    pub fn new(
        filename: impl Into<String>,
        reference_count: i64,
        last_modified: f64,
        content_hash: impl Into<String>,
    ) -> Self {
        Self {
            id: super::generate_id(),
            filename: filename.into(),
            reference_count,
            last_modified,
            content_hash: content_hash.into(),
            description: String::new(),
        }
    }

    /// Whether the catalog has confirmed content for this file.
    pub fn has_content(&self) -> bool {
        !self.content_hash.is_empty()
    }
}

/// Tombstone written when an unused entry is purged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeletionRecord {
    pub media_id: i64,
    pub deleted_at: f64,
}

/// A refreshed content hash for one entry.
#[derive(Debug, Clone, PartialEq)]
pub struct HashUpdate {
    pub filename: String,
    pub content_hash: String,
    pub modified: f64,
}

/// What [`CatalogStore::upsert_count`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    /// An existing entry had its count adjusted.
    Updated,
    /// A new entry was created and hashed from disk.
    Inserted,
    /// No entry existed and the delta was not positive.
    Skipped,
}

/// Storage backend for the media catalog.
///
/// The reconciler only ever talks to this trait, so the backend (SQLite,
/// in-memory) can be swapped without touching the algorithm. All operations
/// are synchronous to match rusqlite's API.
pub trait CatalogStore: Send + Sync {
    /// Filename of an entry with exactly this content hash, if any.
    fn find_by_content_hash(&self, hash: &str) -> Result<Option<String>>;

    /// Look up an entry by id.
    fn get(&self, id: i64) -> Result<Option<CatalogEntry>>;

    /// Look up an entry by filename.
    fn get_by_filename(&self, filename: &str) -> Result<Option<CatalogEntry>>;

    /// Add `delta` to an existing entry's count and stamp it with `modified`.
    ///
    /// Returns `false` if no entry has that filename.
    fn add_to_count(&self, filename: &str, delta: i64, modified: f64) -> Result<bool>;

    /// Insert a new entry.
    fn insert(&self, entry: &CatalogEntry) -> Result<()>;

    /// Set every entry's reference count to zero. Returns the number of rows.
    fn reset_all_counts(&self) -> Result<usize>;

    /// Ids of all entries with a zero reference count.
    fn zero_ref_ids(&self) -> Result<Vec<i64>>;

    /// Append one tombstone per id.
    fn append_tombstones(&self, ids: &[i64], deleted_at: f64) -> Result<()>;

    /// Delete every zero-count entry. Returns how many were removed.
    fn delete_zero_ref_entries(&self) -> Result<usize>;

    /// Apply a batch of hash refreshes.
    fn update_hashes(&self, updates: &[HashUpdate]) -> Result<()>;

    /// Filenames of entries with an empty content hash, ordered by filename.
    fn filenames_missing_hash(&self) -> Result<Vec<String>>;

    /// All entries, ordered by filename.
    fn entries(&self) -> Result<Vec<CatalogEntry>>;

    /// All tombstones in insertion order.
    fn tombstones(&self) -> Result<Vec<DeletionRecord>>;

    /// Adjust the count for `filename`, creating the entry if needed.
    ///
    /// New entries are only created for a positive `delta`; their content
    /// hash is read from `media_dir/filename`. It is empty if the file is
    /// absent or the name does not resolve inside `media_dir`.
    fn upsert_count(
        &self,
        filename: &str,
        delta: i64,
        modified: f64,
        media_dir: &Path,
    ) -> Result<UpsertOutcome> {
        if self.add_to_count(filename, delta, modified)? {
            return Ok(UpsertOutcome::Updated);
        }
        if delta <= 0 {
            return Ok(UpsertOutcome::Skipped);
        }

        let hash = media_path(media_dir, filename)
            .map(|path| checksum_file_or_empty(&path))
            .unwrap_or_default();
        self.insert(&CatalogEntry::new(filename, delta, modified, hash))?;
        debug!("Catalogued new media file {}", filename);
        Ok(UpsertOutcome::Inserted)
    }

    /// Tombstone and delete every zero-count entry.
    fn remove_unused(&self, deleted_at: f64) -> Result<usize> {
        let ids = self.zero_ref_ids()?;
        if ids.is_empty() {
            return Ok(0);
        }
        self.append_tombstones(&ids, deleted_at)?;
        self.delete_zero_ref_entries()
    }
}
