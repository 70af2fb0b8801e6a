//! In-process media catalog.

use super::traits::{CatalogEntry, CatalogStore, DeletionRecord, HashUpdate};
use crate::error::{MediaError, Result};
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

#[derive(Debug, Default)]
struct MemoryState {
    /// Keyed by filename so iteration order matches the SQLite backend.
    entries: BTreeMap<String, CatalogEntry>,
    tombstones: Vec<DeletionRecord>,
}

/// Catalog kept entirely in memory. Nothing survives a drop.
#[derive(Debug, Default)]
pub struct MemoryCatalog {
    state: Mutex<MemoryState>,
}

impl MemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, MemoryState>> {
        self.state.lock().map_err(|_| MediaError::lock_poisoned())
    }
}

impl CatalogStore for MemoryCatalog {
    fn find_by_content_hash(&self, hash: &str) -> Result<Option<String>> {
        let state = self.lock()?;
        Ok(state
            .entries
            .values()
            .find(|e| e.content_hash == hash)
            .map(|e| e.filename.clone()))
    }

    fn get(&self, id: i64) -> Result<Option<CatalogEntry>> {
        let state = self.lock()?;
        Ok(state.entries.values().find(|e| e.id == id).cloned())
    }

    fn get_by_filename(&self, filename: &str) -> Result<Option<CatalogEntry>> {
        Ok(self.lock()?.entries.get(filename).cloned())
    }

    fn add_to_count(&self, filename: &str, delta: i64, modified: f64) -> Result<bool> {
        let mut state = self.lock()?;
        match state.entries.get_mut(filename) {
            Some(entry) => {
                entry.reference_count += delta;
                entry.last_modified = modified;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn insert(&self, entry: &CatalogEntry) -> Result<()> {
        let mut state = self.lock()?;
        if state.entries.contains_key(&entry.filename) {
            return Err(MediaError::Database {
                message: format!("Media entry already exists: {}", entry.filename),
                source: None,
            });
        }
        state.entries.insert(entry.filename.clone(), entry.clone());
        Ok(())
    }

    fn reset_all_counts(&self) -> Result<usize> {
        let mut state = self.lock()?;
        for entry in state.entries.values_mut() {
            entry.reference_count = 0;
        }
        Ok(state.entries.len())
    }

    fn zero_ref_ids(&self) -> Result<Vec<i64>> {
        let state = self.lock()?;
        Ok(state
            .entries
            .values()
            .filter(|e| e.reference_count == 0)
            .map(|e| e.id)
            .collect())
    }

    fn append_tombstones(&self, ids: &[i64], deleted_at: f64) -> Result<()> {
        let mut state = self.lock()?;
        state
            .tombstones
            .extend(ids.iter().map(|&media_id| DeletionRecord { media_id, deleted_at }));
        Ok(())
    }

    fn delete_zero_ref_entries(&self) -> Result<usize> {
        let mut state = self.lock()?;
        let before = state.entries.len();
        state.entries.retain(|_, e| e.reference_count != 0);
        Ok(before - state.entries.len())
    }

    fn update_hashes(&self, updates: &[HashUpdate]) -> Result<()> {
        let mut state = self.lock()?;
        for update in updates {
            if let Some(entry) = state.entries.get_mut(&update.filename) {
                entry.content_hash = update.content_hash.clone();
                entry.last_modified = update.modified;
            }
        }
        Ok(())
    }

    fn filenames_missing_hash(&self) -> Result<Vec<String>> {
        let state = self.lock()?;
        Ok(state
            .entries
            .values()
            .filter(|e| !e.has_content())
            .map(|e| e.filename.clone())
            .collect())
    }

    fn entries(&self) -> Result<Vec<CatalogEntry>> {
        Ok(self.lock()?.entries.values().cloned().collect())
    }

    fn tombstones(&self) -> Result<Vec<DeletionRecord>> {
        Ok(self.lock()?.tombstones.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::UpsertOutcome;
    use tempfile::TempDir;

    #[test]
    fn test_insert_rejects_duplicate_filename() {
        let catalog = MemoryCatalog::new();
        catalog.insert(&CatalogEntry::new("a.mp3", 1, 1.0, "")).unwrap();
        assert!(catalog.insert(&CatalogEntry::new("a.mp3", 1, 1.0, "")).is_err());
    }

    #[test]
    fn test_counts_and_purge() {
        let temp = TempDir::new().unwrap();
        let catalog = MemoryCatalog::new();
        assert_eq!(
            catalog.upsert_count("b.mp3", 1, 1.0, temp.path()).unwrap(),
            UpsertOutcome::Inserted
        );
        assert_eq!(
            catalog.upsert_count("a.mp3", 4, 1.0, temp.path()).unwrap(),
            UpsertOutcome::Inserted
        );
        catalog.add_to_count("b.mp3", -1, 2.0).unwrap();

        let zero = catalog.zero_ref_ids().unwrap();
        assert_eq!(zero.len(), 1);
        assert_eq!(catalog.remove_unused(3.0).unwrap(), 1);

        let names: Vec<_> = catalog.entries().unwrap().into_iter().map(|e| e.filename).collect();
        assert_eq!(names, vec!["a.mp3"]);
        assert_eq!(catalog.tombstones().unwrap()[0].media_id, zero[0]);
    }
}
