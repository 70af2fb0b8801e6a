//! SQLite-backed media catalog.

use super::traits::{CatalogEntry, CatalogStore, DeletionRecord, HashUpdate};
use crate::error::{MediaError, Result};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::debug;

const ENTRY_COLUMNS: &str =
    "id, filename, reference_count, last_modified, content_hash, description";

/// Media catalog stored in SQLite.
///
/// The connection may be shared with the owning deck so catalog and card
/// data live in one database file.
pub struct SqliteCatalog {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteCatalog {
    /// Open (or create) a standalone catalog database.
    pub fn open(db_path: impl AsRef<Path>) -> Result<Self> {
        let db_path = db_path.as_ref();

        // Create parent directory if needed
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| MediaError::Io {
                message: format!("Failed to create catalog directory: {}", e),
                path: Some(parent.to_path_buf()),
                source: Some(e),
            })?;
        }

        let conn = Connection::open(db_path).map_err(|e| MediaError::Database {
            message: format!("Failed to open catalog database: {}", e),
            source: Some(e),
        })?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;

        Self::from_shared(Arc::new(Mutex::new(conn)))
    }

    /// Open a catalog in a private in-memory database.
    pub fn open_in_memory() -> Result<Self> {
        Self::from_shared(Arc::new(Mutex::new(Connection::open_in_memory()?)))
    }

    /// Use an existing connection, creating the media tables if missing.
    pub fn from_shared(conn: Arc<Mutex<Connection>>) -> Result<Self> {
        {
            let guard = conn.lock().map_err(|_| MediaError::lock_poisoned())?;
            Self::ensure_schema(&guard)?;
        }
        Ok(Self { conn })
    }

    fn ensure_schema(conn: &Connection) -> Result<()> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS media (
                id INTEGER PRIMARY KEY NOT NULL,
                filename TEXT NOT NULL UNIQUE,
                reference_count INTEGER NOT NULL,
                last_modified REAL NOT NULL,
                content_hash TEXT NOT NULL DEFAULT '',
                description TEXT NOT NULL DEFAULT ''
            );

            -- Import dedupe looks entries up by content
            CREATE INDEX IF NOT EXISTS idx_media_hash ON media(content_hash);

            CREATE TABLE IF NOT EXISTS media_deleted (
                media_id INTEGER NOT NULL,
                deleted_at REAL NOT NULL
            );
            "#,
        )
        .map_err(|e| MediaError::Database {
            message: format!("Failed to initialize media schema: {}", e),
            source: Some(e),
        })?;
        Ok(())
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| MediaError::lock_poisoned())
    }

    fn row_to_entry(row: &Row<'_>) -> rusqlite::Result<CatalogEntry> {
        Ok(CatalogEntry {
            id: row.get(0)?,
            filename: row.get(1)?,
            reference_count: row.get(2)?,
            last_modified: row.get(3)?,
            content_hash: row.get(4)?,
            description: row.get(5)?,
        })
    }

    fn query_entry(
        &self,
        where_clause: &str,
        param: &dyn rusqlite::ToSql,
    ) -> Result<Option<CatalogEntry>> {
        let conn = self.lock()?;
        let sql = format!("SELECT {} FROM media WHERE {}", ENTRY_COLUMNS, where_clause);
        let entry = conn
            .query_row(&sql, &[param], Self::row_to_entry)
            .optional()?;
        Ok(entry)
    }
}

impl CatalogStore for SqliteCatalog {
    fn find_by_content_hash(&self, hash: &str) -> Result<Option<String>> {
        let conn = self.lock()?;
        let filename = conn
            .query_row(
                "SELECT filename FROM media WHERE content_hash = ?1 LIMIT 1",
                params![hash],
                |row| row.get(0),
            )
            .optional()?;
        Ok(filename)
    }

    fn get(&self, id: i64) -> Result<Option<CatalogEntry>> {
        self.query_entry("id = ?1", &id)
    }

    fn get_by_filename(&self, filename: &str) -> Result<Option<CatalogEntry>> {
        self.query_entry("filename = ?1", &filename)
    }

    fn add_to_count(&self, filename: &str, delta: i64, modified: f64) -> Result<bool> {
        let conn = self.lock()?;
        let updated = conn.execute(
            "UPDATE media SET reference_count = reference_count + ?1, last_modified = ?2
             WHERE filename = ?3",
            params![delta, modified, filename],
        )?;
        Ok(updated > 0)
    }

    fn insert(&self, entry: &CatalogEntry) -> Result<()> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO media
                 (id, filename, reference_count, last_modified, content_hash, description)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                entry.id,
                entry.filename,
                entry.reference_count,
                entry.last_modified,
                entry.content_hash,
                entry.description,
            ],
        )?;
        Ok(())
    }

    fn reset_all_counts(&self) -> Result<usize> {
        let conn = self.lock()?;
        Ok(conn.execute("UPDATE media SET reference_count = 0", [])?)
    }

    fn zero_ref_ids(&self) -> Result<Vec<i64>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare("SELECT id FROM media WHERE reference_count = 0")?;
        let ids = stmt
            .query_map([], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<i64>>>()?;
        Ok(ids)
    }

    fn append_tombstones(&self, ids: &[i64], deleted_at: f64) -> Result<()> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        {
            let mut stmt =
                tx.prepare("INSERT INTO media_deleted (media_id, deleted_at) VALUES (?1, ?2)")?;
            for id in ids {
                stmt.execute(params![id, deleted_at])?;
            }
        }
        tx.commit()?;
        debug!("Recorded {} media tombstones", ids.len());
        Ok(())
    }

    fn delete_zero_ref_entries(&self) -> Result<usize> {
        let conn = self.lock()?;
        Ok(conn.execute("DELETE FROM media WHERE reference_count = 0", [])?)
    }

    fn update_hashes(&self, updates: &[HashUpdate]) -> Result<()> {
        if updates.is_empty() {
            return Ok(());
        }
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                "UPDATE media SET content_hash = ?1, last_modified = ?2 WHERE filename = ?3",
            )?;
            for update in updates {
                stmt.execute(params![update.content_hash, update.modified, update.filename])?;
            }
        }
        tx.commit()?;
        debug!("Refreshed {} media hashes", updates.len());
        Ok(())
    }

    fn filenames_missing_hash(&self) -> Result<Vec<String>> {
        let conn = self.lock()?;
        let mut stmt =
            conn.prepare("SELECT filename FROM media WHERE content_hash = '' ORDER BY filename")?;
        let names = stmt
            .query_map([], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<String>>>()?;
        Ok(names)
    }

    fn entries(&self) -> Result<Vec<CatalogEntry>> {
        let conn = self.lock()?;
        let sql = format!("SELECT {} FROM media ORDER BY filename", ENTRY_COLUMNS);
        let mut stmt = conn.prepare(&sql)?;
        let entries = stmt
            .query_map([], Self::row_to_entry)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(entries)
    }

    fn tombstones(&self) -> Result<Vec<DeletionRecord>> {
        let conn = self.lock()?;
        let mut stmt =
            conn.prepare("SELECT media_id, deleted_at FROM media_deleted ORDER BY rowid")?;
        let records = stmt
            .query_map([], |row| {
                Ok(DeletionRecord {
                    media_id: row.get(0)?,
                    deleted_at: row.get(1)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(records)
    }
}
