//! SQLite-backed deck that owns cards, deck variables and the media catalog.

use crate::catalog::{timestamp_now, CatalogStore, SqliteCatalog};
use crate::collection::{Collection, LogProgress, ProgressSink, RecordText};
use crate::config::MediaConfig;
use crate::error::{MediaError, Result};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::debug;

/// A deck database plus its media directory.
///
/// Cards, deck variables and the media catalog share one SQLite connection.
pub struct Deck {
    path: Option<PathBuf>,
    media_dir: PathBuf,
    conn: Arc<Mutex<Connection>>,
    catalog: SqliteCatalog,
    progress: Box<dyn ProgressSink>,
}

impl Deck {
    /// Open (or create) the deck database at `path`.
    ///
    /// The media directory sits next to it: `french.anki` keeps its media in
    /// `french.media`.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| MediaError::io_with_path(e, parent))?;
            }
        }

        let conn = Connection::open(&path).map_err(|e| MediaError::Database {
            message: format!("Failed to open deck {}: {}", path.display(), e),
            source: Some(e),
        })?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;

        let media_dir = media_dir_for(&path);
        Self::with_connection(Some(path), media_dir, conn)
    }

    /// Open a deck held in memory, storing media in `media_dir`.
    pub fn open_in_memory(media_dir: impl Into<PathBuf>) -> Result<Self> {
        Self::with_connection(None, media_dir.into(), Connection::open_in_memory()?)
    }

    fn with_connection(
        path: Option<PathBuf>,
        media_dir: PathBuf,
        conn: Connection,
    ) -> Result<Self> {
        Self::ensure_schema(&conn)?;
        let conn = Arc::new(Mutex::new(conn));
        let catalog = SqliteCatalog::from_shared(Arc::clone(&conn))?;
        Ok(Self {
            path,
            media_dir,
            conn,
            catalog,
            progress: Box::new(LogProgress),
        })
    }

    /// Replace the progress sink.
    pub fn with_progress(mut self, progress: impl ProgressSink + 'static) -> Self {
        self.progress = Box::new(progress);
        self
    }

    fn ensure_schema(conn: &Connection) -> Result<()> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS cards (
                id INTEGER PRIMARY KEY,
                question TEXT NOT NULL,
                answer TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS deck_vars (
                key TEXT PRIMARY KEY,
                value TEXT
            );

            CREATE TABLE IF NOT EXISTS deck (
                id INTEGER PRIMARY KEY CHECK (id = 1),
                modified REAL NOT NULL
            );

            INSERT OR IGNORE INTO deck (id, modified) VALUES (1, 0);
            "#,
        )
        .map_err(|e| MediaError::Database {
            message: format!("Failed to initialize deck schema: {}", e),
            source: Some(e),
        })?;
        Ok(())
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| MediaError::lock_poisoned())
    }

    /// Path of the deck database, or `None` for an in-memory deck.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// The concrete catalog backend.
    pub fn catalog_store(&self) -> &SqliteCatalog {
        &self.catalog
    }

    /// Add a card and return its row id.
    pub fn add_record(&self, question: &str, answer: &str) -> Result<i64> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO cards (question, answer) VALUES (?1, ?2)",
            params![question, answer],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// Replace the text of an existing card.
    pub fn update_record(&self, id: i64, question: &str, answer: &str) -> Result<()> {
        let conn = self.lock()?;
        let updated = conn.execute(
            "UPDATE cards SET question = ?1, answer = ?2 WHERE id = ?3",
            params![question, answer, id],
        )?;
        if updated == 0 {
            return Err(MediaError::Other(format!("Card not found: {}", id)));
        }
        Ok(())
    }

    /// Set (or clear, with `None`) a deck variable.
    pub fn set_config_value(&self, key: &str, value: Option<&str>) -> Result<()> {
        let conn = self.lock()?;
        match value {
            Some(value) => conn.execute(
                "INSERT OR REPLACE INTO deck_vars (key, value) VALUES (?1, ?2)",
                params![key, value],
            )?,
            None => conn.execute("DELETE FROM deck_vars WHERE key = ?1", params![key])?,
        };
        Ok(())
    }

    /// Time of the last [`Collection::mark_dirty`], in seconds since the epoch.
    pub fn modified(&self) -> Result<f64> {
        let conn = self.lock()?;
        Ok(conn.query_row("SELECT modified FROM deck WHERE id = 1", [], |row| row.get(0))?)
    }
}

impl Collection for Deck {
    fn catalog(&self) -> &dyn CatalogStore {
        &self.catalog
    }

    fn media_dir(&self, create: bool) -> Result<PathBuf> {
        if create && !self.media_dir.is_dir() {
            std::fs::create_dir_all(&self.media_dir)
                .map_err(|e| MediaError::io_with_path(e, &self.media_dir))?;
            debug!("Created media directory {}", self.media_dir.display());
        }
        Ok(self.media_dir.clone())
    }

    fn config_value(&self, key: &str) -> Result<Option<String>> {
        let conn = self.lock()?;
        let value: Option<Option<String>> = conn
            .query_row(
                "SELECT value FROM deck_vars WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value.flatten())
    }

    fn records(&self) -> Result<Vec<RecordText>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare("SELECT question, answer FROM cards ORDER BY id")?;
        let records = stmt
            .query_map([], |row| {
                Ok(RecordText {
                    question: row.get(0)?,
                    answer: row.get(1)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(records)
    }

    fn progress(&self) -> &dyn ProgressSink {
        self.progress.as_ref()
    }

    fn mark_dirty(&self) -> Result<()> {
        let conn = self.lock()?;
        conn.execute(
            "UPDATE deck SET modified = ?1 WHERE id = 1",
            params![timestamp_now()],
        )?;
        Ok(())
    }
}

/// Media directory for a deck file: a trailing `.anki` (any case) becomes
/// `.media`; other names get `.media` appended.
pub fn media_dir_for(deck_path: &Path) -> PathBuf {
    let is_deck_file = deck_path
        .extension()
        .map(|ext| ext.eq_ignore_ascii_case(MediaConfig::DECK_EXTENSION))
        .unwrap_or(false);

    if is_deck_file {
        deck_path.with_extension(MediaConfig::MEDIA_DIR_EXTENSION)
    } else {
        let mut name = deck_path.as_os_str().to_os_string();
        name.push(".");
        name.push(MediaConfig::MEDIA_DIR_EXTENSION);
        PathBuf::from(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_media_dir_for() {
        assert_eq!(
            media_dir_for(Path::new("/decks/french.anki")),
            PathBuf::from("/decks/french.media")
        );
        assert_eq!(
            media_dir_for(Path::new("/decks/French.ANKI")),
            PathBuf::from("/decks/French.media")
        );
        assert_eq!(
            media_dir_for(Path::new("/decks/notes.db")),
            PathBuf::from("/decks/notes.db.media")
        );
    }

    #[test]
    fn test_open_creates_media_dir_on_request() {
        let temp = TempDir::new().unwrap();
        let deck = Deck::open(temp.path().join("test.anki")).unwrap();
        let dir = deck.media_dir(false).unwrap();
        assert_eq!(dir, temp.path().join("test.media"));
        assert!(!dir.exists());
        deck.media_dir(true).unwrap();
        assert!(dir.is_dir());
    }

    #[test]
    fn test_records_and_config() {
        let temp = TempDir::new().unwrap();
        let deck = Deck::open_in_memory(temp.path().join("media")).unwrap();
        let id = deck.add_record("q1", "a1").unwrap();
        deck.add_record("q2", "a2").unwrap();
        deck.update_record(id, "q1'", "a1'").unwrap();
        assert!(deck.update_record(999, "", "").is_err());

        let records = deck.records().unwrap();
        assert_eq!(records[0], RecordText::new("q1'", "a1'"));
        assert_eq!(records.len(), 2);

        assert_eq!(deck.config_value("mediaURL").unwrap(), None);
        deck.set_config_value("mediaURL", Some("http://x/")).unwrap();
        assert_eq!(deck.config_value("mediaURL").unwrap().as_deref(), Some("http://x/"));
        deck.set_config_value("mediaURL", None).unwrap();
        assert_eq!(deck.config_value("mediaURL").unwrap(), None);
    }

    #[test]
    fn test_mark_dirty_updates_modified() {
        let temp = TempDir::new().unwrap();
        let deck = Deck::open_in_memory(temp.path()).unwrap();
        assert_eq!(deck.modified().unwrap(), 0.0);
        deck.mark_dirty().unwrap();
        assert!(deck.modified().unwrap() > 0.0);
    }

    #[test]
    fn test_deck_data_persists() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("persist.anki");
        {
            let deck = Deck::open(&path).unwrap();
            deck.add_record("[sound:a.mp3]", "").unwrap();
        }
        let deck = Deck::open(&path).unwrap();
        assert_eq!(deck.records().unwrap().len(), 1);
        assert_eq!(deck.path(), Some(path.as_path()));
    }
}
