//! Full media reconciliation ("Check Media DB").
//!
//! A rebuild recomputes every reference count from card text, classifies
//! files in the media directory that nothing references, optionally purges
//! them, and refreshes content hashes so the catalog matches the disk.

use crate::catalog::{timestamp_now, CatalogStore, HashUpdate};
use crate::collection::Collection;
use crate::config::MediaConfig;
use crate::error::Result;
use crate::media::hashing::checksum_file_or_empty;
use crate::media::naming::media_path;
use crate::media::references::extract_references;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info, instrument, warn};
use walkdir::WalkDir;

/// Options for [`rebuild`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RebuildOptions {
    /// Delete zero-count catalog entries and unlink unused files.
    pub purge_unreferenced: bool,
    /// Notify the collection that its state changed.
    pub mark_dirty: bool,
}

impl Default for RebuildOptions {
    fn default() -> Self {
        Self {
            purge_unreferenced: false,
            mark_dirty: true,
        }
    }
}

/// Result of a rebuild.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RebuildReport {
    /// Catalogued filenames with no confirmed content on disk.
    pub missing: Vec<String>,
    /// Files in the media directory that no card references, sorted.
    ///
    /// Reflects the directory before any purge.
    pub unused: Vec<String>,
}

/// Count every media reference across all cards.
pub fn count_references(collection: &(impl Collection + ?Sized)) -> Result<HashMap<String, i64>> {
    let mut refs: HashMap<String, i64> = HashMap::new();
    for record in collection.records()? {
        for text in record.fields() {
            for name in extract_references(text) {
                *refs.entry(name).or_insert(0) += 1;
            }
        }
    }
    Ok(refs)
}

/// A file in the media directory that no card references.
struct UnusedFile {
    name: String,
    path: PathBuf,
}

/// Regular files in `media_dir` whose names are not in `refs`, sorted by name.
///
/// Subdirectories and other non-file entries are ignored. Names that are not
/// valid UTF-8 cannot be referenced from card text, so they are always unused
/// and reported in lossy form.
fn find_unused(media_dir: &Path, refs: &HashMap<String, i64>) -> Vec<UnusedFile> {
    let mut unused: Vec<UnusedFile> = WalkDir::new(media_dir)
        .min_depth(1)
        .max_depth(1)
        .follow_links(true)
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(e) => {
                warn!("Skipping unreadable media directory entry: {}", e);
                None
            }
        })
        .filter(|entry| entry.file_type().is_file())
        .filter_map(|entry| {
            let name = match entry.file_name().to_str() {
                Some(name) => name.to_string(),
                None => {
                    let lossy = entry.file_name().to_string_lossy().into_owned();
                    warn!("Media file name is not valid UTF-8: {}", lossy);
                    lossy
                }
            };
            if refs.contains_key(&name) {
                return None;
            }
            Some(UnusedFile {
                name,
                path: entry.into_path(),
            })
        })
        .collect();
    unused.sort_by(|a, b| a.name.cmp(&b.name));
    unused
}

/// Unlink unused files. Failures are logged, not fatal.
fn delete_files(files: &[UnusedFile]) -> usize {
    let mut deleted = 0;
    for file in files {
        match std::fs::remove_file(&file.path) {
            Ok(()) => deleted += 1,
            Err(e) => warn!("Failed to delete unused media {}: {}", file.path.display(), e),
        }
    }
    deleted
}

/// Compare stored hashes with the disk and collect the ones that changed.
///
/// Names that do not resolve inside `media_dir` always hash as absent.
fn stale_hashes(catalog: &dyn CatalogStore, media_dir: &Path) -> Result<Vec<HashUpdate>> {
    let mut updates = Vec::new();
    for entry in catalog.entries()? {
        let fresh = media_path(media_dir, &entry.filename)
            .map(|path| checksum_file_or_empty(&path))
            .unwrap_or_default();
        if fresh != entry.content_hash {
            updates.push(HashUpdate {
                filename: entry.filename,
                content_hash: fresh,
                modified: timestamp_now(),
            });
        }
    }
    Ok(updates)
}

/// Rebuild the media catalog from card text and the media directory.
///
/// Steps, in order:
/// 1. zero every reference count
/// 2. count references in all question/answer text
/// 3. apply the counts, cataloguing newly referenced files
/// 4. list unreferenced files in the media directory
/// 5. optionally tombstone zero-count entries and unlink unused files
/// 6. refresh content hashes that no longer match the disk
/// 7. optionally mark the collection dirty
///
/// Returns the catalogued names lacking content and the unused files.
#[instrument(skip_all, fields(purge = options.purge_unreferenced))]
pub fn rebuild(
    collection: &(impl Collection + ?Sized),
    options: RebuildOptions,
) -> Result<RebuildReport> {
    let progress = collection.progress();
    progress.begin(MediaConfig::CHECK_MEDIA_TITLE);
    let result = run_rebuild(collection, options);
    progress.end();
    result
}

fn run_rebuild(
    collection: &(impl Collection + ?Sized),
    options: RebuildOptions,
) -> Result<RebuildReport> {
    let media_dir = collection.media_dir(true)?;
    let catalog = collection.catalog();

    catalog.reset_all_counts()?;

    let refs = count_references(collection)?;
    debug!("Found {} distinct media references", refs.len());

    let now = timestamp_now();
    for (filename, count) in &refs {
        catalog.upsert_count(filename, *count, now, &media_dir)?;
    }

    let unused = find_unused(&media_dir, &refs);

    if options.purge_unreferenced {
        let purged = catalog.remove_unused(timestamp_now())?;
        let deleted = delete_files(&unused);
        info!(
            "Purged {} catalog entries and {} unused files",
            purged, deleted
        );
    }

    let updates = stale_hashes(catalog, &media_dir)?;
    if !updates.is_empty() {
        catalog.update_hashes(&updates)?;
    }

    if options.mark_dirty {
        collection.mark_dirty()?;
    }

    let missing = catalog.filenames_missing_hash()?;
    info!(
        "Media check complete: {} missing, {} unused, {} hashes refreshed",
        missing.len(),
        unused.len(),
        updates.len()
    );

    Ok(RebuildReport {
        missing,
        unused: unused.into_iter().map(|file| file.name).collect(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::MemoryCatalog;
    use crate::collection::{ProgressSink, RecordText};
    use crate::media::hashing::checksum;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use tempfile::TempDir;

    /// Collection over a [`MemoryCatalog`] with fixed card text.
    struct TestCollection {
        catalog: MemoryCatalog,
        media_dir: PathBuf,
        records: Vec<RecordText>,
        dirty: AtomicUsize,
        progress: RecordingProgress,
    }

    #[derive(Default)]
    struct RecordingProgress {
        events: Mutex<Vec<String>>,
    }

    impl ProgressSink for RecordingProgress {
        fn begin(&self, title: &str) {
            self.events.lock().unwrap().push(format!("begin:{title}"));
        }
        fn update(&self, label: &str) {
            self.events.lock().unwrap().push(format!("update:{label}"));
        }
        fn end(&self) {
            self.events.lock().unwrap().push("end".to_string());
        }
    }

    impl TestCollection {
        fn new(media_dir: &Path, records: &[(&str, &str)]) -> Self {
            Self {
                catalog: MemoryCatalog::new(),
                media_dir: media_dir.to_path_buf(),
                records: records.iter().map(|(q, a)| RecordText::new(*q, *a)).collect(),
                dirty: AtomicUsize::new(0),
                progress: RecordingProgress::default(),
            }
        }
    }

    impl Collection for TestCollection {
        fn catalog(&self) -> &dyn CatalogStore {
            &self.catalog
        }
        fn media_dir(&self, create: bool) -> Result<PathBuf> {
            if create {
                std::fs::create_dir_all(&self.media_dir)?;
            }
            Ok(self.media_dir.clone())
        }
        fn config_value(&self, _key: &str) -> Result<Option<String>> {
            Ok(None)
        }
        fn records(&self) -> Result<Vec<RecordText>> {
            Ok(self.records.clone())
        }
        fn progress(&self) -> &dyn ProgressSink {
            &self.progress
        }
        fn mark_dirty(&self) -> Result<()> {
            self.dirty.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn write(dir: &Path, name: &str, data: &[u8]) {
        std::fs::write(dir.join(name), data).unwrap();
    }

    #[test]
    fn test_counts_and_unused() {
        let temp = TempDir::new().unwrap();
        write(temp.path(), "a.mp3", b"a");
        write(temp.path(), "b.jpg", b"b");
        write(temp.path(), "c.png", b"c");
        let col = TestCollection::new(
            temp.path(),
            &[
                ("[sound:a.mp3]", "<img src=\"b.jpg\">"),
                ("again [sound:a.mp3]", ""),
            ],
        );

        let report = rebuild(&col, RebuildOptions::default()).unwrap();
        assert_eq!(report.unused, vec!["c.png"]);
        assert!(report.missing.is_empty());

        let a = col.catalog.get_by_filename("a.mp3").unwrap().unwrap();
        let b = col.catalog.get_by_filename("b.jpg").unwrap().unwrap();
        assert_eq!(a.reference_count, 2);
        assert_eq!(b.reference_count, 1);
        assert_eq!(a.content_hash, checksum(b"a"));
        assert!(col.catalog.get_by_filename("c.png").unwrap().is_none());
        assert_eq!(col.dirty.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_missing_reference_reported() {
        let temp = TempDir::new().unwrap();
        let col = TestCollection::new(temp.path(), &[("[sound:gone.mp3]", "")]);
        let report = rebuild(&col, RebuildOptions::default()).unwrap();
        assert_eq!(report.missing, vec!["gone.mp3"]);
        assert!(report.unused.is_empty());
    }

    #[test]
    fn test_directories_are_ignored() {
        let temp = TempDir::new().unwrap();
        std::fs::create_dir(temp.path().join("sub")).unwrap();
        write(&temp.path().join("sub"), "deep.png", b"d");
        let col = TestCollection::new(temp.path(), &[]);
        let report = rebuild(&col, RebuildOptions::default()).unwrap();
        assert!(report.unused.is_empty());
    }

    #[test]
    fn test_purge_removes_entries_and_files() {
        let temp = TempDir::new().unwrap();
        write(temp.path(), "keep.mp3", b"k");
        write(temp.path(), "old.mp3", b"o");
        write(temp.path(), "stray.png", b"s");
        let col = TestCollection::new(temp.path(), &[("[sound:keep.mp3]", "")]);
        // A stale entry that no card references any more
        col.catalog
            .upsert_count("old.mp3", 1, 1.0, temp.path())
            .unwrap();
        let old_id = col.catalog.get_by_filename("old.mp3").unwrap().unwrap().id;

        let options = RebuildOptions {
            purge_unreferenced: true,
            mark_dirty: false,
        };
        let report = rebuild(&col, options).unwrap();

        // Reported list is the pre-deletion state
        assert_eq!(report.unused, vec!["old.mp3", "stray.png"]);
        assert!(!temp.path().join("old.mp3").exists());
        assert!(!temp.path().join("stray.png").exists());
        assert!(temp.path().join("keep.mp3").exists());

        assert!(col.catalog.get_by_filename("old.mp3").unwrap().is_none());
        let tombstones = col.catalog.tombstones().unwrap();
        assert_eq!(tombstones.len(), 1);
        assert_eq!(tombstones[0].media_id, old_id);
        assert_eq!(col.dirty.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_hash_refresh_tracks_disk() {
        let temp = TempDir::new().unwrap();
        write(temp.path(), "a.mp3", b"v1");
        let col = TestCollection::new(temp.path(), &[("[sound:a.mp3]", "")]);
        rebuild(&col, RebuildOptions::default()).unwrap();
        let first = col.catalog.get_by_filename("a.mp3").unwrap().unwrap();

        // Unchanged content leaves the hash alone
        rebuild(&col, RebuildOptions::default()).unwrap();
        let again = col.catalog.get_by_filename("a.mp3").unwrap().unwrap();
        assert_eq!(again.content_hash, first.content_hash);

        write(temp.path(), "a.mp3", b"v2");
        rebuild(&col, RebuildOptions::default()).unwrap();
        let changed = col.catalog.get_by_filename("a.mp3").unwrap().unwrap();
        assert_eq!(changed.content_hash, checksum(b"v2"));

        std::fs::remove_file(temp.path().join("a.mp3")).unwrap();
        let report = rebuild(&col, RebuildOptions::default()).unwrap();
        assert_eq!(report.missing, vec!["a.mp3"]);
        let gone = col.catalog.get_by_filename("a.mp3").unwrap().unwrap();
        assert_eq!(gone.content_hash, "");
    }

    #[test]
    fn test_unreferenced_entries_drop_to_zero() {
        let temp = TempDir::new().unwrap();
        let col = TestCollection::new(temp.path(), &[]);
        col.catalog
            .upsert_count("was.mp3", 3, 1.0, temp.path())
            .unwrap();
        rebuild(&col, RebuildOptions::default()).unwrap();
        let entry = col.catalog.get_by_filename("was.mp3").unwrap().unwrap();
        assert_eq!(entry.reference_count, 0);
    }

    #[test]
    fn test_progress_is_bracketed() {
        let temp = TempDir::new().unwrap();
        let col = TestCollection::new(temp.path(), &[]);
        rebuild(&col, RebuildOptions::default()).unwrap();
        let events = col.progress.events.lock().unwrap().clone();
        assert_eq!(events, vec!["begin:Check Media DB".to_string(), "end".to_string()]);
    }

    #[test]
    fn test_references_outside_media_dir_are_missing() {
        let temp = TempDir::new().unwrap();
        let media_dir = temp.path().join("media");
        std::fs::create_dir(&media_dir).unwrap();
        let outside = temp.path().join("outside.txt");
        write(temp.path(), "outside.txt", b"not media");

        let absolute = format!("[sound:{}]", outside.display());
        let col = TestCollection::new(
            &media_dir,
            &[("[sound:../outside.txt]", absolute.as_str())],
        );
        let report = rebuild(&col, RebuildOptions::default()).unwrap();

        let mut expected = vec!["../outside.txt".to_string(), outside.display().to_string()];
        expected.sort();
        assert_eq!(report.missing, expected);
        for entry in col.catalog.entries().unwrap() {
            assert_eq!(entry.content_hash, "", "{}", entry.filename);
        }
    }

    #[test]
    fn test_delete_failure_does_not_stop_others() {
        let temp = TempDir::new().unwrap();
        write(temp.path(), "present.png", b"p");
        let files = vec![
            UnusedFile {
                name: "already-gone.png".to_string(),
                path: temp.path().join("already-gone.png"),
            },
            UnusedFile {
                name: "present.png".to_string(),
                path: temp.path().join("present.png"),
            },
        ];

        assert_eq!(delete_files(&files), 1);
        assert!(!temp.path().join("present.png").exists());
    }

    #[cfg(unix)]
    #[test]
    fn test_purge_survives_unwritable_media_dir() {
        use std::os::unix::fs::PermissionsExt;

        let temp = TempDir::new().unwrap();
        let media_dir = temp.path().join("media");
        std::fs::create_dir(&media_dir).unwrap();
        write(&media_dir, "keep.mp3", b"k");
        write(&media_dir, "stray.png", b"s");
        let col = TestCollection::new(&media_dir, &[("[sound:keep.mp3]", "")]);

        std::fs::set_permissions(&media_dir, std::fs::Permissions::from_mode(0o555)).unwrap();
        let options = RebuildOptions {
            purge_unreferenced: true,
            mark_dirty: false,
        };
        let result = rebuild(&col, options);
        std::fs::set_permissions(&media_dir, std::fs::Permissions::from_mode(0o755)).unwrap();

        let report = result.unwrap();
        assert_eq!(report.unused, vec!["stray.png"]);
        assert!(report.missing.is_empty());
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_non_utf8_names_are_unused_and_purged() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let temp = TempDir::new().unwrap();
        let raw = temp.path().join(OsStr::from_bytes(b"bad\xff.png"));
        std::fs::write(&raw, b"x").unwrap();
        let col = TestCollection::new(temp.path(), &[]);

        let options = RebuildOptions {
            purge_unreferenced: true,
            mark_dirty: false,
        };
        let report = rebuild(&col, options).unwrap();
        assert_eq!(report.unused, vec!["bad\u{FFFD}.png"]);
        assert!(!raw.exists());
    }

    #[test]
    fn test_options_deserialize_with_defaults() {
        let options: RebuildOptions =
            serde_json::from_str(r#"{"purgeUnreferenced": true}"#).unwrap();
        assert!(options.purge_unreferenced);
        assert!(options.mark_dirty);
    }
}
