//! Download catalogued media that is missing from disk.

use crate::collection::Collection;
use crate::config::{MediaConfig, NetworkConfig};
use crate::error::{MediaError, Result};
use crate::media::naming::media_path;
use crate::network::MediaSource;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{debug, info, instrument, warn};

/// Result of [`fetch_missing`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum FetchOutcome {
    /// The collection has no remote media URL.
    NotConfigured,
    /// Every catalogued file was checked.
    #[serde(rename_all = "camelCase")]
    Completed { fetched: usize, still_missing: usize },
    /// A file whose content the catalog vouches for could not be fetched.
    Aborted { url: String },
}

/// Fetch every catalogued file that is absent from the media directory.
///
/// Files are requested from the collection's `mediaURL` with the filename
/// appended. A failed download of a file with a known content hash aborts
/// the whole run, since the catalog says that file must exist. Files that
/// were never hashed are tallied as still missing instead. A file that
/// downloads but cannot be written, or whose name does not resolve inside
/// the media directory, is treated the same way as a failed download.
#[instrument(skip_all)]
pub async fn fetch_missing(
    collection: &(impl Collection + ?Sized),
    source: &dyn MediaSource,
) -> Result<FetchOutcome> {
    let base_url = match collection.config_value(MediaConfig::REMOTE_URL_KEY)? {
        Some(url) if !url.is_empty() => url,
        _ => return Ok(FetchOutcome::NotConfigured),
    };
    let media_dir = collection.media_dir(true)?;

    let progress = collection.progress();
    progress.begin(MediaConfig::FETCH_MEDIA_TITLE);
    let result = run_fetch(collection, source, &base_url, &media_dir).await;
    progress.end();
    result
}

async fn run_fetch(
    collection: &(impl Collection + ?Sized),
    source: &dyn MediaSource,
    base_url: &str,
    media_dir: &Path,
) -> Result<FetchOutcome> {
    let progress = collection.progress();
    let mut fetched = 0;
    let mut still_missing = 0;

    for entry in collection.catalog().entries()? {
        let url = format!("{}{}", base_url, entry.filename);
        match fetch_entry(source, media_dir, &entry.filename, &url).await {
            Ok(true) => {
                debug!("Fetched {}", entry.filename);
                fetched += 1;
            }
            Ok(false) => {}
            Err(e) if entry.has_content() => {
                warn!("Required media {} could not be fetched: {}", entry.filename, e);
                return Ok(FetchOutcome::Aborted { url });
            }
            Err(e) => {
                warn!("Media {} still missing: {}", entry.filename, e);
                still_missing += 1;
            }
        }
        progress.update(&format!("File {}...", fetched + still_missing));
    }

    info!(
        "Missing media fetch complete: {} fetched, {} still missing",
        fetched, still_missing
    );
    Ok(FetchOutcome::Completed {
        fetched,
        still_missing,
    })
}

/// Fetch one catalogued file if it is absent.
///
/// Returns `false` when the file is already present. Download and local write
/// failures are both reported as errors so the caller applies one policy.
async fn fetch_entry(
    source: &dyn MediaSource,
    media_dir: &Path,
    filename: &str,
    url: &str,
) -> Result<bool> {
    let path = media_path(media_dir, filename)
        .ok_or_else(|| MediaError::InvalidMediaName(filename.to_string()))?;
    if path.exists() {
        return Ok(false);
    }
    let data = source.fetch(url).await?;
    write_media_file(&path, &data).await?;
    Ok(true)
}

/// Write through a temp file so a partial download never takes the real name.
async fn write_media_file(path: &Path, data: &[u8]) -> Result<()> {
    let temp_path = PathBuf::from(format!(
        "{}{}",
        path.display(),
        NetworkConfig::DOWNLOAD_TEMP_SUFFIX
    ));

    if let Err(e) = tokio::fs::write(&temp_path, data).await {
        let _ = tokio::fs::remove_file(&temp_path).await;
        return Err(MediaError::io_with_path(e, &temp_path));
    }

    tokio::fs::rename(&temp_path, path).await.map_err(|e| {
        let _ = std::fs::remove_file(&temp_path);
        MediaError::Io {
            message: format!("Failed to move download into place: {}", e),
            path: Some(path.to_path_buf()),
            source: Some(e),
        }
    })
}
