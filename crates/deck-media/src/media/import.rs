//! Copy external files into a collection's media directory.

use crate::collection::Collection;
use crate::error::{MediaError, Result};
use crate::media::hashing::checksum_file;
use crate::media::naming::unique_filename;
use std::path::Path;
use tracing::{debug, info, instrument};

/// Copy `source` into the media directory and return the name it lives under.
///
/// If the catalog already holds a file with identical content, that file's
/// name is returned and nothing is copied. Otherwise the file is copied under
/// a sanitized, collision-free version of its base name. The catalog itself is
/// left untouched; the next rebuild picks the file up once a card references
/// it.
#[instrument(skip_all)]
pub fn copy_to_media(
    collection: &(impl Collection + ?Sized),
    source: impl AsRef<Path>,
) -> Result<String> {
    let source = source.as_ref();
    if !source.is_file() {
        return Err(MediaError::FileNotFound(source.to_path_buf()));
    }

    let hash = checksum_file(source)?;
    if let Some(existing) = collection.catalog().find_by_content_hash(&hash)? {
        debug!("{} duplicates catalogued media {}", source.display(), existing);
        return Ok(existing);
    }

    let base_name = source
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .ok_or_else(|| MediaError::Io {
            message: "Source path has no file name".to_string(),
            path: Some(source.to_path_buf()),
            source: None,
        })?;

    let media_dir = collection.media_dir(true)?;
    let name = unique_filename(&media_dir, &base_name)?;
    let target = media_dir.join(&name);
    std::fs::copy(source, &target).map_err(|e| MediaError::io_with_path(e, &target))?;

    info!("Copied {} into media as {}", source.display(), name);
    Ok(name)
}
