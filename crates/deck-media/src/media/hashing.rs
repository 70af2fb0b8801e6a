//! Content hashing for media files.
//!
//! Digests are lowercase hex SHA-256. The same digest serves as the catalog's
//! content-addressing key (import dedupe) and as its up-to-date check
//! (rebuild hash refresh), so it must be stable across runs and platforms.

use crate::config::MediaConfig;
use crate::error::{MediaError, Result};
use sha2::{Digest, Sha256};
use std::io::Read;
use std::path::Path;

/// Hash an in-memory byte blob.
pub fn checksum(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

/// Hash a file's contents, streaming it in fixed-size chunks.
///
/// # Arguments
///
/// * `path` - Path to the file to hash
pub fn checksum_file(path: impl AsRef<Path>) -> Result<String> {
    let path = path.as_ref();
    let mut file = std::fs::File::open(path).map_err(|e| MediaError::io_with_path(e, path))?;

    let mut hasher = Sha256::new();
    let mut buffer = vec![0u8; MediaConfig::HASH_CHUNK_SIZE];
    loop {
        let bytes_read = file
            .read(&mut buffer)
            .map_err(|e| MediaError::io_with_path(e, path))?;
        if bytes_read == 0 {
            break;
        }
        hasher.update(&buffer[..bytes_read]);
    }

    Ok(hex::encode(hasher.finalize()))
}

/// Hash a file, or return an empty string if it is absent or unreadable.
///
/// Anything that is not a regular file (directories, dangling links) counts
/// as absent. The empty string is the catalog's "no confirmed content" value.
pub fn checksum_file_or_empty(path: impl AsRef<Path>) -> String {
    let path = path.as_ref();
    if !path.is_file() {
        return String::new();
    }
    match checksum_file(path) {
        Ok(sum) => sum,
        Err(e) => {
            tracing::debug!("Treating unreadable media file as absent: {}", e);
            String::new()
        }
    }
}
