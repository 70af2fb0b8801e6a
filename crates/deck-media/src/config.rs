//! Centralized configuration for deck media handling.
//!
//! Constants are grouped on unit structs by concern. Values that vary per
//! deck (such as the remote media URL) are read from the collection at
//! runtime via [`Collection::config_value`](crate::Collection::config_value).

use std::time::Duration;

/// Media catalog and directory configuration.
pub struct MediaConfig;

impl MediaConfig {
    /// Deck variable holding the base URL for missing-media downloads.
    pub const REMOTE_URL_KEY: &'static str = "mediaURL";
    /// Extension of deck database files.
    pub const DECK_EXTENSION: &'static str = "anki";
    /// Extension that replaces [`Self::DECK_EXTENSION`] to form the media directory.
    pub const MEDIA_DIR_EXTENSION: &'static str = "media";
    /// Upper bound on ` (n)` suffixes tried when allocating a filename.
    pub const MAX_UNIQUE_NAME_ATTEMPTS: u32 = 10_000;
    /// Read buffer size for streamed hashing.
    pub const HASH_CHUNK_SIZE: usize = 64 * 1024;
    pub const CHECK_MEDIA_TITLE: &'static str = "Check Media DB";
    pub const FETCH_MEDIA_TITLE: &'static str = "Download Missing Media";
}

/// Network-related configuration.
pub struct NetworkConfig;

impl NetworkConfig {
    pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
    pub const USER_AGENT: &'static str = concat!("deck-media/", env!("CARGO_PKG_VERSION"));
    pub const DOWNLOAD_TEMP_SUFFIX: &'static str = ".part";
}
