//! Media reconciliation.
//!
//! Cards refer to media by filename (`[sound:x.mp3]`, `<img src="y.png">`).
//! This module keeps the catalog's reference counts and content hashes in
//! step with the cards and the media directory, fetches catalogued files that
//! have gone missing, and copies new files in under safe names.

mod fetch;
mod hashing;
mod import;
mod naming;
mod rebuild;
mod references;

pub use fetch::{fetch_missing, FetchOutcome};
pub use hashing::{checksum, checksum_file, checksum_file_or_empty};
pub use import::copy_to_media;
pub use naming::{media_path, sanitize_filename, unique_filename};
pub use rebuild::{count_references, rebuild, RebuildOptions, RebuildReport};
pub use references::{extract_references, strip_references};
