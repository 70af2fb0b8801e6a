//! Deck Media - media catalog reconciliation for flashcard decks.
//!
//! Cards reference audio and images by filename. This crate keeps a
//! reference-counted catalog of those files in step with the card text and
//! the media directory on disk.
//!
//! # Example
//!
//! ```rust,no_run
//! use deck_media::media::{rebuild, RebuildOptions};
//! use deck_media::Deck;
//!
//! fn main() -> deck_media::Result<()> {
//!     let deck = Deck::open("/path/to/french.anki")?;
//!     deck.add_record("[sound:bonjour.mp3]", "hello")?;
//!
//!     let report = rebuild(&deck, RebuildOptions::default())?;
//!     println!("missing: {:?}", report.missing);
//!     println!("unused: {:?}", report.unused);
//!     Ok(())
//! }
//! ```

pub mod catalog;
pub mod collection;
pub mod config;
pub mod deck;
pub mod error;
pub mod media;
pub mod network;

// Re-export commonly used types
pub use catalog::{CatalogEntry, CatalogStore, MemoryCatalog, SqliteCatalog};
pub use collection::{Collection, LogProgress, NoProgress, ProgressSink, RecordText};
pub use config::{MediaConfig, NetworkConfig};
pub use deck::Deck;
pub use error::{MediaError, Result};
pub use media::{FetchOutcome, RebuildOptions, RebuildReport};
pub use network::{HttpMediaSource, MediaSource};
