//! The owning collection, as seen by media operations.
//!
//! Media code never reaches into global state. Every operation receives a
//! [`Collection`] for the length of a single call and goes through it for
//! the catalog, the media directory, card text, configuration and progress.

use crate::catalog::CatalogStore;
use crate::error::Result;
use std::path::PathBuf;
use tracing::{debug, info};

/// Question and answer text of one card.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordText {
    pub question: String,
    pub answer: String,
}

impl RecordText {
    pub fn new(question: impl Into<String>, answer: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            answer: answer.into(),
        }
    }

    /// Both text fields, question first.
    pub fn fields(&self) -> [&str; 2] {
        [&self.question, &self.answer]
    }
}

/// Receiver for progress of long-running media operations.
pub trait ProgressSink: Send + Sync {
    fn begin(&self, title: &str);
    fn update(&self, label: &str);
    fn end(&self);
}

/// Discards all progress.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn begin(&self, _title: &str) {}
    fn update(&self, _label: &str) {}
    fn end(&self) {}
}

/// Emits progress as tracing events.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogProgress;

impl ProgressSink for LogProgress {
    fn begin(&self, title: &str) {
        info!("{}", title);
    }

    fn update(&self, label: &str) {
        debug!("{}", label);
    }

    fn end(&self) {}
}

/// A deck (or any card store) that owns a media catalog.
pub trait Collection {
    /// The media catalog.
    fn catalog(&self) -> &dyn CatalogStore;

    /// Directory holding this collection's media files.
    ///
    /// With `create`, the directory is created if it does not exist yet.
    fn media_dir(&self, create: bool) -> Result<PathBuf>;

    /// A collection-level configuration value.
    fn config_value(&self, key: &str) -> Result<Option<String>>;

    /// Text of every card.
    fn records(&self) -> Result<Vec<RecordText>>;

    /// Where progress is reported.
    fn progress(&self) -> &dyn ProgressSink;

    /// Note that persistent state changed.
    fn mark_dirty(&self) -> Result<()>;
}
