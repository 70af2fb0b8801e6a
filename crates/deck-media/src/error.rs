//! Error types for deck media operations.
//!
//! Missing or unreadable media files are usually *not* errors: the catalog
//! records them with an empty content hash. The variants below cover the
//! failures a caller actually has to act on.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for the media library.
#[derive(Debug, Error)]
pub enum MediaError {
    // Database errors
    #[error("Database error: {message}")]
    Database {
        message: String,
        #[source]
        source: Option<rusqlite::Error>,
    },

    // File system errors
    #[error("IO error at {path:?}: {message}")]
    Io {
        message: String,
        path: Option<PathBuf>,
        #[source]
        source: Option<std::io::Error>,
    },

    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Media name does not resolve inside the media directory: {0}")]
    InvalidMediaName(String),

    #[error("No free filename for {base} after {attempts} attempts")]
    NameExhausted { base: String, attempts: u32 },

    // Network errors
    #[error("Network error: {message}")]
    Network {
        message: String,
        /// Optional cause description
        cause: Option<String>,
    },

    #[error("Download failed for {url}: {message}")]
    DownloadFailed { url: String, message: String },

    // Configuration errors
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("{0}")]
    Other(String),
}

/// Result type alias for media operations.
pub type Result<T> = std::result::Result<T, MediaError>;

impl From<std::io::Error> for MediaError {
    fn from(err: std::io::Error) -> Self {
        MediaError::Io {
            message: err.to_string(),
            path: None,
            source: Some(err),
        }
    }
}

impl From<rusqlite::Error> for MediaError {
    fn from(err: rusqlite::Error) -> Self {
        MediaError::Database {
            message: err.to_string(),
            source: Some(err),
        }
    }
}

impl From<reqwest::Error> for MediaError {
    fn from(err: reqwest::Error) -> Self {
        MediaError::Network {
            message: err.to_string(),
            cause: err.url().map(|u| u.to_string()),
        }
    }
}

impl MediaError {
    /// Create an IO error with path context.
    pub fn io_with_path(err: std::io::Error, path: impl Into<PathBuf>) -> Self {
        MediaError::Io {
            message: err.to_string(),
            path: Some(path.into()),
            source: Some(err),
        }
    }

    /// Error for a poisoned or otherwise unusable connection lock.
    pub(crate) fn lock_poisoned() -> Self {
        MediaError::Database {
            message: "Failed to acquire connection lock".to_string(),
            source: None,
        }
    }

    /// Check if this error should trigger a retry.
    pub fn is_retryable(&self) -> bool {
        matches!(self, MediaError::Network { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = MediaError::DownloadFailed {
            url: "http://example.com/a.mp3".into(),
            message: "404 Not Found".into(),
        };
        assert_eq!(
            err.to_string(),
            "Download failed for http://example.com/a.mp3: 404 Not Found"
        );
    }

    #[test]
    fn test_io_with_path_keeps_path() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        match MediaError::io_with_path(io, "/tmp/x.png") {
            MediaError::Io { path, source, .. } => {
                assert_eq!(path, Some(PathBuf::from("/tmp/x.png")));
                assert!(source.is_some());
            }
            other => panic!("unexpected variant: {other:?}"),
        }
    }

    #[test]
    fn test_retryable_errors() {
        assert!(MediaError::Network {
            message: "reset".into(),
            cause: None
        }
        .is_retryable());
        assert!(!MediaError::NameExhausted {
            base: "a.png".into(),
            attempts: 3
        }
        .is_retryable());
    }
}
