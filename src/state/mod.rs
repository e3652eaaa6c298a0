//! Durable job state
//!
//! - `Checkpoint`: pending and processed URLs of one crawl job, resumable
//!   after a crash
//! - `FailureQueue`: URLs that failed permanently, kept across runs for
//!   re-driving and reporting
//! - `UrlStatus`: terminal status of a processed URL
//!
//! Both files are plain JSON, written atomically (temp file, fsync, rename).

mod checkpoint;
mod failure_queue;
mod url_status;

use crate::url::normalize_url;
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;

// Re-export main types
pub use checkpoint::{checkpoint_path, Checkpoint, CheckpointStats, ProcessedEntry};
pub use failure_queue::{FailureQueue, FailureRecord};
pub use url_status::UrlStatus;

/// State persistence errors
#[derive(Debug, Error)]
pub enum StateError {
    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to serialize state: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Checkpoint {path} is corrupt ({reason}); rerun with --fresh to start over")]
    CorruptCheckpoint { path: PathBuf, reason: String },

    #[error("Failure queue {path} is corrupt ({reason}); fix or delete the file")]
    CorruptFailureQueue { path: PathBuf, reason: String },
}

/// Result type alias for state operations
pub type StateResult<T> = std::result::Result<T, StateError>;

/// Normalized key for a URL; unparsable input is kept verbatim
///
/// Checkpoint entries and failure records are matched on this key, so
/// cosmetic variants of a URL share one entry.
pub(crate) fn url_key(url: &str) -> String {
    normalize_url(url)
        .map(|u| u.to_string())
        .unwrap_or_else(|_| url.trim().to_string())
}

/// Writes `contents` to `path` atomically
///
/// The data goes to `<path>.tmp`, is synced to disk, then renamed over the
/// target, so readers only ever see the old or the new file.
pub(crate) fn write_atomic(path: &Path, contents: &[u8]) -> StateResult<()> {
    let io_err = |source| StateError::Io {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(io_err)?;
    }

    let mut temp_name = path.as_os_str().to_owned();
    temp_name.push(".tmp");
    let temp_path = PathBuf::from(temp_name);

    let mut file = std::fs::File::create(&temp_path).map_err(io_err)?;
    file.write_all(contents).map_err(io_err)?;
    file.sync_all().map_err(io_err)?;
    drop(file);

    std::fs::rename(&temp_path, path).map_err(io_err)?;
    Ok(())
}

/// Reads a state file; `Ok(None)` when it does not exist
pub(crate) fn read_optional(path: &Path) -> StateResult<Option<String>> {
    match std::fs::read_to_string(path) {
        Ok(content) => Ok(Some(content)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(source) => Err(StateError::Io {
            path: path.to_path_buf(),
            source,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_write_atomic_leaves_no_temp_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("state.json");

        write_atomic(&path, b"{\"a\":1}").unwrap();
        write_atomic(&path, b"{\"a\":2}").unwrap();

        assert_eq!(std::fs::read_to_string(&path).unwrap(), "{\"a\":2}");
        let names: Vec<_> = std::fs::read_dir(path.parent().unwrap())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(names.len(), 1);
    }

    #[test]
    fn test_url_key_normalizes() {
        assert_eq!(url_key("https://WWW.X.com/a/"), url_key("https://x.com/a"));
        assert_eq!(url_key(" not a url "), "not a url");
    }

    #[test]
    fn test_read_optional_missing() {
        let dir = TempDir::new().unwrap();
        assert!(read_optional(&dir.path().join("absent.json"))
            .unwrap()
            .is_none());
    }
}
