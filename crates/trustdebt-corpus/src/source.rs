//! The versioned source tree seen by the extractor.

use crate::window::Window;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A readable file at the tree's current state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileBlob {
    pub text: String,
    pub modified: Option<DateTime<Utc>>,
}

/// One entry of the change history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommitRecord {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(default)]
    pub message: String,
}

/// Errors from a [`SourceTree`] backend.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SourceError {
    #[error("no such path: {0}")]
    NotFound(String),

    #[error("{path} is unreadable: {reason}")]
    Unreadable { path: String, reason: String },

    #[error("unknown revision: {0}")]
    UnknownRevision(String),

    #[error("object {id} is corrupt: {reason}")]
    Corrupt { id: String, reason: String },

    #[error("{0} is not supported by this source")]
    Unsupported(String),

    #[error("I/O error: {0}")]
    Io(String),

    #[error("backend error: {0}")]
    Backend(String),
}

/// Document and history access at one point in time.
///
/// Paths are repository-relative with `/` separators. History is listed
/// oldest first. Implementations must be deterministic: the same state
/// answers every call identically.
pub trait SourceTree: Send + Sync {
    /// Stable identity of the documents and the history visible from this
    /// state. Two states with equal hashes must extract identical corpora.
    fn tree_hash(&self) -> Result<String, SourceError>;

    /// Every file path, sorted.
    fn list_files(&self) -> Result<Vec<String>, SourceError>;

    fn read_file(&self, path: &str) -> Result<FileBlob, SourceError>;

    /// Commit ids selected by `window`, oldest first.
    fn commit_ids(&self, window: &Window) -> Result<Vec<String>, SourceError>;

    fn read_commit(&self, id: &str) -> Result<CommitRecord, SourceError>;

    /// The tree as it existed at commit `id`.
    fn checkout(&self, id: &str) -> Result<Box<dyn SourceTree>, SourceError>;
}

/// Reject payloads that are not text.
pub fn decode_text(path: &str, bytes: Vec<u8>) -> Result<String, SourceError> {
    if bytes.contains(&0) {
        return Err(SourceError::Unreadable {
            path: path.to_string(),
            reason: "contains NUL byte(s)".to_string(),
        });
    }
    String::from_utf8(bytes).map_err(|_| SourceError::Unreadable {
        path: path.to_string(),
        reason: "contains non-UTF-8 byte sequence(s)".to_string(),
    })
}
