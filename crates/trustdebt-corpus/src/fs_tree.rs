//! Plain directory as a source tree.
//!
//! Documents come from the filesystem with their modification time as the
//! timestamp. History comes from an optional JSONL change log, one
//! [`CommitRecord`] per line, oldest first. Without a log the history is
//! empty. Point-in-time checkout is not available.

use crate::source::{CommitRecord, FileBlob, SourceError, SourceTree, decode_text};
use crate::window::Window;
use chrono::{DateTime, Utc};
use std::fs;
use std::path::{Path, PathBuf};
use trustdebt_kernel::ContentHash;

/// Directory names never descended into.
const SKIPPED_DIRS: &[&str] = &["target", "node_modules"];

#[derive(Debug, Clone)]
pub struct FsTree {
    root: PathBuf,
    commit_log: Option<PathBuf>,
}

impl FsTree {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            commit_log: None,
        }
    }

    pub fn with_commit_log(mut self, path: impl Into<PathBuf>) -> Self {
        self.commit_log = Some(path.into());
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn read_log(&self) -> Result<Vec<CommitRecord>, SourceError> {
        let Some(path) = &self.commit_log else {
            return Ok(Vec::new());
        };
        let bytes =
            fs::read(path).map_err(|e| SourceError::Io(format!("{}: {e}", path.display())))?;
        let text = decode_text(&path.display().to_string(), bytes)?;
        let mut records = Vec::new();
        for (line_no, line) in text.lines().enumerate() {
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }
            let record: CommitRecord =
                serde_json::from_str(trimmed).map_err(|e| SourceError::Corrupt {
                    id: format!("{}:{}", path.display(), line_no + 1),
                    reason: e.to_string(),
                })?;
            records.push(record);
        }
        Ok(records)
    }
}

fn file_modified(path: &Path) -> Option<DateTime<Utc>> {
    fs::metadata(path)
        .and_then(|metadata| metadata.modified())
        .ok()
        .map(DateTime::<Utc>::from)
}

fn walk(root: &Path, dir: &Path, out: &mut Vec<String>) -> Result<(), SourceError> {
    let entries =
        fs::read_dir(dir).map_err(|e| SourceError::Io(format!("{}: {e}", dir.display())))?;
    for entry in entries {
        let entry = entry.map_err(|e| SourceError::Io(format!("{}: {e}", dir.display())))?;
        let name = entry.file_name().to_string_lossy().to_string();
        let file_type = entry
            .file_type()
            .map_err(|e| SourceError::Io(format!("{}: {e}", entry.path().display())))?;
        if file_type.is_dir() {
            if name.starts_with('.') || SKIPPED_DIRS.contains(&name.as_str()) {
                continue;
            }
            walk(root, &entry.path(), out)?;
        } else if file_type.is_file() {
            let path = entry.path();
            let Ok(relative) = path.strip_prefix(root) else {
                continue;
            };
            let parts: Vec<String> = relative
                .components()
                .map(|c| c.as_os_str().to_string_lossy().to_string())
                .collect();
            out.push(parts.join("/"));
        }
    }
    Ok(())
}

impl SourceTree for FsTree {
    fn tree_hash(&self) -> Result<String, SourceError> {
        let mut builder = ContentHash::builder();
        for path in self.list_files()? {
            let full = self.root.join(&path);
            let bytes = fs::read(&full).map_err(|e| SourceError::Io(format!("{path}: {e}")))?;
            // The mtime is the document timestamp, so it feeds spec age.
            let modified = file_modified(&full).map(|t| t.to_rfc3339());
            builder = builder
                .field("path", &path)
                .field("content", ContentHash::from_bytes(&bytes).as_str())
                .field_opt("modified", modified.as_deref());
        }
        for record in self.read_log()? {
            let timestamp = record.timestamp.map(|t| t.to_rfc3339());
            builder = builder
                .field("commit", &record.id)
                .field_opt("timestamp", timestamp.as_deref())
                .field("message", &record.message);
        }
        Ok(builder.finish().0)
    }

    fn list_files(&self) -> Result<Vec<String>, SourceError> {
        if !self.root.is_dir() {
            return Err(SourceError::NotFound(self.root.display().to_string()));
        }
        let mut files = Vec::new();
        walk(&self.root, &self.root, &mut files)?;
        files.sort();
        Ok(files)
    }

    fn read_file(&self, path: &str) -> Result<FileBlob, SourceError> {
        let full = self.root.join(path);
        let metadata = fs::metadata(&full).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => SourceError::NotFound(path.to_string()),
            _ => SourceError::Unreadable {
                path: path.to_string(),
                reason: e.to_string(),
            },
        })?;
        let bytes = fs::read(&full).map_err(|e| SourceError::Unreadable {
            path: path.to_string(),
            reason: e.to_string(),
        })?;
        Ok(FileBlob {
            text: decode_text(path, bytes)?,
            modified: metadata.modified().ok().map(DateTime::<Utc>::from),
        })
    }

    fn commit_ids(&self, window: &Window) -> Result<Vec<String>, SourceError> {
        let history: Vec<(String, Option<DateTime<Utc>>)> = self
            .read_log()?
            .into_iter()
            .map(|r| (r.id, r.timestamp))
            .collect();
        Ok(window
            .select(&history)?
            .into_iter()
            .map(ToOwned::to_owned)
            .collect())
    }

    fn read_commit(&self, id: &str) -> Result<CommitRecord, SourceError> {
        self.read_log()?
            .into_iter()
            .find(|r| r.id == id)
            .ok_or_else(|| SourceError::UnknownRevision(id.to_string()))
    }

    fn checkout(&self, _id: &str) -> Result<Box<dyn SourceTree>, SourceError> {
        Err(SourceError::Unsupported("checkout of a plain directory".to_string()))
    }
}
