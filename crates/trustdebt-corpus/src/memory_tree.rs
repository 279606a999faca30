//! In-memory source tree with a scripted history.
//!
//! Useful for tests and for embedding callers that already hold their
//! documents and commits in memory.

use crate::source::{CommitRecord, FileBlob, SourceError, SourceTree};
use crate::window::Window;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use trustdebt_kernel::ContentHash;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileChange {
    Write { path: String, text: String },
    Delete { path: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryCommit {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub message: String,
    pub changes: Vec<FileChange>,
    /// The commit's objects are damaged: it can be neither read nor checked out.
    pub corrupt: bool,
}

impl MemoryCommit {
    pub fn new(id: impl Into<String>, timestamp: DateTime<Utc>, message: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            timestamp,
            message: message.into(),
            changes: Vec::new(),
            corrupt: false,
        }
    }

    pub fn write(mut self, path: impl Into<String>, text: impl Into<String>) -> Self {
        self.changes.push(FileChange::Write {
            path: path.into(),
            text: text.into(),
        });
        self
    }

    pub fn delete(mut self, path: impl Into<String>) -> Self {
        self.changes.push(FileChange::Delete { path: path.into() });
        self
    }

    pub fn corrupt(mut self) -> Self {
        self.corrupt = true;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct MemoryFile {
    text: String,
    modified: Option<DateTime<Utc>>,
}

#[derive(Debug, Default)]
struct History {
    base: BTreeMap<String, String>,
    commits: Vec<MemoryCommit>,
    unreadable: BTreeSet<String>,
}

#[derive(Debug, Default)]
pub struct MemoryTreeBuilder {
    history: History,
}

impl MemoryTreeBuilder {
    /// A file present before the first commit, with no timestamp.
    pub fn file(mut self, path: impl Into<String>, text: impl Into<String>) -> Self {
        self.history.base.insert(path.into(), text.into());
        self
    }

    pub fn commit(mut self, commit: MemoryCommit) -> Self {
        self.history.commits.push(commit);
        self
    }

    /// Listed, but every read fails.
    pub fn unreadable(mut self, path: impl Into<String>) -> Self {
        self.history.unreadable.insert(path.into());
        self
    }

    /// Tree at the tip of history.
    pub fn build(self) -> Result<MemoryTree, SourceError> {
        let mut seen = BTreeSet::new();
        for commit in &self.history.commits {
            if !seen.insert(commit.id.as_str()) {
                return Err(SourceError::Backend(format!(
                    "duplicate commit id `{}`",
                    commit.id
                )));
            }
        }
        let history = Arc::new(self.history);
        let head = history.commits.len();
        Ok(MemoryTree::at(history, head))
    }
}

#[derive(Debug, Clone)]
pub struct MemoryTree {
    history: Arc<History>,
    head: usize,
    files: BTreeMap<String, MemoryFile>,
}

impl MemoryTree {
    pub fn builder() -> MemoryTreeBuilder {
        MemoryTreeBuilder::default()
    }

    fn at(history: Arc<History>, head: usize) -> Self {
        let mut files: BTreeMap<String, MemoryFile> = history
            .base
            .iter()
            .map(|(path, text)| {
                (
                    path.clone(),
                    MemoryFile {
                        text: text.clone(),
                        modified: None,
                    },
                )
            })
            .collect();
        for commit in history.commits.iter().take(head) {
            for change in &commit.changes {
                match change {
                    FileChange::Write { path, text } => {
                        files.insert(
                            path.clone(),
                            MemoryFile {
                                text: text.clone(),
                                modified: Some(commit.timestamp),
                            },
                        );
                    }
                    FileChange::Delete { path } => {
                        files.remove(path);
                    }
                }
            }
        }
        Self {
            history,
            head,
            files,
        }
    }

    /// Id of the newest commit applied, if any.
    pub fn head(&self) -> Option<&str> {
        self.head
            .checked_sub(1)
            .and_then(|idx| self.history.commits.get(idx))
            .map(|c| c.id.as_str())
    }

    fn visible_commits(&self) -> &[MemoryCommit] {
        &self.history.commits[..self.head]
    }

    fn commit(&self, id: &str) -> Result<(usize, &MemoryCommit), SourceError> {
        self.visible_commits()
            .iter()
            .enumerate()
            .find(|(_, c)| c.id == id)
            .ok_or_else(|| SourceError::UnknownRevision(id.to_string()))
    }
}

impl SourceTree for MemoryTree {
    fn tree_hash(&self) -> Result<String, SourceError> {
        let mut builder = ContentHash::builder();
        for (path, file) in &self.files {
            builder = builder.field("path", path).field("text", &file.text);
        }
        for path in &self.history.unreadable {
            builder = builder.field("unreadable", path);
        }
        for commit in self.visible_commits() {
            builder = builder
                .field("commit", &commit.id)
                .field("timestamp", &commit.timestamp.to_rfc3339())
                .field("message", &commit.message)
                .field_int("corrupt", i64::from(commit.corrupt));
        }
        Ok(builder.finish().0)
    }

    fn list_files(&self) -> Result<Vec<String>, SourceError> {
        Ok(self.files.keys().cloned().collect())
    }

    fn read_file(&self, path: &str) -> Result<FileBlob, SourceError> {
        let file = self
            .files
            .get(path)
            .ok_or_else(|| SourceError::NotFound(path.to_string()))?;
        if self.history.unreadable.contains(path) {
            return Err(SourceError::Unreadable {
                path: path.to_string(),
                reason: "marked unreadable".to_string(),
            });
        }
        Ok(FileBlob {
            text: file.text.clone(),
            modified: file.modified,
        })
    }

    fn commit_ids(&self, window: &Window) -> Result<Vec<String>, SourceError> {
        let history: Vec<(String, Option<DateTime<Utc>>)> = self
            .visible_commits()
            .iter()
            .map(|c| (c.id.clone(), Some(c.timestamp)))
            .collect();
        Ok(window
            .select(&history)?
            .into_iter()
            .map(ToOwned::to_owned)
            .collect())
    }

    fn read_commit(&self, id: &str) -> Result<CommitRecord, SourceError> {
        let (_, commit) = self.commit(id)?;
        if commit.corrupt {
            return Err(SourceError::Corrupt {
                id: id.to_string(),
                reason: "commit object is damaged".to_string(),
            });
        }
        Ok(CommitRecord {
            id: commit.id.clone(),
            timestamp: Some(commit.timestamp),
            message: commit.message.clone(),
        })
    }

    fn checkout(&self, id: &str) -> Result<Box<dyn SourceTree>, SourceError> {
        let (idx, commit) = self.commit(id)?;
        if commit.corrupt {
            return Err(SourceError::Corrupt {
                id: id.to_string(),
                reason: "tree cannot be reconstructed".to_string(),
            });
        }
        Ok(Box::new(Self::at(Arc::clone(&self.history), idx + 1)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn day(d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, d, 9, 0, 0)
            .single()
            .expect("valid date")
    }

    fn tree() -> MemoryTree {
        MemoryTree::builder()
            .file("LICENSE.txt", "MIT")
            .commit(MemoryCommit::new("c1", day(1), "add spec").write("spec.md", "security v1"))
            .commit(
                MemoryCommit::new("c2", day(2), "rewrite spec")
                    .write("spec.md", "security v2")
                    .write("docs/guide.md", "speed"),
            )
            .commit(MemoryCommit::new("c3", day(3), "drop guide").delete("docs/guide.md"))
            .unreadable("LICENSE.txt")
            .build()
            .expect("unique commit ids")
    }

    #[test]
    fn tip_reflects_every_change() {
        let tree = tree();
        assert_eq!(tree.head(), Some("c3"));
        assert_eq!(
            tree.list_files().expect("list"),
            vec!["LICENSE.txt".to_string(), "spec.md".to_string()]
        );
        let blob = tree.read_file("spec.md").expect("read");
        assert_eq!(blob.text, "security v2");
        assert_eq!(blob.modified, Some(day(2)));
    }

    #[test]
    fn checkout_rebuilds_past_state() {
        let tree = tree();
        let past = tree.checkout("c2").expect("checkout");
        assert_eq!(
            past.list_files().expect("list"),
            vec!["LICENSE.txt", "docs/guide.md", "spec.md"]
        );
        assert_eq!(past.commit_ids(&Window::All).expect("ids"), vec!["c1", "c2"]);
        assert!(matches!(
            past.read_commit("c3"),
            Err(SourceError::UnknownRevision(_))
        ));
        assert_ne!(past.tree_hash().expect("hash"), tree.tree_hash().expect("hash"));
    }

    #[test]
    fn unreadable_and_missing_files() {
        let tree = tree();
        assert!(matches!(
            tree.read_file("LICENSE.txt"),
            Err(SourceError::Unreadable { .. })
        ));
        assert!(matches!(
            tree.read_file("nope.md"),
            Err(SourceError::NotFound(_))
        ));
    }

    #[test]
    fn corrupt_commits_fail_to_read_and_checkout() {
        let tree = MemoryTree::builder()
            .commit(MemoryCommit::new("c1", day(1), "ok"))
            .commit(MemoryCommit::new("c2", day(2), "bad").corrupt())
            .build()
            .expect("unique commit ids");
        assert!(tree.read_commit("c1").is_ok());
        assert!(matches!(tree.read_commit("c2"), Err(SourceError::Corrupt { .. })));
        assert!(matches!(tree.checkout("c2"), Err(SourceError::Corrupt { .. })));
    }

    #[test]
    fn duplicate_commit_ids_are_rejected() {
        let result = MemoryTree::builder()
            .commit(MemoryCommit::new("c1", day(1), "a"))
            .commit(MemoryCommit::new("c1", day(2), "b"))
            .build();
        assert!(matches!(result, Err(SourceError::Backend(_))));
    }

    #[test]
    fn tree_hash_is_stable() {
        assert_eq!(
            tree().tree_hash().expect("hash"),
            tree().tree_hash().expect("hash")
        );
    }
}
