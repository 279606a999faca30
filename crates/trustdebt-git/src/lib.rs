//! Git adapter for Trust Debt source trees.
//!
//! This crate is intentionally thin: it shells out to `git` for documents,
//! history and historical trees, and keeps no state beyond the repository
//! root and the revision it is pinned to.

use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::debug;
use trustdebt_corpus::{CommitRange, CommitRecord, FileBlob, SourceError, SourceTree, Window};

/// Errors from interacting with a git repository.
#[derive(Debug, thiserror::Error)]
pub enum GitError {
    #[error("git executable is not available in PATH")]
    NotInstalled,

    #[error("git command failed: git {args} ({message})")]
    CommandFailed { args: String, message: String },

    #[error("unable to parse git output: {0}")]
    Parse(String),
}

impl From<GitError> for SourceError {
    fn from(error: GitError) -> Self {
        SourceError::Backend(error.to_string())
    }
}

/// A git repository pinned to one commit.
#[derive(Debug, Clone)]
pub struct GitTree {
    repo_root: PathBuf,
    revision: String,
}

impl GitTree {
    /// Returns true if `git` is available in PATH.
    pub fn is_available() -> bool {
        Command::new("git")
            .arg("--version")
            .output()
            .map(|output| output.status.success())
            .unwrap_or(false)
    }

    /// Discover the repository containing `path`, pinned to `HEAD`.
    pub fn discover(path: impl AsRef<Path>) -> Result<Self, GitError> {
        let stdout = run_git(path.as_ref(), &["rev-parse", "--show-toplevel"])?;
        let root = first_nonempty_line(&stdout)
            .ok_or_else(|| GitError::Parse("rev-parse returned no toplevel".to_string()))?;
        let repo_root = PathBuf::from(root);
        let revision = resolve_commit(&repo_root, "HEAD")?;
        Ok(Self {
            repo_root,
            revision,
        })
    }

    /// The same repository pinned to `rev`.
    pub fn at(&self, rev: &str) -> Result<Self, GitError> {
        Ok(Self {
            repo_root: self.repo_root.clone(),
            revision: resolve_commit(&self.repo_root, rev)?,
        })
    }

    pub fn repo_root(&self) -> &Path {
        &self.repo_root
    }

    /// Full commit id this tree is pinned to.
    pub fn revision(&self) -> &str {
        &self.revision
    }

    /// Resolve a range endpoint (short hash, branch, tag, `HEAD~n`) to a
    /// full commit id.
    fn resolve_endpoint(&self, rev: Option<&str>) -> Result<Option<String>, SourceError> {
        let Some(rev) = rev else {
            return Ok(None);
        };
        match resolve_commit(&self.repo_root, rev) {
            Ok(full) => Ok(Some(full)),
            Err(GitError::CommandFailed { .. } | GitError::Parse(_)) => {
                Err(SourceError::UnknownRevision(rev.to_string()))
            }
            Err(other) => Err(other.into()),
        }
    }

    fn history(&self) -> Result<Vec<(String, Option<DateTime<Utc>>)>, GitError> {
        let stdout = run_git(
            &self.repo_root,
            &["log", "--reverse", "--format=%H%x00%ct", &self.revision],
        )?;
        stdout
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(|line| {
                let (id, seconds) = line
                    .split_once('\0')
                    .ok_or_else(|| GitError::Parse(format!("malformed log line: {line:?}")))?;
                Ok((id.to_string(), parse_epoch(seconds)))
            })
            .collect()
    }
}

impl SourceTree for GitTree {
    /// The pinned commit id, which already covers both the tree and its
    /// history.
    fn tree_hash(&self) -> Result<String, SourceError> {
        Ok(self.revision.clone())
    }

    fn list_files(&self) -> Result<Vec<String>, SourceError> {
        let stdout = run_git(
            &self.repo_root,
            &["ls-tree", "-r", "--name-only", "-z", &self.revision],
        )?;
        let mut files: Vec<String> = stdout
            .split('\0')
            .filter(|path| !path.is_empty())
            .map(ToOwned::to_owned)
            .collect();
        files.sort();
        Ok(files)
    }

    fn read_file(&self, path: &str) -> Result<FileBlob, SourceError> {
        let object = format!("{}:{path}", self.revision);
        let bytes = run_git_bytes(&self.repo_root, &["show", &object]).map_err(|error| {
            match error {
                GitError::CommandFailed { message, .. } => SourceError::Unreadable {
                    path: path.to_string(),
                    reason: message,
                },
                other => other.into(),
            }
        })?;
        let text = trustdebt_corpus::source::decode_text(path, bytes)?;
        let stdout = run_git(
            &self.repo_root,
            &["log", "-1", "--format=%ct", &self.revision, "--", path],
        )?;
        Ok(FileBlob {
            text,
            modified: first_nonempty_line(&stdout).and_then(parse_epoch),
        })
    }

    fn commit_ids(&self, window: &Window) -> Result<Vec<String>, SourceError> {
        let history = self.history()?;
        let window = match window {
            Window::Range(range) => Window::Range(CommitRange {
                from: self.resolve_endpoint(range.from.as_deref())?,
                to: self.resolve_endpoint(range.to.as_deref())?,
            }),
            other => other.clone(),
        };
        Ok(window
            .select(&history)?
            .into_iter()
            .map(ToOwned::to_owned)
            .collect())
    }

    fn read_commit(&self, id: &str) -> Result<CommitRecord, SourceError> {
        let stdout = run_git(
            &self.repo_root,
            &["show", "-s", "--format=%H%x00%ct%x00%B", id],
        )
        .map_err(|error| match error {
            GitError::CommandFailed { message, .. } => SourceError::Corrupt {
                id: id.to_string(),
                reason: message,
            },
            other => other.into(),
        })?;
        let mut parts = stdout.splitn(3, '\0');
        let (Some(full_id), Some(seconds), Some(message)) = (parts.next(), parts.next(), parts.next())
        else {
            return Err(SourceError::Corrupt {
                id: id.to_string(),
                reason: "unexpected commit format".to_string(),
            });
        };
        Ok(CommitRecord {
            id: full_id.trim().to_string(),
            timestamp: parse_epoch(seconds),
            message: message.trim().to_string(),
        })
    }

    fn checkout(&self, id: &str) -> Result<Box<dyn SourceTree>, SourceError> {
        let tree = self.at(id).map_err(|error| match error {
            GitError::CommandFailed { .. } => SourceError::UnknownRevision(id.to_string()),
            other => other.into(),
        })?;
        debug!(revision = %tree.revision, "checked out historical tree");
        Ok(Box::new(tree))
    }
}

fn resolve_commit(repo_root: &Path, rev: &str) -> Result<String, GitError> {
    let spec = format!("{rev}^{{commit}}");
    let stdout = run_git(repo_root, &["rev-parse", "--verify", "--quiet", &spec])?;
    first_nonempty_line(&stdout)
        .map(ToOwned::to_owned)
        .ok_or_else(|| GitError::Parse(format!("rev-parse returned nothing for {rev}")))
}

fn run_git(cwd: &Path, args: &[&str]) -> Result<String, GitError> {
    run_git_bytes(cwd, args).map(|bytes| String::from_utf8_lossy(&bytes).to_string())
}

fn run_git_bytes(cwd: &Path, args: &[&str]) -> Result<Vec<u8>, GitError> {
    let output = Command::new("git")
        .args(args)
        .current_dir(cwd)
        .output()
        .map_err(|err| {
            if err.kind() == std::io::ErrorKind::NotFound {
                GitError::NotInstalled
            } else {
                GitError::CommandFailed {
                    args: args.join(" "),
                    message: err.to_string(),
                }
            }
        })?;

    if output.status.success() {
        Ok(output.stdout)
    } else {
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        let message = if stderr.is_empty() {
            "unknown error".to_string()
        } else {
            stderr
        };
        Err(GitError::CommandFailed {
            args: args.join(" "),
            message,
        })
    }
}

fn first_nonempty_line(input: &str) -> Option<&str> {
    input.lines().map(str::trim).find(|line| !line.is_empty())
}

fn parse_epoch(seconds: &str) -> Option<DateTime<Utc>> {
    seconds
        .trim()
        .parse::<i64>()
        .ok()
        .and_then(|s| DateTime::from_timestamp(s, 0))
}
