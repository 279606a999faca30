//! Idempotency cache for finished analyses.
//!
//! Entries are immutable: a `put` for a key that already has an entry is a
//! no-op. A change to the tree, window, taxonomy or scoring configuration is
//! a different key.

use crate::error::CacheError;
use crate::pipeline::Analysis;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::ffi::OsString;
use std::fs::{self, File};
use std::io::{BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::debug;
use trustdebt_kernel::ContentHash;

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheKey {
    pub source_tree_hash: String,
    /// Canonical window description, e.g. `range:a..b`.
    pub commit_range: String,
    pub taxonomy_hash: ContentHash,
    pub config_digest: ContentHash,
}

impl CacheKey {
    pub fn digest(&self) -> ContentHash {
        ContentHash::builder()
            .field("sourceTreeHash", &self.source_tree_hash)
            .field("commitRange", &self.commit_range)
            .field("taxonomyHash", self.taxonomy_hash.as_str())
            .field("configDigest", self.config_digest.as_str())
            .finish()
    }
}

pub trait AnalysisCache: Send + Sync {
    fn get(&self, key: &CacheKey) -> Result<Option<Analysis>, CacheError>;

    /// Store `analysis` under `key`. Returns `false` when an entry already
    /// existed, in which case nothing is written.
    fn put(&self, key: &CacheKey, analysis: &Analysis) -> Result<bool, CacheError>;
}

#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: Mutex<BTreeMap<CacheKey, Analysis>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl AnalysisCache for MemoryCache {
    fn get(&self, key: &CacheKey) -> Result<Option<Analysis>, CacheError> {
        let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(entries.get(key).cloned())
    }

    fn put(&self, key: &CacheKey, analysis: &Analysis) -> Result<bool, CacheError> {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        if entries.contains_key(key) {
            return Ok(false);
        }
        entries.insert(key.clone(), analysis.clone());
        Ok(true)
    }
}

/// One JSON file per key digest under a directory.
///
/// Writes go to a temp file that is then hard-linked into place, so a
/// concurrent writer for the same key can never replace a published entry.
#[derive(Debug, Clone)]
pub struct DirCache {
    root: PathBuf,
}

impl DirCache {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn entry_path(&self, key: &CacheKey) -> PathBuf {
        self.root.join(format!("{}.json", key.digest()))
    }
}

impl AnalysisCache for DirCache {
    fn get(&self, key: &CacheKey) -> Result<Option<Analysis>, CacheError> {
        let path = self.entry_path(key);
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(io_error(&path, e)),
        };
        let analysis: Analysis =
            serde_json::from_slice(&bytes).map_err(|e| CacheError::Decode {
                path: path.display().to_string(),
                message: e.to_string(),
            })?;
        if analysis.key.as_ref() != Some(key) {
            return Err(CacheError::Decode {
                path: path.display().to_string(),
                message: "stored key does not match requested key".to_string(),
            });
        }
        Ok(Some(analysis))
    }

    fn put(&self, key: &CacheKey, analysis: &Analysis) -> Result<bool, CacheError> {
        let path = self.entry_path(key);
        if path.exists() {
            return Ok(false);
        }
        fs::create_dir_all(&self.root).map_err(|e| io_error(&self.root, e))?;

        let bytes = serde_json::to_vec_pretty(analysis).map_err(CacheError::Encode)?;
        let tmp_path = tmp_write_path(&path);
        let write_result = (|| -> Result<(), CacheError> {
            let file = File::create(&tmp_path).map_err(|e| io_error(&tmp_path, e))?;
            let mut writer = BufWriter::new(file);
            writer
                .write_all(&bytes)
                .map_err(|e| io_error(&tmp_path, e))?;
            let file = writer
                .into_inner()
                .map_err(|e| io_error(&tmp_path, e.into_error()))?;
            file.sync_all().map_err(|e| io_error(&tmp_path, e))
        })();
        if let Err(error) = write_result {
            let _ = fs::remove_file(&tmp_path);
            return Err(error);
        }

        let published = fs::hard_link(&tmp_path, &path);
        let _ = fs::remove_file(&tmp_path);
        match published {
            Ok(()) => {
                debug!(path = %path.display(), "wrote cache entry");
                Ok(true)
            }
            Err(e) if e.kind() == ErrorKind::AlreadyExists => Ok(false),
            Err(e) => Err(io_error(&path, e)),
        }
    }
}

fn io_error(path: &Path, error: std::io::Error) -> CacheError {
    CacheError::Io {
        path: path.display().to_string(),
        message: error.to_string(),
    }
}

fn tmp_write_path(path: &Path) -> PathBuf {
    let unique = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos();
    let mut tmp: OsString = path.as_os_str().to_os_string();
    tmp.push(format!(".tmp.{}.{}", std::process::id(), unique));
    PathBuf::from(tmp)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(tree: &str) -> CacheKey {
        CacheKey {
            source_tree_hash: tree.to_string(),
            commit_range: "all".to_string(),
            taxonomy_hash: ContentHash::from_str_content("taxonomy"),
            config_digest: ContentHash::from_str_content("config"),
        }
    }

    #[test]
    fn key_digest_depends_on_every_field() {
        let base = key("t1");
        let mut range = base.clone();
        range.commit_range = "last:5".to_string();
        let mut config = base.clone();
        config.config_digest = ContentHash::from_str_content("other");

        assert_eq!(base.digest(), key("t1").digest());
        assert_ne!(base.digest(), key("t2").digest());
        assert_ne!(base.digest(), range.digest());
        assert_ne!(base.digest(), config.digest());
    }

    #[test]
    fn missing_dir_entry_reads_as_none() {
        let cache = DirCache::new(std::env::temp_dir().join("trustdebt-cache-absent-dir"));
        assert!(matches!(cache.get(&key("t1")), Ok(None)));
    }
}
