//! Corpus extraction for Trust Debt.
//!
//! Turns a [`SourceTree`] into the two corpora the kernel compares:
//!
//! - **intent**: documentation files, classified by path and weighted by class
//! - **reality**: commit messages inside a [`Window`], oldest first
//!
//! Anything that cannot be read becomes a
//! [`CorpusGapError`](trustdebt_kernel::CorpusGapError) and contributes zero
//! weight; extraction itself never fails.

pub mod category_source;
pub mod classify;
pub mod config;
pub mod extract;
pub mod fs_tree;
pub mod memory_tree;
pub mod source;
pub mod window;

pub use category_source::{CategorySource, FrequencyCategorySource, StaticCategorySource};
pub use classify::{ClassRule, Classifier};
pub use config::{ClassWeights, ExtractionConfig};
pub use extract::{Extraction, Extractor};
pub use fs_tree::FsTree;
pub use memory_tree::{FileChange, MemoryCommit, MemoryTree, MemoryTreeBuilder};
pub use source::{CommitRecord, FileBlob, SourceError, SourceTree};
pub use window::{CommitRange, Window};
