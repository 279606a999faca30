//! Error types for Trust Debt kernel operations.
//!
//! Only [`ConfigurationError`] is fatal. The other types describe recovered
//! conditions that travel next to a result as warnings.

use crate::corpus::CorpusKind;
use crate::taxonomy::CategoryId;
use serde::{Deserialize, Serialize};

/// Malformed or empty taxonomy/configuration. Nothing downstream can run.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigurationError {
    #[error("taxonomy defines no categories")]
    EmptyTaxonomy,

    #[error("category id must be non-empty")]
    BlankId,

    #[error("duplicate category id: {0}")]
    DuplicateCategory(String),

    #[error("category `{category}` references unknown parent `{parent}`")]
    UnknownParent { category: String, parent: String },

    #[error("category hierarchy contains a cycle through `{0}`")]
    Cycle(String),

    #[error("category `{0}` has no usable keywords")]
    MissingKeywords(String),

    #[error("order key `{key}` is shared by `{first}` and `{second}`")]
    DuplicateOrderKey {
        key: String,
        first: String,
        second: String,
    },

    #[error("order key `{child_key}` of `{child}` does not extend parent key `{parent_key}`")]
    OrderKeyNotNested {
        child: String,
        child_key: String,
        parent_key: String,
    },

    #[error("failed to read {path}: {message}")]
    Read { path: String, message: String },

    #[error("invalid taxonomy definition: {0}")]
    Parse(String),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Two categories whose keyword-presence vectors correlate too strongly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CorrelatedPair {
    pub first: CategoryId,
    pub second: CategoryId,
    pub correlation: f64,
}

/// Advisory: the taxonomy is not orthogonal enough.
///
/// Matrix construction still proceeds; Process Health carries the penalty.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, thiserror::Error)]
#[serde(rename_all = "camelCase")]
#[error(
    "{} category pair(s) correlate above |r| > {threshold}",
    .pairs.len()
)]
pub struct CategoryDesignError {
    pub threshold: f64,
    pub pairs: Vec<CorrelatedPair>,
}

/// A document or commit that could not be read. It contributes zero weight.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[serde(rename_all = "camelCase")]
#[error("{corpus} source `{source_id}` skipped: {reason}")]
pub struct CorpusGapError {
    pub corpus: CorpusKind,
    pub source_id: String,
    pub reason: String,
}
