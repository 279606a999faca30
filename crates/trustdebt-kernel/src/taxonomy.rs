//! Category taxonomy: a forest of keyword-bearing categories.
//!
//! Categories live in a flat arena sorted by ShortLex order key. Parents are
//! arena indices, so there is exactly one owner (the [`Taxonomy`]) and no
//! way to build a cycle once validation has passed.
//!
//! The taxonomy definition is a static artifact (TOML or JSON):
//!
//! ```toml
//! [[category]]
//! id = "SEC"
//! name = "Security"
//! keywords = ["security", "auth"]
//!
//! [[category]]
//! id = "SEC.1"
//! parent = "SEC"
//! keywords = ["encryption"]
//! ```

use crate::error::ConfigurationError;
use crate::hash::ContentHash;
use crate::order::{child_key, extends, shortlex_cmp};
use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::fs;
use std::path::Path;

/// Unique category identifier.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CategoryId(pub String);

impl CategoryId {
    /// Wrap an identifier as given.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CategoryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Borrow<str> for CategoryId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for CategoryId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// One category as written in the taxonomy artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CategoryDefinition {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order_key: Option<String>,
}

impl CategoryDefinition {
    /// Top-level category with the given keywords.
    pub fn new(id: impl Into<String>, keywords: &[&str]) -> Self {
        Self {
            id: id.into(),
            name: String::new(),
            keywords: keywords.iter().map(|k| k.to_string()).collect(),
            parent: None,
            order_key: None,
        }
    }

    /// Display name; defaults to the id.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Nest under another category.
    pub fn with_parent(mut self, parent: impl Into<String>) -> Self {
        self.parent = Some(parent.into());
        self
    }

    /// Explicit ShortLex key; derived from position when unset.
    pub fn with_order_key(mut self, key: impl Into<String>) -> Self {
        self.order_key = Some(key.into());
        self
    }
}

/// The full taxonomy artifact.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TaxonomyDefinition {
    #[serde(rename = "category", alias = "categories", default)]
    pub categories: Vec<CategoryDefinition>,
}

impl TaxonomyDefinition {
    /// Definition from categories in authoring order.
    pub fn new(categories: Vec<CategoryDefinition>) -> Self {
        Self { categories }
    }

    /// Parse the TOML form, one `[[category]]` table per category.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigurationError> {
        toml::from_str(text).map_err(|e| ConfigurationError::Parse(e.to_string()))
    }

    /// Parse the JSON form of the same definition.
    pub fn from_json_str(text: &str) -> Result<Self, ConfigurationError> {
        serde_json::from_str(text).map_err(|e| ConfigurationError::Parse(e.to_string()))
    }

    /// Load from disk. `.json` files parse as JSON, anything else as TOML.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigurationError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|e| ConfigurationError::Read {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        let is_json = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
        if is_json {
            Self::from_json_str(&text)
        } else {
            Self::from_toml_str(&text)
        }
    }
}

/// A validated category inside a [`Taxonomy`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    pub id: CategoryId,
    pub name: String,
    /// Lowercased match terms. Terms that contain another term of the same
    /// category are dropped, since substring matching already counts them.
    pub keywords: BTreeSet<String>,
    /// Arena index of the parent category.
    pub parent: Option<usize>,
    pub order_key: String,
}

impl Category {
    /// Non-overlapping keyword occurrences in already-lowercased text.
    pub fn count_hits(&self, lowered: &str) -> u32 {
        self.keywords.iter().fold(0u32, |acc, keyword| {
            acc.saturating_add(lowered.matches(keyword.as_str()).count() as u32)
        })
    }
}

/// Validated category forest in canonical ShortLex order.
#[derive(Debug, Clone)]
pub struct Taxonomy {
    categories: Vec<Category>,
    index: BTreeMap<CategoryId, usize>,
}

impl Taxonomy {
    /// Validate a definition and build the arena.
    pub fn from_definition(def: &TaxonomyDefinition) -> Result<Self, ConfigurationError> {
        let n = def.categories.len();
        if n == 0 {
            return Err(ConfigurationError::EmptyTaxonomy);
        }

        let mut by_id: BTreeMap<&str, usize> = BTreeMap::new();
        for (pos, cat) in def.categories.iter().enumerate() {
            let id = cat.id.trim();
            if id.is_empty() {
                return Err(ConfigurationError::BlankId);
            }
            if by_id.insert(id, pos).is_some() {
                return Err(ConfigurationError::DuplicateCategory(id.to_string()));
            }
        }

        let mut parents: Vec<Option<usize>> = Vec::with_capacity(n);
        for cat in &def.categories {
            let parent = match cat.parent.as_deref().map(str::trim) {
                None | Some("") => None,
                Some(parent) => Some(*by_id.get(parent).ok_or_else(|| {
                    ConfigurationError::UnknownParent {
                        category: cat.id.trim().to_string(),
                        parent: parent.to_string(),
                    }
                })?),
            };
            parents.push(parent);
        }
        detect_cycles(def, &parents)?;

        let mut keywords = Vec::with_capacity(n);
        for cat in &def.categories {
            let normalized = normalize_keywords(&cat.keywords);
            if normalized.is_empty() {
                return Err(ConfigurationError::MissingKeywords(cat.id.trim().to_string()));
            }
            keywords.push(normalized);
        }

        let keys = resolve_order_keys(def, &parents)?;
        let mut key_owner: BTreeMap<&str, usize> = BTreeMap::new();
        for (pos, key) in keys.iter().enumerate() {
            if let Some(first) = key_owner.insert(key.as_str(), pos) {
                return Err(ConfigurationError::DuplicateOrderKey {
                    key: key.clone(),
                    first: def.categories[first].id.trim().to_string(),
                    second: def.categories[pos].id.trim().to_string(),
                });
            }
        }

        let mut order: Vec<usize> = (0..n).collect();
        order.sort_by(|&a, &b| shortlex_cmp(&keys[a], &keys[b]));
        let mut arena_index = vec![0usize; n];
        for (arena_pos, &def_pos) in order.iter().enumerate() {
            arena_index[def_pos] = arena_pos;
        }

        let mut categories = Vec::with_capacity(n);
        let mut index = BTreeMap::new();
        for (arena_pos, &def_pos) in order.iter().enumerate() {
            let cat = &def.categories[def_pos];
            let id = CategoryId::new(cat.id.trim());
            let name = match cat.name.trim() {
                "" => id.0.clone(),
                name => name.to_string(),
            };
            index.insert(id.clone(), arena_pos);
            categories.push(Category {
                id,
                name,
                keywords: std::mem::take(&mut keywords[def_pos]),
                parent: parents[def_pos].map(|p| arena_index[p]),
                order_key: keys[def_pos].clone(),
            });
        }

        Ok(Self { categories, index })
    }

    /// Number of categories, which is also the matrix size.
    pub fn len(&self) -> usize {
        self.categories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.categories.is_empty()
    }

    /// Categories in canonical order.
    pub fn categories(&self) -> &[Category] {
        &self.categories
    }

    /// Category at canonical index `idx`.
    pub fn get(&self, idx: usize) -> Option<&Category> {
        self.categories.get(idx)
    }

    /// Canonical index of category `id`.
    pub fn index_of(&self, id: &str) -> Option<usize> {
        self.index.get(id).copied()
    }

    /// Category by id.
    pub fn category(&self, id: &str) -> Option<&Category> {
        self.index_of(id).and_then(|idx| self.categories.get(idx))
    }

    /// Ids in canonical order.
    pub fn ids(&self) -> impl Iterator<Item = &CategoryId> {
        self.categories.iter().map(|c| &c.id)
    }

    /// Parent of the category at `idx`, if nested.
    pub fn parent(&self, idx: usize) -> Option<&Category> {
        self.categories
            .get(idx)
            .and_then(|c| c.parent)
            .and_then(|p| self.categories.get(p))
    }

    /// Indices of the direct children of `idx`, in canonical order.
    pub fn children(&self, idx: usize) -> impl Iterator<Item = usize> + '_ {
        self.categories
            .iter()
            .enumerate()
            .filter(move |(_, c)| c.parent == Some(idx))
            .map(|(pos, _)| pos)
    }

    /// Indices of top-level categories, in canonical order.
    pub fn roots(&self) -> impl Iterator<Item = usize> + '_ {
        self.categories
            .iter()
            .enumerate()
            .filter(|(_, c)| c.parent.is_none())
            .map(|(pos, _)| pos)
    }

    /// Number of ancestors above `idx` (roots have depth 0).
    pub fn depth(&self, idx: usize) -> usize {
        let mut depth = 0;
        let mut cursor = self.categories.get(idx).and_then(|c| c.parent);
        while let Some(parent) = cursor {
            depth += 1;
            cursor = self.categories.get(parent).and_then(|c| c.parent);
        }
        depth
    }

    /// Per-category keyword hits for `text`, aligned with canonical order.
    pub fn count_hits(&self, text: &str) -> Vec<u32> {
        let lowered = text.to_lowercase();
        self.categories
            .iter()
            .map(|c| c.count_hits(&lowered))
            .collect()
    }

    /// Digest of the canonical category listing.
    pub fn digest(&self) -> ContentHash {
        let mut builder = ContentHash::builder().field_int("count", self.len() as i64);
        for cat in &self.categories {
            let parent = cat
                .parent
                .and_then(|p| self.categories.get(p))
                .map(|p| p.id.as_str());
            let keywords = cat.keywords.iter().cloned().collect::<Vec<_>>().join("\u{1f}");
            builder = builder
                .field("id", cat.id.as_str())
                .field("name", &cat.name)
                .field("orderKey", &cat.order_key)
                .field("parent", parent.unwrap_or(""))
                .field("keywords", &keywords);
        }
        builder.finish()
    }

    /// Canonical definition equivalent to this taxonomy.
    pub fn definition(&self) -> TaxonomyDefinition {
        let categories = self
            .categories
            .iter()
            .map(|cat| CategoryDefinition {
                id: cat.id.0.clone(),
                name: cat.name.clone(),
                keywords: cat.keywords.iter().cloned().collect(),
                parent: cat
                    .parent
                    .and_then(|p| self.categories.get(p))
                    .map(|p| p.id.0.clone()),
                order_key: Some(cat.order_key.clone()),
            })
            .collect();
        TaxonomyDefinition { categories }
    }
}

fn normalize_keywords(raw: &[String]) -> BTreeSet<String> {
    let cleaned: BTreeSet<String> = raw
        .iter()
        .map(|k| k.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase())
        .filter(|k| !k.is_empty())
        .collect();
    cleaned
        .iter()
        .filter(|k| {
            !cleaned
                .iter()
                .any(|other| other != *k && k.contains(other.as_str()))
        })
        .cloned()
        .collect()
}

fn detect_cycles(
    def: &TaxonomyDefinition,
    parents: &[Option<usize>],
) -> Result<(), ConfigurationError> {
    let n = parents.len();
    for start in 0..n {
        let mut cursor = parents[start];
        let mut steps = 0usize;
        while let Some(pos) = cursor {
            if pos == start || steps > n {
                return Err(ConfigurationError::Cycle(
                    def.categories[start].id.trim().to_string(),
                ));
            }
            steps += 1;
            cursor = parents[pos];
        }
    }
    Ok(())
}

fn resolve_order_keys(
    def: &TaxonomyDefinition,
    parents: &[Option<usize>],
) -> Result<Vec<String>, ConfigurationError> {
    let n = def.categories.len();
    let mut keys: Vec<Option<String>> = vec![None; n];

    for start in 0..n {
        // Walk up to the first resolved ancestor, then resolve top-down.
        let mut chain = Vec::new();
        let mut cursor = Some(start);
        while let Some(pos) = cursor {
            if keys[pos].is_some() {
                break;
            }
            chain.push(pos);
            cursor = parents[pos];
        }

        for &pos in chain.iter().rev() {
            let cat = &def.categories[pos];
            let id = cat.id.trim();
            let explicit = cat
                .order_key
                .as_deref()
                .map(str::trim)
                .filter(|k| !k.is_empty());
            let key = match parents[pos] {
                None => explicit.unwrap_or(id).to_string(),
                Some(parent) => {
                    let parent_key = keys[parent]
                        .as_deref()
                        .ok_or_else(|| ConfigurationError::Cycle(id.to_string()))?;
                    match explicit {
                        Some(key) if extends(key, parent_key) => key.to_string(),
                        Some(key) => {
                            return Err(ConfigurationError::OrderKeyNotNested {
                                child: id.to_string(),
                                child_key: key.to_string(),
                                parent_key: parent_key.to_string(),
                            });
                        }
                        None => child_key(parent_key, id),
                    }
                }
            };
            keys[pos] = Some(key);
        }
    }

    Ok(keys.into_iter().map(Option::unwrap_or_default).collect())
}
