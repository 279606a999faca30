//! Where taxonomy definitions come from.
//!
//! Only deterministic sources exist here: a static artifact, or a
//! document-frequency generator over the documentation corpus.

use crate::classify::Classifier;
use crate::source::SourceTree;
use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;
use tracing::{debug, warn};
use trustdebt_kernel::terms::tokenize;
use trustdebt_kernel::{
    CategoryDefinition, ConfigurationError, Taxonomy, TaxonomyDefinition,
};

pub trait CategorySource {
    fn definition(&self) -> Result<TaxonomyDefinition, ConfigurationError>;

    fn taxonomy(&self) -> Result<Taxonomy, ConfigurationError> {
        Taxonomy::from_definition(&self.definition()?)
    }
}

/// A TOML/JSON artifact on disk, or a definition already in memory.
#[derive(Debug, Clone)]
pub enum StaticCategorySource {
    File(PathBuf),
    Inline(TaxonomyDefinition),
}

impl StaticCategorySource {
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        Self::File(path.into())
    }
}

impl CategorySource for StaticCategorySource {
    fn definition(&self) -> Result<TaxonomyDefinition, ConfigurationError> {
        match self {
            Self::File(path) => TaxonomyDefinition::load(path),
            Self::Inline(definition) => Ok(definition.clone()),
        }
    }
}

const STOPWORDS: &[&str] = &[
    "about", "above", "after", "again", "also", "because", "been", "before", "being", "below",
    "between", "both", "could", "does", "doing", "down", "during", "each", "from", "further",
    "have", "having", "here", "into", "itself", "just", "more", "most", "must", "only", "other",
    "over", "same", "should", "some", "such", "than", "that", "their", "them", "then", "there",
    "these", "they", "this", "those", "through", "under", "until", "upon", "very", "were", "what",
    "when", "where", "which", "while", "will", "with", "within", "would", "your",
];

/// Top-K terms by document frequency across documentation files.
///
/// Ties break lexicographically. A term that contains, or is contained in,
/// an already chosen term is skipped so the generated categories do not
/// overlap under substring matching.
pub struct FrequencyCategorySource<'a> {
    tree: &'a dyn SourceTree,
    classifier: &'a Classifier,
    top_k: usize,
    min_term_len: usize,
}

impl<'a> FrequencyCategorySource<'a> {
    pub fn new(tree: &'a dyn SourceTree, classifier: &'a Classifier, top_k: usize) -> Self {
        Self {
            tree,
            classifier,
            top_k,
            min_term_len: 4,
        }
    }

    pub fn with_min_term_len(mut self, len: usize) -> Self {
        self.min_term_len = len;
        self
    }

    fn document_frequencies(&self) -> Result<BTreeMap<String, usize>, ConfigurationError> {
        let paths = self
            .tree
            .list_files()
            .map_err(|e| ConfigurationError::Invalid(format!("cannot list source tree: {e}")))?;
        let mut frequencies: BTreeMap<String, usize> = BTreeMap::new();
        for path in paths.iter().filter(|p| self.classifier.is_documentation(p)) {
            let blob = match self.tree.read_file(path) {
                Ok(blob) => blob,
                Err(error) => {
                    warn!(path = %path, %error, "skipping unreadable document");
                    continue;
                }
            };
            let terms: BTreeSet<String> = tokenize(&blob.text)
                .filter(|t| t.chars().count() >= self.min_term_len)
                .filter(|t| !t.chars().all(|c| c.is_numeric()))
                .filter(|t| !STOPWORDS.contains(&t.as_str()))
                .collect();
            for term in terms {
                *frequencies.entry(term).or_default() += 1;
            }
        }
        Ok(frequencies)
    }
}

impl CategorySource for FrequencyCategorySource<'_> {
    fn definition(&self) -> Result<TaxonomyDefinition, ConfigurationError> {
        let mut ranked: Vec<(String, usize)> = self.document_frequencies()?.into_iter().collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));

        let mut chosen: Vec<String> = Vec::new();
        for (term, _) in ranked {
            if chosen.len() >= self.top_k {
                break;
            }
            let overlaps = chosen
                .iter()
                .any(|c| c.contains(term.as_str()) || term.contains(c.as_str()));
            if !overlaps {
                chosen.push(term);
            }
        }
        if chosen.is_empty() {
            return Err(ConfigurationError::EmptyTaxonomy);
        }
        debug!(categories = chosen.len(), "generated frequency taxonomy");

        let categories = chosen
            .into_iter()
            .map(|term| CategoryDefinition::new(term.clone(), &[term.as_str()]).with_name(term))
            .collect();
        Ok(TaxonomyDefinition::new(categories))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory_tree::MemoryTree;

    fn tree() -> MemoryTree {
        MemoryTree::builder()
            .file("README.md", "Security model and caching layer. Security first.")
            .file("docs/a.md", "The caching layer improves latency.")
            .file("docs/b.md", "Latency budget for caching and security.")
            .file("docs/c.md", "Securing tokens: insecure defaults are banned.")
            .file("src/lib.rs", "caching caching caching caching")
            .build()
            .expect("no commits to collide")
    }

    #[test]
    fn picks_top_terms_by_document_frequency() {
        let tree = tree();
        let classifier = Classifier::default();
        let source = FrequencyCategorySource::new(&tree, &classifier, 3);
        let definition = source.definition().expect("terms available");
        let ids: Vec<&str> = definition.categories.iter().map(|c| c.id.as_str()).collect();
        // caching: 3 docs; latency, layer, security: 2 docs each.
        assert_eq!(ids, vec!["caching", "latency", "layer"]);
        assert!(source.taxonomy().is_ok());
    }

    #[test]
    fn generation_is_deterministic() {
        let tree = tree();
        let classifier = Classifier::default();
        let first = FrequencyCategorySource::new(&tree, &classifier, 10)
            .definition()
            .expect("terms available");
        let second = FrequencyCategorySource::new(&tree, &classifier, 10)
            .definition()
            .expect("terms available");
        assert_eq!(first, second);
    }

    #[test]
    fn overlapping_terms_are_skipped() {
        let tree = MemoryTree::builder()
            .file("a.md", "testing tests test")
            .file("b.md", "testing tests test")
            .file("c.md", "test")
            .build()
            .expect("no commits to collide");
        let classifier = Classifier::default();
        let definition = FrequencyCategorySource::new(&tree, &classifier, 5)
            .definition()
            .expect("terms available");
        let ids: Vec<&str> = definition.categories.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["test"]);
    }

    #[test]
    fn empty_corpus_yields_empty_taxonomy_error() {
        let tree = MemoryTree::builder().build().expect("empty tree");
        let classifier = Classifier::default();
        let result = FrequencyCategorySource::new(&tree, &classifier, 5).definition();
        assert_eq!(result, Err(ConfigurationError::EmptyTaxonomy));
    }

    #[test]
    fn inline_static_source_round_trips() {
        let definition =
            TaxonomyDefinition::new(vec![CategoryDefinition::new("SEC", &["security"])]);
        let source = StaticCategorySource::Inline(definition.clone());
        assert_eq!(source.definition(), Ok(definition));
    }
}
