//! Term vocabulary shared by the correlation audit.

use crate::corpus::Corpus;
use crate::taxonomy::Taxonomy;
use std::collections::BTreeSet;

/// Terms shorter than this are noise for presence vectors.
pub const MIN_TERM_LEN: usize = 2;

/// Lowercased alphanumeric tokens of `text`, in reading order.
pub fn tokenize(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|token| token.chars().count() >= MIN_TERM_LEN)
        .map(str::to_lowercase)
}

/// Distinct normalized terms over the corpora plus every category keyword.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Vocabulary {
    terms: BTreeSet<String>,
}

impl Vocabulary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every term in the corpora plus every taxonomy keyword.
    pub fn from_corpora(taxonomy: &Taxonomy, corpora: &[&Corpus]) -> Self {
        let mut vocabulary = Self::new();
        for corpus in corpora {
            for doc in corpus.documents() {
                vocabulary.insert_text(&doc.text);
            }
        }
        vocabulary.extend_keywords(taxonomy);
        vocabulary
    }

    /// Tokenize `text` and add each term.
    pub fn insert_text(&mut self, text: &str) {
        self.terms.extend(tokenize(text));
    }

    /// Add one term, trimmed and lowercased; blank terms are ignored.
    pub fn insert_term(&mut self, term: &str) {
        let term = term.trim().to_lowercase();
        if !term.is_empty() {
            self.terms.insert(term);
        }
    }

    /// Add every keyword of `taxonomy`.
    pub fn extend_keywords(&mut self, taxonomy: &Taxonomy) {
        for category in taxonomy.categories() {
            for keyword in &category.keywords {
                self.insert_term(keyword);
            }
        }
    }

    pub fn contains(&self, term: &str) -> bool {
        self.terms.contains(term)
    }

    /// Number of distinct terms.
    pub fn len(&self) -> usize {
        self.terms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    /// Terms in lexicographic order.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.terms.iter().map(String::as_str)
    }
}
