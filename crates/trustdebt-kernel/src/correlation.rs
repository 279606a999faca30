//! Category orthogonality audit.
//!
//! Each category becomes a binary presence vector over the vocabulary: entry
//! `t` is 1 when some keyword of the category occurs inside term `t`. Pearson
//! correlation between those vectors (the phi coefficient, for binary data)
//! measures how much two categories overlap.

use crate::error::{CategoryDesignError, CorrelatedPair};
use crate::taxonomy::{Category, Taxonomy};
use crate::terms::Vocabulary;
use tracing::debug;

/// Pairs with `|r|` above this are reported.
pub const DEFAULT_CORRELATION_THRESHOLD: f64 = 0.10;

/// Symmetric `N×N` correlation matrix, flat `i*N + j`.
#[derive(Debug, Clone, PartialEq)]
pub struct CorrelationMatrix {
    size: usize,
    values: Vec<f64>,
}

impl CorrelationMatrix {
    /// Pairwise correlation of keyword presence over `vocabulary` plus
    /// every taxonomy keyword.
    pub fn compute(taxonomy: &Taxonomy, vocabulary: &Vocabulary) -> Self {
        let mut vocabulary = vocabulary.clone();
        vocabulary.extend_keywords(taxonomy);

        let vectors: Vec<Vec<bool>> = taxonomy
            .categories()
            .iter()
            .map(|c| presence_vector(c, &vocabulary))
            .collect();

        let size = vectors.len();
        let mut values = vec![0.0; size * size];
        for i in 0..size {
            values[i * size + i] = 1.0;
            for j in (i + 1)..size {
                let r = pearson(&vectors[i], &vectors[j]);
                values[i * size + j] = r;
                values[j * size + i] = r;
            }
        }
        debug!(
            categories = size,
            terms = vocabulary.len(),
            "computed category correlation matrix"
        );
        Self { size, values }
    }

    /// Number of categories.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Correlation between categories `i` and `j`; 0 when out of range.
    pub fn get(&self, i: usize, j: usize) -> f64 {
        self.values.get(i * self.size + j).copied().unwrap_or(0.0)
    }

    /// Largest `|r|` between distinct categories; 0 for fewer than two.
    pub fn max_off_diagonal(&self) -> f64 {
        let mut max = 0.0f64;
        for i in 0..self.size {
            for j in (i + 1)..self.size {
                max = max.max(self.get(i, j).abs());
            }
        }
        max
    }

    /// Every unordered pair with `|r| > threshold`, in canonical order.
    pub fn pairs_above(&self, threshold: f64, taxonomy: &Taxonomy) -> Vec<CorrelatedPair> {
        let categories = taxonomy.categories();
        let mut pairs = Vec::new();
        for i in 0..self.size {
            for j in (i + 1)..self.size {
                let r = self.get(i, j);
                if r.abs() > threshold
                    && let (Some(first), Some(second)) = (categories.get(i), categories.get(j))
                {
                    pairs.push(CorrelatedPair {
                        first: first.id.clone(),
                        second: second.id.clone(),
                        correlation: r,
                    });
                }
            }
        }
        pairs
    }
}

/// Advisory check that no two categories overlap beyond `threshold`.
pub fn validate(
    taxonomy: &Taxonomy,
    vocabulary: &Vocabulary,
    threshold: f64,
) -> Result<(), CategoryDesignError> {
    let pairs = CorrelationMatrix::compute(taxonomy, vocabulary).pairs_above(threshold, taxonomy);
    if pairs.is_empty() {
        Ok(())
    } else {
        Err(CategoryDesignError { threshold, pairs })
    }
}

/// One flag per vocabulary term: does the term match any of the
/// category's keywords.
pub fn presence_vector(category: &Category, vocabulary: &Vocabulary) -> Vec<bool> {
    vocabulary
        .iter()
        .map(|term| {
            category
                .keywords
                .iter()
                .any(|keyword| term.contains(keyword.as_str()))
        })
        .collect()
}

/// Pearson correlation of two binary vectors. Zero variance yields 0.
pub fn pearson(a: &[bool], b: &[bool]) -> f64 {
    let n = a.len().min(b.len());
    if n == 0 {
        return 0.0;
    }
    let (mut sum_a, mut sum_b, mut both) = (0usize, 0usize, 0usize);
    for (&x, &y) in a.iter().zip(b.iter()).take(n) {
        sum_a += usize::from(x);
        sum_b += usize::from(y);
        both += usize::from(x && y);
    }
    let n = n as f64;
    let (sum_a, sum_b, both) = (sum_a as f64, sum_b as f64, both as f64);
    let variance = sum_a * (n - sum_a) * sum_b * (n - sum_b);
    if variance <= 0.0 {
        return 0.0;
    }
    (n * both - sum_a * sum_b) / variance.sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::taxonomy::{CategoryDefinition, TaxonomyDefinition};

    fn taxonomy(defs: Vec<CategoryDefinition>) -> Taxonomy {
        Taxonomy::from_definition(&TaxonomyDefinition::new(defs)).expect("valid taxonomy")
    }

    fn vocabulary(text: &str) -> Vocabulary {
        let mut vocabulary = Vocabulary::new();
        vocabulary.insert_text(text);
        vocabulary
    }

    #[test]
    fn pearson_handles_degenerate_vectors() {
        assert_eq!(pearson(&[], &[]), 0.0);
        assert_eq!(pearson(&[true, true, true], &[true, false, true]), 0.0);
        assert_eq!(pearson(&[false, false], &[true, false]), 0.0);
    }

    #[test]
    fn pearson_of_identical_and_complementary_vectors() {
        let a = [true, false, true, false];
        let b = [false, true, false, true];
        assert!((pearson(&a, &a) - 1.0).abs() < 1e-12);
        assert!((pearson(&a, &b) + 1.0).abs() < 1e-12);
    }

    #[test]
    fn identical_keyword_sets_correlate_perfectly() {
        let tax = taxonomy(vec![
            CategoryDefinition::new("A", &["security", "auth"]),
            CategoryDefinition::new("B", &["security", "auth"]),
        ]);
        let vocab = vocabulary("security auth speed latency cache queue index parser");
        let matrix = CorrelationMatrix::compute(&tax, &vocab);
        assert!((matrix.get(0, 1) - 1.0).abs() < 1e-12);
        assert!((matrix.max_off_diagonal() - 1.0).abs() < 1e-12);

        let err = validate(&tax, &vocab, DEFAULT_CORRELATION_THRESHOLD)
            .expect_err("identical categories overlap");
        assert_eq!(err.pairs.len(), 1);
        assert_eq!(err.pairs[0].first.as_str(), "A");
        assert_eq!(err.pairs[0].second.as_str(), "B");
    }

    #[test]
    fn disjoint_categories_over_a_rich_vocabulary_pass() {
        let tax = taxonomy(vec![
            CategoryDefinition::new("SEC", &["security"]),
            CategoryDefinition::new("SPD", &["speed"]),
        ]);
        let vocab = vocabulary(
            "security speed alpha beta gamma delta epsilon zeta eta theta iota kappa lambda mu",
        );
        let matrix = CorrelationMatrix::compute(&tax, &vocab);
        assert!(matrix.get(0, 1) < 0.0);
        assert!(matrix.max_off_diagonal() <= DEFAULT_CORRELATION_THRESHOLD);
        assert!(validate(&tax, &vocab, DEFAULT_CORRELATION_THRESHOLD).is_ok());
    }

    #[test]
    fn stems_mark_every_term_containing_them() {
        let tax = taxonomy(vec![CategoryDefinition::new("SEC", &["secur"])]);
        let vocab = vocabulary("security secure insecure speed");
        let vector = presence_vector(&tax.categories()[0], &vocab);
        let marked: Vec<&str> = vocab
            .iter()
            .zip(vector)
            .filter_map(|(term, present)| present.then_some(term))
            .collect();
        assert_eq!(marked, vec!["insecure", "secure", "security"]);
    }

    #[test]
    fn single_category_has_no_off_diagonal() {
        let tax = taxonomy(vec![CategoryDefinition::new("SEC", &["security"])]);
        let matrix = CorrelationMatrix::compute(&tax, &Vocabulary::new());
        assert_eq!(matrix.size(), 1);
        assert_eq!(matrix.max_off_diagonal(), 0.0);
        assert_eq!(matrix.get(0, 0), 1.0);
    }
}
