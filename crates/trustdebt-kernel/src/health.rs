//! Process Health: does the measurement itself deserve trust?
//!
//! The validator reads the raw matrix, the corpus coverage and the
//! vocabulary. It never sees a [`TrustDebtResult`](crate::TrustDebtResult),
//! so a defect in drift aggregation cannot raise its own legitimacy.
//!
//! ```text
//! overall = 0.40 · orthogonality + 0.35 · uniformity + 0.25 · coverage
//! ```

use crate::corpus::ContentCoverage;
use crate::correlation::{CorrelationMatrix, DEFAULT_CORRELATION_THRESHOLD};
use crate::error::{CategoryDesignError, CorrelatedPair};
use crate::matrix::Matrix;
use crate::taxonomy::Taxonomy;
use crate::terms::Vocabulary;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, warn};

pub const ORTHOGONALITY_WEIGHT: f64 = 0.40;
pub const UNIFORMITY_WEIGHT: f64 = 0.35;
pub const COVERAGE_WEIGHT: f64 = 0.25;

/// Overall scores strictly above this are legitimate.
pub const LEGITIMATE_ABOVE: f64 = 0.70;
/// Overall scores at or above this (and not legitimate) are questionable.
pub const QUESTIONABLE_FROM: f64 = 0.50;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Legitimacy {
    Legitimate,
    Questionable,
    Invalid,
}

impl Legitimacy {
    /// Classify an overall score into its legitimacy band.
    pub fn from_score(overall: f64) -> Self {
        if overall > LEGITIMATE_ABOVE {
            Self::Legitimate
        } else if overall >= QUESTIONABLE_FROM {
            Self::Questionable
        } else {
            Self::Invalid
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Legitimate => "LEGITIMATE",
            Self::Questionable => "QUESTIONABLE",
            Self::Invalid => "INVALID",
        }
    }
}

impl fmt::Display for Legitimacy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessHealthReport {
    pub orthogonality_score: f64,
    pub uniformity_score: f64,
    pub coverage_score: f64,
    pub overall_score: f64,
    pub legitimacy: Legitimacy,
    pub correlation_threshold: f64,
    pub correlated_pairs: Vec<CorrelatedPair>,
    pub coverage: ContentCoverage,
}

impl ProcessHealthReport {
    /// True when the score must not be trusted at all.
    pub fn is_invalid(&self) -> bool {
        self.legitimacy == Legitimacy::Invalid
    }

    /// The advisory taxonomy warning, if any pair crossed the threshold.
    pub fn design_error(&self) -> Option<CategoryDesignError> {
        if self.correlated_pairs.is_empty() {
            None
        } else {
            Some(CategoryDesignError {
                threshold: self.correlation_threshold,
                pairs: self.correlated_pairs.clone(),
            })
        }
    }
}

/// Process Health at the default correlation threshold.
pub fn validate(
    taxonomy: &Taxonomy,
    matrix: &Matrix,
    coverage: &ContentCoverage,
    vocabulary: &Vocabulary,
) -> ProcessHealthReport {
    validate_with_threshold(
        taxonomy,
        matrix,
        coverage,
        vocabulary,
        DEFAULT_CORRELATION_THRESHOLD,
    )
}

/// Process Health: orthogonality, diagonal uniformity, and coverage,
/// combined into one weighted score and a legitimacy verdict.
pub fn validate_with_threshold(
    taxonomy: &Taxonomy,
    matrix: &Matrix,
    coverage: &ContentCoverage,
    vocabulary: &Vocabulary,
    threshold: f64,
) -> ProcessHealthReport {
    let correlation = CorrelationMatrix::compute(taxonomy, vocabulary);
    let orthogonality_score = clamp_score(1.0 - correlation.max_off_diagonal());
    let correlated_pairs = correlation.pairs_above(threshold, taxonomy);
    let uniformity_score = uniformity(&matrix.diagonal_totals());
    let coverage_score = clamp_score(coverage.ratio());

    let overall_score = clamp_score(
        ORTHOGONALITY_WEIGHT * orthogonality_score
            + UNIFORMITY_WEIGHT * uniformity_score
            + COVERAGE_WEIGHT * coverage_score,
    );
    let legitimacy = Legitimacy::from_score(overall_score);

    if !correlated_pairs.is_empty() {
        warn!(
            pairs = correlated_pairs.len(),
            threshold, "category keywords overlap; orthogonality penalized"
        );
    }
    debug!(
        orthogonality_score,
        uniformity_score,
        coverage_score,
        overall_score,
        %legitimacy,
        "validated process health"
    );

    ProcessHealthReport {
        orthogonality_score,
        uniformity_score,
        coverage_score,
        overall_score,
        legitimacy,
        correlation_threshold: threshold,
        correlated_pairs,
        coverage: *coverage,
    }
}

/// `1 - stddev/mean` (population stddev), clamped; 0 when the mean is 0.
pub fn uniformity(totals: &[f64]) -> f64 {
    if totals.is_empty() {
        return 0.0;
    }
    let n = totals.len() as f64;
    let mean = totals.iter().sum::<f64>() / n;
    if mean <= 0.0 {
        return 0.0;
    }
    let variance = totals.iter().map(|t| (t - mean).powi(2)).sum::<f64>() / n;
    clamp_score(1.0 - variance.sqrt() / mean)
}

/// Clamp to [0, 1]; NaN maps to 0 and infinities to the nearest bound.
#[inline]
pub fn clamp_score(value: f64) -> f64 {
    if value.is_nan() {
        return 0.0;
    }
    value.clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::corpus::{Corpus, CorpusDocument, CorpusKind, DocumentClass};
    use crate::taxonomy::{CategoryDefinition, TaxonomyDefinition};

    fn taxonomy(defs: Vec<CategoryDefinition>) -> Taxonomy {
        Taxonomy::from_definition(&TaxonomyDefinition::new(defs)).expect("valid taxonomy")
    }

    #[test]
    fn legitimacy_bands() {
        assert_eq!(Legitimacy::from_score(0.71), Legitimacy::Legitimate);
        assert_eq!(Legitimacy::from_score(0.70), Legitimacy::Questionable);
        assert_eq!(Legitimacy::from_score(0.50), Legitimacy::Questionable);
        assert_eq!(Legitimacy::from_score(0.4999), Legitimacy::Invalid);
        assert_eq!(Legitimacy::from_score(f64::NAN), Legitimacy::Invalid);
    }

    #[test]
    fn uniformity_of_equal_and_skewed_totals() {
        assert_eq!(uniformity(&[5.0, 5.0, 5.0]), 1.0);
        assert_eq!(uniformity(&[0.0, 0.0]), 0.0);
        assert_eq!(uniformity(&[]), 0.0);
        // mean 50, population stddev 50: fully dominated.
        assert_eq!(uniformity(&[100.0, 0.0]), 0.0);
        // mean 2, stddev 1.
        assert!((uniformity(&[1.0, 3.0]) - 0.5).abs() < 1e-12);
    }

    #[test]
    fn clamp_score_maps_non_finite_values() {
        assert_eq!(clamp_score(f64::NAN), 0.0);
        assert_eq!(clamp_score(f64::INFINITY), 1.0);
        assert_eq!(clamp_score(f64::NEG_INFINITY), 0.0);
        assert_eq!(clamp_score(0.25), 0.25);
    }

    #[test]
    fn empty_run_is_invalid() {
        let tax = taxonomy(vec![
            CategoryDefinition::new("SEC", &["security"]),
            CategoryDefinition::new("SPD", &["speed"]),
        ]);
        let report = validate(
            &tax,
            &Matrix::zeros(2),
            &ContentCoverage::default(),
            &Vocabulary::new(),
        );
        assert_eq!(report.uniformity_score, 0.0);
        assert_eq!(report.coverage_score, 0.0);
        assert!(report.is_invalid());
    }

    #[test]
    fn balanced_orthogonal_run_is_legitimate() {
        let tax = taxonomy(vec![
            CategoryDefinition::new("SEC", &["security"]),
            CategoryDefinition::new("SPD", &["speed"]),
        ]);
        let docs = |kind, class, texts: &[&str]| {
            Corpus::from_documents(
                kind,
                texts
                    .iter()
                    .enumerate()
                    .map(|(n, text)| CorpusDocument::new(format!("{n}"), *text, 1.0, class, &tax))
                    .collect(),
            )
        };
        let intent = docs(
            CorpusKind::Intent,
            DocumentClass::Specification,
            &["security review of tokens", "speed of the request path"],
        );
        let reality = docs(
            CorpusKind::Reality,
            DocumentClass::Commit,
            &["harden security headers", "raise speed of parser loop"],
        );
        let matrix = Matrix::build(&intent, &reality, &tax);
        let coverage = ContentCoverage::from_corpora(&intent, &reality);
        let vocabulary = Vocabulary::from_corpora(&tax, &[&intent, &reality]);
        let report = validate(&tax, &matrix, &coverage, &vocabulary);

        assert!(report.correlated_pairs.is_empty());
        assert!(report.design_error().is_none());
        assert_eq!(report.coverage_score, 1.0);
        assert_eq!(report.uniformity_score, 1.0);
        assert_eq!(report.legitimacy, Legitimacy::Legitimate);
    }

    #[test]
    fn overlapping_categories_surface_design_error() {
        let tax = taxonomy(vec![
            CategoryDefinition::new("A", &["cache"]),
            CategoryDefinition::new("B", &["cache"]),
        ]);
        let mut vocabulary = Vocabulary::new();
        vocabulary.insert_text("cache layer warmup eviction policy");
        let report = validate(
            &tax,
            &Matrix::zeros(2),
            &ContentCoverage::default(),
            &vocabulary,
        );
        assert_eq!(report.orthogonality_score, 0.0);
        let err = report.design_error().expect("overlap is reported");
        assert_eq!(err.threshold, DEFAULT_CORRELATION_THRESHOLD);
        assert_eq!(err.pairs.len(), 1);
    }
}
