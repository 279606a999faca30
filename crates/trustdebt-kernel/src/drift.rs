//! Drift aggregation: matrix cells to Trust Debt units.
//!
//! ```text
//! cellDebt(i,j) = (intent[i][j] - reality[i][j])^2
//!               · categoryWeight(i,j) · timeDecay(j) · specAge(i)
//! ```
//!
//! Cells are evaluated in parallel; every sum is then taken sequentially in
//! index order, so two runs over the same matrix agree bit for bit.

use crate::decay::{DecayModel, TimeMeta};
use crate::error::ConfigurationError;
use crate::grade::Grade;
use crate::hash::ContentHash;
use crate::matrix::{Matrix, Triangle};
use crate::taxonomy::{CategoryId, Taxonomy};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

/// Per-category multipliers keyed by category id. Missing ids weigh 1.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CategoryWeights(pub BTreeMap<String, f64>);

impl CategoryWeights {
    /// Weight for `id`, 1 when unset.
    pub fn get(&self, id: &str) -> f64 {
        self.0.get(id).copied().unwrap_or(1.0)
    }
}

/// Explicit multiplier for the directed cell `(row, column)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PairWeight {
    pub row: String,
    pub column: String,
    pub weight: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DriftConfig {
    pub decay: DecayModel,
    pub category_weights: CategoryWeights,
    pub pair_weights: Vec<PairWeight>,
}

impl DriftConfig {
    /// Weights must be finite and non-negative; decay must validate.
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        self.decay.validate()?;
        let check = |what: String, w: f64| {
            if w.is_finite() && w >= 0.0 {
                Ok(())
            } else {
                Err(ConfigurationError::Invalid(format!(
                    "{what} must be a non-negative finite number, got {w}"
                )))
            }
        };
        for (id, &w) in &self.category_weights.0 {
            check(format!("category weight `{id}`"), w)?;
        }
        for pair in &self.pair_weights {
            check(format!("pair weight `{}`/`{}`", pair.row, pair.column), pair.weight)?;
        }
        Ok(())
    }

    /// Every weighted id must name a category of `taxonomy`.
    pub fn validate_for(&self, taxonomy: &Taxonomy) -> Result<(), ConfigurationError> {
        let ids = self
            .category_weights
            .0
            .keys()
            .chain(self.pair_weights.iter().flat_map(|p| [&p.row, &p.column]));
        for id in ids {
            if taxonomy.index_of(id).is_none() {
                return Err(ConfigurationError::Invalid(format!(
                    "weight references unknown category `{id}`"
                )));
            }
        }
        Ok(())
    }

    /// Pair override if configured, else the geometric mean of the two
    /// per-category weights. Negative weights count as zero.
    pub fn category_weight(&self, taxonomy: &Taxonomy, i: usize, j: usize) -> f64 {
        let (Some(row), Some(column)) = (taxonomy.get(i), taxonomy.get(j)) else {
            return 1.0;
        };
        if let Some(pair) = self
            .pair_weights
            .iter()
            .find(|p| p.row == row.id.as_str() && p.column == column.id.as_str())
        {
            return pair.weight.max(0.0);
        }
        let a = self.category_weights.get(row.id.as_str()).max(0.0);
        let b = self.category_weights.get(column.id.as_str()).max(0.0);
        (a * b).sqrt()
    }

    /// Digest over every setting that changes the computed units.
    pub fn digest(&self) -> ContentHash {
        let mut builder = ContentHash::builder();
        builder = match self.decay {
            DecayModel::Neutral => builder.field("decay", "neutral"),
            DecayModel::Linear {
                horizon_days,
                cap_days,
            } => builder
                .field("decay", "linear")
                .field_f64("horizonDays", horizon_days)
                .field_f64("capDays", cap_days),
            DecayModel::Exponential {
                doubling_days,
                cap_days,
            } => builder
                .field("decay", "exponential")
                .field_f64("doublingDays", doubling_days)
                .field_f64("capDays", cap_days),
        };
        for (id, &w) in &self.category_weights.0 {
            builder = builder.field("categoryWeight", id).field_f64("weight", w);
        }
        for pair in &self.pair_weights {
            builder = builder
                .field("pairRow", &pair.row)
                .field("pairColumn", &pair.column)
                .field_f64("weight", pair.weight);
        }
        builder.finish()
    }
}

/// Outcome of one drift calculation. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrustDebtResult {
    pub total_units: f64,
    pub grade: Grade,
    /// `upperSum / lowerSum`; absent when nothing is intent-dominant.
    pub asymmetry_ratio: Option<f64>,
    pub orthogonality_fraction: f64,
    pub per_category: BTreeMap<CategoryId, f64>,
    pub upper_sum: f64,
    pub lower_sum: f64,
    pub diag_sum: f64,
}

impl TrustDebtResult {
    /// Categories by descending debt; ties broken by id.
    pub fn ranked_categories(&self) -> Vec<(&CategoryId, f64)> {
        let mut ranked: Vec<(&CategoryId, f64)> =
            self.per_category.iter().map(|(id, &units)| (id, units)).collect();
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(b.0)));
        ranked
    }
}

/// Trust Debt of `matrix` under `config`.
///
/// Weights are clamped at zero, so the result stays non-negative even for a
/// config that skipped [`DriftConfig::validate`]. Decay parameters are
/// taken as given.
pub fn calculate(
    matrix: &Matrix,
    taxonomy: &Taxonomy,
    time: &TimeMeta,
    config: &DriftConfig,
) -> TrustDebtResult {
    let n = matrix.size();
    let time_decay: Vec<f64> = (0..n).map(|j| time.time_decay(&config.decay, j)).collect();
    let spec_age: Vec<f64> = (0..n).map(|i| time.spec_age(&config.decay, i)).collect();

    let debts: Vec<f64> = matrix
        .cells()
        .par_iter()
        .enumerate()
        .map(|(pos, cell)| {
            let (i, j) = (pos / n, pos % n);
            let diff = cell.difference();
            diff * diff * config.category_weight(taxonomy, i, j) * time_decay[j] * spec_age[i]
        })
        .collect();

    let (mut upper_sum, mut lower_sum, mut diag_sum) = (0.0, 0.0, 0.0);
    let mut rows = vec![0.0; n];
    let mut columns = vec![0.0; n];
    for (pos, &debt) in debts.iter().enumerate() {
        let (i, j) = (pos / n, pos % n);
        match Triangle::of(i, j) {
            Triangle::Upper => upper_sum += debt,
            Triangle::Lower => lower_sum += debt,
            Triangle::Diagonal => diag_sum += debt,
        }
        rows[i] += debt;
        columns[j] += debt;
    }
    let total_units = upper_sum + lower_sum + diag_sum;

    let per_category = taxonomy
        .categories()
        .iter()
        .enumerate()
        .take(n)
        .map(|(k, category)| {
            let diagonal = debts[k * n + k];
            (category.id.clone(), (rows[k] + columns[k] - diagonal).max(0.0))
        })
        .collect();

    let asymmetry_ratio = (lower_sum > 0.0).then(|| upper_sum / lower_sum);
    let orthogonality_fraction = if total_units > 0.0 {
        (diag_sum / total_units).clamp(0.0, 1.0)
    } else {
        0.0
    };
    let grade = Grade::assign(total_units);

    debug!(
        total_units,
        %grade,
        upper_sum,
        lower_sum,
        diag_sum,
        "calculated trust debt"
    );

    TrustDebtResult {
        total_units,
        grade,
        asymmetry_ratio,
        orthogonality_fraction,
        per_category,
        upper_sum,
        lower_sum,
        diag_sum,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matrix::Cell;
    use crate::taxonomy::{CategoryDefinition, TaxonomyDefinition};

    fn taxonomy() -> Taxonomy {
        Taxonomy::from_definition(&TaxonomyDefinition::new(vec![
            CategoryDefinition::new("A", &["alpha"]),
            CategoryDefinition::new("B", &["beta"]),
        ]))
        .expect("valid taxonomy")
    }

    fn matrix(intent: [f64; 4], reality: [f64; 4]) -> Matrix {
        let cells = intent
            .into_iter()
            .zip(reality)
            .map(|(intent_weight, reality_weight)| Cell {
                intent_weight,
                reality_weight,
            })
            .collect();
        Matrix::from_cells(2, cells).expect("valid cells")
    }

    #[test]
    fn sums_split_by_triangle() {
        let tax = taxonomy();
        let m = matrix([3.0, 2.0, 1.0, 0.0], [0.0, 0.0, 0.0, 0.0]);
        let result = calculate(&m, &tax, &TimeMeta::neutral(2), &DriftConfig::default());
        assert_eq!(result.diag_sum, 9.0);
        assert_eq!(result.upper_sum, 4.0);
        assert_eq!(result.lower_sum, 1.0);
        assert_eq!(result.total_units, 14.0);
        assert_eq!(result.asymmetry_ratio, Some(4.0));
        assert_eq!(result.orthogonality_fraction, 9.0 / 14.0);
        assert_eq!(result.per_category[&CategoryId::from("A")], 9.0 + 4.0 + 1.0);
        assert_eq!(result.per_category[&CategoryId::from("B")], 4.0 + 1.0);
        assert_eq!(result.grade, Grade::A);
    }

    #[test]
    fn zero_lower_sum_leaves_asymmetry_absent() {
        let tax = taxonomy();
        let m = matrix([5.0, 5.0, 0.0, 0.0], [0.0; 4]);
        let result = calculate(&m, &tax, &TimeMeta::neutral(2), &DriftConfig::default());
        assert_eq!(result.lower_sum, 0.0);
        assert_eq!(result.asymmetry_ratio, None);
        assert!(result.total_units > 0.0);
    }

    #[test]
    fn zero_matrix_gives_zero_everything() {
        let tax = taxonomy();
        let result = calculate(
            &Matrix::zeros(2),
            &tax,
            &TimeMeta::neutral(2),
            &DriftConfig::default(),
        );
        assert_eq!(result.total_units, 0.0);
        assert_eq!(result.orthogonality_fraction, 0.0);
        assert_eq!(result.asymmetry_ratio, None);
        assert_eq!(result.grade, Grade::A);
    }

    #[test]
    fn pair_override_beats_geometric_mean() {
        let tax = taxonomy();
        let mut config = DriftConfig::default();
        config.category_weights.0.insert("A".into(), 4.0);
        config.category_weights.0.insert("B".into(), 1.0);
        assert_eq!(config.category_weight(&tax, 0, 1), 2.0);
        assert_eq!(config.category_weight(&tax, 0, 0), 4.0);
        config.pair_weights.push(PairWeight {
            row: "A".into(),
            column: "B".into(),
            weight: 0.5,
        });
        assert_eq!(config.category_weight(&tax, 0, 1), 0.5);
        assert_eq!(config.category_weight(&tax, 1, 0), 2.0);
    }

    #[test]
    fn negative_weights_never_produce_negative_debt() {
        let tax = taxonomy();
        let m = matrix([3.0, 2.0, 1.0, 0.0], [0.0; 4]);
        let mut config = DriftConfig::default();
        config.category_weights.0.insert("B".into(), -4.0);
        config.pair_weights.push(PairWeight {
            row: "A".into(),
            column: "A".into(),
            weight: -10.0,
        });
        assert!(config.validate().is_err());

        let result = calculate(&m, &tax, &TimeMeta::neutral(2), &config);
        assert_eq!(result.diag_sum, 0.0);
        assert_eq!(result.upper_sum, 0.0);
        assert_eq!(result.lower_sum, 0.0);
        assert_eq!(result.total_units, 0.0);
        assert!(result.per_category.values().all(|&units| units >= 0.0));
    }

    #[test]
    fn staleness_multiplies_debt() {
        let tax = taxonomy();
        let m = matrix([10.0, 0.0, 0.0, 0.0], [0.0; 4]);
        let config = DriftConfig::default();
        let fresh = calculate(&m, &tax, &TimeMeta::neutral(2), &config);
        let stale = TimeMeta {
            reference: None,
            intent_age_days: vec![Some(90.0), Some(0.0)],
            reality_age_days: vec![Some(90.0), Some(0.0)],
        };
        let aged = calculate(&m, &tax, &stale, &config);
        assert_eq!(fresh.total_units, 100.0);
        assert_eq!(aged.total_units, 400.0);
    }

    #[test]
    fn validation_catches_bad_and_unknown_weights() {
        let tax = taxonomy();
        let mut config = DriftConfig::default();
        config.category_weights.0.insert("A".into(), -1.0);
        assert!(config.validate().is_err());

        let mut config = DriftConfig::default();
        config.pair_weights.push(PairWeight {
            row: "A".into(),
            column: "Z".into(),
            weight: 1.0,
        });
        assert!(config.validate().is_ok());
        assert!(config.validate_for(&tax).is_err());
    }

    #[test]
    fn digest_tracks_weights() {
        let base = DriftConfig::default();
        let mut weighted = base.clone();
        weighted.category_weights.0.insert("A".into(), 2.0);
        assert_ne!(base.digest(), weighted.digest());
        assert_eq!(base.digest(), DriftConfig::default().digest());
    }

    #[test]
    fn ranked_categories_sort_by_debt_then_id() {
        let result = TrustDebtResult {
            total_units: 0.0,
            grade: Grade::A,
            asymmetry_ratio: None,
            orthogonality_fraction: 0.0,
            per_category: [("B", 5.0), ("A", 5.0), ("C", 9.0)]
                .into_iter()
                .map(|(id, units)| (CategoryId::from(id), units))
                .collect(),
            upper_sum: 0.0,
            lower_sum: 0.0,
            diag_sum: 0.0,
        };
        let ranked: Vec<&str> = result
            .ranked_categories()
            .into_iter()
            .map(|(id, _)| id.as_str())
            .collect();
        assert_eq!(ranked, vec!["C", "A", "B"]);
    }
}
