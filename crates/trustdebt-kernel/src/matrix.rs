//! Asymmetric category matrix.
//!
//! For a corpus with documents `d` (weight `w_d`, hits `c_k(d)`):
//!
//! ```text
//! raw[i][j]    = Σ_d w_d · c_i(d) · [c_j(d) > 0]
//! weight[i][j] = 100 · raw[i][j] / Σ_k raw[k][k]
//! ```
//!
//! Cell `(i, j)` reads "how much of category i's signal lives in documents
//! that also speak about j". The same formula fills every cell; which
//! triangle a cell lies in only matters to drift aggregation.

use crate::corpus::Corpus;
use crate::error::ConfigurationError;
use crate::taxonomy::Taxonomy;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Scale of a normalized corpus: diagonal weights sum to this.
pub const WEIGHT_SCALE: f64 = 100.0;

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cell {
    pub intent_weight: f64,
    pub reality_weight: f64,
}

impl Cell {
    /// `intent - reality`; positive when intent leads.
    pub fn difference(&self) -> f64 {
        self.intent_weight - self.reality_weight
    }
}

/// Position of a cell relative to the diagonal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Triangle {
    /// `i < j`: reality-dominant direction.
    Upper,
    Diagonal,
    /// `i > j`: intent-dominant direction.
    Lower,
}

impl Triangle {
    /// Triangle of the cell at row `i`, column `j`.
    pub fn of(i: usize, j: usize) -> Self {
        match i.cmp(&j) {
            std::cmp::Ordering::Less => Self::Upper,
            std::cmp::Ordering::Equal => Self::Diagonal,
            std::cmp::Ordering::Greater => Self::Lower,
        }
    }
}

/// `N×N` cells stored flat at `i*N + j`. Read-only once built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Matrix {
    size: usize,
    cells: Vec<Cell>,
}

impl Matrix {
    /// Cross-product of normalized per-category weights from both corpora.
    pub fn build(intent: &Corpus, reality: &Corpus, taxonomy: &Taxonomy) -> Self {
        let size = taxonomy.len();
        let intent_weights = normalized_weights(intent, size);
        let reality_weights = normalized_weights(reality, size);
        let cells = intent_weights
            .into_iter()
            .zip(reality_weights)
            .map(|(intent_weight, reality_weight)| Cell {
                intent_weight,
                reality_weight,
            })
            .collect();
        debug!(
            categories = size,
            intent_documents = intent.len(),
            reality_documents = reality.len(),
            "built category matrix"
        );
        Self { size, cells }
    }

    /// All-zero matrix of the given size.
    pub fn zeros(size: usize) -> Self {
        Self {
            size,
            cells: vec![Cell::default(); size * size],
        }
    }

    /// Matrix from precomputed cells; weights must be finite and non-negative.
    pub fn from_cells(size: usize, cells: Vec<Cell>) -> Result<Self, ConfigurationError> {
        if cells.len() != size * size {
            return Err(ConfigurationError::Invalid(format!(
                "matrix of size {size} needs {} cells, got {}",
                size * size,
                cells.len()
            )));
        }
        let valid = |w: f64| w.is_finite() && w >= 0.0;
        if let Some(pos) = cells
            .iter()
            .position(|c| !valid(c.intent_weight) || !valid(c.reality_weight))
        {
            return Err(ConfigurationError::Invalid(format!(
                "cell ({}, {}) has a negative or non-finite weight",
                pos / size,
                pos % size
            )));
        }
        Ok(Self { size, cells })
    }

    /// Number of rows and of columns.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Cells in row-major order.
    pub fn cells(&self) -> &[Cell] {
        &self.cells
    }

    /// Cell at `(i, j)`; zero when out of range.
    pub fn cell(&self, i: usize, j: usize) -> Cell {
        if i >= self.size || j >= self.size {
            return Cell::default();
        }
        self.cells[i * self.size + j]
    }

    /// Intent weight at `(i, j)`.
    pub fn intent(&self, i: usize, j: usize) -> f64 {
        self.cell(i, j).intent_weight
    }

    /// Reality weight at `(i, j)`.
    pub fn reality(&self, i: usize, j: usize) -> f64 {
        self.cell(i, j).reality_weight
    }

    /// `intent[k][k] + reality[k][k]` per category.
    pub fn diagonal_totals(&self) -> Vec<f64> {
        (0..self.size)
            .map(|k| {
                let cell = self.cell(k, k);
                cell.intent_weight + cell.reality_weight
            })
            .collect()
    }

    /// True when neither corpus contributed any weight.
    pub fn is_zero(&self) -> bool {
        self.cells
            .iter()
            .all(|c| c.intent_weight == 0.0 && c.reality_weight == 0.0)
    }
}

fn normalized_weights(corpus: &Corpus, size: usize) -> Vec<f64> {
    let documents = corpus.documents();
    let rows: Vec<Vec<f64>> = (0..size)
        .into_par_iter()
        .map(|i| {
            let mut row = vec![0.0; size];
            for doc in documents {
                let hits = doc.hits_for(i);
                if hits == 0 || doc.weight == 0.0 {
                    continue;
                }
                let signal = doc.weight * f64::from(hits);
                for (j, slot) in row.iter_mut().enumerate() {
                    if doc.hits_for(j) > 0 {
                        *slot += signal;
                    }
                }
            }
            row
        })
        .collect();

    let diagonal: f64 = (0..size).map(|k| rows[k][k]).sum();
    if diagonal <= 0.0 {
        return vec![0.0; size * size];
    }
    let scale = WEIGHT_SCALE / diagonal;
    rows.into_iter()
        .flat_map(|row| row.into_iter().map(move |raw| raw * scale))
        .collect()
}
