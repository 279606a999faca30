//! Staleness multipliers for drift aggregation.
//!
//! Elapsed time is measured from the newest timestamp found in either
//! corpus, never from the wall clock, so a replay of the same history gives
//! the same numbers on any day.

use crate::corpus::Corpus;
use crate::error::ConfigurationError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

const SECONDS_PER_DAY: f64 = 86_400.0;

/// Elapsed days to multiplier. Every model is non-decreasing in elapsed
/// time and never below 1.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "model", rename_all = "snake_case")]
pub enum DecayModel {
    /// Always 1.
    Neutral,
    /// `1 + min(days, cap_days) / horizon_days`.
    Linear { horizon_days: f64, cap_days: f64 },
    /// `2 ^ (min(days, cap_days) / doubling_days)`.
    Exponential { doubling_days: f64, cap_days: f64 },
}

impl Default for DecayModel {
    fn default() -> Self {
        Self::Linear {
            horizon_days: 90.0,
            cap_days: 365.0,
        }
    }
}

impl DecayModel {
    /// Multiplier for `elapsed_days`; `None` means the signal never existed
    /// and is treated as capped staleness.
    pub fn multiplier(&self, elapsed_days: Option<f64>) -> f64 {
        match *self {
            Self::Neutral => 1.0,
            Self::Linear {
                horizon_days,
                cap_days,
            } => 1.0 + clamp_days(elapsed_days, cap_days) / horizon_days,
            Self::Exponential {
                doubling_days,
                cap_days,
            } => (clamp_days(elapsed_days, cap_days) / doubling_days).exp2(),
        }
    }

    /// Reject non-positive or non-finite periods and caps.
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        let positive = |name: &str, v: f64| {
            if v.is_finite() && v > 0.0 {
                Ok(())
            } else {
                Err(ConfigurationError::Invalid(format!(
                    "decay {name} must be a positive finite number, got {v}"
                )))
            }
        };
        match *self {
            Self::Neutral => Ok(()),
            Self::Linear {
                horizon_days,
                cap_days,
            } => {
                positive("horizon_days", horizon_days)?;
                positive("cap_days", cap_days)
            }
            Self::Exponential {
                doubling_days,
                cap_days,
            } => {
                positive("doubling_days", doubling_days)?;
                positive("cap_days", cap_days)
            }
        }
    }
}

fn clamp_days(elapsed_days: Option<f64>, cap_days: f64) -> f64 {
    match elapsed_days {
        Some(days) if days.is_finite() => days.clamp(0.0, cap_days),
        _ => cap_days,
    }
}

/// Per-category age of the newest intent and reality signal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeMeta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference: Option<DateTime<Utc>>,
    pub intent_age_days: Vec<Option<f64>>,
    pub reality_age_days: Vec<Option<f64>>,
}

impl TimeMeta {
    /// Every signal is fresh: each model yields a multiplier of 1.
    pub fn neutral(size: usize) -> Self {
        Self {
            reference: None,
            intent_age_days: vec![Some(0.0); size],
            reality_age_days: vec![Some(0.0); size],
        }
    }

    /// Per-category signal ages, measured back from the newest timestamp
    /// in either corpus.
    pub fn from_corpora(size: usize, intent: &Corpus, reality: &Corpus) -> Self {
        let reference = intent.newest_timestamp().max(reality.newest_timestamp());
        let age = |corpus: &Corpus, k: usize| -> Option<f64> {
            let reference = reference?;
            let newest = corpus.newest_signal(k)?;
            let seconds = (reference - newest).num_seconds() as f64;
            Some((seconds / SECONDS_PER_DAY).max(0.0))
        };
        Self {
            reference,
            intent_age_days: (0..size).map(|k| age(intent, k)).collect(),
            reality_age_days: (0..size).map(|k| age(reality, k)).collect(),
        }
    }

    /// Staleness of category `j`'s reality signal.
    pub fn time_decay(&self, model: &DecayModel, j: usize) -> f64 {
        model.multiplier(self.reality_age_days.get(j).copied().flatten())
    }

    /// Staleness of category `i`'s intent signal.
    pub fn spec_age(&self, model: &DecayModel, i: usize) -> f64 {
        model.multiplier(self.intent_age_days.get(i).copied().flatten())
    }
}
