//! Analysis configuration.
//!
//! One TOML document with `extraction`, `drift` and `timeline` tables plus a
//! top-level `correlation_threshold`. Every field has a default, so an empty
//! file is a valid configuration.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use trustdebt_corpus::ExtractionConfig;
use trustdebt_kernel::{ConfigurationError, ContentHash, DEFAULT_CORRELATION_THRESHOLD, DriftConfig};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TimelineConfig {
    pub snapshot_timeout_ms: u64,
    /// Snapshots in flight at once; 0 means one per available core.
    pub workers: usize,
}

impl Default for TimelineConfig {
    fn default() -> Self {
        Self {
            snapshot_timeout_ms: 120_000,
            workers: 0,
        }
    }
}

impl TimelineConfig {
    pub fn snapshot_timeout(&self) -> Duration {
        Duration::from_millis(self.snapshot_timeout_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AnalysisConfig {
    pub extraction: ExtractionConfig,
    pub drift: DriftConfig,
    pub timeline: TimelineConfig,
    /// Pairs with `|r|` above this are reported as a design warning.
    pub correlation_threshold: f64,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            extraction: ExtractionConfig::default(),
            drift: DriftConfig::default(),
            timeline: TimelineConfig::default(),
            correlation_threshold: DEFAULT_CORRELATION_THRESHOLD,
        }
    }
}

impl AnalysisConfig {
    pub fn from_toml_str(input: &str) -> Result<Self, ConfigurationError> {
        let config: Self =
            toml::from_str(input).map_err(|e| ConfigurationError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigurationError> {
        let path = path.as_ref();
        let input = std::fs::read_to_string(path).map_err(|e| ConfigurationError::Read {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        Self::from_toml_str(&input)
    }

    pub fn validate(&self) -> Result<(), ConfigurationError> {
        self.extraction.validate()?;
        self.drift.validate()?;
        let threshold = self.correlation_threshold;
        if !(threshold.is_finite() && threshold > 0.0 && threshold <= 1.0) {
            return Err(ConfigurationError::Invalid(format!(
                "correlation_threshold must lie in (0, 1], got {threshold}"
            )));
        }
        if self.timeline.snapshot_timeout_ms == 0 {
            return Err(ConfigurationError::Invalid(
                "timeline.snapshot_timeout_ms must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// Digest of every setting that can change a score. Worker counts and
    /// timeline settings are excluded.
    pub fn digest(&self) -> ContentHash {
        ContentHash::builder()
            .field("extraction", self.extraction.digest().as_str())
            .field("drift", self.drift.digest().as_str())
            .field_f64("correlationThreshold", self.correlation_threshold)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use trustdebt_kernel::DecayModel;

    #[test]
    fn empty_document_is_the_default_config() {
        let config = AnalysisConfig::from_toml_str("").expect("empty config is valid");
        assert_eq!(config, AnalysisConfig::default());
    }

    #[test]
    fn parses_all_sections() {
        let config = AnalysisConfig::from_toml_str(
            r#"
            correlation_threshold = 0.2

            [extraction]
            commit_weight = 0.5
            workers = 2

            [extraction.class_weights]
            specification = 0.05

            [drift.decay]
            model = "exponential"
            doubling_days = 30.0
            cap_days = 180.0

            [drift.category_weights]
            SEC = 2.0

            [timeline]
            snapshot_timeout_ms = 500
            "#,
        )
        .expect("valid config");

        assert_eq!(config.correlation_threshold, 0.2);
        assert_eq!(config.extraction.commit_weight, 0.5);
        assert_eq!(config.extraction.class_weights.specification, 0.05);
        assert_eq!(config.extraction.class_weights.guide, 0.015);
        assert_eq!(
            config.drift.decay,
            DecayModel::Exponential {
                doubling_days: 30.0,
                cap_days: 180.0
            }
        );
        assert_eq!(config.drift.category_weights.get("SEC"), 2.0);
        assert_eq!(config.timeline.snapshot_timeout(), Duration::from_millis(500));
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let err = AnalysisConfig::from_toml_str("threshold = 0.2").expect_err("unknown key");
        assert!(matches!(err, ConfigurationError::Parse(_)));
    }

    #[test]
    fn out_of_range_values_are_rejected() {
        assert!(AnalysisConfig::from_toml_str("correlation_threshold = 0.0").is_err());
        assert!(AnalysisConfig::from_toml_str("[timeline]\nsnapshot_timeout_ms = 0").is_err());
        assert!(AnalysisConfig::from_toml_str("[extraction]\ncommit_weight = 3.0").is_err());
    }

    #[test]
    fn digest_tracks_scoring_settings_only() {
        let base = AnalysisConfig::default();

        let mut workers = base.clone();
        workers.extraction.workers = 8;
        workers.timeline.snapshot_timeout_ms = 10;
        assert_eq!(base.digest(), workers.digest());

        let mut weighted = base.clone();
        weighted
            .drift
            .category_weights
            .0
            .insert("SEC".to_string(), 3.0);
        assert_ne!(base.digest(), weighted.digest());

        let mut threshold = base.clone();
        threshold.correlation_threshold = 0.3;
        assert_ne!(base.digest(), threshold.digest());
    }

    #[test]
    fn load_reports_missing_file_as_read_error() {
        let err = AnalysisConfig::load("/nonexistent/trustdebt.toml").expect_err("missing file");
        assert!(matches!(err, ConfigurationError::Read { .. }));
    }
}
