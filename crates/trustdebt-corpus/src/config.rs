//! Extraction settings.

use crate::classify::{ClassRule, Classifier, default_extensions, default_rules};
use serde::{Deserialize, Serialize};
use trustdebt_kernel::{ConfigurationError, ContentHash, DocumentClass};

/// Intent weight per document class.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ClassWeights {
    pub specification: f64,
    pub core_documentation: f64,
    pub guide: f64,
    pub note: f64,
}

impl Default for ClassWeights {
    fn default() -> Self {
        Self {
            specification: 0.04,
            core_documentation: 0.03,
            guide: 0.015,
            note: 0.005,
        }
    }
}

impl ClassWeights {
    /// Weight of a documentation class. Commits are weighted separately.
    pub fn weight(&self, class: DocumentClass) -> f64 {
        match class {
            DocumentClass::Specification => self.specification,
            DocumentClass::CoreDocumentation => self.core_documentation,
            DocumentClass::Guide => self.guide,
            DocumentClass::Note => self.note,
            DocumentClass::Commit => 0.0,
        }
    }

    fn entries(&self) -> [(&'static str, f64); 4] {
        [
            ("specification", self.specification),
            ("core_documentation", self.core_documentation),
            ("guide", self.guide),
            ("note", self.note),
        ]
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ExtractionConfig {
    pub class_weights: ClassWeights,
    pub rules: Vec<ClassRule>,
    pub doc_extensions: Vec<String>,
    pub commit_weight: f64,
    /// Worker threads for extraction; 0 lets rayon decide.
    pub workers: usize,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            class_weights: ClassWeights::default(),
            rules: default_rules(),
            doc_extensions: default_extensions(),
            commit_weight: 1.0,
            workers: 0,
        }
    }
}

impl ExtractionConfig {
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        let unit = |name: &str, w: f64| {
            if w.is_finite() && (0.0..=1.0).contains(&w) {
                Ok(())
            } else {
                Err(ConfigurationError::Invalid(format!(
                    "{name} weight must lie in [0, 1], got {w}"
                )))
            }
        };
        for (name, weight) in self.class_weights.entries() {
            unit(name, weight)?;
        }
        unit("commit", self.commit_weight)?;
        self.classifier().map(|_| ())
    }

    pub fn classifier(&self) -> Result<Classifier, ConfigurationError> {
        Classifier::new(&self.rules, &self.doc_extensions)
    }

    /// Digest of everything that affects extraction output. `workers` is
    /// left out because it never changes results.
    pub fn digest(&self) -> ContentHash {
        let mut builder = ContentHash::builder();
        for (name, weight) in self.class_weights.entries() {
            builder = builder.field_f64(name, weight);
        }
        for rule in &self.rules {
            builder = builder
                .field("rule", &rule.pattern)
                .field("class", rule.class.as_str());
        }
        for ext in &self.doc_extensions {
            builder = builder.field("extension", ext);
        }
        builder.field_f64("commit_weight", self.commit_weight).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_class_table() {
        let config = ExtractionConfig::default();
        assert_eq!(config.class_weights.weight(DocumentClass::Specification), 0.04);
        assert_eq!(config.class_weights.weight(DocumentClass::CoreDocumentation), 0.03);
        assert_eq!(config.class_weights.weight(DocumentClass::Guide), 0.015);
        assert_eq!(config.class_weights.weight(DocumentClass::Note), 0.005);
        assert_eq!(config.commit_weight, 1.0);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn rejects_out_of_range_weights() {
        let mut config = ExtractionConfig::default();
        config.class_weights.guide = 1.5;
        assert!(config.validate().is_err());

        let mut config = ExtractionConfig::default();
        config.commit_weight = f64::NAN;
        assert!(config.validate().is_err());
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let config: ExtractionConfig = toml::from_str(
            r#"
            commit_weight = 0.5

            [class_weights]
            note = 0.0
            "#,
        )
        .expect("partial config parses");
        assert_eq!(config.commit_weight, 0.5);
        assert_eq!(config.class_weights.note, 0.0);
        assert_eq!(config.class_weights.specification, 0.04);
        assert_eq!(config.rules, default_rules());
    }

    #[test]
    fn digest_ignores_workers() {
        let base = ExtractionConfig::default();
        let mut threaded = base.clone();
        threaded.workers = 8;
        assert_eq!(base.digest(), threaded.digest());
        let mut reweighted = base.clone();
        reweighted.commit_weight = 0.9;
        assert_ne!(base.digest(), reweighted.digest());
    }
}
