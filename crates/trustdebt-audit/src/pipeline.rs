//! The full measurement chain for one source tree and one window.
//!
//! ```text
//! SourceTree ─extract─▶ intent + reality ─build─▶ Matrix ─┬─calculate─▶ TrustDebtResult
//!                                                          └─validate──▶ ProcessHealthReport
//! ```

use crate::cache::{AnalysisCache, CacheKey};
use crate::config::AnalysisConfig;
use crate::error::AnalysisError;
use crate::warning::Warning;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use trustdebt_corpus::{Extractor, SourceError, SourceTree, Window};
use trustdebt_kernel::{
    ConfigurationError, ContentCoverage, Legitimacy, Matrix, ProcessHealthReport, Taxonomy,
    TimeMeta, TrustDebtResult, Vocabulary, drift, health,
};

pub const ANALYSIS_REPORT_SCHEMA: u64 = 1;
pub const ANALYSIS_REPORT_KIND: &str = "trustdebt.analysis.v1";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CorpusStats {
    pub intent_documents: usize,
    pub intent_mapped: usize,
    pub reality_commits: usize,
    pub reality_mapped: usize,
    pub gaps: usize,
    pub vocabulary_terms: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Analysis {
    /// Absent when the source tree could not be hashed; such an analysis is
    /// never cached.
    pub key: Option<CacheKey>,
    pub result: TrustDebtResult,
    pub health: ProcessHealthReport,
    pub warnings: Vec<Warning>,
    pub corpus_stats: CorpusStats,
}

impl Analysis {
    /// Lines a renderer must show next to the score.
    pub fn caveats(&self) -> Vec<String> {
        let mut caveats = Vec::new();
        if self.health.legitimacy == Legitimacy::Invalid {
            caveats.push(format!(
                "process health is {} (overall {:.2}); the score is not a trustworthy measurement",
                self.health.legitimacy, self.health.overall_score
            ));
        }
        let gaps = self.warnings.iter().filter(|w| w.is_gap()).count();
        if gaps > 0 {
            caveats.push(format!(
                "{gaps} source(s) could not be read and contributed zero weight"
            ));
        }
        caveats.extend(
            self.warnings
                .iter()
                .filter(|w| matches!(w, Warning::CategoryDesign(_)))
                .map(|w| format!("category design: {w}")),
        );
        caveats
    }

    /// True when the score must not be shown without its caveats.
    pub fn is_qualified(&self) -> bool {
        self.health.legitimacy == Legitimacy::Invalid || !self.warnings.is_empty()
    }

    pub fn to_report_json(&self) -> Result<serde_json::Value, serde_json::Error> {
        serde_json::to_value(AnalysisReport {
            schema: ANALYSIS_REPORT_SCHEMA,
            kind: ANALYSIS_REPORT_KIND,
            qualified: self.is_qualified(),
            caveats: self.caveats(),
            analysis: self,
        })
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct AnalysisReport<'a> {
    schema: u64,
    kind: &'static str,
    qualified: bool,
    caveats: Vec<String>,
    analysis: &'a Analysis,
}

pub struct Analyzer {
    config: AnalysisConfig,
    extractor: Extractor,
}

impl Analyzer {
    pub fn new(config: AnalysisConfig) -> Result<Self, ConfigurationError> {
        config.validate()?;
        let extractor = Extractor::new(config.extraction.clone())?;
        Ok(Self { config, extractor })
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    pub fn cache_key(
        &self,
        tree: &dyn SourceTree,
        taxonomy: &Taxonomy,
        window: &Window,
    ) -> Result<CacheKey, SourceError> {
        Ok(CacheKey {
            source_tree_hash: tree.tree_hash()?,
            commit_range: window.describe(),
            taxonomy_hash: taxonomy.digest(),
            config_digest: self.config.digest(),
        })
    }

    pub fn analyze(
        &self,
        tree: &dyn SourceTree,
        taxonomy: &Taxonomy,
        window: &Window,
    ) -> Result<Analysis, AnalysisError> {
        self.config.drift.validate_for(taxonomy)?;
        let key = match self.cache_key(tree, taxonomy, window) {
            Ok(key) => Some(key),
            Err(error) => {
                warn!(%error, "source tree hash unavailable; analysis is not cacheable");
                None
            }
        };

        let extraction = self.extractor.extract(tree, taxonomy, window);
        let (intent, reality) = (&extraction.intent, &extraction.reality);
        let vocabulary = Vocabulary::from_corpora(taxonomy, &[intent, reality]);

        let matrix = Matrix::build(intent, reality, taxonomy);
        let time = TimeMeta::from_corpora(taxonomy.len(), intent, reality);
        let result = drift::calculate(&matrix, taxonomy, &time, &self.config.drift);
        let health = health::validate_with_threshold(
            taxonomy,
            &matrix,
            &ContentCoverage::from_corpora(intent, reality),
            &vocabulary,
            self.config.correlation_threshold,
        );

        let mut warnings: Vec<Warning> = Vec::new();
        if let Some(design) = health.design_error() {
            warnings.push(Warning::CategoryDesign(design));
        }
        warnings.extend(extraction.gaps.iter().cloned().map(Warning::CorpusGap));

        let corpus_stats = CorpusStats {
            intent_documents: intent.len(),
            intent_mapped: intent.mapped(),
            reality_commits: reality.len(),
            reality_mapped: reality.mapped(),
            gaps: extraction.gaps.len(),
            vocabulary_terms: vocabulary.len(),
        };

        info!(
            total_units = result.total_units,
            grade = %result.grade,
            legitimacy = %health.legitimacy,
            warnings = warnings.len(),
            "analysis complete"
        );

        Ok(Analysis {
            key,
            result,
            health,
            warnings,
            corpus_stats,
        })
    }

    /// Like [`analyze`](Self::analyze), but answers from `cache` when the key
    /// is already known. Cache failures are logged and never fail the run.
    pub fn analyze_cached(
        &self,
        cache: &dyn AnalysisCache,
        tree: &dyn SourceTree,
        taxonomy: &Taxonomy,
        window: &Window,
    ) -> Result<Analysis, AnalysisError> {
        if let Ok(key) = self.cache_key(tree, taxonomy, window) {
            match cache.get(&key) {
                Ok(Some(hit)) => {
                    debug!(key = %key.digest(), "analysis cache hit");
                    return Ok(hit);
                }
                Ok(None) => {}
                Err(error) => warn!(%error, "analysis cache read failed"),
            }
        }

        let analysis = self.analyze(tree, taxonomy, window)?;
        if let Some(key) = &analysis.key
            && let Err(error) = cache.put(key, &analysis)
        {
            warn!(%error, "analysis cache write failed");
        }
        Ok(analysis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryCache;
    use chrono::{DateTime, TimeZone, Utc};
    use trustdebt_corpus::{MemoryCommit, MemoryTree};
    use trustdebt_kernel::{CategoryDefinition, Grade, TaxonomyDefinition};

    fn day(d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 9, d, 8, 0, 0)
            .single()
            .expect("valid date")
    }

    fn taxonomy() -> Taxonomy {
        Taxonomy::from_definition(&TaxonomyDefinition::new(vec![
            CategoryDefinition::new("SEC", &["security", "auth"]),
            CategoryDefinition::new("SPD", &["speed", "latency"]),
            CategoryDefinition::new("DOC", &["docs", "guide"]),
        ]))
        .expect("valid taxonomy")
    }

    fn tree() -> MemoryTree {
        MemoryTree::builder()
            .file(
                "specs/security.md",
                "security auth security model, token auth and security review",
            )
            .file("README.md", "speed matters; a guide to latency and docs")
            .commit(MemoryCommit::new("c1", day(1), "speed up cache lookups"))
            .commit(MemoryCommit::new("c2", day(2), "reduce latency on hot path"))
            .commit(MemoryCommit::new("c3", day(3), "speed: batch writes"))
            .build()
            .expect("unique commit ids")
    }

    #[test]
    fn analysis_is_idempotent() {
        let analyzer = Analyzer::new(AnalysisConfig::default()).expect("valid config");
        let (tree, tax) = (tree(), taxonomy());
        let first = analyzer.analyze(&tree, &tax, &Window::All).expect("analysis");
        let second = analyzer.analyze(&tree, &tax, &Window::All).expect("analysis");
        assert_eq!(first, second);
        assert!(first.result.total_units > 0.0);
        assert_eq!(first.corpus_stats.intent_documents, 2);
        assert_eq!(first.corpus_stats.reality_commits, 3);
    }

    #[test]
    fn drift_weights_for_unknown_categories_are_fatal() {
        let mut config = AnalysisConfig::default();
        config
            .drift
            .category_weights
            .0
            .insert("NOPE".to_string(), 2.0);
        let analyzer = Analyzer::new(config).expect("shape is valid");
        let err = analyzer
            .analyze(&tree(), &taxonomy(), &Window::All)
            .expect_err("unknown category weight");
        assert!(matches!(err, AnalysisError::Configuration(_)));
    }

    #[test]
    fn cached_run_returns_stored_analysis() {
        let analyzer = Analyzer::new(AnalysisConfig::default()).expect("valid config");
        let cache = MemoryCache::new();
        let (tree, tax) = (tree(), taxonomy());

        let first = analyzer
            .analyze_cached(&cache, &tree, &tax, &Window::All)
            .expect("analysis");
        assert_eq!(cache.len(), 1);
        let second = analyzer
            .analyze_cached(&cache, &tree, &tax, &Window::All)
            .expect("analysis");
        assert_eq!(first, second);
        assert_eq!(cache.len(), 1);

        analyzer
            .analyze_cached(&cache, &tree, &tax, &Window::Last { count: 1 })
            .expect("analysis");
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn report_envelope_is_versioned() {
        let analyzer = Analyzer::new(AnalysisConfig::default()).expect("valid config");
        let analysis = analyzer
            .analyze(&tree(), &taxonomy(), &Window::All)
            .expect("analysis");
        let report = analysis.to_report_json().expect("serializable");
        assert_eq!(report["schema"], 1);
        assert_eq!(report["kind"], ANALYSIS_REPORT_KIND);
        assert!(report["analysis"]["result"]["totalUnits"].is_number());
        assert!(report["analysis"]["health"]["overallScore"].is_number());
        assert!(report["analysis"]["corpusStats"]["intentDocuments"].is_number());
    }

    #[test]
    fn gaps_and_invalid_health_become_caveats() {
        let tree = MemoryTree::builder()
            .file("README.md", "nothing relevant here")
            .file("specs/x.md", "security")
            .unreadable("specs/x.md")
            .build()
            .expect("unique commit ids");
        let analyzer = Analyzer::new(AnalysisConfig::default()).expect("valid config");
        let analysis = analyzer
            .analyze(&tree, &taxonomy(), &Window::All)
            .expect("analysis");

        assert_eq!(analysis.result.total_units, 0.0);
        assert_eq!(analysis.result.grade, Grade::A);
        assert!(analysis.is_qualified());
        let caveats = analysis.caveats();
        assert!(caveats.iter().any(|c| c.contains("INVALID")));
        assert!(caveats.iter().any(|c| c.starts_with("1 source(s)")));
    }
}
