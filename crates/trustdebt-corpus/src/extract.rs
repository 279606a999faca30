//! Source tree to intent and reality corpora.
//!
//! Reads run on a bounded rayon pool. Results are collected in input order
//! (sorted paths, oldest-first commits), so the corpora never depend on
//! worker scheduling.

use crate::classify::Classifier;
use crate::config::ExtractionConfig;
use crate::source::{SourceError, SourceTree};
use crate::window::Window;
use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};
use trustdebt_kernel::{
    ConfigurationError, Corpus, CorpusDocument, CorpusGapError, CorpusKind, DocumentClass,
    Taxonomy,
};
use tracing::{debug, info, warn};

/// Source id used when a whole listing fails rather than one entry.
pub const TREE_LISTING: &str = "<tree>";
pub const HISTORY_LISTING: &str = "<history>";

#[derive(Debug, Clone)]
pub struct Extraction {
    pub intent: Corpus,
    pub reality: Corpus,
    pub gaps: Vec<CorpusGapError>,
}

pub struct Extractor {
    config: ExtractionConfig,
    classifier: Classifier,
    pool: ThreadPool,
}

impl Extractor {
    pub fn new(config: ExtractionConfig) -> Result<Self, ConfigurationError> {
        config.validate()?;
        let classifier = config.classifier()?;
        let pool = ThreadPoolBuilder::new()
            .num_threads(config.workers)
            .thread_name(|i| format!("trustdebt-extract-{i}"))
            .build()
            .map_err(|e| ConfigurationError::Invalid(format!("extraction pool: {e}")))?;
        Ok(Self {
            config,
            classifier,
            pool,
        })
    }

    pub fn config(&self) -> &ExtractionConfig {
        &self.config
    }

    pub fn classifier(&self) -> &Classifier {
        &self.classifier
    }

    pub fn extract(&self, tree: &dyn SourceTree, taxonomy: &Taxonomy, window: &Window) -> Extraction {
        let mut gaps = Vec::new();
        let intent = self.extract_intent(tree, taxonomy, &mut gaps);
        let reality = self.extract_reality(tree, taxonomy, window, &mut gaps);
        info!(
            intent_documents = intent.len(),
            reality_commits = reality.len(),
            gaps = gaps.len(),
            window = %window.describe(),
            "extracted corpora"
        );
        Extraction {
            intent,
            reality,
            gaps,
        }
    }

    fn extract_intent(
        &self,
        tree: &dyn SourceTree,
        taxonomy: &Taxonomy,
        gaps: &mut Vec<CorpusGapError>,
    ) -> Corpus {
        let mut corpus = Corpus::new(CorpusKind::Intent);
        let paths = match tree.list_files() {
            Ok(paths) => paths,
            Err(error) => {
                gaps.push(gap(CorpusKind::Intent, TREE_LISTING, &error));
                return corpus;
            }
        };
        let documents: Vec<(String, DocumentClass)> = paths
            .into_iter()
            .filter_map(|path| self.classifier.classify(&path).map(|class| (path, class)))
            .collect();
        debug!(documents = documents.len(), "classified documentation files");

        let weights = self.config.class_weights;
        let results: Vec<Result<CorpusDocument, CorpusGapError>> = self.pool.install(|| {
            documents
                .par_iter()
                .map(|(path, class)| {
                    let blob = tree
                        .read_file(path)
                        .map_err(|error| gap(CorpusKind::Intent, path, &error))?;
                    let doc = CorpusDocument::new(
                        path.as_str(),
                        blob.text,
                        weights.weight(*class),
                        *class,
                        taxonomy,
                    );
                    Ok(match blob.modified {
                        Some(at) => doc.with_timestamp(at),
                        None => doc,
                    })
                })
                .collect()
        });

        for result in results {
            match result {
                Ok(doc) => corpus.push(doc),
                Err(error) => {
                    corpus.record_gap();
                    gaps.push(error);
                }
            }
        }
        corpus
    }

    fn extract_reality(
        &self,
        tree: &dyn SourceTree,
        taxonomy: &Taxonomy,
        window: &Window,
        gaps: &mut Vec<CorpusGapError>,
    ) -> Corpus {
        let mut corpus = Corpus::new(CorpusKind::Reality);
        let ids = match tree.commit_ids(window) {
            Ok(ids) => ids,
            Err(error) => {
                gaps.push(gap(CorpusKind::Reality, HISTORY_LISTING, &error));
                return corpus;
            }
        };

        let weight = self.config.commit_weight;
        let results: Vec<Result<CorpusDocument, CorpusGapError>> = self.pool.install(|| {
            ids.par_iter()
                .map(|id| {
                    let record = tree
                        .read_commit(id)
                        .map_err(|error| gap(CorpusKind::Reality, id, &error))?;
                    let doc = CorpusDocument::new(
                        record.id,
                        record.message,
                        weight,
                        DocumentClass::Commit,
                        taxonomy,
                    );
                    Ok(match record.timestamp {
                        Some(at) => doc.with_timestamp(at),
                        None => doc,
                    })
                })
                .collect()
        });

        for result in results {
            match result {
                Ok(doc) => corpus.push(doc),
                Err(error) => {
                    corpus.record_gap();
                    gaps.push(error);
                }
            }
        }
        corpus
    }
}

fn gap(corpus: CorpusKind, source_id: &str, error: &SourceError) -> CorpusGapError {
    warn!(%corpus, source = source_id, %error, "skipping unreadable source");
    CorpusGapError {
        corpus,
        source_id: source_id.to_string(),
        reason: error.to_string(),
    }
}
