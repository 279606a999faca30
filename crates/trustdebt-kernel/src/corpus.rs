//! Intent and reality corpora.
//!
//! A corpus is an ordered list of weighted documents. Each document carries
//! its keyword hits per category, aligned with the taxonomy's canonical
//! order, so the matrix builder never touches raw text.

use crate::hash::ContentHash;
use crate::taxonomy::Taxonomy;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Which side of the comparison a corpus sits on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CorpusKind {
    /// Documentation: what the project says it does.
    Intent,
    /// Commit history: what the project actually did.
    Reality,
}

impl CorpusKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Intent => "intent",
            Self::Reality => "reality",
        }
    }
}

impl fmt::Display for CorpusKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Document class driving the intent weight table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentClass {
    Specification,
    CoreDocumentation,
    Guide,
    Note,
    Commit,
}

impl DocumentClass {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Specification => "specification",
            Self::CoreDocumentation => "core_documentation",
            Self::Guide => "guide",
            Self::Note => "note",
            Self::Commit => "commit",
        }
    }
}

impl fmt::Display for DocumentClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CorpusDocument {
    /// Repository-relative path or commit id.
    pub source: String,
    pub text: String,
    pub weight: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
    pub class: DocumentClass,
    pub hits: Vec<u32>,
}

impl CorpusDocument {
    /// Read `text` against `taxonomy`. Negative or non-finite weights become 0.
    pub fn new(
        source: impl Into<String>,
        text: impl Into<String>,
        weight: f64,
        class: DocumentClass,
        taxonomy: &Taxonomy,
    ) -> Self {
        let text = text.into();
        let hits = taxonomy.count_hits(&text);
        let weight = if weight.is_finite() { weight.max(0.0) } else { 0.0 };
        Self {
            source: source.into(),
            text,
            weight,
            timestamp: None,
            class,
            hits,
        }
    }

    /// Attach the time the document was last changed.
    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    /// Whether any category keyword matched.
    pub fn is_mapped(&self) -> bool {
        self.hits.iter().any(|&h| h > 0)
    }

    /// Keyword hits for category `idx`; 0 when out of range.
    pub fn hits_for(&self, idx: usize) -> u32 {
        self.hits.get(idx).copied().unwrap_or(0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Corpus {
    kind: CorpusKind,
    documents: Vec<CorpusDocument>,
    /// Sources that failed to read; they count toward coverage only.
    gaps: usize,
}

impl Corpus {
    /// Empty corpus of the given kind.
    pub fn new(kind: CorpusKind) -> Self {
        Self {
            kind,
            documents: Vec::new(),
            gaps: 0,
        }
    }

    /// Corpus from documents already in extraction order.
    pub fn from_documents(kind: CorpusKind, documents: Vec<CorpusDocument>) -> Self {
        Self {
            kind,
            documents,
            gaps: 0,
        }
    }

    /// Append a document, keeping extraction order.
    pub fn push(&mut self, document: CorpusDocument) {
        self.documents.push(document);
    }

    /// Count one source that could not be read.
    pub fn record_gap(&mut self) {
        self.gaps += 1;
    }

    /// Replace the gap count.
    pub fn with_gaps(mut self, gaps: usize) -> Self {
        self.gaps = gaps;
        self
    }

    pub fn kind(&self) -> CorpusKind {
        self.kind
    }

    /// Documents in extraction order.
    pub fn documents(&self) -> &[CorpusDocument] {
        &self.documents
    }

    /// Number of readable documents.
    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    /// Number of sources that failed to read.
    pub fn gaps(&self) -> usize {
        self.gaps
    }

    /// Documents with at least one keyword hit.
    pub fn mapped(&self) -> usize {
        self.documents.iter().filter(|d| d.is_mapped()).count()
    }

    /// Newest timestamp of any document.
    pub fn newest_timestamp(&self) -> Option<DateTime<Utc>> {
        self.documents.iter().filter_map(|d| d.timestamp).max()
    }

    /// Newest timestamp among documents that hit category `idx`.
    pub fn newest_signal(&self, idx: usize) -> Option<DateTime<Utc>> {
        self.documents
            .iter()
            .filter(|d| d.hits_for(idx) > 0)
            .filter_map(|d| d.timestamp)
            .max()
    }

    /// Digest over every document in order. Equal corpora hash equal.
    pub fn digest(&self) -> ContentHash {
        let mut builder = ContentHash::builder()
            .field("kind", self.kind.as_str())
            .field_int("gaps", self.gaps as i64);
        for doc in &self.documents {
            let timestamp = doc.timestamp.map(|t| t.to_rfc3339());
            let hits = doc
                .hits
                .iter()
                .map(u32::to_string)
                .collect::<Vec<_>>()
                .join(",");
            builder = builder
                .field("source", &doc.source)
                .field("text", &doc.text)
                .field_f64("weight", doc.weight)
                .field("class", doc.class.as_str())
                .field("timestamp", timestamp.as_deref().unwrap_or(""))
                .field("hits", &hits);
        }
        builder.finish()
    }
}

/// Mapped versus available content units across both corpora.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentCoverage {
    pub mapped: usize,
    pub total: usize,
}

impl ContentCoverage {
    /// Coverage of both corpora; gaps count as unmapped.
    pub fn from_corpora(intent: &Corpus, reality: &Corpus) -> Self {
        Self {
            mapped: intent.mapped() + reality.mapped(),
            total: intent.len() + intent.gaps() + reality.len() + reality.gaps(),
        }
    }

    /// `mapped / total`, or 0 for an empty corpus.
    pub fn ratio(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.mapped as f64 / self.total as f64
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::taxonomy::{CategoryDefinition, TaxonomyDefinition};
    use chrono::TimeZone;

    fn taxonomy() -> Taxonomy {
        Taxonomy::from_definition(&TaxonomyDefinition::new(vec![
            CategoryDefinition::new("SEC", &["security"]),
            CategoryDefinition::new("SPD", &["speed"]),
        ]))
        .expect("valid taxonomy")
    }

    #[test]
    fn documents_record_hits_in_canonical_order() {
        let tax = taxonomy();
        let doc = CorpusDocument::new(
            "README.md",
            "Speed matters. Security matters more: security.",
            0.03,
            DocumentClass::CoreDocumentation,
            &tax,
        );
        assert_eq!(doc.hits, vec![2, 1]);
        assert!(doc.is_mapped());
    }

    #[test]
    fn invalid_weights_are_zeroed() {
        let tax = taxonomy();
        let doc = CorpusDocument::new("a", "security", f64::NAN, DocumentClass::Note, &tax);
        assert_eq!(doc.weight, 0.0);
        let doc = CorpusDocument::new("b", "security", -1.0, DocumentClass::Note, &tax);
        assert_eq!(doc.weight, 0.0);
    }

    #[test]
    fn coverage_counts_gaps_as_unmapped_units() {
        let tax = taxonomy();
        let intent = Corpus::from_documents(
            CorpusKind::Intent,
            vec![
                CorpusDocument::new("a.md", "security", 0.04, DocumentClass::Specification, &tax),
                CorpusDocument::new("b.md", "nothing here", 0.04, DocumentClass::Specification, &tax),
            ],
        )
        .with_gaps(1);
        let reality = Corpus::from_documents(
            CorpusKind::Reality,
            vec![CorpusDocument::new("c1", "speed up", 1.0, DocumentClass::Commit, &tax)],
        );
        let coverage = ContentCoverage::from_corpora(&intent, &reality);
        assert_eq!(coverage, ContentCoverage { mapped: 2, total: 4 });
        assert_eq!(coverage.ratio(), 0.5);
        assert_eq!(ContentCoverage::default().ratio(), 0.0);
    }

    #[test]
    fn newest_signal_only_considers_matching_documents() {
        let tax = taxonomy();
        let old = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).single().expect("valid date");
        let new = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).single().expect("valid date");
        let corpus = Corpus::from_documents(
            CorpusKind::Reality,
            vec![
                CorpusDocument::new("c1", "security", 1.0, DocumentClass::Commit, &tax)
                    .with_timestamp(old),
                CorpusDocument::new("c2", "speed", 1.0, DocumentClass::Commit, &tax)
                    .with_timestamp(new),
            ],
        );
        assert_eq!(corpus.newest_signal(0), Some(old));
        assert_eq!(corpus.newest_signal(1), Some(new));
        assert_eq!(corpus.newest_timestamp(), Some(new));
    }

    #[test]
    fn digest_changes_with_content() {
        let tax = taxonomy();
        let a = Corpus::from_documents(
            CorpusKind::Intent,
            vec![CorpusDocument::new("a.md", "security", 0.04, DocumentClass::Specification, &tax)],
        );
        let b = a.clone();
        assert_eq!(a.digest(), b.digest());
        let c = Corpus::from_documents(
            CorpusKind::Intent,
            vec![CorpusDocument::new("a.md", "speed", 0.04, DocumentClass::Specification, &tax)],
        );
        assert_ne!(a.digest(), c.digest());
    }
}
