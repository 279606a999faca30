//! # Trust Debt Kernel
//!
//! Measures how far a project's committed reality has drifted from its
//! documented intent, and audits whether that measurement deserves trust.
//!
//! The kernel is **source-agnostic**: it never reads files or talks to a
//! version-control system. It receives already-extracted corpora and turns
//! their keyword signal into a score.
//!
//! ## Architecture
//!
//! ```text
//! Taxonomy              ← Categories in ShortLex order, flat arena + parent indices
//!     │
//! Corpus (intent, reality)  ← Weighted documents with per-category keyword hits
//!     │
//! Matrix                ← N×N cells {intentWeight, realityWeight}, index i*N+j
//!     ├──────────────────────────────┐
//! drift::calculate      health::validate      ← independent readers of the matrix
//!     │                              │
//! TrustDebtResult + Grade    ProcessHealthReport + Legitimacy
//! ```

pub mod corpus;
pub mod correlation;
pub mod decay;
pub mod drift;
pub mod error;
pub mod grade;
pub mod hash;
pub mod health;
pub mod matrix;
pub mod order;
pub mod taxonomy;
pub mod terms;

pub use corpus::{ContentCoverage, Corpus, CorpusDocument, CorpusKind, DocumentClass};
pub use correlation::{CorrelationMatrix, DEFAULT_CORRELATION_THRESHOLD};
pub use decay::{DecayModel, TimeMeta};
pub use drift::{CategoryWeights, DriftConfig, PairWeight, TrustDebtResult};
pub use error::{CategoryDesignError, ConfigurationError, CorpusGapError, CorrelatedPair};
pub use grade::{GRADE_BANDS, Grade, GradeBand};
pub use hash::{ContentHash, ContentHashBuilder};
pub use health::{Legitimacy, ProcessHealthReport};
pub use matrix::{Cell, Matrix, Triangle};
pub use order::shortlex_cmp;
pub use taxonomy::{Category, CategoryDefinition, CategoryId, Taxonomy, TaxonomyDefinition};
pub use terms::Vocabulary;
