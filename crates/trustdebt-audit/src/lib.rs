//! End-to-end Trust Debt analysis.
//!
//! [`Analyzer`] wires the corpus extractor to the kernel and returns an
//! [`Analysis`]: the drift result, the Process Health report, and every
//! recovered problem as a [`Warning`]. Only configuration errors abort.
//!
//! [`Timeline`] replays the analyzer over a commit range, and
//! [`AnalysisCache`] lets repeated runs over an unchanged tree skip the work.

pub mod cache;
pub mod config;
pub mod error;
pub mod pipeline;
pub mod timeline;
pub mod warning;

pub use cache::{AnalysisCache, CacheKey, DirCache, MemoryCache};
pub use config::{AnalysisConfig, TimelineConfig};
pub use error::{AnalysisError, CacheError};
pub use pipeline::{ANALYSIS_REPORT_KIND, ANALYSIS_REPORT_SCHEMA, Analysis, Analyzer, CorpusStats};
pub use timeline::{
    HistoricalReconstructionGap, Replay, Timeline, TimelineEntry, TimelineSnapshot,
    TrendDirection, TrendSummary,
};
pub use warning::Warning;
