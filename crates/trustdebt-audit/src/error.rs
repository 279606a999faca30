use trustdebt_corpus::SourceError;
use trustdebt_kernel::ConfigurationError;

/// Failures that stop an analysis. Everything recoverable is a
/// [`Warning`](crate::Warning) instead.
#[derive(Debug, thiserror::Error)]
pub enum AnalysisError {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    #[error("source history unavailable: {0}")]
    Source(#[from] SourceError),
}

#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("cache i/o error at {path}: {message}")]
    Io { path: String, message: String },

    #[error("cache entry at {path} is unreadable: {message}")]
    Decode { path: String, message: String },

    #[error("failed to encode cache entry: {0}")]
    Encode(#[source] serde_json::Error),
}
