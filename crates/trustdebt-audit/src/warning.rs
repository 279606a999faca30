use serde::{Deserialize, Serialize};
use trustdebt_kernel::{CategoryDesignError, CorpusGapError};

/// A recovered condition attached to an analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, thiserror::Error)]
#[serde(tag = "warning", rename_all = "snake_case")]
pub enum Warning {
    #[error("{0}")]
    CategoryDesign(CategoryDesignError),

    #[error("{0}")]
    CorpusGap(CorpusGapError),
}

impl Warning {
    pub fn is_gap(&self) -> bool {
        matches!(self, Self::CorpusGap(_))
    }
}
