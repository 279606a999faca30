//! Commit windows: which part of history forms the reality corpus.

use crate::source::SourceError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// `from` is exclusive, `to` inclusive. Missing ends mean the start or the
/// tip of history.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommitRange {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to: Option<String>,
}

impl CommitRange {
    pub fn new(from: Option<&str>, to: Option<&str>) -> Self {
        Self {
            from: from.map(ToOwned::to_owned),
            to: to.map(ToOwned::to_owned),
        }
    }

    /// Same start, ending at `commit`.
    pub fn ending_at(&self, commit: &str) -> Self {
        Self {
            from: self.from.clone(),
            to: Some(commit.to_string()),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "window", rename_all = "snake_case")]
pub enum Window {
    #[default]
    All,
    Range(CommitRange),
    Since {
        since: DateTime<Utc>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        until: Option<DateTime<Utc>>,
    },
    Last {
        count: usize,
    },
}

impl Window {
    /// Canonical text form, used in cache keys.
    pub fn describe(&self) -> String {
        match self {
            Self::All => "all".to_string(),
            Self::Range(range) => format!(
                "range:{}..{}",
                range.from.as_deref().unwrap_or(""),
                range.to.as_deref().unwrap_or("")
            ),
            Self::Since { since, until } => format!(
                "since:{}..{}",
                since.to_rfc3339(),
                until.map(|u| u.to_rfc3339()).unwrap_or_default()
            ),
            Self::Last { count } => format!("last:{count}"),
        }
    }

    /// Select from an oldest-first history of `(id, timestamp)` pairs.
    pub fn select<'a>(
        &self,
        history: &'a [(String, Option<DateTime<Utc>>)],
    ) -> Result<Vec<&'a str>, SourceError> {
        let ids = |slice: &'a [(String, Option<DateTime<Utc>>)]| {
            slice.iter().map(|(id, _)| id.as_str()).collect::<Vec<_>>()
        };
        match self {
            Self::All => Ok(ids(history)),
            Self::Range(range) => {
                let position = |id: &str| {
                    history
                        .iter()
                        .position(|(candidate, _)| candidate == id)
                        .ok_or_else(|| SourceError::UnknownRevision(id.to_string()))
                };
                let start = match range.from.as_deref() {
                    Some(from) => position(from)? + 1,
                    None => 0,
                };
                let end = match range.to.as_deref() {
                    Some(to) => position(to)? + 1,
                    None => history.len(),
                };
                if start >= end {
                    return Ok(Vec::new());
                }
                Ok(ids(&history[start..end]))
            }
            Self::Since { since, until } => Ok(history
                .iter()
                .filter(|(_, timestamp)| {
                    timestamp.is_some_and(|t| t >= *since && until.is_none_or(|u| t <= u))
                })
                .map(|(id, _)| id.as_str())
                .collect()),
            Self::Last { count } => {
                let start = history.len().saturating_sub(*count);
                Ok(ids(&history[start..]))
            }
        }
    }
}
