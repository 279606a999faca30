//! Historical replay: the whole pipeline at each commit of a range.
//!
//! Each snapshot checks out the tree at a commit and analyzes it with the
//! reality window running from the range start to that commit. Commits that
//! cannot be checked out, or that time out in a parallel replay, become gap
//! entries and never stop the replay.

use crate::error::AnalysisError;
use crate::pipeline::Analyzer;
use crate::warning::Warning;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::num::NonZeroUsize;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread;
use std::time::Instant;
use tracing::{debug, info, warn};
use trustdebt_corpus::{CommitRange, SourceTree, Window};
use trustdebt_kernel::{Grade, ProcessHealthReport, Taxonomy, TrustDebtResult};

/// Relative change in total units treated as no change.
pub const STABLE_BAND: f64 = 0.05;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[serde(rename_all = "camelCase")]
#[error("commit `{commit_id}` could not be reconstructed: {reason}")]
pub struct HistoricalReconstructionGap {
    pub commit_id: String,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimelineSnapshot {
    pub commit_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
    pub result: TrustDebtResult,
    pub health: ProcessHealthReport,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<Warning>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "entry", rename_all = "snake_case")]
pub enum TimelineEntry {
    Snapshot(TimelineSnapshot),
    Gap(HistoricalReconstructionGap),
}

impl TimelineEntry {
    pub fn commit_id(&self) -> &str {
        match self {
            Self::Snapshot(snapshot) => &snapshot.commit_id,
            Self::Gap(gap) => &gap.commit_id,
        }
    }

    pub fn as_snapshot(&self) -> Option<&TimelineSnapshot> {
        match self {
            Self::Snapshot(snapshot) => Some(snapshot),
            Self::Gap(_) => None,
        }
    }

    pub fn is_gap(&self) -> bool {
        matches!(self, Self::Gap(_))
    }
}

pub struct Timeline {
    analyzer: Arc<Analyzer>,
}

impl Timeline {
    pub fn new(analyzer: Arc<Analyzer>) -> Self {
        Self { analyzer }
    }

    pub fn analyzer(&self) -> &Analyzer {
        &self.analyzer
    }

    /// Lazy replay over the commits of `range`, oldest first.
    ///
    /// Fails only when the range itself cannot be resolved against the
    /// tree's history.
    pub fn replay<'a>(
        &'a self,
        tree: &'a dyn SourceTree,
        taxonomy: &'a Taxonomy,
        range: &CommitRange,
    ) -> Result<Replay<'a>, AnalysisError> {
        let commits = tree.commit_ids(&Window::Range(range.clone()))?;
        debug!(commits = commits.len(), "planned timeline replay");
        Ok(Replay {
            analyzer: &self.analyzer,
            tree,
            taxonomy,
            range: range.clone(),
            commits: commits.into(),
            position: 0,
        })
    }

    /// Evaluate snapshots concurrently, at most `workers` at a time.
    ///
    /// Each snapshot runs on its own thread and gets the configured timeout
    /// measured from the moment it starts. A snapshot that misses its
    /// deadline is recorded as a gap and releases its slot at once, so the
    /// queue behind it keeps moving; the stalled thread is detached and its
    /// late result discarded. Entries come back in commit order.
    pub fn replay_parallel(
        &self,
        tree: Arc<dyn SourceTree>,
        taxonomy: Arc<Taxonomy>,
        range: &CommitRange,
    ) -> Result<Vec<TimelineEntry>, AnalysisError> {
        let settings = &self.analyzer.config().timeline;
        let commits = tree.commit_ids(&Window::Range(range.clone()))?;
        let workers = match settings.workers {
            0 => thread::available_parallelism().map_or(1, NonZeroUsize::get),
            n => n,
        };
        let timeout = settings.snapshot_timeout();
        debug!(commits = commits.len(), workers, "planned parallel timeline replay");

        let (tx, rx) = mpsc::channel::<(usize, TimelineEntry)>();
        let mut entries: Vec<Option<TimelineEntry>> = vec![None; commits.len()];
        let mut in_flight: BTreeMap<usize, Instant> = BTreeMap::new();
        let mut next = 0;

        loop {
            while in_flight.len() < workers && next < commits.len() {
                let index = next;
                next += 1;
                let job = SnapshotJob {
                    analyzer: Arc::clone(&self.analyzer),
                    tree: Arc::clone(&tree),
                    taxonomy: Arc::clone(&taxonomy),
                    range: range.clone(),
                    commit: commits[index].clone(),
                };
                let tx = tx.clone();
                let spawned = thread::Builder::new()
                    .name(format!("trustdebt-snapshot-{index}"))
                    .spawn(move || {
                        let _ = tx.send((index, job.run()));
                    });
                match spawned {
                    Ok(_) => {
                        in_flight.insert(index, Instant::now() + timeout);
                    }
                    Err(error) => {
                        entries[index] = Some(gap_entry(
                            &commits[index],
                            format!("snapshot worker could not start: {error}"),
                        ));
                    }
                }
            }

            let Some(deadline) = in_flight.values().min().copied() else {
                break;
            };
            match rx.recv_timeout(deadline.saturating_duration_since(Instant::now())) {
                Ok((index, entry)) => {
                    // Absent when the snapshot already timed out.
                    if in_flight.remove(&index).is_some() {
                        entries[index] = Some(entry);
                    }
                }
                Err(RecvTimeoutError::Timeout) => {
                    let now = Instant::now();
                    let expired: Vec<usize> = in_flight
                        .iter()
                        .filter(|&(_, &deadline)| deadline <= now)
                        .map(|(&index, _)| index)
                        .collect();
                    for index in expired {
                        in_flight.remove(&index);
                        warn!(
                            commit = %commits[index],
                            timeout_ms = settings.snapshot_timeout_ms,
                            "snapshot timed out"
                        );
                        entries[index] = Some(gap_entry(
                            &commits[index],
                            format!("timed out after {} ms", settings.snapshot_timeout_ms),
                        ));
                    }
                }
                // `tx` is still held here, so the channel cannot disconnect.
                Err(RecvTimeoutError::Disconnected) => break,
            }
        }

        let entries: Vec<TimelineEntry> = entries
            .into_iter()
            .zip(commits)
            .map(|(entry, commit)| {
                entry.unwrap_or_else(|| {
                    gap_entry(&commit, "snapshot worker exited without a result".to_string())
                })
            })
            .collect();

        info!(
            snapshots = entries.iter().filter(|e| !e.is_gap()).count(),
            gaps = entries.iter().filter(|e| e.is_gap()).count(),
            "timeline replay complete"
        );
        Ok(entries)
    }
}

/// Everything one detached snapshot thread owns.
struct SnapshotJob {
    analyzer: Arc<Analyzer>,
    tree: Arc<dyn SourceTree>,
    taxonomy: Arc<Taxonomy>,
    range: CommitRange,
    commit: String,
}

impl SnapshotJob {
    fn run(self) -> TimelineEntry {
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            snapshot_at(
                &self.analyzer,
                self.tree.as_ref(),
                &self.taxonomy,
                &self.range,
                &self.commit,
            )
        }));
        outcome.unwrap_or_else(|_| gap_entry(&self.commit, "snapshot panicked".to_string()))
    }
}

fn gap_entry(commit: &str, reason: String) -> TimelineEntry {
    TimelineEntry::Gap(HistoricalReconstructionGap {
        commit_id: commit.to_string(),
        reason,
    })
}

/// A finite, restartable replay. Cloning or [`restart`](Self::restart)ing
/// re-derives the same entries.
#[derive(Clone)]
pub struct Replay<'a> {
    analyzer: &'a Analyzer,
    tree: &'a dyn SourceTree,
    taxonomy: &'a Taxonomy,
    range: CommitRange,
    commits: Arc<[String]>,
    position: usize,
}

impl Replay<'_> {
    pub fn commits(&self) -> &[String] {
        &self.commits
    }

    pub fn restart(&mut self) {
        self.position = 0;
    }
}

impl Iterator for Replay<'_> {
    type Item = TimelineEntry;

    fn next(&mut self) -> Option<Self::Item> {
        let commit = self.commits.get(self.position)?;
        self.position += 1;
        Some(snapshot_at(
            self.analyzer,
            self.tree,
            self.taxonomy,
            &self.range,
            commit,
        ))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.commits.len() - self.position;
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for Replay<'_> {}

fn snapshot_at(
    analyzer: &Analyzer,
    tree: &dyn SourceTree,
    taxonomy: &Taxonomy,
    range: &CommitRange,
    commit: &str,
) -> TimelineEntry {
    let gap = |reason: String| {
        warn!(commit, %reason, "historical snapshot unavailable");
        gap_entry(commit, reason)
    };

    let historical = match tree.checkout(commit) {
        Ok(historical) => historical,
        Err(error) => return gap(error.to_string()),
    };
    let timestamp = match historical.read_commit(commit) {
        Ok(record) => record.timestamp,
        Err(error) => return gap(error.to_string()),
    };
    let window = Window::Range(range.ending_at(commit));
    match analyzer.analyze(historical.as_ref(), taxonomy, &window) {
        Ok(analysis) => TimelineEntry::Snapshot(TimelineSnapshot {
            commit_id: commit.to_string(),
            timestamp,
            result: analysis.result,
            health: analysis.health,
            warnings: analysis.warnings,
        }),
        Err(error) => gap(error.to_string()),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrendDirection {
    Improving,
    Degrading,
    Stable,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrendSummary {
    pub first_units: Option<f64>,
    pub last_units: Option<f64>,
    pub delta: Option<f64>,
    pub direction: TrendDirection,
    pub snapshots: usize,
    pub gaps: usize,
    pub worst_grade: Option<Grade>,
}

impl TrendSummary {
    pub fn from_entries(entries: &[TimelineEntry]) -> Self {
        let snapshots: Vec<&TimelineSnapshot> =
            entries.iter().filter_map(TimelineEntry::as_snapshot).collect();
        let first_units = snapshots.first().map(|s| s.result.total_units);
        let last_units = snapshots.last().map(|s| s.result.total_units);
        let delta = first_units.zip(last_units).map(|(first, last)| last - first);

        let direction = match (first_units, delta) {
            (Some(first), Some(delta)) if delta.abs() > STABLE_BAND * first.abs() => {
                if delta < 0.0 {
                    TrendDirection::Improving
                } else {
                    TrendDirection::Degrading
                }
            }
            _ => TrendDirection::Stable,
        };

        Self {
            first_units,
            last_units,
            delta,
            direction,
            snapshots: snapshots.len(),
            gaps: entries.len() - snapshots.len(),
            worst_grade: snapshots.iter().map(|s| s.result.grade).max(),
        }
    }
}
