//! Scan run bookkeeping

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Identifier of one orchestration pass, allocated by the result sink
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(pub u64);

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle of a scan run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Running,
    Completed,
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunStatus::Running => write!(f, "running"),
            RunStatus::Completed => write!(f, "completed"),
        }
    }
}

/// Per-category record counts of a run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunCounts {
    /// Hypervisor hosts with a snapshot
    pub hosts: usize,
    /// Virtual machines
    pub vms: usize,
    /// OS-level container guests
    pub containers: usize,
    /// Container-engine workloads and hub add-ons
    pub workloads: usize,
    /// Recorded scan errors
    pub errors: usize,
}

/// One orchestration pass
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanRun {
    pub id: RunId,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub status: RunStatus,
    pub counts: RunCounts,
    /// Wall-clock duration in whole seconds, set once the run is finalized
    pub duration_secs: Option<u64>,
}

impl ScanRun {
    /// A run that has just begun
    #[must_use]
    pub fn started(id: RunId, started_at: DateTime<Utc>) -> Self {
        Self {
            id,
            started_at,
            finished_at: None,
            status: RunStatus::Running,
            counts: RunCounts::default(),
            duration_secs: None,
        }
    }

    /// Finalize the run with its counts
    ///
    /// The status is `completed` regardless of how many errors were recorded.
    #[must_use]
    pub fn complete(self, finished_at: DateTime<Utc>, counts: RunCounts) -> Self {
        let duration_secs = (finished_at - self.started_at).num_seconds().max(0);
        Self {
            finished_at: Some(finished_at),
            status: RunStatus::Completed,
            counts,
            duration_secs: Some(duration_secs.unsigned_abs()),
            ..self
        }
    }

    /// Whether any scan error was recorded during this run
    #[must_use]
    pub fn has_errors(&self) -> bool {
        self.counts.errors > 0
    }
}
