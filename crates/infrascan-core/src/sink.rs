//! Result persistence interface

use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use infrascan_api::{RunCounts, RunId, ScanDataset, ScanError, ScanRun};

use crate::error::CoreError;

/// Receives the results of scan runs
#[async_trait]
pub trait ResultSink: Send + Sync {
    /// Register a new run and return its id
    async fn begin_run(&self, started_at: DateTime<Utc>) -> Result<RunId, CoreError>;

    /// Store the records and errors of a run
    async fn persist(
        &self,
        run: RunId,
        dataset: &ScanDataset,
        errors: &[ScanError],
        counts: RunCounts,
    ) -> Result<(), CoreError>;

    /// Mark a run complete
    async fn finalize(&self, run: &ScanRun) -> Result<(), CoreError>;

    /// Drop all but the `keep` newest runs and return how many were removed
    async fn enforce_retention(&self, keep: usize) -> Result<usize, CoreError>;
}

/// A stored run
#[derive(Debug, Clone)]
pub struct StoredRun {
    pub run: ScanRun,
    pub dataset: ScanDataset,
    pub errors: Vec<ScanError>,
}

/// Keeps runs in memory, for dry runs and tests
#[derive(Debug, Default)]
pub struct MemorySink {
    runs: Mutex<Vec<StoredRun>>,
}

impl MemorySink {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// All stored runs, oldest first
    #[must_use]
    pub fn runs(&self) -> Vec<StoredRun> {
        self.lock().clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<StoredRun>> {
        self.runs
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn with_run(&self, id: RunId, f: impl FnOnce(&mut StoredRun)) -> Result<(), CoreError> {
        let mut runs = self.lock();
        let stored = runs
            .iter_mut()
            .find(|r| r.run.id == id)
            .ok_or_else(|| CoreError::Sink(format!("unknown run {id}")))?;
        f(stored);
        Ok(())
    }
}

#[async_trait]
impl ResultSink for MemorySink {
    async fn begin_run(&self, started_at: DateTime<Utc>) -> Result<RunId, CoreError> {
        let mut runs = self.lock();
        let next = runs.iter().map(|r| r.run.id.0).max().unwrap_or(0) + 1;
        let id = RunId(next);
        runs.push(StoredRun {
            run: ScanRun::started(id, started_at),
            dataset: ScanDataset::new(),
            errors: Vec::new(),
        });
        Ok(id)
    }

    async fn persist(
        &self,
        run: RunId,
        dataset: &ScanDataset,
        errors: &[ScanError],
        counts: RunCounts,
    ) -> Result<(), CoreError> {
        self.with_run(run, |stored| {
            stored.dataset = dataset.clone();
            stored.errors = errors.to_vec();
            stored.run.counts = counts;
        })
    }

    async fn finalize(&self, run: &ScanRun) -> Result<(), CoreError> {
        self.with_run(run.id, |stored| stored.run = run.clone())
    }

    async fn enforce_retention(&self, keep: usize) -> Result<usize, CoreError> {
        let mut runs = self.lock();
        let excess = runs.len().saturating_sub(keep);
        runs.drain(..excess);
        Ok(excess)
    }
}
