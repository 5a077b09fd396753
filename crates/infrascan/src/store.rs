//! File-backed result sink: one JSON document per run

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use infrascan_api::{RunCounts, RunId, ScanDataset, ScanError, ScanRun};
use infrascan_core::{CoreError, ResultSink};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info};

const PREFIX: &str = "run-";
const SUFFIX: &str = ".json";

/// Contents of `run-<id>.json`
#[derive(Debug, Serialize, Deserialize)]
pub struct RunDocument {
    pub run: ScanRun,
    #[serde(default)]
    pub dataset: ScanDataset,
    #[serde(default)]
    pub errors: Vec<ScanError>,
}

/// Stores runs as pretty-printed JSON documents in a directory
pub struct JsonRunStore {
    dir: PathBuf,
    // serializes id allocation and read-modify-write cycles
    lock: Mutex<()>,
}

impl JsonRunStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            lock: Mutex::new(()),
        }
    }

    fn path(&self, id: RunId) -> PathBuf {
        self.dir.join(format!("{PREFIX}{id}{SUFFIX}"))
    }

    /// Ids of all stored runs, ascending
    pub async fn run_ids(&self) -> Result<Vec<RunId>, CoreError> {
        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(sink_error(&self.dir, &e)),
        };

        let mut ids = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| sink_error(&self.dir, &e))?
        {
            if let Some(id) = parse_file_name(&entry.file_name().to_string_lossy()) {
                ids.push(id);
            }
        }
        ids.sort_unstable();
        Ok(ids)
    }

    /// Read a stored run
    pub async fn load(&self, id: RunId) -> Result<RunDocument, CoreError> {
        let path = self.path(id);
        let bytes = tokio::fs::read(&path)
            .await
            .map_err(|e| sink_error(&path, &e))?;
        serde_json::from_slice(&bytes)
            .map_err(|e| CoreError::Sink(format!("corrupt run document {}: {e}", path.display())))
    }

    async fn save(&self, doc: &RunDocument) -> Result<(), CoreError> {
        let path = self.path(doc.run.id);
        let tmp = path.with_extension("json.tmp");
        let body = serde_json::to_vec_pretty(doc)
            .map_err(|e| CoreError::Sink(format!("cannot encode run {}: {e}", doc.run.id)))?;

        tokio::fs::write(&tmp, body)
            .await
            .map_err(|e| sink_error(&tmp, &e))?;
        tokio::fs::rename(&tmp, &path)
            .await
            .map_err(|e| sink_error(&path, &e))?;

        debug!(path = %path.display(), "run document written");
        Ok(())
    }
}

fn parse_file_name(name: &str) -> Option<RunId> {
    name.strip_prefix(PREFIX)?
        .strip_suffix(SUFFIX)?
        .parse()
        .ok()
        .map(RunId)
}

fn sink_error(path: &Path, e: &std::io::Error) -> CoreError {
    CoreError::Sink(format!("{}: {e}", path.display()))
}

#[async_trait]
impl ResultSink for JsonRunStore {
    async fn begin_run(&self, started_at: DateTime<Utc>) -> Result<RunId, CoreError> {
        let _guard = self.lock.lock().await;

        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| sink_error(&self.dir, &e))?;

        let next = self.run_ids().await?.last().map_or(1, |id| id.0 + 1);
        let id = RunId(next);

        self.save(&RunDocument {
            run: ScanRun::started(id, started_at),
            dataset: ScanDataset::new(),
            errors: Vec::new(),
        })
        .await?;

        info!(run = %id, dir = %self.dir.display(), "run registered");
        Ok(id)
    }

    async fn persist(
        &self,
        run: RunId,
        dataset: &ScanDataset,
        errors: &[ScanError],
        counts: RunCounts,
    ) -> Result<(), CoreError> {
        let _guard = self.lock.lock().await;

        let mut doc = self.load(run).await?;
        doc.dataset = dataset.clone();
        doc.errors = errors.to_vec();
        doc.run.counts = counts;
        self.save(&doc).await
    }

    async fn finalize(&self, run: &ScanRun) -> Result<(), CoreError> {
        let _guard = self.lock.lock().await;

        let mut doc = self.load(run.id).await?;
        doc.run = run.clone();
        self.save(&doc).await
    }

    async fn enforce_retention(&self, keep: usize) -> Result<usize, CoreError> {
        let _guard = self.lock.lock().await;

        let ids = self.run_ids().await?;
        let excess = ids.len().saturating_sub(keep);

        for id in &ids[..excess] {
            let path = self.path(*id);
            tokio::fs::remove_file(&path)
                .await
                .map_err(|e| sink_error(&path, &e))?;
            debug!(run = %id, "run document removed");
        }

        Ok(excess)
    }
}
