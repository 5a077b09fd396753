//! Append-only log of per-target failures within one run

use std::sync::{Mutex, PoisonError};

use infrascan_api::{RunId, ScanComponent, ScanError};
use tracing::warn;

/// Collects `ScanError`s from concurrently running host scans
#[derive(Debug)]
pub struct ErrorLog {
    run: RunId,
    entries: Mutex<Vec<ScanError>>,
}

impl ErrorLog {
    #[must_use]
    pub fn new(run: RunId) -> Self {
        Self {
            run,
            entries: Mutex::new(Vec::new()),
        }
    }

    /// Run the entries belong to
    #[must_use]
    pub fn run(&self) -> RunId {
        self.run
    }

    /// Append an entry
    pub fn record(&self, host: Option<&str>, component: ScanComponent, message: impl Into<String>) {
        self.push(ScanError::new(
            self.run,
            host.map(str::to_string),
            component,
            message,
        ));
    }

    /// Append an entry carrying the offending input
    pub fn record_with_detail(
        &self,
        host: Option<&str>,
        component: ScanComponent,
        message: impl Into<String>,
        detail: impl Into<String>,
    ) {
        self.push(
            ScanError::new(self.run, host.map(str::to_string), component, message)
                .with_detail(detail),
        );
    }

    fn push(&self, entry: ScanError) {
        warn!(
            host = entry.host_address.as_deref().unwrap_or("-"),
            component = %entry.component,
            "{}",
            entry.message
        );
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(entry);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copy of all entries in insertion order
    #[must_use]
    pub fn snapshot(&self) -> Vec<ScanError> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}
