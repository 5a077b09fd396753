//! `ScanOrchestrator`: one complete run
//!
//! Hosts are scanned in batches of `max_parallel_hosts`, then hubs and the
//! local machine. A single failing target never aborts the run; only the
//! configuration source and the result sink can.

use std::net::Ipv4Addr;
use std::sync::Arc;

use chrono::Utc;
use infrascan_api::{RunCounts, ScanComponent, ScanDataset, ScanError, ScanRun};
use infrascan_exec::CredentialChain;
use infrascan_inventory::{HubCollectError, HubCollector};
use tracing::{info, instrument, warn};

use crate::backend::ScanBackend;
use crate::config::{ConfigProvider, HubConfig};
use crate::error::CoreError;
use crate::error_log::ErrorLog;
use crate::scan::ScanContext;
use crate::scan::host::HostScanner;
use crate::sink::ResultSink;

/// Everything a finished run produced
#[derive(Debug, Clone)]
pub struct ScanReport {
    pub run: ScanRun,
    pub dataset: ScanDataset,
    pub errors: Vec<ScanError>,
}

impl ScanReport {
    #[must_use]
    pub fn counts(&self) -> RunCounts {
        self.run.counts
    }
}

/// Drives a run from configuration to persisted results
pub struct ScanOrchestrator {
    backend: Arc<dyn ScanBackend>,
    sink: Arc<dyn ResultSink>,
}

impl ScanOrchestrator {
    #[must_use]
    pub fn new(backend: Arc<dyn ScanBackend>, sink: Arc<dyn ResultSink>) -> Self {
        Self { backend, sink }
    }

    /// Execute one run
    ///
    /// # Errors
    /// Returns `CoreError` if the configuration cannot be loaded or the sink
    /// fails to register, persist or finalize the run. Retention failures are
    /// only logged.
    #[instrument(skip_all)]
    pub async fn run(&self, provider: &dyn ConfigProvider) -> Result<ScanReport, CoreError> {
        let config = Arc::new(provider.load_config()?);
        let started_at = Utc::now();
        let run_id = self.sink.begin_run(started_at).await?;
        let log = Arc::new(ErrorLog::new(run_id));
        let ctx = ScanContext::new(Arc::clone(&self.backend), Arc::clone(&config), log);

        info!(
            run = %run_id,
            hosts = config.hypervisors.len(),
            hubs = config.hubs.len(),
            "scan started"
        );

        let mut dataset = self.scan_hosts(&ctx).await;

        for hub in &config.hubs {
            dataset.merge(scan_hub(&ctx, hub).await);
        }

        if config.options.scan_local_containers {
            dataset.merge(self.scan_local(&ctx).await);
        }

        let errors = ctx.log.snapshot();
        let counts = dataset.counts(errors.len());
        self.sink.persist(run_id, &dataset, &errors, counts).await?;

        let run = ScanRun::started(run_id, started_at).complete(Utc::now(), counts);
        self.sink.finalize(&run).await?;

        info!(
            run = %run_id,
            hosts = counts.hosts,
            vms = counts.vms,
            containers = counts.containers,
            workloads = counts.workloads,
            errors = counts.errors,
            duration_secs = run.duration_secs.unwrap_or(0),
            "scan finished"
        );

        match self
            .sink
            .enforce_retention(config.options.max_old_scans)
            .await
        {
            Ok(0) => {}
            Ok(removed) => info!(removed, "pruned old runs"),
            Err(e) => warn!(error = %e, "failed to prune old runs"),
        }

        Ok(ScanReport {
            run,
            dataset,
            errors,
        })
    }

    /// Scan all hypervisor hosts, batch by batch
    ///
    /// Results are merged in configuration order regardless of completion order.
    async fn scan_hosts(&self, ctx: &ScanContext) -> ScanDataset {
        let mut dataset = ScanDataset::new();
        let batch_size = ctx.config.options.max_parallel_hosts.max(1);

        for batch in ctx.config.hypervisors.chunks(batch_size) {
            let mut handles = Vec::with_capacity(batch.len());

            for host in batch {
                let scanner = HostScanner::new(ctx.clone(), host.clone());
                let handle = tokio::spawn(async move { scanner.scan().await });
                handles.push((host.address.clone(), handle));
            }

            for (address, handle) in handles {
                match handle.await {
                    Ok(host_data) => dataset.merge(host_data),
                    Err(e) => ctx.log.record(
                        Some(&address),
                        ScanComponent::HostScan,
                        format!("host scan of {address} aborted: {e}"),
                    ),
                }
            }
        }

        dataset
    }

    /// Container workloads on the collecting machine
    async fn scan_local(&self, ctx: &ScanContext) -> ScanDataset {
        let address = ctx
            .config
            .options
            .local_address
            .or_else(|| self.backend.local_address())
            .unwrap_or(Ipv4Addr::LOCALHOST)
            .to_string();

        let chain = CredentialChain::new(&address, ctx.config.ssh.timeout())
            .with_candidate("local", self.backend.local_executor());

        let mut dataset = ScanDataset::new();
        dataset.workloads = ctx
            .collect_workloads(&chain, ScanComponent::LocalContainer)
            .await;
        chain.close().await;
        dataset
    }
}

async fn scan_hub(ctx: &ScanContext, hub: &HubConfig) -> ScanDataset {
    let mut dataset = ScanDataset::new();
    let address = hub.address.as_str();

    let client = match ctx
        .backend
        .hub_client(hub, ctx.config.options.trust)
    {
        Ok(client) => client,
        Err(e) => {
            ctx.log.record(
                Some(address),
                ScanComponent::HubConfig,
                format!("invalid hub endpoint {}: {e}", hub.base_url()),
            );
            return dataset;
        }
    };

    match HubCollector::new(client.as_ref(), address).collect().await {
        Ok(workloads) => dataset.workloads = workloads,
        Err(e) => {
            let component = match e {
                HubCollectError::Config { .. } => ScanComponent::HubConfig,
                HubCollectError::States { .. } => ScanComponent::HubStates,
            };
            ctx.log.record(Some(address), component, e.to_string());
        }
    }

    dataset
}
