//! infrascan
//!
//! Point-in-time inventory of hypervisor hosts, their guests, container
//! workloads and smart-home hub add-ons. One invocation performs one run.
//!
//! Exit status: 0 when the run recorded no errors, 1 when it recorded at
//! least one, 2 when the run itself could not be carried out.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use infrascan_core::{MemorySink, ResultSink, ScanOrchestrator, ScanReport};
use tracing_subscriber::EnvFilter;

mod config;
mod factory;
mod store;

use config::AppConfig;
use factory::DefaultBackend;
use store::JsonRunStore;

#[derive(Parser)]
#[command(name = "infrascan")]
#[command(about = "Infrastructure inventory scanner", long_about = None)]
struct Cli {
    /// Configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Directory for run documents, overrides `store.dir`
    #[arg(long, env = "INFRASCAN_STORE")]
    store: Option<PathBuf>,

    /// Emit logs as JSON lines
    #[arg(long)]
    log_json: bool,

    /// Scan everything but keep results in memory only
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli).await {
        Ok(report) if report.run.has_errors() => ExitCode::from(1),
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e:?}");
            ExitCode::from(2)
        }
    }
}

async fn run(cli: Cli) -> color_eyre::Result<ScanReport> {
    color_eyre::install()?;

    let config = AppConfig::load_default(cli.config.as_deref())?;
    init_tracing(&config.log_level, cli.log_json);

    let sink: Arc<dyn ResultSink> = if cli.dry_run {
        tracing::info!("dry run, results are not stored");
        Arc::new(MemorySink::new())
    } else {
        let dir = cli.store.unwrap_or_else(|| config.store.dir.clone());
        Arc::new(JsonRunStore::new(dir))
    };

    let orchestrator = ScanOrchestrator::new(Arc::new(DefaultBackend::new()), sink);
    let report = orchestrator.run(&config).await?;

    let counts = report.counts();
    println!(
        "run {}: {} hosts, {} vms, {} containers, {} workloads, {} errors in {}s",
        report.run.id,
        counts.hosts,
        counts.vms,
        counts.containers,
        counts.workloads,
        counts.errors,
        report.run.duration_secs.unwrap_or(0)
    );

    Ok(report)
}

/// `RUST_LOG` wins over the configured level
fn init_tracing(level: &str, json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    if json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}
