//! Configuration loading
//!
//! The file is looked up in this order: `--config`, `INFRASCAN_CONFIG`,
//! `./infrascan.toml`, `/etc/infrascan/infrascan.toml`, then the user config
//! directory.

use std::path::{Path, PathBuf};

use infrascan_core::{ConfigProvider, CoreError, ScanConfig};
use serde::{Deserialize, Serialize};

/// Top-level configuration for the infrascan binary
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Log level used when `RUST_LOG` is not set
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub store: StoreConfig,
    /// Targets, credentials and options of a run
    #[serde(flatten)]
    pub scan: ScanConfig,
}

/// Where run documents are written
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default = "default_store_dir")]
    pub dir: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            dir: default_store_dir(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_store_dir() -> PathBuf {
    dirs::data_dir()
        .map(|p| p.join("infrascan"))
        .unwrap_or_else(|| PathBuf::from("infrascan-data"))
}

impl AppConfig {
    /// Load configuration from file
    ///
    /// # Errors
    /// Returns error if the file cannot be read, parsed or validated
    pub fn load(path: &Path) -> eyre::Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| eyre::eyre!("cannot read {}: {e}", path.display()))?;
        Self::load_from_str(&content)
    }

    /// Parse and validate configuration from a string
    pub fn load_from_str(s: &str) -> eyre::Result<Self> {
        let config: AppConfig = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from an explicit path or the first default location that exists
    pub fn load_default(explicit: Option<&Path>) -> eyre::Result<Self> {
        if let Some(path) = explicit {
            return Self::load(path);
        }

        if let Ok(path) = std::env::var("INFRASCAN_CONFIG") {
            return Self::load(&PathBuf::from(path));
        }

        let mut paths = vec![
            PathBuf::from("infrascan.toml"),
            PathBuf::from("/etc/infrascan/infrascan.toml"),
        ];
        if let Some(dir) = dirs::config_dir() {
            paths.push(dir.join("infrascan/infrascan.toml"));
        }

        for path in &paths {
            if path.exists() {
                return Self::load(path);
            }
        }

        eyre::bail!(
            "no configuration file found (tried {})",
            paths
                .iter()
                .map(|p| p.display().to_string())
                .collect::<Vec<_>>()
                .join(", ")
        )
    }

    fn validate(&self) -> eyre::Result<()> {
        eyre::ensure!(
            !self.scan.ssh.username.is_empty(),
            "ssh.username must be non-empty"
        );
        eyre::ensure!(
            self.scan.ssh.timeout_secs > 0,
            "ssh.timeout_secs must be > 0, got {}",
            self.scan.ssh.timeout_secs
        );
        eyre::ensure!(
            self.scan.options.max_parallel_hosts > 0,
            "options.max_parallel_hosts must be > 0, got {}",
            self.scan.options.max_parallel_hosts
        );
        eyre::ensure!(
            self.scan.options.max_old_scans > 0,
            "options.max_old_scans must be > 0, got {}",
            self.scan.options.max_old_scans
        );
        for host in &self.scan.hypervisors {
            eyre::ensure!(
                !host.address.is_empty() && !host.user.is_empty(),
                "every hypervisor needs an address and a user"
            );
        }
        for hub in &self.scan.hubs {
            eyre::ensure!(!hub.address.is_empty(), "every hub needs an address");
        }
        Ok(())
    }
}

impl ConfigProvider for AppConfig {
    fn load_config(&self) -> Result<ScanConfig, CoreError> {
        self.validate()
            .map_err(|e| CoreError::Config(e.to_string()))?;
        Ok(self.scan.clone())
    }
}
