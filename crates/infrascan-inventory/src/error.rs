//! Error types for infrascan-inventory

use infrascan_client::ClientError;
use infrascan_exec::ChainError;
use thiserror::Error;

/// Problems found while collecting a container inventory
///
/// None of these abort the collection; they are reported next to the
/// workloads that could be collected.
#[derive(Error, Debug, Clone)]
pub enum InventoryError {
    /// No login could run a command on the target
    #[error(transparent)]
    Unreachable(#[from] ChainError),

    /// One line of the container listing was not a valid JSON object
    #[error("failed to parse container listing from {host}: {reason}")]
    MalformedLine {
        /// Target address
        host: String,
        /// The offending line
        line: String,
        /// Parser message
        reason: String,
    },
}

impl InventoryError {
    /// The raw input associated with the problem, if any
    #[must_use]
    pub fn detail(&self) -> Option<&str> {
        match self {
            InventoryError::Unreachable(_) => None,
            InventoryError::MalformedLine { line, .. } => Some(line),
        }
    }
}

/// A hub call failed; the hub contributes nothing to the run
#[derive(Error, Debug)]
pub enum HubCollectError {
    /// Configuration object could not be fetched
    #[error("hub config request to {address} failed: {source}")]
    Config {
        address: String,
        #[source]
        source: ClientError,
    },

    /// Entity state listing could not be fetched
    #[error("hub states request to {address} failed: {source}")]
    States {
        address: String,
        #[source]
        source: ClientError,
    },
}
