//! API client traits

use async_trait::async_trait;
use serde_json::Value;

use crate::error::Result;
use crate::hub::{HubEntityState, HubInstanceConfig};

/// Authenticated read access to a hypervisor management API
#[async_trait]
pub trait ManagementApi: Send + Sync {
    /// GET a path relative to the API root (e.g. `/nodes`) and return its `data` member
    async fn get(&self, path: &str) -> Result<Value>;
}

/// Read access to a hub's state API
#[async_trait]
pub trait HubApi: Send + Sync {
    /// Fetch the hub's configuration object
    async fn config(&self) -> Result<HubInstanceConfig>;

    /// Fetch every entity state
    async fn states(&self) -> Result<Vec<HubEntityState>>;
}
