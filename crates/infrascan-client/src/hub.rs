//! Smart-home hub REST client

use std::fmt;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::{debug, instrument};
use url::Url;

use crate::error::{ClientError, Result};
use crate::http::{BULK_TIMEOUT, CONTROL_TIMEOUT, build_client, check_status};
use crate::traits::HubApi;

/// Subset of the hub's `/api/config` object
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct HubInstanceConfig {
    #[serde(default)]
    pub location_name: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
}

/// One entry of the hub's `/api/states` listing
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct HubEntityState {
    pub entity_id: String,
    #[serde(default)]
    pub state: String,
    #[serde(default)]
    pub attributes: Map<String, Value>,
}

impl HubEntityState {
    /// String attribute, if present and a string
    #[must_use]
    pub fn attr_str(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).and_then(Value::as_str)
    }
}

/// Bearer-token client for one hub
#[derive(Clone)]
pub struct HubClient {
    client: Client,
    base_url: Url,
    token: String,
}

impl fmt::Debug for HubClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HubClient")
            .field("base_url", &self.base_url.as_str())
            .finish_non_exhaustive()
    }
}

impl HubClient {
    /// Create a client for a hub at `base_url` (e.g. `http://10.0.0.9:8123`)
    ///
    /// # Errors
    /// Returns an error if the base URL is invalid or the TLS backend fails.
    pub fn new(
        base_url: impl AsRef<str>,
        token: impl Into<String>,
        accept_invalid_certs: bool,
    ) -> Result<Self> {
        Ok(Self {
            client: build_client(accept_invalid_certs)?,
            base_url: Url::parse(base_url.as_ref())?,
            token: token.into(),
        })
    }

    fn url(&self, path: &str) -> Result<Url> {
        self.base_url.join(path).map_err(ClientError::Url)
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        timeout: std::time::Duration,
    ) -> Result<T> {
        let url = self.url(path)?;
        let response = self
            .client
            .get(url)
            .bearer_auth(&self.token)
            .timeout(timeout)
            .send()
            .await?;

        let response = match check_status(response).await {
            Ok(response) => response,
            Err(ClientError::Api { status: 401, message }) => {
                return Err(ClientError::Auth(message));
            }
            Err(e) => return Err(e),
        };

        Ok(response.json().await?)
    }
}

#[async_trait]
impl HubApi for HubClient {
    #[instrument(skip(self), fields(hub = %self.base_url))]
    async fn config(&self) -> Result<HubInstanceConfig> {
        self.get_json("/api/config", CONTROL_TIMEOUT).await
    }

    #[instrument(skip(self), fields(hub = %self.base_url))]
    async fn states(&self) -> Result<Vec<HubEntityState>> {
        let states: Vec<HubEntityState> = self.get_json("/api/states", BULK_TIMEOUT).await?;
        debug!(count = states.len(), "fetched hub entity states");
        Ok(states)
    }
}
