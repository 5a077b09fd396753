//! Hypervisor management API client

use std::fmt;

use async_trait::async_trait;
use reqwest::Client;
use reqwest::header::{COOKIE, HeaderValue};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info, instrument};
use url::Url;

use crate::error::{ClientError, Result};
use crate::http::{CONTROL_TIMEOUT, build_client, check_status, extract_data};
use crate::traits::ManagementApi;

/// Short-lived credentials returned by a successful login
#[derive(Clone, PartialEq, Eq, Deserialize)]
pub struct AuthSession {
    /// Session ticket, sent as the auth cookie
    pub ticket: String,
    /// Anti-forgery token required by write calls
    #[serde(rename = "CSRFPreventionToken")]
    pub csrf_token: String,
}

impl fmt::Debug for AuthSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthSession")
            .field("ticket", &"<redacted>")
            .field("csrf_token", &"<redacted>")
            .finish()
    }
}

#[derive(Deserialize)]
struct TicketEnvelope {
    data: Option<AuthSession>,
}

/// Authenticated client for one hypervisor host
#[derive(Debug, Clone)]
pub struct PveClient {
    client: Client,
    base_url: Url,
    session: AuthSession,
}

/// API root for a host
///
/// # Errors
/// Returns an error if the address does not form a valid URL.
pub fn api_root(address: &str, port: u16) -> Result<Url> {
    let root = Url::parse(&format!("https://{address}:{port}/api2/json/"))?;
    Ok(root)
}

impl PveClient {
    /// Authenticate against a host and return a client holding the session
    ///
    /// # Errors
    /// Returns `ClientError::Auth` if the credentials are rejected, or a
    /// transport error if the host cannot be reached.
    ///
    /// # Example
    /// ```no_run
    /// # use infrascan_client::PveClient;
    /// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
    /// let client = PveClient::login("192.168.1.10", 8006, "root@pam", "secret", true).await?;
    /// # Ok(())
    /// # }
    /// ```
    #[instrument(skip(password), fields(host = %address))]
    pub async fn login(
        address: &str,
        port: u16,
        username: &str,
        password: &str,
        accept_invalid_certs: bool,
    ) -> Result<Self> {
        let client = build_client(accept_invalid_certs)?;
        let base_url = api_root(address, port)?;
        let url = base_url.join("access/ticket")?;

        let response = client
            .post(url)
            .form(&[("username", username), ("password", password)])
            .timeout(CONTROL_TIMEOUT)
            .send()
            .await?;

        let response = match check_status(response).await {
            Ok(response) => response,
            Err(ClientError::Api { status, message }) => {
                return Err(ClientError::Auth(format!("HTTP {status}: {message}")));
            }
            Err(e) => return Err(e),
        };

        let envelope: TicketEnvelope = response.json().await?;
        let session = envelope
            .data
            .ok_or_else(|| ClientError::Auth("login response carried no ticket".to_string()))?;

        info!(user = %username, "authenticated against management API");

        Ok(Self::with_session(client, base_url, session))
    }

    /// Wrap an existing session
    #[must_use]
    pub fn with_session(client: Client, base_url: Url, session: AuthSession) -> Self {
        Self {
            client,
            base_url,
            session,
        }
    }

    /// The session this client authenticates with
    #[must_use]
    pub fn session(&self) -> &AuthSession {
        &self.session
    }

    /// Build the URL for an API path such as `/nodes/pve/network`
    fn url(&self, path: &str) -> Result<Url> {
        self.base_url
            .join(path.trim_start_matches('/'))
            .map_err(ClientError::Url)
    }

    fn auth_cookie(&self) -> Result<HeaderValue> {
        HeaderValue::from_str(&format!("PVEAuthCookie={}", self.session.ticket))
            .map_err(|e| ClientError::InvalidResponse(format!("unusable ticket: {e}")))
    }
}

#[async_trait]
impl ManagementApi for PveClient {
    #[instrument(skip(self), level = "debug")]
    async fn get(&self, path: &str) -> Result<Value> {
        let url = self.url(path)?;
        let response = self
            .client
            .get(url)
            .header(COOKIE, self.auth_cookie()?)
            .timeout(CONTROL_TIMEOUT)
            .send()
            .await?;
        let response = check_status(response).await?;
        let body: Value = response.json().await?;

        debug!(path = %path, "management API call completed");

        extract_data(body)
    }
}
