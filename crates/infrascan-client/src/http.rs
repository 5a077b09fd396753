//! Shared HTTP plumbing for both API clients

use std::time::Duration;

use reqwest::{Client, Response};
use serde_json::{Map, Value};

use crate::error::{ClientError, Result};

/// Deadline for ordinary control calls
pub const CONTROL_TIMEOUT: Duration = Duration::from_secs(15);

/// Deadline for bulk state retrieval
pub const BULK_TIMEOUT: Duration = Duration::from_secs(30);

/// Build a `reqwest::Client`
///
/// With `accept_invalid_certs` the client trusts any server certificate. The
/// management endpoints this talks to use self-signed certificates on a
/// private network.
///
/// # Errors
/// Returns an error if the TLS backend cannot be initialised.
pub fn build_client(accept_invalid_certs: bool) -> Result<Client> {
    Client::builder()
        .danger_accept_invalid_certs(accept_invalid_certs)
        .connect_timeout(CONTROL_TIMEOUT)
        .build()
        .map_err(ClientError::from)
}

/// Turn a non-2xx response into `ClientError::Api`
pub(crate) async fn check_status(response: Response) -> Result<Response> {
    if response.status().is_success() {
        return Ok(response);
    }
    let status = response.status().as_u16();
    let message = response.text().await.unwrap_or_default();
    Err(ClientError::Api { status, message })
}

/// Extract the `data` member of a management API envelope
///
/// A missing or null `data` member yields an empty object.
///
/// # Errors
/// Returns `ClientError::InvalidResponse` if the body is not a JSON object.
pub fn extract_data(body: Value) -> Result<Value> {
    match body {
        Value::Object(mut envelope) => Ok(envelope
            .remove("data")
            .filter(|v| !v.is_null())
            .unwrap_or_else(|| Value::Object(Map::new()))),
        other => Err(ClientError::InvalidResponse(format!(
            "expected JSON object envelope, got {}",
            type_name(&other)
        ))),
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_extract_data_member() {
        let data = extract_data(json!({"data": [{"node": "pve"}]})).unwrap();
        assert_eq!(data, json!([{"node": "pve"}]));
    }

    #[test]
    fn test_missing_data_defaults_to_empty_object() {
        assert_eq!(extract_data(json!({})).unwrap(), json!({}));
        assert_eq!(extract_data(json!({"data": null})).unwrap(), json!({}));
    }

    #[test]
    fn test_non_object_envelope_is_rejected() {
        let err = extract_data(json!([1, 2])).unwrap_err();
        assert!(matches!(err, ClientError::InvalidResponse(msg) if msg.contains("array")));
    }

    #[test]
    fn test_build_client() {
        assert!(build_client(true).is_ok());
        assert!(build_client(false).is_ok());
    }
}
