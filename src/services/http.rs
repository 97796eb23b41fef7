//! Shared HTTP client construction and response handling.

use std::time::Duration;

use serde::de::DeserializeOwned;

use crate::error::{SyncError, SyncResult, System};

/// HTTP connect timeout for all external APIs.
const HTTP_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Build an HTTP client with timeouts.
pub fn build_http_client(timeout_secs: u64) -> SyncResult<reqwest::Client> {
    reqwest::Client::builder()
        .connect_timeout(HTTP_CONNECT_TIMEOUT)
        .timeout(Duration::from_secs(timeout_secs.max(1)))
        .user_agent(concat!("xray-sync/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| SyncError::Http(format!("Failed to build HTTP client: {}", e)))
}

/// Fail with an `Api` error unless the response status is a success.
pub async fn ensure_success(
    system: System,
    response: reqwest::Response,
) -> SyncResult<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(SyncError::api(system, status, body))
}

/// Decode a successful JSON response.
pub async fn read_json<T: DeserializeOwned>(
    system: System,
    response: reqwest::Response,
) -> SyncResult<T> {
    let response = ensure_success(system, response).await?;
    let bytes = response.bytes().await?;
    serde_json::from_slice(&bytes).map_err(|e| SyncError::decode(system, e))
}
