//! Nextworld client: token exchange and latest automated test results.

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info};

use crate::config::{NextworldSettings, SuiteMatch};
use crate::error::{SyncError, SyncResult, System};
use crate::models::RunnerResult;
use crate::services::http::read_json;

/// Latest results looked up by suite link.
pub const RESULTS_BY_LINK_PATH: &str =
    "/api/automated-testing/v1/test-suites:getLatestResultsForSuitesFromLinks";

/// Latest results looked up by suite name.
pub const RESULTS_BY_NAME_PATH: &str =
    "/api/data/v1/automated-testing/test-suites:getLatestResultsForSuites";

/// Operations the sync needs from the Nextworld test runner.
#[async_trait]
pub trait ResultRunner: Send + Sync {
    /// Re-acquire the access token before the current one expires.
    async fn refresh_token(&mut self) -> SyncResult<()>;

    /// Latest result for each suite key; suites the runner does not know
    /// come back with no status or not at all.
    async fn latest_results(&self, suite_keys: &[String]) -> SyncResult<Vec<RunnerResult>>;
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
}

/// HTTP client for the Nextworld automated testing API.
pub struct NextworldClient {
    http: reqwest::Client,
    base_url: String,
    auth_url: String,
    email: String,
    password: SecretString,
    zone: String,
    suite_match: SuiteMatch,
    token: SecretString,
}

impl NextworldClient {
    /// Build the client and acquire a first access token.
    pub async fn authenticate(
        http: reqwest::Client,
        settings: &NextworldSettings,
    ) -> SyncResult<Self> {
        let missing =
            |what: &str| SyncError::auth(System::Nextworld, format!("{} not configured", what));

        let mut client = NextworldClient {
            base_url: settings.url.clone().ok_or_else(|| missing("URL"))?,
            auth_url: settings.auth_url.clone(),
            email: settings.email.clone().ok_or_else(|| missing("email"))?,
            password: settings.password.clone().ok_or_else(|| missing("password"))?,
            zone: settings.zone.clone().ok_or_else(|| missing("zone"))?,
            suite_match: settings.suite_match,
            token: SecretString::from(String::new()),
            http,
        };

        client.token = client.request_token().await?;
        info!("Authenticated with Nextworld (zone={})", client.zone);

        Ok(client)
    }

    async fn request_token(&self) -> SyncResult<SecretString> {
        let response = self
            .http
            .post(&self.auth_url)
            .basic_auth(&self.email, Some(self.password.expose_secret()))
            .header("Accept", "application/json")
            .json(&json!({ "Zone": self.zone }))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SyncError::auth(
                System::Nextworld,
                format!(
                    "status {}: {}. Check credentials and network connection, \
                     and that two factor authentication is disabled for the user",
                    status, body
                ),
            ));
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| SyncError::auth(System::Nextworld, e.to_string()))?;

        token
            .access_token
            .filter(|t| !t.is_empty())
            .map(SecretString::from)
            .ok_or_else(|| SyncError::auth(System::Nextworld, "no access_token in response"))
    }
}

/// Endpoint path and request body for a results lookup.
pub fn results_request(
    suite_match: SuiteMatch,
    suite_keys: &[String],
) -> (&'static str, serde_json::Value) {
    match suite_match {
        SuiteMatch::Link => (RESULTS_BY_LINK_PATH, json!({ "testSuiteLinks": suite_keys })),
        SuiteMatch::Name => (RESULTS_BY_NAME_PATH, json!({ "testSuiteNames": suite_keys })),
    }
}

#[async_trait]
impl ResultRunner for NextworldClient {
    async fn refresh_token(&mut self) -> SyncResult<()> {
        self.token = self.request_token().await?;
        debug!("Refreshed Nextworld access token");
        Ok(())
    }

    async fn latest_results(&self, suite_keys: &[String]) -> SyncResult<Vec<RunnerResult>> {
        if suite_keys.is_empty() {
            return Ok(Vec::new());
        }

        let (path, body) = results_request(self.suite_match, suite_keys);
        let response = self
            .http
            .post(format!("{}{}", self.base_url, path))
            .bearer_auth(self.token.expose_secret())
            .header("Accept", "application/json")
            .json(&body)
            .send()
            .await?;

        let results: Vec<RunnerResult> = read_json(System::Nextworld, response).await?;
        debug!(
            "Nextworld returned {} results for {} suites",
            results.len(),
            suite_keys.len()
        );
        Ok(results)
    }
}
