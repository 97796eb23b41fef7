//! Jira client: release epic search and epic test summary updates.

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use crate::config::JiraSettings;
use crate::error::{SyncError, SyncResult, System};
use crate::models::Epic;
use crate::services::http::{ensure_success, read_json};

/// Upper bound on epics returned by the release search.
pub const MAX_EPIC_RESULTS: u32 = 500;

/// Quote a value as a JQL string literal.
pub fn quote_jql(value: &str) -> String {
    let escaped = value.replace('\\', "\\\\").replace('"', "\\\"");
    format!("\"{}\"", escaped)
}

/// Filter selecting the open epics of a release.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JqlFilter {
    pub projects: Vec<String>,
    pub fix_version: String,
}

impl JqlFilter {
    pub fn open_epics(projects: &[String], fix_version: &str) -> Self {
        JqlFilter {
            projects: projects.to_vec(),
            fix_version: fix_version.to_string(),
        }
    }

    /// Render as JQL with every value quoted.
    pub fn to_jql(&self) -> String {
        let projects = self
            .projects
            .iter()
            .map(|p| quote_jql(p))
            .collect::<Vec<_>>()
            .join(", ");
        format!(
            "project IN ({}) AND statuscategory != done AND type = Epic AND fixversion = {}",
            projects,
            quote_jql(&self.fix_version)
        )
    }
}

/// Operations the sync needs from Jira.
#[async_trait]
pub trait IssueTracker: Send + Sync {
    /// Epics matching the filter.
    async fn search_epics(&self, filter: &JqlFilter) -> SyncResult<Vec<Epic>>;

    /// Set fields on an issue.
    async fn update_fields(&self, issue_key: &str, body: &Value) -> SyncResult<()>;
}

/// HTTP client for the Jira cloud REST API.
pub struct JiraClient {
    http: reqwest::Client,
    base_url: String,
    email: String,
    api_token: SecretString,
}

impl JiraClient {
    pub fn new(http: reqwest::Client, settings: &JiraSettings) -> SyncResult<Self> {
        let email = settings
            .email
            .clone()
            .ok_or_else(|| SyncError::auth(System::Jira, "email not configured"))?;
        let api_token = settings
            .api_token
            .clone()
            .ok_or_else(|| SyncError::auth(System::Jira, "API token not configured"))?;

        Ok(JiraClient {
            http,
            base_url: settings.url.clone(),
            email,
            api_token,
        })
    }
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    issues: Vec<IssueRef>,
}

#[derive(Debug, Deserialize)]
struct IssueRef {
    key: String,
}

#[async_trait]
impl IssueTracker for JiraClient {
    async fn search_epics(&self, filter: &JqlFilter) -> SyncResult<Vec<Epic>> {
        let jql = filter.to_jql();
        let max_results = MAX_EPIC_RESULTS.to_string();
        debug!("Searching Jira epics: {}", jql);

        let response = self
            .http
            .get(format!("{}/rest/api/3/search", self.base_url))
            .basic_auth(&self.email, Some(self.api_token.expose_secret()))
            .header("Accept", "application/json")
            .query(&[
                ("jql", jql.as_str()),
                ("maxResults", max_results.as_str()),
                ("fields", "key"),
            ])
            .send()
            .await?;

        let found: SearchResponse = read_json(System::Jira, response).await?;
        Ok(found.issues.into_iter().map(|i| Epic { key: i.key }).collect())
    }

    async fn update_fields(&self, issue_key: &str, body: &Value) -> SyncResult<()> {
        let response = self
            .http
            .put(format!(
                "{}/rest/api/3/issue/{}",
                self.base_url,
                urlencoding::encode(issue_key)
            ))
            .basic_auth(&self.email, Some(self.api_token.expose_secret()))
            .header("Accept", "application/json")
            .json(body)
            .send()
            .await?;

        ensure_success(System::Jira, response).await?;
        Ok(())
    }
}
