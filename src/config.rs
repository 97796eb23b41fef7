//! Application configuration loaded from environment variables or a legacy JSON file.

use std::collections::HashMap;
use std::env;
use std::fmt;
use std::path::Path;

use secrecy::SecretString;
use serde::Deserialize;

use crate::models::EpicFieldIds;
use crate::services::pipeline::SyncMode;

/// Environment variable naming a legacy `config.json` to load instead of the environment.
pub const CONFIG_FILE_VAR: &str = "XSYNC_CONFIG_FILE";

/// Default values for everything that has a sensible default.
pub mod defaults {
    pub const XRAY_URL: &str = "https://xray.cloud.getxray.app";
    pub const JIRA_URL: &str = "https://nextworldproduction.atlassian.net";
    pub const NEXTWORLD_AUTH_URL: &str = "https://auth1.nextworld.net/v2/Authenticate/Tokens";
    pub const JIRA_PROJECTS: &str = "APP,BOT,CI";
    pub const SUITE_LINK_FIELD: &str = "customfield_10490";
    pub const SUITE_NAME_FIELD: &str = "customfield_10505";
    pub const EPIC_FIELD_TOTAL: &str = "customfield_10120";
    pub const EPIC_FIELD_EXECUTED: &str = "customfield_10121";
    pub const EPIC_FIELD_PASSED: &str = "customfield_10122";
    pub const EPIC_FIELD_REMAINING: &str = "customfield_10123";
    pub const EPIC_FIELD_RELEASABLE: &str = "customfield_10127";
    pub const RUNNER_TOKEN_REFRESH_PAGES: usize = 5;
    pub const HTTP_TIMEOUT_SECS: u64 = 30;
}

/// Which Xray test field correlates a test to a Nextworld test suite.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SuiteMatch {
    /// The suite link field, resolved through the links endpoint
    Link,
    /// The suite name field, resolved through the names endpoint
    Name,
}

impl SuiteMatch {
    /// Parse from string.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "link" | "links" => Some(Self::Link),
            "name" | "names" => Some(Self::Name),
            _ => None,
        }
    }
}

impl fmt::Display for SuiteMatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Link => write!(f, "link"),
            Self::Name => write!(f, "name"),
        }
    }
}

/// What to do when a Nextworld results lookup fails mid-run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OnError {
    Abort,
    Continue,
}

impl OnError {
    /// Parse from string.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "abort" | "fail" => Some(Self::Abort),
            "continue" | "skip" => Some(Self::Continue),
            _ => None,
        }
    }

    pub fn is_abort(&self) -> bool {
        matches!(self, Self::Abort)
    }
}

impl fmt::Display for OnError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Abort => write!(f, "abort"),
            Self::Continue => write!(f, "continue"),
        }
    }
}

/// Jira (issue tracker) settings.
#[derive(Debug, Clone)]
pub struct JiraSettings {
    /// Base URL of the Jira site
    pub url: String,
    /// Account email for basic auth
    pub email: Option<String>,
    /// API token for basic auth
    pub api_token: Option<SecretString>,
    /// Projects whose epics are summarized
    pub projects: Vec<String>,
    /// Fix-version of the release in progress
    pub current_release: Option<String>,
    /// Custom field ids of the epic test summary
    pub epic_fields: EpicFieldIds,
    /// Whether the Releasable % field is written
    pub write_releasable_percent: bool,
}

/// Xray (test management) settings.
#[derive(Debug, Clone)]
pub struct XraySettings {
    /// Base URL of Xray cloud
    pub url: String,
    pub client_id: Option<String>,
    pub client_secret: Option<SecretString>,
    /// Jira field holding the Nextworld suite link on a test
    pub suite_link_field: String,
    /// Jira field holding the Nextworld suite name on a test
    pub suite_name_field: String,
    /// Automated test executions to update from Nextworld
    pub test_executions: Vec<String>,
}

/// Nextworld (application test runner) settings.
#[derive(Debug, Clone)]
pub struct NextworldSettings {
    /// Application base URL used for test result lookups
    pub url: Option<String>,
    /// Token endpoint
    pub auth_url: String,
    pub email: Option<String>,
    pub password: Option<SecretString>,
    /// Environment (zone) the results are read from
    pub zone: Option<String>,
    pub suite_match: SuiteMatch,
    /// Re-acquire the access token every N pages (0 disables)
    pub token_refresh_pages: usize,
}

/// Application configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub jira: JiraSettings,
    pub xray: XraySettings,
    pub nextworld: NextworldSettings,
    /// Policy for Nextworld results lookup failures
    pub on_error: OnError,
    /// Per-request HTTP timeout in seconds
    pub http_timeout_secs: u64,
}

impl Config {
    /// Load configuration from `XSYNC_CONFIG_FILE` when set, otherwise from the environment.
    pub fn load() -> Result<Self, ConfigError> {
        match env::var(CONFIG_FILE_VAR) {
            Ok(path) if !path.trim().is_empty() => Self::from_file(Path::new(path.trim())),
            _ => Self::from_env(),
        }
    }

    /// Load configuration from environment variables.
    ///
    /// Environment variables:
    /// - `XSYNC_JIRA_URL`: Jira base URL (default: nextworldproduction.atlassian.net)
    /// - `XSYNC_JIRA_EMAIL` / `XSYNC_JIRA_API_TOKEN`: Jira basic credentials
    /// - `XSYNC_JIRA_PROJECTS`: Comma-separated project keys (default: APP,BOT,CI)
    /// - `XSYNC_CURRENT_RELEASE`: Fix-version of the current release
    /// - `XSYNC_EPIC_FIELD_{TOTAL,EXECUTED,PASSED,REMAINING,RELEASABLE}`: Epic field ids
    /// - `XSYNC_WRITE_RELEASABLE_PERCENT`: Write Releasable % (default: true)
    /// - `XSYNC_XRAY_URL`: Xray base URL (default: xray.cloud.getxray.app)
    /// - `XSYNC_XRAY_CLIENT_ID` / `XSYNC_XRAY_CLIENT_SECRET`: Xray API key
    /// - `XSYNC_SUITE_LINK_FIELD` / `XSYNC_SUITE_NAME_FIELD`: Test field ids
    /// - `XSYNC_TEST_EXECUTIONS`: Comma-separated test execution issue ids
    /// - `XSYNC_NEXTWORLD_URL`: Nextworld application URL
    /// - `XSYNC_NEXTWORLD_AUTH_URL`: Token endpoint override
    /// - `XSYNC_RELEASE_PIPELINE_ID`: Release pipeline id used to derive the token endpoint
    /// - `XSYNC_NEXTWORLD_EMAIL` / `XSYNC_NEXTWORLD_PASSWORD`: Nextworld basic credentials
    /// - `XSYNC_NEXTWORLD_ZONE`: Nextworld environment
    /// - `XSYNC_SUITE_MATCH`: `link` or `name` (default: link)
    /// - `XSYNC_RUNNER_TOKEN_REFRESH_PAGES`: Token refresh interval in pages (default: 5)
    /// - `XSYNC_ON_ERROR`: `abort` or `continue` (default: abort)
    /// - `XSYNC_HTTP_TIMEOUT_SECS`: Request timeout (default: 30)
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration from a legacy `config.json`.
    ///
    /// Keys in the file take precedence; anything the file does not carry
    /// is read from the environment.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::File(format!("{}: {}", path.display(), e)))?;
        let file: LegacyConfigFile = serde_json::from_str(&contents)
            .map_err(|e| ConfigError::File(format!("{}: {}", path.display(), e)))?;

        let overrides = file.into_vars();
        Self::from_lookup(|key| {
            overrides
                .get(key)
                .cloned()
                .or_else(|| env::var(key).ok())
        })
    }

    /// Build configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let get_or = |key: &str, default: &str| get(key).unwrap_or_else(|| default.to_string());

        let suite_match = match get("XSYNC_SUITE_MATCH") {
            Some(v) => SuiteMatch::parse(&v).ok_or(ConfigError::InvalidValue(
                "XSYNC_SUITE_MATCH must be 'link' or 'name'",
            ))?,
            None => SuiteMatch::Link,
        };

        let on_error = match get("XSYNC_ON_ERROR") {
            Some(v) => OnError::parse(&v).ok_or(ConfigError::InvalidValue(
                "XSYNC_ON_ERROR must be 'abort' or 'continue'",
            ))?,
            None => OnError::Abort,
        };

        let write_releasable_percent = match get("XSYNC_WRITE_RELEASABLE_PERCENT") {
            Some(v) => parse_bool(&v).ok_or(ConfigError::InvalidValue(
                "XSYNC_WRITE_RELEASABLE_PERCENT must be true or false",
            ))?,
            None => true,
        };

        let token_refresh_pages = get_or(
            "XSYNC_RUNNER_TOKEN_REFRESH_PAGES",
            &defaults::RUNNER_TOKEN_REFRESH_PAGES.to_string(),
        )
        .trim()
        .parse::<usize>()
        .map_err(|_| {
            ConfigError::InvalidValue("XSYNC_RUNNER_TOKEN_REFRESH_PAGES must be a valid number")
        })?;

        let http_timeout_secs = get_or(
            "XSYNC_HTTP_TIMEOUT_SECS",
            &defaults::HTTP_TIMEOUT_SECS.to_string(),
        )
        .trim()
        .parse::<u64>()
        .map_err(|_| ConfigError::InvalidValue("XSYNC_HTTP_TIMEOUT_SECS must be a valid number"))?;

        let auth_url = match get("XSYNC_NEXTWORLD_AUTH_URL") {
            Some(url) => url,
            None => nextworld_auth_url(get("XSYNC_RELEASE_PIPELINE_ID").as_deref()),
        };

        let jira = JiraSettings {
            url: trim_url(get_or("XSYNC_JIRA_URL", defaults::JIRA_URL)),
            email: get("XSYNC_JIRA_EMAIL"),
            api_token: get("XSYNC_JIRA_API_TOKEN").map(SecretString::from),
            projects: split_list(&get_or("XSYNC_JIRA_PROJECTS", defaults::JIRA_PROJECTS)),
            current_release: get("XSYNC_CURRENT_RELEASE"),
            epic_fields: EpicFieldIds {
                total: get_or("XSYNC_EPIC_FIELD_TOTAL", defaults::EPIC_FIELD_TOTAL),
                executed: get_or("XSYNC_EPIC_FIELD_EXECUTED", defaults::EPIC_FIELD_EXECUTED),
                passed: get_or("XSYNC_EPIC_FIELD_PASSED", defaults::EPIC_FIELD_PASSED),
                remaining: get_or("XSYNC_EPIC_FIELD_REMAINING", defaults::EPIC_FIELD_REMAINING),
                releasable_percent: get_or(
                    "XSYNC_EPIC_FIELD_RELEASABLE",
                    defaults::EPIC_FIELD_RELEASABLE,
                ),
            },
            write_releasable_percent,
        };

        let xray = XraySettings {
            url: trim_url(get_or("XSYNC_XRAY_URL", defaults::XRAY_URL)),
            client_id: get("XSYNC_XRAY_CLIENT_ID"),
            client_secret: get("XSYNC_XRAY_CLIENT_SECRET").map(SecretString::from),
            suite_link_field: get_or("XSYNC_SUITE_LINK_FIELD", defaults::SUITE_LINK_FIELD),
            suite_name_field: get_or("XSYNC_SUITE_NAME_FIELD", defaults::SUITE_NAME_FIELD),
            test_executions: get("XSYNC_TEST_EXECUTIONS")
                .map(|v| split_list(&v))
                .unwrap_or_default(),
        };

        let nextworld = NextworldSettings {
            url: get("XSYNC_NEXTWORLD_URL").map(trim_url),
            auth_url,
            email: get("XSYNC_NEXTWORLD_EMAIL"),
            password: get("XSYNC_NEXTWORLD_PASSWORD").map(SecretString::from),
            zone: get("XSYNC_NEXTWORLD_ZONE"),
            suite_match,
            token_refresh_pages,
        };

        Ok(Config {
            jira,
            xray,
            nextworld,
            on_error,
            http_timeout_secs,
        })
    }

    /// Check that every setting the selected mode needs is present.
    pub fn validate_for(&self, mode: SyncMode) -> Result<(), ConfigError> {
        let mut errors = Vec::new();

        if self.xray.client_id.is_none() {
            errors.push("XSYNC_XRAY_CLIENT_ID is not set".to_string());
        }
        if self.xray.client_secret.is_none() {
            errors.push("XSYNC_XRAY_CLIENT_SECRET is not set".to_string());
        }

        if mode.runs_tests() {
            if self.xray.test_executions.is_empty() {
                errors.push("XSYNC_TEST_EXECUTIONS lists no test executions".to_string());
            }
            if self.nextworld.url.is_none() {
                errors.push("XSYNC_NEXTWORLD_URL is not set".to_string());
            }
            if self.nextworld.email.is_none() || self.nextworld.password.is_none() {
                errors.push(
                    "XSYNC_NEXTWORLD_EMAIL/XSYNC_NEXTWORLD_PASSWORD are not set".to_string(),
                );
            }
            if self.nextworld.zone.is_none() {
                errors.push("XSYNC_NEXTWORLD_ZONE is not set".to_string());
            }
        }

        if mode.runs_epics() {
            if self.jira.email.is_none() || self.jira.api_token.is_none() {
                errors.push("XSYNC_JIRA_EMAIL/XSYNC_JIRA_API_TOKEN are not set".to_string());
            }
            if self.jira.current_release.is_none() {
                errors.push("XSYNC_CURRENT_RELEASE is not set".to_string());
            }
            if self.jira.projects.is_empty() {
                errors.push("XSYNC_JIRA_PROJECTS lists no projects".to_string());
            }
        }

        if !errors.is_empty() {
            return Err(ConfigError::Validation(errors));
        }

        Ok(())
    }
}

/// Derive the Nextworld token endpoint.
///
/// Release pipeline environments authenticate against their own host, named
/// after the pipeline id with the dots removed.
pub fn nextworld_auth_url(release_pipeline_id: Option<&str>) -> String {
    match release_pipeline_id.map(str::trim).filter(|id| !id.is_empty()) {
        Some(id) => format!(
            "https://auth-nw{}dev.releasepipeline.nextworld.net/v2/Authenticate/Tokens",
            id.replace('.', "")
        ),
        None => defaults::NEXTWORLD_AUTH_URL.to_string(),
    }
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

fn trim_url(url: String) -> String {
    url.trim().trim_end_matches('/').to_string()
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Key set of the legacy `config.json`.
#[derive(Debug, Deserialize)]
struct LegacyConfigFile {
    #[serde(rename = "JIRA_EMAIL")]
    jira_email: Option<String>,
    #[serde(rename = "JIRA_AUTH_TOKEN")]
    jira_auth_token: Option<String>,
    #[serde(rename = "XRAY_CLIENT_ID")]
    xray_client_id: Option<String>,
    #[serde(rename = "XRAY_CLIENT_SECRET")]
    xray_client_secret: Option<String>,
    #[serde(rename = "NEXTWORLD_EMAIL")]
    nextworld_email: Option<String>,
    #[serde(rename = "NEXTWORLD_PASSWORD")]
    nextworld_password: Option<String>,
    #[serde(rename = "NEXTWORLD_ENVIRONMENT")]
    nextworld_environment: Option<String>,
    #[serde(rename = "NEXTWORLD_URL")]
    nextworld_url: Option<String>,
    #[serde(rename = "RELEASE_PIPELINE_ID")]
    release_pipeline_id: Option<String>,
    #[serde(rename = "CURRENT_RELEASE")]
    current_release: Option<String>,
    #[serde(rename = "AUTOMATED_TEST_EXECUTIONS", default)]
    automated_test_executions: Vec<String>,
}

impl LegacyConfigFile {
    /// Map the legacy keys onto their environment variable names.
    fn into_vars(self) -> HashMap<&'static str, String> {
        let mut vars = HashMap::new();
        let pairs = [
            ("XSYNC_JIRA_EMAIL", self.jira_email),
            ("XSYNC_JIRA_API_TOKEN", self.jira_auth_token),
            ("XSYNC_XRAY_CLIENT_ID", self.xray_client_id),
            ("XSYNC_XRAY_CLIENT_SECRET", self.xray_client_secret),
            ("XSYNC_NEXTWORLD_EMAIL", self.nextworld_email),
            ("XSYNC_NEXTWORLD_PASSWORD", self.nextworld_password),
            ("XSYNC_NEXTWORLD_ZONE", self.nextworld_environment),
            ("XSYNC_NEXTWORLD_URL", self.nextworld_url),
            ("XSYNC_RELEASE_PIPELINE_ID", self.release_pipeline_id),
            ("XSYNC_CURRENT_RELEASE", self.current_release),
        ];
        for (key, value) in pairs {
            if let Some(value) = value {
                vars.insert(key, value);
            }
        }
        if !self.automated_test_executions.is_empty() {
            vars.insert(
                "XSYNC_TEST_EXECUTIONS",
                self.automated_test_executions.join(","),
            );
        }
        vars
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(&'static str),

    #[error("Invalid configuration value: {0}")]
    InvalidValue(&'static str),

    #[error("Failed to read config file {0}")]
    File(String),

    #[error("Configuration validation failed:\n{}", .0.iter().map(|e| format!("  - {}", e)).collect::<Vec<_>>().join("\n"))]
    Validation(Vec<String>),
}
