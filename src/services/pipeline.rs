//! The sync pipeline: update Xray test runs from Nextworld, then roll the
//! statuses up onto the release's Jira epics.

use std::fmt;

use chrono::Utc;
use tracing::info;

use crate::config::{Config, ConfigError};
use crate::error::SyncResult;
use crate::models::RunSummary;
use crate::services::aggregate::{AggregateOptions, summarize_epics};
use crate::services::http::build_http_client;
use crate::services::jira::{IssueTracker, JiraClient, JqlFilter};
use crate::services::nextworld::{NextworldClient, ResultRunner};
use crate::services::pagination::RefreshSchedule;
use crate::services::reconcile::{ReconcileOptions, update_executions};
use crate::services::xray::{XrayApi, XrayClient};

/// Which stages a run performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncMode {
    /// Test runs, then epics
    Full,
    /// Test runs only
    Tests,
    /// Epics only
    Epics,
}

impl SyncMode {
    /// Parse from a command name.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "run" | "full" | "all" => Some(Self::Full),
            "tests" | "test-runs" => Some(Self::Tests),
            "epics" => Some(Self::Epics),
            _ => None,
        }
    }

    pub fn runs_tests(&self) -> bool {
        matches!(self, Self::Full | Self::Tests)
    }

    pub fn runs_epics(&self) -> bool {
        matches!(self, Self::Full | Self::Epics)
    }
}

impl fmt::Display for SyncMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Full => write!(f, "full"),
            Self::Tests => write!(f, "tests"),
            Self::Epics => write!(f, "epics"),
        }
    }
}

/// Connected clients plus the settings of each stage.
pub struct SyncPipeline {
    xray: Box<dyn XrayApi>,
    runner: Option<Box<dyn ResultRunner>>,
    tracker: Option<(Box<dyn IssueTracker>, AggregateOptions)>,
    execution_ids: Vec<String>,
    reconcile: ReconcileOptions,
}

impl SyncPipeline {
    pub fn new(
        xray: Box<dyn XrayApi>,
        execution_ids: Vec<String>,
        reconcile: ReconcileOptions,
    ) -> Self {
        SyncPipeline {
            xray,
            runner: None,
            tracker: None,
            execution_ids,
            reconcile,
        }
    }

    pub fn with_runner(mut self, runner: Box<dyn ResultRunner>) -> Self {
        self.runner = Some(runner);
        self
    }

    pub fn with_tracker(
        mut self,
        tracker: Box<dyn IssueTracker>,
        options: AggregateOptions,
    ) -> Self {
        self.tracker = Some((tracker, options));
        self
    }

    /// Validate the configuration for `mode` and authenticate with every
    /// system the mode touches. Any authentication failure is fatal.
    pub async fn connect(config: &Config, mode: SyncMode) -> SyncResult<Self> {
        config.validate_for(mode)?;

        let http = build_http_client(config.http_timeout_secs)?;
        let xray = XrayClient::authenticate(http.clone(), &config.xray).await?;

        let reconcile = ReconcileOptions {
            suite_match: config.nextworld.suite_match,
            on_error: config.on_error,
            token_refresh: RefreshSchedule::new(config.nextworld.token_refresh_pages),
        };
        let mut pipeline =
            SyncPipeline::new(Box::new(xray), config.xray.test_executions.clone(), reconcile);

        if mode.runs_tests() {
            let runner = NextworldClient::authenticate(http.clone(), &config.nextworld).await?;
            pipeline = pipeline.with_runner(Box::new(runner));
        }

        if mode.runs_epics() {
            let release = config
                .jira
                .current_release
                .as_deref()
                .ok_or(ConfigError::MissingEnvVar("XSYNC_CURRENT_RELEASE"))?;
            let jira = JiraClient::new(http, &config.jira)?;
            let options = AggregateOptions {
                filter: JqlFilter::open_epics(&config.jira.projects, release),
                fields: config.jira.epic_fields.clone(),
                write_releasable_percent: config.jira.write_releasable_percent,
            };
            pipeline = pipeline.with_tracker(Box::new(jira), options);
        }

        Ok(pipeline)
    }

    /// Run the stages of `mode` in order and report what was done.
    pub async fn run(&mut self, mode: SyncMode) -> SyncResult<RunSummary> {
        let started_at = Utc::now();
        info!("Starting {} sync", mode);

        let reconcile = if mode.runs_tests() {
            let runner = self.runner.as_deref_mut().ok_or_else(|| {
                ConfigError::Validation(vec!["Nextworld is not connected".to_string()])
            })?;
            info!(
                "Updating {} test executions from Nextworld",
                self.execution_ids.len()
            );
            let summary = update_executions(
                self.xray.as_ref(),
                runner,
                &self.execution_ids,
                &self.reconcile,
            )
            .await?;
            info!("Test run update complete: {} tests updated", summary.updated);
            Some(summary)
        } else {
            None
        };

        let aggregate = if mode.runs_epics() {
            let (tracker, options) = self.tracker.as_ref().ok_or_else(|| {
                ConfigError::Validation(vec!["Jira is not connected".to_string()])
            })?;
            let summary = summarize_epics(self.xray.as_ref(), tracker.as_ref(), options).await?;
            info!("Epic update complete: {} epics updated", summary.epics_updated);
            Some(summary)
        } else {
            None
        };

        Ok(RunSummary {
            started_at,
            finished_at: Utc::now(),
            reconcile,
            aggregate,
        })
    }
}
