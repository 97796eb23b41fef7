//! Test runs in Xray and the Nextworld results they are reconciled with.

use std::fmt;

use serde::Deserialize;

use crate::config::SuiteMatch;
use crate::models::status::{RunnerStatus, XrayStatus};

/// A test listed in an Xray test execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionTest {
    /// Jira issue id of the test
    pub issue_id: String,
}

/// A test run in Xray, with the fields of its test used for correlation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestRun {
    /// Xray test run id
    pub id: String,
    /// Jira issue id of the test
    pub test_issue_id: String,
    /// Jira summary of the test
    pub summary: Option<String>,
    /// Nextworld suite link stored on the test
    pub suite_link: Option<String>,
    /// Nextworld suite name stored on the test
    pub suite_name: Option<String>,
    /// Current Xray status of the run
    pub status: Option<XrayStatus>,
}

impl TestRun {
    /// The correlating key for the given match mode, if populated.
    pub fn suite_key(&self, suite_match: SuiteMatch) -> Option<&str> {
        let key = match suite_match {
            SuiteMatch::Link => self.suite_link.as_deref(),
            SuiteMatch::Name => self.suite_name.as_deref(),
        };
        key.filter(|k| !k.trim().is_empty())
    }
}

/// Latest result of one Nextworld test suite.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RunnerResult {
    #[serde(rename = "TestSuiteName", default)]
    pub suite_name: Option<String>,
    #[serde(rename = "TestResultLink", default)]
    pub result_link: Option<String>,
    /// `None` means the suite was not found in the environment
    #[serde(rename = "TestResultStatus", default)]
    pub status: Option<RunnerStatus>,
    #[serde(rename = "ErrorDetail", alias = "ErrorMessage", default)]
    pub error_detail: Option<String>,
}

impl RunnerResult {
    /// The key this result answers for, in the given match mode.
    pub fn key(&self, suite_match: SuiteMatch) -> Option<&str> {
        match suite_match {
            SuiteMatch::Link => self.result_link.as_deref(),
            SuiteMatch::Name => self.suite_name.as_deref(),
        }
    }
}

/// A status to write onto one Xray test run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusUpdate {
    pub run_id: String,
    pub status: XrayStatus,
}

/// A test whose suite is populated in Xray but has no result in Nextworld.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotFoundTest {
    pub test_issue_id: String,
    pub summary: String,
    pub suite: String,
    /// Reason given by Nextworld, when it answered for the suite
    pub error_detail: Option<String>,
}

impl fmt::Display for NotFoundTest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} - {}", self.summary, self.test_issue_id)?;
        if let Some(ref detail) = self.error_detail {
            write!(f, " ({})", detail)?;
        }
        Ok(())
    }
}

/// A Nextworld result whose status has no Xray equivalent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnrecognizedResult {
    pub suite: String,
    pub status: String,
    pub error_detail: Option<String>,
}

impl fmt::Display for UnrecognizedResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (status '{}')", self.suite, self.status)?;
        if let Some(ref detail) = self.error_detail {
            write!(f, ": {}", detail)?;
        }
        Ok(())
    }
}
