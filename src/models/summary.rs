//! Outcome of a sync run, reported to the operator at the end.

use std::fmt;

use chrono::{DateTime, Utc};

use crate::models::test_run::{NotFoundTest, UnrecognizedResult};

/// Result of updating Xray test runs from Nextworld.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReconcileSummary {
    /// Test executions fully processed
    pub executions_processed: usize,
    /// Test executions abandoned after a runner fetch failure
    pub skipped_executions: Vec<String>,
    /// Test runs whose test had a suite populated
    pub tests_with_suite: usize,
    /// Test runs written in successful batches
    pub updated: usize,
    /// Tests whose suite had no result in Nextworld
    pub not_found: Vec<NotFoundTest>,
    /// Results whose status has no Xray equivalent
    pub unrecognized: Vec<UnrecognizedResult>,
    /// Write batches rejected by Xray
    pub failed_batches: usize,
    /// Test runs in rejected batches
    pub failed_updates: usize,
}

impl ReconcileSummary {
    /// Fold the outcome of one execution into the run total.
    pub fn merge(&mut self, other: ReconcileSummary) {
        self.executions_processed += other.executions_processed;
        self.skipped_executions.extend(other.skipped_executions);
        self.tests_with_suite += other.tests_with_suite;
        self.updated += other.updated;
        self.not_found.extend(other.not_found);
        for result in other.unrecognized {
            self.add_unrecognized(result);
        }
        self.failed_batches += other.failed_batches;
        self.failed_updates += other.failed_updates;
    }

    /// Record a result with an untranslatable status, once per suite.
    ///
    /// Returns `false` when the suite was already listed.
    pub fn add_unrecognized(&mut self, result: UnrecognizedResult) -> bool {
        if self.unrecognized.iter().any(|r| r.suite == result.suite) {
            return false;
        }
        self.unrecognized.push(result);
        true
    }
}

impl fmt::Display for ReconcileSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.not_found.is_empty() {
            writeln!(
                f,
                "The following {} tests in Xray have the test suite field populated, \
                 but the test suite was not found in Nextworld. \
                 Please check that the field in Xray is correct \
                 and that the suite in Nextworld is active in the selected environment:",
                self.not_found.len()
            )?;
            for test in &self.not_found {
                writeln!(f, "{}", test)?;
            }
            writeln!(f)?;
        }

        if !self.unrecognized.is_empty() {
            writeln!(
                f,
                "The following {} Nextworld results have a status with no Xray equivalent \
                 and were not written:",
                self.unrecognized.len()
            )?;
            for result in &self.unrecognized {
                writeln!(f, "{}", result)?;
            }
            writeln!(f)?;
        }

        if !self.skipped_executions.is_empty() {
            writeln!(
                f,
                "Skipped {} test executions after Nextworld errors: {}",
                self.skipped_executions.len(),
                self.skipped_executions.join(", ")
            )?;
        }

        if self.failed_batches > 0 {
            writeln!(
                f,
                "{} update batches ({} tests) were rejected by Xray",
                self.failed_batches, self.failed_updates
            )?;
        }

        write!(
            f,
            "Updated {} tests with their latest test result from Nextworld",
            self.updated
        )
    }
}

/// Result of writing test summaries onto Jira epics.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AggregateSummary {
    /// Epics returned by the release query
    pub epics_found: usize,
    /// Epics whose summary was written
    pub epics_updated: usize,
    /// Epics without a test execution
    pub epics_skipped: Vec<String>,
    /// Epics whose update was rejected
    pub epics_failed: Vec<String>,
}

impl fmt::Display for AggregateSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.epics_failed.is_empty() {
            writeln!(
                f,
                "Failed to update {} epics: {}",
                self.epics_failed.len(),
                self.epics_failed.join(", ")
            )?;
        }
        write!(
            f,
            "Updated the test summary on {} epics.",
            self.epics_updated
        )
    }
}

/// Outcome of a whole run.
#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub reconcile: Option<ReconcileSummary>,
    pub aggregate: Option<AggregateSummary>,
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(ref reconcile) = self.reconcile {
            writeln!(f, "{}", reconcile)?;
        }
        if let Some(ref aggregate) = self.aggregate {
            writeln!(f, "{}", aggregate)?;
        }
        let elapsed = self.finished_at - self.started_at;
        write!(f, "Complete in {}s", elapsed.num_seconds())
    }
}
