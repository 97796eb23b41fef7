//! Release epics and their test summary counters.

use serde_json::{Map, Value, json};

use crate::models::status::XrayStatus;

/// A Jira epic in the current release.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Epic {
    /// Issue key, e.g. `APP-1`
    pub key: String,
}

/// Jira custom field ids of the epic test summary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EpicFieldIds {
    pub total: String,
    pub executed: String,
    pub passed: String,
    pub remaining: String,
    pub releasable_percent: String,
}

/// Status counters for the test runs of one epic.
///
/// Every run increments `total`; known statuses land in exactly one bucket.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EpicTally {
    pub total: u32,
    pub passed: u32,
    pub failed: u32,
    pub failed_releasable: u32,
    pub block_release: u32,
    pub remaining: u32,
    /// Runs whose status matched no bucket
    pub unknown: u32,
}

impl EpicTally {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one test run by its current Xray status.
    pub fn record(&mut self, status: &XrayStatus) {
        self.total += 1;
        match status {
            XrayStatus::Passed => self.passed += 1,
            XrayStatus::ToDo | XrayStatus::Executing => self.remaining += 1,
            XrayStatus::Failed => self.failed += 1,
            XrayStatus::FailedReleasable => self.failed_releasable += 1,
            XrayStatus::BlockRelease => self.block_release += 1,
            XrayStatus::Blocked | XrayStatus::Other(_) => self.unknown += 1,
        }
    }

    /// Count a test run that has no status at all.
    pub fn record_missing(&mut self) {
        self.total += 1;
        self.unknown += 1;
    }

    /// Runs with a final result.
    pub fn executed(&self) -> u32 {
        self.passed + self.failed + self.failed_releasable + self.block_release
    }

    /// Share of runs that are acceptable to ship, 0 when there are no runs.
    pub fn releasable_percent(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        f64::from(self.passed + self.failed_releasable) / f64::from(self.total) * 100.0
    }

    /// Releasable % as written to Jira; whole numbers keep one decimal place.
    pub fn releasable_percent_text(&self) -> String {
        let percent = self.releasable_percent();
        if percent.fract() == 0.0 {
            format!("{:.1}", percent)
        } else {
            percent.to_string()
        }
    }

    /// Jira `fields` payload for the epic update.
    pub fn to_fields(&self, ids: &EpicFieldIds, include_releasable: bool) -> Value {
        let mut fields = Map::new();
        fields.insert(ids.total.clone(), json!(self.total));
        fields.insert(ids.passed.clone(), json!(self.passed));
        fields.insert(ids.executed.clone(), json!(self.executed()));
        fields.insert(ids.remaining.clone(), json!(self.remaining));
        if include_releasable {
            fields.insert(
                ids.releasable_percent.clone(),
                json!(self.releasable_percent_text()),
            );
        }
        json!({ "fields": fields })
    }
}
