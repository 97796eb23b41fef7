//! Status vocabularies of Nextworld and Xray, and the translation between them.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Test result status as reported by the Nextworld test runner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunnerStatus {
    Initialized,
    Running,
    Success,
    Failure,
    Skipped,
    FailedSystemErrors,
    FailedToRun,
    /// Any value outside the known vocabulary
    Unrecognized(String),
}

impl RunnerStatus {
    /// Parse from the runner's string representation (case-sensitive).
    pub fn parse(s: &str) -> Self {
        match s {
            "Initialized" => Self::Initialized,
            "Running" => Self::Running,
            "Success" => Self::Success,
            "Failure" => Self::Failure,
            "Skipped" => Self::Skipped,
            "FailedSystemErrors" => Self::FailedSystemErrors,
            "Failed to Run" => Self::FailedToRun,
            other => Self::Unrecognized(other.to_string()),
        }
    }

    /// Translate to the Xray status vocabulary.
    ///
    /// Returns `None` for unrecognized values; those never count as any status.
    pub fn to_xray(&self) -> Option<XrayStatus> {
        match self {
            Self::Initialized => Some(XrayStatus::ToDo),
            Self::Running => Some(XrayStatus::Executing),
            Self::Success => Some(XrayStatus::Passed),
            Self::Failure | Self::FailedToRun => Some(XrayStatus::Failed),
            Self::Skipped => Some(XrayStatus::Blocked),
            Self::FailedSystemErrors => Some(XrayStatus::FailedReleasable),
            Self::Unrecognized(_) => None,
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Initialized => "Initialized",
            Self::Running => "Running",
            Self::Success => "Success",
            Self::Failure => "Failure",
            Self::Skipped => "Skipped",
            Self::FailedSystemErrors => "FailedSystemErrors",
            Self::FailedToRun => "Failed to Run",
            Self::Unrecognized(s) => s,
        }
    }
}

impl fmt::Display for RunnerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl<'de> Deserialize<'de> for RunnerStatus {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Ok(Self::parse(&s))
    }
}

/// Test run status in Xray.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum XrayStatus {
    ToDo,
    Executing,
    Passed,
    Failed,
    Blocked,
    FailedReleasable,
    BlockRelease,
    /// Custom statuses configured in Xray
    Other(String),
}

impl XrayStatus {
    pub fn as_str(&self) -> &str {
        match self {
            Self::ToDo => "TO DO",
            Self::Executing => "EXECUTING",
            Self::Passed => "PASSED",
            Self::Failed => "FAILED",
            Self::Blocked => "BLOCKED",
            Self::FailedReleasable => "FAILED-RELEASEABLE",
            Self::BlockRelease => "BLOCK-RELEASE",
            Self::Other(s) => s,
        }
    }

    /// Parse from the Xray status name.
    pub fn parse(s: &str) -> Self {
        match s {
            "TO DO" => Self::ToDo,
            "EXECUTING" => Self::Executing,
            "PASSED" => Self::Passed,
            "FAILED" => Self::Failed,
            "BLOCKED" => Self::Blocked,
            "FAILED-RELEASEABLE" => Self::FailedReleasable,
            "BLOCK-RELEASE" => Self::BlockRelease,
            other => Self::Other(other.to_string()),
        }
    }
}

impl fmt::Display for XrayStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl Serialize for XrayStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for XrayStatus {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Ok(Self::parse(&s))
    }
}
