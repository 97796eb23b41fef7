//! Domain models for the Xray sync.

pub mod epic;
pub mod status;
pub mod summary;
pub mod test_run;

// Re-export commonly used types
pub use epic::{Epic, EpicFieldIds, EpicTally};
pub use status::{RunnerStatus, XrayStatus};
pub use summary::{AggregateSummary, ReconcileSummary, RunSummary};
pub use test_run::{
    ExecutionTest, NotFoundTest, RunnerResult, StatusUpdate, TestRun, UnrecognizedResult,
};

/// Offset pagination parameters as Xray takes them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageParams {
    pub start: usize,
    pub limit: usize,
}

/// One page of a paginated Xray listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page<T> {
    /// Total items across all pages
    pub total: usize,
    pub items: Vec<T>,
}
