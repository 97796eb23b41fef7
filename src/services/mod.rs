//! Clients for Xray, Jira and Nextworld, and the sync stages built on them.

pub mod aggregate;
pub mod graphql;
pub mod http;
pub mod jira;
pub mod nextworld;
pub mod pagination;
pub mod pipeline;
pub mod reconcile;
pub mod xray;

#[cfg(test)]
pub(crate) mod test_support;

pub use aggregate::{AggregateOptions, summarize_epics, tally_epic};
pub use jira::{IssueTracker, JiraClient, JqlFilter};
pub use nextworld::{NextworldClient, ResultRunner};
pub use pipeline::{SyncMode, SyncPipeline};
pub use reconcile::{ReconcileOptions, reconcile, update_execution, update_executions};
pub use xray::{XrayApi, XrayClient};
