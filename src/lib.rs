//! Xray sync library.
//!
//! Updates Xray test runs with the latest automated test results from
//! Nextworld, then writes per-epic test summaries onto Jira epics.

pub mod config;
pub mod error;
pub mod models;
pub mod services;
