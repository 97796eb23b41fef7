//! Sync E2E test suite.
//!
//! Drives the real Xray, Jira and Nextworld clients against an in-process
//! mock of all three services.
//!
//! Run with: cargo test --test sync_e2e

mod mock_services;
