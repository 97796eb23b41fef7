//! Status reconciliation: Nextworld results onto Xray test runs.
//!
//! The join is a pure function over one page of runs and results; the
//! stage around it pages through each execution, looks results up in
//! Nextworld and writes the translated statuses back in batches.

use std::collections::{HashMap, HashSet};

use tracing::{debug, info, warn};

use crate::config::{OnError, SuiteMatch};
use crate::error::SyncResult;
use crate::models::{
    NotFoundTest, ReconcileSummary, RunnerResult, StatusUpdate, TestRun, UnrecognizedResult,
};
use crate::services::nextworld::ResultRunner;
use crate::services::pagination::{PageCursor, RefreshSchedule, WRITE_BATCH_SIZE, batches};
use crate::services::xray::XrayApi;

/// Outcome of joining one page of test runs with runner results.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Reconciliation {
    /// Runs with a translated status, in run order
    pub updates: Vec<StatusUpdate>,
    /// Runs whose suite had no result
    pub not_found: Vec<NotFoundTest>,
    /// Results whose status has no Xray equivalent
    pub unrecognized: Vec<UnrecognizedResult>,
    /// Runs with a populated suite key
    pub tests_with_suite: usize,
}

/// Join runs to results by suite key and translate statuses.
///
/// A run is updatable only when its suite key is populated, a result exists
/// for that key and the result's status translates. A populated key with no
/// result, or a result without a status, is reported as not found.
pub fn reconcile(
    runs: &[TestRun],
    results: &[RunnerResult],
    suite_match: SuiteMatch,
) -> Reconciliation {
    let by_key: HashMap<&str, &RunnerResult> = results
        .iter()
        .filter_map(|r| r.key(suite_match).map(|k| (k, r)))
        .collect();

    let mut out = Reconciliation::default();
    let mut seen_unrecognized = HashSet::new();

    for run in runs {
        let Some(key) = run.suite_key(suite_match) else {
            continue;
        };
        out.tests_with_suite += 1;

        let result = by_key.get(key).copied();
        let error_detail = result.and_then(|r| r.error_detail.clone());
        match result.and_then(|r| r.status.as_ref()) {
            None => out.not_found.push(NotFoundTest {
                test_issue_id: run.test_issue_id.clone(),
                summary: run.summary.clone().unwrap_or_default(),
                suite: key.to_string(),
                error_detail,
            }),
            Some(status) => match status.to_xray() {
                Some(xray_status) => out.updates.push(StatusUpdate {
                    run_id: run.id.clone(),
                    status: xray_status,
                }),
                None => {
                    if seen_unrecognized.insert(key) {
                        out.unrecognized.push(UnrecognizedResult {
                            suite: key.to_string(),
                            status: status.to_string(),
                            error_detail,
                        });
                    }
                }
            },
        }
    }

    out
}

/// Settings of the reconcile stage.
#[derive(Debug, Clone)]
pub struct ReconcileOptions {
    pub suite_match: SuiteMatch,
    pub on_error: OnError,
    pub token_refresh: RefreshSchedule,
}

/// Update every test run of one execution from Nextworld.
pub async fn update_execution(
    xray: &dyn XrayApi,
    runner: &mut dyn ResultRunner,
    execution_id: &str,
    options: &ReconcileOptions,
) -> SyncResult<ReconcileSummary> {
    let mut summary = ReconcileSummary::default();
    let mut cursor = PageCursor::default();

    loop {
        let page = xray.execution_tests(execution_id, cursor.params()).await?;
        let test_ids: Vec<String> = page.items.iter().map(|t| t.issue_id.clone()).collect();
        let runs = xray.test_runs(execution_id, &test_ids).await?;

        let mut suite_keys: Vec<String> = Vec::new();
        for key in runs.iter().filter_map(|r| r.suite_key(options.suite_match)) {
            if !suite_keys.iter().any(|k| k == key) {
                suite_keys.push(key.to_string());
            }
        }

        let results = if suite_keys.is_empty() {
            Vec::new()
        } else {
            match runner.latest_results(&suite_keys).await {
                Ok(results) => results,
                Err(e) if !options.on_error.is_abort() => {
                    warn!(
                        "Error getting Nextworld test results for execution {}, skipping it: {}",
                        execution_id, e
                    );
                    summary.skipped_executions.push(execution_id.to_string());
                    return Ok(summary);
                }
                Err(e) => return Err(e),
            }
        };

        let joined = reconcile(&runs, &results, options.suite_match);
        for test in &joined.not_found {
            debug!("Suite {} not found in Nextworld: {}", test.suite, test);
        }
        for result in joined.unrecognized {
            let message = result.to_string();
            if summary.add_unrecognized(result) {
                warn!("Nextworld status has no Xray equivalent: {}", message);
            }
        }
        summary.tests_with_suite += joined.tests_with_suite;
        summary.not_found.extend(joined.not_found);

        for batch in batches(&joined.updates, WRITE_BATCH_SIZE) {
            match xray.update_statuses(batch).await {
                Ok(()) => summary.updated += batch.len(),
                Err(e) => {
                    warn!("Error updating {} Xray test runs: {}", batch.len(), e);
                    summary.failed_batches += 1;
                    summary.failed_updates += batch.len();
                }
            }
        }

        let page_index = cursor.page_index();
        if !cursor.advance(page.total) {
            break;
        }
        if options.token_refresh.due_after(page_index) {
            runner.refresh_token().await?;
        }
    }

    summary.executions_processed = 1;
    info!(
        "Execution {}: {} tests updated, {} not found",
        execution_id,
        summary.updated,
        summary.not_found.len()
    );

    Ok(summary)
}

/// Update all configured executions, one after another.
pub async fn update_executions(
    xray: &dyn XrayApi,
    runner: &mut dyn ResultRunner,
    execution_ids: &[String],
    options: &ReconcileOptions,
) -> SyncResult<ReconcileSummary> {
    let mut total = ReconcileSummary::default();
    for execution_id in execution_ids {
        info!("Updating test execution {}", execution_id);
        let summary = update_execution(xray, runner, execution_id, options).await?;
        total.merge(summary);
    }
    Ok(total)
}
