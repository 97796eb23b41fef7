//! Epic aggregation: roll test run statuses up into Jira epic summaries.

use tracing::{debug, info, warn};

use crate::error::SyncResult;
use crate::models::{AggregateSummary, Epic, EpicFieldIds, EpicTally};
use crate::services::jira::{IssueTracker, JqlFilter};
use crate::services::pagination::PageCursor;
use crate::services::xray::XrayApi;

/// Settings of the aggregate stage.
#[derive(Debug, Clone)]
pub struct AggregateOptions {
    pub filter: JqlFilter,
    pub fields: EpicFieldIds,
    pub write_releasable_percent: bool,
}

/// Count the statuses of every test run under an epic's test execution.
///
/// Returns `None` when the epic has no test execution.
pub async fn tally_epic(xray: &dyn XrayApi, epic_key: &str) -> SyncResult<Option<EpicTally>> {
    let mut tally = EpicTally::new();
    let mut cursor = PageCursor::default();
    let mut found = false;

    loop {
        let Some(page) = xray.epic_execution_tests(epic_key, cursor.params()).await? else {
            break;
        };
        found = true;

        let test_ids: Vec<String> = page.tests.items.iter().map(|t| t.issue_id.clone()).collect();
        let runs = xray.test_runs(&page.execution_id, &test_ids).await?;
        for run in &runs {
            match run.status {
                Some(ref status) => tally.record(status),
                None => tally.record_missing(),
            }
        }

        if !cursor.advance(page.tests.total) {
            break;
        }
    }

    if !found {
        return Ok(None);
    }
    if tally.unknown > 0 {
        debug!(
            "Epic {}: {} test runs have a status outside the summary buckets",
            epic_key, tally.unknown
        );
    }
    Ok(Some(tally))
}

/// Write the test summary of every open epic in the release.
///
/// A rejected update is logged and recorded; the remaining epics are still
/// written.
pub async fn summarize_epics(
    xray: &dyn XrayApi,
    jira: &dyn IssueTracker,
    options: &AggregateOptions,
) -> SyncResult<AggregateSummary> {
    let epics = jira.search_epics(&options.filter).await?;
    info!(
        "Found {} open epics in release {}",
        epics.len(),
        options.filter.fix_version
    );

    let mut summary = AggregateSummary {
        epics_found: epics.len(),
        ..Default::default()
    };

    for Epic { key: epic_key } in epics {
        let Some(tally) = tally_epic(xray, &epic_key).await? else {
            debug!("Epic {} has no test execution, skipping", epic_key);
            summary.epics_skipped.push(epic_key);
            continue;
        };

        let body = tally.to_fields(&options.fields, options.write_releasable_percent);
        match jira.update_fields(&epic_key, &body).await {
            Ok(()) => {
                info!(
                    "Epic {}: total={} executed={} passed={} remaining={} releasable={}%",
                    epic_key,
                    tally.total,
                    tally.executed(),
                    tally.passed,
                    tally.remaining,
                    tally.releasable_percent_text()
                );
                summary.epics_updated += 1;
            }
            Err(e) => {
                warn!("Error updating Jira epic {}: {}", epic_key, e);
                summary.epics_failed.push(epic_key);
            }
        }
    }

    Ok(summary)
}
