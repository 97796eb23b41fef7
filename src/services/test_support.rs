//! In-memory stand-ins for Xray, Nextworld and Jira used by unit tests.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use reqwest::StatusCode;
use serde_json::Value;

use crate::error::{SyncError, SyncResult, System};
use crate::models::{
    Epic, ExecutionTest, Page, PageParams, RunnerResult, RunnerStatus, StatusUpdate, TestRun,
    XrayStatus,
};
use crate::services::jira::{IssueTracker, JqlFilter};
use crate::services::nextworld::ResultRunner;
use crate::services::xray::{EpicExecutionPage, XrayApi};

pub fn linked_run(id: &str, test_issue_id: &str, summary: &str, link: Option<&str>) -> TestRun {
    TestRun {
        id: id.to_string(),
        test_issue_id: test_issue_id.to_string(),
        summary: Some(summary.to_string()),
        suite_link: link.map(str::to_string),
        suite_name: None,
        status: None,
    }
}

pub fn status_run(id: &str, test_issue_id: &str, status: Option<&str>) -> TestRun {
    TestRun {
        id: id.to_string(),
        test_issue_id: test_issue_id.to_string(),
        summary: None,
        suite_link: None,
        suite_name: None,
        status: status.map(XrayStatus::parse),
    }
}

pub fn result(link: Option<&str>, name: &str, status: Option<&str>) -> RunnerResult {
    RunnerResult {
        suite_name: Some(name.to_string()),
        result_link: link.map(str::to_string),
        status: status.map(RunnerStatus::parse),
        error_detail: None,
    }
}

fn unavailable(system: System) -> SyncError {
    SyncError::api(system, StatusCode::SERVICE_UNAVAILABLE, "unavailable")
}

#[derive(Default)]
struct XrayCalls {
    page_starts: HashMap<String, Vec<usize>>,
    epic_page_starts: HashMap<String, Vec<usize>>,
    batches_sent: usize,
    batch_sizes: Vec<usize>,
    written: Vec<StatusUpdate>,
}

#[derive(Default)]
pub struct FakeXray {
    executions: Mutex<HashMap<String, Vec<TestRun>>>,
    epics: HashMap<String, String>,
    failing_batches: HashSet<usize>,
    calls: Mutex<XrayCalls>,
}

impl FakeXray {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_execution(mut self, execution_id: &str, runs: Vec<TestRun>) -> Self {
        self.executions
            .get_mut()
            .unwrap()
            .insert(execution_id.to_string(), runs);
        self
    }

    pub fn with_epic(mut self, epic_key: &str, execution_id: &str) -> Self {
        self.epics
            .insert(epic_key.to_string(), execution_id.to_string());
        self
    }

    /// Fail the nth status batch written (zero-based).
    pub fn failing_batch(mut self, index: usize) -> Self {
        self.failing_batches.insert(index);
        self
    }

    pub fn page_starts(&self, execution_id: &str) -> Vec<usize> {
        let calls = self.calls.lock().unwrap();
        calls
            .page_starts
            .get(execution_id)
            .cloned()
            .unwrap_or_default()
    }

    pub fn epic_page_starts(&self, epic_key: &str) -> Vec<usize> {
        let calls = self.calls.lock().unwrap();
        calls
            .epic_page_starts
            .get(epic_key)
            .cloned()
            .unwrap_or_default()
    }

    /// Sizes of all batches sent, including failed ones.
    pub fn batch_sizes(&self) -> Vec<usize> {
        self.calls.lock().unwrap().batch_sizes.clone()
    }

    /// Run ids of successfully written updates.
    pub fn written_run_ids(&self) -> Vec<String> {
        let calls = self.calls.lock().unwrap();
        calls.written.iter().map(|u| u.run_id.clone()).collect()
    }

    fn page_of(&self, execution_id: &str, page: PageParams) -> Option<Page<ExecutionTest>> {
        let executions = self.executions.lock().unwrap();
        let runs = executions.get(execution_id)?;
        let items = runs
            .iter()
            .skip(page.start)
            .take(page.limit)
            .map(|r| ExecutionTest {
                issue_id: r.test_issue_id.clone(),
            })
            .collect();
        Some(Page {
            total: runs.len(),
            items,
        })
    }
}

#[async_trait]
impl XrayApi for FakeXray {
    async fn execution_tests(
        &self,
        execution_id: &str,
        page: PageParams,
    ) -> SyncResult<Page<ExecutionTest>> {
        self.calls
            .lock()
            .unwrap()
            .page_starts
            .entry(execution_id.to_string())
            .or_default()
            .push(page.start);
        self.page_of(execution_id, page)
            .ok_or_else(|| SyncError::ExecutionNotFound(execution_id.to_string()))
    }

    async fn test_runs(
        &self,
        execution_id: &str,
        test_issue_ids: &[String],
    ) -> SyncResult<Vec<TestRun>> {
        let executions = self.executions.lock().unwrap();
        let runs = executions.get(execution_id).cloned().unwrap_or_default();
        Ok(runs
            .into_iter()
            .filter(|r| test_issue_ids.contains(&r.test_issue_id))
            .collect())
    }

    async fn epic_execution_tests(
        &self,
        epic_key: &str,
        page: PageParams,
    ) -> SyncResult<Option<EpicExecutionPage>> {
        self.calls
            .lock()
            .unwrap()
            .epic_page_starts
            .entry(epic_key.to_string())
            .or_default()
            .push(page.start);
        let Some(execution_id) = self.epics.get(epic_key) else {
            return Ok(None);
        };
        Ok(self
            .page_of(execution_id, page)
            .map(|tests| EpicExecutionPage {
                execution_id: execution_id.clone(),
                tests,
            }))
    }

    async fn update_statuses(&self, updates: &[StatusUpdate]) -> SyncResult<()> {
        let mut calls = self.calls.lock().unwrap();
        let index = calls.batches_sent;
        calls.batches_sent += 1;
        calls.batch_sizes.push(updates.len());
        if self.failing_batches.contains(&index) {
            return Err(unavailable(System::Xray));
        }
        calls.written.extend_from_slice(updates);

        // Written statuses show up in later reads, as they do in Xray.
        let mut executions = self.executions.lock().unwrap();
        for run in executions.values_mut().flatten() {
            if let Some(update) = updates.iter().find(|u| u.run_id == run.id) {
                run.status = Some(update.status.clone());
            }
        }
        Ok(())
    }
}

pub struct FakeRunner {
    results: Vec<RunnerResult>,
    failing: bool,
    calls: AtomicUsize,
    refreshes: usize,
}

impl FakeRunner {
    pub fn new(results: Vec<RunnerResult>) -> Self {
        FakeRunner {
            results,
            failing: false,
            calls: AtomicUsize::new(0),
            refreshes: 0,
        }
    }

    /// Every results lookup fails.
    pub fn failing(mut self) -> Self {
        self.failing = true;
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn refresh_count(&self) -> usize {
        self.refreshes
    }
}

#[async_trait]
impl ResultRunner for FakeRunner {
    async fn refresh_token(&mut self) -> SyncResult<()> {
        self.refreshes += 1;
        Ok(())
    }

    async fn latest_results(&self, suite_keys: &[String]) -> SyncResult<Vec<RunnerResult>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing {
            return Err(unavailable(System::Nextworld));
        }
        let requested = |key: &Option<String>| {
            key.as_ref()
                .is_some_and(|k| suite_keys.iter().any(|s| s == k))
        };
        Ok(self
            .results
            .iter()
            .filter(|r| requested(&r.result_link) || requested(&r.suite_name))
            .cloned()
            .collect())
    }
}

pub struct FakeJira {
    epics: Vec<String>,
    failing_updates: HashSet<String>,
    searches: Mutex<Vec<String>>,
    updates: Mutex<Vec<(String, Value)>>,
}

impl FakeJira {
    pub fn new(epics: &[&str]) -> Self {
        FakeJira {
            epics: epics.iter().map(|e| e.to_string()).collect(),
            failing_updates: HashSet::new(),
            searches: Mutex::new(Vec::new()),
            updates: Mutex::new(Vec::new()),
        }
    }

    pub fn failing_update(mut self, epic_key: &str) -> Self {
        self.failing_updates.insert(epic_key.to_string());
        self
    }

    /// JQL of every search made.
    pub fn searches(&self) -> Vec<String> {
        self.searches.lock().unwrap().clone()
    }

    /// Successful updates, in order.
    pub fn updates(&self) -> Vec<(String, Value)> {
        self.updates.lock().unwrap().clone()
    }
}

#[async_trait]
impl IssueTracker for FakeJira {
    async fn search_epics(&self, filter: &JqlFilter) -> SyncResult<Vec<Epic>> {
        self.searches.lock().unwrap().push(filter.to_jql());
        Ok(self.epics.iter().map(|key| Epic { key: key.clone() }).collect())
    }

    async fn update_fields(&self, issue_key: &str, body: &Value) -> SyncResult<()> {
        if self.failing_updates.contains(issue_key) {
            return Err(unavailable(System::Jira));
        }
        self.updates
            .lock()
            .unwrap()
            .push((issue_key.to_string(), body.clone()));
        Ok(())
    }
}
