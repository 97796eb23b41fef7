//! Xray cloud client: authentication, paged reads and batched status writes.

use std::fmt::Write as _;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use tracing::{debug, info};

use crate::config::XraySettings;
use crate::error::{SyncError, SyncResult, System};
use crate::models::{ExecutionTest, Page, PageParams, StatusUpdate, TestRun, XrayStatus};
use crate::services::graphql::{GraphQlRequest, GraphQlResponse};
use crate::services::http::{ensure_success, read_json};
use crate::services::jira::quote_jql;

const EXECUTION_TESTS_QUERY: &str = r#"
query ExecutionTests($issueId: String!, $limit: Int!, $start: Int!) {
  getTestExecution(issueId: $issueId) {
    issueId
    tests(limit: $limit, start: $start) {
      total
      results {
        issueId
      }
    }
  }
}
"#;

const TEST_RUNS_QUERY: &str = r#"
query TestRuns($testIssueIds: [String], $testExecIssueIds: [String], $limit: Int!, $fields: [String]) {
  getTestRuns(testIssueIds: $testIssueIds, testExecIssueIds: $testExecIssueIds, limit: $limit) {
    total
    results {
      id
      status {
        name
      }
      test {
        issueId
        jira(fields: $fields)
      }
    }
  }
}
"#;

const EPIC_EXECUTION_QUERY: &str = r#"
query EpicExecution($jql: String!, $limit: Int!, $start: Int!) {
  getTestExecutions(jql: $jql, limit: 1) {
    results {
      issueId
      tests(limit: $limit, start: $start) {
        total
        results {
          issueId
        }
      }
    }
  }
}
"#;

/// Tests of the test execution linked to an epic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EpicExecutionPage {
    pub execution_id: String,
    pub tests: Page<ExecutionTest>,
}

/// Operations the sync needs from Xray.
#[async_trait]
pub trait XrayApi: Send + Sync {
    /// One page of the tests in a test execution.
    async fn execution_tests(
        &self,
        execution_id: &str,
        page: PageParams,
    ) -> SyncResult<Page<ExecutionTest>>;

    /// Test runs of the given tests within a test execution.
    async fn test_runs(&self, execution_id: &str, test_issue_ids: &[String])
    -> SyncResult<Vec<TestRun>>;

    /// One page of the tests of the first test execution under an epic, if any.
    async fn epic_execution_tests(
        &self,
        epic_key: &str,
        page: PageParams,
    ) -> SyncResult<Option<EpicExecutionPage>>;

    /// Write a batch of test run statuses in a single mutation.
    async fn update_statuses(&self, updates: &[StatusUpdate]) -> SyncResult<()>;
}

/// HTTP client for the Xray cloud GraphQL API.
pub struct XrayClient {
    http: reqwest::Client,
    base_url: String,
    token: SecretString,
    suite_link_field: String,
    suite_name_field: String,
}

impl XrayClient {
    /// Exchange the client credentials for a bearer token.
    pub async fn authenticate(http: reqwest::Client, settings: &XraySettings) -> SyncResult<Self> {
        let client_id = settings
            .client_id
            .as_deref()
            .ok_or_else(|| SyncError::auth(System::Xray, "client id not configured"))?;
        let client_secret = settings
            .client_secret
            .as_ref()
            .ok_or_else(|| SyncError::auth(System::Xray, "client secret not configured"))?;

        let response = http
            .post(format!("{}/api/v2/authenticate", settings.url))
            .json(&serde_json::json!({
                "client_id": client_id,
                "client_secret": client_secret.expose_secret(),
            }))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SyncError::auth(
                System::Xray,
                format!("status {}: {}. Check credentials and network connection", status, body),
            ));
        }

        // The token comes back as a bare JSON string.
        let token: Option<String> = response
            .json()
            .await
            .map_err(|e| SyncError::auth(System::Xray, e.to_string()))?;
        let token = token
            .filter(|t| !t.is_empty())
            .ok_or_else(|| SyncError::auth(System::Xray, "empty token in response"))?;

        info!("Authenticated with Xray");

        Ok(XrayClient {
            http,
            base_url: settings.url.clone(),
            token: SecretString::from(token),
            suite_link_field: settings.suite_link_field.clone(),
            suite_name_field: settings.suite_name_field.clone(),
        })
    }

    async fn execute<T: DeserializeOwned>(&self, request: &GraphQlRequest) -> SyncResult<T> {
        let response = self
            .http
            .post(format!("{}/api/v2/graphql", self.base_url))
            .bearer_auth(self.token.expose_secret())
            .json(request)
            .send()
            .await?;

        let envelope: GraphQlResponse<T> = read_json(System::Xray, response).await?;
        envelope.into_data()
    }

    fn jira_fields(&self) -> Vec<&str> {
        vec![
            self.suite_link_field.as_str(),
            self.suite_name_field.as_str(),
            "summary",
        ]
    }
}

#[async_trait]
impl XrayApi for XrayClient {
    async fn execution_tests(
        &self,
        execution_id: &str,
        page: PageParams,
    ) -> SyncResult<Page<ExecutionTest>> {
        let request = GraphQlRequest::new(EXECUTION_TESTS_QUERY)
            .var("issueId", execution_id)
            .var("limit", page.limit)
            .var("start", page.start);

        let data: ExecutionTestsData = self.execute(&request).await?;
        let execution = data
            .get_test_execution
            .ok_or_else(|| SyncError::ExecutionNotFound(execution_id.to_string()))?;

        debug!(
            "Xray execution {} page start={} returned {} of {} tests",
            execution_id,
            page.start,
            execution.tests.results.len(),
            execution.tests.total
        );

        Ok(execution.tests.into_page())
    }

    async fn test_runs(
        &self,
        execution_id: &str,
        test_issue_ids: &[String],
    ) -> SyncResult<Vec<TestRun>> {
        if test_issue_ids.is_empty() {
            return Ok(Vec::new());
        }

        let request = GraphQlRequest::new(TEST_RUNS_QUERY)
            .var("testIssueIds", test_issue_ids)
            .var("testExecIssueIds", vec![execution_id])
            .var("limit", test_issue_ids.len())
            .var("fields", self.jira_fields());

        let data: TestRunsData = self.execute(&request).await?;
        let runs = data
            .get_test_runs
            .map(|r| r.results)
            .unwrap_or_default()
            .into_iter()
            .map(|node| node.into_test_run(&self.suite_link_field, &self.suite_name_field))
            .collect();

        Ok(runs)
    }

    async fn epic_execution_tests(
        &self,
        epic_key: &str,
        page: PageParams,
    ) -> SyncResult<Option<EpicExecutionPage>> {
        let request = GraphQlRequest::new(EPIC_EXECUTION_QUERY)
            .var("jql", format!("parent = {}", quote_jql(epic_key)))
            .var("limit", page.limit)
            .var("start", page.start);

        let data: EpicExecutionData = self.execute(&request).await?;
        let first = data
            .get_test_executions
            .and_then(|r| r.results.into_iter().next());

        Ok(first.map(|execution| EpicExecutionPage {
            execution_id: execution.issue_id,
            tests: execution.tests.into_page(),
        }))
    }

    async fn update_statuses(&self, updates: &[StatusUpdate]) -> SyncResult<()> {
        if updates.is_empty() {
            return Ok(());
        }

        let request = status_update_mutation(updates);
        let response = self
            .http
            .post(format!("{}/api/v2/graphql", self.base_url))
            .bearer_auth(self.token.expose_secret())
            .json(&request)
            .send()
            .await?;
        let response = ensure_success(System::Xray, response).await?;

        let bytes = response.bytes().await?;
        let envelope: GraphQlResponse<Value> =
            serde_json::from_slice(&bytes).map_err(|e| SyncError::decode(System::Xray, e))?;
        envelope.into_data().map(|_| ())
    }
}

/// Build one mutation updating every run in the batch.
///
/// Each `updateTestRunStatus` field needs its own alias; ids and statuses
/// are bound as variables.
pub fn status_update_mutation(updates: &[StatusUpdate]) -> GraphQlRequest {
    let mut params = Vec::with_capacity(updates.len() * 2);
    let mut fields = String::new();

    for n in 1..=updates.len() {
        params.push(format!("$id{n}: String!"));
        params.push(format!("$status{n}: String!"));
        let _ = writeln!(
            fields,
            "  alias{n}: updateTestRunStatus(id: $id{n}, status: $status{n})"
        );
    }

    let query = format!(
        "mutation UpdateTestRunStatuses({}) {{\n{}}}\n",
        params.join(", "),
        fields
    );

    updates
        .iter()
        .enumerate()
        .fold(GraphQlRequest::new(query), |request, (i, update)| {
            let n = i + 1;
            request
                .var(&format!("id{n}"), update.run_id.as_str())
                .var(&format!("status{n}"), update.status.as_str())
        })
}

fn jira_string(jira: &Map<String, Value>, field: &str) -> Option<String> {
    match jira.get(field) {
        Some(Value::String(s)) if !s.is_empty() => Some(s.clone()),
        _ => None,
    }
}

// Response shapes

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ExecutionTestsData {
    get_test_execution: Option<ExecutionNode>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ExecutionNode {
    issue_id: String,
    tests: TestsConnection,
}

#[derive(Debug, Deserialize)]
struct TestsConnection {
    total: usize,
    #[serde(default)]
    results: Vec<TestNode>,
}

impl TestsConnection {
    fn into_page(self) -> Page<ExecutionTest> {
        Page {
            total: self.total,
            items: self
                .results
                .into_iter()
                .map(|t| ExecutionTest { issue_id: t.issue_id })
                .collect(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TestNode {
    issue_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TestRunsData {
    get_test_runs: Option<TestRunsConnection>,
}

#[derive(Debug, Deserialize)]
struct TestRunsConnection {
    #[serde(default)]
    results: Vec<TestRunNode>,
}

#[derive(Debug, Deserialize)]
struct TestRunNode {
    id: String,
    status: Option<StatusNode>,
    test: Option<TestRunTestNode>,
}

#[derive(Debug, Deserialize)]
struct StatusNode {
    name: XrayStatus,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TestRunTestNode {
    issue_id: String,
    #[serde(default)]
    jira: Option<Map<String, Value>>,
}

impl TestRunNode {
    fn into_test_run(self, link_field: &str, name_field: &str) -> TestRun {
        let (test_issue_id, jira) = match self.test {
            Some(test) => (test.issue_id, test.jira.unwrap_or_default()),
            None => (String::new(), Map::new()),
        };

        TestRun {
            id: self.id,
            test_issue_id,
            summary: jira_string(&jira, "summary"),
            suite_link: jira_string(&jira, link_field),
            suite_name: jira_string(&jira, name_field),
            status: self.status.map(|s| s.name),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EpicExecutionData {
    get_test_executions: Option<ExecutionsConnection>,
}

#[derive(Debug, Deserialize)]
struct ExecutionsConnection {
    #[serde(default)]
    results: Vec<ExecutionNode>,
}
