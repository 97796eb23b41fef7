//! Mock Xray, Jira and Nextworld services for E2E tests.
//!
//! Starts one in-process HTTP server that answers each system under its own
//! path prefix (`/xray`, `/jira`, `/nextworld`) and records every request
//! the sync makes.

use actix_web::{App, HttpRequest, HttpResponse, HttpServer, get, post, put, web};
use base64::{Engine, engine::general_purpose::STANDARD};
use serde_json::{Value, json};
use std::collections::HashMap;
use std::net::TcpListener;
use std::sync::{Arc, Mutex};

use xray_sync_lib::config::Config;

pub const XRAY_CLIENT_ID: &str = "xray-client";
pub const XRAY_CLIENT_SECRET: &str = "xray-secret";
pub const XRAY_TOKEN: &str = "xray-token";
pub const NEXTWORLD_EMAIL: &str = "runner@example.com";
pub const NEXTWORLD_PASSWORD: &str = "runner-password";
pub const JIRA_EMAIL: &str = "sync@example.com";
pub const JIRA_TOKEN: &str = "jira-token";

/// A test run stored in the mock Xray.
#[derive(Debug, Clone)]
pub struct MockRun {
    pub id: String,
    pub test_issue_id: String,
    pub summary: String,
    pub suite_link: Option<String>,
    pub suite_name: Option<String>,
    pub status: Option<String>,
}

impl MockRun {
    pub fn linked(id: &str, test_issue_id: &str, summary: &str, link: &str) -> Self {
        MockRun {
            id: id.to_string(),
            test_issue_id: test_issue_id.to_string(),
            summary: summary.to_string(),
            suite_link: Some(link.to_string()),
            suite_name: None,
            status: Some("TO DO".to_string()),
        }
    }

    pub fn named(id: &str, test_issue_id: &str, summary: &str, suite_name: &str) -> Self {
        MockRun {
            id: id.to_string(),
            test_issue_id: test_issue_id.to_string(),
            summary: summary.to_string(),
            suite_link: None,
            suite_name: Some(suite_name.to_string()),
            status: Some("TO DO".to_string()),
        }
    }

    pub fn with_status(id: &str, test_issue_id: &str, status: &str) -> Self {
        MockRun {
            id: id.to_string(),
            test_issue_id: test_issue_id.to_string(),
            summary: format!("Test {}", test_issue_id),
            suite_link: None,
            suite_name: None,
            status: Some(status.to_string()),
        }
    }
}

/// A Nextworld suite with its latest result.
#[derive(Debug, Clone)]
pub struct MockSuite {
    pub name: String,
    pub link: String,
    pub status: String,
}

/// Data served and requests recorded by the mock.
#[derive(Debug, Default)]
pub struct MockState {
    // Xray
    pub executions: HashMap<String, Vec<MockRun>>,
    pub epic_executions: HashMap<String, String>,
    pub fail_mutations: bool,
    pub execution_page_starts: Vec<u64>,
    pub mutation_batch_sizes: Vec<usize>,
    pub xray_auth_calls: usize,
    // Nextworld
    pub suites: Vec<MockSuite>,
    pub fail_results: bool,
    pub nextworld_auth_bodies: Vec<Value>,
    pub results_requests: Vec<(String, Value)>,
    pub last_runner_token: Option<String>,
    // Jira
    pub epics: Vec<String>,
    pub jira_searches: Vec<HashMap<String, String>>,
    pub jira_updates: Vec<(String, Value)>,
    pub failing_epic_updates: Vec<String>,
}

type SharedState = web::Data<Arc<Mutex<MockState>>>;

fn bearer(req: &HttpRequest) -> Option<String> {
    req.headers()
        .get("Authorization")?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::to_string)
}

fn basic_credentials(req: &HttpRequest) -> Option<(String, String)> {
    let encoded = req
        .headers()
        .get("Authorization")?
        .to_str()
        .ok()?
        .strip_prefix("Basic ")?
        .to_string();
    let decoded = String::from_utf8(STANDARD.decode(encoded).ok()?).ok()?;
    let (user, password) = decoded.split_once(':')?;
    Some((user.to_string(), password.to_string()))
}

// Xray

#[post("/xray/api/v2/authenticate")]
async fn xray_authenticate(state: SharedState, body: web::Json<Value>) -> HttpResponse {
    state.lock().unwrap().xray_auth_calls += 1;
    if body["client_id"] == XRAY_CLIENT_ID && body["client_secret"] == XRAY_CLIENT_SECRET {
        HttpResponse::Ok().json(XRAY_TOKEN)
    } else {
        HttpResponse::Unauthorized()
            .json(json!({"error": "Authentication failed. Invalid client credentials!"}))
    }
}

fn tests_connection(runs: &[MockRun], start: usize, limit: usize) -> Value {
    let results: Vec<Value> = runs
        .iter()
        .skip(start)
        .take(limit)
        .map(|r| json!({"issueId": r.test_issue_id}))
        .collect();
    json!({"total": runs.len(), "results": results})
}

fn page_vars(vars: &Value) -> (usize, usize) {
    let start = vars["start"].as_u64().unwrap_or(0) as usize;
    let limit = vars["limit"].as_u64().unwrap_or(100) as usize;
    (start, limit)
}

#[post("/xray/api/v2/graphql")]
async fn xray_graphql(
    state: SharedState,
    req: HttpRequest,
    body: web::Json<Value>,
) -> HttpResponse {
    if bearer(&req).as_deref() != Some(XRAY_TOKEN) {
        return HttpResponse::Unauthorized().finish();
    }

    let query = body["query"].as_str().unwrap_or_default();
    let vars = &body["variables"];
    let mut state = state.lock().unwrap();

    if query.trim_start().starts_with("mutation") {
        if state.fail_mutations {
            return HttpResponse::InternalServerError().body("mutation rejected");
        }
        let batch = vars.as_object().map(|v| v.len() / 2).unwrap_or(0);
        state.mutation_batch_sizes.push(batch);
        let mut data = serde_json::Map::new();
        for n in 1..=batch {
            let id = vars[format!("id{n}")].as_str().unwrap_or_default().to_string();
            let status = vars[format!("status{n}")].as_str().unwrap_or_default().to_string();
            for run in state.executions.values_mut().flatten() {
                if run.id == id {
                    run.status = Some(status.clone());
                }
            }
            data.insert(format!("alias{n}"), Value::Null);
        }
        return HttpResponse::Ok().json(json!({"data": data}));
    }

    if query.contains("getTestExecutions(") {
        let jql = vars["jql"].as_str().unwrap_or_default();
        let epic_key = jql.split('"').nth(1).unwrap_or_default();
        let (start, limit) = page_vars(vars);
        let results: Vec<Value> = state
            .epic_executions
            .get(epic_key)
            .and_then(|exec_id| state.executions.get(exec_id).map(|runs| (exec_id, runs)))
            .map(|(exec_id, runs)| {
                vec![json!({"issueId": exec_id, "tests": tests_connection(runs, start, limit)})]
            })
            .unwrap_or_default();
        return HttpResponse::Ok()
            .json(json!({"data": {"getTestExecutions": {"results": results}}}));
    }

    if query.contains("getTestExecution(") {
        let exec_id = vars["issueId"].as_str().unwrap_or_default();
        let (start, limit) = page_vars(vars);
        state.execution_page_starts.push(start as u64);
        let execution = state.executions.get(exec_id).map(|runs| {
            json!({"issueId": exec_id, "tests": tests_connection(runs, start, limit)})
        });
        return HttpResponse::Ok().json(json!({"data": {"getTestExecution": execution}}));
    }

    if query.contains("getTestRuns(") {
        let exec_id = vars["testExecIssueIds"][0].as_str().unwrap_or_default();
        let test_ids: Vec<&str> = vars["testIssueIds"]
            .as_array()
            .map(|ids| ids.iter().filter_map(Value::as_str).collect())
            .unwrap_or_default();
        let link_field = vars["fields"][0].as_str().unwrap_or("customfield_10490");
        let name_field = vars["fields"][1].as_str().unwrap_or("customfield_10505");
        let results: Vec<Value> = state
            .executions
            .get(exec_id)
            .map(|runs| {
                runs.iter()
                    .filter(|r| test_ids.contains(&r.test_issue_id.as_str()))
                    .map(|r| {
                        let mut jira = serde_json::Map::new();
                        jira.insert("summary".to_string(), json!(r.summary));
                        jira.insert(link_field.to_string(), json!(r.suite_link));
                        jira.insert(name_field.to_string(), json!(r.suite_name));
                        json!({
                            "id": r.id,
                            "status": r.status.as_ref().map(|s| json!({"name": s})),
                            "test": {"issueId": r.test_issue_id, "jira": jira}
                        })
                    })
                    .collect()
            })
            .unwrap_or_default();
        return HttpResponse::Ok().json(json!({
            "data": {"getTestRuns": {"total": results.len(), "results": results}}
        }));
    }

    HttpResponse::Ok().json(json!({"errors": [{"message": "unknown query"}]}))
}

// Nextworld

#[post("/nextworld/auth")]
async fn nextworld_authenticate(
    state: SharedState,
    req: HttpRequest,
    body: web::Json<Value>,
) -> HttpResponse {
    let mut state = state.lock().unwrap();
    match basic_credentials(&req) {
        Some((email, password)) if email == NEXTWORLD_EMAIL && password == NEXTWORLD_PASSWORD => {
            state.nextworld_auth_bodies.push(body.into_inner());
            let token = format!("nw-token-{}", state.nextworld_auth_bodies.len());
            HttpResponse::Ok().json(json!({"access_token": token}))
        }
        _ => HttpResponse::Unauthorized().json(json!({"error": "bad credentials"})),
    }
}

fn latest_results(
    state: &mut MockState,
    req: &HttpRequest,
    endpoint: &str,
    body: Value,
) -> HttpResponse {
    state.last_runner_token = bearer(req);
    state.results_requests.push((endpoint.to_string(), body.clone()));
    if state.fail_results {
        return HttpResponse::BadGateway().body("runner unavailable");
    }

    let (keys, by_link) = match body.get("testSuiteLinks") {
        Some(links) => (links.clone(), true),
        None => (body["testSuiteNames"].clone(), false),
    };
    let results: Vec<Value> = keys
        .as_array()
        .map(|keys| {
            keys.iter()
                .filter_map(Value::as_str)
                .map(|key| {
                    let suite = state
                        .suites
                        .iter()
                        .find(|s| if by_link { s.link == key } else { s.name == key });
                    match suite {
                        Some(s) => json!({
                            "TestSuiteName": s.name,
                            "TestResultLink": s.link,
                            "TestResultStatus": s.status,
                        }),
                        None if by_link => json!({
                            "TestSuiteName": null,
                            "TestResultLink": key,
                            "TestResultStatus": null,
                            "ErrorDetail": "Test suite not found",
                        }),
                        None => json!({
                            "TestSuiteName": key,
                            "TestResultStatus": null,
                            "ErrorMessage": "Test suite not found",
                        }),
                    }
                })
                .collect()
        })
        .unwrap_or_default();
    HttpResponse::Ok().json(results)
}

#[post("/nextworld/api/automated-testing/v1/test-suites:getLatestResultsForSuitesFromLinks")]
async fn results_by_link(
    state: SharedState,
    req: HttpRequest,
    body: web::Json<Value>,
) -> HttpResponse {
    latest_results(&mut state.lock().unwrap(), &req, "links", body.into_inner())
}

#[post("/nextworld/api/data/v1/automated-testing/test-suites:getLatestResultsForSuites")]
async fn results_by_name(
    state: SharedState,
    req: HttpRequest,
    body: web::Json<Value>,
) -> HttpResponse {
    latest_results(&mut state.lock().unwrap(), &req, "names", body.into_inner())
}

// Jira

fn jira_authorized(req: &HttpRequest) -> bool {
    basic_credentials(req) == Some((JIRA_EMAIL.to_string(), JIRA_TOKEN.to_string()))
}

#[get("/jira/rest/api/3/search")]
async fn jira_search(
    state: SharedState,
    req: HttpRequest,
    query: web::Query<HashMap<String, String>>,
) -> HttpResponse {
    if !jira_authorized(&req) {
        return HttpResponse::Unauthorized().finish();
    }
    let mut state = state.lock().unwrap();
    state.jira_searches.push(query.into_inner());
    let issues: Vec<Value> = state.epics.iter().map(|k| json!({"key": k})).collect();
    HttpResponse::Ok().json(json!({"total": issues.len(), "issues": issues}))
}

#[put("/jira/rest/api/3/issue/{key}")]
async fn jira_update(
    state: SharedState,
    req: HttpRequest,
    path: web::Path<String>,
    body: web::Json<Value>,
) -> HttpResponse {
    if !jira_authorized(&req) {
        return HttpResponse::Unauthorized().finish();
    }
    let key = path.into_inner();
    let mut state = state.lock().unwrap();
    if state.failing_epic_updates.contains(&key) {
        return HttpResponse::BadRequest().json(json!({"errorMessages": ["Field cannot be set"]}));
    }
    state.jira_updates.push((key, body.into_inner()));
    HttpResponse::NoContent().finish()
}

/// The running mock server.
pub struct MockServices {
    pub base_url: String,
    pub state: Arc<Mutex<MockState>>,
}

impl MockServices {
    /// Start the mock services on an ephemeral port.
    pub async fn start(initial: MockState) -> Self {
        let state = Arc::new(Mutex::new(initial));

        let listener = TcpListener::bind("127.0.0.1:0").expect("failed to bind");
        let port = listener.local_addr().unwrap().port();
        let base_url = format!("http://127.0.0.1:{}", port);

        let state_data = state.clone();
        let server = HttpServer::new(move || {
            App::new()
                .app_data(web::Data::new(state_data.clone()))
                .service(xray_authenticate)
                .service(xray_graphql)
                .service(nextworld_authenticate)
                .service(results_by_link)
                .service(results_by_name)
                .service(jira_search)
                .service(jira_update)
        })
        .workers(1)
        .listen(listener)
        .expect("failed to listen")
        .disable_signals()
        .run();

        // Server lives for the test's lifetime
        tokio::spawn(server);

        MockServices { base_url, state }
    }

    /// Configuration pointing every client at the mock, with overrides.
    pub fn config(&self, overrides: &[(&str, &str)]) -> Config {
        let mut vars: HashMap<String, String> = [
            ("XSYNC_XRAY_URL", format!("{}/xray", self.base_url)),
            ("XSYNC_XRAY_CLIENT_ID", XRAY_CLIENT_ID.to_string()),
            ("XSYNC_XRAY_CLIENT_SECRET", XRAY_CLIENT_SECRET.to_string()),
            ("XSYNC_TEST_EXECUTIONS", "20001".to_string()),
            ("XSYNC_NEXTWORLD_URL", format!("{}/nextworld", self.base_url)),
            ("XSYNC_NEXTWORLD_AUTH_URL", format!("{}/nextworld/auth", self.base_url)),
            ("XSYNC_NEXTWORLD_EMAIL", NEXTWORLD_EMAIL.to_string()),
            ("XSYNC_NEXTWORLD_PASSWORD", NEXTWORLD_PASSWORD.to_string()),
            ("XSYNC_NEXTWORLD_ZONE", "QA".to_string()),
            ("XSYNC_JIRA_URL", format!("{}/jira", self.base_url)),
            ("XSYNC_JIRA_EMAIL", JIRA_EMAIL.to_string()),
            ("XSYNC_JIRA_API_TOKEN", JIRA_TOKEN.to_string()),
            ("XSYNC_JIRA_PROJECTS", "APP,BOT".to_string()),
            ("XSYNC_CURRENT_RELEASE", "25.1".to_string()),
            ("XSYNC_HTTP_TIMEOUT_SECS", "10".to_string()),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect();

        for (key, value) in overrides {
            vars.insert(key.to_string(), value.to_string());
        }

        Config::from_lookup(|key| vars.get(key).cloned()).expect("mock config should load")
    }

    pub fn state(&self) -> std::sync::MutexGuard<'_, MockState> {
        self.state.lock().unwrap()
    }
}
