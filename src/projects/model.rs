use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub use crate::openapi::ParsedParameter as EndpointParameter;
use crate::types::AccountType;

/// Where a project's OpenAPI schema comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProjectType {
    Url,
    File,
}

/// A project owning an imported endpoint catalog and its test runs.
///
/// Exactly one of `openapi_url` / `openapi_file` is set, matching `type`.
/// `project_admin` may mutate; anyone in `access_users` may read.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(rename = "type")]
    pub project_type: ProjectType,
    pub account_type: AccountType,
    pub project_admin: String,
    pub access_users: Vec<String>,
    #[serde(default)]
    pub openapi_url: Option<String>,
    /// Blob-store key of the uploaded schema file.
    #[serde(default)]
    pub openapi_file: Option<String>,
    pub status: String,
    pub created_at: i64,
    pub updated_at: i64,
    #[serde(default)]
    pub last_run_at: Option<i64>,
}

/// Project plus counts derived at read time via aggregation queries.
#[derive(Debug, Clone, Serialize)]
pub struct ProjectWithCounts {
    #[serde(flatten)]
    pub project: Project,
    pub endpoints_count: i64,
    pub tests_count: i64,
}

/// Validated create request (file bytes travel separately as `Upload`).
#[derive(Debug, Clone, Deserialize)]
pub struct ProjectCreate {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(rename = "type")]
    pub project_type: ProjectType,
    pub account_type: AccountType,
    #[serde(default)]
    pub openapi_url: Option<String>,
}

/// Explicit partial-update payload: absent fields stay untouched.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProjectUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
    #[serde(rename = "type")]
    pub project_type: Option<ProjectType>,
    pub account_type: Option<AccountType>,
    pub openapi_url: Option<String>,
}

/// An uploaded schema file.
#[derive(Debug, Clone)]
pub struct Upload {
    pub filename: String,
    pub bytes: Vec<u8>,
}

/// One path+method pair extracted from the project's schema. Identity is
/// `(project_id, path, method)`; re-imports update in place.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Endpoint {
    pub id: String,
    pub project_id: String,
    pub path: String,
    pub method: String,
    #[serde(default)]
    pub tag: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub parameters: Vec<EndpointParameter>,
    #[serde(default)]
    pub request_body: Option<Value>,
    #[serde(default)]
    pub responses: Map<String, Value>,
    #[serde(default)]
    pub test_count: i64,
    pub status: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TestStatus {
    Passed,
    Failed,
    Error,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssertionOutcome {
    pub name: String,
    pub passed: bool,
    #[serde(default)]
    pub detail: Option<String>,
}

/// Outcome of one test execution against one endpoint. Read-only once
/// written.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestResult {
    pub id: String,
    pub endpoint_id: String,
    /// Denormalized for counting and cascade deletion.
    pub project_id: String,
    pub method: String,
    pub path: String,
    pub status: TestStatus,
    /// Wall time of the request, in milliseconds.
    pub response_time: f64,
    pub status_code: u16,
    pub assertions: Vec<AssertionOutcome>,
    #[serde(default)]
    pub error: Option<String>,
    pub created_at: i64,
}

/// One batch execution of endpoint tests. Immutable once written; the
/// stored document carries result ids only, hydrated on the detail read.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestRun {
    pub id: String,
    pub project_id: String,
    pub created_at: i64,
    /// Total wall time of the batch, in seconds.
    pub duration: f64,
    pub total_tests: i64,
    pub passed_tests: i64,
    pub failed_tests: i64,
    /// passed/total*100; 0 when the batch was empty.
    pub pass_rate: f64,
    pub result_ids: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub results: Option<Vec<TestResult>>,
}

/// Counts reported by a schema import.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct ImportOutcome {
    pub created: i64,
    pub updated: i64,
    pub total: i64,
}

/// Which tests a run targets: every endpoint of the project, or an explicit
/// endpoint-id list.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum TestTarget {
    Keyword(String),
    Ids(Vec<String>),
}

impl Default for TestTarget {
    fn default() -> Self {
        TestTarget::Keyword("all".to_string())
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RunTestsRequest {
    #[serde(default)]
    pub tests: TestTarget,
    /// Base URL the endpoint tests are executed against.
    #[serde(default)]
    pub base_url: Option<String>,
}
