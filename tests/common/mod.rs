use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use serde_json::Value;
use tower::ServiceExt;

use apiverge_api::aimodels::AiModelService;
use apiverge_api::auth::{generate_jwt, Claims, JwtVerifier};
use apiverge_api::projects::executor::{TestExecutor, TestOutcome};
use apiverge_api::projects::import::{FetchError, SchemaFetcher};
use apiverge_api::projects::{Endpoint, ProjectService, TestStatus};
use apiverge_api::state::AppState;
use apiverge_api::store::{MemoryBlobStore, MemoryDocumentStore};
use apiverge_api::users::UserService;

pub const JWT_SECRET: &str = "integration-test-secret";

/// Three endpoints; the parser extracts them in document order.
pub const SPEC_JSON: &[u8] = br#"{
    "openapi": "3.0.0",
    "paths": {
        "/ok/pets": {"get": {"tags": ["pets"]}, "post": {}},
        "/broken": {"get": {}}
    }
}"#;

/// Serves one canned schema document for any URL.
struct StaticFetcher(Vec<u8>);

#[async_trait]
impl SchemaFetcher for StaticFetcher {
    async fn fetch(&self, _url: &str) -> Result<Vec<u8>, FetchError> {
        Ok(self.0.clone())
    }
}

/// Passes endpoints under /ok, fails the rest.
struct ScriptedExecutor;

#[async_trait]
impl TestExecutor for ScriptedExecutor {
    async fn execute(&self, _base_url: Option<&str>, endpoint: &Endpoint) -> TestOutcome {
        let passed = endpoint.path.starts_with("/ok");
        TestOutcome {
            status: if passed { TestStatus::Passed } else { TestStatus::Failed },
            response_time_ms: 5.0,
            status_code: if passed { 200 } else { 500 },
            assertions: Vec::new(),
            error: None,
        }
    }
}

pub struct TestApp {
    pub router: Router,
    pub documents: Arc<MemoryDocumentStore>,
    pub blobs: Arc<MemoryBlobStore>,
}

pub fn test_app() -> TestApp {
    let documents = Arc::new(MemoryDocumentStore::new());
    let blobs = Arc::new(MemoryBlobStore::new());

    let state = AppState {
        projects: Arc::new(ProjectService::new(
            documents.clone(),
            blobs.clone(),
            Arc::new(StaticFetcher(SPEC_JSON.to_vec())),
            Arc::new(ScriptedExecutor),
        )),
        users: Arc::new(UserService::new(documents.clone())),
        aimodels: Arc::new(AiModelService::new(documents.clone())),
        verifier: Arc::new(JwtVerifier::new(JWT_SECRET)),
        documents: documents.clone(),
    };

    TestApp { router: apiverge_api::app(state), documents, blobs }
}

pub fn token(subject: &str) -> String {
    let claims = Claims::new(subject.to_string(), None);
    generate_jwt(&claims, JWT_SECRET).expect("token generation")
}

/// Builds a multipart/form-data body with optional `openapi_file` part.
pub fn multipart(
    fields: &[(&str, &str)],
    file: Option<(&str, &[u8])>,
) -> (&'static str, Vec<u8>) {
    const BOUNDARY: &str = "testboundary";
    let mut body = Vec::new();

    for (name, value) in fields {
        body.extend(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
            )
            .as_bytes(),
        );
    }
    if let Some((filename, bytes)) = file {
        body.extend(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"openapi_file\"; \
                 filename=\"{filename}\"\r\nContent-Type: application/json\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(bytes);
        body.extend(b"\r\n");
    }
    body.extend(format!("--{BOUNDARY}--\r\n").as_bytes());

    ("multipart/form-data; boundary=testboundary", body)
}

pub struct TestResponse {
    pub status: StatusCode,
    pub body: Value,
}

pub async fn send(
    router: &Router,
    method: &str,
    uri: &str,
    bearer: Option<&str>,
    content_type: Option<&str>,
    body: Vec<u8>,
) -> Result<TestResponse> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(bearer) = bearer {
        builder = builder.header("Authorization", format!("Bearer {}", bearer));
    }
    if let Some(content_type) = content_type {
        builder = builder.header("Content-Type", content_type);
    }

    let response = router.clone().oneshot(builder.body(Body::from(body))?).await?;
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await?;
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };

    Ok(TestResponse { status, body })
}

pub async fn get(router: &Router, uri: &str, bearer: Option<&str>) -> Result<TestResponse> {
    send(router, "GET", uri, bearer, None, Vec::new()).await
}

pub async fn post_json(
    router: &Router,
    uri: &str,
    bearer: Option<&str>,
    body: &Value,
) -> Result<TestResponse> {
    send(router, "POST", uri, bearer, Some("application/json"), serde_json::to_vec(body)?).await
}
