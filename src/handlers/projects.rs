use std::collections::HashMap;

use axum::body::Bytes;
use axum::extract::{Multipart, Path, Query, State};
use axum::{Extension, Json};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::ApiError;
use crate::middleware::AuthUser;
use crate::projects::{
    ImportOutcome, ImportSource, Project, ProjectCreate, ProjectUpdate, ProjectWithCounts,
    RunTestsRequest, TestRun, Upload,
};
use crate::state::AppState;

/// Text fields plus the optional `openapi_file` part of a project form.
struct ProjectForm {
    fields: HashMap<String, String>,
    upload: Option<Upload>,
}

async fn read_project_form(mut multipart: Multipart) -> Result<ProjectForm, ApiError> {
    let mut fields = HashMap::new();
    let mut upload = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::validation(format!("invalid form data: {}", e)))?
    {
        let name = field.name().unwrap_or_default().to_string();
        if name == "openapi_file" {
            let filename = field.file_name().unwrap_or("openapi.json").to_string();
            let bytes = field
                .bytes()
                .await
                .map_err(|e| ApiError::validation(format!("failed to read upload: {}", e)))?;
            upload = Some(Upload { filename, bytes: bytes.to_vec() });
        } else {
            let text = field
                .text()
                .await
                .map_err(|e| ApiError::validation(format!("invalid form field '{}': {}", name, e)))?;
            fields.insert(name, text);
        }
    }

    Ok(ProjectForm { fields, upload })
}

fn parse_field<T: DeserializeOwned>(name: &str, value: &str) -> Result<T, ApiError> {
    serde_json::from_value(Value::String(value.to_string()))
        .map_err(|_| ApiError::validation(format!("invalid value '{}' for field '{}'", value, name)))
}

fn required<'a>(fields: &'a HashMap<String, String>, name: &str) -> Result<&'a str, ApiError> {
    fields
        .get(name)
        .map(String::as_str)
        .ok_or_else(|| ApiError::validation(format!("missing required field '{}'", name)))
}

/// GET /projects - All projects the caller has access to
pub async fn list(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<Vec<ProjectWithCounts>>, ApiError> {
    let projects = state.projects.list(&user.user_id).await?;
    Ok(Json(projects))
}

/// POST /projects - Create a project (multipart: url fields or a file part)
pub async fn create(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    multipart: Multipart,
) -> Result<Json<Project>, ApiError> {
    let form = read_project_form(multipart).await?;

    let request = ProjectCreate {
        name: required(&form.fields, "name")?.to_string(),
        description: form.fields.get("description").cloned(),
        project_type: parse_field("type", required(&form.fields, "type")?)?,
        account_type: parse_field("account_type", required(&form.fields, "account_type")?)?,
        openapi_url: form.fields.get("openapi_url").cloned(),
    };

    let project = state.projects.create(&user.user_id, request, form.upload).await?;
    Ok(Json(project))
}

/// GET /projects/:id - One project with derived counts
pub async fn get(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(project_id): Path<String>,
) -> Result<Json<ProjectWithCounts>, ApiError> {
    let project = state.projects.get(&project_id, &user.user_id).await?;
    Ok(Json(project))
}

/// PUT /projects/:id - Partial update, including type migration
pub async fn update(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(project_id): Path<String>,
    multipart: Multipart,
) -> Result<Json<Project>, ApiError> {
    let form = read_project_form(multipart).await?;

    let update = ProjectUpdate {
        name: form.fields.get("name").cloned(),
        description: form.fields.get("description").cloned(),
        project_type: match form.fields.get("type") {
            Some(value) => Some(parse_field("type", value)?),
            None => None,
        },
        account_type: match form.fields.get("account_type") {
            Some(value) => Some(parse_field("account_type", value)?),
            None => None,
        },
        openapi_url: form.fields.get("openapi_url").cloned(),
    };

    let project = state.projects.update(&project_id, &user.user_id, update, form.upload).await?;
    Ok(Json(project))
}

/// DELETE /projects/:id - Delete the project and everything under it
pub async fn delete(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(project_id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    state.projects.delete(&project_id, &user.user_id).await?;
    Ok(Json(json!({ "message": "Project deleted" })))
}

/// GET /projects/:id/endpoints - Imported endpoint catalog
pub async fn endpoints(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(project_id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let endpoints = state.projects.endpoints(&project_id, &user.user_id).await?;
    Ok(Json(json!(endpoints)))
}

/// POST /projects/:id/import-schema - Re-import from an explicit source or
/// the project's configured one
pub async fn import_schema(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(project_id): Path<String>,
    multipart: Multipart,
) -> Result<Json<ImportOutcome>, ApiError> {
    let form = read_project_form(multipart).await?;

    let source = if let Some(upload) = form.upload {
        Some(ImportSource::Bytes(upload.bytes))
    } else {
        form.fields.get("openapi_url").cloned().map(ImportSource::Url)
    };

    let outcome = state.projects.import_schema(&project_id, &user.user_id, source).await?;
    Ok(Json(outcome))
}

/// POST /projects/:id/run-tests - Execute a batch of endpoint tests. The
/// body is optional; an unparseable one is rejected rather than defaulted.
pub async fn run_tests(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(project_id): Path<String>,
    body: Bytes,
) -> Result<Json<TestRun>, ApiError> {
    let request: RunTestsRequest = if body.is_empty() {
        RunTestsRequest::default()
    } else {
        serde_json::from_slice(&body)
            .map_err(|e| ApiError::validation(format!("invalid request body: {}", e)))?
    };
    let run = state
        .projects
        .run_tests(&project_id, &user.user_id, request.tests, request.base_url)
        .await?;
    Ok(Json(run))
}

fn default_history_limit() -> i64 {
    10
}

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    #[serde(default = "default_history_limit")]
    pub limit: i64,
}

/// GET /projects/:id/test-history - Recent runs, newest first
pub async fn test_history(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(project_id): Path<String>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<Vec<TestRun>>, ApiError> {
    let runs = state.projects.test_history(&project_id, &user.user_id, query.limit).await?;
    Ok(Json(runs))
}

/// GET /projects/:id/test-runs/:run_id - One run with hydrated results
pub async fn test_run_detail(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path((project_id, run_id)): Path<(String, String)>,
) -> Result<Json<TestRun>, ApiError> {
    let run = state.projects.test_run_detail(&project_id, &run_id, &user.user_id).await?;
    Ok(Json(run))
}

fn default_time_range() -> String {
    "7d".to_string()
}

#[derive(Debug, Deserialize)]
pub struct PerformanceQuery {
    #[serde(rename = "timeRange", default = "default_time_range")]
    pub time_range: String,
}

/// GET /projects/:id/performance - Static performance summary
pub async fn performance(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(project_id): Path<String>,
    Query(query): Query<PerformanceQuery>,
) -> Result<Json<Value>, ApiError> {
    let data = state.projects.performance(&project_id, &user.user_id, &query.time_range).await?;
    Ok(Json(data))
}
