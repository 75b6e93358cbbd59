use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use serde_json::{json, Map, Value};
use uuid::Uuid;

use crate::openapi::{self, EndpointDescriptor};
use crate::store::{BlobStore, DocumentStore, Filter, OrderBy, StoreError};

use super::executor::TestExecutor;
use super::import::{FetchError, SchemaFetcher};
use super::model::{
    Endpoint, ImportOutcome, Project, ProjectCreate, ProjectType, ProjectUpdate,
    ProjectWithCounts, TestResult, TestRun, TestStatus, TestTarget, Upload,
};

pub const PROJECTS: &str = "projects";
pub const ENDPOINTS: &str = "endpoints";
pub const TEST_RESULTS: &str = "test_results";
pub const TEST_RUNS: &str = "test_runs";

#[derive(Debug, thiserror::Error)]
pub enum ProjectError {
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Forbidden(String),
    #[error("failed to fetch schema: {0}")]
    SchemaFetch(String),
    #[error("failed to parse schema: {0}")]
    SchemaParse(String),
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<FetchError> for ProjectError {
    fn from(err: FetchError) -> Self {
        ProjectError::SchemaFetch(err.to_string())
    }
}

/// Source of an OpenAPI document for one import.
pub enum ImportSource {
    Url(String),
    Bytes(Vec<u8>),
}

/// The project workflow engine: project lifecycle, schema import, endpoint
/// catalog maintenance, and test-run orchestration over the injected
/// collaborators.
pub struct ProjectService {
    documents: Arc<dyn DocumentStore>,
    blobs: Arc<dyn BlobStore>,
    fetcher: Arc<dyn SchemaFetcher>,
    executor: Arc<dyn TestExecutor>,
}

fn now() -> i64 {
    Utc::now().timestamp()
}

fn to_doc<T: serde::Serialize>(value: &T) -> Result<Value, ProjectError> {
    serde_json::to_value(value).map_err(|e| ProjectError::Store(StoreError::Serialization(e)))
}

fn from_doc<T: serde::de::DeserializeOwned>(doc: Value) -> Result<T, ProjectError> {
    serde_json::from_value(doc).map_err(|e| ProjectError::Store(StoreError::Serialization(e)))
}

fn validate_url(url: &str) -> Result<(), ProjectError> {
    url::Url::parse(url)
        .map(|_| ())
        .map_err(|_| ProjectError::Validation(format!("'{}' is not a valid URL", url)))
}

impl ProjectService {
    pub fn new(
        documents: Arc<dyn DocumentStore>,
        blobs: Arc<dyn BlobStore>,
        fetcher: Arc<dyn SchemaFetcher>,
        executor: Arc<dyn TestExecutor>,
    ) -> Self {
        Self { documents, blobs, fetcher, executor }
    }

    /// Deterministic blob key for an uploaded schema, scoped by owner and
    /// project.
    fn blob_key(owner: &str, project_id: &str, filename: &str) -> String {
        format!("openapi_specs/{}/{}/{}", owner, project_id, filename)
    }

    fn blob_content_type(filename: &str) -> &'static str {
        if filename.ends_with(".yaml") || filename.ends_with(".yml") {
            "application/yaml"
        } else {
            "application/json"
        }
    }

    async fn load(&self, project_id: &str) -> Result<Project, ProjectError> {
        let doc = self
            .documents
            .get(PROJECTS, project_id)
            .await?
            .ok_or_else(|| ProjectError::NotFound(format!("project '{}' not found", project_id)))?;
        from_doc(doc)
    }

    fn require_access(project: &Project, caller: &str) -> Result<(), ProjectError> {
        let allowed = project.project_admin == caller
            || project.access_users.iter().any(|u| u == caller);
        if allowed {
            Ok(())
        } else {
            Err(ProjectError::Forbidden("you do not have access to this project".to_string()))
        }
    }

    fn require_admin(project: &Project, caller: &str) -> Result<(), ProjectError> {
        if project.project_admin == caller {
            Ok(())
        } else {
            Err(ProjectError::Forbidden(
                "you do not have permission to modify this project".to_string(),
            ))
        }
    }

    // ------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------

    /// Creates a project. The schema source must match the declared type;
    /// when one is supplied the first import runs synchronously before the
    /// project is returned.
    pub async fn create(
        &self,
        owner: &str,
        request: ProjectCreate,
        upload: Option<Upload>,
    ) -> Result<Project, ProjectError> {
        let id = Uuid::new_v4().to_string();
        let timestamp = now();

        let (openapi_url, openapi_file) = match request.project_type {
            ProjectType::Url => {
                let url = request.openapi_url.ok_or_else(|| {
                    ProjectError::Validation(
                        "openapi_url must be provided for type 'url'".to_string(),
                    )
                })?;
                validate_url(&url)?;
                (Some(url), None)
            }
            ProjectType::File => {
                let upload = upload.ok_or_else(|| {
                    ProjectError::Validation(
                        "file content and filename must be provided for type 'file'".to_string(),
                    )
                })?;
                let key = Self::blob_key(owner, &id, &upload.filename);
                self.blobs
                    .put(&key, &upload.bytes, Self::blob_content_type(&upload.filename))
                    .await?;
                (None, Some(key))
            }
        };

        let project = Project {
            id,
            name: request.name,
            description: request.description,
            project_type: request.project_type,
            account_type: request.account_type,
            project_admin: owner.to_string(),
            access_users: vec![owner.to_string()],
            openapi_url,
            openapi_file,
            status: "active".to_string(),
            created_at: timestamp,
            updated_at: timestamp,
            last_run_at: None,
        };

        self.documents.set(PROJECTS, &project.id, to_doc(&project)?).await?;

        // Best-effort, no rollback: an import failure leaves the project in
        // place and surfaces the error.
        self.import_for_project(&project).await?;

        Ok(project)
    }

    pub async fn get(&self, project_id: &str, caller: &str) -> Result<ProjectWithCounts, ProjectError> {
        let project = self.load(project_id).await?;
        Self::require_access(&project, caller)?;
        self.with_counts(project).await
    }

    async fn with_counts(&self, project: Project) -> Result<ProjectWithCounts, ProjectError> {
        let project_filter = [Filter::eq("project_id", project.id.clone())];
        let endpoints_count = self.documents.count(ENDPOINTS, &project_filter).await?;
        let tests_count = self.documents.count(TEST_RESULTS, &project_filter).await?;
        Ok(ProjectWithCounts { project, endpoints_count, tests_count })
    }

    /// All projects the caller has access to, newest-first.
    pub async fn list(&self, caller: &str) -> Result<Vec<ProjectWithCounts>, ProjectError> {
        let docs = self
            .documents
            .query(
                PROJECTS,
                &[Filter::array_contains("access_users", caller)],
                Some(&OrderBy::desc("created_at")),
                None,
            )
            .await?;

        let mut projects = Vec::with_capacity(docs.len());
        for doc in docs {
            projects.push(self.with_counts(from_doc(doc)?).await?);
        }
        Ok(projects)
    }

    /// Partial update. Changing `type` migrates the schema source: leaving
    /// 'file' deletes the stale blob, entering 'file' requires a new upload;
    /// the two source fields stay mutually exclusive. A new source re-runs
    /// the import.
    pub async fn update(
        &self,
        project_id: &str,
        caller: &str,
        update: ProjectUpdate,
        upload: Option<Upload>,
    ) -> Result<Project, ProjectError> {
        let mut project = self.load(project_id).await?;
        Self::require_admin(&project, caller)?;

        if let Some(name) = update.name {
            project.name = name;
        }
        if let Some(description) = update.description {
            project.description = Some(description);
        }
        if let Some(account_type) = update.account_type {
            project.account_type = account_type;
        }

        let new_type = update.project_type.unwrap_or(project.project_type);
        let type_changed = new_type != project.project_type;
        let mut source_changed = false;
        let mut stale_blob = None;

        match new_type {
            ProjectType::Url => {
                if let Some(url) = update.openapi_url {
                    validate_url(&url)?;
                    project.openapi_url = Some(url);
                    source_changed = true;
                }
                if project.openapi_url.is_none() {
                    return Err(ProjectError::Validation(
                        "openapi_url must be provided when type is 'url'".to_string(),
                    ));
                }
                stale_blob = project.openapi_file.take();
            }
            ProjectType::File => {
                match upload {
                    Some(upload) => {
                        let key = Self::blob_key(&project.project_admin, &project.id, &upload.filename);
                        self.blobs
                            .put(&key, &upload.bytes, Self::blob_content_type(&upload.filename))
                            .await?;
                        if project.openapi_file.as_deref() != Some(key.as_str()) {
                            stale_blob = project.openapi_file.take();
                        }
                        project.openapi_file = Some(key);
                        source_changed = true;
                    }
                    None if type_changed => {
                        return Err(ProjectError::Validation(
                            "file content and filename must be provided when changing type to 'file'"
                                .to_string(),
                        ));
                    }
                    None => {}
                }
                project.openapi_url = None;
            }
        }

        project.project_type = new_type;
        project.updated_at = now();

        self.documents.set(PROJECTS, &project.id, to_doc(&project)?).await?;

        // The replaced blob goes away only once the new state is stored, so a
        // rejected update never strands the document's file pointer.
        if let Some(key) = stale_blob {
            if let Err(e) = self.blobs.delete(&key).await {
                tracing::warn!(project_id, key = %key, "failed to delete stale schema blob: {}", e);
            }
        }

        if source_changed {
            self.import_for_project(&project).await?;
        }

        Ok(project)
    }

    /// Deletes the project, its stored blob, and (best-effort) every
    /// endpoint, test result, and test run under it. Not transactional: a
    /// failure partway through does not roll back prior steps.
    pub async fn delete(&self, project_id: &str, caller: &str) -> Result<(), ProjectError> {
        let project = self.load(project_id).await?;
        Self::require_admin(&project, caller)?;

        if let Some(key) = &project.openapi_file {
            if let Err(e) = self.blobs.delete(key).await {
                tracing::warn!(project_id, key = %key, "failed to delete schema blob: {}", e);
            }
        }

        let project_filter = [Filter::eq("project_id", project_id)];
        for collection in [TEST_RESULTS, ENDPOINTS, TEST_RUNS] {
            let docs = match self.documents.query(collection, &project_filter, None, None).await {
                Ok(docs) => docs,
                Err(e) => {
                    tracing::warn!(project_id, collection, "cascade query failed: {}", e);
                    continue;
                }
            };
            for doc in docs {
                let Some(id) = doc.get("id").and_then(Value::as_str) else { continue };
                if let Err(e) = self.documents.delete(collection, id).await {
                    tracing::warn!(project_id, collection, id, "cascade delete failed: {}", e);
                }
            }
        }

        self.documents.delete(PROJECTS, project_id).await?;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Endpoint catalog
    // ------------------------------------------------------------------

    pub async fn endpoints(&self, project_id: &str, caller: &str) -> Result<Vec<Endpoint>, ProjectError> {
        let project = self.load(project_id).await?;
        Self::require_access(&project, caller)?;

        let docs = self
            .documents
            .query(
                ENDPOINTS,
                &[Filter::eq("project_id", project_id)],
                Some(&OrderBy::asc("path")),
                None,
            )
            .await?;

        docs.into_iter().map(from_doc).collect()
    }

    // ------------------------------------------------------------------
    // Schema import
    // ------------------------------------------------------------------

    /// Imports from an explicit source, or from the project's configured
    /// source when none is supplied.
    pub async fn import_schema(
        &self,
        project_id: &str,
        caller: &str,
        source: Option<ImportSource>,
    ) -> Result<ImportOutcome, ProjectError> {
        let project = self.load(project_id).await?;
        Self::require_access(&project, caller)?;

        match source {
            Some(source) => self.run_import(&project, source).await,
            None => self.import_for_project(&project).await.and_then(|outcome| {
                outcome.ok_or_else(|| {
                    ProjectError::Validation("project has no schema source to import".to_string())
                })
            }),
        }
    }

    /// Imports from the project's own source; `Ok(None)` when it has none.
    async fn import_for_project(&self, project: &Project) -> Result<Option<ImportOutcome>, ProjectError> {
        let source = if let Some(url) = &project.openapi_url {
            ImportSource::Url(url.clone())
        } else if let Some(key) = &project.openapi_file {
            ImportSource::Bytes(self.blobs.get(key).await?)
        } else {
            return Ok(None);
        };

        self.run_import(project, source).await.map(Some)
    }

    async fn run_import(
        &self,
        project: &Project,
        source: ImportSource,
    ) -> Result<ImportOutcome, ProjectError> {
        let bytes = match source {
            ImportSource::Url(url) => self.fetcher.fetch(&url).await?,
            ImportSource::Bytes(bytes) => bytes,
        };

        let document = openapi::decode_spec_bytes(&bytes).map_err(ProjectError::SchemaParse)?;
        let descriptors = openapi::parse_document(&document);

        let mut created = 0;
        let mut updated = 0;
        for descriptor in &descriptors {
            if self.upsert_endpoint(&project.id, descriptor).await? {
                created += 1;
            } else {
                updated += 1;
            }
        }

        tracing::info!(
            project_id = %project.id,
            created,
            updated,
            "schema import finished"
        );

        Ok(ImportOutcome { created, updated, total: descriptors.len() as i64 })
    }

    /// Upserts one endpoint keyed by (project_id, path, method). Returns
    /// true when a new row was created. Read-then-write, not
    /// compare-and-swap: concurrent imports of the same project can race.
    async fn upsert_endpoint(
        &self,
        project_id: &str,
        descriptor: &EndpointDescriptor,
    ) -> Result<bool, ProjectError> {
        let existing = self
            .documents
            .query(
                ENDPOINTS,
                &[
                    Filter::eq("project_id", project_id),
                    Filter::eq("path", descriptor.path.clone()),
                    Filter::eq("method", descriptor.method.clone()),
                ],
                None,
                Some(1),
            )
            .await?;

        let (id, test_count, created) = match existing.first() {
            Some(doc) => {
                let current: Endpoint = from_doc(doc.clone())?;
                (current.id, current.test_count, false)
            }
            None => (Uuid::new_v4().to_string(), 0, true),
        };

        let endpoint = Endpoint {
            id: id.clone(),
            project_id: project_id.to_string(),
            path: descriptor.path.clone(),
            method: descriptor.method.clone(),
            tag: descriptor.tag.clone(),
            description: descriptor.description.clone(),
            parameters: descriptor.parameters.clone(),
            request_body: descriptor.request_body.clone(),
            responses: descriptor.responses.clone(),
            test_count,
            status: "active".to_string(),
        };

        self.documents.set(ENDPOINTS, &id, to_doc(&endpoint)?).await?;
        Ok(created)
    }

    // ------------------------------------------------------------------
    // Test execution
    // ------------------------------------------------------------------

    /// Executes the targeted endpoint tests strictly sequentially, persists
    /// one `TestResult` per execution, then writes one immutable `TestRun`
    /// and stamps the project's `last_run_at`.
    pub async fn run_tests(
        &self,
        project_id: &str,
        caller: &str,
        target: TestTarget,
        base_url: Option<String>,
    ) -> Result<TestRun, ProjectError> {
        let project = self.load(project_id).await?;
        Self::require_access(&project, caller)?;

        let endpoints = self.resolve_targets(project_id, target).await?;

        let started = Instant::now();
        let timestamp = now();
        let mut results = Vec::with_capacity(endpoints.len());
        let mut passed = 0i64;

        for endpoint in &endpoints {
            let outcome = self.executor.execute(base_url.as_deref(), endpoint).await;
            if outcome.status == TestStatus::Passed {
                passed += 1;
            }

            let result = TestResult {
                id: Uuid::new_v4().to_string(),
                endpoint_id: endpoint.id.clone(),
                project_id: project_id.to_string(),
                method: endpoint.method.clone(),
                path: endpoint.path.clone(),
                status: outcome.status,
                response_time: outcome.response_time_ms,
                status_code: outcome.status_code,
                assertions: outcome.assertions,
                error: outcome.error,
                created_at: timestamp,
            };

            self.documents.set(TEST_RESULTS, &result.id, to_doc(&result)?).await?;

            let mut patch = Map::new();
            patch.insert("test_count".to_string(), json!(endpoint.test_count + 1));
            if let Err(e) = self.documents.update(ENDPOINTS, &endpoint.id, patch).await {
                tracing::warn!(endpoint_id = %endpoint.id, "failed to bump test_count: {}", e);
            }

            results.push(result);
        }

        let total = results.len() as i64;
        let failed = total - passed;
        let pass_rate = if total == 0 { 0.0 } else { passed as f64 / total as f64 * 100.0 };

        let run = TestRun {
            id: Uuid::new_v4().to_string(),
            project_id: project_id.to_string(),
            created_at: timestamp,
            duration: started.elapsed().as_secs_f64(),
            total_tests: total,
            passed_tests: passed,
            failed_tests: failed,
            pass_rate,
            result_ids: results.iter().map(|r| r.id.clone()).collect(),
            results: None,
        };

        self.documents.set(TEST_RUNS, &run.id, to_doc(&run)?).await?;

        let mut patch = Map::new();
        patch.insert("last_run_at".to_string(), json!(timestamp));
        self.documents.update(PROJECTS, project_id, patch).await?;

        // Response carries the hydrated results; the stored run holds ids
        // only.
        Ok(TestRun { results: Some(results), ..run })
    }

    async fn resolve_targets(
        &self,
        project_id: &str,
        target: TestTarget,
    ) -> Result<Vec<Endpoint>, ProjectError> {
        match target {
            TestTarget::Keyword(word) if word == "all" => {
                let docs = self
                    .documents
                    .query(
                        ENDPOINTS,
                        &[Filter::eq("project_id", project_id)],
                        Some(&OrderBy::asc("path")),
                        None,
                    )
                    .await?;
                docs.into_iter().map(from_doc).collect()
            }
            TestTarget::Keyword(word) => {
                Err(ProjectError::Validation(format!("unknown test target '{}'", word)))
            }
            TestTarget::Ids(ids) => {
                let mut endpoints = Vec::with_capacity(ids.len());
                for id in ids {
                    let doc = self.documents.get(ENDPOINTS, &id).await?.ok_or_else(|| {
                        ProjectError::NotFound(format!("endpoint '{}' not found", id))
                    })?;
                    let endpoint: Endpoint = from_doc(doc)?;
                    if endpoint.project_id != project_id {
                        return Err(ProjectError::NotFound(format!(
                            "endpoint '{}' not found",
                            id
                        )));
                    }
                    endpoints.push(endpoint);
                }
                Ok(endpoints)
            }
        }
    }

    // ------------------------------------------------------------------
    // Test history
    // ------------------------------------------------------------------

    /// Most recent runs, newest-first, summaries only.
    pub async fn test_history(
        &self,
        project_id: &str,
        caller: &str,
        limit: i64,
    ) -> Result<Vec<TestRun>, ProjectError> {
        let project = self.load(project_id).await?;
        Self::require_access(&project, caller)?;

        let docs = self
            .documents
            .query(
                TEST_RUNS,
                &[Filter::eq("project_id", project_id)],
                Some(&OrderBy::desc("created_at")),
                Some(limit),
            )
            .await?;

        docs.into_iter().map(from_doc).collect()
    }

    /// One run with its results hydrated. Results deleted out from under a
    /// run (mid-cascade crash) are skipped rather than failing the read.
    pub async fn test_run_detail(
        &self,
        project_id: &str,
        run_id: &str,
        caller: &str,
    ) -> Result<TestRun, ProjectError> {
        let project = self.load(project_id).await?;
        Self::require_access(&project, caller)?;

        let doc = self
            .documents
            .get(TEST_RUNS, run_id)
            .await?
            .ok_or_else(|| ProjectError::NotFound(format!("test run '{}' not found", run_id)))?;
        let mut run: TestRun = from_doc(doc)?;

        if run.project_id != project_id {
            return Err(ProjectError::NotFound(format!("test run '{}' not found", run_id)));
        }

        let mut results = Vec::with_capacity(run.result_ids.len());
        for result_id in &run.result_ids {
            match self.documents.get(TEST_RESULTS, result_id).await? {
                Some(doc) => results.push(from_doc(doc)?),
                None => tracing::warn!(run_id, result_id = %result_id, "test result missing from run"),
            }
        }
        run.results = Some(results);

        Ok(run)
    }

    /// Static performance summary. Placeholder data until response-time
    /// series are recorded per endpoint.
    pub async fn performance(
        &self,
        project_id: &str,
        caller: &str,
        time_range: &str,
    ) -> Result<Value, ProjectError> {
        let project = self.load(project_id).await?;
        Self::require_access(&project, caller)?;

        Ok(json!({
            "project_id": project_id,
            "time_range": time_range,
            "avg_response_time": 245.0,
            "p95_response_time": 480.0,
            "uptime": 99.9,
            "series": []
        }))
    }
}
