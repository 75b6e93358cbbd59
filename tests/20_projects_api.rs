mod common;

use axum::http::StatusCode;
use serde_json::{json, Map, Value};

use apiverge_api::store::DocumentStore;
use common::TestApp;

async fn create_url_project(app: &TestApp, token: &str) -> Value {
    let (content_type, body) = common::multipart(
        &[
            ("name", "Petstore"),
            ("type", "url"),
            ("account_type", "individual"),
            ("openapi_url", "https://specs.example.com/petstore.json"),
        ],
        None,
    );
    let res = common::send(&app.router, "POST", "/projects", Some(token), Some(content_type), body)
        .await
        .unwrap();
    assert_eq!(res.status, StatusCode::OK, "create failed: {}", res.body);
    res.body
}

fn id_of(project: &Value) -> &str {
    project["id"].as_str().unwrap()
}

#[tokio::test]
async fn create_imports_the_schema_and_get_reports_counts() {
    let app = common::test_app();
    let token = common::token("alice");

    let project = create_url_project(&app, &token).await;
    assert_eq!(project["name"], "Petstore");
    assert_eq!(project["type"], "url");
    assert_eq!(project["project_admin"], "alice");
    assert_eq!(project["access_users"], json!(["alice"]));
    assert_eq!(project["openapi_url"], "https://specs.example.com/petstore.json");

    let uri = format!("/projects/{}", id_of(&project));
    let res = common::get(&app.router, &uri, Some(&token)).await.unwrap();
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["endpoints_count"], 3);
    assert_eq!(res.body["tests_count"], 0);
}

#[tokio::test]
async fn url_project_without_a_url_is_rejected() {
    let app = common::test_app();
    let token = common::token("alice");

    let (content_type, body) = common::multipart(
        &[("name", "Broken"), ("type", "url"), ("account_type", "individual")],
        None,
    );
    let res = common::send(&app.router, "POST", "/projects", Some(&token), Some(content_type), body)
        .await
        .unwrap();
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    assert_eq!(res.body["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn listing_only_shows_projects_the_caller_can_access() {
    let app = common::test_app();
    let alice = common::token("alice");
    let bob = common::token("bob");

    let project = create_url_project(&app, &alice).await;

    let res = common::get(&app.router, "/projects", Some(&alice)).await.unwrap();
    assert_eq!(res.body.as_array().unwrap().len(), 1);
    assert_eq!(res.body[0]["endpoints_count"], 3);

    let res = common::get(&app.router, "/projects", Some(&bob)).await.unwrap();
    assert_eq!(res.body, json!([]));

    // Granting read access makes it show up for bob too
    let mut patch = Map::new();
    patch.insert("access_users".to_string(), json!(["alice", "bob"]));
    app.documents.update("projects", id_of(&project), patch).await.unwrap();

    let res = common::get(&app.router, "/projects", Some(&bob)).await.unwrap();
    assert_eq!(res.body.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn readers_cannot_mutate_and_strangers_cannot_read() {
    let app = common::test_app();
    let alice = common::token("alice");
    let bob = common::token("bob");

    let project = create_url_project(&app, &alice).await;
    let uri = format!("/projects/{}", id_of(&project));

    let res = common::get(&app.router, &uri, Some(&bob)).await.unwrap();
    assert_eq!(res.status, StatusCode::FORBIDDEN);
    assert_eq!(res.body["code"], "FORBIDDEN");

    // bob becomes a reader but not the admin
    let mut patch = Map::new();
    patch.insert("access_users".to_string(), json!(["alice", "bob"]));
    app.documents.update("projects", id_of(&project), patch).await.unwrap();

    let res = common::get(&app.router, &uri, Some(&bob)).await.unwrap();
    assert_eq!(res.status, StatusCode::OK);

    let (content_type, body) = common::multipart(&[("name", "Hijacked")], None);
    let res = common::send(&app.router, "PUT", &uri, Some(&bob), Some(content_type), body)
        .await
        .unwrap();
    assert_eq!(res.status, StatusCode::FORBIDDEN);

    let res =
        common::send(&app.router, "DELETE", &uri, Some(&bob), None, Vec::new()).await.unwrap();
    assert_eq!(res.status, StatusCode::FORBIDDEN);

    let res = common::get(&app.router, "/projects/no-such-id", Some(&alice)).await.unwrap();
    assert_eq!(res.status, StatusCode::NOT_FOUND);
    assert_eq!(res.body["code"], "NOT_FOUND");
}

#[tokio::test]
async fn file_projects_store_the_upload_and_type_switch_drops_it() {
    let app = common::test_app();
    let token = common::token("alice");

    let (content_type, body) = common::multipart(
        &[("name", "Uploaded"), ("type", "file"), ("account_type", "organization")],
        Some(("spec.json", common::SPEC_JSON)),
    );
    let res = common::send(&app.router, "POST", "/projects", Some(&token), Some(content_type), body)
        .await
        .unwrap();
    assert_eq!(res.status, StatusCode::OK, "create failed: {}", res.body);

    let project_id = res.body["id"].as_str().unwrap().to_string();
    let key = res.body["openapi_file"].as_str().unwrap().to_string();
    assert_eq!(key, format!("openapi_specs/alice/{}/spec.json", project_id));
    assert!(app.blobs.contains(&key).await);
    assert_eq!(res.body["openapi_url"], Value::Null);

    // A rejected switch (no url supplied) must leave the blob and the
    // stored document untouched
    let uri = format!("/projects/{}", project_id);
    let (content_type, body) = common::multipart(&[("type", "url")], None);
    let res = common::send(&app.router, "PUT", &uri, Some(&token), Some(content_type), body)
        .await
        .unwrap();
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    assert!(app.blobs.contains(&key).await);
    let res = common::get(&app.router, &uri, Some(&token)).await.unwrap();
    assert_eq!(res.body["type"], "file");
    assert_eq!(res.body["openapi_file"], key.as_str());

    // Switching to url-type replaces the source and deletes the blob
    let (content_type, body) = common::multipart(
        &[("type", "url"), ("openapi_url", "https://specs.example.com/v2.json")],
        None,
    );
    let res = common::send(&app.router, "PUT", &uri, Some(&token), Some(content_type), body)
        .await
        .unwrap();
    assert_eq!(res.status, StatusCode::OK, "update failed: {}", res.body);
    assert_eq!(res.body["type"], "url");
    assert_eq!(res.body["openapi_file"], Value::Null);
    assert!(!app.blobs.contains(&key).await);
}

#[tokio::test]
async fn endpoint_catalog_is_sorted_by_path() {
    let app = common::test_app();
    let token = common::token("alice");

    let project = create_url_project(&app, &token).await;
    let uri = format!("/projects/{}/endpoints", id_of(&project));
    let res = common::get(&app.router, &uri, Some(&token)).await.unwrap();
    assert_eq!(res.status, StatusCode::OK);

    let endpoints = res.body.as_array().unwrap();
    assert_eq!(endpoints.len(), 3);
    let paths: Vec<&str> = endpoints.iter().map(|e| e["path"].as_str().unwrap()).collect();
    assert_eq!(paths, vec!["/broken", "/ok/pets", "/ok/pets"]);
    assert_eq!(endpoints[0]["method"], "GET");
    assert_eq!(endpoints[0]["test_count"], 0);
}

#[tokio::test]
async fn reimport_updates_in_place() {
    let app = common::test_app();
    let token = common::token("alice");

    let project = create_url_project(&app, &token).await;
    let uri = format!("/projects/{}/import-schema", id_of(&project));

    let (content_type, body) = common::multipart(&[], None);
    let res = common::send(&app.router, "POST", &uri, Some(&token), Some(content_type), body)
        .await
        .unwrap();
    assert_eq!(res.status, StatusCode::OK, "import failed: {}", res.body);
    assert_eq!(res.body, json!({ "created": 0, "updated": 3, "total": 3 }));
}

#[tokio::test]
async fn running_tests_persists_results_history_and_run_detail() {
    let app = common::test_app();
    let token = common::token("alice");

    let project = create_url_project(&app, &token).await;
    let project_id = id_of(&project);

    let uri = format!("/projects/{}/run-tests", project_id);
    let res = common::post_json(&app.router, &uri, Some(&token), &json!({ "tests": "all" }))
        .await
        .unwrap();
    assert_eq!(res.status, StatusCode::OK, "run failed: {}", res.body);
    assert_eq!(res.body["total_tests"], 3);
    assert_eq!(res.body["passed_tests"], 2);
    assert_eq!(res.body["failed_tests"], 1);
    let pass_rate = res.body["pass_rate"].as_f64().unwrap();
    assert!((pass_rate - 66.666).abs() < 0.1, "pass_rate was {}", pass_rate);
    assert_eq!(res.body["results"].as_array().unwrap().len(), 3);
    let run_id = res.body["id"].as_str().unwrap().to_string();

    // History summaries omit the hydrated results
    let uri = format!("/projects/{}/test-history", project_id);
    let res = common::get(&app.router, &uri, Some(&token)).await.unwrap();
    assert_eq!(res.status, StatusCode::OK);
    let runs = res.body.as_array().unwrap();
    assert_eq!(runs.len(), 1);
    assert_eq!(runs[0]["id"], run_id.as_str());
    assert!(runs[0].get("results").is_none());

    let uri = format!("/projects/{}/test-runs/{}", project_id, run_id);
    let res = common::get(&app.router, &uri, Some(&token)).await.unwrap();
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["results"].as_array().unwrap().len(), 3);

    // The run is scoped to its project
    let other = {
        let (content_type, body) = common::multipart(
            &[
                ("name", "Second"),
                ("type", "url"),
                ("account_type", "individual"),
                ("openapi_url", "https://specs.example.com/other.json"),
            ],
            None,
        );
        common::send(&app.router, "POST", "/projects", Some(&token), Some(content_type), body)
            .await
            .unwrap()
            .body
    };
    let uri = format!("/projects/{}/test-runs/{}", id_of(&other), run_id);
    let res = common::get(&app.router, &uri, Some(&token)).await.unwrap();
    assert_eq!(res.status, StatusCode::NOT_FOUND);

    // Project carries the updated run timestamp and test counts
    let uri = format!("/projects/{}", project_id);
    let res = common::get(&app.router, &uri, Some(&token)).await.unwrap();
    assert!(res.body["last_run_at"].is_i64());
    assert_eq!(res.body["tests_count"], 3);
}

#[tokio::test]
async fn run_tests_accepts_an_explicit_id_list_and_an_empty_body() {
    let app = common::test_app();
    let token = common::token("alice");

    let project = create_url_project(&app, &token).await;
    let project_id = id_of(&project).to_string();

    let endpoints_uri = format!("/projects/{}/endpoints", project_id);
    let endpoints = common::get(&app.router, &endpoints_uri, Some(&token)).await.unwrap().body;
    let first_id = endpoints[0]["id"].as_str().unwrap();

    let uri = format!("/projects/{}/run-tests", project_id);
    let res = common::post_json(&app.router, &uri, Some(&token), &json!({ "tests": [first_id] }))
        .await
        .unwrap();
    assert_eq!(res.status, StatusCode::OK, "run failed: {}", res.body);
    assert_eq!(res.body["total_tests"], 1);

    // No body at all defaults to running everything
    let res = common::send(&app.router, "POST", &uri, Some(&token), None, Vec::new())
        .await
        .unwrap();
    assert_eq!(res.status, StatusCode::OK, "run failed: {}", res.body);
    assert_eq!(res.body["total_tests"], 3);

    // A malformed body is rejected, not treated as "run all"
    let res = common::send(
        &app.router,
        "POST",
        &uri,
        Some(&token),
        Some("application/json"),
        br#"{"tests": ["ep-1""#.to_vec(),
    )
    .await
    .unwrap();
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    assert_eq!(res.body["code"], "VALIDATION_ERROR");

    // Unknown endpoint ids are rejected
    let res = common::post_json(
        &app.router,
        &uri,
        Some(&token),
        &json!({ "tests": ["not-an-endpoint"] }),
    )
    .await
    .unwrap();
    assert_eq!(res.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn deleting_a_project_removes_everything_under_it() {
    let app = common::test_app();
    let token = common::token("alice");

    let (content_type, body) = common::multipart(
        &[("name", "Doomed"), ("type", "file"), ("account_type", "individual")],
        Some(("spec.json", common::SPEC_JSON)),
    );
    let res = common::send(&app.router, "POST", "/projects", Some(&token), Some(content_type), body)
        .await
        .unwrap();
    let project_id = res.body["id"].as_str().unwrap().to_string();
    let key = res.body["openapi_file"].as_str().unwrap().to_string();

    let uri = format!("/projects/{}/run-tests", project_id);
    let res =
        common::send(&app.router, "POST", &uri, Some(&token), None, Vec::new()).await.unwrap();
    assert_eq!(res.status, StatusCode::OK);

    let uri = format!("/projects/{}", project_id);
    let res =
        common::send(&app.router, "DELETE", &uri, Some(&token), None, Vec::new()).await.unwrap();
    assert_eq!(res.status, StatusCode::OK);

    let res = common::get(&app.router, &uri, Some(&token)).await.unwrap();
    assert_eq!(res.status, StatusCode::NOT_FOUND);
    assert!(!app.blobs.contains(&key).await);
    for collection in ["endpoints", "test_results", "test_runs"] {
        let count = app.documents.count(collection, &[]).await.unwrap();
        assert_eq!(count, 0, "{} not cascaded", collection);
    }
}

#[tokio::test]
async fn performance_summary_responds_for_readers() {
    let app = common::test_app();
    let token = common::token("alice");

    let project = create_url_project(&app, &token).await;
    let uri = format!("/projects/{}/performance?timeRange=30d", id_of(&project));
    let res = common::get(&app.router, &uri, Some(&token)).await.unwrap();
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["time_range"], "30d");
}
