use axum::extract::{DefaultBodyLimit, State};
use axum::http::HeaderValue;
use axum::routing::get;
use axum::{Json, Router};
use serde_json::{json, Value};
use tower_http::cors::{Any, CorsLayer};
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;

pub mod aimodels;
pub mod auth;
pub mod config;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod openapi;
pub mod projects;
pub mod state;
pub mod store;
pub mod types;
pub mod users;

use state::AppState;

/// Builds the full application router over an explicitly constructed state.
/// Tests call this with in-memory collaborators.
pub fn app(state: AppState) -> Router {
    let protected = Router::new()
        .merge(project_routes())
        .merge(user_routes())
        .route("/aimodels", get(handlers::aimodels::list))
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::auth_middleware,
        ));

    Router::new()
        // Public
        .route("/", get(root))
        .route("/health", get(health))
        .route("/user_check_by_email_id", get(handlers::users::check_by_email))
        .merge(protected)
        // Global middleware
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(TraceLayer::new_for_http())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .layer(cors_layer())
        .layer(DefaultBodyLimit::max(config::config().import.max_upload_bytes))
        .with_state(state)
}

fn project_routes() -> Router<AppState> {
    use axum::routing::post;
    use handlers::projects;

    Router::new()
        .route("/projects", get(projects::list).post(projects::create))
        .route(
            "/projects/:id",
            get(projects::get).put(projects::update).delete(projects::delete),
        )
        .route("/projects/:id/endpoints", get(projects::endpoints))
        .route("/projects/:id/import-schema", post(projects::import_schema))
        .route("/projects/:id/run-tests", post(projects::run_tests))
        .route("/projects/:id/test-history", get(projects::test_history))
        .route("/projects/:id/test-runs/:run_id", get(projects::test_run_detail))
        .route("/projects/:id/performance", get(projects::performance))
}

fn user_routes() -> Router<AppState> {
    use handlers::users;

    Router::new()
        .route(
            "/users",
            get(users::me).post(users::create).put(users::update).delete(users::delete),
        )
        .route("/users/me", get(users::me))
        .route("/users/:id", get(users::get_by_id))
}

fn cors_layer() -> CorsLayer {
    let config = config::config();
    if config.environment == config::Environment::Development {
        return CorsLayer::permissive();
    }

    let origins: Vec<HeaderValue> = config
        .security
        .cors_origins
        .iter()
        .filter_map(|origin| origin.parse().ok())
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods(Any)
        .allow_headers(Any)
}

async fn root() -> Json<Value> {
    let version = env!("CARGO_PKG_VERSION");

    Json(json!({
        "success": true,
        "data": {
            "name": "Apiverge API",
            "version": version,
            "description": "Backend-for-frontend API for the Apiverge API-testing platform",
            "endpoints": {
                "home": "/ (public)",
                "health": "/health (public)",
                "user_check": "/user_check_by_email_id (public)",
                "projects": "/projects[/:id] (protected)",
                "endpoints": "/projects/:id/endpoints (protected)",
                "import": "/projects/:id/import-schema (protected)",
                "tests": "/projects/:id/run-tests, /projects/:id/test-history, /projects/:id/test-runs/:run_id (protected)",
                "users": "/users[/:id], /users/me (protected)",
                "aimodels": "/aimodels (protected)",
            }
        }
    }))
}

async fn health(State(state): State<AppState>) -> impl axum::response::IntoResponse {
    let now = chrono::Utc::now();

    match state.documents.count(projects::service::PROJECTS, &[]).await {
        Ok(_) => (
            axum::http::StatusCode::OK,
            Json(json!({
                "success": true,
                "data": {
                    "status": "ok",
                    "timestamp": now,
                    "store": "ok"
                }
            })),
        ),
        Err(e) => (
            axum::http::StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({
                "success": false,
                "error": "document store unavailable",
                "data": {
                    "status": "degraded",
                    "timestamp": now,
                    "store_error": e.to_string()
                }
            })),
        ),
    }
}
