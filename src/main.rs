use std::sync::Arc;

use apiverge_api::aimodels::AiModelService;
use apiverge_api::auth::JwtVerifier;
use apiverge_api::projects::{HttpSchemaFetcher, HttpTestExecutor, ProjectService};
use apiverge_api::state::AppState;
use apiverge_api::store::{PgBlobStore, PgDocumentStore};
use apiverge_api::users::UserService;
use apiverge_api::{app, config};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present so cargo run picks up DATABASE_URL etc.
    let _ = dotenvy::dotenv();

    let config = config::config();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "apiverge_api=info,tower_http=info".into()),
        )
        .init();

    tracing::info!("starting Apiverge API in {:?} mode", config.environment);

    let database_url = std::env::var("DATABASE_URL")
        .map_err(|_| anyhow::anyhow!("DATABASE_URL must be set"))?;

    // Explicitly constructed, dependency-injected collaborators
    let documents = PgDocumentStore::connect(&database_url).await?;
    let blobs = PgBlobStore::new(documents.pool().clone());

    let documents = Arc::new(documents);
    let state = AppState {
        projects: Arc::new(ProjectService::new(
            documents.clone(),
            Arc::new(blobs),
            Arc::new(HttpSchemaFetcher::new()),
            Arc::new(HttpTestExecutor::new()),
        )),
        users: Arc::new(UserService::new(documents.clone())),
        aimodels: Arc::new(AiModelService::new(documents.clone())),
        verifier: Arc::new(JwtVerifier::from_config()),
        documents,
    };

    let app = app(state);

    // Allow deployments to override port via env
    let port = std::env::var("PORT")
        .ok()
        .and_then(|s| s.parse::<u16>().ok())
        .unwrap_or(8080);

    let bind_addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;

    tracing::info!("Apiverge API listening on http://{}", bind_addr);

    axum::serve(listener, app).await?;
    Ok(())
}
