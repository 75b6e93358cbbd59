use axum::extract::State;
use axum::{Extension, Json};
use serde_json::{json, Value};

use crate::error::ApiError;
use crate::middleware::AuthUser;
use crate::state::AppState;

/// GET /aimodels - All available AI models
pub async fn list(
    State(state): State<AppState>,
    Extension(_user): Extension<AuthUser>,
) -> Result<Json<Value>, ApiError> {
    let models = state.aimodels.list().await.map_err(ApiError::from)?;
    Ok(Json(json!({ "ai_models": models })))
}
