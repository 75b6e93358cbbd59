use axum::extract::{Path, Query, State};
use axum::{Extension, Json};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::ApiError;
use crate::middleware::AuthUser;
use crate::state::AppState;
use crate::users::{User, UserCreate, UserUpdate};

/// POST /users - Create the profile for the authenticated subject
pub async fn create(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Json(request): Json<UserCreate>,
) -> Result<Json<User>, ApiError> {
    let created = state.users.create(&user.user_id, request).await?;
    Ok(Json(created))
}

/// GET /users/me - Current user's profile
pub async fn me(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<User>, ApiError> {
    let profile = state.users.get(&user.user_id).await?;
    Ok(Json(profile))
}

/// GET /users/:id - Profile by id
pub async fn get_by_id(
    State(state): State<AppState>,
    Extension(_user): Extension<AuthUser>,
    Path(user_id): Path<String>,
) -> Result<Json<User>, ApiError> {
    let profile = state.users.get(&user_id).await?;
    Ok(Json(profile))
}

/// PUT /users - Partial update of the current user's profile
pub async fn update(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Json(request): Json<UserUpdate>,
) -> Result<Json<User>, ApiError> {
    let updated = state.users.update(&user.user_id, request).await?;
    Ok(Json(updated))
}

/// DELETE /users - Delete the current user's profile
pub async fn delete(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<Value>, ApiError> {
    state.users.delete(&user.user_id).await?;
    Ok(Json(json!({ "message": "User deleted successfully" })))
}

#[derive(Debug, Deserialize)]
pub struct EmailQuery {
    pub email_id: String,
}

/// GET /user_check_by_email_id - Public signup probe
pub async fn check_by_email(
    State(state): State<AppState>,
    Query(query): Query<EmailQuery>,
) -> Result<Json<Value>, ApiError> {
    let exists = state.users.exists_by_email(&query.email_id).await?;
    Ok(Json(json!({ "is_exists": exists })))
}
