use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde_json::json;

use crate::app::AppState;
use crate::auth::create_token;
use crate::database::models::user::{UserNew, USER_NEW_SCHEMA, USER_UPDATE_SCHEMA};
use crate::database::models::UserField;
use crate::error::ApiError;
use crate::services::{ServiceError, UserService};
use crate::validation::JsonObject;

use super::parse_id;

/// POST /users { user } => 201 { user, token }
///
/// Admin-only; unlike registration this may create another admin.
pub async fn create(
    State(state): State<AppState>,
    JsonObject(body): JsonObject,
) -> Result<impl IntoResponse, ApiError> {
    let data = UserNew::from(USER_NEW_SCHEMA.validate(body)?);
    let user = UserService::new(state.pool.clone()).register(data).await?;
    let token = create_token(
        &user.username,
        user.is_admin,
        &state.config.security.jwt_secret,
        state.config.security.jwt_expiry_hours,
    )
    .map_err(ServiceError::from)?;
    Ok((StatusCode::CREATED, Json(json!({ "user": user, "token": token }))))
}

/// GET /users => { users: [...] }
pub async fn list(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let users = UserService::new(state.pool).find_all().await?;
    Ok(Json(json!({ "users": users })))
}

/// GET /users/:username => { user: { ..., jobs: [jobId, ...] } }
pub async fn get(
    State(state): State<AppState>,
    Path(username): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let user = UserService::new(state.pool).get(&username).await?;
    Ok(Json(json!({ "user": user })))
}

/// PATCH /users/:username { firstName?, lastName?, password?, email?, isAdmin? } => { user }
pub async fn update(
    State(state): State<AppState>,
    Path(username): Path<String>,
    JsonObject(body): JsonObject,
) -> Result<impl IntoResponse, ApiError> {
    let fields = USER_UPDATE_SCHEMA.validate(body)?.into_field_map::<UserField>();
    let user = UserService::new(state.pool).update(&username, &fields).await?;
    Ok(Json(json!({ "user": user })))
}

/// DELETE /users/:username => { deleted: username }
pub async fn delete(
    State(state): State<AppState>,
    Path(username): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    UserService::new(state.pool).remove(&username).await?;
    Ok(Json(json!({ "deleted": username })))
}

/// POST /users/:username/jobs/:id => 201 { applied: jobId }
pub async fn apply(
    State(state): State<AppState>,
    Path((username, id)): Path<(String, String)>,
) -> Result<impl IntoResponse, ApiError> {
    let job_id = parse_id(&id)?;
    UserService::new(state.pool).apply_to_job(&username, job_id).await?;
    Ok((StatusCode::CREATED, Json(json!({ "applied": job_id }))))
}
