use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde_json::json;

use crate::app::AppState;
use crate::auth::create_token;
use crate::database::models::user::{User, UserNew, USER_AUTH_SCHEMA, USER_REGISTER_SCHEMA};
use crate::error::ApiError;
use crate::middleware::CurrentUser;
use crate::services::{ServiceError, UserService};
use crate::validation::JsonObject;

fn token_for(state: &AppState, user: &User) -> Result<String, ApiError> {
    let token = create_token(
        &user.username,
        user.is_admin,
        &state.config.security.jwt_secret,
        state.config.security.jwt_expiry_hours,
    )
    .map_err(ServiceError::from)?;
    Ok(token)
}

/// POST /auth/token { username, password } => { token }
pub async fn token(
    State(state): State<AppState>,
    JsonObject(body): JsonObject,
) -> Result<impl IntoResponse, ApiError> {
    let creds = USER_AUTH_SCHEMA.validate(body)?;
    let username = creds.text("username").unwrap_or_default();
    let password = creds.text("password").unwrap_or_default();

    let user = UserService::new(state.pool.clone())
        .authenticate(&username, &password)
        .await?;
    Ok(Json(json!({ "token": token_for(&state, &user)? })))
}

/// POST /auth/register { username, password, firstName, lastName, email } => 201 { token }
pub async fn register(
    State(state): State<AppState>,
    JsonObject(body): JsonObject,
) -> Result<impl IntoResponse, ApiError> {
    let data = UserNew {
        is_admin: false,
        ..UserNew::from(USER_REGISTER_SCHEMA.validate(body)?)
    };
    let user = UserService::new(state.pool.clone()).register(data).await?;
    Ok((StatusCode::CREATED, Json(json!({ "token": token_for(&state, &user)? }))))
}

/// GET /auth/whoami => { user: { username, isAdmin } }
pub async fn whoami(current: CurrentUser) -> Result<impl IntoResponse, ApiError> {
    let identity = current
        .identity()
        .ok_or_else(|| ApiError::unauthorized("Unauthorized"))?;
    Ok(Json(json!({ "user": identity })))
}
