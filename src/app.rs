use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::{from_fn, from_fn_with_state},
    response::{IntoResponse, Json},
    routing::{get, patch, post},
    Router,
};
use serde_json::{json, Value};
use sqlx::PgPool;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::config::AppConfig;
use crate::database::manager::DatabaseManager;
use crate::error::ApiError;
use crate::handlers::{auth, jobs, users};
use crate::middleware::{
    admin_required, authenticate_jwt, ensure_correct_user_or_admin, ensure_logged_in, redacted_uri,
};

/// Shared by every request. Holds no mutable state.
#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub config: Arc<AppConfig>,
}

impl AppState {
    pub fn new(pool: PgPool, config: AppConfig) -> Self {
        Self {
            pool,
            config: Arc::new(config),
        }
    }
}

pub fn app(state: AppState) -> Router {
    let mut router = Router::new()
        // Public
        .route("/", get(root))
        .route("/health", get(health))
        .merge(auth_routes())
        .merge(job_routes())
        .merge(user_routes())
        .fallback(not_found)
        // Every request gets an identity (possibly anonymous) before routing
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http().make_span_with(request_span))
                .layer(from_fn_with_state(state.clone(), authenticate_jwt)),
        );

    if state.config.security.enable_cors {
        router = router.layer(CorsLayer::permissive());
    }

    router.with_state(state)
}

fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/token", post(auth::token))
        .route("/auth/register", post(auth::register))
        .route(
            "/auth/whoami",
            get(auth::whoami).route_layer(from_fn(ensure_logged_in)),
        )
}

fn job_routes() -> Router<AppState> {
    let public = Router::new()
        .route("/jobs", get(jobs::list))
        .route("/jobs/:id", get(jobs::get));

    let admin = Router::new()
        .route("/jobs", post(jobs::create))
        .route("/jobs/:id", patch(jobs::update).delete(jobs::delete))
        .route_layer(from_fn(admin_required));

    public.merge(admin)
}

fn user_routes() -> Router<AppState> {
    let admin = Router::new()
        .route("/users", get(users::list).post(users::create))
        .route_layer(from_fn(admin_required));

    let self_or_admin = Router::new()
        .route(
            "/users/:username",
            get(users::get).patch(users::update).delete(users::delete),
        )
        .route("/users/:username/jobs/:id", post(users::apply))
        .route_layer(from_fn(ensure_correct_user_or_admin));

    admin.merge(self_or_admin)
}

/// Request span without the `_token` query parameter.
fn request_span(request: &Request) -> tracing::Span {
    tracing::debug_span!(
        "request",
        method = %request.method(),
        uri = %redacted_uri(request.uri()),
        version = ?request.version(),
    )
}

async fn root() -> Json<Value> {
    Json(json!({
        "name": "Jobly API",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let now = chrono::Utc::now();

    match DatabaseManager::health_check(&state.pool).await {
        Ok(_) => (
            StatusCode::OK,
            Json(json!({ "status": "ok", "timestamp": now, "database": "ok" })),
        ),
        Err(e) => {
            tracing::warn!("Health check failed: {}", e);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({ "status": "degraded", "timestamp": now, "database": "unavailable" })),
            )
        }
    }
}

async fn not_found() -> ApiError {
    ApiError::not_found("Not Found")
}
