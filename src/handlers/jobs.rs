use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use serde_json::json;

use crate::app::AppState;
use crate::database::models::job::{JobFilter, JobNew, JOB_NEW_SCHEMA, JOB_UPDATE_SCHEMA};
use crate::database::models::JobField;
use crate::error::ApiError;
use crate::services::JobService;
use crate::validation::JsonObject;

use super::parse_id;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobSearchQuery {
    pub title: Option<String>,
    pub min_salary: Option<String>,
    pub has_equity: Option<String>,
}

impl JobSearchQuery {
    /// `None` when the filter can match nothing, such as a `minSalary`
    /// above any storable salary.
    fn into_filter(self) -> Result<Option<JobFilter>, ApiError> {
        let min_salary = match self.min_salary.as_deref().filter(|s| !s.is_empty()) {
            Some(s) if s.bytes().all(|b| b.is_ascii_digit()) => match s.parse::<i32>() {
                Ok(n) => Some(n),
                // Larger than any salary the store can hold
                Err(_) => return Ok(None),
            },
            Some(s) => {
                return Err(ApiError::validation_error(vec![format!(
                    "instance.minSalary must be a non-negative integer, got \"{}\"",
                    s
                )]))
            }
            None => None,
        };

        Ok(Some(JobFilter {
            title: self.title,
            min_salary,
            has_equity: self.has_equity.as_deref() == Some("true"),
        }))
    }
}

/// POST /jobs { title, salary, equity, companyHandle } => 201 { job }
pub async fn create(
    State(state): State<AppState>,
    JsonObject(body): JsonObject,
) -> Result<impl IntoResponse, ApiError> {
    let data = JobNew::from(JOB_NEW_SCHEMA.validate(body)?);
    let job = JobService::new(state.pool).create(data).await?;
    Ok((StatusCode::CREATED, Json(json!({ "job": job }))))
}

/// GET /jobs?title=&minSalary=&hasEquity= => { jobs: [...] }
pub async fn list(
    State(state): State<AppState>,
    query: Option<Query<JobSearchQuery>>,
) -> Result<impl IntoResponse, ApiError> {
    let Some(Query(query)) = query else {
        return Err(ApiError::bad_request("Invalid query string"));
    };
    let jobs = match query.into_filter()? {
        Some(filter) => JobService::new(state.pool).find_all(&filter).await?,
        None => Vec::new(),
    };
    Ok(Json(json!({ "jobs": jobs })))
}

/// GET /jobs/:id => { job }
pub async fn get(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let id = parse_id(&id)?;
    let job = JobService::new(state.pool).get(id).await?;
    Ok(Json(json!({ "job": job })))
}

/// PATCH /jobs/:id { title?, salary?, equity? } => { job }
pub async fn update(
    State(state): State<AppState>,
    Path(id): Path<String>,
    JsonObject(body): JsonObject,
) -> Result<impl IntoResponse, ApiError> {
    let id = parse_id(&id)?;
    let fields = JOB_UPDATE_SCHEMA.validate(body)?.into_field_map::<JobField>();
    let job = JobService::new(state.pool).update(id, &fields).await?;
    Ok(Json(json!({ "job": job })))
}

/// DELETE /jobs/:id => { deleted: id }
pub async fn delete(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let id = parse_id(&id)?;
    JobService::new(state.pool).remove(id).await?;
    Ok(Json(json!({ "deleted": id })))
}
