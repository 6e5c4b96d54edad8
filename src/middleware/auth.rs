use axum::{
    async_trait,
    body::{Body, Bytes},
    extract::{FromRequestParts, Query, Request, State},
    http::{request::Parts, HeaderMap, Uri},
    middleware::Next,
    response::Response,
};
use futures::StreamExt;
use serde::Deserialize;
use std::convert::Infallible;

use crate::app::AppState;
use crate::auth::{verify_token, Identity};
use crate::error::ApiError;
use crate::validation::TOKEN_KEY;

/// The caller's identity for this request; `None` means anonymous.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CurrentUser(pub Option<Identity>);

impl CurrentUser {
    pub fn identity(&self) -> Option<&Identity> {
        self.0.as_ref()
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(parts.extensions.get::<CurrentUser>().cloned().unwrap_or_default())
    }
}

#[derive(Debug, Deserialize)]
struct TokenCarrier {
    #[serde(rename = "_token")]
    token: Option<String>,
}

/// Resolve the caller from `_token` (body, then query string, then a Bearer
/// header) and attach it to the request.
///
/// Never rejects on a bad token: the request continues anonymously and the
/// route's policy decides whether that is acceptable.
pub async fn authenticate_jwt(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let (parts, body) = request.into_parts();
    let bytes = read_body(body, state.config.api.max_request_size_bytes).await?;

    let token = token_from_body(&bytes)
        .or_else(|| token_from_query(&parts))
        .or_else(|| token_from_header(&parts.headers));

    let identity = verify_token(token.as_deref(), &state.config.security.jwt_secret);
    if let Some(identity) = &identity {
        tracing::debug!("Request authenticated as {}", identity.username);
    }

    let mut request = Request::from_parts(parts, Body::from(bytes));
    request.extensions_mut().insert(CurrentUser(identity));

    Ok(next.run(request).await)
}

/// Buffer the whole body, refusing anything over `limit` bytes.
async fn read_body(body: Body, limit: usize) -> Result<Bytes, ApiError> {
    let mut stream = body.into_data_stream();
    let mut buf = Vec::new();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|e| {
            tracing::debug!("Failed to read request body: {}", e);
            ApiError::bad_request("Failed to read request body")
        })?;
        if buf.len() + chunk.len() > limit {
            return Err(ApiError::payload_too_large(format!(
                "Request body exceeds {} bytes",
                limit
            )));
        }
        buf.extend_from_slice(&chunk);
    }

    Ok(Bytes::from(buf))
}

/// Path and query of `uri` with any `_token` pair removed, for logging.
pub fn redacted_uri(uri: &Uri) -> String {
    let Some(query) = uri.query() else {
        return uri.path().to_string();
    };

    let kept: Vec<(String, String)> = url::form_urlencoded::parse(query.as_bytes())
        .filter(|(key, _)| *key != TOKEN_KEY)
        .map(|(key, value)| (key.into_owned(), value.into_owned()))
        .collect();
    if kept.is_empty() {
        return uri.path().to_string();
    }

    let query = url::form_urlencoded::Serializer::new(String::new())
        .extend_pairs(kept)
        .finish();
    format!("{}?{}", uri.path(), query)
}

fn token_from_body(bytes: &[u8]) -> Option<String> {
    if bytes.is_empty() {
        return None;
    }
    serde_json::from_slice::<TokenCarrier>(bytes).ok()?.token
}

fn token_from_query(parts: &Parts) -> Option<String> {
    Query::<TokenCarrier>::try_from_uri(&parts.uri).ok()?.0.token
}

fn token_from_header(headers: &HeaderMap) -> Option<String> {
    let auth_str = headers.get("authorization")?.to_str().ok()?;
    auth_str
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
}
