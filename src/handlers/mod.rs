pub mod auth;
pub mod jobs;
pub mod users;

use crate::error::ApiError;

/// Parse a numeric `:id` path segment. An integer beyond the id column's
/// range is well-formed but can never name a job.
pub(crate) fn parse_id(raw: &str) -> Result<i32, ApiError> {
    raw.parse::<i32>().map_err(|_| {
        let digits = raw.strip_prefix('-').unwrap_or(raw);
        if !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()) {
            ApiError::not_found(format!("No job: {}", raw))
        } else {
            ApiError::bad_request(format!("Invalid id: {}", raw))
        }
    })
}
