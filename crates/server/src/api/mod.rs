//! HTTP handlers.
//!
//! Error bodies are always `{"error": "..."}`. Validation failures map to
//! 400, everything the store reports maps to 500 with its text untouched.

mod health;
mod jobs;
mod summary;
mod topics;

use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;

use sr_ingest_routine::RoutineError;

#[derive(Debug, Serialize)]
pub struct QueryErrorResponse {
    pub error: String,
}

pub(crate) type ApiError = (StatusCode, Json<QueryErrorResponse>);
pub(crate) type ApiResult<T> = Result<T, ApiError>;

pub(crate) fn bad_request(msg: impl Into<String>) -> ApiError {
    (
        StatusCode::BAD_REQUEST,
        Json(QueryErrorResponse { error: msg.into() }),
    )
}

pub(crate) fn internal_error(e: impl std::fmt::Display) -> ApiError {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(QueryErrorResponse {
            error: e.to_string(),
        }),
    )
}

pub(crate) fn routine_error(e: RoutineError) -> ApiError {
    if e.is_client_error() {
        bad_request(e.to_string())
    } else {
        internal_error(e)
    }
}

// ── Re-exports ───────────────────────────────────────────────────

pub use health::health;
pub use jobs::{
    create_job, get_job, list_jobs, pause_job, resume_job, stop_job, update_job,
    PAGE_HEADER, PAGE_SIZE_HEADER, TOTAL_COUNT_HEADER,
};
pub use summary::summary;
pub use topics::kafka_topics;
