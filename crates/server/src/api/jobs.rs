//! Routine-load job endpoints under `/api/starrocks/jobs`.

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, HeaderName, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};

use sr_ingest_routine::{ControlAction, CreateRequest, IngestionJob, JobDetail, JobQuery};

use crate::state::AppState;

use super::{bad_request, routine_error, ApiResult};

pub const TOTAL_COUNT_HEADER: &str = "x-total-count";
pub const PAGE_HEADER: &str = "x-page";
pub const PAGE_SIZE_HEADER: &str = "x-page-size";

#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
    pub state: Option<String>,
    pub page: Option<String>,
    pub page_size: Option<String>,
}

#[derive(Serialize)]
pub struct OkResponse {
    pub ok: bool,
}

#[derive(Serialize)]
pub struct CreatedResponse {
    pub ok: bool,
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct UpdateRequest {
    #[serde(default)]
    pub properties: BTreeMap<String, String>,
}

/// List jobs, filtered and paged. A store failure reads as an empty list.
pub async fn list_jobs(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ListParams>,
) -> (HeaderMap, Json<Vec<IngestionJob>>) {
    let query = JobQuery::from_params(
        params.state.as_deref(),
        params.page.as_deref(),
        params.page_size.as_deref(),
    );
    let jobs = state.jobs.list().await.unwrap_or_default();
    let (page, total) = query.apply(jobs);

    let mut headers = HeaderMap::new();
    for (name, value) in [
        (TOTAL_COUNT_HEADER, total),
        (PAGE_HEADER, query.page),
        (PAGE_SIZE_HEADER, query.page_size),
    ] {
        headers.insert(HeaderName::from_static(name), HeaderValue::from(value));
    }
    (headers, Json(page))
}

pub async fn get_job(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> ApiResult<Json<JobDetail>> {
    state.jobs.detail(&name).await.map(Json).map_err(routine_error)
}

pub async fn create_job(
    State(state): State<Arc<AppState>>,
    body: Result<Json<CreateRequest>, JsonRejection>,
) -> ApiResult<Json<CreatedResponse>> {
    let Json(req) = body.map_err(|_| bad_request("invalid json"))?;
    let name = state.jobs.create(req).await.map_err(routine_error)?;
    Ok(Json(CreatedResponse { ok: true, name }))
}

pub async fn pause_job(state: State<Arc<AppState>>, name: Path<String>) -> ApiResult<Json<OkResponse>> {
    control(state, name, ControlAction::Pause).await
}

pub async fn resume_job(state: State<Arc<AppState>>, name: Path<String>) -> ApiResult<Json<OkResponse>> {
    control(state, name, ControlAction::Resume).await
}

pub async fn stop_job(state: State<Arc<AppState>>, name: Path<String>) -> ApiResult<Json<OkResponse>> {
    control(state, name, ControlAction::Stop).await
}

async fn control(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
    action: ControlAction,
) -> ApiResult<Json<OkResponse>> {
    state
        .jobs
        .control(action, name.trim())
        .await
        .map_err(routine_error)?;
    Ok(Json(OkResponse { ok: true }))
}

/// Apply whitelisted properties. A rejected alter answers 500 with the
/// pause/resume flags alongside the store's error text.
pub async fn update_job(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
    body: Result<Json<UpdateRequest>, JsonRejection>,
) -> ApiResult<Response> {
    let name = name.trim();
    if name.is_empty() {
        return Err(bad_request("missing name"));
    }
    let Json(req) = body.map_err(|_| bad_request("invalid json"))?;
    if req.properties.is_empty() {
        return Err(bad_request("no properties"));
    }

    let outcome = state
        .jobs
        .update_properties(name, req.properties)
        .await
        .map_err(routine_error)?;
    let status = if outcome.ok {
        StatusCode::OK
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    };
    Ok((status, Json(outcome)).into_response())
}
