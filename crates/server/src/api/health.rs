use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde::Serialize;

use crate::state::AppState;

pub const SERVER_NAME: &str = "sr-ingest-api";

#[derive(Serialize)]
pub struct HealthResponse {
    pub ok: bool,
    pub env: String,
    pub server: &'static str,
    pub time: String,
}

pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        ok: true,
        env: state.env.clone(),
        server: SERVER_NAME,
        time: chrono::Utc::now().to_rfc3339(),
    })
}
