use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use tracing::warn;

use crate::state::AppState;
use crate::topics::TopicInfo;

/// Topics reported by the configured lister (by default those consumed by
/// routine-load jobs); empty when no lister is wired in or it fails.
pub async fn kafka_topics(State(state): State<Arc<AppState>>) -> Json<Vec<TopicInfo>> {
    Json(list_topics(&state).await)
}

pub(crate) async fn list_topics(state: &AppState) -> Vec<TopicInfo> {
    let Some(lister) = state.topics.as_ref() else {
        return Vec::new();
    };
    match lister.list_topics().await {
        Ok(topics) => topics,
        Err(e) => {
            warn!(operation = "kafka.topics", error = %e, "Listing topics failed");
            Vec::new()
        }
    }
}
