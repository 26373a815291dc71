//! Dashboard summary: job counts, broker figures and event-table metrics.
//!
//! Every input degrades independently; the endpoint itself never fails.

use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde::Serialize;

use sr_ingest_routine::{Anomaly, IngestionJob};

use crate::state::AppState;
use crate::topics::KafkaSummary;

use super::topics::list_topics;

#[derive(Debug, Serialize)]
pub struct SummaryResponse {
    pub jobs: JobsSummary,
    pub kafka: KafkaSummary,
    pub throughput: Throughput,
    pub errors: ErrorsWindow,
    pub lag: Lag,
    pub anomalies: Vec<Anomaly>,
}

#[derive(Debug, Default, PartialEq, Eq, Serialize)]
pub struct JobsSummary {
    pub total: usize,
    pub running: usize,
    pub paused: usize,
    pub failed: usize,
}

impl JobsSummary {
    fn count(jobs: &[IngestionJob]) -> Self {
        let mut summary = JobsSummary {
            total: jobs.len(),
            ..Default::default()
        };
        for job in jobs {
            match job.normalized_state().as_str() {
                "RUNNING" => summary.running += 1,
                "PAUSED" => summary.paused += 1,
                "FAILED" => summary.failed += 1,
                _ => {}
            }
        }
        summary
    }
}

/// Rows per minute.
#[derive(Debug, Serialize)]
pub struct Throughput {
    pub current: u64,
}

#[derive(Debug, Serialize)]
pub struct ErrorsWindow {
    pub last_10m: u64,
}

/// Freshness lag. Reported under the dashboard's `p95_ms` key although it is
/// the lag of the newest event, not a percentile.
#[derive(Debug, Serialize)]
pub struct Lag {
    pub p95_ms: u64,
}

pub async fn summary(State(state): State<Arc<AppState>>) -> Json<SummaryResponse> {
    let kafka = KafkaSummary::from_topics(&list_topics(&state).await);
    // Failures are already logged by the job service.
    let jobs = state.jobs.list().await.unwrap_or_default();
    let snapshot = state.metrics.snapshot(&jobs).await;

    Json(SummaryResponse {
        jobs: JobsSummary::count(&jobs),
        kafka,
        throughput: Throughput {
            current: snapshot.throughput_per_min,
        },
        errors: ErrorsWindow {
            last_10m: snapshot.errors_last_10m,
        },
        lag: Lag {
            p95_ms: snapshot.lag_ms,
        },
        anomalies: snapshot.anomalies,
    })
}
