use std::sync::Arc;

use sr_ingest_core::Config;
use sr_ingest_routine::{CommandClient, MetricsAggregator, RoutineLoads};

use crate::topics::TopicLister;

pub struct AppState {
    /// Environment label reported by `/api/health`.
    pub env: String,
    pub jobs: RoutineLoads,
    pub metrics: MetricsAggregator,
    /// Absent when no broker admin is wired in; topic figures then read as zero.
    pub topics: Option<Arc<dyn TopicLister>>,
}

impl AppState {
    pub fn new(config: &Config, client: Arc<dyn CommandClient>) -> Self {
        let sr = &config.starrocks;
        Self {
            env: config.server.env.clone(),
            jobs: RoutineLoads::new(client.clone(), sr.database.clone()),
            metrics: MetricsAggregator::new(
                client,
                sr.database.clone(),
                sr.event_time_column.clone(),
                sr.errors_table.clone(),
            ),
            topics: None,
        }
    }

    pub fn with_topics(mut self, topics: Arc<dyn TopicLister>) -> Self {
        self.topics = Some(topics);
        self
    }
}
