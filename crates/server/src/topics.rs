//! Kafka topic listing.
//!
//! [`TopicLister`] is the seam; [`JobSourceTopics`] fills it from the Kafka
//! sources that routine-load jobs report, so the console shows the topics
//! actually being ingested without a separate broker admin connection.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;

use sr_ingest_routine::props::parse_props;
use sr_ingest_routine::statement::show_jobs_statement;
use sr_ingest_routine::CommandClient;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TopicInfo {
    pub name: String,
    pub partitions: u32,
}

/// Anything that can enumerate topics and their partition counts.
#[async_trait]
pub trait TopicLister: Send + Sync {
    async fn list_topics(&self) -> anyhow::Result<Vec<TopicInfo>>;
}

/// Topic count, partition total and under-replicated partitions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct KafkaSummary {
    pub topics: usize,
    pub partitions: u64,
    pub under_replicated: u64,
}

impl KafkaSummary {
    pub fn from_topics(topics: &[TopicInfo]) -> Self {
        Self {
            topics: topics.len(),
            partitions: topics.iter().map(|t| u64::from(t.partitions)).sum(),
            under_replicated: 0,
        }
    }
}

const TOPIC_KEYS: &[&str] = &["topic", "kafka_topic"];
const PARTITION_KEYS: &[&str] = &["currentKafkaPartitions", "kafka_partitions"];

/// Topics named in the `DataSourceProperties` of every routine-load job.
pub struct JobSourceTopics {
    client: Arc<dyn CommandClient>,
    database: String,
}

impl JobSourceTopics {
    pub fn new(client: Arc<dyn CommandClient>, database: impl Into<String>) -> Self {
        Self {
            client,
            database: database.into(),
        }
    }
}

#[async_trait]
impl TopicLister for JobSourceTopics {
    async fn list_topics(&self) -> anyhow::Result<Vec<TopicInfo>> {
        let rows = self.client.query(&show_jobs_statement(&self.database)).await?;

        // Several jobs may read one topic; keep the widest partition view.
        let mut topics: BTreeMap<String, u32> = BTreeMap::new();
        for row in rows.rows_as_maps() {
            let Some(source) = row.get("DataSourceProperties").map(|t| parse_props(t)) else {
                continue;
            };
            let Some(name) = first_value(&source, TOPIC_KEYS) else {
                continue;
            };
            let partitions = first_value(&source, PARTITION_KEYS)
                .map(|p| p.split(',').filter(|s| !s.trim().is_empty()).count() as u32)
                .unwrap_or(0);
            let entry = topics.entry(name.to_string()).or_default();
            *entry = (*entry).max(partitions);
        }
        Ok(topics
            .into_iter()
            .map(|(name, partitions)| TopicInfo { name, partitions })
            .collect())
    }
}

fn first_value<'a>(props: &'a BTreeMap<String, String>, keys: &[&str]) -> Option<&'a str> {
    keys.iter()
        .filter_map(|k| props.get(*k))
        .map(|v| v.trim())
        .find(|v| !v.is_empty())
}
