//! Near-real-time platform metrics computed from the event tables.
//!
//! Every per-table query is independent: a failing table is skipped and
//! never fails the snapshot.

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, warn};

use crate::client::CommandClient;
use crate::statement::escape_single_quoted;
use crate::status::IngestionJob;

/// Anomalies reported per snapshot.
pub const MAX_ANOMALIES: usize = 3;

const THROUGHPUT_WINDOW_MINUTES: u32 = 1;
const ERRORS_WINDOW_MINUTES: u32 = 10;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Anomaly {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub state: String,
    pub count: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    /// Rows with a timestamp in the last minute, summed over event tables.
    pub throughput_per_min: u64,
    /// Rows in the errors table over the last ten minutes.
    pub errors_last_10m: u64,
    /// Milliseconds since the newest event across all tables; 0 when unknown.
    pub lag_ms: u64,
    pub anomalies: Vec<Anomaly>,
}

pub struct MetricsAggregator {
    client: Arc<dyn CommandClient>,
    database: String,
    event_time_column: String,
    errors_table: String,
}

impl MetricsAggregator {
    pub fn new(
        client: Arc<dyn CommandClient>,
        database: impl Into<String>,
        event_time_column: impl Into<String>,
        errors_table: impl Into<String>,
    ) -> Self {
        Self {
            client,
            database: database.into(),
            event_time_column: event_time_column.into(),
            errors_table: errors_table.into(),
        }
    }

    /// Compute a snapshot. `jobs` is an already fetched job list used for anomalies.
    pub async fn snapshot(&self, jobs: &[IngestionJob]) -> MetricsSnapshot {
        let tables = self.event_tables().await;
        MetricsSnapshot {
            throughput_per_min: self.throughput(&tables).await,
            errors_last_10m: self.recent_errors().await,
            lag_ms: self.freshness_lag_ms(&tables, chrono::Utc::now().timestamp()).await,
            anomalies: anomalies(jobs),
        }
    }

    /// Tables in the database carrying the event-time column, sorted and unique.
    /// Discovery failure yields no tables.
    pub async fn event_tables(&self) -> Vec<String> {
        let sql = format!(
            "SELECT TABLE_NAME FROM information_schema.columns WHERE TABLE_SCHEMA = '{}' AND COLUMN_NAME = '{}' GROUP BY TABLE_NAME",
            escape_single_quoted(&self.database),
            escape_single_quoted(&self.event_time_column),
        );
        let rows = match self.client.query(&sql).await {
            Ok(rows) => rows,
            Err(e) => {
                warn!(operation = "metrics.event_tables", error = %e, "Event table discovery failed");
                return Vec::new();
            }
        };
        let mut tables: Vec<String> = rows
            .rows
            .iter()
            .filter_map(|r| r.first().cloned().flatten())
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .collect();
        tables.sort();
        tables.dedup();
        tables
    }

    pub async fn throughput(&self, tables: &[String]) -> u64 {
        let mut total = 0;
        for table in tables {
            let sql = format!(
                "SELECT COUNT(*) FROM {} WHERE {} >= NOW() - INTERVAL {} MINUTE",
                quote_ident(table),
                quote_ident(&self.event_time_column),
                THROUGHPUT_WINDOW_MINUTES,
            );
            if let Some(n) = self.count(&sql, table).await {
                total += n;
            }
        }
        total
    }

    pub async fn recent_errors(&self) -> u64 {
        let sql = format!(
            "SELECT COUNT(*) FROM {} WHERE {} >= NOW() - INTERVAL {} MINUTE",
            quote_ident(&self.errors_table),
            quote_ident(&self.event_time_column),
            ERRORS_WINDOW_MINUTES,
        );
        self.count(&sql, &self.errors_table).await.unwrap_or(0)
    }

    /// `now_secs` minus the newest timestamp over `tables`, in ms, never negative.
    pub async fn freshness_lag_ms(&self, tables: &[String], now_secs: i64) -> u64 {
        let mut latest: i64 = 0;
        for table in tables {
            let sql = format!(
                "SELECT UNIX_TIMESTAMP(MAX({})) FROM {}",
                quote_ident(&self.event_time_column),
                quote_ident(table),
            );
            match self.client.query(&sql).await {
                Ok(rows) => {
                    if let Some(sec) = rows.scalar().and_then(parse_number) {
                        latest = latest.max(sec);
                    }
                }
                Err(e) => debug!(table = %table, error = %e, "Freshness query failed, skipping table"),
            }
        }
        if latest <= 0 {
            return 0;
        }
        u64::try_from(now_secs.saturating_sub(latest).saturating_mul(1000)).unwrap_or(0)
    }

    async fn count(&self, sql: &str, table: &str) -> Option<u64> {
        match self.client.query(sql).await {
            Ok(rows) => rows
                .scalar()
                .and_then(parse_number)
                .and_then(|n| u64::try_from(n).ok()),
            Err(e) => {
                debug!(table = %table, error = %e, "Count query failed, skipping table");
                None
            }
        }
    }
}

/// The first [`MAX_ANOMALIES`] jobs whose normalized state is not RUNNING, in list order.
pub fn anomalies(jobs: &[IngestionJob]) -> Vec<Anomaly> {
    jobs.iter()
        .map(|j| (j, j.normalized_state()))
        .filter(|(_, state)| state != "RUNNING")
        .take(MAX_ANOMALIES)
        .map(|(j, state)| Anomaly {
            name: j.name.clone(),
            kind: "job".to_string(),
            state,
            count: 0,
        })
        .collect()
}

fn quote_ident(name: &str) -> String {
    format!("`{}`", name.replace('`', "``"))
}

/// Integer cell text; tolerates a decimal rendering such as `1700000000.000`.
fn parse_number(text: &str) -> Option<i64> {
    let text = text.trim();
    text.parse::<i64>()
        .ok()
        .or_else(|| text.parse::<f64>().ok().filter(|f| f.is_finite()).map(|f| f as i64))
}
