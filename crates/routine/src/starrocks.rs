//! StarRocks FE client over the MySQL wire protocol.
//!
//! Every command opens its own connection, runs a single text-protocol
//! statement and closes the connection before returning. Connect and
//! execution together are bounded by the configured timeout.

use std::future::Future;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use sqlx::mysql::{MySqlConnectOptions, MySqlConnection, MySqlRow};
use sqlx::{Column, ConnectOptions, Connection, Executor, Row};
use tracing::debug;

use sr_ingest_core::config::StarRocksConfig;

use crate::client::CommandClient;
use crate::error::ClientError;
use crate::result::RowSet;

pub struct StarRocksClient {
    options: MySqlConnectOptions,
    timeout: Duration,
}

impl StarRocksClient {
    pub fn new(config: &StarRocksConfig) -> Self {
        // The FE rejects several of the session settings sqlx issues by default.
        let mut options = MySqlConnectOptions::new()
            .host(&config.fe_host)
            .port(config.fe_port)
            .username(&config.user)
            .database(&config.database)
            .statement_cache_capacity(0)
            .pipes_as_concat(false)
            .no_engine_substitution(false)
            .timezone(None::<String>);
        if let Some(password) = &config.password {
            options = options.password(password);
        }

        Self {
            options,
            timeout: config.timeout(),
        }
    }

    async fn connect(&self) -> Result<MySqlConnection, ClientError> {
        self.options
            .connect()
            .await
            .map_err(|e| ClientError::Connect(e.to_string()))
    }

    async fn bounded<T, F>(&self, sql: &str, fut: F) -> Result<T, ClientError>
    where
        F: Future<Output = Result<T, ClientError>>,
    {
        let start = Instant::now();
        let result = tokio::time::timeout(self.timeout, fut)
            .await
            .unwrap_or_else(|_| Err(ClientError::Timeout(self.timeout.as_millis() as u64)));
        debug!(
            sql = %sql,
            elapsed_ms = start.elapsed().as_millis() as u64,
            ok = result.is_ok(),
            "StarRocks command finished"
        );
        result
    }
}

#[async_trait]
impl CommandClient for StarRocksClient {
    async fn query(&self, sql: &str) -> Result<RowSet, ClientError> {
        self.bounded(sql, async {
            let mut conn = self.connect().await?;
            let rows = conn.fetch_all(sql).await;
            let _ = conn.close().await;
            let rows = rows.map_err(map_sqlx_error)?;
            Ok(to_row_set(&rows))
        })
        .await
    }

    async fn execute(&self, sql: &str) -> Result<(), ClientError> {
        self.bounded(sql, async {
            let mut conn = self.connect().await?;
            let done = conn.execute(sql).await;
            let _ = conn.close().await;
            done.map(|_| ()).map_err(map_sqlx_error)
        })
        .await
    }
}

fn map_sqlx_error(e: sqlx::Error) -> ClientError {
    match e {
        sqlx::Error::Database(db) => ClientError::Statement(db.message().to_string()),
        sqlx::Error::Io(e) => ClientError::Connect(e.to_string()),
        sqlx::Error::Tls(e) => ClientError::Connect(e.to_string()),
        e @ (sqlx::Error::ColumnDecode { .. } | sqlx::Error::Decode(_)) => {
            ClientError::Decode(e.to_string())
        }
        other => ClientError::Statement(other.to_string()),
    }
}

fn to_row_set(rows: &[MySqlRow]) -> RowSet {
    let columns = rows
        .first()
        .map(|r| r.columns().iter().map(|c| c.name().to_string()).collect())
        .unwrap_or_default();
    let rows = rows
        .iter()
        .map(|row| (0..row.len()).map(|i| cell_text(row, i)).collect())
        .collect();
    RowSet::new(columns, rows)
}

/// Render a cell as text whatever its declared type.
fn cell_text(row: &MySqlRow, idx: usize) -> Option<String> {
    if let Ok(v) = row.try_get_unchecked::<Option<String>, _>(idx) {
        return v;
    }
    if let Ok(v) = row.try_get_unchecked::<Option<i64>, _>(idx) {
        return v.map(|n| n.to_string());
    }
    if let Ok(v) = row.try_get_unchecked::<Option<f64>, _>(idx) {
        return v.map(|n| n.to_string());
    }
    None
}
