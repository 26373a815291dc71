//! In-memory [`CommandClient`] for tests.
//!
//! Responses are keyed by statement prefix; the longest matching prefix
//! wins. Unmatched queries fail, unmatched executes succeed. Every statement
//! is recorded in order.

use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;

use crate::client::CommandClient;
use crate::error::ClientError;
use crate::result::RowSet;

enum Scripted {
    Rows(RowSet),
    Fail(ClientError),
}

#[derive(Default)]
pub struct ScriptedClient {
    script: Vec<(String, Scripted)>,
    delay: Option<Duration>,
    log: Mutex<Vec<String>>,
}

impl ScriptedClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return `rows` for queries starting with `prefix`.
    pub fn on_query(mut self, prefix: &str, rows: RowSet) -> Self {
        self.script.push((prefix.to_string(), Scripted::Rows(rows)));
        self
    }

    /// Fail queries and executes starting with `prefix`.
    pub fn fail(mut self, prefix: &str, err: ClientError) -> Self {
        self.script.push((prefix.to_string(), Scripted::Fail(err)));
        self
    }

    /// Sleep before answering each statement.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn statements(&self) -> Vec<String> {
        self.log.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    async fn record(&self, sql: &str) -> Option<&Scripted> {
        self.log
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(sql.to_string());
        if let Some(d) = self.delay {
            tokio::time::sleep(d).await;
        }
        self.script
            .iter()
            .filter(|(prefix, _)| sql.starts_with(prefix.as_str()))
            .max_by_key(|(prefix, _)| prefix.len())
            .map(|(_, s)| s)
    }
}

#[async_trait]
impl CommandClient for ScriptedClient {
    async fn query(&self, sql: &str) -> Result<RowSet, ClientError> {
        match self.record(sql).await {
            Some(Scripted::Rows(rows)) => Ok(rows.clone()),
            Some(Scripted::Fail(err)) => Err(err.clone()),
            None => Err(ClientError::Statement(format!("no scripted response for: {}", sql))),
        }
    }

    async fn execute(&self, sql: &str) -> Result<(), ClientError> {
        match self.record(sql).await {
            Some(Scripted::Fail(err)) => Err(err.clone()),
            _ => Ok(()),
        }
    }
}
