//! The seam between job logic and the store's administrative interface.

use async_trait::async_trait;

use crate::error::ClientError;
use crate::result::RowSet;

/// Executes textual statements against the store.
///
/// Implementations open a bounded-lifetime connection per call and close it
/// before returning; nothing is held across calls.
#[async_trait]
pub trait CommandClient: Send + Sync {
    /// Run a statement that produces rows (`SHOW ...`, `SELECT ...`).
    async fn query(&self, sql: &str) -> Result<RowSet, ClientError>;

    /// Run a statement for its side effect (`CREATE`, `ALTER`, `PAUSE`, ...).
    async fn execute(&self, sql: &str) -> Result<(), ClientError>;
}
