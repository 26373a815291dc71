//! Resolution of a single job's full configuration.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::client::CommandClient;
use crate::error::RoutineError;
use crate::props::{parse_props, PropertyMap};
use crate::statement::{show_create_statement, show_jobs_statement};

/// Columns holding job-level properties, by store version.
const JOB_PROPERTY_COLUMNS: &[&str] = &["JobProperties", "Properties"];
const SOURCE_PROPERTY_COLUMN: &str = "DataSourceProperties";

/// Full configuration of one job, freshly resolved on every call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobDetail {
    pub name: String,
    pub state: String,
    pub table: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub create_sql: Option<String>,
    #[serde(default)]
    pub properties: PropertyMap,
    /// Source connection parameters (broker list, topic, consumer group, ...).
    #[serde(default)]
    pub kafka: PropertyMap,
}

/// Look the job up in `SHOW ROUTINE LOAD` (exact, case-sensitive name match)
/// and, best-effort, attach its creation text.
pub async fn resolve_job_detail(
    client: &dyn CommandClient,
    database: &str,
    name: &str,
) -> Result<JobDetail, RoutineError> {
    if name.trim().is_empty() {
        return Err(RoutineError::Validation("missing name".into()));
    }

    let rows = client.query(&show_jobs_statement(database)).await?;
    let row = rows
        .rows_as_maps()
        .into_iter()
        .find(|r| r.get("Name").map(String::as_str) == Some(name))
        .ok_or_else(|| RoutineError::NotFound(name.to_string()))?;

    let field = |col: &str| row.get(col).cloned().unwrap_or_default();
    let mut properties = PropertyMap::new();
    for col in JOB_PROPERTY_COLUMNS {
        if let Some(text) = row.get(*col) {
            properties.extend(parse_props(text));
        }
    }

    let mut detail = JobDetail {
        name: name.to_string(),
        state: field("State"),
        table: field("TableName"),
        create_sql: None,
        properties,
        kafka: row
            .get(SOURCE_PROPERTY_COLUMN)
            .map(|t| parse_props(t))
            .unwrap_or_default(),
    };

    detail.create_sql = creation_text(client, name).await;
    Ok(detail)
}

/// All cells of the first `SHOW CREATE ROUTINE LOAD` row joined by spaces.
/// Any failure just leaves the text out.
async fn creation_text(client: &dyn CommandClient, name: &str) -> Option<String> {
    match client.query(&show_create_statement(name)).await {
        Ok(rows) => {
            let first = rows.rows.first()?;
            let text = first
                .iter()
                .map(|c| c.as_deref().unwrap_or(""))
                .collect::<Vec<_>>()
                .join(" ");
            (!text.trim().is_empty()).then_some(text)
        }
        Err(e) => {
            debug!(job = %name, error = %e, "Creation text unavailable");
            None
        }
    }
}
