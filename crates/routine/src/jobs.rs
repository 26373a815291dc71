//! Job-level operations against one database.

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::client::CommandClient;
use crate::detail::{resolve_job_detail, JobDetail};
use crate::error::RoutineError;
use crate::statement::{
    build_create_statement, control_statement, show_jobs_statement, validate_job_name,
    ControlAction, CreateRequest,
};
use crate::status::{normalize_state, parse_job_list, IngestionJob};
use crate::update::{UpdateOrchestrator, UpdateOutcome};
use crate::whitelist::{PropertyWhitelist, CREATE_WHITELIST, UPDATE_WHITELIST};

pub const DEFAULT_PAGE_SIZE: usize = 12;
pub const MAX_PAGE_SIZE: usize = 100;

/// States accepted as a list filter; anything else lists every job.
const FILTERABLE_STATES: &[&str] = &["RUNNING", "PAUSED", "FAILED"];

/// Routine-load jobs of one database, reached through a [`CommandClient`].
#[derive(Clone)]
pub struct RoutineLoads {
    client: Arc<dyn CommandClient>,
    database: String,
    create_whitelist: PropertyWhitelist,
    updates: UpdateOrchestrator,
}

impl RoutineLoads {
    pub fn new(client: Arc<dyn CommandClient>, database: impl Into<String>) -> Self {
        let database = database.into();
        Self {
            updates: UpdateOrchestrator::new(client.clone(), database.clone(), UPDATE_WHITELIST),
            client,
            database,
            create_whitelist: CREATE_WHITELIST,
        }
    }

    pub async fn list(&self) -> Result<Vec<IngestionJob>, RoutineError> {
        let rows = self
            .client
            .query(&show_jobs_statement(&self.database))
            .await
            .inspect_err(|e| warn!(operation = "list", error = %e, "Listing routine loads failed"))?;
        Ok(parse_job_list(&rows))
    }

    pub async fn detail(&self, name: &str) -> Result<JobDetail, RoutineError> {
        resolve_job_detail(self.client.as_ref(), &self.database, name)
            .await
            .inspect_err(|e| warn!(operation = "detail", job = %name, error = %e, "Resolving routine load failed"))
    }

    /// Validate, assemble and submit `CREATE ROUTINE LOAD`. Returns the trimmed job name.
    pub async fn create(&self, mut req: CreateRequest) -> Result<String, RoutineError> {
        req.validate()?;
        let sql = build_create_statement(&req, &self.create_whitelist);
        debug!(job = %req.name, sql = %sql, "Creating routine load");
        self.client
            .execute(&sql)
            .await
            .inspect_err(|e| warn!(operation = "create", job = %req.name, error = %e, "Creating routine load failed"))?;
        info!(job = %req.name, table = %req.table, "Routine load created");
        Ok(req.name)
    }

    pub async fn control(&self, action: ControlAction, name: &str) -> Result<(), RoutineError> {
        validate_job_name(name)?;
        let sql = control_statement(action, name);
        debug!(job = %name, sql = %sql, "Issuing control statement");
        self.client.execute(&sql).await.inspect_err(|e| {
            warn!(operation = action.as_str(), job = %name, error = %e, "Control statement failed")
        })?;
        info!(job = %name, action = action.as_str(), "Routine load control applied");
        Ok(())
    }

    /// Pause-alter-resume under the job's lock, run to completion even if the caller goes away.
    pub async fn update_properties(
        &self,
        name: &str,
        properties: BTreeMap<String, String>,
    ) -> Result<UpdateOutcome, RoutineError> {
        validate_job_name(name)?;
        self.updates.update_detached(name.to_string(), properties).await
    }
}

// ── Listing ──────────────────────────────────────────────────────

/// State filter plus pagination, built from raw query parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobQuery {
    pub state: Option<String>,
    pub page: usize,
    pub page_size: usize,
}

impl Default for JobQuery {
    fn default() -> Self {
        Self {
            state: None,
            page: 1,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

impl JobQuery {
    /// Lenient parse: unknown states mean no filter, a bad `page` means 1,
    /// an unparseable `page_size` means the default and others clamp to 1..=100.
    pub fn from_params(state: Option<&str>, page: Option<&str>, page_size: Option<&str>) -> Self {
        let state = state
            .map(normalize_state)
            .filter(|s| FILTERABLE_STATES.contains(&s.as_str()));
        let page = page
            .and_then(|p| p.trim().parse::<i64>().ok())
            .filter(|p| *p > 0)
            .map_or(1, |p| p as usize);
        let page_size = page_size
            .and_then(|p| p.trim().parse::<i64>().ok())
            .map_or(DEFAULT_PAGE_SIZE, |n| n.clamp(1, MAX_PAGE_SIZE as i64) as usize);
        Self { state, page, page_size }
    }

    /// Filter then slice. Returns the page and the filtered total.
    pub fn apply(&self, jobs: Vec<IngestionJob>) -> (Vec<IngestionJob>, usize) {
        let filtered: Vec<IngestionJob> = match &self.state {
            Some(state) => jobs
                .into_iter()
                .filter(|j| &j.normalized_state() == state)
                .collect(),
            None => jobs,
        };
        let total = filtered.len();
        let start = self.page.saturating_sub(1).saturating_mul(self.page_size).min(total);
        let page = filtered
            .into_iter()
            .skip(start)
            .take(self.page_size)
            .collect();
        (page, total)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ClientError;
    use crate::result::RowSet;
    use crate::statement::KafkaSource;
    use crate::testing::ScriptedClient;

    fn service(client: ScriptedClient) -> (RoutineLoads, Arc<ScriptedClient>) {
        let client = Arc::new(client);
        (RoutineLoads::new(client.clone(), "eventdb"), client)
    }

    fn jobs(n: usize) -> Vec<IngestionJob> {
        (0..n)
            .map(|i| IngestionJob {
                name: format!("j{}", i),
                state: if i % 2 == 0 { "RUNNING" } else { "paused" }.into(),
                ..Default::default()
            })
            .collect()
    }

    #[tokio::test]
    async fn list_parses_rows() {
        let rows = RowSet::from_strs(
            &["Name", "State", "TableName", "Statistic"],
            &[&["clicks_rl", "RUNNING", "clicks", r#"{"loadedRows":5}"#]],
        );
        let (svc, client) = service(ScriptedClient::new().on_query("SHOW ROUTINE LOAD", rows));
        let list = svc.list().await.unwrap();
        assert_eq!(list[0].processed, Some(5));
        assert_eq!(client.statements(), vec!["SHOW ROUTINE LOAD FROM eventdb".to_string()]);
    }

    #[tokio::test]
    async fn create_validates_before_executing() {
        let (svc, client) = service(ScriptedClient::new());
        let err = svc.create(CreateRequest::default()).await.unwrap_err();
        assert!(err.is_client_error());
        assert!(client.statements().is_empty());
    }

    #[tokio::test]
    async fn create_submits_statement() {
        let (svc, client) = service(ScriptedClient::new());
        let req = CreateRequest {
            name: " clicks_rl ".into(),
            table: "clicks".into(),
            kafka: KafkaSource {
                broker_list: "kafka:9092".into(),
                topic: "clicks".into(),
                group_id: "g1".into(),
            },
            ..Default::default()
        };
        assert_eq!(svc.create(req).await.unwrap(), "clicks_rl");
        let stmts = client.statements();
        assert_eq!(stmts.len(), 1);
        assert!(stmts[0].starts_with("CREATE ROUTINE LOAD clicks_rl\nON clicks"));
        assert!(stmts[0].contains("\"max_batch_rows\" = \"200000\""));
    }

    #[tokio::test]
    async fn create_surfaces_store_text() {
        let (svc, _) = service(
            ScriptedClient::new().fail("CREATE", ClientError::Statement("Table clicks does not exist".into())),
        );
        let req = CreateRequest {
            name: "a".into(),
            table: "clicks".into(),
            kafka: KafkaSource {
                broker_list: "b".into(),
                topic: "t".into(),
                group_id: "g".into(),
            },
            ..Default::default()
        };
        let err = svc.create(req).await.unwrap_err();
        assert_eq!(err.to_string(), "Table clicks does not exist");
    }

    #[tokio::test]
    async fn control_statements() {
        let (svc, client) = service(ScriptedClient::new());
        svc.control(ControlAction::Pause, "a").await.unwrap();
        svc.control(ControlAction::Resume, "a").await.unwrap();
        svc.control(ControlAction::Stop, "a").await.unwrap();
        assert_eq!(
            client.statements(),
            vec![
                "PAUSE ROUTINE LOAD FOR a".to_string(),
                "RESUME ROUTINE LOAD FOR a".to_string(),
                "STOP ROUTINE LOAD FOR a".to_string(),
            ]
        );
        assert!(svc.control(ControlAction::Stop, "a b").await.unwrap_err().is_client_error());
    }

    #[test]
    fn query_defaults_and_clamps() {
        assert_eq!(JobQuery::from_params(None, None, None), JobQuery::default());

        let q = JobQuery::from_params(Some(" paused "), Some("0"), Some("0"));
        assert_eq!(q.state.as_deref(), Some("PAUSED"));
        assert_eq!(q.page, 1);
        assert_eq!(q.page_size, 1);

        let q = JobQuery::from_params(Some("NEED_SCHEDULE"), Some("x"), Some("500"));
        assert_eq!(q.state, None);
        assert_eq!(q.page, 1);
        assert_eq!(q.page_size, 100);

        assert_eq!(JobQuery::from_params(None, None, Some("-3")).page_size, 1);
        assert_eq!(JobQuery::from_params(None, None, Some("abc")).page_size, DEFAULT_PAGE_SIZE);
    }

    #[test]
    fn filter_matches_normalized_state() {
        let q = JobQuery::from_params(Some("PAUSED"), None, None);
        let (page, total) = q.apply(jobs(5));
        assert_eq!(total, 2);
        assert_eq!(page.iter().map(|j| j.name.as_str()).collect::<Vec<_>>(), ["j1", "j3"]);
    }

    #[test]
    fn pages_slice_and_overflow_is_empty() {
        let q = JobQuery::from_params(None, Some("2"), Some("12"));
        let (page, total) = q.apply(jobs(30));
        assert_eq!(total, 30);
        assert_eq!(page.len(), 12);
        assert_eq!(page[0].name, "j12");

        let q = JobQuery::from_params(None, Some("3"), Some("12"));
        assert_eq!(q.apply(jobs(30)).0.len(), 6);

        let q = JobQuery::from_params(None, Some("9"), None);
        let (page, total) = q.apply(jobs(30));
        assert!(page.is_empty());
        assert_eq!(total, 30);
    }

    #[test]
    fn page_zero_reads_as_first_page() {
        let q = JobQuery { state: None, page: 0, page_size: 12 };
        let (page, total) = q.apply(jobs(30));
        assert_eq!(total, 30);
        assert_eq!(page.len(), 12);
        assert_eq!(page[0].name, "j0");
    }
}
