//! HTTP router construction.
//!
//! Assembles the `/api` routes, CORS, access logging and the static asset
//! fallback into a single `Router`.

use std::path::Path;
use std::sync::Arc;

use axum::http::{HeaderName, HeaderValue};
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::warn;

use crate::api;
use crate::state::AppState;

/// Build the complete application router with all routes and middleware.
pub fn build_router(state: Arc<AppState>, cors_origin: &str, static_dir: &Path) -> Router {
    let app = Router::new()
        .route("/api/health", get(api::health))
        .route("/api/summary", get(api::summary))
        .route("/api/kafka/topics", get(api::kafka_topics))
        .route(
            "/api/starrocks/jobs",
            get(api::list_jobs).post(api::create_job),
        )
        .route(
            "/api/starrocks/jobs/{name}",
            get(api::get_job).put(api::update_job),
        )
        .route("/api/starrocks/jobs/{name}/pause", post(api::pause_job))
        .route("/api/starrocks/jobs/{name}/resume", post(api::resume_job))
        .route("/api/starrocks/jobs/{name}/stop", post(api::stop_job));

    let app = if static_dir.is_dir() {
        app.fallback_service(ServeDir::new(static_dir))
    } else {
        app
    };

    app.layer(cors_layer(cors_origin))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// `*` allows any origin; anything else is taken as the single allowed origin.
fn cors_layer(origin: &str) -> CorsLayer {
    if origin.trim() == "*" {
        return CorsLayer::permissive();
    }
    match HeaderValue::from_str(origin.trim()) {
        Ok(value) => CorsLayer::new()
            .allow_origin(value)
            .allow_methods(Any)
            .allow_headers(Any)
            .expose_headers([
                HeaderName::from_static(api::TOTAL_COUNT_HEADER),
                HeaderName::from_static(api::PAGE_HEADER),
                HeaderName::from_static(api::PAGE_SIZE_HEADER),
            ]),
        Err(_) => {
            warn!(origin = %origin, "Invalid CORS origin, allowing any");
            CorsLayer::permissive()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::topics::{TopicInfo, TopicLister};
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use http_body_util::BodyExt;
    use serde_json::{json, Value};
    use sr_ingest_routine::testing::ScriptedClient;
    use sr_ingest_routine::{ClientError, MetricsAggregator, RoutineLoads, RowSet};
    use tower::ServiceExt;

    fn job_rows() -> RowSet {
        RowSet::from_strs(
            &["Name", "State", "TableName", "Statistic", "JobProperties"],
            &[
                &["clicks_rl", "RUNNING", "clicks", r#"{"loadedRows":10,"errorRows":1}"#, "{}"],
                &["orders_rl", "PAUSED", "orders", "", "{}"],
                &["views_rl", "FAILED", "views", "n/a", "{}"],
            ],
        )
    }

    fn state(client: ScriptedClient) -> (AppState, Arc<ScriptedClient>) {
        let client = Arc::new(client);
        let state = AppState {
            env: "test".into(),
            jobs: RoutineLoads::new(client.clone(), "eventdb"),
            metrics: MetricsAggregator::new(client.clone(), "eventdb", "event_time", "errors"),
            topics: None,
        };
        (state, client)
    }

    fn app(client: ScriptedClient) -> (Router, Arc<ScriptedClient>) {
        let (state, client) = state(client);
        (
            build_router(Arc::new(state), "*", Path::new("does-not-exist")),
            client,
        )
    }

    async fn send(app: Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, axum::http::HeaderMap, Value) {
        let mut req = Request::builder().method(method).uri(uri);
        let body = match body {
            Some(v) => {
                req = req.header("content-type", "application/json");
                Body::from(v.to_string())
            }
            None => Body::empty(),
        };
        let resp = app.oneshot(req.body(body).unwrap()).await.unwrap();
        let status = resp.status();
        let headers = resp.headers().clone();
        let bytes = resp.into_body().collect().await.unwrap().to_bytes();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, headers, json)
    }

    #[tokio::test]
    async fn health_reports_env() {
        let (app, _) = app(ScriptedClient::new());
        let (status, _, body) = send(app, "GET", "/api/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["ok"], true);
        assert_eq!(body["env"], "test");
        assert_eq!(body["server"], "sr-ingest-api");
        assert!(body["time"].as_str().is_some());
    }

    #[tokio::test]
    async fn list_jobs_filters_and_pages() {
        let (app, _) = app(ScriptedClient::new().on_query("SHOW ROUTINE LOAD", job_rows()));
        let (status, headers, body) =
            send(app, "GET", "/api/starrocks/jobs?state=paused&page=1&page_size=500", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(headers["x-total-count"], "1");
        assert_eq!(headers["x-page"], "1");
        assert_eq!(headers["x-page-size"], "100");
        assert_eq!(body.as_array().unwrap().len(), 1);
        assert_eq!(body[0]["name"], "orders_rl");
        assert_eq!(body[0]["processed"], Value::Null);
    }

    #[tokio::test]
    async fn list_jobs_reports_counts() {
        let (app, _) = app(ScriptedClient::new().on_query("SHOW ROUTINE LOAD", job_rows()));
        let (_, headers, body) = send(app, "GET", "/api/starrocks/jobs", None).await;
        assert_eq!(headers["x-total-count"], "3");
        assert_eq!(headers["x-page-size"], "12");
        assert_eq!(body[0]["processed"], 10);
        assert_eq!(body[0]["errors"], 1);
    }

    #[tokio::test]
    async fn list_jobs_degrades_to_empty() {
        let (app, _) = app(ScriptedClient::new().fail("SHOW", ClientError::Connect("refused".into())));
        let (status, headers, body) = send(app, "GET", "/api/starrocks/jobs?page=4", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!([]));
        assert_eq!(headers["x-total-count"], "0");
        assert_eq!(headers["x-page"], "4");
    }

    #[tokio::test]
    async fn job_detail_and_errors() {
        let (app, _) = app(ScriptedClient::new().on_query("SHOW ROUTINE LOAD", job_rows()));
        let (status, _, body) = send(app.clone(), "GET", "/api/starrocks/jobs/clicks_rl", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["state"], "RUNNING");
        assert!(body.get("create_sql").is_none());

        let (status, _, body) = send(app.clone(), "GET", "/api/starrocks/jobs/nope", None).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], "routine load not found: nope");

        let (status, _, body) = send(app, "GET", "/api/starrocks/jobs/%20", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "missing name");
    }

    #[tokio::test]
    async fn create_job_paths() {
        let (app, client) = app(ScriptedClient::new());
        let valid = json!({
            "name": "clicks_rl",
            "table": "clicks",
            "kafka": {"broker_list": "kafka:9092", "topic": "clicks", "group_id": "g1"},
            "properties": {"max_batch_rows": "1000", "format": "json", "evil": "x"}
        });

        let (status, _, body) = send(app.clone(), "POST", "/api/starrocks/jobs", Some(valid)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"ok": true, "name": "clicks_rl"}));
        let sql = &client.statements()[0];
        assert!(sql.contains("\"max_batch_rows\" = \"200000\""));
        assert!(!sql.contains("evil"));

        let (status, _, body) =
            send(app.clone(), "POST", "/api/starrocks/jobs", Some(json!({"name": "x"}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "missing required fields");

        let smuggled = json!({
            "name": "clicks_rl",
            "table": "clicks",
            "kafka": {"broker_list": "kafka:9092", "topic": "clicks", "group_id": "g1"},
            "columns": ["a"],
            "set": {"b": "1) PROPERTIES (\"timezone\" = \"Evil/Zone\") --"}
        });
        let (status, _, body) = send(app.clone(), "POST", "/api/starrocks/jobs", Some(smuggled)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "invalid expression for b");
        assert_eq!(client.statements().len(), 1);

        let req = Request::builder()
            .method("POST")
            .uri("/api/starrocks/jobs")
            .header("content-type", "application/json")
            .body(Body::from("{not json"))
            .unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn create_job_store_failure_is_500() {
        let (app, _) = app(
            ScriptedClient::new().fail("CREATE", ClientError::Statement("Unknown table 'clicks'".into())),
        );
        let body = json!({
            "name": "clicks_rl",
            "table": "clicks",
            "kafka": {"broker_list": "b", "topic": "t", "group_id": "g"}
        });
        let (status, _, body) = send(app, "POST", "/api/starrocks/jobs", Some(body)).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], "Unknown table 'clicks'");
    }

    #[tokio::test]
    async fn control_endpoints() {
        let (app, client) = app(
            ScriptedClient::new().fail("STOP", ClientError::Statement("job already stopped".into())),
        );
        let (status, _, body) = send(app.clone(), "POST", "/api/starrocks/jobs/clicks_rl/pause", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"ok": true}));

        let (status, _, _) = send(app.clone(), "POST", "/api/starrocks/jobs/clicks_rl/resume", None).await;
        assert_eq!(status, StatusCode::OK);

        let (status, _, body) = send(app.clone(), "POST", "/api/starrocks/jobs/clicks_rl/stop", None).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], "job already stopped");

        let (status, _, _) = send(app, "POST", "/api/starrocks/jobs/%20/pause", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(client.statements().len(), 3);
    }

    #[tokio::test]
    async fn update_runs_pause_alter_resume() {
        let (app, client) = app(ScriptedClient::new().on_query("SHOW ROUTINE LOAD", job_rows()));
        let body = json!({"properties": {"desired_concurrent_number": "2"}});
        let (status, _, body) = send(app, "PUT", "/api/starrocks/jobs/clicks_rl", Some(body)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["ok"], true);
        assert_eq!(body["paused"], true);
        assert_eq!(body["resumed"], true);

        let stmts = client.statements();
        assert!(stmts.iter().any(|s| s.starts_with("ALTER ROUTINE LOAD FOR clicks_rl")));
        assert_eq!(stmts.last().map(String::as_str), Some("RESUME ROUTINE LOAD FOR clicks_rl"));
    }

    #[tokio::test]
    async fn update_validation() {
        let (app, client) = app(ScriptedClient::new().on_query("SHOW ROUTINE LOAD", job_rows()));

        let (status, _, body) =
            send(app.clone(), "PUT", "/api/starrocks/jobs/clicks_rl", Some(json!({"properties": {}}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "no properties");

        let (status, _, body) = send(
            app,
            "PUT",
            "/api/starrocks/jobs/clicks_rl",
            Some(json!({"properties": {"format": "csv"}})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "no valid properties");
        assert!(client.statements().is_empty());
    }

    #[tokio::test]
    async fn update_alter_failure_keeps_flags() {
        let (app, _) = app(
            ScriptedClient::new()
                .on_query("SHOW ROUTINE LOAD", job_rows())
                .fail("ALTER", ClientError::Statement("invalid property".into())),
        );
        let body = json!({"properties": {"max_error_number": "10"}});
        let (status, _, body) = send(app, "PUT", "/api/starrocks/jobs/clicks_rl", Some(body)).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["ok"], false);
        assert_eq!(body["error"], "invalid property");
        assert_eq!(body["paused"], true);
        assert_eq!(body["resumed"], false);
    }

    struct FixedTopics;

    #[async_trait]
    impl TopicLister for FixedTopics {
        async fn list_topics(&self) -> anyhow::Result<Vec<TopicInfo>> {
            Ok(vec![
                TopicInfo { name: "clicks".into(), partitions: 3 },
                TopicInfo { name: "orders".into(), partitions: 6 },
            ])
        }
    }

    struct BrokenTopics;

    #[async_trait]
    impl TopicLister for BrokenTopics {
        async fn list_topics(&self) -> anyhow::Result<Vec<TopicInfo>> {
            anyhow::bail!("no brokers reachable")
        }
    }

    #[tokio::test]
    async fn summary_combines_sources() {
        let client = ScriptedClient::new()
            .on_query("SHOW ROUTINE LOAD", job_rows())
            .on_query(
                "SELECT TABLE_NAME",
                RowSet::from_strs(&["TABLE_NAME"], &[&["clicks"], &["orders"]]),
            )
            .on_query("SELECT COUNT(*) FROM `clicks`", RowSet::from_strs(&["c"], &[&["7"]]))
            .fail("SELECT COUNT(*) FROM `orders`", ClientError::Timeout(5000))
            .on_query("SELECT COUNT(*) FROM `errors`", RowSet::from_strs(&["c"], &[&["4"]]));
        let (state, _) = state(client);
        let state = state.with_topics(Arc::new(FixedTopics));
        let app = build_router(Arc::new(state), "*", Path::new("does-not-exist"));

        let (status, _, body) = send(app, "GET", "/api/summary", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["jobs"], json!({"total": 3, "running": 1, "paused": 1, "failed": 1}));
        assert_eq!(body["kafka"], json!({"topics": 2, "partitions": 9, "under_replicated": 0}));
        assert_eq!(body["throughput"]["current"], 7);
        assert_eq!(body["errors"]["last_10m"], 4);
        assert_eq!(body["lag"]["p95_ms"], 0);
        let names: Vec<&str> = body["anomalies"]
            .as_array()
            .unwrap()
            .iter()
            .map(|a| a["name"].as_str().unwrap())
            .collect();
        assert_eq!(names, ["orders_rl", "views_rl"]);
    }

    #[tokio::test]
    async fn summary_survives_total_outage() {
        let (state, _) = state(ScriptedClient::new().fail("", ClientError::Connect("down".into())));
        let state = state.with_topics(Arc::new(BrokenTopics));
        let app = build_router(Arc::new(state), "*", Path::new("does-not-exist"));

        let (status, _, body) = send(app, "GET", "/api/summary", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["jobs"]["total"], 0);
        assert_eq!(body["kafka"]["topics"], 0);
        assert_eq!(body["anomalies"], json!([]));
    }

    #[tokio::test]
    async fn topics_endpoint() {
        let (app, _) = app(ScriptedClient::new());
        let (status, _, body) = send(app, "GET", "/api/kafka/topics", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!([]));

        let (state, _) = state(ScriptedClient::new());
        let app = build_router(
            Arc::new(state.with_topics(Arc::new(FixedTopics))),
            "http://localhost:3000",
            Path::new("does-not-exist"),
        );
        let (_, _, body) = send(app, "GET", "/api/kafka/topics", None).await;
        assert_eq!(body[1], json!({"name": "orders", "partitions": 6}));
    }
}
