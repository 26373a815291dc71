mod api;
mod router;
mod state;
mod topics;

use std::sync::Arc;

use tracing::info;
use tracing_subscriber::EnvFilter;

use sr_ingest_core::Config;
use sr_ingest_routine::{CommandClient, StarRocksClient};

use crate::state::AppState;
use crate::topics::JobSourceTopics;

fn load_config() -> Config {
    sr_ingest_core::config::load_dotenv();
    Config::from_env()
}

/// `RUST_LOG` picks the filter (default `info`); `LOG_FORMAT=json` switches to JSON lines.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let json = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_level(true);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

async fn serve(config: &Config) -> anyhow::Result<()> {
    let client: Arc<dyn CommandClient> = Arc::new(StarRocksClient::new(&config.starrocks));
    let topics = JobSourceTopics::new(client.clone(), config.starrocks.database.clone());
    let state = Arc::new(AppState::new(config, client).with_topics(Arc::new(topics)));
    let app = router::build_router(state, &config.server.cors_origin, &config.server.static_dir);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Server listening on http://{}", addr);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = load_config();
    config.validate()?;
    config.log_summary();

    serve(&config).await
}
