use std::env;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Load .env file (silently ignores if missing).
pub fn load_dotenv() {
    dotenvy::dotenv().ok();
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_opt(key: &str) -> Option<String> {
    env::var(key).ok().filter(|s| !s.is_empty())
}

/// Read a profiled env var: tries {PROFILE}_{KEY} first, falls back to {KEY}.
fn profiled_env_opt(profile: &str, key: &str) -> Option<String> {
    if !profile.is_empty() {
        let prefixed = format!("{}_{}", profile, key);
        if let Some(v) = env_opt(&prefixed) {
            return Some(v);
        }
    }
    env_opt(key)
}

fn profiled_env_or(profile: &str, key: &str, default: &str) -> String {
    profiled_env_opt(profile, key).unwrap_or_else(|| default.to_string())
}

fn profiled_env_u16(profile: &str, key: &str, default: u16) -> u16 {
    profiled_env_opt(profile, key)
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn profiled_env_u64(profile: &str, key: &str, default: u64) -> u64 {
    profiled_env_opt(profile, key)
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

// ── Top-level config ──────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Active profile name (empty = default).
    pub profile: String,
    pub server: ServerConfig,
    pub starrocks: StarRocksConfig,
    pub kafka: KafkaConfig,
}

impl Config {
    /// Build config from environment variables (call `load_dotenv()` first).
    /// Profile is read from `SR_INGEST_PROFILE`. When set (e.g. `PROD`),
    /// every key is first looked up as `{PROFILE}_{KEY}`, falling back to `{KEY}`.
    pub fn from_env() -> Self {
        let profile = env_or("SR_INGEST_PROFILE", "").to_uppercase();
        Self::for_profile(&profile)
    }

    /// Build config for a specific named profile (empty string = default).
    pub fn for_profile(profile: &str) -> Self {
        let p = profile.to_uppercase();
        let p = p.as_str();
        Self {
            profile: p.to_string(),
            server: ServerConfig::from_env_profiled(p),
            starrocks: StarRocksConfig::from_env_profiled(p),
            kafka: KafkaConfig::from_env_profiled(p),
        }
    }

    pub fn profile_label(&self) -> &str {
        if self.profile.is_empty() { "default" } else { &self.profile }
    }

    /// Reject settings the server cannot start with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.port == 0 {
            return Err(ConfigError::InvalidValue {
                key: "PORT".into(),
                value: "0".into(),
            });
        }
        if self.starrocks.fe_host.trim().is_empty() {
            return Err(ConfigError::Missing("STARROCKS_FE_HOST".into()));
        }
        if self.starrocks.database.trim().is_empty() {
            return Err(ConfigError::Missing("STARROCKS_DATABASE".into()));
        }
        let plain = |s: &str| !s.is_empty() && s.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
        if !plain(&self.starrocks.database) {
            return Err(ConfigError::InvalidValue {
                key: "STARROCKS_DATABASE".into(),
                value: self.starrocks.database.clone(),
            });
        }
        if !plain(&self.starrocks.event_time_column) {
            return Err(ConfigError::InvalidValue {
                key: "STARROCKS_EVENT_TIME_COLUMN".into(),
                value: self.starrocks.event_time_column.clone(),
            });
        }
        if !plain(&self.starrocks.errors_table) {
            return Err(ConfigError::InvalidValue {
                key: "STARROCKS_ERRORS_TABLE".into(),
                value: self.starrocks.errors_table.clone(),
            });
        }
        Ok(())
    }

    /// Print a redacted summary for startup logs.
    pub fn log_summary(&self) {
        tracing::info!("Config loaded (profile: {}):", self.profile_label());
        tracing::info!("  server:     {}:{} env={}", self.server.host, self.server.port, self.server.env);
        tracing::info!("  static:     {}", self.server.static_dir.display());
        tracing::info!(
            "  starrocks:  {}:{} db={} user={} timeout={}s",
            self.starrocks.fe_host,
            self.starrocks.fe_port,
            self.starrocks.database,
            self.starrocks.user,
            self.starrocks.timeout_secs
        );
        tracing::info!("  kafka:      brokers={}", self.kafka.brokers.join(","));
    }

}

// ── Server ────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub cors_origin: String,
    pub static_dir: PathBuf,
    /// Environment label reported by the health endpoint.
    pub env: String,
}

impl ServerConfig {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            host: profiled_env_or(p, "HOST", "0.0.0.0"),
            port: profiled_env_u16(p, "PORT", 8088),
            cors_origin: profiled_env_or(p, "CORS_ORIGIN", "*"),
            static_dir: PathBuf::from(profiled_env_or(p, "STATIC_DIR", "ui")),
            env: profiled_env_or(p, "ENV", "dev"),
        }
    }
}

// ── StarRocks ─────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StarRocksConfig {
    pub fe_host: String,
    pub fe_port: u16,
    pub user: String,
    pub password: Option<String>,
    pub database: String,
    pub timeout_secs: u64,
    /// Column that marks a table as event-bearing.
    pub event_time_column: String,
    pub errors_table: String,
}

impl StarRocksConfig {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            fe_host: profiled_env_or(p, "STARROCKS_FE_HOST", "starrocks-fe"),
            fe_port: profiled_env_u16(p, "STARROCKS_FE_PORT", 9030),
            user: profiled_env_or(p, "STARROCKS_USER", "root"),
            password: profiled_env_opt(p, "STARROCKS_PASSWORD"),
            database: profiled_env_or(p, "STARROCKS_DATABASE", "eventdb"),
            timeout_secs: profiled_env_u64(p, "STARROCKS_TIMEOUT_SECS", 5).max(1),
            event_time_column: profiled_env_or(p, "STARROCKS_EVENT_TIME_COLUMN", "event_time"),
            errors_table: profiled_env_or(p, "STARROCKS_ERRORS_TABLE", "errors"),
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

// ── Kafka ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KafkaConfig {
    pub brokers: Vec<String>,
}

impl KafkaConfig {
    fn from_env_profiled(p: &str) -> Self {
        let brokers = profiled_env_or(p, "KAFKA_BROKERS", "kafka:9092")
            .split(',')
            .map(|b| b.trim().to_string())
            .filter(|b| !b.is_empty())
            .collect();
        Self { brokers }
    }
}
