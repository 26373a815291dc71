//! Routine-load job orchestration for a StarRocks-backed ingestion platform.
//!
//! Everything here talks to the store through [`CommandClient`], so the
//! parsing, statement assembly, update protocol and metrics logic can be
//! exercised against a scripted client in tests.

pub mod client;
pub mod detail;
pub mod error;
pub mod jobs;
pub mod metrics;
pub mod props;
pub mod result;
pub mod starrocks;
pub mod statement;
pub mod status;
pub mod update;
pub mod whitelist;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use client::CommandClient;
pub use detail::JobDetail;
pub use error::{ClientError, RoutineError};
pub use jobs::{JobQuery, RoutineLoads};
pub use metrics::{Anomaly, MetricsAggregator, MetricsSnapshot};
pub use result::RowSet;
pub use starrocks::StarRocksClient;
pub use statement::{ControlAction, CreateRequest, KafkaSource};
pub use status::{normalize_state, IngestionJob, StatisticCounts};
pub use update::{JobLocks, UpdateOrchestrator, UpdateOutcome, UpdatePhase};
pub use whitelist::{PropertyWhitelist, CREATE_WHITELIST, UPDATE_WHITELIST};
