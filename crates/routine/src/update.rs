//! Property updates on live jobs.
//!
//! The store only accepts `ALTER ROUTINE LOAD` while a job is paused, so an
//! update runs as a small state machine:
//!
//! ```text
//! Observing ──resolved, not paused──▶ Pausing ──▶ Altering ──was running──▶ Resuming ──▶ Done
//!     │                                              ▲   │
//!     ├──resolved, already paused────────────────────┘   └──alter failed──▶ Degraded
//!     └──unresolved (best effort)────────────────────┘
//! ```
//!
//! A failed pause or resume is logged and the run still ends after the
//! alter; the outcome records which optional steps actually happened so an
//! operator can tell whether the job was left paused. The whole sequence
//! holds a per-job lock so concurrent updates of one job cannot interleave.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, PoisonError};

use serde::Serialize;
use tokio::sync::OwnedMutexGuard;
use tracing::{info, warn};

use crate::client::CommandClient;
use crate::detail::resolve_job_detail;
use crate::error::RoutineError;
use crate::statement::{build_alter_statement, control_statement, validate_job_name, ControlAction};
use crate::status::normalize_state;
use crate::whitelist::PropertyWhitelist;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UpdatePhase {
    Observing,
    Pausing,
    Altering,
    Resuming,
    /// Alter applied and every attempted step succeeded.
    Done,
    /// Alter failed, or it succeeded while a pause, resume or state lookup did not.
    Degraded,
}

/// What an update run did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UpdateOutcome {
    /// The alter statement was accepted.
    pub ok: bool,
    /// The job was known to be paused when the alter ran (already paused, or paused by this run).
    pub paused: bool,
    /// The job was resumed after the alter.
    pub resumed: bool,
    /// Normalized state seen before any change; `None` when it could not be resolved.
    pub observed_state: Option<String>,
    pub phase: UpdatePhase,
    /// Store error text when the alter was rejected.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl UpdateOutcome {
    fn new() -> Self {
        Self {
            ok: false,
            paused: false,
            resumed: false,
            observed_state: None,
            phase: UpdatePhase::Observing,
            error: None,
        }
    }
}

// ── Per-job locks ────────────────────────────────────────────────

/// Mutual exclusion keyed by job name.
///
/// Entries exist only while some request holds or waits for them.
#[derive(Clone, Default)]
pub struct JobLocks {
    inner: Arc<Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>>,
}

pub struct JobGuard {
    locks: JobLocks,
    name: String,
    guard: Option<OwnedMutexGuard<()>>,
}

impl JobLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn lock(&self, name: &str) -> JobGuard {
        let mutex = {
            let mut map = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
            map.entry(name.to_string()).or_default().clone()
        };
        let guard = mutex.lock_owned().await;
        JobGuard {
            locks: self.clone(),
            name: name.to_string(),
            guard: Some(guard),
        }
    }

    /// Number of job names currently held or awaited.
    #[cfg(test)]
    fn active(&self) -> usize {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}

impl Drop for JobGuard {
    fn drop(&mut self) {
        drop(self.guard.take());
        let mut map = self.locks.inner.lock().unwrap_or_else(PoisonError::into_inner);
        if map.get(&self.name).is_some_and(|m| Arc::strong_count(m) == 1) {
            map.remove(&self.name);
        }
    }
}

// ── Orchestrator ─────────────────────────────────────────────────

#[derive(Clone)]
pub struct UpdateOrchestrator {
    client: Arc<dyn CommandClient>,
    database: String,
    whitelist: PropertyWhitelist,
    locks: JobLocks,
}

impl UpdateOrchestrator {
    pub fn new(
        client: Arc<dyn CommandClient>,
        database: impl Into<String>,
        whitelist: PropertyWhitelist,
    ) -> Self {
        Self {
            client,
            database: database.into(),
            whitelist,
            locks: JobLocks::new(),
        }
    }

    #[cfg(test)]
    fn locks(&self) -> &JobLocks {
        &self.locks
    }

    /// Apply `properties` to `name`, pausing and resuming around the alter as needed.
    ///
    /// Validation problems (bad name, nothing whitelisted) are returned as
    /// errors before any statement is issued. Store failures are reported in
    /// the outcome so the pause/resume flags are never lost.
    pub async fn update(
        &self,
        name: &str,
        properties: &BTreeMap<String, String>,
    ) -> Result<UpdateOutcome, RoutineError> {
        validate_job_name(name)?;
        let alter = build_alter_statement(name, properties, &self.whitelist)?;

        let _guard = self.locks.lock(name).await;
        let mut run = UpdateRun {
            orchestrator: self,
            name,
            alter: &alter,
            outcome: UpdateOutcome::new(),
            degraded: false,
        };
        let mut phase = UpdatePhase::Observing;
        while !matches!(phase, UpdatePhase::Done | UpdatePhase::Degraded) {
            run.outcome.phase = phase;
            phase = run.step(phase).await;
        }
        run.outcome.phase = phase;

        info!(
            job = %name,
            ok = run.outcome.ok,
            paused = run.outcome.paused,
            resumed = run.outcome.resumed,
            phase = ?phase,
            "Routine load update finished"
        );
        Ok(run.outcome)
    }

    /// Run [`update`](Self::update) on its own task so a dropped caller cannot
    /// cut the sequence short.
    pub async fn update_detached(
        &self,
        name: String,
        properties: BTreeMap<String, String>,
    ) -> Result<UpdateOutcome, RoutineError> {
        let this = self.clone();
        tokio::spawn(async move { this.update(&name, &properties).await })
            .await
            .map_err(|e| RoutineError::Internal(format!("update task failed: {}", e)))?
    }
}

struct UpdateRun<'a> {
    orchestrator: &'a UpdateOrchestrator,
    name: &'a str,
    alter: &'a str,
    outcome: UpdateOutcome,
    degraded: bool,
}

impl UpdateRun<'_> {
    async fn step(&mut self, phase: UpdatePhase) -> UpdatePhase {
        let client = self.orchestrator.client.as_ref();
        match phase {
            UpdatePhase::Observing => {
                match resolve_job_detail(client, &self.orchestrator.database, self.name).await {
                    Ok(detail) => {
                        let state = normalize_state(&detail.state);
                        let next = if state == "PAUSED" {
                            self.outcome.paused = true;
                            UpdatePhase::Altering
                        } else {
                            UpdatePhase::Pausing
                        };
                        self.outcome.observed_state = Some(state);
                        next
                    }
                    Err(e) => {
                        warn!(job = %self.name, operation = "update.observe", error = %e, "Job state unresolved, altering without pause");
                        self.degraded = true;
                        UpdatePhase::Altering
                    }
                }
            }
            UpdatePhase::Pausing => {
                match client.execute(&control_statement(ControlAction::Pause, self.name)).await {
                    Ok(()) => self.outcome.paused = true,
                    Err(e) => {
                        warn!(job = %self.name, operation = "update.pause", error = %e, "Pause failed, altering anyway");
                        self.degraded = true;
                    }
                }
                UpdatePhase::Altering
            }
            UpdatePhase::Altering => match client.execute(self.alter).await {
                Ok(()) => {
                    self.outcome.ok = true;
                    if self.outcome.observed_state.as_deref() == Some("RUNNING") {
                        UpdatePhase::Resuming
                    } else {
                        self.finish()
                    }
                }
                Err(e) => {
                    warn!(job = %self.name, operation = "update.alter", error = %e, "Alter rejected");
                    self.outcome.error = Some(e.to_string());
                    UpdatePhase::Degraded
                }
            },
            UpdatePhase::Resuming => {
                match client.execute(&control_statement(ControlAction::Resume, self.name)).await {
                    Ok(()) => self.outcome.resumed = true,
                    Err(e) => {
                        warn!(job = %self.name, operation = "update.resume", error = %e, "Resume failed, job left paused");
                        self.degraded = true;
                    }
                }
                self.finish()
            }
            UpdatePhase::Done | UpdatePhase::Degraded => phase,
        }
    }

    fn finish(&self) -> UpdatePhase {
        if self.degraded {
            UpdatePhase::Degraded
        } else {
            UpdatePhase::Done
        }
    }
}
