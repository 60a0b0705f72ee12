//! Retraining jobs and their terminal records.
//!
//! A job is created when a trigger fires, waits in the pending queue, and
//! resolves to exactly one terminal record: completed or failed. A job is
//! never retried; a later trigger creates a new job.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use super::trigger::TriggerKind;

/// A queued retraining request for one model.
#[derive(Debug, Clone)]
pub struct RetrainingJob {
    pub job_id: Uuid,
    pub model_id: String,
    pub trigger: TriggerKind,
    pub priority: i32,
    pub created_at: DateTime<Utc>,
}

impl RetrainingJob {
    #[must_use]
    pub fn new(model_id: &str, trigger: TriggerKind, priority: i32) -> Self {
        Self {
            job_id: Uuid::new_v4(),
            model_id: model_id.to_string(),
            trigger,
            priority,
            created_at: Utc::now(),
        }
    }
}

/// Terminal outcome of one job execution.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum JobOutcome {
    Completed {
        samples_processed: usize,
        old_version: u32,
        new_version: u32,
        checkpoint: Option<PathBuf>,
    },
    Failed {
        error: String,
    },
}

/// One entry in the bounded completed- or failed-job history.
#[derive(Debug, Clone, Serialize)]
pub struct JobRecord {
    pub job_id: Uuid,
    pub model_id: String,
    pub trigger: &'static str,
    pub priority: i32,
    pub created_at: DateTime<Utc>,
    pub executed_at: DateTime<Utc>,
    pub duration_ms: u64,
    #[serde(flatten)]
    pub outcome: JobOutcome,
}

impl JobRecord {
    #[must_use]
    pub fn is_completed(&self) -> bool {
        matches!(self.outcome, JobOutcome::Completed { .. })
    }
}
