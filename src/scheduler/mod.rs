//! Trigger-driven retraining scheduler.
//!
//! Registers trainable models, each with a data-source callback and a set
//! of retraining triggers, and runs a background tick that evaluates
//! triggers and executes the resulting jobs in priority order. A
//! per-model cooldown spaces retrains regardless of which trigger fired;
//! only an explicit [`manual_retrain`] bypasses it.
//!
//! Within one tick, trigger evaluation for every (model, trigger) pair
//! completes before any job executes; jobs then run strictly by
//! descending priority with FIFO tie-breaks. A failing job lands in the
//! failed history and the tick moves on - nothing here stops the host
//! trading loop.
//!
//! [`manual_retrain`]: RetrainingScheduler::manual_retrain

mod job;
mod model;
mod trigger;

pub use job::{JobOutcome, JobRecord, RetrainingJob};
pub use model::{DataSource, FitOutcome, PerformanceTracker, TrainableModel, TrainingBatch};
pub use trigger::{RetrainingTrigger, Schedule, TriggerKind};

use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::SchedulerConfig;
use crate::error::{ConfigError, JobError, Result};
use crate::monitor::DriftMonitor;
use crate::persist;

/// How long `stop` waits for the worker before abandoning it.
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(10);

/// Default trigger set for models registered without any.
fn default_triggers() -> Vec<RetrainingTrigger> {
    vec![RetrainingTrigger::new(
        TriggerKind::SampleCount { interval: 1000 },
        1,
    )]
}

/// A trigger plus its evaluation bookkeeping.
struct TriggerState {
    trigger: RetrainingTrigger,
    /// Last fire of a `ScheduledTime` trigger.
    last_fired: Option<DateTime<Utc>>,
    /// `samples_seen` at the last `SampleCount` fire (or registration).
    sample_mark: u64,
}

struct RegisteredModel {
    model: Arc<Mutex<dyn TrainableModel>>,
    data_source: Arc<dyn DataSource>,
    triggers: Vec<TriggerState>,
    registered_at: DateTime<Utc>,
    last_retrain_time: Option<DateTime<Utc>>,
    last_retrain_instant: Option<Instant>,
    retrain_count: u64,
}

impl RegisteredModel {
    fn in_cooldown(&self, cooldown: Duration) -> bool {
        self.last_retrain_instant
            .is_some_and(|at| at.elapsed() < cooldown)
    }
}

struct SchedulerState {
    models: BTreeMap<String, RegisteredModel>,
    pending: Vec<RetrainingJob>,
    completed: VecDeque<JobRecord>,
    failed: VecDeque<JobRecord>,
    jobs_enqueued_total: u64,
    jobs_dropped: u64,
}

impl SchedulerState {
    fn new() -> Self {
        Self {
            models: BTreeMap::new(),
            pending: Vec::new(),
            completed: VecDeque::new(),
            failed: VecDeque::new(),
            jobs_enqueued_total: 0,
            jobs_dropped: 0,
        }
    }
}

struct WorkerHandle {
    shutdown_tx: mpsc::Sender<()>,
    handle: JoinHandle<()>,
}

/// Per-model view inside a [`SchedulerStatus`].
#[derive(Debug, Clone, Serialize)]
pub struct ModelStatus {
    pub last_retrain_time: Option<DateTime<Utc>>,
    pub retrain_count: u64,
    pub samples_seen: u64,
    pub in_cooldown: bool,
    pub triggers: Vec<TriggerSummary>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TriggerSummary {
    pub kind: &'static str,
    pub enabled: bool,
    pub priority: i32,
}

/// Current view of the scheduler, for dashboards.
#[derive(Debug, Clone, Serialize)]
pub struct SchedulerStatus {
    pub scheduler_active: bool,
    pub models: BTreeMap<String, ModelStatus>,
    pub pending_jobs: usize,
    pub completed_jobs: usize,
    pub failed_jobs: usize,
    pub jobs_enqueued_total: u64,
    pub jobs_dropped: u64,
}

/// Completed and failed job records over a trailing window.
#[derive(Debug, Clone, Serialize)]
pub struct RetrainingHistory {
    pub window_hours: u64,
    pub completed: Vec<JobRecord>,
    pub failed: Vec<JobRecord>,
}

/// Coordinates retraining for all registered models. One scheduler per
/// process; a given `model_id` is registered at most once.
pub struct RetrainingScheduler {
    config: SchedulerConfig,
    state: Arc<Mutex<SchedulerState>>,
    monitor: Option<Arc<DriftMonitor>>,
    tracker: Option<Arc<dyn PerformanceTracker>>,
    worker: Mutex<Option<WorkerHandle>>,
}

impl RetrainingScheduler {
    #[must_use]
    pub fn new(config: SchedulerConfig) -> Self {
        Self {
            config,
            state: Arc::new(Mutex::new(SchedulerState::new())),
            monitor: None,
            tracker: None,
            worker: Mutex::new(None),
        }
    }

    /// Inject the drift monitor consulted by `DriftDetection` triggers.
    #[must_use]
    pub fn with_monitor(mut self, monitor: Arc<DriftMonitor>) -> Self {
        self.monitor = Some(monitor);
        self
    }

    /// Inject the tracker consulted by `PerformanceDegradation` triggers.
    #[must_use]
    pub fn with_tracker(mut self, tracker: Arc<dyn PerformanceTracker>) -> Self {
        self.tracker = Some(tracker);
        self
    }

    /// Register a model with its data source and triggers.
    ///
    /// An empty trigger list gets the default `SampleCount(1000)`
    /// trigger. Registering the same `model_id` twice is a configuration
    /// error.
    pub fn register_model<M>(
        &self,
        model_id: &str,
        model: M,
        data_source: Arc<dyn DataSource>,
        triggers: Vec<RetrainingTrigger>,
    ) -> Result<()>
    where
        M: TrainableModel + 'static,
    {
        let mut state = self.state.lock();
        if state.models.contains_key(model_id) {
            return Err(ConfigError::DuplicateModel(model_id.to_string()).into());
        }

        let model: Arc<Mutex<dyn TrainableModel>> = Arc::new(Mutex::new(model));
        let samples_seen = model.lock().samples_seen();
        let triggers = if triggers.is_empty() {
            default_triggers()
        } else {
            triggers
        };
        let triggers = triggers
            .into_iter()
            .map(|trigger| TriggerState {
                trigger,
                last_fired: None,
                sample_mark: samples_seen,
            })
            .collect();

        info!(model_id, samples_seen, "Model registered for retraining");
        state.models.insert(
            model_id.to_string(),
            RegisteredModel {
                model,
                data_source,
                triggers,
                registered_at: Utc::now(),
                last_retrain_time: None,
                last_retrain_instant: None,
                retrain_count: 0,
            },
        );
        Ok(())
    }

    /// Remove a model and its triggers. Pending jobs for it will fail
    /// at execution time. Returns whether it existed.
    pub fn remove_model(&self, model_id: &str) -> bool {
        self.state.lock().models.remove(model_id).is_some()
    }

    /// Append a trigger to a registered model.
    pub fn add_trigger(&self, model_id: &str, trigger: RetrainingTrigger) -> Result<()> {
        let mut state = self.state.lock();
        let reg = state
            .models
            .get_mut(model_id)
            .ok_or_else(|| ConfigError::UnknownModel(model_id.to_string()))?;
        let sample_mark = reg.model.lock().samples_seen();
        reg.triggers.push(TriggerState {
            trigger,
            last_fired: None,
            sample_mark,
        });
        Ok(())
    }

    /// Remove every trigger of the given kind label from a model.
    /// Returns how many were removed.
    pub fn remove_trigger(&self, model_id: &str, kind_label: &str) -> Result<usize> {
        let mut state = self.state.lock();
        let reg = state
            .models
            .get_mut(model_id)
            .ok_or_else(|| ConfigError::UnknownModel(model_id.to_string()))?;
        let before = reg.triggers.len();
        reg.triggers
            .retain(|state| state.trigger.kind.label() != kind_label);
        Ok(before - reg.triggers.len())
    }

    /// One scheduler pass: scan triggers for every model, then execute
    /// the pending queue in priority order. Called by the background
    /// worker and available for manual driving.
    pub fn tick(&self) {
        Self::run_tick(
            &self.config,
            &self.state,
            self.monitor.as_deref(),
            self.tracker.as_deref(),
        );
    }

    fn run_tick(
        config: &SchedulerConfig,
        state: &Mutex<SchedulerState>,
        monitor: Option<&DriftMonitor>,
        tracker: Option<&dyn PerformanceTracker>,
    ) {
        let mut guard = state.lock();
        let state = &mut *guard;
        let now = Utc::now();

        // Phase 1: trigger scan. All (model, trigger) pairs are evaluated
        // before any job runs.
        for (model_id, reg) in &mut state.models {
            if reg.in_cooldown(config.cooldown()) {
                continue;
            }

            let samples_seen = reg.model.lock().samples_seen();
            let mut best: Option<(i32, usize)> = None;

            for (idx, ts) in reg.triggers.iter().enumerate() {
                if !ts.trigger.enabled {
                    continue;
                }
                let satisfied = match &ts.trigger.kind {
                    TriggerKind::PerformanceDegradation { threshold } => tracker
                        .map_or(false, |tracker| tracker.degradation_detected(*threshold)),
                    TriggerKind::DriftDetection { window } => {
                        monitor.map_or(false, |monitor| monitor.has_recent_drift(*window))
                    }
                    TriggerKind::ScheduledTime { schedule } => {
                        let last = ts.last_fired.unwrap_or(reg.registered_at);
                        schedule.is_due(last, now)
                    }
                    TriggerKind::SampleCount { interval } => {
                        samples_seen.saturating_sub(ts.sample_mark) >= *interval
                    }
                    TriggerKind::Manual => false,
                };
                if satisfied && best.map_or(true, |(p, _)| ts.trigger.priority > p) {
                    best = Some((ts.trigger.priority, idx));
                }
            }

            let Some((priority, idx)) = best else {
                continue;
            };

            if state.pending.len() >= config.max_pending_jobs {
                warn!(model_id = %model_id, "Pending job queue full, dropping trigger");
                state.jobs_dropped += 1;
                continue;
            }

            let ts = &mut reg.triggers[idx];
            // Marks advance only when the job is actually enqueued.
            match &ts.trigger.kind {
                TriggerKind::SampleCount { .. } => ts.sample_mark = samples_seen,
                TriggerKind::ScheduledTime { .. } => ts.last_fired = Some(now),
                _ => {}
            }

            let job = RetrainingJob::new(model_id, ts.trigger.kind.clone(), priority);
            debug!(
                model_id = %model_id,
                job_id = %job.job_id,
                trigger = job.trigger.label(),
                priority,
                "Retraining job enqueued"
            );
            state.pending.push(job);
            state.jobs_enqueued_total += 1;
        }

        // Phase 2: execution, by descending priority; a stable sort keeps
        // enqueue order within equal priorities.
        let mut batch = std::mem::take(&mut state.pending);
        batch.sort_by_key(|job| std::cmp::Reverse(job.priority));

        for job in batch {
            let record = match state.models.get_mut(&job.model_id) {
                Some(reg) => Self::run_job(config, reg, &job),
                None => {
                    warn!(model_id = %job.model_id, "Job for unregistered model");
                    Self::failed_record(&job, "model no longer registered")
                }
            };
            Self::push_history(state, config, record);
        }
    }

    /// Execute one job and produce its terminal record. Failures are
    /// absorbed into the record; they never propagate.
    fn run_job(
        config: &SchedulerConfig,
        reg: &mut RegisteredModel,
        job: &RetrainingJob,
    ) -> JobRecord {
        let started = Instant::now();
        let executed_at = Utc::now();

        let outcome = match Self::execute(config, reg, job) {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!(model_id = %job.model_id, job_id = %job.job_id, error = %e, "Retraining job failed");
                JobOutcome::Failed {
                    error: e.to_string(),
                }
            }
        };

        JobRecord {
            job_id: job.job_id,
            model_id: job.model_id.clone(),
            trigger: job.trigger.label(),
            priority: job.priority,
            created_at: job.created_at,
            executed_at,
            duration_ms: started.elapsed().as_millis() as u64,
            outcome,
        }
    }

    fn execute(
        config: &SchedulerConfig,
        reg: &mut RegisteredModel,
        job: &RetrainingJob,
    ) -> std::result::Result<JobOutcome, JobError> {
        let batch = reg.data_source.fetch()?;
        if batch.len() < config.min_samples_for_retrain {
            return Err(JobError::InsufficientData {
                got: batch.len(),
                min: config.min_samples_for_retrain,
            });
        }

        let (old_version, fit) = {
            let mut model = reg.model.lock();
            let old_version = model.version();
            let fit = model.partial_fit(&batch)?;
            (old_version, fit)
        };
        if !fit.success {
            return Err(JobError::FitRejected(fit.message));
        }

        reg.last_retrain_time = Some(Utc::now());
        reg.last_retrain_instant = Some(Instant::now());
        reg.retrain_count += 1;

        let new_version = reg.model.lock().version();
        let checkpoint = config.checkpoint_dir.as_ref().and_then(|dir| {
            let path = persist::checkpoint_path(dir, &job.model_id, new_version, Utc::now());
            if let Some(parent) = path.parent() {
                if let Err(e) = std::fs::create_dir_all(parent) {
                    warn!(error = %e, "Failed to create checkpoint directory");
                    return None;
                }
            }
            match reg.model.lock().save(&path) {
                Ok(()) => Some(path),
                Err(e) => {
                    // A missing checkpoint does not fail an otherwise
                    // successful retrain.
                    warn!(error = %e, "Failed to write model checkpoint");
                    None
                }
            }
        });

        info!(
            model_id = %job.model_id,
            trigger = job.trigger.label(),
            samples = fit.samples_processed,
            old_version,
            new_version,
            "Model retrained"
        );
        Ok(JobOutcome::Completed {
            samples_processed: fit.samples_processed,
            old_version,
            new_version,
            checkpoint,
        })
    }

    fn failed_record(job: &RetrainingJob, error: &str) -> JobRecord {
        JobRecord {
            job_id: job.job_id,
            model_id: job.model_id.clone(),
            trigger: job.trigger.label(),
            priority: job.priority,
            created_at: job.created_at,
            executed_at: Utc::now(),
            duration_ms: 0,
            outcome: JobOutcome::Failed {
                error: error.to_string(),
            },
        }
    }

    fn push_history(state: &mut SchedulerState, config: &SchedulerConfig, record: JobRecord) {
        let history = if record.is_completed() {
            &mut state.completed
        } else {
            &mut state.failed
        };
        history.push_back(record);
        while history.len() > config.history_capacity {
            history.pop_front();
        }
    }

    /// Retrain one model immediately, outside the queue and without a
    /// cooldown check. Returns whether the retrain succeeded; the record
    /// lands in the usual histories either way.
    pub fn manual_retrain(&self, model_id: &str) -> Result<bool> {
        let mut guard = self.state.lock();
        let state = &mut *guard;
        let reg = state
            .models
            .get_mut(model_id)
            .ok_or_else(|| ConfigError::UnknownModel(model_id.to_string()))?;

        let job = RetrainingJob::new(model_id, TriggerKind::Manual, i32::MAX);
        info!(model_id, job_id = %job.job_id, "Manual retrain requested");

        let record = Self::run_job(&self.config, reg, &job);
        let completed = record.is_completed();
        Self::push_history(state, &self.config, record);
        Ok(completed)
    }

    /// Spawn the background worker. Idempotent; a second call warns.
    pub fn start(&self) {
        let mut worker = self.worker.lock();
        if worker.is_some() {
            warn!("Retraining scheduler already started");
            return;
        }

        let (shutdown_tx, mut shutdown_rx) = mpsc::channel::<()>(1);
        let config = self.config.clone();
        let state = Arc::clone(&self.state);
        let monitor = self.monitor.clone();
        let tracker = self.tracker.clone();
        let interval = config.check_interval();

        let handle = tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = shutdown_rx.recv() => {
                        info!("Retraining scheduler worker shutting down");
                        break;
                    }
                    _ = tokio::time::sleep(interval) => {
                        Self::run_tick(
                            &config,
                            &state,
                            monitor.as_deref(),
                            tracker.as_deref(),
                        );
                    }
                }
            }
        });

        *worker = Some(WorkerHandle {
            shutdown_tx,
            handle,
        });
        info!(
            interval_secs = self.config.check_interval_secs,
            "Retraining scheduler started"
        );
    }

    /// Signal the worker to exit at its next wait boundary and join with
    /// a bounded timeout. A worker that does not exit in time is
    /// abandoned, not killed.
    pub async fn stop(&self) {
        let Some(WorkerHandle { shutdown_tx, handle }) = self.worker.lock().take() else {
            return;
        };
        let _ = shutdown_tx.send(()).await;
        match tokio::time::timeout(SHUTDOWN_TIMEOUT, handle).await {
            Ok(_) => info!("Retraining scheduler stopped"),
            Err(_) => warn!("Retraining scheduler worker did not stop in time, abandoning"),
        }
    }

    /// Whether the background worker is running.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.worker.lock().is_some()
    }

    /// Well-formed status snapshot; never fails, even with no models.
    #[must_use]
    pub fn get_scheduler_status(&self) -> SchedulerStatus {
        let state = self.state.lock();
        let models = state
            .models
            .iter()
            .map(|(model_id, reg)| {
                (
                    model_id.clone(),
                    ModelStatus {
                        last_retrain_time: reg.last_retrain_time,
                        retrain_count: reg.retrain_count,
                        samples_seen: reg.model.lock().samples_seen(),
                        in_cooldown: reg.in_cooldown(self.config.cooldown()),
                        triggers: reg
                            .triggers
                            .iter()
                            .map(|ts| TriggerSummary {
                                kind: ts.trigger.kind.label(),
                                enabled: ts.trigger.enabled,
                                priority: ts.trigger.priority,
                            })
                            .collect(),
                    },
                )
            })
            .collect();

        SchedulerStatus {
            scheduler_active: self.is_active(),
            models,
            pending_jobs: state.pending.len(),
            completed_jobs: state.completed.len(),
            failed_jobs: state.failed.len(),
            jobs_enqueued_total: state.jobs_enqueued_total,
            jobs_dropped: state.jobs_dropped,
        }
    }

    /// Job records over the trailing `hours`, optionally filtered to one
    /// model.
    #[must_use]
    pub fn get_retraining_history(
        &self,
        model_id: Option<&str>,
        hours: u64,
    ) -> RetrainingHistory {
        let cutoff = Utc::now() - chrono::Duration::hours(hours as i64);
        let matches = |record: &&JobRecord| {
            record.executed_at >= cutoff
                && model_id.map_or(true, |model_id| record.model_id == model_id)
        };
        let state = self.state.lock();
        RetrainingHistory {
            window_hours: hours,
            completed: state.completed.iter().filter(matches).cloned().collect(),
            failed: state.failed.iter().filter(matches).cloned().collect(),
        }
    }
}
