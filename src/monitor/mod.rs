//! Drift monitoring service.
//!
//! Wraps a [`DriftEnsemble`] with bounded sample/error/metrics buffers,
//! cold-start suppression, alert dispatch with cooldown, and a bounded
//! drift-event history. A background worker runs a periodic tick -
//! independent of sample ingestion - that prunes old events, checks for
//! the all-detectors-positive misconfiguration signal, and fits a linear
//! trend over recent performance metrics.
//!
//! # Architecture
//!
//! ```text
//! update_sample --> ring buffers --> DriftEnsemble --> DriftEvent
//!                                         |               |
//!                                         v               v
//!                                   alert cooldown   event history
//!                                         |          (time-pruned)
//!                                         v
//!                                   alert callbacks
//! ```
//!
//! All mutable state is serialized through one mutex per monitor
//! instance; alerts are dispatched after the lock is released so
//! callbacks may call back into the monitor's accessors.

mod event;

pub use event::{Alert, AlertKind, AlertSeverity, DriftEvent, PerformanceSnapshot};

use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use serde_json::json;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::MonitorConfig;
use crate::detector::Sample;
use crate::ensemble::{DriftEnsemble, EnsembleStatus};
use crate::persist;

/// Hard cap on retained drift events alongside the time-based pruning.
const EVENT_CAPACITY: usize = 10_000;

/// Bounded count of retained alerts.
const ALERT_CAPACITY: usize = 100;

/// How long `stop` waits for the worker before abandoning it.
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

type AlertCallback = Box<dyn Fn(&Alert) + Send + Sync>;

/// Current health view of a monitor, for dashboards and the scheduler.
#[derive(Debug, Clone, Serialize)]
pub struct MonitoringStatus {
    pub monitoring_active: bool,
    pub samples_buffered: usize,
    pub errors_buffered: usize,
    pub metrics_buffered: usize,
    pub samples_ingested: u64,
    pub events_retained: usize,
    pub events_total: u64,
    pub alerts_suppressed: u64,
    pub ensemble: EnsembleStatus,
}

/// Aggregated view of drift activity over a trailing window.
#[derive(Debug, Clone, Serialize)]
pub struct DriftSummary {
    pub window_hours: u64,
    pub event_count: usize,
    pub events_per_hour: f64,
    pub vote_counts: BTreeMap<String, u64>,
    pub last_detection_time: Option<DateTime<Utc>>,
    pub last_event: Option<DriftEvent>,
}

struct MonitorState {
    ensemble: DriftEnsemble,
    samples: VecDeque<Sample>,
    errors: VecDeque<f64>,
    metrics: VecDeque<PerformanceSnapshot>,
    events: VecDeque<DriftEvent>,
    alerts: VecDeque<Alert>,
    last_alert_at: Option<Instant>,
    last_systemic_alert_at: Option<Instant>,
    last_trend_alert_at: Option<Instant>,
    samples_ingested: u64,
    events_total: u64,
    alerts_suppressed: u64,
}

impl MonitorState {
    fn new(ensemble: DriftEnsemble, capacity: usize) -> Self {
        Self {
            ensemble,
            samples: VecDeque::with_capacity(capacity),
            errors: VecDeque::with_capacity(capacity),
            metrics: VecDeque::with_capacity(capacity),
            events: VecDeque::new(),
            alerts: VecDeque::with_capacity(ALERT_CAPACITY),
            last_alert_at: None,
            last_systemic_alert_at: None,
            last_trend_alert_at: None,
            samples_ingested: 0,
            events_total: 0,
            alerts_suppressed: 0,
        }
    }

    fn record_alert(&mut self, alert: Alert) {
        self.alerts.push_back(alert);
        while self.alerts.len() > ALERT_CAPACITY {
            self.alerts.pop_front();
        }
    }
}

struct WorkerHandle {
    shutdown_tx: mpsc::Sender<()>,
    handle: JoinHandle<()>,
}

/// Buffered drift monitoring around one detector ensemble.
pub struct DriftMonitor {
    config: MonitorConfig,
    state: Arc<Mutex<MonitorState>>,
    callbacks: Arc<RwLock<Vec<AlertCallback>>>,
    worker: Mutex<Option<WorkerHandle>>,
}

impl DriftMonitor {
    #[must_use]
    pub fn new(config: MonitorConfig, ensemble: DriftEnsemble) -> Self {
        let capacity = config.buffer_capacity;
        Self {
            config,
            state: Arc::new(Mutex::new(MonitorState::new(ensemble, capacity))),
            callbacks: Arc::new(RwLock::new(Vec::new())),
            worker: Mutex::new(None),
        }
    }

    /// Register a callback invoked for every dispatched alert.
    pub fn add_alert_callback<F>(&self, callback: F)
    where
        F: Fn(&Alert) + Send + Sync + 'static,
    {
        self.callbacks.write().push(Box::new(callback));
    }

    /// Ingest one observation from the trading loop.
    ///
    /// Appends to the bounded buffers, and - once at least
    /// `min_samples_for_detection` samples are buffered - forwards to the
    /// ensemble. A positive decision records a [`DriftEvent`], appends a
    /// JSON line to the event log when configured, and dispatches an
    /// [`Alert`] unless within the alert cooldown (suppressed alerts
    /// still record the event).
    pub fn update_sample(
        &self,
        sample: Sample,
        error: Option<f64>,
        metrics: Option<PerformanceSnapshot>,
    ) {
        let capacity = self.config.buffer_capacity;
        let mut dispatch: Option<Alert> = None;

        {
            let mut state = self.state.lock();
            state.samples_ingested += 1;

            state.samples.push_back(sample.clone());
            while state.samples.len() > capacity {
                state.samples.pop_front();
            }
            if let Some(error) = error {
                state.errors.push_back(error);
                while state.errors.len() > capacity {
                    state.errors.pop_front();
                }
            }
            if let Some(metrics) = metrics {
                state.metrics.push_back(metrics);
                while state.metrics.len() > capacity {
                    state.metrics.pop_front();
                }
            }

            // Cold start: stay silent until the buffer has enough history
            // to make detector verdicts meaningful.
            if state.samples.len() < self.config.min_samples_for_detection {
                return;
            }

            let decision = state.ensemble.update(&sample, error);
            if !decision.drift_detected {
                return;
            }

            let event = DriftEvent {
                timestamp: decision.timestamp,
                verdicts: decision.verdicts,
                voting: state.ensemble.policy().as_str().to_string(),
                votes: decision.votes,
                responders: decision.responders,
                metrics: state.metrics.back().cloned(),
            };

            if let Some(path) = &self.config.event_log_path {
                if let Err(e) = persist::append_event(path, &event) {
                    warn!(error = %e, path = %path.display(), "Failed to append drift event log");
                }
            }

            state.events.push_back(event.clone());
            while state.events.len() > EVENT_CAPACITY {
                state.events.pop_front();
            }
            state.events_total += 1;

            let in_cooldown = state
                .last_alert_at
                .is_some_and(|at| at.elapsed() < self.config.alert_cooldown());
            if in_cooldown {
                state.alerts_suppressed += 1;
                debug!(votes = event.votes, "Drift alert suppressed by cooldown");
            } else {
                let alert = Alert::new(
                    AlertKind::DriftDetected,
                    AlertSeverity::Warning,
                    format!(
                        "drift detected by {} of {} detectors ({})",
                        event.votes, event.responders, event.voting
                    ),
                    json!({ "verdicts": event.verdicts, "votes": event.votes }),
                );
                state.last_alert_at = Some(Instant::now());
                state.record_alert(alert.clone());
                dispatch = Some(alert);
            }

            if self.config.auto_reset_after_drift {
                state.ensemble.reset();
            }
        }

        if let Some(alert) = dispatch {
            self.dispatch(&alert);
        }
    }

    /// One periodic maintenance pass; called by the background worker and
    /// available for manual driving.
    ///
    /// Prunes events past the retention window, raises the systemic
    /// all-detectors-positive warning, and checks the performance trend.
    pub fn tick(&self) {
        let alerts = Self::run_tick(&self.config, &self.state);
        for alert in alerts {
            self.dispatch(&alert);
        }
    }

    fn run_tick(config: &MonitorConfig, state: &Mutex<MonitorState>) -> Vec<Alert> {
        let mut dispatch = Vec::new();
        let mut state = state.lock();

        // Retention pruning.
        let cutoff = Utc::now() - config.history_retention();
        while state
            .events
            .front()
            .is_some_and(|event| event.timestamp < cutoff)
        {
            state.events.pop_front();
        }

        // Every detector positive at once usually means the thresholds
        // are wrong, not that the world changed five ways at once.
        if state.ensemble.detector_count() > 1 && state.ensemble.all_positive() {
            let quiet = state
                .last_systemic_alert_at
                .map_or(true, |at| at.elapsed() >= config.alert_cooldown());
            if quiet {
                warn!("All drift detectors positive simultaneously");
                let alert = Alert::new(
                    AlertKind::SystemicDrift,
                    AlertSeverity::Critical,
                    "all drift detectors positive simultaneously".to_string(),
                    json!({ "detectors": state.ensemble.detector_count() }),
                );
                state.last_systemic_alert_at = Some(Instant::now());
                state.record_alert(alert.clone());
                dispatch.push(alert);
            }
        }

        // Declining performance trend over the recent snapshots.
        if state.metrics.len() >= config.trend_window {
            let recent: Vec<f64> = state
                .metrics
                .iter()
                .skip(state.metrics.len() - config.trend_window)
                .map(|snapshot| snapshot.primary)
                .collect();
            let slope = linear_slope(&recent);
            if slope < -config.trend_slope_alert {
                let quiet = state
                    .last_trend_alert_at
                    .map_or(true, |at| at.elapsed() >= config.alert_cooldown());
                if quiet {
                    warn!(slope, "Declining performance trend");
                    let alert = Alert::new(
                        AlertKind::DecliningTrend,
                        AlertSeverity::Warning,
                        format!("performance declining at {slope:.4} per snapshot"),
                        json!({ "slope": slope, "window": config.trend_window }),
                    );
                    state.last_trend_alert_at = Some(Instant::now());
                    state.record_alert(alert.clone());
                    dispatch.push(alert);
                }
            }
        }

        dispatch
    }

    fn dispatch(&self, alert: &Alert) {
        for callback in self.callbacks.read().iter() {
            callback(alert);
        }
    }

    /// Spawn the background worker. Idempotent; a second call warns.
    pub fn start(&self) {
        let mut worker = self.worker.lock();
        if worker.is_some() {
            warn!("Drift monitor already started");
            return;
        }

        let (shutdown_tx, mut shutdown_rx) = mpsc::channel::<()>(1);
        let config = self.config.clone();
        let state = Arc::clone(&self.state);
        let callbacks = Arc::clone(&self.callbacks);
        let interval = config.check_interval();

        let handle = tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = shutdown_rx.recv() => {
                        info!("Drift monitor worker shutting down");
                        break;
                    }
                    _ = tokio::time::sleep(interval) => {
                        let alerts = Self::run_tick(&config, &state);
                        for alert in &alerts {
                            for callback in callbacks.read().iter() {
                                callback(alert);
                            }
                        }
                    }
                }
            }
        });

        *worker = Some(WorkerHandle {
            shutdown_tx,
            handle,
        });
        info!(interval_secs = self.config.check_interval_secs, "Drift monitor started");
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
            Ok(_) => info!("Drift monitor stopped"),
            Err(_) => warn!("Drift monitor worker did not stop in time, abandoning"),
        }
    }

    /// Whether the background worker is running.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.worker.lock().is_some()
    }

    /// Whether a drift event was recorded within the trailing window.
    ///
    /// This is the accessor the scheduler's drift trigger polls.
    #[must_use]
    pub fn has_recent_drift(&self, window: Duration) -> bool {
        let cutoff = Utc::now() - chrono::Duration::from_std(window).unwrap_or_default();
        let state = self.state.lock();
        // Events are appended in time order, so the newest decides.
        state
            .events
            .back()
            .is_some_and(|event| event.timestamp >= cutoff)
    }

    /// Reset the wrapped ensemble and the drift flag state.
    pub fn reset_ensemble(&self) {
        self.state.lock().ensemble.reset();
    }

    /// Well-formed status snapshot; never fails, even with no data yet.
    #[must_use]
    pub fn get_monitoring_status(&self) -> MonitoringStatus {
        let state = self.state.lock();
        MonitoringStatus {
            monitoring_active: self.is_active(),
            samples_buffered: state.samples.len(),
            errors_buffered: state.errors.len(),
            metrics_buffered: state.metrics.len(),
            samples_ingested: state.samples_ingested,
            events_retained: state.events.len(),
            events_total: state.events_total,
            alerts_suppressed: state.alerts_suppressed,
            ensemble: state.ensemble.status(),
        }
    }

    /// Aggregate drift activity over the trailing `hours`.
    #[must_use]
    pub fn get_drift_summary(&self, hours: u64) -> DriftSummary {
        let cutoff = Utc::now() - chrono::Duration::hours(hours as i64);
        let state = self.state.lock();
        let recent: Vec<&DriftEvent> = state
            .events
            .iter()
            .filter(|event| event.timestamp >= cutoff)
            .collect();
        let status = state.ensemble.status();

        DriftSummary {
            window_hours: hours,
            event_count: recent.len(),
            events_per_hour: if hours > 0 {
                recent.len() as f64 / hours as f64
            } else {
                0.0
            },
            vote_counts: status.vote_counts,
            last_detection_time: status.last_detection_time,
            last_event: recent.last().map(|event| (*event).clone()),
        }
    }

    /// The most recent alerts, oldest first.
    #[must_use]
    pub fn recent_alerts(&self) -> Vec<Alert> {
        self.state.lock().alerts.iter().cloned().collect()
    }

    /// Export the drift summary as pretty JSON for external dashboards.
    pub fn export_summary<P: AsRef<std::path::Path>>(
        &self,
        path: P,
        hours: u64,
    ) -> crate::error::Result<()> {
        persist::write_json(path, &self.get_drift_summary(hours))
    }
}

/// Least-squares slope of `values` against their indices.
fn linear_slope(values: &[f64]) -> f64 {
    let n = values.len() as f64;
    if values.len() < 2 {
        return 0.0;
    }
    let mean_x = (n - 1.0) / 2.0;
    let mean_y = values.iter().sum::<f64>() / n;

    let mut numerator = 0.0;
    let mut denominator = 0.0;
    for (i, &y) in values.iter().enumerate() {
        let dx = i as f64 - mean_x;
        numerator += dx * (y - mean_y);
        denominator += dx * dx;
    }
    if denominator > 0.0 {
        numerator / denominator
    } else {
        0.0
    }
}
