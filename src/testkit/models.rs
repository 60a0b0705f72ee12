//! Collaborator fakes for scheduler tests.

use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::{DataSourceError, ModelError};
use crate::scheduler::{
    DataSource, FitOutcome, PerformanceTracker, TrainableModel, TrainingBatch,
};

/// How a [`FakeModel`] responds to `partial_fit`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FitMode {
    Succeed,
    Reject,
    Error,
}

/// Trainable-model fake with shared counters.
///
/// Clones share the same counters, so keeping a clone outside the
/// scheduler acts as a probe into the registered instance.
#[derive(Clone)]
pub struct FakeModel {
    name: String,
    samples_seen: Arc<AtomicU64>,
    version: Arc<AtomicU32>,
    fit_calls: Arc<AtomicU64>,
    mode: FitMode,
    fit_log: Option<Arc<Mutex<Vec<String>>>>,
}

impl FakeModel {
    #[must_use]
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            samples_seen: Arc::new(AtomicU64::new(0)),
            version: Arc::new(AtomicU32::new(1)),
            fit_calls: Arc::new(AtomicU64::new(0)),
            mode: FitMode::Succeed,
            fit_log: None,
        }
    }

    /// Start with a pre-existing sample count.
    #[must_use]
    pub fn with_samples_seen(self, samples: u64) -> Self {
        self.samples_seen.store(samples, Ordering::SeqCst);
        self
    }

    /// `partial_fit` returns an unsuccessful [`FitOutcome`].
    #[must_use]
    pub fn rejecting(mut self) -> Self {
        self.mode = FitMode::Reject;
        self
    }

    /// `partial_fit` returns a [`ModelError`].
    #[must_use]
    pub fn erroring(mut self) -> Self {
        self.mode = FitMode::Error;
        self
    }

    /// Record each fit into a shared execution-order log under this
    /// model's name.
    #[must_use]
    pub fn with_fit_log(mut self, log: Arc<Mutex<Vec<String>>>) -> Self {
        self.fit_log = Some(log);
        self
    }

    /// Simulate the online stream advancing the model's sample count.
    pub fn add_samples(&self, count: u64) {
        self.samples_seen.fetch_add(count, Ordering::SeqCst);
    }

    #[must_use]
    pub fn fit_count(&self) -> u64 {
        self.fit_calls.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn current_version(&self) -> u32 {
        self.version.load(Ordering::SeqCst)
    }
}

impl TrainableModel for FakeModel {
    fn partial_fit(&mut self, batch: &TrainingBatch) -> Result<FitOutcome, ModelError> {
        self.fit_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(log) = &self.fit_log {
            log.lock().push(self.name.clone());
        }
        match self.mode {
            FitMode::Error => Err(ModelError::FitFailed("simulated failure".to_string())),
            FitMode::Reject => Ok(FitOutcome::rejected("simulated rejection")),
            FitMode::Succeed => {
                self.samples_seen
                    .fetch_add(batch.len() as u64, Ordering::SeqCst);
                self.version.fetch_add(1, Ordering::SeqCst);
                Ok(FitOutcome::ok(batch.len()))
            }
        }
    }

    fn samples_seen(&self) -> u64 {
        self.samples_seen.load(Ordering::SeqCst)
    }

    fn version(&self) -> u32 {
        self.version.load(Ordering::SeqCst)
    }

    fn save(&self, path: &Path) -> Result<(), ModelError> {
        std::fs::write(path, format!("{} v{}", self.name, self.version()))
            .map_err(|e| ModelError::SaveFailed(e.to_string()))
    }
}

/// Data source returning a fixed batch on every fetch.
#[derive(Debug, Clone)]
pub struct VecDataSource {
    batch: TrainingBatch,
}

impl VecDataSource {
    #[must_use]
    pub fn new(batch: TrainingBatch) -> Self {
        Self { batch }
    }

    /// A batch of `rows` single-feature rows.
    #[must_use]
    pub fn with_rows(rows: usize) -> Self {
        let features = (0..rows).map(|i| vec![i as f64]).collect();
        let targets = (0..rows).map(|i| (i % 2) as f64).collect();
        Self::new(TrainingBatch::new(features, targets))
    }
}

impl DataSource for VecDataSource {
    fn fetch(&self) -> Result<TrainingBatch, DataSourceError> {
        Ok(self.batch.clone())
    }
}

/// Data source that always fails.
#[derive(Debug, Clone, Default)]
pub struct FailingDataSource;

impl DataSource for FailingDataSource {
    fn fetch(&self) -> Result<TrainingBatch, DataSourceError> {
        Err(DataSourceError::Unavailable("simulated outage".to_string()))
    }
}

/// Performance tracker with an externally controlled verdict.
#[derive(Debug, Clone, Default)]
pub struct StaticTracker {
    degraded: Arc<AtomicBool>,
}

impl StaticTracker {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_degraded(&self, degraded: bool) {
        self.degraded.store(degraded, Ordering::SeqCst);
    }
}

impl PerformanceTracker for StaticTracker {
    fn degradation_detected(&self, _threshold: f64) -> bool {
        self.degraded.load(Ordering::SeqCst)
    }
}
