//! Collaborator seams: the trainable model, its training-data source, and
//! the performance tracker.
//!
//! The scheduler treats the model as an opaque trainable unit; nothing
//! here knows about features, exchanges, or the model's mathematical
//! internals.

use std::path::Path;

use crate::error::{DataSourceError, ModelError};

/// One batch of training data as delivered by a [`DataSource`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrainingBatch {
    pub features: Vec<Vec<f64>>,
    pub targets: Vec<f64>,
}

impl TrainingBatch {
    #[must_use]
    pub fn new(features: Vec<Vec<f64>>, targets: Vec<f64>) -> Self {
        Self { features, targets }
    }

    /// Number of usable rows (feature rows paired with targets).
    #[must_use]
    pub fn len(&self) -> usize {
        self.features.len().min(self.targets.len())
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Result of one `partial_fit` call.
#[derive(Debug, Clone)]
pub struct FitOutcome {
    pub success: bool,
    pub samples_processed: usize,
    pub message: String,
}

impl FitOutcome {
    #[must_use]
    pub fn ok(samples_processed: usize) -> Self {
        Self {
            success: true,
            samples_processed,
            message: String::new(),
        }
    }

    #[must_use]
    pub fn rejected(message: &str) -> Self {
        Self {
            success: false,
            samples_processed: 0,
            message: message.to_string(),
        }
    }
}

/// An incrementally trainable model registered with the scheduler.
pub trait TrainableModel: Send {
    /// Incorporate one batch of training data.
    fn partial_fit(&mut self, batch: &TrainingBatch) -> Result<FitOutcome, ModelError>;

    /// Cumulative samples the model has trained on.
    fn samples_seen(&self) -> u64;

    /// Monotonic model version; expected to advance on successful fits.
    fn version(&self) -> u32;

    /// Persist the trained state to `path`.
    ///
    /// The format is the model's own; the scheduler only chooses the
    /// path. Whatever is written here must load back through the model's
    /// own startup path.
    fn save(&self, path: &Path) -> Result<(), ModelError>;
}

/// Supplies fresh training data ahead of each retraining attempt.
pub trait DataSource: Send + Sync {
    fn fetch(&self) -> Result<TrainingBatch, DataSourceError>;
}

/// Answers whether recent performance has degraded beyond a threshold.
pub trait PerformanceTracker: Send + Sync {
    fn degradation_detected(&self, threshold: f64) -> bool;
}
