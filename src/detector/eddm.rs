//! EDDM (Early Drift Detection Method) over a binary error stream.
//!
//! Where DDM watches the raw error rate, EDDM watches the *distance*
//! between consecutive errors: it tracks the mean and standard deviation
//! of inter-error gaps and the historical maximum of `p' + 2 s'`. Errors
//! clustering more tightly than historically observed drive the ratio
//! `(p' + 2 s') / max` down; drift fires when it falls below the drift
//! threshold.

use chrono::{DateTime, Utc};

use crate::error::DetectorError;

use super::{DetectorInput, DetectorKind, DetectorStatus, DriftDetector, Sample, StatusDetail};

/// The ratio test is meaningless while the historical maximum is
/// effectively zero; below this level it is skipped.
const MAX_LEVEL_FLOOR: f64 = 1e-9;

/// EDDM detector over the model's 0/1 correctness signal.
#[derive(Debug, Clone)]
pub struct EddmDetector {
    /// Ratio below which the warning state is entered.
    warning_threshold: f64,
    /// Ratio below which drift fires.
    drift_threshold: f64,
    /// Minimum number of observed errors before the ratio is evaluated.
    min_errors: u64,
    n_samples: u64,
    n_errors: u64,
    last_error_at: u64,
    sum_distances: f64,
    sum_distances_sq: f64,
    max_level: f64,
    in_warning: bool,
    drift_detected: bool,
    last_drift_time: Option<DateTime<Utc>>,
}

impl Default for EddmDetector {
    fn default() -> Self {
        Self::new(0.95, 0.9, 30)
    }
}

impl EddmDetector {
    #[must_use]
    pub fn new(warning_threshold: f64, drift_threshold: f64, min_errors: u64) -> Self {
        Self {
            warning_threshold,
            drift_threshold,
            min_errors,
            n_samples: 0,
            n_errors: 0,
            last_error_at: 0,
            sum_distances: 0.0,
            sum_distances_sq: 0.0,
            max_level: 0.0,
            in_warning: false,
            drift_detected: false,
            last_drift_time: None,
        }
    }

    /// Mean distance between consecutive errors.
    #[must_use]
    pub fn mean_distance(&self) -> f64 {
        if self.n_errors > 1 {
            self.sum_distances / (self.n_errors - 1) as f64
        } else {
            0.0
        }
    }

    /// Whether the warning threshold was crossed on the latest update.
    #[must_use]
    pub fn in_warning(&self) -> bool {
        self.in_warning
    }

    fn current_level(&self) -> f64 {
        let gaps = (self.n_errors.saturating_sub(1)).max(1) as f64;
        let mean = self.sum_distances / gaps;
        let variance = (self.sum_distances_sq / gaps - mean * mean).max(0.0);
        mean + 2.0 * variance.sqrt()
    }

    fn clear_counters(&mut self) {
        self.n_samples = 0;
        self.n_errors = 0;
        self.last_error_at = 0;
        self.sum_distances = 0.0;
        self.sum_distances_sq = 0.0;
        self.max_level = 0.0;
        self.in_warning = false;
    }
}

impl DriftDetector for EddmDetector {
    fn kind(&self) -> DetectorKind {
        DetectorKind::Eddm
    }

    fn input(&self) -> DetectorInput {
        DetectorInput::Error
    }

    fn update(&mut self, sample: &Sample) -> Result<bool, DetectorError> {
        let value = sample.primary()?;

        self.n_samples += 1;
        if value <= 0.5 {
            return Ok(false);
        }

        if self.n_errors > 0 {
            let distance = (self.n_samples - self.last_error_at) as f64;
            self.sum_distances += distance;
            self.sum_distances_sq += distance * distance;
        }
        self.n_errors += 1;
        self.last_error_at = self.n_samples;

        if self.n_errors < self.min_errors {
            return Ok(false);
        }

        let level = self.current_level();
        if level > self.max_level {
            self.max_level = level;
        }
        if self.max_level < MAX_LEVEL_FLOOR {
            return Ok(false);
        }

        let ratio = level / self.max_level;
        if ratio < self.drift_threshold {
            self.clear_counters();
            self.drift_detected = true;
            self.last_drift_time = Some(Utc::now());
            return Ok(true);
        }

        self.in_warning = ratio < self.warning_threshold;
        Ok(false)
    }

    fn reset(&mut self) {
        self.clear_counters();
        self.drift_detected = false;
        self.last_drift_time = None;
    }

    fn drift_detected(&self) -> bool {
        self.drift_detected
    }

    fn last_drift_time(&self) -> Option<DateTime<Utc>> {
        self.last_drift_time
    }

    fn samples_seen(&self) -> u64 {
        self.n_samples
    }

    fn status(&self) -> DetectorStatus {
        DetectorStatus {
            kind: self.kind(),
            input: self.input(),
            samples_seen: self.n_samples,
            drift_detected: self.drift_detected,
            last_drift_time: self.last_drift_time,
            detail: StatusDetail::Eddm {
                mean_distance: self.mean_distance(),
                level: if self.n_errors > 1 {
                    self.current_level()
                } else {
                    0.0
                },
                max_level: self.max_level,
                in_warning: self.in_warning,
            },
        }
    }
}
