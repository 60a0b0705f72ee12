//! DDM (Drift Detection Method) over a binary error stream.
//!
//! Tracks the running error rate `p` and its standard error `s` since the
//! last reset, along with the historical minimum of `p + s`. Rising error
//! levels first cross a warning band and then the drift band; drift resets
//! all counters, a warning does not.

use chrono::{DateTime, Utc};

use crate::error::DetectorError;

use super::{DetectorInput, DetectorKind, DetectorStatus, DriftDetector, Sample, StatusDetail};

/// DDM detector over the model's 0/1 correctness signal.
#[derive(Debug, Clone)]
pub struct DdmDetector {
    /// Multiplier on `min_s` for the warning band.
    warning_level: f64,
    /// Multiplier on `min_s` for the drift band.
    drift_level: f64,
    /// Minimum samples before the bands are evaluated.
    min_samples: u64,
    n_samples: u64,
    sum_errors: f64,
    min_level: f64,
    min_p: f64,
    min_s: f64,
    in_warning: bool,
    drift_detected: bool,
    last_drift_time: Option<DateTime<Utc>>,
}

impl Default for DdmDetector {
    fn default() -> Self {
        Self::new(2.0, 3.0, 30)
    }
}

impl DdmDetector {
    #[must_use]
    pub fn new(warning_level: f64, drift_level: f64, min_samples: u64) -> Self {
        Self {
            warning_level,
            drift_level,
            min_samples,
            n_samples: 0,
            sum_errors: 0.0,
            min_level: f64::MAX,
            min_p: f64::MAX,
            min_s: f64::MAX,
            in_warning: false,
            drift_detected: false,
            last_drift_time: None,
        }
    }

    /// Current running error rate.
    #[must_use]
    pub fn error_rate(&self) -> f64 {
        if self.n_samples > 0 {
            self.sum_errors / self.n_samples as f64
        } else {
            0.0
        }
    }

    /// Whether the warning band was crossed on the latest update.
    #[must_use]
    pub fn in_warning(&self) -> bool {
        self.in_warning
    }

    /// Drift discards the accumulated error statistics; the new regime
    /// becomes the baseline.
    fn reset_counters(&mut self) {
        self.n_samples = 0;
        self.sum_errors = 0.0;
        self.min_level = f64::MAX;
        self.min_p = f64::MAX;
        self.min_s = f64::MAX;
        self.in_warning = false;
    }
}

impl DriftDetector for DdmDetector {
    fn kind(&self) -> DetectorKind {
        DetectorKind::Ddm
    }

    fn input(&self) -> DetectorInput {
        DetectorInput::Error
    }

    fn update(&mut self, sample: &Sample) -> Result<bool, DetectorError> {
        let error = sample.primary()?;

        self.n_samples += 1;
        self.sum_errors += error.clamp(0.0, 1.0);

        if self.n_samples < self.min_samples {
            return Ok(false);
        }

        let n = self.n_samples as f64;
        let p = self.sum_errors / n;
        let s = (p * (1.0 - p) / n).sqrt();
        let level = p + s;

        if level < self.min_level {
            self.min_level = level;
            self.min_p = p;
            self.min_s = s;
        }

        if level > self.min_p + self.drift_level * self.min_s {
            self.reset_counters();
            self.drift_detected = true;
            self.last_drift_time = Some(Utc::now());
            return Ok(true);
        }

        self.in_warning = level > self.min_p + self.warning_level * self.min_s;
        Ok(false)
    }

    fn reset(&mut self) {
        self.reset_counters();
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
        let n = self.n_samples.max(1) as f64;
        let p = self.sum_errors / n;
        let s = (p * (1.0 - p) / n).sqrt();
        DetectorStatus {
            kind: self.kind(),
            input: self.input(),
            samples_seen: self.n_samples,
            drift_detected: self.drift_detected,
            last_drift_time: self.last_drift_time,
            detail: StatusDetail::Ddm {
                error_rate: self.error_rate(),
                level: p + s,
                min_level: if self.min_level == f64::MAX {
                    0.0
                } else {
                    self.min_level
                },
                in_warning: self.in_warning,
            },
        }
    }
}
