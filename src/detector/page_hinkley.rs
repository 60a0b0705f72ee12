//! Page-Hinkley drift detector.
//!
//! Accumulates the deviation of each sample from the running mean
//! (`ph += x - mean - delta`) and tracks the running minimum of the
//! cumulative statistic. A sustained upward shift in the stream drives
//! `ph - min(ph)` past the threshold. Drift resets the cumulative
//! statistic and its minimum but keeps the running mean, so detection
//! re-arms against the same baseline.

use chrono::{DateTime, Utc};

use crate::error::DetectorError;

use super::{DetectorInput, DetectorKind, DetectorStatus, DriftDetector, Sample, StatusDetail};

/// Page-Hinkley detector over raw sample values.
#[derive(Debug, Clone)]
pub struct PageHinkleyDetector {
    /// Tolerance subtracted from each deviation; absorbs small noise.
    delta: f64,
    /// Detection threshold on `ph - min(ph)`.
    threshold: f64,
    /// Minimum samples before the threshold is evaluated.
    min_samples: u64,
    n_samples: u64,
    mean: f64,
    cumulative: f64,
    minimum: f64,
    drift_detected: bool,
    last_drift_time: Option<DateTime<Utc>>,
}

impl Default for PageHinkleyDetector {
    fn default() -> Self {
        Self::new(0.005, 50.0, 30)
    }
}

impl PageHinkleyDetector {
    #[must_use]
    pub fn new(delta: f64, threshold: f64, min_samples: u64) -> Self {
        Self {
            delta,
            threshold,
            min_samples,
            n_samples: 0,
            mean: 0.0,
            cumulative: 0.0,
            minimum: 0.0,
            drift_detected: false,
            last_drift_time: None,
        }
    }

    /// Running mean of all samples since the last full reset.
    #[must_use]
    pub fn mean(&self) -> f64 {
        self.mean
    }
}

impl DriftDetector for PageHinkleyDetector {
    fn kind(&self) -> DetectorKind {
        DetectorKind::PageHinkley
    }

    fn input(&self) -> DetectorInput {
        DetectorInput::Value
    }

    fn update(&mut self, sample: &Sample) -> Result<bool, DetectorError> {
        let value = sample.primary()?;

        self.n_samples += 1;
        self.mean += (value - self.mean) / self.n_samples as f64;
        self.cumulative += value - self.mean - self.delta;
        self.minimum = self.minimum.min(self.cumulative);

        if self.n_samples < self.min_samples {
            return Ok(false);
        }

        if self.cumulative - self.minimum > self.threshold {
            // Re-arm against the unchanged running mean.
            self.cumulative = 0.0;
            self.minimum = 0.0;
            self.drift_detected = true;
            self.last_drift_time = Some(Utc::now());
            return Ok(true);
        }
        Ok(false)
    }

    fn reset(&mut self) {
        self.n_samples = 0;
        self.mean = 0.0;
        self.cumulative = 0.0;
        self.minimum = 0.0;
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
            detail: StatusDetail::PageHinkley {
                mean: self.mean,
                cumulative: self.cumulative,
                minimum: self.minimum,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constant_stream_never_fires() {
        let mut ph = PageHinkleyDetector::new(0.005, 10.0, 10);
        for _ in 0..1000 {
            assert!(!ph.update(&Sample::Scalar(2.0)).unwrap());
        }
        assert!(!ph.drift_detected());
    }

    #[test]
    fn upward_shift_fires() {
        let mut ph = PageHinkleyDetector::new(0.005, 10.0, 10);
        for _ in 0..100 {
            ph.update(&Sample::Scalar(1.0)).unwrap();
        }
        let mut fired = false;
        for _ in 0..30 {
            fired |= ph.update(&Sample::Scalar(5.0)).unwrap();
        }
        assert!(fired);
        assert!(ph.drift_detected());
    }

    #[test]
    fn drift_keeps_running_mean() {
        let mut ph = PageHinkleyDetector::new(0.005, 10.0, 10);
        for _ in 0..100 {
            ph.update(&Sample::Scalar(1.0)).unwrap();
        }
        for _ in 0..30 {
            ph.update(&Sample::Scalar(5.0)).unwrap();
        }
        assert!(ph.drift_detected());
        // The mean survives the post-drift re-arm and keeps tracking.
        assert!(ph.mean() > 1.0);
        assert!(ph.samples_seen() > 100);
    }

    #[test]
    fn reset_is_idempotent() {
        let mut ph = PageHinkleyDetector::default();
        for _ in 0..100 {
            ph.update(&Sample::Scalar(3.0)).unwrap();
        }
        ph.reset();
        ph.reset();
        assert_eq!(ph.samples_seen(), 0);
        assert!(!ph.drift_detected());
        assert_eq!(ph.mean(), 0.0);
    }
}
