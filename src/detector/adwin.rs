//! ADWIN (ADaptive WINdowing) drift detector.
//!
//! Maintains a compressed window of recent samples as a bounded list of
//! `{sum, count}` buckets and flags drift when any split of the window
//! yields two sub-windows whose means differ by more than a Hoeffding
//! bound. On drift the window shrinks to the newest bucket, so the most
//! recent data becomes the new baseline.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};

use crate::error::DetectorError;

use super::{DetectorInput, DetectorKind, DetectorStatus, DriftDetector, Sample, StatusDetail};

/// One compressed run of consecutive samples.
#[derive(Debug, Clone, Copy)]
struct Bucket {
    sum: f64,
    count: u64,
}

/// ADWIN detector over raw sample values.
#[derive(Debug, Clone)]
pub struct AdwinDetector {
    /// Confidence parameter; smaller values demand stronger evidence.
    delta: f64,
    /// Cap on the bucket list; exceeding it merges the smallest pair.
    max_buckets: usize,
    /// Minimum window width before the cut test runs.
    min_samples: u64,
    buckets: VecDeque<Bucket>,
    total: f64,
    width: u64,
    drift_detected: bool,
    last_drift_time: Option<DateTime<Utc>>,
}

impl Default for AdwinDetector {
    fn default() -> Self {
        Self::new(0.002, 32, 30)
    }
}

impl AdwinDetector {
    #[must_use]
    pub fn new(delta: f64, max_buckets: usize, min_samples: u64) -> Self {
        Self {
            delta,
            max_buckets,
            min_samples,
            buckets: VecDeque::new(),
            total: 0.0,
            width: 0,
            drift_detected: false,
            last_drift_time: None,
        }
    }

    /// Current mean of the adaptive window.
    #[must_use]
    pub fn mean(&self) -> f64 {
        if self.width > 0 {
            self.total / self.width as f64
        } else {
            0.0
        }
    }

    /// Current window width in samples.
    #[must_use]
    pub fn window_width(&self) -> u64 {
        self.width
    }

    /// Merge the adjacent bucket pair with the smallest combined count.
    ///
    /// Keeps buckets in arrival order, which the cut test relies on.
    fn compress(&mut self) {
        while self.buckets.len() > self.max_buckets {
            let mut best = 0;
            let mut best_count = u64::MAX;
            for i in 0..self.buckets.len() - 1 {
                let combined = self.buckets[i].count + self.buckets[i + 1].count;
                if combined < best_count {
                    best_count = combined;
                    best = i;
                }
            }
            let absorbed = self.buckets.remove(best + 1).expect("index in range");
            self.buckets[best].sum += absorbed.sum;
            self.buckets[best].count += absorbed.count;
        }
    }

    /// Hoeffding cut test over every split point between buckets.
    ///
    /// Returns true when some prefix/suffix pair of sub-windows has a mean
    /// difference exceeding `sqrt(2 ln(2/delta) / m)` with `m` the
    /// harmonic mean of the two sub-window counts.
    fn cut_detected(&self) -> bool {
        if self.width < self.min_samples || self.buckets.len() < 2 {
            return false;
        }

        let ln_term = (2.0 / self.delta).ln();
        let mut n0 = 0.0_f64;
        let mut sum0 = 0.0_f64;
        let total_n = self.width as f64;

        for bucket in self.buckets.iter().take(self.buckets.len() - 1) {
            n0 += bucket.count as f64;
            sum0 += bucket.sum;
            let n1 = total_n - n0;
            if n0 < 1.0 || n1 < 1.0 {
                continue;
            }

            let mean0 = sum0 / n0;
            let mean1 = (self.total - sum0) / n1;
            let harmonic = 2.0 * n0 * n1 / (n0 + n1);
            let eps = (2.0 * ln_term / harmonic).sqrt();

            if (mean0 - mean1).abs() > eps {
                return true;
            }
        }
        false
    }

    /// Shrink to the newest bucket after a detected cut.
    fn shrink(&mut self) {
        if let Some(last) = self.buckets.pop_back() {
            self.buckets.clear();
            self.total = last.sum;
            self.width = last.count;
            self.buckets.push_back(last);
        }
    }
}

impl DriftDetector for AdwinDetector {
    fn kind(&self) -> DetectorKind {
        DetectorKind::Adwin
    }

    fn input(&self) -> DetectorInput {
        DetectorInput::Value
    }

    fn update(&mut self, sample: &Sample) -> Result<bool, DetectorError> {
        let value = sample.primary()?;

        self.buckets.push_back(Bucket {
            sum: value,
            count: 1,
        });
        self.total += value;
        self.width += 1;
        self.compress();

        let fired = self.cut_detected();
        if fired {
            self.shrink();
            self.drift_detected = true;
            self.last_drift_time = Some(Utc::now());
        }
        Ok(fired)
    }

    fn reset(&mut self) {
        self.buckets.clear();
        self.total = 0.0;
        self.width = 0;
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
        self.width
    }

    fn status(&self) -> DetectorStatus {
        DetectorStatus {
            kind: self.kind(),
            input: self.input(),
            samples_seen: self.width,
            drift_detected: self.drift_detected,
            last_drift_time: self.last_drift_time,
            detail: StatusDetail::Adwin {
                window: self.width,
                mean: self.mean(),
                buckets: self.buckets.len(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constant_stream_never_fires() {
        let mut adwin = AdwinDetector::new(0.01, 32, 10);
        for _ in 0..500 {
            assert!(!adwin.update(&Sample::Scalar(1.0)).unwrap());
        }
        assert!(!adwin.drift_detected());
    }

    #[test]
    fn mean_shift_fires() {
        let mut adwin = AdwinDetector::new(0.01, 32, 10);
        for _ in 0..50 {
            adwin.update(&Sample::Scalar(0.0)).unwrap();
        }
        let mut fired = false;
        for _ in 0..50 {
            fired |= adwin.update(&Sample::Scalar(10.0)).unwrap();
        }
        assert!(fired);
        assert!(adwin.drift_detected());
        assert!(adwin.last_drift_time().is_some());
    }

    #[test]
    fn shrink_keeps_newest_data() {
        let mut adwin = AdwinDetector::new(0.01, 32, 10);
        for _ in 0..50 {
            adwin.update(&Sample::Scalar(0.0)).unwrap();
        }
        for _ in 0..50 {
            adwin.update(&Sample::Scalar(10.0)).unwrap();
        }
        // After the cut, the surviving window tracks the new regime.
        assert!(adwin.mean() > 5.0);
        assert!(adwin.window_width() < 100);
    }

    #[test]
    fn bucket_count_stays_capped() {
        let mut adwin = AdwinDetector::new(0.002, 8, 30);
        for i in 0..1000 {
            adwin.update(&Sample::Scalar((i % 3) as f64 * 0.01)).unwrap();
        }
        assert!(adwin.buckets.len() <= 8);
        assert_eq!(adwin.samples_seen(), 1000);
    }

    #[test]
    fn reset_is_idempotent() {
        let mut adwin = AdwinDetector::default();
        for _ in 0..100 {
            adwin.update(&Sample::Scalar(5.0)).unwrap();
        }
        adwin.reset();
        adwin.reset();
        assert_eq!(adwin.samples_seen(), 0);
        assert!(!adwin.drift_detected());
        assert!(adwin.last_drift_time().is_none());
        assert_eq!(adwin.mean(), 0.0);
    }

    #[test]
    fn nan_input_is_rejected_without_state_change() {
        let mut adwin = AdwinDetector::default();
        adwin.update(&Sample::Scalar(1.0)).unwrap();
        assert!(adwin.update(&Sample::Scalar(f64::NAN)).is_err());
        assert_eq!(adwin.samples_seen(), 1);
    }

    #[test]
    fn vector_sample_uses_first_component() {
        let mut adwin = AdwinDetector::default();
        adwin.update(&Sample::Vector(vec![2.0, 99.0])).unwrap();
        assert!((adwin.mean() - 2.0).abs() < f64::EPSILON);
    }
}
