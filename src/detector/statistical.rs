//! Statistical drift detector: twin sliding windows compared with a
//! two-sample Kolmogorov-Smirnov test.
//!
//! The first `window_size` samples fill the reference window; subsequent
//! samples fill the current window. Once both are full, each dimension is
//! tested independently and the *minimum* p-value across dimensions
//! decides (the most conservative choice for vector samples). On drift the
//! current window is promoted to the new reference; otherwise the oldest
//! half of the current window is evicted so the comparison keeps sliding
//! forward.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};

use crate::error::DetectorError;

use super::{DetectorInput, DetectorKind, DetectorStatus, DriftDetector, Sample, StatusDetail};

/// Truncation point for the Kolmogorov distribution series.
const KOLMOGOROV_SERIES_TERMS: usize = 100;

/// Twin-window Kolmogorov-Smirnov detector over raw sample values.
#[derive(Debug, Clone)]
pub struct StatisticalDetector {
    /// Capacity of each window.
    window_size: usize,
    /// Drift fires when the minimum per-dimension p-value drops below this.
    p_value_threshold: f64,
    reference: VecDeque<Vec<f64>>,
    current: VecDeque<Vec<f64>>,
    /// Dimension locked in by the first sample.
    dimensions: Option<usize>,
    samples_seen: u64,
    last_p_value: Option<f64>,
    drift_detected: bool,
    last_drift_time: Option<DateTime<Utc>>,
}

impl Default for StatisticalDetector {
    fn default() -> Self {
        Self::new(100, 0.05)
    }
}

impl StatisticalDetector {
    #[must_use]
    pub fn new(window_size: usize, p_value_threshold: f64) -> Self {
        Self {
            window_size,
            p_value_threshold,
            reference: VecDeque::with_capacity(window_size),
            current: VecDeque::with_capacity(window_size),
            dimensions: None,
            samples_seen: 0,
            last_p_value: None,
            drift_detected: false,
            last_drift_time: None,
        }
    }

    /// The most recent minimum p-value, if both windows have been compared.
    #[must_use]
    pub fn last_p_value(&self) -> Option<f64> {
        self.last_p_value
    }

    /// Two-sample Kolmogorov-Smirnov statistic for one dimension.
    fn ks_statistic(a: &[f64], b: &[f64]) -> f64 {
        let mut a = a.to_vec();
        let mut b = b.to_vec();
        a.sort_by(|x, y| x.partial_cmp(y).expect("finite values"));
        b.sort_by(|x, y| x.partial_cmp(y).expect("finite values"));

        let (na, nb) = (a.len() as f64, b.len() as f64);
        let (mut i, mut j) = (0usize, 0usize);
        let mut d: f64 = 0.0;

        while i < a.len() && j < b.len() {
            if a[i] <= b[j] {
                i += 1;
            } else {
                j += 1;
            }
            let fa = i as f64 / na;
            let fb = j as f64 / nb;
            d = d.max((fa - fb).abs());
        }
        d
    }

    /// Asymptotic p-value for the two-sample KS statistic.
    fn ks_p_value(d: f64, n1: usize, n2: usize) -> f64 {
        let ne = (n1 * n2) as f64 / (n1 + n2) as f64;
        let lambda = (ne.sqrt() + 0.12 + 0.11 / ne.sqrt()) * d;
        if lambda < 1e-3 {
            return 1.0;
        }

        let mut sum = 0.0;
        let mut sign = 1.0;
        for k in 1..=KOLMOGOROV_SERIES_TERMS {
            let k = k as f64;
            let term = (-2.0 * k * k * lambda * lambda).exp();
            sum += sign * term;
            sign = -sign;
            if term < 1e-12 {
                break;
            }
        }
        (2.0 * sum).clamp(0.0, 1.0)
    }

    /// Minimum p-value across dimensions, comparing reference vs current.
    fn min_p_value(&self) -> f64 {
        let dims = self.dimensions.unwrap_or(1);
        let mut min_p = 1.0_f64;
        for dim in 0..dims {
            let reference: Vec<f64> = self.reference.iter().map(|row| row[dim]).collect();
            let current: Vec<f64> = self.current.iter().map(|row| row[dim]).collect();
            let d = Self::ks_statistic(&reference, &current);
            let p = Self::ks_p_value(d, reference.len(), current.len());
            min_p = min_p.min(p);
        }
        min_p
    }
}

impl DriftDetector for StatisticalDetector {
    fn kind(&self) -> DetectorKind {
        DetectorKind::Statistical
    }

    fn input(&self) -> DetectorInput {
        DetectorInput::Value
    }

    fn update(&mut self, sample: &Sample) -> Result<bool, DetectorError> {
        sample.validate()?;
        let row = sample.values().to_vec();

        match self.dimensions {
            None => self.dimensions = Some(row.len()),
            Some(expected) if expected != row.len() => {
                return Err(DetectorError::DimensionMismatch {
                    expected,
                    got: row.len(),
                });
            }
            Some(_) => {}
        }

        self.samples_seen += 1;

        if self.reference.len() < self.window_size {
            self.reference.push_back(row);
            return Ok(false);
        }

        self.current.push_back(row);
        if self.current.len() < self.window_size {
            return Ok(false);
        }

        let min_p = self.min_p_value();
        self.last_p_value = Some(min_p);

        if min_p < self.p_value_threshold {
            // The current window becomes the new baseline.
            self.reference = std::mem::take(&mut self.current);
            self.drift_detected = true;
            self.last_drift_time = Some(Utc::now());
            return Ok(true);
        }

        // Slide forward by evicting the oldest half of the current window.
        let evict = self.window_size / 2;
        self.current.drain(..evict);
        Ok(false)
    }

    fn reset(&mut self) {
        self.reference.clear();
        self.current.clear();
        self.dimensions = None;
        self.samples_seen = 0;
        self.last_p_value = None;
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
        self.samples_seen
    }

    fn status(&self) -> DetectorStatus {
        DetectorStatus {
            kind: self.kind(),
            input: self.input(),
            samples_seen: self.samples_seen,
            drift_detected: self.drift_detected,
            last_drift_time: self.last_drift_time,
            detail: StatusDetail::Statistical {
                reference_len: self.reference.len(),
                current_len: self.current.len(),
                last_p_value: self.last_p_value,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cycle(period: usize, offset: f64, count: usize) -> Vec<f64> {
        (0..count)
            .map(|i| offset + (i % period) as f64 * 0.25)
            .collect()
    }

    #[test]
    fn reference_fills_before_current() {
        let mut detector = StatisticalDetector::new(10, 0.05);
        for v in cycle(5, 0.0, 10) {
            detector.update(&Sample::Scalar(v)).unwrap();
        }
        assert_eq!(detector.reference.len(), 10);
        assert!(detector.current.is_empty());
    }

    #[test]
    fn identical_distribution_does_not_fire() {
        let mut detector = StatisticalDetector::new(20, 0.05);
        for v in cycle(5, 0.0, 200) {
            assert!(!detector.update(&Sample::Scalar(v)).unwrap());
        }
        assert!(!detector.drift_detected());
        assert!(detector.last_p_value().unwrap() > 0.05);
    }

    #[test]
    fn shifted_distribution_fires_and_promotes_current() {
        let mut detector = StatisticalDetector::new(20, 0.05);
        for v in cycle(5, 0.0, 40) {
            detector.update(&Sample::Scalar(v)).unwrap();
        }
        let mut fired = false;
        for v in cycle(5, 10.0, 60) {
            fired |= detector.update(&Sample::Scalar(v)).unwrap();
        }
        assert!(fired);
        // Promotion: the shifted data has become the new reference.
        assert_eq!(detector.reference.len(), 20);
        assert!(detector.reference.iter().all(|row| row[0] >= 10.0));
    }

    #[test]
    fn vector_samples_use_min_p_value_across_dimensions() {
        let mut detector = StatisticalDetector::new(20, 0.05);
        // Dimension 0 stays put; dimension 1 shifts.
        for v in cycle(5, 0.0, 40) {
            detector
                .update(&Sample::Vector(vec![v, v]))
                .unwrap();
        }
        let mut fired = false;
        for v in cycle(5, 0.0, 60) {
            fired |= detector
                .update(&Sample::Vector(vec![v, v + 10.0]))
                .unwrap();
            if fired {
                break;
            }
        }
        assert!(fired);
    }

    #[test]
    fn dimension_mismatch_is_rejected() {
        let mut detector = StatisticalDetector::new(10, 0.05);
        detector.update(&Sample::Vector(vec![1.0, 2.0])).unwrap();
        let result = detector.update(&Sample::Scalar(1.0));
        assert!(matches!(
            result,
            Err(DetectorError::DimensionMismatch { expected: 2, got: 1 })
        ));
    }

    #[test]
    fn ks_statistic_disjoint_supports_is_one() {
        let a = [0.0, 0.1, 0.2, 0.3];
        let b = [10.0, 10.1, 10.2, 10.3];
        let d = StatisticalDetector::ks_statistic(&a, &b);
        assert!((d - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn ks_p_value_small_for_large_statistic() {
        let p = StatisticalDetector::ks_p_value(1.0, 20, 20);
        assert!(p < 0.001);
    }

    #[test]
    fn ks_p_value_large_for_tiny_statistic() {
        let p = StatisticalDetector::ks_p_value(0.05, 20, 20);
        assert!(p > 0.5);
    }

    #[test]
    fn reset_is_idempotent() {
        let mut detector = StatisticalDetector::new(10, 0.05);
        for v in cycle(5, 0.0, 30) {
            detector.update(&Sample::Scalar(v)).unwrap();
        }
        detector.reset();
        detector.reset();
        assert_eq!(detector.samples_seen(), 0);
        assert!(!detector.drift_detected());
        assert!(detector.last_p_value().is_none());
    }
}
