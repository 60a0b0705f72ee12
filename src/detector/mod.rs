//! Online drift detectors.
//!
//! Every detector consumes a stream of scalar or vector samples through the
//! common [`DriftDetector`] contract and reports a boolean drift verdict
//! per call plus a diagnostic [`DetectorStatus`] snapshot. Detectors are
//! either *value-based* (fed raw sample values) or *error-based* (fed the
//! model's 0/1 correctness signal); the ensemble routes inputs
//! accordingly.
//!
//! Construction goes through [`build`] with a serde-tagged
//! [`DetectorConfig`], keeping the variant set open for extension without
//! touching call sites.

mod adwin;
mod ddm;
mod eddm;
mod page_hinkley;
mod statistical;

pub use adwin::AdwinDetector;
pub use ddm::DdmDetector;
pub use eddm::EddmDetector;
pub use page_hinkley::PageHinkleyDetector;
pub use statistical::StatisticalDetector;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::DetectorError;

/// A single observation pushed into a detector.
///
/// Scalar detectors consume the first component of a vector sample; the
/// statistical detector consumes every component.
#[derive(Debug, Clone, PartialEq)]
pub enum Sample {
    Scalar(f64),
    Vector(Vec<f64>),
}

impl Sample {
    /// View the sample as a slice of components.
    #[must_use]
    pub fn values(&self) -> &[f64] {
        match self {
            Sample::Scalar(v) => std::slice::from_ref(v),
            Sample::Vector(v) => v.as_slice(),
        }
    }

    /// The first component, validated finite.
    pub fn primary(&self) -> Result<f64, DetectorError> {
        let v = *self.values().first().ok_or(DetectorError::EmptySample)?;
        if v.is_finite() {
            Ok(v)
        } else {
            Err(DetectorError::NonFiniteSample(v))
        }
    }

    /// Validate every component is finite and at least one is present.
    pub fn validate(&self) -> Result<(), DetectorError> {
        let values = self.values();
        if values.is_empty() {
            return Err(DetectorError::EmptySample);
        }
        for &v in values {
            if !v.is_finite() {
                return Err(DetectorError::NonFiniteSample(v));
            }
        }
        Ok(())
    }
}

impl From<f64> for Sample {
    fn from(v: f64) -> Self {
        Sample::Scalar(v)
    }
}

impl From<Vec<f64>> for Sample {
    fn from(v: Vec<f64>) -> Self {
        Sample::Vector(v)
    }
}

/// Closed set of detector variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectorKind {
    Adwin,
    Ddm,
    Eddm,
    PageHinkley,
    Statistical,
}

impl DetectorKind {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            DetectorKind::Adwin => "adwin",
            DetectorKind::Ddm => "ddm",
            DetectorKind::Eddm => "eddm",
            DetectorKind::PageHinkley => "page_hinkley",
            DetectorKind::Statistical => "statistical",
        }
    }
}

impl std::fmt::Display for DetectorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which stream a detector consumes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectorInput {
    /// Raw sample values from the feature stream.
    Value,
    /// The model's 0/1 correctness signal.
    Error,
}

/// Variant-specific diagnostic payload in a [`DetectorStatus`].
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StatusDetail {
    Adwin {
        window: u64,
        mean: f64,
        buckets: usize,
    },
    Ddm {
        error_rate: f64,
        level: f64,
        min_level: f64,
        in_warning: bool,
    },
    Eddm {
        mean_distance: f64,
        level: f64,
        max_level: f64,
        in_warning: bool,
    },
    PageHinkley {
        mean: f64,
        cumulative: f64,
        minimum: f64,
    },
    Statistical {
        reference_len: usize,
        current_len: usize,
        last_p_value: Option<f64>,
    },
}

/// Serializable snapshot of a detector's internal state.
#[derive(Debug, Clone, Serialize)]
pub struct DetectorStatus {
    pub kind: DetectorKind,
    pub input: DetectorInput,
    pub samples_seen: u64,
    pub drift_detected: bool,
    pub last_drift_time: Option<DateTime<Utc>>,
    pub detail: StatusDetail,
}

/// Common contract for all drift detectors.
///
/// The drift flag transitions to `true` only inside [`update`] and is
/// cleared only by [`reset`]. `update` returns the verdict for the current
/// call; a non-finite or empty input is a [`DetectorError`] and leaves the
/// detector state untouched.
///
/// [`update`]: DriftDetector::update
/// [`reset`]: DriftDetector::reset
pub trait DriftDetector: Send {
    /// The detector variant.
    fn kind(&self) -> DetectorKind;

    /// Which stream this detector consumes.
    fn input(&self) -> DetectorInput;

    /// Feed one observation; returns the drift verdict for this call.
    fn update(&mut self, sample: &Sample) -> Result<bool, DetectorError>;

    /// Return to the initial state. Idempotent.
    fn reset(&mut self);

    /// Whether drift has been detected since the last reset.
    fn drift_detected(&self) -> bool;

    /// Timestamp of the most recent drift detection, if any.
    fn last_drift_time(&self) -> Option<DateTime<Utc>>;

    /// Number of observations consumed since the last reset.
    fn samples_seen(&self) -> u64;

    /// Diagnostic snapshot of the current state.
    fn status(&self) -> DetectorStatus;
}

fn default_adwin_delta() -> f64 {
    0.002
}
fn default_max_buckets() -> usize {
    32
}
fn default_min_samples() -> u64 {
    30
}
fn default_warning_level() -> f64 {
    2.0
}
fn default_drift_level() -> f64 {
    3.0
}
fn default_warning_threshold() -> f64 {
    0.95
}
fn default_drift_threshold() -> f64 {
    0.9
}
fn default_ph_delta() -> f64 {
    0.005
}
fn default_ph_threshold() -> f64 {
    50.0
}
fn default_window_size() -> usize {
    100
}
fn default_p_value_threshold() -> f64 {
    0.05
}

/// Serde-tagged construction parameters for each detector variant.
///
/// Appears in the `[[ensemble.detectors]]` tables of the TOML config.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DetectorConfig {
    Adwin {
        #[serde(default = "default_adwin_delta")]
        delta: f64,
        #[serde(default = "default_max_buckets")]
        max_buckets: usize,
        #[serde(default = "default_min_samples")]
        min_samples: u64,
    },
    Ddm {
        #[serde(default = "default_warning_level")]
        warning_level: f64,
        #[serde(default = "default_drift_level")]
        drift_level: f64,
        #[serde(default = "default_min_samples")]
        min_samples: u64,
    },
    Eddm {
        #[serde(default = "default_warning_threshold")]
        warning_threshold: f64,
        #[serde(default = "default_drift_threshold")]
        drift_threshold: f64,
        #[serde(default = "default_min_samples")]
        min_errors: u64,
    },
    PageHinkley {
        #[serde(default = "default_ph_delta")]
        delta: f64,
        #[serde(default = "default_ph_threshold")]
        threshold: f64,
        #[serde(default = "default_min_samples")]
        min_samples: u64,
    },
    Statistical {
        #[serde(default = "default_window_size")]
        window_size: usize,
        #[serde(default = "default_p_value_threshold")]
        p_value_threshold: f64,
    },
}

impl DetectorConfig {
    /// The variant this configuration builds.
    #[must_use]
    pub fn kind(&self) -> DetectorKind {
        match self {
            DetectorConfig::Adwin { .. } => DetectorKind::Adwin,
            DetectorConfig::Ddm { .. } => DetectorKind::Ddm,
            DetectorConfig::Eddm { .. } => DetectorKind::Eddm,
            DetectorConfig::PageHinkley { .. } => DetectorKind::PageHinkley,
            DetectorConfig::Statistical { .. } => DetectorKind::Statistical,
        }
    }

    /// Fail fast on parameter values a detector cannot operate with.
    pub fn validate(&self) -> Result<(), crate::error::ConfigError> {
        use crate::error::ConfigError;

        match *self {
            DetectorConfig::Adwin {
                delta, max_buckets, ..
            } => {
                if !(delta > 0.0 && delta < 1.0) {
                    return Err(ConfigError::InvalidValue {
                        field: "adwin.delta",
                        reason: format!("must be in (0, 1), got {delta}"),
                    });
                }
                if max_buckets < 2 {
                    return Err(ConfigError::InvalidValue {
                        field: "adwin.max_buckets",
                        reason: format!("must be at least 2, got {max_buckets}"),
                    });
                }
            }
            DetectorConfig::Ddm {
                warning_level,
                drift_level,
                ..
            } => {
                if drift_level <= 0.0 || warning_level <= 0.0 {
                    return Err(ConfigError::InvalidValue {
                        field: "ddm.drift_level",
                        reason: "levels must be positive".to_string(),
                    });
                }
            }
            DetectorConfig::Eddm {
                warning_threshold,
                drift_threshold,
                ..
            } => {
                if !(drift_threshold > 0.0 && drift_threshold < 1.0)
                    || !(warning_threshold > 0.0 && warning_threshold <= 1.0)
                {
                    return Err(ConfigError::InvalidValue {
                        field: "eddm.drift_threshold",
                        reason: "thresholds must be in (0, 1)".to_string(),
                    });
                }
            }
            DetectorConfig::PageHinkley { threshold, .. } => {
                if threshold <= 0.0 {
                    return Err(ConfigError::InvalidValue {
                        field: "page_hinkley.threshold",
                        reason: format!("must be positive, got {threshold}"),
                    });
                }
            }
            DetectorConfig::Statistical {
                window_size,
                p_value_threshold,
            } => {
                if window_size < 2 {
                    return Err(ConfigError::InvalidValue {
                        field: "statistical.window_size",
                        reason: format!("must be at least 2, got {window_size}"),
                    });
                }
                if !(p_value_threshold > 0.0 && p_value_threshold < 1.0) {
                    return Err(ConfigError::InvalidValue {
                        field: "statistical.p_value_threshold",
                        reason: format!("must be in (0, 1), got {p_value_threshold}"),
                    });
                }
            }
        }
        Ok(())
    }
}

/// Construct a detector from its configuration.
#[must_use]
pub fn build(config: &DetectorConfig) -> Box<dyn DriftDetector> {
    match *config {
        DetectorConfig::Adwin {
            delta,
            max_buckets,
            min_samples,
        } => Box::new(AdwinDetector::new(delta, max_buckets, min_samples)),
        DetectorConfig::Ddm {
            warning_level,
            drift_level,
            min_samples,
        } => Box::new(DdmDetector::new(warning_level, drift_level, min_samples)),
        DetectorConfig::Eddm {
            warning_threshold,
            drift_threshold,
            min_errors,
        } => Box::new(EddmDetector::new(
            warning_threshold,
            drift_threshold,
            min_errors,
        )),
        DetectorConfig::PageHinkley {
            delta,
            threshold,
            min_samples,
        } => Box::new(PageHinkleyDetector::new(delta, threshold, min_samples)),
        DetectorConfig::Statistical {
            window_size,
            p_value_threshold,
        } => Box::new(StatisticalDetector::new(window_size, p_value_threshold)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sample_values_scalar() {
        let s = Sample::Scalar(1.5);
        assert_eq!(s.values(), &[1.5]);
    }

    #[test]
    fn sample_values_vector() {
        let s = Sample::Vector(vec![1.0, 2.0]);
        assert_eq!(s.values(), &[1.0, 2.0]);
    }

    #[test]
    fn sample_primary_rejects_nan() {
        let s = Sample::Scalar(f64::NAN);
        assert!(s.primary().is_err());
    }

    #[test]
    fn sample_validate_rejects_empty_vector() {
        let s = Sample::Vector(vec![]);
        assert!(s.validate().is_err());
    }

    #[test]
    fn sample_validate_rejects_infinite_component() {
        let s = Sample::Vector(vec![1.0, f64::INFINITY]);
        assert!(s.validate().is_err());
    }

    #[test]
    fn build_constructs_each_kind() {
        let configs = [
            DetectorConfig::Adwin {
                delta: 0.002,
                max_buckets: 32,
                min_samples: 30,
            },
            DetectorConfig::Ddm {
                warning_level: 2.0,
                drift_level: 3.0,
                min_samples: 30,
            },
            DetectorConfig::Eddm {
                warning_threshold: 0.95,
                drift_threshold: 0.9,
                min_errors: 30,
            },
            DetectorConfig::PageHinkley {
                delta: 0.005,
                threshold: 50.0,
                min_samples: 30,
            },
            DetectorConfig::Statistical {
                window_size: 100,
                p_value_threshold: 0.05,
            },
        ];

        for config in &configs {
            let detector = build(config);
            assert_eq!(detector.kind(), config.kind());
            assert!(!detector.drift_detected());
            assert_eq!(detector.samples_seen(), 0);
        }
    }

    #[test]
    fn detector_config_deserializes_with_defaults() {
        let config: DetectorConfig = toml::from_str("kind = \"adwin\"").unwrap();
        assert_eq!(
            config,
            DetectorConfig::Adwin {
                delta: 0.002,
                max_buckets: 32,
                min_samples: 30,
            }
        );
    }

    #[test]
    fn detector_config_validate_rejects_bad_delta() {
        let config = DetectorConfig::Adwin {
            delta: 1.5,
            max_buckets: 32,
            min_samples: 30,
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn detector_config_validate_rejects_tiny_window() {
        let config = DetectorConfig::Statistical {
            window_size: 1,
            p_value_threshold: 0.05,
        };
        assert!(config.validate().is_err());
    }
}
