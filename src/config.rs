//! TOML configuration with fail-fast validation.
//!
//! The host process loads one [`Config`] at startup; every section has
//! usable defaults so the crate also works without a config file.
//! Validation is intentionally fatal: an invalid voting policy or an
//! impossible capacity should stop the process before any background
//! worker starts.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::detector::DetectorConfig;
use crate::ensemble::VotingPolicy;
use crate::error::{ConfigError, Result};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub monitor: MonitorConfig,
    #[serde(default)]
    pub ensemble: EnsembleConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
}

impl Config {
    /// Load and validate a configuration file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(ConfigError::ReadFile)?;
        let config: Config = toml::from_str(&content).map_err(ConfigError::Parse)?;
        config.validate()?;
        Ok(config)
    }

    /// Fail fast on values the subsystem cannot operate with.
    pub fn validate(&self) -> Result<()> {
        self.monitor.validate()?;
        self.ensemble.validate()?;
        self.scheduler.validate()?;
        Ok(())
    }
}

/// One named detector entry in the ensemble section.
///
/// ```toml
/// [[ensemble.detectors]]
/// kind = "adwin"
/// name = "adwin-fast"
/// delta = 0.01
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectorEntry {
    /// Display name; defaults to the detector kind.
    #[serde(default)]
    pub name: Option<String>,
    #[serde(flatten)]
    pub config: DetectorConfig,
}

impl DetectorEntry {
    #[must_use]
    pub fn effective_name(&self) -> String {
        self.name
            .clone()
            .unwrap_or_else(|| self.config.kind().as_str().to_string())
    }
}

/// Ensemble section: voting policy and detector roster.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnsembleConfig {
    /// One of `majority`, `unanimous`, `confidence`, `single`.
    #[serde(default = "default_voting")]
    pub voting: String,
    /// Vote fraction required under the `confidence` policy.
    #[serde(default = "default_confidence_threshold")]
    pub confidence_threshold: f64,
    #[serde(default)]
    pub detectors: Vec<DetectorEntry>,
}

impl Default for EnsembleConfig {
    fn default() -> Self {
        Self {
            voting: default_voting(),
            confidence_threshold: default_confidence_threshold(),
            detectors: Vec::new(),
        }
    }
}

impl EnsembleConfig {
    pub fn validate(&self) -> Result<()> {
        VotingPolicy::parse(&self.voting, self.confidence_threshold)?;
        for entry in &self.detectors {
            entry.config.validate()?;
        }
        Ok(())
    }
}

/// Monitor section: buffers, cadence, alerting, retention.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonitorConfig {
    /// Capacity of the sample/error/metrics ring buffers.
    #[serde(default = "default_buffer_capacity")]
    pub buffer_capacity: usize,
    /// Samples buffered before the ensemble is consulted at all.
    /// Suppresses cold-start false positives.
    #[serde(default = "default_min_samples_for_detection")]
    pub min_samples_for_detection: usize,
    /// Background tick cadence, seconds.
    #[serde(default = "default_monitor_interval_secs")]
    pub check_interval_secs: u64,
    /// Minimum spacing between dispatched alerts, seconds.
    #[serde(default = "default_alert_cooldown_secs")]
    pub alert_cooldown_secs: u64,
    /// Drift events older than this are pruned on each tick, hours.
    #[serde(default = "default_history_retention_hours")]
    pub history_retention_hours: u64,
    /// Reset the ensemble immediately after alerting on drift.
    #[serde(default)]
    pub auto_reset_after_drift: bool,
    /// Number of recent metric snapshots in the trend fit.
    #[serde(default = "default_trend_window")]
    pub trend_window: usize,
    /// Downward slope magnitude (per snapshot) that raises a warning.
    #[serde(default = "default_trend_slope_alert")]
    pub trend_slope_alert: f64,
    /// Append drift events as JSON lines to this file when set.
    #[serde(default)]
    pub event_log_path: Option<PathBuf>,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            buffer_capacity: default_buffer_capacity(),
            min_samples_for_detection: default_min_samples_for_detection(),
            check_interval_secs: default_monitor_interval_secs(),
            alert_cooldown_secs: default_alert_cooldown_secs(),
            history_retention_hours: default_history_retention_hours(),
            auto_reset_after_drift: false,
            trend_window: default_trend_window(),
            trend_slope_alert: default_trend_slope_alert(),
            event_log_path: None,
        }
    }
}

impl MonitorConfig {
    #[must_use]
    pub fn check_interval(&self) -> Duration {
        Duration::from_secs(self.check_interval_secs)
    }

    #[must_use]
    pub fn alert_cooldown(&self) -> Duration {
        Duration::from_secs(self.alert_cooldown_secs)
    }

    #[must_use]
    pub fn history_retention(&self) -> chrono::Duration {
        chrono::Duration::hours(self.history_retention_hours as i64)
    }

    pub fn validate(&self) -> Result<()> {
        if self.buffer_capacity == 0 {
            return Err(ConfigError::InvalidValue {
                field: "monitor.buffer_capacity",
                reason: "must be positive".to_string(),
            }
            .into());
        }
        if self.min_samples_for_detection > self.buffer_capacity {
            return Err(ConfigError::InvalidValue {
                field: "monitor.min_samples_for_detection",
                reason: format!(
                    "cannot exceed buffer_capacity ({})",
                    self.buffer_capacity
                ),
            }
            .into());
        }
        if self.trend_window < 2 {
            return Err(ConfigError::InvalidValue {
                field: "monitor.trend_window",
                reason: "need at least 2 snapshots for a trend fit".to_string(),
            }
            .into());
        }
        Ok(())
    }
}

/// Scheduler section: cadence, cooldown, queue and history bounds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Background tick cadence, seconds.
    #[serde(default = "default_scheduler_interval_secs")]
    pub check_interval_secs: u64,
    /// Minimum spacing between retrains of the same model, seconds.
    /// Enforced per model regardless of which trigger fired.
    #[serde(default = "default_cooldown_secs")]
    pub cooldown_secs: u64,
    /// A fetched training batch smaller than this fails the job.
    #[serde(default = "default_min_samples_for_retrain")]
    pub min_samples_for_retrain: usize,
    /// Cap on the pending-job queue.
    #[serde(default = "default_max_pending_jobs")]
    pub max_pending_jobs: usize,
    /// Cap on each of the completed- and failed-job histories.
    #[serde(default = "default_history_capacity")]
    pub history_capacity: usize,
    /// Write a timestamped model checkpoint here after each successful
    /// retrain when set.
    #[serde(default)]
    pub checkpoint_dir: Option<PathBuf>,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            check_interval_secs: default_scheduler_interval_secs(),
            cooldown_secs: default_cooldown_secs(),
            min_samples_for_retrain: default_min_samples_for_retrain(),
            max_pending_jobs: default_max_pending_jobs(),
            history_capacity: default_history_capacity(),
            checkpoint_dir: None,
        }
    }
}

impl SchedulerConfig {
    #[must_use]
    pub fn check_interval(&self) -> Duration {
        Duration::from_secs(self.check_interval_secs)
    }

    #[must_use]
    pub fn cooldown(&self) -> Duration {
        Duration::from_secs(self.cooldown_secs)
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_pending_jobs == 0 {
            return Err(ConfigError::InvalidValue {
                field: "scheduler.max_pending_jobs",
                reason: "must be positive".to_string(),
            }
            .into());
        }
        if self.history_capacity == 0 {
            return Err(ConfigError::InvalidValue {
                field: "scheduler.history_capacity",
                reason: "must be positive".to_string(),
            }
            .into());
        }
        Ok(())
    }
}

fn default_voting() -> String {
    "majority".to_string()
}
fn default_confidence_threshold() -> f64 {
    0.7
}
fn default_buffer_capacity() -> usize {
    1000
}
fn default_min_samples_for_detection() -> usize {
    100
}
fn default_monitor_interval_secs() -> u64 {
    60
}
fn default_alert_cooldown_secs() -> u64 {
    300
}
fn default_history_retention_hours() -> u64 {
    24
}
fn default_trend_window() -> usize {
    20
}
fn default_trend_slope_alert() -> f64 {
    0.05
}
fn default_scheduler_interval_secs() -> u64 {
    60
}
fn default_cooldown_secs() -> u64 {
    1800
}
fn default_min_samples_for_retrain() -> usize {
    100
}
fn default_max_pending_jobs() -> usize {
    64
}
fn default_history_capacity() -> usize {
    200
}
