//! Drift events, alerts, and performance snapshots.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A point-in-time view of the model's performance metrics.
///
/// `primary` is the headline metric (accuracy, Sharpe, hit rate - the
/// caller decides) that drives the monitor's trend checks; any number of
/// named metrics can ride along.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceSnapshot {
    pub timestamp: DateTime<Utc>,
    pub primary: f64,
    #[serde(default)]
    pub metrics: BTreeMap<String, f64>,
}

impl PerformanceSnapshot {
    #[must_use]
    pub fn new(primary: f64) -> Self {
        Self {
            timestamp: Utc::now(),
            primary,
            metrics: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn with_metric(mut self, name: &str, value: f64) -> Self {
        self.metrics.insert(name.to_string(), value);
        self
    }
}

/// Immutable record of one ensemble-positive drift decision.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DriftEvent {
    pub timestamp: DateTime<Utc>,
    /// Per-detector verdicts for the triggering call.
    pub verdicts: BTreeMap<String, bool>,
    /// Voting policy in effect when the decision was made.
    pub voting: String,
    pub votes: usize,
    pub responders: usize,
    /// Most recent performance snapshot at detection time, if any.
    pub metrics: Option<PerformanceSnapshot>,
}

/// What an alert is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertKind {
    /// The ensemble reached a positive drift decision.
    DriftDetected,
    /// Every detector reports drift simultaneously; usually a
    /// misconfiguration rather than genuine drift.
    SystemicDrift,
    /// The primary performance metric is trending down.
    DecliningTrend,
}

impl AlertKind {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertKind::DriftDetected => "drift_detected",
            AlertKind::SystemicDrift => "systemic_drift",
            AlertKind::DecliningTrend => "declining_trend",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertSeverity {
    Info,
    Warning,
    Critical,
}

/// A consumable notification handed to registered callbacks.
///
/// Not persisted beyond the monitor's bounded alert ring.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Alert {
    pub event_type: AlertKind,
    pub timestamp: DateTime<Utc>,
    pub severity: AlertSeverity,
    pub message: String,
    pub details: serde_json::Value,
}

impl Alert {
    #[must_use]
    pub fn new(
        event_type: AlertKind,
        severity: AlertSeverity,
        message: String,
        details: serde_json::Value,
    ) -> Self {
        Self {
            event_type,
            timestamp: Utc::now(),
            severity,
            message,
            details,
        }
    }
}
