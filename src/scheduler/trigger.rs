//! Retraining triggers.
//!
//! A trigger is a pure configuration value: a condition kind, an enabled
//! flag, and an integer priority (higher executes first). Triggers are
//! immutable once registered; replacing one means re-registering it.

use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};

/// When a `ScheduledTime` trigger is due.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Schedule {
    /// Fire once per elapsed period. The first evaluation arms the clock
    /// rather than firing immediately.
    Every(Duration),
    /// Fire once per calendar day at/after `hour:minute` UTC.
    Daily { hour: u32, minute: u32 },
}

impl Schedule {
    /// Convenience constructor for a daily schedule.
    #[must_use]
    pub fn daily(hour: u32, minute: u32) -> Self {
        Schedule::Daily { hour, minute }
    }

    /// Whether the schedule has a matching window between `last` (the
    /// previous fire, or the arming time) and `now`.
    #[must_use]
    pub fn is_due(&self, last: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        match *self {
            Schedule::Every(period) => {
                let period = chrono::Duration::from_std(period).unwrap_or(chrono::Duration::MAX);
                now - last >= period
            }
            Schedule::Daily { hour, minute } => {
                let Some(target) = now.date_naive().and_hms_opt(hour, minute, 0) else {
                    return false;
                };
                let target = Utc.from_utc_datetime(&target);
                now >= target && last < target
            }
        }
    }
}

/// The condition a trigger evaluates each scheduler tick.
#[derive(Debug, Clone, PartialEq)]
pub enum TriggerKind {
    /// The injected performance tracker reports degradation beyond
    /// `threshold`.
    PerformanceDegradation { threshold: f64 },
    /// The injected drift monitor recorded a drift event within `window`.
    DriftDetection { window: Duration },
    /// Wall-clock schedule; fires once per matching window.
    ScheduledTime { schedule: Schedule },
    /// The model's cumulative `samples_seen` advanced by at least
    /// `interval` since the last fire.
    SampleCount { interval: u64 },
    /// Never auto-fires; reserved for explicit operator calls, which
    /// bypass the cooldown entirely.
    Manual,
}

impl TriggerKind {
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            TriggerKind::PerformanceDegradation { .. } => "performance_degradation",
            TriggerKind::DriftDetection { .. } => "drift_detection",
            TriggerKind::ScheduledTime { .. } => "scheduled_time",
            TriggerKind::SampleCount { .. } => "sample_count",
            TriggerKind::Manual => "manual",
        }
    }
}

/// A registered retraining condition for one model.
#[derive(Debug, Clone, PartialEq)]
pub struct RetrainingTrigger {
    pub kind: TriggerKind,
    pub enabled: bool,
    /// Higher priorities execute first within a tick.
    pub priority: i32,
}

impl RetrainingTrigger {
    #[must_use]
    pub fn new(kind: TriggerKind, priority: i32) -> Self {
        Self {
            kind,
            enabled: true,
            priority,
        }
    }

    #[must_use]
    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }
}
