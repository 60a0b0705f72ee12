//! Driftlord - Streaming concept-drift detection and retraining scheduling.
//!
//! This crate provides the adaptation control plane for online trading
//! models: it watches unbounded sample/error streams for distribution
//! changes and turns confirmed changes (plus schedules, sample counts, and
//! performance regressions) into prioritized retraining jobs.
//!
//! # Architecture
//!
//! Data flows leaf-first through four layers:
//!
//! - **[`detector`]** - Online drift detectors with a common
//!   `update/reset/status` contract:
//!   - `Adwin` - adaptive windowing with a Hoeffding cut test
//!   - `Ddm` / `Eddm` - error-rate and error-distance monitoring
//!   - `PageHinkley` - cumulative deviation from the running mean
//!   - `Statistical` - twin-window two-sample Kolmogorov-Smirnov test
//! - **[`ensemble`]** - Combines named detectors under a voting policy
//!   (majority / unanimous / confidence / single).
//! - **[`monitor`]** - Wraps an ensemble with bounded buffers, cold-start
//!   suppression, alert dispatch with cooldown, and bounded event history;
//!   runs a background tick for retention pruning and trend checks.
//! - **[`scheduler`]** - Registers trainable models with retraining
//!   triggers, evaluates them each tick, and executes jobs in priority
//!   order subject to a per-model cooldown.
//!
//! # Modules
//!
//! - [`config`] - TOML configuration with fail-fast validation
//! - [`detector`] - Drift detector variants and the construction registry
//! - [`ensemble`] - Detector collection and voting policies
//! - [`error`] - Error types for the crate
//! - [`monitor`] - Buffered monitoring, alerting, and event history
//! - [`persist`] - JSON-lines event log and checkpoint path helpers
//! - [`scheduler`] - Trigger evaluation and retraining job execution
//!
//! # Example
//!
//! ```
//! use driftlord::detector::{AdwinDetector, Sample};
//! use driftlord::ensemble::{DriftEnsemble, VotingPolicy};
//!
//! let mut ensemble = DriftEnsemble::new(VotingPolicy::Majority);
//! ensemble.add_detector("adwin", Box::new(AdwinDetector::default()));
//!
//! let decision = ensemble.update(&Sample::Scalar(0.5), None);
//! assert!(!decision.drift_detected);
//! ```

pub mod config;
pub mod detector;
pub mod ensemble;
pub mod error;
pub mod monitor;
pub mod persist;
pub mod scheduler;

#[cfg(any(test, feature = "testkit"))]
pub mod testkit;

pub use error::{Error, Result};
