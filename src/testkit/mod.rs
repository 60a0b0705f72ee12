//! Shared test fixtures available to both unit and integration tests.
//!
//! Enabled via `#[cfg(test)]` (unit tests) or the `testkit` feature
//! (integration tests).
//!
//! # Modules
//!
//! - [`detectors`] — [`ScriptedDetector`], a detector that replays a
//!   prepared verdict sequence.
//! - [`models`] — [`FakeModel`], [`VecDataSource`], [`FailingDataSource`],
//!   and [`StaticTracker`] collaborator fakes for scheduler tests.
//! - [`alerts`] — [`RecordingAlertSink`] for capturing monitor alerts.

pub mod alerts;
pub mod detectors;
pub mod models;

pub use alerts::RecordingAlertSink;
pub use detectors::ScriptedDetector;
pub use models::{FailingDataSource, FakeModel, StaticTracker, VecDataSource};
