//! Scripted drift detector for deterministic ensemble/monitor tests.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};

use crate::detector::{
    DetectorInput, DetectorKind, DetectorStatus, DriftDetector, Sample, StatusDetail,
};
use crate::error::DetectorError;

/// Replays a prepared verdict sequence, then keeps returning a default.
///
/// Reports itself as ADWIN; tests using it exercise routing and voting
/// plumbing, not detector math.
#[derive(Debug, Clone)]
pub struct ScriptedDetector {
    script: VecDeque<bool>,
    default_verdict: bool,
    input: DetectorInput,
    samples_seen: u64,
    drift_detected: bool,
    last_drift_time: Option<DateTime<Utc>>,
}

impl ScriptedDetector {
    /// Replay `script`, then report `false`.
    #[must_use]
    pub fn new(script: Vec<bool>) -> Self {
        Self {
            script: script.into(),
            default_verdict: false,
            input: DetectorInput::Value,
            samples_seen: 0,
            drift_detected: false,
            last_drift_time: None,
        }
    }

    /// Always report the same verdict.
    #[must_use]
    pub fn always(verdict: bool) -> Self {
        Self {
            default_verdict: verdict,
            ..Self::new(Vec::new())
        }
    }

    /// Consume the error stream instead of the value stream.
    #[must_use]
    pub fn on_errors(mut self) -> Self {
        self.input = DetectorInput::Error;
        self
    }
}

impl DriftDetector for ScriptedDetector {
    fn kind(&self) -> DetectorKind {
        DetectorKind::Adwin
    }

    fn input(&self) -> DetectorInput {
        self.input
    }

    fn update(&mut self, sample: &Sample) -> Result<bool, DetectorError> {
        sample.validate()?;
        self.samples_seen += 1;
        let verdict = self.script.pop_front().unwrap_or(self.default_verdict);
        if verdict {
            self.drift_detected = true;
            self.last_drift_time = Some(Utc::now());
        }
        Ok(verdict)
    }

    fn reset(&mut self) {
        self.samples_seen = 0;
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
            input: self.input,
            samples_seen: self.samples_seen,
            drift_detected: self.drift_detected,
            last_drift_time: self.last_drift_time,
            detail: StatusDetail::Adwin {
                window: self.samples_seen,
                mean: 0.0,
                buckets: 0,
            },
        }
    }
}
