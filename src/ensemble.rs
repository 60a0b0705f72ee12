//! Detector ensemble and voting policies.
//!
//! A [`DriftEnsemble`] owns a named collection of detectors, routes each
//! incoming sample/error pair to the detectors that consume that input,
//! and reduces the verdicts produced this call to one ensemble-level
//! decision under the configured [`VotingPolicy`]. A detector whose
//! required input is absent for a call is skipped and counts neither vote;
//! a detector that errors is logged and treated the same way.

use std::collections::{BTreeMap, VecDeque};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, warn};

use crate::config::EnsembleConfig;
use crate::detector::{self, DetectorInput, DetectorStatus, DriftDetector, Sample};
use crate::error::ConfigError;

/// Bounded count of retained ensemble decisions.
const HISTORY_CAPACITY: usize = 1000;

/// Rule for combining detector verdicts into one decision.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum VotingPolicy {
    /// More than half of the responding detectors voted drift.
    Majority,
    /// Every responding detector voted drift.
    Unanimous,
    /// `votes / responders >= threshold`.
    Confidence { threshold: f64 },
    /// Exactly one detector; its verdict passes through.
    Single,
}

impl VotingPolicy {
    /// Parse a policy name from configuration.
    ///
    /// `confidence_threshold` only applies to the `confidence` policy.
    /// Unknown names and out-of-range thresholds fail construction.
    pub fn parse(name: &str, confidence_threshold: f64) -> Result<Self, ConfigError> {
        match name {
            "majority" => Ok(VotingPolicy::Majority),
            "unanimous" => Ok(VotingPolicy::Unanimous),
            "single" => Ok(VotingPolicy::Single),
            "confidence" => {
                if confidence_threshold > 0.0 && confidence_threshold <= 1.0 {
                    Ok(VotingPolicy::Confidence {
                        threshold: confidence_threshold,
                    })
                } else {
                    Err(ConfigError::InvalidValue {
                        field: "ensemble.confidence_threshold",
                        reason: format!("must be in (0, 1], got {confidence_threshold}"),
                    })
                }
            }
            other => Err(ConfigError::UnknownVotingPolicy(other.to_string())),
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            VotingPolicy::Majority => "majority",
            VotingPolicy::Unanimous => "unanimous",
            VotingPolicy::Confidence { .. } => "confidence",
            VotingPolicy::Single => "single",
        }
    }
}

impl std::fmt::Display for VotingPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of one ensemble update.
#[derive(Debug, Clone, Serialize)]
pub struct EnsembleDecision {
    pub timestamp: DateTime<Utc>,
    pub drift_detected: bool,
    /// Detectors that voted drift this call.
    pub votes: usize,
    /// Detectors that produced a verdict this call.
    pub responders: usize,
    /// Per-detector verdicts for this call.
    pub verdicts: BTreeMap<String, bool>,
}

/// Serializable snapshot of the ensemble.
#[derive(Debug, Clone, Serialize)]
pub struct EnsembleStatus {
    pub voting: String,
    pub detectors: BTreeMap<String, DetectorStatus>,
    /// Monotonic per-detector drift vote counters.
    pub vote_counts: BTreeMap<String, u64>,
    pub last_detection_time: Option<DateTime<Utc>>,
    pub decisions_recorded: usize,
}

/// Named collection of drift detectors reduced under one voting policy.
pub struct DriftEnsemble {
    policy: VotingPolicy,
    detectors: BTreeMap<String, Box<dyn DriftDetector>>,
    vote_counts: BTreeMap<String, u64>,
    history: VecDeque<EnsembleDecision>,
    last_detection_time: Option<DateTime<Utc>>,
    single_fallback_warned: bool,
}

impl DriftEnsemble {
    #[must_use]
    pub fn new(policy: VotingPolicy) -> Self {
        Self {
            policy,
            detectors: BTreeMap::new(),
            vote_counts: BTreeMap::new(),
            history: VecDeque::with_capacity(HISTORY_CAPACITY),
            last_detection_time: None,
            single_fallback_warned: false,
        }
    }

    /// Build an ensemble from configuration.
    ///
    /// An unknown voting-policy name or invalid detector parameters fail
    /// construction; this is the intentionally fatal configuration path.
    pub fn from_config(config: &EnsembleConfig) -> Result<Self, ConfigError> {
        let policy = VotingPolicy::parse(&config.voting, config.confidence_threshold)?;
        let mut ensemble = Self::new(policy);

        for entry in &config.detectors {
            entry.config.validate()?;
            let name = entry.effective_name();
            if ensemble.detectors.contains_key(&name) {
                return Err(ConfigError::InvalidValue {
                    field: "ensemble.detectors",
                    reason: format!("duplicate detector name '{name}'"),
                });
            }
            ensemble.add_detector(&name, detector::build(&entry.config));
        }
        Ok(ensemble)
    }

    /// Insert a detector under `name`, replacing any existing one.
    pub fn add_detector(&mut self, name: &str, det: Box<dyn DriftDetector>) {
        if self.detectors.contains_key(name) {
            warn!(detector = name, "Replacing existing detector");
        }
        self.vote_counts.entry(name.to_string()).or_insert(0);
        self.detectors.insert(name.to_string(), det);
    }

    /// Remove a detector by name. Returns whether it existed.
    pub fn remove_detector(&mut self, name: &str) -> bool {
        self.vote_counts.remove(name);
        self.detectors.remove(name).is_some()
    }

    #[must_use]
    pub fn detector_count(&self) -> usize {
        self.detectors.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.detectors.is_empty()
    }

    #[must_use]
    pub fn last_detection_time(&self) -> Option<DateTime<Utc>> {
        self.last_detection_time
    }

    /// The voting policy in effect.
    #[must_use]
    pub fn policy(&self) -> VotingPolicy {
        self.policy
    }

    /// Whether every member currently reports drift.
    ///
    /// Used by the monitor's systemic-misconfiguration check.
    #[must_use]
    pub fn all_positive(&self) -> bool {
        !self.detectors.is_empty() && self.detectors.values().all(|d| d.drift_detected())
    }

    /// Route one sample/error pair to compatible detectors and reduce the
    /// verdicts produced this call.
    pub fn update(&mut self, sample: &Sample, error: Option<f64>) -> EnsembleDecision {
        let mut verdicts = BTreeMap::new();
        let mut votes = 0usize;
        let mut responders = 0usize;

        for (name, det) in &mut self.detectors {
            let input = match det.input() {
                DetectorInput::Value => Some(sample.clone()),
                DetectorInput::Error => error.map(Sample::Scalar),
            };
            let Some(input) = input else {
                continue;
            };

            match det.update(&input) {
                Ok(vote) => {
                    responders += 1;
                    if vote {
                        votes += 1;
                        *self.vote_counts.entry(name.clone()).or_insert(0) += 1;
                    }
                    verdicts.insert(name.clone(), vote);
                }
                Err(e) => {
                    warn!(detector = %name, error = %e, "Detector update failed, vote absent");
                }
            }
        }

        let drift_detected = responders > 0 && self.reduce(votes, responders);
        let decision = EnsembleDecision {
            timestamp: Utc::now(),
            drift_detected,
            votes,
            responders,
            verdicts,
        };

        if drift_detected {
            self.last_detection_time = Some(decision.timestamp);
            debug!(votes, responders, policy = %self.policy, "Ensemble drift decision");
        }

        self.history.push_back(decision.clone());
        while self.history.len() > HISTORY_CAPACITY {
            self.history.pop_front();
        }
        decision
    }

    /// Apply the voting policy to this call's verdicts.
    fn reduce(&mut self, votes: usize, responders: usize) -> bool {
        match self.policy {
            VotingPolicy::Majority => votes * 2 > responders,
            VotingPolicy::Unanimous => votes == responders,
            VotingPolicy::Confidence { threshold } => {
                votes as f64 / responders as f64 >= threshold
            }
            VotingPolicy::Single => {
                if responders == 1 {
                    votes == 1
                } else {
                    if !self.single_fallback_warned {
                        warn!(
                            responders,
                            "Single voting policy with multiple responders, falling back to majority"
                        );
                        self.single_fallback_warned = true;
                    }
                    votes * 2 > responders
                }
            }
        }
    }

    /// Reset every member detector and the ensemble-level state.
    pub fn reset(&mut self) {
        for det in self.detectors.values_mut() {
            det.reset();
        }
        self.history.clear();
        self.last_detection_time = None;
    }

    /// The most recent decisions, oldest first.
    #[must_use]
    pub fn recent_decisions(&self, count: usize) -> Vec<EnsembleDecision> {
        let skip = self.history.len().saturating_sub(count);
        self.history.iter().skip(skip).cloned().collect()
    }

    #[must_use]
    pub fn status(&self) -> EnsembleStatus {
        EnsembleStatus {
            voting: self.policy.as_str().to_string(),
            detectors: self
                .detectors
                .iter()
                .map(|(name, det)| (name.clone(), det.status()))
                .collect(),
            vote_counts: self.vote_counts.clone(),
            last_detection_time: self.last_detection_time,
            decisions_recorded: self.history.len(),
        }
    }
}

impl std::fmt::Debug for DriftEnsemble {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DriftEnsemble")
            .field("policy", &self.policy)
            .field("detectors", &self.detectors.keys().collect::<Vec<_>>())
            .field("last_detection_time", &self.last_detection_time)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detector::AdwinDetector;

    fn reduce(policy: VotingPolicy, votes: usize, responders: usize) -> bool {
        DriftEnsemble::new(policy).reduce(votes, responders)
    }

    #[test]
    fn majority_two_of_three() {
        assert!(reduce(VotingPolicy::Majority, 2, 3));
        assert!(!reduce(VotingPolicy::Majority, 1, 3));
    }

    #[test]
    fn unanimous_requires_all() {
        assert!(!reduce(VotingPolicy::Unanimous, 2, 3));
        assert!(reduce(VotingPolicy::Unanimous, 3, 3));
    }

    #[test]
    fn confidence_thresholds() {
        assert!(!reduce(VotingPolicy::Confidence { threshold: 0.7 }, 2, 3));
        assert!(reduce(VotingPolicy::Confidence { threshold: 0.5 }, 2, 3));
    }

    #[test]
    fn single_passes_through() {
        assert!(reduce(VotingPolicy::Single, 1, 1));
        assert!(!reduce(VotingPolicy::Single, 0, 1));
    }

    #[test]
    fn single_with_many_responders_falls_back_to_majority() {
        assert!(reduce(VotingPolicy::Single, 2, 3));
        assert!(!reduce(VotingPolicy::Single, 1, 3));
    }

    #[test]
    fn parse_rejects_unknown_policy() {
        let err = VotingPolicy::parse("plurality", 0.7).unwrap_err();
        assert!(matches!(err, ConfigError::UnknownVotingPolicy(_)));
    }

    #[test]
    fn parse_rejects_out_of_range_confidence() {
        assert!(VotingPolicy::parse("confidence", 0.0).is_err());
        assert!(VotingPolicy::parse("confidence", 1.5).is_err());
        assert!(VotingPolicy::parse("confidence", 0.7).is_ok());
    }

    #[test]
    fn update_with_no_detectors_is_negative() {
        let mut ensemble = DriftEnsemble::new(VotingPolicy::Majority);
        let decision = ensemble.update(&Sample::Scalar(1.0), None);
        assert!(!decision.drift_detected);
        assert_eq!(decision.responders, 0);
    }

    #[test]
    fn error_detector_skipped_without_error_input() {
        let mut ensemble = DriftEnsemble::new(VotingPolicy::Majority);
        ensemble.add_detector("adwin", Box::new(AdwinDetector::default()));
        ensemble.add_detector("ddm", Box::new(crate::detector::DdmDetector::default()));

        let decision = ensemble.update(&Sample::Scalar(1.0), None);
        assert_eq!(decision.responders, 1);
        assert!(decision.verdicts.contains_key("adwin"));
        assert!(!decision.verdicts.contains_key("ddm"));

        let decision = ensemble.update(&Sample::Scalar(1.0), Some(0.0));
        assert_eq!(decision.responders, 2);
    }

    #[test]
    fn failing_detector_vote_is_absent() {
        let mut ensemble = DriftEnsemble::new(VotingPolicy::Majority);
        ensemble.add_detector("adwin", Box::new(AdwinDetector::default()));

        let decision = ensemble.update(&Sample::Scalar(f64::NAN), None);
        assert_eq!(decision.responders, 0);
        assert!(!decision.drift_detected);
    }

    #[test]
    fn replace_and_remove_detector() {
        let mut ensemble = DriftEnsemble::new(VotingPolicy::Majority);
        ensemble.add_detector("adwin", Box::new(AdwinDetector::default()));
        ensemble.add_detector("adwin", Box::new(AdwinDetector::default()));
        assert_eq!(ensemble.detector_count(), 1);

        assert!(ensemble.remove_detector("adwin"));
        assert!(!ensemble.remove_detector("adwin"));
        assert!(ensemble.is_empty());
    }

    #[test]
    fn vote_counters_are_monotonic() {
        let mut ensemble = DriftEnsemble::new(VotingPolicy::Majority);
        ensemble.add_detector("adwin", Box::new(AdwinDetector::new(0.01, 32, 10)));

        for _ in 0..50 {
            ensemble.update(&Sample::Scalar(0.0), None);
        }
        for _ in 0..50 {
            ensemble.update(&Sample::Scalar(10.0), None);
        }
        let status = ensemble.status();
        assert!(status.vote_counts["adwin"] >= 1);
        assert!(status.last_detection_time.is_some());
    }

    #[test]
    fn reset_clears_members_and_history() {
        let mut ensemble = DriftEnsemble::new(VotingPolicy::Majority);
        ensemble.add_detector("adwin", Box::new(AdwinDetector::new(0.01, 32, 10)));
        for _ in 0..50 {
            ensemble.update(&Sample::Scalar(0.0), None);
        }
        ensemble.reset();
        let status = ensemble.status();
        assert_eq!(status.decisions_recorded, 0);
        assert!(status.last_detection_time.is_none());
        assert_eq!(status.detectors["adwin"].samples_seen, 0);
    }
}
