//! Ensemble voting and dispatch behavior over scripted detectors.

use driftlord::config::EnsembleConfig;
use driftlord::detector::{DdmDetector, Sample};
use driftlord::ensemble::{DriftEnsemble, VotingPolicy};
use driftlord::error::{ConfigError, Error};
use driftlord::testkit::ScriptedDetector;

fn two_yes_one_no(policy: VotingPolicy) -> DriftEnsemble {
    let mut ensemble = DriftEnsemble::new(policy);
    ensemble.add_detector("yes-a", Box::new(ScriptedDetector::always(true)));
    ensemble.add_detector("yes-b", Box::new(ScriptedDetector::always(true)));
    ensemble.add_detector("no-c", Box::new(ScriptedDetector::always(false)));
    ensemble
}

#[test]
fn majority_carries_two_of_three() {
    let mut ensemble = two_yes_one_no(VotingPolicy::Majority);
    let decision = ensemble.update(&Sample::Scalar(1.0), None);
    assert_eq!(decision.votes, 2);
    assert_eq!(decision.responders, 3);
    assert!(decision.drift_detected);
}

#[test]
fn unanimous_rejects_two_of_three() {
    let mut ensemble = two_yes_one_no(VotingPolicy::Unanimous);
    assert!(!ensemble.update(&Sample::Scalar(1.0), None).drift_detected);
}

#[test]
fn confidence_point_seven_rejects_two_of_three() {
    let mut ensemble = two_yes_one_no(VotingPolicy::Confidence { threshold: 0.7 });
    assert!(!ensemble.update(&Sample::Scalar(1.0), None).drift_detected);
}

#[test]
fn confidence_point_five_carries_two_of_three() {
    let mut ensemble = two_yes_one_no(VotingPolicy::Confidence { threshold: 0.5 });
    assert!(ensemble.update(&Sample::Scalar(1.0), None).drift_detected);
}

#[test]
fn error_based_detector_skipped_when_no_error_supplied() {
    let mut ensemble = DriftEnsemble::new(VotingPolicy::Unanimous);
    ensemble.add_detector("value", Box::new(ScriptedDetector::always(true)));
    ensemble.add_detector("error", Box::new(ScriptedDetector::always(false).on_errors()));

    // Without an error signal only the value detector responds, and it
    // alone carries a unanimous vote.
    let decision = ensemble.update(&Sample::Scalar(1.0), None);
    assert_eq!(decision.responders, 1);
    assert!(decision.drift_detected);

    // With the error signal present, the dissenting detector responds
    // and unanimity is gone.
    let decision = ensemble.update(&Sample::Scalar(1.0), Some(0.0));
    assert_eq!(decision.responders, 2);
    assert!(!decision.drift_detected);
}

#[test]
fn faulty_detector_does_not_poison_the_rest() {
    let mut ensemble = DriftEnsemble::new(VotingPolicy::Majority);
    ensemble.add_detector("value", Box::new(ScriptedDetector::always(true)));
    ensemble.add_detector("error-rate", Box::new(DdmDetector::default()));

    // A NaN sample breaks the value detector for this call; the
    // error-based member still responds.
    let decision = ensemble.update(&Sample::Scalar(f64::NAN), Some(0.0));
    assert_eq!(decision.responders, 1);
    assert!(decision.verdicts.contains_key("error-rate"));
    assert!(!decision.verdicts.contains_key("value"));

    // The broken call leaves the healthy detector functional.
    let decision = ensemble.update(&Sample::Scalar(1.0), Some(0.0));
    assert_eq!(decision.responders, 2);
}

#[test]
fn from_config_rejects_unknown_policy() {
    let config: EnsembleConfig = toml::from_str("voting = \"plurality\"").unwrap();
    let err = DriftEnsemble::from_config(&config).unwrap_err();
    assert!(matches!(err, ConfigError::UnknownVotingPolicy(_)));
}

#[test]
fn from_config_builds_named_detectors() {
    let config: EnsembleConfig = toml::from_str(
        r#"
        voting = "majority"

        [[detectors]]
        kind = "adwin"

        [[detectors]]
        kind = "ddm"
        name = "error-rate"
        "#,
    )
    .unwrap();
    let ensemble = DriftEnsemble::from_config(&config).unwrap();
    assert_eq!(ensemble.detector_count(), 2);

    let status = ensemble.status();
    assert!(status.detectors.contains_key("adwin"));
    assert!(status.detectors.contains_key("error-rate"));
}

#[test]
fn from_config_rejects_duplicate_names() {
    let config: EnsembleConfig = toml::from_str(
        r#"
        voting = "majority"

        [[detectors]]
        kind = "adwin"

        [[detectors]]
        kind = "adwin"
        "#,
    )
    .unwrap();
    assert!(DriftEnsemble::from_config(&config).is_err());
}

#[test]
fn config_load_error_converts_into_crate_error() {
    let config: EnsembleConfig = toml::from_str("voting = \"plurality\"").unwrap();
    let err: Error = DriftEnsemble::from_config(&config).unwrap_err().into();
    assert!(matches!(err, Error::Config(_)));
}
