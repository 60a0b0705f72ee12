//! Stream-level properties of the drift detectors: stability under
//! stationary input, detection after sharp shifts, and the documented
//! detection-latency scenarios.

use driftlord::detector::{
    AdwinDetector, DdmDetector, DriftDetector, EddmDetector, PageHinkleyDetector, Sample,
    StatisticalDetector,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Uniform noise around `mean` with the given half-width.
fn noisy(rng: &mut StdRng, mean: f64, spread: f64) -> f64 {
    mean + (rng.gen::<f64>() - 0.5) * 2.0 * spread
}

#[test]
fn adwin_stable_stream_never_fires_across_seeds() {
    for seed in [1u64, 7, 42, 99, 1234] {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut adwin = AdwinDetector::default();
        for _ in 0..500 {
            let fired = adwin.update(&Sample::Scalar(noisy(&mut rng, 1.0, 0.05))).unwrap();
            assert!(!fired, "spurious ADWIN drift with seed {seed}");
        }
    }
}

#[test]
fn page_hinkley_stable_stream_never_fires_across_seeds() {
    for seed in [1u64, 7, 42, 99, 1234] {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut ph = PageHinkleyDetector::default();
        for _ in 0..500 {
            let fired = ph.update(&Sample::Scalar(noisy(&mut rng, 1.0, 0.05))).unwrap();
            assert!(!fired, "spurious Page-Hinkley drift with seed {seed}");
        }
    }
}

#[test]
fn statistical_stable_stream_never_fires_across_seeds() {
    for seed in [1u64, 7, 42, 99, 1234] {
        let mut rng = StdRng::seed_from_u64(seed);
        // Tight threshold: stationary windows should stay far above it.
        let mut detector = StatisticalDetector::new(50, 0.0001);
        for _ in 0..500 {
            let fired = detector
                .update(&Sample::Scalar(noisy(&mut rng, 1.0, 0.05)))
                .unwrap();
            assert!(!fired, "spurious KS drift with seed {seed}");
        }
    }
}

#[test]
fn ddm_steady_error_rate_never_fires() {
    let mut ddm = DdmDetector::default();
    for i in 0..500 {
        let error = if i % 5 == 0 { 1.0 } else { 0.0 };
        let fired = ddm.update(&Sample::Scalar(error)).unwrap();
        assert!(!fired, "spurious DDM drift at sample {i}");
    }
}

#[test]
fn eddm_steady_error_spacing_never_fires() {
    let mut eddm = EddmDetector::default();
    for i in 0..2000 {
        let error = if i % 10 == 0 { 1.0 } else { 0.0 };
        let fired = eddm.update(&Sample::Scalar(error)).unwrap();
        assert!(!fired, "spurious EDDM drift at sample {i}");
    }
}

#[test]
fn adwin_detects_sharp_mean_shift() {
    let mut rng = StdRng::seed_from_u64(7);
    let mut adwin = AdwinDetector::default();
    for _ in 0..200 {
        adwin.update(&Sample::Scalar(noisy(&mut rng, 1.0, 0.05))).unwrap();
    }
    let mut fired = false;
    for _ in 0..100 {
        fired |= adwin.update(&Sample::Scalar(noisy(&mut rng, 3.0, 0.05))).unwrap();
    }
    assert!(fired, "ADWIN missed a 40-sigma mean shift");
}

#[test]
fn page_hinkley_detects_sharp_mean_shift() {
    let mut rng = StdRng::seed_from_u64(7);
    let mut ph = PageHinkleyDetector::new(0.005, 10.0, 30);
    for _ in 0..200 {
        ph.update(&Sample::Scalar(noisy(&mut rng, 1.0, 0.05))).unwrap();
    }
    let mut fired = false;
    for _ in 0..100 {
        fired |= ph.update(&Sample::Scalar(noisy(&mut rng, 3.0, 0.05))).unwrap();
    }
    assert!(fired, "Page-Hinkley missed a 40-sigma mean shift");
}

#[test]
fn statistical_detects_sharp_mean_shift() {
    let mut rng = StdRng::seed_from_u64(7);
    let mut detector = StatisticalDetector::new(30, 0.05);
    for _ in 0..120 {
        detector
            .update(&Sample::Scalar(noisy(&mut rng, 1.0, 0.05)))
            .unwrap();
    }
    let mut fired = false;
    for _ in 0..90 {
        fired |= detector
            .update(&Sample::Scalar(noisy(&mut rng, 3.0, 0.05)))
            .unwrap();
    }
    assert!(fired, "KS detector missed a 40-sigma mean shift");
}

#[test]
fn ddm_detects_error_burst() {
    let mut ddm = DdmDetector::default();
    for i in 0..200 {
        let error = if i % 10 == 0 { 1.0 } else { 0.0 };
        ddm.update(&Sample::Scalar(error)).unwrap();
    }
    let mut fired = false;
    for _ in 0..100 {
        fired |= ddm.update(&Sample::Scalar(1.0)).unwrap();
    }
    assert!(fired, "DDM missed an error-rate explosion");
}

// ADWIN at delta=0.01 fed 30 low samples then high samples must flag
// before the 80th total sample.
#[test]
fn adwin_scenario_flags_before_eightieth_sample() {
    let mut rng = StdRng::seed_from_u64(21);
    let mut adwin = AdwinDetector::new(0.01, 32, 30);

    let mut total = 0;
    for _ in 0..30 {
        adwin.update(&Sample::Scalar(noisy(&mut rng, 1.0, 0.05))).unwrap();
        total += 1;
    }
    let mut fired_at = None;
    for _ in 0..50 {
        total += 1;
        if adwin.update(&Sample::Scalar(noisy(&mut rng, 10.0, 0.05))).unwrap() {
            fired_at = Some(total);
            break;
        }
    }
    let fired_at = fired_at.expect("ADWIN never fired");
    assert!(fired_at < 80, "ADWIN fired too late, at sample {fired_at}");
}

// DDM with a 1.5-sigma drift band: 20 clean samples then pure errors must
// flag within 20 error samples.
#[test]
fn ddm_scenario_flags_within_twenty_error_samples() {
    let mut ddm = DdmDetector::new(1.0, 1.5, 30);
    for _ in 0..20 {
        ddm.update(&Sample::Scalar(0.0)).unwrap();
    }
    let mut fired_after = None;
    for i in 1..=20 {
        if ddm.update(&Sample::Scalar(1.0)).unwrap() {
            fired_after = Some(i);
            break;
        }
    }
    let fired_after = fired_after.expect("DDM never fired");
    assert!(fired_after <= 20);
}

#[test]
fn reset_restores_initial_state_for_every_detector() {
    let mut detectors: Vec<Box<dyn DriftDetector>> = vec![
        Box::new(AdwinDetector::default()),
        Box::new(DdmDetector::default()),
        Box::new(EddmDetector::default()),
        Box::new(PageHinkleyDetector::default()),
        Box::new(StatisticalDetector::default()),
    ];

    let mut rng = StdRng::seed_from_u64(3);
    for detector in &mut detectors {
        for i in 0..300 {
            let value = if i < 150 {
                noisy(&mut rng, 1.0, 0.05)
            } else {
                // Errors for the error-based members, a shifted regime
                // for the value-based ones.
                1.0
            };
            detector.update(&Sample::Scalar(value)).unwrap();
        }

        detector.reset();
        detector.reset();

        assert_eq!(detector.samples_seen(), 0, "{}", detector.kind());
        assert!(!detector.drift_detected(), "{}", detector.kind());
        assert!(detector.last_drift_time().is_none(), "{}", detector.kind());
    }
}
