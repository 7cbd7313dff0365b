//! End-to-end EM scenarios on small crowd data sets.

use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use bscem_core::dist::{Beta, Dist};
use bscem_core::engine::em::{EmConfig, Stage, NOISE_RATE_FLOOR};
use bscem_core::model::multiple_bsc::MultipleBscModel;
use bscem_core::model::multiple_bsc_pair::MultipleBscPairModel;

fn assert_close(actual: f64, expected: f64, tol: f64, label: &str) {
    assert!(
        (actual - expected).abs() <= tol,
        "{} mismatch: expected {:.15}, got {:.15}, diff={:.3e}",
        label,
        expected,
        actual,
        (actual - expected).abs()
    );
}

fn three_channel_model(soft: bool) -> MultipleBscModel {
    let mut model = MultipleBscModel::new();
    model.set_soft_inputs(soft);
    for w in ["w1", "w2", "w3"] {
        model.add_channel(w, 1e-3).unwrap();
    }
    model.add_observation("q", "w1", true).unwrap();
    model.add_observation("q", "w2", true).unwrap();
    model.add_observation("q", "w3", false).unwrap();
    model
}

#[test]
fn dissenting_channel_absorbs_the_noise() {
    for soft in [true, false] {
        let mut model = three_channel_model(soft);
        let diagnostics = model.em(&EmConfig::new(50, 1e-6), |_, _, _| {}).unwrap();

        assert!(diagnostics.converged, "soft={soft}: {diagnostics:?}");
        assert!(diagnostics.final_score >= diagnostics.initial_score);
        let rates = model.noise_rates();
        assert!(rates["w1"] < 0.01, "w1 = {}", rates["w1"]);
        assert!(rates["w2"] < 0.01, "w2 = {}", rates["w2"]);
        assert!(rates["w3"] > 0.3, "w3 = {}", rates["w3"]);
        assert!(model.input_scores()["q"] > 0.5);
        assert_eq!(model.input_value("q"), Some(true));
    }
}

#[test]
fn lone_observations_keep_rates_at_floor() {
    let mut model = MultipleBscModel::new();
    for i in 0..8 {
        let worker = format!("w{i}");
        model.add_channel(&worker, NOISE_RATE_FLOOR).unwrap();
        model
            .add_observation(&format!("q{i}"), &worker, i % 2 == 0)
            .unwrap();
    }
    model.add_input("unjudged");

    model.em(&EmConfig::new(20, 1e-9), |_, _, _| {}).unwrap();

    for (worker, rate) in model.noise_rates() {
        assert_close(rate, NOISE_RATE_FLOOR, 1e-9, &worker);
    }
    for i in 0..8 {
        assert_eq!(model.input_value(&format!("q{i}")), Some(i % 2 == 0));
    }
    assert_eq!(model.input_scores()["unjudged"], 0.5);
}

#[test]
fn callback_sees_initial_rounds_and_final() {
    let mut model = three_channel_model(true);
    let mut seen = Vec::new();
    let diagnostics = model
        .em(&EmConfig::new(3, 1e-12), |m, round, stage| {
            seen.push((round, stage, m.score()))
        })
        .unwrap();

    assert_eq!(seen.first().map(|s| (s.0, s.1)), Some((0, Stage::Initial)));
    assert_eq!(seen.last().map(|s| (s.0, s.1)), Some((0, Stage::Final)));
    let inputs = seen.iter().filter(|s| s.1 == Stage::Input).count();
    assert_eq!(inputs, diagnostics.rounds_run);
    let noise = seen.iter().filter(|s| s.1 == Stage::Noise).count();
    assert_eq!(noise, diagnostics.noise_rounds_run);
    assert!(diagnostics.rounds_run <= 3);
}

#[test]
fn cancelled_training_still_records_scores() {
    let mut model = three_channel_model(true);
    let flag = Arc::new(AtomicBool::new(true));
    let config = EmConfig::new(0, 1e-3).with_cancel(flag);
    let diagnostics = model.em(&config, |_, _, _| {}).unwrap();

    assert!(diagnostics.cancelled);
    assert_eq!(diagnostics.rounds_run, 0);
    assert!(!diagnostics.converged);
    assert!(model.input_scores().contains_key("q"));
}

#[test]
fn empirical_prior_is_refit_from_rates() {
    let mut model = MultipleBscModel::new();
    model.set_soft_inputs(false);
    let workers = ["w1", "w2", "w3", "w4"];
    for w in workers {
        model.add_channel(w, 0.1).unwrap();
    }
    model.enable_noise_prior(2.0, 8.0, true).unwrap();
    let answers = [
        ("a", [true, true, true, false]),
        ("b", [false, false, true, false]),
        ("c", [true, true, false, false]),
        ("d", [false, false, false, true]),
    ];
    for (q, votes) in answers {
        for (w, v) in workers.iter().zip(votes) {
            model.add_observation(q, w, v).unwrap();
        }
    }

    let mut refits = 0;
    let diagnostics = model
        .em(&EmConfig::new(5, 1e-9), |_, _, stage| {
            if stage == Stage::Beta {
                refits += 1;
            }
        })
        .unwrap();

    assert!(refits >= 1);
    assert!(diagnostics.final_score.is_finite(), "{diagnostics:?}");
    let prior = model.noise_prior().unwrap();
    assert_ne!(prior, Beta::new(2.0, 8.0));
    assert!(prior.alpha.is_finite() && prior.beta.is_finite());

    // Rates differ across workers, so the last refit is a method-of-moments
    // fit whose mean is the mean of the rates.
    let rates: Vec<f64> = model.noise_rates().into_values().collect();
    for rate in &rates {
        assert!((NOISE_RATE_FLOOR..=1.0 - NOISE_RATE_FLOOR).contains(rate));
    }
    let mean = rates.iter().sum::<f64>() / rates.len() as f64;
    assert_close(prior.mean(), mean, 1e-9, "prior mean");
}

#[test]
fn equal_rates_leave_the_prior_in_place() {
    // One agreeing observation per worker: every rate settles on the same
    // posterior mode, which method of moments cannot fit.
    for workers in 2..8 {
        let mut model = MultipleBscModel::new();
        model.set_soft_inputs(false);
        for i in 0..workers {
            let worker = format!("w{i}");
            model.add_channel(&worker, 0.1).unwrap();
            model.add_observation(&format!("q{i}"), &worker, true).unwrap();
        }
        model.enable_noise_prior(2.0, 8.0, true).unwrap();

        let diagnostics = model.em(&EmConfig::new(10, 1e-9), |_, _, _| {}).unwrap();

        assert!(diagnostics.final_score.is_finite(), "{workers} workers: {diagnostics:?}");
        assert!(diagnostics.final_delta.is_finite());
        assert_eq!(model.noise_prior(), Some(Beta::new(2.0, 8.0)));
        // Posterior mode (0 + 2 - 1) / (1 + 2 + 8 - 2).
        for rate in model.noise_rates().values() {
            assert_close(*rate, 1.0 / 9.0, 1e-12, "rate");
        }
    }
}

#[test]
fn pair_model_splits_evenly_on_a_tie() {
    let mut model = MultipleBscPairModel::new();
    model.add_channel("task", 0.1, "w1", 0.2).unwrap();
    model.add_channel("task", 0.1, "w2", 0.2).unwrap();
    model.add_observation("q", "task", "w1", true).unwrap();
    model.add_observation("q", "task", "w2", false).unwrap();

    let mut stages = Vec::new();
    model
        .em(&EmConfig::new(2, 1e-9), |_, round, stage| {
            stages.push((round, stage))
        })
        .unwrap();

    assert_eq!(model.input_scores()["q"], 0.5);
    let layer2 = model.noise2_rates();
    assert_eq!(layer2["w1"], layer2["w2"]);
    assert_eq!(model.noise1_rates().len(), 1);
    assert!(stages.contains(&(1, Stage::Noise1)));
    assert!(stages.contains(&(1, Stage::Noise2)));
}

#[test]
fn pair_model_shares_layers_by_name() {
    let mut model = MultipleBscPairModel::new();
    model.add_channel("q1", 0.05, "w", 0.2).unwrap();
    model.add_channel("q2", 0.05, "w", 0.4).unwrap();
    assert!(model.has_channel("q1", "w"));
    assert!(model.has_channel("q2", "w"));
    assert!(!model.has_channel("q1", "v"));
    assert_eq!(model.noise2_rates()["w"], 0.2);
    assert!(model.add_observation("q", "q3", "w", true).is_err());
}
