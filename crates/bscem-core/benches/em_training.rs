//! Benchmarks for EM training on simulated crowd judgments.
//!
//! Run with:
//! - `cargo bench --bench em_training`
//! - `cargo bench --bench em_training --features parallel`

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use bscem_core::engine::em::EmConfig;
use bscem_core::model::multiple_bsc::MultipleBscModel;
use bscem_core::model::multiple_bsc_pair::MultipleBscPairModel;

const WORKERS: usize = 20;
const JUDGMENTS_PER_ITEM: usize = 5;

/// Items with random truth, each judged by a few workers of varying quality.
fn make_single_model(items: usize, seed: u64, soft: bool) -> MultipleBscModel {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut model = MultipleBscModel::new();
    model.set_soft_inputs(soft);
    let rates: Vec<f64> = (0..WORKERS).map(|_| rng.gen_range(0.05..0.45)).collect();
    for w in 0..WORKERS {
        model.add_channel(&format!("w{w}"), 0.2).unwrap();
    }
    for q in 0..items {
        let truth = rng.gen_bool(0.5);
        for _ in 0..JUDGMENTS_PER_ITEM {
            let w = rng.gen_range(0..WORKERS);
            let answer = truth ^ rng.gen_bool(rates[w]);
            model
                .add_observation(&format!("q{q}"), &format!("w{w}"), answer)
                .unwrap();
        }
    }
    model
}

fn make_pair_model(items: usize, seed: u64) -> MultipleBscPairModel {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut model = MultipleBscPairModel::new();
    let rates: Vec<f64> = (0..WORKERS).map(|_| rng.gen_range(0.05..0.45)).collect();
    for w in 0..WORKERS {
        model
            .add_channel(&format!("w{w}"), 0.2, "task", 0.1)
            .unwrap();
    }
    for q in 0..items {
        let truth = rng.gen_bool(0.5);
        for _ in 0..JUDGMENTS_PER_ITEM {
            let w = rng.gen_range(0..WORKERS);
            let answer = truth ^ rng.gen_bool(rates[w]) ^ rng.gen_bool(0.1);
            model
                .add_observation(&format!("q{q}"), &format!("w{w}"), "task", answer)
                .unwrap();
        }
    }
    model
}

fn bench_single_layer(c: &mut Criterion) {
    let mut group = c.benchmark_group("multiple_bsc_em");
    let config = EmConfig::new(20, 1e-6);
    for items in [100_usize, 1000, 5000] {
        for (label, soft) in [("soft", true), ("hard", false)] {
            let model = make_single_model(items, items as u64, soft);
            group.bench_with_input(BenchmarkId::new(label, items), &model, |b, model| {
                b.iter(|| {
                    let mut model = model.clone();
                    black_box(model.em(&config, |_, _, _| {}).unwrap())
                });
            });
        }
    }
    group.finish();
}

fn bench_pair_layer(c: &mut Criterion) {
    let mut group = c.benchmark_group("multiple_bsc_pair_em");
    let config = EmConfig::new(20, 1e-6);
    for items in [100_usize, 1000] {
        let model = make_pair_model(items, items as u64);
        group.bench_with_input(BenchmarkId::new("soft", items), &model, |b, model| {
            b.iter(|| {
                let mut model = model.clone();
                black_box(model.em(&config, |_, _, _| {}).unwrap())
            });
        });
    }
    group.finish();
}

criterion_group!(benches, bench_single_layer, bench_pair_layer);
criterion_main!(benches);
