//! Criterion benchmarks for full turns through the core pipeline.

use std::hint::black_box;

use criterion::{criterion_group, criterion_main, BatchSize, Criterion};
use phylon_bench::{reference_profile, stress_profile};

fn bench_turn_200(c: &mut Criterion) {
    c.bench_function("turn_200_species", |b| {
        b.iter_batched(
            || reference_profile(42),
            |mut p| {
                let outcome = p.session.run_turn(p.inputs).unwrap();
                black_box(outcome);
            },
            BatchSize::SmallInput,
        );
    });
}

fn bench_turn_2000(c: &mut Criterion) {
    c.bench_function("turn_2000_species", |b| {
        b.iter_batched(
            || stress_profile(42),
            |mut p| {
                let outcome = p.session.run_turn(p.inputs).unwrap();
                black_box(outcome);
            },
            BatchSize::LargeInput,
        );
    });
}

fn bench_ten_turns_200(c: &mut Criterion) {
    c.bench_function("ten_turns_200_species", |b| {
        b.iter(|| {
            let mut p = reference_profile(42);
            for _ in 0..10 {
                let outcome = p.session.run_turn(p.inputs.clone()).unwrap();
                black_box(&outcome);
            }
        });
    });
}

criterion_group!(benches, bench_turn_200, bench_turn_2000, bench_ten_turns_200);
criterion_main!(benches);
