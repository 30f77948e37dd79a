//! Full battle tick benchmarks.
//!
//! Run with: `cargo bench -p dots_core --bench battle`

// Benchmark binaries don't need docs on macro-generated functions
#![allow(missing_docs)]

use criterion::{black_box, criterion_group, criterion_main, BatchSize, BenchmarkId, Criterion};
use dots_test_utils::fixtures::{run, two_armies, TICK_MS};

fn tick_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("battle_tick");
    group.sample_size(20);

    for per_side in [250, 1_000, 2_500] {
        // Warm up past the opening so dots are aiming and shooting.
        let mut warmed = two_armies(per_side, 25);
        run(&mut warmed, 10);

        group.bench_with_input(BenchmarkId::from_parameter(per_side * 2), &warmed, |b, warmed| {
            b.iter_batched(
                || warmed.clone(),
                |mut battle| black_box(battle.tick(TICK_MS).unwrap()),
                BatchSize::LargeInput,
            );
        });
    }

    group.finish();
}

fn snapshot_benchmark(c: &mut Criterion) {
    let battle = two_armies(1_000, 25);

    c.bench_function("serialize_2000_dots", |b| {
        b.iter(|| black_box(battle.serialize().unwrap()));
    });

    c.bench_function("state_hash_2000_dots", |b| {
        b.iter(|| black_box(battle.state_hash()));
    });
}

criterion_group!(benches, tick_benchmark, snapshot_benchmark);
criterion_main!(benches);
