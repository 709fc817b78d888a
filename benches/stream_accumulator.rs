use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion};
use nalgebra::DVector;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use trackpca::stats::StreamAccumulator;

/// Pre-generated `d`-dimensional samples in [-1, 1).
fn samples(rng: &mut StdRng, n: usize, d: usize) -> Vec<DVector<f64>> {
    (0..n)
        .map(|_| DVector::from_fn(d, |_, _| rng.random_range(-1.0..1.0)))
        .collect()
}

fn bench_add(c: &mut Criterion) {
    let mut rng = StdRng::seed_from_u64(0x5EED);
    let n = 10_000usize;

    for d in [6usize, 12] {
        let data = samples(&mut rng, n, d);
        c.bench_function(&format!("stream_accumulator/add_d{d}"), |b| {
            b.iter_batched(
                || StreamAccumulator::new(d).without_cache(),
                |mut acc| {
                    for x in &data {
                        acc.add(black_box(x)).unwrap();
                    }
                    acc
                },
                BatchSize::SmallInput,
            )
        });
    }
}

fn bench_add_with_covariate(c: &mut Criterion) {
    let mut rng = StdRng::seed_from_u64(0xC0FFEE);
    let n = 10_000usize;
    let features = samples(&mut rng, n, 12);
    let parameters = samples(&mut rng, n, 4);

    c.bench_function("stream_accumulator/add_weighted_covariate_d12_q4", |b| {
        b.iter_batched(
            || StreamAccumulator::new(12).without_cache().with_covariate(4),
            |mut acc| {
                for (x, y) in features.iter().zip(parameters.iter()) {
                    acc.add_weighted(black_box(x), 1.0, Some(black_box(y)))
                        .unwrap();
                }
                acc
            },
            BatchSize::SmallInput,
        )
    });
}

fn bench_quantile(c: &mut Criterion) {
    let mut rng = StdRng::seed_from_u64(0xBEEF);
    let mut acc = StreamAccumulator::new(6).with_capacity(10_000);
    for x in samples(&mut rng, 20_000, 6) {
        acc.add(&x).unwrap();
    }

    c.bench_function("stream_accumulator/quantile_cache10k_d6", |b| {
        b.iter(|| acc.quantile(black_box(0.95)).unwrap())
    });
}

criterion_group!(benches, bench_add, bench_add_with_covariate, bench_quantile);
criterion_main!(benches);
