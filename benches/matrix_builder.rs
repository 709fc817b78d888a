use criterion::{black_box, criterion_group, criterion_main, Criterion};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use trackpca::fit_params::{FitParams, ViewMode};
use trackpca::matrix_builder::build_matrices;
use trackpca::measurements::Measurement;

const RADII: [f64; 6] = [22.5, 35.4, 50.5, 68.6, 88.8, 108.0];

/// Helix-like tracks with uniform stub jitter.
fn tracks(n: usize) -> Vec<Measurement> {
    let mut rng = StdRng::seed_from_u64(0xACE);
    (0..n)
        .map(|_| {
            let inv_pt = rng.random_range(-0.3..0.3);
            let phi0 = rng.random_range(0.8..1.6);
            let cot = rng.random_range(-0.5..0.5);
            let z0 = rng.random_range(-10.0..10.0);
            let phi = std::array::from_fn(|k| {
                phi0 - 0.0057 * RADII[k] * inv_pt + rng.random_range(-2e-4..2e-4)
            });
            let z = std::array::from_fn(|k| z0 + RADII[k] * cot + rng.random_range(-0.1..0.1));
            Measurement::from_arrays(phi, z, inv_pt, phi0, cot, z0)
        })
        .collect()
}

fn bench_pipeline(c: &mut Criterion) {
    let data = tracks(20_000);
    let mut group = c.benchmark_group("matrix_builder");
    group.sample_size(10);

    for (name, view_mode) in [("split", ViewMode::Split), ("combined", ViewMode::Combined)] {
        let params = FitParams::builder()
            .view_mode(view_mode)
            .cache_size(5_000)
            .build()
            .unwrap();
        group.bench_function(format!("build_matrices_20k_{name}"), |b| {
            b.iter(|| build_matrices(black_box(&data), &params).unwrap())
        });
    }
    group.finish();
}

criterion_group!(benches, bench_pipeline);
criterion_main!(benches);
