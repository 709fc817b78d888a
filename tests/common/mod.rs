#![allow(dead_code)]

use std::f64::consts::PI;

use approx::assert_relative_eq;
use nalgebra::DMatrix;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Normal};
use trackpca::measurements::Measurement;

/// Radii of the six barrel layers (cm).
pub const RADII: [f64; 6] = [22.5, 35.4, 50.5, 68.6, 88.8, 108.0];

/// Curvature constant: `phi(r) = phi0 − CURVATURE · r · q/pT`.
pub const CURVATURE: f64 = 0.0057;

#[derive(Debug, Clone, Copy)]
pub struct TrackModel {
    pub phi_resolution: f64,
    pub z_resolution: f64,
    /// Fraction of events with one stub displaced by `outlier_shift`.
    pub outlier_fraction: f64,
    pub outlier_shift: f64,
}

impl Default for TrackModel {
    fn default() -> Self {
        TrackModel {
            phi_resolution: 1e-4,
            z_resolution: 0.05,
            outlier_fraction: 0.0,
            outlier_shift: 0.0,
        }
    }
}

/// Noiseless stubs of a track.
pub fn ideal_measurement(inv_pt: f64, phi0: f64, cot_theta: f64, z0: f64) -> Measurement {
    let phi = std::array::from_fn(|k| phi0 - CURVATURE * RADII[k] * inv_pt);
    let z = std::array::from_fn(|k| z0 + RADII[k] * cot_theta);
    Measurement::from_arrays(phi, z, inv_pt, phi0, cot_theta, z0)
}

/// `n` reproducible tracks, with Gaussian stub resolution and optional outliers.
pub fn generate_tracks(n: usize, seed: u64, model: TrackModel) -> Vec<Measurement> {
    let mut rng = StdRng::seed_from_u64(seed);
    let phi_noise = Normal::new(0.0, model.phi_resolution).unwrap();
    let z_noise = Normal::new(0.0, model.z_resolution).unwrap();
    let vertex = Normal::new(0.0, 5.0).unwrap();

    (0..n)
        .map(|_| {
            let inv_pt = rng.random_range(-0.3..0.3);
            let phi0 = rng.random_range(PI / 4.0..PI / 2.0);
            let cot_theta = rng.random_range(-0.5..0.5);
            let z0 = vertex.sample(&mut rng);

            let mut m = ideal_measurement(inv_pt, phi0, cot_theta, z0);
            for k in 0..6 {
                m.transverse.features[k] += phi_noise.sample(&mut rng);
                m.longitudinal.features[k] += z_noise.sample(&mut rng);
            }
            if rng.random::<f64>() < model.outlier_fraction {
                let layer = rng.random_range(0..6);
                let sign = if rng.random::<bool>() { 1.0 } else { -1.0 };
                m.transverse.features[layer] += sign * model.outlier_shift;
            }
            m
        })
        .collect()
}

/// Same track stream with the transverse view copied into the longitudinal one.
pub fn mirrored_views(tracks: &[Measurement]) -> Vec<Measurement> {
    tracks
        .iter()
        .map(|m| {
            let mut mirrored = m.clone();
            mirrored.longitudinal = m.transverse.clone();
            mirrored
        })
        .collect()
}

pub fn assert_matrix_close(actual: &DMatrix<f64>, expected: &DMatrix<f64>, epsilon: f64) {
    assert_eq!(actual.shape(), expected.shape());
    assert_relative_eq!(actual, expected, epsilon = epsilon);
}
