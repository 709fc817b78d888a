//! # Least-squares solver
//!
//! Minimum-norm least-squares solution of `A · X ≈ B` through the singular
//! value decomposition, with the same relative cut-off on small singular
//! values as LAPACK's `gelsd` driver:
//!
//! ```text
//! σ_i is kept  ⇔  σ_i > ε · max(m, n) · σ_max
//! ```
//!
//! Rank-deficient or ill-conditioned systems never fail: the dropped
//! directions simply do not contribute to the solution.
//!
//! ## Principal-component regression
//! -----------------
//! The regression of parameters on features is carried out in the
//! principal-component space of the features. With `pc = B · (x − μ)` and
//! one accumulator tracking `pc` together with the parameter vector as
//! covariate, the normal equations are
//!
//! ```text
//! Cov(pc) · X = Cov(pc, par)        D_pc = Xᵗ        D = D_pc · B
//! ```
//!
//! so that `D · x` estimates the parameters directly from the features.
use log::{debug, warn};
use nalgebra::{DMatrix, DVector};

use crate::accumulate::SpaceAccumulation;
use crate::constants::CoefficientMatrix;
use crate::eigen_basis::EigenBasis;
use crate::space_fit::{FitStage, SpaceFit};
use crate::stats::StreamAccumulator;
use crate::trackpca_errors::TrackPcaError;

/// Output of [`solve_least_squares`].
#[derive(Debug, Clone, PartialEq)]
pub struct LeastSquaresSolution {
    /// `n × k` minimum-norm solution.
    pub solution: DMatrix<f64>,
    /// Sum of squared residuals `‖A·x_j − b_j‖²` of each column `j`.
    pub residuals: DVector<f64>,
    /// Number of singular values above the cut-off.
    pub rank: usize,
}

/// Solve `a · X ≈ b` in the least-squares sense.
///
/// Arguments
/// -----------------
/// * `a`: `m × n` system matrix.
/// * `b`: `m × k` right-hand sides.
///
/// Return
/// ----------
/// * `Ok(LeastSquaresSolution)` – the minimum-norm solution, per-column residuals and rank.
/// * `Err(TrackPcaError::DimensionMismatch)` if `a` and `b` do not have the same row count.
pub fn solve_least_squares(
    a: &DMatrix<f64>,
    b: &DMatrix<f64>,
) -> Result<LeastSquaresSolution, TrackPcaError> {
    let (m, n) = a.shape();
    if b.nrows() != m {
        return Err(TrackPcaError::DimensionMismatch {
            what: "least-squares right-hand side",
            expected: m,
            found: b.nrows(),
        });
    }

    let svd = a.clone().svd(true, true);
    let sigma_max = svd.singular_values.iter().copied().fold(0.0, f64::max);
    let cutoff = f64::EPSILON * m.max(n) as f64 * sigma_max;
    let rank = svd.singular_values.iter().filter(|s| **s > cutoff).count();

    let solution = svd
        .solve(b, cutoff)
        .map_err(|e| TrackPcaError::LinearSolver(e.to_string()))?;

    let misfit = a * &solution - b;
    let residuals = DVector::from_iterator(
        misfit.ncols(),
        misfit.column_iter().map(|c| c.norm_squared()),
    );

    Ok(LeastSquaresSolution {
        solution,
        residuals,
        rank,
    })
}

/// Solve the principal-component normal equations and map the solution back to feature space.
///
/// Arguments
/// -----------------
/// * `pc_stats`: accumulator of principal components with the parameters as covariate.
/// * `projection`: basis the principal components were projected with (rows are eigenvectors).
///
/// Return
/// ----------
/// * `Ok((D, solution))` – the feature-space coefficient matrix and the raw
///   principal-component solution.
pub(crate) fn solve_coefficients(
    pc_stats: &StreamAccumulator,
    projection: &DMatrix<f64>,
) -> Result<(CoefficientMatrix, LeastSquaresSolution), TrackPcaError> {
    let a = pc_stats.auto_covariance()?;
    let b = pc_stats.covariance()?;
    let solution = solve_least_squares(&a, &b)?;
    if solution.rank < a.nrows() {
        warn!(
            "principal-component covariance is rank deficient: rank {} of {}",
            solution.rank,
            a.nrows()
        );
    }
    let coefficients = solution.solution.transpose() * projection;
    Ok((coefficients, solution))
}

/// Initial, unweighted fit of one feature space.
///
/// The eigenbasis is computed from the full-sample feature covariance, and
/// every retained sample is projected with the final full-sample mean.
///
/// Arguments
/// -----------------
/// * `accumulation`: Stage 1 output of the feature space.
///
/// Return
/// ----------
/// * `Ok(SpaceFit)` in stage [`FitStage::Fitted`].
/// * `Err(TrackPcaError::EmptyAccumulator)` if no sample was accumulated.
///
/// See also
/// ------------
/// * [`refine`](crate::robust::refine) – robust refinement of the returned fit.
pub fn fit_space(accumulation: &SpaceAccumulation) -> Result<SpaceFit, TrackPcaError> {
    let space = accumulation.space;
    let feature_mean = accumulation.feature_stats.mean()?;
    let eigen = EigenBasis::from_covariance(&accumulation.feature_stats.auto_covariance()?)?;

    let mut pc_stats = StreamAccumulator::new(space.n_variables())
        .without_cache()
        .with_covariate(space.n_parameters());
    for sample in &accumulation.samples {
        let pc = eigen.project(&sample.features, &feature_mean);
        pc_stats.add_weighted(&pc, 1.0, Some(&sample.parameters))?;
    }

    let (coefficients, solution) = solve_coefficients(&pc_stats, &eigen.basis)?;
    debug!(
        "{space} initial fit: rank {}, residuals {:?}",
        solution.rank,
        solution.residuals.as_slice()
    );

    Ok(SpaceFit {
        space,
        stage: FitStage::Fitted,
        eigen,
        feature_mean,
        parameter_mean: accumulation.parameter_stats.mean()?,
        weight_sum: accumulation.feature_stats.count(),
        coefficients,
        lstsq_residuals: solution.residuals,
        rank: solution.rank,
    })
}
