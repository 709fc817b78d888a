//! # Robust refinement (IRLS)
//!
//! A fixed number of iteratively reweighted least-squares trials, each one a
//! pure function of the previous [`SpaceFit`] and of the retained samples.
//! One trial:
//!
//! 1. residuals `D·x − par` of the first `cache_size` samples give the robust
//!    thresholds ([`RobustThresholds`]):
//!    `scale = median(|r|) / 0.6745 × 4.685` and `cut = q_0.90(|r|)`;
//! 2. every retained sample gets a weight ([`RobustMode`]):
//!    * `Trim` – `0` if any `|r_i| ≥ cut_i`, `1` otherwise,
//!    * `Reweight` – Tukey bisquare `(1 − u²)²` with `u = |r_0| / scale_0`;
//! 3. weighted feature and parameter moments are accumulated, each sample is
//!    projected with the running feature mean and regressed on its parameters;
//! 4. a new eigenbasis is computed from the weighted feature covariance.
//!
//! The coefficient matrix is composed with the basis the samples were
//! projected with (the incoming one); the refreshed basis is carried to the
//! next trial.
use std::fmt;

use log::{debug, info};
use nalgebra::DVector;

use crate::eigen_basis::EigenBasis;
use crate::feature_space::Sample;
use crate::fit_params::{FitParams, RobustMode};
use crate::least_squares::solve_coefficients;
use crate::space_fit::SpaceFit;
use crate::stats::StreamAccumulator;
use crate::trackpca_errors::TrackPcaError;

/// Robust scale and trimming cut of one trial, one value per parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct RobustThresholds {
    pub scale: DVector<f64>,
    pub cut: DVector<f64>,
}

impl RobustThresholds {
    /// Estimate the thresholds from the absolute residuals of the first `cache_size` samples.
    pub fn estimate(
        fit: &SpaceFit,
        samples: &[Sample],
        params: &FitParams,
    ) -> Result<Self, TrackPcaError> {
        let mut abs_residuals =
            StreamAccumulator::new(fit.space.n_parameters()).with_capacity(params.cache_size);
        for sample in samples.iter().take(params.cache_size) {
            abs_residuals.add(&fit.residual(sample)?.abs())?;
        }

        let median = abs_residuals.quantile(0.5)?;
        Ok(RobustThresholds {
            scale: median / params.mad_normalization * params.bisquare_tuning,
            cut: abs_residuals.quantile(params.trim_quantile)?,
        })
    }

    /// Weight of a sample with signed residual `residual`.
    pub fn weight(&self, residual: &DVector<f64>, mode: RobustMode) -> f64 {
        match mode {
            RobustMode::Trim => {
                let outlier = residual
                    .iter()
                    .zip(self.cut.iter())
                    .any(|(r, cut)| r.abs() >= *cut);
                if outlier {
                    0.0
                } else {
                    1.0
                }
            }
            RobustMode::Reweight => bisquare(residual[0].abs(), self.scale[0]),
        }
    }
}

/// Tukey bisquare weight of an absolute residual under a robust scale.
fn bisquare(abs_residual: f64, scale: f64) -> f64 {
    let u = if scale > 0.0 {
        abs_residual / scale
    } else if abs_residual == 0.0 {
        0.0
    } else {
        f64::INFINITY
    };
    if u < 1.0 {
        let t = 1.0 - u * u;
        t * t
    } else {
        0.0
    }
}

/// Bookkeeping of one refinement trial.
#[derive(Debug, Clone, PartialEq)]
pub struct TrialSummary {
    /// 1-based trial number.
    pub trial: usize,
    pub thresholds: RobustThresholds,
    /// Samples with a non-zero weight.
    pub n_used: usize,
    pub n_total: usize,
    pub weight_sum: f64,
}

impl fmt::Display for TrialSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "trial {}: {}/{} samples used, weight {:.3}, scale {:?}, cut {:?}",
            self.trial,
            self.n_used,
            self.n_total,
            self.weight_sum,
            self.thresholds.scale.as_slice(),
            self.thresholds.cut.as_slice()
        )
    }
}

/// Run one robust refinement trial.
///
/// Arguments
/// -----------------
/// * `fit`: fit of the previous round (initial fit or previous trial).
/// * `samples`: retained samples of the same feature space.
/// * `params`: `cache_size`, robust mode and robust-scale constants.
///
/// Return
/// ----------
/// * `Ok((SpaceFit, TrialSummary))` – the refined fit, one stage further.
/// * `Err(TrackPcaError::NoAcceptedSamples)` if every sample received a zero weight.
///
/// Remarks
/// -------------
/// * Samples are projected with the weighted feature mean *as accumulated so far*,
///   not with the final mean of the trial.
/// * Samples seen before the first non-zero weight contribute nothing.
pub fn refine(
    fit: &SpaceFit,
    samples: &[Sample],
    params: &FitParams,
) -> Result<(SpaceFit, TrialSummary), TrackPcaError> {
    if samples.is_empty() {
        return Err(TrackPcaError::NoAcceptedSamples("robust refinement"));
    }
    let space = fit.space;
    let thresholds = RobustThresholds::estimate(fit, samples, params)?;

    let mut feature_stats = StreamAccumulator::new(space.n_variables()).without_cache();
    let mut parameter_stats = StreamAccumulator::new(space.n_parameters()).without_cache();
    let mut pc_stats = StreamAccumulator::new(space.n_variables())
        .without_cache()
        .with_covariate(space.n_parameters());
    let mut n_used = 0;

    for sample in samples {
        let weight = thresholds.weight(&fit.residual(sample)?, params.robust_mode);
        feature_stats.add_weighted(&sample.features, weight, None)?;
        parameter_stats.add_weighted(&sample.parameters, weight, None)?;
        if feature_stats.is_empty() {
            continue;
        }
        let pc = fit.eigen.project(&sample.features, &feature_stats.mean()?);
        pc_stats.add_weighted(&pc, weight, Some(&sample.parameters))?;
        if weight > 0.0 {
            n_used += 1;
        }
    }

    if feature_stats.is_empty() {
        return Err(TrackPcaError::NoAcceptedSamples("robust refinement"));
    }

    let eigen = EigenBasis::from_covariance(&feature_stats.auto_covariance()?)?;
    let (coefficients, solution) = solve_coefficients(&pc_stats, &fit.eigen.basis)?;

    let stage = fit.stage.next();
    let summary = TrialSummary {
        trial: stage.trials(),
        thresholds,
        n_used,
        n_total: samples.len(),
        weight_sum: feature_stats.count(),
    };
    info!("{space} {summary}");
    debug!("{space} weighted feature statistics\n{feature_stats:#}");

    let refined = SpaceFit {
        space,
        stage,
        eigen,
        feature_mean: feature_stats.mean()?,
        parameter_mean: parameter_stats.mean()?,
        weight_sum: feature_stats.count(),
        coefficients,
        lstsq_residuals: solution.residuals,
        rank: solution.rank,
    };
    Ok((refined, summary))
}
