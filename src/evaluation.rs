//! # Fit evaluation
//!
//! Diagnostics of a final [`SpaceFit`] over the retained samples:
//!
//! * the principal components `basis · (x − μ)` and their unit-variance
//!   normalization,
//! * the signed fit residuals `D·x − par`,
//! * for spaces whose first parameter is `q/pT`, the relative transverse
//!   momentum error `(|1/q̂| − |1/q|) · q`, i.e. `(p̂T − pT)/pT` up to the charge.
//!
//! Every accumulator keeps a quantile cache bounded to `cache_size`, so the
//! summaries are exact for moments and approximate for quantiles.
use std::fmt;

use itertools::Itertools;
use log::debug;
use nalgebra::DVector;

use crate::feature_space::Sample;
use crate::fit_params::FitParams;
use crate::space_fit::SpaceFit;
use crate::stats::StreamAccumulator;
use crate::trackpca_errors::TrackPcaError;

/// Moments and a few quantiles of one accumulator.
#[derive(Debug, Clone, PartialEq)]
pub struct Summary {
    pub count: f64,
    pub mean: DVector<f64>,
    pub variance: DVector<f64>,
    pub q05: DVector<f64>,
    pub q50: DVector<f64>,
    pub q95: DVector<f64>,
}

impl Summary {
    pub fn from_accumulator(acc: &StreamAccumulator) -> Result<Self, TrackPcaError> {
        Ok(Summary {
            count: acc.count(),
            mean: acc.mean()?,
            variance: acc.variance()?,
            q05: acc.quantile(0.05)?,
            q50: acc.quantile(0.50)?,
            q95: acc.quantile(0.95)?,
        })
    }
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        macro_rules! line {
            ($label:expr, $v:expr) => {
                writeln!(
                    f,
                    "{:<6}: [{}]",
                    $label,
                    $v.iter().map(|x| format!("{x:+.4e}")).join(", ")
                )?
            };
        }
        writeln!(f, "{:<6}: {}", "count", self.count)?;
        line!("mean", self.mean);
        line!("var", self.variance);
        line!("q05", self.q05);
        line!("q50", self.q50);
        line!("q95", self.q95);
        Ok(())
    }
}

/// Evaluation accumulators of one feature space.
#[derive(Debug, Clone)]
pub struct FitEvaluation {
    pub principals: StreamAccumulator,
    pub normalized_principals: StreamAccumulator,
    pub residuals: StreamAccumulator,
    /// `None` for spaces without a `q/pT` parameter.
    pub relative_pt_error: Option<StreamAccumulator>,
}

impl FitEvaluation {
    pub fn residual_summary(&self) -> Result<Summary, TrackPcaError> {
        Summary::from_accumulator(&self.residuals)
    }

    pub fn principal_summary(&self) -> Result<Summary, TrackPcaError> {
        Summary::from_accumulator(&self.principals)
    }

    /// `None` if the space has no `q/pT` parameter or no sample had a non-zero estimate.
    pub fn relative_pt_error_summary(&self) -> Option<Result<Summary, TrackPcaError>> {
        self.relative_pt_error
            .as_ref()
            .filter(|acc| !acc.is_empty())
            .map(Summary::from_accumulator)
    }
}

/// `(|1/fit| − |1/truth|) · truth`, undefined when either value is zero.
fn relative_pt_error(fit_inv_pt: f64, true_inv_pt: f64) -> Option<f64> {
    if fit_inv_pt == 0.0 || true_inv_pt == 0.0 {
        return None;
    }
    Some(((1.0 / fit_inv_pt).abs() - (1.0 / true_inv_pt).abs()) * true_inv_pt)
}

/// Evaluate a final fit on the retained samples.
///
/// Arguments
/// -----------------
/// * `fit`: final fit of a feature space.
/// * `samples`: retained samples of the same space.
/// * `params`: `cache_size` bounds the quantile caches.
///
/// Return
/// ----------
/// * `Ok(FitEvaluation)` – accumulators over every sample.
pub fn evaluate(
    fit: &SpaceFit,
    samples: &[Sample],
    params: &FitParams,
) -> Result<FitEvaluation, TrackPcaError> {
    let space = fit.space;
    let (d, p) = (space.n_variables(), space.n_parameters());
    let bounded = |dim| StreamAccumulator::new(dim).with_capacity(params.cache_size);

    let mut principals = bounded(d);
    let mut normalized_principals = bounded(d);
    let mut residuals = bounded(p);
    let mut pt_error = space.has_inverse_pt().then(|| bounded(1));

    for sample in samples {
        let pc = fit.eigen.project(&sample.features, &fit.feature_mean);
        normalized_principals.add(&fit.eigen.normalize(&pc))?;
        principals.add(&pc)?;

        let estimate = fit.predict(&sample.features)?;
        residuals.add(&(&estimate - &sample.parameters))?;

        if let Some(acc) = pt_error.as_mut() {
            if let Some(err) = relative_pt_error(estimate[0], sample.parameters[0]) {
                acc.add(&DVector::from_element(1, err))?;
            }
        }
    }

    let evaluation = FitEvaluation {
        principals,
        normalized_principals,
        residuals,
        relative_pt_error: pt_error,
    };
    if !samples.is_empty() {
        debug!("{space} fit residuals\n{}", evaluation.residual_summary()?);
    }
    Ok(evaluation)
}

#[cfg(test)]
mod evaluation_test {
    use super::*;
    use crate::eigen_basis::EigenBasis;
    use crate::feature_space::FeatureSpace;
    use crate::space_fit::FitStage;
    use approx::assert_relative_eq;
    use nalgebra::DMatrix;

    fn fit(space: FeatureSpace) -> SpaceFit {
        let (d, p) = (space.n_variables(), space.n_parameters());
        // estimate: first parameter = x0, the others zero
        let mut coefficients = DMatrix::zeros(p, d);
        coefficients[(0, 0)] = 1.0;
        SpaceFit {
            space,
            stage: FitStage::Refined(3),
            eigen: EigenBasis {
                eigenvalues: DVector::from_element(d, 4.0),
                basis: DMatrix::identity(d, d),
            },
            feature_mean: DVector::from_element(d, 1.0),
            parameter_mean: DVector::zeros(p),
            weight_sum: 1.0,
            coefficients,
            lstsq_residuals: DVector::zeros(p),
            rank: d,
        }
    }

    fn sample(space: FeatureSpace, x0: f64, q: f64) -> Sample {
        let mut features = DVector::from_element(space.n_variables(), 1.0);
        features[0] = x0;
        let mut parameters = DVector::zeros(space.n_parameters());
        parameters[0] = q;
        Sample {
            features,
            parameters,
        }
    }

    #[test]
    fn test_relative_pt_error() {
        // pT = 4 GeV estimated as 5 GeV: +25 %
        assert_relative_eq!(relative_pt_error(0.2, 0.25).unwrap(), 0.25, epsilon = 1e-12);
        // negative charge keeps the sign of the truth
        assert_relative_eq!(relative_pt_error(-0.2, -0.25).unwrap(), -0.25, epsilon = 1e-12);
        assert!(relative_pt_error(0.0, 0.1).is_none());
        assert!(relative_pt_error(0.1, 0.0).is_none());
    }

    #[test]
    fn test_evaluate_transverse() {
        let space = FeatureSpace::Transverse;
        let samples = vec![
            sample(space, 0.2, 0.25),
            sample(space, 0.0, 0.1),
            sample(space, 3.0, 0.1),
        ];
        let eval = evaluate(&fit(space), &samples, &FitParams::default()).unwrap();

        assert_eq!(eval.residuals.count(), 3.0);
        let res = eval.residuals.mean().unwrap();
        assert_relative_eq!(
            res[0],
            ((0.2 - 0.25) + (0.0 - 0.1) + (3.0 - 0.1)) / 3.0,
            epsilon = 1e-12
        );

        // pc0 = x0 − 1, normalized by √4
        let pc = eval.principals.mean().unwrap();
        assert_relative_eq!(pc[0], (3.2 / 3.0) - 1.0, epsilon = 1e-12);
        assert_relative_eq!(pc[1], 0.0, epsilon = 1e-12);
        let npc = eval.normalized_principals.mean().unwrap();
        assert_relative_eq!(npc[0], pc[0] / 2.0, epsilon = 1e-12);

        // zero estimate is skipped
        let pt = eval.relative_pt_error.as_ref().unwrap();
        assert_eq!(pt.count(), 2.0);
        assert!(eval.relative_pt_error_summary().unwrap().is_ok());
    }

    #[test]
    fn test_longitudinal_has_no_pt_error() {
        let space = FeatureSpace::Longitudinal;
        let samples = vec![sample(space, 0.5, 1.0), sample(space, 1.5, 2.0)];
        let eval = evaluate(&fit(space), &samples, &FitParams::default()).unwrap();
        assert!(eval.relative_pt_error.is_none());
        assert!(eval.relative_pt_error_summary().is_none());

        let summary = eval.residual_summary().unwrap();
        assert_eq!(summary.count, 2.0);
        assert_relative_eq!(summary.q50[0], -0.5, epsilon = 1e-12);
        assert!(format!("{summary}").starts_with("count : 2"));
    }
}
