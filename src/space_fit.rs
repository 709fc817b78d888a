//! # Fitted linear map of one feature space
//!
//! A [`SpaceFit`] is the result of one fitting round on one
//! [`FeatureSpace`]: the principal-component basis of the (possibly
//! weighted) feature covariance, the moments it was computed from, and the
//! coefficient matrix `D` of the linear estimate
//!
//! ```text
//! parameters ≈ D · features
//! ```
//!
//! The estimate has no intercept term. A fit moves through the stages
//! [`FitStage::Fitted`] → [`FitStage::Refined(1)`](FitStage::Refined) → … and
//! is never mutated: each refinement trial produces a new value.
use std::fmt;

use itertools::Itertools;
use nalgebra::DVector;

use crate::constants::{CoefficientMatrix, FeatureVector, ParameterVector};
use crate::eigen_basis::EigenBasis;
use crate::feature_space::{FeatureSpace, Sample};
use crate::trackpca_errors::TrackPcaError;

/// Position of a fit in the refinement sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FitStage {
    /// Initial unweighted fit on all retained samples.
    Fitted,
    /// Output of the `k`-th robust refinement trial (`k ≥ 1`).
    Refined(usize),
}

impl FitStage {
    /// Number of refinement trials applied so far.
    pub fn trials(self) -> usize {
        match self {
            FitStage::Fitted => 0,
            FitStage::Refined(k) => k,
        }
    }

    pub fn next(self) -> FitStage {
        FitStage::Refined(self.trials() + 1)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SpaceFit {
    pub space: FeatureSpace,
    pub stage: FitStage,
    /// Eigen-decomposition of the feature covariance of this round.
    ///
    /// After a refinement trial this basis is not the one `coefficients` was
    /// composed with: it is the basis the next trial projects with.
    pub eigen: EigenBasis,
    pub feature_mean: FeatureVector,
    pub parameter_mean: ParameterVector,
    /// Total (weighted) sample count of this round.
    pub weight_sum: f64,
    /// `n_parameters × n_variables` map from features to parameters.
    ///
    /// `D = D_pc · B`, where `B` is the basis the samples were projected with:
    /// this round's `eigen` for the initial fit, the previous round's `eigen`
    /// for a refined one.
    pub coefficients: CoefficientMatrix,
    /// Least-squares residual sum of squares per parameter, in principal-component space.
    pub lstsq_residuals: DVector<f64>,
    /// Numerical rank of the principal-component covariance.
    pub rank: usize,
}

impl SpaceFit {
    /// Estimated parameters `D · features`.
    ///
    /// Return
    /// ----------
    /// * `Err(TrackPcaError::DimensionMismatch)` if `features` does not belong to this space.
    pub fn predict(&self, features: &FeatureVector) -> Result<ParameterVector, TrackPcaError> {
        if features.len() != self.coefficients.ncols() {
            return Err(TrackPcaError::DimensionMismatch {
                what: "features",
                expected: self.coefficients.ncols(),
                found: features.len(),
            });
        }
        Ok(&self.coefficients * features)
    }

    /// Signed fit residual `D · x − parameters` of one sample.
    pub fn residual(&self, sample: &Sample) -> Result<ParameterVector, TrackPcaError> {
        Ok(self.predict(&sample.features)? - &sample.parameters)
    }
}

impl fmt::Display for SpaceFit {
    /// Compact by default; coefficient table with the alternate flag (`{:#}`).
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let stage = match self.stage {
            FitStage::Fitted => "fitted".to_string(),
            FitStage::Refined(k) => format!("refined({k})"),
        };
        if !f.alternate() {
            return write!(
                f,
                "SpaceFit({}, {stage}, weight={}, rank={})",
                self.space, self.weight_sum, self.rank
            );
        }

        writeln!(f, "{} fit [{stage}]", self.space)?;
        writeln!(f, "  weight sum : {}", self.weight_sum)?;
        writeln!(f, "  rank       : {}", self.rank)?;
        writeln!(f, "  coefficients:")?;
        for (i, row) in self.coefficients.row_iter().enumerate() {
            let cells = row.iter().map(|c| format!("{c:>+13.6e}")).join(" ");
            writeln!(f, "    p{i}: {cells}")?;
        }
        Ok(())
    }
}
