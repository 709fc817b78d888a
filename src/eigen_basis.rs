//! # Principal-component basis
//!
//! [`EigenBasis`] holds the symmetric eigen-decomposition of a feature
//! covariance matrix. The basis matrix stores **one eigenvector per row**
//! (the transpose of the solver's column layout), so that projecting a
//! sample is a single product:
//!
//! ```text
//! principal = basis · (x − mean)
//! x         = basisᵗ · principal + mean
//! ```
//!
//! Eigenvalues are kept in the order returned by nalgebra's
//! [`SymmetricEigen`]; no sorting is applied. `eigenvalues[i]` is the
//! variance of `principal[i]`.
use nalgebra::{DMatrix, DVector, SymmetricEigen};
use serde::{Deserialize, Serialize};

use crate::constants::DEGENERATE_EIGENVALUE;
use crate::trackpca_errors::TrackPcaError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EigenBasis {
    pub eigenvalues: DVector<f64>,
    pub basis: DMatrix<f64>,
}

impl EigenBasis {
    /// Decompose a symmetric positive-semidefinite covariance matrix.
    ///
    /// Only the symmetric part of the input is used by the solver, so tiny
    /// asymmetries coming from floating-point accumulation are harmless.
    ///
    /// Return
    /// ----------
    /// * `Ok(EigenBasis)` – eigenvalues and row-eigenvector basis.
    /// * `Err(TrackPcaError::DimensionMismatch)` if `covariance` is not square.
    pub fn from_covariance(covariance: &DMatrix<f64>) -> Result<Self, TrackPcaError> {
        let (rows, cols) = covariance.shape();
        if rows != cols {
            return Err(TrackPcaError::DimensionMismatch {
                what: "covariance (square)",
                expected: rows,
                found: cols,
            });
        }

        let eigen = SymmetricEigen::new(covariance.clone());
        Ok(EigenBasis {
            eigenvalues: eigen.eigenvalues,
            basis: eigen.eigenvectors.transpose(),
        })
    }

    #[inline]
    pub fn dim(&self) -> usize {
        self.eigenvalues.len()
    }

    /// Principal components of `x`: `basis · (x − mean)`.
    pub fn project(&self, x: &DVector<f64>, mean: &DVector<f64>) -> DVector<f64> {
        &self.basis * (x - mean)
    }

    /// Inverse of [`project`](Self::project): `basisᵗ · principal + mean`.
    pub fn reconstruct(&self, principal: &DVector<f64>, mean: &DVector<f64>) -> DVector<f64> {
        self.basis.tr_mul(principal) + mean
    }

    /// Principal components scaled to unit variance, `pc[i] / √λ[i]`.
    ///
    /// Components whose eigenvalue is degenerate (`|λ| < 1e-14`) or negative
    /// are mapped to `0` instead of being divided.
    pub fn normalize(&self, principal: &DVector<f64>) -> DVector<f64> {
        principal.zip_map(&self.eigenvalues, |pc, lambda| {
            if lambda.abs() < DEGENERATE_EIGENVALUE || lambda < 0.0 {
                0.0
            } else {
                pc / lambda.sqrt()
            }
        })
    }
}

#[cfg(test)]
mod eigen_basis_test {
    use super::*;
    use approx::assert_relative_eq;

    fn covariance() -> DMatrix<f64> {
        // A · Aᵗ is symmetric positive-semidefinite
        let a = DMatrix::from_row_slice(
            4,
            3,
            &[1.0, 2.0, 0.5, -0.3, 1.5, 2.0, 0.7, 0.1, -1.0, 2.0, -0.4, 0.9],
        );
        &a * a.transpose()
    }

    #[test]
    fn test_basis_is_orthonormal() {
        let eigen = EigenBasis::from_covariance(&covariance()).unwrap();
        let identity = DMatrix::<f64>::identity(4, 4);
        assert_relative_eq!(
            &eigen.basis * eigen.basis.transpose(),
            identity,
            epsilon = 1e-12
        );
    }

    #[test]
    fn test_rows_are_eigenvectors() {
        let cov = covariance();
        let eigen = EigenBasis::from_covariance(&cov).unwrap();
        for i in 0..eigen.dim() {
            let v = eigen.basis.row(i).transpose();
            assert_relative_eq!(&cov * &v, &v * eigen.eigenvalues[i], epsilon = 1e-10);
        }
        // rank 3 input: one eigenvalue vanishes
        let n_small = eigen.eigenvalues.iter().filter(|l| l.abs() < 1e-10).count();
        assert_eq!(n_small, 1);
    }

    #[test]
    fn test_projection_round_trip() {
        let eigen = EigenBasis::from_covariance(&covariance()).unwrap();
        let mean = DVector::from_vec(vec![0.5, -1.0, 2.0, 3.0]);
        let x = DVector::from_vec(vec![1.25, 0.0, -7.5, 3.3]);
        let pc = eigen.project(&x, &mean);
        assert_relative_eq!(eigen.reconstruct(&pc, &mean), x, epsilon = 1e-12);
    }

    #[test]
    fn test_normalize_guards_degenerate_eigenvalues() {
        let eigen = EigenBasis {
            eigenvalues: DVector::from_vec(vec![4.0, 1e-16, -1e-3, 0.25]),
            basis: DMatrix::identity(4, 4),
        };
        let pc = DVector::from_vec(vec![2.0, 5.0, 1.0, -1.0]);
        let n = eigen.normalize(&pc);
        assert_eq!(n.as_slice(), &[1.0, 0.0, 0.0, -2.0]);
    }

    #[test]
    fn test_non_square_input() {
        let err = EigenBasis::from_covariance(&DMatrix::zeros(2, 3)).unwrap_err();
        assert!(matches!(err, TrackPcaError::DimensionMismatch { .. }));
    }
}
