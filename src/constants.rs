//! # Constants and type definitions for trackpca
//!
//! This module centralizes the **detector layout**, the **robust-statistics tuning constants**
//! and the **common type aliases** used throughout the crate.
//!
//! ## Overview
//!
//! - Layout of one measurement view (six stub layers, two track parameters)
//! - Default configuration values (bootstrap cache, IRLS trials, quantile levels)
//! - Tuning constants of the median-absolute-deviation / bisquare robust scale
//! - Numerical guards for degenerate eigenvalues

use nalgebra::{DMatrix, DVector};

// -------------------------------------------------------------------------------------------------
// Measurement layout
// -------------------------------------------------------------------------------------------------

/// Number of stub layers, i.e. features per view
pub const N_VARIABLES_VIEW: usize = 6;

/// Number of track parameters estimated per view
pub const N_PARAMETERS_VIEW: usize = 2;

/// Features of the combined (transverse ⊕ longitudinal) view
pub const N_VARIABLES_COMBINED: usize = 2 * N_VARIABLES_VIEW;

/// Parameters of the combined (transverse ⊕ longitudinal) view
pub const N_PARAMETERS_COMBINED: usize = 2 * N_PARAMETERS_VIEW;

// -------------------------------------------------------------------------------------------------
// Default configuration
// -------------------------------------------------------------------------------------------------

/// Number of accepted events kept by capacity-bounded accumulators
pub const DEFAULT_CACHE_SIZE: usize = 10_000;

/// Number of IRLS refinement trials
pub const DEFAULT_NTRIALS: usize = 3;

/// Lower quantile of the bootstrap acceptance window
pub const DEFAULT_RANGE_LOW: f64 = 0.05;

/// Upper quantile of the bootstrap acceptance window
pub const DEFAULT_RANGE_HIGH: f64 = 0.95;

/// Quantile of the absolute residuals used as trimming cut
pub const DEFAULT_TRIM_QUANTILE: f64 = 0.90;

/// Eligibility range of the signed inverse transverse momentum (1/GeV)
pub const DEFAULT_MIN_INV_PT: f64 = -1.0 / 3.0;
pub const DEFAULT_MAX_INV_PT: f64 = 1.0 / 3.0;

// -------------------------------------------------------------------------------------------------
// Robust statistics
// -------------------------------------------------------------------------------------------------

/// MAD → σ normalization for a Gaussian distribution
pub const MAD_NORMALIZATION: f64 = 0.6745;

/// Tuning constant of Tukey's bisquare (95% efficiency under normal errors)
pub const BISQUARE_TUNING: f64 = 4.685;

/// Eigenvalues below this magnitude are treated as degenerate
pub const DEGENERATE_EIGENVALUE: f64 = 1e-14;

// -------------------------------------------------------------------------------------------------
// Type aliases
// -------------------------------------------------------------------------------------------------

/// Corrected stub measurements used as regression input
pub type FeatureVector = DVector<f64>;

/// Physical track quantities used as regression target
pub type ParameterVector = DVector<f64>;

/// Linear map `parameters ≈ D · features` (parameter-count × feature-count)
pub type CoefficientMatrix = DMatrix<f64>;
