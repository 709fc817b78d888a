//! # Feature spaces
//!
//! A [`FeatureSpace`] selects, from a [`Measurement`], the feature vector and
//! the parameter vector that one independent fit works on. The set of spaces
//! is fixed by [`ViewMode`](crate::fit_params::ViewMode) at configuration
//! time:
//!
//! * `Split` → [`FeatureSpace::Transverse`] and [`FeatureSpace::Longitudinal`],
//! * `Combined` → [`FeatureSpace::Combined`] (both views concatenated).
//!
//! A [`Sample`] is the extracted pair. Samples are created once, during the
//! full pass, and are read-only afterwards.
use std::fmt;

use nalgebra::DVector;
use serde::{Deserialize, Serialize};

use crate::constants::{
    FeatureVector, ParameterVector, N_PARAMETERS_COMBINED, N_PARAMETERS_VIEW,
    N_VARIABLES_COMBINED, N_VARIABLES_VIEW,
};
use crate::measurements::Measurement;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FeatureSpace {
    /// Azimuthal stub coordinates → (`q/pT`, `phi`).
    Transverse,
    /// Longitudinal stub coordinates → (`cot(theta)`, `z0`).
    Longitudinal,
    /// Both views concatenated → (`q/pT`, `phi`, `cot(theta)`, `z0`).
    Combined,
}

/// One retained regression sample of a feature space.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    pub features: FeatureVector,
    pub parameters: ParameterVector,
}

impl FeatureSpace {
    pub fn n_variables(self) -> usize {
        match self {
            FeatureSpace::Transverse | FeatureSpace::Longitudinal => N_VARIABLES_VIEW,
            FeatureSpace::Combined => N_VARIABLES_COMBINED,
        }
    }

    pub fn n_parameters(self) -> usize {
        match self {
            FeatureSpace::Transverse | FeatureSpace::Longitudinal => N_PARAMETERS_VIEW,
            FeatureSpace::Combined => N_PARAMETERS_COMBINED,
        }
    }

    /// Whether the first parameter of this space is the signed inverse transverse momentum.
    pub fn has_inverse_pt(self) -> bool {
        matches!(self, FeatureSpace::Transverse | FeatureSpace::Combined)
    }

    /// Feature vector of this space only (used by the range filter).
    pub fn features(self, measurement: &Measurement) -> FeatureVector {
        match self {
            FeatureSpace::Transverse => measurement.transverse.features.clone(),
            FeatureSpace::Longitudinal => measurement.longitudinal.features.clone(),
            FeatureSpace::Combined => concat(
                &measurement.transverse.features,
                &measurement.longitudinal.features,
            ),
        }
    }

    /// Feature and parameter vectors of this space.
    pub fn extract(self, measurement: &Measurement) -> Sample {
        let parameters = match self {
            FeatureSpace::Transverse => measurement.transverse.parameters.clone(),
            FeatureSpace::Longitudinal => measurement.longitudinal.parameters.clone(),
            FeatureSpace::Combined => concat(
                &measurement.transverse.parameters,
                &measurement.longitudinal.parameters,
            ),
        };
        Sample {
            features: self.features(measurement),
            parameters,
        }
    }
}

impl fmt::Display for FeatureSpace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FeatureSpace::Transverse => "transverse",
            FeatureSpace::Longitudinal => "longitudinal",
            FeatureSpace::Combined => "combined",
        };
        f.write_str(name)
    }
}

fn concat(a: &DVector<f64>, b: &DVector<f64>) -> DVector<f64> {
    DVector::from_iterator(a.len() + b.len(), a.iter().chain(b.iter()).copied())
}
