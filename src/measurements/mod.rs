//! # Corrected measurements and data sources
//!
//! A [`Measurement`] is one accepted event as delivered by the upstream
//! preprocessing: the six geometrically corrected stub coordinates of each
//! view, together with the simulated track parameters of that view.
//!
//! | view                         | features            | parameters          |
//! |------------------------------|---------------------|---------------------|
//! | [`transverse`](Measurement::transverse)     | `phi` of 6 stubs    | `q/pT`, `phi`       |
//! | [`longitudinal`](Measurement::longitudinal) | `z` of 6 stubs      | `cot(theta)`, `z0`  |
//!
//! The estimation pipeline reads its input through the [`MeasurementSource`]
//! trait. A source must be iterable more than once: the bootstrap pass and the
//! full pass of Stage 1 each open their own iteration.
//!
//! Records whose vectors do not have the expected lengths are *malformed*: they
//! are dropped here, at the source boundary, with a warning, and the pipeline
//! only ever sees well-formed measurements.
pub mod csv_reader;

use log::warn;
use nalgebra::DVector;

use crate::constants::{FeatureVector, ParameterVector, N_PARAMETERS_VIEW, N_VARIABLES_VIEW};
use crate::trackpca_errors::TrackPcaError;

/// Features and parameters of one view of an event.
#[derive(Debug, Clone, PartialEq)]
pub struct ViewSample {
    pub features: FeatureVector,
    pub parameters: ParameterVector,
}

impl ViewSample {
    pub fn new(features: FeatureVector, parameters: ParameterVector) -> Self {
        ViewSample {
            features,
            parameters,
        }
    }

    fn is_well_formed(&self) -> bool {
        self.features.len() == N_VARIABLES_VIEW
            && self.parameters.len() == N_PARAMETERS_VIEW
            && self.features.iter().chain(self.parameters.iter()).all(|x| x.is_finite())
    }
}

/// One corrected event: transverse and longitudinal view.
#[derive(Debug, Clone, PartialEq)]
pub struct Measurement {
    pub transverse: ViewSample,
    pub longitudinal: ViewSample,
}

impl Measurement {
    /// Build a measurement from raw arrays.
    ///
    /// Arguments
    /// -----------------
    /// * `phi`: corrected azimuthal stub coordinates (rad), innermost layer first.
    /// * `z`: corrected longitudinal stub coordinates (cm), innermost layer first.
    /// * `inv_pt`: signed inverse transverse momentum `q/pT` (1/GeV).
    /// * `phi0`: track azimuth at the origin (rad).
    /// * `cot_theta`: cotangent of the polar angle.
    /// * `z0`: longitudinal vertex position (cm).
    pub fn from_arrays(
        phi: [f64; N_VARIABLES_VIEW],
        z: [f64; N_VARIABLES_VIEW],
        inv_pt: f64,
        phi0: f64,
        cot_theta: f64,
        z0: f64,
    ) -> Self {
        Measurement {
            transverse: ViewSample::new(
                DVector::from_row_slice(&phi),
                DVector::from_vec(vec![inv_pt, phi0]),
            ),
            longitudinal: ViewSample::new(
                DVector::from_row_slice(&z),
                DVector::from_vec(vec![cot_theta, z0]),
            ),
        }
    }

    /// Signed inverse transverse momentum `q/pT`, the first transverse parameter.
    #[inline]
    pub fn inv_pt(&self) -> f64 {
        self.transverse.parameters[0]
    }

    /// Whether both views have the expected dimensions and only finite values.
    pub fn is_well_formed(&self) -> bool {
        self.transverse.is_well_formed() && self.longitudinal.is_well_formed()
    }
}

/// Iterable supplier of corrected measurements.
///
/// Each call to [`measurements`](MeasurementSource::measurements) starts an
/// independent pass over the same logical data.
pub trait MeasurementSource {
    fn measurements(&self) -> Result<Box<dyn Iterator<Item = Measurement> + '_>, TrackPcaError>;
}

impl MeasurementSource for [Measurement] {
    fn measurements(&self) -> Result<Box<dyn Iterator<Item = Measurement> + '_>, TrackPcaError> {
        Ok(Box::new(self.iter().cloned()))
    }
}

impl MeasurementSource for Vec<Measurement> {
    fn measurements(&self) -> Result<Box<dyn Iterator<Item = Measurement> + '_>, TrackPcaError> {
        self.as_slice().measurements()
    }
}

/// Open a pass over `source`, dropping malformed records.
pub(crate) fn well_formed<'a, S>(
    source: &'a S,
) -> Result<impl Iterator<Item = Measurement> + 'a, TrackPcaError>
where
    S: MeasurementSource + ?Sized,
{
    Ok(source
        .measurements()?
        .enumerate()
        .filter_map(|(index, measurement)| {
            if measurement.is_well_formed() {
                Some(measurement)
            } else {
                warn!("skipping malformed measurement #{index}");
                None
            }
        }))
}
