//! # Pipeline driver
//!
//! [`build_matrices`] runs the complete estimation for one configuration:
//!
//! ```text
//! bootstrap pass ─► full pass ─► initial fit ─► refine × ntrials ─► evaluation
//!  (ranges)         (Stage 1)    (per space)    (per space)         (per space)
//! ```
//!
//! The feature spaces are independent once Stage 1 is done; they are
//! processed one after the other, in the order of
//! [`FitParams::feature_spaces`].
//!
//! ## Example
//! -----------------
//! ```rust, no_run
//! use trackpca::fit_params::FitParams;
//! use trackpca::matrix_builder::build_matrices;
//! use trackpca::measurements::csv_reader::CsvMeasurements;
//! use trackpca::feature_space::FeatureSpace;
//!
//! let source = CsvMeasurements::new("stubs.csv")?;
//! let output = build_matrices(&source, &FitParams::default())?;
//!
//! let transverse = output.space(FeatureSpace::Transverse).unwrap();
//! println!("{:#}", transverse.fit);
//! # Ok::<(), trackpca::trackpca_errors::TrackPcaError>(())
//! ```
use log::info;

use crate::accumulate::accumulate;
use crate::constants::{FeatureVector, ParameterVector};
use crate::evaluation::{evaluate, FitEvaluation};
use crate::feature_space::FeatureSpace;
use crate::fit_params::FitParams;
use crate::least_squares::fit_space;
use crate::measurements::MeasurementSource;
use crate::range_estimator::{estimate_ranges, AcceptanceRanges};
use crate::robust::{refine, TrialSummary};
use crate::space_fit::SpaceFit;
use crate::trackpca_errors::TrackPcaError;

/// Final fit of one feature space with its refinement history.
#[derive(Debug, Clone)]
pub struct SpaceResult {
    pub fit: SpaceFit,
    pub initial: SpaceFit,
    pub trials: Vec<TrialSummary>,
    pub evaluation: FitEvaluation,
}

/// Output artifact of one pipeline run.
#[derive(Debug, Clone)]
pub struct PipelineOutput {
    pub params: FitParams,
    pub ranges: AcceptanceRanges,
    pub n_read: usize,
    pub n_accepted: usize,
    pub spaces: Vec<SpaceResult>,
}

impl PipelineOutput {
    pub fn space(&self, space: FeatureSpace) -> Option<&SpaceResult> {
        self.spaces.iter().find(|r| r.fit.space == space)
    }

    /// Estimated parameters of `features` with the final coefficients of `space`.
    ///
    /// Return
    /// ----------
    /// * `Err(TrackPcaError::InvalidFitParameter)` if `space` was not fitted in this run.
    /// * `Err(TrackPcaError::DimensionMismatch)` if `features` has the wrong length.
    pub fn predict(
        &self,
        space: FeatureSpace,
        features: &FeatureVector,
    ) -> Result<ParameterVector, TrackPcaError> {
        self.space(space)
            .ok_or_else(|| {
                TrackPcaError::InvalidFitParameter(format!(
                    "feature space {space} is not part of a {:?} run",
                    self.params.view_mode
                ))
            })?
            .fit
            .predict(features)
    }
}

/// Run the bootstrap pass, then [`build_matrices_with_ranges`].
pub fn build_matrices<S>(source: &S, params: &FitParams) -> Result<PipelineOutput, TrackPcaError>
where
    S: MeasurementSource + ?Sized,
{
    info!("trackpca configuration: {params}");
    let ranges = estimate_ranges(source, params)?;
    build_matrices_with_ranges(source, params, ranges)
}

/// Run the pipeline with precomputed acceptance windows.
///
/// Arguments
/// -----------------
/// * `source`: measurement source, iterated once.
/// * `params`: run configuration.
/// * `ranges`: acceptance windows of every feature space of `params`.
///
/// Return
/// ----------
/// * `Ok(PipelineOutput)` – one [`SpaceResult`] per feature space.
/// * `Err(TrackPcaError::NoAcceptedSamples)` if the full pass or a refinement trial keeps no sample.
pub fn build_matrices_with_ranges<S>(
    source: &S,
    params: &FitParams,
    ranges: AcceptanceRanges,
) -> Result<PipelineOutput, TrackPcaError>
where
    S: MeasurementSource + ?Sized,
{
    let accumulation = accumulate(source, params, &ranges)?;

    let spaces = accumulation
        .spaces
        .iter()
        .map(|acc| {
            let initial = fit_space(acc)?;
            info!("{} initial fit on {} samples", acc.space, acc.samples.len());

            let mut fit = initial.clone();
            let mut trials = Vec::with_capacity(params.ntrials);
            for _ in 0..params.ntrials {
                let (refined, summary) = refine(&fit, &acc.samples, params)?;
                fit = refined;
                trials.push(summary);
            }

            let evaluation = evaluate(&fit, &acc.samples, params)?;
            info!("{} done\n{fit:#}", acc.space);
            Ok(SpaceResult {
                fit,
                initial,
                trials,
                evaluation,
            })
        })
        .collect::<Result<Vec<_>, TrackPcaError>>()?;

    Ok(PipelineOutput {
        params: params.clone(),
        ranges,
        n_read: accumulation.n_read,
        n_accepted: accumulation.n_accepted,
        spaces,
    })
}
