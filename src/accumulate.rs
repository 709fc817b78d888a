//! # Stage 1: full-sample accumulation
//!
//! One complete pass over the [`MeasurementSource`], after the bootstrap pass
//! has produced the [`AcceptanceRanges`]. Every record goes through:
//!
//! 1. the malformed-record filter of the source boundary,
//! 2. the optional `max_events` cap on the number of records read,
//! 3. the `q/pT` eligibility filter,
//! 4. the acceptance windows of **every** feature space.
//!
//! An accepted event is extracted once per feature space; the resulting
//! [`Sample`] feeds unbounded feature and parameter accumulators and is
//! retained for the fitting and refinement stages.
use log::{debug, info};

use crate::feature_space::{FeatureSpace, Sample};
use crate::fit_params::FitParams;
use crate::measurements::{well_formed, MeasurementSource};
use crate::progress_bar::PassProgress;
use crate::range_estimator::AcceptanceRanges;
use crate::stats::StreamAccumulator;
use crate::trackpca_errors::TrackPcaError;

/// Statistics and retained samples of one feature space.
#[derive(Debug, Clone)]
pub struct SpaceAccumulation {
    pub space: FeatureSpace,
    pub feature_stats: StreamAccumulator,
    pub parameter_stats: StreamAccumulator,
    pub samples: Vec<Sample>,
}

impl SpaceAccumulation {
    fn new(space: FeatureSpace) -> Self {
        SpaceAccumulation {
            space,
            feature_stats: StreamAccumulator::new(space.n_variables()),
            parameter_stats: StreamAccumulator::new(space.n_parameters()),
            samples: Vec::new(),
        }
    }

    fn push(&mut self, sample: Sample) -> Result<(), TrackPcaError> {
        self.feature_stats.add(&sample.features)?;
        self.parameter_stats.add(&sample.parameters)?;
        self.samples.push(sample);
        Ok(())
    }
}

/// Output of the full pass.
#[derive(Debug, Clone)]
pub struct Accumulation {
    pub spaces: Vec<SpaceAccumulation>,
    /// Well-formed records read from the source.
    pub n_read: usize,
    /// Records passing eligibility and acceptance windows.
    pub n_accepted: usize,
}

impl Accumulation {
    pub fn space(&self, space: FeatureSpace) -> Option<&SpaceAccumulation> {
        self.spaces.iter().find(|s| s.space == space)
    }
}

/// Run the full pass.
///
/// Arguments
/// -----------------
/// * `source`: measurement source; one new pass is opened.
/// * `params`: feature spaces, eligibility range and `max_events` cap.
/// * `ranges`: acceptance windows from [`estimate_ranges`](crate::range_estimator::estimate_ranges).
///
/// Return
/// ----------
/// * `Ok(Accumulation)` – per space statistics and retained samples.
/// * `Err(TrackPcaError::NoAcceptedSamples)` if no event passed the filters.
///
/// See also
/// ------------
/// * [`estimate_ranges`](crate::range_estimator::estimate_ranges) – bootstrap pass producing `ranges`.
pub fn accumulate<S>(
    source: &S,
    params: &FitParams,
    ranges: &AcceptanceRanges,
) -> Result<Accumulation, TrackPcaError>
where
    S: MeasurementSource + ?Sized,
{
    let mut spaces: Vec<SpaceAccumulation> = params
        .feature_spaces()
        .into_iter()
        .map(SpaceAccumulation::new)
        .collect();

    let mut progress = PassProgress::new("full pass", params.max_events);
    let mut n_read = 0;
    let mut n_accepted = 0;

    for measurement in well_formed(source)?.take(params.max_events.unwrap_or(usize::MAX)) {
        n_read += 1;
        progress.inc();

        if !params.is_eligible(measurement.inv_pt()) || !ranges.accepts(&measurement) {
            continue;
        }
        for acc in spaces.iter_mut() {
            let sample = acc.space.extract(&measurement);
            acc.push(sample)?;
        }
        n_accepted += 1;
    }
    progress.finish();

    if n_accepted == 0 {
        return Err(TrackPcaError::NoAcceptedSamples("full pass"));
    }
    info!("full pass: {n_accepted} of {n_read} events accepted");
    for acc in &spaces {
        debug!("{} feature statistics\n{:#}", acc.space, acc.feature_stats);
        debug!("{} parameter statistics\n{:#}", acc.space, acc.parameter_stats);
    }

    Ok(Accumulation {
        spaces,
        n_read,
        n_accepted,
    })
}

#[cfg(test)]
mod accumulate_test {
    use super::*;
    use crate::fit_params::ViewMode;
    use crate::measurements::Measurement;
    use crate::range_estimator::{estimate_ranges, AcceptanceWindow};
    use approx::assert_relative_eq;
    use nalgebra::DVector;

    fn measurement(x: f64, inv_pt: f64) -> Measurement {
        Measurement::from_arrays([x; 6], [2.0 * x; 6], inv_pt, x, 0.5 * x, -x)
    }

    fn open_ranges(params: &FitParams) -> AcceptanceRanges {
        AcceptanceRanges::from_windows(
            params
                .feature_spaces()
                .into_iter()
                .map(|space| {
                    let d = space.n_variables();
                    let window = AcceptanceWindow {
                        lower: DVector::from_element(d, -1e9),
                        upper: DVector::from_element(d, 1e9),
                    };
                    (space, window)
                })
                .collect(),
        )
    }

    #[test]
    fn test_filters_and_statistics() {
        let source = vec![
            measurement(1.0, 0.1),
            measurement(2.0, 0.5), // ineligible
            measurement(3.0, -0.2),
            measurement(5.0, 0.0),
        ];
        let params = FitParams::default();
        let out = accumulate(&source, &params, &open_ranges(&params)).unwrap();
        assert_eq!(out.n_read, 4);
        assert_eq!(out.n_accepted, 3);

        let t = out.space(FeatureSpace::Transverse).unwrap();
        assert_eq!(t.samples.len(), 3);
        assert_eq!(t.feature_stats.count(), 3.0);
        assert_relative_eq!(t.feature_stats.mean().unwrap()[0], 3.0, epsilon = 1e-12);
        let l = out.space(FeatureSpace::Longitudinal).unwrap();
        assert_relative_eq!(l.parameter_stats.mean().unwrap()[1], -3.0, epsilon = 1e-12);
    }

    #[test]
    fn test_event_rejected_by_one_window_is_dropped_everywhere() {
        let params = FitParams::default();
        let mut ranges = open_ranges(&params);
        let mut windows: Vec<_> = params
            .feature_spaces()
            .into_iter()
            .map(|s| (s, ranges.window(s).unwrap().clone()))
            .collect();
        // longitudinal features are 2x: reject x >= 2
        windows[1].1.upper = DVector::from_element(6, 4.0);
        ranges = AcceptanceRanges::from_windows(windows);

        let source: Vec<Measurement> = (0..4).map(|i| measurement(i as f64, 0.1)).collect();
        let out = accumulate(&source, &params, &ranges).unwrap();
        assert_eq!(out.n_accepted, 2);
        assert!(out.spaces.iter().all(|s| s.samples.len() == 2));
    }

    #[test]
    fn test_max_events_caps_records_read() {
        let params = FitParams::builder().max_events(5).build().unwrap();
        let source: Vec<Measurement> = (0..20).map(|i| measurement(i as f64, 0.1)).collect();
        let out = accumulate(&source, &params, &open_ranges(&params)).unwrap();
        assert_eq!(out.n_read, 5);
        assert_eq!(out.n_accepted, 5);
    }

    #[test]
    fn test_combined_mode_has_one_space() {
        let params = FitParams::builder()
            .view_mode(ViewMode::Combined)
            .cache_size(10)
            .build()
            .unwrap();
        let source: Vec<Measurement> = (0..10).map(|i| measurement(i as f64, 0.1)).collect();
        let ranges = estimate_ranges(&source, &params).unwrap();
        let out = accumulate(&source, &params, &ranges).unwrap();
        assert_eq!(out.spaces.len(), 1);
        assert_eq!(out.spaces[0].space, FeatureSpace::Combined);
        assert_eq!(out.spaces[0].samples[0].features.len(), 12);
    }

    #[test]
    fn test_nothing_accepted() {
        let params = FitParams::default();
        let source = vec![measurement(1.0, 0.9)];
        let err = accumulate(&source, &params, &open_ranges(&params)).unwrap_err();
        assert_eq!(err, TrackPcaError::NoAcceptedSamples("full pass"));
    }
}
