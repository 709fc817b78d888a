//! # Bootstrap range estimation
//!
//! Before the full pass, a bounded pass over at most `cache_size` eligible
//! events estimates, for each feature dimension of each feature space, the
//! half-open acceptance window `[q_low, q_high)` (5th/95th percentiles by
//! default). The full pass then drops every event with any feature outside
//! its window.
//!
//! The window is a coarse outlier guard, not a statistically rigorous trimmed
//! range: it is computed from the first events only, with the accept-first-N
//! cache of [`StreamAccumulator`].
use log::{debug, info};
use nalgebra::DVector;

use crate::feature_space::FeatureSpace;
use crate::fit_params::FitParams;
use crate::measurements::{well_formed, Measurement, MeasurementSource};
use crate::stats::StreamAccumulator;
use crate::trackpca_errors::TrackPcaError;

/// Per-dimension half-open interval `[lower, upper)`.
#[derive(Debug, Clone, PartialEq)]
pub struct AcceptanceWindow {
    pub lower: DVector<f64>,
    pub upper: DVector<f64>,
}

impl AcceptanceWindow {
    /// `true` iff `lower[j] <= x[j] < upper[j]` for every dimension `j`.
    pub fn contains(&self, x: &DVector<f64>) -> bool {
        x.len() == self.lower.len()
            && x.iter()
                .zip(self.lower.iter().zip(self.upper.iter()))
                .all(|(v, (lo, hi))| lo <= v && v < hi)
    }
}

/// Acceptance windows of every configured feature space.
#[derive(Debug, Clone)]
pub struct AcceptanceRanges {
    windows: Vec<(FeatureSpace, AcceptanceWindow)>,
    n_bootstrap: usize,
}

impl AcceptanceRanges {
    /// Build ranges from explicit windows, e.g. to reuse the windows of a previous run.
    pub fn from_windows(windows: Vec<(FeatureSpace, AcceptanceWindow)>) -> Self {
        AcceptanceRanges {
            windows,
            n_bootstrap: 0,
        }
    }

    pub fn window(&self, space: FeatureSpace) -> Option<&AcceptanceWindow> {
        self.windows
            .iter()
            .find(|(s, _)| *s == space)
            .map(|(_, w)| w)
    }

    /// Number of events used to estimate the windows.
    pub fn n_bootstrap(&self) -> usize {
        self.n_bootstrap
    }

    /// `true` iff every feature space of `measurement` lies inside its window.
    pub fn accepts(&self, measurement: &Measurement) -> bool {
        self.windows
            .iter()
            .all(|(space, window)| window.contains(&space.features(measurement)))
    }
}

/// Run the bootstrap pass.
///
/// Arguments
/// -----------------
/// * `source`: measurement source; one new pass is opened.
/// * `params`: provides the feature spaces, `cache_size`, the window quantile levels
///   and the `q/pT` eligibility range.
///
/// Return
/// ----------
/// * `Ok(AcceptanceRanges)` – one window per feature space.
/// * `Err(TrackPcaError::NoAcceptedSamples)` if no eligible event was found.
pub fn estimate_ranges<S>(source: &S, params: &FitParams) -> Result<AcceptanceRanges, TrackPcaError>
where
    S: MeasurementSource + ?Sized,
{
    let spaces = params.feature_spaces();
    let mut stats: Vec<StreamAccumulator> = spaces
        .iter()
        .map(|space| StreamAccumulator::new(space.n_variables()).with_capacity(params.cache_size))
        .collect();

    let mut n_accepted = 0;
    for measurement in well_formed(source)?
        .filter(|m| params.is_eligible(m.inv_pt()))
        .take(params.cache_size)
    {
        for (space, acc) in spaces.iter().zip(stats.iter_mut()) {
            acc.add(&space.features(&measurement))?;
        }
        n_accepted += 1;
    }

    if n_accepted == 0 {
        return Err(TrackPcaError::NoAcceptedSamples("bootstrap pass"));
    }
    info!("bootstrap pass: {n_accepted} events cached");

    let windows = spaces
        .iter()
        .zip(stats.iter())
        .map(|(space, acc)| {
            let window = AcceptanceWindow {
                lower: acc.quantile(params.range_low)?,
                upper: acc.quantile(params.range_high)?,
            };
            debug!("{space} bootstrap statistics\n{acc:#}");
            debug!(
                "{space} window: lower={:?} upper={:?}",
                window.lower.as_slice(),
                window.upper.as_slice()
            );
            Ok((*space, window))
        })
        .collect::<Result<Vec<_>, TrackPcaError>>()?;

    Ok(AcceptanceRanges {
        windows,
        n_bootstrap: n_accepted,
    })
}
