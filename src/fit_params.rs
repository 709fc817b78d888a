//! # Fit configuration
//!
//! This module defines [`FitParams`], the configuration consumed by every stage of the
//! estimation pipeline, and its validating builder [`FitParamsBuilder`].
//!
//! ## Purpose
//!
//! All values are fixed for one run. They control:
//!
//! - how measurements are split into feature spaces ([`ViewMode`]),
//! - the size of the bootstrap cache and of every capacity-bounded accumulator (`cache_size`),
//! - the acceptance window quantiles of the bootstrap pass (`range_low`, `range_high`),
//! - the eligibility range on the signed inverse transverse momentum (`min_inv_pt`, `max_inv_pt`),
//! - the robust refinement: number of trials, trim or reweight mode, and the robust-scale constants.
//!
//! ## Example
//!
//! ```rust
//! use trackpca::fit_params::{FitParams, RobustMode, ViewMode};
//!
//! let params = FitParams::builder()
//!     .view_mode(ViewMode::Combined)
//!     .cache_size(5_000)
//!     .ntrials(5)
//!     .robust_mode(RobustMode::Reweight)
//!     .build()
//!     .unwrap();
//!
//! assert_eq!(params.n_variables(), 12);
//! assert_eq!(params.n_parameters(), 4);
//! ```
use std::cmp::Ordering::{Equal, Greater, Less};
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::constants::{
    BISQUARE_TUNING, DEFAULT_CACHE_SIZE, DEFAULT_MAX_INV_PT, DEFAULT_MIN_INV_PT, DEFAULT_NTRIALS,
    DEFAULT_RANGE_HIGH, DEFAULT_RANGE_LOW, DEFAULT_TRIM_QUANTILE, MAD_NORMALIZATION,
    N_PARAMETERS_COMBINED, N_PARAMETERS_VIEW, N_VARIABLES_COMBINED, N_VARIABLES_VIEW,
};
use crate::feature_space::FeatureSpace;
use crate::trackpca_errors::TrackPcaError;

/// How the two measurement views are turned into feature spaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ViewMode {
    /// Two independent fits: transverse (6 → 2) and longitudinal (6 → 2).
    Split,
    /// One fit on the concatenated views (12 → 4).
    Combined,
}

/// Outlier handling of one robust refinement trial.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RobustMode {
    /// Drop samples whose absolute residual reaches the trimming cut in any parameter.
    Trim,
    /// Tukey bisquare weight on the first-parameter residual.
    Reweight,
}

/// Configuration of the estimation pipeline.
///
/// Fields
/// -----------------
/// * `view_mode` – split (two spaces) or combined (one space) fit.
/// * `cache_size` – maximum number of accepted events of the bootstrap pass, and capacity of
///   the residual accumulators of the robust refinement.
/// * `range_low`, `range_high` – quantile levels of the acceptance window `[q_low, q_high)`.
/// * `min_inv_pt`, `max_inv_pt` – eligibility range `[min, max)` of `q/pT` (1/GeV).
/// * `max_events` – optional cap on the number of source records read by the full pass.
/// * `ntrials` – number of robust refinement trials (no convergence check).
/// * `robust_mode` – [`RobustMode::Trim`] or [`RobustMode::Reweight`].
/// * `trim_quantile` – quantile of the absolute residuals used as trimming cut.
/// * `mad_normalization`, `bisquare_tuning` – robust scale
///   `median(|r|) / mad_normalization × bisquare_tuning`.
///
/// Defaults
/// -----------------
/// * `view_mode`: `Split`
/// * `cache_size`: 10 000
/// * `range_low` / `range_high`: 0.05 / 0.95
/// * `min_inv_pt` / `max_inv_pt`: −1/3 / +1/3
/// * `max_events`: `None`
/// * `ntrials`: 3
/// * `robust_mode`: `Trim`
/// * `trim_quantile`: 0.90
/// * `mad_normalization`: 0.6745
/// * `bisquare_tuning`: 4.685
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FitParams {
    pub view_mode: ViewMode,
    pub cache_size: usize,
    pub range_low: f64,
    pub range_high: f64,
    pub min_inv_pt: f64,
    pub max_inv_pt: f64,
    pub max_events: Option<usize>,

    pub ntrials: usize,
    pub robust_mode: RobustMode,
    pub trim_quantile: f64,
    pub mad_normalization: f64,
    pub bisquare_tuning: f64,
}

impl FitParams {
    /// Equivalent to [`FitParams::default()`].
    pub fn new() -> Self {
        Self::default()
    }

    pub fn builder() -> FitParamsBuilder {
        FitParamsBuilder::new()
    }

    /// Feature-vector dimension of each feature space.
    pub fn n_variables(&self) -> usize {
        match self.view_mode {
            ViewMode::Split => N_VARIABLES_VIEW,
            ViewMode::Combined => N_VARIABLES_COMBINED,
        }
    }

    /// Parameter-vector dimension of each feature space.
    pub fn n_parameters(&self) -> usize {
        match self.view_mode {
            ViewMode::Split => N_PARAMETERS_VIEW,
            ViewMode::Combined => N_PARAMETERS_COMBINED,
        }
    }

    /// Feature spaces instantiated for this configuration, in output order.
    pub fn feature_spaces(&self) -> Vec<FeatureSpace> {
        match self.view_mode {
            ViewMode::Split => vec![FeatureSpace::Transverse, FeatureSpace::Longitudinal],
            ViewMode::Combined => vec![FeatureSpace::Combined],
        }
    }

    /// Whether a signed inverse transverse momentum passes the eligibility range.
    #[inline]
    pub fn is_eligible(&self, inv_pt: f64) -> bool {
        self.min_inv_pt <= inv_pt && inv_pt < self.max_inv_pt
    }
}

impl Default for FitParams {
    fn default() -> Self {
        FitParams {
            view_mode: ViewMode::Split,
            cache_size: DEFAULT_CACHE_SIZE,
            range_low: DEFAULT_RANGE_LOW,
            range_high: DEFAULT_RANGE_HIGH,
            min_inv_pt: DEFAULT_MIN_INV_PT,
            max_inv_pt: DEFAULT_MAX_INV_PT,
            max_events: None,

            ntrials: DEFAULT_NTRIALS,
            robust_mode: RobustMode::Trim,
            trim_quantile: DEFAULT_TRIM_QUANTILE,
            mad_normalization: MAD_NORMALIZATION,
            bisquare_tuning: BISQUARE_TUNING,
        }
    }
}

/// Builder for [`FitParams`], with validation.
#[derive(Debug, Clone)]
pub struct FitParamsBuilder {
    params: FitParams,
}

impl Default for FitParamsBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl FitParamsBuilder {
    pub fn new() -> Self {
        Self {
            params: FitParams::default(),
        }
    }

    pub fn view_mode(mut self, v: ViewMode) -> Self {
        self.params.view_mode = v;
        self
    }
    pub fn cache_size(mut self, v: usize) -> Self {
        self.params.cache_size = v;
        self
    }
    pub fn range_quantiles(mut self, low: f64, high: f64) -> Self {
        self.params.range_low = low;
        self.params.range_high = high;
        self
    }
    pub fn inv_pt_range(mut self, min: f64, max: f64) -> Self {
        self.params.min_inv_pt = min;
        self.params.max_inv_pt = max;
        self
    }
    pub fn max_events(mut self, v: usize) -> Self {
        self.params.max_events = Some(v);
        self
    }

    pub fn ntrials(mut self, v: usize) -> Self {
        self.params.ntrials = v;
        self
    }
    pub fn robust_mode(mut self, v: RobustMode) -> Self {
        self.params.robust_mode = v;
        self
    }
    pub fn trim_quantile(mut self, v: f64) -> Self {
        self.params.trim_quantile = v;
        self
    }
    pub fn mad_normalization(mut self, v: f64) -> Self {
        self.params.mad_normalization = v;
        self
    }
    pub fn bisquare_tuning(mut self, v: f64) -> Self {
        self.params.bisquare_tuning = v;
        self
    }

    /// Return true iff x > 0.0 and comparable (i.e., not NaN).
    #[inline]
    fn gt0(x: f64) -> bool {
        x.partial_cmp(&0.0) == Some(Greater)
    }

    /// Return true iff x ∈ [0, 1] and comparable (i.e., not NaN).
    #[inline]
    fn in_unit(x: f64) -> bool {
        matches!(x.partial_cmp(&0.0), Some(Greater) | Some(Equal))
            && matches!(x.partial_cmp(&1.0), Some(Less) | Some(Equal))
    }

    /// Return true iff a < b and comparable (i.e., not NaN).
    #[inline]
    fn lt(a: f64, b: f64) -> bool {
        a.partial_cmp(&b) == Some(Less)
    }

    /// Finalize the builder and produce a [`FitParams`] instance.
    ///
    /// Validation rules
    /// -----------------
    /// * `cache_size ≥ 1` – the bootstrap pass must retain at least one event.
    /// * `0 ≤ range_low < range_high ≤ 1`.
    /// * `0 < trim_quantile ≤ 1`.
    /// * `mad_normalization > 0`, `bisquare_tuning > 0`.
    /// * `min_inv_pt < max_inv_pt`.
    /// * `max_events ≥ 1` when set.
    ///
    /// `ntrials = 0` is accepted: the pipeline then returns the plain
    /// least-squares fit without robust refinement.
    ///
    /// Returns
    /// -----------------
    /// * `Ok(FitParams)` if all values are valid.
    /// * `Err(TrackPcaError::InvalidFitParameter)` if any validation rule fails.
    pub fn build(self) -> Result<FitParams, TrackPcaError> {
        let p = &self.params;

        if p.cache_size == 0 {
            return Err(TrackPcaError::InvalidFitParameter(
                "cache_size must be >= 1".into(),
            ));
        }
        if !(Self::in_unit(p.range_low)
            && Self::in_unit(p.range_high)
            && Self::lt(p.range_low, p.range_high))
        {
            return Err(TrackPcaError::InvalidFitParameter(
                "require 0 <= range_low < range_high <= 1".into(),
            ));
        }
        if !(Self::gt0(p.trim_quantile) && Self::in_unit(p.trim_quantile)) {
            return Err(TrackPcaError::InvalidFitParameter(
                "trim_quantile must lie in (0, 1]".into(),
            ));
        }
        if !Self::gt0(p.mad_normalization) {
            return Err(TrackPcaError::InvalidFitParameter(
                "mad_normalization must be > 0".into(),
            ));
        }
        if !Self::gt0(p.bisquare_tuning) {
            return Err(TrackPcaError::InvalidFitParameter(
                "bisquare_tuning must be > 0".into(),
            ));
        }
        if !Self::lt(p.min_inv_pt, p.max_inv_pt) {
            return Err(TrackPcaError::InvalidFitParameter(
                "require min_inv_pt < max_inv_pt".into(),
            ));
        }
        if p.max_events == Some(0) {
            return Err(TrackPcaError::InvalidFitParameter(
                "max_events must be >= 1".into(),
            ));
        }

        Ok(self.params)
    }
}

impl fmt::Display for FitParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if f.alternate() {
            const PARAM_COL: usize = 42;
            writeln!(f, "Matrix Builder Parameters")?;
            writeln!(f, "-------------------------")?;

            macro_rules! line {
                ($fmt:expr, $val:expr, $comment:expr) => {{
                    let s = format!($fmt, $val);
                    let pad = if s.len() < PARAM_COL {
                        " ".repeat(PARAM_COL - s.len())
                    } else {
                        " ".to_string()
                    };
                    writeln!(f, "  {}{}# {}", s, pad, $comment)
                }};
            }

            writeln!(f, "[Acceptance]")?;
            line!("view_mode         = {:?}", self.view_mode, "Feature space layout")?;
            line!("cache_size        = {}", self.cache_size, "Bootstrap / residual cache")?;
            line!("range_low         = {:.3}", self.range_low, "Lower window quantile")?;
            line!("range_high        = {:.3}", self.range_high, "Upper window quantile")?;
            line!("min_inv_pt        = {:.4}", self.min_inv_pt, "Lowest accepted q/pT")?;
            line!("max_inv_pt        = {:.4}", self.max_inv_pt, "Highest q/pT (excluded)")?;
            line!("max_events        = {:?}", self.max_events, "Cap on records read")?;

            writeln!(f, "\n[Robust refinement]")?;
            line!("ntrials           = {}", self.ntrials, "Number of IRLS trials")?;
            line!("robust_mode       = {:?}", self.robust_mode, "Trim or bisquare reweight")?;
            line!("trim_quantile     = {:.3}", self.trim_quantile, "Residual quantile as cut")?;
            line!("mad_normalization = {:.4}", self.mad_normalization, "MAD to sigma factor")?;
            line!("bisquare_tuning   = {:.3}", self.bisquare_tuning, "Bisquare tuning constant")?;

            Ok(())
        } else {
            write!(
                f,
                "FitParams(view={:?}, cache_size={}, window=[q{:.2}, q{:.2}), q/pT∈[{:.3},{:.3}), ntrials={}, mode={:?})",
                self.view_mode,
                self.cache_size,
                self.range_low,
                self.range_high,
                self.min_inv_pt,
                self.max_inv_pt,
                self.ntrials,
                self.robust_mode,
            )
        }
    }
}

#[cfg(test)]
mod fit_params_test {
    use super::*;

    #[test]
    fn test_defaults() {
        let p = FitParams::default();
        assert_eq!(p.cache_size, 10_000);
        assert_eq!(p.ntrials, 3);
        assert_eq!(p.robust_mode, RobustMode::Trim);
        assert_eq!(p.n_variables(), 6);
        assert_eq!(p.n_parameters(), 2);
        assert_eq!(
            p.feature_spaces(),
            vec![FeatureSpace::Transverse, FeatureSpace::Longitudinal]
        );
        assert_eq!(FitParams::builder().build().unwrap(), p);
    }

    #[test]
    fn test_eligibility_is_half_open() {
        let p = FitParams::default();
        assert!(p.is_eligible(-1.0 / 3.0));
        assert!(p.is_eligible(0.0));
        assert!(!p.is_eligible(1.0 / 3.0));
        assert!(!p.is_eligible(f64::NAN));
    }

    #[test]
    fn test_builder_validation() {
        let err = FitParams::builder().cache_size(0).build().unwrap_err();
        assert_eq!(
            err,
            TrackPcaError::InvalidFitParameter("cache_size must be >= 1".into())
        );
        assert!(FitParams::builder()
            .range_quantiles(0.95, 0.05)
            .build()
            .is_err());
        assert!(FitParams::builder()
            .range_quantiles(f64::NAN, 0.5)
            .build()
            .is_err());
        assert!(FitParams::builder().trim_quantile(0.0).build().is_err());
        assert!(FitParams::builder().bisquare_tuning(-1.0).build().is_err());
        assert!(FitParams::builder().inv_pt_range(0.2, 0.1).build().is_err());
        assert!(FitParams::builder().max_events(0).build().is_err());
        assert!(FitParams::builder().ntrials(0).build().is_ok());
    }

    #[test]
    fn test_display_styles() {
        let p = FitParams::default();
        let compact = format!("{p}");
        assert!(compact.starts_with("FitParams(view=Split"));
        let pretty = format!("{p:#}");
        assert!(pretty.contains("[Robust refinement]"));
        assert!(pretty.contains("ntrials           = 3"));
    }
}
