//! # Streaming weighted moments
//!
//! [`StreamAccumulator`] maintains, in a single pass and with O(d²) memory
//! per update, the weighted mean vector and the weighted co-moment matrix of
//! a stream of `d`-dimensional vectors. Optionally it also tracks the
//! cross co-moment against a second *covariate* vector of dimension `q`,
//! which is what the least-squares stage needs to regress parameters on
//! principal components.
//!
//! ## Update rule
//! -----------------
//! For a sample `x` with weight `w > 0` (West, 1979):
//!
//! ```text
//! W  ← W + w
//! δ  = x − μ            (before update)
//! μ  ← μ + (w / W) · δ
//! C  ← C + w · δ · (x − μ)ᵗ
//! ```
//!
//! and the same for the cross term with `(y − ν)` taken *after* the update
//! of the covariate mean `ν`. The population covariance is `C / W`.
//! The update never subtracts two large sums, so it stays accurate over
//! arbitrarily long streams.
//!
//! ## Quantile cache
//! -----------------
//! Quantiles cannot be computed from moments, so raw samples are retained
//! according to a [`CacheMode`]:
//!
//! * [`CacheMode::Unbounded`] – every sample is kept, quantiles are exact.
//! * [`CacheMode::Bounded`] – only the **first** `capacity` samples are kept
//!   (accept-first-N, no reservoir replacement); quantiles are approximate.
//! * [`CacheMode::Disabled`] – nothing is kept; quantile queries fail.
//!
//! Samples added with weight zero are never cached, so a zero-weight `add`
//! leaves the accumulator bit-identical.
//!
//! ## Example
//! -----------------
//! ```rust
//! use nalgebra::DVector;
//! use trackpca::stats::StreamAccumulator;
//!
//! let mut acc = StreamAccumulator::new(2);
//! for (a, b) in [(1.0, 1.0), (2.0, 2.0), (3.0, 3.0)] {
//!     acc.add(&DVector::from_vec(vec![a, b])).unwrap();
//! }
//! acc.add_weighted(&DVector::from_vec(vec![4.0, 10.0]), 0.0, None).unwrap();
//!
//! let mean = acc.mean().unwrap();
//! assert!((mean - DVector::from_vec(vec![2.0, 2.0])).norm() < 1e-12);
//! ```
use std::fmt;

use itertools::Itertools;
use nalgebra::{DMatrix, DVector};

use crate::stats::quantile::{sort_column, sorted_quantile};
use crate::trackpca_errors::TrackPcaError;

/// Retention policy of raw samples used to answer quantile queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheMode {
    Unbounded,
    Bounded(usize),
    Disabled,
}

#[derive(Debug, Clone, PartialEq)]
struct CovariateMoments {
    mean: DVector<f64>,
    comoment: DMatrix<f64>,
}

/// Running weighted mean, covariance and cross-covariance of a vector stream.
///
/// See the [module documentation](crate::stats::stream_accumulator) for the
/// update rule and the cache semantics.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamAccumulator {
    dim: usize,
    cache_mode: CacheMode,
    weight_sum: f64,
    mean: DVector<f64>,
    comoment: DMatrix<f64>,
    covariate: Option<CovariateMoments>,
    cache: Vec<DVector<f64>>,
}

impl StreamAccumulator {
    /// Create an empty accumulator of dimension `dim` with an unbounded (exact) quantile cache.
    pub fn new(dim: usize) -> Self {
        StreamAccumulator {
            dim,
            cache_mode: CacheMode::Unbounded,
            weight_sum: 0.0,
            mean: DVector::zeros(dim),
            comoment: DMatrix::zeros(dim, dim),
            covariate: None,
            cache: Vec::new(),
        }
    }

    /// Bound the quantile cache to the first `capacity` samples.
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.cache_mode = CacheMode::Bounded(capacity);
        self.cache = Vec::with_capacity(capacity.min(1 << 16));
        self
    }

    /// Do not retain any raw sample (moments only).
    pub fn without_cache(mut self) -> Self {
        self.cache_mode = CacheMode::Disabled;
        self.cache = Vec::new();
        self
    }

    /// Track the cross-covariance against a covariate vector of dimension `covariate_dim`.
    ///
    /// Once configured, every [`add_weighted`](Self::add_weighted) call must
    /// supply a covariate, and [`covariance`](Self::covariance) returns the
    /// `dim × covariate_dim` cross-covariance.
    pub fn with_covariate(mut self, covariate_dim: usize) -> Self {
        self.covariate = Some(CovariateMoments {
            mean: DVector::zeros(covariate_dim),
            comoment: DMatrix::zeros(self.dim, covariate_dim),
        });
        self
    }

    /// Add one sample with unit weight.
    ///
    /// Fails with [`TrackPcaError::DimensionMismatch`] if `x` does not have
    /// the configured dimension, or if the accumulator tracks a covariate.
    pub fn add(&mut self, x: &DVector<f64>) -> Result<(), TrackPcaError> {
        self.add_weighted(x, 1.0, None)
    }

    /// Add one sample with an explicit weight and optional covariate.
    ///
    /// Arguments
    /// -----------------
    /// * `x`: sample of dimension [`dim`](Self::dim).
    /// * `weight`: non-negative weight. A weight of exactly `0.0` is a no-op
    ///   (after the dimension checks). Negative weights are not supported.
    /// * `covariate`: required iff the accumulator was built
    ///   [`with_covariate`](Self::with_covariate), with matching dimension.
    ///
    /// Return
    /// ----------
    /// * `Ok(())` on success.
    /// * `Err(TrackPcaError::DimensionMismatch)` on a contract violation.
    pub fn add_weighted(
        &mut self,
        x: &DVector<f64>,
        weight: f64,
        covariate: Option<&DVector<f64>>,
    ) -> Result<(), TrackPcaError> {
        if x.len() != self.dim {
            return Err(TrackPcaError::DimensionMismatch {
                what: "sample",
                expected: self.dim,
                found: x.len(),
            });
        }
        let expected_q = self.covariate_dim();
        let found_q = covariate.map_or(0, |y| y.len());
        if expected_q != found_q || (self.covariate.is_some() && covariate.is_none()) {
            return Err(TrackPcaError::DimensionMismatch {
                what: "covariate",
                expected: expected_q,
                found: found_q,
            });
        }

        if weight == 0.0 {
            return Ok(());
        }

        self.weight_sum += weight;
        let ratio = weight / self.weight_sum;

        let delta = x - &self.mean;
        self.mean.axpy(ratio, &delta, 1.0);
        let delta_after = x - &self.mean;
        self.comoment.ger(weight, &delta, &delta_after, 1.0);

        if let (Some(moments), Some(y)) = (self.covariate.as_mut(), covariate) {
            let y_delta = y - &moments.mean;
            moments.mean.axpy(ratio, &y_delta, 1.0);
            let y_delta_after = y - &moments.mean;
            moments.comoment.ger(weight, &delta, &y_delta_after, 1.0);
        }

        let keep = match self.cache_mode {
            CacheMode::Unbounded => true,
            CacheMode::Bounded(capacity) => self.cache.len() < capacity,
            CacheMode::Disabled => false,
        };
        if keep {
            self.cache.push(x.clone());
        }

        Ok(())
    }

    /// Total weight added so far (the event count when all weights are one).
    #[inline]
    pub fn count(&self) -> f64 {
        self.weight_sum
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.weight_sum == 0.0
    }

    #[inline]
    pub fn dim(&self) -> usize {
        self.dim
    }

    /// Dimension of the tracked covariate, `0` when none is tracked.
    #[inline]
    pub fn covariate_dim(&self) -> usize {
        self.covariate.as_ref().map_or(0, |m| m.mean.len())
    }

    #[inline]
    pub fn cache_mode(&self) -> CacheMode {
        self.cache_mode
    }

    /// Number of raw samples currently held by the quantile cache.
    #[inline]
    pub fn cached_len(&self) -> usize {
        self.cache.len()
    }

    /// Weighted running mean.
    ///
    /// Fails with [`TrackPcaError::EmptyAccumulator`] when no weight has been accumulated.
    pub fn mean(&self) -> Result<DVector<f64>, TrackPcaError> {
        self.ensure_not_empty("mean")?;
        Ok(self.mean.clone())
    }

    /// Weighted running mean of the covariate vector.
    pub fn covariate_mean(&self) -> Result<DVector<f64>, TrackPcaError> {
        self.ensure_not_empty("covariate mean")?;
        self.covariate
            .as_ref()
            .map(|m| m.mean.clone())
            .ok_or(TrackPcaError::DimensionMismatch {
                what: "covariate",
                expected: 0,
                found: 0,
            })
    }

    /// Per-dimension population variance (diagonal of [`auto_covariance`](Self::auto_covariance)).
    pub fn variance(&self) -> Result<DVector<f64>, TrackPcaError> {
        Ok(self.auto_covariance()?.diagonal())
    }

    /// Population covariance normalized by the total weight.
    ///
    /// Return
    /// ----------
    /// * the `dim × dim` covariance when no covariate is tracked,
    /// * the `dim × covariate_dim` cross-covariance otherwise.
    pub fn covariance(&self) -> Result<DMatrix<f64>, TrackPcaError> {
        self.ensure_not_empty("covariance")?;
        match &self.covariate {
            Some(moments) => Ok(&moments.comoment / self.weight_sum),
            None => Ok(&self.comoment / self.weight_sum),
        }
    }

    /// The `dim × dim` population covariance of the samples themselves, whether
    /// or not a covariate is tracked.
    pub fn auto_covariance(&self) -> Result<DMatrix<f64>, TrackPcaError> {
        self.ensure_not_empty("covariance")?;
        Ok(&self.comoment / self.weight_sum)
    }

    /// Per-dimension quantile at level `p` computed from the retained cache.
    ///
    /// Exact when the cache is unbounded, otherwise computed from the first
    /// `capacity` samples only. Weights are ignored: every cached sample
    /// counts once.
    ///
    /// Arguments
    /// -----------------
    /// * `p`: quantile level in `[0, 1]`.
    ///
    /// Return
    /// ----------
    /// * `Ok(q)` with `q[j]` the quantile of dimension `j`.
    /// * `Err(TrackPcaError::InvalidQuantile)` if `p` is outside `[0, 1]` or NaN.
    /// * `Err(TrackPcaError::EmptyCache)` if no sample was retained.
    pub fn quantile(&self, p: f64) -> Result<DVector<f64>, TrackPcaError> {
        if !(0.0..=1.0).contains(&p) {
            return Err(TrackPcaError::InvalidQuantile(p));
        }
        if self.cache.is_empty() {
            return Err(TrackPcaError::EmptyCache);
        }

        let mut column = Vec::with_capacity(self.cache.len());
        let values = (0..self.dim).map(|j| {
            column.clear();
            column.extend(self.cache.iter().map(|x| x[j]));
            sort_column(&mut column);
            sorted_quantile(&column, p)
        });
        Ok(DVector::from_iterator(self.dim, values))
    }

    fn ensure_not_empty(&self, what: &'static str) -> Result<(), TrackPcaError> {
        if self.is_empty() {
            Err(TrackPcaError::EmptyAccumulator(what))
        } else {
            Ok(())
        }
    }
}

impl fmt::Display for StreamAccumulator {
    /// Compact by default; multi-line summary with the alternate flag (`{:#}`).
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let fmt_vec = |v: &DVector<f64>| v.iter().map(|x| format!("{x:.6e}")).join(", ");

        if self.is_empty() {
            return write!(f, "StreamAccumulator(dim={}, empty)", self.dim);
        }
        let variance = self.comoment.diagonal() / self.weight_sum;

        if f.alternate() {
            writeln!(f, "count: {}", self.weight_sum)?;
            writeln!(f, "mean : [{}]", fmt_vec(&self.mean))?;
            write!(f, "var  : [{}]", fmt_vec(&variance))
        } else {
            write!(
                f,
                "StreamAccumulator(dim={}, count={}, mean=[{}])",
                self.dim,
                self.weight_sum,
                fmt_vec(&self.mean)
            )
        }
    }
}
