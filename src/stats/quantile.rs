//! Order-statistics helpers for the quantile cache of
//! [`StreamAccumulator`](crate::stats::StreamAccumulator).

/// Quantile of an **already sorted** slice, by linear interpolation between
/// the two closest order statistics.
///
/// The fractional rank is `pos = p × (n − 1)`; the result is
/// `a[⌊pos⌋] + (pos − ⌊pos⌋) × (a[⌈pos⌉] − a[⌊pos⌋])`.
/// This is the "linear" convention of most numerical packages: `p = 0`
/// gives the minimum, `p = 1` the maximum and `p = 0.5` the usual median.
///
/// Arguments
/// -----------------
/// * `sorted`: non-empty slice in non-decreasing order.
/// * `p`: quantile level, assumed in `[0, 1]`.
///
/// Return
/// ----------
/// * The interpolated quantile value.
pub(crate) fn sorted_quantile(sorted: &[f64], p: f64) -> f64 {
    debug_assert!(!sorted.is_empty());
    let n = sorted.len();
    let pos = p * (n as f64 - 1.0);
    let lo = (pos.floor() as usize).min(n - 1);
    let hi = (pos.ceil() as usize).min(n - 1);
    let frac = pos - lo as f64;
    sorted[lo] + frac * (sorted[hi] - sorted[lo])
}

/// Sort a column of values in place with a total order (NaN sorted last).
#[inline]
pub(crate) fn sort_column(values: &mut [f64]) {
    values.sort_unstable_by(|a, b| a.total_cmp(b));
}

#[cfg(test)]
mod quantile_test {
    use super::*;

    #[test]
    fn test_sorted_quantile_endpoints() {
        let a = [1.0, 2.0, 4.0, 8.0];
        assert_eq!(sorted_quantile(&a, 0.0), 1.0);
        assert_eq!(sorted_quantile(&a, 1.0), 8.0);
    }

    #[test]
    fn test_sorted_quantile_interpolates() {
        let a = [1.0, 2.0, 4.0, 8.0];
        // pos = 1.5 → halfway between 2 and 4
        assert_eq!(sorted_quantile(&a, 0.5), 3.0);
        // pos = 0.3
        assert!((sorted_quantile(&a, 0.1) - 1.3).abs() < 1e-12);
    }

    #[test]
    fn test_single_element() {
        assert_eq!(sorted_quantile(&[42.0], 0.37), 42.0);
    }

    #[test]
    fn test_sort_column_nan_last() {
        let mut v = [3.0, f64::NAN, -1.0, 2.0];
        sort_column(&mut v);
        assert_eq!(&v[..3], &[-1.0, 2.0, 3.0]);
        assert!(v[3].is_nan());
    }
}
