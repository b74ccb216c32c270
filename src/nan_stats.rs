//! NaN-aware reductions.
//!
//! Missing samples are stored as `NaN` throughout the crate so that indices
//! stay aligned to absolute frame numbers. The helpers below skip those
//! samples the same way the reductions of a numerical array library would:
//!
//! * [`nansum`] of an all-NaN (or empty) slice is `0.0`,
//! * [`nanmean`], [`nanstd`], [`nanmedian`] and [`nan_mad`] of an all-NaN slice are `NaN`.
//!
//! Selection helpers ([`first_argmin`], [`first_argmax`]) fix the tie-break
//! policy used everywhere a "best" candidate is picked: the **first** extremum
//! in iteration order wins and `NaN` never wins.
use std::cmp::Ordering;

use itertools::Itertools;

use crate::constants::Radian;

/// Sum of the finite-or-infinite (non-NaN) values.
pub fn nansum(values: &[f64]) -> f64 {
    values.iter().filter(|v| !v.is_nan()).sum()
}

/// Number of non-NaN values.
pub fn nancount(values: &[f64]) -> usize {
    values.iter().filter(|v| !v.is_nan()).count()
}

pub fn nanmean(values: &[f64]) -> f64 {
    let n = nancount(values);
    if n == 0 {
        return f64::NAN;
    }
    nansum(values) / n as f64
}

/// Population standard deviation (`ddof = 0`) of the non-NaN values.
pub fn nanstd(values: &[f64]) -> f64 {
    let mean = nanmean(values);
    if mean.is_nan() {
        return f64::NAN;
    }
    let n = nancount(values) as f64;
    let var = values
        .iter()
        .filter(|v| !v.is_nan())
        .map(|v| (v - mean).powi(2))
        .sum::<f64>()
        / n;
    var.sqrt()
}

/// Median of the non-NaN values; the mean of the two central values for an even count.
pub fn nanmedian(values: &[f64]) -> f64 {
    let sorted: Vec<f64> = values
        .iter()
        .copied()
        .filter(|v| !v.is_nan())
        .sorted_by(|a, b| a.total_cmp(b))
        .collect();
    let n = sorted.len();
    match n {
        0 => f64::NAN,
        _ if n % 2 == 1 => sorted[n / 2],
        _ => 0.5 * (sorted[n / 2 - 1] + sorted[n / 2]),
    }
}

/// Median absolute deviation from the median, ignoring NaN.
pub fn nan_mad(values: &[f64]) -> f64 {
    let median = nanmedian(values);
    let deviations: Vec<f64> = values.iter().map(|v| (v - median).abs()).collect();
    nanmedian(&deviations)
}

/// Mean direction of a set of angles.
///
/// Angles are only defined modulo 2π, so the arithmetic mean of `{0, 2π - ε}`
/// would be ≈ π. The mean of the cosines and of the sines is invariant under
/// that ambiguity and the angle is recovered with `atan2`.
pub fn circular_mean(angles: &[Radian]) -> Radian {
    let n = angles.len() as f64;
    let (sum_sin, sum_cos) = angles
        .iter()
        .fold((0.0, 0.0), |(s, c), a| (s + a.sin(), c + a.cos()));
    (sum_sin / n).atan2(sum_cos / n)
}

/// Index of the first minimum, ignoring NaN. `None` when every value is NaN.
pub fn first_argmin(values: &[f64]) -> Option<usize> {
    first_extremum(values, Ordering::Less)
}

/// Index of the first maximum, ignoring NaN. `None` when every value is NaN.
pub fn first_argmax(values: &[f64]) -> Option<usize> {
    first_extremum(values, Ordering::Greater)
}

fn first_extremum(values: &[f64], wanted: Ordering) -> Option<usize> {
    values
        .iter()
        .enumerate()
        .filter(|(_, v)| !v.is_nan())
        .fold(None, |best: Option<(usize, f64)>, (i, &v)| match best {
            Some((_, b)) if v.partial_cmp(&b) != Some(wanted) => best,
            _ => Some((i, v)),
        })
        .map(|(i, _)| i)
}

#[cfg(test)]
mod nan_stats_test {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_nan_reductions() {
        let v = [1.0, f64::NAN, 3.0, 2.0];
        assert_eq!(nansum(&v), 6.0);
        assert_eq!(nancount(&v), 3);
        assert_eq!(nanmean(&v), 2.0);
        assert_eq!(nanmedian(&v), 2.0);
        assert_abs_diff_eq!(nanstd(&v), (2.0f64 / 3.0).sqrt(), epsilon = 1e-15);

        let empty = [f64::NAN, f64::NAN];
        assert_eq!(nansum(&empty), 0.0);
        assert!(nanmean(&empty).is_nan());
        assert!(nanmedian(&empty).is_nan());
    }

    #[test]
    fn test_nan_mad() {
        let v = [1.0, 2.0, 3.0, 4.0, 100.0, f64::NAN];
        // median 3, deviations 2, 1, 0, 1, 97 -> median 1
        assert_eq!(nan_mad(&v), 1.0);
    }

    #[test]
    fn test_circular_mean_wraps() {
        let eps = 1e-3;
        let m = circular_mean(&[0.0, crate::constants::DPI - eps]);
        assert_abs_diff_eq!(m, -eps / 2.0, epsilon = 1e-12);

        let m = circular_mean(&[std::f64::consts::PI - 0.1, -std::f64::consts::PI + 0.1]);
        assert_abs_diff_eq!(m.abs(), std::f64::consts::PI, epsilon = 1e-12);
    }

    #[test]
    fn test_first_extremum_ties() {
        let v = [3.0, 1.0, f64::NAN, 1.0, 5.0, 5.0];
        assert_eq!(first_argmin(&v), Some(1));
        assert_eq!(first_argmax(&v), Some(4));
        assert_eq!(first_argmin(&[f64::NAN]), None);

        let inf = [f64::INFINITY, f64::INFINITY];
        assert_eq!(first_argmin(&inf), Some(0));
    }
}
