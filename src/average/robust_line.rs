//! # Robust straight-line regression (RANSAC)
//!
//! Fits `y = slope · x + intercept` while ignoring outliers: candidate lines
//! through two points are scored by the number of points whose residual is
//! below a threshold, and the final line is the least-squares fit of the
//! inliers of the best candidate.
//!
//! * The threshold is the median absolute deviation of `y`, bounded below by
//!   [`MIN_RESIDUAL_THRESHOLD`] so that noiseless data still has inliers.
//! * When the number of point pairs does not exceed `max_trials`, every pair
//!   is tried, otherwise `max_trials` pairs are drawn from a generator seeded
//!   with `seed`. Either way the fit is deterministic.
//! * Among candidates with the same inlier count, the lowest inlier sum of
//!   squared residuals wins; the first one on exact ties.
use itertools::Itertools;
use rand::{rngs::StdRng, Rng, SeedableRng};

use crate::constants::MIN_RESIDUAL_THRESHOLD;
use crate::nan_stats::nan_mad;

/// Line fitted by [`fit_robust_line`].
#[derive(Debug, Clone, PartialEq)]
pub struct RobustLineFit {
    pub slope: f64,
    pub intercept: f64,
    /// Inliers of the best candidate line, in input order.
    pub inlier_mask: Vec<bool>,
    pub residual_threshold: f64,
}

impl RobustLineFit {
    pub fn predict(&self, x: f64) -> f64 {
        self.slope * x + self.intercept
    }

    pub fn n_inliers(&self) -> usize {
        self.inlier_mask.iter().filter(|&&b| b).count()
    }
}

struct Candidate {
    inliers: Vec<bool>,
    count: usize,
    sse: f64,
}

/// Ordinary least squares on the selected points. `None` when fewer than two
/// points are selected or all their abscissae coincide.
fn least_squares(x: &[f64], y: &[f64], mask: &[bool]) -> Option<(f64, f64)> {
    let (xs, ys): (Vec<f64>, Vec<f64>) = x
        .iter()
        .zip(y)
        .zip(mask)
        .filter(|(_, &m)| m)
        .map(|((&a, &b), _)| (a, b))
        .unzip();
    let n = xs.len() as f64;
    if xs.len() < 2 {
        return None;
    }
    let mx = xs.iter().sum::<f64>() / n;
    let my = ys.iter().sum::<f64>() / n;
    let sxx: f64 = xs.iter().map(|a| (a - mx).powi(2)).sum();
    let sxy: f64 = xs.iter().zip(&ys).map(|(a, b)| (a - mx) * (b - my)).sum();
    if sxx == 0.0 {
        return None;
    }
    let slope = sxy / sxx;
    Some((slope, my - slope * mx))
}

fn candidate_pairs(n: usize, max_trials: usize, seed: u64) -> Vec<(usize, usize)> {
    let total = n * (n - 1) / 2;
    if total <= max_trials {
        return (0..n).tuple_combinations().collect();
    }
    let mut rng = StdRng::seed_from_u64(seed);
    (0..max_trials)
        .map(|_| {
            let i = rng.random_range(0..n);
            let j = rng.random_range(0..n - 1);
            (i, if j >= i { j + 1 } else { j })
        })
        .collect()
}

/// Robust fit of `y` against `x`.
///
/// Arguments
/// -----------------
/// * `x`, `y` – finite samples of equal length.
/// * `max_trials` – maximum number of candidate lines.
/// * `seed` – seed of the pair sampler.
///
/// Return
/// ----------
/// * `None` when there are fewer than two points or every abscissa is the same.
pub fn fit_robust_line(x: &[f64], y: &[f64], max_trials: usize, seed: u64) -> Option<RobustLineFit> {
    let n = x.len().min(y.len());
    if n < 2 {
        return None;
    }
    let (x, y) = (&x[..n], &y[..n]);
    let residual_threshold = nan_mad(y).max(MIN_RESIDUAL_THRESHOLD);

    let mut best: Option<Candidate> = None;
    for (i, j) in candidate_pairs(n, max_trials, seed) {
        let dx = x[j] - x[i];
        if dx == 0.0 {
            continue;
        }
        let slope = (y[j] - y[i]) / dx;
        let intercept = y[i] - slope * x[i];

        let residuals: Vec<f64> = x
            .iter()
            .zip(y)
            .map(|(a, b)| (b - (slope * a + intercept)).abs())
            .collect();
        let inliers: Vec<bool> = residuals.iter().map(|r| *r <= residual_threshold).collect();
        let count = inliers.iter().filter(|&&b| b).count();
        let sse = residuals
            .iter()
            .zip(&inliers)
            .filter(|(_, &m)| m)
            .map(|(r, _)| r * r)
            .sum::<f64>();

        let better = match &best {
            None => true,
            Some(b) => count > b.count || (count == b.count && sse < b.sse),
        };
        if better {
            best = Some(Candidate { inliers, count, sse });
        }
    }

    let all = vec![true; n];
    let inlier_mask = best.map_or(all.clone(), |b| b.inliers);
    let (slope, intercept) =
        least_squares(x, y, &inlier_mask).or_else(|| least_squares(x, y, &all))?;

    Some(RobustLineFit {
        slope,
        intercept,
        inlier_mask,
        residual_threshold,
    })
}

#[cfg(test)]
mod robust_line_test {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_ignores_outliers() {
        let x: Vec<f64> = (0..20).map(|i| i as f64).collect();
        let mut y: Vec<f64> = x.iter().map(|v| 0.5 * v - 1.0).collect();
        y[3] = 40.0;
        y[15] = -30.0;

        let fit = fit_robust_line(&x, &y, 1000, 0).unwrap();
        assert_abs_diff_eq!(fit.slope, 0.5, epsilon = 1e-12);
        assert_abs_diff_eq!(fit.intercept, -1.0, epsilon = 1e-12);
        assert!(!fit.inlier_mask[3] && !fit.inlier_mask[15]);
        assert_eq!(fit.n_inliers(), 18);
        assert_abs_diff_eq!(fit.predict(2.0), 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_sampled_trials_are_deterministic() {
        let x: Vec<f64> = (0..200).map(|i| i as f64 * 0.1).collect();
        let y: Vec<f64> = x
            .iter()
            .enumerate()
            .map(|(i, v)| -2.0 * v + if i % 17 == 0 { 25.0 } else { 0.0 })
            .collect();
        let a = fit_robust_line(&x, &y, 50, 7).unwrap();
        let b = fit_robust_line(&x, &y, 50, 7).unwrap();
        assert_eq!(a, b);
        assert_abs_diff_eq!(a.slope, -2.0, epsilon = 1e-9);
    }

    #[test]
    fn test_degenerate_inputs() {
        assert!(fit_robust_line(&[1.0], &[2.0], 10, 0).is_none());
        assert!(fit_robust_line(&[1.0, 1.0, 1.0], &[0.0, 1.0, 2.0], 10, 0).is_none());
    }
}
