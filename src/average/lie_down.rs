//! # Canonical pose of an averaged trajectory
//!
//! [`lie_down`] moves a trajectory to a reproducible pose so that averages
//! computed against different references can be compared and overlaid:
//!
//! 1. the median position goes to the origin,
//! 2. the principal axis of the intensity-weighted second moments goes along x,
//! 3. the end whose squared abscissae have the larger median goes to positive x,
//! 4. the residual tilt measured by a robust line fit of y on x is removed.
use std::f64::consts::{FRAC_PI_2, PI};

use nalgebra::Vector2;

use crate::nan_stats::{nanmedian, nansum};
use crate::params::AlignParams;
use crate::trajectory::Trajectory;

use super::robust_line::{fit_robust_line, RobustLineFit};

/// Reorient `t` in place. Returns the line fitted in the last step, or `None`
/// when fewer than two finite positions are available (the tilt is then left as is).
pub fn lie_down(t: &mut Trajectory, params: &AlignParams) -> Option<RobustLineFit> {
    let median = Vector2::new(nanmedian(&t.x()), nanmedian(&t.y()));
    if median.x.is_nan() || median.y.is_nan() {
        log::warn!("lie-down skipped: no finite position");
        return None;
    }
    t.translate(&-median, None);

    let (x, y) = (t.x(), t.y());
    let f: Vec<f64> = if t.f().is_empty() {
        vec![1.0; t.len()]
    } else {
        t.f().to_vec()
    };
    let moment = |a: &[f64], b: &[f64]| -> f64 {
        let terms: Vec<f64> = f.iter().zip(a).zip(b).map(|((w, a), b)| w * a * b).collect();
        nansum(&terms)
    };
    let ixx = moment(&y, &y);
    let iyy = moment(&x, &x);
    let ixy = moment(&x, &y);

    let mut theta = (2.0 * ixy).atan2(ixx - iyy) / 2.0;
    // moments about the rotated axes
    let (s, c) = theta.sin_cos();
    let ix = c * c * ixx + s * s * iyy + 2.0 * s * c * ixy;
    let iy = s * s * ixx + c * c * iyy - 2.0 * s * c * ixy;
    if ix > iy {
        theta -= FRAC_PI_2;
    }
    t.rotate(theta, None);

    let x = t.x();
    let positive: Vec<f64> = x.iter().filter(|v| **v > 0.0).map(|v| v * v).collect();
    let negative: Vec<f64> = x.iter().filter(|v| **v < 0.0).map(|v| v * v).collect();
    if nanmedian(&negative) > nanmedian(&positive) {
        t.rotate(PI, None);
    }

    let (fx, fy): (Vec<f64>, Vec<f64>) = t
        .x()
        .into_iter()
        .zip(t.y())
        .filter(|(a, b)| a.is_finite() && b.is_finite())
        .unzip();
    let fit = fit_robust_line(&fx, &fy, params.ransac_max_trials, params.ransac_seed);
    match &fit {
        Some(line) => t.rotate(-line.slope.atan(), None),
        None => log::warn!("lie-down: not enough finite positions for the tilt correction"),
    }
    fit
}

#[cfg(test)]
mod lie_down_test {
    use super::*;
    use approx::assert_abs_diff_eq;
    use nalgebra::Matrix2xX;

    /// Noiseless points on a tilted line, brighter at one end.
    fn tilted(n: usize) -> Trajectory {
        let (s, c) = 1.1f64.sin_cos();
        Trajectory::from_frames((0..n as i64).collect(), 1.0)
            .with_coord(Matrix2xX::from_fn(n, |r, k| {
                let u = k as f64 * k as f64 * 0.05;
                if r == 0 {
                    2.0 + c * u
                } else {
                    -1.0 + s * u
                }
            }))
            .unwrap()
            .with_f((0..n).map(|k| 1.0 + k as f64).collect())
            .unwrap()
    }

    #[test]
    fn test_lies_along_x() {
        let mut t = tilted(21);
        let fit = lie_down(&mut t, &AlignParams::default()).unwrap();
        for v in t.y() {
            assert_abs_diff_eq!(v, 0.0, epsilon = 1e-9);
        }
        assert_abs_diff_eq!(nanmedian(&t.x()), 0.0, epsilon = 1e-9);
        assert_eq!(fit.n_inliers(), 21);
        // quadratic spacing: the far end lies on the positive side
        assert!(t.x()[20] > 0.0);
    }

    #[test]
    fn test_idempotent() {
        let mut once = tilted(21);
        lie_down(&mut once, &AlignParams::default());
        let mut twice = once.clone();
        lie_down(&mut twice, &AlignParams::default());
        for (a, b) in once.x().iter().zip(twice.x()) {
            assert_abs_diff_eq!(*a, b, epsilon = 1e-9);
        }
        for (a, b) in once.y().iter().zip(twice.y()) {
            assert_abs_diff_eq!(*a, b, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_all_nan() {
        let mut t = Trajectory::from_frames(vec![0, 1], 1.0);
        assert!(lie_down(&mut t, &AlignParams::default()).is_none());
    }
}
