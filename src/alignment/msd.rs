//! # Weighted rigid alignment of two trajectories
//!
//! [`msd`] finds the rotation that minimizes the mean square displacement
//! between two equally long trajectories, each recentred on its own weighted
//! centroid. It follows Horn's closed-form solution of absolute orientation,
//! restricted to the plane.
//!
//! Naming
//! -----------------
//! * the **right** trajectory is the reference, its centroid is `rc`,
//! * the **left** trajectory is the one that moves, its centroid is `lc`.
//!
//! Applying a [`RigidAlignment`] to the left trajectory means: translate by
//! `-lc`, rotate by `angle` (counter-clockwise), translate by `rc`.
//!
//! Weights
//! -----------------
//! Every sample is weighted by the product of the two intensities,
//! normalized so that the non-NaN weights sum to one. Samples where either
//! intensity or coordinate is missing contribute nothing to the sums.
use nalgebra::{Rotation2, Vector2};

use crate::constants::Radian;
use crate::nan_stats::nansum;
use crate::trajalign_errors::TrajalignError;
use crate::trajectory::Trajectory;

/// Result of [`msd`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RigidAlignment {
    /// Rotation of the recentred left trajectory onto the recentred right one.
    pub angle: Radian,
    /// Weighted centroid of the right (reference) trajectory.
    pub rc: Vector2<f64>,
    /// Weighted centroid of the left trajectory.
    pub lc: Vector2<f64>,
    /// Weighted mean square residual after alignment; `+∞` when the rotation is undefined.
    pub score: f64,
}

impl RigidAlignment {
    /// Map a point of the left trajectory into the frame of the right one.
    pub fn apply(&self, p: &Vector2<f64>) -> Vector2<f64> {
        Rotation2::new(self.angle) * (p - self.lc) + self.rc
    }
}

/// Rigid alignment of `left` onto `right`.
///
/// Arguments
/// -----------------
/// * `right` – reference trajectory.
/// * `left` – trajectory to be moved; must have the same number of samples.
///
/// Return
/// ----------
/// * the [`RigidAlignment`], or
///   - [`TrajalignError::MissingIntensity`] if either trajectory has no intensity,
///   - [`TrajalignError::LengthMismatch`] if the lengths differ.
///
/// A zero-weight overlap (all products NaN) leaves the angle undefined: the
/// returned angle is `NaN` and the score is `+∞`, so the candidate loses every
/// comparison.
pub fn msd(right: &Trajectory, left: &Trajectory) -> Result<RigidAlignment, TrajalignError> {
    if right.f().is_empty() || left.f().is_empty() {
        return Err(TrajalignError::MissingIntensity);
    }
    if right.len() != left.len() {
        return Err(TrajalignError::LengthMismatch {
            left: left.len(),
            right: right.len(),
        });
    }

    let product: Vec<f64> = right.f().iter().zip(left.f()).map(|(a, b)| a * b).collect();
    let total = nansum(&product);
    let w: Vec<f64> = product.iter().map(|p| p / total).collect();

    let (rx, ry) = (right.x(), right.y());
    let (lx, ly) = (left.x(), left.y());

    let weighted_sum = |a: &[f64], b: &[f64]| -> f64 {
        let terms: Vec<f64> = w.iter().zip(a).zip(b).map(|((w, a), b)| w * a * b).collect();
        nansum(&terms)
    };
    let centroid = |x: &[f64], y: &[f64]| -> Vector2<f64> {
        let ones = vec![1.0; w.len()];
        Vector2::new(weighted_sum(x, &ones), weighted_sum(y, &ones))
    };

    let rc = centroid(&rx, &ry);
    let lc = centroid(&lx, &ly);

    let rx: Vec<f64> = rx.iter().map(|v| v - rc.x).collect();
    let ry: Vec<f64> = ry.iter().map(|v| v - rc.y).collect();
    let lx: Vec<f64> = lx.iter().map(|v| v - lc.x).collect();
    let ly: Vec<f64> = ly.iter().map(|v| v - lc.y).collect();

    let sxx = weighted_sum(&lx, &rx);
    let sxy = weighted_sum(&lx, &ry);
    let syx = weighted_sum(&ly, &rx);
    let syy = weighted_sum(&ly, &ry);

    let a = syx - sxy;
    let b = sxx + syy;
    let theta1 = (-a / b).atan();
    let angle = if b * theta1.cos() >= a * theta1.sin() {
        theta1
    } else {
        theta1 + std::f64::consts::PI
    };

    if angle.is_nan() {
        return Ok(RigidAlignment {
            angle,
            rc,
            lc,
            score: f64::INFINITY,
        });
    }

    let (s, c) = angle.sin_cos();
    let residuals: Vec<f64> = (0..w.len())
        .map(|i| {
            let x = c * lx[i] - s * ly[i];
            let y = s * lx[i] + c * ly[i];
            w[i] * (rx[i] - x).powi(2) + w[i] * (ry[i] - y).powi(2)
        })
        .collect();

    Ok(RigidAlignment {
        angle,
        rc,
        lc,
        score: nansum(&residuals),
    })
}

#[cfg(test)]
mod msd_test {
    use super::*;
    use approx::assert_abs_diff_eq;
    use nalgebra::Matrix2xX;

    fn arc(n: usize) -> Trajectory {
        Trajectory::from_frames((0..n as i64).collect(), 0.1)
            .with_coord(Matrix2xX::from_fn(n, |r, c| {
                let s = c as f64 / n as f64;
                if r == 0 {
                    4.0 * s
                } else {
                    (3.0 * s).sin()
                }
            }))
            .unwrap()
            .with_f((0..n).map(|i| 1.0 + (i as f64 * 0.3).cos().abs()).collect())
            .unwrap()
    }

    #[test]
    fn test_recovers_rigid_motion() {
        let right = arc(30);
        let mut left = right.clone();
        left.rotate(-0.7, None);
        left.translate(&Vector2::new(2.0, -5.0), None);

        let res = msd(&right, &left).unwrap();
        assert_abs_diff_eq!(res.angle, 0.7, epsilon = 1e-10);
        assert_abs_diff_eq!(res.score, 0.0, epsilon = 1e-20);

        let p = Vector2::new(left.coord()[(0, 4)], left.coord()[(1, 4)]);
        let q = res.apply(&p);
        assert_abs_diff_eq!(q.x, right.coord()[(0, 4)], epsilon = 1e-10);
        assert_abs_diff_eq!(q.y, right.coord()[(1, 4)], epsilon = 1e-10);
    }

    #[test]
    fn test_large_rotation_takes_second_branch() {
        let right = arc(20);
        let mut left = right.clone();
        left.rotate(2.5, None);
        let res = msd(&right, &left).unwrap();
        assert_abs_diff_eq!(res.angle.sin(), (-2.5f64).sin(), epsilon = 1e-10);
        assert_abs_diff_eq!(res.angle.cos(), (-2.5f64).cos(), epsilon = 1e-10);
    }

    #[test]
    fn test_swapping_sides_negates_angle() {
        let a = arc(25);
        let mut b = a.clone();
        b.rotate(0.4, None);
        b.translate(&Vector2::new(1.0, 1.0), None);

        let ab = msd(&a, &b).unwrap();
        let ba = msd(&b, &a).unwrap();
        assert_abs_diff_eq!(ab.angle.sin(), -ba.angle.sin(), epsilon = 1e-10);
        assert_abs_diff_eq!(ab.angle.cos(), ba.angle.cos(), epsilon = 1e-10);
        assert_abs_diff_eq!(ab.rc, ba.lc, epsilon = 1e-12);
        assert_abs_diff_eq!(ab.lc, ba.rc, epsilon = 1e-12);
    }

    #[test]
    fn test_nan_overlap_scores_infinite() {
        let mut a = arc(5);
        a.set_values(crate::trajectory::Attribute::F, &[vec![f64::NAN; 5]])
            .unwrap();
        let res = msd(&a, &arc(5)).unwrap();
        assert!(res.angle.is_nan());
        assert_eq!(res.score, f64::INFINITY);
    }

    #[test]
    fn test_preconditions() {
        let no_f = Trajectory::from_frames(vec![0, 1], 1.0);
        assert_eq!(msd(&no_f, &arc(2)), Err(TrajalignError::MissingIntensity));
        assert_eq!(
            msd(&arc(3), &arc(2)),
            Err(TrajalignError::LengthMismatch { left: 2, right: 3 })
        );
    }
}
