//! # Pairwise transform matrix and per-reference mean transforms
//!
//! Entry `(i, j)` of a [`TransformMatrix`] describes how trajectory `j` maps
//! onto trajectory `i`:
//!
//! * `angles[(i, j)]` – rotation of `j` onto `i`,
//! * `lags[(i, j)]` – frame lag of `j` relative to `i` (frame `k` of `i`
//!   matches frame `k + lag` of `j`),
//! * `centroids[(i, j)]` – weighted centroid of trajectory `i` on the frames
//!   it shares with `j`,
//! * `scores[(i, j)]` – residual of the pairwise alignment.
//!
//! Only `i > j` is computed; the other half follows from antisymmetry
//! (`angles` and `lags`) or from swapping the two centroids of the pair.
//!
//! [`TransformMatrix::mean_transforms`] then expresses every trajectory in
//! the frame of one reference `r`, averaging over all the paths `j → k → r`
//! so that no single pairwise alignment dominates.
use std::fmt;

use nalgebra::{DMatrix, Vector2};

use crate::constants::{Frame, Radian};
use crate::nan_stats::circular_mean;
use crate::trajalign_errors::TrajalignError;
use crate::trajectory::Trajectory;

use super::lag_search::PairAlignment;

#[derive(Debug, Clone, PartialEq)]
pub struct TransformMatrix {
    pub angles: DMatrix<Radian>,
    pub lags: DMatrix<Frame>,
    pub centroids: DMatrix<Vector2<f64>>,
    pub scores: DMatrix<f64>,
}

/// Transform bringing one trajectory into the frame of a chosen reference.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MeanTransform {
    pub angle: Radian,
    pub lag: Frame,
    /// Mean centroid of the trajectory over all its pairwise alignments.
    pub centroid: Vector2<f64>,
    /// Mean centroid of the reference over all its pairwise alignments.
    pub reference_centroid: Vector2<f64>,
}

impl MeanTransform {
    /// Translate by `-centroid`, rotate by `angle`, translate by
    /// `reference_centroid` and lag by `lag` frames, in place.
    pub fn apply(&self, t: &mut Trajectory) -> Result<(), TrajalignError> {
        t.translate(&-self.centroid, None);
        t.rotate(self.angle, None);
        t.translate(&self.reference_centroid, None);
        t.lag(self.lag)
    }
}

impl TransformMatrix {
    /// Assemble the full matrices from the lower-triangle alignments.
    ///
    /// Arguments
    /// -----------------
    /// * `n` – number of trajectories.
    /// * `pairs` – `(i, j, alignment)` with `i > j`, `i` being the reference.
    ///
    /// Entries missing from `pairs` stay at zero (score `NaN`).
    pub fn from_pairs(n: usize, pairs: &[(usize, usize, PairAlignment)]) -> Self {
        let mut angles = DMatrix::<Radian>::zeros(n, n);
        let mut lags = DMatrix::<Frame>::zeros(n, n);
        let mut centroids = DMatrix::from_element(n, n, Vector2::<f64>::zeros());
        let mut scores = DMatrix::from_element(n, n, f64::NAN);

        for &(i, j, ref p) in pairs {
            angles[(i, j)] = p.angle;
            lags[(i, j)] = p.lag;
            centroids[(i, j)] = p.rc;
            centroids[(j, i)] = p.lc;
            scores[(i, j)] = p.score;
            scores[(j, i)] = p.score;
        }

        TransformMatrix {
            angles: &angles - angles.transpose(),
            lags: &lags - lags.transpose(),
            centroids,
            scores,
        }
    }

    pub fn len(&self) -> usize {
        self.angles.nrows()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Mean centroid of trajectory `i` over its pairs, the zero vector when it has none.
    fn mean_centroid(&self, i: usize) -> Vector2<f64> {
        let n = self.len();
        if n < 2 {
            return Vector2::zeros();
        }
        let sum: Vector2<f64> = (0..n)
            .filter(|&k| k != i)
            .map(|k| self.centroids[(i, k)])
            .sum();
        sum / (n - 1) as f64
    }

    /// Transforms of every trajectory relative to the reference `r`.
    ///
    /// For trajectory `j`:
    ///
    /// ```text
    /// angle = circular_mean_k(angles[r][k] - angles[j][k])
    /// lag   = round(mean_k(lags[j][k] - lags[r][k]))
    /// ```
    ///
    /// The lag is rounded half to even.
    pub fn mean_transforms(&self, r: usize) -> Vec<MeanTransform> {
        let n = self.len();
        let reference_centroid = self.mean_centroid(r);
        (0..n)
            .map(|j| {
                let diffs: Vec<Radian> = (0..n)
                    .map(|k| self.angles[(r, k)] - self.angles[(j, k)])
                    .collect();
                let mean_lag = (0..n)
                    .map(|k| (self.lags[(j, k)] - self.lags[(r, k)]) as f64)
                    .sum::<f64>()
                    / n as f64;
                MeanTransform {
                    angle: circular_mean(&diffs),
                    lag: mean_lag.round_ties_even() as Frame,
                    centroid: self.mean_centroid(j),
                    reference_centroid,
                }
            })
            .collect()
    }
}

impl fmt::Display for TransformMatrix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if f.alternate() {
            writeln!(f, "angles (rad):{}", self.angles)?;
            writeln!(f, "lags (frames):{}", self.lags)?;
            write!(f, "scores:{}", self.scores)
        } else {
            write!(f, "TransformMatrix({n}x{n})", n = self.len())
        }
    }
}

#[cfg(test)]
mod transform_matrix_test {
    use super::*;
    use approx::assert_abs_diff_eq;

    /// Pairs consistent with trajectory orientations `phi` and frame offsets `offset`.
    fn consistent_pairs(phi: &[f64], offset: &[Frame]) -> Vec<(usize, usize, PairAlignment)> {
        let n = phi.len();
        let mut pairs = Vec::new();
        for i in 0..n {
            for j in 0..i {
                pairs.push((
                    i,
                    j,
                    PairAlignment {
                        angle: phi[i] - phi[j],
                        rc: Vector2::new(i as f64, 10.0 * j as f64),
                        lc: Vector2::new(j as f64, 10.0 * i as f64),
                        lag: offset[j] - offset[i],
                        score: 0.0,
                        overlap: 10,
                    },
                ));
            }
        }
        pairs
    }

    #[test]
    fn test_antisymmetry() {
        let m = TransformMatrix::from_pairs(3, &consistent_pairs(&[0.0, 0.5, 1.0], &[0, 5, -5]));
        assert_abs_diff_eq!(m.angles, -m.angles.transpose(), epsilon = 1e-15);
        assert_eq!(m.lags, -m.lags.transpose());
        // trajectory 1 starts 5 frames after trajectory 0
        assert_eq!(m.lags[(1, 0)], -5);
        assert_eq!(m.lags[(0, 1)], 5);
        assert_eq!(m.centroids[(0, 1)], Vector2::new(0.0, 10.0));
        assert_eq!(m.centroids[(1, 0)], Vector2::new(1.0, 0.0));
        assert!(m.scores[(2, 2)].is_nan());
    }

    #[test]
    fn test_mean_transforms_recover_relative_pose() {
        let phi = [0.1, 0.6, -2.9];
        let offset = [0, 5, -5];
        let m = TransformMatrix::from_pairs(3, &consistent_pairs(&phi, &offset));

        for r in 0..3 {
            let mt = m.mean_transforms(r);
            for j in 0..3 {
                let expected = phi[r] - phi[j];
                assert_abs_diff_eq!(mt[j].angle.sin(), expected.sin(), epsilon = 1e-12);
                assert_abs_diff_eq!(mt[j].angle.cos(), expected.cos(), epsilon = 1e-12);
                assert_eq!(mt[j].lag, offset[r] - offset[j]);
            }
            assert_abs_diff_eq!(mt[r].angle, 0.0, epsilon = 1e-12);
            assert_eq!(mt[r].reference_centroid, mt[r].centroid);
        }
    }

    #[test]
    fn test_single_trajectory() {
        let m = TransformMatrix::from_pairs(1, &[]);
        let mt = m.mean_transforms(0);
        assert_eq!(mt.len(), 1);
        assert_eq!(mt[0].lag, 0);
        assert_eq!(mt[0].angle, 0.0);
        assert_eq!(mt[0].centroid, Vector2::zeros());
    }

    #[test]
    fn test_lag_rounds_half_to_even() {
        let mut m = TransformMatrix::from_pairs(2, &consistent_pairs(&[0.0, 0.0], &[0, 0]));
        // mean of (lags[1][0] - lags[0][0], lags[1][1] - lags[0][1]) = (1 + 0) / 2
        m.lags[(1, 0)] = 1;
        assert_eq!(m.mean_transforms(0)[1].lag, 0);
        m.lags[(1, 0)] = 3;
        assert_eq!(m.mean_transforms(0)[1].lag, 2);
    }
}
