#![allow(dead_code)]

use nalgebra::{Matrix2xX, Vector2};
use rand::rngs::StdRng;
use rand_distr::{Distribution, Normal};
use trajalign::constants::{COORD_UNIT, FILE, T_UNIT};
use trajalign::alignment::msd::msd;
use trajalign::trajectory::{Attribute, Trajectory};

pub const DELTA_T: f64 = 0.1;

/// Gaussian intensity profile centred on the middle sample, with a small floor.
pub fn intensity_profile(n: usize) -> Vec<f64> {
    let mid = (n as f64 - 1.0) / 2.0;
    let width = n as f64 / 4.0;
    (0..n)
        .map(|k| (-((k as f64 - mid) / width).powi(2)).exp() + 0.05)
        .collect()
}

/// A curved path with a non-uniform speed, so that both its orientation and
/// its time lag are observable: `x = 10 s²`, `y = 3 sin(π s)`, `s ∈ [0, 1]`.
pub fn ground_truth(first_frame: i64, n: usize) -> Trajectory {
    let coord = Matrix2xX::from_fn(n, |r, k| {
        let s = k as f64 / (n as f64 - 1.0);
        if r == 0 {
            10.0 * s * s
        } else {
            3.0 * (std::f64::consts::PI * s).sin()
        }
    });
    Trajectory::from_frames((first_frame..first_frame + n as i64).collect(), DELTA_T)
        .with_coord(coord)
        .unwrap()
        .with_f(intensity_profile(n))
        .unwrap()
        .with_annotation(COORD_UNIT, "µm")
        .with_annotation(T_UNIT, "s")
}

/// Copy of `t` rotated about the origin, lagged by `lag` frames and with
/// isotropic Gaussian noise of standard deviation `sigma` on the positions.
pub fn noisy_copy(t: &Trajectory, angle: f64, lag: i64, sigma: f64, rng: &mut StdRng, file: &str) -> Trajectory {
    let mut copy = t.clone().with_annotation(FILE, file);
    copy.rotate(angle, None);
    copy.lag(lag).unwrap();
    if sigma > 0.0 {
        let normal = Normal::new(0.0, sigma).unwrap();
        let mut noisy = vec![copy.x(), copy.y()];
        for row in noisy.iter_mut() {
            for v in row.iter_mut() {
                *v += normal.sample(rng);
            }
        }
        copy.set_values(Attribute::Coord, &noisy).unwrap();
    }
    copy
}

/// Apply `p ↦ R(angle)·p + shift` to every position of `t`.
pub fn moved(t: &Trajectory, angle: f64, shift: Vector2<f64>) -> Trajectory {
    let mut out = t.clone();
    out.rotate(angle, None);
    out.translate(&shift, None);
    out
}

/// Register `t` onto `truth` sample by sample with [`msd`] and return the
/// mean distance between corresponding points.
pub fn registered_distance(truth: &Trajectory, t: &Trajectory) -> f64 {
    let rigid = msd(truth, t).unwrap();
    let total: f64 = t
        .coord()
        .column_iter()
        .zip(truth.coord().column_iter())
        .map(|(p, q)| {
            let p = Vector2::new(p[0], p[1]);
            (rigid.apply(&p) - Vector2::new(q[0], q[1])).norm()
        })
        .sum();
    total / t.len() as f64
}
