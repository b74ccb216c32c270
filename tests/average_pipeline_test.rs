mod common;

use approx::assert_abs_diff_eq;
use nalgebra::Matrix2xX;
use rand::rngs::StdRng;
use rand::SeedableRng;
use trajalign::alignment::align_trajectories;
use trajalign::average::lie_down::lie_down;
use trajalign::constants::{FILE, REFERENCE_FILE};
use trajalign::params::AlignParams;
use trajalign::trajalign_errors::TrajalignError;
use trajalign::trajectory::Trajectory;

use crate::common::{ground_truth, noisy_copy, registered_distance};

#[test]
fn test_recovers_ground_truth_shape() {
    let truth = ground_truth(10, 60);
    let mut rng = StdRng::seed_from_u64(42_u64);

    let trajectories = vec![
        noisy_copy(&truth, 0.0, 0, 0.01, &mut rng, "t0.csv"),
        noisy_copy(&truth, 30f64.to_radians(), 5, 0.01, &mut rng, "t1.csv"),
        noisy_copy(&truth, 60f64.to_radians(), -5, 0.05, &mut rng, "t2.csv"),
    ];

    let params = AlignParams::default();
    let report = align_trajectories(&trajectories, &params).unwrap();
    assert_eq!(report.averages.len(), 3);
    assert_eq!(report.precision.len(), 3);
    assert!(report.precision.iter().all(|p| p.is_finite()));

    // reference frame k matches target frame k + lag
    assert_eq!(report.transforms.lags[(1, 0)], -5);
    assert_eq!(report.transforms.lags[(2, 0)], 5);
    assert_eq!(report.transforms.lags[(2, 1)], 10);
    assert_abs_diff_eq!(report.transforms.angles[(1, 0)], 30f64.to_radians(), epsilon = 1e-2);
    assert_abs_diff_eq!(report.transforms.angles[(2, 1)], 30f64.to_radians(), epsilon = 1e-2);

    for average in &report.averages {
        assert_eq!(average.len(), 60);
        assert!(registered_distance(&truth, average) < 0.1);
        assert!(average.n().iter().all(|&n| n == 3.0));
    }

    let (best, worst) = (report.best_index().unwrap(), report.worst_index().unwrap());
    assert_ne!(best, worst);
    assert_eq!(
        report.best_average().unwrap().annotation(REFERENCE_FILE),
        trajectories[best].annotation(FILE)
    );
}

#[test]
fn test_identical_copies_average_to_themselves() {
    let truth = ground_truth(4, 40);
    let mut rng = StdRng::seed_from_u64(0);
    let copies: Vec<Trajectory> = (0..3)
        .map(|i| noisy_copy(&truth, 0.0, 0, 0.0, &mut rng, &format!("copy{i}.csv")))
        .collect();

    let params = AlignParams::builder().lie_down(false).build().unwrap();
    let report = align_trajectories(&copies, &params).unwrap();

    for average in &report.averages {
        assert_eq!(average.frames(), truth.frames());
        for (a, b) in average.x().iter().zip(truth.x()) {
            assert_abs_diff_eq!(*a, b, epsilon = 1e-12);
        }
        for (a, b) in average.y().iter().zip(truth.y()) {
            assert_abs_diff_eq!(*a, b, epsilon = 1e-12);
        }
        assert!(average.coord_err().iter().all(|e| e.abs() < 1e-12));
        assert_eq!(average.n(), &[3.0; 40][..]);
    }
    assert!(report.precision.iter().all(|p| *p < 1e-12));
}

#[test]
fn test_lie_down_is_idempotent() {
    let n = 31;
    let (s, c) = (-0.4f64).sin_cos();
    let mut t = Trajectory::from_frames((0..n as i64).collect(), 0.1)
        .with_coord(Matrix2xX::from_fn(n, |r, k| {
            let u = (k as f64).powf(1.5) * 0.1;
            if r == 0 {
                1.0 + c * u
            } else {
                3.0 + s * u
            }
        }))
        .unwrap()
        .with_f((0..n).map(|k| 2.0 - k as f64 / n as f64).collect())
        .unwrap();

    let params = AlignParams::default();
    lie_down(&mut t, &params);
    let once = t.clone();
    lie_down(&mut t, &params);

    for (a, b) in once.x().iter().zip(t.x()) {
        assert_abs_diff_eq!(*a, b, epsilon = 1e-9);
    }
    for (a, b) in once.y().iter().zip(t.y()) {
        assert_abs_diff_eq!(*a, b, epsilon = 1e-9);
    }
}

#[test]
fn test_save_best_and_worst() {
    let truth = ground_truth(10, 30);
    let mut rng = StdRng::seed_from_u64(7);
    let trajectories = vec![
        noisy_copy(&truth, 0.3, 2, 0.01, &mut rng, "a.csv"),
        noisy_copy(&truth, -0.2, -3, 0.02, &mut rng, "b.csv"),
    ];
    let report = align_trajectories(&trajectories, &AlignParams::default()).unwrap();

    let dir = std::env::temp_dir().join("trajalign_pipeline_test");
    let (best, worst) = report.save_best_and_worst(&dir).unwrap();
    let loaded = Trajectory::load(&best).unwrap();
    assert_eq!(loaded.len(), report.best_average().unwrap().len());
    assert!(loaded.annotation(REFERENCE_FILE).is_some());
    assert!(worst.exists());
    std::fs::remove_dir_all(&dir).unwrap();
}

#[test]
fn test_trajectory_without_intensity_is_rejected() {
    let truth = ground_truth(0, 10);
    let bare = Trajectory::from_frames((0..10).collect(), common::DELTA_T);
    assert_eq!(
        align_trajectories(&[truth, bare], &AlignParams::default()).err(),
        Some(TrajalignError::MissingIntensity)
    );
}

#[test]
fn test_gapped_trajectory_is_filled_before_alignment() {
    let truth = ground_truth(10, 60);
    let mut rng = StdRng::seed_from_u64(1);
    let gapped = noisy_copy(&truth, -0.7, -2, 0.0, &mut rng, "gapped.csv");
    let kept: Vec<usize> = (0..60).filter(|k| k % 3 != 1).collect();
    let gapped = gapped.extract(&kept);

    let trajectories = vec![
        noisy_copy(&truth, 0.0, 0, 0.0, &mut rng, "full0.csv"),
        noisy_copy(&truth, 0.5, 3, 0.0, &mut rng, "full1.csv"),
        gapped,
    ];
    let report = align_trajectories(&trajectories, &AlignParams::default()).unwrap();

    assert_eq!(report.transforms.lags[(2, 0)], 2);
    assert_eq!(report.transforms.lags[(2, 1)], 5);
    for average in &report.averages {
        assert_eq!(average.len(), 60);
        assert_eq!(average.n().iter().filter(|&&n| n == 2.0).count(), 20);
        assert_eq!(average.n().iter().filter(|&&n| n == 3.0).count(), 40);
    }
    // the inputs themselves are left untouched
    assert_eq!(trajectories[2].len(), 40);
}

#[test]
fn test_window_falls_back_when_no_start_or_end_is_informative() {
    let truth = ground_truth(0, 40);
    let mut rng = StdRng::seed_from_u64(5);
    let trajectories: Vec<Trajectory> = [(0.0, 40), (0.4, 35), (-0.6, 30)]
        .iter()
        .map(|&(angle, len)| {
            noisy_copy(&truth, angle, 0, 0.0, &mut rng, &format!("len{len}.csv"))
                .extract(&(0..len).collect::<Vec<_>>())
        })
        .collect();

    // every trajectory outlives frame 20 - 3: earliest end, and all start at 0: latest start
    let params = AlignParams::builder()
        .max_frame(20)
        .lie_down(false)
        .build()
        .unwrap();
    let report = align_trajectories(&trajectories, &params).unwrap();
    for average in &report.averages {
        assert_eq!(average.frames(), (0..30).collect::<Vec<i64>>().as_slice());
        assert_eq!(average.start(), 0.0);
        assert!(average.n().iter().all(|&n| n == 3.0));
    }

    // informative ends: their mean, 3.4, closes the window
    let params = AlignParams::builder().lie_down(false).build().unwrap();
    let report = align_trajectories(&trajectories, &params).unwrap();
    for average in &report.averages {
        assert_eq!(average.len(), 35);
        assert_abs_diff_eq!(average.end(), 3.4, epsilon = 1e-9);
        assert_eq!(average.n()[34], 2.0);
        assert_eq!(average.n()[29], 3.0);
    }
}
