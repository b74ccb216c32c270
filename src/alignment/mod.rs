//! # Alignment of a set of trajectories
//!
//! [`align_trajectories`] is the entry point of the crate. Given `N`
//! trajectories of the same process it:
//!
//! 1. aligns every pair `(i, j)` with `i > j` in space and time
//!    ([`lag_search::align_pair`]) and assembles a [`TransformMatrix`],
//! 2. for every candidate reference `r`, maps all trajectories into the frame
//!    of `r` with the mean transforms ([`TransformMatrix::mean_transforms`]),
//! 3. averages each aligned set ([`average_aligned`]) and measures its
//!    [`alignment_precision`],
//! 4. optionally brings each average to its canonical pose ([`lie_down`]).
//!
//! The outcome is returned as an [`AlignmentReport`]: nothing is printed and
//! nothing is written to disk unless asked for
//! ([`AlignmentReport::save_best_and_worst`],
//! [`AlignmentReport::write_precision_csv`]).
//!
//! Features
//! -----------------
//! * `progress` – progress bar over the pairwise alignments.
//! * `parallel` – pairs and references are processed on the rayon thread pool;
//!   results are identical to the sequential run.
//!
//! ## Example
//!
//! ```rust,no_run
//! use trajalign::alignment::align_trajectories;
//! use trajalign::params::AlignParams;
//! use trajalign::trajectory::Trajectory;
//!
//! let trajectories: Vec<Trajectory> = ["a.csv", "b.csv", "c.csv"]
//!     .iter()
//!     .map(|p| Trajectory::load(p))
//!     .collect::<Result<_, _>>()?;
//! let report = align_trajectories(&trajectories, &AlignParams::default())?;
//! println!("{report:#}");
//! report.save_best_and_worst("out")?;
//! # Ok::<(), trajalign::trajalign_errors::TrajalignError>(())
//! ```
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

#[cfg(feature = "parallel")]
use rayon::prelude::*;
use serde::Serialize;

use crate::average::lie_down::lie_down;
use crate::average::robust_line::RobustLineFit;
use crate::average::{alignment_precision, average_aligned};
use crate::constants::{FILE, REFERENCE_FILE};
use crate::nan_stats::{first_argmax, first_argmin};
use crate::params::AlignParams;
use crate::trajalign_errors::TrajalignError;
use crate::trajectory::Trajectory;

pub mod lag_search;
pub mod msd;
pub mod transform_matrix;

use lag_search::{align_pair, PairAlignment};
use transform_matrix::{MeanTransform, TransformMatrix};

pub const BEST_AVERAGE_FILE: &str = "best_average.csv";
pub const WORST_AVERAGE_FILE: &str = "worst_average.csv";

/// Everything computed by [`align_trajectories`], indexed by candidate reference.
#[derive(Debug, Clone)]
pub struct AlignmentReport {
    pub transforms: TransformMatrix,
    /// `mean_transforms[r][j]` brings trajectory `j` into the frame of `r`.
    pub mean_transforms: Vec<Vec<MeanTransform>>,
    pub averages: Vec<Trajectory>,
    /// Alignment precision of each average (lower is tighter).
    pub precision: Vec<f64>,
    /// Line fitted by the lie-down step of each average, when it ran.
    pub lie_down_fits: Vec<Option<RobustLineFit>>,
}

#[derive(Serialize)]
struct PrecisionRecord<'a> {
    reference: usize,
    reference_file: &'a str,
    precision: f64,
    best: bool,
    worst: bool,
}

impl AlignmentReport {
    /// Reference whose average has the smallest precision; the first one on ties.
    pub fn best_index(&self) -> Option<usize> {
        first_argmin(&self.precision).or_else(|| (!self.precision.is_empty()).then_some(0))
    }

    /// Reference whose average has the largest precision; the first one on ties.
    pub fn worst_index(&self) -> Option<usize> {
        first_argmax(&self.precision).or_else(|| (!self.precision.is_empty()).then_some(0))
    }

    pub fn best_average(&self) -> Option<&Trajectory> {
        self.best_index().map(|i| &self.averages[i])
    }

    pub fn worst_average(&self) -> Option<&Trajectory> {
        self.worst_index().map(|i| &self.averages[i])
    }

    /// Save the best and the worst averages as `best_average.csv` and
    /// `worst_average.csv` in `dir`, creating it if needed.
    pub fn save_best_and_worst(
        &self,
        dir: impl AsRef<Path>,
    ) -> Result<(PathBuf, PathBuf), TrajalignError> {
        let (best, worst) = match (self.best_average(), self.worst_average()) {
            (Some(b), Some(w)) => (b, w),
            _ => return Err(TrajalignError::EmptyTrajectoryList),
        };
        fs::create_dir_all(dir.as_ref())?;
        let best_path = dir.as_ref().join(BEST_AVERAGE_FILE);
        let worst_path = dir.as_ref().join(WORST_AVERAGE_FILE);
        best.save(&best_path)?;
        worst.save(&worst_path)?;
        Ok((best_path, worst_path))
    }

    /// Write one CSV row per candidate reference with its precision.
    pub fn write_precision_csv(&self, path: impl AsRef<Path>) -> Result<(), TrajalignError> {
        let (best, worst) = (self.best_index(), self.worst_index());
        let mut writer = csv::Writer::from_path(path)?;
        for (r, (average, precision)) in self.averages.iter().zip(&self.precision).enumerate() {
            writer.serialize(PrecisionRecord {
                reference: r,
                reference_file: average.annotation(REFERENCE_FILE).unwrap_or(""),
                precision: *precision,
                best: best == Some(r),
                worst: worst == Some(r),
            })?;
        }
        writer.flush()?;
        Ok(())
    }
}

impl fmt::Display for AlignmentReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let best = self.best_index();
        let worst = self.worst_index();
        if !f.alternate() {
            return write!(
                f,
                "AlignmentReport(n={}, best={:?}, worst={:?})",
                self.averages.len(),
                best,
                worst
            );
        }

        writeln!(f, "Alignment report")?;
        writeln!(f, "----------------")?;
        writeln!(f, "{:>4}  {:<30}  {:>14}", "ref", "file", "precision")?;
        for (r, (average, precision)) in self.averages.iter().zip(&self.precision).enumerate() {
            let tag = match (best == Some(r), worst == Some(r)) {
                (true, _) => "  best",
                (_, true) => "  worst",
                _ => "",
            };
            writeln!(
                f,
                "{:>4}  {:<30}  {:>14.6e}{}",
                r,
                average.annotation(REFERENCE_FILE).unwrap_or("-"),
                precision,
                tag
            )?;
        }
        write!(f, "{:#}", self.transforms)
    }
}

fn check_inputs(trajectories: &[Trajectory]) -> Result<(), TrajalignError> {
    let first = trajectories
        .first()
        .ok_or(TrajalignError::EmptyTrajectoryList)?;
    let delta_t = first.delta_t()?;
    for t in trajectories {
        if t.f().is_empty() {
            return Err(TrajalignError::MissingIntensity);
        }
        let other = t.delta_t()?;
        if other != delta_t {
            return Err(TrajalignError::DeltaTMismatch {
                left: delta_t,
                right: other,
            });
        }
    }
    Ok(())
}

/// Working copies of the inputs: missing frames become `NaN` samples and
/// the intensity is rescaled to `[0, 1]`.
fn prepare(trajectories: &[Trajectory]) -> Result<Vec<Trajectory>, TrajalignError> {
    trajectories
        .iter()
        .map(|t| {
            let mut t = t.clone();
            t.fill()?;
            t.norm_f();
            Ok(t)
        })
        .collect()
}

fn name(t: &Trajectory, i: usize) -> String {
    t.annotation(FILE)
        .map_or_else(|| format!("#{i}"), str::to_string)
}

/// Align every pair `(i, j)` with `i > j`, `i` being the reference.
fn align_all_pairs(
    trajectories: &[Trajectory],
    params: &AlignParams,
) -> Result<Vec<(usize, usize, PairAlignment)>, TrajalignError> {
    let n = trajectories.len();
    let pairs: Vec<(usize, usize)> = (1..n).flat_map(|i| (0..i).map(move |j| (i, j))).collect();

    #[cfg(feature = "progress")]
    let bar = crate::progress::pair_progress_bar(n);
    #[cfg(feature = "progress")]
    let timing = std::sync::Mutex::new(crate::progress::PairTiming::new());

    let align_one = |&(i, j): &(usize, usize)| -> Result<(usize, usize, PairAlignment), TrajalignError> {
        #[cfg(feature = "progress")]
        let started = std::time::Instant::now();
        log::info!(
            "aligning {} onto reference {}",
            name(&trajectories[j], j),
            name(&trajectories[i], i)
        );
        let alignment = align_pair(&trajectories[i], &trajectories[j], params)?
            .ok_or(TrajalignError::NoOverlap {
                reference: i,
                target: j,
            })?;
        log::debug!(
            "pair ({i}, {j}): angle = {:.6} rad, lag = {} frames, score = {:.6e}, overlap = {}",
            alignment.angle,
            alignment.lag,
            alignment.score,
            alignment.overlap
        );

        #[cfg(feature = "progress")]
        {
            if let Ok(mut t) = timing.lock() {
                t.record((i, j), started.elapsed());
                bar.set_message(t.message());
            }
            bar.inc(1);
        }
        Ok((i, j, alignment))
    };

    #[cfg(feature = "parallel")]
    let aligned = pairs.par_iter().map(align_one).collect();
    #[cfg(not(feature = "parallel"))]
    let aligned = pairs.iter().map(align_one).collect();

    #[cfg(feature = "progress")]
    bar.finish_and_clear();

    aligned
}

/// Align, average and lie down the whole set with `r` as reference.
fn average_for_reference(
    r: usize,
    trajectories: &[Trajectory],
    transforms: &TransformMatrix,
    params: &AlignParams,
) -> Result<(Vec<MeanTransform>, Trajectory, f64, Option<RobustLineFit>), TrajalignError> {
    let means = transforms.mean_transforms(r);
    let mut aligned = trajectories.to_vec();
    for (t, m) in aligned.iter_mut().zip(&means) {
        m.apply(t)?;
    }

    let mut average = average_aligned(aligned, trajectories, r, params)?;
    let precision = alignment_precision(&average);
    log::info!(
        "reference {}: alignment precision {precision:.6e}",
        name(&trajectories[r], r)
    );

    let fit = if params.lie_down {
        lie_down(&mut average, params)
    } else {
        None
    };
    Ok((means, average, precision, fit))
}

/// Align `trajectories` together and average them using each one in turn as
/// the reference.
///
/// Arguments
/// -----------------
/// * `trajectories` – at least one trajectory; all need an intensity and the
///   same `delta_t` annotation. They are not modified: the pipeline works on
///   copies whose missing frames are filled with `NaN` samples and whose
///   intensity is rescaled to `[0, 1]`.
/// * `params` – see [`AlignParams`].
///
/// Return
/// ----------
/// * An [`AlignmentReport`] with one average per candidate reference, or
///   - [`TrajalignError::EmptyTrajectoryList`] for an empty input,
///   - [`TrajalignError::DeltaTMismatch`] for inconsistent sampling intervals,
///   - [`TrajalignError::MissingIntensity`] when a trajectory has no intensity,
///   - [`TrajalignError::NoOverlap`] when a pair cannot be aligned at any lag,
///   - [`TrajalignError::UndefinedRotation`] when a pair shares no frame with
///     both intensities defined.
pub fn align_trajectories(
    trajectories: &[Trajectory],
    params: &AlignParams,
) -> Result<AlignmentReport, TrajalignError> {
    check_inputs(trajectories)?;
    let prepared = prepare(trajectories)?;
    let trajectories = prepared.as_slice();
    let n = trajectories.len();
    log::info!("aligning {n} trajectories with {params}");

    let pairs = align_all_pairs(trajectories, params)?;
    let transforms = TransformMatrix::from_pairs(n, &pairs);
    log::debug!("transform matrix:\n{transforms:#}");

    let per_reference = |r: usize| average_for_reference(r, trajectories, &transforms, params);
    #[cfg(feature = "parallel")]
    let results: Vec<_> = (0..n)
        .into_par_iter()
        .map(per_reference)
        .collect::<Result<_, _>>()?;
    #[cfg(not(feature = "parallel"))]
    let results: Vec<_> = (0..n).map(per_reference).collect::<Result<_, _>>()?;

    let mut report = AlignmentReport {
        transforms,
        mean_transforms: Vec::with_capacity(n),
        averages: Vec::with_capacity(n),
        precision: Vec::with_capacity(n),
        lie_down_fits: Vec::with_capacity(n),
    };
    for (means, average, precision, fit) in results {
        report.mean_transforms.push(means);
        report.averages.push(average);
        report.precision.push(precision);
        report.lie_down_fits.push(fit);
    }

    if let (Some(best), Some(worst)) = (report.best_index(), report.worst_index()) {
        log::info!(
            "best average: reference {} (precision {:.6e}); worst average: reference {} (precision {:.6e})",
            best,
            report.precision[best],
            worst,
            report.precision[worst]
        );
    }
    Ok(report)
}

#[cfg(test)]
mod alignment_test {
    use super::*;
    use nalgebra::Matrix2xX;

    fn curve(first: i64, n: usize) -> Trajectory {
        Trajectory::from_frames((first..first + n as i64).collect(), 1.0)
            .with_coord(Matrix2xX::from_fn(n, |r, c| {
                let s = c as f64 / 5.0;
                if r == 0 {
                    s * s
                } else {
                    s.sin()
                }
            }))
            .unwrap()
            .with_f((0..n).map(|c| 1.0 + (c as f64 / 3.0).cos().abs()).collect())
            .unwrap()
    }

    #[test]
    fn test_input_checks() {
        let params = AlignParams::default();
        assert_eq!(
            align_trajectories(&[], &params).err(),
            Some(TrajalignError::EmptyTrajectoryList)
        );
        let other = curve(0, 10).with_annotation(crate::constants::DELTA_T, "2");
        assert_eq!(
            align_trajectories(&[curve(0, 10), other], &params).err(),
            Some(TrajalignError::DeltaTMismatch {
                left: 1.0,
                right: 2.0
            })
        );
    }

    #[test]
    fn test_single_trajectory_is_its_own_average() {
        let t = curve(2, 15).with_annotation(FILE, "only.csv");
        let params = AlignParams::builder().lie_down(false).build().unwrap();
        let report = align_trajectories(std::slice::from_ref(&t), &params).unwrap();
        assert_eq!(report.averages.len(), 1);
        assert_eq!(report.averages[0].x(), t.x());
        assert_eq!(report.precision, vec![0.0]);
        assert_eq!(report.best_index(), Some(0));
        assert_eq!(report.averages[0].annotation(REFERENCE_FILE), Some("only.csv"));
        assert!(report.lie_down_fits[0].is_none());
    }

    #[test]
    fn test_best_and_worst() {
        let report = AlignmentReport {
            transforms: TransformMatrix::from_pairs(3, &[]),
            mean_transforms: vec![Vec::new(); 3],
            averages: vec![curve(0, 3), curve(0, 3), curve(0, 3)],
            precision: vec![0.3, 0.1, 0.3],
            lie_down_fits: vec![None, None, None],
        };
        assert_eq!(report.best_index(), Some(1));
        assert_eq!(report.worst_index(), Some(0));
        assert!(report.to_string().contains("best=Some(1)"));
        assert!(format!("{report:#}").contains("best"));

        let dir = std::env::temp_dir().join("trajalign_report_test");
        let (best, worst) = report.save_best_and_worst(&dir).unwrap();
        assert!(best.ends_with(BEST_AVERAGE_FILE) && worst.ends_with(WORST_AVERAGE_FILE));
        let csv_path = dir.join("precision.csv");
        report.write_precision_csv(&csv_path).unwrap();
        let text = std::fs::read_to_string(&csv_path).unwrap();
        assert_eq!(
            text.lines().next(),
            Some("reference,reference_file,precision,best,worst")
        );
        assert_eq!(text.lines().count(), 4);
        std::fs::remove_dir_all(&dir).unwrap();
    }
}
