//! # Consensus averaging of an aligned trajectory set
//!
//! Once every trajectory has been mapped into the frame of one reference,
//! [`average_aligned`] collapses the set into a single trajectory:
//!
//! * a common time window is chosen (see [`common_span`]) and every aligned
//!   trajectory is padded or truncated to it,
//! * every attribute with an uncertainty slot ([`Attribute::averaged`]) is
//!   replaced by its NaN-aware mean, and its uncertainty by the NaN-aware
//!   standard deviation across the set,
//! * the `n` attribute counts, per time point, the trajectories with a finite
//!   position.
//!
//! [`alignment_precision`] summarizes the spread of an average in one number,
//! used to rank the candidate references.
use crate::constants::{FILE, REFERENCE_FILE};
use crate::nan_stats::{nanmean, nanstd};
use crate::params::AlignParams;
use crate::trajalign_errors::TrajalignError;
use crate::trajectory::{Attribute, Trajectory};

pub mod lie_down;
pub mod robust_line;

/// Time window shared by the aligned trajectories.
///
/// Start
/// -----------------
/// Mean of the aligned starts of the trajectories whose original start is
/// strictly positive, i.e. that appeared after the recording began. If all
/// of them were already there at time zero, the latest aligned start.
///
/// End
/// -----------------
/// Mean of the aligned ends of the trajectories whose original end is before
/// `(max_frame - end_margin_frames) · delta_t`. If all of them lasted until the
/// end of the recording, the earliest aligned end.
pub fn common_span(
    originals: &[Trajectory],
    aligned: &[Trajectory],
    delta_t: f64,
    params: &AlignParams,
) -> (f64, f64) {
    let last_informative = (params.max_frame - params.end_margin_frames) as f64 * delta_t;

    let starts: Vec<f64> = originals
        .iter()
        .zip(aligned)
        .filter(|(o, _)| o.start() > 0.0)
        .map(|(_, a)| a.start())
        .collect();
    let start = if starts.is_empty() {
        aligned.iter().map(Trajectory::start).fold(f64::NEG_INFINITY, f64::max)
    } else {
        starts.iter().sum::<f64>() / starts.len() as f64
    };

    let ends: Vec<f64> = originals
        .iter()
        .zip(aligned)
        .filter(|(o, _)| o.end() < last_informative)
        .map(|(_, a)| a.end())
        .collect();
    let end = if ends.is_empty() {
        aligned.iter().map(Trajectory::end).fold(f64::INFINITY, f64::min)
    } else {
        ends.iter().sum::<f64>() / ends.len() as f64
    };

    (start, end)
}

/// Average a set of trajectories already aligned onto `aligned[reference]`.
///
/// Arguments
/// -----------------
/// * `aligned` – the aligned set; consumed, since every member is resized.
/// * `originals` – the same trajectories before alignment, in the same order.
/// * `reference` – index of the reference in both lists.
/// * `params` – `max_frame` and `end_margin_frames` drive the time window.
///
/// Return
/// ----------
/// * The averaged trajectory. Its frames, times and annotations come from
///   the reference, with the `file` annotation renamed `reference_file`.
/// * [`TrajalignError::LengthMismatch`] if the resized trajectories do not
///   share the same number of samples.
pub fn average_aligned(
    mut aligned: Vec<Trajectory>,
    originals: &[Trajectory],
    reference: usize,
    params: &AlignParams,
) -> Result<Trajectory, TrajalignError> {
    let delta_t = aligned
        .first()
        .ok_or(TrajalignError::EmptyTrajectoryList)?
        .delta_t()?;
    let (start, end) = common_span(originals, &aligned, delta_t, params);
    log::debug!("reference {reference}: averaging window [{start}, {end}]");

    for t in aligned.iter_mut() {
        t.set_start(start)?;
        t.set_end(end)?;
    }
    let reference_t = &aligned[reference];
    let len = reference_t.len();
    if let Some(bad) = aligned.iter().find(|t| t.len() != len) {
        return Err(TrajalignError::LengthMismatch {
            left: len,
            right: bad.len(),
        });
    }

    let mut average =
        Trajectory::from_frames_and_times(reference_t.frames().to_vec(), reference_t.t().to_vec())?;
    for (key, value) in reference_t.annotations() {
        let key = if key == FILE { REFERENCE_FILE } else { key.as_str() };
        average.set_annotation(key, value.clone());
    }

    for attr in Attribute::averaged().filter(|a| reference_t.has(*a)) {
        let mut means = Vec::with_capacity(attr.dims());
        let mut stds = Vec::with_capacity(attr.dims());
        for d in 0..attr.dims() {
            let stack: Vec<Vec<f64>> = aligned
                .iter()
                .map(|t| {
                    t.values(attr)
                        .into_iter()
                        .nth(d)
                        .unwrap_or_else(|| vec![f64::NAN; len])
                })
                .collect();
            let (m, s): (Vec<f64>, Vec<f64>) = (0..len)
                .map(|k| {
                    let column: Vec<f64> = stack.iter().map(|row| row[k]).collect();
                    (nanmean(&column), nanstd(&column))
                })
                .unzip();
            means.push(m);
            stds.push(s);
        }
        average.set_values(attr, &means)?;
        average.set_errors(attr, &stds)?;
    }

    let counts: Vec<f64> = (0..len)
        .map(|k| {
            aligned
                .iter()
                .filter(|t| t.coord()[(0, k)].is_finite())
                .count() as f64
        })
        .collect();
    average.set_values(Attribute::N, &[counts])?;

    Ok(average)
}

/// Root mean square of the coordinate uncertainty of an average,
/// `sqrt(nanmean(σx² + σy²))`. `NaN` when the average has no uncertainty.
pub fn alignment_precision(average: &Trajectory) -> f64 {
    let err = average.coord_err();
    if err.ncols() == 0 {
        return f64::NAN;
    }
    let squared: Vec<f64> = err
        .column_iter()
        .map(|c| c[0] * c[0] + c[1] * c[1])
        .collect();
    nanmean(&squared).sqrt()
}
