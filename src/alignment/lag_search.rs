//! # Integer lag search between two trajectories
//!
//! Two trajectories of the same process rarely start at the same frame. The
//! search below finds the frame lag at which the [`msd`] residual is
//! smallest, in three passes:
//!
//! 1. **Sweep.** The trajectory covering more frames is [`triplicate`]d so that every
//!    offset of the shorter one, full or partial overlap, is a window of the
//!    triplicated frames. Every offset is scored on the frames both sides
//!    share.
//! 2. **First refinement.** Every offset reaching the minimum sweep score is
//!    re-scored on the real (non-triplicated) trajectories. The score is
//!    divided by `sqrt(overlap)` when [`AlignParams::weight_overlap`] is set,
//!    so that alignments supported by a handful of frames do not win.
//! 3. **Second refinement.** Lags within `± refine_half_window` of the first
//!    winner are re-scored without the overlap penalty.
//!
//! Ties are resolved in favour of the first candidate, candidates being
//! visited in ascending lag order.
//!
//! Sign convention
//! -----------------
//! [`PairAlignment::lag`] is the number of frames to **subtract** from the
//! target frames to bring them onto the reference frames, i.e. the reference
//! frame `k` matches the target frame `k + lag`.
use ahash::AHashSet;
use nalgebra::Vector2;

use crate::constants::{Frame, Radian};
use crate::nan_stats::first_argmin;
use crate::params::AlignParams;
use crate::trajalign_errors::TrajalignError;
use crate::trajectory::Trajectory;

use super::msd::{msd, RigidAlignment};

/// Rigid alignment of a target trajectory onto a reference, with its frame lag.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PairAlignment {
    pub angle: Radian,
    /// Weighted centroid of the reference on the overlapping frames.
    pub rc: Vector2<f64>,
    /// Weighted centroid of the target on the overlapping frames.
    pub lc: Vector2<f64>,
    pub lag: Frame,
    pub score: f64,
    /// Number of frames the alignment was computed on.
    pub overlap: usize,
}

impl PairAlignment {
    fn new(rigid: RigidAlignment, lag: Frame, overlap: usize) -> Self {
        PairAlignment {
            angle: rigid.angle,
            rc: rigid.rc,
            lc: rigid.lc,
            lag,
            score: rigid.score,
            overlap,
        }
    }
}

/// Number of frames covered by a trajectory, gaps included.
fn frame_span(t: &Trajectory) -> Frame {
    match (t.frames().first(), t.frames().last()) {
        (Some(first), Some(last)) => last - first + 1,
        _ => 0,
    }
}

/// Concatenate a copy of `t` shifted back by its frame span, `t` itself and a
/// copy shifted forward by its frame span.
///
/// The copies are contiguous with the original: the frame right before the
/// first frame of `t` is the last frame of the leading copy.
pub fn triplicate(t: &Trajectory) -> Result<Trajectory, TrajalignError> {
    let span = frame_span(t);
    let mut before = t.clone();
    before.lag(-span)?;
    let mut after = t.clone();
    after.lag(span)?;

    before.append(t);
    before.append(&after);
    Ok(before)
}

/// Indices of `a` and of `b` whose frames coincide once `lag` is added to the frames of `b`.
fn select_overlap(a: &[Frame], b: &[Frame], lag: Frame) -> (Vec<usize>, Vec<usize>) {
    let a_set: AHashSet<Frame> = a.iter().copied().collect();
    let b_set: AHashSet<Frame> = b.iter().map(|fr| fr + lag).collect();
    let sel_a = (0..a.len()).filter(|&i| b_set.contains(&a[i])).collect();
    let sel_b = (0..b.len()).filter(|&j| a_set.contains(&(b[j] + lag))).collect();
    (sel_a, sel_b)
}

/// Slide the trajectory with the shorter frame span over the triplicated
/// other one and score every offset with overlapping frames. The `lag` of each returned alignment
/// is the shift to add to the target frames to land on the reference frames.
fn sweep(reference: &Trajectory, target: &Trajectory) -> Result<Vec<PairAlignment>, TrajalignError> {
    let reference_is_longer = frame_span(reference) >= frame_span(target);
    let (long, short) = if reference_is_longer {
        (reference, target)
    } else {
        (target, reference)
    };
    let x = triplicate(long)?;
    let y = short;

    let steps = frame_span(&x) - frame_span(y);
    let mut alignments = Vec::with_capacity(steps.max(0) as usize);
    for i in 0..steps {
        let lag = x.frames()[0] - y.frames()[0] + i;
        let (sel_x, sel_y) = select_overlap(x.frames(), y.frames(), lag);
        if sel_x.is_empty() || sel_y.is_empty() {
            continue;
        }
        if sel_x.len() != sel_y.len() {
            return Err(TrajalignError::OverlapSelectionMismatch {
                expected: sel_y.len(),
                found: sel_x.len(),
            });
        }
        let (x_sel, y_sel) = (x.extract(&sel_x), y.extract(&sel_y));
        let alignment = if reference_is_longer {
            PairAlignment::new(msd(&x_sel, &y_sel)?, lag, sel_x.len())
        } else {
            PairAlignment::new(msd(&y_sel, &x_sel)?, -lag, sel_x.len())
        };
        alignments.push(alignment);
    }
    Ok(alignments)
}

/// Score the target shifted by `shift` frames against the reference, on the
/// real trajectories. `None` when no frame overlaps.
fn refine(
    reference: &Trajectory,
    target: &Trajectory,
    shift: Frame,
    weight_overlap: bool,
) -> Result<Option<PairAlignment>, TrajalignError> {
    let (sel_r, sel_t) = select_overlap(reference.frames(), target.frames(), shift);
    if sel_r.is_empty() || sel_t.is_empty() {
        return Ok(None);
    }
    let rigid = msd(&reference.extract(&sel_r), &target.extract(&sel_t))?;
    let mut alignment = PairAlignment::new(rigid, -shift, sel_r.len());
    if weight_overlap {
        alignment.score /= (sel_r.len() as f64).sqrt();
    }
    Ok(Some(alignment))
}

/// Lowest score, the first one on ties; `NaN` scores never win.
fn first_best(candidates: Vec<PairAlignment>) -> Option<PairAlignment> {
    let scores: Vec<f64> = candidates.iter().map(|a| a.score).collect();
    first_argmin(&scores).map(|i| candidates[i])
}

/// Find the lag and rigid transform that best align `target` onto `reference`.
///
/// Arguments
/// -----------------
/// * `reference` – trajectory that stays in place.
/// * `target` – trajectory that is moved.
/// * `params` – only `refine_half_window` and `weight_overlap` are used.
///
/// Return
/// ----------
/// * `Ok(Some(alignment))` on success,
/// * `Ok(None)` when no lag gives any overlapping frame,
/// * [`TrajalignError::UndefinedRotation`] when the rotation is undefined at
///   every candidate lag (no overlapping frame with both intensities),
/// * an error when a trajectory has no intensity or no `delta_t`.
pub fn align_pair(
    reference: &Trajectory,
    target: &Trajectory,
    params: &AlignParams,
) -> Result<Option<PairAlignment>, TrajalignError> {
    if reference.is_empty() || target.is_empty() {
        return Ok(None);
    }

    let swept = sweep(reference, target)?;
    let min_score = swept
        .iter()
        .map(|a| a.score)
        .filter(|s| !s.is_nan())
        .fold(f64::INFINITY, f64::min);
    let tied_shifts: Vec<Frame> = swept
        .iter()
        .filter(|a| a.score == min_score)
        .map(|a| a.lag)
        .collect();
    log::trace!(
        "sweep: {} offsets scored, {} tied at {min_score}",
        swept.len(),
        tied_shifts.len()
    );
    if min_score.is_infinite() {
        log::warn!("every offset of the sweep has an undefined rotation");
    }

    let mut first = Vec::with_capacity(tied_shifts.len());
    for shift in tied_shifts {
        if let Some(a) = refine(reference, target, shift, params.weight_overlap)? {
            first.push(a);
        }
    }
    let Some(best) = first_best(first) else {
        return Ok(None);
    };

    let center = -best.lag;
    let mut second = Vec::new();
    for shift in (center - params.refine_half_window)..=(center + params.refine_half_window) {
        if let Some(a) = refine(reference, target, shift, false)? {
            second.push(a);
        }
    }
    match first_best(second) {
        Some(best) if best.angle.is_nan() => {
            log::warn!("no candidate lag gives a defined rotation");
            Err(TrajalignError::UndefinedRotation)
        }
        best => Ok(best),
    }
}
