//! # Two-channel alignment of average trajectories
//!
//! Two average trajectories built from two different proteins live in two
//! unrelated spatial and temporal frames: each was averaged against its own
//! reference. Pairs of trajectories of both proteins imaged simultaneously
//! (`ch1[i]` for the protein of the target, `ch2[i]` for the protein of the
//! reference) share one frame, and provide the link:
//!
//! ```text
//! target  --(ch1[i] onto target)^-1-->  channel frame  --(ch2[i] onto reference)-->  reference
//! ```
//!
//! For every pair the two channel trajectories are resampled on the grid of
//! their average, brought in time onto it by intensity
//! [cross-correlation](cross_correlation_lag), restricted to the common time
//! window and rigidly aligned with [`msd`]. The per-pair transforms are
//! combined, and the median over all pairs is applied to the target. The
//! median absolute deviations are propagated as uncertainties.
//!
//! The aligned target is expressed in the frame of the reference recentred on
//! its intensity-weighted center of mass ([`ChannelTransform::reference_center`]).
use std::fmt;
use std::path::{Path, PathBuf};

use nalgebra::{Rotation2, Vector2};

use crate::alignment::msd::msd;
use crate::constants::{Radian, COORD_UNIT, DELTA_T, FILE, T_UNIT};
use crate::nan_stats::{first_argmax, nan_mad, nanmedian};
use crate::trajalign_errors::TrajalignError;
use crate::trajectory::{Attribute, Trajectory};

/// Median transform bringing the target onto the reference, with its spread.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChannelTransform {
    pub angle: Radian,
    /// `MAD / sqrt(n)` of the per-pair angles.
    pub angle_mad: Radian,
    pub translation: Vector2<f64>,
    /// `MAD / sqrt(n)` of the per-pair translations, per axis.
    pub translation_mad: Vector2<f64>,
    /// Time offset added to the target times.
    pub lag: f64,
    pub lag_mad: f64,
    /// Number of channel pairs.
    pub n: usize,
    /// Center of mass of the reference, subtracted before alignment.
    pub reference_center: Vector2<f64>,
}

impl fmt::Display for ChannelTransform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "angle = {:.6} ± {:.6} rad, translation = [{:.6}, {:.6}] ± [{:.6}, {:.6}], lag = {:.6} ± {:.6} (n = {})",
            self.angle,
            self.angle_mad,
            self.translation.x,
            self.translation.y,
            self.translation_mad.x,
            self.translation_mad.y,
            self.lag,
            self.lag_mad,
            self.n
        )
    }
}

#[derive(Debug, Clone)]
pub struct ChannelAlignment {
    pub aligned: Trajectory,
    pub transform: ChannelTransform,
}

/// Transform of one channel pair.
struct PairTransform {
    angle: Radian,
    translation: Vector2<f64>,
    lag: f64,
}

/// Linear interpolation of `(ts, vs)` at `x`, with `ts` increasing.
fn interpolate(ts: &[f64], vs: &[f64], x: f64) -> f64 {
    let i = ts.partition_point(|&v| v <= x);
    if i == 0 {
        return if x == ts[0] { vs[0] } else { f64::NAN };
    }
    if i == ts.len() {
        return vs[ts.len() - 1];
    }
    let (lo, hi) = (i - 1, i);
    let span = ts[hi] - ts[lo];
    if span == 0.0 {
        return vs[lo];
    }
    vs[lo] + (x - ts[lo]) / span * (vs[hi] - vs[lo])
}

/// Resample `t` on a regular grid of step `delta_t` starting at its first time
/// point, using only the samples with a finite intensity.
///
/// Coordinates, intensity and molecule counts are linearly interpolated;
/// annotations are kept, with `delta_t` updated.
pub fn resample(t: &Trajectory, delta_t: f64) -> Result<Trajectory, TrajalignError> {
    let keep: Vec<usize> = (0..t.f().len()).filter(|&i| !t.f()[i].is_nan()).collect();
    if keep.is_empty() {
        return Err(TrajalignError::MissingIntensity);
    }
    let src = t.extract(&keep);

    let eps = delta_t * 1e-9;
    let steps = ((src.end() - src.start() + eps) / delta_t).floor() as usize + 1;
    let times: Vec<f64> = (0..steps).map(|k| src.start() + k as f64 * delta_t).collect();
    let frames = times.iter().map(|v| (v / delta_t).round() as i64).collect();

    let mut out = Trajectory::from_frames_and_times(frames, times.clone())?;
    for (key, value) in src.annotations() {
        out.set_annotation(key.clone(), value.clone());
    }
    out.set_annotation(DELTA_T, delta_t.to_string());

    for attr in [Attribute::Coord, Attribute::F, Attribute::Mol] {
        let rows: Vec<Vec<f64>> = src
            .values(attr)
            .iter()
            .map(|row| times.iter().map(|&x| interpolate(src.t(), row, x)).collect())
            .collect();
        if !rows.is_empty() {
            out.set_values(attr, &rows)?;
        }
    }
    Ok(out)
}

/// Resample two trajectories on the finer of their two sampling intervals.
fn resample_pair(a: &Trajectory, b: &Trajectory) -> Result<(Trajectory, Trajectory), TrajalignError> {
    let delta_t = a.delta_t()?.min(b.delta_t()?);
    Ok((resample(a, delta_t)?, resample(b, delta_t)?))
}

/// Time offset to add to `t2` so that its intensity best correlates with `t1`.
///
/// `t1` is padded with `NaN` over the lifetime of `t2` on both sides, `t2`
/// is slid over it one sampling interval at a time and at each step the
/// products of the non-NaN intensities are summed. The first maximum wins.
pub fn cross_correlation_lag(t1: &Trajectory, t2: &Trajectory) -> Result<f64, TrajalignError> {
    let (dt1, dt2) = (t1.delta_t()?, t2.delta_t()?);
    if dt1 != dt2 {
        return Err(TrajalignError::DeltaTMismatch {
            left: dt1,
            right: dt2,
        });
    }
    let dt = dt1;
    if t1.is_empty() || t2.is_empty() {
        return Err(TrajalignError::NoTemporalOverlap);
    }

    let mut padded = t1.clone();
    padded.set_start(t1.start() - t2.lifetime())?;
    padded.set_end(t1.end() + t2.lifetime())?;

    let lag0 = padded.start() - t2.start();
    let steps = ((padded.end() - (t2.end() + lag0)) / dt).round() as i64 + 1;

    let mut correlation = Vec::with_capacity(steps.max(0) as usize);
    for step in 0..steps {
        let shift = lag0 + step as f64 * dt;
        let (lo, hi) = (t2.start() + shift, t2.end() + shift);
        let f1: Vec<f64> = padded
            .t()
            .iter()
            .zip(padded.f())
            .filter(|(t, _)| **t - lo > -dt / 2.0 && **t - hi < dt / 2.0)
            .map(|(_, f)| *f)
            .collect();
        if f1.len() != t2.len() {
            return Err(TrajalignError::OverlapSelectionMismatch {
                expected: t2.len(),
                found: f1.len(),
            });
        }
        let sum: f64 = f1
            .iter()
            .zip(t2.f())
            .filter(|(a, b)| !a.is_nan() && !b.is_nan())
            .map(|(a, b)| a * b)
            .sum();
        correlation.push(sum);
    }

    let best = first_argmax(&correlation).ok_or(TrajalignError::NoTemporalOverlap)?;
    Ok(lag0 + best as f64 * dt)
}

/// Restrict two overlapping trajectories to their common time window.
///
/// Both must share the same `delta_t`. When the two grids are offset by a
/// fraction of the sampling interval the longer one is trimmed at its end so
/// that both keep the same number of samples.
pub fn unify_start_and_end(t1: &mut Trajectory, t2: &mut Trajectory) -> Result<(), TrajalignError> {
    let (dt1, dt2) = (t1.delta_t()?, t2.delta_t()?);
    if dt1 != dt2 {
        return Err(TrajalignError::DeltaTMismatch {
            left: dt1,
            right: dt2,
        });
    }
    if t1.is_empty() || t2.is_empty() || t1.start() >= t2.end() || t2.start() >= t1.end() {
        return Err(TrajalignError::NoTemporalOverlap);
    }

    if t1.start() < t2.start() {
        t1.set_start(t2.start())?;
    } else {
        t2.set_start(t1.start())?;
    }
    if t1.end() < t2.end() {
        t2.set_end(t1.end())?;
    } else {
        t1.set_end(t2.end())?;
    }

    let n = t1.len().min(t2.len());
    let head: Vec<usize> = (0..n).collect();
    if t1.len() > n {
        *t1 = t1.extract(&head);
    }
    if t2.len() > n {
        *t2 = t2.extract(&head);
    }
    Ok(())
}

/// Align one channel pair and combine both alignments into the transform
/// of the target onto the reference.
fn pair_transform(
    target: &Trajectory,
    reference: &Trajectory,
    ch1: &Trajectory,
    ch2: &Trajectory,
) -> Result<PairTransform, TrajalignError> {
    let (mut s_target, mut s_ch1) = resample_pair(target, ch1)?;
    let (mut s_reference, mut s_ch2) = resample_pair(reference, ch2)?;

    let ch1_lag = cross_correlation_lag(&s_target, &s_ch1)?;
    s_ch1.shift_time(ch1_lag);
    let ch2_lag = cross_correlation_lag(&s_reference, &s_ch2)?;
    s_ch2.shift_time(ch2_lag);

    unify_start_and_end(&mut s_target, &mut s_ch1)?;
    unify_start_and_end(&mut s_reference, &mut s_ch2)?;

    let one = msd(&s_target, &s_ch1)?;
    let two = msd(&s_reference, &s_ch2)?;

    let angle = (two.angle - one.angle).sin().atan2((two.angle - one.angle).cos());
    let translation =
        -(Rotation2::new(angle) * one.rc) + Rotation2::new(two.angle) * (one.lc - two.lc) + two.rc;

    Ok(PairTransform {
        angle,
        translation,
        lag: ch2_lag - ch1_lag,
    })
}

fn require<'a>(t: &'a Trajectory, key: &str) -> Result<&'a str, TrajalignError> {
    t.annotation(key)
        .ok_or_else(|| TrajalignError::MissingAnnotation(key.to_string()))
}

/// Align the average trajectory `target` onto the average trajectory
/// `reference`, through the simultaneously acquired pairs `(ch1[i], ch2[i])`.
///
/// Arguments
/// -----------------
/// * `target` – average of the protein imaged in `ch1`; needs the `coord_unit`
///   and `t_unit` annotations.
/// * `reference` – average of the protein imaged in `ch2`.
/// * `ch1`, `ch2` – channel trajectories, paired by index.
///
/// Return
/// ----------
/// * The aligned copy of the target, annotated with the transform, and the
///   transform itself.
///
/// See also
/// ------------
/// * [`cross_correlation_lag`] – temporal registration of each pair.
/// * [`msd`] – spatial registration of each pair.
pub fn align_with_channels(
    target: &Trajectory,
    reference: &Trajectory,
    ch1: &[Trajectory],
    ch2: &[Trajectory],
) -> Result<ChannelAlignment, TrajalignError> {
    if ch1.len() != ch2.len() {
        return Err(TrajalignError::ChannelCountMismatch {
            ch1: ch1.len(),
            ch2: ch2.len(),
        });
    }
    if ch1.is_empty() {
        return Err(TrajalignError::EmptyTrajectoryList);
    }
    let coord_unit = require(target, COORD_UNIT)?.to_string();
    let t_unit = require(target, T_UNIT)?.to_string();

    let mut centred_target = target.clone();
    centred_target.translate(&-target.center_mass(), None);
    let reference_center = reference.center_mass();
    let mut centred_reference = reference.clone();
    centred_reference.translate(&-reference_center, None);

    let mut pairs = Vec::with_capacity(ch1.len());
    for (c1, c2) in ch1.iter().zip(ch2) {
        log::info!(
            "aligning {} to {} and {} to {}",
            target.annotation(FILE).unwrap_or("target"),
            c1.annotation(FILE).unwrap_or("ch1"),
            reference.annotation(FILE).unwrap_or("reference"),
            c2.annotation(FILE).unwrap_or("ch2"),
        );
        pairs.push(pair_transform(&centred_target, &centred_reference, c1, c2)?);
    }

    let n = pairs.len();
    let sqrt_n = (n as f64).sqrt();
    let angles: Vec<f64> = pairs.iter().map(|p| p.angle).collect();
    let tx: Vec<f64> = pairs.iter().map(|p| p.translation.x).collect();
    let ty: Vec<f64> = pairs.iter().map(|p| p.translation.y).collect();
    let lags: Vec<f64> = pairs.iter().map(|p| p.lag).collect();

    let transform = ChannelTransform {
        angle: nanmedian(&angles),
        angle_mad: nan_mad(&angles) / sqrt_n,
        translation: Vector2::new(nanmedian(&tx), nanmedian(&ty)),
        translation_mad: Vector2::new(nan_mad(&tx) / sqrt_n, nan_mad(&ty) / sqrt_n),
        lag: nanmedian(&lags),
        lag_mad: nan_mad(&lags),
        n,
        reference_center,
    };
    log::info!("channel alignment: {transform}");

    let mut aligned = centred_target;
    aligned.rotate(transform.angle, Some(transform.angle_mad));
    aligned.translate(&transform.translation, Some(&transform.translation_mad));
    aligned.shift_time(transform.lag);

    if let Some(name) = reference.annotation(FILE) {
        aligned.set_annotation("aligned_to", name.to_string());
    }
    if let Some(name) = target.annotation(FILE) {
        aligned.set_annotation("original_file", name.to_string());
    }
    aligned.set_annotation("alignment_angle", format!("{} rad", transform.angle));
    aligned.set_annotation("alignment_angle_MAD", format!("{} rad", transform.angle_mad));
    aligned.set_annotation(
        "alignment_translation",
        format!(
            "[{}, {}] {coord_unit}",
            transform.translation.x, transform.translation.y
        ),
    );
    aligned.set_annotation(
        "alignment_translation_MAD",
        format!(
            "[{}, {}] {coord_unit}",
            transform.translation_mad.x, transform.translation_mad.y
        ),
    );
    aligned.set_annotation("alignment_lag", format!("{} {t_unit}", transform.lag));
    aligned.set_annotation("alignment_lag_MAD", format!("{} {t_unit}", transform.lag_mad));

    Ok(ChannelAlignment { aligned, transform })
}

/// `dir/name.ext` → `dir/name_aligned.ext`; `_aligned` is appended when there is no extension.
pub fn aligned_file_name(path: impl AsRef<Path>) -> PathBuf {
    let path = path.as_ref();
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let name = match path.extension() {
        Some(ext) => format!("{stem}_aligned.{}", ext.to_string_lossy()),
        None => format!("{stem}_aligned"),
    };
    path.with_file_name(name)
}

/// Load the two average trajectories, align the target onto the reference
/// and save it next to the target under [`aligned_file_name`].
///
/// The file paths are recorded in the `file` annotation of both averages
/// when it is missing. Returns the path of the saved trajectory.
pub fn align_files(
    path_target: impl AsRef<Path>,
    path_reference: impl AsRef<Path>,
    ch1: &[Trajectory],
    ch2: &[Trajectory],
) -> Result<PathBuf, TrajalignError> {
    let (path_target, path_reference) = (path_target.as_ref(), path_reference.as_ref());
    let mut target = Trajectory::load(path_target)?;
    let mut reference = Trajectory::load(path_reference)?;
    if target.annotation(FILE).is_none() {
        target.set_annotation(FILE, path_target.display().to_string());
    }
    if reference.annotation(FILE).is_none() {
        reference.set_annotation(FILE, path_reference.display().to_string());
    }

    let result = align_with_channels(&target, &reference, ch1, ch2)?;
    let out = aligned_file_name(path_target);
    result.aligned.save(&out)?;
    log::info!(
        "the trajectory aligned to {} has been saved as {}",
        path_reference.display(),
        out.display()
    );
    Ok(out)
}
