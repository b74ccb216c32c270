//! # Trajectory container
//!
//! A [`Trajectory`] is the time-ordered record of one tracked particle: an
//! absolute frame number and a time stamp per sample, a 2D position, a
//! fluorescence intensity and a few optional attributes, each optionally
//! paired with an uncertainty.
//!
//! Data model
//! -----------------
//! * `frames` / `t` – absolute frame numbers and times (`t = frame · delta_t`
//!   for trajectories built with [`Trajectory::from_frames`]).
//! * `coord` – a `2 × len` matrix, row 0 holds x and row 1 holds y.
//! * `f`, `mol`, `n` – scalar attributes, empty when absent.
//! * `coord_err`, `f_err`, `mol_err` – uncertainties, empty when absent.
//! * `annotations` – free-form `key → value` strings (units, file identity,
//!   the sampling interval `delta_t`, …).
//!
//! Missing samples are `NaN`, never dropped: every present attribute has
//! exactly `len()` columns so that indices stay aligned to frame numbers.
//!
//! Value semantics
//! -----------------
//! Methods taking `&mut self` ([`rotate`](Trajectory::rotate),
//! [`translate`](Trajectory::translate), [`lag`](Trajectory::lag),
//! [`shift_time`](Trajectory::shift_time), [`set_start`](Trajectory::set_start),
//! [`set_end`](Trajectory::set_end), [`fill`](Trajectory::fill),
//! [`norm_f`](Trajectory::norm_f), [`append`](Trajectory::append)) mutate in place.
//! [`extract`](Trajectory::extract) returns a new, independent trajectory.
//! Callers that need to keep an input untouched clone it first.
use std::collections::BTreeMap;

use ahash::AHashMap;
use nalgebra::{Matrix2xX, Rotation2, Vector2};

use crate::constants::{Frame, Radian, DELTA_T};
use crate::trajalign_errors::TrajalignError;

pub mod attribute;
pub mod csv_io;

pub use attribute::Attribute;

#[derive(Debug, Clone)]
pub struct Trajectory {
    frames: Vec<Frame>,
    t: Vec<f64>,
    coord: Matrix2xX<f64>,
    coord_err: Matrix2xX<f64>,
    f: Vec<f64>,
    f_err: Vec<f64>,
    mol: Vec<f64>,
    mol_err: Vec<f64>,
    n: Vec<f64>,
    annotations: BTreeMap<String, String>,
}

impl Default for Trajectory {
    fn default() -> Self {
        Self {
            frames: Vec::new(),
            t: Vec::new(),
            coord: Matrix2xX::zeros(0),
            coord_err: Matrix2xX::zeros(0),
            f: Vec::new(),
            f_err: Vec::new(),
            mol: Vec::new(),
            mol_err: Vec::new(),
            n: Vec::new(),
            annotations: BTreeMap::new(),
        }
    }
}

impl Trajectory {
    /// Create a trajectory sampled at the given frames, with `t = frame · delta_t`
    /// and the `delta_t` annotation set. Coordinates are initialised to `NaN`.
    pub fn from_frames(frames: Vec<Frame>, delta_t: f64) -> Self {
        let t = frames.iter().map(|&fr| fr as f64 * delta_t).collect();
        let len = frames.len();
        let mut annotations = BTreeMap::new();
        annotations.insert(DELTA_T.to_string(), delta_t.to_string());
        Self {
            frames,
            t,
            coord: Matrix2xX::from_element(len, f64::NAN),
            annotations,
            ..Self::default()
        }
    }

    /// Create a trajectory from explicit frames and times, without `delta_t` annotation.
    pub fn from_frames_and_times(frames: Vec<Frame>, t: Vec<f64>) -> Result<Self, TrajalignError> {
        if frames.len() != t.len() {
            return Err(TrajalignError::LengthMismatch {
                left: frames.len(),
                right: t.len(),
            });
        }
        let len = frames.len();
        Ok(Self {
            frames,
            t,
            coord: Matrix2xX::from_element(len, f64::NAN),
            ..Self::default()
        })
    }

    pub fn with_coord(mut self, coord: Matrix2xX<f64>) -> Result<Self, TrajalignError> {
        self.check_len(coord.ncols())?;
        self.coord = coord;
        Ok(self)
    }

    pub fn with_f(mut self, f: Vec<f64>) -> Result<Self, TrajalignError> {
        self.check_len(f.len())?;
        self.f = f;
        Ok(self)
    }

    pub fn with_annotation(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.annotations.insert(key.into(), value.into());
        self
    }

    fn check_len(&self, other: usize) -> Result<(), TrajalignError> {
        if other != self.len() {
            return Err(TrajalignError::LengthMismatch {
                left: self.len(),
                right: other,
            });
        }
        Ok(())
    }

    // ---------------------------------------------------------------------------------------------
    // Read accessors
    // ---------------------------------------------------------------------------------------------

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn frames(&self) -> &[Frame] {
        &self.frames
    }

    pub fn t(&self) -> &[f64] {
        &self.t
    }

    pub fn coord(&self) -> &Matrix2xX<f64> {
        &self.coord
    }

    /// Coordinate uncertainties; zero columns when absent.
    pub fn coord_err(&self) -> &Matrix2xX<f64> {
        &self.coord_err
    }

    pub fn x(&self) -> Vec<f64> {
        self.coord.row(0).iter().copied().collect()
    }

    pub fn y(&self) -> Vec<f64> {
        self.coord.row(1).iter().copied().collect()
    }

    pub fn f(&self) -> &[f64] {
        &self.f
    }

    pub fn mol(&self) -> &[f64] {
        &self.mol
    }

    pub fn n(&self) -> &[f64] {
        &self.n
    }

    pub fn annotations(&self) -> &BTreeMap<String, String> {
        &self.annotations
    }

    pub fn annotation(&self, key: &str) -> Option<&str> {
        self.annotations.get(key).map(String::as_str)
    }

    pub fn set_annotation(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.annotations.insert(key.into(), value.into());
    }

    /// The sampling interval, read from the `delta_t` annotation.
    pub fn delta_t(&self) -> Result<f64, TrajalignError> {
        let raw = self
            .annotations
            .get(DELTA_T)
            .ok_or_else(|| TrajalignError::MissingAnnotation(DELTA_T.into()))?;
        raw.trim()
            .parse::<f64>()
            .map_err(|_| TrajalignError::InvalidAnnotation {
                key: DELTA_T.into(),
                value: raw.clone(),
            })
    }

    /// First time point (`NaN` for an empty trajectory).
    pub fn start(&self) -> f64 {
        self.t.first().copied().unwrap_or(f64::NAN)
    }

    /// Last time point (`NaN` for an empty trajectory).
    pub fn end(&self) -> f64 {
        self.t.last().copied().unwrap_or(f64::NAN)
    }

    pub fn lifetime(&self) -> f64 {
        self.end() - self.start()
    }

    /// Whether the attribute holds values.
    pub fn has(&self, attr: Attribute) -> bool {
        match attr {
            Attribute::Coord => self.coord.ncols() > 0,
            Attribute::F => !self.f.is_empty(),
            Attribute::Mol => !self.mol.is_empty(),
            Attribute::N => !self.n.is_empty(),
        }
    }

    /// Values of an attribute as `dims()` rows; empty when the attribute is absent.
    pub fn values(&self, attr: Attribute) -> Vec<Vec<f64>> {
        match attr {
            Attribute::Coord => matrix_rows(&self.coord),
            Attribute::F => scalar_rows(&self.f),
            Attribute::Mol => scalar_rows(&self.mol),
            Attribute::N => scalar_rows(&self.n),
        }
    }

    /// Uncertainties of an attribute as `dims()` rows; empty when absent.
    pub fn errors(&self, attr: Attribute) -> Vec<Vec<f64>> {
        match attr {
            Attribute::Coord => matrix_rows(&self.coord_err),
            Attribute::F => scalar_rows(&self.f_err),
            Attribute::Mol => scalar_rows(&self.mol_err),
            Attribute::N => Vec::new(),
        }
    }

    /// Replace the values of an attribute. `rows` must hold `attr.dims()` rows of `len()` values.
    pub fn set_values(&mut self, attr: Attribute, rows: &[Vec<f64>]) -> Result<(), TrajalignError> {
        self.check_rows(attr, rows)?;
        match attr {
            Attribute::Coord => self.coord = rows_to_matrix(rows),
            Attribute::F => self.f = rows[0].clone(),
            Attribute::Mol => self.mol = rows[0].clone(),
            Attribute::N => self.n = rows[0].clone(),
        }
        Ok(())
    }

    /// Replace the uncertainties of an attribute. Attributes without an
    /// uncertainty slot ([`Attribute::has_uncertainty`]) are left untouched.
    pub fn set_errors(&mut self, attr: Attribute, rows: &[Vec<f64>]) -> Result<(), TrajalignError> {
        if !attr.has_uncertainty() {
            return Ok(());
        }
        self.check_rows(attr, rows)?;
        match attr {
            Attribute::Coord => self.coord_err = rows_to_matrix(rows),
            Attribute::F => self.f_err = rows[0].clone(),
            Attribute::Mol => self.mol_err = rows[0].clone(),
            Attribute::N => {}
        }
        Ok(())
    }

    fn check_rows(&self, attr: Attribute, rows: &[Vec<f64>]) -> Result<(), TrajalignError> {
        if rows.len() != attr.dims() {
            return Err(TrajalignError::LengthMismatch {
                left: attr.dims(),
                right: rows.len(),
            });
        }
        rows.iter().try_for_each(|r| self.check_len(r.len()))
    }

    /// Intensity-weighted center of mass, ignoring samples with a missing
    /// coordinate or intensity. Falls back to uniform weights without intensity.
    pub fn center_mass(&self) -> Vector2<f64> {
        let mut acc = Vector2::zeros();
        let mut total = 0.0;
        for (i, col) in self.coord.column_iter().enumerate() {
            let w = if self.f.is_empty() { 1.0 } else { self.f[i] };
            if w.is_nan() || col[0].is_nan() || col[1].is_nan() {
                continue;
            }
            acc += col * w;
            total += w;
        }
        acc / total
    }

    // ---------------------------------------------------------------------------------------------
    // Spatial mutators
    // ---------------------------------------------------------------------------------------------

    /// Rotate the coordinates about the origin by `angle` (counter-clockwise).
    ///
    /// When `angle_err` is given, coordinate uncertainties are propagated in
    /// quadrature (missing uncertainties count as zero):
    ///
    /// ```text
    /// σx'² = cos²θ σx² + sin²θ σy² + σθ² y'²
    /// σy'² = sin²θ σx² + cos²θ σy² + σθ² x'²
    /// ```
    pub fn rotate(&mut self, angle: Radian, angle_err: Option<Radian>) {
        let rot = Rotation2::new(angle).into_inner();
        self.coord = rot * &self.coord;

        let has_err = self.coord_err.ncols() == self.len();
        if !has_err && angle_err.is_none() {
            return;
        }
        let (s, c) = angle.sin_cos();
        let sa = angle_err.unwrap_or(0.0);
        let previous = std::mem::replace(&mut self.coord_err, Matrix2xX::zeros(0));
        self.coord_err = Matrix2xX::from_fn(self.len(), |r, col| {
            let (ex, ey) = if has_err {
                (previous[(0, col)], previous[(1, col)])
            } else {
                (0.0, 0.0)
            };
            let (x, y) = (self.coord[(0, col)], self.coord[(1, col)]);
            match r {
                0 => (c * c * ex * ex + s * s * ey * ey + sa * sa * y * y).sqrt(),
                _ => (s * s * ex * ex + c * c * ey * ey + sa * sa * x * x).sqrt(),
            }
        });
    }

    /// Translate the coordinates by `v`; `v_err` is added in quadrature to the
    /// coordinate uncertainties.
    pub fn translate(&mut self, v: &Vector2<f64>, v_err: Option<&Vector2<f64>>) {
        self.coord.row_mut(0).add_scalar_mut(v.x);
        self.coord.row_mut(1).add_scalar_mut(v.y);

        if let Some(e) = v_err {
            if self.coord_err.ncols() != self.len() {
                self.coord_err = Matrix2xX::zeros(self.len());
            }
            for mut col in self.coord_err.column_iter_mut() {
                col[0] = col[0].hypot(e.x);
                col[1] = col[1].hypot(e.y);
            }
        }
    }

    // ---------------------------------------------------------------------------------------------
    // Temporal mutators
    // ---------------------------------------------------------------------------------------------

    /// Shift the trajectory by a whole number of frames (`t` moves by `frames · delta_t`).
    pub fn lag(&mut self, frames: Frame) -> Result<(), TrajalignError> {
        let dt = self.delta_t()?;
        self.frames.iter_mut().for_each(|fr| *fr += frames);
        self.t.iter_mut().for_each(|t| *t += frames as f64 * dt);
        Ok(())
    }

    /// Shift the time axis by a continuous offset; frame numbers are unchanged.
    pub fn shift_time(&mut self, offset: f64) {
        self.t.iter_mut().for_each(|t| *t += offset);
    }

    /// Move the start of the trajectory to `start`, snapped to the trajectory's
    /// own sampling grid: earlier starts pad with `NaN` samples, later starts
    /// truncate.
    pub fn set_start(&mut self, start: f64) -> Result<(), TrajalignError> {
        let dt = self.delta_t()?;
        if self.is_empty() || !start.is_finite() {
            return Ok(());
        }
        let k = ((start - self.start()) / dt).round() as i64;
        if k < 0 {
            let pad = (-k) as usize;
            let first_frame = self.frames[0];
            let first_t = self.start();
            let mut sources = vec![None; pad];
            sources.extend((0..self.len()).map(Some));
            let frames = (1..=pad as i64)
                .rev()
                .map(|i| first_frame - i)
                .chain(self.frames.iter().copied())
                .collect();
            let t = (1..=pad)
                .rev()
                .map(|i| first_t - i as f64 * dt)
                .chain(self.t.iter().copied())
                .collect();
            *self = self.reindexed(&sources, frames, t);
        } else if k > 0 {
            let snapped = self.start() + k as f64 * dt;
            let keep: Vec<usize> = (0..self.len())
                .filter(|&i| self.t[i] > snapped - dt / 2.0)
                .collect();
            *self = self.extract(&keep);
        }
        Ok(())
    }

    /// Move the end of the trajectory to `end`, snapped to the trajectory's own
    /// sampling grid: later ends pad with `NaN` samples, earlier ends truncate.
    pub fn set_end(&mut self, end: f64) -> Result<(), TrajalignError> {
        let dt = self.delta_t()?;
        if self.is_empty() || !end.is_finite() {
            return Ok(());
        }
        let k = ((end - self.end()) / dt).round() as i64;
        if k > 0 {
            let pad = k as usize;
            let last_frame = self.frames[self.len() - 1];
            let last_t = self.end();
            let mut sources: Vec<Option<usize>> = (0..self.len()).map(Some).collect();
            sources.extend(std::iter::repeat(None).take(pad));
            let frames = self
                .frames
                .iter()
                .copied()
                .chain((1..=pad as i64).map(|i| last_frame + i))
                .collect();
            let t = self
                .t
                .iter()
                .copied()
                .chain((1..=pad).map(|i| last_t + i as f64 * dt))
                .collect();
            *self = self.reindexed(&sources, frames, t);
        } else if k < 0 {
            let snapped = self.end() + k as f64 * dt;
            let keep: Vec<usize> = (0..self.len())
                .filter(|&i| self.t[i] < snapped + dt / 2.0)
                .collect();
            *self = self.extract(&keep);
        }
        Ok(())
    }

    /// Insert `NaN` samples for every frame missing between the first and the
    /// last one, so that frames become contiguous.
    pub fn fill(&mut self) -> Result<(), TrajalignError> {
        let dt = self.delta_t()?;
        if self.is_empty() {
            return Ok(());
        }
        let first = self.frames[0];
        let last = self.frames[self.len() - 1];
        let first_t = self.start();
        let index: AHashMap<Frame, usize> =
            self.frames.iter().enumerate().map(|(i, &fr)| (fr, i)).collect();
        let frames: Vec<Frame> = (first..=last).collect();
        let sources: Vec<Option<usize>> = frames.iter().map(|fr| index.get(fr).copied()).collect();
        let t = frames
            .iter()
            .zip(&sources)
            .map(|(&fr, src)| match src {
                Some(i) => self.t[*i],
                None => first_t + (fr - first) as f64 * dt,
            })
            .collect();
        *self = self.reindexed(&sources, frames, t);
        Ok(())
    }

    // ---------------------------------------------------------------------------------------------
    // Structural operations
    // ---------------------------------------------------------------------------------------------

    /// A new trajectory restricted to the given sample indices (in the given order).
    pub fn extract(&self, indices: &[usize]) -> Trajectory {
        let sources: Vec<Option<usize>> = indices.iter().copied().map(Some).collect();
        let frames = indices.iter().map(|&i| self.frames[i]).collect();
        let t = indices.iter().map(|&i| self.t[i]).collect();
        self.reindexed(&sources, frames, t)
    }

    /// Append the samples of `other` after the samples of `self`. Attributes
    /// present on only one side are `NaN`-padded; annotations of `self` are kept.
    pub fn append(&mut self, other: &Trajectory) {
        let (n1, n2) = (self.len(), other.len());
        let concat = |a: &Vec<f64>, b: &Vec<f64>| -> Vec<f64> {
            if a.is_empty() && b.is_empty() {
                return Vec::new();
            }
            let left = if a.is_empty() { vec![f64::NAN; n1] } else { a.clone() };
            let right = if b.is_empty() { vec![f64::NAN; n2] } else { b.clone() };
            left.into_iter().chain(right).collect()
        };
        let concat_matrix = |a: &Matrix2xX<f64>, b: &Matrix2xX<f64>| -> Matrix2xX<f64> {
            if a.ncols() == 0 && b.ncols() == 0 {
                return Matrix2xX::zeros(0);
            }
            Matrix2xX::from_fn(n1 + n2, |r, c| {
                if c < n1 {
                    a.get((r, c)).copied().unwrap_or(f64::NAN)
                } else {
                    b.get((r, c - n1)).copied().unwrap_or(f64::NAN)
                }
            })
        };

        self.coord = concat_matrix(&self.coord, &other.coord);
        self.coord_err = concat_matrix(&self.coord_err, &other.coord_err);
        self.f = concat(&self.f, &other.f);
        self.f_err = concat(&self.f_err, &other.f_err);
        self.mol = concat(&self.mol, &other.mol);
        self.mol_err = concat(&self.mol_err, &other.mol_err);
        self.n = concat(&self.n, &other.n);
        self.frames.extend_from_slice(&other.frames);
        self.t.extend_from_slice(&other.t);
    }

    /// Rescale the intensity to `[0, 1]` (`NaN` samples are kept as they are).
    pub fn norm_f(&mut self) {
        let (min, max) = self
            .f
            .iter()
            .filter(|v| !v.is_nan())
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| {
                (lo.min(v), hi.max(v))
            });
        let range = max - min;
        if !(range > 0.0) {
            return;
        }
        self.f.iter_mut().for_each(|v| *v = (*v - min) / range);
        self.f_err.iter_mut().for_each(|e| *e /= range);
    }

    /// Build a trajectory whose sample `k` is copied from `sources[k]`
    /// (`None` gives a `NaN` sample). Absent attributes stay absent.
    fn reindexed(&self, sources: &[Option<usize>], frames: Vec<Frame>, t: Vec<f64>) -> Trajectory {
        let pick = |v: &Vec<f64>| -> Vec<f64> {
            if v.is_empty() {
                return Vec::new();
            }
            sources
                .iter()
                .map(|s| s.map_or(f64::NAN, |i| v[i]))
                .collect()
        };
        let pick_matrix = |m: &Matrix2xX<f64>| -> Matrix2xX<f64> {
            Matrix2xX::from_fn(sources.len(), |r, c| {
                sources[c].map_or(f64::NAN, |i| m[(r, i)])
            })
        };

        Trajectory {
            frames,
            t,
            coord: pick_matrix(&self.coord),
            coord_err: if self.coord_err.ncols() == 0 {
                Matrix2xX::zeros(0)
            } else {
                pick_matrix(&self.coord_err)
            },
            f: pick(&self.f),
            f_err: pick(&self.f_err),
            mol: pick(&self.mol),
            mol_err: pick(&self.mol_err),
            n: pick(&self.n),
            annotations: self.annotations.clone(),
        }
    }
}

fn scalar_rows(v: &[f64]) -> Vec<Vec<f64>> {
    if v.is_empty() {
        Vec::new()
    } else {
        vec![v.to_vec()]
    }
}

fn matrix_rows(m: &Matrix2xX<f64>) -> Vec<Vec<f64>> {
    if m.ncols() == 0 {
        return Vec::new();
    }
    m.row_iter().map(|r| r.iter().copied().collect()).collect()
}

fn rows_to_matrix(rows: &[Vec<f64>]) -> Matrix2xX<f64> {
    Matrix2xX::from_fn(rows[0].len(), |r, c| rows[r][c])
}
