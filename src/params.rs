//! # Alignment parameters
//!
//! [`AlignParams`] centralizes the tunable knobs of
//! [`align_trajectories`](crate::alignment::align_trajectories):
//!
//! - how far the local lag refinement scans around the best triplicated offset,
//! - whether the first refinement penalizes alignments supported by few frames,
//! - how the averaged trajectory decides that a trajectory ended before the end
//!   of the recording,
//! - how the robust line fit of the lie-down step samples its candidate lines.
//!
//! ## Example
//!
//! ```rust
//! use trajalign::params::AlignParams;
//!
//! let params = AlignParams::builder()
//!     .max_frame(1200)
//!     .refine_half_window(5)
//!     .build()
//!     .unwrap();
//! assert_eq!(params.max_frame, 1200);
//! ```
use std::fmt;

use crate::constants::{
    Frame, DEFAULT_MAX_FRAME, END_MARGIN_FRAMES, RANSAC_MAX_TRIALS, REFINE_HALF_WINDOW,
};
use crate::trajalign_errors::TrajalignError;

/// Configuration of the multi-trajectory alignment.
///
/// Fields
/// -----------------
/// * `max_frame` – last frame of the recording. A trajectory whose original
///   end is earlier than `(max_frame - end_margin_frames) · delta_t` ended
///   inside the recording and its end is informative for the averaged span.
/// * `end_margin_frames` – see `max_frame`.
/// * `refine_half_window` – the second lag refinement scans
///   `lag - refine_half_window ..= lag + refine_half_window`.
/// * `weight_overlap` – divide the first-refinement score by `sqrt(overlap)`.
/// * `ransac_max_trials` – number of candidate lines of the robust fit. When the
///   number of point pairs is not larger, every pair is tried.
/// * `ransac_seed` – seed of the candidate sampler.
/// * `lie_down` – normalize the pose of every averaged trajectory.
///
/// Defaults
/// -----------------
/// * `max_frame`: 500
/// * `end_margin_frames`: 3
/// * `refine_half_window`: 10
/// * `weight_overlap`: true
/// * `ransac_max_trials`: 100
/// * `ransac_seed`: 0
/// * `lie_down`: true
#[derive(Debug, Clone, PartialEq)]
pub struct AlignParams {
    pub max_frame: Frame,
    pub end_margin_frames: Frame,
    pub refine_half_window: Frame,
    pub weight_overlap: bool,
    pub ransac_max_trials: usize,
    pub ransac_seed: u64,
    pub lie_down: bool,
}

impl AlignParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn builder() -> AlignParamsBuilder {
        AlignParamsBuilder::new()
    }
}

impl Default for AlignParams {
    fn default() -> Self {
        AlignParams {
            max_frame: DEFAULT_MAX_FRAME,
            end_margin_frames: END_MARGIN_FRAMES,
            refine_half_window: REFINE_HALF_WINDOW,
            weight_overlap: true,
            ransac_max_trials: RANSAC_MAX_TRIALS,
            ransac_seed: 0,
            lie_down: true,
        }
    }
}

/// Builder for [`AlignParams`], with validation.
#[derive(Debug, Clone, Default)]
pub struct AlignParamsBuilder {
    params: AlignParams,
}

impl AlignParamsBuilder {
    pub fn new() -> Self {
        Self {
            params: AlignParams::default(),
        }
    }

    pub fn max_frame(mut self, v: Frame) -> Self {
        self.params.max_frame = v;
        self
    }
    pub fn end_margin_frames(mut self, v: Frame) -> Self {
        self.params.end_margin_frames = v;
        self
    }
    pub fn refine_half_window(mut self, v: Frame) -> Self {
        self.params.refine_half_window = v;
        self
    }
    pub fn weight_overlap(mut self, v: bool) -> Self {
        self.params.weight_overlap = v;
        self
    }
    pub fn ransac_max_trials(mut self, v: usize) -> Self {
        self.params.ransac_max_trials = v;
        self
    }
    pub fn ransac_seed(mut self, v: u64) -> Self {
        self.params.ransac_seed = v;
        self
    }
    pub fn lie_down(mut self, v: bool) -> Self {
        self.params.lie_down = v;
        self
    }

    /// Finalize the builder.
    ///
    /// Validation rules
    /// -----------------
    /// * `end_margin_frames >= 0`
    /// * `max_frame > end_margin_frames`
    /// * `refine_half_window >= 0`
    /// * `ransac_max_trials >= 1`
    pub fn build(self) -> Result<AlignParams, TrajalignError> {
        let p = &self.params;

        if p.end_margin_frames < 0 {
            return Err(TrajalignError::InvalidAlignParameter(
                "end_margin_frames must be >= 0".into(),
            ));
        }
        if p.max_frame <= p.end_margin_frames {
            return Err(TrajalignError::InvalidAlignParameter(
                "max_frame must be > end_margin_frames".into(),
            ));
        }
        if p.refine_half_window < 0 {
            return Err(TrajalignError::InvalidAlignParameter(
                "refine_half_window must be >= 0".into(),
            ));
        }
        if p.ransac_max_trials == 0 {
            return Err(TrajalignError::InvalidAlignParameter(
                "ransac_max_trials must be >= 1".into(),
            ));
        }

        Ok(self.params)
    }
}

impl fmt::Display for AlignParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if f.alternate() {
            writeln!(f, "Alignment Parameters")?;
            writeln!(f, "--------------------")?;
            writeln!(f, "  max_frame          = {}", self.max_frame)?;
            writeln!(f, "  end_margin_frames  = {}", self.end_margin_frames)?;
            writeln!(f, "  refine_half_window = {}", self.refine_half_window)?;
            writeln!(f, "  weight_overlap     = {}", self.weight_overlap)?;
            writeln!(f, "  ransac_max_trials  = {}", self.ransac_max_trials)?;
            writeln!(f, "  ransac_seed        = {}", self.ransac_seed)?;
            write!(f, "  lie_down           = {}", self.lie_down)
        } else {
            write!(
                f,
                "AlignParams(max_frame={}, end_margin={}, refine=±{}, weight_overlap={}, ransac_trials={}, lie_down={})",
                self.max_frame,
                self.end_margin_frames,
                self.refine_half_window,
                self.weight_overlap,
                self.ransac_max_trials,
                self.lie_down,
            )
        }
    }
}
