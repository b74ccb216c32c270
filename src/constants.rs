//! # Constants and type definitions for trajalign
//!
//! Numerical defaults shared by the alignment, averaging and pose-normalization
//! stages, the annotation keys the crate reads and writes, and a few type aliases.

// -------------------------------------------------------------------------------------------------
// Numerical defaults
// -------------------------------------------------------------------------------------------------

/// 2π
pub const DPI: f64 = 2. * std::f64::consts::PI;

/// Default last frame of a recording (frames are counted from 0).
pub const DEFAULT_MAX_FRAME: Frame = 500;

/// A trajectory is considered to end *before* the recording end when its last
/// time point is earlier than `(max_frame - END_MARGIN_FRAMES) * delta_t`.
pub const END_MARGIN_FRAMES: Frame = 3;

/// Half-width (frames) of the second, local lag refinement.
pub const REFINE_HALF_WINDOW: Frame = 10;

/// Default number of RANSAC trials for the lie-down line fit.
pub const RANSAC_MAX_TRIALS: usize = 100;

/// Lower bound of the RANSAC inlier threshold, used when the MAD of the
/// ordinates collapses to zero (e.g. perfectly collinear points).
pub const MIN_RESIDUAL_THRESHOLD: f64 = 1e-9;

// -------------------------------------------------------------------------------------------------
// Annotation keys
// -------------------------------------------------------------------------------------------------

pub const DELTA_T: &str = "delta_t";
pub const T_UNIT: &str = "t_unit";
pub const COORD_UNIT: &str = "coord_unit";
pub const FILE: &str = "file";
pub const REFERENCE_FILE: &str = "reference_file";

// -------------------------------------------------------------------------------------------------
// Type aliases
// -------------------------------------------------------------------------------------------------

/// Absolute frame number in a recording
pub type Frame = i64;

/// Angle in radians
pub type Radian = f64;
