//! Alignment and averaging of 2D fluorescence-microscopy trajectories.
//!
//! Repeated observations of the same process, each a [`Trajectory`] of
//! positions and fluorescence intensities, are aligned in space (rotation and
//! translation) and in time (integer frame lag), averaged into a consensus
//! trajectory with per-point uncertainty, and brought to a canonical pose.
//!
//! * [`alignment::align_trajectories`] – full pipeline, returns an [`AlignmentReport`].
//! * [`channel_align::align_with_channels`] – alignment of two averages through
//!   simultaneously imaged channel pairs.
//!
//! The crate logs through the [`log`] facade and never installs a logger.
pub mod alignment;
pub mod average;
pub mod channel_align;
pub mod constants;
pub mod nan_stats;
pub mod params;
#[cfg(feature = "progress")]
pub mod progress;
pub mod trajalign_errors;
pub mod trajectory;

pub use alignment::{align_trajectories, AlignmentReport};
pub use params::AlignParams;
pub use trajalign_errors::TrajalignError;
pub use trajectory::{Attribute, Trajectory};
