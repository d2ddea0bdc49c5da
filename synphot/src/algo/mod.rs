//! Numerical helpers used by the photometry pipeline
//!
//! Resampling onto wavelength grids and grid checks.

pub mod misc;

pub use misc::{resample_zero_fill, uniform_step, InterpError};
