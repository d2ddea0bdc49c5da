//! Synthetic photometry for simulated astronomical sources
//!
//! Builds bandpass catalogs from instrument and atmosphere throughput curves,
//! loads per-object SEDs, applies dust extinction and redshift, integrates
//! magnitudes and estimates their uncertainties.

pub mod algo;
pub mod config;
pub mod photometry;
