//! Immutable wavelength grids with a content identity token
//!
//! Several caches in the pipeline (dust coefficients, phi arrays, uncertainty
//! parameters) are only valid for one particular wavelength sampling. Instead
//! of comparing array lengths, each [`WavelengthGrid`] hashes its contents once
//! at construction into a [`GridKey`] that caches compare against.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::ops::Deref;
use std::sync::Arc;

use super::error::{PhotometryError, Result};
use crate::algo::misc::{uniform_step, validate_ascending};

/// Relative tolerance used when deciding whether a grid is uniformly sampled
pub const UNIFORM_STEP_TOLERANCE: f64 = 1e-6;

/// Lower edge of the default throughput grid in nanometers
pub const DEFAULT_WAVELENGTH_MIN_NM: f64 = 300.0;

/// Upper edge of the default throughput grid in nanometers
pub const DEFAULT_WAVELENGTH_MAX_NM: f64 = 1150.0;

/// Step of the default throughput grid in nanometers
pub const DEFAULT_WAVELENGTH_STEP_NM: f64 = 0.1;

/// Content-derived identity of a wavelength grid
///
/// Two grids with identical samples share a key; any change in length or in a
/// single sample produces a different key (up to hash collisions).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GridKey(u64);

impl GridKey {
    fn of(values: &[f64]) -> Self {
        let mut hasher = DefaultHasher::new();
        values.len().hash(&mut hasher);
        for v in values {
            v.to_bits().hash(&mut hasher);
        }
        GridKey(hasher.finish())
    }

    /// Raw token value, for mixing into composite cache keys
    pub fn value(&self) -> u64 {
        self.0
    }
}

/// Strictly increasing wavelength samples in nanometers
///
/// Cloning is cheap: the samples live behind an `Arc` and are shared until a
/// transform produces a new grid.
#[derive(Debug, Clone)]
pub struct WavelengthGrid {
    values: Arc<[f64]>,
    key: GridKey,
}

impl WavelengthGrid {
    /// Create a grid from explicit samples
    ///
    /// # Errors
    /// Returns `InvalidGrid` if there are fewer than 2 samples, any sample is
    /// non-finite, or the samples are not strictly increasing.
    pub fn new(values: Vec<f64>) -> Result<Self> {
        validate_ascending(&values).map_err(|e| PhotometryError::InvalidGrid(e.to_string()))?;
        let key = GridKey::of(&values);
        Ok(Self {
            values: values.into(),
            key,
        })
    }

    /// Create a uniformly sampled grid from `min_nm` to `max_nm` inclusive
    ///
    /// # Errors
    /// `InvalidGrid` unless all three arguments are finite, `step_nm > 0` and
    /// `max_nm > min_nm`.
    pub fn from_range(min_nm: f64, max_nm: f64, step_nm: f64) -> Result<Self> {
        let finite = min_nm.is_finite() && max_nm.is_finite() && step_nm.is_finite();
        if !finite || step_nm <= 0.0 || max_nm <= min_nm {
            return Err(PhotometryError::InvalidGrid(format!(
                "invalid range {min_nm}..{max_nm} step {step_nm}"
            )));
        }
        Self::new(uniform_samples(min_nm, max_nm, step_nm))
    }

    /// The 300-1150 nm, 0.1 nm grid that throughputs are composed on by default
    pub fn default_throughput() -> Self {
        let values = uniform_samples(
            DEFAULT_WAVELENGTH_MIN_NM,
            DEFAULT_WAVELENGTH_MAX_NM,
            DEFAULT_WAVELENGTH_STEP_NM,
        );
        let key = GridKey::of(&values);
        Self {
            values: values.into(),
            key,
        }
    }

    pub fn key(&self) -> GridKey {
        self.key
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.values
    }

    pub fn first(&self) -> f64 {
        self.values[0]
    }

    pub fn last(&self) -> f64 {
        self.values[self.values.len() - 1]
    }

    /// Step of the grid if it is uniformly sampled
    pub fn uniform_step(&self) -> Option<f64> {
        uniform_step(&self.values, UNIFORM_STEP_TOLERANCE)
    }

    /// True if both grids point at the same shared allocation
    pub fn shares_storage_with(&self, other: &WavelengthGrid) -> bool {
        Arc::ptr_eq(&self.values, &other.values)
    }

    /// New grid with every sample multiplied by `factor`
    pub fn scaled(&self, factor: f64) -> Result<Self> {
        Self::new(self.values.iter().map(|w| w * factor).collect())
    }
}

fn uniform_samples(min_nm: f64, max_nm: f64, step_nm: f64) -> Vec<f64> {
    let count = ((max_nm - min_nm) / step_nm).round() as usize + 1;
    (0..count).map(|i| min_nm + i as f64 * step_nm).collect()
}

impl Deref for WavelengthGrid {
    type Target = [f64];

    fn deref(&self) -> &[f64] {
        &self.values
    }
}

impl PartialEq for WavelengthGrid {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key && self.values[..] == other.values[..]
    }
}
