//! Interstellar dust extinction
//!
//! Implements the Cardelli, Clayton & Mathis (1989) extinction law with the
//! O'Donnell (1994) update to the optical coefficients. The law is expressed as
//! two wavelength-dependent coefficient arrays `a(λ)` and `b(λ)`; extinction in
//! magnitudes at each wavelength is
//!
//! ```text
//! A(λ) = Av · (a(λ) + b(λ) / Rv)
//! ```
//!
//! Synthesizing `a` and `b` is the expensive part and depends only on the
//! wavelength grid, so [`ExtinctionEngine`] caches them keyed on the grid's
//! content token and reuses them across every SED in a batch that shares a grid.

use log::debug;

use super::error::{PhotometryError, Result};
use super::grid::{GridKey, WavelengthGrid};
use super::sed::Sed;

/// Milky Way average ratio of total to selective extinction
pub const DEFAULT_RV: f64 = 3.1;

/// CCM/O'Donnell `a(λ)` and `b(λ)` for one wavelength grid
#[derive(Debug, Clone, PartialEq)]
pub struct DustCoefficients {
    grid_key: GridKey,
    a: Vec<f64>,
    b: Vec<f64>,
}

impl DustCoefficients {
    /// Evaluate the extinction law on every sample of `grid`
    ///
    /// Wavelengths outside 1/11 to 1/0.3 µm get `a = b = 0` (no extinction).
    pub fn compute(grid: &WavelengthGrid) -> Self {
        let (a, b) = grid.iter().map(|&w| ccm_ab(w)).unzip();
        Self {
            grid_key: grid.key(),
            a,
            b,
        }
    }

    pub fn grid_key(&self) -> GridKey {
        self.grid_key
    }

    pub fn a(&self) -> &[f64] {
        &self.a
    }

    pub fn b(&self) -> &[f64] {
        &self.b
    }
}

/// CCM/O'Donnell coefficients at a single wavelength in nanometers
pub fn ccm_ab(wavelength_nm: f64) -> (f64, f64) {
    // Inverse wavelength in µm⁻¹
    let x = 1000.0 / wavelength_nm;

    if (0.3..=1.1).contains(&x) {
        // Infrared
        let xp = x.powf(1.61);
        (0.574 * xp, -0.527 * xp)
    } else if x > 1.1 && x <= 3.3 {
        // Optical/NIR, O'Donnell (1994) polynomial
        let y = x - 1.82;
        let a = poly(
            y,
            &[1.0, 0.104, -0.609, 0.701, 1.137, -1.718, -0.827, 1.647, -0.505],
        );
        let b = poly(
            y,
            &[0.0, 1.952, 2.908, -3.989, -7.985, 11.102, 5.491, -10.805, 3.347],
        );
        (a, b)
    } else if x > 3.3 && x <= 8.0 {
        // Ultraviolet, with the far-UV curvature above 5.9 µm⁻¹
        let (fa, fb) = if x >= 5.9 {
            let d = x - 5.9;
            (
                -0.04473 * d * d - 0.009779 * d * d * d,
                0.2130 * d * d + 0.1207 * d * d * d,
            )
        } else {
            (0.0, 0.0)
        };
        let a = 1.752 - 0.316 * x - 0.104 / ((x - 4.67).powi(2) + 0.341) + fa;
        let b = -3.090 + 1.825 * x + 1.206 / ((x - 4.62).powi(2) + 0.263) + fb;
        (a, b)
    } else if x > 8.0 && x <= 11.0 {
        // Far ultraviolet
        let y = x - 8.0;
        let a = poly(y, &[-1.073, -0.628, 0.137, -0.070]);
        let b = poly(y, &[13.670, 4.257, -0.420, 0.374]);
        (a, b)
    } else {
        (0.0, 0.0)
    }
}

/// Evaluate `Σ c[i] · y^i` with Horner's rule
fn poly(y: f64, coefficients: &[f64]) -> f64 {
    coefficients.iter().rev().fold(0.0, |acc, c| acc * y + c)
}

/// Applies per-object extinction to batches of SEDs
///
/// Owns the coefficient cache, so each worker that processes batches
/// concurrently needs its own engine.
#[derive(Debug, Clone)]
pub struct ExtinctionEngine {
    rv: f64,
    cache: Option<DustCoefficients>,
    recomputations: usize,
}

impl Default for ExtinctionEngine {
    fn default() -> Self {
        Self::new(DEFAULT_RV)
    }
}

impl ExtinctionEngine {
    pub fn new(rv: f64) -> Self {
        Self {
            rv,
            cache: None,
            recomputations: 0,
        }
    }

    pub fn rv(&self) -> f64 {
        self.rv
    }

    /// Number of times the coefficients have been synthesized
    pub fn recomputations(&self) -> usize {
        self.recomputations
    }

    /// Coefficients for `grid`, reusing the cache when the grid content matches
    pub fn coefficients_for(&mut self, grid: &WavelengthGrid) -> &DustCoefficients {
        let stale = self
            .cache
            .as_ref()
            .map_or(true, |cached| cached.grid_key() != grid.key());
        if stale {
            debug!("Synthesizing dust coefficients for {} samples", grid.len());
            self.recomputations += 1;
            self.cache = Some(DustCoefficients::compute(grid));
        }
        // Populated above when stale
        self.cache.get_or_insert_with(|| DustCoefficients::compute(grid))
    }

    /// Apply `av_values[i]` of extinction to `seds[i]` in place
    ///
    /// No-op when `av_values` is `None`. Empty SEDs are skipped.
    ///
    /// # Errors
    /// `ShapeMismatch` if the two slices differ in length.
    pub fn apply(&mut self, seds: &mut [Sed], av_values: Option<&[f64]>) -> Result<()> {
        let Some(av_values) = av_values else {
            return Ok(());
        };
        if av_values.len() != seds.len() {
            return Err(PhotometryError::ShapeMismatch(format!(
                "{} Av values for {} SEDs",
                av_values.len(),
                seds.len()
            )));
        }

        let rv = self.rv;
        for (sed, &av) in seds.iter_mut().zip(av_values) {
            let Some(grid) = sed.grid().cloned() else {
                continue;
            };
            let coefficients = self.coefficients_for(&grid);
            sed.apply_dust(coefficients, av, rv)?;
        }
        Ok(())
    }
}
