//! Spectral energy distributions
//!
//! A [`Sed`] holds flux density per unit wavelength (`flux_lambda`, erg s⁻¹ cm⁻²
//! nm⁻¹) on a [`WavelengthGrid`]. It is mutated in place by normalization,
//! dust extinction, redshift and resampling. The frequency-domain flux
//! (`flux_nu`, Jansky) is derived on demand and cached; every mutation clears
//! that cache.
//!
//! The empty SED stands in for "no SED" on an object. It has no grid, and
//! magnitude calculations on it yield NaN rather than failing.

use std::path::Path;

use super::bandpass::Bandpass;
use super::constants::{ab_mag_to_jansky, ab_zero_point, Phys};
use super::dust::DustCoefficients;
use super::error::{PhotometryError, Result};
use super::grid::WavelengthGrid;
use super::table::read_two_column;
use crate::algo::misc::resample_zero_fill;

/// Catalog name meaning "this object has no SED"
pub const NO_SED: &str = "None";

/// True for the names that denote a missing SED
pub fn is_no_sed(name: &str) -> bool {
    name.is_empty() || name == NO_SED
}

/// Convert flux per unit wavelength (erg s⁻¹ cm⁻² nm⁻¹) to Jansky
pub fn flambda_to_fnu(wavelength_nm: f64, flambda: f64) -> f64 {
    flambda * wavelength_nm * wavelength_nm * Phys::NM_TO_M / Phys::SPEED_OF_LIGHT
        * Phys::ERGS_TO_JANSKY
}

/// Convert Jansky to flux per unit wavelength (erg s⁻¹ cm⁻² nm⁻¹)
pub fn fnu_to_flambda(wavelength_nm: f64, fnu: f64) -> f64 {
    fnu / Phys::ERGS_TO_JANSKY * Phys::SPEED_OF_LIGHT
        / (wavelength_nm * wavelength_nm * Phys::NM_TO_M)
}

/// A spectral energy distribution owned by exactly one object
///
/// `Clone` is a deep copy of the flux arrays; the (immutable) wavelength grid is
/// shared until a transform replaces it.
#[derive(Debug, Clone, PartialEq)]
pub struct Sed {
    name: String,
    grid: Option<WavelengthGrid>,
    flambda: Vec<f64>,
    fnu: Option<Vec<f64>>,
}

impl Default for Sed {
    fn default() -> Self {
        Self::empty()
    }
}

impl Sed {
    /// The "no SED" sentinel
    pub fn empty() -> Self {
        Self {
            name: NO_SED.to_string(),
            grid: None,
            flambda: Vec::new(),
            fnu: None,
        }
    }

    /// Create an SED from a grid and `flux_lambda` samples
    pub fn new(name: impl Into<String>, grid: WavelengthGrid, flambda: Vec<f64>) -> Result<Self> {
        if grid.len() != flambda.len() {
            return Err(PhotometryError::InvalidGrid(format!(
                "{} wavelengths but {} flux samples",
                grid.len(),
                flambda.len()
            )));
        }
        Ok(Self {
            name: name.into(),
            grid: Some(grid),
            flambda,
            fnu: None,
        })
    }

    /// A spectrum with constant `flux_nu` (in Jansky) on `grid`
    pub fn flat_fnu(grid: WavelengthGrid, fnu_jansky: f64) -> Self {
        let flambda = grid.iter().map(|&w| fnu_to_flambda(w, fnu_jansky)).collect();
        Self {
            name: "flat".to_string(),
            grid: Some(grid),
            flambda,
            fnu: None,
        }
    }

    /// A flat-in-frequency spectrum with the given AB magnitude
    pub fn flat_ab(grid: WavelengthGrid, ab_mag: f64) -> Self {
        Self::flat_fnu(grid, ab_mag_to_jansky(ab_mag))
    }

    /// Read an SED file (wavelength in nm, `flux_lambda`)
    pub fn from_file(path: &Path, name: impl Into<String>) -> Result<Self> {
        let table = read_two_column(path)?;
        let grid = WavelengthGrid::new(table.wavelengths).map_err(|e| match e {
            PhotometryError::InvalidGrid(message) => PhotometryError::Parse {
                path: path.to_path_buf(),
                line: 0,
                message,
            },
            other => other,
        })?;
        Self::new(name, grid, table.values)
    }

    pub fn is_empty(&self) -> bool {
        self.grid.is_none()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    pub fn grid(&self) -> Option<&WavelengthGrid> {
        self.grid.as_ref()
    }

    pub fn flambda(&self) -> &[f64] {
        &self.flambda
    }

    /// Cached `flux_nu`, if it has been computed since the last mutation
    pub fn cached_fnu(&self) -> Option<&[f64]> {
        self.fnu.as_deref()
    }

    /// `flux_nu` in Jansky, computing and caching it if needed
    pub fn fnu(&mut self) -> &[f64] {
        if self.fnu.is_none() {
            self.fnu = Some(self.compute_fnu());
        }
        self.fnu.as_deref().unwrap_or(&[])
    }

    fn compute_fnu(&self) -> Vec<f64> {
        match &self.grid {
            Some(grid) => grid
                .iter()
                .zip(self.flambda.iter())
                .map(|(&w, &f)| flambda_to_fnu(w, f))
                .collect(),
            None => Vec::new(),
        }
    }

    /// Replace grid and flux together; clears the `flux_nu` cache
    fn replace(&mut self, grid: WavelengthGrid, flambda: Vec<f64>) {
        self.grid = Some(grid);
        self.flambda = flambda;
        self.fnu = None;
    }

    /// Resample onto `grid` in place, zero outside the SED's range
    ///
    /// No-op if the SED is already on an identical grid (the SED then adopts
    /// `grid`'s shared storage). The empty SED is left untouched.
    ///
    /// # Errors
    /// `ShapeMismatch` if `grid` does not overlap the SED at all.
    pub fn resample(&mut self, grid: &WavelengthGrid) -> Result<()> {
        let Some(current) = &self.grid else {
            return Ok(());
        };
        if current == grid {
            self.grid = Some(grid.clone());
            return Ok(());
        }
        let flambda = resample_zero_fill(current, &self.flambda, grid)?;
        self.replace(grid.clone(), flambda);
        Ok(())
    }

    /// Copy of this SED resampled onto `grid`
    pub fn resampled(&self, grid: &WavelengthGrid) -> Result<Self> {
        let mut copy = self.clone();
        copy.resample(grid)?;
        Ok(copy)
    }

    /// Multiply `flux_lambda` by `factor`
    pub fn multiply_flux_norm(&mut self, factor: f64) {
        self.flambda.iter_mut().for_each(|f| *f *= factor);
        if let Some(fnu) = self.fnu.as_mut() {
            fnu.iter_mut().for_each(|f| *f *= factor);
        }
    }

    /// AB magnitude through `bandpass`
    ///
    /// NaN for the empty SED.
    pub fn calc_mag(&self, bandpass: &Bandpass) -> Result<f64> {
        if self.is_empty() {
            return Ok(f64::NAN);
        }
        let phi = bandpass.phi()?;
        // phi() succeeded, so the grid is uniform
        let step = bandpass.grid().uniform_step().unwrap_or(0.0);
        self.calc_mag_phi(bandpass.grid(), &phi, step)
    }

    /// AB magnitude through a normalized `phi` sampled on `grid` with spacing `step`
    ///
    /// NaN for the empty SED.
    pub fn calc_mag_phi(&self, grid: &WavelengthGrid, phi: &[f64], step: f64) -> Result<f64> {
        if self.is_empty() {
            return Ok(f64::NAN);
        }
        let mut on_grid = self.resampled(grid)?;
        let flux: f64 = phi.iter().zip(on_grid.fnu()).map(|(p, f)| p * f).sum::<f64>() * step;
        Ok(-2.5 * flux.log10() - ab_zero_point())
    }

    /// Factor that `flux_lambda` must be multiplied by so that the SED has
    /// magnitude `mag` through `bandpass`
    ///
    /// # Errors
    /// `ShapeMismatch` if the SED has no flux inside `bandpass`.
    pub fn calc_flux_norm(&self, mag: f64, bandpass: &Bandpass) -> Result<f64> {
        let current = self.calc_mag(bandpass)?;
        self.flux_norm_from(current, mag)
    }

    /// Factor taking this SED from magnitude `current` to `mag`
    pub(crate) fn flux_norm_from(&self, current: f64, mag: f64) -> Result<f64> {
        if !current.is_finite() {
            return Err(PhotometryError::ShapeMismatch(format!(
                "SED '{}' has no flux inside the normalization bandpass",
                self.name
            )));
        }
        Ok(10f64.powf(-0.4 * (mag - current)))
    }

    /// Scale the SED so its magnitude through `bandpass` equals `mag`
    pub fn normalize_to(&mut self, mag: f64, bandpass: &Bandpass) -> Result<()> {
        let factor = self.calc_flux_norm(mag, bandpass)?;
        self.multiply_flux_norm(factor);
        Ok(())
    }

    /// Apply dust extinction for `av` magnitudes of V-band extinction
    ///
    /// `coefficients` must have been computed for this SED's current grid.
    pub fn apply_dust(&mut self, coefficients: &DustCoefficients, av: f64, rv: f64) -> Result<()> {
        let Some(grid) = &self.grid else {
            return Ok(());
        };
        if coefficients.grid_key() != grid.key() {
            return Err(PhotometryError::ShapeMismatch(format!(
                "dust coefficients were computed for a different grid than SED '{}'",
                self.name
            )));
        }
        for (f, (a, b)) in self
            .flambda
            .iter_mut()
            .zip(coefficients.a().iter().zip(coefficients.b()))
        {
            let a_lambda = (a + b / rv) * av;
            *f *= 10f64.powf(-0.4 * a_lambda);
        }
        self.fnu = None;
        Ok(())
    }

    /// Shift to redshift `z`: wavelengths stretch by `1 + z`, and with
    /// `dimming` the flux density is divided by `1 + z`
    pub fn redshift(&mut self, z: f64, dimming: bool) -> Result<()> {
        let Some(grid) = &self.grid else {
            return Ok(());
        };
        let factor = 1.0 + z;
        if factor <= 0.0 {
            return Err(PhotometryError::Configuration(format!(
                "redshift {z} gives a non-positive stretch factor"
            )));
        }
        let stretched = if z == 0.0 { grid.clone() } else { grid.scaled(factor)? };
        let mut flambda = std::mem::take(&mut self.flambda);
        if dimming {
            flambda.iter_mut().for_each(|f| *f /= factor);
        }
        self.replace(stretched, flambda);
        Ok(())
    }

    /// Trapezoid integral of `flux_lambda` over wavelength (erg s⁻¹ cm⁻²)
    pub fn integrated_flux(&self) -> f64 {
        let Some(grid) = &self.grid else {
            return 0.0;
        };
        grid.windows(2)
            .zip(self.flambda.windows(2))
            .map(|(w, f)| (w[1] - w[0]) * (f[0] + f[1]) / 2.0)
            .sum()
    }
}
