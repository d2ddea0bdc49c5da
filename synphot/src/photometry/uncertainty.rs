//! Photometric uncertainty model
//!
//! Implements the closed-form magnitude error of Ivezić et al. (2008,
//! arXiv:0805.2366, eq. 5). For a source of magnitude `m` observed to a
//! 5-sigma depth `m5`:
//!
//! ```text
//! x      = 10^(0.4 (m - m5))
//! σ_rand = sqrt((0.04 - γ) x + γ x²)
//! σ      = sqrt(σ_phot² + σ_sys²),   σ_phot = 2.5 log10(1 + σ_rand)
//! ```
//!
//! `γ` depends on the band's throughput, its `m5` and the instrument
//! parameters. [`UncertaintyModel`] derives `(m5, γ)` for every band of a
//! catalog once and reuses them for later batches against the same catalog,
//! depth table and parameters.

use std::collections::hash_map::DefaultHasher;
use std::collections::BTreeMap;
use std::hash::{Hash, Hasher};

use log::debug;
use ndarray::Array2;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

use super::bandpass::Bandpass;
use super::catalog::{BandpassCatalog, CatalogKey};
use super::constants::{ab_mag_to_jansky, Phys};
use super::error::{PhotometryError, Result};

/// Instrument constants used by the photon-count and error calculations
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PhotometricParameters {
    /// Exposure time of a single exposure in seconds
    pub exptime: f64,
    /// Number of exposures per visit
    pub nexp: u32,
    /// Effective collecting area in cm²
    pub effarea: f64,
    /// Electrons per ADU
    pub gain: f64,
    /// Read noise in electrons per pixel
    pub readnoise: f64,
    /// Additional instrumental noise in electrons per pixel
    pub othernoise: f64,
    /// Dark current in electrons per pixel per second
    pub darkcurrent: f64,
    /// Arcseconds per pixel
    pub platescale: f64,
    /// Systematic error floor in magnitudes
    pub sigma_sys: f64,
}

impl Default for PhotometricParameters {
    fn default() -> Self {
        Self {
            exptime: 15.0,
            nexp: 2,
            effarea: std::f64::consts::PI * (642.3_f64 / 2.0).powi(2),
            gain: 2.3,
            readnoise: 8.8,
            othernoise: 0.0,
            darkcurrent: 0.2,
            platescale: 0.2,
            sigma_sys: 0.005,
        }
    }
}

impl PhotometricParameters {
    pub fn with_exptime(mut self, exptime: f64) -> Self {
        self.exptime = exptime;
        self
    }

    pub fn with_nexp(mut self, nexp: u32) -> Self {
        self.nexp = nexp;
        self
    }

    pub fn with_effarea(mut self, effarea: f64) -> Self {
        self.effarea = effarea;
        self
    }

    pub fn with_gain(mut self, gain: f64) -> Self {
        self.gain = gain;
        self
    }

    pub fn with_readnoise(mut self, readnoise: f64) -> Self {
        self.readnoise = readnoise;
        self
    }

    pub fn with_sigma_sys(mut self, sigma_sys: f64) -> Self {
        self.sigma_sys = sigma_sys;
        self
    }

    /// Total open-shutter time of a visit in seconds
    pub fn total_exposure(&self) -> f64 {
        self.exptime * f64::from(self.nexp)
    }

    fn fingerprint<H: Hasher>(&self, hasher: &mut H) {
        for v in [
            self.exptime,
            self.effarea,
            self.gain,
            self.readnoise,
            self.othernoise,
            self.darkcurrent,
            self.platescale,
            self.sigma_sys,
        ] {
            v.to_bits().hash(hasher);
        }
        self.nexp.hash(hasher);
    }
}

/// 5-sigma limiting magnitudes keyed by band label
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DepthTable(BTreeMap<String, f64>);

impl DepthTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, band: impl Into<String>, m5: f64) -> Self {
        self.0.insert(band.into(), m5);
        self
    }

    pub fn insert(&mut self, band: impl Into<String>, m5: f64) {
        self.0.insert(band.into(), m5);
    }

    pub fn get(&self, band: &str) -> Option<f64> {
        self.0.get(band).copied()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    fn fingerprint<H: Hasher>(&self, hasher: &mut H) {
        for (band, m5) in &self.0 {
            band.hash(hasher);
            m5.to_bits().hash(hasher);
        }
    }
}

impl<S: Into<String>> FromIterator<(S, f64)> for DepthTable {
    fn from_iter<I: IntoIterator<Item = (S, f64)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(b, m)| (b.into(), m)).collect())
    }
}

/// Built-in LSST-like `m5` and `gamma` per band
#[derive(Debug, Clone, PartialEq)]
pub struct DefaultDepths {
    m5: BTreeMap<&'static str, f64>,
    gamma: BTreeMap<&'static str, f64>,
}

/// Process-wide default depth table
pub static DEFAULT_DEPTHS: Lazy<DefaultDepths> = Lazy::new(DefaultDepths::lsst);

impl DefaultDepths {
    fn lsst() -> Self {
        let bands = ["u", "g", "r", "i", "z", "y"];
        let m5 = [23.68, 24.89, 24.43, 24.00, 24.45, 22.60];
        let gamma = [0.037, 0.038, 0.039, 0.039, 0.040, 0.040];
        Self {
            m5: bands.into_iter().zip(m5).collect(),
            gamma: bands.into_iter().zip(gamma).collect(),
        }
    }

    pub fn m5(&self, band: &str) -> Option<f64> {
        self.m5.get(band).copied()
    }

    pub fn gamma(&self, band: &str) -> Option<f64> {
        self.gamma.get(band).copied()
    }
}

/// ADU counts of a flat-in-frequency source of magnitude `mag` through `bandpass`
pub fn calc_adu(bandpass: &Bandpass, mag: f64, params: &PhotometricParameters) -> Result<f64> {
    let step = bandpass.grid().uniform_step().ok_or_else(|| {
        PhotometryError::InvalidGrid("photon counts require a uniformly sampled bandpass".into())
    })?;
    let fnu = ab_mag_to_jansky(mag);
    let photons_per_nm: f64 = bandpass
        .grid()
        .iter()
        .zip(bandpass.throughput())
        .map(|(w, t)| fnu / w * t)
        .sum();
    Ok(photons_per_nm * step * params.total_exposure() * params.effarea
        / params.gain
        / (Phys::ERGS_TO_JANSKY * Phys::PLANCK_CONSTANT))
}

/// `γ` of the error model for `bandpass` observed to depth `m5`
pub fn calc_gamma(bandpass: &Bandpass, m5: f64, params: &PhotometricParameters) -> Result<f64> {
    let counts = calc_adu(bandpass, m5, params)?;
    Ok(0.04 - 1.0 / (counts * params.gain))
}

/// Magnitude uncertainty for `mag` given `m5`, `gamma` and a systematic floor
///
/// NaN magnitudes give NaN, as does a `γ` outside `[0, 0.04]` wherever the
/// random variance comes out negative.
pub fn mag_error_from_m5(mag: f64, m5: f64, gamma: f64, sigma_sys: f64) -> f64 {
    if mag.is_nan() {
        return f64::NAN;
    }
    let x = 10f64.powf(0.4 * (mag - m5));
    let sigma_rand = ((0.04 - gamma) * x + gamma * x * x).sqrt();
    let sigma_phot = 2.5 * (1.0 + sigma_rand).log10();
    (sigma_phot * sigma_phot + sigma_sys * sigma_sys).sqrt()
}

#[derive(Debug, Clone)]
struct UncertaintyCache {
    key: u64,
    m5: Vec<f64>,
    gamma: Vec<f64>,
}

/// Turns magnitude matrices into uncertainty matrices
///
/// Holds a cache of per-band `(m5, γ)`; one model per concurrent caller.
#[derive(Debug, Clone, Default)]
pub struct UncertaintyModel {
    params: PhotometricParameters,
    cache: Option<UncertaintyCache>,
    recomputations: usize,
}

impl UncertaintyModel {
    pub fn new(params: PhotometricParameters) -> Self {
        Self {
            params,
            cache: None,
            recomputations: 0,
        }
    }

    pub fn params(&self) -> &PhotometricParameters {
        &self.params
    }

    /// Number of times the per-band parameters have been derived
    pub fn recomputations(&self) -> usize {
        self.recomputations
    }

    /// Per-band `m5` currently cached, in catalog order
    pub fn cached_m5(&self) -> Option<&[f64]> {
        self.cache.as_ref().map(|c| c.m5.as_slice())
    }

    /// Per-band `γ` currently cached, in catalog order
    pub fn cached_gamma(&self) -> Option<&[f64]> {
        self.cache.as_ref().map(|c| c.gamma.as_slice())
    }

    /// Uncertainty for every entry of `magnitudes`
    ///
    /// `magnitudes` must have one row per band of `catalog`, in catalog order.
    /// Each band's `m5` comes from `depths` when present there (with `γ`
    /// computed from the bandpass), otherwise from [`DEFAULT_DEPTHS`] (with
    /// the default `γ`).
    ///
    /// # Errors
    /// `ShapeMismatch` on a row count mismatch, `Configuration` when a band has
    /// no `m5` in either table or its `m5` is so deep that `γ` goes negative.
    pub fn estimate(
        &mut self,
        magnitudes: &Array2<f64>,
        catalog: &BandpassCatalog,
        depths: Option<&DepthTable>,
    ) -> Result<Array2<f64>> {
        if magnitudes.nrows() != catalog.len() {
            return Err(PhotometryError::ShapeMismatch(format!(
                "{} magnitude rows for {} bands",
                magnitudes.nrows(),
                catalog.len()
            )));
        }

        let key = self.cache_key(catalog.key(), depths);
        let cache = match self.cache.take() {
            Some(cache) if cache.key == key => {
                debug!("Reusing cached m5/gamma for {} bands", catalog.len());
                cache
            }
            _ => self.derive_band_parameters(key, catalog, depths)?,
        };

        let sigma_sys = self.params.sigma_sys;
        let mut errors = magnitudes.clone();
        for (mut row, (&m5, &gamma)) in errors
            .rows_mut()
            .into_iter()
            .zip(cache.m5.iter().zip(&cache.gamma))
        {
            row.mapv_inplace(|mag| mag_error_from_m5(mag, m5, gamma, sigma_sys));
        }
        self.cache = Some(cache);
        Ok(errors)
    }

    fn cache_key(&self, catalog: CatalogKey, depths: Option<&DepthTable>) -> u64 {
        let mut hasher = DefaultHasher::new();
        catalog.hash(&mut hasher);
        match depths {
            Some(table) => {
                true.hash(&mut hasher);
                table.fingerprint(&mut hasher);
            }
            None => false.hash(&mut hasher),
        }
        self.params.fingerprint(&mut hasher);
        hasher.finish()
    }

    fn derive_band_parameters(
        &mut self,
        key: u64,
        catalog: &BandpassCatalog,
        depths: Option<&DepthTable>,
    ) -> Result<UncertaintyCache> {
        debug!("Deriving m5/gamma for {} bands", catalog.len());
        let mut m5 = Vec::with_capacity(catalog.len());
        let mut gamma = Vec::with_capacity(catalog.len());

        for (label, bandpass) in catalog.iter() {
            let (band_m5, band_gamma) = match depths.and_then(|t| t.get(label)) {
                Some(depth) => (depth, calc_gamma(bandpass, depth, &self.params)?),
                None => match (DEFAULT_DEPTHS.m5(label), DEFAULT_DEPTHS.gamma(label)) {
                    (Some(depth), Some(g)) => (depth, g),
                    _ => {
                        return Err(PhotometryError::Configuration(format!(
                            "no m5 available for band '{label}'"
                        )))
                    }
                },
            };
            if band_gamma < 0.0 {
                return Err(PhotometryError::Configuration(format!(
                    "band '{label}' has negative gamma {band_gamma:.4} at m5 {band_m5:.2}"
                )));
            }
            m5.push(band_m5);
            gamma.push(band_gamma);
        }

        self.recomputations += 1;
        Ok(UncertaintyCache { key, m5, gamma })
    }
}
