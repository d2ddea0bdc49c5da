//! Deduplicated loading of per-object SEDs from an SED library
//!
//! Survey catalogs reference a few thousand template spectra from millions of
//! rows. [`SedLoader::load`] reads each distinct file once, then hands every
//! object its own normalized deep copy so later per-object transforms
//! (extinction, redshift) never leak between objects.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use log::{debug, info};
use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};

use super::bandpass::Bandpass;
use super::error::{PhotometryError, Result};
use super::sed::{is_no_sed, Sed};

/// Resolves catalog SED names to files in an SED library
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SedFileMap {
    /// Root of the SED library
    pub directory: PathBuf,
    /// Optional overrides from catalog name to a path relative to `directory`
    #[serde(default)]
    pub files: BTreeMap<String, PathBuf>,
}

impl SedFileMap {
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
            files: BTreeMap::new(),
        }
    }

    pub fn with_file(mut self, name: impl Into<String>, relative: impl Into<PathBuf>) -> Self {
        self.files.insert(name.into(), relative.into());
        self
    }

    /// Path for `name`; names without an explicit entry resolve to `<directory>/<name>`
    pub fn resolve(&self, name: &str) -> PathBuf {
        match self.files.get(name) {
            Some(relative) => self.directory.join(relative),
            None => self.directory.join(name),
        }
    }
}

/// Normalized phi of the reference bandpass and its sample spacing
#[derive(Debug, Clone)]
struct ReferencePhi {
    phi: Vec<f64>,
    step_nm: f64,
}

/// Loads one normalized SED per object
#[derive(Debug, Clone)]
pub struct SedLoader {
    files: SedFileMap,
    normalization: Bandpass,
    reference_phi: OnceCell<ReferencePhi>,
}

impl SedLoader {
    pub fn new(files: SedFileMap) -> Self {
        Self {
            files,
            normalization: Bandpass::normalization_reference(),
            reference_phi: OnceCell::new(),
        }
    }

    pub fn from_directory(directory: impl AsRef<Path>) -> Self {
        Self::new(SedFileMap::new(directory.as_ref()))
    }

    pub fn files(&self) -> &SedFileMap {
        &self.files
    }

    fn reference_phi(&self) -> Result<&ReferencePhi> {
        self.reference_phi.get_or_try_init(|| {
            let step_nm = self.normalization.grid().uniform_step().ok_or_else(|| {
                PhotometryError::InvalidGrid("normalization bandpass is not uniformly sampled".into())
            })?;
            Ok(ReferencePhi {
                phi: self.normalization.phi()?,
                step_nm,
            })
        })
    }

    /// Magnitude of `sed` through the normalization bandpass
    fn reference_mag(&self, sed: &Sed) -> Result<f64> {
        let reference = self.reference_phi()?;
        sed.calc_mag_phi(self.normalization.grid(), &reference.phi, reference.step_nm)
    }

    /// Load `sed_names[i]` normalized to `mag_norm[i]` for every object `i`
    ///
    /// Each distinct name is read once. With `shared_grid`, every SED after the
    /// first distinct one is resampled onto the first one's grid before copies
    /// are made, so all returned SEDs share one grid allocation.
    ///
    /// Sentinel names ("None" or empty) produce the empty SED, unnormalized.
    ///
    /// # Errors
    /// `ShapeMismatch` if the input slices differ in length or an SED has no
    /// flux at the normalization wavelength, `Io` if an SED file is missing or
    /// malformed.
    pub fn load(&self, sed_names: &[&str], mag_norm: &[f64], shared_grid: bool) -> Result<Vec<Sed>> {
        if sed_names.len() != mag_norm.len() {
            return Err(PhotometryError::ShapeMismatch(format!(
                "{} SED names but {} normalization magnitudes",
                sed_names.len(),
                mag_norm.len()
            )));
        }

        // Template SED and its magnitude through the normalization bandpass
        let mut library: HashMap<&str, (Sed, f64)> = HashMap::new();
        let mut reference_grid = None;
        for &name in sed_names {
            if is_no_sed(name) || library.contains_key(name) {
                continue;
            }
            let path = self.files.resolve(name);
            debug!("Reading SED '{name}' from {}", path.display());
            let mut sed = Sed::from_file(&path, name)?;
            if shared_grid {
                match &reference_grid {
                    None => reference_grid = sed.grid().cloned(),
                    Some(grid) => sed.resample(grid)?,
                }
            }
            let reference_mag = self.reference_mag(&sed)?;
            library.insert(name, (sed, reference_mag));
        }

        let mut seds = Vec::with_capacity(sed_names.len());
        for (&name, &mag) in sed_names.iter().zip(mag_norm) {
            let Some((template, reference_mag)) = library.get(name) else {
                seds.push(Sed::empty());
                continue;
            };
            let mut sed = template.clone();
            sed.multiply_flux_norm(template.flux_norm_from(*reference_mag, mag)?);
            seds.push(sed);
        }

        info!(
            "Loaded {} SEDs from {} distinct files (shared grid: {shared_grid})",
            seds.len(),
            library.len()
        );
        Ok(seds)
    }
}
