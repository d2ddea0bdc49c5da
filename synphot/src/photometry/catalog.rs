//! Ordered collections of bandpasses sharing one wavelength grid
//!
//! A [`BandpassCatalog`] is built once per instrument configuration and is
//! read-only afterwards. Insertion order defines the row order of every
//! magnitude matrix computed against it. The phi array used for magnitude
//! integration is derived lazily on first use and kept for the lifetime of the
//! catalog; because it lives in a `OnceCell`, a catalog can be shared between
//! threads by reference.

use std::collections::hash_map::DefaultHasher;
use std::collections::HashSet;
use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};

use log::{debug, info};
use ndarray::Array2;
use once_cell::sync::OnceCell;

use super::bandpass::Bandpass;
use super::error::{PhotometryError, Result};
use super::grid::WavelengthGrid;

/// Hardware components shared by every LSST filter, in the order they are multiplied
pub const LSST_HARDWARE_COMPONENTS: [&str; 7] = [
    "detector.dat",
    "m1.dat",
    "m2.dat",
    "m3.dat",
    "lens1.dat",
    "lens2.dat",
    "lens3.dat",
];

/// Default atmosphere transmission file name
pub const LSST_ATMOSPHERE: &str = "atmos.dat";

/// The six LSST band labels
pub const LSST_BANDS: [&str; 6] = ["u", "g", "r", "i", "z", "y"];

/// Content identity of a catalog: labels, grid and every throughput sample
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CatalogKey(u64);

impl CatalogKey {
    pub fn value(&self) -> u64 {
        self.0
    }
}

/// Per-band normalized response functions on the catalog grid
#[derive(Debug, Clone)]
pub struct PhiArray {
    /// One row per band, one column per wavelength sample
    pub phi: Array2<f64>,
    /// Wavelength step of the catalog grid in nm
    pub step_nm: f64,
}

/// Ordered mapping from band label to [`Bandpass`]
#[derive(Debug, Clone)]
pub struct BandpassCatalog {
    labels: Vec<String>,
    bandpasses: Vec<Bandpass>,
    grid: WavelengthGrid,
    key: CatalogKey,
    phi: OnceCell<PhiArray>,
}

impl BandpassCatalog {
    /// Build a catalog from `(label, bandpass)` pairs
    ///
    /// Every bandpass is resampled onto the grid of the first one, which must
    /// be uniformly sampled.
    ///
    /// # Errors
    /// `Configuration` for an empty list or a repeated label, `InvalidGrid` if
    /// the shared grid is not uniform, `ShapeMismatch` if a bandpass cannot be
    /// resampled onto the shared grid.
    pub fn new(entries: Vec<(String, Bandpass)>) -> Result<Self> {
        let grid = entries
            .first()
            .map(|(_, bp)| bp.grid().clone())
            .ok_or_else(|| PhotometryError::Configuration("catalog needs at least one band".into()))?;

        if grid.uniform_step().is_none() {
            return Err(PhotometryError::InvalidGrid(
                "catalog bandpasses must share a uniformly sampled grid".into(),
            ));
        }

        let mut seen = HashSet::new();
        let mut labels = Vec::with_capacity(entries.len());
        let mut bandpasses = Vec::with_capacity(entries.len());
        for (label, bandpass) in entries {
            if !seen.insert(label.clone()) {
                return Err(PhotometryError::Configuration(format!(
                    "band '{label}' appears twice"
                )));
            }
            bandpasses.push(bandpass.resample(&grid)?);
            labels.push(label);
        }

        let key = Self::content_key(&labels, &grid, &bandpasses);
        Ok(Self {
            labels,
            bandpasses,
            grid,
            key,
            phi: OnceCell::new(),
        })
    }

    fn content_key(labels: &[String], grid: &WavelengthGrid, bandpasses: &[Bandpass]) -> CatalogKey {
        let mut hasher = DefaultHasher::new();
        labels.hash(&mut hasher);
        grid.key().hash(&mut hasher);
        for bandpass in bandpasses {
            for t in bandpass.throughput() {
                t.to_bits().hash(&mut hasher);
            }
        }
        CatalogKey(hasher.finish())
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    pub fn grid(&self) -> &WavelengthGrid {
        &self.grid
    }

    pub fn key(&self) -> CatalogKey {
        self.key
    }

    pub fn get(&self, label: &str) -> Option<&Bandpass> {
        self.labels
            .iter()
            .position(|l| l == label)
            .map(|idx| &self.bandpasses[idx])
    }

    /// Iterate `(label, bandpass)` in catalog order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Bandpass)> {
        self.labels
            .iter()
            .map(String::as_str)
            .zip(self.bandpasses.iter())
    }

    /// The phi array for this catalog, computed on first call
    pub fn phi(&self) -> Result<&PhiArray> {
        self.phi.get_or_try_init(|| {
            debug!("Computing phi array for {} bands", self.len());
            // Uniformity was checked at construction
            let step_nm = self.grid.uniform_step().unwrap_or(0.0);
            let mut phi = Array2::zeros((self.len(), self.grid.len()));
            for (mut row, bandpass) in phi.rows_mut().into_iter().zip(self.bandpasses.iter()) {
                let band_phi = bandpass.phi()?;
                row.iter_mut().zip(band_phi).for_each(|(dst, src)| *dst = src);
            }
            Ok(PhiArray { phi, step_nm })
        })
    }

    /// True once the phi array has been computed
    pub fn phi_is_cached(&self) -> bool {
        self.phi.get().is_some()
    }
}

/// Build total and hardware-only catalogs from per-component throughput files
///
/// For each label the filter file `{dir}/{root}{label}.dat` is multiplied with
/// the shared `components` (also in `dir`) to give the hardware bandpass; the
/// total bandpass additionally includes `atmosphere`. Without an atmosphere
/// file both catalogs hold the hardware bandpasses. All curves are resampled
/// onto `grid`.
///
/// Returns `(total, hardware)`.
pub fn load_bandpasses_from_files(
    band_labels: &[&str],
    dir: &Path,
    root: &str,
    components: &[&str],
    atmosphere: Option<&str>,
    grid: &WavelengthGrid,
) -> Result<(BandpassCatalog, BandpassCatalog)> {
    let common: Vec<PathBuf> = components.iter().map(|c| dir.join(c)).collect();
    let atmosphere = atmosphere
        .map(|name| Bandpass::from_file(&dir.join(name), Some(grid)))
        .transpose()?;

    let mut total = Vec::with_capacity(band_labels.len());
    let mut hardware = Vec::with_capacity(band_labels.len());

    for label in band_labels {
        let mut files = common.clone();
        files.push(filter_path(dir, root, label));

        let hardware_bp = Bandpass::load_composite(&files, None, Some(grid))?;
        let total_bp = match &atmosphere {
            Some(atmos) => hardware_bp.multiply(atmos)?,
            None => hardware_bp.clone(),
        };

        hardware.push((label.to_string(), hardware_bp));
        total.push((label.to_string(), total_bp));
    }

    info!(
        "Loaded {} bands from {} ({} shared components, atmosphere: {})",
        band_labels.len(),
        dir.display(),
        components.len(),
        atmosphere.is_some()
    );

    Ok((BandpassCatalog::new(total)?, BandpassCatalog::new(hardware)?))
}

/// Load a catalog of pre-combined total throughputs, one `{dir}/{root}{label}.dat` per band
pub fn load_total_bandpasses_from_files(
    band_labels: &[&str],
    dir: &Path,
    root: &str,
    grid: &WavelengthGrid,
) -> Result<BandpassCatalog> {
    let entries = band_labels
        .iter()
        .map(|label| {
            Bandpass::from_file(&filter_path(dir, root, label), Some(grid))
                .map(|bp| (label.to_string(), bp))
        })
        .collect::<Result<Vec<_>>>()?;

    info!("Loaded {} total bandpasses from {}", entries.len(), dir.display());
    BandpassCatalog::new(entries)
}

fn filter_path(dir: &Path, root: &str, label: &str) -> PathBuf {
    dir.join(format!("{root}{label}.dat"))
}
