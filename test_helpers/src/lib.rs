//! Testing infrastructure for the synphot workspace.
//!
//! Throughput directories and SED libraries are written into temporary
//! directories in the same two-column text format the real survey files use,
//! so integration tests exercise the file loaders.
//!
//! # Usage Examples
//!
//! ```rust
//! use test_helpers::{ThroughputFixture, SedLibraryFixture};
//!
//! let throughputs = ThroughputFixture::lsst_like(&["u", "g", "r"]).unwrap();
//! assert!(throughputs.path().join("filter_g.dat").exists());
//!
//! let seds = SedLibraryFixture::new().unwrap();
//! let flat = seds.write_flat("flat.dat", 20.0).unwrap();
//! assert!(flat.exists());
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Error types for test infrastructure operations.
#[derive(thiserror::Error, Debug)]
pub enum TestHelperError {
    /// A fixture file or directory could not be written.
    #[error("Failed to write fixture: {0}")]
    Io(#[from] std::io::Error),

    /// A fixture was requested for a band without known edges.
    #[error("No fixture edges for band '{0}'")]
    UnknownBand(String),
}

/// Approximate LSST filter edges in nm used by the fixture filters.
pub const BAND_EDGES_NM: [(&str, f64, f64); 6] = [
    ("u", 320.0, 400.0),
    ("g", 400.0, 552.0),
    ("r", 552.0, 691.0),
    ("i", 691.0, 818.0),
    ("z", 818.0, 922.0),
    ("y", 922.0, 1060.0),
];

/// Hardware components written by [`ThroughputFixture`] with their flat throughput.
pub const FIXTURE_COMPONENTS: [(&str, f64); 7] = [
    ("detector.dat", 0.9),
    ("m1.dat", 0.95),
    ("m2.dat", 0.95),
    ("m3.dat", 0.95),
    ("lens1.dat", 0.98),
    ("lens2.dat", 0.98),
    ("lens3.dat", 0.98),
];

/// Flat throughput of the fixture `atmos.dat`.
pub const FIXTURE_ATMOSPHERE: f64 = 0.8;

/// Edges of `band` from [`BAND_EDGES_NM`].
pub fn band_edges(band: &str) -> Option<(f64, f64)> {
    BAND_EDGES_NM
        .iter()
        .find(|(label, _, _)| *label == band)
        .map(|&(_, lo, hi)| (lo, hi))
}

/// Write `# wavelength value` rows to `path`.
pub fn write_two_column(path: &Path, rows: impl IntoIterator<Item = (f64, f64)>) -> Result<(), TestHelperError> {
    let body: String = std::iter::once("# wavelength(nm) value\n".to_string())
        .chain(rows.into_iter().map(|(w, v)| format!("{w} {v:e}\n")))
        .collect();
    fs::write(path, body)?;
    Ok(())
}

fn samples(min_nm: f64, max_nm: f64, step_nm: f64) -> impl Iterator<Item = f64> {
    let count = ((max_nm - min_nm) / step_nm).round() as usize + 1;
    (0..count).map(move |i| min_nm + i as f64 * step_nm)
}

/// A temporary throughput directory laid out like the LSST throughput set.
///
/// Contains the seven hardware components and `atmos.dat` (all flat), a
/// top-hat `filter_{band}.dat` per band, and pre-combined `total_{band}.dat`
/// files equal to the product of everything.
pub struct ThroughputFixture {
    dir: TempDir,
}

impl ThroughputFixture {
    pub fn lsst_like(bands: &[&str]) -> Result<Self, TestHelperError> {
        let dir = tempfile::tempdir()?;
        let flat = |value: f64| samples(300.0, 1150.0, 1.0).map(move |w| (w, value));

        for (name, value) in FIXTURE_COMPONENTS {
            write_two_column(&dir.path().join(name), flat(value))?;
        }
        write_two_column(&dir.path().join("atmos.dat"), flat(FIXTURE_ATMOSPHERE))?;

        let system = Self::system_throughput();
        for band in bands {
            let (lo, hi) =
                band_edges(band).ok_or_else(|| TestHelperError::UnknownBand(band.to_string()))?;
            let top_hat = |scale: f64| {
                samples(300.0, 1150.0, 0.5)
                    .map(move |w| (w, if (lo..=hi).contains(&w) { scale } else { 0.0 }))
            };
            write_two_column(&dir.path().join(format!("filter_{band}.dat")), top_hat(1.0))?;
            write_two_column(&dir.path().join(format!("total_{band}.dat")), top_hat(system))?;
        }

        Ok(Self { dir })
    }

    /// Product of all hardware components and the atmosphere.
    pub fn system_throughput() -> f64 {
        FIXTURE_COMPONENTS.iter().map(|(_, t)| t).product::<f64>() * FIXTURE_ATMOSPHERE
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn component_names() -> Vec<&'static str> {
        FIXTURE_COMPONENTS.iter().map(|(name, _)| *name).collect()
    }
}

/// A temporary SED library directory.
pub struct SedLibraryFixture {
    dir: TempDir,
}

impl SedLibraryFixture {
    pub fn new() -> Result<Self, TestHelperError> {
        Ok(Self {
            dir: tempfile::tempdir()?,
        })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Write a flat-in-frequency SED of AB magnitude `ab_mag`, 200-1200 nm at 0.1 nm.
    pub fn write_flat(&self, name: &str, ab_mag: f64) -> Result<PathBuf, TestHelperError> {
        let fnu_cgs = 3631.0 * 10f64.powf(-0.4 * ab_mag) / 1.0e23;
        self.write_with(name, 200.0, 1200.0, 0.1, |w| {
            fnu_cgs * 299_792_458.0 / (w * w * 1.0e-9)
        })
    }

    /// Write an SED with `flux_lambda = f(wavelength)` on a uniform grid.
    pub fn write_with(
        &self,
        name: &str,
        min_nm: f64,
        max_nm: f64,
        step_nm: f64,
        flambda: impl Fn(f64) -> f64,
    ) -> Result<PathBuf, TestHelperError> {
        let path = self.dir.path().join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        write_two_column(&path, samples(min_nm, max_nm, step_nm).map(|w| (w, flambda(w))))?;
        Ok(path)
    }
}
