//! Throughput curves for instrument and atmosphere components
//!
//! A [`Bandpass`] is a fractional throughput tabulated on a [`WavelengthGrid`].
//! Complete system bandpasses are built by multiplying component curves
//! (detector, mirrors, lenses, filter and optionally the atmosphere) after
//! resampling them all onto one grid.

use std::path::{Path, PathBuf};

use log::debug;

use super::error::{PhotometryError, Result};
use super::grid::WavelengthGrid;
use super::table::read_two_column;
use crate::algo::misc::resample_zero_fill;

/// Center of the reference bandpass used for magnitude normalization, in nm
pub const NORMALIZATION_WAVELENGTH_NM: f64 = 500.0;

/// Fractional throughput as a function of wavelength
#[derive(Debug, Clone, PartialEq)]
pub struct Bandpass {
    grid: WavelengthGrid,
    throughput: Vec<f64>,
}

impl Bandpass {
    /// Create a bandpass from a grid and matching throughput samples
    ///
    /// # Errors
    /// Returns `InvalidGrid` if the lengths differ or any throughput lies
    /// outside `[0, 1]`.
    pub fn new(grid: WavelengthGrid, throughput: Vec<f64>) -> Result<Self> {
        if grid.len() != throughput.len() {
            return Err(PhotometryError::InvalidGrid(format!(
                "{} wavelengths but {} throughput samples",
                grid.len(),
                throughput.len()
            )));
        }
        if let Some(bad) = throughput.iter().find(|t| !(0.0..=1.0).contains(*t)) {
            return Err(PhotometryError::InvalidGrid(format!(
                "throughput {bad} outside [0, 1]"
            )));
        }
        Ok(Self { grid, throughput })
    }

    /// Unit throughput between `lower_nm` and `upper_nm` (inclusive), zero elsewhere
    pub fn top_hat(grid: WavelengthGrid, lower_nm: f64, upper_nm: f64) -> Result<Self> {
        let throughput = grid
            .iter()
            .map(|&w| if (lower_nm..=upper_nm).contains(&w) { 1.0 } else { 0.0 })
            .collect();
        Self::new(grid, throughput)
    }

    /// The reference bandpass used to apply normalization magnitudes
    ///
    /// Unit throughput in the single default-grid sample closest to 500 nm and
    /// zero everywhere else. For a spectrum that is flat in frequency the
    /// magnitude through this bandpass equals the AB magnitude through any
    /// other bandpass.
    pub fn normalization_reference() -> Self {
        let grid = WavelengthGrid::default_throughput();
        let center = grid.partition_point(|&w| w < NORMALIZATION_WAVELENGTH_NM);
        let center = if center > 0
            && (grid[center - 1] - NORMALIZATION_WAVELENGTH_NM).abs()
                < (grid[center] - NORMALIZATION_WAVELENGTH_NM).abs()
        {
            center - 1
        } else {
            center
        };
        let mut throughput = vec![0.0; grid.len()];
        throughput[center] = 1.0;
        Self { grid, throughput }
    }

    /// Read a single throughput file
    ///
    /// With a `reference` grid the curve is resampled onto it; otherwise the
    /// file's own sampling is kept.
    pub fn from_file(path: &Path, reference: Option<&WavelengthGrid>) -> Result<Self> {
        let table = read_two_column(path)?;
        let native = WavelengthGrid::new(table.wavelengths).map_err(|e| annotate(path, e))?;
        let bandpass = Self::new(native, table.values).map_err(|e| annotate(path, e))?;
        match reference {
            Some(grid) => bandpass.resample(grid),
            None => Ok(bandpass),
        }
    }

    /// Read and multiply a list of component throughput files
    ///
    /// All components are resampled onto `reference` if given, otherwise onto
    /// the grid of the first component. When `atmosphere` is given it is folded
    /// in as one more component, producing a total rather than a hardware-only
    /// bandpass.
    pub fn load_composite(
        components: &[PathBuf],
        atmosphere: Option<&Path>,
        reference: Option<&WavelengthGrid>,
    ) -> Result<Self> {
        let (first, rest) = components.split_first().ok_or_else(|| {
            PhotometryError::Configuration("composite bandpass needs at least one component".into())
        })?;

        let mut composite = Self::from_file(first, reference)?;
        for path in rest.iter().map(PathBuf::as_path).chain(atmosphere) {
            let component = Self::from_file(path, None)?;
            composite = composite.multiply(&component)?;
        }

        debug!(
            "Composed {} throughput components on {} samples",
            components.len() + usize::from(atmosphere.is_some()),
            composite.grid.len()
        );
        Ok(composite)
    }

    pub fn grid(&self) -> &WavelengthGrid {
        &self.grid
    }

    pub fn throughput(&self) -> &[f64] {
        &self.throughput
    }

    /// Resample onto `grid`, zero outside the tabulated range
    pub fn resample(&self, grid: &WavelengthGrid) -> Result<Self> {
        if self.grid == *grid {
            return Ok(Self {
                grid: grid.clone(),
                throughput: self.throughput.clone(),
            });
        }
        let throughput = resample_zero_fill(&self.grid, &self.throughput, grid)?;
        Ok(Self {
            grid: grid.clone(),
            throughput,
        })
    }

    /// Pointwise product with `other`, evaluated on this bandpass's grid
    pub fn multiply(&self, other: &Bandpass) -> Result<Self> {
        let other = other.resample(&self.grid)?;
        let throughput = self
            .throughput
            .iter()
            .zip(other.throughput.iter())
            .map(|(a, b)| a * b)
            .collect();
        Ok(Self {
            grid: self.grid.clone(),
            throughput,
        })
    }

    /// Normalized response function used for magnitude integration
    ///
    /// `phi = T(λ)/λ`, scaled so that `Σ phi · Δλ = 1`. Integrating phi
    /// against a flat 3631 Jy spectrum therefore gives AB magnitude zero.
    ///
    /// # Errors
    /// `InvalidGrid` if the grid is not uniform or the throughput is all zero.
    pub fn phi(&self) -> Result<Vec<f64>> {
        let step = self.grid.uniform_step().ok_or_else(|| {
            PhotometryError::InvalidGrid("phi requires a uniformly sampled grid".into())
        })?;

        let mut phi: Vec<f64> = self
            .throughput
            .iter()
            .zip(self.grid.iter())
            .map(|(t, w)| t / w)
            .collect();

        let norm = phi.iter().sum::<f64>() * step;
        if norm <= 0.0 {
            return Err(PhotometryError::InvalidGrid(
                "bandpass has zero total throughput".into(),
            ));
        }
        phi.iter_mut().for_each(|p| *p /= norm);
        Ok(phi)
    }
}

fn annotate(path: &Path, err: PhotometryError) -> PhotometryError {
    match err {
        PhotometryError::InvalidGrid(msg) => PhotometryError::Parse {
            path: path.to_path_buf(),
            line: 0,
            message: msg,
        },
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::photometry::error::ErrorKind;
    use approx::assert_relative_eq;
    use std::fs;

    fn write_table(dir: &Path, name: &str, rows: &[(f64, f64)]) -> PathBuf {
        let path = dir.join(name);
        let body: String = rows.iter().map(|(w, t)| format!("{w} {t}\n")).collect();
        fs::write(&path, format!("# test table\n{body}")).unwrap();
        path
    }

    #[test]
    fn test_rejects_out_of_range_throughput() {
        let grid = WavelengthGrid::new(vec![400.0, 500.0]).unwrap();
        assert!(Bandpass::new(grid.clone(), vec![0.5, 1.2]).is_err());
        assert!(Bandpass::new(grid, vec![0.5]).is_err());
    }

    #[test]
    fn test_phi_is_normalized() {
        let grid = WavelengthGrid::from_range(400.0, 600.0, 1.0).unwrap();
        let bandpass = Bandpass::top_hat(grid, 450.0, 550.0).unwrap();
        let phi = bandpass.phi().unwrap();
        assert_relative_eq!(phi.iter().sum::<f64>() * 1.0, 1.0, epsilon = 1e-12);
        assert_eq!(phi[0], 0.0);
    }

    #[test]
    fn test_phi_requires_uniform_grid() {
        let grid = WavelengthGrid::new(vec![400.0, 410.0, 450.0]).unwrap();
        let bandpass = Bandpass::new(grid, vec![1.0, 1.0, 1.0]).unwrap();
        assert_eq!(bandpass.phi().unwrap_err().kind(), ErrorKind::InvalidData);
    }

    #[test]
    fn test_normalization_reference_is_delta_at_500() {
        let reference = Bandpass::normalization_reference();
        let nonzero: Vec<f64> = reference
            .grid()
            .iter()
            .zip(reference.throughput())
            .filter(|(_, t)| **t > 0.0)
            .map(|(w, _)| *w)
            .collect();
        assert_eq!(nonzero.len(), 1);
        assert_relative_eq!(nonzero[0], 500.0, epsilon = 1e-6);
    }

    #[test]
    fn test_composite_multiplies_components() {
        let dir = tempfile::tempdir().unwrap();
        let a = write_table(dir.path(), "a.dat", &[(400.0, 0.5), (600.0, 0.5)]);
        let b = write_table(dir.path(), "b.dat", &[(400.0, 0.8), (600.0, 0.4)]);
        let atmos = write_table(dir.path(), "atmos.dat", &[(400.0, 0.5), (600.0, 0.5)]);

        let grid = WavelengthGrid::from_range(400.0, 600.0, 100.0).unwrap();
        let hardware =
            Bandpass::load_composite(&[a.clone(), b.clone()], None, Some(&grid)).unwrap();
        assert_relative_eq!(hardware.throughput()[0], 0.4, epsilon = 1e-12);
        assert_relative_eq!(hardware.throughput()[1], 0.3, epsilon = 1e-12);
        assert_relative_eq!(hardware.throughput()[2], 0.2, epsilon = 1e-12);

        let total = Bandpass::load_composite(&[a, b], Some(&atmos), Some(&grid)).unwrap();
        assert_relative_eq!(total.throughput()[1], 0.15, epsilon = 1e-12);
    }

    #[test]
    fn test_composite_uses_first_component_grid_by_default() {
        let dir = tempfile::tempdir().unwrap();
        let a = write_table(dir.path(), "a.dat", &[(400.0, 1.0), (450.0, 1.0), (500.0, 1.0)]);
        let b = write_table(dir.path(), "b.dat", &[(300.0, 0.5), (700.0, 0.5)]);

        let composite = Bandpass::load_composite(&[a, b], None, None).unwrap();
        assert_eq!(composite.grid().as_slice(), &[400.0, 450.0, 500.0]);
        assert!(composite
            .throughput()
            .iter()
            .all(|&t| (t - 0.5).abs() < 1e-12));
    }

    #[test]
    fn test_missing_component_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("m1.dat");
        let err = Bandpass::load_composite(&[missing], None, None).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Io);
    }
}
