//! Batch magnitude integration against a bandpass catalog
//!
//! Magnitudes for a batch are laid out as an `(n_bands, n_objects)` matrix:
//! rows follow the catalog's band order and columns follow input order.
//!
//! For each object the SED is brought onto the catalog grid, converted to
//! `flux_nu`, and reduced against every band at once with a single
//! matrix-vector product with the catalog's phi array:
//!
//! ```text
//! m_band = -2.5 log10( Σ phi_band(λ) · fnu(λ) · Δλ ) - zp
//! ```

use log::warn;
use ndarray::{Array1, Array2, ArrayView1, Axis};

use super::catalog::{BandpassCatalog, PhiArray};
use super::constants::ab_zero_point;
use super::error::{PhotometryError, Result};
use super::sed::Sed;

/// Integrates SEDs through every band of a catalog
#[derive(Debug, Clone, Copy, Default)]
pub struct MagnitudeEngine;

impl MagnitudeEngine {
    pub fn new() -> Self {
        Self
    }

    /// Magnitudes of every SED in every band of `catalog`
    ///
    /// The empty SED yields a column of NaN.
    ///
    /// # Errors
    /// `ShapeMismatch` if an SED does not overlap the catalog grid at all.
    pub fn compute_many(&self, seds: &[Sed], catalog: &BandpassCatalog) -> Result<Array2<f64>> {
        let phi = catalog.phi()?;
        let mut mags = Array2::from_elem((catalog.len(), seds.len()), f64::NAN);

        let mut empty = 0;
        for (sed, mut column) in seds.iter().zip(mags.axis_iter_mut(Axis(1))) {
            if sed.is_empty() {
                empty += 1;
                continue;
            }
            column.assign(&self.integrate(sed, catalog, phi)?);
        }

        if empty > 0 {
            warn!(
                "{empty} of {} objects have no SED; their magnitudes are NaN",
                seds.len()
            );
        }
        Ok(mags)
    }

    /// Magnitudes of one SED in every band of `catalog`, in catalog order
    pub fn compute_one(&self, sed: &Sed, catalog: &BandpassCatalog) -> Result<Array1<f64>> {
        if sed.is_empty() {
            return Ok(Array1::from_elem(catalog.len(), f64::NAN));
        }
        self.integrate(sed, catalog, catalog.phi()?)
    }

    fn integrate(&self, sed: &Sed, catalog: &BandpassCatalog, phi: &PhiArray) -> Result<Array1<f64>> {
        let grid = catalog.grid();
        if let Some(own) = sed.grid() {
            if own.first() > grid.first() || own.last() < grid.last() {
                warn!(
                    "SED '{}' covers {:.1}-{:.1} nm, catalog grid spans {:.1}-{:.1} nm; \
                     flux outside the SED is taken as zero",
                    sed.name(),
                    own.first(),
                    own.last(),
                    grid.first(),
                    grid.last()
                );
            }
        }

        let mut aligned = sed.resampled(grid)?;
        let fnu = ArrayView1::from(aligned.fnu());
        let zp = ab_zero_point();
        let flux = phi.phi.dot(&fnu) * phi.step_nm;
        Ok(flux.mapv(|f| -2.5 * f.log10() - zp))
    }
}

/// Combine per-component magnitude matrices into total magnitudes
///
/// `m_tot = -2.5 log10(Σ 10^(-0.4 m_c))` elementwise. NaN components are
/// skipped; an entry that is NaN in every component stays NaN.
///
/// # Errors
/// `ShapeMismatch` if the matrices differ in shape, `Configuration` if
/// `components` is empty.
pub fn sum_component_magnitudes(components: &[Array2<f64>]) -> Result<Array2<f64>> {
    let (first, rest) = components.split_first().ok_or_else(|| {
        PhotometryError::Configuration("no component magnitudes to combine".into())
    })?;
    if let Some(bad) = rest.iter().find(|m| m.dim() != first.dim()) {
        return Err(PhotometryError::ShapeMismatch(format!(
            "component magnitudes have shapes {:?} and {:?}",
            first.dim(),
            bad.dim()
        )));
    }

    let mut flux = Array2::<f64>::zeros(first.dim());
    let mut seen = Array2::from_elem(first.dim(), false);
    for mags in components {
        ndarray::Zip::from(&mut flux)
            .and(&mut seen)
            .and(mags)
            .for_each(|f, s, &m| {
                if !m.is_nan() {
                    *f += 10f64.powf(-0.4 * m);
                    *s = true;
                }
            });
    }

    Ok(ndarray::Zip::from(&flux)
        .and(&seen)
        .map_collect(|&f, &s| if s { -2.5 * f.log10() } else { f64::NAN }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::photometry::bandpass::Bandpass;
    use crate::photometry::error::ErrorKind;
    use crate::photometry::grid::WavelengthGrid;
    use approx::assert_relative_eq;
    use ndarray::array;

    fn catalog() -> BandpassCatalog {
        let grid = WavelengthGrid::from_range(300.0, 1100.0, 1.0).unwrap();
        BandpassCatalog::new(vec![
            ("g".to_string(), Bandpass::top_hat(grid.clone(), 400.0, 550.0).unwrap()),
            ("r".to_string(), Bandpass::top_hat(grid.clone(), 550.0, 700.0).unwrap()),
            ("i".to_string(), Bandpass::top_hat(grid, 700.0, 850.0).unwrap()),
        ])
        .unwrap()
    }

    #[test]
    fn test_flat_spectrum_has_same_magnitude_in_every_band() {
        let catalog = catalog();
        let sed_grid = WavelengthGrid::from_range(250.0, 1200.0, 0.5).unwrap();
        let seds = vec![Sed::flat_ab(sed_grid.clone(), 20.0), Sed::flat_ab(sed_grid, 18.0)];

        let mags = MagnitudeEngine::new().compute_many(&seds, &catalog).unwrap();
        assert_eq!(mags.dim(), (3, 2));
        for band in 0..3 {
            assert_relative_eq!(mags[[band, 0]], 20.0, epsilon = 1e-6);
            assert_relative_eq!(mags[[band, 1]], 18.0, epsilon = 1e-6);
        }
        assert!(catalog.phi_is_cached());
    }

    #[test]
    fn test_empty_sed_column_is_nan() {
        let catalog = catalog();
        let seds = vec![
            Sed::empty(),
            Sed::flat_ab(catalog.grid().clone(), 20.0),
        ];
        let mags = MagnitudeEngine::new().compute_many(&seds, &catalog).unwrap();
        assert!(mags.column(0).iter().all(|m| m.is_nan()));
        assert!(mags.column(1).iter().all(|m| m.is_finite()));
    }

    #[test]
    fn test_compute_one_matches_single_band_integration() {
        let catalog = catalog();
        let grid = catalog.grid().clone();
        let flambda = grid.iter().map(|w| 1.0e-17 * (w / 500.0).powi(2)).collect();
        let sed = Sed::new("red", grid, flambda).unwrap();

        let mags = MagnitudeEngine::new().compute_one(&sed, &catalog).unwrap();
        for (idx, (_, bandpass)) in catalog.iter().enumerate() {
            assert_relative_eq!(mags[idx], sed.calc_mag(bandpass).unwrap(), epsilon = 1e-9);
        }
        assert!(mags[0] > mags[2]);
    }

    #[test]
    fn test_disjoint_sed_is_shape_mismatch() {
        let catalog = catalog();
        let far_ir = WavelengthGrid::from_range(2000.0, 3000.0, 1.0).unwrap();
        let err = MagnitudeEngine::new()
            .compute_many(&[Sed::flat_ab(far_ir, 20.0)], &catalog)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ShapeMismatch);
    }

    #[test]
    fn test_sum_component_magnitudes() {
        let bulge = array![[20.0, f64::NAN, f64::NAN]];
        let disk = array![[20.0, 19.0, f64::NAN]];
        let total = sum_component_magnitudes(&[bulge, disk]).unwrap();

        assert_relative_eq!(total[[0, 0]], 20.0 - 2.5 * 2f64.log10(), epsilon = 1e-12);
        assert_relative_eq!(total[[0, 1]], 19.0, epsilon = 1e-12);
        assert!(total[[0, 2]].is_nan());
    }

    #[test]
    fn test_sum_component_shape_mismatch() {
        let err = sum_component_magnitudes(&[Array2::zeros((2, 3)), Array2::zeros((3, 3))])
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ShapeMismatch);
    }
}
