//! Cosmological redshift of SED batches

use log::debug;

use super::error::{PhotometryError, Result};
use super::sed::Sed;

/// Stretches SED wavelength grids by `1 + z`
#[derive(Debug, Clone, Copy)]
pub struct RedshiftEngine {
    /// Divide flux density by `1 + z` (cosmological dimming)
    pub dimming: bool,
}

impl Default for RedshiftEngine {
    fn default() -> Self {
        Self { dimming: true }
    }
}

impl RedshiftEngine {
    pub fn new(dimming: bool) -> Self {
        Self { dimming }
    }

    /// Redshift `seds[i]` to `redshifts[i]` in place
    ///
    /// No-op when `redshifts` is `None`. Empty SEDs are skipped. Each shifted
    /// SED has `_Z{z}` appended to its name.
    ///
    /// # Errors
    /// `ShapeMismatch` if the slices differ in length, `Configuration` for
    /// `z <= -1`.
    pub fn apply(&self, seds: &mut [Sed], redshifts: Option<&[f64]>) -> Result<()> {
        let Some(redshifts) = redshifts else {
            return Ok(());
        };
        if redshifts.len() != seds.len() {
            return Err(PhotometryError::ShapeMismatch(format!(
                "{} redshifts for {} SEDs",
                redshifts.len(),
                seds.len()
            )));
        }

        let mut shifted = 0;
        for (sed, &z) in seds.iter_mut().zip(redshifts) {
            if sed.is_empty() {
                continue;
            }
            sed.redshift(z, self.dimming)?;
            let tagged = format!("{}_Z{z:.2}", sed.name());
            sed.set_name(tagged);
            shifted += 1;
        }
        debug!("Redshifted {shifted} SEDs (dimming: {})", self.dimming);
        Ok(())
    }
}
