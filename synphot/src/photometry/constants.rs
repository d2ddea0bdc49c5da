//! Physical constants used by magnitude and photon-count calculations

/// Constants in the mixed unit system used by SED and throughput files
///
/// Wavelengths are in nanometers, `flux_lambda` in erg s⁻¹ cm⁻² nm⁻¹ and
/// `flux_nu` in Jansky.
pub struct Phys {}

impl Phys {
    /// AB magnitude system zero-point flux density in Jansky
    pub const AB_ZERO_POINT_JANSKY: f64 = 3631.0;

    /// Conversion from erg s⁻¹ cm⁻² Hz⁻¹ to Jansky
    pub const ERGS_TO_JANSKY: f64 = 1.0e23;

    /// Planck's constant
    /// Units: erg⋅s
    pub const PLANCK_CONSTANT: f64 = 6.626068e-27;

    /// Speed of light in vacuum
    /// Units: m/s
    pub const SPEED_OF_LIGHT: f64 = 299_792_458.0;

    /// Nanometers to meters
    pub const NM_TO_M: f64 = 1.0e-9;
}

/// Magnitude offset such that a flat 3631 Jy source has magnitude zero
///
/// Equal to `-2.5 log10(3631) ≈ -8.9`; subtracted from `-2.5 log10(flux)`.
pub fn ab_zero_point() -> f64 {
    -2.5 * Phys::AB_ZERO_POINT_JANSKY.log10()
}

/// Convert an AB magnitude to a flux density in Jansky
pub fn ab_mag_to_jansky(ab_mag: f64) -> f64 {
    Phys::AB_ZERO_POINT_JANSKY * 10f64.powf(-0.4 * ab_mag)
}
