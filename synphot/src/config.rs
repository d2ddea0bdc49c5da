//! JSON configuration for a photometry run
//!
//! A [`PipelineConfig`] names where throughput curves and SEDs live and
//! carries every knob the pipeline exposes. Missing fields fall back to the
//! LSST baseline, so `{}` is a valid configuration file.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::photometry::catalog::{
    load_bandpasses_from_files, load_total_bandpasses_from_files, LSST_ATMOSPHERE, LSST_BANDS,
    LSST_HARDWARE_COMPONENTS,
};
use crate::photometry::dust::DEFAULT_RV;
use crate::photometry::{
    BandpassCatalog, ComponentSet, DepthTable, PhotometricParameters, PhotometryPipeline, Result,
    SedFileMap, SedLoader, WavelengthGrid,
};

/// Everything needed to build catalogs and a [`PhotometryPipeline`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Directory holding the throughput files
    pub throughput_dir: PathBuf,
    /// Band labels in catalog order
    pub bands: Vec<String>,
    /// Prefix of per-band filter files, `{filter_root}{band}.dat`
    pub filter_root: String,
    /// Hardware component files multiplied into every band
    pub components: Vec<String>,
    /// Atmosphere transmission file; `None` gives hardware-only totals
    pub atmosphere: Option<String>,
    /// When set, read pre-combined `{total_root}{band}.dat` files instead of
    /// composing components
    pub total_root: Option<String>,
    /// SED library location and name overrides
    pub sed_files: SedFileMap,
    /// Resample every SED onto the first loaded SED's grid
    pub shared_grid: bool,
    /// Apply `1/(1+z)` dimming when redshifting
    pub dimming: bool,
    /// Ratio of total to selective extinction
    pub rv: f64,
    pub parameters: PhotometricParameters,
    /// Per-band 5-sigma depths; bands absent here use the built-in defaults
    pub depths: Option<DepthTable>,
    /// SED components of each object
    pub object_components: ComponentSet,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            throughput_dir: PathBuf::from("throughputs"),
            bands: LSST_BANDS.iter().map(|b| b.to_string()).collect(),
            filter_root: "filter_".to_string(),
            components: LSST_HARDWARE_COMPONENTS
                .iter()
                .map(|c| c.to_string())
                .collect(),
            atmosphere: Some(LSST_ATMOSPHERE.to_string()),
            total_root: None,
            sed_files: SedFileMap::new("seds"),
            shared_grid: false,
            dimming: true,
            rv: DEFAULT_RV,
            parameters: PhotometricParameters::default(),
            depths: None,
            object_components: ComponentSet::stars(),
        }
    }
}

impl PipelineConfig {
    /// Save to JSON file
    pub fn save_to_file(&self, path: &Path) -> std::result::Result<(), std::io::Error> {
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        std::fs::write(path, json)
    }

    /// Load from JSON file
    pub fn load_from_file(path: &Path) -> std::result::Result<Self, std::io::Error> {
        let json = std::fs::read_to_string(path)?;
        serde_json::from_str(&json)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
    }

    fn band_labels(&self) -> Vec<&str> {
        self.bands.iter().map(String::as_str).collect()
    }

    /// Build `(total, hardware)` catalogs on the default throughput grid
    ///
    /// `hardware` is `None` when pre-combined totals are configured.
    pub fn build_catalogs(&self) -> Result<(BandpassCatalog, Option<BandpassCatalog>)> {
        let grid = WavelengthGrid::default_throughput();
        let bands = self.band_labels();

        if let Some(root) = &self.total_root {
            let total = load_total_bandpasses_from_files(&bands, &self.throughput_dir, root, &grid)?;
            return Ok((total, None));
        }

        let components: Vec<&str> = self.components.iter().map(String::as_str).collect();
        let (total, hardware) = load_bandpasses_from_files(
            &bands,
            &self.throughput_dir,
            &self.filter_root,
            &components,
            self.atmosphere.as_deref(),
            &grid,
        )?;
        Ok((total, Some(hardware)))
    }

    /// Pipeline over `catalog` configured from this file
    pub fn pipeline(&self, catalog: BandpassCatalog) -> PhotometryPipeline {
        PhotometryPipeline::new(
            catalog,
            SedLoader::new(self.sed_files.clone()),
            self.object_components.clone(),
        )
        .with_shared_grid(self.shared_grid)
        .with_dimming(self.dimming)
        .with_rv(self.rv)
        .with_parameters(self.parameters)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_json_is_lsst_baseline() {
        let config: PipelineConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, PipelineConfig::default());
        assert_eq!(config.bands, vec!["u", "g", "r", "i", "z", "y"]);
        assert_eq!(config.components.len(), 7);
        assert_eq!(config.atmosphere.as_deref(), Some("atmos.dat"));
    }

    #[test]
    fn test_save_load_preserves_overrides() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pipeline.json");

        let config = PipelineConfig {
            bands: vec!["g".into(), "r".into()],
            total_root: Some("total_".into()),
            depths: Some(DepthTable::new().with("g", 25.1)),
            object_components: ComponentSet::galaxies(),
            parameters: PhotometricParameters::default().with_exptime(30.0),
            ..Default::default()
        };
        config.save_to_file(&path).unwrap();

        let loaded = PipelineConfig::load_from_file(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_malformed_json_is_invalid_data() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.json");
        std::fs::write(&path, "{ bands: ").unwrap();
        let err = PipelineConfig::load_from_file(&path).unwrap_err();
        assert_eq!(err.kind(), std::io::ErrorKind::InvalidData);
    }
}
