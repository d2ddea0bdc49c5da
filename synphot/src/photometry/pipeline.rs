//! End-to-end photometry for batches of catalog objects
//!
//! Stars and galaxies run through the same pipeline; they differ only in the
//! [`ComponentSet`] describing how many SEDs each object has and which
//! transforms apply to each:
//!
//! | set        | component | extinction | redshift |
//! |------------|-----------|------------|----------|
//! | `stars`    | star      | yes        | no       |
//! | `galaxies` | bulge     | yes        | yes      |
//! |            | disk      | yes        | yes      |
//! |            | agn       | no         | yes      |
//!
//! For every component the pipeline loads normalized SEDs, applies extinction
//! and redshift in place, and integrates them through the total bandpass
//! catalog. Component magnitudes are then summed in flux space.

use std::collections::BTreeMap;

use log::{debug, info};
use ndarray::Array2;
use serde::{Deserialize, Serialize};

use super::catalog::BandpassCatalog;
use super::dust::ExtinctionEngine;
use super::error::{PhotometryError, Result};
use super::magnitudes::{sum_component_magnitudes, MagnitudeEngine};
use super::redshift::RedshiftEngine;
use super::sed::Sed;
use super::sed_loader::SedLoader;
use super::uncertainty::{DepthTable, PhotometricParameters, UncertaintyModel};

/// One SED-bearing part of an object
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentSpec {
    pub name: String,
    /// Apply the object's internal Av to this component
    pub extinction: bool,
    /// Apply the batch redshifts to this component
    pub redshift: bool,
}

impl ComponentSpec {
    pub fn new(name: impl Into<String>, extinction: bool, redshift: bool) -> Self {
        Self {
            name: name.into(),
            extinction,
            redshift,
        }
    }
}

/// Ordered list of components making up each object
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ComponentSet(Vec<ComponentSpec>);

impl Default for ComponentSet {
    fn default() -> Self {
        Self::stars()
    }
}

impl ComponentSet {
    /// # Errors
    /// `Configuration` for an empty list or repeated component names.
    pub fn new(components: Vec<ComponentSpec>) -> Result<Self> {
        if components.is_empty() {
            return Err(PhotometryError::Configuration(
                "component set needs at least one component".into(),
            ));
        }
        for (idx, spec) in components.iter().enumerate() {
            if components[..idx].iter().any(|c| c.name == spec.name) {
                return Err(PhotometryError::Configuration(format!(
                    "component '{}' appears twice",
                    spec.name
                )));
            }
        }
        Ok(Self(components))
    }

    pub fn stars() -> Self {
        Self(vec![ComponentSpec::new("star", true, false)])
    }

    pub fn galaxies() -> Self {
        Self(vec![
            ComponentSpec::new("bulge", true, true),
            ComponentSpec::new("disk", true, true),
            ComponentSpec::new("agn", false, true),
        ])
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ComponentSpec> {
        self.0.iter()
    }

    pub fn get(&self, name: &str) -> Option<&ComponentSpec> {
        self.0.iter().find(|c| c.name == name)
    }
}

/// Per-component inputs for every object of a batch
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ComponentInput {
    pub sed_names: Vec<String>,
    pub mag_norm: Vec<f64>,
    #[serde(default)]
    pub av: Option<Vec<f64>>,
}

impl ComponentInput {
    pub fn new(sed_names: Vec<String>, mag_norm: Vec<f64>) -> Self {
        Self {
            sed_names,
            mag_norm,
            av: None,
        }
    }

    pub fn with_av(mut self, av: Vec<f64>) -> Self {
        self.av = Some(av);
        self
    }
}

/// A batch of catalog objects handed to the pipeline
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ObjectBatch {
    pub ids: Vec<String>,
    pub components: BTreeMap<String, ComponentInput>,
    #[serde(default)]
    pub redshifts: Option<Vec<f64>>,
}

impl ObjectBatch {
    pub fn new(ids: Vec<String>) -> Self {
        Self {
            ids,
            components: BTreeMap::new(),
            redshifts: None,
        }
    }

    pub fn with_component(mut self, name: impl Into<String>, input: ComponentInput) -> Self {
        self.components.insert(name.into(), input);
        self
    }

    pub fn with_redshifts(mut self, redshifts: Vec<f64>) -> Self {
        self.redshifts = Some(redshifts);
        self
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    fn check_lengths(&self) -> Result<()> {
        let n = self.ids.len();
        let mismatch = |what: String, len: usize| {
            Err(PhotometryError::ShapeMismatch(format!(
                "{what} has {len} entries for {n} objects"
            )))
        };
        for (name, input) in &self.components {
            if input.sed_names.len() != n {
                return mismatch(format!("'{name}' SED names"), input.sed_names.len());
            }
            if input.mag_norm.len() != n {
                return mismatch(format!("'{name}' magNorm"), input.mag_norm.len());
            }
            if let Some(av) = &input.av {
                if av.len() != n {
                    return mismatch(format!("'{name}' Av"), av.len());
                }
            }
        }
        if let Some(z) = &self.redshifts {
            if z.len() != n {
                return mismatch("redshifts".to_string(), z.len());
            }
        }
        Ok(())
    }
}

/// Magnitudes (and optionally uncertainties) for one batch
#[derive(Debug, Clone)]
pub struct PhotometryResult {
    pub ids: Vec<String>,
    pub bands: Vec<String>,
    /// `(component name, n_bands x n_objects magnitudes)` in component order
    pub components: Vec<(String, Array2<f64>)>,
    /// Flux-summed magnitudes over all components
    pub total: Array2<f64>,
    pub uncertainty: Option<Array2<f64>>,
}

impl PhotometryResult {
    pub fn component(&self, name: &str) -> Option<&Array2<f64>> {
        self.components
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, mags)| mags)
    }
}

/// Runs loader, extinction, redshift, magnitude and uncertainty stages
///
/// Owns its extinction and uncertainty caches; share the catalog, not the
/// pipeline, between threads.
#[derive(Debug, Clone)]
pub struct PhotometryPipeline {
    catalog: BandpassCatalog,
    loader: SedLoader,
    components: ComponentSet,
    shared_grid: bool,
    extinction: ExtinctionEngine,
    redshift: RedshiftEngine,
    magnitudes: MagnitudeEngine,
    uncertainty: UncertaintyModel,
}

impl PhotometryPipeline {
    pub fn new(catalog: BandpassCatalog, loader: SedLoader, components: ComponentSet) -> Self {
        Self {
            catalog,
            loader,
            components,
            shared_grid: false,
            extinction: ExtinctionEngine::default(),
            redshift: RedshiftEngine::default(),
            magnitudes: MagnitudeEngine::new(),
            uncertainty: UncertaintyModel::default(),
        }
    }

    pub fn with_shared_grid(mut self, shared_grid: bool) -> Self {
        self.shared_grid = shared_grid;
        self
    }

    pub fn with_dimming(mut self, dimming: bool) -> Self {
        self.redshift = RedshiftEngine::new(dimming);
        self
    }

    pub fn with_rv(mut self, rv: f64) -> Self {
        self.extinction = ExtinctionEngine::new(rv);
        self
    }

    pub fn with_parameters(mut self, params: PhotometricParameters) -> Self {
        self.uncertainty = UncertaintyModel::new(params);
        self
    }

    pub fn catalog(&self) -> &BandpassCatalog {
        &self.catalog
    }

    pub fn components(&self) -> &ComponentSet {
        &self.components
    }

    pub fn extinction(&self) -> &ExtinctionEngine {
        &self.extinction
    }

    pub fn uncertainty_model(&self) -> &UncertaintyModel {
        &self.uncertainty
    }

    /// Loaded and transformed SEDs for one component of `batch`
    pub fn component_seds(&mut self, batch: &ObjectBatch, component: &ComponentSpec) -> Result<Vec<Sed>> {
        let input = batch.components.get(&component.name).ok_or_else(|| {
            PhotometryError::Configuration(format!(
                "batch has no inputs for component '{}'",
                component.name
            ))
        })?;

        let names: Vec<&str> = input.sed_names.iter().map(String::as_str).collect();
        let mut seds = self.loader.load(&names, &input.mag_norm, self.shared_grid)?;

        if component.extinction {
            self.extinction.apply(&mut seds, input.av.as_deref())?;
        } else if input.av.is_some() {
            debug!("Ignoring Av for component '{}'", component.name);
        }
        if component.redshift {
            self.redshift.apply(&mut seds, batch.redshifts.as_deref())?;
        }
        Ok(seds)
    }

    /// Magnitudes for every component of every object in `batch`
    pub fn run(&mut self, batch: &ObjectBatch) -> Result<PhotometryResult> {
        batch.check_lengths()?;
        if let Some(extra) = batch
            .components
            .keys()
            .find(|name| self.components.get(name).is_none())
        {
            return Err(PhotometryError::Configuration(format!(
                "batch has inputs for unknown component '{extra}'"
            )));
        }

        let specs: Vec<ComponentSpec> = self.components.iter().cloned().collect();
        let mut components = Vec::with_capacity(specs.len());
        for spec in &specs {
            let seds = self.component_seds(batch, spec)?;
            let mags = self.magnitudes.compute_many(&seds, &self.catalog)?;
            components.push((spec.name.clone(), mags));
        }

        let per_component: Vec<Array2<f64>> = components.iter().map(|(_, m)| m.clone()).collect();
        let total = sum_component_magnitudes(&per_component)?;

        info!(
            "Computed {} bands x {} objects over {} components",
            self.catalog.len(),
            batch.len(),
            specs.len()
        );
        Ok(PhotometryResult {
            ids: batch.ids.clone(),
            bands: self.catalog.labels().to_vec(),
            components,
            total,
            uncertainty: None,
        })
    }

    /// [`run`](Self::run) plus uncertainties of the total magnitudes
    pub fn run_with_uncertainty(
        &mut self,
        batch: &ObjectBatch,
        depths: Option<&DepthTable>,
    ) -> Result<PhotometryResult> {
        let mut result = self.run(batch)?;
        result.uncertainty = Some(self.uncertainty.estimate(&result.total, &self.catalog, depths)?);
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::photometry::bandpass::Bandpass;
    use crate::photometry::error::ErrorKind;
    use crate::photometry::grid::WavelengthGrid;
    use approx::assert_relative_eq;
    use std::fs;
    use std::path::Path;

    fn catalog() -> BandpassCatalog {
        let grid = WavelengthGrid::from_range(300.0, 1100.0, 1.0).unwrap();
        BandpassCatalog::new(vec![
            ("g".to_string(), Bandpass::top_hat(grid.clone(), 400.0, 550.0).unwrap()),
            ("r".to_string(), Bandpass::top_hat(grid, 550.0, 700.0).unwrap()),
        ])
        .unwrap()
    }

    fn write_flat_sed(dir: &Path, name: &str) {
        let sed = Sed::flat_ab(WavelengthGrid::from_range(200.0, 1200.0, 1.0).unwrap(), 20.0);
        let body: String = sed
            .grid()
            .unwrap()
            .iter()
            .zip(sed.flambda())
            .map(|(w, f)| format!("{w} {f:e}\n"))
            .collect();
        fs::write(dir.join(name), body).unwrap();
    }

    fn names(n: usize, name: &str) -> Vec<String> {
        vec![name.to_string(); n]
    }

    #[test]
    fn test_component_set_validation() {
        assert!(ComponentSet::new(vec![]).is_err());
        let dup = ComponentSet::new(vec![
            ComponentSpec::new("disk", true, true),
            ComponentSpec::new("disk", true, true),
        ]);
        assert_eq!(dup.unwrap_err().kind(), ErrorKind::Configuration);
        assert_eq!(ComponentSet::galaxies().len(), 3);
        assert!(!ComponentSet::galaxies().get("agn").unwrap().extinction);
    }

    #[test]
    fn test_star_batch() {
        let dir = tempfile::tempdir().unwrap();
        write_flat_sed(dir.path(), "flat.dat");

        let batch = ObjectBatch::new(vec!["a".into(), "b".into(), "c".into()]).with_component(
            "star",
            ComponentInput::new(
                vec!["flat.dat".into(), "None".into(), "flat.dat".into()],
                vec![20.0, 20.0, 21.0],
            ),
        );
        let mut pipeline =
            PhotometryPipeline::new(catalog(), SedLoader::from_directory(dir.path()), ComponentSet::stars());
        let result = pipeline.run_with_uncertainty(&batch, None).unwrap();

        assert_eq!(result.bands, vec!["g", "r"]);
        assert_eq!(result.total.dim(), (2, 3));
        assert_relative_eq!(result.total[[0, 0]], 20.0, epsilon = 1e-6);
        assert!(result.total[[1, 1]].is_nan());
        assert_relative_eq!(result.total[[1, 2]], 21.0, epsilon = 1e-6);

        let errors = result.uncertainty.unwrap();
        assert!(errors[[0, 1]].is_nan());
        assert!(errors[[0, 2]] > errors[[0, 0]]);
    }

    #[test]
    fn test_galaxy_components_sum_in_flux() {
        let dir = tempfile::tempdir().unwrap();
        write_flat_sed(dir.path(), "flat.dat");

        let batch = ObjectBatch::new(vec!["gal".into()])
            .with_component("bulge", ComponentInput::new(names(1, "flat.dat"), vec![21.0]))
            .with_component(
                "disk",
                ComponentInput::new(names(1, "flat.dat"), vec![21.0]).with_av(vec![0.0]),
            )
            .with_component("agn", ComponentInput::new(names(1, "None"), vec![0.0]))
            .with_redshifts(vec![0.0]);

        let mut pipeline = PhotometryPipeline::new(
            catalog(),
            SedLoader::from_directory(dir.path()),
            ComponentSet::galaxies(),
        );
        let result = pipeline.run(&batch).unwrap();

        assert!(result.component("agn").unwrap()[[0, 0]].is_nan());
        assert_relative_eq!(result.component("bulge").unwrap()[[0, 0]], 21.0, epsilon = 1e-6);
        assert_relative_eq!(
            result.total[[0, 0]],
            21.0 - 2.5 * 2f64.log10(),
            epsilon = 1e-6
        );
        assert!(result.uncertainty.is_none());
    }

    #[test]
    fn test_batch_validation() {
        let dir = tempfile::tempdir().unwrap();
        let mut pipeline =
            PhotometryPipeline::new(catalog(), SedLoader::from_directory(dir.path()), ComponentSet::stars());

        let short = ObjectBatch::new(vec!["a".into(), "b".into()])
            .with_component("star", ComponentInput::new(names(1, "None"), vec![20.0]));
        assert_eq!(pipeline.run(&short).unwrap_err().kind(), ErrorKind::ShapeMismatch);

        let unknown = ObjectBatch::new(vec!["a".into()])
            .with_component("star", ComponentInput::new(names(1, "None"), vec![20.0]))
            .with_component("halo", ComponentInput::new(names(1, "None"), vec![20.0]));
        assert_eq!(pipeline.run(&unknown).unwrap_err().kind(), ErrorKind::Configuration);

        let missing = ObjectBatch::new(vec!["a".into()]);
        assert_eq!(pipeline.run(&missing).unwrap_err().kind(), ErrorKind::Configuration);
    }
}
