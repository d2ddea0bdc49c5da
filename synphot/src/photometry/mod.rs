//! Synthetic photometry: bandpasses, SEDs, transforms, magnitudes and errors

pub mod bandpass;
pub mod catalog;
pub mod constants;
pub mod dust;
pub mod error;
pub mod grid;
pub mod magnitudes;
pub mod pipeline;
pub mod redshift;
pub mod sed;
pub mod sed_loader;
pub mod table;
pub mod uncertainty;

pub use bandpass::Bandpass;
pub use catalog::{
    load_bandpasses_from_files, load_total_bandpasses_from_files, BandpassCatalog, CatalogKey,
};
pub use dust::{DustCoefficients, ExtinctionEngine};
pub use error::{ErrorKind, PhotometryError, Result};
pub use grid::{GridKey, WavelengthGrid};
pub use magnitudes::{sum_component_magnitudes, MagnitudeEngine};
pub use pipeline::{
    ComponentInput, ComponentSet, ComponentSpec, ObjectBatch, PhotometryPipeline, PhotometryResult,
};
pub use redshift::RedshiftEngine;
pub use sed::Sed;
pub use sed_loader::{SedFileMap, SedLoader};
pub use uncertainty::{DepthTable, PhotometricParameters, UncertaintyModel, DEFAULT_DEPTHS};
