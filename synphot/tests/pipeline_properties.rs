//! Behaviour of the loader, transforms and uncertainty model on file-backed inputs

use approx::assert_relative_eq;
use ndarray::Array2;
use synphot::config::PipelineConfig;
use synphot::photometry::{
    Bandpass, BandpassCatalog, ComponentInput, ComponentSet, DepthTable, ErrorKind,
    ExtinctionEngine, MagnitudeEngine, ObjectBatch, PhotometryPipeline, RedshiftEngine,
    SedFileMap, SedLoader, UncertaintyModel, WavelengthGrid,
};
use test_helpers::{SedLibraryFixture, ThroughputFixture};

const BANDS: [&str; 6] = ["u", "g", "r", "i", "z", "y"];

struct Setup {
    throughputs: ThroughputFixture,
    library: SedLibraryFixture,
    config: PipelineConfig,
}

fn setup() -> Setup {
    let throughputs = ThroughputFixture::lsst_like(&BANDS).unwrap();
    let library = SedLibraryFixture::new().unwrap();
    library.write_flat("flat.dat", 18.0).unwrap();
    // Red power law: flux_lambda rising with wavelength
    library
        .write_with("red.dat", 150.0, 1300.0, 0.5, |w| 1.0e-17 * (w / 500.0).powi(2))
        .unwrap();

    let config = PipelineConfig {
        throughput_dir: throughputs.path().to_path_buf(),
        components: ThroughputFixture::component_names()
            .iter()
            .map(|c| c.to_string())
            .collect(),
        sed_files: SedFileMap::new(library.path()).with_file("reddish", "red.dat"),
        ..Default::default()
    };
    Setup {
        throughputs,
        library,
        config,
    }
}

fn star_batch(names: &[&str], mag_norm: &[f64]) -> ObjectBatch {
    let ids = (0..names.len()).map(|i| format!("obj{i}")).collect();
    let input = ComponentInput::new(names.iter().map(|n| n.to_string()).collect(), mag_norm.to_vec());
    ObjectBatch::new(ids).with_component("star", input)
}

#[test]
fn test_repeated_sed_copies_are_independent() {
    let setup = setup();
    let loader = SedLoader::new(setup.config.sed_files.clone());

    let mut seds = loader
        .load(&["reddish", "reddish", "reddish"], &[20.0, 21.5, 20.0], false)
        .unwrap();

    let ratio = seds[1].integrated_flux() / seds[0].integrated_flux();
    assert_relative_eq!(ratio, 10f64.powf(-0.4 * 1.5), max_relative = 1e-10);

    let mut engine = ExtinctionEngine::default();
    engine.apply(&mut seds[..1], Some(&[1.0])).unwrap();
    assert!(seds[0].integrated_flux() < seds[2].integrated_flux());
    assert_eq!(seds[2].name(), "reddish");
}

#[test]
fn test_grids_shared_only_when_requested() {
    let setup = setup();
    let loader = SedLoader::new(setup.config.sed_files.clone());

    let separate = loader.load(&["flat.dat", "reddish"], &[20.0, 20.0], false).unwrap();
    assert_ne!(separate[0].grid(), separate[1].grid());

    let shared = loader.load(&["flat.dat", "reddish"], &[20.0, 20.0], true).unwrap();
    let first = shared[0].grid().unwrap();
    assert!(shared[1].grid().unwrap().shares_storage_with(first));
}

#[test]
fn test_zero_extinction_and_zero_redshift_are_identities() {
    let setup = setup();
    let (catalog, _) = setup.config.build_catalogs().unwrap();
    let loader = SedLoader::new(setup.config.sed_files.clone());
    let engine = MagnitudeEngine::new();

    let original = loader.load(&["reddish", "flat.dat"], &[20.0, 19.0], false).unwrap();
    let before = engine.compute_many(&original, &catalog).unwrap();

    let mut transformed = original.clone();
    ExtinctionEngine::default()
        .apply(&mut transformed, Some(&[0.0, 0.0]))
        .unwrap();
    for (a, b) in transformed.iter().zip(&original) {
        assert_eq!(a.flambda(), b.flambda());
    }

    RedshiftEngine::default()
        .apply(&mut transformed, Some(&[0.0, 0.0]))
        .unwrap();
    let after = engine.compute_many(&transformed, &catalog).unwrap();
    for (a, b) in after.iter().zip(before.iter()) {
        assert_relative_eq!(*a, *b, epsilon = 1e-9);
    }
}

#[test]
fn test_dimming_costs_2_5_log_1_plus_z() {
    let setup = setup();
    let (catalog, _) = setup.config.build_catalogs().unwrap();
    let z = 0.5;
    let batch = star_batch(&["flat.dat"], &[20.0]);
    let batch = ObjectBatch {
        redshifts: Some(vec![z]),
        ..batch
    };

    let galaxy_like = ComponentSet::new(vec![synphot::photometry::ComponentSpec::new(
        "star", false, true,
    )])
    .unwrap();
    let run = |dimming: bool| {
        PhotometryPipeline::new(
            catalog.clone(),
            SedLoader::new(setup.config.sed_files.clone()),
            galaxy_like.clone(),
        )
        .with_dimming(dimming)
        .run(&batch)
        .unwrap()
    };

    let dimmed = run(true);
    let undimmed = run(false);
    for (d, u) in dimmed.total.iter().zip(undimmed.total.iter()) {
        assert_relative_eq!(d - u, 2.5 * (1.0 + z).log10(), epsilon = 1e-9);
    }
}

#[test]
fn test_extinction_dims_blue_more_than_red() {
    let setup = setup();
    let (catalog, _) = setup.config.build_catalogs().unwrap();

    let clear = star_batch(&["flat.dat"], &[20.0]);
    let mut dusty = clear.clone();
    if let Some(input) = dusty.components.get_mut("star") {
        input.av = Some(vec![1.0]);
    }

    let mut pipeline = setup.config.pipeline(catalog);
    let clear = pipeline.run(&clear).unwrap();
    let dusty = pipeline.run(&dusty).unwrap();

    let extinction: Vec<f64> = dusty
        .total
        .iter()
        .zip(clear.total.iter())
        .map(|(d, c)| d - c)
        .collect();
    assert!(extinction.iter().all(|&a| a > 0.0));
    assert!(extinction.windows(2).all(|w| w[0] > w[1]), "{extinction:?}");
    assert_eq!(pipeline.extinction().recomputations(), 1);
}

#[test]
fn test_uncertainty_grows_toward_depth() {
    let setup = setup();
    let (catalog, _) = setup.config.build_catalogs().unwrap();

    let mags = Array2::from_shape_fn((BANDS.len(), 40), |(_, col)| 16.0 + 0.25 * col as f64);
    let depths: DepthTable = BANDS.iter().map(|b| (*b, 24.0)).collect();
    let errors = UncertaintyModel::default()
        .estimate(&mags, &catalog, Some(&depths))
        .unwrap();

    for row in errors.rows() {
        for pair in row.as_slice().unwrap().windows(2) {
            assert!(pair[1] >= pair[0]);
        }
    }
}

#[test]
fn test_uncertainty_rejects_row_count_mismatch() {
    let setup = setup();
    let grid = WavelengthGrid::default_throughput();
    let five_bands = synphot::photometry::load_total_bandpasses_from_files(
        &BANDS[..5],
        setup.throughputs.path(),
        "total_",
        &grid,
    )
    .unwrap();

    let err = UncertaintyModel::default()
        .estimate(&Array2::from_elem((4, 2), 22.0), &five_bands, None)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ShapeMismatch);
}

#[test]
fn test_band_without_depth_is_configuration_error() {
    let grid = WavelengthGrid::default_throughput();
    let catalog = BandpassCatalog::new(vec![
        ("g".to_string(), Bandpass::top_hat(grid.clone(), 400.0, 552.0).unwrap()),
        ("w".to_string(), Bandpass::top_hat(grid, 450.0, 950.0).unwrap()),
    ])
    .unwrap();

    let mags = Array2::from_elem((2, 1), 21.0);
    let depths = DepthTable::new().with("g", 24.9);
    for table in [None, Some(&depths)] {
        let err = UncertaintyModel::default()
            .estimate(&mags, &catalog, table)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);
    }
}

#[test]
fn test_configured_pipeline_matches_prebuilt_totals() {
    let setup = setup();
    let batch = star_batch(&["flat.dat", "None", "reddish"], &[20.0, 20.0, 21.0]);

    let (composed, hardware) = setup.config.build_catalogs().unwrap();
    assert!(hardware.is_some());
    let prebuilt_config = PipelineConfig {
        total_root: Some("total_".to_string()),
        ..setup.config.clone()
    };
    let (prebuilt, none) = prebuilt_config.build_catalogs().unwrap();
    assert!(none.is_none());

    let a = setup.config.pipeline(composed).run_with_uncertainty(&batch, None).unwrap();
    let b = prebuilt_config.pipeline(prebuilt).run(&batch).unwrap();

    assert_eq!(a.bands, BANDS);
    for (x, y) in a.total.iter().zip(b.total.iter()) {
        if x.is_nan() {
            assert!(y.is_nan());
        } else {
            assert_relative_eq!(*x, *y, epsilon = 1e-9);
        }
    }
    assert!(a.total.column(0).iter().all(|m| (m - 20.0).abs() < 1e-6));
    assert!(a.total.column(1).iter().all(|m| m.is_nan()));
    assert!(a.uncertainty.unwrap().column(1).iter().all(|e| e.is_nan()));
    assert!(setup.library.path().join("red.dat").exists());
}
