//! Magnitude calculator for SEDs from an SED library
//!
//! Builds the bandpass catalog described by a pipeline configuration file,
//! normalizes each requested SED to its magNorm, applies optional extinction
//! and redshift, and prints the magnitude in every band. Intended for spot
//! checks of throughput sets and SED libraries, not for bulk catalog runs.

use std::path::PathBuf;

use clap::Parser;
use log::info;
use synphot::config::PipelineConfig;
use synphot::photometry::{ComponentInput, ObjectBatch};

#[derive(Parser, Debug)]
#[command(
    name = "synphot_mags",
    about = "Computes synthetic magnitudes of library SEDs through a throughput set",
    long_about = None
)]
struct Args {
    /// Pipeline configuration JSON (defaults to the LSST baseline)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Override the throughput directory from the configuration
    #[arg(long)]
    throughputs: Option<PathBuf>,

    /// Override the SED library directory from the configuration
    #[arg(long)]
    seds: Option<PathBuf>,

    /// SED names, one per object ("None" for no SED)
    #[arg(long = "sed", required = true, num_args = 1..)]
    sed_names: Vec<String>,

    /// Normalization magnitude at 500 nm, one per SED
    #[arg(long = "mag-norm", required = true, num_args = 1..)]
    mag_norm: Vec<f64>,

    /// Internal extinction Av, one per SED
    #[arg(long, num_args = 1..)]
    av: Option<Vec<f64>>,

    /// Redshift, one per SED
    #[arg(long, num_args = 1..)]
    redshift: Option<Vec<f64>>,

    /// Also print magnitude uncertainties
    #[arg(long)]
    uncertainty: bool,

    /// Write the effective configuration to this path and exit
    #[arg(long)]
    dump_config: Option<PathBuf>,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => PipelineConfig::load_from_file(path)?,
        None => PipelineConfig::default(),
    };
    if let Some(dir) = args.throughputs {
        config.throughput_dir = dir;
    }
    if let Some(dir) = args.seds {
        config.sed_files.directory = dir;
    }

    if let Some(path) = &args.dump_config {
        config.save_to_file(path)?;
        println!("Wrote configuration to {}", path.display());
        return Ok(());
    }

    let mut components = config.object_components.iter();
    let (Some(component), None) = (components.next(), components.next()) else {
        return Err("synphot_mags only handles single-component objects".into());
    };

    let ids: Vec<String> = (0..args.sed_names.len()).map(|i| i.to_string()).collect();
    let mut input = ComponentInput::new(args.sed_names.clone(), args.mag_norm);
    input.av = args.av;
    let mut batch = ObjectBatch::new(ids).with_component(component.name.clone(), input);
    batch.redshifts = args.redshift;

    let (total, _hardware) = config.build_catalogs()?;
    info!(
        "Catalog has {} bands on {} samples",
        total.len(),
        total.grid().len()
    );
    let mut pipeline = config.pipeline(total);

    let result = if args.uncertainty {
        pipeline.run_with_uncertainty(&batch, config.depths.as_ref())?
    } else {
        pipeline.run(&batch)?
    };

    print!("{:<24}", "SED");
    for band in &result.bands {
        print!(" {band:>9}");
    }
    println!();
    println!("{:-<1$}", "", 24 + 10 * result.bands.len());

    for (col, name) in args.sed_names.iter().enumerate() {
        print!("{name:<24}");
        for row in 0..result.bands.len() {
            print!(" {:>9.4}", result.total[[row, col]]);
        }
        println!();
        if let Some(errors) = &result.uncertainty {
            print!("{:<24}", "  ±");
            for row in 0..result.bands.len() {
                print!(" {:>9.4}", errors[[row, col]]);
            }
            println!();
        }
    }

    Ok(())
}
