use std::path::PathBuf;

use clap::Parser;
use gpkg_postprocess::config::EXAMPLE_CONFIG;
use gpkg_postprocess::{DriverConfig, driver};
use tracing::{Level, error};

/// Derive point geometries for the hydrolocations layer of hydrofabric
/// GeoPackages, index them, and tidy up spatialite leftovers.
#[derive(Parser)]
#[clap(author, version, about, long_about = None)]
struct Cli {
    /// configuration file path (TOML); GPKG_* environment variables apply on top
    #[clap(short, long)]
    config: Option<PathBuf>,

    /// Print debug information
    #[clap(long)]
    debug: bool,

    /// Print a commented configuration file and exit
    #[clap(long)]
    example_config: bool,

    /// GeoPackage files to process, replacing the configured list
    #[clap(name = "FILE")]
    files: Vec<PathBuf>,
}

fn main() {
    let cli = Cli::parse();

    if cli.example_config {
        print!("{EXAMPLE_CONFIG}");
        return;
    }

    tracing_subscriber::fmt()
        .with_max_level(if cli.debug { Level::DEBUG } else { Level::INFO })
        .init();

    let mut config = match DriverConfig::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            error!("{e:#}");
            std::process::exit(1);
        }
    };
    if !cli.files.is_empty() {
        config.files = cli.files;
    }

    if let Err(e) = driver::run(&config) {
        error!("{e:#}");
        std::process::exit(1);
    }
}
