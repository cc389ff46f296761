//! The per-file post-processing sequence behind `hydrolocations_to_geom`.

use crate::config::DriverConfig;
use anyhow::{Context, Result};
use std::path::Path;
use tracing::info;

/// Process every configured file in order.
///
/// Stops at the first failure. Files already processed keep their changes;
/// the failing file keeps whatever earlier steps committed.
pub fn run(config: &DriverConfig) -> Result<()> {
    for path in &config.files {
        process_file(config, path)?;
    }
    info!("processed {} file(s)", config.files.len());
    Ok(())
}

/// Run the whole sequence against a single GeoPackage:
///
/// 1. the configured SQL script
/// 2. spatial index on the geometry column
/// 3. point geometries from the coordinate columns
/// 4. layer statistics
/// 5. removal of `spatialite_history`
pub fn process_file(config: &DriverConfig, path: &Path) -> Result<()> {
    let gpkg = config.geopackage(path);
    let table = config.table.as_str();
    let geometry = &config.geometry_column;
    let file = path.display();
    info!("processing {file}");

    gpkg.execute_script(&config.script)
        .with_context(|| format!("{file}: running {}", config.script.display()))?;

    gpkg.add_spatial_index(table, geometry)
        .with_context(|| format!("{file}: adding spatial index on {table}.{geometry}"))?;

    let updated = gpkg
        .populate_point_geometry(table, &config.point_columns())
        .with_context(|| format!("{file}: populating {table}.{geometry}"))?;
    info!("{file}: {updated} geometries written");

    gpkg.update_layer_statistics()
        .with_context(|| format!("{file}: updating layer statistics"))?;

    gpkg.drop_spatialite_history()
        .with_context(|| format!("{file}: dropping spatialite_history"))?;

    info!("finished {file}");
    Ok(())
}
