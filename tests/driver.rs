use std::path::{Path, PathBuf};

use gpkg_postprocess::{
    ColumnSpec, ColumnType, DriverConfig, ExtensionKind, GeoPackage, SpatialExtension, driver,
};
use rusqlite::params;

const METADATA_SCRIPT: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/sql/gpkg_metadata_tables.sql");
const CONVERT_SCRIPT: &str = concat!(
    env!("CARGO_MANIFEST_DIR"),
    "/sql/convert_hydrolocations_to_geom.sql"
);

const GEOM_COLUMN_EXISTS: &str =
    "SELECT COUNT(*) FROM pragma_table_info('hydrolocations') WHERE name = 'geom'";

const RTREE_ROWS: &str = "SELECT COUNT(*) FROM rtree_hydrolocations_geom";

const INSERT_HYDROLOCATION: &str =
    "INSERT INTO hydrolocations (hl_uri, hl_x, hl_y) VALUES (?1, ?2, ?3)";

const POINTS: [(&str, Option<f64>, Option<f64>); 4] = [
    ("usgs-01013500", Some(2_004_121.0), Some(2_986_305.5)),
    ("usgs-08279500", Some(-943_211.25), Some(1_515_003.0)),
    ("nid-ca00123", None, Some(1_700_000.0)),
    ("usgs-14105700", Some(-2_041_660.0), Some(2_800_114.75)),
];

/// A hydrofabric-like file: `hydrolocations` is still an attribute table
/// and spatialite left its history table behind.
fn hydrofabric(dir: &Path, name: &str) -> gpkg_postprocess::Result<PathBuf> {
    let path = dir.join(name);
    std::fs::write(&path, b"").expect("create file");

    let gpkg = GeoPackage::new(&path).with_extension(SpatialExtension::Builtin);
    gpkg.add_gpkg_metadata_tables(METADATA_SCRIPT)?;
    gpkg.register_epsg_srs([5070])?;
    gpkg.create_table(
        "hydrolocations",
        &[
            ColumnSpec::new("hl_uri", ColumnType::Varchar),
            ColumnSpec::new("hl_x", ColumnType::Double),
            ColumnSpec::new("hl_y", ColumnType::Double),
        ],
    )?;
    gpkg.add_gpkg_contents("hydrolocations", "attributes", 5070)?;
    gpkg.with_session(|session| {
        session.execute_batch(
            "CREATE TABLE spatialite_history (
                 event_id INTEGER PRIMARY KEY AUTOINCREMENT, table_name TEXT);
             INSERT INTO spatialite_history (table_name) VALUES ('hydrolocations');",
        )?;
        for (uri, x, y) in POINTS {
            session.execute(INSERT_HYDROLOCATION, params![uri, x, y])?;
        }
        Ok(())
    })?;
    Ok(path)
}

fn config(files: Vec<PathBuf>) -> DriverConfig {
    DriverConfig {
        files,
        script: PathBuf::from(CONVERT_SCRIPT),
        extension: ExtensionKind::Builtin,
        ..DriverConfig::default()
    }
}

fn count(path: &Path, sql: &str) -> i64 {
    let conn = rusqlite::Connection::open(path).expect("open");
    conn.query_row(sql, [], |row| row.get(0)).expect("query")
}

#[test]
fn hydrolocations_become_an_indexed_point_layer() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let path = hydrofabric(dir.path(), "conus_nextgen.gpkg")?;

    driver::run(&config(vec![path.clone()]))?;

    let features = "SELECT COUNT(*) FROM gpkg_contents \
                    WHERE table_name = 'hydrolocations' AND data_type = 'features'";
    assert_eq!(count(&path, features), 1);
    let srs_id = "SELECT srs_id FROM gpkg_geometry_columns \
                  WHERE table_name = 'hydrolocations' AND column_name = 'geom'";
    assert_eq!(count(&path, srs_id), 5070);

    // every row with both coordinates got a geometry
    let points = "SELECT COUNT(*) FROM hydrolocations WHERE geom IS NOT NULL";
    let nulls = "SELECT COUNT(*) FROM hydrolocations WHERE geom IS NULL AND hl_x IS NULL";
    assert_eq!(count(&path, points), 3);
    assert_eq!(count(&path, nulls), 1);

    // and the rtree holds exactly those rows
    let indexed = "SELECT COUNT(*) FROM rtree_hydrolocations_geom r \
                   JOIN hydrolocations h ON r.id = h.fid WHERE h.geom IS NOT NULL";
    assert_eq!(count(&path, RTREE_ROWS), 3);
    assert_eq!(count(&path, indexed), 3);

    let feature_count = "SELECT feature_count FROM gpkg_ogr_contents \
                         WHERE table_name = 'hydrolocations'";
    let extent = "SELECT COUNT(*) FROM gpkg_contents WHERE table_name = 'hydrolocations' \
                  AND min_x = -2041660.0 AND max_y = 2986305.5";
    assert_eq!(count(&path, feature_count), 4);
    assert_eq!(count(&path, extent), 1);

    let history = "SELECT COUNT(*) FROM sqlite_master WHERE name = 'spatialite_history'";
    let sequence = "SELECT COUNT(*) FROM sqlite_sequence WHERE name = 'spatialite_history'";
    assert_eq!(count(&path, history), 0);
    assert_eq!(count(&path, sequence), 0);
    Ok(())
}

#[test]
fn geometries_are_readable_with_builtin_functions() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let path = hydrofabric(dir.path(), "conus_nextgen.gpkg")?;
    driver::run(&config(vec![path.clone()]))?;

    let gpkg = GeoPackage::new(&path).with_extension(SpatialExtension::Builtin);
    let (x, y, srid): (f64, f64, i64) = gpkg.with_session(|session| {
        Ok(session.query_row(
            "SELECT ST_X(geom), ST_Y(geom), ST_SRID(geom) FROM hydrolocations \
             WHERE hl_uri = 'usgs-08279500'",
            [],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
        )?)
    })?;
    assert_eq!((x, y, srid), (-943_211.25, 1_515_003.0, 5070));
    Ok(())
}

#[test]
fn files_are_processed_in_order_until_the_first_failure() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let first = hydrofabric(dir.path(), "vpu01.gpkg")?;
    let missing = dir.path().join("vpu02.gpkg");
    let third = hydrofabric(dir.path(), "vpu03.gpkg")?;

    let err = driver::run(&config(vec![first.clone(), missing.clone(), third.clone()]))
        .expect_err("second file does not exist");
    let message = format!("{err:#}");
    assert!(message.contains("vpu02.gpkg"), "{message}");
    assert!(message.contains("does not exist"), "{message}");

    let points = "SELECT COUNT(*) FROM hydrolocations WHERE geom IS NOT NULL";
    assert_eq!(count(&first, points), 3);
    assert!(!missing.exists());
    // never reached
    assert_eq!(count(&third, GEOM_COLUMN_EXISTS), 0);
    Ok(())
}

#[test]
fn failing_script_names_the_step() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let path = hydrofabric(dir.path(), "conus_nextgen.gpkg")?;
    let config = config(vec![path.clone()]);

    driver::run(&config)?;
    // the column already exists the second time round
    let err = driver::run(&config).expect_err("script is not re-runnable");
    let message = format!("{err:#}");
    assert!(
        message.contains("convert_hydrolocations_to_geom.sql"),
        "{message}"
    );

    assert_eq!(count(&path, RTREE_ROWS), 3);
    Ok(())
}

#[test]
fn unloadable_extension_leaves_the_file_untouched() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let path = hydrofabric(dir.path(), "conus_nextgen.gpkg")?;
    let config = DriverConfig {
        extension: ExtensionKind::Spatialite,
        spatialite_library: "no_such_spatial_module".to_string(),
        ..config(vec![path.clone()])
    };

    let err = driver::run(&config).expect_err("module cannot be loaded");
    assert!(format!("{err:#}").contains("no_such_spatial_module"));

    assert_eq!(count(&path, GEOM_COLUMN_EXISTS), 0);
    assert_eq!(count(&path, "SELECT COUNT(*) FROM spatialite_history"), 1);
    Ok(())
}
