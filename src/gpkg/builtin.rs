//! Plain-SQL versions of the spatialite maintenance functions, used with
//! [`SpatialExtension::Builtin`](crate::SpatialExtension).

use crate::error::{GpkgError, Result};
use crate::identifier::Identifier;
use crate::ogc_sql::{
    SQL_INSERT_SPATIAL_REF_SYS, SQL_LIST_GEOMETRY_COLUMNS, SQL_TABLE_EXISTS,
    SQL_UPDATE_CONTENTS_EXTENT, SQL_UPSERT_OGR_FEATURE_COUNT, execute_rtree_sqls, rtree_table_name,
    sql_layer_extent,
};
use crate::srs::SpatialRefSys;
use rusqlite::{Connection, OptionalExtension};
use tracing::{debug, warn};

pub(crate) fn table_exists(conn: &Connection, table_name: &str) -> Result<bool> {
    let exists: bool = conn.query_row(SQL_TABLE_EXISTS, [table_name], |row| row.get(0))?;
    Ok(exists)
}

/// The integer primary key of `table`, or `rowid` when there is none.
fn rowid_column(conn: &Connection, table: &Identifier) -> Result<Identifier> {
    let mut stmt = conn.prepare("SELECT name, type FROM pragma_table_info(?1) WHERE pk > 0")?;
    let pk_columns = stmt
        .query_map([table.as_str()], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    match pk_columns.as_slice() {
        [(name, column_type)] if column_type.eq_ignore_ascii_case("INTEGER") => {
            Identifier::new(name)
        }
        _ => Identifier::new("rowid"),
    }
}

/// Equivalent of spatialite's `gpkgAddSpatialIndex()`.
pub(crate) fn add_spatial_index(
    conn: &Connection,
    table: &Identifier,
    column: &Identifier,
) -> Result<()> {
    let rtree = rtree_table_name(table, column);
    if table_exists(conn, &rtree)? {
        warn!("{rtree} already exists, leaving it as is");
        return Ok(());
    }
    let id_column = rowid_column(conn, table)?;
    debug!("creating {rtree} keyed on {id_column}");
    execute_rtree_sqls(conn, table, column, &id_column)?;
    Ok(())
}

/// Insert EPSG definitions from the built-in catalog.
pub(crate) fn insert_epsg_srid(conn: &Connection, code: u32) -> Result<()> {
    let srs = SpatialRefSys::from_epsg(code).ok_or(GpkgError::UnknownEpsg(code))?;
    insert_srs(conn, &srs)
}

pub(crate) fn insert_srs(conn: &Connection, srs: &SpatialRefSys) -> Result<()> {
    conn.execute(
        SQL_INSERT_SPATIAL_REF_SYS,
        rusqlite::params![
            srs.srs_name,
            srs.srs_id,
            srs.organization,
            srs.organization_coordsys_id,
            srs.definition,
            srs.description
        ],
    )?;
    Ok(())
}

/// Equivalent of spatialite's `UpdateLayerStatistics()` for GeoPackages:
/// refresh the extent in `gpkg_contents` and the cached feature count in
/// `gpkg_ogr_contents` for every feature table.
pub(crate) fn update_layer_statistics(conn: &Connection) -> Result<()> {
    let mut stmt = conn.prepare(SQL_LIST_GEOMETRY_COLUMNS)?;
    let layers = stmt
        .query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    drop(stmt);

    let has_ogr_contents = table_exists(conn, "gpkg_ogr_contents")?;

    for (table_name, column_name) in layers {
        let (table, column) = match (Identifier::new(&table_name), Identifier::new(&column_name)) {
            (Ok(table), Ok(column)) => (table, column),
            _ => {
                warn!("skipping statistics for {table_name}.{column_name}: not a valid identifier");
                continue;
            }
        };
        if !table_exists(conn, table.as_str())? {
            warn!("skipping statistics for {table}: registered but missing");
            continue;
        }

        let extent = conn
            .query_row(&sql_layer_extent(&table, &column), [], |row| {
                Ok((
                    row.get::<_, Option<f64>>(0)?,
                    row.get::<_, Option<f64>>(1)?,
                    row.get::<_, Option<f64>>(2)?,
                    row.get::<_, Option<f64>>(3)?,
                    row.get::<_, i64>(4)?,
                ))
            })
            .optional()?;
        let Some((min_x, min_y, max_x, max_y, feature_count)) = extent else {
            continue;
        };

        debug!("{table}: {feature_count} features in ({min_x:?}, {min_y:?}, {max_x:?}, {max_y:?})");
        conn.execute(
            SQL_UPDATE_CONTENTS_EXTENT,
            rusqlite::params![table.as_str(), min_x, min_y, max_x, max_y],
        )?;
        if has_ogr_contents {
            conn.execute(
                SQL_UPSERT_OGR_FEATURE_COUNT,
                rusqlite::params![table.as_str(), feature_count],
            )?;
        }
    }

    Ok(())
}
