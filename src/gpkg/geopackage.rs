use crate::conversions::{column_type_to_str, geometry_type_to_str};
use crate::error::{GpkgError, Result};
use crate::extension::SpatialExtension;
use crate::identifier::Identifier;
use crate::ogc_sql::{
    SQL_DELETE_SPATIALITE_HISTORY_SEQUENCE, SQL_DROP_SPATIALITE_HISTORY, SQL_INSERT_GPKG_CONTENTS,
    SQL_INSERT_GPKG_GEOMETRY_COLUMNS, SQL_OGR_CONTENTS_FROM_SEQUENCE, SQL_SELECT_GEOMETRY_SRS_ID,
    sql_create_index, sql_create_table, sql_populate_point, sql_wkb_to_gpkg,
};
use crate::pragma::PragmaConfig;
use crate::srs::SpatialRefSys;
use crate::types::{ColumnSpec, PointColumns};
use rusqlite::{OpenFlags, OptionalExtension};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use super::builtin;
use super::session::Session;

/// A GeoPackage file and the settings every connection to it is opened with.
///
/// No connection is held between operations: each operation opens a
/// [`Session`], does its work, commits and closes.
#[derive(Clone, Debug)]
pub struct GeoPackage {
    path: PathBuf,
    pragmas: PragmaConfig,
    extension: SpatialExtension,
}

impl GeoPackage {
    /// Default pragmas and the native spatialite module.
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            pragmas: PragmaConfig::default(),
            extension: SpatialExtension::default(),
        }
    }

    pub fn with_pragmas(mut self, pragmas: PragmaConfig) -> Self {
        self.pragmas = pragmas;
        self
    }

    pub fn with_extension(mut self, extension: SpatialExtension) -> Self {
        self.extension = extension;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn pragmas(&self) -> &PragmaConfig {
        &self.pragmas
    }

    pub fn extension(&self) -> &SpatialExtension {
        &self.extension
    }

    /// Open the file and configure the connection.
    ///
    /// The spatial extension is loaded before anything else runs; if that
    /// fails the handle is closed and no SQL has touched the file.
    pub fn connect(&self) -> Result<Session> {
        if !self.path.exists() {
            return Err(GpkgError::MissingFile(self.path.clone()));
        }

        let conn = rusqlite::Connection::open_with_flags(
            &self.path,
            OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        self.extension.load(&conn)?;
        self.pragmas.apply(&conn)?;
        conn.execute_batch("PRAGMA foreign_keys=ON")?;

        Ok(Session::new(conn, self.path.clone()))
    }

    /// Run `f` against a fresh session: commit and close on success, close
    /// without committing on error.
    pub fn with_session<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Session) -> Result<T>,
    {
        let mut session = self.connect()?;
        let value = f(&mut session)?;
        session.finish()?;
        Ok(value)
    }

    /// Create a user table with an autoincrement `fid` primary key followed by
    /// `columns`. Does nothing if the table already exists.
    pub fn create_table(&self, table_name: &str, columns: &[ColumnSpec]) -> Result<()> {
        let table = Identifier::new(table_name)?;
        let mut column_defs = String::new();
        for spec in columns {
            let name = Identifier::new(&spec.name)?;
            column_defs.push_str(&format!(
                ", {} {}",
                name.quoted(),
                column_type_to_str(spec.column_type)
            ));
        }

        info!("creating table {table}");
        self.with_session(|session| {
            session.execute_batch(&sql_create_table(&table, &column_defs))?;
            Ok(())
        })
    }

    /// Register EPSG spatial reference systems in `gpkg_spatial_ref_sys`.
    ///
    /// Already registered codes are left untouched.
    pub fn register_epsg_srs<I>(&self, codes: I) -> Result<()>
    where
        I: IntoIterator<Item = u32>,
    {
        let use_builtin = self.extension.is_builtin();
        self.with_session(|session| {
            session.transaction(|tx| {
                for code in codes {
                    debug!("registering EPSG:{code}");
                    if use_builtin {
                        builtin::insert_epsg_srid(tx, code)?;
                    } else {
                        tx.query_row("SELECT gpkgInsertEpsgSRID(?1)", [code], |_| Ok(()))?;
                    }
                }
                Ok(())
            })
        })
    }

    /// Expert-only: register a fully specified spatial reference system.
    ///
    /// The WKT `definition` and authority fields are stored as given.
    pub fn register_srs(&self, srs: &SpatialRefSys) -> Result<()> {
        self.with_session(|session| builtin::insert_srs(session, srs))
    }

    /// Run a script that creates the GeoPackage metadata tables.
    pub fn add_gpkg_metadata_tables<P: AsRef<Path>>(&self, script_path: P) -> Result<()> {
        self.execute_script(script_path)
    }

    /// Add a row to `gpkg_contents`; the identifier is the table name.
    pub fn add_gpkg_contents(&self, table_name: &str, data_type: &str, srs_id: i32) -> Result<()> {
        let table = Identifier::new(table_name)?;
        self.with_session(|session| {
            session.execute(
                SQL_INSERT_GPKG_CONTENTS,
                rusqlite::params![table.as_str(), data_type, srs_id],
            )?;
            Ok(())
        })
    }

    /// Add a row to `gpkg_geometry_columns` for an XY geometry column.
    pub fn add_gpkg_geometry_columns(
        &self,
        table_name: &str,
        column_name: &str,
        geometry_type: wkb::reader::GeometryType,
        srs_id: i32,
    ) -> Result<()> {
        let table = Identifier::new(table_name)?;
        let column = Identifier::new(column_name)?;
        self.with_session(|session| {
            session.execute(
                SQL_INSERT_GPKG_GEOMETRY_COLUMNS,
                rusqlite::params![
                    table.as_str(),
                    column.as_str(),
                    geometry_type_to_str(geometry_type),
                    srs_id
                ],
            )?;
            Ok(())
        })
    }

    /// Build the rtree spatial index for a geometry column.
    pub fn add_spatial_index(&self, table_name: &str, column_name: &str) -> Result<()> {
        let table = Identifier::new(table_name)?;
        let column = Identifier::new(column_name)?;

        info!("adding spatial index on {table}.{column}");
        let use_builtin = self.extension.is_builtin();
        self.with_session(|session| {
            if use_builtin {
                session.transaction(|tx| builtin::add_spatial_index(tx, &table, &column))
            } else {
                session.query_row(
                    "SELECT gpkgAddSpatialIndex(?1, ?2)",
                    [table.as_str(), column.as_str()],
                    |_| Ok(()),
                )?;
                Ok(())
            }
        })
    }

    /// Fill `geom` from the `hl_x` / `hl_y` columns of `table_name`, using the
    /// SRS registered for the table in `gpkg_geometry_columns`.
    pub fn populate_point_spatial_index(&self, table_name: &str) -> Result<usize> {
        self.populate_point_geometry(table_name, &PointColumns::default())
    }

    /// Fill a point geometry column from two coordinate columns. Rows with a
    /// NULL coordinate get a NULL geometry. Returns the number of rows updated.
    pub fn populate_point_geometry(
        &self,
        table_name: &str,
        columns: &PointColumns,
    ) -> Result<usize> {
        let table = Identifier::new(table_name)?;
        let geometry = Identifier::new(&columns.geometry)?;
        let x = Identifier::new(&columns.x)?;
        let y = Identifier::new(&columns.y)?;

        self.with_session(|session| {
            let srs_id: i32 = session
                .query_row(
                    SQL_SELECT_GEOMETRY_SRS_ID,
                    [table.as_str()],
                    |row| row.get(0),
                )
                .optional()?
                .ok_or_else(|| GpkgError::MissingGeometryColumn {
                    table_name: table.to_string(),
                })?;

            let updated = session.transaction(|tx| {
                Ok(tx.execute(&sql_populate_point(&table, &geometry, &x, &y), [srs_id])?)
            })?;
            info!("populated {updated} {table}.{geometry} points (srs_id {srs_id})");
            Ok(updated)
        })
    }

    /// Rewrite raw WKB stored in `geom_column` as GeoPackage geometry blobs.
    pub fn convert_wkb_to_gpkg_blob(
        &self,
        table_name: &str,
        geom_column: &str,
        srs_id: i32,
    ) -> Result<usize> {
        let table = Identifier::new(table_name)?;
        let geometry = Identifier::new(geom_column)?;
        self.with_session(|session| {
            Ok(session.execute(&sql_wkb_to_gpkg(&table, &geometry), [srs_id])?)
        })
    }

    /// Refresh the cached layer statistics (extents and feature counts).
    pub fn update_layer_statistics(&self) -> Result<()> {
        info!("updating layer statistics");
        let use_builtin = self.extension.is_builtin();
        self.with_session(|session| {
            if use_builtin {
                session.transaction(|tx| builtin::update_layer_statistics(tx))
            } else {
                session.query_row("SELECT UpdateLayerStatistics()", [], |_| Ok(()))?;
                Ok(())
            }
        })
    }

    /// Drop `spatialite_history` and forget its autoincrement sequence.
    /// Running this on a file without the table is a no-op.
    pub fn drop_spatialite_history(&self) -> Result<()> {
        info!("dropping spatialite_history");
        self.with_session(|session| {
            session.transaction(|tx| {
                tx.execute_batch(SQL_DROP_SPATIALITE_HISTORY)?;
                if builtin::table_exists(tx, "sqlite_sequence")? {
                    tx.execute(SQL_DELETE_SPATIALITE_HISTORY_SEQUENCE, [])?;
                }
                Ok(())
            })
        })
    }

    /// Seed `gpkg_ogr_contents` from the autoincrement counters in
    /// `sqlite_sequence`.
    pub fn fix_gpkg_ogr_contents(&self) -> Result<()> {
        self.with_session(|session| {
            session.execute(SQL_OGR_CONTENTS_FROM_SEQUENCE, [])?;
            Ok(())
        })
    }

    /// Create a plain b-tree index named `<table>_<column>_idx`.
    pub fn add_sqlite_index(&self, table_name: &str, column_name: &str) -> Result<()> {
        let table = Identifier::new(table_name)?;
        let column = Identifier::new(column_name)?;
        self.with_session(|session| {
            session.execute_batch(&sql_create_index(&table, &column))?;
            Ok(())
        })
    }

    /// Read a SQL script from disk and run all of it.
    pub fn execute_script<P: AsRef<Path>>(&self, script_path: P) -> Result<()> {
        let script_path = script_path.as_ref();
        let script = std::fs::read_to_string(script_path).map_err(|source| GpkgError::Io {
            path: script_path.to_path_buf(),
            source,
        })?;

        info!("running {}", script_path.display());
        self.with_session(|session| session.run_script(&script))
    }
}
