//! In-place post-processing of GeoPackage files built on top of rusqlite.
//!
//! ## Overview
//!
//! - `GeoPackage` names a file on disk together with the pragmas and the
//!   spatial extension every connection to it is opened with.
//! - `Session` is one open, configured connection. It is committed and closed
//!   by `Session::finish`; dropping it closes the handle and lets SQLite roll
//!   back whatever was still pending.
//! - `SpatialExtension` picks between the native spatialite module, loaded at
//!   runtime, and the Rust implementations in `register_spatial_functions`.
//!
//! Every `GeoPackage` operation opens its own session, so a failing step never
//! leaves a connection behind.
//!
//! ## Short usage
//!
//! ```no_run
//! use gpkg_postprocess::{GeoPackage, SpatialExtension};
//!
//! let gpkg = GeoPackage::new("/raw_hf/conus_nextgen.gpkg")
//!     .with_extension(SpatialExtension::Builtin);
//! gpkg.execute_script("sql/convert_hydrolocations_to_geom.sql")?;
//! gpkg.add_spatial_index("hydrolocations", "geom")?;
//! gpkg.populate_point_spatial_index("hydrolocations")?;
//! gpkg.update_layer_statistics()?;
//! gpkg.drop_spatialite_history()?;
//! # Ok::<(), gpkg_postprocess::GpkgError>(())
//! ```
//!
//! Ad-hoc SQL goes through `with_session`, which commits on success:
//!
//! ```no_run
//! use gpkg_postprocess::GeoPackage;
//!
//! let gpkg = GeoPackage::new("data.gpkg");
//! let n: i64 = gpkg.with_session(|session| {
//!     Ok(session.query_row("SELECT COUNT(*) FROM hydrolocations", [], |row| row.get(0))?)
//! })?;
//! println!("{n} hydrolocations");
//! # Ok::<(), gpkg_postprocess::GpkgError>(())
//! ```
//!
//! The whole per-file sequence is available as `driver::run`, configured by a
//! `DriverConfig`; the `hydrolocations_to_geom` binary is a thin CLI over it.
mod conversions;
mod error;
mod extension;
mod geometry;
mod gpkg;
mod identifier;
mod ogc_sql;
mod pragma;
mod sql_functions;
mod srs;
mod types;

pub mod config;
pub mod driver;

pub use crate::config::{DriverConfig, ExtensionKind};
pub use error::{GpkgError, Result};
pub use extension::{DEFAULT_SPATIALITE_LIBRARY, SpatialExtension};
pub use gpkg::{GeoPackage, Session};
pub use identifier::Identifier;
pub use pragma::{PragmaConfig, PragmaValue};
pub use sql_functions::register_spatial_functions;
pub use srs::SpatialRefSys;
pub use types::{ColumnSpec, ColumnType, PointColumns};

// Re-export types used in public signatures.
pub use wkb::reader::GeometryType;
