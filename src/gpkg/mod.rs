//! Connection management and maintenance operations for one GeoPackage file.
//!
//! `GeoPackage` only holds configuration. Every operation opens a `Session`,
//! runs its statements, commits and closes, so nothing stays open between
//! calls.

mod builtin;
mod geopackage;
mod session;

pub use geopackage::GeoPackage;
pub use session::Session;
