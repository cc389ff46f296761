use std::path::PathBuf;

/// Crate error type for GeoPackage post-processing.
#[derive(Debug, thiserror::Error)]
pub enum GpkgError {
    /// Wraps errors returned by `rusqlite`.
    #[error(transparent)]
    Sql(#[from] rusqlite::Error),
    /// Wraps errors returned by the `wkb` crate.
    #[error(transparent)]
    Wkb(#[from] wkb::error::WkbError),
    /// Reading a SQL script from disk failed.
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// The spatial extension could not be loaded into the connection.
    #[error("failed to load {library}: {source}")]
    ExtensionLoad {
        library: String,
        #[source]
        source: rusqlite::Error,
    },
    /// The target GeoPackage does not exist. Files are never created.
    #[error("GeoPackage file does not exist: {}", .0.display())]
    MissingFile(PathBuf),
    /// A table, column or pragma name is not a plain SQL identifier.
    #[error("invalid SQL identifier: {0:?}")]
    InvalidIdentifier(String),
    /// A textual pragma value is not a bare keyword.
    #[error("invalid value for pragma {pragma}: {value:?}")]
    InvalidPragmaValue { pragma: String, value: String },
    /// The EPSG code is not part of the built-in catalog.
    #[error("EPSG:{0} is not available without the spatialite extension")]
    UnknownEpsg(u32),
    /// No row in `gpkg_geometry_columns` describes the table.
    #[error("no geometry column registered for table: {table_name}")]
    MissingGeometryColumn { table_name: String },
    /// Invalid GeoPackage geometry flags byte.
    #[error("invalid gpkg geometry flags: {0:#04x}")]
    InvalidGpkgGeometryFlags(u8),
    /// GeoPackage geometry blob is too short for its header or envelope.
    #[error("invalid gpkg geometry length: got {len} bytes, expected at least {minimum}")]
    InvalidGpkgGeometryLength { len: usize, minimum: usize },
    /// The blob does not start with the `GP` magic bytes.
    #[error("not a gpkg geometry blob")]
    InvalidGpkgGeometryMagic,
}

pub type Result<T> = std::result::Result<T, GpkgError>;
