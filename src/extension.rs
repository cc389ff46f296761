use crate::error::{GpkgError, Result};
use crate::sql_functions::register_spatial_functions;
use rusqlite::{Connection, LoadExtensionGuard};

/// Name of the native spatialite module, resolved by the platform loader.
pub const DEFAULT_SPATIALITE_LIBRARY: &str = "mod_spatialite";

/// Which spatial SQL implementation a connection gets.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SpatialExtension {
    /// The native spatialite module, loaded at runtime.
    Spatialite { library: String },
    /// The Rust functions in [`register_spatial_functions`]. Spatial index
    /// creation and layer statistics are then done with plain SQL.
    Builtin,
}

impl Default for SpatialExtension {
    fn default() -> Self {
        Self::Spatialite {
            library: DEFAULT_SPATIALITE_LIBRARY.to_string(),
        }
    }
}

impl SpatialExtension {
    pub fn spatialite<S: Into<String>>(library: S) -> Self {
        Self::Spatialite {
            library: library.into(),
        }
    }

    pub fn is_builtin(&self) -> bool {
        matches!(self, Self::Builtin)
    }

    /// Make the spatial functions available on `conn`.
    ///
    /// Extension loading is only enabled while the module is loaded.
    pub(crate) fn load(&self, conn: &Connection) -> Result<()> {
        match self {
            Self::Spatialite { library } => {
                tracing::debug!("loading {library}");
                // SAFETY: loading a native module runs its initializer; the
                // library is whatever the caller configured.
                let loaded = unsafe {
                    LoadExtensionGuard::new(conn)
                        .and_then(|_guard| conn.load_extension(library, None::<&str>))
                };
                loaded.map_err(|source| GpkgError::ExtensionLoad {
                    library: library.clone(),
                    source,
                })
            }
            Self::Builtin => {
                tracing::debug!("registering builtin spatial functions");
                register_spatial_functions(conn)
            }
        }
    }
}
