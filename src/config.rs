use crate::extension::{DEFAULT_SPATIALITE_LIBRARY, SpatialExtension};
use crate::gpkg::GeoPackage;
use crate::pragma::{PragmaConfig, PragmaValue};
use crate::types::PointColumns;
use anyhow::{Context, Result, anyhow};
use config::{Config, ConfigBuilder, Environment, File, FileFormat, builder::DefaultState};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Template for a driver configuration file. Every key is optional.
pub const EXAMPLE_CONFIG: &str = r#"### hydrolocations_to_geom configuration file

### GeoPackage files processed in order
# files = ["/raw_hf/conus_nextgen.gpkg"]

### SQL script run first on every file
# script = "convert_hydrolocations_to_geom.sql"

### point layer
# table = "hydrolocations"
# geometry_column = "geom"
# x_column = "hl_x"
# y_column = "hl_y"

### "spatialite" loads the native module, "builtin" uses the bundled functions
# extension = "spatialite"
# spatialite_library = "mod_spatialite"

### overrides merged into the default connection pragmas
# [pragmas]
# journal_mode = "DELETE"
# cache_size = -64000
"#;

/// Which spatial implementation the driver connects with.
#[derive(Clone, Copy, Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ExtensionKind {
    #[default]
    Spatialite,
    Builtin,
}

/// Settings for [`driver::run`](crate::driver::run).
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct DriverConfig {
    /// GeoPackage files, processed in order
    pub files: Vec<PathBuf>,

    /// SQL script executed against each file before anything else
    pub script: PathBuf,

    pub table: String,
    pub geometry_column: String,
    pub x_column: String,
    pub y_column: String,

    pub extension: ExtensionKind,

    /// Module name or path handed to `load_extension`
    pub spatialite_library: String,

    /// Merged over [`PragmaConfig::default`]
    pub pragmas: BTreeMap<String, PragmaValue>,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            files: vec![PathBuf::from("/raw_hf/conus_nextgen.gpkg")],
            script: PathBuf::from("convert_hydrolocations_to_geom.sql"),
            table: "hydrolocations".to_string(),
            geometry_column: "geom".to_string(),
            x_column: "hl_x".to_string(),
            y_column: "hl_y".to_string(),
            extension: ExtensionKind::default(),
            spatialite_library: DEFAULT_SPATIALITE_LIBRARY.to_string(),
            pragmas: BTreeMap::new(),
        }
    }
}

impl DriverConfig {
    /// Load the configuration from an optional TOML file, then from the
    /// environment.
    ///
    /// Environment variables are prefixed with `GPKG_`, e.g.
    /// `GPKG_EXTENSION=builtin` or `GPKG_FILES=a.gpkg,b.gpkg`.
    pub fn load(path: Option<&Path>) -> Result<DriverConfig> {
        let mut builder = Config::builder();

        if let Some(path) = path {
            if !path.exists() {
                return Err(anyhow!("config file {} does not exist", path.display()));
            }
            builder = builder.add_source(File::from(path).format(FileFormat::Toml));
        }

        Self::build(builder.add_source(env_source()))
    }

    /// Parse a TOML document. The environment is not consulted.
    pub fn from_toml_str(toml: &str) -> Result<DriverConfig> {
        Self::build(Config::builder().add_source(File::from_str(toml, FileFormat::Toml)))
    }

    fn build(builder: ConfigBuilder<DefaultState>) -> Result<DriverConfig> {
        let settings = builder
            .build()
            .map_err(|e| anyhow!("Failed to build configuration: {}", e))?;

        let config = settings
            .try_deserialize::<DriverConfig>()
            .map_err(|e| anyhow!("Failed to deserialize configuration: {}", e))?;
        config.validate()?;
        Ok(config)
    }

    /// Catch values that would only fail once a file is half processed.
    fn validate(&self) -> Result<()> {
        self.pragma_config()
            .statements()
            .context("invalid pragma override")?;
        for name in [
            &self.table,
            &self.geometry_column,
            &self.x_column,
            &self.y_column,
        ] {
            crate::identifier::Identifier::new(name)?;
        }
        Ok(())
    }

    pub fn spatial_extension(&self) -> SpatialExtension {
        match self.extension {
            ExtensionKind::Spatialite => {
                SpatialExtension::spatialite(self.spatialite_library.clone())
            }
            ExtensionKind::Builtin => SpatialExtension::Builtin,
        }
    }

    pub fn pragma_config(&self) -> PragmaConfig {
        PragmaConfig::with_overrides(self.pragmas.iter().map(|(k, v)| (k.clone(), v.clone())))
    }

    pub fn point_columns(&self) -> PointColumns {
        PointColumns {
            x: self.x_column.clone(),
            y: self.y_column.clone(),
            geometry: self.geometry_column.clone(),
        }
    }

    /// A [`GeoPackage`] for `path` with this configuration's pragmas and
    /// extension.
    pub fn geopackage<P: AsRef<Path>>(&self, path: P) -> GeoPackage {
        GeoPackage::new(path)
            .with_pragmas(self.pragma_config())
            .with_extension(self.spatial_extension())
    }
}

fn env_source() -> Environment {
    Environment::with_prefix("GPKG")
        .try_parsing(true)
        .list_separator(",")
        .with_list_parse_key("files")
}
