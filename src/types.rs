/// Declared type of a user table column.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ColumnType {
    Boolean,
    Varchar,
    Double,
    Integer,
    Blob,
    Geometry(wkb::reader::GeometryType),
}

#[derive(Clone, Debug)]
pub struct ColumnSpec {
    pub name: String,
    pub column_type: ColumnType,
}

impl ColumnSpec {
    pub fn new<S: Into<String>>(name: S, column_type: ColumnType) -> Self {
        Self {
            name: name.into(),
            column_type,
        }
    }
}

/// Source and target columns for deriving point geometries.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PointColumns {
    pub x: String,
    pub y: String,
    pub geometry: String,
}

impl Default for PointColumns {
    fn default() -> Self {
        Self {
            x: "hl_x".to_string(),
            y: "hl_y".to_string(),
            geometry: "geom".to_string(),
        }
    }
}
