// cf. https://www.geopackage.org/spec140/index.html#table_definition_sql
//
// Every identifier reaching the builders below has already been validated by
// `Identifier`, so quoting is enough to splice it in.

use crate::identifier::Identifier;

pub(crate) const SQL_INSERT_GPKG_CONTENTS: &str = "
INSERT INTO gpkg_contents
  (table_name, data_type, identifier, srs_id)
VALUES
  (?1, ?2, ?1, ?3)
";

pub(crate) const SQL_INSERT_GPKG_GEOMETRY_COLUMNS: &str = "
INSERT INTO gpkg_geometry_columns
  (table_name, column_name, geometry_type_name, srs_id, z, m)
VALUES
  (?1, ?2, ?3, ?4, 0, 0)
";

pub(crate) const SQL_INSERT_SPATIAL_REF_SYS: &str = "
INSERT OR IGNORE INTO gpkg_spatial_ref_sys
  (srs_name, srs_id, organization, organization_coordsys_id, definition, description)
VALUES
  (?1, ?2, ?3, ?4, ?5, ?6)
";

pub(crate) const SQL_SELECT_GEOMETRY_SRS_ID: &str = "
SELECT srs_id
FROM gpkg_geometry_columns
WHERE table_name = ?1
";

pub(crate) const SQL_LIST_GEOMETRY_COLUMNS: &str = "
SELECT table_name, column_name
FROM gpkg_geometry_columns
ORDER BY table_name
";

pub(crate) const SQL_TABLE_EXISTS: &str =
    "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1)";

pub(crate) const SQL_UPDATE_CONTENTS_EXTENT: &str = "
UPDATE gpkg_contents
SET min_x = ?2, min_y = ?3, max_x = ?4, max_y = ?5,
    last_change = strftime('%Y-%m-%dT%H:%M:%fZ','now')
WHERE table_name = ?1
";

pub(crate) const SQL_UPSERT_OGR_FEATURE_COUNT: &str = "
INSERT OR REPLACE INTO gpkg_ogr_contents (table_name, feature_count)
VALUES (?1, ?2)
";

pub(crate) const SQL_OGR_CONTENTS_FROM_SEQUENCE: &str = "
INSERT OR REPLACE INTO gpkg_ogr_contents (table_name, feature_count)
SELECT name, seq FROM sqlite_sequence
";

pub(crate) const SQL_DROP_SPATIALITE_HISTORY: &str = "DROP TABLE IF EXISTS spatialite_history";

pub(crate) const SQL_DELETE_SPATIALITE_HISTORY_SEQUENCE: &str =
    "DELETE FROM sqlite_sequence WHERE name = 'spatialite_history'";

// gpkg_extensions: declares which extensions apply to the GeoPackage, a table,
// or a column so clients can detect requirements without scanning user tables.
pub(crate) const SQL_GPKG_EXTENSIONS: &str = "
CREATE TABLE IF NOT EXISTS gpkg_extensions (
  table_name TEXT,
  column_name TEXT,
  extension_name TEXT NOT NULL,
  definition TEXT NOT NULL,
  scope TEXT NOT NULL,
  CONSTRAINT ge_tce UNIQUE (table_name, column_name, extension_name)
);
";

pub(crate) const SQL_REGISTER_RTREE_EXTENSION: &str = "
INSERT OR IGNORE INTO gpkg_extensions
  (table_name, column_name, extension_name, definition, scope)
VALUES
  (?1, ?2, 'gpkg_rtree_index', 'http://www.geopackage.org/spec120/#extension_rtree', 'write-only')
";

pub(crate) fn sql_create_table(table: &Identifier, column_defs: &str) -> String {
    format!(
        r#"CREATE TABLE IF NOT EXISTS {} ("fid" INTEGER NOT NULL PRIMARY KEY AUTOINCREMENT{column_defs})"#,
        table.quoted()
    )
}

pub(crate) fn sql_create_index(table: &Identifier, column: &Identifier) -> String {
    format!(
        r#"CREATE INDEX IF NOT EXISTS "{t}_{c}_idx" ON "{t}"("{c}")"#,
        t = table,
        c = column,
    )
}

pub(crate) fn sql_populate_point(
    table: &Identifier,
    geometry: &Identifier,
    x: &Identifier,
    y: &Identifier,
) -> String {
    format!(
        "UPDATE {t} SET {g} = AsGPB(MakePoint({x}, {y}, ?1))",
        t = table.quoted(),
        g = geometry.quoted(),
        x = x.quoted(),
        y = y.quoted(),
    )
}

pub(crate) fn sql_wkb_to_gpkg(table: &Identifier, geometry: &Identifier) -> String {
    format!(
        "UPDATE {t} SET {g} = AsGPB(GeomFromWKB({g}, ?1))",
        t = table.quoted(),
        g = geometry.quoted(),
    )
}

pub(crate) fn sql_layer_extent(table: &Identifier, geometry: &Identifier) -> String {
    format!(
        "SELECT MIN(ST_MinX({g})), MIN(ST_MinY({g})), MAX(ST_MaxX({g})), MAX(ST_MaxY({g})), COUNT(*) FROM {t}",
        t = table.quoted(),
        g = geometry.quoted(),
    )
}

pub(crate) fn rtree_table_name(table: &Identifier, geom_column: &Identifier) -> String {
    format!("rtree_{table}_{geom_column}")
}

// cf. https://www.geopackage.org/spec140/index.html#extension_rtree
pub(crate) fn gpkg_rtree_create_sql(table: &Identifier, geom_column: &Identifier) -> String {
    format!(
        r#"CREATE VIRTUAL TABLE "rtree_{t}_{c}" USING rtree(id, minx, maxx, miny, maxy);"#,
        t = table,
        c = geom_column,
    )
}

pub(crate) fn gpkg_rtree_load_sql(
    table: &Identifier,
    geom_column: &Identifier,
    id_column: &Identifier,
) -> String {
    format!(
        r#"INSERT OR REPLACE INTO "rtree_{t}_{c}"
  SELECT "{i}", ST_MinX("{c}"), ST_MaxX("{c}"), ST_MinY("{c}"), ST_MaxY("{c}")
  FROM "{t}" WHERE "{c}" NOT NULL AND NOT ST_IsEmpty("{c}");"#,
        t = table,
        c = geom_column,
        i = id_column
    )
}

pub(crate) fn gpkg_rtree_triggers_sql(
    table: &Identifier,
    geom_column: &Identifier,
    id_column: &Identifier,
) -> String {
    format!(
        r#"CREATE TRIGGER "rtree_{t}_{c}_insert" AFTER INSERT ON "{t}"
  WHEN (new."{c}" NOT NULL AND NOT ST_IsEmpty(NEW."{c}"))
BEGIN
  INSERT OR REPLACE INTO "rtree_{t}_{c}" VALUES (
    NEW."{i}",
    ST_MinX(NEW."{c}"), ST_MaxX(NEW."{c}"),
    ST_MinY(NEW."{c}"), ST_MaxY(NEW."{c}")
  );
END;

CREATE TRIGGER "rtree_{t}_{c}_update2" AFTER UPDATE OF "{c}" ON "{t}"
  WHEN OLD."{i}" = NEW."{i}" AND
       (NEW."{c}" ISNULL OR ST_IsEmpty(NEW."{c}"))
BEGIN
  DELETE FROM "rtree_{t}_{c}" WHERE id = OLD."{i}";
END;

CREATE TRIGGER "rtree_{t}_{c}_update4" AFTER UPDATE ON "{t}"
  WHEN OLD."{i}" != NEW."{i}" AND
       (NEW."{c}" ISNULL OR ST_IsEmpty(NEW."{c}"))
BEGIN
  DELETE FROM "rtree_{t}_{c}" WHERE id IN (OLD."{i}", NEW."{i}");
END;

CREATE TRIGGER "rtree_{t}_{c}_update5" AFTER UPDATE ON "{t}"
  WHEN OLD."{i}" != NEW."{i}" AND
       (NEW."{c}" NOTNULL AND NOT ST_IsEmpty(NEW."{c}"))
BEGIN
  DELETE FROM "rtree_{t}_{c}" WHERE id = OLD."{i}";
  INSERT OR REPLACE INTO "rtree_{t}_{c}" VALUES (
    NEW."{i}",
    ST_MinX(NEW."{c}"), ST_MaxX(NEW."{c}"),
    ST_MinY(NEW."{c}"), ST_MaxY(NEW."{c}")
  );
END;

CREATE TRIGGER "rtree_{t}_{c}_update6" AFTER UPDATE OF "{c}" ON "{t}"
  WHEN OLD."{i}" = NEW."{i}" AND
       (NEW."{c}" NOTNULL AND NOT ST_IsEmpty(NEW."{c}")) AND
       (OLD."{c}" NOTNULL AND NOT ST_IsEmpty(OLD."{c}"))
BEGIN
  UPDATE "rtree_{t}_{c}" SET
    minx = ST_MinX(NEW."{c}"),
    maxx = ST_MaxX(NEW."{c}"),
    miny = ST_MinY(NEW."{c}"),
    maxy = ST_MaxY(NEW."{c}")
  WHERE id = NEW."{i}";
END;

CREATE TRIGGER "rtree_{t}_{c}_update7" AFTER UPDATE OF "{c}" ON "{t}"
  WHEN OLD."{i}" = NEW."{i}" AND
       (NEW."{c}" NOTNULL AND NOT ST_IsEmpty(NEW."{c}")) AND
       (OLD."{c}" ISNULL OR ST_IsEmpty(OLD."{c}"))
BEGIN
  INSERT INTO "rtree_{t}_{c}" VALUES (
    NEW."{i}",
    ST_MinX(NEW."{c}"), ST_MaxX(NEW."{c}"),
    ST_MinY(NEW."{c}"), ST_MaxY(NEW."{c}")
  );
END;

CREATE TRIGGER "rtree_{t}_{c}_delete" AFTER DELETE ON "{t}"
  WHEN old."{c}" NOT NULL
BEGIN
  DELETE FROM "rtree_{t}_{c}" WHERE id = OLD."{i}";
END;"#,
        t = table,
        c = geom_column,
        i = id_column
    )
}

pub(crate) fn execute_rtree_sqls(
    conn: &rusqlite::Connection,
    table: &Identifier,
    geom_column: &Identifier,
    id_column: &Identifier,
) -> rusqlite::Result<()> {
    conn.execute_batch(&gpkg_rtree_create_sql(table, geom_column))?;
    conn.execute_batch(&gpkg_rtree_load_sql(table, geom_column, id_column))?;
    conn.execute_batch(&gpkg_rtree_triggers_sql(table, geom_column, id_column))?;
    conn.execute_batch(SQL_GPKG_EXTENSIONS)?;
    conn.execute(
        SQL_REGISTER_RTREE_EXTENSION,
        rusqlite::params![table.as_str(), geom_column.as_str()],
    )?;
    Ok(())
}
