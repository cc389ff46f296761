//! Rust implementations of the spatial SQL functions this crate relies on.
//!
//! These are registered by [`SpatialExtension::Builtin`](crate::SpatialExtension)
//! in place of the native spatialite module. Geometries are GeoPackage binary
//! blobs, so the output of `MakePoint` can be written straight into a
//! GeoPackage geometry column and read back by any GeoPackage client.

use crate::error::Result;
use crate::geometry::{
    geometry_to_gpkg, gpkg_geometry_to_wkb, gpkg_header, wkb_to_gpkg_geometry,
};
use geo_traits::{
    CoordTrait, GeometryCollectionTrait, GeometryTrait, LineStringTrait, MultiLineStringTrait,
    MultiPointTrait, MultiPolygonTrait, PointTrait, PolygonTrait,
};
use rusqlite::functions::{Context, FunctionFlags};
use rusqlite::types::{Type, ValueRef};
use rusqlite::{Connection, Error};
use wkb::reader::Wkb;

#[derive(Clone, Copy)]
struct Bounds {
    minx: f64,
    maxx: f64,
    miny: f64,
    maxy: f64,
}

/// Register all spatial SQL helper functions in the provided connection.
///
/// Example:
/// ```no_run
/// use rusqlite::Connection;
/// use gpkg_postprocess::register_spatial_functions;
///
/// let conn = Connection::open_in_memory()?;
/// register_spatial_functions(&conn)?;
/// let sql = "SELECT ST_SRID(MakePoint(1.0, 2.0, 4326))";
/// let srid: i64 = conn.query_row(sql, [], |row| row.get(0))?;
/// assert_eq!(srid, 4326);
/// # Ok::<(), gpkg_postprocess::GpkgError>(())
/// ```
pub fn register_spatial_functions(conn: &Connection) -> Result<()> {
    register_st_minx(conn)?;
    register_st_miny(conn)?;
    register_st_maxx(conn)?;
    register_st_maxy(conn)?;
    register_st_isempty(conn)?;
    register_st_x(conn)?;
    register_st_y(conn)?;
    register_st_srid(conn)?;
    register_make_point(conn)?;
    register_geom_from_wkb(conn)?;
    register_as_gpb(conn)?;
    Ok(())
}

pub(crate) fn register_st_minx(conn: &Connection) -> Result<()> {
    register_bounds_component(conn, "ST_MinX", |b| b.minx)
}

pub(crate) fn register_st_miny(conn: &Connection) -> Result<()> {
    register_bounds_component(conn, "ST_MinY", |b| b.miny)
}

pub(crate) fn register_st_maxx(conn: &Connection) -> Result<()> {
    register_bounds_component(conn, "ST_MaxX", |b| b.maxx)
}

pub(crate) fn register_st_maxy(conn: &Connection) -> Result<()> {
    register_bounds_component(conn, "ST_MaxY", |b| b.maxy)
}

pub(crate) fn register_st_isempty(conn: &Connection) -> Result<()> {
    conn.create_scalar_function(
        "ST_IsEmpty",
        1,
        FunctionFlags::SQLITE_DETERMINISTIC,
        |ctx| {
            let wkb = match wkb_from_ctx(ctx, 0)? {
                Some(wkb) => wkb,
                None => return Ok(None),
            };
            let is_empty = bounds_from_geometry(&wkb).is_none();
            Ok(Some(i64::from(is_empty)))
        },
    )?;
    Ok(())
}

pub(crate) fn register_st_x(conn: &Connection) -> Result<()> {
    register_point_component(conn, "ST_X", |x, _| x)
}

pub(crate) fn register_st_y(conn: &Connection) -> Result<()> {
    register_point_component(conn, "ST_Y", |_, y| y)
}

pub(crate) fn register_st_srid(conn: &Connection) -> Result<()> {
    conn.create_scalar_function("ST_SRID", 1, FunctionFlags::SQLITE_DETERMINISTIC, |ctx| {
        match ctx.get_raw(0) {
            ValueRef::Null => Ok(None),
            ValueRef::Blob(blob) => {
                let header = gpkg_header(blob)
                    .map_err(|err| Error::UserFunctionError(Box::new(err)))?;
                Ok(Some(i64::from(header.srs_id)))
            }
            _ => Err(Error::InvalidFunctionParameterType(0, Type::Blob)),
        }
    })?;
    Ok(())
}

/// `MakePoint(x, y)` and `MakePoint(x, y, srid)`.
///
/// A NULL coordinate yields NULL. A missing or NULL srid is 0, the
/// undefined geographic SRS.
pub(crate) fn register_make_point(conn: &Connection) -> Result<()> {
    for n_arg in [2, 3] {
        conn.create_scalar_function(
            "MakePoint",
            n_arg,
            FunctionFlags::SQLITE_DETERMINISTIC,
            |ctx| {
                let x = ctx.get::<Option<f64>>(0)?;
                let y = ctx.get::<Option<f64>>(1)?;
                let srs_id = if ctx.len() > 2 {
                    ctx.get::<Option<i32>>(2)?.unwrap_or(0)
                } else {
                    0
                };
                let (Some(x), Some(y)) = (x, y) else {
                    return Ok(None);
                };
                let blob = geometry_to_gpkg(&geo_types::Point::new(x, y), srs_id)
                    .map_err(|err| Error::UserFunctionError(Box::new(err)))?;
                Ok(Some(blob))
            },
        )?;
    }
    Ok(())
}

/// `GeomFromWKB(wkb, srid)`: wrap raw WKB into a GeoPackage blob.
pub(crate) fn register_geom_from_wkb(conn: &Connection) -> Result<()> {
    conn.create_scalar_function(
        "GeomFromWKB",
        2,
        FunctionFlags::SQLITE_DETERMINISTIC,
        |ctx| {
            let srs_id = ctx.get::<Option<i32>>(1)?.unwrap_or(0);
            match ctx.get_raw(0) {
                ValueRef::Null => Ok(None),
                ValueRef::Blob(blob) => {
                    Wkb::try_new(blob)
                        .map_err(|err| Error::UserFunctionError(Box::new(err)))?;
                    Ok(Some(wkb_to_gpkg_geometry(blob, srs_id)))
                }
                _ => Err(Error::InvalidFunctionParameterType(0, Type::Blob)),
            }
        },
    )?;
    Ok(())
}

/// `AsGPB(geom)`: geometries are already GeoPackage blobs, so this only
/// validates its input.
pub(crate) fn register_as_gpb(conn: &Connection) -> Result<()> {
    conn.create_scalar_function("AsGPB", 1, FunctionFlags::SQLITE_DETERMINISTIC, |ctx| {
        let blob = match ctx.get_raw(0) {
            ValueRef::Null => return Ok(None),
            ValueRef::Blob(blob) => blob,
            _ => return Err(Error::InvalidFunctionParameterType(0, Type::Blob)),
        };
        gpkg_geometry_to_wkb(blob)
            .map_err(|err| Error::UserFunctionError(Box::new(err)))?;
        Ok(Some(blob.to_vec()))
    })?;
    Ok(())
}

fn register_bounds_component<F>(conn: &Connection, name: &str, f: F) -> Result<()>
where
    F: Fn(Bounds) -> f64 + Copy + Send + Sync + 'static,
{
    conn.create_scalar_function(name, 1, FunctionFlags::SQLITE_DETERMINISTIC, move |ctx| {
        let wkb = match wkb_from_ctx(ctx, 0)? {
            Some(wkb) => wkb,
            None => return Ok(None),
        };
        Ok(bounds_from_geometry(&wkb).map(f))
    })?;
    Ok(())
}

fn register_point_component<F>(conn: &Connection, name: &str, f: F) -> Result<()>
where
    F: Fn(f64, f64) -> f64 + Copy + Send + Sync + 'static,
{
    conn.create_scalar_function(name, 1, FunctionFlags::SQLITE_DETERMINISTIC, move |ctx| {
        let wkb = match wkb_from_ctx(ctx, 0)? {
            Some(wkb) => wkb,
            None => return Ok(None),
        };
        // NULL for anything but a non-empty point
        let value = match wkb.as_type() {
            geo_traits::GeometryType::Point(point) => point.coord().map(|c| {
                let (x, y) = c.x_y();
                f(x, y)
            }),
            _ => None,
        };
        Ok(value)
    })?;
    Ok(())
}

fn wkb_from_ctx<'a>(
    ctx: &'a Context<'a>,
    idx: usize,
) -> std::result::Result<Option<Wkb<'a>>, Error> {
    let value = ctx.get_raw(idx);
    match value {
        ValueRef::Null => Ok(None),
        ValueRef::Blob(blob) => {
            let wkb = gpkg_geometry_to_wkb(blob)
                .map_err(|err| Error::UserFunctionError(Box::new(err)))?;
            Ok(Some(wkb))
        }
        _ => Err(Error::InvalidFunctionParameterType(idx, Type::Blob)),
    }
}

fn bounds_from_geometry<G: GeometryTrait<T = f64>>(geom: &G) -> Option<Bounds> {
    use geo_traits::GeometryType as GeoType;

    let mut bounds: Option<Bounds> = None;
    match geom.as_type() {
        GeoType::Point(point) => {
            if let Some(coord) = point.coord() {
                add_coord(&mut bounds, &coord);
            }
        }
        GeoType::LineString(line) => {
            add_line_string(&mut bounds, line);
        }
        GeoType::Polygon(poly) => {
            if let Some(ring) = poly.exterior() {
                add_line_string(&mut bounds, &ring);
            }
            for ring in poly.interiors() {
                add_line_string(&mut bounds, &ring);
            }
        }
        GeoType::MultiPoint(multi) => {
            for point in multi.points() {
                if let Some(coord) = point.coord() {
                    add_coord(&mut bounds, &coord);
                }
            }
        }
        GeoType::MultiLineString(multi) => {
            for line in multi.line_strings() {
                add_line_string(&mut bounds, &line);
            }
        }
        GeoType::MultiPolygon(multi) => {
            for poly in multi.polygons() {
                if let Some(ring) = poly.exterior() {
                    add_line_string(&mut bounds, &ring);
                }
                for ring in poly.interiors() {
                    add_line_string(&mut bounds, &ring);
                }
            }
        }
        GeoType::GeometryCollection(collection) => {
            for sub_geom in collection.geometries() {
                if let Some(sub_bounds) = bounds_from_geometry(&sub_geom) {
                    merge_bounds(&mut bounds, sub_bounds);
                }
            }
        }
        // WKB never decodes to these.
        GeoType::Rect(_) | GeoType::Triangle(_) | GeoType::Line(_) => {}
    }

    bounds
}

fn add_line_string<L: LineStringTrait<T = f64>>(bounds: &mut Option<Bounds>, line: &L) {
    for coord in line.coords() {
        add_coord(bounds, &coord);
    }
}

fn add_coord<C: CoordTrait<T = f64>>(bounds: &mut Option<Bounds>, coord: &C) {
    let (x, y) = coord.x_y();
    merge_bounds(
        bounds,
        Bounds {
            minx: x,
            maxx: x,
            miny: y,
            maxy: y,
        },
    );
}

fn merge_bounds(bounds: &mut Option<Bounds>, other: Bounds) {
    match bounds {
        Some(existing) => {
            existing.minx = existing.minx.min(other.minx);
            existing.maxx = existing.maxx.max(other.maxx);
            existing.miny = existing.miny.min(other.miny);
            existing.maxy = existing.maxy.max(other.maxy);
        }
        None => *bounds = Some(other),
    }
}

#[cfg(test)]
mod tests {
    use super::register_spatial_functions;
    use crate::geometry::geometry_to_gpkg;
    use geo_types::{Geometry, GeometryCollection, LineString, MultiPoint, Point};
    use rusqlite::{Connection, params};

    fn conn() -> crate::Result<Connection> {
        let conn = Connection::open_in_memory()?;
        register_spatial_functions(&conn)?;
        Ok(conn)
    }

    #[test]
    fn st_bounds_for_point() -> crate::Result<()> {
        let conn = conn()?;
        let blob = geometry_to_gpkg(&Point::new(1.5, -2.0), 4326)?;

        let (minx, maxx, miny, maxy, empty): (f64, f64, f64, f64, i64) = conn.query_row(
            "SELECT ST_MinX(?1), ST_MaxX(?1), ST_MinY(?1), ST_MaxY(?1), ST_IsEmpty(?1)",
            params![blob],
            |row| {
                Ok((
                    row.get(0)?,
                    row.get(1)?,
                    row.get(2)?,
                    row.get(3)?,
                    row.get(4)?,
                ))
            },
        )?;

        assert_eq!((minx, maxx, miny, maxy), (1.5, 1.5, -2.0, -2.0));
        assert_eq!(empty, 0);
        Ok(())
    }

    #[test]
    fn st_is_empty_for_empty_linestring() -> crate::Result<()> {
        let conn = conn()?;
        let line: LineString<f64> = LineString::new(Vec::new());
        let blob = geometry_to_gpkg(&line, 4326)?;

        let (minx, empty): (Option<f64>, i64) =
            conn.query_row("SELECT ST_MinX(?1), ST_IsEmpty(?1)", params![blob], |row| {
                Ok((row.get(0)?, row.get(1)?))
            })?;

        assert!(minx.is_none());
        assert_eq!(empty, 1);
        Ok(())
    }

    #[test]
    fn st_bounds_for_geometry_collection() -> crate::Result<()> {
        let conn = conn()?;
        let point = Geometry::Point(Point::new(5.0, -1.0));
        let line = Geometry::LineString(LineString::from(vec![(-2.0, 2.0), (1.0, 3.0)]));
        let mp = Geometry::MultiPoint(MultiPoint::from(vec![Point::new(0.0, 7.0)]));
        let collection = GeometryCollection::from(vec![point, line, mp]);
        let blob = geometry_to_gpkg(&collection, 4326)?;

        let bounds: (f64, f64, f64, f64) = conn.query_row(
            "SELECT ST_MinX(?1), ST_MaxX(?1), ST_MinY(?1), ST_MaxY(?1)",
            params![blob],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)),
        )?;

        assert_eq!(bounds, (-2.0, 5.0, -1.0, 7.0));
        Ok(())
    }

    #[test]
    fn make_point_with_srid() -> crate::Result<()> {
        let conn = conn()?;
        let (x, y, srid): (f64, f64, i64) = conn.query_row(
            "SELECT ST_X(g), ST_Y(g), ST_SRID(g) FROM (SELECT MakePoint(?1, ?2, 5070) AS g)",
            params![-1_234_567.5, 2_000_000.25],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
        )?;
        assert_eq!((x, y, srid), (-1_234_567.5, 2_000_000.25, 5070));

        // integer coordinates and the two argument form
        let srid: i64 =
            conn.query_row("SELECT ST_SRID(MakePoint(1, 2))", [], |row| row.get(0))?;
        assert_eq!(srid, 0);
        Ok(())
    }

    #[test]
    fn make_point_null_coordinate_is_null() -> crate::Result<()> {
        let conn = conn()?;
        let geom: Option<Vec<u8>> =
            conn.query_row("SELECT MakePoint(NULL, 2.0, 4326)", [], |row| row.get(0))?;
        assert!(geom.is_none());
        Ok(())
    }

    #[test]
    fn st_x_of_non_point_is_null() -> crate::Result<()> {
        let conn = conn()?;
        let line = LineString::from(vec![(0.0, 0.0), (1.0, 1.0)]);
        let blob = geometry_to_gpkg(&line, 4326)?;
        let x: Option<f64> =
            conn.query_row("SELECT ST_X(?1)", params![blob], |row| row.get(0))?;
        assert!(x.is_none());
        Ok(())
    }

    #[test]
    fn geom_from_wkb_then_as_gpb() -> crate::Result<()> {
        let conn = conn()?;
        let mut wkb = Vec::new();
        wkb::writer::write_geometry(
            &mut wkb,
            &Point::new(10.0, 20.0),
            &Default::default(),
        )?;

        let (x, srid): (f64, i64) = conn.query_row(
            "SELECT ST_X(g), ST_SRID(g) FROM (SELECT AsGPB(GeomFromWKB(?1, 4269)) AS g)",
            params![wkb],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;
        assert_eq!((x, srid), (10.0, 4269));
        Ok(())
    }

    #[test]
    fn rejects_garbage_blob() -> crate::Result<()> {
        let conn = conn()?;
        let result: rusqlite::Result<f64> =
            conn.query_row("SELECT ST_MinX(x'00010203')", [], |row| row.get(0));
        assert!(result.is_err());
        Ok(())
    }
}
