use crate::error::{GpkgError, Result};
use geo_traits::GeometryTrait;
use wkb::reader::Wkb;

const GPKG_HEADER_LEN: usize = 8;

/// Parsed fields of a GeoPackage binary geometry header.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct GpkgHeader {
    pub srs_id: i32,
    pub wkb_offset: usize,
}

// cf. https://www.geopackage.org/spec140/index.html#gpb_format
pub(crate) fn gpkg_header(b: &[u8]) -> Result<GpkgHeader> {
    if b.len() < GPKG_HEADER_LEN {
        return Err(GpkgError::InvalidGpkgGeometryLength {
            len: b.len(),
            minimum: GPKG_HEADER_LEN,
        });
    }
    if b[0] != 0x47 || b[1] != 0x50 {
        return Err(GpkgError::InvalidGpkgGeometryMagic);
    }

    let flags = b[3];
    let envelope_size: usize = match flags & 0b00001110 {
        0b00000000 => 0,  // no envelope
        0b00000010 => 32, // envelope is [minx, maxx, miny, maxy], 32 bytes
        0b00000100 => 48, // envelope is [minx, maxx, miny, maxy, minz, maxz], 48 bytes
        0b00000110 => 48, // envelope is [minx, maxx, miny, maxy, minm, maxm], 48 bytes
        0b00001000 => 64, // envelope is [minx, maxx, miny, maxy, minz, maxz, minm, maxm], 64 bytes
        _ => {
            return Err(GpkgError::InvalidGpkgGeometryFlags(flags));
        }
    };
    let wkb_offset = GPKG_HEADER_LEN + envelope_size;
    if b.len() < wkb_offset {
        return Err(GpkgError::InvalidGpkgGeometryLength {
            len: b.len(),
            minimum: wkb_offset,
        });
    }

    let srs_bytes = [b[4], b[5], b[6], b[7]];
    // bit 0 of flags is the byte order of the header: 1 = little endian
    let srs_id = if flags & 0b00000001 == 1 {
        i32::from_le_bytes(srs_bytes)
    } else {
        i32::from_be_bytes(srs_bytes)
    };

    Ok(GpkgHeader { srs_id, wkb_offset })
}

/// Strip GeoPackage header and envelope bytes to access raw WKB.
pub(crate) fn gpkg_geometry_to_wkb(b: &[u8]) -> Result<Wkb<'_>> {
    let header = gpkg_header(b)?;
    Ok(Wkb::try_new(&b[header.wkb_offset..])?)
}

// cf. https://www.geopackage.org/spec140/index.html#gpb_format
pub(crate) fn wkb_to_gpkg_geometry(wkb: &[u8], srs_id: i32) -> Vec<u8> {
    let mut geom = Vec::with_capacity(wkb.len() + GPKG_HEADER_LEN);
    geom.extend_from_slice(&[
        0x47u8, // magic
        0x50u8, // magic
        0x00u8, // version
        0x01u8, // flags (little endian SRS ID, no envelope)
    ]);
    geom.extend_from_slice(&srs_id.to_le_bytes());
    geom.extend_from_slice(wkb);
    geom
}

/// Encode any geometry as a GeoPackage binary blob.
pub(crate) fn geometry_to_gpkg<G: GeometryTrait<T = f64>>(
    geometry: &G,
    srs_id: i32,
) -> Result<Vec<u8>> {
    let mut wkb = Vec::new();
    wkb::writer::write_geometry(&mut wkb, geometry, &Default::default())?;
    Ok(wkb_to_gpkg_geometry(&wkb, srs_id))
}

#[cfg(test)]
mod tests {
    use super::{geometry_to_gpkg, gpkg_geometry_to_wkb, gpkg_header, wkb_to_gpkg_geometry};
    use crate::Result;
    use crate::error::GpkgError;
    use geo_types::Point;

    #[test]
    fn gpkg_geometry_keeps_wkb_and_srs() -> Result<()> {
        let point = Point::new(3.0, -1.0);
        let mut wkb = Vec::new();
        wkb::writer::write_geometry(&mut wkb, &point, &Default::default())?;
        let gpkg_blob = wkb_to_gpkg_geometry(&wkb, 5070);

        let recovered = gpkg_geometry_to_wkb(&gpkg_blob)?;
        assert_eq!(recovered.buf(), wkb.as_slice());
        assert_eq!(gpkg_header(&gpkg_blob)?.srs_id, 5070);
        Ok(())
    }

    #[test]
    fn big_endian_header_srs() -> Result<()> {
        let mut blob = geometry_to_gpkg(&Point::new(0.0, 0.0), 0)?;
        blob[3] = 0x00;
        blob[4..8].copy_from_slice(&4326_i32.to_be_bytes());
        assert_eq!(gpkg_header(&blob)?.srs_id, 4326);
        Ok(())
    }

    #[test]
    fn gpkg_geometry_rejects_invalid_flags() {
        let mut blob = vec![0x47, 0x50, 0x00, 0x0A, 0, 0, 0, 0];
        blob.extend_from_slice(&[0; 16]);
        let result = gpkg_geometry_to_wkb(&blob);
        assert!(matches!(result, Err(GpkgError::InvalidGpkgGeometryFlags(_))));
    }

    #[test]
    fn gpkg_geometry_rejects_short_and_foreign_blobs() {
        assert!(matches!(
            gpkg_header(&[0x47, 0x50, 0x00]),
            Err(GpkgError::InvalidGpkgGeometryLength { len: 3, minimum: 8 })
        ));
        // envelope flag set but no envelope bytes
        assert!(matches!(
            gpkg_header(&[0x47, 0x50, 0x00, 0x03, 0, 0, 0, 0]),
            Err(GpkgError::InvalidGpkgGeometryLength { minimum: 40, .. })
        ));
        assert!(matches!(
            gpkg_header(&[0x00, 0x01, 0x00, 0x01, 0, 0, 0, 0]),
            Err(GpkgError::InvalidGpkgGeometryMagic)
        ));
    }
}
