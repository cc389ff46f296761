/// A row of `gpkg_spatial_ref_sys`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SpatialRefSys {
    pub srs_name: String,
    pub srs_id: i32,
    pub organization: String,
    pub organization_coordsys_id: i32,
    pub definition: String,
    pub description: String,
}

struct EpsgEntry {
    code: u32,
    name: &'static str,
    definition: &'static str,
}

// gpkg_spatial_ref_sys requires the WKT of the SRS. Without spatialite there is
// no EPSG database to draw from, so only the systems the hydrofabric files
// use (plus the usual web ones) are carried here.
const EPSG_CATALOG: &[EpsgEntry] = &[
    EpsgEntry {
        code: 4326,
        name: "WGS 84",
        definition: r#"GEOGCS["WGS 84",DATUM["WGS_1984",SPHEROID["WGS 84",6378137,298.257223563,AUTHORITY["EPSG","7030"]],AUTHORITY["EPSG","6326"]],PRIMEM["Greenwich",0,AUTHORITY["EPSG","8901"]],UNIT["degree",0.0174532925199433,AUTHORITY["EPSG","9122"]],AXIS["Latitude",NORTH],AXIS["Longitude",EAST],AUTHORITY["EPSG","4326"]]"#,
    },
    EpsgEntry {
        code: 4269,
        name: "NAD83",
        definition: r#"GEOGCS["NAD83",DATUM["North_American_Datum_1983",SPHEROID["GRS 1980",6378137,298.257222101,AUTHORITY["EPSG","7019"]],AUTHORITY["EPSG","6269"]],PRIMEM["Greenwich",0,AUTHORITY["EPSG","8901"]],UNIT["degree",0.0174532925199433,AUTHORITY["EPSG","9122"]],AXIS["Latitude",NORTH],AXIS["Longitude",EAST],AUTHORITY["EPSG","4269"]]"#,
    },
    EpsgEntry {
        code: 5070,
        name: "NAD83 / Conus Albers",
        definition: r#"PROJCS["NAD83 / Conus Albers",GEOGCS["NAD83",DATUM["North_American_Datum_1983",SPHEROID["GRS 1980",6378137,298.257222101,AUTHORITY["EPSG","7019"]],AUTHORITY["EPSG","6269"]],PRIMEM["Greenwich",0,AUTHORITY["EPSG","8901"]],UNIT["degree",0.0174532925199433,AUTHORITY["EPSG","9122"]],AUTHORITY["EPSG","4269"]],PROJECTION["Albers_Conic_Equal_Area"],PARAMETER["latitude_of_center",23],PARAMETER["longitude_of_center",-96],PARAMETER["standard_parallel_1",29.5],PARAMETER["standard_parallel_2",45.5],PARAMETER["false_easting",0],PARAMETER["false_northing",0],UNIT["metre",1,AUTHORITY["EPSG","9001"]],AXIS["Easting",EAST],AXIS["Northing",NORTH],AUTHORITY["EPSG","5070"]]"#,
    },
    EpsgEntry {
        code: 3857,
        name: "WGS 84 / Pseudo-Mercator",
        definition: r#"PROJCS["WGS 84 / Pseudo-Mercator",GEOGCS["WGS 84",DATUM["WGS_1984",SPHEROID["WGS 84",6378137,298.257223563,AUTHORITY["EPSG","7030"]],AUTHORITY["EPSG","6326"]],PRIMEM["Greenwich",0,AUTHORITY["EPSG","8901"]],UNIT["degree",0.0174532925199433,AUTHORITY["EPSG","9122"]],AUTHORITY["EPSG","4326"]],PROJECTION["Mercator_1SP"],PARAMETER["central_meridian",0],PARAMETER["scale_factor",1],PARAMETER["false_easting",0],PARAMETER["false_northing",0],UNIT["metre",1,AUTHORITY["EPSG","9001"]],AXIS["Easting",EAST],AXIS["Northing",NORTH],EXTENSION["PROJ4","+proj=merc +a=6378137 +b=6378137 +lat_ts=0 +lon_0=0 +x_0=0 +y_0=0 +k=1 +units=m +nadgrids=@null +wktext +no_defs"],AUTHORITY["EPSG","3857"]]"#,
    },
];

impl SpatialRefSys {
    /// Look up an EPSG code in the built-in catalog.
    pub fn from_epsg(code: u32) -> Option<Self> {
        let entry = EPSG_CATALOG.iter().find(|e| e.code == code)?;
        let id = i32::try_from(entry.code).ok()?;
        Some(Self {
            srs_name: entry.name.to_string(),
            srs_id: id,
            organization: "EPSG".to_string(),
            organization_coordsys_id: id,
            definition: entry.definition.to_string(),
            description: format!("{} (EPSG:{})", entry.name, entry.code),
        })
    }
}
