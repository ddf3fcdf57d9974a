//! Coordinate Reference System identifiers and the handful of transforms
//! the cube products actually use.
//!
//! Geographic coordinates are always handled in lon/lat (x/y) order, the
//! way CRS84 defines them, regardless of the EPSG:4326 axis convention.

use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use std::fmt;

use crate::BoundingBox;

/// OGC URI for CRS84.
pub const CRS84_URI: &str = "http://www.opengis.net/def/crs/OGC/1.3/CRS84";

const WGS84_A: f64 = 6_378_137.0;
const WGS84: Ellipsoid = Ellipsoid {
    a: WGS84_A,
    f: 1.0 / 298.257_223_563,
};
const GRS80: Ellipsoid = Ellipsoid {
    a: 6_378_137.0,
    f: 1.0 / 298.257_222_101,
};
const UTM_K0: f64 = 0.9996;
const UTM_FALSE_EASTING: f64 = 500_000.0;
const UTM_FALSE_NORTHING_SOUTH: f64 = 10_000_000.0;
const WEB_MERCATOR_MAX_LAT: f64 = 85.051_128_779_806_59;

/// Samples per bbox edge when reprojecting extents.
const BBOX_DENSIFY_POINTS: usize = 21;

/// Coordinate reference systems known to the bridge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CrsCode {
    /// WGS84 geographic, lon/lat in degrees (CRS84, EPSG:4326).
    Crs84,
    /// Web Mercator (EPSG:3857), meters.
    WebMercator,
    /// WGS84 / UTM (EPSG:326zz north, 327zz south), meters.
    Utm { zone: u8, north: bool },
    /// GRS80 based UTM north zones (NAD83, NAD83(CSRS), ETRS89), meters.
    ///
    /// The datum shift to WGS84 is below a meter and ignored.
    Grs80Utm { epsg: u32, zone: u8 },
    /// Any other EPSG code. Carried through for metadata, not transformable.
    Epsg(u32),
}

impl CrsCode {
    /// Parse a CRS identifier.
    ///
    /// Accepts formats like:
    /// - "EPSG:4326", "epsg:32632"
    /// - "CRS:84", "OGC:CRS84"
    /// - "http://www.opengis.net/def/crs/OGC/1.3/CRS84"
    /// - "http://www.opengis.net/def/crs/EPSG/0/3857"
    /// - "urn:ogc:def:crs:EPSG::4326"
    pub fn parse(s: &str) -> Result<Self, CrsParseError> {
        let normalized = s.trim().to_lowercase();

        if matches!(
            normalized.as_str(),
            "crs:84" | "crs84" | "ogc:crs84" | "urn:ogc:def:crs:ogc:1.3:crs84"
        ) || (normalized.starts_with("http") && normalized.ends_with("/crs84"))
        {
            return Ok(CrsCode::Crs84);
        }

        let code = normalized
            .strip_prefix("epsg:")
            .or_else(|| normalized.strip_prefix("urn:ogc:def:crs:epsg::"))
            .or_else(|| {
                normalized
                    .find("/def/crs/epsg/")
                    .and_then(|idx| normalized[idx..].rsplit('/').next())
            })
            .ok_or_else(|| CrsParseError::UnsupportedCrs(s.to_string()))?;

        let code: u32 = code
            .parse()
            .map_err(|_| CrsParseError::UnsupportedCrs(s.to_string()))?;

        Ok(Self::from_epsg(code))
    }

    /// Map an EPSG code onto a known CRS.
    pub fn from_epsg(code: u32) -> Self {
        match code {
            4326 => CrsCode::Crs84,
            3857 | 900913 => CrsCode::WebMercator,
            32601..=32660 => CrsCode::Utm {
                zone: (code - 32600) as u8,
                north: true,
            },
            32701..=32760 => CrsCode::Utm {
                zone: (code - 32700) as u8,
                north: false,
            },
            other => match grs80_utm_zone(other) {
                Some(zone) => CrsCode::Grs80Utm { epsg: other, zone },
                None => CrsCode::Epsg(other),
            },
        }
    }

    /// EPSG code, treating CRS84 as 4326.
    pub fn epsg(&self) -> u32 {
        match self {
            CrsCode::Crs84 => 4326,
            CrsCode::WebMercator => 3857,
            CrsCode::Utm { zone, north: true } => 32600 + *zone as u32,
            CrsCode::Utm { zone, north: false } => 32700 + *zone as u32,
            CrsCode::Grs80Utm { epsg, .. } => *epsg,
            CrsCode::Epsg(code) => *code,
        }
    }

    /// Canonical OGC URI.
    pub fn uri(&self) -> String {
        match self {
            CrsCode::Crs84 => CRS84_URI.to_string(),
            other => format!("http://www.opengis.net/def/crs/EPSG/0/{}", other.epsg()),
        }
    }

    /// Check if this is a geographic (lon/lat) CRS.
    pub fn is_geographic(&self) -> bool {
        matches!(self, CrsCode::Crs84)
    }

    /// Unit label of the horizontal axes.
    pub fn units(&self) -> &'static str {
        if self.is_geographic() {
            "deg"
        } else {
            "m"
        }
    }

    /// Axis labels used in coverage descriptions.
    pub fn axis_labels(&self) -> (&'static str, &'static str) {
        if self.is_geographic() {
            ("Lon", "Lat")
        } else {
            ("x", "y")
        }
    }

    /// Convert a coordinate in this CRS to lon/lat degrees.
    pub fn to_lonlat(&self, x: f64, y: f64) -> Result<(f64, f64), CrsParseError> {
        match self {
            CrsCode::Crs84 => Ok((x, y)),
            CrsCode::WebMercator => {
                let lon = x / WGS84_A * 180.0 / PI;
                let lat = (2.0 * (y / WGS84_A).exp().atan() - PI / 2.0) * 180.0 / PI;
                Ok((lon, lat))
            }
            CrsCode::Utm { zone, north } => Ok(utm_inverse(x, y, *zone, *north, &WGS84)),
            CrsCode::Grs80Utm { zone, .. } => Ok(utm_inverse(x, y, *zone, true, &GRS80)),
            CrsCode::Epsg(code) => Err(CrsParseError::UnsupportedTransform(*code)),
        }
    }

    /// Convert lon/lat degrees to a coordinate in this CRS.
    pub fn from_lonlat(&self, lon: f64, lat: f64) -> Result<(f64, f64), CrsParseError> {
        match self {
            CrsCode::Crs84 => Ok((lon, lat)),
            CrsCode::WebMercator => {
                let lat = lat.clamp(-WEB_MERCATOR_MAX_LAT, WEB_MERCATOR_MAX_LAT);
                let x = WGS84_A * lon * PI / 180.0;
                let y = WGS84_A * (PI / 4.0 + lat * PI / 360.0).tan().ln();
                Ok((x, y))
            }
            CrsCode::Utm { zone, north } => Ok(utm_forward(lon, lat, *zone, *north, &WGS84)),
            CrsCode::Grs80Utm { zone, .. } => Ok(utm_forward(lon, lat, *zone, true, &GRS80)),
            CrsCode::Epsg(code) => Err(CrsParseError::UnsupportedTransform(*code)),
        }
    }

    /// Transform a single point from this CRS into `target`.
    pub fn transform_point(
        &self,
        target: &CrsCode,
        x: f64,
        y: f64,
    ) -> Result<(f64, f64), CrsParseError> {
        if self == target {
            return Ok((x, y));
        }
        let (lon, lat) = self.to_lonlat(x, y)?;
        target.from_lonlat(lon, lat)
    }

    /// Transform a bounding box from this CRS into `target`.
    ///
    /// The outline is densified before transforming so that curved edges
    /// are enclosed by the result.
    pub fn transform_bbox(
        &self,
        target: &CrsCode,
        bbox: &BoundingBox,
    ) -> Result<BoundingBox, CrsParseError> {
        if self == target {
            return Ok(*bbox);
        }

        let mut min_x = f64::INFINITY;
        let mut min_y = f64::INFINITY;
        let mut max_x = f64::NEG_INFINITY;
        let mut max_y = f64::NEG_INFINITY;

        for (x, y) in bbox.densified_outline(BBOX_DENSIFY_POINTS) {
            let (tx, ty) = self.transform_point(target, x, y)?;
            min_x = min_x.min(tx);
            min_y = min_y.min(ty);
            max_x = max_x.max(tx);
            max_y = max_y.max(ty);
        }

        Ok(BoundingBox::new(min_x, min_y, max_x, max_y))
    }
}

impl fmt::Display for CrsCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CrsCode::Crs84 => write!(f, "OGC:CRS84"),
            other => write!(f, "EPSG:{}", other.epsg()),
        }
    }
}

struct Ellipsoid {
    a: f64,
    f: f64,
}

impl Ellipsoid {
    fn e2(&self) -> f64 {
        self.f * (2.0 - self.f)
    }
}

/// UTM zone of a GRS80 based projected CRS.
fn grs80_utm_zone(code: u32) -> Option<u8> {
    let zone = match code {
        // NAD83 / UTM
        26901..=26923 => code - 26900,
        // ETRS89 / UTM
        25828..=25838 => code - 25800,
        // NAD83(CSRS) / UTM
        3154..=3157 => code - 3147,
        2955..=2957 => code - 2944,
        3158..=3160 => code - 3144,
        2958..=2962 => code - 2941,
        _ => return None,
    };
    u8::try_from(zone).ok()
}

fn utm_central_meridian(zone: u8) -> f64 {
    (zone as f64 - 1.0) * 6.0 - 180.0 + 3.0
}

fn utm_forward(lon: f64, lat: f64, zone: u8, north: bool, ellipsoid: &Ellipsoid) -> (f64, f64) {
    let e2 = ellipsoid.e2();
    let ep2 = e2 / (1.0 - e2);
    let phi = lat.to_radians();
    let lambda = lon.to_radians();
    let lambda0 = utm_central_meridian(zone).to_radians();

    let sin_phi = phi.sin();
    let cos_phi = phi.cos();
    let tan_phi = phi.tan();

    let n = ellipsoid.a / (1.0 - e2 * sin_phi * sin_phi).sqrt();
    let t = tan_phi * tan_phi;
    let c = ep2 * cos_phi * cos_phi;
    let a = (lambda - lambda0) * cos_phi;
    let m = meridian_arc(phi, ellipsoid);

    let x = UTM_K0
        * n
        * (a + (1.0 - t + c) * a.powi(3) / 6.0
            + (5.0 - 18.0 * t + t * t + 72.0 * c - 58.0 * ep2) * a.powi(5) / 120.0)
        + UTM_FALSE_EASTING;

    let mut y = UTM_K0
        * (m + n
            * tan_phi
            * (a * a / 2.0
                + (5.0 - t + 9.0 * c + 4.0 * c * c) * a.powi(4) / 24.0
                + (61.0 - 58.0 * t + t * t + 600.0 * c - 330.0 * ep2) * a.powi(6) / 720.0));

    if !north {
        y += UTM_FALSE_NORTHING_SOUTH;
    }

    (x, y)
}

fn utm_inverse(x: f64, y: f64, zone: u8, north: bool, ellipsoid: &Ellipsoid) -> (f64, f64) {
    let e2 = ellipsoid.e2();
    let ep2 = e2 / (1.0 - e2);
    let x = x - UTM_FALSE_EASTING;
    let y = if north { y } else { y - UTM_FALSE_NORTHING_SOUTH };

    let m = y / UTM_K0;
    let mu = m / (ellipsoid.a * (1.0 - e2 / 4.0 - 3.0 * e2 * e2 / 64.0 - 5.0 * e2.powi(3) / 256.0));
    let e1 = (1.0 - (1.0 - e2).sqrt()) / (1.0 + (1.0 - e2).sqrt());

    let phi1 = mu
        + (3.0 * e1 / 2.0 - 27.0 * e1.powi(3) / 32.0) * (2.0 * mu).sin()
        + (21.0 * e1 * e1 / 16.0 - 55.0 * e1.powi(4) / 32.0) * (4.0 * mu).sin()
        + (151.0 * e1.powi(3) / 96.0) * (6.0 * mu).sin()
        + (1097.0 * e1.powi(4) / 512.0) * (8.0 * mu).sin();

    let sin1 = phi1.sin();
    let cos1 = phi1.cos();
    let tan1 = phi1.tan();
    let n1 = ellipsoid.a / (1.0 - e2 * sin1 * sin1).sqrt();
    let t1 = tan1 * tan1;
    let c1 = ep2 * cos1 * cos1;
    let r1 = ellipsoid.a * (1.0 - e2) / (1.0 - e2 * sin1 * sin1).powf(1.5);
    let d = x / (n1 * UTM_K0);

    let phi = phi1
        - (n1 * tan1 / r1)
            * (d * d / 2.0
                - (5.0 + 3.0 * t1 + 10.0 * c1 - 4.0 * c1 * c1 - 9.0 * ep2) * d.powi(4) / 24.0
                + (61.0 + 90.0 * t1 + 298.0 * c1 + 45.0 * t1 * t1 - 252.0 * ep2 - 3.0 * c1 * c1)
                    * d.powi(6)
                    / 720.0);

    let lambda = (d - (1.0 + 2.0 * t1 + c1) * d.powi(3) / 6.0
        + (5.0 - 2.0 * c1 + 28.0 * t1 - 3.0 * c1 * c1 + 8.0 * ep2 + 24.0 * t1 * t1) * d.powi(5)
            / 120.0)
        / cos1;

    (
        utm_central_meridian(zone) + lambda.to_degrees(),
        phi.to_degrees(),
    )
}

fn meridian_arc(phi: f64, ellipsoid: &Ellipsoid) -> f64 {
    let e2 = ellipsoid.e2();
    let e4 = e2 * e2;
    let e6 = e4 * e2;
    ellipsoid.a
        * ((1.0 - e2 / 4.0 - 3.0 * e4 / 64.0 - 5.0 * e6 / 256.0) * phi
            - (3.0 * e2 / 8.0 + 3.0 * e4 / 32.0 + 45.0 * e6 / 1024.0) * (2.0 * phi).sin()
            + (15.0 * e4 / 256.0 + 45.0 * e6 / 1024.0) * (4.0 * phi).sin()
            - (35.0 * e6 / 3072.0) * (6.0 * phi).sin())
}

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum CrsParseError {
    #[error("Unsupported CRS: {0}")]
    UnsupportedCrs(String),

    #[error("No coordinate transform available for EPSG:{0}")]
    UnsupportedTransform(u32),
}
