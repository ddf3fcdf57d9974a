//! Query parameter parsing for coverage and records endpoints.
//!
//! Parsing happens before any catalog access so malformed requests are
//! rejected without touching the backend.

use std::collections::{BTreeMap, HashMap};

use cube_common::{
    BboxParseError, BoundingBox, CrsCode, CrsParseError, CubeError, TimeFilter, TimeParseError,
};
use thiserror::Error;

/// Query parameters the records endpoint interprets itself; every other
/// parameter is treated as a property filter.
pub const RESERVED_RECORD_PARAMS: &[&str] = &[
    "bbox",
    "bbox-crs",
    "datetime",
    "q",
    "limit",
    "offset",
    "startindex",
    "f",
];

/// Records parameters from the optional OGC API conformance classes that
/// are not implemented.
pub const UNSUPPORTED_RECORD_PARAMS: &[&str] = &["sortby", "filter", "filter-lang", "filter-crs"];

/// Errors that can occur when parsing query parameters.
#[derive(Debug, Error, PartialEq)]
pub enum QueryParseError {
    #[error(transparent)]
    Bbox(#[from] BboxParseError),

    #[error(transparent)]
    Datetime(#[from] TimeParseError),

    #[error(transparent)]
    Crs(#[from] CrsParseError),

    #[error("Invalid value for '{param}': {value}")]
    InvalidValue { param: String, value: String },

    #[error("'{param}' cannot be combined with '{other}'")]
    Exclusive { param: String, other: String },

    #[error("Parameter '{param}' is not supported")]
    Unsupported { param: String },
}

impl QueryParseError {
    /// Name of the offending query parameter.
    pub fn param(&self) -> &str {
        match self {
            QueryParseError::Bbox(_) => "bbox",
            QueryParseError::Datetime(_) => "datetime",
            QueryParseError::Crs(_) => "bbox-crs",
            QueryParseError::InvalidValue { param, .. }
            | QueryParseError::Exclusive { param, .. }
            | QueryParseError::Unsupported { param } => param,
        }
    }
}

impl From<QueryParseError> for CubeError {
    fn from(err: QueryParseError) -> Self {
        match err {
            QueryParseError::Crs(e) => CubeError::UnsupportedCrs(e.to_string()),
            other => CubeError::invalid_parameter(other.param().to_string(), other.to_string()),
        }
    }
}

/// Validated coverage subset request.
#[derive(Debug, Clone, PartialEq)]
pub struct CoverageQuery {
    /// Requested bbox in `bbox_crs`; `None` means the full extent.
    pub bbox: Option<BoundingBox>,
    pub bbox_crs: CrsCode,
    /// Axis trims in the coverage's own CRS; never set together with `bbox`.
    pub subset: Option<SpatialSubset>,
    pub datetime: TimeFilter,
    /// Output format token; `None` means CoverageJSON.
    pub format: Option<String>,
    /// Requested measurements; `None` means all.
    pub measurements: Option<Vec<String>>,
}

impl Default for CoverageQuery {
    fn default() -> Self {
        Self {
            bbox: None,
            bbox_crs: CrsCode::Crs84,
            subset: None,
            datetime: TimeFilter::unbounded(),
            format: None,
            measurements: None,
        }
    }
}

impl CoverageQuery {
    /// Parse `bbox`, `bbox-crs`, `subset`, `datetime`, `f`,
    /// `properties`/`rangeSubset`.
    pub fn from_params(params: &HashMap<String, String>) -> Result<Self, QueryParseError> {
        let bbox = non_empty(params, "bbox")
            .map(BoundingBox::from_query_string)
            .transpose()?;

        let axes = non_empty(params, "subset")
            .map(parse_subset)
            .transpose()?
            .unwrap_or_default();
        let subset = axes.spatial();
        if subset.is_some() && bbox.is_some() {
            return Err(QueryParseError::Exclusive {
                param: "subset".to_string(),
                other: "bbox".to_string(),
            });
        }

        let bbox_crs = non_empty(params, "bbox-crs")
            .map(CrsCode::parse)
            .transpose()?
            .unwrap_or(CrsCode::Crs84);

        let datetime = match (non_empty(params, "datetime"), axes.time) {
            (Some(_), Some(_)) => {
                return Err(QueryParseError::Exclusive {
                    param: "subset".to_string(),
                    other: "datetime".to_string(),
                })
            }
            (Some(dt), None) => TimeFilter::parse(dt)?,
            (None, Some(time)) => time,
            (None, None) => TimeFilter::unbounded(),
        };

        let measurements = non_empty(params, "rangeSubset")
            .or_else(|| non_empty(params, "properties"))
            .map(parse_list)
            .filter(|list| !list.is_empty());

        Ok(Self {
            bbox,
            bbox_crs,
            subset,
            datetime,
            format: non_empty(params, "f").map(str::to_string),
            measurements,
        })
    }
}

/// Spatial axis trims of a `subset` parameter, `(low, high)` per axis.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SpatialSubset {
    pub x: Option<(f64, f64)>,
    pub y: Option<(f64, f64)>,
}

impl SpatialSubset {
    /// Trim `extent` along the subset axes; untouched axes keep the extent.
    pub fn apply(&self, extent: &BoundingBox) -> BoundingBox {
        let (min_x, max_x) = self.x.unwrap_or((extent.min_x, extent.max_x));
        let (min_y, max_y) = self.y.unwrap_or((extent.min_y, extent.max_y));
        BoundingBox::new(min_x, min_y, max_x, max_y)
    }
}

#[derive(Debug, Default)]
struct SubsetAxes {
    x: Option<(f64, f64)>,
    y: Option<(f64, f64)>,
    time: Option<TimeFilter>,
}

impl SubsetAxes {
    fn spatial(&self) -> Option<SpatialSubset> {
        (self.x.is_some() || self.y.is_some()).then_some(SpatialSubset {
            x: self.x,
            y: self.y,
        })
    }
}

/// Parse `Lon(5:6),Lat(5:6),time("2020-01-01":"2020-06-30")`.
///
/// Horizontal axes accept the geographic and projected labels; `*` leaves a
/// time bound open. A single value selects a slice.
fn parse_subset(value: &str) -> Result<SubsetAxes, QueryParseError> {
    let invalid = |detail: &str| QueryParseError::InvalidValue {
        param: "subset".to_string(),
        value: format!("{} ({})", value, detail),
    };

    let mut axes = SubsetAxes::default();
    for part in split_outside(value, ',') {
        let part = part.trim();
        let (label, rest) = part
            .split_once('(')
            .ok_or_else(|| invalid("expected axis(low:high)"))?;
        let body = rest
            .strip_suffix(')')
            .ok_or_else(|| invalid("missing closing parenthesis"))?;

        let bounds: Vec<String> = split_outside(body, ':')
            .iter()
            .map(|b| b.trim().trim_matches('"').to_string())
            .collect();
        let (low, high) = match bounds.as_slice() {
            [point] => (point.clone(), point.clone()),
            [low, high] => (low.clone(), high.clone()),
            _ => return Err(invalid("expected one or two bounds")),
        };

        match label.trim().to_ascii_lowercase().as_str() {
            "lon" | "long" | "longitude" | "x" | "e" | "easting" => {
                if axes.x.is_some() {
                    return Err(invalid("duplicate horizontal axis"));
                }
                axes.x = Some(numeric_interval(&low, &high).ok_or_else(|| invalid("bad x bounds"))?);
            }
            "lat" | "latitude" | "y" | "n" | "northing" => {
                if axes.y.is_some() {
                    return Err(invalid("duplicate vertical axis"));
                }
                axes.y = Some(numeric_interval(&low, &high).ok_or_else(|| invalid("bad y bounds"))?);
            }
            "time" | "t" | "date" => {
                if axes.time.is_some() {
                    return Err(invalid("duplicate time axis"));
                }
                let open = |b: &str| if b == "*" { "..".to_string() } else { b.to_string() };
                let filter = if low == high {
                    TimeFilter::parse(&low)?
                } else {
                    TimeFilter::parse(&format!("{}/{}", open(&low), open(&high)))?
                };
                axes.time = Some(filter);
            }
            _ => return Err(invalid("unknown axis")),
        }
    }
    Ok(axes)
}

/// `(low, high)` when both parse and `low <= high`.
fn numeric_interval(low: &str, high: &str) -> Option<(f64, f64)> {
    let low: f64 = low.parse().ok()?;
    let high: f64 = high.parse().ok()?;
    (low.is_finite() && high.is_finite() && low <= high).then_some((low, high))
}

/// Split on `sep` outside parentheses and double quotes.
fn split_outside(s: &str, sep: char) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut quoted = false;
    let mut start = 0;
    for (i, c) in s.char_indices() {
        match c {
            '"' => quoted = !quoted,
            '(' if !quoted => depth += 1,
            ')' if !quoted => depth = depth.saturating_sub(1),
            c if c == sep && depth == 0 && !quoted => {
                parts.push(&s[start..i]);
                start = i + c.len_utf8();
            }
            _ => {}
        }
    }
    parts.push(&s[start..]);
    parts
}

/// Validated records search request.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RecordQuery {
    /// Bbox filter in CRS84.
    pub bbox: Option<BoundingBox>,
    pub datetime: TimeFilter,
    /// Free-text terms, all of which must match.
    pub q: Vec<String>,
    /// Exact-match property filters.
    pub properties: BTreeMap<String, String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

impl RecordQuery {
    /// Parse `bbox` (with `bbox-crs`), `datetime`, `q`, `limit`, `offset`
    /// (or `startindex`); remaining parameters become property filters.
    pub fn from_params(params: &HashMap<String, String>) -> Result<Self, QueryParseError> {
        if let Some(param) = UNSUPPORTED_RECORD_PARAMS
            .iter()
            .find(|p| params.contains_key(**p))
        {
            return Err(QueryParseError::Unsupported {
                param: param.to_string(),
            });
        }

        let bbox_crs = non_empty(params, "bbox-crs")
            .map(CrsCode::parse)
            .transpose()?
            .unwrap_or(CrsCode::Crs84);
        let bbox = non_empty(params, "bbox")
            .map(BoundingBox::from_query_string)
            .transpose()?
            .map(|b| bbox_crs.transform_bbox(&CrsCode::Crs84, &b))
            .transpose()?;

        let datetime = non_empty(params, "datetime")
            .map(TimeFilter::parse)
            .transpose()?
            .unwrap_or_default();

        let q = non_empty(params, "q")
            .map(|s| {
                s.split([',', ' '])
                    .map(str::trim)
                    .filter(|t| !t.is_empty())
                    .map(str::to_lowercase)
                    .collect()
            })
            .unwrap_or_default();

        let properties = params
            .iter()
            .filter(|(k, _)| !RESERVED_RECORD_PARAMS.contains(&k.as_str()))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();

        Ok(Self {
            bbox,
            datetime,
            q,
            properties,
            limit: parse_int(params, "limit")?,
            offset: match parse_int(params, "offset")? {
                Some(offset) => Some(offset),
                None => parse_int(params, "startindex")?,
            },
        })
    }

    /// Query string carrying the filters, for paging links.
    pub fn to_query_pairs(&self) -> Vec<(String, String)> {
        let mut pairs = Vec::new();
        if let Some(bbox) = &self.bbox {
            pairs.push(("bbox".to_string(), bbox.to_query_string()));
        }
        if let Some(dt) = datetime_param(&self.datetime) {
            pairs.push(("datetime".to_string(), dt));
        }
        if !self.q.is_empty() {
            pairs.push(("q".to_string(), self.q.join(",")));
        }
        for (k, v) in &self.properties {
            pairs.push((k.clone(), v.clone()));
        }
        pairs
    }
}

fn datetime_param(filter: &TimeFilter) -> Option<String> {
    if filter.is_unbounded() {
        return None;
    }
    let bound = |t: Option<chrono::DateTime<chrono::Utc>>| {
        t.map(|t| cube_common::format_datetime(&t))
            .unwrap_or_else(|| "..".to_string())
    };
    Some(format!("{}/{}", bound(filter.start), bound(filter.end)))
}

fn non_empty<'a>(params: &'a HashMap<String, String>, key: &str) -> Option<&'a str> {
    params
        .get(key)
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
}

fn parse_int(params: &HashMap<String, String>, key: &str) -> Result<Option<i64>, QueryParseError> {
    non_empty(params, key)
        .map(|v| {
            v.parse::<i64>().map_err(|_| QueryParseError::InvalidValue {
                param: key.to_string(),
                value: v.to_string(),
            })
        })
        .transpose()
}

/// Parse a comma-separated list, dropping empty entries.
pub fn parse_list(s: &str) -> Vec<String> {
    s.split(',')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(str::to_string)
        .collect()
}

/// Percent-encode a query component.
pub fn encode_component(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for b in s.bytes() {
        match b {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' | b',' | b':' => {
                out.push(b as char)
            }
            _ => out.push_str(&format!("%{:02X}", b)),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_coverage_query_defaults() {
        let q = CoverageQuery::from_params(&HashMap::new()).unwrap();
        assert_eq!(q, CoverageQuery::default());
        assert_eq!(q.bbox_crs, CrsCode::Crs84);
    }

    #[test]
    fn test_coverage_query_full() {
        let q = CoverageQuery::from_params(&params(&[
            ("bbox", "5,5,15,15"),
            ("bbox-crs", "EPSG:3857"),
            ("datetime", "2020-06-01/2020-06-30"),
            ("f", "GTiff"),
            ("rangeSubset", "red, nir"),
        ]))
        .unwrap();
        assert_eq!(q.bbox, Some(BoundingBox::new(5.0, 5.0, 15.0, 15.0)));
        assert_eq!(q.bbox_crs, CrsCode::WebMercator);
        assert!(q.datetime.start.is_some());
        assert_eq!(q.format.as_deref(), Some("GTiff"));
        assert_eq!(q.measurements, Some(vec!["red".to_string(), "nir".to_string()]));
    }

    #[test]
    fn test_coverage_query_errors() {
        let err = CoverageQuery::from_params(&params(&[("bbox", "1,2,3")])).unwrap_err();
        assert_eq!(err.param(), "bbox");
        let cube: CubeError = err.into();
        assert_eq!(cube.http_status_code(), 400);

        let err = CoverageQuery::from_params(&params(&[("bbox-crs", "nonsense")])).unwrap_err();
        assert!(matches!(CubeError::from(err), CubeError::UnsupportedCrs(_)));

        assert!(CoverageQuery::from_params(&params(&[("datetime", "soon")])).is_err());
    }

    #[test]
    fn test_coverage_subset_axes() {
        let q = CoverageQuery::from_params(&params(&[("subset", "Lon(5:6), Lat(5.5:7)")])).unwrap();
        let subset = q.subset.unwrap();
        assert_eq!(subset.x, Some((5.0, 6.0)));
        assert_eq!(subset.y, Some((5.5, 7.0)));
        assert_eq!(q.bbox, None);
        assert_eq!(
            subset.apply(&BoundingBox::new(0.0, 0.0, 10.0, 10.0)),
            BoundingBox::new(5.0, 5.5, 6.0, 7.0)
        );

        let q = CoverageQuery::from_params(&params(&[("subset", "x(500000:510000)")])).unwrap();
        assert_eq!(
            q.subset.unwrap().apply(&BoundingBox::new(400_000.0, 0.0, 600_000.0, 100.0)),
            BoundingBox::new(500_000.0, 0.0, 510_000.0, 100.0)
        );
    }

    #[test]
    fn test_coverage_subset_time() {
        let q = CoverageQuery::from_params(&params(&[(
            "subset",
            r#"time("2020-06-01T00:00:00Z":"2020-06-30T00:00:00Z")"#,
        )]))
        .unwrap();
        assert!(q.subset.is_none());
        assert_eq!(q.datetime, TimeFilter::parse("2020-06-01T00:00:00Z/2020-06-30T00:00:00Z").unwrap());

        let q = CoverageQuery::from_params(&params(&[("subset", r#"time("2020-06-01":*)"#)])).unwrap();
        assert!(q.datetime.start.is_some());
        assert!(q.datetime.end.is_none());
    }

    #[test]
    fn test_coverage_subset_errors() {
        for value in ["Lon(6:5),Lat(0:1)", "Lon(a:b)", "Depth(0:1)", "Lon(0:1),Lon(2:3)", "Lon 0:1"] {
            let err = CoverageQuery::from_params(&params(&[("subset", value)])).unwrap_err();
            assert_eq!(err.param(), "subset", "{}", value);
            assert_eq!(CubeError::from(err).http_status_code(), 400);
        }

        let err = CoverageQuery::from_params(&params(&[
            ("subset", "Lon(5:6),Lat(5:6)"),
            ("bbox", "0,0,1,1"),
        ]))
        .unwrap_err();
        assert!(matches!(err, QueryParseError::Exclusive { ref other, .. } if other == "bbox"));

        let err = CoverageQuery::from_params(&params(&[
            ("subset", r#"time("2020-06-01")"#),
            ("datetime", "2020-06-01"),
        ]))
        .unwrap_err();
        assert!(matches!(err, QueryParseError::Exclusive { ref other, .. } if other == "datetime"));
    }

    #[test]
    fn test_record_query_filters_and_paging() {
        let q = RecordQuery::from_params(&params(&[
            ("q", "Landsat surface"),
            ("platform", "LANDSAT_8"),
            ("limit", "2"),
            ("startindex", "4"),
            ("f", "json"),
        ]))
        .unwrap();
        assert_eq!(q.q, vec!["landsat".to_string(), "surface".to_string()]);
        assert_eq!(q.properties.get("platform").map(String::as_str), Some("LANDSAT_8"));
        assert!(!q.properties.contains_key("f"));
        assert_eq!(q.limit, Some(2));
        assert_eq!(q.offset, Some(4));

        let err = RecordQuery::from_params(&params(&[("limit", "ten")])).unwrap_err();
        assert_eq!(err.param(), "limit");
    }

    #[test]
    fn test_record_query_reserved_and_unsupported() {
        let q = RecordQuery::from_params(&params(&[("bbox", "0,0,1,1"), ("bbox-crs", "CRS:84")])).unwrap();
        assert!(q.properties.is_empty());
        assert_eq!(q.bbox, Some(BoundingBox::new(0.0, 0.0, 1.0, 1.0)));

        let q = RecordQuery::from_params(&params(&[
            ("bbox", "0,0,111319.49,111325.14"),
            ("bbox-crs", "EPSG:3857"),
        ]))
        .unwrap();
        let bbox = q.bbox.unwrap();
        assert!((bbox.max_x - 1.0).abs() < 1e-3 && (bbox.max_y - 1.0).abs() < 1e-3);

        for param in ["sortby", "filter"] {
            let err = RecordQuery::from_params(&params(&[(param, "name")])).unwrap_err();
            assert_eq!(err.param(), param);
            assert_eq!(CubeError::from(err).http_status_code(), 400);
        }
    }

    #[test]
    fn test_record_query_pairs() {
        let q = RecordQuery::from_params(&params(&[
            ("bbox", "0,0,1,1"),
            ("datetime", "2020-01-01T00:00:00Z/.."),
        ]))
        .unwrap();
        let pairs = q.to_query_pairs();
        assert_eq!(pairs[0], ("bbox".to_string(), "0,0,1,1".to_string()));
        assert_eq!(
            pairs[1],
            ("datetime".to_string(), "2020-01-01T00:00:00Z/..".to_string())
        );
    }

    #[test]
    fn test_encode_component() {
        assert_eq!(encode_component("a b/c"), "a%20b%2Fc");
        assert_eq!(encode_component("0,0,1,1"), "0,0,1,1");
    }
}
