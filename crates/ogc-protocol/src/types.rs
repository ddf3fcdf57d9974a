//! Core OGC API types used across the API.

use cube_common::{format_datetime, BoundingBox, ProductLink, TimeRange, CRS84_URI};
use serde::{Deserialize, Serialize};

/// A hyperlink to a related resource.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Link {
    /// The URI of the linked resource.
    pub href: String,

    /// The relationship type (e.g., "self", "data", "conformance").
    pub rel: String,

    /// The media type of the linked resource.
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub type_: Option<String>,

    /// A human-readable title for the link.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    /// The language of the linked resource.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hreflang: Option<String>,
}

impl Link {
    /// Create a new link with required fields.
    pub fn new(href: impl Into<String>, rel: impl Into<String>) -> Self {
        Self {
            href: href.into(),
            rel: rel.into(),
            type_: None,
            title: None,
            hreflang: None,
        }
    }

    /// Set the media type.
    pub fn with_type(mut self, type_: impl Into<String>) -> Self {
        self.type_ = Some(type_.into());
        self
    }

    /// Set the title.
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }
}

impl From<&ProductLink> for Link {
    fn from(link: &ProductLink) -> Self {
        Self {
            href: link.href.clone(),
            rel: link.rel.clone().unwrap_or_else(|| "related".to_string()),
            type_: link.media_type.clone(),
            title: link.title.clone(),
            hreflang: link.hreflang.clone(),
        }
    }
}

/// The spatial and temporal extent of a collection.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct Extent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spatial: Option<SpatialExtent>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temporal: Option<TemporalExtent>,
}

impl Extent {
    /// Build an extent from a CRS84 bbox and an optional time range.
    pub fn from_parts(bbox: Option<&BoundingBox>, time: Option<&TimeRange>) -> Self {
        Self {
            spatial: bbox.map(|b| SpatialExtent {
                bbox: vec![b.to_array().to_vec()],
                crs: CRS84_URI.to_string(),
            }),
            temporal: time.map(|t| {
                TemporalExtent::new(Some(format_datetime(&t.start)), Some(format_datetime(&t.end)))
            }),
        }
    }
}

/// Spatial extent with bounding box.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SpatialExtent {
    /// Bounding boxes as [west, south, east, north] arrays.
    pub bbox: Vec<Vec<f64>>,

    #[serde(default = "default_crs")]
    pub crs: String,
}

fn default_crs() -> String {
    CRS84_URI.to_string()
}

/// Temporal extent with time intervals.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TemporalExtent {
    /// Time intervals as [start, end] pairs (ISO 8601); null is open-ended.
    pub interval: Vec<Vec<Option<String>>>,

    #[serde(default = "default_trs")]
    pub trs: String,
}

fn default_trs() -> String {
    "http://www.opengis.net/def/uom/ISO-8601/0/Gregorian".to_string()
}

impl TemporalExtent {
    pub fn new(start: Option<String>, end: Option<String>) -> Self {
        Self {
            interval: vec![vec![start, end]],
            trs: default_trs(),
        }
    }
}
