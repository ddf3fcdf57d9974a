//! OGC API - Records response types.
//!
//! Each cube product is published as one record: a GeoJSON feature whose
//! geometry is the product footprint in CRS84.

use std::collections::BTreeMap;

use cube_common::{BoundingBox, Measurement};
use serde::{Deserialize, Serialize};

use crate::types::Link;

/// A page of records.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RecordCollection {
    /// Type identifier (always "FeatureCollection").
    #[serde(rename = "type")]
    pub type_: String,

    pub timestamp: String,

    #[serde(rename = "numberMatched")]
    pub number_matched: usize,

    #[serde(rename = "numberReturned")]
    pub number_returned: usize,

    pub features: Vec<Record>,

    #[serde(default)]
    pub links: Vec<Link>,
}

impl RecordCollection {
    pub fn new(features: Vec<Record>, number_matched: usize, timestamp: String) -> Self {
        Self {
            type_: "FeatureCollection".to_string(),
            timestamp,
            number_matched,
            number_returned: features.len(),
            features,
            links: Vec::new(),
        }
    }

    pub fn with_links(mut self, links: Vec<Link>) -> Self {
        self.links = links;
        self
    }

    /// The `next` link, if there are more results.
    pub fn next_link(&self) -> Option<&Link> {
        self.links.iter().find(|l| l.rel == "next")
    }
}

/// A single catalog record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Record {
    /// Type identifier (always "Feature").
    #[serde(rename = "type")]
    pub type_: String,

    pub id: String,

    pub geometry: Option<Geometry>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time: Option<RecordTime>,

    pub properties: RecordProperties,

    #[serde(default)]
    pub links: Vec<Link>,
}

impl Record {
    pub fn new(id: impl Into<String>, properties: RecordProperties) -> Self {
        Self {
            type_: "Feature".to_string(),
            id: id.into(),
            geometry: None,
            time: None,
            properties,
            links: Vec::new(),
        }
    }

    pub fn with_geometry(mut self, geometry: Geometry) -> Self {
        self.geometry = Some(geometry);
        self
    }

    pub fn with_time(mut self, start: Option<String>, end: Option<String>) -> Self {
        self.time = Some(RecordTime {
            interval: vec![start, end],
        });
        self
    }

    pub fn with_link(mut self, link: Link) -> Self {
        self.links.push(link);
        self
    }
}

/// GeoJSON geometry of a record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum Geometry {
    Polygon {
        /// Linear rings of `[lon, lat]` positions.
        coordinates: Vec<Vec<[f64; 2]>>,
    },
}

impl Geometry {
    /// Closed polygon covering a bounding box.
    pub fn from_bbox(bbox: &BoundingBox) -> Self {
        Geometry::Polygon {
            coordinates: vec![bbox.to_ring()],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RecordTime {
    pub interval: Vec<Option<String>>,
}

/// Record properties.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RecordProperties {
    /// Resource type (always "dataset").
    #[serde(rename = "type")]
    pub type_: String,

    pub title: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub keywords: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,

    #[serde(default)]
    pub measurements: Vec<Measurement>,

    /// Product metadata such as platform or instrument.
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl RecordProperties {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            type_: "dataset".to_string(),
            title: title.into(),
            description: None,
            keywords: Vec::new(),
            format: None,
            measurements: Vec::new(),
            extra: BTreeMap::new(),
        }
    }
}
