//! Read-only view of the cube's products and datasets.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::crs::CrsParseError;
use crate::{BoundingBox, CrsCode, GeoTransform, TimeRange};

/// A band definition of a product.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Measurement {
    pub name: String,
    pub dtype: String,
    pub units: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nodata: Option<f64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub aliases: Vec<String>,
}

impl Measurement {
    pub fn new(name: impl Into<String>, dtype: impl Into<String>, units: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            dtype: dtype.into(),
            units: units.into(),
            nodata: None,
            aliases: Vec::new(),
        }
    }

    pub fn with_nodata(mut self, nodata: f64) -> Self {
        self.nodata = Some(nodata);
        self
    }

    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.aliases.push(alias.into());
        self
    }

    /// Matches the measurement name or any alias.
    pub fn answers_to(&self, name: &str) -> bool {
        self.name == name || self.aliases.iter().any(|a| a == name)
    }
}

/// A link attached to product metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductLink {
    pub href: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rel: Option<String>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub media_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hreflang: Option<String>,
}

/// A registered cube product.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub keywords: Vec<String>,
    /// Declared file format, e.g. `GeoTIFF`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    pub measurements: Vec<Measurement>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub load_crs: Option<CrsCode>,
    /// Declared load resolution `(x, y)`, signed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub load_resolution: Option<(f64, f64)>,
    /// Free-form metadata (platform, instrument, product_family, ...).
    #[serde(default)]
    pub properties: BTreeMap<String, serde_json::Value>,
    #[serde(default)]
    pub links: Vec<ProductLink>,
}

impl Product {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            keywords: Vec::new(),
            format: None,
            measurements: Vec::new(),
            load_crs: None,
            load_resolution: None,
            properties: BTreeMap::new(),
            links: Vec::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_keywords<I, S>(mut self, keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.keywords = keywords.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_format(mut self, format: impl Into<String>) -> Self {
        self.format = Some(format.into());
        self
    }

    pub fn with_measurement(mut self, measurement: Measurement) -> Self {
        self.measurements.push(measurement);
        self
    }

    pub fn with_property(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.properties.insert(key.into(), value);
        self
    }

    pub fn with_link(mut self, link: ProductLink) -> Self {
        self.links.push(link);
        self
    }

    /// Look up a measurement by name or alias.
    pub fn measurement(&self, name: &str) -> Option<&Measurement> {
        self.measurements.iter().find(|m| m.answers_to(name))
    }
}

/// One ingested granule of a product.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    pub id: Uuid,
    pub product: String,
    pub crs: CrsCode,
    pub transform: GeoTransform,
    pub width: usize,
    pub height: usize,
    pub time: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    /// Storage location per measurement name.
    #[serde(default)]
    pub locations: BTreeMap<String, String>,
}

impl Dataset {
    /// Footprint in the dataset's own CRS.
    pub fn bounds(&self) -> BoundingBox {
        self.transform.bounds(self.width, self.height)
    }

    pub fn resolution(&self) -> (f64, f64) {
        (self.transform.res_x, self.transform.res_y)
    }

    pub fn location(&self, measurement: &str) -> Option<&str> {
        self.locations.get(measurement).map(String::as_str)
    }
}

/// Aggregate spatial and temporal extent of a product.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductExtent {
    pub crs: CrsCode,
    pub bbox: Option<BoundingBox>,
    pub time: Option<TimeRange>,
    pub dataset_count: usize,
    /// Distinct `(x, y)` resolutions of the datasets, signed.
    pub resolutions: Vec<(f64, f64)>,
    /// Distinct dataset file formats.
    pub formats: Vec<String>,
    /// Distinct native CRSs of the datasets.
    #[serde(default)]
    pub source_crs: Vec<CrsCode>,
}

impl ProductExtent {
    /// Extent of a product without datasets.
    pub fn empty(crs: CrsCode) -> Self {
        Self {
            crs,
            bbox: None,
            time: None,
            dataset_count: 0,
            resolutions: Vec::new(),
            formats: Vec::new(),
            source_crs: Vec::new(),
        }
    }

    /// Aggregate the extent of a product from its datasets.
    ///
    /// When datasets disagree on CRS, every footprint is reprojected to CRS84
    /// and the extent is expressed in CRS84. Footprints that cannot be
    /// reprojected are left out of the bbox; the datasets still count.
    pub fn from_datasets(product: &str, fallback_crs: CrsCode, datasets: &[Dataset]) -> Self {
        let Some(first) = datasets.first() else {
            return Self::empty(fallback_crs);
        };

        let mut source_crs: Vec<CrsCode> = Vec::new();
        for crs in datasets.iter().map(|d| d.crs) {
            if !source_crs.contains(&crs) {
                source_crs.push(crs);
            }
        }

        let crs = if source_crs.len() > 1 {
            info!(
                product = %product,
                crs_count = source_crs.len(),
                "Product has datasets with varying CRS, reprojecting extent to CRS84"
            );
            CrsCode::Crs84
        } else {
            first.crs
        };

        let mut footprints = Vec::with_capacity(datasets.len());
        for dataset in datasets {
            match dataset.crs.transform_bbox(&crs, &dataset.bounds()) {
                Ok(bbox) => footprints.push(bbox),
                Err(e) => warn!(
                    product = %product,
                    dataset = %dataset.id,
                    error = %e,
                    "Leaving dataset footprint out of product extent"
                ),
            }
        }

        let time = datasets
            .iter()
            .map(|d| TimeRange::instant(d.time))
            .reduce(|a, b| a.union(&b));

        let mut resolutions: Vec<(f64, f64)> = Vec::new();
        for res in datasets.iter().map(Dataset::resolution) {
            if !resolutions.contains(&res) {
                resolutions.push(res);
            }
        }

        let mut formats: Vec<String> = datasets.iter().filter_map(|d| d.format.clone()).collect();
        formats.sort();
        formats.dedup();

        Self {
            crs,
            bbox: BoundingBox::union_all(footprints.iter()),
            time,
            dataset_count: datasets.len(),
            resolutions,
            formats,
            source_crs,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.dataset_count == 0 || self.bbox.is_none()
    }

    /// Spatial extent reprojected to CRS84.
    pub fn crs84_bbox(&self) -> Result<Option<BoundingBox>, CrsParseError> {
        self.bbox
            .map(|b| self.crs.transform_bbox(&CrsCode::Crs84, &b))
            .transpose()
    }

    /// The single dataset resolution, if all datasets agree.
    pub fn unique_resolution(&self) -> Option<(f64, f64)> {
        match self.resolutions.as_slice() {
            [res] => Some(*res),
            _ => None,
        }
    }

    /// Datasets disagree on CRS, so the extent was reprojected to CRS84.
    pub fn has_mixed_crs(&self) -> bool {
        self.source_crs.len() > 1
    }

    /// The single dataset format, if all datasets agree.
    pub fn unique_format(&self) -> Option<&str> {
        match self.formats.as_slice() {
            [format] => Some(format.as_str()),
            _ => None,
        }
    }
}
