//! Server configuration document.
//!
//! The document is YAML with top-level `server`, `metadata` and `resources`
//! sections. It is held as an order-preserving mapping so hand-authored
//! entries and unknown sections survive a read/write cycle untouched.

use chrono::{DateTime, Utc};
use cube_common::{CubeError, CubeResult, CRS84_URI};
use serde::{Deserialize, Serialize};
use serde_yaml::{Mapping, Value};

use crate::types::Link;

/// Provider name written into coverage bindings.
pub const COVERAGE_PROVIDER: &str = "cube_ogc.CoverageProvider";

/// Provider name written into record bindings.
pub const RECORDS_PROVIDER: &str = "cube_ogc.RecordsProvider";

/// Format used when neither product nor datasets declare one.
pub const DEFAULT_FORMAT: &str = "GeoTIFF";

const RESOURCES: &str = "resources";

/// A parsed configuration document.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ConfigDocument {
    root: Mapping,
}

impl ConfigDocument {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a YAML document. An empty document is an empty configuration.
    pub fn from_yaml_str(s: &str) -> CubeResult<Self> {
        let value: Value =
            serde_yaml::from_str(s).map_err(|e| CubeError::ConfigParseError(e.to_string()))?;

        let root = match value {
            Value::Null => Mapping::new(),
            Value::Mapping(m) => m,
            other => {
                return Err(CubeError::ConfigParseError(format!(
                    "top level must be a mapping, found {}",
                    value_kind(&other)
                )))
            }
        };

        match root.get(RESOURCES) {
            None | Some(Value::Null) | Some(Value::Mapping(_)) => {}
            Some(other) => {
                return Err(CubeError::ConfigParseError(format!(
                    "'resources' must be a mapping, found {}",
                    value_kind(other)
                )))
            }
        }

        Ok(Self { root })
    }

    pub fn to_yaml_string(&self) -> CubeResult<String> {
        serde_yaml::to_string(&self.root).map_err(|e| CubeError::Internal(e.to_string()))
    }

    /// The `resources` section, if any.
    pub fn resources(&self) -> Option<&Mapping> {
        self.root.get(RESOURCES).and_then(Value::as_mapping)
    }

    pub fn resource_keys(&self) -> Vec<String> {
        self.resources()
            .map(|r| r.keys().filter_map(|k| k.as_str().map(str::to_string)).collect())
            .unwrap_or_default()
    }

    pub fn contains_resource(&self, key: &str) -> bool {
        self.resources().is_some_and(|r| r.contains_key(key))
    }

    /// Raw YAML of one resource entry.
    pub fn resource_value(&self, key: &str) -> Option<&Value> {
        self.resources().and_then(|r| r.get(key))
    }

    /// Insert a resource unless the key is already taken.
    ///
    /// Returns `false` and leaves the existing entry untouched on collision.
    pub fn insert_resource_if_absent(
        &mut self,
        key: &str,
        descriptor: &ResourceDescriptor,
    ) -> CubeResult<bool> {
        if self.contains_resource(key) {
            return Ok(false);
        }
        let value =
            serde_yaml::to_value(descriptor).map_err(|e| CubeError::Internal(e.to_string()))?;

        if !matches!(self.root.get(RESOURCES), Some(Value::Mapping(_))) {
            self.root
                .insert(Value::from(RESOURCES), Value::Mapping(Mapping::new()));
        }
        if let Some(Value::Mapping(resources)) = self.root.get_mut(RESOURCES) {
            resources.insert(Value::from(key), value);
        }
        Ok(true)
    }

    /// Typed view of one resource entry.
    pub fn descriptor(&self, key: &str) -> Option<CubeResult<ResourceDescriptor>> {
        self.resource_value(key).map(|v| {
            serde_yaml::from_value(v.clone()).map_err(|e| {
                CubeError::ConfigParseError(format!("resource '{}': {}", key, e))
            })
        })
    }

    /// Typed view of every resource entry, in document order.
    pub fn descriptors(&self) -> Vec<(String, CubeResult<ResourceDescriptor>)> {
        self.resource_keys()
            .into_iter()
            .filter_map(|k| self.descriptor(&k).map(|d| (k, d)))
            .collect()
    }

    /// `server.url`, if configured.
    pub fn server_url(&self) -> Option<&str> {
        self.root
            .get("server")
            .and_then(|s| s.get("url"))
            .and_then(Value::as_str)
    }

    /// `metadata.identification.title`, if it is a plain string.
    pub fn title(&self) -> Option<&str> {
        self.identification("title")
    }

    /// `metadata.identification.description`, if it is a plain string.
    pub fn description(&self) -> Option<&str> {
        self.identification("description")
    }

    fn identification(&self, field: &str) -> Option<&str> {
        self.root
            .get("metadata")
            .and_then(|m| m.get("identification"))
            .and_then(|i| i.get(field))
            .and_then(Value::as_str)
    }
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Sequence(_) => "a sequence",
        Value::Mapping(_) => "a mapping",
        Value::Tagged(_) => "a tagged value",
    }
}

/// One `resources` entry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ResourceDescriptor {
    #[serde(rename = "type")]
    pub type_: String,

    pub title: String,

    #[serde(default)]
    pub description: String,

    #[serde(default)]
    pub keywords: Vec<String>,

    #[serde(default)]
    pub links: Vec<Link>,

    pub extents: ResourceExtents,

    pub providers: Vec<ProviderBinding>,
}

impl ResourceDescriptor {
    pub fn collection(title: impl Into<String>, extents: ResourceExtents) -> Self {
        Self {
            type_: "collection".to_string(),
            title: title.into(),
            description: String::new(),
            keywords: Vec::new(),
            links: Vec::new(),
            extents,
            providers: Vec::new(),
        }
    }

    pub fn with_provider(mut self, provider: ProviderBinding) -> Self {
        self.providers.push(provider);
        self
    }

    /// The coverage binding, if this resource serves coverages.
    pub fn coverage_provider(&self) -> Option<&ProviderBinding> {
        self.providers
            .iter()
            .find(|p| matches!(p, ProviderBinding::Coverage { .. }))
    }

    /// The record binding, if this resource serves catalog records.
    pub fn record_provider(&self) -> Option<&ProviderBinding> {
        self.providers
            .iter()
            .find(|p| matches!(p, ProviderBinding::Record { .. }))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ResourceExtents {
    pub spatial: ResourceSpatialExtent,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temporal: Option<ResourceTemporalExtent>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ResourceSpatialExtent {
    pub bbox: [f64; 4],

    #[serde(default = "default_crs")]
    pub crs: String,
}

impl ResourceSpatialExtent {
    pub fn crs84(bbox: [f64; 4]) -> Self {
        Self {
            bbox,
            crs: CRS84_URI.to_string(),
        }
    }
}

fn default_crs() -> String {
    CRS84_URI.to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ResourceTemporalExtent {
    #[serde(default)]
    pub begin: Option<DateTime<Utc>>,

    #[serde(default)]
    pub end: Option<DateTime<Utc>>,
}

/// Provider binding of a resource.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ProviderBinding {
    Coverage {
        name: String,
        /// Product name.
        data: String,
        format: FormatSpec,
    },
    Record {
        name: String,
        data: String,
    },
    /// Provider kinds this bridge does not serve (features, tiles, ...).
    #[serde(other)]
    Unsupported,
}

impl ProviderBinding {
    pub fn coverage(product: impl Into<String>, format: FormatSpec) -> Self {
        ProviderBinding::Coverage {
            name: COVERAGE_PROVIDER.to_string(),
            data: product.into(),
            format,
        }
    }

    pub fn record(data: impl Into<String>) -> Self {
        ProviderBinding::Record {
            name: RECORDS_PROVIDER.to_string(),
            data: data.into(),
        }
    }

    pub fn data(&self) -> Option<&str> {
        match self {
            ProviderBinding::Coverage { data, .. } | ProviderBinding::Record { data, .. } => {
                Some(data)
            }
            ProviderBinding::Unsupported => None,
        }
    }
}

/// Native format of a coverage.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FormatSpec {
    pub name: String,
    pub mimetype: String,
}

impl FormatSpec {
    /// Format with the mimetype `application/<lowercase name>`.
    pub fn from_name(name: impl Into<String>) -> Self {
        let name = name.into();
        let mimetype = format!("application/{}", name.to_lowercase());
        Self { name, mimetype }
    }
}
