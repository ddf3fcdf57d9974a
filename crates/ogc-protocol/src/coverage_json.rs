//! CoverageJSON types for coverage responses.
//!
//! See: <https://covjson.org/>

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A CoverageJSON document containing gridded coverage data.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CoverageJson {
    /// Document type (always "Coverage").
    #[serde(rename = "type")]
    pub type_: String,

    pub domain: Domain,

    /// Parameter definitions keyed by measurement name.
    #[serde(default)]
    pub parameters: BTreeMap<String, CovJsonParameter>,

    /// Data ranges keyed by measurement name.
    #[serde(default)]
    pub ranges: BTreeMap<String, NdArray>,
}

impl CoverageJson {
    /// Create a coverage over the given domain, without parameters.
    pub fn new(domain: Domain) -> Self {
        Self {
            type_: "Coverage".to_string(),
            domain,
            parameters: BTreeMap::new(),
            ranges: BTreeMap::new(),
        }
    }

    /// Add a parameter with values that may include nulls.
    pub fn with_parameter(
        mut self,
        name: &str,
        param: CovJsonParameter,
        range: NdArray,
    ) -> Self {
        self.parameters.insert(name.to_string(), param);
        self.ranges.insert(name.to_string(), range);
        self
    }
}

/// The domain of a coverage.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Domain {
    /// Domain type (always "Domain").
    #[serde(rename = "type")]
    pub type_: String,

    #[serde(rename = "domainType")]
    pub domain_type: DomainType,

    pub axes: BTreeMap<String, Axis>,

    #[serde(default)]
    pub referencing: Vec<ReferenceSystemConnection>,
}

impl Domain {
    /// Create a grid domain from cell-centre coordinates and time stamps.
    pub fn grid(
        x_values: &[f64],
        y_values: &[f64],
        t_values: Vec<String>,
        crs: ReferenceSystem,
    ) -> Self {
        let mut axes = BTreeMap::new();
        axes.insert("x".to_string(), Axis::from_coords(x_values));
        axes.insert("y".to_string(), Axis::from_coords(y_values));

        let mut referencing = vec![ReferenceSystemConnection {
            coordinates: vec!["x".to_string(), "y".to_string()],
            system: crs,
        }];

        if !t_values.is_empty() {
            axes.insert(
                "t".to_string(),
                Axis::Values {
                    values: t_values.into_iter().map(AxisValue::String).collect(),
                },
            );
            referencing.push(ReferenceSystemConnection {
                coordinates: vec!["t".to_string()],
                system: ReferenceSystem::Temporal {
                    calendar: "Gregorian".to_string(),
                },
            });
        }

        Self {
            type_: "Domain".to_string(),
            domain_type: DomainType::Grid,
            axes,
            referencing,
        }
    }

    pub fn axis(&self, name: &str) -> Option<&Axis> {
        self.axes.get(name)
    }
}

/// Domain types supported by CoverageJSON.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum DomainType {
    Grid,
}

/// An axis in the domain.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum Axis {
    /// Regular axis defined by start, stop, and number of points.
    Regular { start: f64, stop: f64, num: usize },
    /// Explicit list of values.
    Values { values: Vec<AxisValue> },
}

impl Axis {
    /// Regular axis over evenly spaced coordinates; an explicit (possibly
    /// empty) list otherwise.
    pub fn from_coords(coords: &[f64]) -> Self {
        match coords {
            [first, .., last] => Axis::Regular {
                start: *first,
                stop: *last,
                num: coords.len(),
            },
            _ => Axis::Values {
                values: coords.iter().copied().map(AxisValue::Float).collect(),
            },
        }
    }

    /// Get the number of values in this axis.
    pub fn len(&self) -> usize {
        match self {
            Axis::Values { values } => values.len(),
            Axis::Regular { num, .. } => *num,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Numeric coordinates of the axis.
    pub fn coords(&self) -> Vec<f64> {
        match self {
            Axis::Regular { start, stop, num } => match *num {
                0 => Vec::new(),
                1 => vec![*start],
                n => {
                    let step = (stop - start) / (n - 1) as f64;
                    (0..n).map(|i| start + step * i as f64).collect()
                }
            },
            Axis::Values { values } => values
                .iter()
                .filter_map(|v| match v {
                    AxisValue::Float(f) => Some(*f),
                    AxisValue::String(_) => None,
                })
                .collect(),
        }
    }
}

/// A value on an axis.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum AxisValue {
    Float(f64),
    String(String),
}

/// Connection between axes and their reference system.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReferenceSystemConnection {
    pub coordinates: Vec<String>,
    pub system: ReferenceSystem,
}

/// Reference system definitions.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum ReferenceSystem {
    #[serde(rename = "GeographicCRS")]
    Geographic { id: String },

    #[serde(rename = "ProjectedCRS")]
    Projected { id: String },

    #[serde(rename = "TemporalRS")]
    Temporal { calendar: String },
}

/// A parameter in CoverageJSON format.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CovJsonParameter {
    /// Type (always "Parameter").
    #[serde(rename = "type")]
    pub type_: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<BTreeMap<String, String>>,

    #[serde(rename = "observedProperty")]
    pub observed_property: ObservedProperty,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<Unit>,
}

impl CovJsonParameter {
    pub fn new(id: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            type_: "Parameter".to_string(),
            description: None,
            observed_property: ObservedProperty {
                id: Some(id.clone()),
                label: english(&id),
            },
            unit: None,
        }
    }

    pub fn with_description(mut self, desc: &str) -> Self {
        self.description = Some(english(desc));
        self
    }

    pub fn with_unit_symbol(mut self, symbol: impl Into<String>) -> Self {
        self.unit = Some(Unit {
            symbol: symbol.into(),
        });
        self
    }
}

fn english(s: &str) -> BTreeMap<String, String> {
    BTreeMap::from([("en".to_string(), s.to_string())])
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ObservedProperty {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub label: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Unit {
    pub symbol: String,
}

/// N-dimensional array containing data values.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NdArray {
    /// Type (always "NdArray").
    #[serde(rename = "type")]
    pub type_: String,

    #[serde(rename = "dataType")]
    pub data_type: String,

    #[serde(rename = "axisNames")]
    pub axis_names: Vec<String>,

    pub shape: Vec<usize>,

    /// The data values (null for missing data).
    pub values: Vec<Option<f32>>,
}

impl NdArray {
    pub fn new(values: Vec<Option<f32>>, shape: Vec<usize>, axis_names: Vec<String>) -> Self {
        Self {
            type_: "NdArray".to_string(),
            data_type: "float".to_string(),
            axis_names,
            shape,
            values,
        }
    }
}
