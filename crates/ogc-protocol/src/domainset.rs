//! CIS JSON domain set and range type descriptions (OGC API - Coverages).

use serde::{Deserialize, Serialize};

const INDEX_2D: &str = "http://www.opengis.net/def/crs/OGC/0/Index2D";

/// `/collections/{id}/coverage/domainset` response.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DomainSet {
    #[serde(rename = "type")]
    pub type_: String,

    #[serde(rename = "generalGrid")]
    pub general_grid: GeneralGrid,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GeneralGrid {
    #[serde(rename = "type")]
    pub type_: String,

    #[serde(rename = "srsName")]
    pub srs_name: String,

    #[serde(rename = "axisLabels")]
    pub axis_labels: Vec<String>,

    pub axis: Vec<RegularAxis>,

    #[serde(rename = "gridLimits")]
    pub grid_limits: GridLimits,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RegularAxis {
    #[serde(rename = "type")]
    pub type_: String,

    #[serde(rename = "axisLabel")]
    pub axis_label: String,

    #[serde(rename = "lowerBound")]
    pub lower_bound: serde_json::Value,

    #[serde(rename = "upperBound")]
    pub upper_bound: serde_json::Value,

    #[serde(rename = "uomLabel")]
    pub uom_label: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolution: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GridLimits {
    #[serde(rename = "type")]
    pub type_: String,

    #[serde(rename = "srsName")]
    pub srs_name: String,

    #[serde(rename = "axisLabels")]
    pub axis_labels: Vec<String>,

    pub axis: Vec<IndexAxis>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IndexAxis {
    #[serde(rename = "type")]
    pub type_: String,

    #[serde(rename = "axisLabel")]
    pub axis_label: String,

    #[serde(rename = "lowerBound")]
    pub lower_bound: usize,

    #[serde(rename = "upperBound")]
    pub upper_bound: usize,
}

/// Spatial axis description used to build a [`DomainSet`].
#[derive(Debug, Clone)]
pub struct AxisDescription {
    pub label: String,
    pub lower: f64,
    pub upper: f64,
    pub resolution: f64,
    pub cells: usize,
}

impl DomainSet {
    /// Build a domain set for a regular x/y grid with an optional time axis.
    pub fn new(
        srs_name: impl Into<String>,
        units: &str,
        x: AxisDescription,
        y: AxisDescription,
        time: Option<(String, String)>,
    ) -> Self {
        let mut axis_labels = vec![x.label.clone(), y.label.clone()];
        let grid_limits = GridLimits {
            type_: "GridLimitsType".to_string(),
            srs_name: INDEX_2D.to_string(),
            axis_labels: vec!["i".to_string(), "j".to_string()],
            axis: vec![
                IndexAxis {
                    type_: "IndexAxisType".to_string(),
                    axis_label: "i".to_string(),
                    lower_bound: 0,
                    upper_bound: x.cells,
                },
                IndexAxis {
                    type_: "IndexAxisType".to_string(),
                    axis_label: "j".to_string(),
                    lower_bound: 0,
                    upper_bound: y.cells,
                },
            ],
        };

        let mut axis = vec![regular_axis(x, units), regular_axis(y, units)];
        if let Some((begin, end)) = time {
            axis_labels.push("time".to_string());
            axis.push(RegularAxis {
                type_: "IrregularAxisType".to_string(),
                axis_label: "time".to_string(),
                lower_bound: serde_json::Value::String(begin),
                upper_bound: serde_json::Value::String(end),
                uom_label: "s".to_string(),
                resolution: None,
            });
        }

        Self {
            type_: "DomainSetType".to_string(),
            general_grid: GeneralGrid {
                type_: "GeneralGridCoverageType".to_string(),
                srs_name: srs_name.into(),
                axis_labels,
                axis,
                grid_limits,
            },
        }
    }
}

fn regular_axis(axis: AxisDescription, units: &str) -> RegularAxis {
    RegularAxis {
        type_: "RegularAxisType".to_string(),
        axis_label: axis.label,
        lower_bound: axis.lower.into(),
        upper_bound: axis.upper.into(),
        uom_label: units.to_string(),
        resolution: Some(axis.resolution),
    }
}

/// `/collections/{id}/coverage/rangetype` response.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RangeType {
    #[serde(rename = "type")]
    pub type_: String,

    pub field: Vec<RangeField>,
}

impl RangeType {
    pub fn new(field: Vec<RangeField>) -> Self {
        Self {
            type_: "DataRecordType".to_string(),
            field,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RangeField {
    /// 1-based band index.
    pub id: usize,

    #[serde(rename = "type")]
    pub type_: String,

    pub name: String,

    /// Data type of the band, e.g. `int16`.
    pub definition: String,

    pub nodata: Option<f64>,

    pub uom: UnitReference,

    #[serde(rename = "_meta")]
    pub meta: FieldMeta,
}

impl RangeField {
    pub fn quantity(
        id: usize,
        name: impl Into<String>,
        dtype: impl Into<String>,
        units: impl Into<String>,
        nodata: Option<f64>,
        aliases: Vec<String>,
    ) -> Self {
        Self {
            id,
            type_: "QuantityType".to_string(),
            name: name.into(),
            definition: dtype.into(),
            nodata,
            uom: UnitReference {
                type_: "UnitReference".to_string(),
                code: units.into(),
            },
            meta: FieldMeta {
                tags: FieldTags { aliases },
            },
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UnitReference {
    #[serde(rename = "type")]
    pub type_: String,
    pub code: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FieldMeta {
    pub tags: FieldTags,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FieldTags {
    #[serde(rename = "Aliases")]
    pub aliases: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_domainset_shape() {
        let ds = DomainSet::new(
            "http://www.opengis.net/def/crs/OGC/1.3/CRS84",
            "deg",
            AxisDescription {
                label: "Lon".into(),
                lower: 0.0,
                upper: 10.0,
                resolution: 0.5,
                cells: 20,
            },
            AxisDescription {
                label: "Lat".into(),
                lower: 0.0,
                upper: 5.0,
                resolution: -0.5,
                cells: 10,
            },
            Some(("2020-01-01T00:00:00Z".into(), "2020-12-31T00:00:00Z".into())),
        );

        let json = serde_json::to_value(&ds).unwrap();
        assert_eq!(json["type"], "DomainSetType");
        assert_eq!(json["generalGrid"]["axisLabels"][2], "time");
        assert_eq!(json["generalGrid"]["axis"][0]["upperBound"], 10.0);
        assert_eq!(json["generalGrid"]["axis"][1]["resolution"], -0.5);
        assert_eq!(json["generalGrid"]["gridLimits"]["axis"][0]["upperBound"], 20);
        assert_eq!(json["generalGrid"]["gridLimits"]["axis"][1]["upperBound"], 10);
    }

    #[test]
    fn test_rangetype_fields() {
        let rt = RangeType::new(vec![RangeField::quantity(
            1,
            "red",
            "int16",
            "1",
            Some(-999.0),
            vec!["band_4".into()],
        )]);
        let json = serde_json::to_value(&rt).unwrap();
        assert_eq!(json["type"], "DataRecordType");
        assert_eq!(json["field"][0]["type"], "QuantityType");
        assert_eq!(json["field"][0]["uom"]["code"], "1");
        assert_eq!(json["field"][0]["_meta"]["tags"]["Aliases"][0], "band_4");
    }
}
