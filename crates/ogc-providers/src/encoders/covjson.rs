//! CoverageJSON encoding of a loaded grid.

use bytes::Bytes;
use cube_common::{format_datetime, CrsCode, CubeError, CubeResult, GridArray};
use ogc_protocol::{CovJsonParameter, CoverageJson, Domain, NdArray, ReferenceSystem};

use super::valid_value;

/// Build the CoverageJSON document for a grid.
///
/// Ranges use `[t, y, x]` axes; an empty grid yields a domain with
/// zero-length axes and empty ranges.
pub fn to_coverage_json(array: &GridArray) -> CoverageJson {
    let times: Vec<String> = array.times.iter().map(format_datetime).collect();
    let domain = Domain::grid(
        &array.x_coords(),
        &array.y_coords(),
        times,
        reference_system(&array.crs()),
    );

    let shape = vec![array.times.len(), array.height(), array.width()];
    let axis_names = vec!["t".to_string(), "y".to_string(), "x".to_string()];

    array.variables.iter().fold(CoverageJson::new(domain), |cov, var| {
        let values = if array.is_empty() {
            Vec::new()
        } else {
            var.values
                .iter()
                .map(|v| valid_value(*v, var.nodata))
                .collect()
        };
        let shape = if array.is_empty() { vec![0, 0, 0] } else { shape.clone() };
        cov.with_parameter(
            &var.name,
            CovJsonParameter::new(&var.name).with_unit_symbol(&var.units),
            NdArray::new(values, shape, axis_names.clone()),
        )
    })
}

pub fn encode(array: &GridArray) -> CubeResult<Bytes> {
    serde_json::to_vec(&to_coverage_json(array))
        .map(Bytes::from)
        .map_err(|e| CubeError::EncodingError(format!("CoverageJSON serialization failed: {}", e)))
}

fn reference_system(crs: &CrsCode) -> ReferenceSystem {
    if crs.is_geographic() {
        ReferenceSystem::Geographic { id: crs.uri() }
    } else {
        ReferenceSystem::Projected { id: crs.uri() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use cube_common::{GeoTransform, GridSpec, Variable};

    fn array() -> GridArray {
        GridArray {
            grid: GridSpec::new(CrsCode::Crs84, GeoTransform::new(5.0, 10.0, 1.0, -1.0), 3, 2),
            times: vec![Utc.with_ymd_and_hms(2020, 6, 15, 0, 0, 0).unwrap()],
            variables: vec![Variable {
                name: "red".to_string(),
                units: "1".to_string(),
                dtype: "int16".to_string(),
                nodata: Some(-9999.0),
                values: vec![1.0, 2.0, -9999.0, 4.0, f32::NAN, 6.0],
            }],
        }
    }

    #[test]
    fn test_round_trip() {
        let bytes = encode(&array()).unwrap();
        let cov: CoverageJson = serde_json::from_slice(&bytes).unwrap();

        let x = cov.domain.axis("x").unwrap().coords();
        let y = cov.domain.axis("y").unwrap().coords();
        assert_eq!(x, vec![5.5, 6.5, 7.5]);
        assert_eq!(y, vec![9.5, 8.5]);

        let range = &cov.ranges["red"];
        assert_eq!(range.shape, vec![1, 2, 3]);
        assert_eq!(
            range.values,
            vec![Some(1.0), Some(2.0), None, Some(4.0), None, Some(6.0)]
        );
        assert_eq!(
            cov.parameters["red"].unit.as_ref().map(|u| u.symbol.as_str()),
            Some("1")
        );
        assert_eq!(cov.domain.axis("t").unwrap().len(), 1);
    }

    #[test]
    fn test_projected_reference() {
        let mut array = array();
        array.grid.crs = CrsCode::Utm { zone: 32, north: true };
        let json = serde_json::to_value(to_coverage_json(&array)).unwrap();
        assert_eq!(json["domain"]["referencing"][0]["system"]["type"], "ProjectedCRS");
        assert_eq!(
            json["domain"]["referencing"][0]["system"]["id"],
            "http://www.opengis.net/def/crs/EPSG/0/32632"
        );
    }

    #[test]
    fn test_empty_grid() {
        let empty = GridArray::empty(CrsCode::Crs84, array().variables);
        let cov = to_coverage_json(&empty);
        assert!(cov.domain.axis("x").unwrap().is_empty());
        assert!(cov.domain.axis("t").is_none());
        assert!(cov.ranges["red"].values.is_empty());
        assert_eq!(cov.ranges["red"].shape, vec![0, 0, 0]);
    }
}
