//! NetCDF-4 encoding of a loaded grid.
//!
//! libnetcdf only writes to paths, so the file is built in a named temporary
//! file that is removed when the handle drops.

use bytes::Bytes;
use cube_common::{CubeError, CubeResult, GridArray};
use tracing::debug;

const TIME_UNITS: &str = "seconds since 1970-01-01T00:00:00Z";

pub fn encode(array: &GridArray) -> CubeResult<Bytes> {
    if array.is_empty() {
        return Ok(Bytes::new());
    }

    let tmp = tempfile::Builder::new()
        .prefix("coverage-")
        .suffix(".nc")
        .tempfile()
        .map_err(|e| CubeError::EncodingError(format!("Failed to create temporary file: {}", e)))?;

    write_file(tmp.path(), array).map_err(nc_error)?;

    let bytes = std::fs::read(tmp.path())
        .map_err(|e| CubeError::EncodingError(format!("Failed to read NetCDF output: {}", e)))?;
    debug!(size = bytes.len(), "Encoded NetCDF");
    Ok(Bytes::from(bytes))
}

fn write_file(path: &std::path::Path, array: &GridArray) -> Result<(), netcdf::Error> {
    let crs = array.crs();
    let mut file = netcdf::create(path)?;

    file.add_attribute("Conventions", "CF-1.8")?;
    file.add_attribute("crs", crs.uri().as_str())?;

    file.add_dimension("time", array.times.len())?;
    file.add_dimension("y", array.height())?;
    file.add_dimension("x", array.width())?;

    let (x_name, y_name, x_units, y_units) = if crs.is_geographic() {
        ("longitude", "latitude", "degrees_east", "degrees_north")
    } else {
        ("projection_x_coordinate", "projection_y_coordinate", "m", "m")
    };

    let mut x = file.add_variable::<f64>("x", &["x"])?;
    x.put_attribute("standard_name", x_name)?;
    x.put_attribute("units", x_units)?;
    x.put_values(&array.x_coords(), ..)?;

    let mut y = file.add_variable::<f64>("y", &["y"])?;
    y.put_attribute("standard_name", y_name)?;
    y.put_attribute("units", y_units)?;
    y.put_values(&array.y_coords(), ..)?;

    let seconds: Vec<f64> = array.times.iter().map(|t| t.timestamp() as f64).collect();
    let mut time = file.add_variable::<f64>("time", &["time"])?;
    time.put_attribute("standard_name", "time")?;
    time.put_attribute("units", TIME_UNITS)?;
    time.put_attribute("calendar", "standard")?;
    time.put_values(&seconds, ..)?;

    for variable in &array.variables {
        let mut var = file.add_variable::<f32>(&variable.name, &["time", "y", "x"])?;
        if let Some(nodata) = variable.nodata {
            var.put_attribute("_FillValue", nodata as f32)?;
        }
        var.put_attribute("units", variable.units.as_str())?;
        var.put_attribute("source_dtype", variable.dtype.as_str())?;
        var.put_values(&variable.values, ..)?;
    }

    Ok(())
}

fn nc_error(e: netcdf::Error) -> CubeError {
    CubeError::EncodingError(format!("NetCDF encoding failed: {}", e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use cube_common::{CrsCode, GeoTransform, GridSpec, Variable};
    use std::io::Write;

    #[test]
    fn test_netcdf_dimensions() {
        let array = GridArray {
            grid: GridSpec::new(CrsCode::Crs84, GeoTransform::new(0.0, 2.0, 1.0, -1.0), 2, 2),
            times: vec![Utc.with_ymd_and_hms(2020, 6, 1, 0, 0, 0).unwrap()],
            variables: vec![Variable {
                name: "red".to_string(),
                units: "1".to_string(),
                dtype: "int16".to_string(),
                nodata: None,
                values: vec![1.0, 2.0, 3.0, 4.0],
            }],
        };
        let bytes = encode(&array).unwrap();
        assert!(!bytes.is_empty());

        let mut tmp = tempfile::Builder::new().suffix(".nc").tempfile().unwrap();
        tmp.write_all(&bytes).unwrap();
        tmp.flush().unwrap();

        let file = netcdf::open(tmp.path()).unwrap();
        assert_eq!(file.dimension("x").unwrap().len(), 2);
        assert_eq!(file.dimension("time").unwrap().len(), 1);
        let red = file.variable("red").unwrap();
        let values: Vec<f32> = red.get_values(..).unwrap();
        assert_eq!(values, vec![1.0, 2.0, 3.0, 4.0]);
    }
}
