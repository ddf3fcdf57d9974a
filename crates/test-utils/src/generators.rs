//! Test data generators for rasters and datasets.
//!
//! These generators create predictable, verifiable values so tests can tell
//! which source cell ended up in which output cell.

use std::collections::BTreeMap;

use chrono::{DateTime, TimeZone, Utc};
use cube_catalog::Raster;
use cube_common::{CrsCode, Dataset, GeoTransform};
use uuid::Uuid;

/// Creates a test grid with predictable values.
///
/// Each cell value is calculated as: `base + col * 1000 + row`
///
/// # Example
///
/// ```
/// use test_utils::create_test_grid;
///
/// let grid = create_test_grid(10, 5, 0.0);
/// assert_eq!(grid.len(), 50);
/// assert_eq!(grid[1], 1000.0);  // col=1, row=0
/// assert_eq!(grid[10], 1.0);    // col=0, row=1
/// ```
pub fn create_test_grid(width: usize, height: usize, base: f32) -> Vec<f32> {
    let mut data = Vec::with_capacity(width * height);
    for row in 0..height {
        for col in 0..width {
            data.push(base + (col * 1000 + row) as f32);
        }
    }
    data
}

/// Expected value of [`create_test_grid`] at `(col, row)`.
pub fn test_grid_value(col: usize, row: usize, base: f32) -> f32 {
    base + (col * 1000 + row) as f32
}

pub fn create_constant_grid(width: usize, height: usize, value: f32) -> Vec<f32> {
    vec![value; width * height]
}

/// Creates a grid with `nodata` at the given `(col, row)` positions and
/// [`create_test_grid`] values elsewhere.
pub fn create_grid_with_nodata(
    width: usize,
    height: usize,
    nodata: f32,
    positions: &[(usize, usize)],
) -> Vec<f32> {
    let mut data = create_test_grid(width, height, 0.0);
    for &(col, row) in positions {
        if col < width && row < height {
            data[row * width + col] = nodata;
        }
    }
    data
}

/// A decoded raster over `transform`.
pub fn raster(transform: GeoTransform, width: usize, height: usize, values: Vec<f32>) -> Raster {
    Raster {
        width,
        height,
        transform,
        values,
        nodata: None,
    }
}

/// Midnight UTC of a calendar day.
pub fn utc(year: i32, month: u32, day: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(year, month, day, 0, 0, 0)
        .single()
        .unwrap_or_else(|| panic!("invalid test date {}-{}-{}", year, month, day))
}

/// A GeoTIFF dataset of `product` without file locations.
pub fn dataset(
    product: &str,
    crs: CrsCode,
    transform: GeoTransform,
    width: usize,
    height: usize,
    time: DateTime<Utc>,
) -> Dataset {
    Dataset {
        id: Uuid::new_v4(),
        product: product.to_string(),
        crs,
        transform,
        width,
        height,
        time,
        format: Some("GeoTIFF".to_string()),
        locations: BTreeMap::new(),
    }
}
