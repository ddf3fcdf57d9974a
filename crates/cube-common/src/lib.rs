//! Shared domain model and utilities for the cube-ogc bridge.

pub mod bbox;
pub mod crs;
pub mod error;
pub mod grid;
pub mod model;
pub mod time;

pub use bbox::{BboxParseError, BoundingBox};
pub use crs::{CrsCode, CrsParseError, CRS84_URI};
pub use error::{CubeError, CubeResult};
pub use grid::{GeoTransform, GridArray, GridSpec, Variable};
pub use model::{Dataset, Measurement, Product, ProductExtent, ProductLink};
pub use time::{format_datetime, parse_iso8601, TimeFilter, TimeParseError, TimeRange};
