//! Raster grid definitions and the in-memory result of a data load.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{BoundingBox, CrsCode, TimeRange};

/// North-up affine transform of a raster grid.
///
/// `origin_x`/`origin_y` is the outer corner of pixel (0, 0). `res_y` is
/// negative for rows running north to south.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoTransform {
    pub origin_x: f64,
    pub origin_y: f64,
    pub res_x: f64,
    pub res_y: f64,
}

impl GeoTransform {
    pub fn new(origin_x: f64, origin_y: f64, res_x: f64, res_y: f64) -> Self {
        Self {
            origin_x,
            origin_y,
            res_x,
            res_y,
        }
    }

    /// Build from a six-element affine `[a, b, c, d, e, f]` as stored in
    /// dataset grid documents (`x = a*col + b*row + c`, `y = d*col + e*row + f`).
    ///
    /// Rotated grids are not supported.
    pub fn from_affine(affine: &[f64]) -> Option<Self> {
        match affine {
            [a, b, c, d, e, f, ..] if *b == 0.0 && *d == 0.0 && *a != 0.0 && *e != 0.0 => {
                Some(Self::new(*c, *f, *a, *e))
            }
            _ => None,
        }
    }

    /// Cell-centre coordinate of column `col`, row `row`.
    pub fn pixel_center(&self, col: usize, row: usize) -> (f64, f64) {
        (
            self.origin_x + (col as f64 + 0.5) * self.res_x,
            self.origin_y + (row as f64 + 0.5) * self.res_y,
        )
    }

    /// Fractional pixel position of a coordinate.
    pub fn to_pixel(&self, x: f64, y: f64) -> (f64, f64) {
        ((x - self.origin_x) / self.res_x, (y - self.origin_y) / self.res_y)
    }

    /// Outer bounds of a `width` x `height` raster on this transform.
    pub fn bounds(&self, width: usize, height: usize) -> BoundingBox {
        BoundingBox::from_points(
            (self.origin_x, self.origin_y),
            (
                self.origin_x + width as f64 * self.res_x,
                self.origin_y + height as f64 * self.res_y,
            ),
        )
    }
}

/// Target grid of a data load.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridSpec {
    pub crs: CrsCode,
    pub transform: GeoTransform,
    pub width: usize,
    pub height: usize,
}

impl GridSpec {
    pub fn new(crs: CrsCode, transform: GeoTransform, width: usize, height: usize) -> Self {
        Self {
            crs,
            transform,
            width,
            height,
        }
    }

    /// Largest grid inside `bbox` whose cells line up with the pixel lattice
    /// anchored at `anchor`.
    ///
    /// Cell edges are snapped inwards, so the grid bounds never extend past
    /// `bbox`. A bbox smaller than one cell yields an empty grid.
    pub fn aligned_within(
        crs: CrsCode,
        bbox: &BoundingBox,
        anchor: (f64, f64),
        res_x: f64,
        res_y: f64,
    ) -> Self {
        let rx = res_x.abs();
        let ry = res_y.abs();

        let min_x = snap_up(bbox.min_x, anchor.0, rx);
        let max_x = snap_down(bbox.max_x, anchor.0, rx);
        let min_y = snap_up(bbox.min_y, anchor.1, ry);
        let max_y = snap_down(bbox.max_y, anchor.1, ry);

        let width = cell_count(min_x, max_x, rx);
        let height = cell_count(min_y, max_y, ry);

        let origin_x = if res_x >= 0.0 { min_x } else { max_x };
        let origin_y = if res_y < 0.0 { max_y } else { min_y };

        Self::new(
            crs,
            GeoTransform::new(origin_x, origin_y, res_x, res_y),
            width,
            height,
        )
    }

    pub fn bounds(&self) -> BoundingBox {
        self.transform.bounds(self.width, self.height)
    }

    /// Cell-centre x coordinates, left to right in storage order.
    pub fn x_coords(&self) -> Vec<f64> {
        (0..self.width)
            .map(|col| self.transform.pixel_center(col, 0).0)
            .collect()
    }

    /// Cell-centre y coordinates, in row order.
    pub fn y_coords(&self) -> Vec<f64> {
        (0..self.height)
            .map(|row| self.transform.pixel_center(0, row).1)
            .collect()
    }

    pub fn cell_count(&self) -> u64 {
        self.width as u64 * self.height as u64
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

// Tolerance for floating point noise when snapping to the lattice.
const SNAP_EPSILON: f64 = 1e-9;

fn snap_up(value: f64, anchor: f64, res: f64) -> f64 {
    anchor + ((value - anchor) / res - SNAP_EPSILON).ceil() * res
}

fn snap_down(value: f64, anchor: f64, res: f64) -> f64 {
    anchor + ((value - anchor) / res + SNAP_EPSILON).floor() * res
}

fn cell_count(min: f64, max: f64, res: f64) -> usize {
    if max <= min {
        0
    } else {
        ((max - min) / res).round() as usize
    }
}

/// One loaded measurement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Variable {
    pub name: String,
    pub units: String,
    pub dtype: String,
    pub nodata: Option<f64>,
    /// Values in `[time][y][x]` order.
    pub values: Vec<f32>,
}

/// In-memory result of a data load.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridArray {
    pub grid: GridSpec,
    pub times: Vec<DateTime<Utc>>,
    pub variables: Vec<Variable>,
}

impl GridArray {
    /// An empty result over the given grid definition.
    pub fn empty(crs: CrsCode, variables: Vec<Variable>) -> Self {
        Self {
            grid: GridSpec::new(crs, GeoTransform::new(0.0, 0.0, 1.0, -1.0), 0, 0),
            times: Vec::new(),
            variables: variables
                .into_iter()
                .map(|v| Variable {
                    values: Vec::new(),
                    ..v
                })
                .collect(),
        }
    }

    pub fn crs(&self) -> CrsCode {
        self.grid.crs
    }

    pub fn width(&self) -> usize {
        self.grid.width
    }

    pub fn height(&self) -> usize {
        self.grid.height
    }

    pub fn x_coords(&self) -> Vec<f64> {
        self.grid.x_coords()
    }

    pub fn y_coords(&self) -> Vec<f64> {
        self.grid.y_coords()
    }

    pub fn is_empty(&self) -> bool {
        self.grid.is_empty() || self.times.is_empty()
    }

    /// Outer bounds of the loaded cells, `None` when empty.
    pub fn bounds(&self) -> Option<BoundingBox> {
        (!self.is_empty()).then(|| self.grid.bounds())
    }

    /// Span of the loaded time slices.
    pub fn time_range(&self) -> Option<TimeRange> {
        let start = self.times.iter().min()?;
        let end = self.times.iter().max()?;
        Some(TimeRange::new(*start, *end))
    }

    pub fn variable(&self, name: &str) -> Option<&Variable> {
        self.variables.iter().find(|v| v.name == name)
    }

    /// Values per time slice.
    pub fn slice_len(&self) -> usize {
        self.grid.width * self.grid.height
    }

    /// Value at `(t, row, col)` of a variable.
    pub fn value(&self, variable: &Variable, t: usize, row: usize, col: usize) -> Option<f32> {
        if row >= self.grid.height || col >= self.grid.width {
            return None;
        }
        variable
            .values
            .get(t * self.slice_len() + row * self.grid.width + col)
            .copied()
    }
}
