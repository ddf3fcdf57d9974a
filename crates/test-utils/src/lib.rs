//! Shared test utilities for the cube-ogc workspace.
//!
//! This crate provides common testing infrastructure including:
//! - Raster value generators with predictable patterns
//! - Dataset builders
//! - Pre-populated in-memory catalogs
//!
//! # Usage
//!
//! Add to your crate's `Cargo.toml`:
//!
//! ```toml
//! [dev-dependencies]
//! test-utils = { path = "../test-utils" }
//! ```
//!
//! Then import in your tests:
//!
//! ```ignore
//! use test_utils::{demo_catalog, DEMO_PRODUCT};
//! ```

pub mod fixtures;
pub mod generators;

// Re-export commonly used items at the crate root
pub use fixtures::*;
pub use generators::*;

/// Macro for approximate floating-point equality assertions.
///
/// # Usage
///
/// ```ignore
/// use test_utils::assert_approx_eq;
///
/// assert_approx_eq!(1.0001_f64, 1.0_f64, 0.001_f64); // passes
/// assert_approx_eq!(1.1_f32, 1.0_f32, 0.001_f32);    // fails
/// ```
#[macro_export]
macro_rules! assert_approx_eq {
    ($left:expr, $right:expr, $epsilon:expr) => {{
        let left: f64 = $left as f64;
        let right: f64 = $right as f64;
        let epsilon: f64 = $epsilon as f64;
        let diff = (left - right).abs();
        if diff > epsilon {
            panic!(
                "assertion failed: `(left ≈ right)`\n  left: `{:?}`,\n right: `{:?}`,\n  diff: `{:?}` > epsilon `{:?}`",
                left, right, diff, epsilon
            );
        }
    }};
}

/// Assert that `inner` lies within `outer`, up to `epsilon`.
///
/// ```ignore
/// assert_bbox_within!(result_bbox, BoundingBox::new(5.0, 5.0, 10.0, 10.0), 1e-9);
/// ```
#[macro_export]
macro_rules! assert_bbox_within {
    ($inner:expr, $outer:expr, $epsilon:expr) => {{
        let inner = $inner;
        let outer = $outer;
        let eps: f64 = $epsilon;
        if inner.min_x < outer.min_x - eps
            || inner.min_y < outer.min_y - eps
            || inner.max_x > outer.max_x + eps
            || inner.max_y > outer.max_y + eps
        {
            panic!("bbox {:?} is not within {:?}", inner, outer);
        }
    }};
}

#[cfg(test)]
mod tests {
    use cube_common::BoundingBox;

    #[test]
    fn test_assert_approx_eq_passes() {
        assert_approx_eq!(1.0001, 1.0, 0.001);
        assert_approx_eq!(0.0, 0.0, 0.0001);
        assert_approx_eq!(-5.5, -5.500001, 0.0001);
    }

    #[test]
    #[should_panic(expected = "assertion failed")]
    fn test_assert_approx_eq_fails() {
        assert_approx_eq!(1.1, 1.0, 0.001);
    }

    #[test]
    fn test_bbox_within() {
        assert_bbox_within!(
            BoundingBox::new(5.0, 5.0, 10.0, 10.0),
            BoundingBox::new(0.0, 0.0, 10.0, 10.0),
            1e-9
        );
    }

    #[test]
    #[should_panic(expected = "is not within")]
    fn test_bbox_not_within() {
        assert_bbox_within!(
            BoundingBox::new(5.0, 5.0, 15.0, 10.0),
            BoundingBox::new(0.0, 0.0, 10.0, 10.0),
            1e-9
        );
    }
}
