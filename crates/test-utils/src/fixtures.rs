//! Pre-populated catalogs for provider and service tests.
//!
//! The demo catalog holds one product covering `[0, 0, 10, 10]` in CRS84 at
//! 0.5 degree resolution with acquisitions on 2020-01-01, 2020-06-15 and
//! 2020-12-31, plus one product without datasets.

use cube_catalog::MemoryCatalog;
use cube_common::{CrsCode, GeoTransform, Measurement, Product};
use serde_json::json;

use crate::generators::{create_test_grid, dataset, raster, utc};

/// Product with datasets in the demo catalog.
pub const DEMO_PRODUCT: &str = "ls8_demo";

/// Product without datasets in the demo catalog.
pub const EMPTY_PRODUCT: &str = "empty_demo";

/// Grid of every demo dataset.
pub const DEMO_TRANSFORM: GeoTransform = GeoTransform {
    origin_x: 0.0,
    origin_y: 10.0,
    res_x: 0.5,
    res_y: -0.5,
};

pub const DEMO_SIZE: usize = 20;

/// Offset added to the red values of the n-th demo dataset.
pub const DEMO_SLICE_STEP: f32 = 100_000.0;

/// Offset of nir values relative to red.
pub const DEMO_NIR_OFFSET: f32 = 50_000.0;

pub const DEMO_NODATA: f64 = -9999.0;

/// Names of the paging catalog's products, in insertion order.
pub const PAGING_PRODUCTS: [&str; 5] = ["delta", "alpha", "echo", "charlie", "bravo"];

pub fn demo_product() -> Product {
    Product::new(DEMO_PRODUCT)
        .with_description("Landsat 8 surface reflectance demo")
        .with_keywords(["landsat", "reflectance"])
        .with_format("GeoTIFF")
        .with_measurement(
            Measurement::new("red", "int16", "1")
                .with_nodata(DEMO_NODATA)
                .with_alias("band_4"),
        )
        .with_measurement(
            Measurement::new("nir", "int16", "1")
                .with_nodata(DEMO_NODATA)
                .with_alias("band_5"),
        )
        .with_property("platform", json!("LANDSAT_8"))
        .with_property("instrument", json!("OLI_TIRS"))
}

/// The demo catalog: [`DEMO_PRODUCT`] with three acquisitions in 2020 and
/// [`EMPTY_PRODUCT`].
///
/// Red values of acquisition `n` are
/// `create_test_grid(20, 20, n * DEMO_SLICE_STEP)`; nir adds
/// [`DEMO_NIR_OFFSET`].
pub fn demo_catalog() -> MemoryCatalog {
    let mut catalog = MemoryCatalog::new()
        .with_product(demo_product())
        .with_product(Product::new(EMPTY_PRODUCT).with_description("Registered, never ingested"));

    let times = [utc(2020, 1, 1), utc(2020, 6, 15), utc(2020, 12, 31)];
    for (n, time) in times.into_iter().enumerate() {
        let ds = dataset(DEMO_PRODUCT, CrsCode::Crs84, DEMO_TRANSFORM, DEMO_SIZE, DEMO_SIZE, time);
        let base = n as f32 * DEMO_SLICE_STEP;
        catalog = catalog
            .with_raster(
                ds.id,
                "red",
                raster(DEMO_TRANSFORM, DEMO_SIZE, DEMO_SIZE, create_test_grid(DEMO_SIZE, DEMO_SIZE, base)),
            )
            .with_raster(
                ds.id,
                "nir",
                raster(
                    DEMO_TRANSFORM,
                    DEMO_SIZE,
                    DEMO_SIZE,
                    create_test_grid(DEMO_SIZE, DEMO_SIZE, base + DEMO_NIR_OFFSET),
                ),
            )
            .with_dataset(ds);
    }
    catalog
}

/// Five single-dataset products, inserted out of name order.
///
/// Product `i` of [`PAGING_PRODUCTS`] covers `[i, i, i + 1, i + 1]` with
/// one acquisition on 2021-01-(i+1).
pub fn paging_catalog() -> MemoryCatalog {
    PAGING_PRODUCTS
        .iter()
        .enumerate()
        .fold(MemoryCatalog::new(), |catalog, (i, name)| {
            let offset = i as f64;
            let transform = GeoTransform::new(offset, offset + 1.0, 0.25, -0.25);
            catalog
                .with_product(
                    Product::new(*name)
                        .with_keywords(["paging"])
                        .with_measurement(Measurement::new("value", "float32", "1")),
                )
                .with_dataset(dataset(name, CrsCode::Crs84, transform, 4, 4, utc(2021, 1, i as u32 + 1)))
        })
}
