//! Catalog access for the cube-ogc providers.
//!
//! Provides:
//! - [`CatalogAdapter`], the read-only view of the cube the providers consume
//! - [`OdcIndex`], backed by the Open Data Cube PostgreSQL index
//! - [`MemoryCatalog`], an in-memory catalog for tests and fixtures
//! - [`CachedCatalog`], a TTL cache over any adapter
//! - [`RasterLoader`], GeoTIFF decoding, raster caching and mosaicking

pub mod adapter;
pub mod cache;
pub mod loader;
pub mod memory;
pub mod odc;
pub mod search;

pub use adapter::{CatalogAdapter, LoadRequest, SearchMatch, SearchPage, SearchQuery};
pub use cache::CachedCatalog;
pub use loader::{decode_geotiff, mosaic, Raster, RasterCacheStats, RasterLoader};
pub use memory::MemoryCatalog;
pub use odc::OdcIndex;
