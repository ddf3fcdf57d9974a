//! The catalog adapter trait and its request/response types.

use std::collections::BTreeMap;

use async_trait::async_trait;
use cube_common::{
    BoundingBox, CrsCode, CubeError, CubeResult, Dataset, GridArray, GridSpec, Product, ProductExtent,
    TimeFilter, TimeRange,
};
use tracing::warn;

use crate::search;

/// Read-only access to the cube's products, datasets and raster data.
///
/// Passed around as `Arc<dyn CatalogAdapter>`.
#[async_trait]
pub trait CatalogAdapter: Send + Sync {
    /// All registered products.
    async fn list_products(&self) -> CubeResult<Vec<Product>>;

    /// A single product by name; `ProductNotFound` for unknown names.
    async fn get_product(&self, name: &str) -> CubeResult<Product>;

    /// Non-archived datasets of a product.
    async fn list_datasets(&self, product: &str) -> CubeResult<Vec<Dataset>>;

    /// Union footprint and time span of a product's datasets.
    ///
    /// Products without datasets yield an empty extent, not an error.
    async fn get_extent(&self, product: &str) -> CubeResult<ProductExtent> {
        let meta = self.get_product(product).await?;
        let datasets = self.list_datasets(product).await?;
        Ok(ProductExtent::from_datasets(
            product,
            meta.load_crs.unwrap_or(CrsCode::Crs84),
            &datasets,
        ))
    }

    /// Load measurements onto the requested grid.
    ///
    /// Fails with `NoDataInRange` when no dataset intersects the request.
    async fn load_data(&self, request: &LoadRequest) -> CubeResult<GridArray>;

    /// Metadata search over all products.
    ///
    /// A product whose extent cannot be read is matched without geometry or
    /// time; only an unavailable catalog fails the search.
    async fn search(&self, query: &SearchQuery) -> CubeResult<SearchPage> {
        let products = self.list_products().await?;
        let mut candidates = Vec::with_capacity(products.len());
        for product in products {
            let extent = match self.get_extent(&product.name).await {
                Ok(extent) => extent,
                Err(e @ CubeError::CatalogUnavailable(_)) => return Err(e),
                Err(e) => {
                    warn!(product = %product.name, error = %e, "Searching product without extent");
                    ProductExtent::empty(product.load_crs.unwrap_or(CrsCode::Crs84))
                }
            };
            candidates.push(SearchMatch { product, extent });
        }
        Ok(search::search_products(candidates, query))
    }
}

/// A bounded data-load request.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadRequest {
    pub product: String,
    /// Canonical measurement names to load, in output order.
    pub measurements: Vec<String>,
    /// Target grid; source rasters are resampled onto it.
    pub grid: GridSpec,
    /// Time filter; `None` loads every time slice.
    pub time: Option<TimeRange>,
}

impl LoadRequest {
    pub fn new(product: impl Into<String>, measurements: Vec<String>, grid: GridSpec) -> Self {
        Self {
            product: product.into(),
            measurements,
            grid,
            time: None,
        }
    }

    pub fn with_time(mut self, time: TimeRange) -> Self {
        self.time = Some(time);
        self
    }
}

/// Catalog search request.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchQuery {
    /// Spatial filter in CRS84.
    pub bbox: Option<BoundingBox>,
    pub time: TimeFilter,
    /// Lowercase free-text terms; every term must match.
    pub text: Vec<String>,
    /// Exact-match metadata property filters.
    pub properties: BTreeMap<String, String>,
    pub offset: usize,
    pub limit: usize,
}

impl Default for SearchQuery {
    fn default() -> Self {
        Self {
            bbox: None,
            time: TimeFilter::unbounded(),
            text: Vec::new(),
            properties: BTreeMap::new(),
            offset: 0,
            limit: usize::MAX,
        }
    }
}

/// One product matched by a search.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchMatch {
    pub product: Product,
    pub extent: ProductExtent,
}

/// One page of search results.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchPage {
    pub matches: Vec<SearchMatch>,
    /// Matches across all pages.
    pub total_count: usize,
}
