//! TTL cache over a catalog adapter.
//!
//! Product metadata and extents change only when the cube ingests data, so
//! the product list and per-product extents are kept for a configurable TTL.
//! Data loads and dataset listings always go to the wrapped adapter.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use cube_common::{CubeError, CubeResult, Dataset, GridArray, Product, ProductExtent};
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::adapter::{CatalogAdapter, LoadRequest};

struct Cached<T> {
    value: T,
    cached_at: Instant,
}

impl<T: Clone> Cached<T> {
    fn new(value: T) -> Self {
        Self {
            value,
            cached_at: Instant::now(),
        }
    }

    fn fresh(&self, ttl: Duration) -> Option<T> {
        (self.cached_at.elapsed() < ttl).then(|| self.value.clone())
    }
}

/// Catalog adapter caching product metadata and extents.
pub struct CachedCatalog {
    inner: Arc<dyn CatalogAdapter>,
    products: RwLock<Option<Cached<Vec<Product>>>>,
    extents: RwLock<HashMap<String, Cached<ProductExtent>>>,
    ttl: Duration,
}

impl CachedCatalog {
    /// Wrap `inner`, keeping metadata for `ttl_secs` seconds.
    pub fn new(inner: Arc<dyn CatalogAdapter>, ttl_secs: u64) -> Self {
        info!(ttl_secs = ttl_secs, "Initializing catalog metadata cache");
        Self {
            inner,
            products: RwLock::new(None),
            extents: RwLock::new(HashMap::new()),
            ttl: Duration::from_secs(ttl_secs),
        }
    }

    /// Drop every cached entry.
    pub async fn invalidate(&self) {
        *self.products.write().await = None;
        self.extents.write().await.clear();
        debug!("Catalog metadata cache invalidated");
    }

    pub fn ttl_secs(&self) -> u64 {
        self.ttl.as_secs()
    }
}

#[async_trait]
impl CatalogAdapter for CachedCatalog {
    async fn list_products(&self) -> CubeResult<Vec<Product>> {
        if let Some(products) = self.products.read().await.as_ref().and_then(|c| c.fresh(self.ttl)) {
            debug!("Product list cache hit");
            return Ok(products);
        }

        let products = self.inner.list_products().await?;
        *self.products.write().await = Some(Cached::new(products.clone()));
        debug!(count = products.len(), "Product list cached");
        Ok(products)
    }

    async fn get_product(&self, name: &str) -> CubeResult<Product> {
        self.list_products()
            .await?
            .into_iter()
            .find(|p| !name.is_empty() && p.name == name)
            .ok_or_else(|| CubeError::ProductNotFound(name.to_string()))
    }

    async fn list_datasets(&self, product: &str) -> CubeResult<Vec<Dataset>> {
        self.inner.list_datasets(product).await
    }

    async fn get_extent(&self, product: &str) -> CubeResult<ProductExtent> {
        if let Some(extent) = self
            .extents
            .read()
            .await
            .get(product)
            .and_then(|c| c.fresh(self.ttl))
        {
            debug!(product = %product, "Extent cache hit");
            return Ok(extent);
        }

        let extent = self.inner.get_extent(product).await?;
        self.extents
            .write()
            .await
            .insert(product.to_string(), Cached::new(extent.clone()));
        Ok(extent)
    }

    async fn load_data(&self, request: &LoadRequest) -> CubeResult<GridArray> {
        self.inner.load_data(request).await
    }
}
