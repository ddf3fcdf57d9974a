//! In-memory catalog.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use cube_common::{CubeError, CubeResult, Dataset, GridArray, Product};
use uuid::Uuid;

use crate::adapter::{CatalogAdapter, LoadRequest};
use crate::loader::{mosaic, Raster};

/// Catalog holding products, datasets and decoded rasters in memory.
///
/// Rasters are keyed by dataset id and measurement name. The catalog can be
/// switched offline to simulate an unreachable index.
#[derive(Default)]
pub struct MemoryCatalog {
    products: Vec<Product>,
    datasets: Vec<Dataset>,
    rasters: HashMap<(Uuid, String), Arc<Raster>>,
    offline: AtomicBool,
}

impl MemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_product(mut self, product: Product) -> Self {
        self.products.push(product);
        self
    }

    pub fn with_dataset(mut self, dataset: Dataset) -> Self {
        self.datasets.push(dataset);
        self
    }

    /// Attach the raster of one dataset measurement.
    pub fn with_raster(mut self, dataset: Uuid, measurement: impl Into<String>, raster: Raster) -> Self {
        self.rasters
            .insert((dataset, measurement.into()), Arc::new(raster));
        self
    }

    /// Make every call fail with `CatalogUnavailable`.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    fn check_online(&self) -> CubeResult<()> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(CubeError::CatalogUnavailable(
                "in-memory catalog is offline".to_string(),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl CatalogAdapter for MemoryCatalog {
    async fn list_products(&self) -> CubeResult<Vec<Product>> {
        self.check_online()?;
        Ok(self.products.clone())
    }

    async fn get_product(&self, name: &str) -> CubeResult<Product> {
        self.check_online()?;
        self.products
            .iter()
            .find(|p| !name.is_empty() && p.name == name)
            .cloned()
            .ok_or_else(|| CubeError::ProductNotFound(name.to_string()))
    }

    async fn list_datasets(&self, product: &str) -> CubeResult<Vec<Dataset>> {
        self.check_online()?;
        Ok(self
            .datasets
            .iter()
            .filter(|d| d.product == product)
            .cloned()
            .collect())
    }

    async fn load_data(&self, request: &LoadRequest) -> CubeResult<GridArray> {
        let product = self.get_product(&request.product).await?;
        let datasets = self.list_datasets(&request.product).await?;
        mosaic(request, &product, &datasets, |dataset, measurement| {
            let raster = self.rasters.get(&(dataset.id, measurement.name)).cloned();
            async move { Ok(raster) }
        })
        .await
    }
}
