//! Catalog backed by the Open Data Cube PostgreSQL index.
//!
//! Products come from `agdc.dataset_type`, datasets from `agdc.dataset`
//! (non-archived only) and their locations from `agdc.dataset_location`.
//! Dataset documents are expected in the eo3 layout (`crs`, `grids`,
//! `properties`, `measurements`).

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use cube_common::{
    parse_iso8601, CrsCode, CubeError, CubeResult, Dataset, GeoTransform, GridArray, Measurement,
    Product, ProductLink,
};
use serde_json::Value;
use sqlx::{postgres::PgPoolOptions, FromRow, PgPool};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::adapter::{CatalogAdapter, LoadRequest};
use crate::loader::{mosaic, RasterLoader};

/// Property keys whose values double as product keywords.
const KEYWORD_PROPERTIES: &[&str] = &[
    "eo:platform",
    "eo:instrument",
    "odc:product_family",
    "platform",
    "instrument",
    "product_family",
];

/// Open Data Cube index reader.
pub struct OdcIndex {
    pool: PgPool,
    loader: Arc<RasterLoader>,
}

impl OdcIndex {
    /// Connect to the index database.
    pub async fn connect(database_url: &str, loader: Arc<RasterLoader>) -> CubeResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(database_url)
            .await
            .map_err(|e| CubeError::CatalogUnavailable(format!("Connection failed: {}", e)))?;

        info!("Connected to Open Data Cube index");
        Ok(Self { pool, loader })
    }
}

#[async_trait]
impl CatalogAdapter for OdcIndex {
    async fn list_products(&self) -> CubeResult<Vec<Product>> {
        let rows = sqlx::query_as::<_, ProductRow>(
            "SELECT name, definition FROM agdc.dataset_type ORDER BY name",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(query_error)?;

        debug!(count = rows.len(), "Listed products");
        Ok(rows
            .into_iter()
            .map(|r| product_from_definition(&r.name, &r.definition))
            .collect())
    }

    async fn get_product(&self, name: &str) -> CubeResult<Product> {
        if name.is_empty() {
            return Err(CubeError::ProductNotFound(name.to_string()));
        }

        let row = sqlx::query_as::<_, ProductRow>(
            "SELECT name, definition FROM agdc.dataset_type WHERE name = $1",
        )
        .bind(name)
        .fetch_optional(&self.pool)
        .await
        .map_err(query_error)?;

        row.map(|r| product_from_definition(&r.name, &r.definition))
            .ok_or_else(|| CubeError::ProductNotFound(name.to_string()))
    }

    async fn list_datasets(&self, product: &str) -> CubeResult<Vec<Dataset>> {
        let rows = sqlx::query_as::<_, DatasetRow>(
            "SELECT d.id, d.metadata, \
             (SELECT l.uri_scheme || ':' || l.uri_body FROM agdc.dataset_location l \
              WHERE l.dataset_ref = d.id AND l.archived IS NULL \
              ORDER BY l.added DESC LIMIT 1) AS uri \
             FROM agdc.dataset d \
             JOIN agdc.dataset_type t ON d.dataset_type_ref = t.id \
             WHERE t.name = $1 AND d.archived IS NULL \
             ORDER BY d.id",
        )
        .bind(product)
        .fetch_all(&self.pool)
        .await
        .map_err(query_error)?;

        let mut datasets = Vec::with_capacity(rows.len());
        for row in rows {
            match dataset_from_metadata(row.id, product, &row.metadata, row.uri.as_deref()) {
                Ok(dataset) => datasets.push(dataset),
                Err(e) => warn!(dataset = %row.id, product = %product, error = %e, "Skipping unreadable dataset"),
            }
        }
        Ok(datasets)
    }

    async fn load_data(&self, request: &LoadRequest) -> CubeResult<GridArray> {
        let product = self.get_product(&request.product).await?;
        let datasets = self.list_datasets(&request.product).await?;
        let loader = self.loader.clone();

        mosaic(request, &product, &datasets, move |dataset, measurement| {
            let loader = loader.clone();
            async move {
                let location = std::iter::once(&measurement.name)
                    .chain(measurement.aliases.iter())
                    .find_map(|name| dataset.location(name))
                    .map(str::to_string);
                match location {
                    Some(location) => loader.load(&location, Some(dataset.transform)).await.map(Some),
                    None => Ok(None),
                }
            }
        })
        .await
    }
}

#[derive(Debug, FromRow)]
struct ProductRow {
    name: String,
    definition: Value,
}

#[derive(Debug, FromRow)]
struct DatasetRow {
    id: Uuid,
    metadata: Value,
    uri: Option<String>,
}

fn query_error(e: sqlx::Error) -> CubeError {
    CubeError::CatalogUnavailable(format!("Query failed: {}", e))
}

/// Build a product from its ODC product definition document.
pub fn product_from_definition(name: &str, definition: &Value) -> Product {
    let mut product = Product::new(name);
    product.description = definition["description"].as_str().map(str::to_string);

    product.measurements = definition["measurements"]
        .as_array()
        .map(|list| list.iter().filter_map(measurement_from_definition).collect())
        .unwrap_or_default();

    let load = if definition["load"].is_object() {
        &definition["load"]
    } else {
        &definition["storage"]
    };
    product.load_crs = load["crs"].as_str().and_then(|s| CrsCode::parse(s).ok());
    product.load_resolution = resolution(&load["resolution"]);

    let metadata = &definition["metadata"];
    product.format = metadata["format"]["name"]
        .as_str()
        .or_else(|| metadata["properties"]["odc:file_format"].as_str())
        .map(str::to_string);

    if let Some(props) = metadata["properties"].as_object() {
        product
            .properties
            .extend(props.iter().map(|(k, v)| (k.clone(), v.clone())));
    }
    if let Some(platform) = metadata["platform"]["code"].as_str() {
        product
            .properties
            .insert("platform".to_string(), Value::from(platform));
    }
    if let Some(instrument) = metadata["instrument"]["name"].as_str() {
        product
            .properties
            .insert("instrument".to_string(), Value::from(instrument));
    }
    if let Some(product_type) = metadata["product_type"].as_str() {
        product
            .properties
            .insert("product_type".to_string(), Value::from(product_type));
    }

    let mut keywords: Vec<String> = KEYWORD_PROPERTIES
        .iter()
        .filter_map(|k| product.properties.get(*k).and_then(Value::as_str))
        .map(str::to_string)
        .collect();
    keywords.dedup();
    product.keywords = keywords;

    if let Some(links) = definition["links"].as_array() {
        product.links = links
            .iter()
            .filter_map(|l| serde_json::from_value::<ProductLink>(l.clone()).ok())
            .collect();
    }

    product
}

fn measurement_from_definition(value: &Value) -> Option<Measurement> {
    let name = value["name"].as_str()?;
    let mut measurement = Measurement::new(
        name,
        value["dtype"].as_str().unwrap_or("float32"),
        value["units"].as_str().unwrap_or("1"),
    );
    measurement.nodata = match &value["nodata"] {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.parse::<f64>().ok(),
        _ => None,
    };
    if let Some(aliases) = value["aliases"].as_array() {
        measurement.aliases = aliases
            .iter()
            .filter_map(Value::as_str)
            .map(str::to_string)
            .collect();
    }
    Some(measurement)
}

fn resolution(value: &Value) -> Option<(f64, f64)> {
    let x = value["x"].as_f64().or_else(|| value["longitude"].as_f64())?;
    let y = value["y"].as_f64().or_else(|| value["latitude"].as_f64())?;
    Some((x, y))
}

/// Build a dataset from its eo3 metadata document and primary location.
pub fn dataset_from_metadata(
    id: Uuid,
    product: &str,
    metadata: &Value,
    uri: Option<&str>,
) -> CubeResult<Dataset> {
    let crs = metadata["crs"]
        .as_str()
        .ok_or_else(|| CubeError::LoadError("dataset has no crs".to_string()))
        .and_then(|s| CrsCode::parse(s).map_err(CubeError::from))?;

    let grid = &metadata["grids"]["default"];
    let shape: Vec<usize> = grid["shape"]
        .as_array()
        .map(|s| s.iter().filter_map(Value::as_u64).map(|v| v as usize).collect())
        .unwrap_or_default();
    let [height, width] = shape.as_slice() else {
        return Err(CubeError::LoadError("dataset grid has no shape".to_string()));
    };
    let affine: Vec<f64> = grid["transform"]
        .as_array()
        .map(|t| t.iter().filter_map(Value::as_f64).collect())
        .unwrap_or_default();
    let transform = GeoTransform::from_affine(&affine)
        .ok_or_else(|| CubeError::LoadError("dataset grid transform is missing or rotated".to_string()))?;

    let properties = &metadata["properties"];
    let time = properties["datetime"]
        .as_str()
        .or_else(|| properties["dtr:start_datetime"].as_str())
        .ok_or_else(|| CubeError::LoadError("dataset has no datetime".to_string()))
        .and_then(|s| parse_iso8601(s).map_err(|e| CubeError::LoadError(e.to_string())))?;

    let mut locations = BTreeMap::new();
    if let Some(measurements) = metadata["measurements"].as_object() {
        for (name, m) in measurements {
            if let Some(path) = m["path"].as_str() {
                locations.insert(name.clone(), resolve_location(uri, path));
            }
        }
    }

    Ok(Dataset {
        id,
        product: product.to_string(),
        crs,
        transform,
        width: *width,
        height: *height,
        time,
        format: properties["odc:file_format"].as_str().map(str::to_string),
        locations,
    })
}

/// Resolve a measurement path against the dataset document location.
fn resolve_location(uri: Option<&str>, path: &str) -> String {
    if path.contains("://") || path.starts_with('/') {
        return path.to_string();
    }
    match uri.and_then(|u| u.rfind('/').map(|idx| &u[..=idx])) {
        Some(base) => format!("{}{}", base, path),
        None => path.to_string(),
    }
}
