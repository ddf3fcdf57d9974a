//! Coverage provider: subset, load and encode a product.

use std::sync::Arc;
use std::time::Instant;

use bytes::Bytes;
use cube_catalog::{CatalogAdapter, LoadRequest};
use cube_common::{
    format_datetime, BoundingBox, CrsCode, CubeError, CubeResult, GridArray, GridSpec, Product,
    ProductExtent, TimeRange, Variable,
};
use metrics::{counter, histogram};
use ogc_protocol::{AxisDescription, CoverageQuery, DomainSet, RangeField, RangeType};
use tracing::{debug, info, warn};

use crate::encoders::OutputFormat;
use crate::limits::{CoverageSizeEstimate, ProviderLimits};

/// An encoded coverage subset.
#[derive(Debug, Clone)]
pub struct CoverageResult {
    pub payload: Bytes,
    pub format: OutputFormat,
    pub crs: CrsCode,
    pub width: usize,
    pub height: usize,
    pub time_steps: usize,
    /// Bounds of the returned cells, `None` for an empty result.
    pub bbox: Option<BoundingBox>,
    /// Span of the returned time slices, `None` for an empty result.
    pub time: Option<TimeRange>,
}

impl CoverageResult {
    pub fn media_type(&self) -> &'static str {
        self.format.media_type()
    }

    /// No cells were returned.
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0 || self.time_steps == 0
    }

    /// `Content-Bbox` header value.
    pub fn content_bbox(&self) -> Option<String> {
        self.bbox.map(|b| b.to_query_string())
    }

    /// `Content-Datetime` header value.
    pub fn content_datetime(&self) -> Option<String> {
        self.time.map(|t| t.to_interval_string())
    }
}

/// Serves coverage subsets of cube products.
pub struct CoverageProvider {
    catalog: Arc<dyn CatalogAdapter>,
    limits: ProviderLimits,
}

impl CoverageProvider {
    pub fn new(catalog: Arc<dyn CatalogAdapter>, limits: ProviderLimits) -> Self {
        Self { catalog, limits }
    }

    pub fn limits(&self) -> &ProviderLimits {
        &self.limits
    }

    /// Load and encode the subset of `product_id` selected by `query`.
    ///
    /// A bbox or time window disjoint from the product yields an empty
    /// result, never an error.
    pub async fn get_coverage(
        &self,
        product_id: &str,
        query: &CoverageQuery,
    ) -> CubeResult<CoverageResult> {
        let format = OutputFormat::parse(query.format.as_deref())?;
        counter!("coverage_requests_total", "format" => format.token()).increment(1);

        let product = self.catalog.get_product(product_id).await?;
        let measurements = resolve_measurements(&product, query.measurements.as_deref())?;
        let extent = self.catalog.get_extent(product_id).await?;

        let Some(plan) = self.plan(&product, &extent, query)? else {
            return self.empty(&product, &measurements, format, &extent).await;
        };

        CoverageSizeEstimate::for_grid(&plan.grid, measurements.len()).check(&self.limits)?;

        debug!(
            product = %product_id,
            width = plan.grid.width,
            height = plan.grid.height,
            crs = %plan.grid.crs,
            measurements = ?measurements,
            "Loading coverage subset"
        );

        let request = LoadRequest::new(product_id, measurements.clone(), plan.grid).with_time(plan.time);
        let load_start = Instant::now();
        let array = match self.catalog.load_data(&request).await {
            Ok(array) => array,
            Err(CubeError::NoDataInRange(reason)) => {
                debug!(product = %product_id, reason = %reason, "No datasets in requested range");
                return self.empty(&product, &measurements, format, &extent).await;
            }
            Err(e) => return Err(e),
        };
        histogram!("coverage_load_duration_ms").record(load_start.elapsed().as_secs_f64() * 1000.0);

        let result = encode(array, format).await?;
        info!(
            product = %product_id,
            format = %format,
            width = result.width,
            height = result.height,
            time_steps = result.time_steps,
            size = result.payload.len(),
            "Coverage served"
        );
        Ok(result)
    }

    /// CIS domain set of a product's full grid.
    pub async fn domainset(&self, product_id: &str) -> CubeResult<DomainSet> {
        let product = self.catalog.get_product(product_id).await?;
        let extent = self.catalog.get_extent(product_id).await?;

        let Some(native) = extent.bbox else {
            let crs = product.load_crs.unwrap_or(extent.crs);
            let (x_label, y_label) = crs.axis_labels();
            let axis = |label: &str| AxisDescription {
                label: label.to_string(),
                lower: 0.0,
                upper: 0.0,
                resolution: 0.0,
                cells: 0,
            };
            return Ok(DomainSet::new(crs.uri(), crs.units(), axis(x_label), axis(y_label), None));
        };

        let (crs, (res_x, res_y)) = target_grid(&product, &extent)?;
        let bbox = reproject(&extent.crs, &crs, &native)?;
        let grid = GridSpec::aligned_within(crs, &bbox, (bbox.min_x, bbox.max_y), res_x, res_y);
        let bounds = grid.bounds();
        let (x_label, y_label) = crs.axis_labels();

        Ok(DomainSet::new(
            crs.uri(),
            crs.units(),
            AxisDescription {
                label: x_label.to_string(),
                lower: bounds.min_x,
                upper: bounds.max_x,
                resolution: res_x,
                cells: grid.width,
            },
            AxisDescription {
                label: y_label.to_string(),
                lower: bounds.min_y,
                upper: bounds.max_y,
                resolution: res_y,
                cells: grid.height,
            },
            extent
                .time
                .map(|t| (format_datetime(&t.start), format_datetime(&t.end))),
        ))
    }

    /// CIS range type: one field per measurement.
    pub async fn rangetype(&self, product_id: &str) -> CubeResult<RangeType> {
        let product = self.catalog.get_product(product_id).await?;
        Ok(RangeType::new(
            product
                .measurements
                .iter()
                .enumerate()
                .map(|(i, m)| {
                    RangeField::quantity(
                        i + 1,
                        m.name.clone(),
                        m.dtype.clone(),
                        m.units.clone(),
                        m.nodata,
                        m.aliases.clone(),
                    )
                })
                .collect(),
        ))
    }

    /// Clip the query against the product extent; `None` when disjoint.
    fn plan(
        &self,
        product: &Product,
        extent: &ProductExtent,
        query: &CoverageQuery,
    ) -> CubeResult<Option<LoadPlan>> {
        let (Some(native), Some(span)) = (extent.bbox, extent.time) else {
            return Ok(None);
        };

        let (crs, (res_x, res_y)) = target_grid(product, extent)?;
        let full = reproject(&extent.crs, &crs, &native)?;

        let clipped = match (&query.bbox, &query.subset) {
            (Some(requested), _) => {
                let requested = query
                    .bbox_crs
                    .transform_bbox(&crs, requested)
                    .map_err(|e| CubeError::UnsupportedCrs(e.to_string()))?;
                full.intersection(&requested)
            }
            // Subset coordinates are in the coverage CRS.
            (None, Some(subset)) => full.intersection(&subset.apply(&full)),
            (None, None) => Some(full),
        };
        let Some(clipped) = clipped else {
            debug!(product = %product.name, "Requested bbox is outside the product extent");
            return Ok(None);
        };

        let Some(time) = query.datetime.clip(&span) else {
            debug!(product = %product.name, "Requested datetime is outside the product extent");
            return Ok(None);
        };

        let grid = GridSpec::aligned_within(crs, &clipped, (full.min_x, full.max_y), res_x, res_y);
        if grid.is_empty() {
            return Ok(None);
        }
        Ok(Some(LoadPlan { grid, time }))
    }

    async fn empty(
        &self,
        product: &Product,
        measurements: &[String],
        format: OutputFormat,
        extent: &ProductExtent,
    ) -> CubeResult<CoverageResult> {
        counter!("coverage_empty_total").increment(1);
        let crs = product.load_crs.unwrap_or(extent.crs);
        let variables = measurements
            .iter()
            .filter_map(|name| product.measurement(name))
            .map(|m| Variable {
                name: m.name.clone(),
                units: m.units.clone(),
                dtype: m.dtype.clone(),
                nodata: m.nodata,
                values: Vec::new(),
            })
            .collect();
        info!(product = %product.name, format = %format, "Returning empty coverage");
        encode(GridArray::empty(crs, variables), format).await
    }
}

struct LoadPlan {
    grid: GridSpec,
    time: TimeRange,
}

/// Canonical measurement names for a `properties`/`rangeSubset` selection,
/// all measurements when absent.
fn resolve_measurements(product: &Product, requested: Option<&[String]>) -> CubeResult<Vec<String>> {
    let Some(requested) = requested else {
        return Ok(product.measurements.iter().map(|m| m.name.clone()).collect());
    };

    let mut names: Vec<String> = Vec::with_capacity(requested.len());
    for name in requested {
        let measurement = product.measurement(name).ok_or_else(|| {
            warn!(product = %product.name, measurement = %name, "Unknown measurement requested");
            CubeError::invalid_parameter(
                "properties",
                format!("Unknown measurement '{}' for product '{}'", name, product.name),
            )
        })?;
        if !names.contains(&measurement.name) {
            names.push(measurement.name.clone());
        }
    }
    Ok(names)
}

/// Output CRS and signed `(x, y)` resolution of a product's loads.
///
/// The product's declared load CRS/resolution wins; otherwise the datasets
/// must agree on a single CRS and resolution.
fn target_grid(product: &Product, extent: &ProductExtent) -> CubeResult<(CrsCode, (f64, f64))> {
    let crs = product.load_crs.unwrap_or(extent.crs);
    let resolution = match product.load_resolution {
        Some(res) => res,
        None if extent.has_mixed_crs() => {
            return Err(CubeError::LoadError(format!(
                "Product '{}' mixes dataset CRSs and declares no load resolution",
                product.name
            )))
        }
        None => extent.unique_resolution().ok_or_else(|| {
            CubeError::LoadError(format!(
                "Product '{}' has datasets with {} different resolutions and declares no load resolution",
                product.name,
                extent.resolutions.len()
            ))
        })?,
    };
    Ok((crs, (resolution.0.abs(), -resolution.1.abs())))
}

fn reproject(from: &CrsCode, to: &CrsCode, bbox: &BoundingBox) -> CubeResult<BoundingBox> {
    from.transform_bbox(to, bbox)
        .map_err(|e| CubeError::LoadError(format!("Cannot reproject product extent: {}", e)))
}

async fn encode(array: GridArray, format: OutputFormat) -> CubeResult<CoverageResult> {
    let start = Instant::now();
    let crs = array.crs();
    let width = array.width();
    let height = array.height();
    let time_steps = array.times.len();
    let bbox = array.bounds();
    let time = array.time_range();

    let payload = tokio::task::spawn_blocking(move || format.encode(&array))
        .await
        .map_err(|e| CubeError::Internal(format!("Encoder task failed: {}", e)))??;

    histogram!("coverage_encode_duration_ms", "format" => format.token())
        .record(start.elapsed().as_secs_f64() * 1000.0);

    Ok(CoverageResult {
        payload,
        format,
        crs,
        width,
        height,
        time_steps,
        bbox,
        time,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use cube_catalog::MemoryCatalog;
    use cube_common::{Measurement, TimeFilter};

    fn provider() -> CoverageProvider {
        CoverageProvider::new(
            Arc::new(test_utils::demo_catalog()),
            ProviderLimits::default(),
        )
    }

    #[tokio::test]
    async fn test_unknown_format_checked_before_catalog() {
        let catalog = MemoryCatalog::new();
        catalog.set_offline(true);
        let provider = CoverageProvider::new(Arc::new(catalog), ProviderLimits::default());

        let query = CoverageQuery {
            format: Some("png".to_string()),
            ..CoverageQuery::default()
        };
        let err = provider.get_coverage("anything", &query).await.unwrap_err();
        assert!(matches!(err, CubeError::UnsupportedFormat(_)));
    }

    #[tokio::test]
    async fn test_unknown_measurement() {
        let query = CoverageQuery {
            measurements: Some(vec!["swir".to_string()]),
            ..CoverageQuery::default()
        };
        let err = provider()
            .get_coverage(test_utils::DEMO_PRODUCT, &query)
            .await
            .unwrap_err();
        assert!(matches!(err, CubeError::InvalidParameter { ref param, .. } if param == "properties"));
    }

    #[tokio::test]
    async fn test_alias_resolves_to_canonical_name() {
        let query = CoverageQuery {
            bbox: Some(BoundingBox::new(0.0, 0.0, 1.0, 1.0)),
            measurements: Some(vec!["band_4".to_string(), "red".to_string()]),
            ..CoverageQuery::default()
        };
        let result = provider()
            .get_coverage(test_utils::DEMO_PRODUCT, &query)
            .await
            .unwrap();
        let json: serde_json::Value = serde_json::from_slice(&result.payload).unwrap();
        let ranges = json["ranges"].as_object().unwrap();
        assert_eq!(ranges.keys().collect::<Vec<_>>(), vec!["red"]);
    }

    #[tokio::test]
    async fn test_size_guard() {
        let provider = CoverageProvider::new(
            Arc::new(test_utils::demo_catalog()),
            ProviderLimits {
                max_coverage_cells: 10,
                ..ProviderLimits::default()
            },
        );
        let err = provider
            .get_coverage(test_utils::DEMO_PRODUCT, &CoverageQuery::default())
            .await
            .unwrap_err();
        assert!(matches!(err, CubeError::ResponseTooLarge { limit: 10, .. }));
    }

    #[tokio::test]
    async fn test_disjoint_time_is_empty() {
        let query = CoverageQuery {
            datetime: TimeFilter::parse("2019-01-01/2019-12-31").unwrap(),
            ..CoverageQuery::default()
        };
        let result = provider()
            .get_coverage(test_utils::DEMO_PRODUCT, &query)
            .await
            .unwrap();
        assert!(result.is_empty());
        assert_eq!(result.content_bbox(), None);
        assert_eq!(result.content_datetime(), None);
    }

    #[tokio::test]
    async fn test_gap_between_datasets_is_empty() {
        // inside the product's time span but between acquisitions
        let query = CoverageQuery {
            datetime: TimeFilter::parse("2020-03-01/2020-03-31").unwrap(),
            format: Some("geotiff".to_string()),
            ..CoverageQuery::default()
        };
        let result = provider()
            .get_coverage(test_utils::DEMO_PRODUCT, &query)
            .await
            .unwrap();
        assert!(result.is_empty());
        assert!(result.payload.is_empty());
        assert_eq!(result.media_type(), "image/tiff; application=geotiff");
    }

    #[test]
    fn test_target_grid_rules() {
        let product = Product::new("p").with_measurement(Measurement::new("b", "int16", "1"));
        let mut extent = ProductExtent::empty(CrsCode::Utm { zone: 32, north: true });
        extent.resolutions = vec![(30.0, -30.0)];
        assert_eq!(
            target_grid(&product, &extent).unwrap(),
            (CrsCode::Utm { zone: 32, north: true }, (30.0, -30.0))
        );

        extent.resolutions.push((10.0, -10.0));
        assert!(matches!(target_grid(&product, &extent), Err(CubeError::LoadError(_))));

        let mut declared = product.clone();
        declared.load_crs = Some(CrsCode::Crs84);
        declared.load_resolution = Some((0.001, 0.001));
        assert_eq!(
            target_grid(&declared, &extent).unwrap(),
            (CrsCode::Crs84, (0.001, -0.001))
        );

        extent.source_crs = vec![CrsCode::Crs84, CrsCode::WebMercator];
        assert!(target_grid(&product, &extent).is_err());
    }

    #[tokio::test]
    async fn test_rangetype() {
        let rangetype = provider().rangetype(test_utils::DEMO_PRODUCT).await.unwrap();
        assert_eq!(rangetype.field.len(), 2);
        assert_eq!(rangetype.field[0].id, 1);
        assert_eq!(rangetype.field[0].name, "red");
        assert_eq!(rangetype.field[0].nodata, Some(-9999.0));
        assert_eq!(rangetype.field[0].meta.tags.aliases, vec!["band_4".to_string()]);
        assert_eq!(rangetype.field[1].name, "nir");
    }

    #[tokio::test]
    async fn test_domainset() {
        let domainset = provider().domainset(test_utils::DEMO_PRODUCT).await.unwrap();
        let grid = &domainset.general_grid;
        assert_eq!(grid.axis_labels, vec!["Lon", "Lat", "time"]);
        assert_eq!(grid.axis[0].lower_bound, serde_json::json!(0.0));
        assert_eq!(grid.axis[0].upper_bound, serde_json::json!(10.0));
        assert_eq!(grid.axis[1].resolution, Some(-0.5));
        assert_eq!(grid.grid_limits.axis[0].upper_bound, 20);
        assert_eq!(grid.grid_limits.axis[1].upper_bound, 20);
    }

    #[tokio::test]
    async fn test_domainset_of_empty_product() {
        let domainset = provider().domainset(test_utils::EMPTY_PRODUCT).await.unwrap();
        assert_eq!(domainset.general_grid.grid_limits.axis[0].upper_bound, 0);
        assert_eq!(domainset.general_grid.axis_labels.len(), 2);
    }
}
