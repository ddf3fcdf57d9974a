//! Configuration synthesis from the cube catalog.
//!
//! Every product with datasets becomes one `collection` resource with a
//! coverage provider binding. Generated entries are merged into a base
//! document; entries already present in the base win.

use std::path::Path;

use anyhow::{Context, Result};
use cube_catalog::CatalogAdapter;
use cube_common::{BoundingBox, CrsCode, CubeError, CubeResult, Product, ProductExtent, TimeRange};
use ogc_protocol::config::DEFAULT_FORMAT;
use ogc_protocol::{
    ConfigDocument, FormatSpec, Link, ProviderBinding, ResourceDescriptor, ResourceExtents,
    ResourceSpatialExtent, ResourceTemporalExtent,
};
use tracing::{debug, info, warn};

/// A catalog product with its aggregated extent.
#[derive(Debug, Clone, PartialEq)]
pub struct CatalogProduct {
    pub product: Product,
    pub extent: ProductExtent,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SynthesisOptions {
    /// Product names never published.
    pub exclusions: Vec<String>,
    /// Key of an additional records resource over all published products.
    pub records_collection: Option<String>,
}

/// What happened to each product during synthesis.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SynthesisReport {
    pub added: Vec<String>,
    pub excluded: Vec<String>,
    pub skipped_empty: Vec<String>,
    /// Products whose extent has no CRS84 equivalent.
    pub skipped_unprojectable: Vec<String>,
    /// Keys already present in the base document, left untouched.
    pub kept_from_base: Vec<String>,
}

/// Split a comma separated exclusion list.
pub fn parse_exclusions(list: &str) -> Vec<String> {
    list.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Load products and extents from the catalog, skipping excluded names
/// without touching their datasets.
pub async fn collect_products(
    catalog: &dyn CatalogAdapter,
    exclusions: &[String],
) -> CubeResult<Vec<CatalogProduct>> {
    let products = catalog.list_products().await?;
    let total = products.len();
    info!(count = total, "Processing products in catalog");

    let mut out = Vec::with_capacity(total);
    for (idx, product) in products.into_iter().enumerate() {
        if exclusions.contains(&product.name) {
            info!(product = %product.name, "[{}/{}] Product is excluded", idx + 1, total);
            out.push(CatalogProduct {
                extent: ProductExtent::empty(product.load_crs.unwrap_or(CrsCode::Crs84)),
                product,
            });
            continue;
        }
        debug!(product = %product.name, "[{}/{}] Reading extent", idx + 1, total);
        let extent = catalog.get_extent(&product.name).await?;
        out.push(CatalogProduct { product, extent });
    }
    Ok(out)
}

/// Merge one generated resource per publishable product into `base`.
///
/// Pure: no catalog, filesystem or network access.
pub fn synthesize(
    mut base: ConfigDocument,
    products: &[CatalogProduct],
    options: &SynthesisOptions,
) -> CubeResult<(ConfigDocument, SynthesisReport)> {
    let mut report = SynthesisReport::default();
    let mut published: Vec<&CatalogProduct> = Vec::new();

    for item in products {
        let name = &item.product.name;
        if options.exclusions.contains(name) {
            info!(product = %name, "Skipping excluded product");
            report.excluded.push(name.clone());
            continue;
        }
        if item.extent.is_empty() {
            info!(product = %name, "Skipping product without datasets");
            report.skipped_empty.push(name.clone());
            continue;
        }
        if let Err(e) = item.extent.crs84_bbox() {
            warn!(
                product = %name,
                crs = %item.extent.crs,
                error = %e,
                "Skipping product whose extent cannot be expressed in CRS84"
            );
            report.skipped_unprojectable.push(name.clone());
            continue;
        }

        let descriptor = product_resource(&item.product, &item.extent)?;
        if base.insert_resource_if_absent(name, &descriptor)? {
            report.added.push(name.clone());
        } else {
            info!(product = %name, "Resource already defined in base document, keeping it");
            report.kept_from_base.push(name.clone());
        }
        published.push(item);
    }

    if let Some(key) = &options.records_collection {
        let descriptor = records_resource(key, &published);
        if base.insert_resource_if_absent(key, &descriptor)? {
            report.added.push(key.clone());
        } else {
            warn!(resource = %key, "Records collection key already defined in base document");
            report.kept_from_base.push(key.clone());
        }
    }

    info!(
        added = report.added.len(),
        excluded = report.excluded.len(),
        skipped_empty = report.skipped_empty.len(),
        skipped_unprojectable = report.skipped_unprojectable.len(),
        kept_from_base = report.kept_from_base.len(),
        "Configuration synthesized"
    );
    Ok((base, report))
}

/// Resource stanza of one product, extents in CRS84.
pub fn product_resource(product: &Product, extent: &ProductExtent) -> CubeResult<ResourceDescriptor> {
    let bbox = crs84_bbox(extent)?.ok_or_else(|| {
        CubeError::Internal(format!("product '{}' has an empty extent", product.name))
    })?;

    let mut descriptor = ResourceDescriptor::collection(
        product.name.clone(),
        resource_extents(&bbox, extent.time.as_ref()),
    )
    .with_provider(ProviderBinding::coverage(
        product.name.clone(),
        FormatSpec::from_name(select_format(product, extent)),
    ));
    descriptor.description = product.description.clone().unwrap_or_default();
    descriptor.keywords = product.keywords.clone();
    descriptor.links = product.links.iter().map(Link::from).collect();
    Ok(descriptor)
}

/// Declared product format, else the single dataset format, else GeoTIFF.
pub fn select_format(product: &Product, extent: &ProductExtent) -> String {
    product
        .format
        .clone()
        .or_else(|| extent.unique_format().map(str::to_string))
        .unwrap_or_else(|| DEFAULT_FORMAT.to_string())
}

/// Catalog search resource spanning the published products.
pub fn records_resource(key: &str, published: &[&CatalogProduct]) -> ResourceDescriptor {
    let bboxes: Vec<BoundingBox> = published
        .iter()
        .filter_map(|item| item.extent.crs84_bbox().ok().flatten())
        .collect();
    let bbox = BoundingBox::union_all(bboxes.iter())
        .unwrap_or_else(|| BoundingBox::new(-180.0, -90.0, 180.0, 90.0));
    let time = published
        .iter()
        .filter_map(|p| p.extent.time)
        .reduce(|a, b| a.union(&b));

    let mut descriptor = ResourceDescriptor::collection(
        "Data cube product catalog",
        resource_extents(&bbox, time.as_ref()),
    )
    .with_provider(ProviderBinding::record(key));
    descriptor.description = "Metadata records of the data cube products".to_string();
    descriptor.keywords = vec!["catalog".to_string(), "records".to_string()];
    descriptor
}

fn crs84_bbox(extent: &ProductExtent) -> CubeResult<Option<BoundingBox>> {
    Ok(extent.crs84_bbox()?)
}

fn resource_extents(bbox: &BoundingBox, time: Option<&TimeRange>) -> ResourceExtents {
    ResourceExtents {
        spatial: ResourceSpatialExtent::crs84(bbox.to_array()),
        temporal: time.map(|t| ResourceTemporalExtent {
            begin: Some(t.start),
            end: Some(t.end),
        }),
    }
}

/// Read the base document, or an empty one when no path is given.
pub fn load_base(path: Option<&Path>) -> Result<ConfigDocument> {
    let Some(path) = path else {
        return Ok(ConfigDocument::new());
    };
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read base configuration: {:?}", path))?;
    ConfigDocument::from_yaml_str(&content)
        .with_context(|| format!("Failed to parse base configuration: {:?}", path))
}

/// Write `contents` to `path` through a temporary file in the same
/// directory, so readers never observe a partial document.
pub fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    use std::io::Write;

    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    let mut tmp = tempfile::NamedTempFile::new_in(dir)
        .with_context(|| format!("Failed to create temporary file in {:?}", dir))?;
    tmp.write_all(contents.as_bytes())
        .context("Failed to write configuration")?;
    tmp.as_file().sync_all().context("Failed to flush configuration")?;
    tmp.persist(path)
        .with_context(|| format!("Failed to move configuration into place: {:?}", path))?;
    Ok(())
}
