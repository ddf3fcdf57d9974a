//! Raster decoding, caching and mosaicking.
//!
//! Dataset measurements are single-band GeoTIFFs. Decoded rasters are kept
//! in an LRU cache keyed by location; mosaicking resamples every selected
//! dataset onto the request grid with nearest-neighbour lookup.

use std::future::Future;
use std::io::Cursor;
use std::num::NonZeroUsize;
use std::path::PathBuf;
use std::sync::Arc;

use cube_common::{
    BoundingBox, CrsCode, CubeError, CubeResult, Dataset, GeoTransform, GridArray, GridSpec,
    Measurement, Product, Variable,
};
use futures::future::try_join_all;
use lru::LruCache;
use rayon::prelude::*;
use tiff::decoder::{Decoder, DecodingResult};
use tiff::tags::Tag;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::adapter::LoadRequest;

/// A decoded single-band raster.
#[derive(Debug, Clone, PartialEq)]
pub struct Raster {
    pub width: usize,
    pub height: usize,
    pub transform: GeoTransform,
    /// Row-major values.
    pub values: Vec<f32>,
    pub nodata: Option<f64>,
}

impl Raster {
    /// Nearest value at a coordinate in the raster's CRS.
    ///
    /// Returns `None` outside the raster and for nodata or NaN cells.
    pub fn sample(&self, x: f64, y: f64) -> Option<f32> {
        let (px, py) = self.transform.to_pixel(x, y);
        if px < 0.0 || py < 0.0 {
            return None;
        }
        let (col, row) = (px.floor() as usize, py.floor() as usize);
        if col >= self.width || row >= self.height {
            return None;
        }
        let value = self.values[row * self.width + col];
        if value.is_nan() || self.nodata.is_some_and(|n| value as f64 == n) {
            return None;
        }
        Some(value)
    }

    pub fn bounds(&self) -> BoundingBox {
        self.transform.bounds(self.width, self.height)
    }
}

/// Decode a single-band GeoTIFF.
///
/// Georeferencing comes from the `ModelPixelScale`/`ModelTiepoint` tags and
/// falls back to `fallback` when the file carries none.
pub fn decode_geotiff(bytes: &[u8], fallback: Option<GeoTransform>) -> CubeResult<Raster> {
    let mut decoder = Decoder::new(Cursor::new(bytes)).map_err(tiff_error)?;
    let (width, height) = decoder.dimensions().map_err(tiff_error)?;
    let (width, height) = (width as usize, height as usize);

    let transform = tag_transform(&mut decoder)
        .or(fallback)
        .ok_or_else(|| CubeError::LoadError("GeoTIFF carries no georeferencing".to_string()))?;

    let nodata = decoder
        .get_tag_ascii_string(Tag::GdalNodata)
        .ok()
        .and_then(|s| s.trim_matches(|c: char| c == '\0' || c.is_whitespace()).parse::<f64>().ok());

    let values: Vec<f32> = match decoder.read_image().map_err(tiff_error)? {
        DecodingResult::U8(v) => v.into_iter().map(f32::from).collect(),
        DecodingResult::U16(v) => v.into_iter().map(f32::from).collect(),
        DecodingResult::I16(v) => v.into_iter().map(f32::from).collect(),
        DecodingResult::U32(v) => v.into_iter().map(|x| x as f32).collect(),
        DecodingResult::I32(v) => v.into_iter().map(|x| x as f32).collect(),
        DecodingResult::F32(v) => v,
        DecodingResult::F64(v) => v.into_iter().map(|x| x as f32).collect(),
        _ => {
            return Err(CubeError::LoadError(
                "Unsupported GeoTIFF sample type".to_string(),
            ))
        }
    };

    if values.len() != width * height {
        return Err(CubeError::LoadError(format!(
            "Expected a single-band {}x{} raster, decoded {} samples",
            width,
            height,
            values.len()
        )));
    }

    Ok(Raster {
        width,
        height,
        transform,
        values,
        nodata,
    })
}

fn tag_transform<R: std::io::Read + std::io::Seek>(decoder: &mut Decoder<R>) -> Option<GeoTransform> {
    let scale = decoder.get_tag_f64_vec(Tag::ModelPixelScaleTag).ok()?;
    let tiepoint = decoder.get_tag_f64_vec(Tag::ModelTiepointTag).ok()?;
    match (scale.as_slice(), tiepoint.as_slice()) {
        ([sx, sy, ..], [i, j, _, x, y, ..]) if *sx != 0.0 && *sy != 0.0 => Some(GeoTransform::new(
            x - i * sx,
            y + j * sy,
            *sx,
            -sy,
        )),
        _ => None,
    }
}

fn tiff_error(e: tiff::TiffError) -> CubeError {
    CubeError::LoadError(format!("GeoTIFF decode failed: {}", e))
}

/// Statistics for the raster cache.
#[derive(Debug, Default, Clone)]
pub struct RasterCacheStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
}

/// Reads dataset GeoTIFFs from local storage, with an LRU cache of decoded
/// rasters.
pub struct RasterLoader {
    /// location -> decoded raster
    cache: Arc<Mutex<LruCache<String, Arc<Raster>>>>,
    stats: Arc<Mutex<RasterCacheStats>>,
}

impl RasterLoader {
    /// Create a loader caching up to `capacity` decoded rasters.
    pub fn new(capacity: usize) -> Self {
        let cache_size = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            cache: Arc::new(Mutex::new(LruCache::new(cache_size))),
            stats: Arc::new(Mutex::new(RasterCacheStats::default())),
        }
    }

    /// Get a decoded raster, reading and decoding it on a cache miss.
    pub async fn load(&self, location: &str, fallback: Option<GeoTransform>) -> CubeResult<Arc<Raster>> {
        {
            let mut cache = self.cache.lock().await;
            if let Some(raster) = cache.get(location) {
                self.stats.lock().await.hits += 1;
                return Ok(raster.clone());
            }
        }

        let path = local_path(location)?;
        let bytes = tokio::fs::read(&path).await.map_err(|e| {
            CubeError::LoadError(format!("Failed to read {}: {}", path.display(), e))
        })?;
        debug!(location = %location, bytes = bytes.len(), "Decoding raster");

        let raster = tokio::task::spawn_blocking(move || decode_geotiff(&bytes, fallback))
            .await
            .map_err(|e| CubeError::Internal(format!("Decode task failed: {}", e)))??;
        let raster = Arc::new(raster);

        {
            let mut cache = self.cache.lock().await;
            let mut stats = self.stats.lock().await;
            stats.misses += 1;
            if cache.len() >= cache.cap().get() {
                stats.evictions += 1;
            }
            cache.put(location.to_string(), raster.clone());
        }

        Ok(raster)
    }

    pub async fn stats(&self) -> RasterCacheStats {
        self.stats.lock().await.clone()
    }

    pub async fn len(&self) -> usize {
        self.cache.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.cache.lock().await.is_empty()
    }

    pub async fn clear(&self) {
        self.cache.lock().await.clear();
        *self.stats.lock().await = RasterCacheStats::default();
    }
}

/// Resolve a dataset location (`file://` URI or plain path) to a local path.
fn local_path(location: &str) -> CubeResult<PathBuf> {
    if let Some(path) = location.strip_prefix("file://") {
        return Ok(PathBuf::from(path));
    }
    match location.split_once("://") {
        Some((scheme, _)) => Err(CubeError::LoadError(format!(
            "Unsupported storage scheme '{}' for {}",
            scheme, location
        ))),
        None => Ok(PathBuf::from(location)),
    }
}

struct Layer {
    time_index: usize,
    crs: CrsCode,
    raster: Arc<Raster>,
}

impl Layer {
    fn sample(&self, grid_crs: &CrsCode, x: f64, y: f64) -> Option<f32> {
        if *grid_crs == self.crs {
            return self.raster.sample(x, y);
        }
        let (sx, sy) = grid_crs.transform_point(&self.crs, x, y).ok()?;
        self.raster.sample(sx, sy)
    }
}

/// Load the requested measurements of `datasets` onto the request grid.
///
/// `fetch` returns the raster of one dataset measurement, or `None` when the
/// dataset does not carry it. Datasets are selected by time and footprint;
/// within a time slice the first dataset with a valid value wins. Cells
/// without data are filled with the measurement's nodata value (NaN when it
/// has none).
pub async fn mosaic<F, Fut>(
    request: &LoadRequest,
    product: &Product,
    datasets: &[Dataset],
    fetch: F,
) -> CubeResult<GridArray>
where
    F: Fn(Dataset, Measurement) -> Fut,
    Fut: Future<Output = CubeResult<Option<Arc<Raster>>>>,
{
    let measurements = request
        .measurements
        .iter()
        .map(|name| {
            product.measurement(name).cloned().ok_or_else(|| {
                CubeError::invalid_parameter(
                    "properties",
                    format!("Unknown measurement '{}' for product {}", name, product.name),
                )
            })
        })
        .collect::<CubeResult<Vec<_>>>()?;

    let grid = request.grid.clone();
    let selected = select_datasets(request, datasets)?;
    if selected.is_empty() {
        return Err(CubeError::NoDataInRange(format!(
            "No {} datasets intersect the requested area and time",
            request.product
        )));
    }

    let mut times: Vec<_> = selected.iter().map(|d| d.time).collect();
    times.sort();
    times.dedup();

    let mut layer_sets = Vec::with_capacity(measurements.len());
    for measurement in &measurements {
        let rasters = try_join_all(
            selected
                .iter()
                .map(|d| fetch((*d).clone(), measurement.clone())),
        )
        .await?;

        let layers: Vec<Layer> = selected
            .iter()
            .zip(rasters)
            .filter_map(|(d, raster)| {
                let time_index = times.binary_search(&d.time).ok()?;
                raster.map(|raster| Layer {
                    time_index,
                    crs: d.crs,
                    raster,
                })
            })
            .collect();
        layer_sets.push(layers);
    }

    info!(
        product = %request.product,
        datasets = selected.len(),
        times = times.len(),
        width = grid.width,
        height = grid.height,
        "Mosaicking datasets"
    );

    let n_times = times.len();
    let fill_grid = grid.clone();
    let variables = tokio::task::spawn_blocking(move || {
        measurements
            .into_iter()
            .zip(layer_sets)
            .map(|(m, layers)| {
                let fill = m.nodata.map(|n| n as f32).unwrap_or(f32::NAN);
                Variable {
                    values: fill_variable(&fill_grid, n_times, &layers, fill),
                    name: m.name,
                    units: m.units,
                    dtype: m.dtype,
                    nodata: m.nodata,
                }
            })
            .collect::<Vec<_>>()
    })
    .await
    .map_err(|e| CubeError::Internal(format!("Mosaic task failed: {}", e)))?;

    Ok(GridArray {
        grid,
        times,
        variables,
    })
}

/// Datasets matching the request's time filter whose footprint touches the
/// request grid, ordered by time then id.
fn select_datasets<'a>(request: &LoadRequest, datasets: &'a [Dataset]) -> CubeResult<Vec<&'a Dataset>> {
    let target = request.grid.bounds();
    let mut selected = Vec::new();
    for dataset in datasets {
        if let Some(time) = &request.time {
            if !time.contains(&dataset.time) {
                continue;
            }
        }
        let footprint = dataset
            .crs
            .transform_bbox(&request.grid.crs, &dataset.bounds())?;
        if footprint.intersects(&target) {
            selected.push(dataset);
        }
    }
    selected.sort_by(|a, b| a.time.cmp(&b.time).then_with(|| a.id.cmp(&b.id)));
    Ok(selected)
}

fn fill_variable(grid: &GridSpec, n_times: usize, layers: &[Layer], fill: f32) -> Vec<f32> {
    let width = grid.width;
    let height = grid.height;
    let mut values = vec![fill; n_times * width * height];
    if values.is_empty() {
        return values;
    }

    values
        .par_chunks_mut(width)
        .enumerate()
        .for_each(|(idx, row_values)| {
            let t = idx / height;
            let row = idx % height;
            let slice: Vec<&Layer> = layers.iter().filter(|l| l.time_index == t).collect();
            if slice.is_empty() {
                return;
            }
            for (col, out) in row_values.iter_mut().enumerate() {
                let (x, y) = grid.transform.pixel_center(col, row);
                if let Some(v) = slice.iter().find_map(|l| l.sample(&grid.crs, x, y)) {
                    *out = v;
                }
            }
        });

    values
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use std::collections::BTreeMap;
    use tiff::encoder::{colortype, TiffEncoder};
    use uuid::Uuid;

    fn encode_tiff(width: u32, height: u32, values: &[f32], origin: (f64, f64), res: f64) -> Vec<u8> {
        let mut cursor = Cursor::new(Vec::new());
        {
            let mut encoder = TiffEncoder::new(&mut cursor).unwrap();
            let mut image = encoder
                .new_image::<colortype::Gray32Float>(width, height)
                .unwrap();
            image
                .encoder()
                .write_tag(Tag::ModelPixelScaleTag, &[res, res, 0.0][..])
                .unwrap();
            image
                .encoder()
                .write_tag(Tag::ModelTiepointTag, &[0.0, 0.0, 0.0, origin.0, origin.1, 0.0][..])
                .unwrap();
            image.encoder().write_tag(Tag::GdalNodata, "-9999").unwrap();
            image.write_data(values).unwrap();
        }
        cursor.into_inner()
    }

    fn raster(values: Vec<f32>, origin: (f64, f64), size: usize) -> Arc<Raster> {
        Arc::new(Raster {
            width: size,
            height: size,
            transform: GeoTransform::new(origin.0, origin.1, 1.0, -1.0),
            values,
            nodata: Some(-9999.0),
        })
    }

    fn dataset(day: u32, origin: (f64, f64), size: usize) -> Dataset {
        Dataset {
            id: Uuid::new_v4(),
            product: "demo".to_string(),
            crs: CrsCode::Crs84,
            transform: GeoTransform::new(origin.0, origin.1, 1.0, -1.0),
            width: size,
            height: size,
            time: Utc.with_ymd_and_hms(2020, 6, day, 0, 0, 0).unwrap(),
            format: Some("GeoTIFF".to_string()),
            locations: BTreeMap::new(),
        }
    }

    #[test]
    fn test_decode_geotiff_tags() {
        let values: Vec<f32> = (0..6).map(|v| v as f32).collect();
        let bytes = encode_tiff(3, 2, &values, (10.0, 20.0), 0.5);

        let raster = decode_geotiff(&bytes, None).unwrap();
        assert_eq!((raster.width, raster.height), (3, 2));
        assert_eq!(raster.transform, GeoTransform::new(10.0, 20.0, 0.5, -0.5));
        assert_eq!(raster.nodata, Some(-9999.0));
        assert_eq!(raster.values, values);
        assert_eq!(raster.bounds(), BoundingBox::new(10.0, 19.0, 11.5, 20.0));
    }

    #[test]
    fn test_decode_rejects_garbage() {
        let err = decode_geotiff(b"not a tiff", None).unwrap_err();
        assert!(matches!(err, CubeError::LoadError(_)));
    }

    #[test]
    fn test_raster_sample() {
        let r = raster(vec![1.0, 2.0, -9999.0, f32::NAN], (0.0, 2.0), 2);
        assert_eq!(r.sample(0.5, 1.5), Some(1.0));
        assert_eq!(r.sample(1.5, 1.5), Some(2.0));
        assert_eq!(r.sample(0.5, 0.5), None);
        assert_eq!(r.sample(1.5, 0.5), None);
        assert_eq!(r.sample(-0.5, 1.5), None);
        assert_eq!(r.sample(2.5, 1.5), None);
    }

    #[test]
    fn test_local_path() {
        assert_eq!(local_path("file:///data/a.tif").unwrap(), PathBuf::from("/data/a.tif"));
        assert_eq!(local_path("/data/a.tif").unwrap(), PathBuf::from("/data/a.tif"));
        assert!(local_path("s3://bucket/a.tif").is_err());
    }

    #[tokio::test]
    async fn test_loader_caches_decoded_rasters() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("band.tif");
        std::fs::write(&path, encode_tiff(2, 2, &[1.0, 2.0, 3.0, 4.0], (0.0, 2.0), 1.0)).unwrap();
        let location = format!("file://{}", path.display());

        let loader = RasterLoader::new(4);
        let first = loader.load(&location, None).await.unwrap();
        let second = loader.load(&location, None).await.unwrap();
        assert!(Arc::ptr_eq(&first, &second));

        let stats = loader.stats().await;
        assert_eq!((stats.hits, stats.misses), (1, 1));
        assert_eq!(loader.len().await, 1);

        loader.clear().await;
        assert!(loader.is_empty().await);
        assert!(loader.load("file:///does/not/exist.tif", None).await.is_err());
    }

    #[tokio::test]
    async fn test_mosaic_first_valid_wins() {
        let product = Product::new("demo")
            .with_measurement(Measurement::new("red", "float32", "1").with_nodata(-9999.0));
        let a = dataset(1, (0.0, 2.0), 2);
        let b = dataset(1, (0.0, 2.0), 2);
        let datasets = vec![a.clone(), b.clone()];

        // b fills the cell a leaves as nodata
        let mut ordered = [a.id, b.id];
        ordered.sort();
        let first = ordered[0];

        let grid = GridSpec::new(CrsCode::Crs84, GeoTransform::new(0.0, 2.0, 1.0, -1.0), 2, 2);
        let request = LoadRequest::new("demo", vec!["red".to_string()], grid);

        let out = mosaic(&request, &product, &datasets, |d, _m| async move {
            let values = if d.id == first {
                vec![1.0, -9999.0, 3.0, 4.0]
            } else {
                vec![9.0, 2.0, 9.0, 9.0]
            };
            Ok(Some(raster(values, (0.0, 2.0), 2)))
        })
        .await
        .unwrap();

        assert_eq!(out.times.len(), 1);
        assert_eq!(out.variables[0].values, vec![1.0, 2.0, 3.0, 4.0]);
    }

    #[tokio::test]
    async fn test_mosaic_time_slices_and_fill() {
        let product = Product::new("demo").with_measurement(Measurement::new("red", "float32", "1"));
        let datasets = vec![dataset(2, (0.0, 1.0), 1), dataset(1, (0.0, 1.0), 1)];
        let grid = GridSpec::new(CrsCode::Crs84, GeoTransform::new(0.0, 1.0, 1.0, -1.0), 2, 1);
        let request = LoadRequest::new("demo", vec!["red".to_string()], grid);

        let out = mosaic(&request, &product, &datasets, |d, _m| async move {
            let day = d.time.format("%d").to_string().parse::<f32>().unwrap();
            Ok(Some(raster(vec![day], (0.0, 1.0), 1)))
        })
        .await
        .unwrap();

        assert_eq!(out.times.len(), 2);
        assert!(out.times[0] < out.times[1]);
        let values = &out.variables[0].values;
        assert_eq!(values[0], 1.0);
        assert!(values[1].is_nan());
        assert_eq!(values[2], 2.0);
        assert!(values[3].is_nan());
    }

    #[tokio::test]
    async fn test_mosaic_no_intersection() {
        let product = Product::new("demo").with_measurement(Measurement::new("red", "float32", "1"));
        let datasets = vec![dataset(1, (0.0, 1.0), 1)];
        let grid = GridSpec::new(CrsCode::Crs84, GeoTransform::new(50.0, 51.0, 1.0, -1.0), 1, 1);
        let request = LoadRequest::new("demo", vec!["red".to_string()], grid);

        let err = mosaic(&request, &product, &datasets, |_d, _m| async move { Ok(None) })
            .await
            .unwrap_err();
        assert!(matches!(err, CubeError::NoDataInRange(_)));

        let request = LoadRequest::new("demo", vec!["blue".to_string()], request.grid);
        let err = mosaic(&request, &product, &datasets, |_d, _m| async move { Ok(None) })
            .await
            .unwrap_err();
        assert_eq!(err.http_status_code(), 400);
    }
}
