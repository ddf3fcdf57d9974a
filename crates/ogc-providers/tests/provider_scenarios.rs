//! End-to-end provider behaviour over the in-memory demo catalog.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use cube_catalog::{decode_geotiff, CatalogAdapter};
use cube_common::{BoundingBox, CrsCode, GeoTransform, Product, TimeFilter};
use ogc_protocol::{CoverageJson, CoverageQuery, RecordQuery};
use ogc_providers::{CoverageProvider, OutputFormat, ProviderLimits, RecordsProvider};
use test_utils::{
    assert_approx_eq, assert_bbox_within, dataset, demo_catalog, paging_catalog, test_grid_value, utc,
    DEMO_NIR_OFFSET, DEMO_PRODUCT, DEMO_SLICE_STEP, PAGING_PRODUCTS,
};

fn coverage_provider() -> CoverageProvider {
    CoverageProvider::new(Arc::new(demo_catalog()), ProviderLimits::default())
}

fn june() -> TimeFilter {
    TimeFilter::parse("2020-06-01/2020-06-30").unwrap()
}

#[tokio::test]
async fn partial_overlap_is_clipped_to_extent() {
    let query = CoverageQuery {
        bbox: Some(BoundingBox::new(5.0, 5.0, 15.0, 15.0)),
        datetime: june(),
        ..CoverageQuery::default()
    };
    let result = coverage_provider()
        .get_coverage(DEMO_PRODUCT, &query)
        .await
        .unwrap();

    assert_eq!(result.format, OutputFormat::CoverageJson);
    assert_eq!((result.width, result.height, result.time_steps), (10, 10, 1));

    let bbox = result.bbox.unwrap();
    assert_bbox_within!(bbox, BoundingBox::new(5.0, 5.0, 10.0, 10.0), 1e-9);
    let time = result.time.unwrap();
    assert!(time.start >= utc(2020, 6, 1) && time.end <= utc(2020, 6, 30));
    assert_eq!(result.content_datetime().as_deref(), Some("2020-06-15T00:00:00Z"));
    assert_eq!(result.content_bbox().as_deref(), Some("5,5,10,10"));

    let cov: CoverageJson = serde_json::from_slice(&result.payload).unwrap();
    let x = cov.domain.axis("x").unwrap().coords();
    assert_approx_eq!(x[0], 5.25, 1e-9);
    assert_approx_eq!(*x.last().unwrap(), 9.75, 1e-9);

    // output cell (0, 0) samples source column 10, row 0 of the June slice
    let red = &cov.ranges["red"];
    assert_eq!(red.shape, vec![1, 10, 10]);
    assert_eq!(red.values[0], Some(test_grid_value(10, 0, DEMO_SLICE_STEP)));
    let nir = &cov.ranges["nir"];
    assert_eq!(
        nir.values[11],
        Some(test_grid_value(11, 1, DEMO_SLICE_STEP + DEMO_NIR_OFFSET))
    );
}

#[tokio::test]
async fn effective_extent_stays_inside_request_and_product() {
    let provider = coverage_provider();
    let product_bbox = BoundingBox::new(0.0, 0.0, 10.0, 10.0);
    let requests = [
        BoundingBox::new(-5.0, -5.0, 3.3, 4.1),
        BoundingBox::new(2.2, 2.2, 2.9, 2.9),
        BoundingBox::new(9.0, -1.0, 20.0, 0.6),
        BoundingBox::new(0.0, 0.0, 10.0, 10.0),
    ];

    for requested in requests {
        let query = CoverageQuery {
            bbox: Some(requested),
            ..CoverageQuery::default()
        };
        let result = provider.get_coverage(DEMO_PRODUCT, &query).await.unwrap();
        let Some(bbox) = result.bbox else {
            assert!(result.is_empty());
            continue;
        };
        let allowed = requested.intersection(&product_bbox).unwrap();
        assert_bbox_within!(bbox, allowed, 1e-9);
    }
}

#[tokio::test]
async fn disjoint_bbox_is_empty_not_error() {
    let query = CoverageQuery {
        bbox: Some(BoundingBox::new(50.0, 50.0, 60.0, 60.0)),
        ..CoverageQuery::default()
    };
    let result = coverage_provider()
        .get_coverage(DEMO_PRODUCT, &query)
        .await
        .unwrap();
    assert!(result.is_empty());
    assert_eq!(result.bbox, None);

    let cov: CoverageJson = serde_json::from_slice(&result.payload).unwrap();
    assert!(cov.domain.axis("x").unwrap().is_empty());
    assert_eq!(cov.ranges.len(), 2);
    assert!(cov.ranges["red"].values.is_empty());
}

#[tokio::test]
async fn axis_subset_trims_native_grid() {
    let provider = coverage_provider();
    let params: HashMap<String, String> = [(
        "subset".to_string(),
        r#"Lon(5:6),Lat(5:6),time("2020-06-01":"2020-06-30")"#.to_string(),
    )]
    .into();
    let query = CoverageQuery::from_params(&params).unwrap();
    let result = provider.get_coverage(DEMO_PRODUCT, &query).await.unwrap();
    assert_eq!((result.width, result.height, result.time_steps), (2, 2, 1));
    assert_eq!(result.content_bbox().as_deref(), Some("5,5,6,6"));

    let params: HashMap<String, String> = [("subset".to_string(), "Lon(5:10)".to_string())].into();
    let query = CoverageQuery::from_params(&params).unwrap();
    let result = provider.get_coverage(DEMO_PRODUCT, &query).await.unwrap();
    assert_eq!((result.width, result.height), (10, 20));
    assert_eq!(result.content_bbox().as_deref(), Some("5,0,10,10"));

    let params: HashMap<String, String> = [("subset".to_string(), "Lon(20:30),Lat(20:30)".to_string())].into();
    let query = CoverageQuery::from_params(&params).unwrap();
    assert!(provider.get_coverage(DEMO_PRODUCT, &query).await.unwrap().is_empty());
}

#[tokio::test]
async fn bbox_in_web_mercator_is_reprojected() {
    let (min_x, min_y) = CrsCode::WebMercator.from_lonlat(2.0, 2.0).unwrap();
    let (max_x, max_y) = CrsCode::WebMercator.from_lonlat(4.0, 4.0).unwrap();
    let query = CoverageQuery {
        bbox: Some(BoundingBox::new(min_x, min_y, max_x, max_y)),
        bbox_crs: CrsCode::WebMercator,
        datetime: june(),
        ..CoverageQuery::default()
    };
    let result = coverage_provider()
        .get_coverage(DEMO_PRODUCT, &query)
        .await
        .unwrap();
    assert_eq!(result.crs, CrsCode::Crs84);
    let bbox = result.bbox.unwrap();
    assert_bbox_within!(bbox, BoundingBox::new(1.99, 1.99, 4.01, 4.01), 1e-9);
    assert!(bbox.width() >= 1.5);
}

#[tokio::test]
async fn geotiff_matches_coverage_json() {
    let provider = coverage_provider();
    let mut query = CoverageQuery {
        bbox: Some(BoundingBox::new(0.0, 5.0, 5.0, 10.0)),
        datetime: june(),
        measurements: Some(vec!["red".to_string()]),
        ..CoverageQuery::default()
    };
    let json = provider.get_coverage(DEMO_PRODUCT, &query).await.unwrap();
    query.format = Some("GeoTIFF".to_string());
    let tiff = provider.get_coverage(DEMO_PRODUCT, &query).await.unwrap();

    assert_eq!(tiff.media_type(), "image/tiff; application=geotiff");
    assert_eq!(tiff.bbox, json.bbox);

    let raster = decode_geotiff(&tiff.payload, None).unwrap();
    assert_eq!(raster.bounds(), json.bbox.unwrap());
    assert_eq!((raster.width, raster.height), (10, 10));

    let cov: CoverageJson = serde_json::from_slice(&json.payload).unwrap();
    let from_json: Vec<f32> = cov.ranges["red"].values.iter().map(|v| v.unwrap()).collect();
    assert_eq!(raster.values, from_json);
}

#[tokio::test]
async fn paging_visits_every_product_once() {
    let catalog: Arc<dyn CatalogAdapter> = Arc::new(paging_catalog());
    let provider = RecordsProvider::new(catalog, ProviderLimits::default(), "http://localhost:5000");

    let mut query = RecordQuery {
        limit: Some(2),
        ..RecordQuery::default()
    };
    let mut pages = Vec::new();
    let mut seen = Vec::new();
    loop {
        let set = provider.query_records("catalog", &query).await.unwrap();
        assert_eq!(set.total_count, 5);
        pages.push((set.records.len(), set.next_offset.is_some()));
        seen.extend(set.records.iter().map(|r| r.id.clone()));
        match set.next_offset {
            Some(next) => query.offset = Some(next as i64),
            None => break,
        }
    }

    assert_eq!(pages, vec![(2, true), (2, true), (1, false)]);
    let mut expected: Vec<String> = PAGING_PRODUCTS.iter().map(|s| s.to_string()).collect();
    expected.sort();
    assert_eq!(seen, expected);
    assert_eq!(seen.iter().collect::<HashSet<_>>().len(), 5);
}

#[tokio::test]
async fn offset_past_end_keeps_total() {
    let provider = RecordsProvider::new(
        Arc::new(paging_catalog()),
        ProviderLimits::default(),
        "http://localhost:5000",
    );
    let query = RecordQuery {
        offset: Some(50),
        ..RecordQuery::default()
    };
    let set = provider.query_records("catalog", &query).await.unwrap();
    assert!(set.records.is_empty());
    assert_eq!(set.total_count, 5);
    assert_eq!(set.next_offset, None);
}

#[tokio::test]
async fn records_filters() {
    let provider = RecordsProvider::new(
        Arc::new(demo_catalog()),
        ProviderLimits::default(),
        "http://localhost:5000",
    );

    let by_text = RecordQuery {
        q: vec!["landsat".to_string()],
        ..RecordQuery::default()
    };
    let set = provider.query_records("catalog", &by_text).await.unwrap();
    assert_eq!(set.total_count, 1);
    assert_eq!(set.records[0].id, DEMO_PRODUCT);

    let by_property = RecordQuery {
        properties: [("platform".to_string(), "landsat_8".to_string())].into(),
        ..RecordQuery::default()
    };
    assert_eq!(
        provider.query_records("catalog", &by_property).await.unwrap().total_count,
        1
    );

    let by_time = RecordQuery {
        datetime: TimeFilter::parse("2019-01-01/2019-12-31").unwrap(),
        ..RecordQuery::default()
    };
    assert_eq!(
        provider.query_records("catalog", &by_time).await.unwrap().total_count,
        0
    );
}

#[tokio::test]
async fn records_survive_products_in_other_projections() {
    let csrs = GeoTransform::new(400_000.0, 5_000_000.0, 30.0, -30.0);
    let catalog = paging_catalog()
        .with_product(Product::new("dsm_maritimes"))
        .with_dataset(dataset("dsm_maritimes", CrsCode::from_epsg(2961), csrs, 4, 4, utc(2021, 2, 1)))
        .with_dataset(dataset("dsm_maritimes", CrsCode::from_epsg(2962), csrs, 4, 4, utc(2021, 2, 2)))
        .with_product(Product::new("dsm_gauss_kruger"))
        .with_dataset(dataset(
            "dsm_gauss_kruger",
            CrsCode::Epsg(31467),
            GeoTransform::new(3_500_000.0, 5_500_000.0, 25.0, -25.0),
            4,
            4,
            utc(2021, 3, 1),
        ));
    let provider = RecordsProvider::new(Arc::new(catalog), ProviderLimits::default(), "http://localhost:5000");

    let set = provider.query_records("catalog", &RecordQuery::default()).await.unwrap();
    assert_eq!(set.total_count, PAGING_PRODUCTS.len() + 2);

    let maritimes = set.records.iter().find(|r| r.id == "dsm_maritimes").unwrap();
    assert!(maritimes.geometry.is_some());
    let gauss_kruger = set.records.iter().find(|r| r.id == "dsm_gauss_kruger").unwrap();
    assert!(gauss_kruger.geometry.is_none());
    assert!(gauss_kruger.time.is_some());

    let in_canada = RecordQuery {
        bbox: Some(BoundingBox::new(-66.0, 44.0, -56.0, 46.0)),
        ..RecordQuery::default()
    };
    let set = provider.query_records("catalog", &in_canada).await.unwrap();
    assert_eq!(set.total_count, 1);
    assert_eq!(set.records[0].id, "dsm_maritimes");
}
