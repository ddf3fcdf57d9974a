//! Router tests over the in-memory demo catalog.

use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    http::{header, Request, StatusCode},
    response::Response,
    Router,
};
use cube_catalog::{CatalogAdapter, MemoryCatalog};
use ogc_api::{config::ResourceRegistry, state::AppState};
use ogc_protocol::{conformance, ConfigDocument};
use ogc_providers::ProviderLimits;
use serde_json::Value;
use test_utils::{demo_catalog, DEMO_PRODUCT, EMPTY_PRODUCT};
use tower::ServiceExt;

const CONFIG: &str = r#"
server:
  url: http://localhost:5000
metadata:
  identification:
    title: Demo cube
resources:
  ls8_demo:
    type: collection
    title: ls8_demo
    description: Landsat 8 surface reflectance demo
    extents:
      spatial:
        bbox: [0, 0, 10, 10]
      temporal:
        begin: 2020-01-01T00:00:00Z
        end: 2020-12-31T00:00:00Z
    providers:
      - type: coverage
        name: cube_ogc.CoverageProvider
        data: ls8_demo
        format:
          name: GeoTIFF
          mimetype: application/geotiff
  catalog:
    type: collection
    title: Data cube product catalog
    extents:
      spatial:
        bbox: [-180, -90, 180, 90]
    providers:
      - type: record
        name: cube_ogc.RecordsProvider
        data: catalog
"#;

fn app_with(catalog: Arc<dyn CatalogAdapter>) -> Router {
    let document = ConfigDocument::from_yaml_str(CONFIG).unwrap();
    let state = AppState::from_parts(
        catalog,
        ResourceRegistry::from_document(&document),
        ProviderLimits::default(),
        "http://localhost:5000/",
        None,
    );
    ogc_api::router(Arc::new(state))
}

fn app() -> Router {
    app_with(Arc::new(demo_catalog()))
}

async fn get(app: Router, uri: &str) -> Response {
    app.oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap()
}

async fn get_with_accept(app: Router, uri: &str, accept: &str) -> Response {
    app.oneshot(
        Request::builder()
            .uri(uri)
            .header(header::ACCEPT, accept)
            .body(Body::empty())
            .unwrap(),
    )
    .await
    .unwrap()
}

async fn json_body(response: Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn header_str<'a>(response: &'a Response, name: &str) -> Option<&'a str> {
    response.headers().get(name).and_then(|v| v.to_str().ok())
}

#[tokio::test]
async fn landing_and_conformance() {
    let response = get(app(), "/").await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["title"], "Demo cube");
    assert_eq!(body["links"][0]["href"], "http://localhost:5000");

    let body = json_body(get(app(), "/conformance").await).await;
    let classes: Vec<&str> = body["conformsTo"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(Value::as_str)
        .collect();
    assert!(classes.contains(&conformance::COVERAGES_CORE));
    assert!(classes.contains(&conformance::RECORDS_CORE));
}

#[tokio::test]
async fn metadata_rejects_html() {
    let response = get_with_accept(app(), "/collections", "text/html").await;
    assert_eq!(response.status(), StatusCode::NOT_ACCEPTABLE);
}

#[tokio::test]
async fn collections_listing() {
    let body = json_body(get(app(), "/collections").await).await;
    let ids: Vec<&str> = body["collections"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|c| c["id"].as_str())
        .collect();
    assert_eq!(ids, vec![DEMO_PRODUCT, "catalog"]);

    let body = json_body(get(app(), "/collections/catalog").await).await;
    assert_eq!(body["itemType"], "record");

    let response = get(app(), "/collections/nope").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn coverage_reports_effective_extent() {
    let response = get(
        app(),
        "/collections/ls8_demo/coverage?bbox=5,5,15,15&datetime=2020-06-01/2020-06-30",
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        header_str(&response, "content-type"),
        Some("application/prs.coverage+json")
    );
    assert_eq!(header_str(&response, "content-bbox"), Some("5,5,10,10"));
    assert_eq!(
        header_str(&response, "content-datetime"),
        Some("2020-06-15T00:00:00Z")
    );

    let body = json_body(response).await;
    assert_eq!(body["type"], "Coverage");
    assert_eq!(body["ranges"]["red"]["shape"], serde_json::json!([1, 10, 10]));
}

#[tokio::test]
async fn coverage_geotiff_and_empty_binary() {
    let response = get(app(), "/collections/ls8_demo/coverage?bbox=0,0,2,2&f=geotiff").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        header_str(&response, "content-type"),
        Some("image/tiff; application=geotiff")
    );

    let response = get(app(), "/collections/ls8_demo/coverage?bbox=50,50,60,60&f=geotiff").await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    assert!(header_str(&response, "content-bbox").is_none());

    let response = get(app(), "/collections/ls8_demo/coverage?bbox=50,50,60,60").await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn coverage_accept_header_selects_geotiff() {
    let response = get_with_accept(
        app(),
        "/collections/ls8_demo/coverage?bbox=0,0,1,1",
        "image/tiff; application=geotiff",
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        header_str(&response, "content-type"),
        Some("image/tiff; application=geotiff")
    );
}

#[tokio::test]
async fn coverage_client_errors() {
    let response = get(app(), "/collections/ls8_demo/coverage?f=png").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = get(app(), "/collections/ls8_demo/coverage?bbox=1,2,3").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = get(app(), "/collections/ls8_demo/coverage?properties=swir").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = json_body(response).await;
    assert_eq!(body["status"], 400);

    // records collections have no coverage
    let response = get(app(), "/collections/catalog/coverage").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn coverage_axis_subset() {
    let response = get(app(), "/collections/ls8_demo/coverage?subset=Lon(5:6),Lat(5:6)").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(header_str(&response, "content-bbox"), Some("5,5,6,6"));

    let response = get(
        app(),
        "/collections/ls8_demo/coverage?subset=Lon(5:6),Lat(5:6)&bbox=0,0,1,1",
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = get(app(), "/collections/ls8_demo/coverage?subset=Lon(6:5),Lat(5:6)").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn domainset_and_rangetype() {
    let response = get(app(), "/collections/ls8_demo/coverage/domainset").await;
    assert_eq!(response.status(), StatusCode::OK);

    let body = json_body(get(app(), "/collections/ls8_demo/coverage/rangetype").await).await;
    let names: Vec<&str> = body["field"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|f| f["name"].as_str())
        .collect();
    assert_eq!(names, vec!["red", "nir"]);
}

#[tokio::test]
async fn records_paging() {
    let response = get(app(), "/collections/catalog/items?limit=1").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        header_str(&response, "content-type"),
        Some("application/geo+json")
    );

    let body = json_body(response).await;
    assert_eq!(body["numberMatched"], 2);
    assert_eq!(body["numberReturned"], 1);
    let next = body["links"]
        .as_array()
        .unwrap()
        .iter()
        .find(|l| l["rel"] == "next")
        .unwrap();
    assert_eq!(
        next["href"],
        "http://localhost:5000/collections/catalog/items?limit=1&offset=1"
    );

    let body = json_body(get(app(), "/collections/catalog/items?limit=1&offset=1").await).await;
    assert_eq!(body["features"][0]["id"], DEMO_PRODUCT);
    assert!(body["links"]
        .as_array()
        .unwrap()
        .iter()
        .all(|l| l["rel"] != "next"));
}

#[tokio::test]
async fn records_link_only_published_coverages() {
    let body = json_body(get(app(), "/collections/catalog/items").await).await;
    let features = body["features"].as_array().unwrap();
    let rels = |id: &str| -> Vec<String> {
        features
            .iter()
            .find(|f| f["id"] == id)
            .unwrap()["links"]
            .as_array()
            .unwrap()
            .iter()
            .map(|l| l["rel"].as_str().unwrap().to_string())
            .collect()
    };

    assert!(rels(DEMO_PRODUCT).contains(&"collection".to_string()));
    assert!(!rels(EMPTY_PRODUCT).contains(&"collection".to_string()));

    let published = features.iter().find(|f| f["id"] == DEMO_PRODUCT).unwrap();
    let coverage = published["links"]
        .as_array()
        .unwrap()
        .iter()
        .find(|l| l["href"].as_str().unwrap().ends_with("/coverage"))
        .unwrap();
    let href = coverage["href"].as_str().unwrap();
    let path = href.trim_start_matches("http://localhost:5000");
    assert_eq!(get(app(), path).await.status(), StatusCode::OK);
}

#[tokio::test]
async fn records_errors() {
    let response = get(app(), "/collections/catalog/items?limit=0").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = get(app(), "/collections/catalog/items?limit=ten").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = get(app(), "/collections/ls8_demo/items").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = get(app(), "/collections/catalog/items?sortby=name").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let body = json_body(get(app(), "/collections/catalog/items?bbox=-1,-1,11,11&bbox-crs=CRS:84").await).await;
    assert_eq!(body["numberMatched"], 1);

    let response = get(app(), "/collections/catalog/items/nope").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = get(app(), "/collections/catalog/items/ls8_demo").await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn catalog_outage_is_503() {
    let catalog = Arc::new(demo_catalog());
    let shared: Arc<MemoryCatalog> = Arc::clone(&catalog);
    let app = app_with(catalog);

    assert_eq!(get(app.clone(), "/ready").await.status(), StatusCode::OK);

    shared.set_offline(true);
    assert_eq!(
        get(app.clone(), "/ready").await.status(),
        StatusCode::SERVICE_UNAVAILABLE
    );
    assert_eq!(
        get(app.clone(), "/collections/ls8_demo/coverage").await.status(),
        StatusCode::SERVICE_UNAVAILABLE
    );
    assert_eq!(
        get(app, "/collections/catalog/items").await.status(),
        StatusCode::SERVICE_UNAVAILABLE
    );
}

#[tokio::test]
async fn health_and_metrics() {
    assert_eq!(get(app(), "/health").await.status(), StatusCode::OK);
    let response = get(app(), "/metrics").await;
    assert_eq!(response.status(), StatusCode::OK);
}
