//! Records provider: catalog search as paged OGC API Records.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use cube_catalog::{CatalogAdapter, SearchMatch, SearchQuery};
use cube_common::{format_datetime, CubeError, CubeResult};
use metrics::{counter, histogram};
use ogc_protocol::queries::encode_component;
use ogc_protocol::{
    media_types, Geometry, Link, Record, RecordCollection, RecordProperties, RecordQuery,
};
use tracing::{debug, warn};

use crate::limits::ProviderLimits;

/// One page of records.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordSet {
    pub records: Vec<Record>,
    pub total_count: usize,
    pub offset: usize,
    pub limit: usize,
    /// Offset of the next page, `None` on the last page.
    pub next_offset: Option<usize>,
}

impl RecordSet {
    /// Render as a feature collection with `self` and `next` links.
    ///
    /// `items_url` is the absolute URL of the items endpoint; the links
    /// repeat the query's filters.
    pub fn into_collection(self, items_url: &str, query: &RecordQuery) -> RecordCollection {
        let page_link = |offset: usize, rel: &str| {
            let mut pairs = query.to_query_pairs();
            pairs.push(("limit".to_string(), self.limit.to_string()));
            pairs.push(("offset".to_string(), offset.to_string()));
            let qs = pairs
                .iter()
                .map(|(k, v)| format!("{}={}", encode_component(k), encode_component(v)))
                .collect::<Vec<_>>()
                .join("&");
            Link::new(format!("{}?{}", items_url, qs), rel).with_type(media_types::GEO_JSON)
        };

        let mut links = vec![page_link(self.offset, "self")];
        if let Some(next) = self.next_offset {
            links.push(page_link(next, "next").with_title("Next page"));
        }

        RecordCollection::new(self.records, self.total_count, format_datetime(&Utc::now()))
            .with_links(links)
    }
}

/// Serves cube products as catalog records.
pub struct RecordsProvider {
    catalog: Arc<dyn CatalogAdapter>,
    limits: ProviderLimits,
    base_url: String,
    /// Coverage collection id by product name. `None` links every product
    /// to the collection of the same name.
    coverage_collections: Option<HashMap<String, String>>,
}

impl RecordsProvider {
    /// `base_url` is the public root of the API, used for record links.
    pub fn new(catalog: Arc<dyn CatalogAdapter>, limits: ProviderLimits, base_url: impl Into<String>) -> Self {
        Self {
            catalog,
            limits,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            coverage_collections: None,
        }
    }

    /// Link records only to these `(product, collection id)` coverage
    /// collections; other products get no collection or coverage links.
    pub fn with_coverage_collections<I>(mut self, collections: I) -> Self
    where
        I: IntoIterator<Item = (String, String)>,
    {
        self.coverage_collections = Some(collections.into_iter().collect());
        self
    }

    fn collection_of<'a>(&'a self, product: &'a str) -> Option<&'a str> {
        match &self.coverage_collections {
            None => Some(product),
            Some(collections) => collections.get(product).map(String::as_str),
        }
    }

    /// Search products and return one page of records.
    ///
    /// Records are ordered by product name, then earliest acquisition time,
    /// so paging with a fixed query visits every match exactly once.
    pub async fn query_records(&self, collection_id: &str, query: &RecordQuery) -> CubeResult<RecordSet> {
        let (offset, limit) = self.paging(query)?;
        counter!("records_requests_total").increment(1);

        let search = SearchQuery {
            bbox: query.bbox,
            time: query.datetime,
            text: query.q.clone(),
            properties: query.properties.clone(),
            offset,
            limit,
        };

        let start = std::time::Instant::now();
        let page = self.catalog.search(&search).await?;
        histogram!("records_search_duration_ms").record(start.elapsed().as_secs_f64() * 1000.0);

        let returned = page.matches.len();
        let next_offset = (offset + returned < page.total_count).then_some(offset + limit);
        debug!(
            collection = %collection_id,
            matched = page.total_count,
            returned = returned,
            offset = offset,
            "Records query"
        );

        Ok(RecordSet {
            records: page.matches.iter().map(|m| self.to_record(m)).collect(),
            total_count: page.total_count,
            offset,
            limit,
            next_offset,
        })
    }

    /// A single record by product name.
    pub async fn get_record(&self, collection_id: &str, record_id: &str) -> CubeResult<Record> {
        let product = self.catalog.get_product(record_id).await?;
        let extent = self.catalog.get_extent(record_id).await?;
        debug!(collection = %collection_id, record = %record_id, "Record lookup");
        Ok(self.to_record(&SearchMatch { product, extent }))
    }

    /// Validated `(offset, limit)`, the limit clamped to the maximum.
    fn paging(&self, query: &RecordQuery) -> CubeResult<(usize, usize)> {
        let limit = match query.limit {
            None => self.limits.default_records_limit,
            Some(l) if l <= 0 => {
                return Err(CubeError::invalid_parameter("limit", "limit must be a positive integer"))
            }
            Some(l) => usize::try_from(l).unwrap_or(usize::MAX),
        }
        .min(self.limits.max_records_limit);

        let offset = match query.offset {
            None => 0,
            Some(o) if o < 0 => {
                return Err(CubeError::invalid_parameter("offset", "offset must not be negative"))
            }
            Some(o) => usize::try_from(o).unwrap_or(usize::MAX),
        };
        Ok((offset, limit))
    }

    fn to_record(&self, m: &SearchMatch) -> Record {
        let product = &m.product;
        let extent = &m.extent;

        let mut properties = RecordProperties::new(product.name.clone());
        properties.description = product.description.clone();
        properties.keywords = product.keywords.clone();
        properties.format = product
            .format
            .clone()
            .or_else(|| extent.unique_format().map(str::to_string));
        properties.measurements = product.measurements.clone();
        properties.extra = product.properties.clone();
        properties
            .extra
            .insert("dataset_count".to_string(), extent.dataset_count.into());

        let mut record = Record::new(product.name.clone(), properties);
        match self.collection_of(&product.name) {
            Some(collection_id) => {
                let collection_url = format!("{}/collections/{}", self.base_url, collection_id);
                record = record
                    .with_link(
                        Link::new(collection_url.clone(), "collection")
                            .with_type(media_types::JSON)
                            .with_title(collection_id.to_string()),
                    )
                    .with_link(
                        Link::new(format!("{}/coverage", collection_url), media_types::REL_COVERAGE)
                            .with_type(media_types::COVERAGE_JSON),
                    );
            }
            None => debug!(product = %product.name, "Product is not published as a coverage"),
        }

        match extent.crs84_bbox() {
            Ok(Some(bbox)) => record = record.with_geometry(Geometry::from_bbox(&bbox)),
            Ok(None) => {}
            Err(e) => warn!(product = %product.name, error = %e, "Cannot express extent in CRS84"),
        }

        if let Some(time) = extent.time {
            record = record.with_time(
                Some(format_datetime(&time.start)),
                Some(format_datetime(&time.end)),
            );
        }

        for link in &product.links {
            let mut out = Link::new(
                link.href.clone(),
                link.rel.clone().unwrap_or_else(|| "related".to_string()),
            );
            out.type_ = link.media_type.clone();
            out.title = link.title.clone();
            out.hreflang = link.hreflang.clone();
            record = record.with_link(out);
        }

        record
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cube_catalog::MemoryCatalog;

    fn provider() -> RecordsProvider {
        RecordsProvider::new(
            Arc::new(test_utils::demo_catalog()),
            ProviderLimits::default(),
            "http://localhost:5000/",
        )
    }

    #[tokio::test]
    async fn test_limit_validation() {
        let provider = provider();
        let zero = RecordQuery {
            limit: Some(0),
            ..RecordQuery::default()
        };
        let err = provider.query_records("catalog", &zero).await.unwrap_err();
        assert!(matches!(err, CubeError::InvalidParameter { ref param, .. } if param == "limit"));

        let negative = RecordQuery {
            offset: Some(-1),
            ..RecordQuery::default()
        };
        let err = provider.query_records("catalog", &negative).await.unwrap_err();
        assert_eq!(err.http_status_code(), 400);
    }

    #[tokio::test]
    async fn test_limit_clamped() {
        let provider = RecordsProvider::new(
            Arc::new(test_utils::demo_catalog()),
            ProviderLimits {
                max_records_limit: 1,
                ..ProviderLimits::default()
            },
            "http://localhost:5000",
        );
        let set = provider
            .query_records(
                "catalog",
                &RecordQuery {
                    limit: Some(500),
                    ..RecordQuery::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(set.limit, 1);
        assert_eq!(set.records.len(), 1);
        assert_eq!(set.next_offset, Some(1));
    }

    #[tokio::test]
    async fn test_record_content() {
        let record = provider()
            .get_record("catalog", test_utils::DEMO_PRODUCT)
            .await
            .unwrap();
        assert_eq!(record.id, test_utils::DEMO_PRODUCT);
        assert!(record.geometry.is_some());
        assert_eq!(
            record.time.as_ref().unwrap().interval,
            vec![
                Some("2020-01-01T00:00:00Z".to_string()),
                Some("2020-12-31T00:00:00Z".to_string())
            ]
        );
        assert_eq!(record.properties.measurements.len(), 2);
        assert_eq!(record.properties.extra["platform"], "LANDSAT_8");
        assert_eq!(record.properties.extra["dataset_count"], 3);
        assert_eq!(
            record.links[0].href,
            format!("http://localhost:5000/collections/{}", test_utils::DEMO_PRODUCT)
        );
        assert!(record.links.iter().any(|l| l.rel == media_types::REL_COVERAGE));
    }

    #[tokio::test]
    async fn test_links_follow_published_collections() {
        let provider = provider().with_coverage_collections([(
            test_utils::DEMO_PRODUCT.to_string(),
            "landsat".to_string(),
        )]);

        let record = provider
            .get_record("catalog", test_utils::DEMO_PRODUCT)
            .await
            .unwrap();
        assert_eq!(record.links[0].href, "http://localhost:5000/collections/landsat");
        assert_eq!(
            record.links[1].href,
            "http://localhost:5000/collections/landsat/coverage"
        );

        let unpublished = provider
            .get_record("catalog", test_utils::EMPTY_PRODUCT)
            .await
            .unwrap();
        assert!(unpublished
            .links
            .iter()
            .all(|l| l.rel != "collection" && l.rel != media_types::REL_COVERAGE));
    }

    #[tokio::test]
    async fn test_unknown_record() {
        let err = provider().get_record("catalog", "nope").await.unwrap_err();
        assert!(matches!(err, CubeError::ProductNotFound(_)));
    }

    #[tokio::test]
    async fn test_catalog_outage_propagates() {
        let catalog = MemoryCatalog::new();
        catalog.set_offline(true);
        let provider = RecordsProvider::new(Arc::new(catalog), ProviderLimits::default(), "http://x");
        let err = provider
            .query_records("catalog", &RecordQuery::default())
            .await
            .unwrap_err();
        assert_eq!(err.http_status_code(), 503);
    }

    #[test]
    fn test_collection_links_repeat_filters() {
        let query = RecordQuery {
            q: vec!["landsat".to_string()],
            ..RecordQuery::default()
        };
        let set = RecordSet {
            records: Vec::new(),
            total_count: 5,
            offset: 0,
            limit: 2,
            next_offset: Some(2),
        };
        let collection = set.into_collection("http://x/collections/catalog/items", &query);
        assert_eq!(collection.number_matched, 5);
        let next = collection.next_link().unwrap();
        assert_eq!(
            next.href,
            "http://x/collections/catalog/items?q=landsat&limit=2&offset=2"
        );
    }
}
