//! OGC API - Coverages / Records protocol types.
//!
//! This crate provides the documents exchanged by the cube-ogc server:
//! landing page, conformance, collections, CoverageJSON, CIS domain set and
//! range type, record feature collections, and exception responses. It also
//! parses query parameters and models the YAML configuration document that
//! declares the published resources.
//!
//! # Example
//!
//! ```rust
//! use ogc_protocol::LandingPage;
//!
//! let landing = LandingPage::new("Cube API", None, "http://localhost:5000");
//! assert_eq!(landing.links.len(), 3);
//! ```

pub mod collections;
pub mod config;
pub mod coverage_json;
pub mod domainset;
pub mod queries;
pub mod records;
pub mod responses;
pub mod types;

pub use collections::{Collection, CollectionList};
pub use config::{
    ConfigDocument, FormatSpec, ProviderBinding, ResourceDescriptor, ResourceExtents,
    ResourceSpatialExtent, ResourceTemporalExtent,
};
pub use coverage_json::{Axis, CovJsonParameter, CoverageJson, Domain, NdArray, ReferenceSystem};
pub use domainset::{AxisDescription, DomainSet, RangeField, RangeType};
pub use queries::{CoverageQuery, QueryParseError, RecordQuery};
pub use records::{Geometry, Record, RecordCollection, RecordProperties};
pub use responses::{ConformanceClasses, ExceptionResponse, LandingPage};
pub use types::{Extent, Link, SpatialExtent, TemporalExtent};

/// Conformance class URIs
pub mod conformance {
    pub const CORE: &str = "http://www.opengis.net/spec/ogcapi-common-1/1.0/conf/core";
    pub const COLLECTIONS: &str = "http://www.opengis.net/spec/ogcapi-common-2/1.0/conf/collections";
    pub const JSON: &str = "http://www.opengis.net/spec/ogcapi-common-1/1.0/conf/json";

    pub const COVERAGES_CORE: &str = "http://www.opengis.net/spec/ogcapi-coverages-1/1.0/conf/core";
    pub const COVERAGES_SUBSET: &str =
        "http://www.opengis.net/spec/ogcapi-coverages-1/1.0/conf/coverage-subset";
    pub const COVERAGES_RANGE_SUBSET: &str =
        "http://www.opengis.net/spec/ogcapi-coverages-1/1.0/conf/coverage-rangesubset";
    pub const COVERAGES_COVJSON: &str =
        "http://www.opengis.net/spec/ogcapi-coverages-1/1.0/conf/coveragejson";
    pub const COVERAGES_GEOTIFF: &str =
        "http://www.opengis.net/spec/ogcapi-coverages-1/1.0/conf/geotiff";
    pub const COVERAGES_NETCDF: &str =
        "http://www.opengis.net/spec/ogcapi-coverages-1/1.0/conf/netcdf";

    pub const RECORDS_CORE: &str = "http://www.opengis.net/spec/ogcapi-records-1/1.0/conf/core";
    pub const RECORDS_JSON: &str = "http://www.opengis.net/spec/ogcapi-records-1/1.0/conf/json";
}

/// Media types and link relations used in responses
pub mod media_types {
    /// CoverageJSON media type
    pub const COVERAGE_JSON: &str = "application/prs.coverage+json";
    pub const GEO_JSON: &str = "application/geo+json";
    pub const GEOTIFF: &str = "image/tiff; application=geotiff";
    pub const NETCDF: &str = "application/x-netcdf";
    pub const JSON: &str = "application/json";

    pub const REL_COVERAGE: &str = "http://www.opengis.net/def/rel/ogc/1.0/coverage";
    pub const REL_DOMAINSET: &str = "http://www.opengis.net/def/rel/ogc/1.0/coverage-domainset";
    pub const REL_RANGETYPE: &str = "http://www.opengis.net/def/rel/ogc/1.0/coverage-rangetype";
}
