//! OGC API providers over the cube catalog.
//!
//! - [`CoverageProvider`] turns bbox/datetime/format queries into a bounded
//!   data load and encodes the result as CoverageJSON, GeoTIFF or NetCDF
//! - [`RecordsProvider`] turns catalog searches into paged record collections
//!
//! Both share a read-only `Arc<dyn CatalogAdapter>` and hold no other state.

pub mod coverage;
pub mod encoders;
pub mod limits;
pub mod records;

pub use coverage::{CoverageProvider, CoverageResult};
pub use encoders::OutputFormat;
pub use limits::{CoverageSizeEstimate, ProviderLimits};
pub use records::{RecordSet, RecordsProvider};
