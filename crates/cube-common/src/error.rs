//! Error types for the cube/OGC bridge.

use thiserror::Error;

use crate::bbox::BboxParseError;
use crate::crs::CrsParseError;
use crate::time::TimeParseError;

/// Result type alias using CubeError.
pub type CubeResult<T> = Result<T, CubeError>;

/// Primary error type shared by the catalog adapter and the providers.
#[derive(Debug, Error)]
pub enum CubeError {
    // === Catalog Errors ===
    #[error("Catalog unavailable: {0}")]
    CatalogUnavailable(String),

    #[error("Product not found: {0}")]
    ProductNotFound(String),

    #[error("No data in requested range: {0}")]
    NoDataInRange(String),

    // === Configuration Errors ===
    #[error("Invalid configuration document: {0}")]
    ConfigParseError(String),

    // === Request Errors ===
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("Invalid parameter value for '{param}': {message}")]
    InvalidParameter { param: String, message: String },

    #[error("Unsupported CRS: {0}")]
    UnsupportedCrs(String),

    #[error("Response too large: {requested} cells requested, limit is {limit}")]
    ResponseTooLarge { requested: u64, limit: u64 },

    // === Data Errors ===
    #[error("Failed to load data: {0}")]
    LoadError(String),

    #[error("Failed to encode coverage: {0}")]
    EncodingError(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl CubeError {
    pub fn invalid_parameter(param: impl Into<String>, message: impl Into<String>) -> Self {
        CubeError::InvalidParameter {
            param: param.into(),
            message: message.into(),
        }
    }

    /// Get the HTTP status code for this error.
    pub fn http_status_code(&self) -> u16 {
        match self {
            CubeError::UnsupportedFormat(_)
            | CubeError::InvalidParameter { .. }
            | CubeError::UnsupportedCrs(_) => 400,

            CubeError::ProductNotFound(_) => 404,

            CubeError::ResponseTooLarge { .. } => 413,

            CubeError::CatalogUnavailable(_) => 503,

            // Providers convert NoDataInRange into empty results; reaching the
            // host means an unhandled path.
            CubeError::NoDataInRange(_)
            | CubeError::ConfigParseError(_)
            | CubeError::LoadError(_)
            | CubeError::EncodingError(_)
            | CubeError::Internal(_) => 500,
        }
    }

    /// Short machine-readable code for exception documents.
    pub fn code(&self) -> &'static str {
        match self {
            CubeError::CatalogUnavailable(_) => "CatalogUnavailable",
            CubeError::ProductNotFound(_) => "NotFound",
            CubeError::NoDataInRange(_) => "NoDataInRange",
            CubeError::ConfigParseError(_) => "ConfigParseError",
            CubeError::UnsupportedFormat(_) => "InvalidFormat",
            CubeError::InvalidParameter { .. } => "InvalidParameterValue",
            CubeError::UnsupportedCrs(_) => "InvalidCRS",
            CubeError::ResponseTooLarge { .. } => "ResponseTooLarge",
            CubeError::LoadError(_) => "LoadError",
            CubeError::EncodingError(_) => "EncodingError",
            CubeError::Internal(_) => "NoApplicableCode",
        }
    }
}

impl From<BboxParseError> for CubeError {
    fn from(err: BboxParseError) -> Self {
        CubeError::invalid_parameter("bbox", err.to_string())
    }
}

impl From<TimeParseError> for CubeError {
    fn from(err: TimeParseError) -> Self {
        CubeError::invalid_parameter("datetime", err.to_string())
    }
}

impl From<CrsParseError> for CubeError {
    fn from(err: CrsParseError) -> Self {
        CubeError::UnsupportedCrs(err.to_string())
    }
}

impl From<std::io::Error> for CubeError {
    fn from(err: std::io::Error) -> Self {
        CubeError::LoadError(err.to_string())
    }
}

impl From<serde_json::Error> for CubeError {
    fn from(err: serde_json::Error) -> Self {
        CubeError::Internal(format!("JSON error: {}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(CubeError::UnsupportedFormat("x".into()).http_status_code(), 400);
        assert_eq!(CubeError::invalid_parameter("limit", "0").http_status_code(), 400);
        assert_eq!(CubeError::ProductNotFound("p".into()).http_status_code(), 404);
        assert_eq!(
            CubeError::ResponseTooLarge {
                requested: 10,
                limit: 5
            }
            .http_status_code(),
            413
        );
        assert_eq!(CubeError::CatalogUnavailable("db".into()).http_status_code(), 503);
        assert_eq!(CubeError::LoadError("io".into()).http_status_code(), 500);
    }

    #[test]
    fn test_parse_errors_convert() {
        let err: CubeError = BboxParseError::InvalidFormat("1,2".into()).into();
        assert!(matches!(err, CubeError::InvalidParameter { ref param, .. } if param == "bbox"));

        let err: CubeError = CrsParseError::UnsupportedTransform(2957).into();
        assert!(matches!(err, CubeError::UnsupportedCrs(_)));
    }
}
