//! Content negotiation utilities for Accept header handling.
//!
//! The `f` query parameter wins over the Accept header. Requests that accept
//! none of the supported media types get 406 Not Acceptable.

use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use ogc_protocol::{media_types, ExceptionResponse};
use ogc_providers::OutputFormat;

use crate::error::{exception_response, ApiError};

/// Media types for metadata documents (landing, collections, domainset, ...).
pub const METADATA_MEDIA_TYPES: &[&str] = &[media_types::JSON];

/// Media types for records responses.
pub const RECORDS_MEDIA_TYPES: &[&str] = &[media_types::GEO_JSON, media_types::JSON];

/// Accepted media types of coverage responses, without parameters.
pub const COVERAGE_MEDIA_TYPES: &[&str] = &[
    "application/prs.coverage+json",
    "application/vnd.cov+json",
    "application/json",
    "image/tiff",
    "application/x-netcdf",
    "application/netcdf",
];

/// Parse an Accept header into `(media type, quality)` pairs, best first.
fn accepted_types(headers: &HeaderMap) -> Vec<(String, f32)> {
    let accept = headers
        .get(header::ACCEPT)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("*/*");

    let mut types: Vec<(String, f32)> = accept
        .split(',')
        .filter_map(|s| {
            let mut parts = s.split(';');
            let media_type = parts.next()?.trim().to_ascii_lowercase();
            if media_type.is_empty() {
                return None;
            }
            let quality = parts
                .find_map(|p| p.trim().strip_prefix("q=").and_then(|q| q.parse::<f32>().ok()))
                .unwrap_or(1.0);
            Some((media_type, quality))
        })
        .collect();

    // stable sort keeps header order for equal qualities
    types.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    types
}

fn coverage_format_for_media_type(media_type: &str) -> Option<OutputFormat> {
    match media_type {
        "*/*" | "application/*" => Some(OutputFormat::CoverageJson),
        "application/prs.coverage+json" | "application/vnd.cov+json" | "application/json" => {
            Some(OutputFormat::CoverageJson)
        }
        "image/tiff" | "image/*" => Some(OutputFormat::GeoTiff),
        "application/x-netcdf" | "application/netcdf" if OutputFormat::netcdf_enabled() => {
            Some(OutputFormat::NetCdf)
        }
        _ => None,
    }
}

/// Pick the coverage output format from `f` or the Accept header.
///
/// An unknown `f` token is a 400, an Accept header without any supported
/// type is a 406. An empty `f` is treated as absent.
pub fn negotiate_coverage_format(
    headers: &HeaderMap,
    f_param: Option<&str>,
) -> Result<OutputFormat, Response> {
    if let Some(f) = f_param.map(str::trim).filter(|f| !f.is_empty()) {
        return OutputFormat::parse(Some(f)).map_err(|e| ApiError(e).into_response());
    }

    let accepted = accepted_types(headers);
    if accepted.is_empty() {
        return Ok(OutputFormat::CoverageJson);
    }
    for (media_type, quality) in &accepted {
        if *quality <= 0.0 {
            continue;
        }
        if let Some(format) = coverage_format_for_media_type(media_type) {
            return Ok(format);
        }
    }

    let requested: Vec<&str> = accepted.iter().map(|(t, _)| t.as_str()).collect();
    Err(not_acceptable_response(&requested, COVERAGE_MEDIA_TYPES))
}

/// Check the Accept header against `supported_types`.
pub fn check_accept_header(headers: &HeaderMap, supported_types: &[&str]) -> Result<(), Response> {
    let accepted = accepted_types(headers);
    if accepted.is_empty() {
        return Ok(());
    }

    for (accepted, _) in &accepted {
        if accepted == "*/*" {
            return Ok(());
        }
        if let Some(prefix) = accepted.strip_suffix('*') {
            if supported_types.iter().any(|s| s.starts_with(prefix)) {
                return Ok(());
            }
            continue;
        }
        if supported_types.iter().any(|s| s == accepted) {
            return Ok(());
        }
    }

    let requested: Vec<&str> = accepted.iter().map(|(t, _)| t.as_str()).collect();
    Err(not_acceptable_response(&requested, supported_types))
}

pub fn check_metadata_accept(headers: &HeaderMap) -> Result<(), Response> {
    check_accept_header(headers, METADATA_MEDIA_TYPES)
}

pub fn check_records_accept(headers: &HeaderMap) -> Result<(), Response> {
    check_accept_header(headers, RECORDS_MEDIA_TYPES)
}

fn not_acceptable_response(requested: &[&str], supported: &[&str]) -> Response {
    let exc = ExceptionResponse::new(
        "http://www.opengis.net/def/exceptions/ogcapi-common-1/1.0/not-acceptable",
        406,
        format!(
            "Content negotiation failed. Requested format(s) '{}' not supported. Supported formats: {}",
            requested.join(", "),
            supported.join(", ")
        ),
    )
    .with_title("Not Acceptable");
    exception_response(StatusCode::NOT_ACCEPTABLE, &exc)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn make_headers(accept: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(header::ACCEPT, HeaderValue::from_str(accept).unwrap());
        headers
    }

    #[test]
    fn test_metadata_accept() {
        assert!(check_metadata_accept(&HeaderMap::new()).is_ok());
        assert!(check_metadata_accept(&make_headers("application/json")).is_ok());
        assert!(check_metadata_accept(&make_headers("application/*")).is_ok());
        assert!(check_metadata_accept(&make_headers(
            "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8"
        ))
        .is_ok());
    }

    #[test]
    fn test_metadata_reject() {
        let response = check_metadata_accept(&make_headers("text/html")).unwrap_err();
        assert_eq!(response.status(), StatusCode::NOT_ACCEPTABLE);
        assert!(check_metadata_accept(&make_headers("text/*")).is_err());
        assert!(check_metadata_accept(&make_headers("application/geo+json")).is_err());
    }

    #[test]
    fn test_records_accept() {
        assert!(check_records_accept(&make_headers("application/geo+json")).is_ok());
        assert!(check_records_accept(&make_headers("application/xml")).is_err());
    }

    #[test]
    fn test_f_param_wins() {
        let headers = make_headers("image/tiff");
        assert_eq!(
            negotiate_coverage_format(&headers, Some("json")).unwrap(),
            OutputFormat::CoverageJson
        );
        assert_eq!(
            negotiate_coverage_format(&HeaderMap::new(), Some("GeoTIFF")).unwrap(),
            OutputFormat::GeoTiff
        );
    }

    #[test]
    fn test_invalid_f_param() {
        let response = negotiate_coverage_format(&HeaderMap::new(), Some("png")).unwrap_err();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_empty_f_param_uses_accept() {
        let headers = make_headers("image/tiff; application=geotiff");
        assert_eq!(
            negotiate_coverage_format(&headers, Some("")).unwrap(),
            OutputFormat::GeoTiff
        );
    }

    #[test]
    fn test_accept_quality_order() {
        let headers = make_headers("application/prs.coverage+json;q=0.5, image/tiff;q=0.9");
        assert_eq!(
            negotiate_coverage_format(&headers, None).unwrap(),
            OutputFormat::GeoTiff
        );
        let headers = make_headers("*/*");
        assert_eq!(
            negotiate_coverage_format(&headers, None).unwrap(),
            OutputFormat::CoverageJson
        );
    }

    #[test]
    fn test_coverage_not_acceptable() {
        let response = negotiate_coverage_format(&make_headers("text/html"), None).unwrap_err();
        assert_eq!(response.status(), StatusCode::NOT_ACCEPTABLE);
    }
}
