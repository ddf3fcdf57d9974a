//! Coverage endpoint handlers.

use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    body::Body,
    extract::{Extension, Path, Query},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use cube_common::CubeError;
use ogc_protocol::{media_types, CoverageQuery};
use ogc_providers::CoverageResult;

use super::{collection_not_found, json_response};
use crate::content_negotiation::{check_metadata_accept, negotiate_coverage_format};
use crate::error::ApiError;
use crate::state::AppState;

/// Effective bbox of the returned cells.
pub const CONTENT_BBOX: &str = "content-bbox";

/// Effective time span of the returned slices.
pub const CONTENT_DATETIME: &str = "content-datetime";

pub const CONTENT_CRS: &str = "content-crs";

/// GET /collections/:collection_id/coverage
pub async fn coverage_handler(
    Extension(state): Extension<Arc<AppState>>,
    Path(collection_id): Path<String>,
    Query(params): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> Response {
    let Some(product) = state.resources.coverage_product(&collection_id) else {
        return collection_not_found(&collection_id);
    };

    let format = match negotiate_coverage_format(&headers, params.get("f").map(String::as_str)) {
        Ok(format) => format,
        Err(response) => return response,
    };
    let mut query = match CoverageQuery::from_params(&params) {
        Ok(query) => query,
        Err(e) => return ApiError::from(e).into_response(),
    };
    query.format = Some(format.token().to_string());

    match state.coverage.get_coverage(product, &query).await {
        Ok(result) => coverage_response(result).unwrap_or_else(|e| e.into_response()),
        Err(e) => ApiError(e).into_response(),
    }
}

/// Encoded coverage with the effective extent headers.
///
/// An empty binary coverage has no payload and answers 204.
fn coverage_response(result: CoverageResult) -> Result<Response, ApiError> {
    let status = if result.is_empty() && result.format.is_binary() {
        StatusCode::NO_CONTENT
    } else {
        StatusCode::OK
    };

    let mut builder = Response::builder()
        .status(status)
        .header(CONTENT_CRS, format!("<{}>", result.crs.uri()));
    if status == StatusCode::OK {
        builder = builder.header(header::CONTENT_TYPE, result.media_type());
    }
    if let Some(bbox) = result.content_bbox() {
        builder = builder.header(CONTENT_BBOX, bbox);
    }
    if let Some(datetime) = result.content_datetime() {
        builder = builder.header(CONTENT_DATETIME, datetime);
    }

    let body = if status == StatusCode::NO_CONTENT {
        Body::empty()
    } else {
        Body::from(result.payload)
    };
    builder
        .body(body)
        .map_err(|e| ApiError(CubeError::Internal(e.to_string())))
}

/// GET /collections/:collection_id/coverage/domainset
pub async fn domainset_handler(
    Extension(state): Extension<Arc<AppState>>,
    Path(collection_id): Path<String>,
    headers: HeaderMap,
) -> Response {
    if let Err(response) = check_metadata_accept(&headers) {
        return response;
    }
    let Some(product) = state.resources.coverage_product(&collection_id) else {
        return collection_not_found(&collection_id);
    };

    match state.coverage.domainset(product).await {
        Ok(domainset) => json_response(&domainset, media_types::JSON, 60),
        Err(e) => ApiError(e).into_response(),
    }
}

/// GET /collections/:collection_id/coverage/rangetype
pub async fn rangetype_handler(
    Extension(state): Extension<Arc<AppState>>,
    Path(collection_id): Path<String>,
    headers: HeaderMap,
) -> Response {
    if let Err(response) = check_metadata_accept(&headers) {
        return response;
    }
    let Some(product) = state.resources.coverage_product(&collection_id) else {
        return collection_not_found(&collection_id);
    };

    match state.coverage.rangetype(product).await {
        Ok(rangetype) => json_response(&rangetype, media_types::JSON, 60),
        Err(e) => ApiError(e).into_response(),
    }
}
