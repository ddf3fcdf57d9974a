//! HTTP request handlers for the OGC API.

pub mod collections;
pub mod conformance;
pub mod coverage;
pub mod health;
pub mod landing;
pub mod records;

use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use ogc_protocol::ExceptionResponse;
use serde::Serialize;

use crate::error::exception_response;

/// Serialize `body` as pretty JSON with the given content type.
pub(crate) fn json_response<T: Serialize>(
    body: &T,
    content_type: &'static str,
    cache_max_age: u32,
) -> Response {
    match serde_json::to_string_pretty(body) {
        Ok(json) => (
            StatusCode::OK,
            [
                (header::CONTENT_TYPE, content_type.to_string()),
                (header::CACHE_CONTROL, format!("max-age={}", cache_max_age)),
            ],
            json,
        )
            .into_response(),
        Err(e) => exception_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            &ExceptionResponse::internal_error(e.to_string()),
        ),
    }
}

pub(crate) fn collection_not_found(collection_id: &str) -> Response {
    exception_response(
        StatusCode::NOT_FOUND,
        &ExceptionResponse::not_found(format!("Collection not found: {}", collection_id)),
    )
}
