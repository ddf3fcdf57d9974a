//! Conformance endpoint handler.

use std::sync::Arc;

use axum::{extract::Extension, http::HeaderMap, response::Response};
use ogc_protocol::media_types;

use super::json_response;
use crate::content_negotiation::check_metadata_accept;
use crate::state::AppState;

/// GET /conformance - Conformance classes
pub async fn conformance_handler(
    Extension(state): Extension<Arc<AppState>>,
    headers: HeaderMap,
) -> Response {
    if let Err(response) = check_metadata_accept(&headers) {
        return response;
    }
    json_response(&state.conformance(), media_types::JSON, 3600)
}
