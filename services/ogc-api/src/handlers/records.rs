//! Records endpoint handlers.

use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query},
    http::HeaderMap,
    response::{IntoResponse, Response},
};
use ogc_protocol::{media_types, RecordQuery};

use super::{collection_not_found, json_response};
use crate::content_negotiation::check_records_accept;
use crate::error::ApiError;
use crate::state::AppState;

/// GET /collections/:collection_id/items - Search catalog records
pub async fn items_handler(
    Extension(state): Extension<Arc<AppState>>,
    Path(collection_id): Path<String>,
    Query(params): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> Response {
    if !state.resources.is_records(&collection_id) {
        return collection_not_found(&collection_id);
    }
    if let Err(response) = check_records_accept(&headers) {
        return response;
    }

    let query = match RecordQuery::from_params(&params) {
        Ok(query) => query,
        Err(e) => return ApiError::from(e).into_response(),
    };

    match state.records.query_records(&collection_id, &query).await {
        Ok(set) => {
            let items_url = format!("{}/collections/{}/items", state.base_url, collection_id);
            let collection = set.into_collection(&items_url, &query);
            json_response(&collection, media_types::GEO_JSON, 0)
        }
        Err(e) => ApiError(e).into_response(),
    }
}

/// GET /collections/:collection_id/items/:record_id - A single record
pub async fn item_handler(
    Extension(state): Extension<Arc<AppState>>,
    Path((collection_id, record_id)): Path<(String, String)>,
    headers: HeaderMap,
) -> Response {
    if !state.resources.is_records(&collection_id) {
        return collection_not_found(&collection_id);
    }
    if let Err(response) = check_records_accept(&headers) {
        return response;
    }

    match state.records.get_record(&collection_id, &record_id).await {
        Ok(record) => json_response(&record, media_types::GEO_JSON, 60),
        Err(e) => ApiError(e).into_response(),
    }
}
