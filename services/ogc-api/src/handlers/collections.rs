//! Collections endpoint handlers.

use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    http::HeaderMap,
    response::Response,
};
use ogc_protocol::{media_types, Collection, CollectionList};

use super::{collection_not_found, json_response};
use crate::content_negotiation::check_metadata_accept;
use crate::state::AppState;

/// GET /collections - List all configured collections
pub async fn list_collections_handler(
    Extension(state): Extension<Arc<AppState>>,
    headers: HeaderMap,
) -> Response {
    if let Err(response) = check_metadata_accept(&headers) {
        return response;
    }

    let collections = state
        .resources
        .iter()
        .map(|(id, descriptor)| Collection::from_descriptor(id, descriptor, &state.base_url))
        .collect();
    let list = CollectionList::new(collections, &state.base_url);
    json_response(&list, media_types::JSON, 60)
}

/// GET /collections/:collection_id - Get a specific collection
pub async fn get_collection_handler(
    Extension(state): Extension<Arc<AppState>>,
    Path(collection_id): Path<String>,
    headers: HeaderMap,
) -> Response {
    if let Err(response) = check_metadata_accept(&headers) {
        return response;
    }

    let Some(descriptor) = state.resources.get(&collection_id) else {
        return collection_not_found(&collection_id);
    };
    let collection = Collection::from_descriptor(&collection_id, descriptor, &state.base_url);
    json_response(&collection, media_types::JSON, 60)
}
