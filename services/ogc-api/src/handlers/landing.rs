//! Landing page handler.

use std::sync::Arc;

use axum::{extract::Extension, http::HeaderMap, response::Response};
use ogc_protocol::{media_types, LandingPage};

use super::json_response;
use crate::content_negotiation::check_metadata_accept;
use crate::state::AppState;

/// GET / - Landing page
pub async fn landing_handler(
    Extension(state): Extension<Arc<AppState>>,
    headers: HeaderMap,
) -> Response {
    if let Err(response) = check_metadata_accept(&headers) {
        return response;
    }

    let landing = LandingPage::new(
        state.resources.title.clone(),
        state.resources.description.clone(),
        &state.base_url,
    );
    json_response(&landing, media_types::JSON, 300)
}
