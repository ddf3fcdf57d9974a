//! OGC API Service Library
//!
//! HTTP surface of the data cube bridge: OGC API - Coverages for cube
//! products and OGC API - Records for catalog search.

pub mod config;
pub mod content_negotiation;
pub mod error;
pub mod handlers;
pub mod state;

use std::sync::Arc;

use axum::{routing::get, Extension, Router};
use tower_http::{compression::CompressionLayer, cors::CorsLayer, trace::TraceLayer};

use state::AppState;

/// Build the application router.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        // Landing page
        .route("/", get(handlers::landing::landing_handler))
        // Conformance
        .route("/conformance", get(handlers::conformance::conformance_handler))
        // Collections
        .route(
            "/collections",
            get(handlers::collections::list_collections_handler),
        )
        .route(
            "/collections/:collection_id",
            get(handlers::collections::get_collection_handler),
        )
        // Coverages
        .route(
            "/collections/:collection_id/coverage",
            get(handlers::coverage::coverage_handler),
        )
        .route(
            "/collections/:collection_id/coverage/domainset",
            get(handlers::coverage::domainset_handler),
        )
        .route(
            "/collections/:collection_id/coverage/rangetype",
            get(handlers::coverage::rangetype_handler),
        )
        // Records
        .route(
            "/collections/:collection_id/items",
            get(handlers::records::items_handler),
        )
        .route(
            "/collections/:collection_id/items/:record_id",
            get(handlers::records::item_handler),
        )
        // Health and metrics
        .route("/health", get(handlers::health::health_handler))
        .route("/ready", get(handlers::health::ready_handler))
        .route("/metrics", get(handlers::health::metrics_handler))
        // Middleware
        .layer(Extension(state))
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .layer(CorsLayer::permissive())
}
