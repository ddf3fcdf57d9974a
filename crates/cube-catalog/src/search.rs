//! Metadata filtering and ordering shared by catalog implementations.

use std::cmp::Ordering;

use cube_common::{BoundingBox, Product, ProductExtent};
use tracing::debug;

use crate::adapter::{SearchMatch, SearchPage, SearchQuery};

/// Filter, order and page candidate products.
///
/// Results are ordered by product name, then earliest acquisition time, so
/// pages of a fixed query never overlap.
pub fn search_products(candidates: Vec<SearchMatch>, query: &SearchQuery) -> SearchPage {
    let mut matches: Vec<SearchMatch> = candidates
        .into_iter()
        .filter(|m| matches_query(m, query))
        .collect();

    matches.sort_by(compare_matches);

    let total_count = matches.len();
    let matches = matches
        .into_iter()
        .skip(query.offset)
        .take(query.limit)
        .collect();

    SearchPage {
        matches,
        total_count,
    }
}

fn compare_matches(a: &SearchMatch, b: &SearchMatch) -> Ordering {
    a.product
        .name
        .cmp(&b.product.name)
        .then_with(|| earliest(&a.extent).cmp(&earliest(&b.extent)))
}

fn earliest(extent: &ProductExtent) -> Option<chrono::DateTime<chrono::Utc>> {
    extent.time.map(|t| t.start)
}

fn matches_query(candidate: &SearchMatch, query: &SearchQuery) -> bool {
    if let Some(bbox) = &query.bbox {
        if !matches_bbox(candidate, bbox) {
            return false;
        }
    }

    if !query.time.is_unbounded() {
        match &candidate.extent.time {
            Some(range) if query.time.overlaps(range) => {}
            _ => return false,
        }
    }

    query
        .text
        .iter()
        .all(|term| matches_text(&candidate.product, term))
        && query
            .properties
            .iter()
            .all(|(key, value)| matches_property(candidate, key, value))
}

fn matches_bbox(candidate: &SearchMatch, bbox: &BoundingBox) -> bool {
    match candidate.extent.crs84_bbox() {
        Ok(Some(extent)) => touches(&extent, bbox),
        Ok(None) => false,
        Err(e) => {
            debug!(product = %candidate.product.name, error = %e, "Skipping product with untransformable extent");
            false
        }
    }
}

// Edges count as overlap so point-like extents can still be found.
fn touches(a: &BoundingBox, b: &BoundingBox) -> bool {
    a.min_x <= b.max_x && a.max_x >= b.min_x && a.min_y <= b.max_y && a.max_y >= b.min_y
}

fn matches_text(product: &Product, term: &str) -> bool {
    let term = term.to_lowercase();
    product.name.to_lowercase().contains(&term)
        || product
            .description
            .as_deref()
            .is_some_and(|d| d.to_lowercase().contains(&term))
        || product
            .keywords
            .iter()
            .any(|k| k.to_lowercase().contains(&term))
}

fn matches_property(candidate: &SearchMatch, key: &str, expected: &str) -> bool {
    let product = &candidate.product;
    match key {
        "name" | "id" => product.name.eq_ignore_ascii_case(expected),
        "format" => {
            product
                .format
                .as_deref()
                .is_some_and(|f| f.eq_ignore_ascii_case(expected))
                || candidate
                    .extent
                    .formats
                    .iter()
                    .any(|f| f.eq_ignore_ascii_case(expected))
        }
        _ => product
            .properties
            .get(key)
            .is_some_and(|value| match value {
                serde_json::Value::String(s) => s.eq_ignore_ascii_case(expected),
                other => other.to_string().eq_ignore_ascii_case(expected),
            }),
    }
}
