//! Collection metadata documents.
//!
//! Each configured resource is published as a collection; its links point at
//! the coverage or records endpoints depending on the provider binding.

use serde::{Deserialize, Serialize};

use crate::config::{ProviderBinding, ResourceDescriptor};
use crate::media_types;
use crate::types::{Extent, Link, SpatialExtent, TemporalExtent};

/// A list of collections.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CollectionList {
    pub links: Vec<Link>,
    pub collections: Vec<Collection>,
}

impl CollectionList {
    pub fn new(collections: Vec<Collection>, base_url: &str) -> Self {
        Self {
            links: vec![Link::new(format!("{}/collections", base_url), "self")
                .with_type(media_types::JSON)],
            collections,
        }
    }
}

/// A collection document.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Collection {
    pub id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub keywords: Vec<String>,

    pub links: Vec<Link>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extent: Option<Extent>,

    /// `record` for catalog collections.
    #[serde(rename = "itemType", default, skip_serializing_if = "Option::is_none")]
    pub item_type: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub crs: Vec<String>,
}

impl Collection {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: None,
            description: None,
            keywords: Vec::new(),
            links: Vec::new(),
            extent: None,
            item_type: None,
            crs: Vec::new(),
        }
    }

    /// Build the collection document for a configured resource.
    pub fn from_descriptor(id: &str, descriptor: &ResourceDescriptor, base_url: &str) -> Self {
        let collection_url = format!("{}/collections/{}", base_url, id);

        let spatial = SpatialExtent {
            bbox: vec![descriptor.extents.spatial.bbox.to_vec()],
            crs: descriptor.extents.spatial.crs.clone(),
        };
        let temporal = descriptor.extents.temporal.as_ref().map(|t| {
            TemporalExtent::new(
                t.begin.map(|b| cube_common::format_datetime(&b)),
                t.end.map(|e| cube_common::format_datetime(&e)),
            )
        });

        let mut links = vec![
            Link::new(&collection_url, "self").with_type(media_types::JSON),
            Link::new(base_url, "root").with_type(media_types::JSON),
        ];
        let mut item_type = None;

        for provider in &descriptor.providers {
            match provider {
                ProviderBinding::Coverage { format, .. } => {
                    links.push(
                        Link::new(format!("{}/coverage", collection_url), media_types::REL_COVERAGE)
                            .with_type(media_types::COVERAGE_JSON)
                            .with_title("Coverage data"),
                    );
                    links.push(
                        Link::new(format!("{}/coverage?f={}", collection_url, format.name), media_types::REL_COVERAGE)
                            .with_type(format.mimetype.clone())
                            .with_title(format!("Coverage data as {}", format.name)),
                    );
                    links.push(
                        Link::new(format!("{}/coverage/domainset", collection_url), media_types::REL_DOMAINSET)
                            .with_type(media_types::JSON)
                            .with_title("Coverage domain set"),
                    );
                    links.push(
                        Link::new(format!("{}/coverage/rangetype", collection_url), media_types::REL_RANGETYPE)
                            .with_type(media_types::JSON)
                            .with_title("Coverage range type"),
                    );
                }
                ProviderBinding::Record { .. } => {
                    item_type = Some("record".to_string());
                    links.push(
                        Link::new(format!("{}/items", collection_url), "items")
                            .with_type(media_types::GEO_JSON)
                            .with_title("Records"),
                    );
                }
                ProviderBinding::Unsupported => {}
            }
        }
        links.extend(descriptor.links.iter().cloned());

        Self {
            id: id.to_string(),
            title: Some(descriptor.title.clone()),
            description: (!descriptor.description.is_empty())
                .then(|| descriptor.description.clone()),
            keywords: descriptor.keywords.clone(),
            links,
            extent: Some(Extent {
                spatial: Some(spatial),
                temporal,
            }),
            item_type,
            crs: vec![descriptor.extents.spatial.crs.clone()],
        }
    }
}
