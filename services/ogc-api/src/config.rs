//! Resource registry loaded from the configuration document.

use std::path::Path;

use anyhow::{Context, Result};
use ogc_protocol::{ConfigDocument, ProviderBinding, ResourceDescriptor};
use tracing::{info, warn};

/// Default service title when the document has none.
pub const DEFAULT_TITLE: &str = "Data Cube OGC API";

/// Published resources, in document order.
#[derive(Debug, Clone, Default)]
pub struct ResourceRegistry {
    resources: Vec<(String, ResourceDescriptor)>,
    pub title: String,
    pub description: Option<String>,
    pub server_url: Option<String>,
}

impl ResourceRegistry {
    /// Read and index a configuration file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read configuration: {:?}", path))?;
        let document = ConfigDocument::from_yaml_str(&content)
            .with_context(|| format!("Failed to parse configuration: {:?}", path))?;
        let registry = Self::from_document(&document);
        info!(
            path = ?path,
            resources = registry.len(),
            "Loaded resource configuration"
        );
        Ok(registry)
    }

    /// Index the resources of a document.
    ///
    /// Entries that do not parse as resource descriptors are skipped with a
    /// warning.
    pub fn from_document(document: &ConfigDocument) -> Self {
        let mut resources = Vec::new();
        for (key, descriptor) in document.descriptors() {
            match descriptor {
                Ok(d) => resources.push((key, d)),
                Err(e) => warn!(resource = %key, error = %e, "Skipping unreadable resource"),
            }
        }

        Self {
            resources,
            title: document.title().unwrap_or(DEFAULT_TITLE).to_string(),
            description: document.description().map(str::to_string),
            server_url: document.server_url().map(str::to_string),
        }
    }

    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ResourceDescriptor)> {
        self.resources.iter().map(|(k, d)| (k.as_str(), d))
    }

    pub fn get(&self, id: &str) -> Option<&ResourceDescriptor> {
        self.resources.iter().find(|(k, _)| k == id).map(|(_, d)| d)
    }

    /// Product served by a coverage resource.
    pub fn coverage_product(&self, id: &str) -> Option<&str> {
        match self.get(id)?.coverage_provider()? {
            ProviderBinding::Coverage { data, .. } => Some(data.as_str()),
            _ => None,
        }
    }

    /// `(product, collection id)` of every coverage resource.
    pub fn coverage_collections(&self) -> Vec<(String, String)> {
        self.iter()
            .filter_map(|(id, _)| {
                self.coverage_product(id)
                    .map(|product| (product.to_string(), id.to_string()))
            })
            .collect()
    }

    /// Whether `id` is a records resource.
    pub fn is_records(&self, id: &str) -> bool {
        self.get(id).is_some_and(|d| d.record_provider().is_some())
    }
}
