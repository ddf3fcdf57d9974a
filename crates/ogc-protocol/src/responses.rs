//! Landing page, conformance and exception documents.

use serde::{Deserialize, Serialize};

use crate::conformance;
use crate::media_types;
use crate::types::Link;

/// Landing page response for the API root.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LandingPage {
    pub title: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    pub links: Vec<Link>,
}

impl LandingPage {
    /// Create a new landing page with standard links.
    pub fn new(title: impl Into<String>, description: Option<String>, base_url: &str) -> Self {
        let links = vec![
            Link::new(base_url, "self")
                .with_type(media_types::JSON)
                .with_title("This document"),
            Link::new(format!("{}/conformance", base_url), "conformance")
                .with_type(media_types::JSON)
                .with_title("Conformance classes"),
            Link::new(format!("{}/collections", base_url), "data")
                .with_type(media_types::JSON)
                .with_title("Collections"),
        ];

        Self {
            title: title.into(),
            description,
            links,
        }
    }
}

/// Conformance declaration response.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConformanceClasses {
    #[serde(rename = "conformsTo")]
    pub conforms_to: Vec<String>,
}

impl ConformanceClasses {
    /// Conformance classes of this server.
    pub fn current() -> Self {
        let classes = [
            conformance::CORE,
            conformance::COLLECTIONS,
            conformance::JSON,
            conformance::COVERAGES_CORE,
            conformance::COVERAGES_SUBSET,
            conformance::COVERAGES_RANGE_SUBSET,
            conformance::COVERAGES_COVJSON,
            conformance::COVERAGES_GEOTIFF,
            conformance::RECORDS_CORE,
            conformance::RECORDS_JSON,
        ];

        Self {
            conforms_to: classes.into_iter().map(str::to_string).collect(),
        }
    }

    /// Add a conformance class.
    pub fn with_class(mut self, class: &str) -> Self {
        if !self.contains(class) {
            self.conforms_to.push(class.to_string());
        }
        self
    }

    pub fn contains(&self, class: &str) -> bool {
        self.conforms_to.iter().any(|c| c == class)
    }
}

/// Exception response for errors.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExceptionResponse {
    /// Exception type identifier.
    #[serde(rename = "type")]
    pub type_: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,

    /// URI of the request that caused the error.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instance: Option<String>,
}

impl ExceptionResponse {
    pub fn new(type_: impl Into<String>, status: u16, detail: impl Into<String>) -> Self {
        Self {
            type_: type_.into(),
            title: None,
            status: Some(status),
            detail: Some(detail.into()),
            instance: None,
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_instance(mut self, instance: impl Into<String>) -> Self {
        self.instance = Some(instance.into());
        self
    }

    /// Create a 404 Not Found exception.
    pub fn not_found(detail: impl Into<String>) -> Self {
        Self::new(
            "http://www.opengis.net/def/exceptions/ogcapi-common-1/1.0/not-found",
            404,
            detail,
        )
        .with_title("Not Found")
    }

    /// Create a 400 Bad Request exception.
    pub fn bad_request(detail: impl Into<String>) -> Self {
        Self::new(
            "http://www.opengis.net/def/exceptions/ogcapi-common-1/1.0/invalid-parameter-value",
            400,
            detail,
        )
        .with_title("Bad Request")
    }

    /// Create a 413 Payload Too Large exception.
    pub fn payload_too_large(detail: impl Into<String>) -> Self {
        Self::new(
            "http://www.opengis.net/def/exceptions/ogcapi-common-1/1.0/response-too-large",
            413,
            detail,
        )
        .with_title("Payload Too Large")
    }

    /// Create a 500 Internal Server Error exception.
    pub fn internal_error(detail: impl Into<String>) -> Self {
        Self::new(
            "http://www.opengis.net/def/exceptions/ogcapi-common-1/1.0/server-error",
            500,
            detail,
        )
        .with_title("Internal Server Error")
    }

    /// Create a 503 Service Unavailable exception.
    pub fn service_unavailable(detail: impl Into<String>) -> Self {
        Self::new(
            "http://www.opengis.net/def/exceptions/ogcapi-common-1/1.0/service-unavailable",
            503,
            detail,
        )
        .with_title("Service Unavailable")
    }

    /// Map an HTTP status onto the matching exception type.
    pub fn for_status(status: u16, detail: impl Into<String>) -> Self {
        match status {
            400 => Self::bad_request(detail),
            404 => Self::not_found(detail),
            413 => Self::payload_too_large(detail),
            503 => Self::service_unavailable(detail),
            _ => Self::internal_error(detail),
        }
    }
}
