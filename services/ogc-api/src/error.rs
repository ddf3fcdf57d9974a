//! Mapping of library errors onto HTTP exception responses.

use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};
use cube_common::CubeError;
use ogc_protocol::{ExceptionResponse, QueryParseError};
use tracing::{error, warn};

/// Handler error rendered as an OGC exception document.
#[derive(Debug)]
pub struct ApiError(pub CubeError);

impl ApiError {
    pub fn status(&self) -> StatusCode {
        StatusCode::from_u16(self.0.http_status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }
}

impl From<CubeError> for ApiError {
    fn from(err: CubeError) -> Self {
        ApiError(err)
    }
}

impl From<QueryParseError> for ApiError {
    fn from(err: QueryParseError) -> Self {
        ApiError(err.into())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(code = self.0.code(), error = %self.0, "Request failed");
        } else {
            warn!(code = self.0.code(), error = %self.0, "Request rejected");
        }

        let exc = ExceptionResponse::for_status(status.as_u16(), self.0.to_string())
            .with_title(self.0.code());
        exception_response(status, &exc)
    }
}

/// Serialize an exception document with the given status.
pub fn exception_response(status: StatusCode, exc: &ExceptionResponse) -> Response {
    let json = serde_json::to_string(exc).unwrap_or_default();
    (status, [(header::CONTENT_TYPE, "application/json")], json).into_response()
}
