//! Response helpers shared by the WFS handlers.

use axum::{
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use tracing::{error, warn};

use wfs_common::WfsError;
use wfs_protocol::error_report;

/// Content type of exception reports and capabilities.
pub const XML_CONTENT_TYPE: &str = "application/xml";

/// A 200 response with the given body and content type.
pub fn document_response(body: String, content_type: &str) -> Response {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, content_type.to_string())],
        body,
    )
        .into_response()
}

/// OWS exception report for an error, with the error's HTTP status.
pub fn wfs_exception(err: &WfsError) -> Response {
    let status =
        StatusCode::from_u16(err.http_status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

    if status.is_server_error() {
        error!(error = %err, cause = %err.root_cause(), "Request failed");
    } else {
        warn!(error = %err, "Request rejected");
    }

    (
        status,
        [(header::CONTENT_TYPE, XML_CONTENT_TYPE)],
        error_report(err),
    )
        .into_response()
}

/// Base URL of the endpoint as the client addressed it.
///
/// Falls back to the configured URL when the request has no Host header.
pub fn request_base_url(headers: &HeaderMap, configured: &str) -> String {
    let Some(host) = headers.get(header::HOST).and_then(|h| h.to_str().ok()) else {
        return configured.to_string();
    };
    let scheme = headers
        .get("x-forwarded-proto")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("http");
    format!("{}://{}/wfs", scheme, host)
}
