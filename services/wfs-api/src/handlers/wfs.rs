//! WFS request handlers.
//!
//! This module handles WFS 2.0 (and 1.1 GetFeature) requests:
//! - GetCapabilities: service metadata and served feature types
//! - GetFeature: results, hits, and index queries that issue a result set
//! - PageResults: pages of a previously issued result set

use axum::{
    body::Bytes,
    extract::{Extension, Query},
    http::HeaderMap,
    response::Response,
};
use chrono::Utc;
use std::sync::Arc;
use tracing::instrument;

use wfs_common::{GetFeatureRequest, ResultType, WfsError, WfsResult};
use wfs_protocol::response::GML_32_CONTENT_TYPE;
use wfs_protocol::{encode_capabilities, encode_hits, encode_results, FeatureResult};

use super::common::{document_response, request_base_url, wfs_exception, XML_CONTENT_TYPE};
use crate::dispatch::{resolve_document, resolve_kvp, Operation, RequestContext};
use crate::state::AppState;

// ============================================================================
// Handler Entry Points
// ============================================================================

/// GET /wfs - KVP requests
#[instrument(skip_all)]
pub async fn wfs_get_handler(
    Extension(state): Extension<Arc<AppState>>,
    headers: HeaderMap,
    Query(params): Query<Vec<(String, String)>>,
) -> Response {
    let mut ctx = RequestContext::new(params, request_base_url(&headers, &state.base_url));

    match resolve_kvp(&mut ctx) {
        Ok(operation) => respond(&state, &ctx, operation).await,
        Err(e) => exception(&state, &e),
    }
}

/// POST /wfs - XML request documents
#[instrument(skip_all)]
pub async fn wfs_post_handler(
    Extension(state): Extension<Arc<AppState>>,
    headers: HeaderMap,
    Query(params): Query<Vec<(String, String)>>,
    body: Bytes,
) -> Response {
    let mut ctx = RequestContext::new(params, request_base_url(&headers, &state.base_url));

    let document = match std::str::from_utf8(&body) {
        Ok(text) if !text.trim().is_empty() => text,
        Ok(_) => {
            return exception(
                &state,
                &WfsError::MissingParameter("request document".to_string()),
            )
        }
        Err(e) => {
            return exception(
                &state,
                &WfsError::XmlParse(format!("request body is not UTF-8: {}", e)),
            )
        }
    };

    match resolve_document(&mut ctx, document) {
        Ok(operation) => respond(&state, &ctx, operation).await,
        Err(e) => exception(&state, &e),
    }
}

// ============================================================================
// Execution
// ============================================================================

async fn respond(state: &AppState, ctx: &RequestContext, operation: Operation) -> Response {
    state.metrics.record_request(operation.name());

    match execute(state, ctx, operation).await {
        Ok(response) => response,
        Err(e) => exception(state, &e),
    }
}

fn exception(state: &AppState, err: &WfsError) -> Response {
    state.metrics.record_request_error(err.ows_exception_code());
    wfs_exception(err)
}

async fn execute(
    state: &AppState,
    ctx: &RequestContext,
    operation: Operation,
) -> WfsResult<Response> {
    match operation {
        Operation::GetCapabilities => {
            let xml = encode_capabilities(&ctx.base_url, &state.executor.type_names());
            Ok(document_response(xml, XML_CONTENT_TYPE))
        }
        Operation::GetFeature(mut request) => {
            request.set_base_url(&ctx.base_url);
            let result = state.executor.execute(&request).await?;

            if request.result_type == ResultType::Hits && ctx.is_index_capture() {
                let captured = state
                    .capture
                    .encode(&request, result.number_matched, ctx)
                    .await?;
                return Ok(document_response(captured.document, GML_32_CONTENT_TYPE));
            }

            encode(&request, &result)
        }
        // Answered through the GetFeature path with the stored request
        Operation::PageResults(page) => {
            let paged = state.paging.page_results(&page, &ctx.base_url).await?;
            encode(&paged.request, &paged.result)
        }
    }
}

fn encode(request: &GetFeatureRequest, result: &FeatureResult) -> WfsResult<Response> {
    let now = Utc::now();

    if request.result_type == ResultType::Hits {
        let xml = encode_hits(request, result.number_matched, now);
        return Ok(document_response(xml, GML_32_CONTENT_TYPE));
    }

    let (body, content_type) = encode_results(result, request, now)?;
    Ok(document_response(body, content_type))
}
