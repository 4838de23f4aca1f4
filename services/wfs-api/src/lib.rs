//! WFS API Service Library
//!
//! HTTP server for OGC WFS with resumable result sets: a GetFeature with
//! `resultType=index` answers with counts and a `resultSetID`, and PageResults
//! requests fetch pages of that result set later.

pub mod capture;
pub mod cleanup;
pub mod config;
pub mod dispatch;
pub mod executor;
pub mod handlers;
pub mod metrics;
pub mod paging;
pub mod state;

use axum::{routing::get, Extension, Router};
use std::sync::Arc;
use tower_http::{compression::CompressionLayer, cors::CorsLayer, trace::TraceLayer};

use state::AppState;

/// Build the service router.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        // WFS endpoint
        .route(
            "/wfs",
            get(handlers::wfs_get_handler).post(handlers::wfs_post_handler),
        )
        // Health and metrics
        .route("/health", get(handlers::health_handler))
        .route("/ready", get(handlers::ready_handler))
        .route("/metrics", get(handlers::metrics_handler))
        .route("/api/metrics", get(handlers::api_metrics_handler))
        // Middleware
        .layer(Extension(state))
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .layer(CorsLayer::permissive())
}
