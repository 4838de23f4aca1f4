//! Hits encoding for index queries.
//!
//! When the hits half of an index query is answered, a result set is created
//! for the stored request and its token is stamped onto the hits document.
//! The token is only returned once the result set is durably stored.

use chrono::Utc;
use std::sync::Arc;
use tracing::{info, instrument, warn};

use storage::{mint_token, CursorStore, StoredRequestSnapshot};
use wfs_common::{GetFeatureRequest, WfsError, WfsResult};
use wfs_protocol::{encode_hits, inject_result_set_id, InjectOutcome};

use crate::dispatch::RequestContext;
use crate::metrics::WfsMetrics;

/// A hits document carrying a new result set token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapturedHits {
    pub token: String,
    pub document: String,
}

/// Creates result sets while encoding hits responses.
pub struct IndexCaptureEncoder {
    cursors: Arc<CursorStore>,
    metrics: Arc<WfsMetrics>,
}

impl IndexCaptureEncoder {
    pub fn new(cursors: Arc<CursorStore>, metrics: Arc<WfsMetrics>) -> Self {
        Self { cursors, metrics }
    }

    /// Store the in-flight request under a new token and encode the hits
    /// response for it.
    #[instrument(skip_all, fields(type_names = ?request.type_names))]
    pub async fn encode(
        &self,
        request: &GetFeatureRequest,
        number_matched: u64,
        ctx: &RequestContext,
    ) -> WfsResult<CapturedHits> {
        let token = mint_token();
        let snapshot = StoredRequestSnapshot::capture(&ctx.kvp, &ctx.raw_kvp);

        if let Err(e) = self.cursors.create_cursor(&token, &snapshot).await {
            self.metrics.record_cursor_error("create");
            return Err(WfsError::index_capture("Failed to store result set", e));
        }
        self.metrics.record_cursor_created();

        let hits = encode_hits(request, number_matched, Utc::now());
        let document = match inject_result_set_id(&hits, &token)
            .map_err(|e| WfsError::index_capture("Failed to encode hits response", e))?
        {
            InjectOutcome::Injected(document) => document,
            InjectOutcome::Skipped {
                document,
                collections,
            } => {
                warn!(token = %token, collections, "Hits response carries no result set id");
                document
            }
        };

        info!(token = %token, matched = number_matched, "Issued result set");
        Ok(CapturedHits { token, document })
    }
}
