//! PageResults: replaying a stored index query.
//!
//! The stored request is rebuilt with the same readers first-class requests
//! go through, paging parameters from the current request are laid over it,
//! and the result is executed like any other GetFeature.

use std::sync::Arc;
use tracing::{debug, instrument};

use storage::{CursorStore, StoredRequestSnapshot};
use wfs_common::{
    GetFeatureRequest, KvpMap, PageResultsRequest, ResultType, WfsError, WfsRequest, WfsResult,
    DEFAULT_COUNT, DEFAULT_OUTPUT_FORMAT, DEFAULT_START_INDEX,
};
use wfs_protocol::{kvp_reader, xml_reader, FeatureResult};

use crate::executor::FeatureQueryExecutor;
use crate::metrics::WfsMetrics;

/// A page of a result set and the request that produced it.
#[derive(Debug, Clone)]
pub struct PagedResult {
    pub request: GetFeatureRequest,
    pub result: FeatureResult,
}

/// Answers PageResults requests.
pub struct PagingService {
    cursors: Arc<CursorStore>,
    executor: Arc<dyn FeatureQueryExecutor>,
    metrics: Arc<WfsMetrics>,
}

impl PagingService {
    pub fn new(
        cursors: Arc<CursorStore>,
        executor: Arc<dyn FeatureQueryExecutor>,
        metrics: Arc<WfsMetrics>,
    ) -> Self {
        Self {
            cursors,
            executor,
            metrics,
        }
    }

    /// Fetch one page of the result set named by `page.result_set_id`.
    ///
    /// Unknown and unreadable result sets are reported as they come from the
    /// cursor store; failures after that are wrapped as page retrieval errors.
    /// A stored request that cannot be rebuilt leaves `updated` untouched.
    #[instrument(skip(self, page), fields(token = %page.result_set_id))]
    pub async fn page_results(
        &self,
        page: &PageResultsRequest,
        base_url: &str,
    ) -> WfsResult<PagedResult> {
        if page.result_type == Some(ResultType::Index) {
            return Err(WfsError::InvalidParameter {
                param: "resultType".to_string(),
                message: "a result set cannot be indexed again".to_string(),
            });
        }

        let token = page.result_set_id.as_str();
        let rebuilt = self
            .cursors
            .load_and_touch_with(token, |snapshot| {
                reconstruct(token, &snapshot).map_err(|e| {
                    WfsError::page_retrieval(format!("Failed to rebuild result set {}", token), e)
                })
            })
            .await;
        let mut request = match rebuilt {
            Ok(request) => {
                self.metrics.record_cursor_load();
                request
            }
            Err(e) => {
                self.metrics.record_cursor_error("load");
                return Err(e);
            }
        };

        apply_overrides(&mut request, page);
        request.set_base_url(base_url);

        debug!(
            start_index = ?request.start_index,
            count = ?request.count,
            result_type = %request.result_type,
            "Executing stored query"
        );

        let mut result = self.executor.execute(&request).await.map_err(|e| {
            WfsError::page_retrieval(format!("Failed to retrieve page of result set {}", token), e)
        })?;

        if request.result_type == ResultType::Results {
            add_page_links(&mut result, &request, token, base_url);
        }

        Ok(PagedResult { request, result })
    }
}

/// Rebuild the GetFeature request a result set was created from.
pub fn reconstruct(token: &str, snapshot: &StoredRequestSnapshot) -> WfsResult<GetFeatureRequest> {
    let parsed = match &snapshot.document {
        Some(document) => xml_reader::read_request(document),
        None => kvp_reader::read_request(
            &KvpMap::from_raw(&snapshot.raw_kvp).merged_with(&snapshot.kvp),
        ),
    };

    let corrupt = |message: String| WfsError::CursorCorrupt {
        token: token.to_string(),
        message,
    };

    match parsed {
        Ok(WfsRequest::GetFeature(request)) if request.result_type != ResultType::Index => {
            Ok(request)
        }
        Ok(WfsRequest::GetFeature(_)) => Err(corrupt("stored request is an index query".to_string())),
        Ok(other) => Err(corrupt(format!(
            "stored request is a {} request",
            other.operation_name()
        ))),
        Err(e) => Err(corrupt(e.to_string())),
    }
}

/// Lay paging parameters over a reconstructed request.
///
/// Each field takes the current request's value, else the stored value, else
/// the default.
pub fn apply_overrides(request: &mut GetFeatureRequest, page: &PageResultsRequest) {
    request.start_index = Some(
        page.start_index
            .or(request.start_index)
            .unwrap_or(DEFAULT_START_INDEX),
    );
    request.count = Some(page.count.or(request.count).unwrap_or(DEFAULT_COUNT));
    request.output_format = Some(
        page.output_format
            .clone()
            .or_else(|| request.output_format.take())
            .unwrap_or_else(|| DEFAULT_OUTPUT_FORMAT.to_string()),
    );
    request.result_type = page.result_type.unwrap_or(request.result_type);
}

fn page_link(base_url: &str, token: &str, request: &GetFeatureRequest, start: u64) -> String {
    format!(
        "{}?service=WFS&version={}&request=PageResults&resultSetID={}&startIndex={}&count={}&outputFormat={}",
        base_url,
        request.version,
        token,
        start,
        request.effective_count(),
        urlencoding::encode(request.effective_output_format())
    )
}

fn add_page_links(result: &mut FeatureResult, request: &GetFeatureRequest, token: &str, base_url: &str) {
    let start = request.effective_start_index();
    let count = request.effective_count();

    if count > 0 && start.saturating_add(result.number_returned()) < result.number_matched {
        result.next = Some(page_link(base_url, token, request, start.saturating_add(count)));
    }
    if start > 0 {
        result.previous = Some(page_link(
            base_url,
            token,
            request,
            start.saturating_sub(count),
        ));
    }
}
