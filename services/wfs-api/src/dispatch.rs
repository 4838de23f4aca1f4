//! Request resolution.
//!
//! Turns an inbound KVP or document request into the operation to execute.
//! Index queries are rewritten here: the operation returned is the hits query,
//! and the stored copy is parked in the request context where the capture
//! encoder picks it up. PageResults resolves to its own operation, which the
//! handler answers through the GetFeature execution path.

use tracing::debug;

use wfs_common::kvp::{parse_flag, RawKvp, POST_REQUEST, RESULT_TYPE_INDEX};
use wfs_common::{GetFeatureRequest, KvpMap, PageResultsRequest, WfsRequest, WfsResult};
use wfs_protocol::{apply_side_channel, rewrite_document, rewrite_kvp, Rewrite};

/// Parameters of the request being processed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestContext {
    /// Normalized parameters
    pub kvp: KvpMap,
    /// Parameters as received, plus side-channel entries
    pub raw_kvp: RawKvp,
    /// Base URL of the endpoint answering this request
    pub base_url: String,
}

impl RequestContext {
    /// Build a context from query string pairs.
    ///
    /// Side-channel keys are reserved; clients cannot set them.
    pub fn new<I>(params: I, base_url: impl Into<String>) -> Self
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let mut raw_kvp = RawKvp::new();
        for (key, value) in params {
            if key.eq_ignore_ascii_case(POST_REQUEST) || key.eq_ignore_ascii_case(RESULT_TYPE_INDEX) {
                debug!(key = %key, "Ignoring reserved parameter");
                continue;
            }
            raw_kvp.insert(key, value);
        }

        Self {
            kvp: KvpMap::from_raw(&raw_kvp),
            raw_kvp,
            base_url: base_url.into(),
        }
    }

    /// Whether this request is the hits half of an index query.
    pub fn is_index_capture(&self) -> bool {
        parse_flag(self.raw_kvp.get(RESULT_TYPE_INDEX).map(String::as_str))
    }
}

/// What to execute for a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    GetCapabilities,
    GetFeature(GetFeatureRequest),
    PageResults(PageResultsRequest),
}

impl Operation {
    pub fn name(&self) -> &'static str {
        match self {
            Operation::GetCapabilities => "GetCapabilities",
            Operation::GetFeature(_) => "GetFeature",
            Operation::PageResults(_) => "PageResults",
        }
    }
}

/// Resolve a KVP (GET) request.
pub fn resolve_kvp(ctx: &mut RequestContext) -> WfsResult<Operation> {
    let rewrite = rewrite_kvp(&ctx.kvp)?;
    Ok(resolve(rewrite, ctx))
}

/// Resolve a document (POST) request.
pub fn resolve_document(ctx: &mut RequestContext, body: &str) -> WfsResult<Operation> {
    let rewrite = rewrite_document(body)?;
    Ok(resolve(rewrite, ctx))
}

fn resolve(rewrite: Rewrite, ctx: &mut RequestContext) -> Operation {
    match rewrite {
        Rewrite::Index { executed, stored } => {
            apply_side_channel(stored, &mut ctx.kvp, &mut ctx.raw_kvp);
            Operation::GetFeature(executed)
        }
        Rewrite::Unchanged(WfsRequest::GetFeature(request)) => Operation::GetFeature(request),
        Rewrite::Unchanged(WfsRequest::PageResults(page)) => Operation::PageResults(page),
        Rewrite::Unchanged(WfsRequest::GetCapabilities { .. }) => Operation::GetCapabilities,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_utils::{get_feature_document, get_feature_kvp, index_document};
    use wfs_common::ResultType;

    fn ctx(params: Vec<(String, String)>) -> RequestContext {
        RequestContext::new(params, "http://localhost/wfs")
    }

    #[test]
    fn test_reserved_keys_are_dropped() {
        let mut params = get_feature_kvp("roads", "hits");
        params.push(("result_type_index".to_string(), "true".to_string()));
        params.push(("POST_REQUEST".to_string(), "<x/>".to_string()));

        let ctx = ctx(params);
        assert!(!ctx.is_index_capture());
        assert!(!ctx.kvp.contains(POST_REQUEST));
        assert_eq!(ctx.raw_kvp.len(), 5);
    }

    #[test]
    fn test_kvp_index_query_sets_flag() {
        let mut ctx = ctx(get_feature_kvp("roads", "index"));
        let op = resolve_kvp(&mut ctx).unwrap();

        match op {
            Operation::GetFeature(request) => assert_eq!(request.result_type, ResultType::Hits),
            other => panic!("unexpected {:?}", other),
        }
        assert!(ctx.is_index_capture());
        assert_eq!(ctx.kvp.get("RESULTTYPE"), Some("results"));
        assert_eq!(ctx.raw_kvp.get("resultType").map(String::as_str), Some("index"));
    }

    #[test]
    fn test_document_index_query_parks_document() {
        let mut ctx = ctx(Vec::new());
        let op = resolve_document(&mut ctx, &index_document("roads")).unwrap();

        assert!(matches!(op, Operation::GetFeature(ref r) if r.result_type == ResultType::Hits));
        assert!(ctx.is_index_capture());
        let stored = ctx.raw_kvp.get(POST_REQUEST).unwrap();
        assert_eq!(stored, &get_feature_document("roads", "results", None));
    }

    #[test]
    fn test_plain_hits_is_not_captured() {
        let mut ctx = ctx(get_feature_kvp("roads", "hits"));
        resolve_kvp(&mut ctx).unwrap();
        assert!(!ctx.is_index_capture());
    }

    #[test]
    fn test_page_results_kvp() {
        let mut ctx = ctx(vec![
            ("service".to_string(), "WFS".to_string()),
            ("request".to_string(), "PageResults".to_string()),
            ("resultSetID".to_string(), "abc".to_string()),
            ("count".to_string(), "5".to_string()),
        ]);

        match resolve_kvp(&mut ctx).unwrap() {
            Operation::PageResults(page) => {
                assert_eq!(page.result_set_id, "abc");
                assert_eq!(page.count, Some(5));
            }
            other => panic!("unexpected {:?}", other),
        }
    }
}
