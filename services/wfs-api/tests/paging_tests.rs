//! End-to-end tests for index queries and PageResults over HTTP.

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use std::sync::Arc;
use tower::ServiceExt;

use storage::{BlobStorage, CursorStore, MemoryFeatureStore};
use test_utils::{
    extract_result_set_id, get_feature_document, index_document, point_layer, UNKNOWN_TOKEN,
};
use wfs_api::build_router;
use wfs_api::executor::{parse_feature_collection, LayerCatalog};
use wfs_api::state::AppState;

const LAYER_SIZE: usize = 23;

struct TestApp {
    router: Router,
    state: Arc<AppState>,
}

struct TestResponse {
    status: StatusCode,
    content_type: String,
    body: String,
}

impl TestResponse {
    fn members(&self) -> usize {
        self.body.matches("<wfs:member>").count()
    }
}

fn app() -> TestApp {
    let mut catalog = LayerCatalog::new();
    catalog.insert_layer(
        "topp:roads",
        parse_feature_collection(&point_layer(LAYER_SIZE)).unwrap(),
    );
    let cursors = Arc::new(CursorStore::new(
        Arc::new(MemoryFeatureStore::new()),
        BlobStorage::in_memory(),
    ));
    let state = Arc::new(AppState::from_parts(
        cursors,
        Arc::new(catalog),
        "http://localhost:8084/wfs",
    ));

    TestApp {
        router: build_router(Arc::clone(&state)),
        state,
    }
}

impl TestApp {
    async fn send(&self, request: Request<Body>) -> TestResponse {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();

        TestResponse {
            status,
            content_type,
            body: String::from_utf8(bytes.to_vec()).unwrap(),
        }
    }

    async fn get(&self, query: &str) -> TestResponse {
        let request = Request::builder()
            .uri(format!("/wfs?{}", query))
            .body(Body::empty())
            .unwrap();
        self.send(request).await
    }

    async fn post(&self, document: &str) -> TestResponse {
        let request = Request::builder()
            .method("POST")
            .uri("/wfs")
            .header(header::CONTENT_TYPE, "text/xml")
            .body(Body::from(document.to_string()))
            .unwrap();
        self.send(request).await
    }

    async fn page(&self, token: &str, extra: &str) -> TestResponse {
        self.get(&format!(
            "service=WFS&version=2.0.0&request=PageResults&resultSetID={}{}",
            token, extra
        ))
        .await
    }

    async fn result_set_count(&self) -> u64 {
        self.state.cursors.count().await.unwrap()
    }
}

// ============================================================================
// Index queries
// ============================================================================

#[tokio::test]
async fn test_index_document_then_page() {
    let app = app();

    let hits = app.post(&index_document("topp:roads")).await;
    assert_eq!(hits.status, StatusCode::OK);
    assert!(hits.body.contains(&format!(r#"numberMatched="{}""#, LAYER_SIZE)));
    assert!(hits.body.contains(r#"numberReturned="0""#));
    assert_eq!(hits.members(), 0);

    let token = extract_result_set_id(&hits.body).expect("hits response has a resultSetID");
    assert!(wfs_common::is_valid_token(&token));
    assert_eq!(app.result_set_count().await, 1);

    let page = app.page(&token, "&startIndex=0&count=5").await;
    assert_eq!(page.status, StatusCode::OK);
    assert_eq!(page.content_type, "application/gml+xml; version=3.2");
    assert_eq!(page.members(), 5);
    assert!(page.body.contains(&format!(r#"numberMatched="{}""#, LAYER_SIZE)));
    assert!(page.body.contains("roads.1"));
    assert!(page.body.contains("startIndex=5&amp;count=5"));
}

#[tokio::test]
async fn test_wfs11_index_document_reports_number_of_features() {
    let app = app();
    let document = r#"<wfs:GetFeature service="WFS" version="1.1.0" resultType="index" maxFeatures="4" xmlns:wfs="http://www.opengis.net/wfs"><wfs:Query typeName="roads"/></wfs:GetFeature>"#;

    let hits = app.post(document).await;
    assert_eq!(hits.status, StatusCode::OK);
    assert!(hits.body.contains(&format!(r#"numberOfFeatures="{}""#, LAYER_SIZE)));
    let token = extract_result_set_id(&hits.body).unwrap();

    // Stored maxFeatures is the page size when the follow-up gives none
    let page = app.page(&token, "").await;
    assert_eq!(page.members(), 4);
}

#[tokio::test]
async fn test_index_kvp_then_page_with_stored_count() {
    let app = app();

    let hits = app
        .get("service=WFS&version=2.0.0&request=GetFeature&typeNames=roads&resultType=index&count=4")
        .await;
    assert_eq!(hits.status, StatusCode::OK);
    let token = extract_result_set_id(&hits.body).unwrap();

    let page = app.page(&token, "").await;
    assert_eq!(page.members(), 4);

    let page = app.page(&token, "&count=10").await;
    assert_eq!(page.members(), 10);
}

#[tokio::test]
async fn test_page_defaults_without_stored_values() {
    let app = app();
    let hits = app.post(&index_document("roads")).await;
    let token = extract_result_set_id(&hits.body).unwrap();

    let page = app.page(&token, "").await;
    assert_eq!(page.status, StatusCode::OK);
    assert_eq!(page.members(), 10);
    assert_eq!(page.content_type, "application/gml+xml; version=3.2");
    assert!(page.body.contains("roads.1\""));
    assert!(!page.body.contains(" previous="));
}

#[tokio::test]
async fn test_last_page_has_no_next_link() {
    let app = app();
    let hits = app.post(&index_document("roads")).await;
    let token = extract_result_set_id(&hits.body).unwrap();

    let page = app.page(&token, "&startIndex=20&count=5").await;
    assert_eq!(page.members(), 3);
    assert!(!page.body.contains(" next="));
    assert!(page.body.contains("startIndex=15&amp;count=5"));
}

#[tokio::test]
async fn test_output_format_precedence() {
    let app = app();
    let hits = app
        .get("service=WFS&request=GetFeature&typeNames=roads&resultType=index&outputFormat=application/json")
        .await;
    let token = extract_result_set_id(&hits.body).unwrap();

    let stored = app.page(&token, "&count=2").await;
    assert_eq!(stored.content_type, "application/json");
    let json: serde_json::Value = serde_json::from_str(&stored.body).unwrap();
    assert_eq!(json["numberReturned"], 2);
    assert_eq!(json["numberMatched"], LAYER_SIZE);

    let overridden = app
        .page(&token, "&count=2&outputFormat=application%2Fgml%2Bxml%3B%20version%3D3.2")
        .await;
    assert_eq!(overridden.content_type, "application/gml+xml; version=3.2");
    assert_eq!(overridden.members(), 2);
}

#[tokio::test]
async fn test_page_results_document() {
    let app = app();
    let hits = app.post(&index_document("roads")).await;
    let token = extract_result_set_id(&hits.body).unwrap();

    let document = format!(
        r#"<wfs:PageResults xmlns:wfs="http://www.opengis.net/wfs/2.0" service="WFS" version="2.0.0" resultSetID="{}" startIndex="21" count="5"/>"#,
        token
    );
    let page = app.post(&document).await;
    assert_eq!(page.status, StatusCode::OK);
    assert_eq!(page.members(), 2);
}

#[tokio::test]
async fn test_page_hits_override() {
    let app = app();
    let hits = app.post(&index_document("roads")).await;
    let token = extract_result_set_id(&hits.body).unwrap();

    let page = app.page(&token, "&resultType=hits").await;
    assert_eq!(page.status, StatusCode::OK);
    assert_eq!(page.members(), 0);
    assert!(page.body.contains(&format!(r#"numberMatched="{}""#, LAYER_SIZE)));
    assert!(extract_result_set_id(&page.body).is_none());
    assert_eq!(app.result_set_count().await, 1);
}

#[tokio::test]
async fn test_page_touches_result_set() {
    let app = app();
    let hits = app.post(&index_document("roads")).await;
    let token = extract_result_set_id(&hits.body).unwrap();
    let created = app.state.cursors.record(&token).await.unwrap().unwrap();

    tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    app.page(&token, "&count=1").await;

    let touched = app.state.cursors.record(&token).await.unwrap().unwrap();
    assert_eq!(touched.created, created.created);
    assert!(touched.updated > created.updated);
}

#[tokio::test]
async fn test_each_index_query_gets_its_own_result_set() {
    let app = app();
    let first = app.post(&index_document("roads")).await;
    let second = app.post(&index_document("roads")).await;

    assert_ne!(
        extract_result_set_id(&first.body),
        extract_result_set_id(&second.body)
    );
    assert_eq!(app.result_set_count().await, 2);
}

// ============================================================================
// Requests that do not issue result sets
// ============================================================================

#[tokio::test]
async fn test_plain_hits_issue_no_result_set() {
    let app = app();
    let hits = app
        .post(&get_feature_document("roads", "hits", None))
        .await;

    assert_eq!(hits.status, StatusCode::OK);
    assert!(extract_result_set_id(&hits.body).is_none());
    assert_eq!(app.result_set_count().await, 0);
}

#[tokio::test]
async fn test_client_cannot_set_side_channel_flag() {
    let app = app();
    let hits = app
        .get("service=WFS&request=GetFeature&typeNames=roads&resultType=hits&RESULT_TYPE_INDEX=true")
        .await;

    assert_eq!(hits.status, StatusCode::OK);
    assert!(extract_result_set_id(&hits.body).is_none());
    assert_eq!(app.result_set_count().await, 0);
}

#[tokio::test]
async fn test_results_query() {
    let app = app();
    let response = app
        .post(&get_feature_document("roads", "results", Some(3)))
        .await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.members(), 3);
}

#[tokio::test]
async fn test_index_on_unknown_layer_issues_nothing() {
    let app = app();
    let response = app.post(&index_document("rivers")).await;

    assert_eq!(response.status, StatusCode::NOT_FOUND);
    assert!(response.body.contains("ExceptionReport"));
    assert_eq!(app.result_set_count().await, 0);
}

// ============================================================================
// Failures
// ============================================================================

#[tokio::test]
async fn test_unknown_result_set() {
    let app = app();
    let hits = app.post(&index_document("roads")).await;
    let token = extract_result_set_id(&hits.body).unwrap();
    let before = app.state.cursors.record(&token).await.unwrap();

    let response = app.page(UNKNOWN_TOKEN, "").await;
    assert_eq!(response.status, StatusCode::NOT_FOUND);
    assert!(response.body.contains(r#"exceptionCode="InvalidParameterValue""#));
    assert!(response.body.contains(r#"locator="resultSetID""#));

    assert_eq!(app.result_set_count().await, 1);
    assert_eq!(app.state.cursors.record(&token).await.unwrap(), before);
}

#[tokio::test]
async fn test_malformed_result_set_id() {
    let app = app();
    let response = app.page("doesnotexist", "").await;
    assert_eq!(response.status, StatusCode::NOT_FOUND);
    assert_eq!(app.result_set_count().await, 0);
}

#[tokio::test]
async fn test_missing_result_set_id() {
    let app = app();
    let response = app.get("service=WFS&request=PageResults&count=5").await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert!(response.body.contains("MissingParameterValue"));
}

#[tokio::test]
async fn test_index_page_results_rejected() {
    let app = app();
    let hits = app.post(&index_document("roads")).await;
    let token = extract_result_set_id(&hits.body).unwrap();

    let response = app.page(&token, "&resultType=index").await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(app.result_set_count().await, 1);
}

#[tokio::test]
async fn test_empty_post_body() {
    let app = app();
    let response = app.post("   ").await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
}

// ============================================================================
// Service endpoints
// ============================================================================

#[tokio::test]
async fn test_capabilities_advertise_paging() {
    let app = app();
    let response = app.get("service=WFS&request=GetCapabilities").await;

    assert_eq!(response.status, StatusCode::OK);
    assert!(response.body.contains(r#"<ows:Operation name="PageResults">"#));
    assert!(response.body.contains("<wfs:Name>topp:roads</wfs:Name>"));
}

#[tokio::test]
async fn test_health_and_ready() {
    let app = app();

    let health = app
        .send(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await;
    assert_eq!(health.status, StatusCode::OK);

    let ready = app
        .send(Request::builder().uri("/ready").body(Body::empty()).unwrap())
        .await;
    assert_eq!(ready.status, StatusCode::OK);
    assert!(ready.body.contains(r#""ready":true"#));
}

#[tokio::test]
async fn test_api_metrics_count_requests() {
    let app = app();
    let hits = app.post(&index_document("roads")).await;
    let token = extract_result_set_id(&hits.body).unwrap();
    app.page(&token, "").await;
    app.page(UNKNOWN_TOKEN, "").await;

    let response = app
        .send(Request::builder().uri("/api/metrics").body(Body::empty()).unwrap())
        .await;
    let json: serde_json::Value = serde_json::from_str(&response.body).unwrap();
    assert_eq!(json["requests"], 3);
    assert_eq!(json["cursors_created"], 1);
    assert_eq!(json["cursor_loads"], 1);
    assert_eq!(json["cursor_errors"], 1);
    assert_eq!(json["request_errors"], 1);
}
