//! Relay endpoint tests: router driven with `tower::ServiceExt::oneshot`
//! against a mocked upstream.
use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use serde_json::{json, Value};
use tower::ServiceExt;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use moark_api_proxy::relay::{router, AppState};

fn app_for(server: &MockServer) -> axum::Router {
    router(Arc::new(AppState::new(server.uri())))
}

#[tokio::test]
async fn root_identifies_the_service() {
    let server = MockServer::start().await;
    let response = app_for(&server)
        .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = hyper::body::to_bytes(response.into_body()).await.unwrap();
    assert_eq!(&body[..], b"Moark API Proxy");
}

#[tokio::test]
async fn api_passthrough_forwards_method_query_and_body() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/images/generations"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({"ok": true})))
        .expect(1)
        .mount(&server)
        .await;

    let request = Request::builder()
        .method("POST")
        .uri("/api/v1/images/generations?mode=fast")
        .header("content-type", "application/json")
        .header("x-request-tag", "kept")
        .header("x-forwarded-for", "203.0.113.7")
        .header("cf-ray", "abc123")
        .body(Body::from(r#"{"prompt":"hello"}"#))
        .unwrap();
    let response = app_for(&server).oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::CREATED);
    let body = hyper::body::to_bytes(response.into_body()).await.unwrap();
    let value: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(value["ok"], true);

    let received = server.received_requests().await.unwrap();
    assert_eq!(received.len(), 1);
    assert_eq!(received[0].method.as_str(), "POST");
    assert_eq!(received[0].url.query(), Some("mode=fast"));
    assert_eq!(received[0].body, br#"{"prompt":"hello"}"#);
    assert!(received[0].headers.contains_key("x-request-tag"));
    assert!(!received[0].headers.contains_key("x-forwarded-for"));
    assert!(!received[0].headers.contains_key("cf-ray"));
}

#[tokio::test]
async fn api_passthrough_relays_upstream_error_statuses() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/task/nope"))
        .respond_with(ResponseTemplate::new(418).set_body_string("teapot"))
        .mount(&server)
        .await;

    let response = app_for(&server)
        .oneshot(
            Request::builder()
                .uri("/api/v1/task/nope")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::IM_A_TEAPOT);
    let body = hyper::body::to_bytes(response.into_body()).await.unwrap();
    assert_eq!(&body[..], b"teapot");
}

#[tokio::test]
async fn api_options_answered_locally() {
    let server = MockServer::start().await;
    let response = app_for(&server)
        .oneshot(
            Request::builder()
                .method("OPTIONS")
                .uri("/api/v1/anything")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn dl_rejects_non_http_urls_without_an_outbound_request() {
    let server = MockServer::start().await;
    let response = app_for(&server)
        .oneshot(
            Request::builder()
                .uri("/dl?url=file:///etc/passwd")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = hyper::body::to_bytes(response.into_body()).await.unwrap();
    let value: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(value["error"], "Invalid or missing url param");
    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn dl_rejects_a_missing_url_param() {
    let server = MockServer::start().await;
    let response = app_for(&server)
        .oneshot(Request::builder().uri("/dl").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn dl_forwards_range_and_strips_preview_blockers() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/video.mp4"))
        .and(header("range", "bytes=0-99"))
        .respond_with(
            ResponseTemplate::new(206)
                .set_body_bytes(vec![0u8; 100])
                .insert_header("content-type", "video/mp4")
                .insert_header("content-security-policy", "default-src 'none'")
                .insert_header("content-security-policy-report-only", "default-src 'none'")
                .insert_header("x-frame-options", "DENY"),
        )
        .expect(1)
        .mount(&server)
        .await;

    let response = app_for(&server)
        .oneshot(
            Request::builder()
                .uri(format!("/dl?url={}/video.mp4", server.uri()))
                .header("range", "bytes=0-99")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::PARTIAL_CONTENT);
    assert_eq!(
        response.headers().get("content-type").unwrap(),
        "video/mp4"
    );
    assert!(response.headers().get("content-security-policy").is_none());
    assert!(response
        .headers()
        .get("content-security-policy-report-only")
        .is_none());
    assert!(response.headers().get("x-frame-options").is_none());

    let body = hyper::body::to_bytes(response.into_body()).await.unwrap();
    assert_eq!(body.len(), 100);
}

#[tokio::test]
async fn dl_options_preflight_is_no_content() {
    let server = MockServer::start().await;
    let response = app_for(&server)
        .oneshot(
            Request::builder()
                .method("OPTIONS")
                .uri("/dl")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    assert!(server.received_requests().await.unwrap().is_empty());
}
