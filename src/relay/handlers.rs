//! Axum handlers for the two passthrough endpoints.
//!
//! `/api/*path` relays any method to the upstream generation API; `/dl?url=`
//! relays a GET to an arbitrary `http(s)://` URL so downloads and in-page
//! previews are not blocked by the remote host's headers. Neither endpoint
//! interprets payloads or retries; bodies are streamed through, not buffered.
use std::collections::HashMap;
use std::sync::Arc;

use axum::body::StreamBody;
use axum::extract::{Path, Query, State};
use axum::http::{header, HeaderMap, Method, Request, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use hyper::Body;
use serde_json::json;

use crate::relay::routes::AppState;

/// Request headers never forwarded upstream: hop-by-hop and CDN-injected.
const HOP_HEADERS: &[&str] = &[
    "host",
    "connection",
    "content-length",
    "transfer-encoding",
    "cf-connecting-ip",
    "cf-ipcountry",
    "cf-ray",
    "cf-visitor",
    "x-forwarded-for",
    "x-forwarded-proto",
    "x-real-ip",
];

pub async fn root() -> &'static str {
    "Moark API Proxy"
}

/// Local CORS preflight answer; preflights are never forwarded upstream.
pub async fn preflight() -> StatusCode {
    StatusCode::NO_CONTENT
}

/// `ANY /api/*path` → `{upstream}/{path}?{query}` with method, headers (minus
/// hop headers) and body preserved; upstream status and body come back
/// verbatim.
pub async fn api_passthrough(
    State(state): State<Arc<AppState>>,
    Path(path): Path<String>,
    req: Request<Body>,
) -> Response {
    if req.method() == Method::OPTIONS {
        return StatusCode::NO_CONTENT.into_response();
    }

    let query = req
        .uri()
        .query()
        .map(|q| format!("?{}", q))
        .unwrap_or_default();
    let target = format!(
        "{}/{}{}",
        state.upstream_base_url,
        path.trim_start_matches('/'),
        query
    );
    tracing::debug!("Relaying {} {}", req.method(), target);

    let method = req.method().clone();
    let mut headers = req.headers().clone();
    for name in HOP_HEADERS {
        headers.remove(*name);
    }

    let mut builder = state
        .api_http
        .request(method.clone(), &target)
        .headers(headers);
    if method != Method::GET && method != Method::HEAD {
        builder = builder.body(reqwest::Body::wrap_stream(req.into_body()));
    }

    match builder.send().await {
        Ok(upstream) => relay_response(upstream, false),
        Err(err) => {
            tracing::error!("Upstream relay failed: {}", err);
            (
                StatusCode::BAD_GATEWAY,
                Json(json!({"error": err.to_string()})),
            )
                .into_response()
        }
    }
}

/// `GET /dl?url=<absolute-url>` → relayed download. The url must be
/// `http://` or `https://`; anything else is a 400 with no outbound request.
/// A `Range` request header is forwarded so video elements can seek.
pub async fn artifact_passthrough(
    State(state): State<Arc<AppState>>,
    Query(params): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> Response {
    let target = params.get("url").map(String::as_str).unwrap_or("");
    if !(target.starts_with("http://") || target.starts_with("https://")) {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({"error": "Invalid or missing url param"})),
        )
            .into_response();
    }
    tracing::debug!("Relaying download of {}", target);

    let mut request = state.dl_http.get(target);
    if let Some(range) = headers.get(header::RANGE) {
        request = request.header(header::RANGE, range.clone());
    }

    match request.send().await {
        Ok(upstream) => relay_response(upstream, true),
        Err(err) => {
            tracing::error!("Download relay failed: {}", err);
            (
                StatusCode::BAD_GATEWAY,
                Json(json!({"error": err.to_string()})),
            )
                .into_response()
        }
    }
}

/// Stream an upstream response back to the client.
///
/// Upstream `access-control-*` headers are dropped so the relay's own CORS
/// layer is authoritative. For downloads, headers that would block in-page
/// preview (CSP, frame options) are dropped too.
fn relay_response(upstream: reqwest::Response, strip_preview_blockers: bool) -> Response {
    let status = upstream.status();
    let mut headers = HeaderMap::new();

    for (name, value) in upstream.headers() {
        let lower = name.as_str();
        if lower.starts_with("access-control-") {
            continue;
        }
        if matches!(lower, "connection" | "transfer-encoding" | "content-length") {
            continue;
        }
        if strip_preview_blockers
            && matches!(
                lower,
                "content-security-policy"
                    | "content-security-policy-report-only"
                    | "x-frame-options"
            )
        {
            continue;
        }
        headers.append(name.clone(), value.clone());
    }

    let body = StreamBody::new(upstream.bytes_stream());
    (status, headers, body).into_response()
}
