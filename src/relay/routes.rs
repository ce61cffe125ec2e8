//! Router and shared state for the relay server.
use std::sync::Arc;

use axum::routing::{any, get};
use axum::Router;
use tower_http::cors::CorsLayer;

use crate::relay::handlers;

pub struct AppState {
    /// Upstream generation API root without trailing slash.
    pub upstream_base_url: String,
    /// Client for `/api` passthrough; redirects are left to the caller.
    pub api_http: reqwest::Client,
    /// Client for `/dl` artifact fetches; follows redirects like a browser
    /// download would.
    pub dl_http: reqwest::Client,
}

impl AppState {
    pub fn new(upstream_base_url: String) -> Self {
        AppState {
            upstream_base_url: upstream_base_url.trim_end_matches('/').to_string(),
            api_http: reqwest::Client::builder()
                .redirect(reqwest::redirect::Policy::none())
                .build()
                .unwrap_or_default(),
            dl_http: reqwest::Client::new(),
        }
    }
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(handlers::root))
        .route(
            "/dl",
            get(handlers::artifact_passthrough).options(handlers::preflight),
        )
        .route("/api/*path", any(handlers::api_passthrough))
        .layer(CorsLayer::permissive())
        .with_state(state)
}
