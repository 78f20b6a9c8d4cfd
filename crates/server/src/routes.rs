use axum::{
    extract::DefaultBodyLimit,
    http::{header::ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue},
    middleware,
    routing::{get, post},
    Json, Router,
};
use tower_http::{
    cors::CorsLayer,
    set_header::SetResponseHeaderLayer,
    trace::{DefaultMakeSpan, DefaultOnFailure, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::Level;
use utoipa::OpenApi;

use common::types::Health;

use crate::metrics;
use crate::openapi::ApiDoc;
use crate::rate_limit::{self, RateLimiter};
use crate::state::AppState;

pub mod sites;

/// Request guards applied to the catalog routes.
#[derive(Clone, Debug)]
pub struct RouterLimits {
    pub max_body_bytes: usize,
    pub rate_limit_per_minute: u64,
}

impl From<&configs::LimitsConfig> for RouterLimits {
    fn from(l: &configs::LimitsConfig) -> Self {
        Self { max_body_bytes: l.max_body_bytes, rate_limit_per_minute: l.rate_limit_per_minute }
    }
}

impl Default for RouterLimits {
    fn default() -> Self {
        Self::from(&configs::LimitsConfig::default())
    }
}

#[utoipa::path(get, path = "/health", tag = "health", responses((status = 200, description = "OK", body = crate::openapi::HealthResponse)))]
pub async fn health() -> Json<Health> {
    Json(Health { status: "ok" })
}

async fn metrics_text() -> (axum::http::StatusCode, String) {
    metrics::encode_metrics()
}

async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

/// Build the full application router: catalog endpoints plus health, metrics and API docs.
pub fn build_router(state: AppState, cors: CorsLayer, limits: &RouterLimits) -> Router {
    let limiter = RateLimiter::per_minute(limits.rate_limit_per_minute);

    // Catalog routes; any other verb gets a JSON 405 without touching the store
    let catalog = Router::new()
        .route("/api/submit", post(sites::submit_site).fallback(sites::method_not_allowed))
        .route("/api/list", get(sites::list_sites).fallback(sites::method_not_allowed))
        .route_layer(middleware::from_fn_with_state(limiter, rate_limit::enforce))
        .layer(DefaultBodyLimit::max(limits.max_body_bytes))
        .with_state(state);

    // Operational routes
    let ops = Router::new()
        .route("/health", get(health))
        .route("/metrics", get(metrics_text))
        .route("/api-docs/openapi.json", get(openapi_json));

    ops.merge(catalog)
        .layer(cors)
        .layer(SetResponseHeaderLayer::if_not_present(
            ACCESS_CONTROL_ALLOW_ORIGIN,
            HeaderValue::from_static("*"),
        ))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(
                    DefaultMakeSpan::new()
                        .level(Level::INFO)
                        .include_headers(false),
                )
                .on_request(DefaultOnRequest::new().level(Level::INFO))
                .on_response(
                    DefaultOnResponse::new()
                        .level(Level::INFO)
                        .include_headers(false),
                )
                .on_failure(DefaultOnFailure::new().level(Level::ERROR)),
        )
}
