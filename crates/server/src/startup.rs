use std::net::SocketAddr;

use axum::http::Method;
use axum::Router;
use configs::AppConfig;
use models::site_entry::FieldLimits;
use service::runtime;
use service::site_index::{SiteIndexService, SubmissionPolicy};
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

use crate::errors::StartupError;
use crate::routes::{self, RouterLimits};
use crate::state::AppState;

/// Wildcard origin; preflights for the two catalog verbs are answered here.
pub fn build_cors() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any)
}

pub fn submission_policy(cfg: &AppConfig) -> SubmissionPolicy {
    SubmissionPolicy {
        limits: FieldLimits {
            max_name_len: cfg.limits.max_name_len,
            max_site_id_len: cfg.limits.max_site_id_len,
            max_description_len: cfg.limits.max_description_len,
            require_hex_site_id: cfg.limits.require_hex_site_id,
        },
        screen_content: cfg.store.screen_content_enabled(),
    }
}

/// Open the configured store and wrap it in handler state.
pub async fn build_state(cfg: &AppConfig) -> Result<AppState, StartupError> {
    let store = runtime::open_store(&cfg.store).await?;
    let policy = submission_policy(cfg);
    info!(backend = store.backend(), screen_content = policy.screen_content, "entry store ready");
    Ok(AppState::new(SiteIndexService::new(store, policy)))
}

pub async fn build_app(cfg: &AppConfig) -> Result<Router, StartupError> {
    let state = build_state(cfg).await?;
    Ok(routes::build_router(state, build_cors(), &RouterLimits::from(&cfg.limits)))
}

fn bind_addr(cfg: &AppConfig) -> Result<SocketAddr, StartupError> {
    format!("{}:{}", cfg.server.host, cfg.server.port)
        .parse()
        .map_err(|e| StartupError::InvalidConfig(format!("bad bind address: {e}")))
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        info!("received Ctrl+C, draining connections");
    }
}

/// Public entry: build the app and run the HTTP server until Ctrl+C.
pub async fn run(cfg: AppConfig) -> anyhow::Result<()> {
    let app = build_app(&cfg).await?;
    let addr = bind_addr(&cfg)?;
    info!(%addr, "starting site index server");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    info!("server stopped");
    Ok(())
}
