//! Route configuration and setup

use axum::{
    http::{HeaderValue, Method},
    middleware::{from_fn, from_fn_with_state},
    routing::{get, post, put},
    Router,
};
use stowage_core::Config;
use tower::limit::ConcurrencyLimitLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::constants::API_PREFIX;
use crate::handlers::{file, health, signed};
use crate::identity::{identity_middleware, require_user};
use crate::state::AppState;

/// Setup all application routes
pub fn setup_routes(config: &Config, state: AppState) -> Result<Router, anyhow::Error> {
    let cors = setup_cors(config)?;

    // Routes acting on the caller's own files
    let protected_routes = Router::new()
        .route("/file/create", post(file::create_file))
        .route("/file/update/{id}", put(file::put_content))
        .route("/file/preview/{id}", get(file::preview_content))
        .route("/file/content/{id}", get(file::text_content))
        .route("/file/doc/{id}", get(file::doc_preview))
        .route("/file/download-link/{id}", put(file::create_download_session))
        .route_layer(from_fn(require_user));

    // Routes authorised by a signed link
    let signed_routes = Router::new()
        .route("/file/get/{id}/{name}", get(signed::anonymous_download))
        .route("/file/source/{id}/{name}", get(signed::source))
        .route("/file/download/{id}", get(signed::download))
        .route("/file/archive/{id}/archive.zip", get(signed::download_archived));

    let api_routes = protected_routes
        .merge(signed_routes)
        .route_layer(from_fn_with_state(state.clone(), identity_middleware));

    // Server-level concurrency limit to protect against resource exhaustion under extreme load
    let http_concurrency_limit = std::env::var("HTTP_CONCURRENCY_LIMIT")
        .ok()
        .and_then(|s| s.parse::<usize>().ok())
        .unwrap_or(10_000)
        .max(1);

    let app = Router::new()
        .route("/health", get(health::liveness_check))
        .nest(API_PREFIX, api_routes)
        .layer(ConcurrencyLimitLayer::new(http_concurrency_limit))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    Ok(app)
}

/// Setup CORS configuration
fn setup_cors(config: &Config) -> Result<CorsLayer, anyhow::Error> {
    let methods = [Method::GET, Method::POST, Method::PUT, Method::OPTIONS];
    let cors = if config.cors_origins.iter().any(|origin| origin == "*") {
        tracing::warn!("CORS configured to allow all origins - not recommended for production");
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(methods)
            .allow_headers(Any)
    } else {
        let origins = config
            .cors_origins
            .iter()
            .map(|origin| origin.parse::<HeaderValue>())
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| anyhow::anyhow!("Invalid CORS origin: {}", e))?;
        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(methods)
            .allow_headers(Any)
    };
    Ok(cors)
}
