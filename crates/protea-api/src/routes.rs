//! Router setup with all API routes and middleware.
//!
//! Configures the axum Router with CORS, tracing, compression, rate limiting,
//! and all endpoint handlers.

use std::future::Future;

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use tower_http::compression::CompressionLayer;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use protea_core::config::ProteaConfig;
use protea_core::error::ProteaError;

use crate::handlers;
use crate::rate_limit::{rate_limit_middleware, RateLimiter};
use crate::state::AppState;

/// Create the axum Router with all routes and middleware.
///
/// Every route answers with and without a trailing slash.
pub fn create_router(state: AppState) -> Router {
    let body_limit = state.config.server.body_limit_bytes;
    let limiter = RateLimiter::new(state.config.server.rate_limit_per_sec);

    // Any origin, method and header.
    let cors = CorsLayer::permissive();

    let public_routes = Router::new()
        .route("/", get(handlers::root))
        .route("/health", get(handlers::health));

    let rate_limited_routes = Router::new()
        .route(
            "/proteins/",
            get(handlers::list_proteins).post(handlers::create_protein),
        )
        .route(
            "/proteins",
            get(handlers::list_proteins).post(handlers::create_protein),
        )
        .route(
            "/proteins/{entry}",
            get(handlers::read_protein)
                .put(handlers::update_protein)
                .delete(handlers::delete_protein),
        )
        .route("/get_protein_data/{entry}", get(handlers::get_protein_data))
        .route("/query/", post(handlers::query))
        .route("/query", post(handlers::query))
        .route("/query_followup/", post(handlers::query_followup))
        .route("/query_followup", post(handlers::query_followup))
        .layer(axum::middleware::from_fn(rate_limit_middleware))
        .layer(axum::Extension(limiter));

    public_routes
        .merge(rate_limited_routes)
        .fallback(handlers::not_found)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(axum::middleware::from_fn(handlers::options_middleware))
        .with_state(state)
}

/// Bind the configured address and serve until `shutdown` resolves.
pub async fn start_server<F>(
    config: &ProteaConfig,
    state: AppState,
    shutdown: F,
) -> Result<(), ProteaError>
where
    F: Future<Output = ()> + Send + 'static,
{
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let router = create_router(state);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| ProteaError::Api(format!("Failed to bind {}: {}", addr, e)))?;

    tracing::info!("API server listening on http://{}", addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(|e| ProteaError::Api(format!("Server error: {}", e)))?;

    tracing::info!("API server stopped");
    Ok(())
}
