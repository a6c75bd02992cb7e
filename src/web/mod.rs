use axum::{
    Router,
    response::Json,
    routing::{delete, get, post},
};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, TraceLayer},
};
use tracing::Level;

use crate::config::ServerConfig;
use crate::service::WatcherService;

pub mod handlers;
pub mod responses;

pub use handlers::{
    check_now, create_subscriber, delete_subscriber, get_status, list_subscribers, reset_baseline,
    start_monitor, stop_monitor, subscriber_count,
};
pub use responses::*;

#[derive(Clone)]
pub struct AppState {
    pub service: Arc<WatcherService>,
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .nest("/api/v1", api_routes())
        .layer(
            ServiceBuilder::new()
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                        .on_response(tower_http::trace::DefaultOnResponse::new().level(Level::INFO)),
                )
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}

fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/status", get(get_status))
        // Monitor lifecycle
        .route("/monitor/start", post(start_monitor))
        .route("/monitor/stop", post(stop_monitor))
        .route("/monitor/check", post(check_now))
        .route("/monitor/reset-baseline", post(reset_baseline))
        // Subscribers
        .route("/subscribers", get(list_subscribers).post(create_subscriber))
        .route("/subscribers/count", get(subscriber_count))
        .route("/subscribers/:email", delete(delete_subscriber))
}

async fn health_check() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now(),
        "version": env!("CARGO_PKG_VERSION"),
        "service": "ticket-watcher"
    }))
}

/// Serve the control surface until `shutdown` resolves.
pub async fn serve(
    config: &ServerConfig,
    state: AppState,
    shutdown: impl std::future::Future<Output = ()> + Send + 'static,
) -> anyhow::Result<()> {
    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(format!("{}:{}", config.host, config.port)).await?;

    tracing::info!("Server starting on {}:{}", config.host, config.port);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;

    Ok(())
}
