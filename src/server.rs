use axum::{
    extract::State,
    http::{header::CONTENT_TYPE, Method, Request, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Json, Response},
    routing::get,
    Router,
};
use hyper::Server;
use std::net::SocketAddr;
use tokio::signal;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::constants::API_PREFIX;
use crate::error::{MarketError, Result};
use crate::handlers;
use crate::observability::metrics;
use crate::state::SharedState;

/// Health check endpoint
async fn health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "healthy",
        "service": "cayman-mall",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// Prometheus scrape endpoint
async fn metrics_endpoint(State(state): State<SharedState>) -> Response {
    if !state.config.server.metrics_enabled {
        return StatusCode::NOT_FOUND.into_response();
    }
    match metrics::render() {
        Some(body) => ([(CONTENT_TYPE, "text/plain; version=0.0.4")], body).into_response(),
        None => (StatusCode::SERVICE_UNAVAILABLE, "metrics recorder not installed").into_response(),
    }
}

async fn track_requests<B>(req: Request<B>, next: Next<B>) -> Response {
    let method = req.method().clone();
    let response = next.run(req).await;
    metrics::record_http_request(method.as_str(), response.status().as_u16());
    response
}

fn api_routes() -> Router<SharedState> {
    Router::new()
        .merge(handlers::shops::routes())
        .merge(handlers::products::routes())
        .merge(handlers::orders::routes())
        .merge(handlers::ads::routes())
        .merge(handlers::faqs::routes())
        .merge(handlers::properties::routes())
}

/// Create the HTTP router with all routes
pub fn create_server(state: SharedState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health))
        .route("/metrics", get(metrics_endpoint))
        .nest(API_PREFIX, api_routes())
        .fallback(|| async { MarketError::not_found("Route", "requested path") })
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(middleware::from_fn(track_requests))
                .layer(cors),
        )
        .with_state(state)
}

/// Start the HTTP server and serve until Ctrl+C or SIGTERM
pub async fn start_server(state: SharedState) -> Result<()> {
    let host: std::net::IpAddr = state
        .config
        .server
        .host
        .parse()
        .map_err(|e| MarketError::Config(format!("invalid server.host: {e}")))?;
    let addr = SocketAddr::new(host, state.config.server.port);
    let app = create_server(state);

    info!("HTTP server running on http://{addr}");
    info!("Health check: http://{addr}/health");
    info!("API: http://{addr}{API_PREFIX}");

    Server::bind(&addr)
        .serve(app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| MarketError::Io(std::io::Error::new(std::io::ErrorKind::Other, e)))?;

    info!("HTTP server stopped");
    Ok(())
}

pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::warn!("Failed to install Ctrl+C handler: {e}");
            std::future::pending::<()>().await;
        }
        info!("Received Ctrl+C, shutting down");
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
                info!("Received terminate signal, shutting down");
            }
            Err(e) => {
                tracing::warn!("Failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
