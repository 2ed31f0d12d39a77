use axum::{Router, extract::Path, routing::get};
use faultline::lifecycle::ShutdownHandler;
use faultline::prelude::*;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

#[derive(Debug, thiserror::Error)]
#[error("inventory service unavailable")]
struct InventoryError {
    #[source]
    cause: std::io::Error,
}

async fn order(Path(id): Path<u32>) -> Result<String, Throwable> {
    match id {
        0 => Err(HttpException::not_found(format!("order {id} does not exist")).into()),
        13 => Err(InventoryError {
            cause: std::io::Error::other("connection refused"),
        }
        .into()),
        _ => Ok(format!("order {id}")),
    }
}

async fn legacy() -> Result<&'static str, Throwable> {
    faultline::trigger_error(Severity::WARNING, "legacy endpoint called")?;
    Ok("legacy")
}

async fn explode() -> &'static str {
    panic!("the handler exploded")
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,faultline=debug,tower_http=debug".into()),
        )
        .init();

    tracing::info!("🚀 Starting demo server...");

    // 1. Error handler from FAULTLINE_* variables
    let config = HandlerConfig::from_env().unwrap_or_else(|e| {
        tracing::warn!("Invalid configuration, using defaults: {}", e);
        HandlerConfig::default()
    });
    let handler = match ErrorHandler::from_config(&config) {
        Ok(handler) => Arc::new(handler),
        Err(e) => {
            tracing::warn!("Failed to load views, using built-in ones: {}", e);
            Arc::new(ErrorHandler::new())
        }
    };
    handler.register();

    // 2. Router
    let router = Router::new()
        .route("/orders/{id}", get(order))
        .route("/legacy", get(legacy))
        .route("/explode", get(explode))
        .layer(ThrowableLayer::from_handler(handler.clone()))
        .layer(TraceLayer::new_for_http());

    // 3. Serve until a shutdown signal, then run the finalizers
    let port = std::env::var("PORT").unwrap_or_else(|_| "3000".to_string());
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{port}"))
        .await
        .unwrap();
    tracing::info!("✅ Server running on http://127.0.0.1:{}", port);

    let shutdown = ShutdownHandler::new(handler.runtime().clone());
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .unwrap();

    shutdown.shutdown();
    tracing::info!("👋 Server stopped");
}
