//! # Faultline
//!
//! Error handling for Axum services: failures in, rendered error responses out.
//!
//! Faultline normalizes every failure of a request pipeline (returned errors,
//! panics, inner service errors) into a [`Throwable`], picks a renderer by
//! content negotiation on the `Accept` header and renders either a short
//! production page or a detailed development page.
//!
//! ## Features
//!
//! - **Tower middleware**: [`ThrowableLayer`] catches errors and panics of the
//!   wrapped service and answers with a rendered error response
//! - **Content negotiation**: HTML and JSON renderers out of the box, picked
//!   by `Accept` quality
//! - **Debug mode**: detailed output with source locations, backtraces and
//!   chained causes, switchable at runtime
//! - **Process hooks**: panics outside a request, runtime errors and fatal
//!   errors reported at shutdown
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use axum::{Router, routing::get};
//! use faultline::prelude::*;
//! use std::sync::Arc;
//!
//! async fn show_order() -> Result<String, Throwable> {
//!     Err(HttpException::not_found("no such order").into())
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // 1. Build the handler from FAULTLINE_* variables
//!     let handler = Arc::new(ErrorHandler::from_config(&HandlerConfig::from_env()?)?);
//!
//!     // 2. Take over panics, runtime errors and shutdown
//!     handler.register();
//!
//!     // 3. Wrap the router
//!     let app = Router::new()
//!         .route("/orders/{id}", get(show_order))
//!         .layer(ThrowableLayer::from_handler(handler));
//!
//!     let listener = tokio::net::TcpListener::bind("0.0.0.0:3000").await?;
//!     axum::serve(listener, app)
//!         .with_graceful_shutdown(shutdown_signal())
//!         .await?;
//!
//!     faultline::shutdown();
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod exception;
pub mod handler;
pub mod lifecycle;
pub mod middleware;
pub mod render;
pub mod request;
pub mod resolver;
pub mod response;
pub mod runtime;

pub use config::HandlerConfig;
pub use error::{FaultlineError, Result};
pub use exception::{ErrorException, HttpException, RuntimeError, Severity, Throwable};
pub use handler::{ErrorHandler, ErrorHandlerBuilder};
pub use middleware::{ThrowableLayer, ThrowableMiddleware};
pub use render::{ErrorRecord, HtmlRenderer, JsonRenderer, ThrowableRenderer};
pub use request::RequestSnapshot;
pub use resolver::{ContentTypeRendererResolver, RendererMapping, RendererResolver};
pub use response::{DefaultThrowableResponseFactory, ThrowableResponseFactory};
pub use runtime::{FaultRuntime, fatal_error, shutdown, trigger_error};

/// Commonly used items
pub mod prelude {
    pub use crate::config::HandlerConfig;
    pub use crate::exception::{ErrorException, HttpException, Severity, Throwable};
    pub use crate::handler::ErrorHandler;
    pub use crate::lifecycle::{ShutdownHandler, shutdown_signal};
    pub use crate::middleware::ThrowableLayer;
    pub use crate::render::{HtmlRenderer, JsonRenderer, ThrowableRenderer};
    pub use crate::resolver::{ContentTypeRendererResolver, RendererMapping};
    pub use crate::runtime::FaultRuntime;
}
