//! Tower middleware turning request failures into error responses.

mod catch_panic;

use crate::exception::{Throwable, UncaughtFailure, panic};
use crate::handler::ErrorHandler;
use crate::request::RequestSnapshot;
use crate::response::{DefaultThrowableResponseFactory, ThrowableResponseFactory};
use axum::http::Request;
use axum::response::{IntoResponse, Response};
use catch_panic::CatchPanic;
use std::convert::Infallible;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tower::{Layer, Service};

/// Tower layer converting failures of the wrapped service into rendered
/// error responses.
///
/// A request fails when the inner service returns an error, panics, or
/// responds with a [`Throwable`] returned from a handler. Each failure is
/// handed to the [`ThrowableResponseFactory`] exactly once. Other responses
/// pass through untouched.
///
/// # Example
///
/// ```rust,no_run
/// use axum::{Router, routing::get};
/// use faultline::exception::{HttpException, Throwable};
/// use faultline::handler::ErrorHandler;
/// use faultline::middleware::ThrowableLayer;
/// use std::sync::Arc;
///
/// async fn show_order() -> Result<String, Throwable> {
///     Err(HttpException::not_found("no such order").into())
/// }
///
/// let handler = Arc::new(ErrorHandler::new());
/// let app: Router = Router::new()
///     .route("/orders/{id}", get(show_order))
///     .layer(ThrowableLayer::from_handler(handler));
/// ```
#[derive(Clone)]
pub struct ThrowableLayer {
    factory: Arc<dyn ThrowableResponseFactory>,
}

impl ThrowableLayer {
    pub fn new(factory: Arc<dyn ThrowableResponseFactory>) -> Self {
        Self { factory }
    }

    /// Use a [`DefaultThrowableResponseFactory`] negotiating on `Accept`.
    pub fn from_handler(handler: Arc<ErrorHandler>) -> Self {
        Self::new(Arc::new(
            DefaultThrowableResponseFactory::with_default_resolver(handler),
        ))
    }
}

impl<S> Layer<S> for ThrowableLayer {
    type Service = ThrowableMiddleware<S>;

    fn layer(&self, inner: S) -> Self::Service {
        ThrowableMiddleware {
            inner,
            factory: self.factory.clone(),
            not_ready: None,
        }
    }
}

#[derive(Clone)]
pub struct ThrowableMiddleware<S> {
    inner: S,
    factory: Arc<dyn ThrowableResponseFactory>,
    // Failure of the inner `poll_ready`, answered on the next call.
    not_ready: Option<Throwable>,
}

impl<S, B> Service<Request<B>> for ThrowableMiddleware<S>
where
    S: Service<Request<B>, Response = Response> + Clone + Send + 'static,
    S::Future: Send + 'static,
    S::Error: Into<Box<dyn std::error::Error + Send + Sync>> + Send,
    B: Send + 'static,
{
    type Response = Response;
    type Error = Infallible;
    type Future = Pin<Box<dyn Future<Output = Result<Response, Infallible>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        if self.not_ready.is_some() {
            return Poll::Ready(Ok(()));
        }
        match self.inner.poll_ready(cx) {
            Poll::Pending => Poll::Pending,
            Poll::Ready(Ok(())) => Poll::Ready(Ok(())),
            Poll::Ready(Err(e)) => {
                self.not_ready = Some(Throwable::from_boxed(e.into()));
                Poll::Ready(Ok(()))
            }
        }
    }

    fn call(&mut self, req: Request<B>) -> Self::Future {
        let request = RequestSnapshot::from_request(&req);
        let factory = self.factory.clone();

        if let Some(failure) = self.not_ready.take() {
            return Box::pin(async move { Ok(respond(factory.as_ref(), &request, &failure)) });
        }

        // The ready service handles this request; the clone serves the next.
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);

        Box::pin(async move {
            let outcome = match panic::catch(move || inner.call(req)) {
                Ok(future) => CatchPanic::new(future).await,
                Err(failure) => Err(failure),
            };

            let failure = match outcome {
                Ok(Ok(mut response)) => match response.extensions_mut().remove::<UncaughtFailure>() {
                    Some(UncaughtFailure(failure)) => failure,
                    None => return Ok(response),
                },
                Ok(Err(e)) => Throwable::from_boxed(e.into()),
                Err(failure) => failure,
            };

            Ok(respond(factory.as_ref(), &request, &failure))
        })
    }
}

/// Let the factory answer; a factory that panics gets a bare status response.
fn respond(
    factory: &dyn ThrowableResponseFactory,
    request: &RequestSnapshot,
    failure: &Throwable,
) -> Response {
    match panic::catch(|| factory.create(request, failure)) {
        Ok(response) => response,
        Err(panicked) => {
            tracing::error!(
                failure = failure.message(),
                "Error response factory panicked: {}",
                panicked.message()
            );
            let status = failure.status_code();
            let reason = status.canonical_reason().unwrap_or("Error");
            (status, format!("{} {}", status.as_u16(), reason)).into_response()
        }
    }
}
