//! Error responses.

use crate::exception::Throwable;
use crate::handler::ErrorHandler;
use crate::request::RequestSnapshot;
use crate::resolver::{ContentTypeRendererResolver, RendererResolver};
use axum::body::Body;
use axum::http::{HeaderName, HeaderValue};
use axum::response::Response;
use std::sync::Arc;

/// Builds the HTTP response for a failure raised while serving a request.
pub trait ThrowableResponseFactory: Send + Sync + 'static {
    fn create(&self, request: &RequestSnapshot, failure: &Throwable) -> Response;
}

/// Resolves a renderer for the request, lets the handler render the failure
/// and turns the record into a response.
///
/// The response status is the failure's HTTP status (500 unless it carries
/// one). Every record header is copied; headers that are not valid HTTP are
/// skipped.
#[derive(Clone)]
pub struct DefaultThrowableResponseFactory {
    handler: Arc<ErrorHandler>,
    resolver: Arc<dyn RendererResolver>,
}

impl DefaultThrowableResponseFactory {
    pub fn new(handler: Arc<ErrorHandler>, resolver: Arc<dyn RendererResolver>) -> Self {
        Self { handler, resolver }
    }

    /// Negotiate with [`ContentTypeRendererResolver`] over the default mapping.
    pub fn with_default_resolver(handler: Arc<ErrorHandler>) -> Self {
        Self::new(handler, Arc::new(ContentTypeRendererResolver::default()))
    }

    pub fn handler(&self) -> &Arc<ErrorHandler> {
        &self.handler
    }
}

impl ThrowableResponseFactory for DefaultThrowableResponseFactory {
    fn create(&self, request: &RequestSnapshot, failure: &Throwable) -> Response {
        let renderer = self.resolver.resolve(request);
        let record = self
            .handler
            .handle(failure, Some(request), renderer.as_deref());

        let mut response = Response::new(Body::empty());
        *response.status_mut() = record.status_code();

        let headers = response.headers_mut();
        for (name, value) in record.headers() {
            match (
                HeaderName::try_from(name.as_str()),
                HeaderValue::try_from(value.as_str()),
            ) {
                (Ok(name), Ok(value)) => {
                    headers.insert(name, value);
                }
                _ => tracing::warn!(header = %name, "Skipping invalid error response header"),
            }
        }

        *response.body_mut() = Body::from(record.into_content());
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exception::HttpException;
    use crate::render::{ErrorRecord, JsonRenderer, ThrowableRenderer};
    use crate::runtime::FaultRuntime;
    use axum::http::header::{ACCEPT, CONTENT_TYPE};
    use axum::http::{HeaderMap, Method, StatusCode, Uri};
    use http_body_util::BodyExt;

    struct OddHeaders;

    impl ThrowableRenderer for OddHeaders {
        fn render_common(&self, failure: &Throwable, _: Option<&RequestSnapshot>) -> ErrorRecord {
            ErrorRecord::new("odd", failure.clone())
                .with_header("X-Valid", "yes")
                .with_header("Bad Name", "x")
                .with_header("X-Bad-Value", "line\nbreak")
        }

        fn render_detailed(&self, failure: &Throwable, request: Option<&RequestSnapshot>) -> ErrorRecord {
            self.render_common(failure, request)
        }
    }

    fn handler(renderer: Option<Arc<dyn ThrowableRenderer>>) -> Arc<ErrorHandler> {
        let mut builder = ErrorHandler::builder().runtime(Arc::new(FaultRuntime::new()));
        if let Some(renderer) = renderer {
            builder = builder.renderer(renderer);
        }
        Arc::new(builder.build())
    }

    fn request(accept: Option<&'static str>) -> RequestSnapshot {
        let mut headers = HeaderMap::new();
        if let Some(accept) = accept {
            headers.insert(ACCEPT, HeaderValue::from_static(accept));
        }
        RequestSnapshot::new(Method::GET, Uri::from_static("/orders/7"), headers)
    }

    async fn body_text(response: Response) -> String {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_status_headers_and_body_from_record() {
        let factory = DefaultThrowableResponseFactory::with_default_resolver(handler(None));
        let failure = Throwable::from(HttpException::not_found("order 7 not found"));

        let response = factory.create(&request(Some("application/json")), &failure);

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(response.headers()[CONTENT_TYPE], JsonRenderer::CONTENT_TYPE);
        let body: serde_json::Value = serde_json::from_str(&body_text(response).await).unwrap();
        assert_eq!(body["message"], "order 7 not found");
    }

    #[tokio::test]
    async fn test_unresolved_request_uses_default_renderer() {
        let factory = DefaultThrowableResponseFactory::with_default_resolver(handler(None));
        let response = factory.create(&request(None), &Throwable::new("error", "boom"));

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(response.headers()[CONTENT_TYPE], "text/html");
        assert!(body_text(response).await.contains("boom"));
    }

    #[tokio::test]
    async fn test_invalid_headers_are_skipped() {
        let factory = DefaultThrowableResponseFactory::with_default_resolver(handler(Some(
            Arc::new(OddHeaders),
        )));
        let response = factory.create(&request(None), &Throwable::new("error", "boom"));

        assert_eq!(response.headers()["x-valid"], "yes");
        assert_eq!(response.headers().len(), 1);
        assert_eq!(body_text(response).await, "odd");
    }
}
