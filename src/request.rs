use axum::http::{HeaderMap, HeaderValue, Method, Request, Uri, header::AsHeaderName, request::Parts};

/// The parts of a request needed to render an error for it.
///
/// The throwable middleware takes the snapshot before the request is handed
/// to the inner service, so it is still available once that service fails.
#[derive(Debug, Clone)]
pub struct RequestSnapshot {
    method: Method,
    uri: Uri,
    headers: HeaderMap,
}

impl RequestSnapshot {
    pub fn new(method: Method, uri: Uri, headers: HeaderMap) -> Self {
        Self {
            method,
            uri,
            headers,
        }
    }

    pub fn from_request<B>(request: &Request<B>) -> Self {
        Self::new(
            request.method().clone(),
            request.uri().clone(),
            request.headers().clone(),
        )
    }

    pub fn from_parts(parts: &Parts) -> Self {
        Self::new(parts.method.clone(), parts.uri.clone(), parts.headers.clone())
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn uri(&self) -> &Uri {
        &self.uri
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn has_header<K: AsHeaderName>(&self, name: K) -> bool {
        self.headers.contains_key(name)
    }

    /// Every value of a header, in the order they were received.
    pub fn header_values<K: AsHeaderName>(&self, name: K) -> Vec<&HeaderValue> {
        self.headers.get_all(name).iter().collect()
    }
}

impl Default for RequestSnapshot {
    fn default() -> Self {
        Self::new(Method::GET, Uri::from_static("/"), HeaderMap::new())
    }
}
