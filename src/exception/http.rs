use crate::exception::Throwable;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

/// An error that carries an explicit HTTP status code.
///
/// When converted into a [`Throwable`](crate::exception::Throwable) the status
/// becomes the status of the rendered error response; every other error
/// renders as `500 Internal Server Error`.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct HttpException {
    status: StatusCode,
    message: String,
}

impl HttpException {
    /// Create an exception with the given status.
    ///
    /// An empty message is replaced by the status' canonical reason.
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        let mut message = message.into();
        if message.is_empty() {
            message = status.canonical_reason().unwrap_or("Error").to_string();
        }
        Self { status, message }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(StatusCode::FORBIDDEN, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    pub fn method_not_allowed(message: impl Into<String>) -> Self {
        Self::new(StatusCode::METHOD_NOT_ALLOWED, message)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(StatusCode::CONFLICT, message)
    }

    pub fn unprocessable(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNPROCESSABLE_ENTITY, message)
    }

    pub fn service_unavailable(message: impl Into<String>) -> Self {
        Self::new(StatusCode::SERVICE_UNAVAILABLE, message)
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Lets handlers return `Result<_, HttpException>` directly; the failure is
/// picked up by the throwable middleware like any other [`Throwable`].
impl IntoResponse for HttpException {
    fn into_response(self) -> Response {
        Throwable::from(self).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exception::UncaughtFailure;

    #[test]
    fn test_empty_message_uses_reason() {
        let exception = HttpException::not_found("");
        assert_eq!(exception.status(), StatusCode::NOT_FOUND);
        assert_eq!(exception.to_string(), "Not Found");
    }

    #[test]
    fn test_into_response_marks_failure() {
        let response = HttpException::conflict("order already paid").into_response();
        assert_eq!(response.status(), StatusCode::CONFLICT);

        let UncaughtFailure(failure) = response.extensions().get::<UncaughtFailure>().unwrap();
        assert_eq!(failure.status(), Some(StatusCode::CONFLICT));
        assert_eq!(failure.message(), "order already paid");
    }
}
