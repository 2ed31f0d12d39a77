use crate::exception::{ErrorException, HttpException};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use std::any::Any;
use std::backtrace::{Backtrace, BacktraceStatus};
use std::borrow::Cow;
use std::error::Error;
use std::fmt;
use std::panic::Location;
use std::sync::Arc;

/// A failure captured for rendering.
///
/// `Throwable` is what every failure is normalized into before it reaches a
/// renderer: errors returned from handlers, errors from inner services, panics
/// and promoted runtime errors. It records where the failure was raised, a
/// backtrace, an optional explicit HTTP status and the chain of underlying
/// causes.
///
/// Any `std::error::Error` converts into a `Throwable` with `?`; the location
/// recorded is the conversion site.
///
/// ```
/// use faultline::exception::{HttpException, Throwable};
///
/// fn find_user(id: u32) -> Result<String, Throwable> {
///     if id == 0 {
///         return Err(HttpException::not_found("no such user").into());
///     }
///     Ok(format!("user-{id}"))
/// }
///
/// let failure = find_user(0).unwrap_err();
/// assert_eq!(failure.status_code().as_u16(), 404);
/// ```
#[derive(Clone)]
pub struct Throwable {
    kind: Cow<'static, str>,
    code: i64,
    message: String,
    file: Cow<'static, str>,
    line: u32,
    status: Option<StatusCode>,
    trace: Arc<Backtrace>,
    previous: Option<Box<Throwable>>,
    error: Option<Arc<dyn Error + Send + Sync>>,
}

impl Throwable {
    /// Create a throwable of the given kind located at the caller.
    #[track_caller]
    pub fn new(kind: impl Into<Cow<'static, str>>, message: impl Into<String>) -> Self {
        let location = Location::caller();
        Self::at(
            kind,
            message,
            location.file(),
            location.line(),
            Backtrace::capture(),
        )
    }

    pub(crate) fn at(
        kind: impl Into<Cow<'static, str>>,
        message: impl Into<String>,
        file: impl Into<Cow<'static, str>>,
        line: u32,
        trace: Backtrace,
    ) -> Self {
        Self {
            kind: kind.into(),
            code: 0,
            message: message.into(),
            file: file.into(),
            line,
            status: None,
            trace: Arc::new(trace),
            previous: None,
            error: None,
        }
    }

    /// Capture an error value located at the caller.
    #[track_caller]
    pub fn from_error<E>(error: E) -> Self
    where
        E: Error + Send + Sync + 'static,
    {
        let location = Location::caller();
        let mut throwable = Self::at(
            std::any::type_name::<E>(),
            error.to_string(),
            location.file(),
            location.line(),
            Backtrace::capture(),
        );
        throwable.absorb_known(&error as &dyn Any);
        throwable.previous = chain_sources(error.source(), &throwable.file, throwable.line);
        throwable.error = Some(Arc::new(error));
        throwable
    }

    /// Capture a type-erased error located at the caller.
    #[track_caller]
    pub fn from_boxed(error: Box<dyn Error + Send + Sync>) -> Self {
        let location = Location::caller();
        let mut throwable = Self::at(
            kind_hint(error.as_ref()),
            error.to_string(),
            location.file(),
            location.line(),
            Backtrace::capture(),
        );
        if let Some(http) = error.downcast_ref::<HttpException>() {
            throwable.absorb_known(http as &dyn Any);
        } else if let Some(exception) = error.downcast_ref::<ErrorException>() {
            throwable.absorb_known(exception as &dyn Any);
        }
        throwable.previous = chain_sources(error.source(), &throwable.file, throwable.line);
        throwable.error = Some(Arc::from(error));
        throwable
    }

    fn absorb_known(&mut self, error: &dyn Any) {
        if let Some(http) = error.downcast_ref::<HttpException>() {
            self.kind = Cow::Borrowed("HttpException");
            self.status = Some(http.status());
            self.code = i64::from(http.status().as_u16());
        } else if let Some(exception) = error.downcast_ref::<ErrorException>() {
            self.kind = Cow::Borrowed("ErrorException");
            self.code = i64::from(exception.severity().bits());
            self.file = Cow::Owned(exception.file().to_string());
            self.line = exception.line();
        }
    }

    pub fn with_code(mut self, code: i64) -> Self {
        self.code = code;
        self
    }

    pub fn with_status(mut self, status: StatusCode) -> Self {
        self.status = Some(status);
        self
    }

    /// Chain an underlying cause. Replaces any existing chain.
    pub fn with_previous(mut self, previous: Throwable) -> Self {
        self.previous = Some(Box::new(previous));
        self
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn code(&self) -> i64 {
        self.code
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn file(&self) -> &str {
        &self.file
    }

    pub fn line(&self) -> u32 {
        self.line
    }

    /// The explicit HTTP status carried by the failure, if any.
    pub fn status(&self) -> Option<StatusCode> {
        self.status
    }

    /// The HTTP status to respond with: the explicit status, or 500.
    pub fn status_code(&self) -> StatusCode {
        self.status.unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }

    pub fn trace(&self) -> &Backtrace {
        &self.trace
    }

    /// Backtrace frames as text lines. Empty when no backtrace was captured.
    pub fn trace_lines(&self) -> Vec<String> {
        if self.trace.status() != BacktraceStatus::Captured {
            return Vec::new();
        }
        self.trace
            .to_string()
            .lines()
            .map(|line| line.trim_end().to_string())
            .collect()
    }

    pub fn previous(&self) -> Option<&Throwable> {
        self.previous.as_deref()
    }

    /// Iterate over every chained cause, nearest first. Excludes `self`.
    pub fn previous_chain(&self) -> impl Iterator<Item = &Throwable> {
        std::iter::successors(self.previous(), |t| t.previous())
    }

    /// The original error value, when the failure was built from one.
    pub fn error(&self) -> Option<&(dyn Error + Send + Sync + 'static)> {
        self.error.as_deref()
    }

    pub fn downcast_ref<E: Error + 'static>(&self) -> Option<&E> {
        self.error.as_deref().and_then(|e| e.downcast_ref::<E>())
    }
}

impl<E> From<E> for Throwable
where
    E: Error + Send + Sync + 'static,
{
    #[track_caller]
    fn from(error: E) -> Self {
        Self::from_error(error)
    }
}

impl fmt::Display for Throwable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl fmt::Debug for Throwable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Throwable")
            .field("kind", &self.kind)
            .field("code", &self.code)
            .field("message", &self.message)
            .field("file", &self.file)
            .field("line", &self.line)
            .field("status", &self.status)
            .field("previous", &self.previous)
            .finish_non_exhaustive()
    }
}

/// Marker left on responses produced by a `Throwable` returned from a handler.
///
/// [`ThrowableMiddleware`](crate::middleware::ThrowableMiddleware) replaces such
/// responses with a rendered error response.
#[derive(Clone)]
pub(crate) struct UncaughtFailure(pub(crate) Throwable);

impl IntoResponse for Throwable {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let mut response = (status, status.canonical_reason().unwrap_or("Error")).into_response();
        response.extensions_mut().insert(UncaughtFailure(self));
        response
    }
}

fn chain_sources(
    mut source: Option<&(dyn Error + 'static)>,
    file: &Cow<'static, str>,
    line: u32,
) -> Option<Box<Throwable>> {
    let mut causes = Vec::new();
    while let Some(error) = source {
        causes.push(Throwable::at(
            kind_hint(error),
            error.to_string(),
            file.clone(),
            line,
            Backtrace::disabled(),
        ));
        source = error.source();
    }

    causes.into_iter().rev().fold(None, |previous, mut cause| {
        cause.previous = previous;
        Some(Box::new(cause))
    })
}

/// Best-effort type name for a type-erased error, taken from its `Debug` output.
fn kind_hint(error: &(dyn Error + 'static)) -> String {
    let debug = format!("{error:?}");
    let name: String = debug
        .chars()
        .take_while(|c| c.is_alphanumeric() || *c == '_' || *c == ':')
        .collect();
    if name.is_empty() {
        "std::error::Error".to_string()
    } else {
        name
    }
}
