//! Typed contexts handed to the error views.

use crate::exception::Throwable;
use crate::request::RequestSnapshot;
use serde::Serialize;

/// Context of the production view. Holds nothing but status and message.
#[derive(Debug, Serialize)]
pub(crate) struct CommonView<'a> {
    pub status: u16,
    pub reason: &'a str,
    pub message: &'a str,
}

impl<'a> CommonView<'a> {
    pub fn new(failure: &'a Throwable) -> Self {
        let status = failure.status_code();
        Self {
            status: status.as_u16(),
            reason: status.canonical_reason().unwrap_or("Error"),
            message: failure.message(),
        }
    }
}

/// One failure of a chain, with everything known about it.
#[derive(Debug, Serialize)]
pub(crate) struct FailureView<'a> {
    #[serde(rename = "type")]
    pub kind: &'a str,
    pub code: i64,
    pub message: &'a str,
    pub file: &'a str,
    pub line: u32,
    pub trace: Vec<String>,
}

impl<'a> FailureView<'a> {
    pub fn new(failure: &'a Throwable) -> Self {
        Self {
            kind: failure.kind(),
            code: failure.code(),
            message: failure.message(),
            file: failure.file(),
            line: failure.line(),
            trace: failure.trace_lines(),
        }
    }

    /// Views of every chained cause, nearest first.
    pub fn chain_of(failure: &'a Throwable) -> Vec<Self> {
        failure.previous_chain().map(Self::new).collect()
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct RequestView {
    pub method: String,
    pub uri: String,
}

impl RequestView {
    pub fn new(request: &RequestSnapshot) -> Self {
        Self {
            method: request.method().to_string(),
            uri: request.uri().to_string(),
        }
    }
}

/// Context of the development view.
#[derive(Debug, Serialize)]
pub(crate) struct DetailedView<'a> {
    pub status: u16,
    pub reason: &'a str,
    /// Code shown in the page title: the failure code, or the status when the
    /// failure has none.
    pub title_code: i64,
    pub throwable: FailureView<'a>,
    pub previous: Vec<FailureView<'a>>,
    pub request: Option<RequestView>,
    pub rendered_at: String,
}

impl<'a> DetailedView<'a> {
    pub fn new(failure: &'a Throwable, request: Option<&RequestSnapshot>) -> Self {
        let status = failure.status_code();
        let title_code = match failure.code() {
            0 => i64::from(status.as_u16()),
            code => code,
        };
        Self {
            status: status.as_u16(),
            reason: status.canonical_reason().unwrap_or("Error"),
            title_code,
            throwable: FailureView::new(failure),
            previous: FailureView::chain_of(failure),
            request: request.map(RequestView::new),
            rendered_at: chrono::Utc::now().to_rfc3339(),
        }
    }
}
