use crate::exception::Throwable;
use axum::http::StatusCode;
use std::fmt;

/// A rendered failure, ready to be written as a response.
///
/// Built once per failure by a renderer and consumed right away by whatever
/// writes the response.
#[derive(Debug, Clone)]
pub struct ErrorRecord {
    content: String,
    throwable: Throwable,
    headers: Vec<(String, String)>,
}

impl ErrorRecord {
    pub fn new(content: impl Into<String>, throwable: Throwable) -> Self {
        Self {
            content: content.into(),
            throwable,
            headers: Vec::new(),
        }
    }

    /// Add a response header. A header with the same name (case-insensitive)
    /// is replaced.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        let name = name.into();
        let value = value.into();
        match self
            .headers
            .iter_mut()
            .find(|(existing, _)| existing.eq_ignore_ascii_case(&name))
        {
            Some(entry) => entry.1 = value,
            None => self.headers.push((name, value)),
        }
        self
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn throwable(&self) -> &Throwable {
        &self.throwable
    }

    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(existing, _)| existing.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// The status the response must carry: the failure's explicit HTTP status,
    /// or `500 Internal Server Error`.
    pub fn status_code(&self) -> StatusCode {
        self.throwable.status_code()
    }

    pub fn into_content(self) -> String {
        self.content
    }
}

impl fmt::Display for ErrorRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.content)
    }
}
