use axum::http::StatusCode;
use std::io::{self, Write};
use std::sync::{Mutex, PoisonError};

/// Destination of responses written outside an HTTP request, by the
/// uncaught-failure and shutdown hooks.
pub trait ResponseWriter: Send + Sync + 'static {
    fn write_response(
        &self,
        status: StatusCode,
        headers: &[(String, String)],
        body: &str,
    ) -> io::Result<()>;
}

/// Writes CGI-style responses to standard output: a `Status:` line, the
/// headers, a blank line and the body.
#[derive(Debug, Clone, Copy, Default)]
pub struct StdoutWriter;

impl ResponseWriter for StdoutWriter {
    fn write_response(
        &self,
        status: StatusCode,
        headers: &[(String, String)],
        body: &str,
    ) -> io::Result<()> {
        let mut out = io::stdout().lock();
        write_cgi(&mut out, status, headers, body)?;
        out.flush()
    }
}

/// Keeps every written response in memory.
#[derive(Debug, Default)]
pub struct BufferWriter {
    buffer: Mutex<Vec<u8>>,
}

impl BufferWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything written so far.
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.lock()).into_owned()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<u8>> {
        self.buffer.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl ResponseWriter for BufferWriter {
    fn write_response(
        &self,
        status: StatusCode,
        headers: &[(String, String)],
        body: &str,
    ) -> io::Result<()> {
        write_cgi(&mut *self.lock(), status, headers, body)
    }
}

fn write_cgi(
    out: &mut impl Write,
    status: StatusCode,
    headers: &[(String, String)],
    body: &str,
) -> io::Result<()> {
    write!(out, "Status: {status}\r\n")?;
    for (name, value) in headers {
        write!(out, "{name}: {value}\r\n")?;
    }
    out.write_all(b"\r\n")?;
    out.write_all(body.as_bytes())
}
