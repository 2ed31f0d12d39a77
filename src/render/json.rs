use crate::exception::Throwable;
use crate::render::view::FailureView;
use crate::render::{CONTENT_TYPE, ErrorRecord, ThrowableRenderer};
use crate::request::RequestSnapshot;
use serde::Serialize;
use serde_json::ser::{PrettyFormatter, Serializer};

#[derive(Serialize)]
struct CommonPayload<'a> {
    message: &'a str,
}

#[derive(Serialize)]
struct DetailedPayload<'a> {
    #[serde(flatten)]
    throwable: FailureView<'a>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    previous: Vec<FailureView<'a>>,
}

/// Renders failures as JSON documents.
///
/// Output is pretty-printed with four-space indentation; slashes and
/// non-ASCII characters are written as-is.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonRenderer;

impl JsonRenderer {
    /// Content type for the Content-Type HTTP header.
    pub const CONTENT_TYPE: &'static str = "application/json";

    pub fn new() -> Self {
        Self
    }

    fn encode(&self, data: &impl Serialize, failure: &Throwable) -> ErrorRecord {
        ErrorRecord::new(encode_pretty(data), failure.clone())
            .with_header(CONTENT_TYPE, Self::CONTENT_TYPE)
    }
}

impl ThrowableRenderer for JsonRenderer {
    fn render_common(&self, failure: &Throwable, _request: Option<&RequestSnapshot>) -> ErrorRecord {
        self.encode(
            &CommonPayload {
                message: failure.message(),
            },
            failure,
        )
    }

    fn render_detailed(
        &self,
        failure: &Throwable,
        _request: Option<&RequestSnapshot>,
    ) -> ErrorRecord {
        self.encode(
            &DetailedPayload {
                throwable: FailureView::new(failure),
                previous: FailureView::chain_of(failure),
            },
            failure,
        )
    }
}

/// Serialize without ever failing: a serializer error yields an empty body.
fn encode_pretty(data: &impl Serialize) -> String {
    let mut buffer = Vec::with_capacity(256);
    let mut serializer = Serializer::with_formatter(&mut buffer, PrettyFormatter::with_indent(b"    "));
    if let Err(e) = data.serialize(&mut serializer) {
        tracing::warn!(error = %e, "Failed to encode error payload as JSON");
        return String::new();
    }
    String::from_utf8_lossy(&buffer).into_owned()
}
