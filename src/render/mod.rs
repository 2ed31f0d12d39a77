use crate::exception::Throwable;
use crate::request::RequestSnapshot;

mod html;
mod json;
mod record;
mod view;

pub use html::HtmlRenderer;
pub use json::JsonRenderer;
pub use record::ErrorRecord;

/// Name of the `Content-Type` header set by every renderer.
pub const CONTENT_TYPE: &str = "Content-Type";

/// Renders a failure into a response body.
///
/// Every renderer supports both modes, so whichever one is resolved for a
/// request can serve the handler's current debug setting.
pub trait ThrowableRenderer: Send + Sync + 'static {
    /// Render only the status code and message.
    ///
    /// Suitable for production: must never expose source locations,
    /// backtraces or chained causes.
    fn render_common(&self, failure: &Throwable, request: Option<&RequestSnapshot>)
    -> ErrorRecord;

    /// Render everything known about the failure, chained causes included.
    ///
    /// Suitable for development.
    fn render_detailed(
        &self,
        failure: &Throwable,
        request: Option<&RequestSnapshot>,
    ) -> ErrorRecord;
}
