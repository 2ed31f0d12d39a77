use crate::error::{FaultlineError, Result};
use crate::exception::Throwable;
use crate::render::view::{CommonView, DetailedView};
use crate::render::{CONTENT_TYPE, ErrorRecord, ThrowableRenderer};
use crate::request::RequestSnapshot;
use serde::Serialize;
use std::path::Path;
use tera::{Context, Tera};

const COMMON_VIEW: &str = include_str!("../../resources/views/common.html");
const DETAILED_VIEW: &str = include_str!("../../resources/views/detailed.html");

const COMMON_NAME: &str = "common.html";
const DETAILED_NAME: &str = "detailed.html";

/// Renders failures as HTML pages.
///
/// Ships with built-in `common.html` and `detailed.html` views. A directory
/// of replacement views can be loaded with [`HtmlRenderer::from_view_path`];
/// views the directory does not define keep their built-in version.
///
/// Views receive a typed context: `status`, `reason` and `message` in common
/// mode; `throwable`, `previous`, `request`, `title_code` and `rendered_at`
/// in detailed mode. Output is HTML-escaped.
pub struct HtmlRenderer {
    tera: Tera,
    common: String,
    detailed: String,
}

impl HtmlRenderer {
    /// Content type for the Content-Type HTTP header.
    pub const CONTENT_TYPE: &'static str = "text/html";

    pub fn new() -> Self {
        let mut tera = Tera::default();
        if let Err(e) = register_builtin_views(&mut tera) {
            tracing::error!(error = %e, "Failed to compile built-in error views");
        }
        Self {
            tera,
            common: COMMON_NAME.to_string(),
            detailed: DETAILED_NAME.to_string(),
        }
    }

    /// Load views from every `*.html` file under `path`.
    pub fn from_view_path(path: impl AsRef<Path>) -> Result<Self> {
        let dir = path.as_ref();
        let load_error = |e: tera::Error| FaultlineError::TemplateLoad {
            path: dir.display().to_string(),
            message: e.to_string(),
        };

        let mut tera = Tera::new(&format!("{}/**/*.html", dir.display())).map_err(load_error)?;
        let missing: Vec<(&str, &str)> = [(COMMON_NAME, COMMON_VIEW), (DETAILED_NAME, DETAILED_VIEW)]
            .into_iter()
            .filter(|(name, _)| !tera.get_template_names().any(|n| n == *name))
            .collect();
        tera.add_raw_templates(missing).map_err(load_error)?;

        tracing::debug!(path = %dir.display(), "Loaded error views");
        Ok(Self {
            tera,
            common: COMMON_NAME.to_string(),
            detailed: DETAILED_NAME.to_string(),
        })
    }

    /// Use other view names for the two modes. A missing `.html` suffix is
    /// added.
    pub fn with_views(mut self, common: &str, detailed: &str) -> Result<Self> {
        self.common = self.known_view(common)?;
        self.detailed = self.known_view(detailed)?;
        Ok(self)
    }

    fn known_view(&self, name: &str) -> Result<String> {
        let name = if name.ends_with(".html") {
            name.to_string()
        } else {
            format!("{name}.html")
        };
        if self.tera.get_template_names().any(|n| n == name) {
            Ok(name)
        } else {
            Err(FaultlineError::ViewNotFound { name })
        }
    }

    fn render(&self, view: &str, context: &impl Serialize, failure: &Throwable) -> ErrorRecord {
        let body = Context::from_serialize(context)
            .and_then(|context| self.tera.render(view, &context))
            .unwrap_or_else(|e| {
                tracing::warn!(view, error = %e, "Failed to render error view, using fallback page");
                fallback_page(failure)
            });

        ErrorRecord::new(body, failure.clone()).with_header(CONTENT_TYPE, Self::CONTENT_TYPE)
    }
}

impl Default for HtmlRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl ThrowableRenderer for HtmlRenderer {
    fn render_common(&self, failure: &Throwable, _request: Option<&RequestSnapshot>) -> ErrorRecord {
        self.render(&self.common, &CommonView::new(failure), failure)
    }

    fn render_detailed(
        &self,
        failure: &Throwable,
        request: Option<&RequestSnapshot>,
    ) -> ErrorRecord {
        self.render(&self.detailed, &DetailedView::new(failure, request), failure)
    }
}

fn register_builtin_views(tera: &mut Tera) -> tera::Result<()> {
    tera.add_raw_templates(vec![(COMMON_NAME, COMMON_VIEW), (DETAILED_NAME, DETAILED_VIEW)])
}

fn fallback_page(failure: &Throwable) -> String {
    let status = failure.status_code();
    format!(
        "<!DOCTYPE html><html lang=\"en\"><head><meta charset=\"UTF-8\"><title>{code}</title></head>\
         <body><h1>{code} {reason}</h1></body></html>",
        code = status.as_u16(),
        reason = status.canonical_reason().unwrap_or("Error"),
    )
}
