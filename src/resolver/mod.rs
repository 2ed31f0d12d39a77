//! Renderer resolution.
//!
//! A [`RendererResolver`] picks the renderer for a request. The built-in
//! [`ContentTypeRendererResolver`] negotiates on the `Accept` header against a
//! [`RendererMapping`] of media types to renderers.

pub mod negotiate;

use crate::render::{HtmlRenderer, JsonRenderer, ThrowableRenderer};
use crate::request::RequestSnapshot;
use axum::http::header::ACCEPT;
use std::fmt;
use std::sync::Arc;

/// Picks the renderer to use for a request.
pub trait RendererResolver: Send + Sync + 'static {
    /// `None` means no preference: the handler's default renderer is used.
    fn resolve(&self, request: &RequestSnapshot) -> Option<Arc<dyn ThrowableRenderer>>;
}

/// Media types mapped to renderers, in insertion order.
///
/// Keys are compared case-insensitively. `*/*` is an ordinary key: it is
/// only chosen when a client literally lists `*/*`.
#[derive(Clone)]
pub struct RendererMapping {
    entries: Vec<(String, Arc<dyn ThrowableRenderer>)>,
}

impl RendererMapping {
    /// An empty mapping.
    pub fn empty() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// A mapping whose `*/*` entry is `fallback`.
    pub fn new(fallback: Arc<dyn ThrowableRenderer>) -> Self {
        Self::empty().with(ContentTypeRendererResolver::ANY_CONTENT_TYPE, fallback)
    }

    pub fn with(mut self, media_type: &str, renderer: Arc<dyn ThrowableRenderer>) -> Self {
        self.insert(media_type, renderer);
        self
    }

    /// Map a media type, replacing an existing entry in place.
    pub fn insert(&mut self, media_type: &str, renderer: Arc<dyn ThrowableRenderer>) {
        let key = media_type.trim().to_ascii_lowercase();
        match self.entries.iter_mut().find(|(existing, _)| *existing == key) {
            Some(entry) => entry.1 = renderer,
            None => self.entries.push((key, renderer)),
        }
    }

    pub fn get(&self, media_type: &str) -> Option<&Arc<dyn ThrowableRenderer>> {
        self.entries
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(media_type))
            .map(|(_, renderer)| renderer)
    }

    pub fn media_types(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(key, _)| key.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for RendererMapping {
    /// `application/json` to JSON, `text/html` and `*/*` to one shared HTML
    /// renderer.
    fn default() -> Self {
        let html: Arc<dyn ThrowableRenderer> = Arc::new(HtmlRenderer::new());
        Self::empty()
            .with(JsonRenderer::CONTENT_TYPE, Arc::new(JsonRenderer::new()))
            .with(HtmlRenderer::CONTENT_TYPE, html.clone())
            .with(ContentTypeRendererResolver::ANY_CONTENT_TYPE, html)
    }
}

impl fmt::Debug for RendererMapping {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.media_types()).finish()
    }
}

/// Resolves a renderer from the `Accept` header.
///
/// Media ranges are tried by descending weight (see [`negotiate`] for the
/// weighting rules); the first one present in the mapping wins. Without an
/// `Accept` header, or when nothing listed is mapped, there is no preference.
#[derive(Debug, Clone, Default)]
pub struct ContentTypeRendererResolver {
    mapping: RendererMapping,
}

impl ContentTypeRendererResolver {
    pub const ANY_CONTENT_TYPE: &'static str = "*/*";

    pub fn new(mapping: RendererMapping) -> Self {
        Self { mapping }
    }

    pub fn mapping(&self) -> &RendererMapping {
        &self.mapping
    }
}

impl RendererResolver for ContentTypeRendererResolver {
    fn resolve(&self, request: &RequestSnapshot) -> Option<Arc<dyn ThrowableRenderer>> {
        if !request.has_header(ACCEPT) {
            return None;
        }

        negotiate::sorted_by_quality(request.header_values(ACCEPT))
            .iter()
            .find_map(|range| self.mapping.get(range.essence()))
            .cloned()
    }
}
