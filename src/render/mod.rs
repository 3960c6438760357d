//! JS-rendering capability
//!
//! Rendering is consumed as an opaque capability: something that can load a
//! URL in a browser-like environment and hand back the serialized DOM. The
//! crate ships no renderer of its own; embedders plug one in through
//! [`PageRenderer`].

use crate::{GrabError, Result};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

/// Resource types a renderer should block while loading a page
///
/// Blocking media keeps render times bounded; the rendered DOM is what gets
/// archived, not the pixels.
pub const BLOCKED_RESOURCE_TYPES: &[&str] = &["image", "media", "font"];

/// Capability interface for rendering a page with JavaScript executed
///
/// Implementations are expected to wait until the page's network activity is
/// idle and return the fully rendered DOM serialization. A navigation failure
/// or unavailable backend must surface as an error; render failures are never
/// retried by callers.
#[async_trait]
pub trait PageRenderer: Send + Sync {
    /// Renders `url` and returns the serialized DOM
    ///
    /// `blocked_types` lists the resource types the renderer must refuse to
    /// load while navigating; callers pass [`BLOCKED_RESOURCE_TYPES`].
    async fn render(&self, url: &str, timeout: Duration, blocked_types: &[&str])
        -> Result<String>;
}

/// How page content is obtained
///
/// Selected once at Downloader construction. Static fetches carry a retry
/// budget with exponential backoff; rendered fetches fail immediately on any
/// renderer error. The asymmetry is intentional: a browser-side failure is
/// rarely transient in the way a dropped connection is.
#[derive(Clone)]
pub enum FetchMode {
    /// Plain HTTP GET with retry and user-agent rotation
    Static,
    /// Delegate to a JS-rendering capability
    Rendered(Arc<dyn PageRenderer>),
}

impl std::fmt::Debug for FetchMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FetchMode::Static => write!(f, "Static"),
            FetchMode::Rendered(_) => write!(f, "Rendered"),
        }
    }
}

impl FetchMode {
    /// Builds a rendered mode, failing when no renderer is available
    ///
    /// Mirrors the single-page CLI path: requesting `--render-js` without a
    /// configured renderer is a hard error, not a silent fallback to static.
    pub fn rendered(renderer: Option<Arc<dyn PageRenderer>>) -> Result<Self> {
        match renderer {
            Some(r) => Ok(FetchMode::Rendered(r)),
            None => Err(GrabError::RendererUnavailable),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rendered_without_renderer_is_fatal() {
        let err = FetchMode::rendered(None).unwrap_err();
        assert!(matches!(err, GrabError::RendererUnavailable));
    }

    #[test]
    fn test_rendered_with_renderer() {
        struct FixedRenderer;

        #[async_trait]
        impl PageRenderer for FixedRenderer {
            async fn render(
                &self,
                _url: &str,
                _timeout: Duration,
                _blocked_types: &[&str],
            ) -> Result<String> {
                Ok("<html></html>".to_string())
            }
        }

        let mode = FetchMode::rendered(Some(Arc::new(FixedRenderer))).unwrap();
        assert!(matches!(mode, FetchMode::Rendered(_)));
    }
}
