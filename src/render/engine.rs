//! Engine abstraction the pool and renderer are written against.
//!
//! Production code uses [`crate::render::chromium`]; tests plug in
//! in-memory engines to exercise launch races and cleanup paths without a
//! browser binary.

use crate::config::LaunchOptions;
use crate::error::EngineError;
use crate::render::{PdfLayout, Viewport};
use async_trait::async_trait;
use std::sync::Arc;

/// Starts an engine. Called by the pool at most once per successful launch.
#[async_trait]
pub trait EngineLauncher: Send + Sync {
    async fn launch(&self, options: &LaunchOptions) -> Result<Arc<dyn RenderEngine>, EngineError>;
}

/// A running engine shared by every renderer.
///
/// Renderers only open contexts on it; closing is reserved for the pool.
#[async_trait]
pub trait RenderEngine: Send + Sync {
    /// Open a fresh isolated context (own cookies, storage, history).
    async fn new_context(&self, viewport: Viewport) -> Result<Box<dyn RenderContext>, EngineError>;

    /// Shut the engine down. Only [`crate::render::RenderResourcePool`] calls this.
    async fn close(&self) -> Result<(), EngineError>;
}

/// One isolated browsing session with a single page.
#[async_trait]
pub trait RenderContext: Send + Sync {
    /// Navigate and resolve once network activity is idle.
    ///
    /// Unbounded; the caller applies the navigation timeout.
    async fn navigate(&self, url: &str) -> Result<(), EngineError>;

    /// Whether `selector` currently matches an element.
    async fn matches(&self, selector: &str) -> Result<bool, EngineError>;

    /// Full scrollable height of the document, in CSS pixels.
    async fn content_height(&self) -> Result<u32, EngineError>;

    /// Print the current document.
    async fn print_pdf(&self, layout: PdfLayout) -> Result<Vec<u8>, EngineError>;

    /// Close the page and dispose of the context.
    async fn close(self: Box<Self>) -> Result<(), EngineError>;
}
