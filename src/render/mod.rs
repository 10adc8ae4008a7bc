//! Web page → single-page PDF rendering over a shared headless browser.
//!
//! ## Pieces
//!
//! ```text
//! PageRenderer ──acquire──▶ RenderResourcePool ──launch once──▶ EngineLauncher
//!      │                          │
//!      │                    SharedEngineHandle (Arc<dyn RenderEngine>)
//!      │                          │
//!      └──── new_context ─────────┘──▶ RenderContext (one per request, always closed)
//! ```
//!
//! 1. [`pool`]     — lazily launches one engine and hands the same handle to
//!    every caller; launches at most once even under concurrent first use
//! 2. [`page`]     — the per-request state machine: navigate, wait for the
//!    readiness marker, settle, measure, print
//! 3. [`engine`]   — the traits the two above are written against
//! 4. [`chromium`] — the `chromiumoxide` implementation of those traits
//!
//! The PDF is a single continuous page: the requested viewport width by the
//! measured document height, so long pages are never split mid-content.

pub mod chromium;
pub mod engine;
pub mod page;
pub mod pool;

pub use engine::{EngineLauncher, RenderContext, RenderEngine};
pub use page::PageRenderer;
pub use pool::{RenderResourcePool, SharedEngineHandle};

use crate::config::RenderConfig;
use crate::error::RenderError;

/// CSS pixels per inch; CDP page sizes are in inches.
pub const CSS_PX_PER_INCH: f64 = 96.0;

const CM_PER_INCH: f64 = 2.54;

/// One URL-to-PDF request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderRequest {
    /// Absolute URL, or a path relative to [`RenderConfig::base_url`].
    pub target_url: String,
    /// Viewport width in CSS pixels; [`RenderConfig::default_width`] if unset.
    pub viewport_width: Option<u32>,
    /// Viewport height in CSS pixels; [`RenderConfig::default_height`] if unset.
    pub viewport_height: Option<u32>,
}

impl RenderRequest {
    pub fn new(target_url: impl Into<String>) -> Self {
        Self {
            target_url: target_url.into(),
            viewport_width: None,
            viewport_height: None,
        }
    }

    pub fn viewport(mut self, width: u32, height: u32) -> Self {
        self.viewport_width = Some(width);
        self.viewport_height = Some(height);
        self
    }

    pub fn width(mut self, width: u32) -> Self {
        self.viewport_width = Some(width);
        self
    }

    pub fn height(mut self, height: u32) -> Self {
        self.viewport_height = Some(height);
        self
    }

    /// Requested viewport with config defaults filled in.
    pub fn effective_viewport(&self, config: &RenderConfig) -> Result<Viewport, RenderError> {
        let width = self.viewport_width.unwrap_or(config.default_width);
        let height = self.viewport_height.unwrap_or(config.default_height);
        if width == 0 || height == 0 {
            return Err(RenderError::InvalidInput {
                reason: format!("viewport must be non-zero, got {width}x{height}"),
            });
        }
        Ok(Viewport { width, height })
    }
}

/// Size of a rendering context's window, in CSS pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

/// Output page geometry for one PDF.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PdfLayout {
    /// Page width in CSS pixels (the viewport width).
    pub width_px: u32,
    /// Page height in CSS pixels (the measured content height).
    pub height_px: u32,
    /// Margin on every side, in centimetres.
    pub margin_cm: f64,
    pub print_background: bool,
}

impl PdfLayout {
    pub fn width_in(&self) -> f64 {
        f64::from(self.width_px) / CSS_PX_PER_INCH
    }

    pub fn height_in(&self) -> f64 {
        f64::from(self.height_px) / CSS_PX_PER_INCH
    }

    pub fn margin_in(&self) -> f64 {
        self.margin_cm / CM_PER_INCH
    }

    /// Paper height that fits the whole content between the top and bottom
    /// margins, so it never spills onto a second page.
    pub fn paper_height_in(&self) -> f64 {
        self.height_in() + 2.0 * self.margin_in()
    }
}

/// Check if the target already carries a scheme.
pub fn is_absolute(target: &str) -> bool {
    target.starts_with("http://") || target.starts_with("https://")
}

/// Turn a request target into the URL to navigate to.
///
/// Absolute targets pass through; anything else is a path on `base_url`,
/// joined with exactly one `/`.
pub fn resolve_target(target: &str, base_url: Option<&str>) -> Result<String, RenderError> {
    let target = target.trim();
    if target.is_empty() {
        return Err(RenderError::InvalidInput {
            reason: "target URL cannot be empty".into(),
        });
    }
    if is_absolute(target) {
        return Ok(target.to_string());
    }
    match base_url.map(str::trim).filter(|b| !b.is_empty()) {
        Some(base) => Ok(format!(
            "{}/{}",
            base.trim_end_matches('/'),
            target.trim_start_matches('/')
        )),
        None => Err(RenderError::InvalidInput {
            reason: format!("'{target}' is not an absolute URL and no base URL is configured"),
        }),
    }
}
