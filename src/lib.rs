//! # meeting-intel
//!
//! Meeting intelligence: extract a summary and action items from free-form
//! meeting notes with a language model, and render the resulting web pages
//! into single-page PDFs with a headless browser.
//!
//! ## Two halves, two failure policies
//!
//! ```text
//! notes + attendees                          URL / path
//!        │                                       │
//!  ├─ 1. Prompt    schema + inference rules      ├─ 1. Acquire  shared browser (launched once)
//!  ├─ 2. Complete  edgequake-llm provider        ├─ 2. Context  isolated, sized to the viewport
//!  ├─ 3. Parse     fences → JSON → typed         ├─ 3. Wait     network idle, readiness marker
//!  └─ 4. Align     assignees to the roster       └─ 4. Print    requested width × content height
//!        │                                       │
//!  AnalysisResult (never an AI error)      PDF bytes or a typed RenderError
//! ```
//!
//! Analysis must never block the caller's primary write: an unreachable
//! model yields "AI analysis unavailable", an unparseable answer yields
//! "Unable to parse AI analysis: …". Rendering, by contrast, reports every
//! failure with the offending URL.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use meeting_intel::{AnalysisConfig, AnalysisPipeline};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Provider auto-detected from ANTHROPIC_API_KEY / OPENAI_API_KEY / …
//!     let pipeline = AnalysisPipeline::from_config(AnalysisConfig::default())?;
//!     let result = pipeline
//!         .analyze(
//!             "Sarah Johnson needs to create requirement template by end of next week",
//!             "John Smith, Sarah Johnson, Mike Chen",
//!         )
//!         .await?;
//!     for item in &result.action_items {
//!         println!("{} → {} [{}]", item.assignee, item.task, item.priority);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ```rust,no_run
//! use meeting_intel::{PageRenderer, RenderConfig, RenderRequest};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = RenderConfig::builder()
//!         .base_url("http://localhost:5173")
//!         .build()?;
//!     let renderer = PageRenderer::chromium(config);
//!     let pdf = renderer.render(&RenderRequest::new("/meetings/42/print")).await?;
//!     std::fs::write("meeting.pdf", pdf)?;
//!     renderer.pool().dispose().await;
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `meeting-intel` binary (clap + anyhow + tracing-subscriber) |
//!
//! Disable `cli` when using only the library to avoid pulling in CLI-only deps:
//! ```toml
//! meeting-intel = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod analyze;
pub mod config;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod prompts;
pub mod render;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use analyze::AnalysisPipeline;
pub use config::{
    AnalysisConfig, AnalysisConfigBuilder, LaunchOptions, RenderConfig, RenderConfigBuilder,
};
pub use error::{CompletionError, EngineError, MeetingIntelError, ParseFallback, RenderError};
pub use output::{ActionItem, AnalysisResult, Priority};
pub use pipeline::completion::{CompletionClient, LlmCompletionClient};
pub use pipeline::parse::parse_response;
pub use render::{
    PageRenderer, PdfLayout, RenderRequest, RenderResourcePool, SharedEngineHandle, Viewport,
};
