//! Error types for the meeting-intel library.
//!
//! The two halves of the crate fail in opposite ways, and the types reflect it:
//!
//! * [`RenderError`] — **Surfaced**: a PDF request that cannot be satisfied
//!   (target never becomes ready, browser engine unavailable) is reported to
//!   the caller, typed and carrying the offending URL. Nothing here retries.
//!
//! * [`ParseFallback`] and [`CompletionError`] — **Absorbed**: the analysis
//!   pipeline converts them into a degraded but valid
//!   [`crate::output::AnalysisResult`]. They exist so the degradation is
//!   tagged and loggable, never so it can unwind past the pipeline.
//!
//! [`MeetingIntelError`] covers what is fatal to the library itself: bad
//! preconditions, invalid configuration, an unconfigured provider.

use std::path::PathBuf;
use thiserror::Error;

/// Fatal errors returned by the meeting-intel library.
///
/// Analysis never returns this for AI failures; only precondition and
/// configuration problems reach the caller.
#[derive(Debug, Error)]
pub enum MeetingIntelError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// A required argument was empty or malformed.
    #[error("Invalid {field}: {reason}")]
    InvalidInput { field: &'static str, reason: String },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── LLM errors ────────────────────────────────────────────────────────
    /// The configured provider is not initialised (missing API key etc.).
    #[error("LLM provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Failures on the URL → PDF path.
///
/// Navigation and readiness timeouts are distinct variants so callers can
/// tell a slow network apart from a front-end that never signalled ready.
#[derive(Debug, Error)]
pub enum RenderError {
    /// The request itself is unusable (empty URL, zero-sized viewport, …).
    #[error("Invalid render request: {reason}")]
    InvalidInput { reason: String },

    /// Navigation did not reach network idle in time.
    #[error("Navigation to '{url}' did not settle within {secs}s")]
    NavigationTimeout { url: String, secs: u64 },

    /// The page loaded but never exposed the readiness marker.
    #[error("Page '{url}' did not signal readiness within {secs}s")]
    ReadinessTimeout { url: String, secs: u64 },

    /// The browser engine failed (launch, protocol, or PDF generation).
    #[error("Browser engine failed while rendering '{url}': {detail}")]
    EngineFault { url: String, detail: String },

    /// The caller cancelled the render; the context was still closed.
    #[error("Rendering '{url}' was cancelled")]
    Cancelled { url: String },

    /// The PDF was produced but could not be written to disk.
    #[error("Failed to write PDF to '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl RenderError {
    /// URL the failure relates to, if the request got far enough to have one.
    pub fn url(&self) -> Option<&str> {
        match self {
            RenderError::InvalidInput { .. } | RenderError::OutputWriteFailed { .. } => None,
            RenderError::NavigationTimeout { url, .. }
            | RenderError::ReadinessTimeout { url, .. }
            | RenderError::EngineFault { url, .. }
            | RenderError::Cancelled { url } => Some(url),
        }
    }
}

/// Faults raised by an engine implementation below the renderer.
#[derive(Debug, Clone, Error)]
pub enum EngineError {
    /// The engine process could not be started.
    #[error("Failed to launch browser engine: {0}")]
    LaunchFailed(String),

    /// The engine did not come up within the launch bound.
    #[error("Browser engine launch timed out after {secs}s")]
    LaunchTimeout { secs: u64 },

    /// The pool was disposed; no further engines are handed out.
    #[error("Browser pool has been disposed")]
    Disposed,

    /// A DevTools command failed.
    #[error("Browser protocol error: {0}")]
    Protocol(String),
}

/// Classification of a failed completion call.
#[derive(Debug, Clone, Error)]
pub enum CompletionError {
    /// The request never reached the service (DNS, TLS, connection reset).
    #[error("Transport error: {0}")]
    Transport(String),

    /// The service did not answer within the per-call bound.
    #[error("Completion timed out after {secs}s")]
    Timeout { secs: u64 },

    /// The service answered with an error.
    #[error("Completion service error: {0}")]
    Remote(String),

    /// The service refused the request itself (credentials, model name,
    /// request shape). Sending it again gets the same answer.
    #[error("Completion request rejected: {0}")]
    Rejected(String),

    /// The caller cancelled the call.
    #[error("Completion cancelled")]
    Cancelled,

    /// Refused locally; an empty prompt is never sent.
    #[error("Prompt cannot be empty")]
    EmptyPrompt,
}

impl CompletionError {
    /// Whether another attempt could plausibly succeed.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            CompletionError::Transport(_) | CompletionError::Timeout { .. } | CompletionError::Remote(_)
        )
    }
}

/// Why a model response could not be turned into an analysis.
///
/// Produced by [`crate::pipeline::parse::try_parse`] and converted into a
/// fallback result by [`crate::pipeline::parse::parse_response`].
#[derive(Debug, Clone, Error)]
pub enum ParseFallback {
    /// The cleaned text is not a JSON document at all.
    #[error("invalid structure: {detail}")]
    InvalidStructure { detail: String },

    /// Valid JSON, but not shaped like an analysis.
    #[error("deserialization failed: {detail}")]
    DeserializationFailed { detail: String },
}

impl ParseFallback {
    /// Short diagnostic embedded in the fallback summary.
    pub fn reason(&self) -> &'static str {
        match self {
            ParseFallback::InvalidStructure { .. } => "invalid structure",
            ParseFallback::DeserializationFailed { .. } => "deserialization failed",
        }
    }

    /// Degraded-but-valid result standing in for the unparseable response.
    pub fn into_result(self) -> crate::output::AnalysisResult {
        crate::output::AnalysisResult::fallback(self.reason())
    }
}
