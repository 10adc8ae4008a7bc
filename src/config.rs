//! Configuration types for meeting analysis and page rendering.
//!
//! Each half of the crate has one config struct built through a builder:
//! [`AnalysisConfig`] for the completion call, [`RenderConfig`] for the
//! browser side. Every knob has a documented default so callers only set
//! what they care about.

use crate::error::MeetingIntelError;
use chrono::NaiveDate;
use edgequake_llm::LLMProvider;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

/// Default model when the provider is resolved from `ANTHROPIC_API_KEY`.
pub const DEFAULT_ANTHROPIC_MODEL: &str = "claude-sonnet-4-20250514";

/// Readiness marker the companion front-end sets once client rendering ends.
pub const DEFAULT_READINESS_SELECTOR: &str = "[data-pdf-ready='true']";

// ── Analysis ─────────────────────────────────────────────────────────────

/// Configuration for [`crate::analyze::AnalysisPipeline`].
///
/// # Example
/// ```rust
/// use meeting_intel::AnalysisConfig;
///
/// let config = AnalysisConfig::builder()
///     .provider_name("anthropic")
///     .model("claude-sonnet-4-20250514")
///     .max_tokens(2048)
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct AnalysisConfig {
    /// LLM model identifier. If None, uses the resolved provider's default.
    pub model: Option<String>,

    /// LLM provider name (e.g. "anthropic", "openai", "ollama").
    pub provider_name: Option<String>,

    /// Pre-constructed LLM provider. Takes precedence over `provider_name`.
    pub provider: Option<Arc<dyn LLMProvider>>,

    /// Sampling temperature. Default: 0.2.
    ///
    /// Extraction wants the model to stay close to the notes; a little
    /// temperature still lets it phrase the summary naturally.
    pub temperature: f32,

    /// Maximum tokens the model may generate. Default: 2048.
    pub max_tokens: usize,

    /// Retries on transient completion failures. Default: 2.
    pub max_retries: u32,

    /// Initial retry delay in milliseconds, doubled per attempt. Default: 500.
    pub retry_backoff_ms: u64,

    /// Per-attempt completion timeout in seconds. Default: 60.
    pub api_timeout_secs: u64,

    /// Optional system message sent ahead of the analysis prompt.
    pub system_prompt: Option<String>,

    /// Date the prompt tells the model "today" is. Default: the local date.
    ///
    /// Relative deadlines ("by Friday", "end of next week") are resolved by
    /// the model against this anchor.
    pub reference_date: Option<NaiveDate>,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            model: None,
            provider_name: None,
            provider: None,
            temperature: 0.2,
            max_tokens: 2048,
            max_retries: 2,
            retry_backoff_ms: 500,
            api_timeout_secs: 60,
            system_prompt: None,
            reference_date: None,
        }
    }
}

impl fmt::Debug for AnalysisConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnalysisConfig")
            .field("model", &self.model)
            .field("provider_name", &self.provider_name)
            .field("provider", &self.provider.as_ref().map(|_| "<dyn LLMProvider>"))
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("max_retries", &self.max_retries)
            .field("retry_backoff_ms", &self.retry_backoff_ms)
            .field("api_timeout_secs", &self.api_timeout_secs)
            .field("reference_date", &self.reference_date)
            .finish()
    }
}

impl AnalysisConfig {
    /// Create a new builder for `AnalysisConfig`.
    pub fn builder() -> AnalysisConfigBuilder {
        AnalysisConfigBuilder {
            config: Self::default(),
        }
    }

    /// The prompt's "today", falling back to the local date.
    pub fn effective_reference_date(&self) -> NaiveDate {
        self.reference_date
            .unwrap_or_else(|| chrono::Local::now().date_naive())
    }
}

/// Builder for [`AnalysisConfig`].
#[derive(Debug)]
pub struct AnalysisConfigBuilder {
    config: AnalysisConfig,
}

impl AnalysisConfigBuilder {
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = Some(model.into());
        self
    }

    pub fn provider_name(mut self, name: impl Into<String>) -> Self {
        self.config.provider_name = Some(name.into());
        self
    }

    pub fn provider(mut self, provider: Arc<dyn LLMProvider>) -> Self {
        self.config.provider = Some(provider);
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn max_tokens(mut self, n: usize) -> Self {
        self.config.max_tokens = n;
        self
    }

    pub fn max_retries(mut self, n: u32) -> Self {
        self.config.max_retries = n;
        self
    }

    pub fn retry_backoff_ms(mut self, ms: u64) -> Self {
        self.config.retry_backoff_ms = ms;
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = secs;
        self
    }

    pub fn system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.system_prompt = Some(prompt.into());
        self
    }

    pub fn reference_date(mut self, date: NaiveDate) -> Self {
        self.config.reference_date = Some(date);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<AnalysisConfig, MeetingIntelError> {
        let c = &self.config;
        if c.max_tokens == 0 {
            return Err(MeetingIntelError::InvalidConfig(
                "max_tokens must be ≥ 1".into(),
            ));
        }
        if c.api_timeout_secs == 0 {
            return Err(MeetingIntelError::InvalidConfig(
                "api_timeout_secs must be ≥ 1".into(),
            ));
        }
        Ok(self.config)
    }
}

// ── Rendering ────────────────────────────────────────────────────────────

/// How the shared browser engine is launched.
///
/// The sandbox-disabling flags are always added at launch; containers
/// rarely provide the setuid sandbox or a large `/dev/shm`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LaunchOptions {
    /// Run without a visible window. Default: true.
    pub headless: bool,
    /// Explicit Chrome/Chromium binary. If None, the usual locations are searched.
    pub chrome_executable: Option<PathBuf>,
    /// Upper bound on engine start-up in seconds. Default: 30.
    pub launch_timeout_secs: u64,
    /// Additional command-line switches.
    pub extra_args: Vec<String>,
}

impl Default for LaunchOptions {
    fn default() -> Self {
        Self {
            headless: true,
            chrome_executable: None,
            launch_timeout_secs: 30,
            extra_args: Vec::new(),
        }
    }
}

/// Configuration for [`crate::render::PageRenderer`].
///
/// # Example
/// ```rust
/// use meeting_intel::RenderConfig;
///
/// let config = RenderConfig::builder()
///     .base_url("http://localhost:5173")
///     .readiness_timeout_secs(20)
///     .build()
///     .unwrap();
/// assert_eq!(config.default_width, 1920);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderConfig {
    /// Front-end origin prepended to relative target paths.
    pub base_url: Option<String>,
    /// Viewport width when the request omits one. Default: 1920.
    pub default_width: u32,
    /// Viewport height when the request omits one. Default: 1080.
    pub default_height: u32,
    /// Bound on navigation reaching network idle, in seconds. Default: 30.
    pub navigation_timeout_secs: u64,
    /// Bound on the readiness marker appearing, in seconds. Default: 15.
    pub readiness_timeout_secs: u64,
    /// CSS selector that matches once the front-end is ready.
    pub readiness_selector: String,
    /// Interval between readiness checks in milliseconds. Default: 100.
    pub readiness_poll_ms: u64,
    /// Fixed pause after readiness for trailing layout/paint, in milliseconds. Default: 1000.
    pub settle_delay_ms: u64,
    /// Margin on all four sides of the PDF page, in centimetres. Default: 0.5.
    pub margin_cm: f64,
    /// Engine launch settings used by the pool.
    pub launch: LaunchOptions,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            default_width: 1920,
            default_height: 1080,
            navigation_timeout_secs: 30,
            readiness_timeout_secs: 15,
            readiness_selector: DEFAULT_READINESS_SELECTOR.to_string(),
            readiness_poll_ms: 100,
            settle_delay_ms: 1000,
            margin_cm: 0.5,
            launch: LaunchOptions::default(),
        }
    }
}

impl RenderConfig {
    /// Create a new builder for `RenderConfig`.
    pub fn builder() -> RenderConfigBuilder {
        RenderConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`RenderConfig`].
#[derive(Debug)]
pub struct RenderConfigBuilder {
    config: RenderConfig,
}

impl RenderConfigBuilder {
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.config.base_url = Some(url.into());
        self
    }

    pub fn default_viewport(mut self, width: u32, height: u32) -> Self {
        self.config.default_width = width;
        self.config.default_height = height;
        self
    }

    pub fn navigation_timeout_secs(mut self, secs: u64) -> Self {
        self.config.navigation_timeout_secs = secs;
        self
    }

    pub fn readiness_timeout_secs(mut self, secs: u64) -> Self {
        self.config.readiness_timeout_secs = secs;
        self
    }

    pub fn readiness_selector(mut self, selector: impl Into<String>) -> Self {
        self.config.readiness_selector = selector.into();
        self
    }

    pub fn readiness_poll_ms(mut self, ms: u64) -> Self {
        self.config.readiness_poll_ms = ms.max(10);
        self
    }

    pub fn settle_delay_ms(mut self, ms: u64) -> Self {
        self.config.settle_delay_ms = ms;
        self
    }

    pub fn margin_cm(mut self, cm: f64) -> Self {
        self.config.margin_cm = cm.max(0.0);
        self
    }

    pub fn chrome_executable(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.launch.chrome_executable = Some(path.into());
        self
    }

    pub fn launch_timeout_secs(mut self, secs: u64) -> Self {
        self.config.launch.launch_timeout_secs = secs;
        self
    }

    pub fn headless(mut self, v: bool) -> Self {
        self.config.launch.headless = v;
        self
    }

    pub fn extra_arg(mut self, arg: impl Into<String>) -> Self {
        self.config.launch.extra_args.push(arg.into());
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<RenderConfig, MeetingIntelError> {
        let c = &self.config;
        if c.default_width == 0 || c.default_height == 0 {
            return Err(MeetingIntelError::InvalidConfig(format!(
                "default viewport must be non-zero, got {}x{}",
                c.default_width, c.default_height
            )));
        }
        if c.navigation_timeout_secs == 0 || c.readiness_timeout_secs == 0 {
            return Err(MeetingIntelError::InvalidConfig(
                "navigation and readiness timeouts must be ≥ 1s".into(),
            ));
        }
        if c.launch.launch_timeout_secs == 0 {
            return Err(MeetingIntelError::InvalidConfig(
                "launch_timeout_secs must be ≥ 1".into(),
            ));
        }
        if c.readiness_selector.trim().is_empty() {
            return Err(MeetingIntelError::InvalidConfig(
                "readiness_selector cannot be empty".into(),
            ));
        }
        Ok(self.config)
    }
}
