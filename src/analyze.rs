//! Meeting analysis entry point.
//!
//! [`AnalysisPipeline::analyze`] is infallible with respect to the model: a
//! meeting must be savable even when the completion service is down, slow,
//! or answers with nonsense. The only errors it returns are precondition
//! violations (empty notes or attendees).

use crate::config::{AnalysisConfig, DEFAULT_ANTHROPIC_MODEL};
use crate::error::{CompletionError, MeetingIntelError};
use crate::output::AnalysisResult;
use crate::pipeline::completion::{CompletionClient, LlmCompletionClient};
use crate::pipeline::parse;
use crate::pipeline::roster::Roster;
use crate::prompts::build_analysis_prompt;
use edgequake_llm::{LLMProvider, ProviderFactory};
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Builds the prompt, calls the completion service, and parses the answer.
///
/// Cheap to clone; share one instance across requests.
#[derive(Clone)]
pub struct AnalysisPipeline {
    client: Arc<dyn CompletionClient>,
    config: AnalysisConfig,
}

impl AnalysisPipeline {
    /// Use an existing completion client.
    pub fn new(client: Arc<dyn CompletionClient>, config: AnalysisConfig) -> Self {
        Self { client, config }
    }

    /// Resolve an `edgequake-llm` provider from `config` and the environment.
    ///
    /// # Errors
    /// [`MeetingIntelError::ProviderNotConfigured`] when no provider can be
    /// resolved. This is a start-up error, not an analysis failure.
    pub fn from_config(config: AnalysisConfig) -> Result<Self, MeetingIntelError> {
        let provider = resolve_provider(&config)?;
        let client = Arc::new(LlmCompletionClient::new(provider, &config));
        Ok(Self::new(client, config))
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    /// Analyse one set of meeting notes.
    ///
    /// # Errors
    /// Only [`MeetingIntelError::InvalidInput`], when `notes` or `attendees`
    /// is blank. Completion and parse failures are absorbed into a degraded
    /// [`AnalysisResult`].
    pub async fn analyze(
        &self,
        notes: &str,
        attendees: &str,
    ) -> Result<AnalysisResult, MeetingIntelError> {
        self.analyze_with_cancel(notes, attendees, &CancellationToken::new()).await
    }

    /// [`analyze`](Self::analyze) with an external cancellation signal.
    ///
    /// Cancellation during the completion call is treated like any other
    /// completion failure: the caller still gets the "unavailable" result.
    pub async fn analyze_with_cancel(
        &self,
        notes: &str,
        attendees: &str,
        cancel: &CancellationToken,
    ) -> Result<AnalysisResult, MeetingIntelError> {
        if notes.trim().is_empty() {
            return Err(MeetingIntelError::InvalidInput {
                field: "notes",
                reason: "cannot be empty".into(),
            });
        }
        if attendees.trim().is_empty() {
            return Err(MeetingIntelError::InvalidInput {
                field: "attendees",
                reason: "cannot be empty".into(),
            });
        }

        let start = Instant::now();
        info!("Analyzing meeting notes ({} chars)", notes.len());

        let prompt = build_analysis_prompt(notes, attendees, self.config.effective_reference_date());

        let completion = tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(CompletionError::Cancelled),
            r = self.client.get_completion(&prompt) => r,
        };

        let raw = match completion {
            Ok(raw) => raw,
            Err(e) => {
                warn!("AI analysis unavailable: {}", e);
                return Ok(AnalysisResult::unavailable());
            }
        };

        let mut result = parse::parse_response(&raw);
        let roster = Roster::parse(attendees);
        roster.align(&mut result);

        info!(
            "Analyzed meeting in {:?}: {} action items{}",
            start.elapsed(),
            result.action_items.len(),
            if result.is_degraded() { " (degraded)" } else { "" }
        );

        Ok(result)
    }
}

// ── Internal helpers ─────────────────────────────────────────────────────

fn create_provider(
    provider_name: &str,
    model: &str,
) -> Result<Arc<dyn LLMProvider>, MeetingIntelError> {
    ProviderFactory::create_llm_provider(provider_name, model).map_err(|e| {
        MeetingIntelError::ProviderNotConfigured {
            provider: provider_name.to_string(),
            hint: format!("{e}"),
        }
    })
}

/// Resolve the LLM provider, from most-specific to least-specific.
///
/// 1. **Pre-built provider** (`config.provider`), used as-is.
/// 2. **Named provider** (`config.provider_name` + `config.model`).
/// 3. **Environment pair** (`EDGEQUAKE_LLM_PROVIDER` + `EDGEQUAKE_MODEL`).
/// 4. **Anthropic key present** (`ANTHROPIC_API_KEY`), defaulting the model
///    to [`DEFAULT_ANTHROPIC_MODEL`].
/// 5. **Full auto-detection** (`ProviderFactory::from_env`).
fn resolve_provider(config: &AnalysisConfig) -> Result<Arc<dyn LLMProvider>, MeetingIntelError> {
    if let Some(ref provider) = config.provider {
        return Ok(Arc::clone(provider));
    }

    if let Some(ref name) = config.provider_name {
        let model = config.model.as_deref().unwrap_or(DEFAULT_ANTHROPIC_MODEL);
        return create_provider(name, model);
    }

    if let (Ok(prov), Ok(model)) = (
        std::env::var("EDGEQUAKE_LLM_PROVIDER"),
        std::env::var("EDGEQUAKE_MODEL"),
    ) {
        if !prov.is_empty() && !model.is_empty() {
            return create_provider(&prov, &model);
        }
    }

    if let Ok(key) = std::env::var("ANTHROPIC_API_KEY") {
        if !key.is_empty() {
            let model = config.model.as_deref().unwrap_or(DEFAULT_ANTHROPIC_MODEL);
            debug!("Using anthropic provider from ANTHROPIC_API_KEY");
            return create_provider("anthropic", model);
        }
    }

    let (llm_provider, _embedding) =
        ProviderFactory::from_env().map_err(|e| MeetingIntelError::ProviderNotConfigured {
            provider: "auto".to_string(),
            hint: format!(
                "No LLM provider could be auto-detected from environment.\n\
                Set ANTHROPIC_API_KEY, OPENAI_API_KEY, or configure a provider.\n\
                Error: {}",
                e
            ),
        })?;

    Ok(llm_provider)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    struct Canned(&'static str);

    #[async_trait]
    impl CompletionClient for Canned {
        async fn get_completion(&self, _prompt: &str) -> Result<String, CompletionError> {
            Ok(self.0.to_string())
        }
    }

    fn pipeline(reply: &'static str) -> AnalysisPipeline {
        AnalysisPipeline::new(Arc::new(Canned(reply)), AnalysisConfig::default())
    }

    #[tokio::test]
    async fn rejects_blank_notes() {
        let err = pipeline("{}").analyze("   ", "A").await.unwrap_err();
        assert!(matches!(
            err,
            MeetingIntelError::InvalidInput { field: "notes", .. }
        ));
    }

    #[tokio::test]
    async fn rejects_blank_attendees() {
        let err = pipeline("{}").analyze("notes", "").await.unwrap_err();
        assert!(matches!(
            err,
            MeetingIntelError::InvalidInput {
                field: "attendees",
                ..
            }
        ));
    }

    #[tokio::test]
    async fn cancelled_before_call_is_unavailable() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let r = pipeline(r#"{"summary": "never seen"}"#)
            .analyze_with_cancel("notes", "A", &cancel)
            .await
            .unwrap();
        assert_eq!(r, AnalysisResult::unavailable());
    }
}
