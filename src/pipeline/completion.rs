//! Completion-service boundary.
//!
//! [`CompletionClient`] is the only thing the analysis pipeline knows about
//! the model: a prompt goes in, text or a classified [`CompletionError`]
//! comes out. [`LlmCompletionClient`] is the production implementation over
//! an `edgequake-llm` provider; tests substitute their own.
//!
//! ## Retry Strategy
//!
//! Provider errors are classified first: network faults are `Transport`,
//! provider timeouts are `Timeout`, authentication and malformed requests
//! are `Rejected` and never retried, everything else is `Remote`.
//! Transient failures (transport, timeout, remote 5xx/429) are retried with
//! exponential backoff (`retry_backoff_ms * 2^attempt`). Each attempt is
//! bounded by `api_timeout_secs` so one stuck connection cannot hold the
//! caller indefinitely.

use crate::config::AnalysisConfig;
use crate::error::CompletionError;
use async_trait::async_trait;
use edgequake_llm::{ChatMessage, CompletionOptions, LLMProvider, LlmError};
use std::sync::Arc;
use std::time::Instant;
use tokio::time::{sleep, timeout, Duration};
use tracing::{debug, info, warn};

/// Sends one prompt to a completion service and returns its raw text.
#[async_trait]
pub trait CompletionClient: Send + Sync {
    async fn get_completion(&self, prompt: &str) -> Result<String, CompletionError>;
}

/// [`CompletionClient`] backed by an `edgequake-llm` provider.
pub struct LlmCompletionClient {
    provider: Arc<dyn LLMProvider>,
    system_prompt: Option<String>,
    options: CompletionOptions,
    max_retries: u32,
    retry_backoff_ms: u64,
    api_timeout_secs: u64,
}

impl LlmCompletionClient {
    pub fn new(provider: Arc<dyn LLMProvider>, config: &AnalysisConfig) -> Self {
        Self {
            provider,
            system_prompt: config.system_prompt.clone(),
            options: build_options(config),
            max_retries: config.max_retries,
            retry_backoff_ms: config.retry_backoff_ms,
            api_timeout_secs: config.api_timeout_secs,
        }
    }

    fn messages(&self, prompt: &str) -> Vec<ChatMessage> {
        let mut messages = Vec::with_capacity(2);
        if let Some(ref system) = self.system_prompt {
            messages.push(ChatMessage::system(system.as_str()));
        }
        messages.push(ChatMessage::user(prompt));
        messages
    }

    async fn attempt(&self, messages: &[ChatMessage]) -> Result<String, CompletionError> {
        let call = self.provider.chat(messages, Some(&self.options));
        match timeout(Duration::from_secs(self.api_timeout_secs), call).await {
            Ok(Ok(response)) => {
                debug!(
                    "Completion: {} input tokens, {} output tokens",
                    response.prompt_tokens, response.completion_tokens
                );
                Ok(response.content)
            }
            Ok(Err(e)) => Err(classify(e, self.api_timeout_secs)),
            Err(_) => Err(CompletionError::Timeout {
                secs: self.api_timeout_secs,
            }),
        }
    }
}

#[async_trait]
impl CompletionClient for LlmCompletionClient {
    async fn get_completion(&self, prompt: &str) -> Result<String, CompletionError> {
        if prompt.trim().is_empty() {
            return Err(CompletionError::EmptyPrompt);
        }

        let start = Instant::now();
        let messages = self.messages(prompt);
        info!("Sending analysis request to completion service");

        let mut attempt = 0;
        loop {
            match self.attempt(&messages).await {
                Ok(text) => {
                    info!(
                        "Received completion ({} chars) in {:?}",
                        text.len(),
                        start.elapsed()
                    );
                    return Ok(text);
                }
                Err(e) if e.is_transient() && attempt < self.max_retries => {
                    attempt += 1;
                    let backoff = self.retry_backoff_ms * 2u64.pow(attempt - 1);
                    warn!(
                        "Completion attempt {} failed — {}; retrying in {}ms",
                        attempt, e, backoff
                    );
                    sleep(Duration::from_millis(backoff)).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

/// Map a provider error onto the completion error taxonomy.
fn classify(e: LlmError, api_timeout_secs: u64) -> CompletionError {
    match e {
        LlmError::NetworkError { .. } => CompletionError::Transport(e.to_string()),
        LlmError::Timeout { .. } => CompletionError::Timeout {
            secs: api_timeout_secs,
        },
        LlmError::AuthError { .. }
        | LlmError::InvalidRequest { .. }
        | LlmError::ModelNotFound { .. }
        | LlmError::TokenLimitExceeded { .. }
        | LlmError::ConfigError { .. }
        | LlmError::NotSupported { .. } => CompletionError::Rejected(e.to_string()),
        _ => CompletionError::Remote(e.to_string()),
    }
}

/// Build `CompletionOptions` from the analysis config.
fn build_options(config: &AnalysisConfig) -> CompletionOptions {
    CompletionOptions {
        temperature: Some(config.temperature),
        max_tokens: Some(config.max_tokens),
        ..Default::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_options_defaults() {
        let config = AnalysisConfig::default();
        let opts = build_options(&config);
        assert_eq!(opts.temperature, Some(0.2));
        assert_eq!(opts.max_tokens, Some(2048));
    }

    #[test]
    fn build_options_follow_config() {
        let config = AnalysisConfig::builder()
            .max_tokens(512)
            .temperature(0.0)
            .build()
            .unwrap();
        let opts = build_options(&config);
        assert_eq!(opts.temperature, Some(0.0));
        assert_eq!(opts.max_tokens, Some(512));
    }

    #[test]
    fn network_errors_are_transport() {
        let e = classify(LlmError::NetworkError("connection reset".into()), 60);
        assert!(matches!(e, CompletionError::Transport(ref m) if m.contains("connection reset")));
        assert!(e.is_transient());
    }

    #[test]
    fn auth_and_bad_requests_are_not_retried() {
        for err in [
            LlmError::AuthError("invalid x-api-key".into()),
            LlmError::InvalidRequest("max_tokens too large".into()),
            LlmError::ModelNotFound("claude-9".into()),
        ] {
            let e = classify(err, 60);
            assert!(matches!(e, CompletionError::Rejected(_)), "got {e:?}");
            assert!(!e.is_transient());
        }
    }

    #[test]
    fn overload_and_api_errors_stay_remote() {
        for err in [
            LlmError::RateLimited("429".into()),
            LlmError::ApiError("529 overloaded".into()),
        ] {
            let e = classify(err, 60);
            assert!(matches!(e, CompletionError::Remote(_)), "got {e:?}");
            assert!(e.is_transient());
        }
    }
}
