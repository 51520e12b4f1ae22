//! Explanation request: text + style → validated [`AiExplanation`].
//!
//! The model is reached through [`ExplanationBackend`], so the pipeline can
//! run against a scripted backend in tests and against any
//! `edgequake-llm` provider in production.
//!
//! ## Retry policy
//!
//! Exactly two attempts with the same input. An attempt fails on timeout,
//! backend error, non-JSON output or a schema violation; after the second
//! failure the caller gets [`ExplainError::ExplanationFailed`] carrying the
//! kind of the last failure. There is no backoff: the second attempt is a
//! fresh sample, not a wait for a recovering service.

use crate::config::ExplainConfig;
use crate::error::{ErrorKind, ExplainError};
use crate::pipeline::schema::{parse_explanation, AiExplanation, PayloadProblem};
use crate::prompts::{cap_prompt_text, system_prompt};
use crate::style::ExplanationStyle;
use async_trait::async_trait;
use edgequake_llm::{ChatMessage, CompletionOptions, LLMProvider, ProviderFactory};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Attempts per explanation: the first call plus one retry.
pub const MAX_ATTEMPTS: u32 = 2;

/// Model used when a provider is named without one.
pub const DEFAULT_MODEL: &str = "gpt-4.1-mini";

/// Raw reply from a backend.
#[derive(Debug, Clone, Default)]
pub struct BackendReply {
    pub content: String,
    pub input_tokens: usize,
    pub output_tokens: usize,
}

/// A backend failure, already rendered to text.
#[derive(Debug, Clone, Error)]
#[error("{0}")]
pub struct BackendError(pub String);

/// Something that can turn a system prompt and a user message into text.
#[async_trait]
pub trait ExplanationBackend: Send + Sync {
    async fn complete(&self, system: &str, user: &str) -> Result<BackendReply, BackendError>;
}

/// [`ExplanationBackend`] over an `edgequake-llm` provider.
pub struct LlmBackend {
    provider: Arc<dyn LLMProvider>,
    options: CompletionOptions,
}

impl LlmBackend {
    pub fn new(provider: Arc<dyn LLMProvider>, temperature: f32, max_tokens: usize) -> Self {
        Self {
            provider,
            options: CompletionOptions {
                temperature: Some(temperature),
                max_tokens: Some(max_tokens),
                ..Default::default()
            },
        }
    }

    /// Resolve a provider from `config` and the environment.
    pub fn from_config(config: &ExplainConfig) -> Result<Self, ExplainError> {
        let provider = resolve_provider(config)?;
        Ok(Self::new(provider, config.temperature, config.max_tokens))
    }
}

#[async_trait]
impl ExplanationBackend for LlmBackend {
    async fn complete(&self, system: &str, user: &str) -> Result<BackendReply, BackendError> {
        let messages = vec![ChatMessage::system(system), ChatMessage::user(user)];
        let response = self
            .provider
            .chat(&messages, Some(&self.options))
            .await
            .map_err(|e| BackendError(e.to_string()))?;
        Ok(BackendReply {
            content: response.content,
            input_tokens: response.prompt_tokens,
            output_tokens: response.completion_tokens,
        })
    }
}

fn create_provider(name: &str, model: &str) -> Result<Arc<dyn LLMProvider>, ExplainError> {
    ProviderFactory::create_llm_provider(name, model).map_err(|e| {
        ExplainError::Internal(format!("LLM provider '{name}' is not configured: {e}"))
    })
}

/// Resolve the LLM provider, from most-specific to least-specific.
///
/// 1. `config.provider`, used as-is.
/// 2. `config.provider_name` with `config.model` (or [`DEFAULT_MODEL`]).
/// 3. `EDGEQUAKE_LLM_PROVIDER` + `EDGEQUAKE_MODEL`, when both are set.
/// 4. OpenAI, when `OPENAI_API_KEY` is set.
/// 5. `ProviderFactory::from_env` auto-detection.
pub fn resolve_provider(config: &ExplainConfig) -> Result<Arc<dyn LLMProvider>, ExplainError> {
    if let Some(ref provider) = config.provider {
        return Ok(Arc::clone(provider));
    }

    if let Some(ref name) = config.provider_name {
        let model = config.model.as_deref().unwrap_or(DEFAULT_MODEL);
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

    if let Ok(openai_key) = std::env::var("OPENAI_API_KEY") {
        if !openai_key.is_empty() {
            let model = config.model.as_deref().unwrap_or(DEFAULT_MODEL);
            return create_provider("openai", model);
        }
    }

    let (llm_provider, _embedding) = ProviderFactory::from_env().map_err(|e| {
        ExplainError::Internal(format!(
            "No LLM provider could be auto-detected from environment. \
             Set OPENAI_API_KEY, ANTHROPIC_API_KEY, or configure a provider. Error: {e}"
        ))
    })?;
    Ok(llm_provider)
}

/// Input for one explanation.
#[derive(Debug, Clone, Copy)]
pub struct ExplanationRequest<'a> {
    pub text: &'a str,
    pub style: ExplanationStyle,
    /// Extraction indices of the filtered figures.
    pub figure_indices: &'a [usize],
}

/// A validated explanation plus accounting.
#[derive(Debug, Clone)]
pub struct ExplanationOutcome {
    pub explanation: AiExplanation,
    pub attempts: u32,
    pub input_tokens: usize,
    pub output_tokens: usize,
    pub duration_ms: u64,
    /// The paper text was cut to fit the prompt budget.
    pub prompt_truncated: bool,
}

/// Request and validate an explanation, retrying once on any failure.
pub async fn request_explanation(
    backend: &dyn ExplanationBackend,
    req: ExplanationRequest<'_>,
    config: &ExplainConfig,
) -> Result<ExplanationOutcome, ExplainError> {
    let start = Instant::now();
    let system = system_prompt(req.style, req.figure_indices);
    let user = cap_prompt_text(req.text, config.max_prompt_chars);
    let prompt_truncated = user.len() != req.text.len();
    if prompt_truncated {
        info!(
            "Paper text cut to {} characters for the prompt",
            config.max_prompt_chars
        );
    }

    let timeout = Duration::from_secs(config.ai_timeout_secs);
    let mut input_tokens = 0usize;
    let mut output_tokens = 0usize;
    let mut last: (ErrorKind, String) = (ErrorKind::Internal, String::new());

    for attempt in 1..=MAX_ATTEMPTS {
        if attempt > 1 {
            warn!(
                "Explanation attempt {}/{} after {}: {}",
                attempt, MAX_ATTEMPTS, last.0, last.1
            );
            if let Some(ref cb) = config.progress_callback {
                cb.on_explanation_retry(attempt, &last.1);
            }
        }

        let reply = match tokio::time::timeout(timeout, backend.complete(&system, &user)).await {
            Err(_) => {
                last = (
                    ErrorKind::Timeout,
                    format!("AI did not answer within {}s", config.ai_timeout_secs),
                );
                continue;
            }
            Ok(Err(e)) => {
                last = (ErrorKind::Backend, e.0);
                continue;
            }
            Ok(Ok(reply)) => reply,
        };

        input_tokens += reply.input_tokens;
        output_tokens += reply.output_tokens;
        debug!(
            "Attempt {}: {} input tokens, {} output tokens",
            attempt, reply.input_tokens, reply.output_tokens
        );

        match parse_explanation(&reply.content) {
            Ok(explanation) => {
                info!(
                    "Explanation ready in {} style after {} attempt(s)",
                    req.style, attempt
                );
                return Ok(ExplanationOutcome {
                    explanation,
                    attempts: attempt,
                    input_tokens,
                    output_tokens,
                    duration_ms: start.elapsed().as_millis() as u64,
                    prompt_truncated,
                });
            }
            Err(problem) => {
                let detail = problem.detail();
                if let PayloadProblem::Malformed(_) = problem {
                    debug!("Unparseable reply: {:.200}", reply.content);
                }
                last = (ErrorKind::SchemaViolation, detail);
            }
        }
    }

    warn!("Explanation failed after {} attempts: {}", MAX_ATTEMPTS, last.1);
    Err(ExplainError::ExplanationFailed {
        attempts: MAX_ATTEMPTS,
        cause: last.0,
        last_error: last.1,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Replays a fixed script of replies; `None` sleeps past any timeout.
    struct Scripted {
        script: Mutex<VecDeque<Option<Result<String, String>>>>,
        calls: Mutex<Vec<(String, String)>>,
    }

    impl Scripted {
        fn new(script: Vec<Option<Result<String, String>>>) -> Self {
            Self {
                script: Mutex::new(script.into()),
                calls: Mutex::new(Vec::new()),
            }
        }
        fn calls(&self) -> usize {
            self.calls.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl ExplanationBackend for Scripted {
        async fn complete(&self, system: &str, user: &str) -> Result<BackendReply, BackendError> {
            self.calls
                .lock()
                .unwrap()
                .push((system.to_string(), user.to_string()));
            let next = self.script.lock().unwrap().pop_front().flatten();
            match next {
                None => {
                    tokio::time::sleep(Duration::from_secs(3600)).await;
                    Err(BackendError("unreachable".into()))
                }
                Some(Ok(content)) => Ok(BackendReply {
                    content,
                    input_tokens: 10,
                    output_tokens: 5,
                }),
                Some(Err(e)) => Err(BackendError(e)),
            }
        }
    }

    fn good() -> String {
        serde_json::json!({
            "gist": "g", "analogy": "a", "why_it_matters": "w",
            "key_findings": ["1", "2", "3"],
            "key_terms": [{"term": "t", "definition": "d"}],
        })
        .to_string()
    }

    fn req(text: &str) -> ExplanationRequest<'_> {
        ExplanationRequest {
            text,
            style: ExplanationStyle::Food,
            figure_indices: &[0, 2],
        }
    }

    #[tokio::test]
    async fn first_attempt_success() {
        let backend = Scripted::new(vec![Some(Ok(good()))]);
        let out = request_explanation(&backend, req("paper"), &ExplainConfig::default())
            .await
            .unwrap();
        assert_eq!(out.attempts, 1);
        assert_eq!(out.input_tokens, 10);
        assert_eq!(backend.calls(), 1);
    }

    #[tokio::test]
    async fn malformed_then_valid_succeeds_on_retry() {
        let backend = Scripted::new(vec![Some(Ok("not json".into())), Some(Ok(good()))]);
        let out = request_explanation(&backend, req("paper"), &ExplainConfig::default())
            .await
            .unwrap();
        assert_eq!(out.attempts, 2);
        assert_eq!(out.output_tokens, 10);
        let calls = backend.calls.lock().unwrap();
        assert_eq!(calls[0], calls[1], "retry must reuse the same input");
    }

    #[tokio::test]
    async fn two_backend_errors_surface_explanation_failed() {
        let backend = Scripted::new(vec![Some(Err("503".into())), Some(Err("502 bad".into()))]);
        let err = request_explanation(&backend, req("paper"), &ExplainConfig::default())
            .await
            .unwrap_err();
        match err {
            ExplainError::ExplanationFailed {
                attempts,
                cause,
                last_error,
            } => {
                assert_eq!(attempts, 2);
                assert_eq!(cause, ErrorKind::Backend);
                assert_eq!(last_error, "502 bad");
            }
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(backend.calls(), 2);
    }

    #[tokio::test]
    async fn schema_violation_twice_reports_schema_cause() {
        let bad = serde_json::json!({"gist": "only"}).to_string();
        let backend = Scripted::new(vec![Some(Ok(bad.clone())), Some(Ok(bad))]);
        let err = request_explanation(&backend, req("paper"), &ExplainConfig::default())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ExplainError::ExplanationFailed {
                cause: ErrorKind::SchemaViolation,
                ..
            }
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn timeouts_are_bounded_and_retried() {
        let backend = Scripted::new(vec![None, None]);
        let config = ExplainConfig::builder().ai_timeout_secs(5).build().unwrap();
        let err = request_explanation(&backend, req("paper"), &config)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ExplainError::ExplanationFailed {
                attempts: 2,
                cause: ErrorKind::Timeout,
                ..
            }
        ));
        assert_eq!(backend.calls(), 2);
    }

    #[tokio::test]
    async fn long_text_is_capped_with_marker() {
        let backend = Scripted::new(vec![Some(Ok(good()))]);
        let config = ExplainConfig::builder().max_prompt_chars(1_000).build().unwrap();
        let text = "x".repeat(5_000);
        let out = request_explanation(&backend, req(&text), &config)
            .await
            .unwrap();
        assert!(out.prompt_truncated);
        let calls = backend.calls.lock().unwrap();
        assert!(calls[0].1.ends_with("[Text truncated due to length]"));
        assert!(calls[0].0.contains("[0, 2]"));
    }
}
