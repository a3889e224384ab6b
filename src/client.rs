//! External model client: the only part of the service with network I/O.
//!
//! The orchestrator talks to the model through [`ModelClient`], passed in
//! explicitly, so conversions can be tested without a live service.
//! [`LlmModelClient`] is the production implementation on top of an
//! `edgequake_llm` provider.
//!
//! ## Retry Strategy
//!
//! HTTP 429 / 503 errors from LLM APIs are transient. Each call is retried
//! with exponential backoff (`retry_backoff_ms * 2^attempt`) and bounded by
//! `api_timeout_secs` (see [`with_retry`]). This is the only retry in the
//! whole pipeline.

use crate::config::ServiceConfig;
use crate::error::Pdf2HtmlError;
use crate::language::Language;
use crate::pipeline::encode::to_image_data;
use crate::prompts::{alt_text_prompt, html_system_prompt, html_user_prompt, HtmlRequest};
use async_trait::async_trait;
use edgequake_llm::{ChatMessage, CompletionOptions, LLMProvider, ProviderFactory};
use std::sync::Arc;
use std::time::Instant;
use tokio::time::{sleep, timeout, Duration};
use tracing::{debug, warn};

/// Opaque request/response contract with the generative model.
#[async_trait]
pub trait ModelClient: Send + Sync {
    /// Describe one PNG image in `language`; returns the raw answer.
    async fn describe_image(&self, png: &[u8], language: Language) -> Result<String, Pdf2HtmlError>;

    /// Convert the document into HTML in `request.language`; returns the raw answer.
    async fn generate_html(&self, request: &HtmlRequest<'_>) -> Result<String, Pdf2HtmlError>;
}

/// [`ModelClient`] backed by an `edgequake_llm` provider.
pub struct LlmModelClient {
    provider: Arc<dyn LLMProvider>,
    temperature: f32,
    max_tokens: usize,
    alt_text_max_tokens: usize,
    max_retries: u32,
    retry_backoff_ms: u64,
    api_timeout_secs: u64,
}

impl LlmModelClient {
    pub fn new(provider: Arc<dyn LLMProvider>, config: &ServiceConfig) -> Self {
        Self {
            provider,
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            alt_text_max_tokens: config.alt_text_max_tokens,
            max_retries: config.max_retries,
            retry_backoff_ms: config.retry_backoff_ms,
            api_timeout_secs: config.api_timeout_secs,
        }
    }

    /// Resolve the provider from `config` and wrap it.
    pub fn from_config(config: &ServiceConfig) -> Result<Self, Pdf2HtmlError> {
        let provider = resolve_provider(config)?;
        Ok(Self::new(provider, config))
    }

    /// Send `messages`, retrying transient failures.
    async fn chat_with_retry(
        &self,
        stage: &'static str,
        messages: &[ChatMessage],
        options: &CompletionOptions,
    ) -> Result<String, Pdf2HtmlError> {
        let start = Instant::now();
        let policy = RetryPolicy {
            max_retries: self.max_retries,
            backoff_ms: self.retry_backoff_ms,
            timeout_secs: self.api_timeout_secs,
        };
        let response = with_retry(stage, policy, || self.provider.chat(messages, Some(options))).await?;
        debug!(
            "{}: {} input tokens, {} output tokens, {:?}",
            stage,
            response.prompt_tokens,
            response.completion_tokens,
            start.elapsed()
        );
        Ok(response.content)
    }
}

/// Retry limits for one model call.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub backoff_ms: u64,
    pub timeout_secs: u64,
}

/// Run `call` until it succeeds or `policy.max_retries` retries are spent.
///
/// Each attempt is bounded by `policy.timeout_secs`; the delay before retry
/// `n` is `backoff_ms * 2^(n-1)`. The last failure is returned.
pub async fn with_retry<T, E, F, Fut>(
    stage: &'static str,
    policy: RetryPolicy,
    mut call: F,
) -> Result<T, Pdf2HtmlError>
where
    E: std::fmt::Display,
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, E>>,
{
    let call_timeout = Duration::from_secs(policy.timeout_secs);
    let mut last_err: Option<Pdf2HtmlError> = None;

    for attempt in 0..=policy.max_retries {
        if attempt > 0 {
            let backoff = policy.backoff_ms * 2u64.pow(attempt - 1);
            warn!(
                "{}: retry {}/{} after {}ms",
                stage, attempt, policy.max_retries, backoff
            );
            sleep(Duration::from_millis(backoff)).await;
        }

        match timeout(call_timeout, call()).await {
            Ok(Ok(value)) => return Ok(value),
            Ok(Err(e)) => {
                warn!("{}: attempt {} failed: {}", stage, attempt + 1, e);
                last_err = Some(Pdf2HtmlError::ExternalService {
                    stage,
                    retries: policy.max_retries,
                    message: e.to_string(),
                });
            }
            Err(_) => {
                warn!(
                    "{}: attempt {} timed out after {}s",
                    stage,
                    attempt + 1,
                    policy.timeout_secs
                );
                last_err = Some(Pdf2HtmlError::ApiTimeout {
                    stage,
                    secs: policy.timeout_secs,
                });
            }
        }
    }

    Err(last_err.unwrap_or_else(|| Pdf2HtmlError::ExternalService {
        stage,
        retries: policy.max_retries,
        message: "Unknown error".to_string(),
    }))
}

#[async_trait]
impl ModelClient for LlmModelClient {
    async fn describe_image(&self, png: &[u8], language: Language) -> Result<String, Pdf2HtmlError> {
        let messages = vec![ChatMessage::user_with_images(
            alt_text_prompt(language),
            vec![to_image_data(png)],
        )];
        let options = build_options(self.temperature, self.alt_text_max_tokens);
        self.chat_with_retry("alt text", &messages, &options).await
    }

    async fn generate_html(&self, request: &HtmlRequest<'_>) -> Result<String, Pdf2HtmlError> {
        let images = request
            .pages
            .iter()
            .map(|page| to_image_data(&page.png))
            .collect();
        let messages = vec![
            ChatMessage::system(html_system_prompt(request)),
            ChatMessage::user_with_images(html_user_prompt(request), images),
        ];
        let options = build_options(self.temperature, self.max_tokens);
        self.chat_with_retry("html generation", &messages, &options).await
    }
}

/// Resolve the LLM provider, from most-specific to least-specific.
///
/// 1. **Pre-built provider** (`config.provider`) — used as-is.
/// 2. **Named provider** (`config.provider_name`) + model (default
///    `gemini-2.5-flash`). The factory reads the matching API key
///    (`GEMINI_API_KEY`, `OPENAI_API_KEY`, …) from the environment.
/// 3. **Environment pair** (`EDGEQUAKE_LLM_PROVIDER` + `EDGEQUAKE_MODEL`).
/// 4. **Default provider** — Gemini when `GEMINI_API_KEY` is set.
/// 5. **Full auto-detection** (`ProviderFactory::from_env`).
pub fn resolve_provider(config: &ServiceConfig) -> Result<Arc<dyn LLMProvider>, Pdf2HtmlError> {
    if let Some(ref provider) = config.provider {
        return Ok(Arc::clone(provider));
    }

    if let Some(ref name) = config.provider_name {
        return create_provider(name, config.model_or_default());
    }

    if let (Ok(prov), Ok(model)) = (
        std::env::var("EDGEQUAKE_LLM_PROVIDER"),
        std::env::var("EDGEQUAKE_MODEL"),
    ) {
        if !prov.is_empty() && !model.is_empty() {
            return create_provider(&prov, &model);
        }
    }

    if std::env::var("GEMINI_API_KEY").is_ok_and(|key| !key.is_empty()) {
        return create_provider(config.provider_name_or_default(), config.model_or_default());
    }

    let (llm_provider, _embedding) =
        ProviderFactory::from_env().map_err(|e| Pdf2HtmlError::ProviderNotConfigured {
            provider: "auto".to_string(),
            hint: format!(
                "No LLM provider could be auto-detected from environment.\n\
                Set GEMINI_API_KEY (or OPENAI_API_KEY, ANTHROPIC_API_KEY).\n\
                Error: {}",
                e
            ),
        })?;

    Ok(llm_provider)
}

/// Build `CompletionOptions` for one call.
fn build_options(temperature: f32, max_tokens: usize) -> CompletionOptions {
    CompletionOptions {
        temperature: Some(temperature),
        max_tokens: Some(max_tokens),
        ..Default::default()
    }
}

fn create_provider(provider_name: &str, model: &str) -> Result<Arc<dyn LLMProvider>, Pdf2HtmlError> {
    ProviderFactory::create_llm_provider(provider_name, model).map_err(|e| {
        Pdf2HtmlError::ProviderNotConfigured {
            provider: provider_name.to_string(),
            hint: format!("{e}"),
        }
    })
}
