//! Answer generation: one model call per empty cell.
//!
//! Two transports sit behind [`AnswerClient`]:
//!
//! - [`OllamaClient`] speaks the plain generate protocol: POST
//!   `{"model", "prompt", "stream": false}` and read the `response` string
//!   from the reply. This is the default and needs nothing but a URL.
//! - [`ProviderClient`] routes through `edgequake-llm`, so any hosted
//!   provider the factory knows (OpenAI, Anthropic, Gemini, ...) works with
//!   the same prompt.
//!
//! Each cell gets exactly one request. A failed request (non-200 status,
//! unreadable body, transport error) becomes a [`CellError`] for that cell
//! and never aborts the document.

use crate::config::{FillConfig, DEFAULT_MODEL, DEFAULT_PROVIDER_MODEL};
use crate::error::{CellError, FormFillError};
use crate::model::ContextDocument;
use crate::pipeline::postprocess::clean_answer;
use crate::prompts::build_prompt;
use async_trait::async_trait;
use edgequake_llm::{ChatMessage, CompletionOptions, LLMProvider, ProviderFactory};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Sends one prompt and returns the raw model text.
#[async_trait]
pub trait AnswerClient: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String, CellError>;
}

// ── Generate endpoint ────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    options: GenerateOptions,
}

#[derive(Debug, Serialize)]
struct GenerateOptions {
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    response: String,
}

/// Client for an Ollama-compatible `/api/generate` endpoint.
#[derive(Debug, Clone)]
pub struct OllamaClient {
    http: reqwest::Client,
    url: String,
    model: String,
    temperature: f32,
}

impl OllamaClient {
    /// Build a client. No timeout is applied unless `timeout_secs` is set.
    pub fn new(
        url: impl Into<String>,
        model: impl Into<String>,
        temperature: f32,
        timeout_secs: Option<u64>,
    ) -> Result<Self, FormFillError> {
        let mut builder = reqwest::Client::builder();
        if let Some(secs) = timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        let http = builder
            .build()
            .map_err(|e| FormFillError::InvalidConfig(format!("HTTP client: {e}")))?;
        Ok(Self {
            http,
            url: url.into(),
            model: model.into(),
            temperature,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

#[async_trait]
impl AnswerClient for OllamaClient {
    async fn generate(&self, prompt: &str) -> Result<String, CellError> {
        let body = GenerateRequest {
            model: &self.model,
            prompt,
            stream: false,
            options: GenerateOptions {
                temperature: self.temperature,
            },
        };

        let response = self
            .http
            .post(&self.url)
            .json(&body)
            .send()
            .await
            .map_err(|e| CellError::Transport {
                detail: e.to_string(),
            })?;

        let status = response.status();
        if status != StatusCode::OK {
            return Err(CellError::EndpointStatus {
                status: status.as_u16(),
            });
        }

        let text = response.text().await.map_err(|e| CellError::Transport {
            detail: e.to_string(),
        })?;
        parse_generate_response(&text)
    }
}

/// Extract the `response` string from a generate reply body.
pub fn parse_generate_response(body: &str) -> Result<String, CellError> {
    serde_json::from_str::<GenerateResponse>(body)
        .map(|r| r.response)
        .map_err(|e| CellError::MalformedResponse {
            detail: e.to_string(),
        })
}

// ── Hosted providers ─────────────────────────────────────────────────────

/// Adapter from an `edgequake-llm` provider to [`AnswerClient`].
pub struct ProviderClient {
    provider: Arc<dyn LLMProvider>,
    temperature: f32,
    max_tokens: usize,
}

impl ProviderClient {
    pub fn new(provider: Arc<dyn LLMProvider>, temperature: f32, max_tokens: usize) -> Self {
        Self {
            provider,
            temperature,
            max_tokens,
        }
    }

    fn options(&self) -> CompletionOptions {
        CompletionOptions {
            temperature: Some(self.temperature),
            max_tokens: Some(self.max_tokens),
            ..Default::default()
        }
    }
}

#[async_trait]
impl AnswerClient for ProviderClient {
    async fn generate(&self, prompt: &str) -> Result<String, CellError> {
        let messages = vec![ChatMessage::user(prompt)];
        let options = self.options();
        self.provider
            .chat(&messages, Some(&options))
            .await
            .map(|response| response.content)
            .map_err(|e| CellError::Provider {
                detail: e.to_string(),
            })
    }
}

/// Pick the answer transport, from most-specific to least-specific.
///
/// 1. A pre-built provider in `config.provider`.
/// 2. A named provider (`config.provider_name`), created through
///    [`ProviderFactory::create_llm_provider`], which reads the matching API
///    key from the environment.
/// 3. The generate endpoint at `config.endpoint_url`.
pub fn resolve_answer_client(config: &FillConfig) -> Result<Arc<dyn AnswerClient>, FormFillError> {
    if let Some(ref provider) = config.provider {
        debug!("Using caller-supplied provider");
        return Ok(Arc::new(ProviderClient::new(
            Arc::clone(provider),
            config.temperature,
            config.max_tokens,
        )));
    }

    if let Some(ref name) = config.provider_name {
        let model = config.model.as_deref().unwrap_or(DEFAULT_PROVIDER_MODEL);
        let provider = ProviderFactory::create_llm_provider(name, model).map_err(|e| {
            FormFillError::ProviderNotConfigured {
                provider: name.clone(),
                hint: format!("{e}"),
            }
        })?;
        info!("Answering with provider '{}' model '{}'", name, model);
        return Ok(Arc::new(ProviderClient::new(
            provider,
            config.temperature,
            config.max_tokens,
        )));
    }

    let model = config.model.as_deref().unwrap_or(DEFAULT_MODEL);
    let client = OllamaClient::new(
        config.endpoint_url.clone(),
        model,
        config.temperature,
        config.api_timeout_secs,
    )?;
    info!("Answering via {} model '{}'", client.url(), client.model());
    Ok(Arc::new(client))
}

// ── Engine ───────────────────────────────────────────────────────────────

/// Turns a label plus the context document into a drawable answer.
#[derive(Clone)]
pub struct AnswerEngine {
    client: Arc<dyn AnswerClient>,
    template: Option<String>,
}

impl AnswerEngine {
    pub fn new(client: Arc<dyn AnswerClient>, template: Option<String>) -> Self {
        Self { client, template }
    }

    pub fn prompt_for(&self, label: &str, context: &ContextDocument) -> String {
        build_prompt(self.template.as_deref(), label, context.text())
    }

    /// Ask the model once and clean the reply.
    ///
    /// Returns [`CellError::EmptyAnswer`] when nothing printable survives
    /// cleanup, so the caller leaves the cell blank.
    pub async fn answer(&self, label: &str, context: &ContextDocument) -> Result<String, CellError> {
        let prompt = self.prompt_for(label, context);
        debug!("Prompt for '{}' ({} chars)", label, prompt.len());

        let raw = self.client.generate(&prompt).await?;
        let answer = clean_answer(&raw);
        if answer.is_empty() {
            return Err(CellError::EmptyAnswer);
        }
        Ok(answer)
    }
}
