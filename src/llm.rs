//! Chat-model transport with exponential backoff retry logic.
//!
//! The [`ChatModel`] trait is the boundary between the pipeline and the
//! model provider; [`OpenAiChat`] speaks the OpenAI-compatible
//! chat-completions wire format, and [`RetryChat`] is a decorator adding
//! retry with exponential backoff and jitter around any implementation.
//!
//! Retry lives here, at the transport, as a composition-root policy: the
//! synthesis code itself never retries, so a hard format failure is not
//! silently re-billed.
//!
//! # Retry strategy
//!
//! ```text
//! delay = min(base_delay * 2^(attempt-1), max_delay) + random_jitter(0..250ms)
//! ```

use async_trait::async_trait;
use rand::{rng, Rng};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};
use tokio::time::sleep;
use tracing::{error, info, instrument, warn};

use crate::config::AppConfig;
use crate::error::{PipelineError, Result};
use crate::utils::truncate_for_log;

/// One request to the chat model.
#[derive(Debug, Clone)]
pub struct ChatRequest {
    /// Optional system message preceding the user message.
    pub system: Option<String>,
    /// The user message carrying the prompt.
    pub user: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

/// Boundary trait for chat-model providers.
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Send one request and return the raw text completion.
    async fn complete(&self, request: &ChatRequest) -> Result<String>;
}

// ---- OpenAI-compatible wire format ----

#[derive(Debug, Serialize)]
struct WireRequest<'a> {
    model: &'a str,
    messages: Vec<WireMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Serialize)]
struct WireMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct WireResponse {
    choices: Vec<WireChoice>,
}

#[derive(Debug, Deserialize)]
struct WireChoice {
    message: WireResponseMessage,
}

#[derive(Debug, Deserialize)]
struct WireResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Client for an OpenAI-compatible `/chat/completions` endpoint.
pub struct OpenAiChat {
    client: reqwest::Client,
    api_key: Option<String>,
    base_url: String,
    model: String,
}

impl OpenAiChat {
    pub fn new(config: &AppConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.pipeline.model_timeout)
            .build()
            .map_err(|e| PipelineError::Internal(e.to_string()))?;
        Ok(Self {
            client,
            api_key: config.openai_api_key.clone(),
            base_url: config.openai_base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
        })
    }
}

#[async_trait]
impl ChatModel for OpenAiChat {
    #[instrument(level = "info", skip_all, fields(model = %self.model))]
    async fn complete(&self, request: &ChatRequest) -> Result<String> {
        let api_key = self
            .api_key
            .as_deref()
            .filter(|k| !k.is_empty())
            .ok_or(PipelineError::MissingCredentials("OPENAI_API_KEY"))?;

        let mut messages = Vec::with_capacity(2);
        if let Some(system) = request.system.as_deref() {
            messages.push(WireMessage { role: "system", content: system });
        }
        messages.push(WireMessage { role: "user", content: &request.user });

        let wire = WireRequest {
            model: &self.model,
            messages,
            temperature: request.temperature,
            max_tokens: request.max_tokens,
        };

        let t0 = Instant::now();
        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(api_key)
            .json(&wire)
            .send()
            .await
            .map_err(|e| PipelineError::Model(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| PipelineError::Model(e.to_string()))?;
        if !status.is_success() {
            return Err(PipelineError::Model(format!(
                "status {status}: {}",
                truncate_for_log(&body, 300)
            )));
        }

        let decoded: WireResponse = serde_json::from_str(&body)
            .map_err(|e| PipelineError::Model(format!("bad completion response: {e}")))?;
        let content = decoded
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| PipelineError::Model("completion had no content".to_string()))?;

        info!(elapsed_ms = t0.elapsed().as_millis() as u64, "Completion received");
        Ok(content)
    }
}

/// Decorator adding exponential backoff retry to any [`ChatModel`].
pub struct RetryChat<T> {
    inner: T,
    max_retries: usize,
    base_delay: Duration,
    max_delay: Duration,
}

impl<T: ChatModel> RetryChat<T> {
    pub fn new(inner: T, max_retries: usize, base_delay: Duration) -> Self {
        Self {
            inner,
            max_retries,
            base_delay,
            max_delay: Duration::from_secs(30),
        }
    }
}

#[async_trait]
impl<T: ChatModel> ChatModel for RetryChat<T> {
    #[instrument(level = "info", skip_all)]
    async fn complete(&self, request: &ChatRequest) -> Result<String> {
        let total_t0 = Instant::now();
        let mut attempt = 0usize;

        loop {
            let attempt_t0 = Instant::now();
            match self.inner.complete(request).await {
                Ok(resp) => return Ok(resp),
                // Absent credentials will not appear on retry.
                Err(e @ PipelineError::MissingCredentials(_)) => return Err(e),
                Err(e) => {
                    attempt += 1;
                    if attempt > self.max_retries {
                        error!(
                            attempt,
                            max = self.max_retries,
                            elapsed_ms_total = total_t0.elapsed().as_millis() as u64,
                            error = %e,
                            "complete() exhausted retries"
                        );
                        return Err(e);
                    }

                    // backoff calc
                    let mut delay = self.base_delay.saturating_mul(1 << (attempt - 1));
                    if delay > self.max_delay {
                        delay = self.max_delay;
                    }
                    let jitter_ms: u64 = rng().random_range(0..=250);
                    let delay = delay + Duration::from_millis(jitter_ms);

                    warn!(
                        attempt,
                        max = self.max_retries,
                        elapsed_ms_attempt = attempt_t0.elapsed().as_millis() as u64,
                        ?delay,
                        error = %e,
                        "complete() attempt failed; backing off"
                    );
                    sleep(delay).await;
                }
            }
        }
    }
}

// ---- Test double ----

/// Canned-reply model that counts how often it was called.
pub struct MockChat {
    reply: std::result::Result<String, String>,
    calls: AtomicUsize,
}

impl MockChat {
    pub fn new(reply: impl Into<String>) -> Self {
        Self { reply: Ok(reply.into()), calls: AtomicUsize::new(0) }
    }

    /// A model that always fails with the given message.
    pub fn failing(message: impl Into<String>) -> Self {
        Self { reply: Err(message.into()), calls: AtomicUsize::new(0) }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ChatModel for MockChat {
    async fn complete(&self, _request: &ChatRequest) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.reply {
            Ok(reply) => Ok(reply.clone()),
            Err(message) => Err(PipelineError::Model(message.clone())),
        }
    }
}
