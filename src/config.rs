//! Application configuration.
//!
//! Credentials and endpoints come from the environment ([`AppConfig`]);
//! pipeline tunables live in [`PipelineConfig`] with defaults that match
//! what the pipeline was operated with in production. Nothing in the
//! pipeline hard-codes a constant at the call site: every cap, threshold,
//! timeout, and budget is a field here.

use std::time::Duration;

/// Credentials and endpoints, loaded from the environment.
///
/// Missing credentials are kept as `None` rather than failing at load
/// time: web search treats an absent key as fatal at the point of use,
/// while image search degrades to an empty result set.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Google Custom Search API key.
    pub google_api_key: Option<String>,
    /// Google Custom Search engine id (`cx`).
    pub google_engine_id: Option<String>,
    /// API key for the OpenAI-compatible chat endpoint.
    pub openai_api_key: Option<String>,
    /// Base URL of the chat endpoint.
    pub openai_base_url: String,
    /// Chat model identifier.
    pub model: String,
    /// Shared secret required by the HTTP surface.
    pub api_shared_secret: Option<String>,
    /// Pipeline tunables.
    pub pipeline: PipelineConfig,
}

impl AppConfig {
    /// Load configuration from the environment (and a `.env` file if one
    /// is present).
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        Self {
            google_api_key: std::env::var("GOOGLE_API_KEY").ok(),
            google_engine_id: std::env::var("GOOGLE_SEARCH_ENGINE_ID").ok(),
            openai_api_key: std::env::var("OPENAI_API_KEY").ok(),
            openai_base_url: std::env::var("OPENAI_BASE_URL")
                .unwrap_or_else(|_| "https://api.openai.com/v1".to_string()),
            model: std::env::var("OPENAI_MODEL").unwrap_or_else(|_| "gpt-4o-mini".to_string()),
            api_shared_secret: std::env::var("PIPELINE_API_KEY").ok(),
            pipeline: PipelineConfig::default(),
        }
    }
}

/// Tunables for one pipeline run.
///
/// The defaults are representative operating values, not correctness
/// constraints; larger budgets yield richer synthesis input at higher
/// model cost.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Search pages requested per query (page size is 10).
    pub search_pages: usize,
    /// Delay between paginated search requests.
    pub page_delay: Duration,
    /// Timeout for each search request.
    pub search_timeout: Duration,
    /// Timeout for each article fetch.
    pub fetch_timeout: Duration,
    /// Timeout for one chat-model request.
    pub model_timeout: Duration,
    /// Concurrently in-flight article fetches.
    pub fetch_concurrency: usize,
    /// Character budget for an extracted article body.
    pub body_char_cap: usize,
    /// Minimum body length for an article to count as successfully
    /// scraped; shorter bodies are discarded by the caller.
    pub min_content_len: usize,
    /// Articles kept for the synthesis prompt (longest bodies first).
    pub max_articles: usize,
    /// Supplementary search snippets appended to the prompt.
    pub max_snippets: usize,
    /// Per-article character cap inside the prompt, distinct from the
    /// extraction cap.
    pub prompt_article_cap: usize,
    /// Sampling temperature for synthesis; low because this is factual
    /// extraction, not generation.
    pub temperature: f32,
    /// Output-token budget for the full synthesis call.
    pub synthesis_max_tokens: u32,
    /// Output-token budget for the compact update summary.
    pub update_max_tokens: u32,
    /// Transport-level retries for chat-model calls.
    pub model_retries: usize,
    /// Character cap on an update title.
    pub update_title_cap: usize,
    /// Character cap on an update description.
    pub update_description_cap: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            search_pages: 3,
            page_delay: Duration::from_millis(500),
            search_timeout: Duration::from_secs(12),
            fetch_timeout: Duration::from_secs(10),
            model_timeout: Duration::from_secs(90),
            fetch_concurrency: 8,
            body_char_cap: 10_000,
            min_content_len: 300,
            max_articles: 10,
            max_snippets: 8,
            prompt_article_cap: 3_000,
            temperature: 0.1,
            synthesis_max_tokens: 2_048,
            update_max_tokens: 512,
            model_retries: 3,
            update_title_cap: 100,
            update_description_cap: 1_000,
        }
    }
}
