//! Dossier synthesis: prompt construction, model invocation, and
//! response validation against the dossier schema.
//!
//! The prompt is a deterministic template over the query, a capped set of
//! extracted articles (longest bodies first), and a smaller set of
//! supplementary search snippets. Temperature is low because this is
//! factual extraction, not generation.
//!
//! Model output is handled tolerantly but explicitly: the substring from
//! the first `{` to the last `}` is taken as the candidate JSON (models
//! wrap JSON in prose and code fences), a parse failure is fatal for the
//! run, and a parsed object missing required keys is backfilled with
//! type-appropriate empty values rather than failed. The engine never
//! retries the model call; retry is a transport policy.

use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, instrument, warn};

use crate::config::PipelineConfig;
use crate::error::{PipelineError, Result};
use crate::llm::{ChatModel, ChatRequest};
use crate::models::{EventDetails, ExtractedArticle, SearchResult};
use crate::utils::{truncate_chars, truncate_for_log};

const SYSTEM_PROMPT: &str = "You are a news analyst. You extract structured facts strictly from \
the source material you are given. You respond with a single JSON object and nothing else. You \
never state anything the sources do not establish.";

pub struct SynthesisEngine {
    model: Arc<dyn ChatModel>,
    max_articles: usize,
    max_snippets: usize,
    prompt_article_cap: usize,
    temperature: f32,
    max_tokens: u32,
}

impl SynthesisEngine {
    pub fn new(model: Arc<dyn ChatModel>, config: &PipelineConfig) -> Self {
        Self {
            model,
            max_articles: config.max_articles,
            max_snippets: config.max_snippets,
            prompt_article_cap: config.prompt_article_cap,
            temperature: config.temperature,
            max_tokens: config.synthesis_max_tokens,
        }
    }

    /// Synthesize a dossier from extracted articles and snippets.
    ///
    /// The returned record has empty `sources` and `images`; the
    /// orchestrator attaches both deterministically outside the model
    /// call.
    #[instrument(level = "info", skip_all, fields(articles = articles.len(), snippets = snippets.len()))]
    pub async fn synthesize(
        &self,
        query: &str,
        articles: &[ExtractedArticle],
        snippets: &[SearchResult],
    ) -> Result<EventDetails> {
        let selected = select_articles(articles, self.max_articles);
        let prompt = self.build_prompt(query, &selected, snippets);
        debug!(prompt_chars = prompt.chars().count(), "Built synthesis prompt");

        let raw = self
            .model
            .complete(&ChatRequest {
                system: Some(SYSTEM_PROMPT.to_string()),
                user: prompt,
                temperature: self.temperature,
                max_tokens: self.max_tokens,
            })
            .await?;

        let trimmed = raw.trim();
        let candidate = extract_embedded_json(trimmed).ok_or_else(|| {
            warn!(
                response_preview = %truncate_for_log(trimmed, 300),
                "Model output contained no JSON object"
            );
            PipelineError::SynthesisFormat("no JSON object in model output".to_string())
        })?;
        let value: Value = serde_json::from_str(candidate).map_err(|e| {
            warn!(
                error = %e,
                response_preview = %truncate_for_log(candidate, 300),
                "Model returned non-conforming JSON"
            );
            PipelineError::SynthesisFormat(e.to_string())
        })?;

        Ok(details_from_value(&value))
    }

    fn build_prompt(
        &self,
        query: &str,
        articles: &[&ExtractedArticle],
        snippets: &[SearchResult],
    ) -> String {
        let mut prompt = String::new();
        prompt.push_str(&format!("Research query: {query}\n\n"));
        prompt.push_str(
            "Using ONLY the source material below, produce a JSON object with exactly these fields:\n\
             {\n\
             \x20 \"location\": string,   // where the event took place\n\
             \x20 \"details\": string,    // narrative account of what happened\n\
             \x20 \"accused\": [string],  // accused or suspected parties\n\
             \x20 \"victims\": [string],  // victims named in the coverage\n\
             \x20 \"timeline\": [string]  // chronological entries, earliest first\n\
             }\n\
             Use an empty string or empty array for anything the sources do not establish.\n\n",
        );

        prompt.push_str("SOURCE ARTICLES:\n");
        for (i, article) in articles.iter().enumerate() {
            prompt.push_str(&format!(
                "--- Article {} ({}) {} ---\n{}\n\n",
                i + 1,
                article.source_domain,
                article.title,
                truncate_chars(&article.body_text, self.prompt_article_cap)
            ));
        }

        let snippets = &snippets[..snippets.len().min(self.max_snippets)];
        if !snippets.is_empty() {
            prompt.push_str("SUPPLEMENTARY SNIPPETS:\n");
            for snippet in snippets {
                prompt.push_str(&format!("- {}: {}\n", snippet.title, snippet.snippet));
            }
        }
        prompt
    }
}

/// Keep the `max` articles with the longest extracted bodies.
///
/// The sort is stable, so among equal lengths the caller's fetch-priority
/// order survives.
pub(crate) fn select_articles(articles: &[ExtractedArticle], max: usize) -> Vec<&ExtractedArticle> {
    let mut ordered: Vec<&ExtractedArticle> = articles.iter().collect();
    ordered.sort_by(|a, b| b.body_text.len().cmp(&a.body_text.len()));
    ordered.truncate(max);
    ordered
}

/// The substring from the first `{` to the last `}` of `raw`.
///
/// Model output format is not contractually guaranteed; this tolerates
/// JSON wrapped in prose or code fences. Returns `None` when no plausible
/// object is present.
pub(crate) fn extract_embedded_json(raw: &str) -> Option<&str> {
    let start = raw.find('{')?;
    let end = raw.rfind('}')?;
    if end < start {
        return None;
    }
    Some(&raw[start..=end])
}

/// Build a dossier from parsed model output, backfilling missing or
/// mistyped fields with schema-appropriate empty values.
pub(crate) fn details_from_value(value: &Value) -> EventDetails {
    EventDetails {
        location: string_field(value, "location"),
        details: string_field(value, "details"),
        accused: list_field(value, "accused"),
        victims: list_field(value, "victims"),
        timeline: list_field(value, "timeline"),
        sources: Vec::new(),
        images: Vec::new(),
    }
}

fn string_field(value: &Value, key: &str) -> String {
    value
        .get(key)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .trim()
        .to_string()
}

fn list_field(value: &Value, key: &str) -> Vec<String> {
    match value.get(key) {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(Value::as_str)
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect(),
        // Models occasionally hand back a bare string for a list field.
        Some(Value::String(s)) if !s.trim().is_empty() => vec![s.trim().to_string()],
        _ => Vec::new(),
    }
}
