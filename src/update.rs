//! Incremental update detection: decide whether genuinely new coverage
//! exists since the last run, and summarize it when it does.
//!
//! A fresh search pass is scoped to a recency window derived from the
//! watermark. A result only counts as new when its published date parsed
//! cleanly, is not in the future, and is strictly after the watermark. If
//! nothing qualifies the detector returns `None` without calling the
//! model: no model spend, no store write, no watermark advance. That
//! short-circuit is the cost-control property of this component.

use chrono::{DateTime, Utc};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

use crate::config::PipelineConfig;
use crate::error::{PipelineError, Result};
use crate::llm::{ChatModel, ChatRequest};
use crate::models::{EventUpdate, SearchResult};
use crate::search::WebSearch;
use crate::synthesis::extract_embedded_json;
use crate::utils::{truncate_chars, truncate_for_log};

const UPDATE_SYSTEM_PROMPT: &str = "You are a news analyst tracking an ongoing event. You \
summarize only what is new in the coverage you are given. You respond with a single JSON object \
and nothing else.";

pub struct UpdateDetector {
    search: Arc<dyn WebSearch>,
    model: Arc<dyn ChatModel>,
    temperature: f32,
    max_tokens: u32,
    title_cap: usize,
    description_cap: usize,
}

impl UpdateDetector {
    pub fn new(
        search: Arc<dyn WebSearch>,
        model: Arc<dyn ChatModel>,
        config: &PipelineConfig,
    ) -> Self {
        Self {
            search,
            model,
            temperature: config.temperature,
            max_tokens: config.update_max_tokens,
            title_cap: config.update_title_cap,
            description_cap: config.update_description_cap,
        }
    }

    /// Search within the recency window and summarize qualifying results.
    ///
    /// Returns `None` when no result is verifiably newer than the
    /// watermark. `now` is passed in rather than read from the clock so
    /// the qualify logic is deterministic under test.
    #[instrument(level = "info", skip(self, query), fields(event_id = %event_id))]
    pub async fn detect_and_summarize(
        &self,
        event_id: &str,
        query: &str,
        last_updated_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<Option<EventUpdate>> {
        let window_days = (now - last_updated_at).num_days().max(1) as u32;
        let results = self.search.search_web(query, Some(window_days)).await?;

        let fresh: Vec<&SearchResult> = results
            .iter()
            .filter(|r| qualifies(r, last_updated_at, now))
            .collect();
        if fresh.is_empty() {
            info!(
                candidates = results.len(),
                "No coverage newer than the watermark; skipping summary"
            );
            return Ok(None);
        }
        debug!(fresh = fresh.len(), candidates = results.len(), "Found new coverage");

        let raw = self
            .model
            .complete(&ChatRequest {
                system: Some(UPDATE_SYSTEM_PROMPT.to_string()),
                user: build_update_prompt(query, &fresh),
                temperature: self.temperature,
                max_tokens: self.max_tokens,
            })
            .await?;

        let trimmed = raw.trim();
        let candidate = extract_embedded_json(trimmed).ok_or_else(|| {
            warn!(
                response_preview = %truncate_for_log(trimmed, 300),
                "Update summary contained no JSON object"
            );
            PipelineError::SynthesisFormat("no JSON object in update summary".to_string())
        })?;
        let value: Value = serde_json::from_str(candidate).map_err(|e| {
            warn!(
                error = %e,
                response_preview = %truncate_for_log(candidate, 300),
                "Update summary was non-conforming JSON"
            );
            PipelineError::SynthesisFormat(e.to_string())
        })?;

        let title = non_empty(&value, "title").unwrap_or_else(|| query.to_string());
        // The compact schema carries both a description and a broader
        // summary field; prefer the former, absorb its absence.
        let description = non_empty(&value, "description")
            .or_else(|| non_empty(&value, "summary"))
            .unwrap_or_default();

        Ok(Some(EventUpdate {
            event_id: event_id.to_string(),
            title: truncate_chars(&title, self.title_cap),
            description: truncate_chars(&description, self.description_cap),
            update_date: now,
        }))
    }
}

/// A result qualifies as new only with a valid published date strictly
/// after the watermark. Unparseable and future-dated results never
/// qualify.
fn qualifies(result: &SearchResult, last_updated_at: DateTime<Utc>, now: DateTime<Utc>) -> bool {
    match result.published_at {
        Some(published) => published > last_updated_at && published <= now,
        None => false,
    }
}

fn build_update_prompt(query: &str, fresh: &[&SearchResult]) -> String {
    let mut prompt = String::new();
    prompt.push_str(&format!("Ongoing event: {query}\n\n"));
    prompt.push_str(
        "The search results below were published after our last report on this event. \
         Summarize what is new in a JSON object with exactly these fields:\n\
         {\n\
         \x20 \"title\": string,       // short headline for the update\n\
         \x20 \"description\": string, // what changed, for an analyst briefing\n\
         \x20 \"relevance\": string,   // why this matters to the event\n\
         \x20 \"insights\": [string],  // notable new facts\n\
         \x20 \"summary\": string      // one-paragraph recap\n\
         }\n\nNEW COVERAGE:\n",
    );
    for (i, result) in fresh.iter().enumerate() {
        let date = result
            .published_at
            .map(|d| d.format("%Y-%m-%d").to_string())
            .unwrap_or_default();
        prompt.push_str(&format!(
            "{}. [{}] {} ({})\n   {}\n",
            i + 1,
            date,
            result.title,
            result.display_domain,
            result.snippet
        ));
    }
    prompt
}

fn non_empty(value: &Value, key: &str) -> Option<String> {
    value
        .get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}
