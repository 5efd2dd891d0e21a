//! Pipeline orchestration.
//!
//! One research run walks load-event → search → fetch → synthesize →
//! persist for a single event id, owning the failure boundary for the
//! whole run: every internal failure is translated into a
//! [`PipelineError`] and nothing is persisted on a fatal path. The
//! watermark is advanced only after a successful store write, never
//! before, so a failed write is never masked by an advanced watermark.
//!
//! Runs for the same event id are not coordinated; callers must not
//! invoke overlapping runs for one id, or the last writer's upsert wins.

use chrono::Utc;
use std::sync::Arc;
use tracing::{info, instrument, warn};

use crate::config::PipelineConfig;
use crate::error::{PipelineError, Result};
use crate::fetch::{Fetcher, fetch_all};
use crate::filter::filter_results;
use crate::llm::ChatModel;
use crate::models::{EventRecord, EventUpdate, ExtractedArticle, RunSummary};
use crate::search::WebSearch;
use crate::store::EventStore;
use crate::synthesis::SynthesisEngine;
use crate::update::UpdateDetector;

/// Explicit dependency container, built once at process start.
///
/// Every external collaborator is a trait object so tests can substitute
/// fakes; there is no module-level client state anywhere in the crate.
#[derive(Clone)]
pub struct PipelineDeps {
    pub search: Arc<dyn WebSearch>,
    pub model: Arc<dyn ChatModel>,
    pub store: Arc<dyn EventStore>,
    pub fetcher: Arc<dyn Fetcher>,
    pub config: PipelineConfig,
}

/// Run the full research pipeline for one event.
///
/// On success the event's dossier has been overwritten wholesale and the
/// watermark advanced; the returned summary carries the counts reported
/// to the caller.
#[instrument(level = "info", skip(deps), fields(event_id = %event_id))]
pub async fn run_research(deps: &PipelineDeps, event_id: &str) -> Result<RunSummary> {
    validate_event_id(event_id)?;

    let event = load_event(deps, event_id).await?;
    info!(query = %event.query, "Loaded event");

    let raw_results = deps.search.search_web(&event.query, None).await?;
    let candidates = filter_results(raw_results);
    info!(candidates = candidates.len(), "Search complete");

    let urls: Vec<String> = candidates.iter().map(|r| r.url.clone()).collect();
    let articles = fetch_all(deps.fetcher.as_ref(), &urls, deps.config.fetch_concurrency).await;
    let qualifying: Vec<ExtractedArticle> = articles
        .into_iter()
        .filter(|a| a.body_text.chars().count() > deps.config.min_content_len)
        .collect();
    info!(qualifying = qualifying.len(), "Fetch complete");
    if qualifying.is_empty() {
        // Synthesis without source text would hallucinate.
        return Err(PipelineError::NoContentExtracted);
    }

    let images = match deps.search.search_images(&event.query).await {
        Ok(images) => images,
        Err(e) => {
            warn!(error = %e, "Image search failed; continuing without images");
            Vec::new()
        }
    };

    let engine = SynthesisEngine::new(deps.model.clone(), &deps.config);
    let mut details = engine
        .synthesize(&event.query, &qualifying, &candidates)
        .await?;
    // Provenance is attached deterministically, outside the model call:
    // sources are exactly the fetched URLs that carried real content.
    details.sources = qualifying.iter().map(|a| a.url.clone()).collect();
    details.images = images;

    deps.store.upsert_details(event_id, &details).await?;
    deps.store.advance_watermark(event_id, Utc::now()).await?;

    let summary = RunSummary {
        event_id: event_id.to_string(),
        articles_scraped: qualifying.len(),
        images_found: details.images.len(),
        accused_count: details.accused.len(),
        victims_count: details.victims.len(),
        timeline_entries: details.timeline.len(),
        source_count: details.sources.len(),
    };
    info!(
        articles = summary.articles_scraped,
        images = summary.images_found,
        sources = summary.source_count,
        "Research run complete"
    );
    Ok(summary)
}

/// Run the incremental update check for one event.
///
/// Returns `None` when nothing verifiably new exists; in that case no
/// model call was made, nothing was written, and the watermark did not
/// move.
#[instrument(level = "info", skip(deps), fields(event_id = %event_id))]
pub async fn run_update_check(deps: &PipelineDeps, event_id: &str) -> Result<Option<EventUpdate>> {
    validate_event_id(event_id)?;

    let event = load_event(deps, event_id).await?;
    let Some(last_updated_at) = event.last_updated_at else {
        info!("Event has no watermark yet; run a full research pass first");
        return Ok(None);
    };

    let detector = UpdateDetector::new(deps.search.clone(), deps.model.clone(), &deps.config);
    let update = detector
        .detect_and_summarize(event_id, &event.query, last_updated_at, Utc::now())
        .await?;

    match update {
        Some(update) => {
            deps.store.append_update(&update).await?;
            deps.store
                .advance_watermark(event_id, update.update_date)
                .await?;
            info!(title = %update.title, "Appended event update");
            Ok(Some(update))
        }
        None => Ok(None),
    }
}

async fn load_event(deps: &PipelineDeps, event_id: &str) -> Result<EventRecord> {
    let record = deps
        .store
        .load_event(event_id)
        .await?
        .ok_or_else(|| PipelineError::EventNotFound(event_id.to_string()))?;
    if record.query.trim().is_empty() {
        // A record without a query cannot be researched.
        return Err(PipelineError::EventNotFound(event_id.to_string()));
    }
    Ok(record)
}

/// Event ids become store keys; restrict them to a safe character set.
fn validate_event_id(event_id: &str) -> Result<()> {
    let valid = !event_id.is_empty()
        && event_id.len() <= 128
        && event_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if valid {
        Ok(())
    } else {
        Err(PipelineError::InvalidEventId(event_id.to_string()))
    }
}
