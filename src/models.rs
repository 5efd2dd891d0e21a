//! Data models for search results, extracted articles, and dossiers.
//!
//! This module defines the records that flow through the pipeline:
//! - [`SearchResult`]: one normalized web-search hit
//! - [`ExtractedArticle`]: readable text pulled from one fetched page
//! - [`EventRecord`]: the stored event being researched (query + watermark)
//! - [`EventDetails`]: the synthesized dossier persisted per event
//! - [`EventUpdate`]: an append-only "what's new" entry
//! - [`RunSummary`]: counts reported to the caller after a successful run
//!
//! `EventDetails` uses serde defaults on every field so that a record read
//! back from the store (or built from partial model output) always has
//! every field present with its type-appropriate empty value.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One normalized result from the web-search provider.
///
/// Uniqueness key is `url`, compared case-sensitively as an exact string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    /// Result title as returned by the provider.
    pub title: String,
    /// Absolute URL of the result.
    pub url: String,
    /// Snippet text shown for the result.
    pub snippet: String,
    /// Display domain reported by the provider (e.g. `reuters.com`).
    pub display_domain: String,
    /// Published date parsed defensively from provider page metadata.
    /// `None` when no candidate field parsed cleanly.
    pub published_at: Option<DateTime<Utc>>,
}

/// Readable article text extracted from one fetched page.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractedArticle {
    /// The URL the page was fetched from.
    pub url: String,
    /// Page title, empty when none was found.
    pub title: String,
    /// Extracted body text, capped to the configured character budget.
    pub body_text: String,
    /// `article:published_time` metadata when present.
    pub published_at: Option<String>,
    /// Author metadata when present.
    pub author: Option<String>,
    /// Host of `url` with any leading `www.` removed.
    pub source_domain: String,
}

/// A stored event under research, read from the external store.
///
/// `last_updated_at` is the watermark: the moment of the most recent
/// successful synthesis run. The update detector only counts coverage
/// published strictly after it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventRecord {
    pub id: String,
    /// The natural-language query describing the event.
    pub query: String,
    /// Human-readable event title.
    #[serde(default)]
    pub title: String,
    /// Watermark of the last successful run; `None` before the first run.
    #[serde(default)]
    pub last_updated_at: Option<DateTime<Utc>>,
}

/// The synthesized dossier persisted per event.
///
/// Every field is always present: missing model output is backfilled with
/// the type-appropriate empty value, never left null or absent. `sources`
/// and `images` are never produced by the model; the orchestrator attaches
/// them deterministically from the fetch results.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EventDetails {
    /// Where the event took place.
    #[serde(default)]
    pub location: String,
    /// Narrative account of the event.
    #[serde(default)]
    pub details: String,
    /// Parties accused or suspected.
    #[serde(default)]
    pub accused: Vec<String>,
    /// Victims named in coverage.
    #[serde(default)]
    pub victims: Vec<String>,
    /// Chronological timeline entries.
    #[serde(default)]
    pub timeline: Vec<String>,
    /// URLs of the fetched, content-bearing articles the dossier was
    /// synthesized from. Derived, never model-supplied.
    #[serde(default)]
    pub sources: Vec<String>,
    /// Supplementary image URLs from image search.
    #[serde(default)]
    pub images: Vec<String>,
}

/// An append-only "what's new since the last run" entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventUpdate {
    pub event_id: String,
    /// Short headline for the update, capped at 100 characters.
    pub title: String,
    /// Analyst-style summary of the new coverage, capped at 1000 characters.
    pub description: String,
    /// When the update was produced; updates display in this order.
    pub update_date: DateTime<Utc>,
}

/// Counts reported to the caller after a successful research run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    pub event_id: String,
    /// Articles that were fetched and cleared the minimum-content threshold.
    pub articles_scraped: usize,
    /// Supplementary image URLs attached to the dossier.
    pub images_found: usize,
    pub accused_count: usize,
    pub victims_count: usize,
    pub timeline_entries: usize,
    pub source_count: usize,
}
