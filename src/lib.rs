//! # Event Dossier
//!
//! An automated research pipeline for news events: given a short
//! natural-language query describing an event, it retrieves ranked web
//! search results, fetches and extracts readable text from the linked
//! pages, asks an LLM to synthesize a structured dossier (location,
//! narrative, accused parties, victims, timeline) strictly from the
//! retrieved text, and persists the dossier alongside provenance (source
//! URLs, image URLs). A lighter incremental path detects and summarizes
//! genuinely new coverage since the last run.
//!
//! ## Architecture
//!
//! The pipeline is a sequence of stages, each isolated behind its own
//! module and, where it touches the outside world, a trait:
//! 1. **Search** ([`search`]): paginated web search plus an image pass
//! 2. **Filter** ([`filter`]): dedupe, denylist, completeness
//! 3. **Fetch** ([`fetch`]): concurrent bounded-time article retrieval
//! 4. **Extract** ([`extract`]): tolerant regex-based text extraction
//! 5. **Synthesize** ([`synthesis`]): prompt, model call, schema backfill
//! 6. **Persist** ([`store`]): idempotent dossier upsert + watermark
//!
//! [`pipeline`] sequences the stages and owns the failure boundary;
//! [`update`] is the incremental path; [`server`] exposes both over HTTP.

pub mod cli;
pub mod config;
pub mod error;
pub mod extract;
pub mod fetch;
pub mod filter;
pub mod llm;
pub mod models;
pub mod pipeline;
pub mod search;
pub mod server;
pub mod store;
pub mod synthesis;
pub mod update;
pub mod utils;
