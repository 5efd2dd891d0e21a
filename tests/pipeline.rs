//! End-to-end pipeline scenarios over in-process fakes.

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use std::collections::HashMap;
use std::sync::Arc;

use event_dossier::config::PipelineConfig;
use event_dossier::fetch::Fetcher;
use event_dossier::llm::MockChat;
use event_dossier::models::{EventRecord, ExtractedArticle, SearchResult};
use event_dossier::pipeline::{PipelineDeps, run_research, run_update_check};
use event_dossier::search::MockWebSearch;
use event_dossier::store::MemoryStore;

/// Map-backed fetcher; URLs absent from the map time out (return `None`).
struct MapFetcher {
    pages: HashMap<String, String>,
}

impl MapFetcher {
    fn new(pages: &[(&str, String)]) -> Self {
        Self {
            pages: pages
                .iter()
                .map(|(url, body)| (url.to_string(), body.clone()))
                .collect(),
        }
    }

    fn empty() -> Self {
        Self { pages: HashMap::new() }
    }
}

#[async_trait]
impl Fetcher for MapFetcher {
    async fn fetch(&self, url: &str) -> Option<ExtractedArticle> {
        self.pages.get(url).map(|body| ExtractedArticle {
            url: url.to_string(),
            title: "Fetched page".to_string(),
            body_text: body.clone(),
            published_at: None,
            author: None,
            source_domain: "example.com".to_string(),
        })
    }
}

fn search_result(url: &str, domain: &str) -> SearchResult {
    SearchResult {
        title: "Example factory fire coverage".to_string(),
        url: url.to_string(),
        snippet: "A fire broke out at the example factory...".to_string(),
        display_domain: domain.to_string(),
        published_at: None,
    }
}

fn event(id: &str, watermark: Option<DateTime<Utc>>) -> EventRecord {
    EventRecord {
        id: id.to_string(),
        query: "Example factory fire 2023".to_string(),
        title: "Example factory fire".to_string(),
        last_updated_at: watermark,
    }
}

fn long_body() -> String {
    "The fire spread through the packing hall before dawn. ".repeat(20)
}

fn deps(
    search: MockWebSearch,
    model: MockChat,
    store: Arc<MemoryStore>,
    fetcher: MapFetcher,
) -> PipelineDeps {
    PipelineDeps {
        search: Arc::new(search),
        model: Arc::new(model),
        store,
        fetcher: Arc::new(fetcher),
        config: PipelineConfig::default(),
    }
}

#[tokio::test]
async fn research_derives_sources_from_fetched_content() {
    // Three raw results: two unique URLs plus one exact duplicate.
    let search = MockWebSearch::new()
        .with_web(vec![
            search_result("https://news-a.example/fire", "news-a.example"),
            search_result("https://news-b.example/blaze", "news-b.example"),
            search_result("https://news-a.example/fire", "news-a.example"),
        ])
        .with_images(vec!["https://cdn.example/scene.jpg".to_string()]);
    let fetcher = MapFetcher::new(&[
        ("https://news-a.example/fire", long_body()),
        ("https://news-b.example/blaze", long_body()),
    ]);
    // The model supplies content fields only; provenance is attached
    // outside the model call.
    let model = MockChat::new(
        r#"{"location": "Springfield", "details": "A fire destroyed the packing hall.",
            "accused": ["Plant operator"], "victims": [], "timeline": ["2023-05-01: fire reported"],
            "sources": ["https://fabricated.example/not-real"]}"#,
    );
    let store = Arc::new(MemoryStore::new().with_event(event("ev1", None)));
    let deps = deps(search, model, store.clone(), fetcher);

    let summary = run_research(&deps, "ev1").await.unwrap();
    assert_eq!(summary.articles_scraped, 2);
    assert_eq!(summary.images_found, 1);
    assert_eq!(summary.source_count, 2);

    let details = store.details_for("ev1").expect("details persisted");
    assert_eq!(details.location, "Springfield");
    // Sources are exactly the fetched, content-bearing URLs; the model's
    // fabricated citation never appears.
    assert_eq!(
        details.sources,
        vec!["https://news-a.example/fire", "https://news-b.example/blaze"]
    );
    assert_eq!(details.images, vec!["https://cdn.example/scene.jpg"]);
    assert!(store.watermark("ev1").is_some());
}

#[tokio::test]
async fn research_backfills_missing_model_fields() {
    let search = MockWebSearch::new().with_web(vec![search_result(
        "https://news-a.example/fire",
        "news-a.example",
    )]);
    let fetcher = MapFetcher::new(&[("https://news-a.example/fire", long_body())]);
    let model = MockChat::new(r#"{"location": "Springfield"}"#);
    let store = Arc::new(MemoryStore::new().with_event(event("ev1", None)));
    let deps = deps(search, model, store.clone(), fetcher);

    run_research(&deps, "ev1").await.unwrap();
    let details = store.details_for("ev1").unwrap();
    assert_eq!(details.location, "Springfield");
    assert_eq!(details.details, "");
    assert!(details.accused.is_empty());
    assert!(details.victims.is_empty());
    assert!(details.timeline.is_empty());
}

#[tokio::test]
async fn research_with_no_fetchable_articles_is_fatal_and_writes_nothing() {
    let search = MockWebSearch::new().with_web(vec![
        search_result("https://news-a.example/fire", "news-a.example"),
        search_result("https://news-b.example/blaze", "news-b.example"),
    ]);
    let model = MockChat::new("{}");
    let store = Arc::new(MemoryStore::new().with_event(event("ev1", None)));
    let deps = deps(search, model, store.clone(), MapFetcher::empty());

    let err = run_research(&deps, "ev1").await.unwrap_err();
    assert_eq!(err.kind(), "no_content_extracted");
    assert!(store.details_for("ev1").is_none());
    assert!(store.watermark("ev1").is_none());
}

#[tokio::test]
async fn research_discards_bodies_below_content_threshold() {
    let search = MockWebSearch::new().with_web(vec![
        search_result("https://news-a.example/stub", "news-a.example"),
        search_result("https://news-b.example/full", "news-b.example"),
    ]);
    let fetcher = MapFetcher::new(&[
        ("https://news-a.example/stub", "Too short to count.".to_string()),
        ("https://news-b.example/full", long_body()),
    ]);
    let model = MockChat::new("{}");
    let store = Arc::new(MemoryStore::new().with_event(event("ev1", None)));
    let deps = deps(search, model, store.clone(), fetcher);

    let summary = run_research(&deps, "ev1").await.unwrap();
    assert_eq!(summary.articles_scraped, 1);
    assert_eq!(
        store.details_for("ev1").unwrap().sources,
        vec!["https://news-b.example/full"]
    );
}

#[tokio::test]
async fn research_store_failure_leaves_watermark_unchanged() {
    let search = MockWebSearch::new().with_web(vec![search_result(
        "https://news-a.example/fire",
        "news-a.example",
    )]);
    let fetcher = MapFetcher::new(&[("https://news-a.example/fire", long_body())]);
    let model = MockChat::new(r#"{"location": "Springfield"}"#);
    let store = Arc::new(MemoryStore::new().with_event(event("ev1", None)));
    store.set_fail_writes(true);
    let deps = deps(search, model, store.clone(), fetcher);

    let err = run_research(&deps, "ev1").await.unwrap_err();
    assert_eq!(err.kind(), "store_error");
    assert!(store.watermark("ev1").is_none());
    assert!(store.details_for("ev1").is_none());
}

#[tokio::test]
async fn research_synthesis_format_error_persists_nothing() {
    let search = MockWebSearch::new().with_web(vec![search_result(
        "https://news-a.example/fire",
        "news-a.example",
    )]);
    let fetcher = MapFetcher::new(&[("https://news-a.example/fire", long_body())]);
    let model = MockChat::new("I am sorry, I cannot help with that.");
    let store = Arc::new(MemoryStore::new().with_event(event("ev1", None)));
    let deps = deps(search, model, store.clone(), fetcher);

    let err = run_research(&deps, "ev1").await.unwrap_err();
    assert_eq!(err.kind(), "synthesis_format");
    assert!(store.details_for("ev1").is_none());
    assert!(store.watermark("ev1").is_none());
}

#[tokio::test]
async fn research_unknown_event_is_not_found() {
    let deps = deps(
        MockWebSearch::new(),
        MockChat::new("{}"),
        Arc::new(MemoryStore::new()),
        MapFetcher::empty(),
    );
    let err = run_research(&deps, "missing").await.unwrap_err();
    assert_eq!(err.kind(), "event_not_found");
}

#[tokio::test]
async fn research_rejects_malformed_event_id() {
    let deps = deps(
        MockWebSearch::new(),
        MockChat::new("{}"),
        Arc::new(MemoryStore::new()),
        MapFetcher::empty(),
    );
    let err = run_research(&deps, "../escape").await.unwrap_err();
    assert_eq!(err.kind(), "invalid_event_id");
}

#[tokio::test]
async fn update_check_appends_and_advances_watermark() {
    let watermark = Utc.with_ymd_and_hms(2023, 6, 5, 0, 0, 0).unwrap();
    let mut fresh = search_result("https://news-a.example/arrest", "news-a.example");
    fresh.published_at = Some(Utc::now() - chrono::Duration::hours(2));

    let search = MockWebSearch::new().with_web(vec![fresh]);
    let model = MockChat::new(
        r#"{"title": "Arrest made", "description": "Police arrested the plant operator."}"#,
    );
    let store = Arc::new(MemoryStore::new().with_event(event("ev1", Some(watermark))));
    let deps = deps(search, model, store.clone(), MapFetcher::empty());

    let update = run_update_check(&deps, "ev1").await.unwrap().expect("update");
    assert_eq!(update.title, "Arrest made");

    let stored = store.updates_for("ev1");
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].description, "Police arrested the plant operator.");
    assert_eq!(store.watermark("ev1"), Some(update.update_date));
    assert!(update.update_date > watermark);
}

#[tokio::test]
async fn update_check_short_circuits_without_model_call_or_write() {
    let watermark = Utc::now();
    let mut stale = search_result("https://news-a.example/old", "news-a.example");
    stale.published_at = Some(watermark - chrono::Duration::days(3));

    let search = MockWebSearch::new().with_web(vec![stale]);
    let model = Arc::new(MockChat::new(r#"{"title": "x"}"#));
    let store = Arc::new(MemoryStore::new().with_event(event("ev1", Some(watermark))));
    let deps = PipelineDeps {
        search: Arc::new(search),
        model: model.clone(),
        store: store.clone(),
        fetcher: Arc::new(MapFetcher::empty()),
        config: PipelineConfig::default(),
    };

    let update = run_update_check(&deps, "ev1").await.unwrap();
    assert!(update.is_none());
    assert_eq!(model.call_count(), 0);
    assert!(store.updates_for("ev1").is_empty());
    assert_eq!(store.watermark("ev1"), Some(watermark));
}

#[tokio::test]
async fn update_check_without_baseline_returns_none() {
    let search = MockWebSearch::new().with_web(vec![search_result(
        "https://news-a.example/fire",
        "news-a.example",
    )]);
    let model = Arc::new(MockChat::new("{}"));
    let store = Arc::new(MemoryStore::new().with_event(event("ev1", None)));
    let deps = PipelineDeps {
        search: Arc::new(search),
        model: model.clone(),
        store: store.clone(),
        fetcher: Arc::new(MapFetcher::empty()),
        config: PipelineConfig::default(),
    };

    let update = run_update_check(&deps, "ev1").await.unwrap();
    assert!(update.is_none());
    assert_eq!(model.call_count(), 0);
}
