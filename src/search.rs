//! Web and image search against Google Custom Search.
//!
//! The [`WebSearch`] trait abstracts over the search provider so the
//! orchestrator can be handed a fake in tests. [`GoogleSearch`] is the
//! production implementation: paginated web search (page size 10,
//! sequential requests with an inter-page delay to respect provider rate
//! limits) and a single image-scoped request.
//!
//! Provider responses are decoded defensively: a body that looks like an
//! HTML document is rejected before JSON parsing, which defends against
//! the provider returning an HTML error page with a 200 status. A failed
//! or undecodable page is skipped, never fatal; missing credentials are
//! fatal for web search but degrade image search to an empty list.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use serde::Deserialize;
use std::collections::BTreeMap;
use tokio::time::sleep;
use tracing::{debug, instrument, warn};

use crate::config::{AppConfig, PipelineConfig};
use crate::error::{PipelineError, Result};
use crate::models::SearchResult;
use crate::utils::truncate_for_log;

const SEARCH_ENDPOINT: &str = "https://www.googleapis.com/customsearch/v1";
const PAGE_SIZE: usize = 10;

/// Published-date metadata keys, tried in priority order.
const DATE_META_KEYS: &[&str] = &[
    "article:published_time",
    "article:modified_time",
    "og:updated_time",
    "date",
    "dc.date.issued",
];

/// Search provider boundary.
#[async_trait]
pub trait WebSearch: Send + Sync {
    /// Paginated web search. `recency_days` scopes results to a trailing
    /// date window when the provider supports it.
    async fn search_web(
        &self,
        query: &str,
        recency_days: Option<u32>,
    ) -> Result<Vec<SearchResult>>;

    /// One image-scoped search returning candidate image URLs. Always
    /// supplementary: degrades to an empty list rather than failing.
    async fn search_images(&self, query: &str) -> Result<Vec<String>>;
}

/// Google Custom Search client.
pub struct GoogleSearch {
    client: reqwest::Client,
    api_key: Option<String>,
    engine_id: Option<String>,
    pages: usize,
    page_delay: std::time::Duration,
}

impl GoogleSearch {
    pub fn new(config: &AppConfig) -> Result<Self> {
        let pipeline: &PipelineConfig = &config.pipeline;
        let client = reqwest::Client::builder()
            .timeout(pipeline.search_timeout)
            .build()
            .map_err(|e| PipelineError::Internal(e.to_string()))?;
        Ok(Self {
            client,
            api_key: config.google_api_key.clone(),
            engine_id: config.google_engine_id.clone(),
            pages: pipeline.search_pages,
            page_delay: pipeline.page_delay,
        })
    }

    fn credentials(&self) -> Result<(&str, &str)> {
        let key = self
            .api_key
            .as_deref()
            .filter(|k| !k.is_empty())
            .ok_or(PipelineError::MissingCredentials("GOOGLE_API_KEY"))?;
        let cx = self
            .engine_id
            .as_deref()
            .filter(|c| !c.is_empty())
            .ok_or(PipelineError::MissingCredentials("GOOGLE_SEARCH_ENGINE_ID"))?;
        Ok((key, cx))
    }

    fn page_url(&self, key: &str, cx: &str, query: &str, start: usize, recency_days: Option<u32>) -> String {
        let mut url = format!(
            "{SEARCH_ENDPOINT}?key={key}&cx={cx}&q={}&num={PAGE_SIZE}&start={start}",
            urlencoding::encode(query)
        );
        if let Some(days) = recency_days {
            url.push_str(&format!("&dateRestrict=d{days}&sort=date"));
        }
        url
    }

    async fn fetch_page_body(&self, url: &str, page: usize) -> Option<String> {
        match self.client.get(url).send().await {
            Ok(resp) if resp.status().is_success() => match resp.text().await {
                Ok(body) => Some(body),
                Err(e) => {
                    warn!(page, error = %e, "Failed reading search page body; skipping page");
                    None
                }
            },
            Ok(resp) => {
                warn!(page, status = %resp.status(), "Search page returned non-success; skipping page");
                None
            }
            Err(e) => {
                warn!(page, error = %e, "Search page request failed; skipping page");
                None
            }
        }
    }
}

#[async_trait]
impl WebSearch for GoogleSearch {
    #[instrument(level = "info", skip(self))]
    async fn search_web(
        &self,
        query: &str,
        recency_days: Option<u32>,
    ) -> Result<Vec<SearchResult>> {
        let (key, cx) = self.credentials()?;

        let mut results = Vec::new();
        for page in 0..self.pages {
            if page > 0 {
                sleep(self.page_delay).await;
            }
            let start = page * PAGE_SIZE + 1;
            let url = self.page_url(key, cx, query, start, recency_days);

            let Some(body) = self.fetch_page_body(&url, page).await else {
                continue;
            };
            match decode_search_page(&body) {
                Ok(page_results) => {
                    let exhausted = page_results.len() < PAGE_SIZE;
                    debug!(page, count = page_results.len(), "Decoded search page");
                    results.extend(page_results);
                    if exhausted {
                        break;
                    }
                }
                Err(e) => {
                    warn!(page, error = %e, "Undecodable search page; skipping page");
                }
            }
        }
        debug!(total = results.len(), "Web search complete");
        Ok(results)
    }

    #[instrument(level = "info", skip(self))]
    async fn search_images(&self, query: &str) -> Result<Vec<String>> {
        let (key, cx) = match self.credentials() {
            Ok(creds) => creds,
            Err(e) => {
                warn!(error = %e, "Image search skipped; continuing without images");
                return Ok(Vec::new());
            }
        };

        let url = format!(
            "{SEARCH_ENDPOINT}?key={key}&cx={cx}&q={}&num={PAGE_SIZE}&searchType=image&safe=active&imgSize=large",
            urlencoding::encode(query)
        );
        let Some(body) = self.fetch_page_body(&url, 0).await else {
            return Ok(Vec::new());
        };
        match decode_image_page(&body) {
            Ok(images) => Ok(images),
            Err(e) => {
                warn!(error = %e, "Undecodable image search response; continuing without images");
                Ok(Vec::new())
            }
        }
    }
}

// ---- Provider wire format ----

#[derive(Debug, Deserialize)]
struct GoogleResponse {
    #[serde(default)]
    items: Vec<GoogleItem>,
}

#[derive(Debug, Deserialize)]
struct GoogleItem {
    #[serde(default)]
    title: String,
    #[serde(default)]
    link: String,
    #[serde(default)]
    snippet: String,
    #[serde(default, rename = "displayLink")]
    display_link: String,
    #[serde(default)]
    pagemap: Option<PageMap>,
}

#[derive(Debug, Deserialize)]
struct PageMap {
    #[serde(default)]
    metatags: Vec<BTreeMap<String, serde_json::Value>>,
}

/// Decode one web-search page body into normalized results.
///
/// Rejects bodies that look like HTML documents even when the transport
/// reported success.
pub(crate) fn decode_search_page(body: &str) -> Result<Vec<SearchResult>> {
    reject_html(body)?;
    let response: GoogleResponse = serde_json::from_str(body)
        .map_err(|e| PipelineError::Search(format!("bad search response: {e}")))?;
    Ok(response
        .items
        .into_iter()
        .filter(|item| !item.link.is_empty())
        .map(|item| {
            let published_at = item.pagemap.as_ref().and_then(parse_published_at);
            SearchResult {
                title: item.title,
                url: item.link,
                snippet: item.snippet,
                display_domain: item.display_link,
                published_at,
            }
        })
        .collect())
}

/// Decode one image-search page body into filtered image URLs.
pub(crate) fn decode_image_page(body: &str) -> Result<Vec<String>> {
    reject_html(body)?;
    let response: GoogleResponse = serde_json::from_str(body)
        .map_err(|e| PipelineError::Search(format!("bad image response: {e}")))?;
    Ok(response
        .items
        .into_iter()
        .map(|item| item.link)
        .filter(|link| !link.is_empty() && looks_like_image_url(link))
        .collect())
}

fn reject_html(body: &str) -> Result<()> {
    if body.trim_start().starts_with('<') {
        return Err(PipelineError::Search(format!(
            "provider returned an HTML document: {}",
            truncate_for_log(body, 120)
        )));
    }
    Ok(())
}

fn parse_published_at(pagemap: &PageMap) -> Option<DateTime<Utc>> {
    for key in DATE_META_KEYS {
        for tags in &pagemap.metatags {
            if let Some(raw) = tags.get(*key).and_then(|v| v.as_str()) {
                if let Some(parsed) = parse_date_value(raw) {
                    return Some(parsed);
                }
            }
        }
    }
    None
}

/// Parse a provider-supplied date string, tolerating the formats seen in
/// page metadata. Unparseable values yield `None`, never an error.
pub(crate) fn parse_date_value(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return date.and_hms_opt(0, 0, 0).map(|dt| dt.and_utc());
    }
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y/%m/%d") {
        return date.and_hms_opt(0, 0, 0).map(|dt| dt.and_utc());
    }
    None
}

/// Keep only URLs that plausibly point at content images.
pub(crate) fn looks_like_image_url(url: &str) -> bool {
    let lower = url.to_ascii_lowercase();
    // Obvious non-content assets.
    for excluded in ["favicon", "logo", "icon", "sprite", "avatar", "placeholder"] {
        if lower.contains(excluded) {
            return false;
        }
    }
    let path = lower.split(['?', '#']).next().unwrap_or(&lower);
    let has_image_extension = [".jpg", ".jpeg", ".png", ".webp", ".gif"]
        .iter()
        .any(|ext| path.ends_with(ext));
    let has_image_path_token = ["/image", "/images/", "/photo", "/media/", "/uploads/"]
        .iter()
        .any(|token| lower.contains(token));
    has_image_extension || has_image_path_token
}

// ---- Test double ----

/// Canned-response searcher for tests. Records the recency windows it
/// was queried with.
#[derive(Default)]
pub struct MockWebSearch {
    web: Vec<SearchResult>,
    images: Vec<String>,
    recency_calls: std::sync::Mutex<Vec<Option<u32>>>,
}

impl MockWebSearch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_web(mut self, results: Vec<SearchResult>) -> Self {
        self.web = results;
        self
    }

    pub fn with_images(mut self, images: Vec<String>) -> Self {
        self.images = images;
        self
    }

    /// The `recency_days` argument of each `search_web` call so far.
    pub fn recency_calls(&self) -> Vec<Option<u32>> {
        self.recency_calls.lock().expect("mock lock poisoned").clone()
    }
}

#[async_trait]
impl WebSearch for MockWebSearch {
    async fn search_web(&self, _query: &str, recency_days: Option<u32>) -> Result<Vec<SearchResult>> {
        self.recency_calls
            .lock()
            .expect("mock lock poisoned")
            .push(recency_days);
        Ok(self.web.clone())
    }

    async fn search_images(&self, _query: &str) -> Result<Vec<String>> {
        Ok(self.images.clone())
    }
}
