//! Bounded-time article fetching with per-URL failure isolation.
//!
//! [`Fetcher::fetch`] retrieves one page and hands the body to the
//! content extractor; a timeout, non-success status, or network failure
//! maps to `None` and is logged, never propagated, so one bad URL cannot
//! abort a batch. [`fetch_all`] fans a batch out concurrently and collects
//! every outcome before returning: a settled join, never a first-wins
//! race, and a timed-out fetch does not cancel its siblings.

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use tracing::{debug, info, instrument, warn};

use crate::config::PipelineConfig;
use crate::error::{PipelineError, Result};
use crate::extract::extract_article;
use crate::models::ExtractedArticle;

/// Article-retrieval boundary.
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Fetch one URL and extract its article. `None` on any per-URL
    /// failure; the caller decides whether the extracted body is long
    /// enough to keep.
    async fn fetch(&self, url: &str) -> Option<ExtractedArticle>;
}

/// HTTP fetcher backed by a shared client with a per-request timeout.
pub struct HttpFetcher {
    client: reqwest::Client,
    body_cap: usize,
}

impl HttpFetcher {
    pub fn new(config: &PipelineConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.fetch_timeout)
            .user_agent(concat!("event_dossier/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| PipelineError::Internal(e.to_string()))?;
        Ok(Self { client, body_cap: config.body_char_cap })
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    #[instrument(level = "info", skip(self), fields(%url))]
    async fn fetch(&self, url: &str) -> Option<ExtractedArticle> {
        let response = match self.client.get(url).send().await {
            Ok(response) => response,
            Err(e) => {
                warn!(error = %e, "Article fetch failed");
                return None;
            }
        };
        if !response.status().is_success() {
            warn!(status = %response.status(), "Article fetch returned non-success");
            return None;
        }
        let html = match response.text().await {
            Ok(html) => html,
            Err(e) => {
                warn!(error = %e, "Failed reading article body");
                return None;
            }
        };

        let article = extract_article(&html, url, self.body_cap);
        debug!(bytes = article.body_text.len(), "Extracted article body");
        Some(article)
    }
}

/// Fetch a batch of URLs concurrently and collect the successes.
///
/// Completion order is not meaningful; results are returned in the input
/// order so the caller's fetch-priority ordering survives the fan-out.
#[instrument(level = "info", skip_all, fields(urls = urls.len()))]
pub async fn fetch_all(
    fetcher: &dyn Fetcher,
    urls: &[String],
    concurrency: usize,
) -> Vec<ExtractedArticle> {
    let results: Vec<Option<ExtractedArticle>> = stream::iter(urls.iter().cloned())
        .map(|url| async move { fetcher.fetch(&url).await })
        .buffered(concurrency.max(1))
        .collect()
        .await;

    let articles: Vec<ExtractedArticle> = results.into_iter().flatten().collect();
    info!(fetched = articles.len(), requested = urls.len(), "Fetched article batch");
    articles
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    /// Map-backed fetcher; URLs absent from the map fail.
    struct MapFetcher {
        pages: HashMap<String, String>,
    }

    #[async_trait]
    impl Fetcher for MapFetcher {
        async fn fetch(&self, url: &str) -> Option<ExtractedArticle> {
            self.pages
                .get(url)
                .map(|html| extract_article(html, url, 10_000))
        }
    }

    fn fetcher(pages: &[(&str, &str)]) -> MapFetcher {
        MapFetcher {
            pages: pages
                .iter()
                .map(|(u, h)| (u.to_string(), h.to_string()))
                .collect(),
        }
    }

    #[tokio::test]
    async fn test_fetch_all_tolerates_individual_failures() {
        let body = format!("<article>{}</article>", "text ".repeat(100));
        let f = fetcher(&[("https://a.example/1", body.as_str())]);
        let urls = vec![
            "https://a.example/1".to_string(),
            "https://dead.example/2".to_string(),
        ];
        let articles = fetch_all(&f, &urls, 4).await;
        assert_eq!(articles.len(), 1);
        assert_eq!(articles[0].url, "https://a.example/1");
    }

    #[tokio::test]
    async fn test_fetch_all_preserves_input_order() {
        let body = format!("<article>{}</article>", "text ".repeat(100));
        let f = fetcher(&[
            ("https://a.example/1", body.as_str()),
            ("https://b.example/2", body.as_str()),
            ("https://c.example/3", body.as_str()),
        ]);
        let urls: Vec<String> = ["https://c.example/3", "https://a.example/1", "https://b.example/2"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let articles = fetch_all(&f, &urls, 2).await;
        let got: Vec<&str> = articles.iter().map(|a| a.url.as_str()).collect();
        assert_eq!(got, vec!["https://c.example/3", "https://a.example/1", "https://b.example/2"]);
    }

    #[tokio::test]
    async fn test_fetch_all_empty_input() {
        let f = fetcher(&[]);
        assert!(fetch_all(&f, &[], 4).await.is_empty());
    }
}
