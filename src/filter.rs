//! Search-result filtering: deduplication, denylisted domains, and
//! completeness checks.
//!
//! The output ordering is stable: results keep the provider's relevance
//! order, which downstream becomes the fetch priority.

use itertools::Itertools;
use tracing::debug;

use crate::models::SearchResult;
use crate::utils::url_host;

/// Social and forum platforms whose pages are not usable article sources.
const DENY_DOMAINS: &[&str] = &[
    "facebook.com",
    "twitter.com",
    "x.com",
    "instagram.com",
    "reddit.com",
    "tiktok.com",
    "youtube.com",
    "linkedin.com",
    "pinterest.com",
    "quora.com",
    "threads.net",
];

/// Filter raw search results down to fetch candidates.
///
/// Removes exact URL duplicates (first occurrence wins), results on
/// denylisted social/forum domains, and results missing a title or
/// snippet. Ordering of survivors is unchanged.
pub fn filter_results(results: Vec<SearchResult>) -> Vec<SearchResult> {
    let before = results.len();
    let kept: Vec<SearchResult> = results
        .into_iter()
        .filter(|r| !r.title.is_empty() && !r.snippet.is_empty())
        .filter(|r| !is_denied(r))
        .unique_by(|r| r.url.clone())
        .collect();
    debug!(before, after = kept.len(), "Filtered search results");
    kept
}

fn is_denied(result: &SearchResult) -> bool {
    let link_host = url_host(&result.url);
    let display = result.display_domain.to_ascii_lowercase();
    DENY_DOMAINS.iter().any(|deny| {
        display == *deny
            || display.ends_with(&format!(".{deny}"))
            || link_host
                .as_deref()
                .is_some_and(|h| h == *deny || h.ends_with(&format!(".{deny}")))
    })
}
