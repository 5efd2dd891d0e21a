//! Best-effort article-body extraction from raw HTML.
//!
//! This is a pure function over arbitrary third-party HTML: it never
//! fails, never touches the network, and returns identical output for
//! identical input. Extraction is deliberately regex-based and tolerant
//! rather than DOM-based: input pages are often malformed, and downstream
//! synthesis tolerates noisy text far better than a strict parser
//! tolerates invalid markup.
//!
//! # Candidate chain
//!
//! After `<script>` and `<style>` blocks are removed, the body is taken
//! from the first candidate of acceptable length:
//! 1. the longest `<article>`, `<main>`, or content-labeled `<div>` block
//! 2. the concatenation of all `<p>` tag text
//! 3. the `<meta name="description">` content
//!
//! The final body is truncated to the configured character budget.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::models::ExtractedArticle;
use crate::utils::{source_domain, truncate_chars};

/// A container candidate shorter than this falls through to the next
/// extraction strategy.
const MIN_CANDIDATE_LEN: usize = 200;

static SCRIPT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<script\b[^>]*>.*?</script>").unwrap());
static STYLE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?is)<style\b[^>]*>.*?</style>").unwrap());
static TITLE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?is)<title[^>]*>(.*?)</title>").unwrap());
static ARTICLE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<article\b[^>]*>(.*?)</article>").unwrap());
static MAIN_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?is)<main\b[^>]*>(.*?)</main>").unwrap());
static CONTENT_DIV_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#"(?is)<div\b[^>]*(?:class|id)\s*=\s*["'][^"']*(?:article|content|story|post)[^"']*["'][^>]*>(.*?)</div>"#,
    )
    .unwrap()
});
static P_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?is)<p\b[^>]*>(.*?)</p>").unwrap());
static META_DESC_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?is)<meta\b[^>]*name\s*=\s*["']description["'][^>]*content\s*=\s*["']([^"']*)["']"#)
        .unwrap()
});
static META_PUBLISHED_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#"(?is)<meta\b[^>]*property\s*=\s*["']article:published_time["'][^>]*content\s*=\s*["']([^"']*)["']"#,
    )
    .unwrap()
});
static META_AUTHOR_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?is)<meta\b[^>]*name\s*=\s*["']author["'][^>]*content\s*=\s*["']([^"']*)["']"#)
        .unwrap()
});
static TAG_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)<[^>]*>").unwrap());
static WS_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

/// Extract a best-effort article from raw HTML.
///
/// Never fails: malformed or empty HTML yields an article with empty
/// fields. `body_cap` is the character budget for the extracted body.
pub fn extract_article(html: &str, url: &str, body_cap: usize) -> ExtractedArticle {
    // Script and CSS bodies would otherwise pollute every text candidate.
    let cleaned = STYLE_RE.replace_all(html, " ");
    let cleaned = SCRIPT_RE.replace_all(&cleaned, " ");

    let title = TITLE_RE
        .captures(&cleaned)
        .and_then(|c| c.get(1))
        .map(|m| clean_text(m.as_str()))
        .unwrap_or_default();

    let body = extract_body(&cleaned);

    ExtractedArticle {
        url: url.to_string(),
        title,
        body_text: truncate_chars(&body, body_cap),
        published_at: capture_meta(&META_PUBLISHED_RE, &cleaned),
        author: capture_meta(&META_AUTHOR_RE, &cleaned),
        source_domain: source_domain(url),
    }
}

fn extract_body(cleaned: &str) -> String {
    // Longest container block wins; short matches are usually nav shells.
    let container = ARTICLE_RE
        .captures_iter(cleaned)
        .chain(MAIN_RE.captures_iter(cleaned))
        .chain(CONTENT_DIV_RE.captures_iter(cleaned))
        .filter_map(|c| c.get(1))
        .map(|m| clean_text(m.as_str()))
        .max_by_key(|text| text.len())
        .unwrap_or_default();
    if container.len() >= MIN_CANDIDATE_LEN {
        return container;
    }

    let paragraphs = P_RE
        .captures_iter(cleaned)
        .filter_map(|c| c.get(1))
        .map(|m| clean_text(m.as_str()))
        .filter(|p| !p.is_empty())
        .collect::<Vec<_>>()
        .join(" ");
    if paragraphs.len() >= MIN_CANDIDATE_LEN {
        return paragraphs;
    }

    let meta = META_DESC_RE
        .captures(cleaned)
        .and_then(|c| c.get(1))
        .map(|m| clean_text(m.as_str()))
        .unwrap_or_default();

    // Fall back to whichever partial candidate carries the most text.
    [container, paragraphs, meta]
        .into_iter()
        .max_by_key(|text| text.len())
        .unwrap_or_default()
}

fn capture_meta(re: &Regex, html: &str) -> Option<String> {
    re.captures(html)
        .and_then(|c| c.get(1))
        .map(|m| clean_text(m.as_str()))
        .filter(|s| !s.is_empty())
}

/// Strip remaining tags, decode common entities, collapse whitespace.
fn clean_text(fragment: &str) -> String {
    let stripped = TAG_RE.replace_all(fragment, " ");
    let decoded = decode_entities(&stripped);
    WS_RE.replace_all(&decoded, " ").trim().to_string()
}

fn decode_entities(s: &str) -> String {
    // &amp; goes last so already-decoded entities are not decoded twice.
    s.replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page(body: &str) -> String {
        format!(
            "<html><head><title>Mill Fire Update</title>\
             <script>var x = 'do not extract this';</script>\
             <style>.hidden {{ display: none; }}</style></head>\
             <body>{body}</body></html>"
        )
    }

    #[test]
    fn test_extract_is_idempotent() {
        let html = page(&format!("<article>{}</article>", "word ".repeat(100)));
        let a = extract_article(&html, "https://example.com/a", 10_000);
        let b = extract_article(&html, "https://example.com/a", 10_000);
        assert_eq!(a.body_text, b.body_text);
        assert_eq!(a.title, b.title);
    }

    #[test]
    fn test_script_and_style_are_stripped() {
        let html = page(&format!("<article>{}</article>", "news text ".repeat(50)));
        let article = extract_article(&html, "https://example.com/a", 10_000);
        assert!(!article.body_text.contains("do not extract"));
        assert!(!article.body_text.contains("display: none"));
    }

    #[test]
    fn test_title_extraction() {
        let html = page("<p>short</p>");
        let article = extract_article(&html, "https://example.com/a", 10_000);
        assert_eq!(article.title, "Mill Fire Update");
    }

    #[test]
    fn test_article_block_preferred_over_paragraphs() {
        let body = format!(
            "<p>stray paragraph outside the article</p><article>{}</article>",
            "the real story continues here ".repeat(20)
        );
        let article = extract_article(&page(&body), "https://example.com/a", 10_000);
        assert!(article.body_text.contains("the real story"));
        assert!(!article.body_text.contains("stray paragraph"));
    }

    #[test]
    fn test_paragraph_fallback_when_no_container() {
        let body = format!("<p>{}</p><p>{}</p>", "first part ".repeat(15), "second part ".repeat(15));
        let article = extract_article(&page(&body), "https://example.com/a", 10_000);
        assert!(article.body_text.contains("first part"));
        assert!(article.body_text.contains("second part"));
    }

    #[test]
    fn test_meta_description_last_resort() {
        let html = "<html><head>\
             <meta name=\"description\" content=\"Two dead after factory fire.\">\
             <title>t</title></head><body><p>tiny</p></body></html>";
        let article = extract_article(html, "https://example.com/a", 10_000);
        assert!(article.body_text.contains("Two dead after factory fire."));
    }

    #[test]
    fn test_body_respects_character_cap() {
        let html = page(&format!("<article>{}</article>", "x".repeat(50_000)));
        let article = extract_article(&html, "https://example.com/a", 1_000);
        assert!(article.body_text.chars().count() <= 1_000);
    }

    #[test]
    fn test_malformed_html_never_panics() {
        for html in ["", "<", "<html><article>unclosed", "<<<>>>", "&amp;&lt;"] {
            let article = extract_article(html, "https://example.com/a", 1_000);
            assert!(article.body_text.chars().count() <= 1_000);
        }
    }

    #[test]
    fn test_entities_decoded_and_whitespace_collapsed() {
        let body = format!(
            "<article>Smith &amp; Sons said &quot;no comment&quot;   \n\n  today. {}</article>",
            "filler ".repeat(40)
        );
        let article = extract_article(&page(&body), "https://example.com/a", 10_000);
        assert!(article.body_text.contains("Smith & Sons said \"no comment\" today."));
    }

    #[test]
    fn test_published_and_author_metadata() {
        let html = "<html><head>\
            <meta property=\"article:published_time\" content=\"2023-06-01T12:00:00Z\">\
            <meta name=\"author\" content=\"Jane Reporter\">\
            </head><body><p>x</p></body></html>";
        let article = extract_article(html, "https://example.com/a", 1_000);
        assert_eq!(article.published_at.as_deref(), Some("2023-06-01T12:00:00Z"));
        assert_eq!(article.author.as_deref(), Some("Jane Reporter"));
    }

    #[test]
    fn test_source_domain_derived_from_url() {
        let article = extract_article("<p>x</p>", "https://www.example.com/story", 1_000);
        assert_eq!(article.source_domain, "example.com");
    }
}
