//! Small helpers shared across the pipeline: log-safe truncation,
//! character-budget truncation, and URL/domain derivation.

use url::Url;

/// Truncate a string for logging purposes.
///
/// Long strings are truncated to `max` bytes (snapped back to a char
/// boundary) with an ellipsis and byte-count indicator appended. Used when
/// logging raw model output or provider bodies for diagnosis.
pub fn truncate_for_log(s: &str, max: usize) -> String {
    if s.len() <= max {
        s.to_string()
    } else {
        let cut = floor_char_boundary(s, max);
        format!("{}…(+{} bytes)", &s[..cut], s.len() - cut)
    }
}

/// Truncate a string to at most `max` characters (not bytes).
///
/// Character budgets throughout the pipeline (extracted body caps,
/// per-article prompt caps, update title/description caps) are counted in
/// characters so multi-byte text never splits mid-codepoint.
pub fn truncate_chars(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        s.chars().take(max).collect()
    }
}

/// Largest byte index `<= max` that falls on a char boundary.
fn floor_char_boundary(s: &str, max: usize) -> usize {
    let mut cut = max.min(s.len());
    while cut > 0 && !s.is_char_boundary(cut) {
        cut -= 1;
    }
    cut
}

/// Derive the display domain from a URL, stripping a leading `www.`.
///
/// Returns an empty string when the URL does not parse or has no host;
/// callers treat the domain as best-effort metadata.
pub fn source_domain(url: &str) -> String {
    match Url::parse(url) {
        Ok(parsed) => parsed
            .host_str()
            .map(|h| h.strip_prefix("www.").unwrap_or(h).to_string())
            .unwrap_or_default(),
        Err(_) => String::new(),
    }
}

/// The host of a URL, lowercased, for denylist matching.
pub fn url_host(url: &str) -> Option<String> {
    Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(|h| h.to_ascii_lowercase()))
}
